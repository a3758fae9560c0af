//! Minimal PDF 1.4 serializer for report documents.
//!
//! Layout written:
//! ```text
//! %PDF-1.4
//! 1 0 obj  Catalog
//! 2 0 obj  Pages (MediaBox = document size)
//! 3 0 obj  Font /Helvetica-Bold, WinAnsiEncoding
//! 4 0 obj  Info (Title, Author, Creator, Producer, CreationDate)
//! 5 0 obj  Page 1        6 0 obj  content stream 1
//! 7 0 obj  Page 2        8 0 obj  content stream 2 ...
//! xref / trailer / startxref / %%EOF
//! ```
//!
//! Document coordinates have a top-left origin; PDF user space has a
//! bottom-left origin, so every y is flipped against the page height.

use std::fmt::Write as _;
use std::io::Write;

use chrono::{DateTime, Utc};

use crate::models::error::EngineError;

use super::document::{Color, Document, Point, Shape, StrokeStyle};

const FIRST_PAGE_OBJECT: usize = 5;

/// Average Helvetica-Bold advance width, in em.
const AVERAGE_GLYPH_WIDTH: f64 = 0.56;

/// Serialize `document` to `out`, stamped with the current time.
pub fn write_pdf<W: Write>(document: &Document, out: W) -> Result<(), EngineError> {
    write_pdf_at(document, Utc::now(), out)
}

/// Serialize `document` with an explicit creation date.
pub fn write_pdf_at<W: Write>(
    document: &Document,
    created: DateTime<Utc>,
    mut out: W,
) -> Result<(), EngineError> {
    let bytes = render(document, created);
    out.write_all(&bytes)
        .map_err(|e| EngineError::File(format!("failed to write pdf: {}", e)))?;
    out.flush()
        .map_err(|e| EngineError::File(format!("failed to flush pdf: {}", e)))?;
    Ok(())
}

struct ObjectWriter {
    buf: Vec<u8>,
    offsets: Vec<usize>,
}

impl ObjectWriter {
    fn new(object_count: usize) -> Self {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n");
        Self {
            buf,
            offsets: vec![0; object_count],
        }
    }

    fn object(&mut self, id: usize, body: &str) {
        self.offsets[id - 1] = self.buf.len();
        self.buf
            .extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", id, body).as_bytes());
    }

    fn stream(&mut self, id: usize, content: &[u8]) {
        self.offsets[id - 1] = self.buf.len();
        self.buf.extend_from_slice(
            format!("{} 0 obj\n<< /Length {} >>\nstream\n", id, content.len()).as_bytes(),
        );
        self.buf.extend_from_slice(content);
        self.buf.extend_from_slice(b"\nendstream\nendobj\n");
    }

    fn finish(mut self) -> Vec<u8> {
        let xref_offset = self.buf.len();
        let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", self.offsets.len() + 1);
        for offset in &self.offsets {
            let _ = writeln!(xref, "{:010} 00000 n ", offset);
        }
        let _ = write!(
            xref,
            "trailer\n<< /Size {} /Root 1 0 R /Info 4 0 R >>\nstartxref\n{}\n%%EOF\n",
            self.offsets.len() + 1,
            xref_offset
        );
        self.buf.extend_from_slice(xref.as_bytes());
        self.buf
    }
}

fn render(document: &Document, created: DateTime<Utc>) -> Vec<u8> {
    let page_count = document.pages.len();
    let mut writer = ObjectWriter::new(FIRST_PAGE_OBJECT - 1 + page_count * 2);

    let kids: Vec<String> = (0..page_count)
        .map(|i| format!("{} 0 R", FIRST_PAGE_OBJECT + i * 2))
        .collect();

    writer.object(1, "<< /Type /Catalog /Pages 2 0 R >>");
    writer.object(
        2,
        &format!(
            "<< /Type /Pages /Kids [{}] /Count {} /MediaBox [0 0 {} {}] >>",
            kids.join(" "),
            page_count,
            num(document.width),
            num(document.height)
        ),
    );
    writer.object(
        3,
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Bold /Encoding /WinAnsiEncoding >>",
    );
    writer.object(
        4,
        &format!(
            "<< /Title {} /Author {} /Creator {} /Producer {} /CreationDate {} >>",
            text_string(&document.info.title),
            text_string(&document.info.author),
            text_string(&document.info.creator),
            text_string(concat!("audio-queue ", env!("CARGO_PKG_VERSION"))),
            text_string(&created.format("D:%Y%m%d%H%M%SZ").to_string()),
        ),
    );

    for (i, page) in document.pages.iter().enumerate() {
        let page_id = FIRST_PAGE_OBJECT + i * 2;
        writer.object(
            page_id,
            &format!(
                "<< /Type /Page /Parent 2 0 R /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
                page_id + 1
            ),
        );
        let content = content_stream(&page.shapes, document.height);
        writer.stream(page_id + 1, content.as_bytes());
    }

    writer.finish()
}

fn content_stream(shapes: &[Shape], page_height: f64) -> String {
    let flip = |p: &Point| format!("{} {}", num(p.x), num(page_height - p.y));
    let mut ops = String::new();

    for shape in shapes {
        match shape {
            Shape::Line { from, to, stroke } => {
                set_stroke(&mut ops, stroke);
                let _ = writeln!(ops, "{} m {} l S", flip(from), flip(to));
            }
            Shape::Polyline { points, stroke } => {
                let Some((first, rest)) = points.split_first() else {
                    continue;
                };
                set_stroke(&mut ops, stroke);
                let _ = writeln!(ops, "{} m", flip(first));
                for p in rest {
                    let _ = writeln!(ops, "{} l", flip(p));
                }
                ops.push_str("S\n");
            }
            Shape::Rect { rect, stroke } => {
                set_stroke(&mut ops, stroke);
                let _ = writeln!(
                    ops,
                    "{} {} {} {} re S",
                    num(rect.x),
                    num(page_height - rect.max_y()),
                    num(rect.width),
                    num(rect.height)
                );
            }
            Shape::Text {
                text,
                frame,
                font_size,
                centered,
                ..
            } => {
                let estimated = text.chars().count() as f64 * font_size * AVERAGE_GLYPH_WIDTH;
                let x = if *centered {
                    frame.x + ((frame.width - estimated) / 2.0).max(0.0)
                } else {
                    frame.x
                };
                let baseline = frame.y + font_size * 0.8;
                let _ = writeln!(
                    ops,
                    "0 g BT /F1 {} Tf {} {} Td {} Tj ET",
                    num(*font_size),
                    num(x),
                    num(page_height - baseline),
                    text_string(text)
                );
            }
        }
    }
    ops
}

fn set_stroke(ops: &mut String, stroke: &StrokeStyle) {
    let Color { r, g, b } = stroke.color;
    let _ = writeln!(ops, "{} {} {} RG {} w", num(r), num(g), num(b), num(stroke.width));
}

/// Compact decimal: at most two fractional digits, no trailing zeros.
fn num(value: f64) -> String {
    let s = format!("{:.2}", value);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    match s {
        "-0" | "" => "0".to_string(),
        other => other.to_string(),
    }
}

/// PDF literal string in WinAnsi. Characters outside Latin-1 become `?`.
fn text_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('(');
    for c in text.chars() {
        match c {
            '(' | ')' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            ' '..='~' => out.push(c),
            '\u{a0}'..='\u{ff}' => {
                let _ = write!(out, "\\{:03o}", c as u32);
            }
            _ => out.push('?'),
        }
    }
    out.push(')');
    out
}
