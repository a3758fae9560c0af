//! Vector document model the report is drawn into.
//!
//! Coordinates are points with the origin at the top-left of the page and
//! y growing downwards.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn max_x(&self) -> f64 {
        self.x + self.width
    }

    pub fn max_y(&self) -> f64 {
        self.y + self.height
    }
}

/// RGB in 0.0..=1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const BLUE: Color = Color::rgb(0.0, 0.0, 1.0);

    pub const fn rgb(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StrokeStyle {
    pub color: Color,
    pub width: f64,
}

impl StrokeStyle {
    pub const fn new(color: Color, width: f64) -> Self {
        Self { color, width }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Shape {
    Line {
        from: Point,
        to: Point,
        stroke: StrokeStyle,
    },
    Polyline {
        points: Vec<Point>,
        stroke: StrokeStyle,
    },
    Rect {
        rect: Rect,
        stroke: StrokeStyle,
    },
    Text {
        text: String,
        frame: Rect,
        font_size: f64,
        bold: bool,
        centered: bool,
    },
}

/// Drawing surface for `GraphRenderer` and the page layout.
pub trait Canvas {
    fn stroke_line(&mut self, from: Point, to: Point, stroke: StrokeStyle);
    fn stroke_polyline(&mut self, points: &[Point], stroke: StrokeStyle);
    fn stroke_rect(&mut self, rect: Rect, stroke: StrokeStyle);
    fn draw_text(&mut self, text: &str, frame: Rect, font_size: f64, bold: bool, centered: bool);
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Page {
    pub shapes: Vec<Shape>,
}

impl Page {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn polylines(&self) -> impl Iterator<Item = &[Point]> {
        self.shapes.iter().filter_map(|s| match s {
            Shape::Polyline { points, .. } => Some(points.as_slice()),
            _ => None,
        })
    }

    pub fn lines(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        self.shapes.iter().filter_map(|s| match s {
            Shape::Line { from, to, .. } => Some((*from, *to)),
            _ => None,
        })
    }

    pub fn rects(&self) -> impl Iterator<Item = &Rect> {
        self.shapes.iter().filter_map(|s| match s {
            Shape::Rect { rect, .. } => Some(rect),
            _ => None,
        })
    }
}

impl Canvas for Page {
    fn stroke_line(&mut self, from: Point, to: Point, stroke: StrokeStyle) {
        self.shapes.push(Shape::Line { from, to, stroke });
    }

    fn stroke_polyline(&mut self, points: &[Point], stroke: StrokeStyle) {
        if points.len() < 2 {
            return;
        }
        self.shapes.push(Shape::Polyline {
            points: points.to_vec(),
            stroke,
        });
    }

    fn stroke_rect(&mut self, rect: Rect, stroke: StrokeStyle) {
        self.shapes.push(Shape::Rect { rect, stroke });
    }

    fn draw_text(&mut self, text: &str, frame: Rect, font_size: f64, bold: bool, centered: bool) {
        self.shapes.push(Shape::Text {
            text: text.to_string(),
            frame,
            font_size,
            bold,
            centered,
        });
    }
}

/// Document info dictionary entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DocumentInfo {
    pub title: String,
    pub author: String,
    pub creator: String,
}

/// Multi-page report handed back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub width: f64,
    pub height: f64,
    pub info: DocumentInfo,
    pub pages: Vec<Page>,
}

impl Document {
    pub fn new(width: f64, height: f64, info: DocumentInfo) -> Self {
        Self {
            width,
            height,
            info,
            pages: Vec::new(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
