use crate::models::config::ReportConfiguration;

use super::document::{Canvas, Color, Document, DocumentInfo, Page, Rect, StrokeStyle};
use super::graph::GraphRenderer;

pub const PAGE_WIDTH: f64 = 595.0;
pub const PAGE_HEIGHT: f64 = 842.0;
pub const TITLE_HEIGHT: f64 = 35.0;
pub const TITLE_FONT_SIZE: f64 = 30.0;
pub const SPACING: f64 = 10.0;
pub const GRAPHS_PER_PAGE: usize = 4;

/// Panel height that fills the page: title, four panels and five gaps.
pub const GRAPH_HEIGHT: f64 =
    (PAGE_HEIGHT - TITLE_HEIGHT - SPACING * (GRAPHS_PER_PAGE as f64 + 1.0)) / GRAPHS_PER_PAGE as f64;

/// Turns an amplitude series into a paginated chart document.
///
/// ```text
/// ┌──────────── 595 ────────────┐
/// │ 10                          │
/// │ [ title band, 35 ]          │
/// │ 10                          │
/// │ [ panel 0 ]                 │
/// │ 10                          │
/// │ [ panel 1 ]                 │   842
/// │ 10                          │
/// │ [ panel 2 ]                 │
/// │ 10                          │
/// │ [ panel 3 ]                 │
/// └─────────────────────────────┘
/// ```
#[derive(Debug, Clone)]
pub struct PaginatedReportBuilder {
    config: ReportConfiguration,
    renderer: GraphRenderer,
}

impl Default for PaginatedReportBuilder {
    fn default() -> Self {
        Self::new(ReportConfiguration::default())
    }
}

impl PaginatedReportBuilder {
    pub fn new(config: ReportConfiguration) -> Self {
        Self {
            config,
            renderer: GraphRenderer::default(),
        }
    }

    pub fn config(&self) -> &ReportConfiguration {
        &self.config
    }

    /// Build the report, or `None` when there is nothing to chart.
    ///
    /// `None` for an empty series, or a duration that is absent, zero,
    /// negative or non-finite.
    pub fn build_report(&self, series: &[f32], duration_secs: Option<f64>) -> Option<Document> {
        if let Err(e) = self.config.validate() {
            log::error!("invalid report configuration: {}", e);
            return None;
        }
        let window_size = self.window_size(series.len(), duration_secs)?;
        let windows = self.partition(series, window_size);
        log::debug!(
            "report: {} samples over {:?} s, {} per window, {} windows",
            series.len(),
            duration_secs,
            window_size,
            windows.len()
        );
        Some(self.layout(&windows))
    }

    /// Samples per window: `round(len * seconds_per_window / duration)`, at least 1.
    pub fn window_size(&self, len: usize, duration_secs: Option<f64>) -> Option<usize> {
        let duration = duration_secs.filter(|d| d.is_finite() && *d > 0.0)?;
        if len == 0 {
            return None;
        }
        let size = (len as f64 * self.config.seconds_per_window / duration).round();
        Some((size as usize).max(1))
    }

    /// Consecutive windows of `window_size`; a shorter remainder becomes the
    /// last window. No empty trailing window.
    pub fn partition<'a>(&self, series: &'a [f32], window_size: usize) -> Vec<&'a [f32]> {
        series.chunks(window_size.max(1)).collect()
    }

    /// Lay out windows four to a page under a title band repeated on every page.
    pub fn layout(&self, windows: &[&[f32]]) -> Document {
        let mut document = Document::new(
            PAGE_WIDTH,
            PAGE_HEIGHT,
            DocumentInfo {
                title: self.config.title.clone(),
                author: self.config.author.clone(),
                creator: self.config.creator.clone(),
            },
        );
        let border = StrokeStyle::new(Color::BLACK, 1.0);
        let region = Rect::new(0.0, 0.0, PAGE_WIDTH, GRAPH_HEIGHT);

        let mut page = Page::new();
        let mut offset = 0.0;
        for (index, window) in windows.iter().enumerate() {
            if index % GRAPHS_PER_PAGE == 0 {
                if index != 0 {
                    document.pages.push(std::mem::take(&mut page));
                }
                self.draw_title(&mut page);
                offset = TITLE_HEIGHT + SPACING;
            }

            page.stroke_rect(Rect::new(0.0, offset, PAGE_WIDTH, GRAPH_HEIGHT), border);
            self.renderer.draw(&mut page, window, region, offset);
            offset += GRAPH_HEIGHT + SPACING;
        }
        if !windows.is_empty() {
            document.pages.push(page);
        }
        document
    }

    fn draw_title(&self, page: &mut Page) {
        page.draw_text(
            &self.config.title,
            Rect::new(0.0, SPACING, PAGE_WIDTH, TITLE_HEIGHT),
            TITLE_FONT_SIZE,
            true,
            true,
        );
    }
}
