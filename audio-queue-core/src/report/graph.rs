use super::document::{Canvas, Color, Point, Rect, StrokeStyle};

/// Inset between a panel's edge and its axes.
pub const GRAPH_MARGIN: f64 = 20.0;

/// Stroke width for axes and series.
pub const LINE_WIDTH: f64 = 2.0;

/// Draws one point sequence as an axis-framed polyline.
///
/// ```text
///  top ─────────────────────────────
///        │ margin
///        │        /\      max sits at top + margin
///        │   /\  /  \
///        │  /  \/    \
///        │ /           min sits on the baseline
///        └──────────────────────── baseline = bottom - margin
///      left + margin            right - margin
/// ```
#[derive(Debug, Clone, Copy)]
pub struct GraphRenderer {
    pub margin: f64,
    pub axis_stroke: StrokeStyle,
    pub series_stroke: StrokeStyle,
}

impl Default for GraphRenderer {
    fn default() -> Self {
        Self {
            margin: GRAPH_MARGIN,
            axis_stroke: StrokeStyle::new(Color::BLACK, LINE_WIDTH),
            series_stroke: StrokeStyle::new(Color::BLUE, LINE_WIDTH),
        }
    }
}

impl GraphRenderer {
    /// Draw into `region` shifted down by `vertical_offset`.
    ///
    /// Axes are always drawn. The polyline needs at least two points.
    pub fn draw(&self, canvas: &mut impl Canvas, points: &[f32], region: Rect, vertical_offset: f64) {
        let frame = self.plot_frame(region, vertical_offset);
        let origin = Point::new(frame.x, frame.max_y());

        canvas.stroke_line(origin, Point::new(frame.max_x(), frame.max_y()), self.axis_stroke);
        canvas.stroke_line(origin, Point::new(frame.x, frame.y), self.axis_stroke);

        if points.len() < 2 {
            return;
        }
        canvas.stroke_polyline(&self.plot_points(points, region, vertical_offset), self.series_stroke);
    }

    /// Usable plotting area: the shifted region inset by the margin on every side.
    pub fn plot_frame(&self, region: Rect, vertical_offset: f64) -> Rect {
        Rect::new(
            region.x + self.margin,
            region.y + vertical_offset + self.margin,
            (region.width - 2.0 * self.margin).max(0.0),
            (region.height - 2.0 * self.margin).max(0.0),
        )
    }

    /// Page coordinates for every point. Empty for fewer than two points.
    ///
    /// A flat series (zero range) is scaled as if the range were 1 and
    /// lies on the baseline. Non-finite values are drawn at the minimum.
    pub fn plot_points(&self, points: &[f32], region: Rect, vertical_offset: f64) -> Vec<Point> {
        if points.len() < 2 {
            return Vec::new();
        }
        let frame = self.plot_frame(region, vertical_offset);

        let finite = points.iter().copied().filter(|v| v.is_finite());
        let (min, max) = finite.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v as f64), hi.max(v as f64))
        });
        let min = if min.is_finite() { min } else { 0.0 };
        let range = if max.is_finite() && max > min { max - min } else { 1.0 };

        let x_step = frame.width / (points.len() - 1) as f64;
        let scale = frame.height / range;
        let baseline = frame.max_y();

        points
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                let value = if v.is_finite() { v as f64 } else { min };
                Point::new(frame.x + i as f64 * x_step, baseline - (value - min) * scale)
            })
            .collect()
    }
}
