//! Turns [`DrawCommand`]s into pixel writes.
//!
//! Everything here is integer arithmetic on pixel centers, so the same
//! command against the same buffer always produces the same pixels.
//! Opaque colors overwrite; translucent colors are composited, which means
//! drawing a translucent shape twice darkens it twice.
//!
//! Geometry may sit anywhere in the `i32` plane. Edge math runs in `i64`
//! (or `i128` where products appear) and only the part of a shape that can
//! reach the target is walked.

use crate::prelude::*;

use super::{
    buffer::PixelBuffer,
    command::{closed_path, DrawCommand, Style},
    Rectangle,
};

pub const GLYPH_WIDTH: UCoordinate = 8;
pub const GLYPH_HEIGHT: UCoordinate = 8;

/// Validates `command` and writes it into `target`.
pub fn rasterize(target: &mut PixelBuffer, command: &DrawCommand) -> Result<()> {
    command.validate()?;
    match command {
        DrawCommand::Point { at, color } => target.blend(at.x, at.y, *color),
        DrawCommand::Line {
            from,
            to,
            color,
            width,
        } => {
            let mut coverage = Coverage::new(target);
            stroke_segment(&mut coverage, *from, *to, *width);
            coverage.paint(target, *color);
        }
        DrawCommand::Rect {
            left,
            top,
            width,
            height,
            style,
        } => rect(
            target,
            Rectangle::new(
                Point::new(*left, *top),
                Size::new(*width as UCoordinate, *height as UCoordinate),
            ),
            style,
        ),
        DrawCommand::Ellipse {
            left,
            top,
            width,
            height,
            style,
        } => ellipse(
            target,
            Rectangle::new(
                Point::new(*left, *top),
                Size::new(*width as UCoordinate, *height as UCoordinate),
            ),
            style,
        ),
        DrawCommand::Polygon { vertices, style } => polygon(target, closed_path(vertices), style),
        DrawCommand::Text {
            text,
            left,
            baseline,
            color,
            scale,
        } => draw_glyphs(target, text, *left, *baseline, *color, *scale),
        DrawCommand::Image { origin, image } => target.draw_buffer(*origin, image),
    }
    Ok(())
}

fn saturate(v: i64) -> ICoordinate {
    v.clamp(i64::from(ICoordinate::MIN), i64::from(ICoordinate::MAX)) as ICoordinate
}

/// Bresenham's walk from `from` to `to`, both endpoints included.
pub fn line_points(from: Point, to: Point, mut f: impl FnMut(Point)) {
    let dx = (i64::from(to.x) - i64::from(from.x)).abs();
    let dy = -(i64::from(to.y) - i64::from(from.y)).abs();
    let sx = if from.x < to.x { 1 } else { -1 };
    let sy = if from.y < to.y { 1 } else { -1 };
    let mut err = dx + dy;
    let mut p = from;
    loop {
        f(p);
        if p == to {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            p.x += sx;
        }
        if e2 <= dx {
            err += dx;
            p.y += sy;
        }
    }
}

/// `a < b` for fractions with positive denominators.
fn less(a: (i128, i128), b: (i128, i128)) -> bool {
    a.0 * b.1 < b.0 * a.1
}

/// Liang-Barsky clipping of a segment against the inclusive box
/// `[min, max]`. New endpoints are rounded to the nearest pixel on the
/// segment, so they stay between the original ones.
fn clip_segment(
    from: Point,
    to: Point,
    min: (i64, i64),
    max: (i64, i64),
) -> Option<(Point, Point)> {
    let (x0, y0) = (i64::from(from.x), i64::from(from.y));
    let (dx, dy) = (i64::from(to.x) - x0, i64::from(to.y) - y0);
    let mut enter = (0_i128, 1_i128);
    let mut exit = (1_i128, 1_i128);
    for (p, q) in [
        (-dx, x0 - min.0),
        (dx, max.0 - x0),
        (-dy, y0 - min.1),
        (dy, max.1 - y0),
    ] {
        let (p, q) = (i128::from(p), i128::from(q));
        if p == 0 {
            if q < 0 {
                return None;
            }
        } else if p < 0 {
            let t = (-q, -p);
            if less(enter, t) {
                enter = t;
            }
        } else {
            let t = (q, p);
            if less(t, exit) {
                exit = t;
            }
        }
    }
    if less(exit, enter) {
        return None;
    }
    let at = |(num, den): (i128, i128)| {
        let offset = |d: i64| (2 * i128::from(d) * num + den).div_euclid(2 * den) as i64;
        Point::new(saturate(x0 + offset(dx)), saturate(y0 + offset(dy)))
    };
    Some((at(enter), at(exit)))
}

/// Horizontal runs per target row, merged before painting so that every
/// pixel is painted once even where brush stamps overlap.
struct Coverage {
    width: i64,
    rows: Vec<Vec<(ICoordinate, ICoordinate)>>,
}

impl Coverage {
    fn new(target: &PixelBuffer) -> Self {
        Self {
            width: i64::from(target.width()),
            rows: vec![Vec::new(); target.height() as usize],
        }
    }

    fn height(&self) -> i64 {
        self.rows.len() as i64
    }

    /// Adds `[x0, x1)` on row `y`, clipped to the target.
    fn add(&mut self, y: i64, x0: i64, x1: i64) {
        let (x0, x1) = (x0.max(0), x1.min(self.width));
        if x0 >= x1 || y < 0 || y >= self.height() {
            return;
        }
        self.rows[y as usize].push((saturate(x0), saturate(x1)));
    }

    fn paint(self, target: &mut PixelBuffer, color: Color) {
        for (y, mut spans) in self.rows.into_iter().enumerate() {
            spans.sort_unstable();
            let mut merged: Option<(ICoordinate, ICoordinate)> = None;
            for (start, end) in spans {
                merged = match merged {
                    Some((s, e)) if start <= e => Some((s, e.max(end))),
                    Some((s, e)) => {
                        target.blend_span(y as ICoordinate, s, e, color);
                        Some((start, end))
                    }
                    None => Some((start, end)),
                };
            }
            if let Some((s, e)) = merged {
                target.blend_span(y as ICoordinate, s, e, color);
            }
        }
    }
}

/// Covers a segment drawn with a square brush of `width`.
///
/// Only brush centers whose stamp reaches the target are walked. Along a
/// Bresenham path both coordinates are monotone and neighbors differ by at
/// most one, so on each target row the stamps form a single run bounded by
/// the extreme centers of the first and last path rows under the brush.
fn stroke_segment(coverage: &mut Coverage, from: Point, to: Point, width: UCoordinate) {
    let width = i64::from(width);
    let lo = -(width - 1) / 2;
    let hi = lo + width;
    let reach_min = (1 - hi, 1 - hi);
    let reach_max = (coverage.width - 1 - lo, coverage.height() - 1 - lo);
    let Some((a, b)) = clip_segment(from, to, reach_min, reach_max) else {
        return;
    };
    let first_row = i64::from(a.y.min(b.y));
    let last_row = i64::from(a.y.max(b.y));
    let mut extents = vec![(i64::MAX, i64::MIN); (last_row - first_row + 1) as usize];
    line_points(a, b, |p| {
        let e = &mut extents[(i64::from(p.y) - first_row) as usize];
        e.0 = e.0.min(i64::from(p.x));
        e.1 = e.1.max(i64::from(p.x));
    });
    for y in 0..coverage.height() {
        let top = (y - hi + 1).max(first_row);
        let bottom = (y - lo).min(last_row);
        if top > bottom {
            continue;
        }
        let (t, b) = (
            extents[(top - first_row) as usize],
            extents[(bottom - first_row) as usize],
        );
        coverage.add(y, t.0.min(b.0) + lo, t.1.max(b.1) + hi);
    }
}

fn rect(target: &mut PixelBuffer, area: Rectangle, style: &Style) {
    if area.is_empty() {
        return;
    }
    let clipped_rows = area.intersection(&target.bounding_box());
    if let Some(fill) = style.fill {
        for y in clipped_rows.ys() {
            target.blend_span(y, area.min_x(), area.max_x(), fill);
        }
    }
    if let Some(stroke) = style.stroke {
        let s = saturate(i64::from(style.stroke_width));
        let left_end = area.min_x().saturating_add(s).min(area.max_x());
        let right_start = area.max_x().saturating_sub(s).max(left_end);
        for y in clipped_rows.ys() {
            if y < area.min_y().saturating_add(s) || y >= area.max_y().saturating_sub(s) {
                target.blend_span(y, area.min_x(), area.max_x(), stroke);
            } else {
                target.blend_span(y, area.min_x(), left_end, stroke);
                target.blend_span(y, right_start, area.max_x(), stroke);
            }
        }
    }
}

/// The span `[start, end)` of row `y` whose pixel centers fall inside the
/// ellipse inscribed in `bounds`, if any.
///
/// Works in doubled coordinates: a pixel center `(x + 1/2, y + 1/2)` becomes
/// `(2x + 1, 2y + 1)` and the semi-axes become the full width and height.
fn ellipse_span(bounds: &Rectangle, y: ICoordinate) -> Option<(ICoordinate, ICoordinate)> {
    if bounds.is_empty() || y < bounds.min_y() || y >= bounds.max_y() {
        return None;
    }
    let w = i128::from(bounds.width());
    let h = i128::from(bounds.height());
    let cx = 2 * i128::from(bounds.min_x()) + w;
    let cy = 2 * i128::from(bounds.min_y()) + h;
    let dy = 2 * i128::from(y) + 1 - cy;
    let limit = w * w * h * h;
    let inside = |x: i64| {
        let dx = 2 * i128::from(x) + 1 - cx;
        dx * dx * h * h + dy * dy * w * w <= limit
    };
    // The row is symmetric around the center, so find the leftmost inside
    // pixel and mirror it.
    let center_x = (cx - 1).div_euclid(2) as i64;
    if !inside(center_x) {
        return None;
    }
    let (mut lo, mut hi) = (i64::from(bounds.min_x()), center_x);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if inside(mid) {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }
    let end = 2 * i64::from(bounds.min_x()) + i64::from(bounds.width()) - lo;
    Some((saturate(lo), saturate(end)))
}

fn ellipse(target: &mut PixelBuffer, bounds: Rectangle, style: &Style) {
    if bounds.is_empty() {
        return;
    }
    let rows = bounds.intersection(&target.bounding_box());
    if let Some(fill) = style.fill {
        for y in rows.ys() {
            if let Some((start, end)) = ellipse_span(&bounds, y) {
                target.blend_span(y, start, end, fill);
            }
        }
    }
    if let Some(stroke) = style.stroke {
        let s = style.stroke_width.min(bounds.width()).min(bounds.height());
        let ring = 2 * u64::from(s);
        let inner = if u64::from(bounds.width()) > ring && u64::from(bounds.height()) > ring {
            Rectangle::new(
                Point::new(
                    saturate(i64::from(bounds.min_x()) + i64::from(s)),
                    saturate(i64::from(bounds.min_y()) + i64::from(s)),
                ),
                Size::new(bounds.width() - 2 * s, bounds.height() - 2 * s),
            )
        } else {
            Rectangle::empty()
        };
        for y in rows.ys() {
            let Some((start, end)) = ellipse_span(&bounds, y) else {
                continue;
            };
            match ellipse_span(&inner, y) {
                Some((hole_start, hole_end)) => {
                    target.blend_span(y, start, hole_start, stroke);
                    target.blend_span(y, hole_end, end, stroke);
                }
                None => target.blend_span(y, start, end, stroke),
            }
        }
    }
}

/// `ceil(n / d)` for positive `d`.
fn ceil_div(n: i128, d: i128) -> i128 {
    -(-n).div_euclid(d)
}

/// Even-odd scanline fill sampled at pixel centers.
fn polygon(target: &mut PixelBuffer, path: &[Point], style: &Style) {
    if let Some(fill) = style.fill {
        let min_y = path.iter().map(|p| p.y).min().unwrap_or(0).max(0);
        let max_y = path
            .iter()
            .map(|p| p.y)
            .max()
            .unwrap_or(0)
            .min(saturate(i64::from(target.height())));
        let mut crossings = Vec::new();
        for y in min_y..max_y {
            crossings.clear();
            for (i, &p0) in path.iter().enumerate() {
                let p1 = path[(i + 1) % path.len()];
                if !((p0.y <= y && y < p1.y) || (p1.y <= y && y < p0.y)) {
                    continue;
                }
                // Crossing of the edge with the row's center line, as n / d.
                let (x0, y0) = (i128::from(p0.x), i128::from(p0.y));
                let (x1, y1) = (i128::from(p1.x), i128::from(p1.y));
                let mut n = 2 * x0 * (y1 - y0) + (2 * i128::from(y) + 1 - 2 * y0) * (x1 - x0);
                let mut d = 2 * (y1 - y0);
                if d < 0 {
                    n = -n;
                    d = -d;
                }
                // First pixel whose center is at or right of the crossing.
                let boundary = ceil_div(2 * n - d, 2 * d);
                crossings.push(boundary.clamp(
                    i128::from(ICoordinate::MIN),
                    i128::from(ICoordinate::MAX),
                ) as ICoordinate);
            }
            crossings.sort_unstable();
            for pair in crossings.chunks_exact(2) {
                target.blend_span(y, pair[0], pair[1], fill);
            }
        }
    }
    if let Some(stroke) = style.stroke {
        let mut coverage = Coverage::new(target);
        for (i, &p0) in path.iter().enumerate() {
            let p1 = path[(i + 1) % path.len()];
            stroke_segment(&mut coverage, p0, p1, style.stroke_width);
        }
        coverage.paint(target, stroke);
    }
}

/// Paints `text` as 8x8 glyphs scaled by `scale`, with the bottom of the
/// glyph cells on `baseline`. Characters outside ASCII come out blank.
/// Only the glyph cells that overlap `target` are visited.
fn draw_glyphs(
    target: &mut PixelBuffer,
    text: &str,
    left: ICoordinate,
    baseline: ICoordinate,
    color: Color,
    scale: UCoordinate,
) {
    use font8x8::legacy::{BASIC_LEGACY, NOTHING_TO_DISPLAY};

    let (width, height) = (i64::from(target.width()), i64::from(target.height()));
    let scale = i64::from(scale);
    let advance = i64::from(GLYPH_WIDTH) * scale;
    let top = i64::from(baseline) - i64::from(GLYPH_HEIGHT) * scale;
    if top >= height || i64::from(baseline) <= 0 {
        return;
    }
    for (i, c) in text.chars().enumerate() {
        let cell_left = i64::from(left).saturating_add((i as i64).saturating_mul(advance));
        if cell_left >= width {
            break;
        }
        if cell_left.saturating_add(advance) <= 0 {
            continue;
        }
        let glyph = BASIC_LEGACY.get(c as usize).unwrap_or(&NOTHING_TO_DISPLAY);
        for (row, bits) in glyph.iter().enumerate() {
            let y0 = top + row as i64 * scale;
            let rows = y0.max(0)..(y0 + scale).min(height);
            if rows.is_empty() {
                continue;
            }
            for column in 0..i64::from(GLYPH_WIDTH) {
                if ((bits >> column) & 1) == 0 {
                    continue;
                }
                let x0 = cell_left + column * scale;
                let (start, end) = (saturate(x0.max(0)), saturate((x0 + scale).min(width)));
                for y in rows.clone() {
                    target.blend_span(y as ICoordinate, start, end, color);
                }
            }
        }
    }
}
