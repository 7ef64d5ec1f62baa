use std::sync::Arc;

use snafu::ensure;

use crate::prelude::*;

use super::buffer::PixelBuffer;

/// Widest brush accepted for lines and polygon outlines. The brush is walked
/// along the segment, so its width bounds the work per command.
pub const MAX_LINE_WIDTH: UCoordinate = 1 << 16;

/// How a closed shape is painted.
///
/// The fill covers every pixel whose center lies inside the shape. The
/// stroke covers the pixels within `stroke_width` of the boundary and is
/// painted after the fill.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct Style {
    pub fill: Option<Color>,
    pub stroke: Option<Color>,
    pub stroke_width: UCoordinate,
}

impl Default for Style {
    fn default() -> Self {
        Self::stroke(Color::BLACK)
    }
}

impl Style {
    pub const fn stroke(color: Color) -> Self {
        Self {
            fill: None,
            stroke: Some(color),
            stroke_width: 1,
        }
    }
    pub const fn fill(color: Color) -> Self {
        Self {
            fill: Some(color),
            stroke: None,
            stroke_width: 1,
        }
    }
    pub const fn fill_and_stroke(fill: Color, stroke: Color) -> Self {
        Self {
            fill: Some(fill),
            stroke: Some(stroke),
            stroke_width: 1,
        }
    }
    pub const fn set_stroke_width(mut self, stroke_width: UCoordinate) -> Self {
        self.stroke_width = stroke_width;
        self
    }
}

/// One drawing primitive. Built by the drawing methods, rasterized at once
/// and then dropped.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum DrawCommand {
    Point {
        at: Point,
        color: Color,
    },
    Line {
        from: Point,
        to: Point,
        color: Color,
        width: UCoordinate,
    },
    Rect {
        left: ICoordinate,
        top: ICoordinate,
        width: ICoordinate,
        height: ICoordinate,
        style: Style,
    },
    /// The ellipse inscribed in the given bounding box.
    Ellipse {
        left: ICoordinate,
        top: ICoordinate,
        width: ICoordinate,
        height: ICoordinate,
        style: Style,
    },
    /// An implicitly closed path; repeating the first vertex at the end is
    /// allowed and ignored. Filled with the even-odd rule.
    Polygon {
        vertices: Vec<Point>,
        style: Style,
    },
    /// 8x8 bitmap glyphs scaled by `scale`, sitting on `baseline`.
    Text {
        text: String,
        left: ICoordinate,
        baseline: ICoordinate,
        color: Color,
        scale: UCoordinate,
    },
    Image {
        origin: Point,
        image: Arc<PixelBuffer>,
    },
}

impl DrawCommand {
    /// Rejects geometry that cannot be rasterized. Geometry that merely
    /// falls outside the target is fine and gets clipped.
    pub fn validate(&self) -> Result<()> {
        match self {
            DrawCommand::Point { .. } | DrawCommand::Image { .. } => Ok(()),
            DrawCommand::Line { width, .. } => {
                ensure!(
                    *width > 0,
                    InvalidGeometrySnafu {
                        reason: "line width must be at least 1",
                    }
                );
                ensure!(
                    *width <= MAX_LINE_WIDTH,
                    InvalidGeometrySnafu {
                        reason: format!("line width {width} exceeds {MAX_LINE_WIDTH}"),
                    }
                );
                Ok(())
            }
            DrawCommand::Rect {
                width,
                height,
                style,
                ..
            }
            | DrawCommand::Ellipse {
                width,
                height,
                style,
                ..
            } => {
                ensure!(
                    *width >= 0 && *height >= 0,
                    InvalidGeometrySnafu {
                        reason: format!("negative dimensions {width}x{height}"),
                    }
                );
                validate_style(style)
            }
            DrawCommand::Polygon { vertices, style } => {
                let path = closed_path(vertices);
                ensure!(
                    path.len() >= 3,
                    InvalidGeometrySnafu {
                        reason: format!("a polygon needs 3 vertices, got {}", path.len()),
                    }
                );
                ensure!(
                    style.stroke.is_none() || style.stroke_width <= MAX_LINE_WIDTH,
                    InvalidGeometrySnafu {
                        reason: format!(
                            "outline width {} exceeds {MAX_LINE_WIDTH}",
                            style.stroke_width
                        ),
                    }
                );
                validate_style(style)
            }
            DrawCommand::Text { scale, .. } => {
                ensure!(
                    *scale > 0,
                    InvalidGeometrySnafu {
                        reason: "text scale must be at least 1",
                    }
                );
                Ok(())
            }
        }
    }
}

fn validate_style(style: &Style) -> Result<()> {
    ensure!(
        style.stroke.is_none() || style.stroke_width > 0,
        InvalidGeometrySnafu {
            reason: "stroke width must be at least 1",
        }
    );
    Ok(())
}

/// The vertices of an implicitly closed path, without a trailing copy of the
/// first vertex.
pub(crate) fn closed_path(vertices: &[Point]) -> &[Point] {
    match vertices {
        [first, rest @ .., last] if !rest.is_empty() && first == last => {
            &vertices[..vertices.len() - 1]
        }
        _ => vertices,
    }
}

/// Anything that accepts drawing commands.
///
/// Every provided method builds a [`DrawCommand`] and hands it to
/// [`Draw::draw`], so implementors only decide where the pixels land.
pub trait Draw {
    /// Validates and rasterizes one command.
    fn draw(&mut self, command: DrawCommand) -> Result<()>;

    /// Overwrites every pixel.
    fn clear(&mut self, color: Color);

    fn set_pixel(&mut self, x: ICoordinate, y: ICoordinate, color: Color) -> Result<()> {
        self.draw(DrawCommand::Point {
            at: Point::new(x, y),
            color,
        })
    }

    fn draw_line(&mut self, from: Point, to: Point, color: Color) -> Result<()> {
        self.draw_line_with_width(from, to, color, 1)
    }

    fn draw_line_with_width(
        &mut self,
        from: Point,
        to: Point,
        color: Color,
        width: UCoordinate,
    ) -> Result<()> {
        self.draw(DrawCommand::Line {
            from,
            to,
            color,
            width,
        })
    }

    fn draw_rect(
        &mut self,
        left: ICoordinate,
        top: ICoordinate,
        width: ICoordinate,
        height: ICoordinate,
        style: Style,
    ) -> Result<()> {
        self.draw(DrawCommand::Rect {
            left,
            top,
            width,
            height,
            style,
        })
    }

    fn fill_rect(
        &mut self,
        left: ICoordinate,
        top: ICoordinate,
        width: ICoordinate,
        height: ICoordinate,
        color: Color,
    ) -> Result<()> {
        self.draw_rect(left, top, width, height, Style::fill(color))
    }

    fn draw_ellipse(
        &mut self,
        left: ICoordinate,
        top: ICoordinate,
        width: ICoordinate,
        height: ICoordinate,
        style: Style,
    ) -> Result<()> {
        self.draw(DrawCommand::Ellipse {
            left,
            top,
            width,
            height,
            style,
        })
    }

    fn draw_polygon(&mut self, vertices: &[Point], style: Style) -> Result<()> {
        self.draw(DrawCommand::Polygon {
            vertices: vertices.to_vec(),
            style,
        })
    }

    fn draw_text(
        &mut self,
        text: &str,
        left: ICoordinate,
        baseline: ICoordinate,
        color: Color,
    ) -> Result<()> {
        self.draw_text_scaled(text, left, baseline, color, 1)
    }

    fn draw_text_scaled(
        &mut self,
        text: &str,
        left: ICoordinate,
        baseline: ICoordinate,
        color: Color,
        scale: UCoordinate,
    ) -> Result<()> {
        self.draw(DrawCommand::Text {
            text: text.to_owned(),
            left,
            baseline,
            color,
            scale,
        })
    }

    fn draw_image(&mut self, origin: Point, image: Arc<PixelBuffer>) -> Result<()> {
        self.draw(DrawCommand::Image { origin, image })
    }
}

impl Draw for PixelBuffer {
    fn draw(&mut self, command: DrawCommand) -> Result<()> {
        super::raster::rasterize(self, &command)
    }

    fn clear(&mut self, color: Color) {
        self.fill(color);
    }
}

#[cfg(test)]
mod tests {
    use super::{closed_path, DrawCommand, Style, MAX_LINE_WIDTH};
    use crate::graphics::{Color, Point};

    fn polygon(vertices: &[(i32, i32)]) -> DrawCommand {
        DrawCommand::Polygon {
            vertices: vertices.iter().map(|&(x, y)| Point::new(x, y)).collect(),
            style: Style::fill(Color::RED),
        }
    }

    #[test]
    fn trailing_copy_of_first_vertex_is_dropped() {
        let open = [Point::new(0, 0), Point::new(4, 0), Point::new(0, 4)];
        let mut closed = open.to_vec();
        closed.push(Point::new(0, 0));
        assert_eq!(closed_path(&closed), &open[..]);
        assert_eq!(closed_path(&open), &open[..]);
    }

    #[test]
    fn degenerate_polygons_are_rejected() {
        assert!(polygon(&[]).validate().is_err());
        assert!(polygon(&[(0, 0), (1, 1)]).validate().is_err());
        assert!(polygon(&[(0, 0), (1, 1), (0, 0)]).validate().is_err());
        assert!(polygon(&[(0, 0), (1, 1), (0, 2)]).validate().is_ok());
    }

    #[test]
    fn negative_dimensions_are_rejected() {
        let rect = DrawCommand::Rect {
            left: 0,
            top: 0,
            width: -1,
            height: 3,
            style: Style::default(),
        };
        assert!(rect.validate().is_err());
        let empty = DrawCommand::Ellipse {
            left: 0,
            top: 0,
            width: 0,
            height: 0,
            style: Style::default(),
        };
        assert!(empty.validate().is_ok());
    }

    #[test]
    fn zero_widths_are_rejected() {
        let line = DrawCommand::Line {
            from: Point::zero(),
            to: Point::new(3, 3),
            color: Color::BLACK,
            width: 0,
        };
        assert!(line.validate().is_err());
        let rect = DrawCommand::Rect {
            left: 0,
            top: 0,
            width: 2,
            height: 2,
            style: Style::stroke(Color::BLACK).set_stroke_width(0),
        };
        assert!(rect.validate().is_err());
    }

    #[test]
    fn oversized_brushes_are_rejected_for_lines_only() {
        let line = |width| DrawCommand::Line {
            from: Point::zero(),
            to: Point::new(3, 3),
            color: Color::BLACK,
            width,
        };
        assert!(line(MAX_LINE_WIDTH).validate().is_ok());
        assert!(line(MAX_LINE_WIDTH + 1).validate().is_err());
        let outline = DrawCommand::Polygon {
            vertices: vec![Point::zero(), Point::new(4, 0), Point::new(0, 4)],
            style: Style::stroke(Color::BLACK).set_stroke_width(u32::MAX),
        };
        assert!(outline.validate().is_err());
        let ring = DrawCommand::Ellipse {
            left: 0,
            top: 0,
            width: 4,
            height: 4,
            style: Style::stroke(Color::BLACK).set_stroke_width(u32::MAX),
        };
        assert!(ring.validate().is_ok());
    }
}
