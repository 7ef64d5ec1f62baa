use snafu::ensure;

use crate::prelude::*;

use super::Rectangle;

const BYTES_PER_PIXEL: usize = 4;

/// Row-major grid of RGBA pixels.
///
/// Writes outside `[0, width) x [0, height)` are ignored and reads outside it
/// yield the buffer's background color. [`PixelBuffer::try_set`] and
/// [`PixelBuffer::pixel`] are the strict counterparts.
///
/// A buffer carries no synchronisation of its own; the canvas decides who
/// may touch it.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct PixelBuffer {
    buffer: Vec<u8>,
    size: Size,
    background: Color,
}

impl PixelBuffer {
    pub fn new(size: Size, background: Color) -> Self {
        let mut ret = Self {
            buffer: vec![0; size.area() * BYTES_PER_PIXEL],
            size,
            background,
        };
        ret.fill(background);
        ret
    }

    /// A fully transparent buffer, used as the source of image blits.
    pub fn transparent(size: Size) -> Self {
        Self::new(size, Color::TRANSPARENT)
    }

    /// Wraps tightly packed RGBA bytes.
    pub fn from_rgba(size: Size, rgba: Vec<u8>) -> Result<Self> {
        ensure!(
            rgba.len() == size.area() * BYTES_PER_PIXEL,
            InvalidGeometrySnafu {
                reason: format!(
                    "{} bytes cannot hold a {}x{} RGBA image",
                    rgba.len(),
                    size.width,
                    size.height
                ),
            }
        );
        Ok(Self {
            buffer: rgba,
            size,
            background: Color::TRANSPARENT,
        })
    }

    pub fn size(&self) -> Size {
        self.size
    }
    pub fn width(&self) -> UCoordinate {
        self.size.width
    }
    pub fn height(&self) -> UCoordinate {
        self.size.height
    }
    pub fn bounding_box(&self) -> Rectangle {
        Rectangle::new(Point::zero(), self.size)
    }
    pub fn background(&self) -> Color {
        self.background
    }
    pub fn set_background(&mut self, background: Color) {
        self.background = background;
    }

    /// Tightly packed RGBA bytes, row-major.
    pub fn as_rgba(&self) -> &[u8] {
        &self.buffer
    }

    fn offset_of_pixel(&self, p: Point) -> usize {
        (self.size.width as usize * p.y as usize + p.x as usize) * BYTES_PER_PIXEL
    }

    fn read_color(buf: &[u8]) -> Color {
        Color::rgba(buf[0], buf[1], buf[2], buf[3])
    }

    pub fn contains(&self, p: Point) -> bool {
        self.bounding_box().contains(&p)
    }

    /// The stored color, or `None` outside the buffer.
    pub fn pixel(&self, p: Point) -> Option<Color> {
        if !self.contains(p) {
            return None;
        }
        let offset = self.offset_of_pixel(p);
        Some(Self::read_color(
            &self.buffer[offset..(offset + BYTES_PER_PIXEL)],
        ))
    }

    /// The stored color, or the background color outside the buffer.
    pub fn get(&self, x: ICoordinate, y: ICoordinate) -> Color {
        self.pixel(Point::new(x, y)).unwrap_or(self.background)
    }

    fn set_unchecked(&mut self, p: Point, color: Color) {
        let offset = self.offset_of_pixel(p);
        self.buffer[offset..(offset + BYTES_PER_PIXEL)]
            .copy_from_slice(&[color.r, color.g, color.b, color.a]);
    }

    /// Overwrites one pixel; ignored outside the buffer.
    pub fn set(&mut self, x: ICoordinate, y: ICoordinate, color: Color) {
        let p = Point::new(x, y);
        if self.contains(p) {
            self.set_unchecked(p, color);
        }
    }

    pub fn try_set(&mut self, x: ICoordinate, y: ICoordinate, color: Color) -> Result<()> {
        let p = Point::new(x, y);
        ensure!(self.contains(p), OutOfBoundsSnafu { x, y });
        self.set_unchecked(p, color);
        Ok(())
    }

    /// Composites `color` over one pixel; ignored outside the buffer.
    pub fn blend(&mut self, x: ICoordinate, y: ICoordinate, color: Color) {
        let p = Point::new(x, y);
        if let Some(dst) = self.pixel(p) {
            self.set_unchecked(p, color.over(dst));
        }
    }

    /// Composites `color` over a horizontal run `[x0, x1)`, clipped.
    pub fn blend_span(&mut self, y: ICoordinate, x0: ICoordinate, x1: ICoordinate, color: Color) {
        if y < 0 || y >= self.size.height as ICoordinate {
            return;
        }
        let x0 = x0.max(0);
        let x1 = x1.min(self.size.width as ICoordinate);
        if x0 >= x1 {
            return;
        }
        if color.is_opaque() {
            let s = self.offset_of_pixel(Point::new(x0, y));
            let t = self.offset_of_pixel(Point::new(x1, y));
            let pattern = [color.r, color.g, color.b, color.a];
            for chunk in self.buffer[s..t].chunks_exact_mut(BYTES_PER_PIXEL) {
                chunk.copy_from_slice(&pattern);
            }
        } else {
            for x in x0..x1 {
                self.blend(x, y, color);
            }
        }
    }

    /// Overwrites every pixel.
    pub fn fill(&mut self, color: Color) {
        let pattern = [color.r, color.g, color.b, color.a];
        for chunk in self.buffer.chunks_exact_mut(BYTES_PER_PIXEL) {
            chunk.copy_from_slice(&pattern);
        }
    }

    /// Copies `source` wholesale. Both buffers must have the same size.
    pub(crate) fn copy_from(&mut self, source: &PixelBuffer) {
        debug_assert_eq!(self.size, source.size, "copy between mismatched buffers");
        self.buffer.copy_from_slice(&source.buffer);
    }

    /// A buffer of `size` holding the overlapping top-left region of `self`,
    /// the rest filled with the background color.
    #[must_use]
    pub fn resized(&self, size: Size) -> Self {
        let mut ret = Self::new(size, self.background);
        let common = self.bounding_box().intersection(&ret.bounding_box());
        let row_bytes = common.width() as usize * BYTES_PER_PIXEL;
        for y in common.ys() {
            let s = self.offset_of_pixel(Point::new(0, y));
            let d = ret.offset_of_pixel(Point::new(0, y));
            ret.buffer[d..(d + row_bytes)].copy_from_slice(&self.buffer[s..(s + row_bytes)]);
        }
        ret
    }

    /// Composites `source` with its top-left corner at `origin`, clipped to
    /// this buffer.
    pub fn draw_buffer(&mut self, origin: Point, source: &PixelBuffer) {
        let target = Rectangle::new(origin, source.size).intersection(&self.bounding_box());
        for y in target.ys() {
            for x in target.xs() {
                if let Some(c) = source.pixel(Point::new(x, y) - origin) {
                    self.blend(x, y, c);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::PixelBuffer;
    use crate::graphics::{Color, Point, Size};

    #[test]
    fn clear_then_get_returns_fill_color_everywhere() {
        let mut buffer = PixelBuffer::new(Size::new(7, 5), Color::WHITE);
        let c = Color::new(12, 34, 56);
        buffer.fill(c);
        for y in 0..5 {
            for x in 0..7 {
                assert_eq!(buffer.get(x, y), c, "pixel ({x}, {y})");
            }
        }
    }

    #[test]
    fn out_of_bounds_writes_are_ignored() {
        let mut buffer = PixelBuffer::new(Size::new(3, 3), Color::BLACK);
        let before = buffer.clone();
        buffer.set(-1, 0, Color::RED);
        buffer.set(3, 0, Color::RED);
        buffer.set(0, 3, Color::RED);
        buffer.blend(0, -1, Color::RED);
        assert_eq!(buffer, before);
    }

    #[test]
    fn out_of_bounds_reads_return_background() {
        let buffer = PixelBuffer::new(Size::new(3, 3), Color::BLUE);
        assert_eq!(buffer.get(-1, -1), Color::BLUE);
        assert_eq!(buffer.get(100, 1), Color::BLUE);
        assert_eq!(buffer.pixel(Point::new(3, 0)), None);
    }

    #[test]
    fn strict_set_reports_out_of_bounds() {
        let mut buffer = PixelBuffer::new(Size::new(2, 2), Color::BLACK);
        assert!(buffer.try_set(1, 1, Color::RED).is_ok());
        assert!(matches!(
            buffer.try_set(2, 0, Color::RED),
            Err(crate::prelude::Error::OutOfBounds { x: 2, y: 0 })
        ));
        assert_eq!(buffer.get(1, 1), Color::RED);
    }

    #[test]
    fn resized_keeps_overlap_and_fills_rest() {
        let mut buffer = PixelBuffer::new(Size::new(2, 2), Color::WHITE);
        buffer.set(1, 1, Color::RED);
        let grown = buffer.resized(Size::new(3, 3));
        assert_eq!(grown.get(1, 1), Color::RED);
        assert_eq!(grown.get(2, 2), Color::WHITE);
        let shrunk = grown.resized(Size::new(1, 1));
        assert_eq!(shrunk.size(), Size::new(1, 1));
        assert_eq!(shrunk.get(0, 0), Color::WHITE);
    }

    #[test]
    fn span_is_clipped() {
        let mut buffer = PixelBuffer::new(Size::new(4, 1), Color::BLACK);
        buffer.blend_span(0, -3, 2, Color::GREEN);
        assert_eq!(buffer.get(0, 0), Color::GREEN);
        assert_eq!(buffer.get(1, 0), Color::GREEN);
        assert_eq!(buffer.get(2, 0), Color::BLACK);
    }

    #[test]
    fn draw_buffer_skips_transparent_source_pixels() {
        let mut dest = PixelBuffer::new(Size::new(3, 3), Color::BLACK);
        let mut source = PixelBuffer::transparent(Size::new(2, 2));
        source.set(1, 1, Color::RED);
        dest.draw_buffer(Point::new(1, 1), &source);
        assert_eq!(dest.get(1, 1), Color::BLACK);
        assert_eq!(dest.get(2, 2), Color::RED);
    }

    #[test]
    fn rgba_length_is_validated() {
        assert!(PixelBuffer::from_rgba(Size::new(2, 2), vec![0; 15]).is_err());
        assert!(PixelBuffer::from_rgba(Size::new(2, 2), vec![0; 16]).is_ok());
    }
}
