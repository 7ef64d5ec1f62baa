pub mod buffer;
pub mod codec;
pub mod command;
pub mod raster;

use core::ops::{Add, Sub};

pub type ICoordinate = i32;
pub type UCoordinate = u32;

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct Point {
    pub x: ICoordinate,
    pub y: ICoordinate,
}

impl Point {
    pub const fn zero() -> Self {
        Self::new(0, 0)
    }
    pub const fn new(x: ICoordinate, y: ICoordinate) -> Self {
        Self { x, y }
    }
}

impl Add for Point {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct Size {
    pub width: UCoordinate,
    pub height: UCoordinate,
}

impl Size {
    pub const fn zero() -> Self {
        Self::new(0, 0)
    }
    pub const fn new(width: UCoordinate, height: UCoordinate) -> Self {
        Self { width, height }
    }
    pub const fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

const fn far_edge(start: ICoordinate, length: UCoordinate) -> ICoordinate {
    let end = start as i64 + length as i64;
    if end > ICoordinate::MAX as i64 {
        ICoordinate::MAX
    } else {
        end as ICoordinate
    }
}

/// Axis-aligned, half-open pixel rectangle.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
pub struct Rectangle {
    top_left: Point,
    size: Size,
}

impl Rectangle {
    pub const fn empty() -> Self {
        Self {
            top_left: Point::zero(),
            size: Size::zero(),
        }
    }
    pub const fn new(top_left: Point, size: Size) -> Self {
        Self { top_left, size }
    }
    pub const fn contains(&self, p: &Point) -> bool {
        self.min_x() <= p.x && p.x < self.max_x() && self.min_y() <= p.y && p.y < self.max_y()
    }
    pub const fn min_x(&self) -> ICoordinate {
        self.top_left.x
    }
    pub const fn min_y(&self) -> ICoordinate {
        self.top_left.y
    }
    /// Exclusive right edge, saturated at `ICoordinate::MAX`.
    pub const fn max_x(&self) -> ICoordinate {
        far_edge(self.top_left.x, self.size.width)
    }
    /// Exclusive bottom edge, saturated at `ICoordinate::MAX`.
    pub const fn max_y(&self) -> ICoordinate {
        far_edge(self.top_left.y, self.size.height)
    }
    pub const fn top_left(&self) -> Point {
        self.top_left
    }
    pub const fn size(&self) -> Size {
        self.size
    }
    pub const fn width(&self) -> UCoordinate {
        self.size.width
    }
    pub const fn height(&self) -> UCoordinate {
        self.size.height
    }
    pub const fn is_empty(&self) -> bool {
        self.size.is_empty()
    }
    pub fn xs(&self) -> impl Iterator<Item = ICoordinate> {
        self.min_x()..self.max_x()
    }
    pub fn ys(&self) -> impl Iterator<Item = ICoordinate> {
        self.min_y()..self.max_y()
    }
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Self {
        let min_x = self.min_x().max(other.min_x());
        let max_x = self.max_x().min(other.max_x());
        let min_y = self.min_y().max(other.min_y());
        let max_y = self.max_y().min(other.max_y());
        if min_x <= max_x && min_y <= max_y {
            Self::new(
                Point::new(min_x, min_y),
                Size::new(
                    (i64::from(max_x) - i64::from(min_x)) as UCoordinate,
                    (i64::from(max_y) - i64::from(min_y)) as UCoordinate,
                ),
            )
        } else {
            Self::empty()
        }
    }
}

/// Straight (non-premultiplied) RGBA color.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

impl Color {
    pub const BLACK: Color = Color::new(0, 0, 0);
    pub const WHITE: Color = Color::new(255, 255, 255);
    pub const RED: Color = Color::new(255, 0, 0);
    pub const GREEN: Color = Color::new(0, 255, 0);
    pub const BLUE: Color = Color::new(0, 0, 255);
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self::rgba(r, g, b, u8::MAX)
    }
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
    pub const fn gray_scale(v: u8) -> Self {
        Self::new(v, v, v)
    }
    pub const fn is_opaque(&self) -> bool {
        self.a == u8::MAX
    }
    #[must_use]
    pub const fn with_alpha(self, a: u8) -> Self {
        Self::rgba(self.r, self.g, self.b, a)
    }

    /// Source-over compositing of `self` onto `dst`:
    /// `dst = src * alpha + dst * (1 - alpha)`, rounded to nearest.
    #[must_use]
    pub fn over(self, dst: Color) -> Color {
        match self.a {
            u8::MAX => self,
            0 => dst,
            alpha => {
                let alpha = u32::from(alpha);
                let mix = |src: u8, dst: u8| {
                    ((u32::from(src) * alpha + u32::from(dst) * (255 - alpha) + 127) / 255) as u8
                };
                let a = alpha + (u32::from(dst.a) * (255 - alpha) + 127) / 255;
                Color::rgba(
                    mix(self.r, dst.r),
                    mix(self.g, dst.g),
                    mix(self.b, dst.b),
                    a as u8,
                )
            }
        }
    }
}
