//! Window geometry primitives
//!
//! Rectangles follow the X11 convention: `right()` and `bottom()` are the
//! last pixel inside the rectangle, i.e. `x + width - 1`.

/// Window geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Geometry {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Geometry {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Last column inside the rectangle.
    pub fn right(&self) -> i32 {
        self.x.saturating_add_unsigned(self.width).saturating_sub(1)
    }

    /// Last row inside the rectangle.
    pub fn bottom(&self) -> i32 {
        self.y.saturating_add_unsigned(self.height).saturating_sub(1)
    }

    /// Set the rectangle from two inclusive corners.
    pub fn set_coords(&mut self, left: i32, top: i32, right: i32, bottom: i32) {
        self.x = left;
        self.y = top;
        self.width = span(left, right);
        self.height = span(top, bottom);
    }

    pub fn set_pos(&mut self, x: i32, y: i32) {
        self.x = x;
        self.y = y;
    }

    pub fn set_size(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && x <= self.right() && y >= self.y && y <= self.bottom()
    }

    pub fn intersects(&self, other: &Geometry) -> bool {
        self.x <= other.right()
            && other.x <= self.right()
            && self.y <= other.bottom()
            && other.y <= self.bottom()
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Pixels from `first` to `last` inclusive, empty when reversed
fn span(first: i32, last: i32) -> u32 {
    (i64::from(last) - i64::from(first) + 1).clamp(0, i64::from(u32::MAX)) as u32
}

/// Space the frame adds around the client on each side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Margin {
    pub top: u32,
    pub bottom: u32,
    pub left: u32,
    pub right: u32,
}

impl Margin {
    pub fn uniform(width: u32) -> Self {
        Self {
            top: width,
            bottom: width,
            left: width,
            right: width,
        }
    }

    pub fn horizontal(&self) -> u32 {
        self.left + self.right
    }

    pub fn vertical(&self) -> u32 {
        self.top + self.bottom
    }
}

/// Corner held fixed while a rectangle is resized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}
