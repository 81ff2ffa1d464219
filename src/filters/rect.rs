//! Rectangle geometry for focal-point aware cropping
//!
//! Coordinates are floating point so crop boxes can be positioned and
//! scaled before being rounded to whole pixels.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Build a rect of the given size centred on `(x, y)`
    pub fn from_point(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(
            x - width / 2.0,
            y - height / 2.0,
            x + width / 2.0,
            y + height / 2.0,
        )
    }

    /// Rect covering a whole `width` x `height` image
    pub fn of_size(width: u32, height: u32) -> Self {
        Self::new(0.0, 0.0, width as f64, height as f64)
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    pub fn centroid(&self) -> (f64, f64) {
        (
            (self.left + self.right) / 2.0,
            (self.top + self.bottom) / 2.0,
        )
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Self {
        Self::new(
            self.left + dx,
            self.top + dy,
            self.right + dx,
            self.bottom + dy,
        )
    }

    /// Shift this rect (without resizing) so it lies inside `bounds`
    ///
    /// A rect larger than `bounds` ends up aligned to the far edge.
    pub fn move_to_clamp(&self, bounds: &Rect) -> Self {
        let mut rect = *self;

        if rect.left < bounds.left {
            rect.right += bounds.left - rect.left;
            rect.left = bounds.left;
        }
        if rect.top < bounds.top {
            rect.bottom += bounds.top - rect.top;
            rect.top = bounds.top;
        }
        if rect.right > bounds.right {
            rect.left -= rect.right - bounds.right;
            rect.right = bounds.right;
        }
        if rect.bottom > bounds.bottom {
            rect.top -= rect.bottom - bounds.bottom;
            rect.bottom = bounds.bottom;
        }

        rect
    }

    /// Shift this rect (without resizing) so it covers `other` entirely,
    /// where its size allows
    pub fn move_to_cover(&self, other: &Rect) -> Self {
        let dx = if self.left > other.left {
            other.left - self.left
        } else if self.right < other.right {
            other.right - self.right
        } else {
            0.0
        };

        let dy = if self.top > other.top {
            other.top - self.top
        } else if self.bottom < other.bottom {
            other.bottom - self.bottom
        } else {
            0.0
        };

        self.translate(dx, dy)
    }

    pub fn round(&self) -> Self {
        Self::new(
            self.left.round(),
            self.top.round(),
            self.right.round(),
            self.bottom.round(),
        )
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Rect(left: {}, top: {}, right: {}, bottom: {})",
            self.left, self.top, self.right, self.bottom
        )
    }
}
