use crate::core::geo::Point;
use serde::{Deserialize, Serialize};

/// Represents a bounding box in screen/pixel coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Point,
    pub max: Point,
}

impl Bounds {
    /// Creates new bounds from two points
    pub fn new(min: Point, max: Point) -> Self {
        Self { min, max }
    }

    /// Creates bounds from individual coordinates
    pub fn from_coords(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self::new(Point::new(min_x, min_y), Point::new(max_x, max_y))
    }

    /// Creates bounds from a screen size anchored at the origin
    pub fn from_size(width: f64, height: f64) -> Self {
        Self::from_coords(0.0, 0.0, width, height)
    }

    /// Gets the width of the bounds
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    /// Gets the height of the bounds
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    /// Gets the center point of the bounds
    pub fn center(&self) -> Point {
        Point::new(
            (self.min.x + self.max.x) / 2.0,
            (self.min.y + self.max.y) / 2.0,
        )
    }

    /// Checks if the bounds contain a point
    pub fn contains(&self, point: &Point) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
    }

    /// Returns a new bounds expanded by the given amount on every side
    pub fn expanded(&self, amount: f64) -> Bounds {
        Bounds::new(
            Point::new(self.min.x - amount, self.min.y - amount),
            Point::new(self.max.x + amount, self.max.y + amount),
        )
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::new(Point::new(0.0, 0.0), Point::new(0.0, 0.0))
    }
}

/// Axis-aligned rectangle in screen pixels, `left/top` being the minimum corner.
///
/// Overlap tests are strict: rectangles that only touch along an edge do not collide.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl ScreenRect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.left + self.width / 2.0, self.top + self.height / 2.0)
    }

    /// True when the two rectangles overlap once each is grown by `gap / 2`.
    pub fn overlaps(&self, other: &ScreenRect, gap: f64) -> bool {
        let half = gap.max(0.0) / 2.0;
        self.left - half < other.right() + half
            && other.left - half < self.right() + half
            && self.top - half < other.bottom() + half
            && other.top - half < self.bottom() + half
    }

    /// Checks whether the rectangle lies entirely inside `bounds`
    pub fn is_inside(&self, bounds: &Bounds) -> bool {
        self.left >= bounds.min.x
            && self.top >= bounds.min.y
            && self.right() <= bounds.max.x
            && self.bottom() <= bounds.max.y
    }
}
