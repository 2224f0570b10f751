use serde::Serialize;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Axis-aligned rectangle in client coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn center(&self) -> Point {
        Point::new(
            self.x + (self.width / 2) as i32,
            self.y + (self.height / 2) as i32,
        )
    }

    pub fn offset(self, by: Point) -> Self {
        Self {
            x: self.x + by.x,
            y: self.y + by.y,
            ..self
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= 0
            && point.y >= 0
            && (point.x as u32) < self.width
            && (point.y as u32) < self.height
    }

    /// Maps fractional coordinates (0.0..=1.0 on each axis) to a pixel.
    /// `1.0` lands on the last row or column.
    pub fn scale(&self, fx: f64, fy: f64) -> Point {
        Point::new(
            scale_axis(fx, self.width),
            scale_axis(fy, self.height),
        )
    }
}

fn scale_axis(fraction: f64, extent: u32) -> i32 {
    let last = extent.saturating_sub(1) as f64;
    (fraction * extent as f64).round().clamp(0.0, last) as i32
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Captured client-area frame. Pixel data is shared, so clones are cheap.
#[derive(Clone, PartialEq, Eq)]
pub struct Screenshot {
    pub resolution: Resolution,
    pub pixels: Arc<[u8]>,
}

impl Screenshot {
    pub fn new(resolution: Resolution, pixels: impl Into<Arc<[u8]>>) -> Self {
        Self {
            resolution,
            pixels: pixels.into(),
        }
    }
}

impl fmt::Debug for Screenshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Screenshot")
            .field("resolution", &self.resolution)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

/// Where a template was found on screen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MatchResult {
    pub rect: Rect,
    pub confidence: f32,
}

impl MatchResult {
    pub fn center(&self) -> Point {
        self.rect.center()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_center_and_offset() {
        let rect = Rect::new(10, 20, 30, 40);
        assert_eq!(rect.center(), Point::new(25, 40));
        assert_eq!(rect.offset(Point::new(5, 5)).center(), Point::new(30, 45));
        assert!(Rect::new(0, 0, 0, 3).is_empty());
    }

    #[test]
    fn test_resolution_bounds() {
        let res = Resolution::new(1920, 1080);
        assert!(res.contains(Point::new(0, 0)));
        assert!(res.contains(Point::new(1919, 1079)));
        assert!(!res.contains(Point::new(1920, 10)));
        assert!(!res.contains(Point::new(-1, 10)));
        assert_eq!(res.scale(0.5, 0.5), Point::new(960, 540));
        assert_eq!(res.scale(1.0, 1.0), Point::new(1919, 1079));
        assert_eq!(res.scale(0.0, 1.0), Point::new(0, 1079));
        assert!(res.contains(res.scale(1.0, 1.0)));
    }
}
