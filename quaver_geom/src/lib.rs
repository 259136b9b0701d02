// Plain 2D geometry for score interpretation.
//
// Points, axis-aligned rectangles, and line segments in page coordinates
// (f64 pixels, y growing downward as in scanned images). Everything the
// interpretation engines measure — anchor points, lookup regions, gaps
// between symbols, distance to a stem — is built from these three types.
//
// This crate is the single geometry vocabulary used across the entire
// quaver project: `quaver_interpret` expresses every threshold as a
// fraction of the staff interline and converts to pixels at the last
// moment, so all functions here stay unit-agnostic.
//
// **Critical constraint: determinism.** Comparisons go through `total_cmp`
// or explicit epsilon-free arithmetic; no function here may consult any
// source of non-determinism. Identical inputs must give identical outputs
// across platforms, since link selection depends on exact tie-breaks.

use serde::{Deserialize, Serialize};

/// A point in page coordinates (pixels, y downward).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Point translated by (dx, dy).
    pub fn translated(self, dx: f64, dy: f64) -> Point {
        Point::new(self.x + dx, self.y + dy)
    }
}

/// Which horizontal side of a symbol (left or right edge).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HorizontalSide {
    Left,
    Right,
}

impl HorizontalSide {
    pub const BOTH: [HorizontalSide; 2] = [HorizontalSide::Left, HorizontalSide::Right];

    /// Unit direction along x: -1 for Left, +1 for Right.
    pub fn direction(self) -> f64 {
        match self {
            HorizontalSide::Left => -1.0,
            HorizontalSide::Right => 1.0,
        }
    }

    pub fn opposite(self) -> HorizontalSide {
        match self {
            HorizontalSide::Left => HorizontalSide::Right,
            HorizontalSide::Right => HorizontalSide::Left,
        }
    }
}

/// Which vertical side of a symbol (top or bottom edge).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VerticalSide {
    Top,
    Bottom,
}

impl VerticalSide {
    pub const BOTH: [VerticalSide; 2] = [VerticalSide::Top, VerticalSide::Bottom];

    /// Unit direction along y (page coordinates): -1 for Top, +1 for Bottom.
    pub fn direction(self) -> f64 {
        match self {
            VerticalSide::Top => -1.0,
            VerticalSide::Bottom => 1.0,
        }
    }

    pub fn opposite(self) -> VerticalSide {
        match self {
            VerticalSide::Top => VerticalSide::Bottom,
            VerticalSide::Bottom => VerticalSide::Top,
        }
    }
}

/// An axis-aligned rectangle (x, y = top-left corner; y downward).
///
/// Width and height are kept non-negative by construction helpers; an empty
/// rectangle (zero width or height) intersects nothing.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    /// Rectangle spanning two corner points, in any order.
    pub fn from_corners(a: Point, b: Point) -> Self {
        let x = a.x.min(b.x);
        let y = a.y.min(b.y);
        Self::new(x, y, (a.x - b.x).abs(), (a.y - b.y).abs())
    }

    /// Smallest rectangle containing every point. None if the slice is empty.
    pub fn bounding(points: &[Point]) -> Option<Rect> {
        let first = points.first()?;
        let (mut x0, mut y0, mut x1, mut y1) = (first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            x0 = x0.min(p.x);
            y0 = y0.min(p.y);
            x1 = x1.max(p.x);
            y1 = y1.max(p.y);
        }
        Some(Rect::new(x0, y0, x1 - x0, y1 - y0))
    }

    pub fn left(&self) -> f64 {
        self.x
    }

    pub fn right(&self) -> f64 {
        self.x + self.w
    }

    pub fn top(&self) -> f64 {
        self.y
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.h
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    /// Midpoint of the left edge. The standard partner-side reference for
    /// symbols approached from their left (e.g. a head seen from an
    /// accidental).
    pub fn center_left(&self) -> Point {
        Point::new(self.x, self.y + self.h / 2.0)
    }

    /// Midpoint of the right edge.
    pub fn center_right(&self) -> Point {
        Point::new(self.x + self.w, self.y + self.h / 2.0)
    }

    /// Point at the given side's edge, at mid-height.
    pub fn side_point(&self, side: HorizontalSide) -> Point {
        match side {
            HorizontalSide::Left => self.center_left(),
            HorizontalSide::Right => self.center_right(),
        }
    }

    pub fn contains_point(&self, p: Point) -> bool {
        p.x >= self.left() && p.x <= self.right() && p.y >= self.top() && p.y <= self.bottom()
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.left() >= self.left()
            && other.right() <= self.right()
            && other.top() >= self.top()
            && other.bottom() <= self.bottom()
    }

    /// True if the interiors overlap. Touching edges do not count, so
    /// adjacent lookup boxes never both claim one partner.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.left() < other.right()
            && other.left() < self.right()
            && self.top() < other.bottom()
            && other.top() < self.bottom()
    }

    /// Overlap of the two x ranges, <= 0 when disjoint.
    pub fn x_overlap(&self, other: &Rect) -> f64 {
        self.right().min(other.right()) - self.left().max(other.left())
    }

    /// Overlap of the two y ranges, <= 0 when disjoint.
    pub fn y_overlap(&self, other: &Rect) -> f64 {
        self.bottom().min(other.bottom()) - self.top().max(other.top())
    }

    /// Rectangle grown by dx on each horizontal side and dy on each
    /// vertical side. Negative values shrink.
    pub fn grown(&self, dx: f64, dy: f64) -> Rect {
        Rect::new(
            self.x - dx,
            self.y - dy,
            (self.w + 2.0 * dx).max(0.0),
            (self.h + 2.0 * dy).max(0.0),
        )
    }

    pub fn translated(&self, dx: f64, dy: f64) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.w, self.h)
    }

    /// Smallest rectangle containing both.
    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.left().min(other.left());
        let y = self.top().min(other.top());
        Rect::new(
            x,
            y,
            self.right().max(other.right()) - x,
            self.bottom().max(other.bottom()) - y,
        )
    }

    pub fn area(&self) -> f64 {
        self.w * self.h
    }
}

/// A line segment, typically a stem or barline median line.
///
/// `p1` is the top end and `p2` the bottom end whenever the segment comes
/// from a vertical symbol; constructors normalize this so callers can rely
/// on `top()`/`bottom()`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineSeg {
    pub p1: Point,
    pub p2: Point,
}

impl LineSeg {
    /// New segment with endpoints ordered top-to-bottom.
    pub fn new(a: Point, b: Point) -> Self {
        if a.y <= b.y {
            Self { p1: a, p2: b }
        } else {
            Self { p1: b, p2: a }
        }
    }

    pub fn top(&self) -> Point {
        self.p1
    }

    pub fn bottom(&self) -> Point {
        self.p2
    }

    pub fn length(&self) -> f64 {
        self.p1.distance(self.p2)
    }

    pub fn midpoint(&self) -> Point {
        Point::new((self.p1.x + self.p2.x) / 2.0, (self.p1.y + self.p2.y) / 2.0)
    }

    /// x coordinate at the given y, clamping y to the segment's extent.
    /// For a horizontal segment this returns the left endpoint's x.
    pub fn x_at_y(&self, y: f64) -> f64 {
        let dy = self.p2.y - self.p1.y;
        if dy == 0.0 {
            return self.p1.x.min(self.p2.x);
        }
        let t = ((y - self.p1.y) / dy).clamp(0.0, 1.0);
        self.p1.x + t * (self.p2.x - self.p1.x)
    }

    /// y coordinate at the given x, clamping x to the segment's extent.
    /// For a vertical segment this returns the top endpoint's y.
    pub fn y_at_x(&self, x: f64) -> f64 {
        let dx = self.p2.x - self.p1.x;
        if dx == 0.0 {
            return self.p1.y.min(self.p2.y);
        }
        let t = ((x - self.p1.x) / dx).clamp(0.0, 1.0);
        self.p1.y + t * (self.p2.y - self.p1.y)
    }

    /// End point on the given vertical side.
    pub fn end(&self, side: VerticalSide) -> Point {
        match side {
            VerticalSide::Top => self.top(),
            VerticalSide::Bottom => self.bottom(),
        }
    }

    /// Shortest distance from a point to the segment.
    pub fn distance_to(&self, p: Point) -> f64 {
        let vx = self.p2.x - self.p1.x;
        let vy = self.p2.y - self.p1.y;
        let len2 = vx * vx + vy * vy;
        if len2 == 0.0 {
            return self.p1.distance(p);
        }
        let t = (((p.x - self.p1.x) * vx + (p.y - self.p1.y) * vy) / len2).clamp(0.0, 1.0);
        Point::new(self.p1.x + t * vx, self.p1.y + t * vy).distance(p)
    }

    /// Bounding box of the segment (degenerate when axis-aligned).
    pub fn bounds(&self) -> Rect {
        Rect::from_corners(self.p1, self.p2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_edges_and_centers() {
        let r = Rect::new(10.0, 20.0, 4.0, 6.0);
        assert_eq!(r.right(), 14.0);
        assert_eq!(r.bottom(), 26.0);
        assert_eq!(r.center(), Point::new(12.0, 23.0));
        assert_eq!(r.center_left(), Point::new(10.0, 23.0));
        assert_eq!(r.center_right(), Point::new(14.0, 23.0));
    }

    #[test]
    fn intersection_is_open() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(10.0, 0.0, 10.0, 10.0);
        // Touching edges do not intersect.
        assert!(!a.intersects(&b));
        let c = Rect::new(9.5, 9.5, 1.0, 1.0);
        assert!(a.intersects(&c));
    }

    #[test]
    fn overlaps_signed() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(6.0, 8.0, 10.0, 10.0);
        assert_eq!(a.x_overlap(&b), 4.0);
        assert_eq!(a.y_overlap(&b), 2.0);
        let far = Rect::new(20.0, 0.0, 5.0, 5.0);
        assert!(a.x_overlap(&far) < 0.0);
    }

    #[test]
    fn grown_clamps_to_empty() {
        let r = Rect::new(0.0, 0.0, 2.0, 2.0);
        let g = r.grown(1.0, -2.0);
        assert_eq!(g.w, 4.0);
        assert_eq!(g.h, 0.0);
    }

    #[test]
    fn bounding_box_of_points() {
        let pts = [
            Point::new(3.0, 1.0),
            Point::new(-1.0, 4.0),
            Point::new(2.0, 2.0),
        ];
        let r = Rect::bounding(&pts).unwrap();
        assert_eq!(r, Rect::new(-1.0, 1.0, 4.0, 3.0));
        assert!(Rect::bounding(&[]).is_none());
    }

    #[test]
    fn segment_orders_endpoints() {
        let s = LineSeg::new(Point::new(5.0, 30.0), Point::new(4.0, 10.0));
        assert_eq!(s.top(), Point::new(4.0, 10.0));
        assert_eq!(s.bottom(), Point::new(5.0, 30.0));
    }

    #[test]
    fn x_at_y_interpolates_and_clamps() {
        let s = LineSeg::new(Point::new(0.0, 0.0), Point::new(10.0, 10.0));
        assert_eq!(s.x_at_y(5.0), 5.0);
        assert_eq!(s.x_at_y(-100.0), 0.0);
        assert_eq!(s.x_at_y(100.0), 10.0);
    }

    #[test]
    fn y_at_x_interpolates_and_clamps() {
        // A slightly slanted beam median.
        let s = LineSeg::new(Point::new(0.0, 100.0), Point::new(40.0, 104.0));
        assert_eq!(s.y_at_x(20.0), 102.0);
        assert_eq!(s.y_at_x(-5.0), 100.0);
        assert_eq!(s.y_at_x(80.0), 104.0);
    }

    #[test]
    fn distance_to_segment() {
        let s = LineSeg::new(Point::new(0.0, 0.0), Point::new(0.0, 10.0));
        assert_eq!(s.distance_to(Point::new(3.0, 5.0)), 3.0);
        // Beyond the ends, distance is to the nearest endpoint.
        assert_eq!(s.distance_to(Point::new(0.0, -4.0)), 4.0);
    }

    #[test]
    fn sides_give_unit_directions() {
        assert_eq!(HorizontalSide::Left.direction(), -1.0);
        assert_eq!(VerticalSide::Bottom.direction(), 1.0);
        assert_eq!(VerticalSide::Top.opposite(), VerticalSide::Bottom);
    }

    #[test]
    fn serde_round_trip() {
        let r = Rect::new(1.0, 2.0, 3.0, 4.0);
        let json = serde_json::to_string(&r).unwrap();
        let back: Rect = serde_json::from_str(&json).unwrap();
        assert_eq!(r, back);
    }
}
