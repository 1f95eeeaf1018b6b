// SPDX-License-Identifier: MPL-2.0

//! Touch classification against the surface bounds.

/// Tolerance, in surface units, for both tap matching and the center zone.
pub const EPSILON: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Surface rectangle; `right` and `bottom` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Bounds {
    #[must_use]
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Bounds of a surface of the given size anchored at the origin.
    #[must_use]
    pub fn from_size(width: u32, height: u32) -> Self {
        let clamp = |v: u32| i32::try_from(v).unwrap_or(i32::MAX);
        Self::new(0, 0, clamp(width), clamp(height))
    }

    /// Integer midpoint, rounded toward negative infinity.
    #[must_use]
    pub fn center(&self) -> Point {
        let mid = |a: i32, b: i32| ((i64::from(a) + i64::from(b)) >> 1) as f64;
        Point::new(mid(self.left, self.right), mid(self.top, self.bottom))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quadrant {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Quadrant {
    pub const ALL: [Quadrant; 4] = [
        Quadrant::TopLeft,
        Quadrant::TopRight,
        Quadrant::BottomLeft,
        Quadrant::BottomRight,
    ];

    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Quadrant::TopLeft => 0,
            Quadrant::TopRight => 1,
            Quadrant::BottomLeft => 2,
            Quadrant::BottomRight => 3,
        }
    }

    /// Quadrant of `point` relative to `center`.
    ///
    /// Only strictly smaller coordinates count as left/top, so points on a
    /// center line land on the right/bottom side.
    #[must_use]
    pub fn of(point: Point, center: Point) -> Self {
        match (point.x < center.x, point.y < center.y) {
            (true, true) => Quadrant::TopLeft,
            (false, true) => Quadrant::TopRight,
            (true, false) => Quadrant::BottomLeft,
            (false, false) => Quadrant::BottomRight,
        }
    }
}

/// Where a dragged finger asks the character to look.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gaze {
    Center,
    Quadrant(Quadrant),
}

fn within_epsilon(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}

/// Whether a down/up pair is close enough on both axes to count as a tap.
#[must_use]
pub fn is_tap(down: Point, up: Point) -> bool {
    within_epsilon(down.x, up.x) && within_epsilon(down.y, up.y)
}

#[must_use]
pub fn near_center(point: Point, bounds: Bounds) -> bool {
    let center = bounds.center();
    within_epsilon(point.x, center.x) && within_epsilon(point.y, center.y)
}

/// Classifies a move; the center zone wins over the quadrant split.
#[must_use]
pub fn classify_move(point: Point, bounds: Bounds) -> Gaze {
    if near_center(point, bounds) {
        Gaze::Center
    } else {
        Gaze::Quadrant(Quadrant::of(point, bounds.center()))
    }
}
