//! Minimal planar geometry attached to features.
//!
//! Coordinates are in the national S-JTSK / Krovak system, already flipped
//! into the east/north quadrant (`x = -Y`, `y = -X`).

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Point {
    pub x: f64,
    pub y: f64,
}
impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", content = "coordinates"))]
pub enum Geometry {
    Point(Point),
    LineString(Vec<Point>),
    /// First ring is the exterior, any further rings are holes.
    Polygon(Vec<Vec<Point>>),
}
impl Geometry {
    /// Number of vertices, across all rings for polygons.
    pub fn num_points(&self) -> usize {
        match self {
            Self::Point(_) => 1,
            Self::LineString(points) => points.len(),
            Self::Polygon(rings) => rings.iter().map(Vec::len).sum(),
        }
    }

    /// Polygon area (exterior minus holes). Zero for points and lines.
    pub fn area(&self) -> f64 {
        match self {
            Self::Polygon(rings) => {
                let mut rings = rings.iter().map(|ring| ring_area(ring));
                let exterior = rings.next().unwrap_or_default();
                exterior - rings.sum::<f64>()
            },
            _ => 0.0,
        }
    }
}

/// Absolute shoelace area of a closed ring.
pub fn ring_area(ring: &[Point]) -> f64 {
    let twice: f64 = ring.windows(2).map(|w| w[0].x * w[1].y - w[1].x * w[0].y).sum();
    twice.abs() / 2.0
}
