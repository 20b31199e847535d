//! Polygon queries used for hull and landmass collision, backed by `geo`.
//!
//! Only this module knows about `geo`; the rest of the server works with
//! [`shared::Vector2`] point lists.

use geo::{Area, Contains, Coord, Intersects, Line, LineString, Point};
use shared::Vector2;

fn coord(v: Vector2) -> Coord<f64> {
    Coord { x: v.x, y: v.y }
}

/// Simple polygon without holes.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon(geo::Polygon<f64>);

impl Polygon {
    pub fn new(points: &[Vector2]) -> Polygon {
        let ring: Vec<Coord<f64>> = points.iter().copied().map(coord).collect();
        Polygon(geo::Polygon::new(LineString::new(ring), vec![]))
    }

    /// Vertices without the closing duplicate.
    pub fn points(&self) -> Vec<Vector2> {
        let ring = &self.0.exterior().0;
        let open = ring.len().saturating_sub(1);
        ring[..open].iter().map(|c| Vector2::new(c.x, c.y)).collect()
    }

    /// Positive for counter-clockwise vertex order.
    pub fn signed_area(&self) -> f64 {
        self.0.signed_area()
    }

    /// True when the polygons share any point: overlap, containment or touching edges.
    pub fn overlaps(&self, other: &Polygon) -> bool {
        self.0.intersects(&other.0)
    }

    /// Strict interior containment; points on the boundary are outside.
    pub fn contains_point(&self, p: Vector2) -> bool {
        self.0.contains(&Point::new(p.x, p.y))
    }

    pub fn intersects_segment(&self, start: Vector2, end: Vector2) -> bool {
        self.0.intersects(&Line::new(coord(start), coord(end)))
    }

    /// Maps every vertex through `f`.
    pub fn transformed(&self, f: impl Fn(Vector2) -> Vector2) -> Polygon {
        let points: Vec<Vector2> = self.points().into_iter().map(f).collect();
        Polygon::new(&points)
    }

    /// Distance of the farthest vertex from the origin.
    pub fn max_radius(&self) -> f64 {
        self.points()
            .iter()
            .map(Vector2::magnitude)
            .fold(0.0, f64::max)
    }
}
