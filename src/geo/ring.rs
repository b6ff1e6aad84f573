// src/geo/ring.rs
//! Even-odd ray casting against coordinate rings.

/// `[x, y]` pair: x is longitude, y is latitude.
pub type Point = [f64; 2];

/// Ordered closed sequence of points; index 0 of a polygon is the outer boundary.
pub type Ring = Vec<Point>;

/// Rings of one polygon (outer boundary first, then holes).
pub type Polygon = Vec<Ring>;

/// Parity of horizontal-ray crossings over edges `(i-1, i)`, wrapping at 0.
///
/// Points exactly on a horizontal edge's y never count as crossing it
/// (strict comparison on both vertical bounds).
pub fn point_in_ring(x: f64, y: f64, ring: &[Point]) -> bool {
    let n = ring.len();
    let mut inside = false;
    for i in 0..n {
        let j = (i + n - 1) % n;
        let [xi, yi] = ring[i];
        let [xj, yj] = ring[j];

        if (yi > y) != (yj > y) && x < xj + (y - yj) * (xi - xj) / (yi - yj) {
            inside = !inside;
        }
    }
    inside
}

/// True if the point lies inside ANY ring of the polygon.
///
/// Hole rings are not subtracted: a point inside a hole still matches,
/// because the hole ring itself contains it.
pub fn point_in_polygon(x: f64, y: f64, polygon: &[Ring]) -> bool {
    polygon.iter().any(|ring| point_in_ring(x, y, ring))
}
