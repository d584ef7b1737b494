//! Grid-based coordinate key for geocode deduplication.

use serde::{Deserialize, Serialize};

/// Scale factor mapping degrees onto the integer grid (0.01° resolution).
const GRID_SCALE: f64 = 100.0;

/// A coordinate rounded onto a fixed 0.01° grid (~1.1 km at the equator).
///
/// Grid cells are the dedup key for reverse geocoding: every aggregate whose
/// coordinate rounds to the same cell shares one cache row and at most one
/// queue row. Integer components make the key safe for equality comparison
/// and SQLite primary keys, which float coordinates are not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridCell {
    /// Latitude scaled by 100 and rounded.
    pub lat: i32,
    /// Longitude scaled by 100 and rounded.
    pub lon: i32,
}

impl GridCell {
    /// Round a precise coordinate pair onto the grid.
    pub fn from_coords(latitude: f64, longitude: f64) -> Self {
        Self {
            lat: (latitude * GRID_SCALE).round() as i32,
            lon: (longitude * GRID_SCALE).round() as i32,
        }
    }
}

impl std::fmt::Display for GridCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.lat, self.lon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearby_coordinates_share_a_cell() {
        let a = GridCell::from_coords(45.001, 9.001);
        let b = GridCell::from_coords(45.004, 9.003);
        assert_eq!(a, GridCell { lat: 4500, lon: 900 });
        assert_eq!(a, b);
    }

    #[test]
    fn rounding_is_to_nearest_not_truncation() {
        assert_eq!(GridCell::from_coords(45.006, 9.0).lat, 4501);
        assert_eq!(GridCell::from_coords(44.994, 9.0).lat, 4499);
    }

    #[test]
    fn negative_coordinates_round_symmetrically() {
        assert_eq!(
            GridCell::from_coords(-33.868, 151.209),
            GridCell { lat: -3387, lon: 15121 }
        );
    }
}
