use std::convert::From;
use std::fmt;

use smallvec::SmallVec;

use crate::grid_dimensions::GridDimensions;

/// State of one grid cell as reported by the maze engine.
///
/// The numeric values are the engine's wire codes and never change.
#[derive(Hash, Eq, PartialEq, Copy, Clone, Debug)]
#[repr(u8)]
pub enum CellCode {
    Empty = 0,
    /// A passage while building, a visited cell while searching.
    Open = 1,
    Wall = 2,
}

impl CellCode {
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Map a raw engine code back to a cell state, `None` for codes the engine never emits.
    pub fn from_code(code: u8) -> Option<CellCode> {
        match code {
            0 => Some(CellCode::Empty),
            1 => Some(CellCode::Open),
            2 => Some(CellCode::Wall),
            _ => None,
        }
    }
}

impl Default for CellCode {
    fn default() -> CellCode {
        CellCode::Empty
    }
}

#[derive(Hash, Eq, PartialEq, Copy, Clone, Debug, Ord, PartialOrd)]
pub struct Cartesian2DCoordinate {
    pub x: u32,
    pub y: u32,
}

impl Cartesian2DCoordinate {
    pub fn new(x: u32, y: u32) -> Cartesian2DCoordinate {
        Cartesian2DCoordinate { x, y }
    }

    /// Straight line distance, used when spreading search endpoints apart.
    pub fn euclidean_distance(&self, other: Cartesian2DCoordinate) -> f32 {
        let dx = self.x as f32 - other.x as f32;
        let dy = self.y as f32 - other.y as f32;
        (dx * dx + dy * dy).sqrt()
    }

    /// Orthogonal neighbours that lie inside the grid.
    pub fn neighbours(&self, dimensions: &GridDimensions) -> SmallVec<[Cartesian2DCoordinate; 4]> {
        ALL_DIRECTIONS.iter()
            .filter_map(|dir| self.offset(*dir, dimensions))
            .collect()
    }

    /// The coordinate one cell away in `dir`, `None` when that leaves the grid.
    pub fn offset(&self, dir: CompassPrimary, dimensions: &GridDimensions) -> Option<Cartesian2DCoordinate> {
        let (x, y) = (self.x, self.y);
        let moved = match dir {
            CompassPrimary::North => {
                if y > 0 {
                    Some(Cartesian2DCoordinate::new(x, y - 1))
                } else {
                    None
                }
            }
            CompassPrimary::South => Some(Cartesian2DCoordinate::new(x, y + 1)),
            CompassPrimary::East => Some(Cartesian2DCoordinate::new(x + 1, y)),
            CompassPrimary::West => {
                if x > 0 {
                    Some(Cartesian2DCoordinate::new(x - 1, y))
                } else {
                    None
                }
            }
        };
        moved.filter(|coord| dimensions.contains(*coord))
    }
}

impl From<(u32, u32)> for Cartesian2DCoordinate {
    fn from(x_y_pair: (u32, u32)) -> Cartesian2DCoordinate {
        Cartesian2DCoordinate::new(x_y_pair.0, x_y_pair.1)
    }
}

impl fmt::Display for Cartesian2DCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({},{})", self.x, self.y)
    }
}

#[derive(Eq, PartialEq, Copy, Clone, Debug)]
pub enum CompassPrimary {
    North,
    South,
    East,
    West,
}

pub const ALL_DIRECTIONS: [CompassPrimary; 4] = [CompassPrimary::North,
                                                 CompassPrimary::South,
                                                 CompassPrimary::East,
                                                 CompassPrimary::West];

#[cfg(test)]
mod tests {

    use itertools::Itertools;

    use super::*;
    use crate::units::{ColumnLength, RowLength};

    #[test]
    fn codes_round_trip_through_the_wire_values() {
        assert_eq!(CellCode::Wall.code(), 2);
        assert_eq!(CellCode::from_code(1), Some(CellCode::Open));
        assert_eq!(CellCode::from_code(7), None);
    }

    #[test]
    fn neighbour_cells() {
        let dims = GridDimensions::new(RowLength(10), ColumnLength(10)).unwrap();
        let gc = |x, y| Cartesian2DCoordinate::new(x, y);

        let check_expected_neighbours = |coord: Cartesian2DCoordinate, expected: &[Cartesian2DCoordinate]| {
            let found: Vec<Cartesian2DCoordinate> = coord.neighbours(&dims).iter().cloned().sorted().collect();
            let expected: Vec<Cartesian2DCoordinate> = expected.iter().cloned().sorted().collect();
            assert_eq!(found, expected);
        };

        // corners
        check_expected_neighbours(gc(0, 0), &[gc(1, 0), gc(0, 1)]);
        check_expected_neighbours(gc(9, 9), &[gc(9, 8), gc(8, 9)]);

        // side
        check_expected_neighbours(gc(0, 8), &[gc(1, 8), gc(0, 7), gc(0, 9)]);

        // inside the grid
        check_expected_neighbours(gc(1, 1), &[gc(0, 1), gc(1, 0), gc(2, 1), gc(1, 2)]);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = Cartesian2DCoordinate::new(0, 0);
        let b = Cartesian2DCoordinate::new(3, 4);
        assert_eq!(a.euclidean_distance(b), 5.0);
        assert_eq!(b.euclidean_distance(a), 5.0);
    }
}
