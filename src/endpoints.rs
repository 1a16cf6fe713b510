//! Picking search endpoints on a finished maze, and the placeholder maze used when the engine
//! produced nothing.

use rand::Rng;

use crate::cells::{Cartesian2DCoordinate, CellCode};
use crate::grid::LogicalGrid;
use crate::grid_dimensions::GridDimensions;

const PAIR_ATTEMPTS: usize = 100;
const FARTHEST_SAMPLE: usize = 50;
const PLACEHOLDER_WALL_PERCENT: u32 = 25;

#[derive(Eq, PartialEq, Copy, Clone, Debug)]
pub struct Endpoints {
    pub start: Cartesian2DCoordinate,
    pub end: Cartesian2DCoordinate,
}

impl Endpoints {
    pub fn new(start: Cartesian2DCoordinate, end: Cartesian2DCoordinate) -> Endpoints {
        Endpoints { start, end }
    }

    /// Corner-ish defaults for a grid with nowhere better to go.
    pub fn fallback(dimensions: GridDimensions) -> Endpoints {
        let far = Cartesian2DCoordinate::new(dimensions.length().saturating_sub(2) as u32,
                                             dimensions.width().saturating_sub(2) as u32);
        Endpoints::new(Cartesian2DCoordinate::new(1, 1), far).clamped(dimensions)
    }

    pub fn clamped(self, dimensions: GridDimensions) -> Endpoints {
        Endpoints::new(dimensions.clamp(self.start), dimensions.clamp(self.end))
    }

    pub fn distance(&self) -> f32 {
        self.start.euclidean_distance(self.end)
    }
}

/// Every in-grid orthogonal neighbour is a wall.
pub fn is_trapped(grid: &LogicalGrid, cell: Cartesian2DCoordinate) -> bool {
    let neighbours = cell.neighbours(&grid.dimensions());
    !neighbours.is_empty() && neighbours.iter().all(|n| grid.get(*n) == Some(CellCode::Wall))
}

/// Choose a start and end on walkable cells, at least `diagonal * distance_coefficient` apart
/// when random pairs allow it, otherwise the farthest of a random sample.
pub fn choose_endpoints<R: Rng>(grid: &LogicalGrid, distance_coefficient: f32, rng: &mut R) -> Endpoints {
    let dimensions = grid.dimensions();
    let walkable = grid.walkable_cells();
    if walkable.len() < 2 {
        warn!("only {} walkable cells, using default endpoints", walkable.len());
        return Endpoints::fallback(dimensions);
    }

    let min_distance = dimensions.diagonal() * distance_coefficient;
    let chosen = random_pair_at_least(&walkable, min_distance, rng).unwrap_or_else(|| {
        debug!("no random pair {:.1} apart, sampling for the farthest pair", min_distance);
        farthest_sampled_pair(&walkable, rng)
    });

    untrapped(grid, chosen, &walkable, rng).clamped(dimensions)
}

fn random_pair_at_least<R: Rng>(walkable: &[Cartesian2DCoordinate],
                                min_distance: f32,
                                rng: &mut R)
                                -> Option<Endpoints> {
    (0..PAIR_ATTEMPTS)
        .filter_map(|_| {
            let (a, b) = (rng.gen_range(0..walkable.len()), rng.gen_range(0..walkable.len()));
            if a == b {
                None
            } else {
                Some(Endpoints::new(walkable[a], walkable[b]))
            }
        })
        .find(|pair| pair.distance() >= min_distance)
}

fn farthest_sampled_pair<R: Rng>(walkable: &[Cartesian2DCoordinate], rng: &mut R) -> Endpoints {
    let sample = FARTHEST_SAMPLE.min(walkable.len());
    let mut best = Endpoints::new(walkable[0], walkable[1]);
    let mut best_distance = 0.0;
    for _ in 0..sample {
        let start = walkable[rng.gen_range(0..walkable.len())];
        for _ in 0..sample {
            let candidate = Endpoints::new(start, walkable[rng.gen_range(0..walkable.len())]);
            if candidate.distance() > best_distance {
                best_distance = candidate.distance();
                best = candidate;
            }
        }
    }
    best
}

fn untrapped<R: Rng>(grid: &LogicalGrid,
                     mut endpoints: Endpoints,
                     walkable: &[Cartesian2DCoordinate],
                     rng: &mut R)
                     -> Endpoints {
    if !is_trapped(grid, endpoints.start) && !is_trapped(grid, endpoints.end) {
        return endpoints;
    }
    let free: Vec<Cartesian2DCoordinate> = walkable.iter()
        .cloned()
        .filter(|c| !is_trapped(grid, *c))
        .collect();
    let mut replacement = |trapped: Cartesian2DCoordinate| {
        if free.is_empty() {
            warn!("every walkable cell is walled in, keeping {}", trapped);
            trapped
        } else {
            let picked = free[rng.gen_range(0..free.len())];
            warn!("endpoint {} is walled in, moved to {}", trapped, picked);
            picked
        }
    };
    if is_trapped(grid, endpoints.start) {
        endpoints.start = replacement(endpoints.start);
    }
    if is_trapped(grid, endpoints.end) {
        endpoints.end = replacement(endpoints.end);
    }
    endpoints
}

/// A random grid with roughly a quarter walls, never walling the cells in `keep_clear`.
pub fn placeholder_maze<R: Rng>(dimensions: GridDimensions,
                                keep_clear: &[Cartesian2DCoordinate],
                                rng: &mut R)
                                -> LogicalGrid {
    let mut grid = LogicalGrid::new(dimensions);
    for coord in dimensions.iter() {
        if rng.gen_range(0..100) < PLACEHOLDER_WALL_PERCENT && !keep_clear.contains(&coord) {
            grid.set(coord, CellCode::Wall);
        }
    }
    grid
}

#[cfg(test)]
mod tests {

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::units::{ColumnLength, RowLength};

    fn dims(l: usize, w: usize) -> GridDimensions {
        GridDimensions::new(RowLength(l), ColumnLength(w)).unwrap()
    }

    fn gc(x: u32, y: u32) -> Cartesian2DCoordinate {
        Cartesian2DCoordinate::new(x, y)
    }

    #[test]
    fn open_grids_get_distant_endpoints() {
        let grid = LogicalGrid::new(dims(30, 30));
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..20 {
            let chosen = choose_endpoints(&grid, 0.67, &mut rng);
            assert!(grid.is_walkable(chosen.start));
            assert!(grid.is_walkable(chosen.end));
            assert_ne!(chosen.start, chosen.end);
            assert!(chosen.distance() > 15.0, "{:?}", chosen);
        }
    }

    #[test]
    fn crowded_grids_fall_back_to_defaults() {
        let d = dims(6, 5);
        let mut grid = LogicalGrid::new(d);
        for coord in d.iter() {
            grid.set(coord, CellCode::Wall);
        }
        grid.set(gc(2, 2), CellCode::Empty);
        let chosen = choose_endpoints(&grid, 0.67, &mut StdRng::seed_from_u64(1));
        assert_eq!(chosen, Endpoints::new(gc(1, 1), gc(4, 3)));
    }

    #[test]
    fn trapped_cells() {
        let d = dims(3, 3);
        let mut grid = LogicalGrid::new(d);
        for coord in &[gc(1, 0), gc(0, 1), gc(2, 1), gc(1, 2)] {
            grid.set(*coord, CellCode::Wall);
        }
        assert!(is_trapped(&grid, gc(1, 1)));
        assert!(is_trapped(&grid, gc(0, 0)));
        assert!(!is_trapped(&grid, gc(1, 0)));
    }

    #[test]
    fn endpoints_avoid_walled_in_cells() {
        // two open corridors plus one sealed pocket at (4,4)
        let d = dims(9, 9);
        let mut grid = LogicalGrid::new(d);
        for coord in d.iter() {
            if coord.y != 0 && coord.y != 8 {
                grid.set(coord, CellCode::Wall);
            }
        }
        grid.set(gc(4, 4), CellCode::Empty);
        let mut rng = StdRng::seed_from_u64(4);
        for _ in 0..20 {
            let chosen = choose_endpoints(&grid, 0.0, &mut rng);
            assert_ne!(chosen.start, gc(4, 4));
            assert_ne!(chosen.end, gc(4, 4));
        }
    }

    #[test]
    fn placeholder_keeps_endpoints_clear() {
        let d = dims(40, 40);
        let keep = [gc(1, 1), gc(8, 8)];
        let grid = placeholder_maze(d, &keep, &mut StdRng::seed_from_u64(12));
        assert!(keep.iter().all(|c| grid.is_walkable(*c)));
        let walls = grid.count(CellCode::Wall) as f32 / d.size() as f32;
        assert!(walls > 0.15 && walls < 0.35, "{}", walls);
    }
}
