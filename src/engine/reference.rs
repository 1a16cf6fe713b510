//! An in-process engine that behaves like the native one from the pipeline's point of view:
//! it only ever shows its current state, advances one step per released snapshot, and never
//! says when it is done.
//!
//! Generation carves a maze with a recursive backtracker over a lattice of rooms, each room a
//! `block_length` square separated from its neighbours by one wall cell. A search floods the
//! carved maze breadth first or depth first, one visited cell per step.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use bit_set::BitSet;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use smallvec::SmallVec;

use crate::cells::{Cartesian2DCoordinate, CellCode};
use crate::errors::*;
use crate::grid_dimensions::GridDimensions;
use crate::units::BlockLength;

use super::{SearchAlgorithm, SnapshotEngine, SnapshotPort};

/// Releases the final frame survives before the engine goes idle.
pub const DEFAULT_LINGER: usize = 400;

type Step = SmallVec<[(usize, CellCode); 8]>;

/// Precomputed frames: a starting grid plus one edit list per release.
#[derive(Debug)]
struct Tape {
    current: Vec<CellCode>,
    steps: Vec<Step>,
    cursor: usize,
    linger: usize,
    lingered: usize,
}

impl Tape {
    fn new(start: Vec<CellCode>, steps: Vec<Step>, linger: usize) -> Tape {
        Tape {
            current: start,
            steps,
            cursor: 0,
            linger,
            lingered: 0,
        }
    }

    fn is_idle(&self) -> bool {
        self.cursor == self.steps.len() && self.lingered > self.linger
    }

    fn advance(&mut self) {
        if self.cursor < self.steps.len() {
            for &(index, code) in self.steps[self.cursor].iter() {
                self.current[index] = code;
            }
            self.cursor += 1;
        } else {
            self.lingered = self.lingered.saturating_add(1);
        }
    }
}

type SharedTape = Arc<Mutex<Option<Tape>>>;

fn lock(tape: &SharedTape) -> Result<MutexGuard<Option<Tape>>> {
    tape.lock().map_err(|_| ErrorKind::EngineCallFailure(String::from("engine state poisoned")).into())
}

pub struct ReferenceEngine {
    rng: StdRng,
    linger: usize,
    maze: Option<(GridDimensions, Vec<CellCode>)>,
    tape: SharedTape,
}

impl ReferenceEngine {
    pub fn new() -> ReferenceEngine {
        ReferenceEngine::from_rng(StdRng::from_entropy())
    }

    pub fn with_seed(seed: u64) -> ReferenceEngine {
        ReferenceEngine::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> ReferenceEngine {
        ReferenceEngine {
            rng,
            linger: DEFAULT_LINGER,
            maze: None,
            tape: Arc::new(Mutex::new(None)),
        }
    }

    /// How many releases the last frame is repeated for before the engine reports nothing.
    pub fn linger(mut self, releases: usize) -> ReferenceEngine {
        self.linger = releases;
        self
    }

    /// The fully carved maze of the last `init`.
    pub fn maze(&self) -> Option<&[CellCode]> {
        self.maze.as_ref().map(|&(_, ref cells)| &cells[..])
    }
}

impl Default for ReferenceEngine {
    fn default() -> ReferenceEngine {
        ReferenceEngine::new()
    }
}

impl SnapshotEngine for ReferenceEngine {
    fn init(&mut self, dimensions: GridDimensions, block_length: BlockLength) -> Result<()> {
        let lattice = RoomLattice::new(dimensions, block_length)?;
        let steps = lattice.carve(&mut self.rng);

        let mut maze = vec![CellCode::Wall; dimensions.size()];
        for step in &steps {
            for &(index, code) in step.iter() {
                maze[index] = code;
            }
        }
        debug!("reference engine carved {} rooms in a {} grid", lattice.rooms(), dimensions);

        *lock(&self.tape)? = Some(Tape::new(vec![CellCode::Wall; dimensions.size()], steps, self.linger));
        self.maze = Some((dimensions, maze));
        Ok(())
    }

    fn start_search(&mut self,
                    origin: Cartesian2DCoordinate,
                    target: Cartesian2DCoordinate,
                    algorithm: SearchAlgorithm)
                    -> Result<()> {
        let (dimensions, maze) = match self.maze {
            Some((dimensions, ref maze)) => (dimensions, maze),
            None => bail!(ErrorKind::EngineNotInitialized),
        };
        let passable = |coord: Cartesian2DCoordinate| {
            dimensions.index_of(coord).map_or(false, |i| maze[i] != CellCode::Wall)
        };
        for endpoint in &[origin, target] {
            if !passable(*endpoint) {
                bail!(ErrorKind::InvalidEndpoint(endpoint.x, endpoint.y));
            }
        }

        let mut start = maze.clone();
        let (steps, reached) = flood(dimensions, maze, origin, target, algorithm);
        if let Some(i) = dimensions.index_of(origin) {
            start[i] = CellCode::Open;
        }
        debug!("reference {} search visits {} cells, target reached: {}", algorithm, steps.len() + 1, reached);

        *lock(&self.tape)? = Some(Tape::new(start, steps, self.linger));
        Ok(())
    }

    fn teardown(&mut self) -> Result<()> {
        *lock(&self.tape)? = None;
        self.maze = None;
        Ok(())
    }

    fn snapshot_port(&self) -> Arc<dyn SnapshotPort> {
        Arc::new(ReferencePort { tape: self.tape.clone() })
    }
}

struct ReferencePort {
    tape: SharedTape,
}

impl SnapshotPort for ReferencePort {
    fn pull_snapshot(&self, buffer: &mut [CellCode]) -> Result<()> {
        let tape = lock(&self.tape)?;
        match *tape {
            Some(ref tape) if !tape.is_idle() => {
                if buffer.len() != tape.current.len() {
                    bail!(ErrorKind::MalformedSnapshot(tape.current.len(), buffer.len()));
                }
                buffer.copy_from_slice(&tape.current);
            }
            _ => {
                for cell in buffer.iter_mut() {
                    *cell = CellCode::Empty;
                }
            }
        }
        Ok(())
    }

    fn release_snapshot(&self) -> Result<()> {
        let mut tape = lock(&self.tape)?;
        if let Some(ref mut tape) = *tape {
            tape.advance();
        }
        Ok(())
    }
}

/// Rooms sit at `pitch * i + 1` for `pitch = block_length + 1`, leaving a one cell wall
/// between neighbours and around the border.
struct RoomLattice {
    dimensions: GridDimensions,
    block: usize,
    pitch: usize,
    across: usize,
    down: usize,
}

impl RoomLattice {
    fn new(dimensions: GridDimensions, block_length: BlockLength) -> Result<RoomLattice> {
        let block = block_length.0.max(1);
        let pitch = block + 1;
        let across = (dimensions.length() - 1) / pitch;
        let down = (dimensions.width() - 1) / pitch;
        if across == 0 || down == 0 {
            bail!(ErrorKind::InvalidDimensions(dimensions.length(), dimensions.width()));
        }
        Ok(RoomLattice { dimensions, block, pitch, across, down })
    }

    fn rooms(&self) -> usize {
        self.across * self.down
    }

    fn room_cells(&self, room: usize, step: &mut Step) {
        let (rx, ry) = (room % self.across, room / self.across);
        let (x0, y0) = (self.pitch * rx + 1, self.pitch * ry + 1);
        for y in y0..y0 + self.block {
            for x in x0..x0 + self.block {
                step.push((y * self.dimensions.length() + x, CellCode::Empty));
            }
        }
    }

    /// The wall strip between two orthogonally adjacent rooms.
    fn passage_cells(&self, from: usize, to: usize, step: &mut Step) {
        let (a, b) = (from.min(to), from.max(to));
        let (ax, ay) = (a % self.across, a / self.across);
        let length = self.dimensions.length();
        if b == a + 1 {
            let x = self.pitch * (ax + 1);
            for y in self.pitch * ay + 1..self.pitch * ay + 1 + self.block {
                step.push((y * length + x, CellCode::Empty));
            }
        } else {
            let y = self.pitch * (ay + 1);
            for x in self.pitch * ax + 1..self.pitch * ax + 1 + self.block {
                step.push((y * length + x, CellCode::Empty));
            }
        }
    }

    fn neighbours(&self, room: usize) -> SmallVec<[usize; 4]> {
        let (rx, ry) = (room % self.across, room / self.across);
        let mut found = SmallVec::new();
        if rx > 0 {
            found.push(room - 1);
        }
        if rx + 1 < self.across {
            found.push(room + 1);
        }
        if ry > 0 {
            found.push(room - self.across);
        }
        if ry + 1 < self.down {
            found.push(room + self.across);
        }
        found
    }

    /// Recursive backtracker, one step per newly carved room.
    fn carve<R: Rng>(&self, rng: &mut R) -> Vec<Step> {
        let mut visited = BitSet::with_capacity(self.rooms());
        let mut steps = Vec::with_capacity(self.rooms());

        let first = rng.gen_range(0..self.rooms());
        visited.insert(first);
        let mut step = Step::new();
        self.room_cells(first, &mut step);
        steps.push(step);

        let mut stack = vec![first];
        while let Some(&room) = stack.last() {
            let unvisited: SmallVec<[usize; 4]> = self.neighbours(room)
                .into_iter()
                .filter(|n| !visited.contains(*n))
                .collect();
            if unvisited.is_empty() {
                stack.pop();
                continue;
            }
            let next = unvisited[rng.gen_range(0..unvisited.len())];
            visited.insert(next);

            let mut step = Step::new();
            self.passage_cells(room, next, &mut step);
            self.room_cells(next, &mut step);
            steps.push(step);
            stack.push(next);
        }
        steps
    }
}

/// Visit passable cells from `origin` until `target` is marked, one marked cell per step.
/// Returns the steps and whether the target was reached.
fn flood(dimensions: GridDimensions,
         maze: &[CellCode],
         origin: Cartesian2DCoordinate,
         target: Cartesian2DCoordinate,
         algorithm: SearchAlgorithm)
         -> (Vec<Step>, bool) {
    let mut steps = Vec::new();
    if origin == target {
        return (steps, true);
    }

    let mut visited = BitSet::with_capacity(dimensions.size());
    let mut frontier = VecDeque::new();
    if let Some(i) = dimensions.index_of(origin) {
        visited.insert(i);
    }
    frontier.push_back(origin);

    loop {
        let cell = match algorithm {
            SearchAlgorithm::Bfs => frontier.pop_front(),
            SearchAlgorithm::Dfs => frontier.pop_back(),
        };
        let cell = match cell {
            Some(cell) => cell,
            None => return (steps, false),
        };

        for neighbour in cell.neighbours(&dimensions) {
            let index = match dimensions.index_of(neighbour) {
                Some(index) => index,
                None => continue,
            };
            if maze[index] == CellCode::Wall || visited.contains(index) {
                continue;
            }
            visited.insert(index);
            let mut step = Step::new();
            step.push((index, CellCode::Open));
            steps.push(step);
            if neighbour == target {
                return (steps, true);
            }
            frontier.push_back(neighbour);
        }
    }
}
