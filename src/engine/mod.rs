//! The seam to the maze engine.
//!
//! The engine is split along the line its contract draws: `SnapshotEngine` holds the calls
//! that are only safe on the owning thread (init, start a search, teardown) and lives inside
//! the `MainThreadExecutor`; `SnapshotPort` holds the two calls the engine documents as safe
//! to make from a polling thread (pull the current snapshot, release it). An engine binding
//! for another native library has to re-verify that split before implementing the traits.

use std::fmt;
use std::sync::Arc;

use crate::cells::{Cartesian2DCoordinate, CellCode};
use crate::errors::*;
use crate::grid_dimensions::GridDimensions;
use crate::units::BlockLength;

pub mod reference;
#[cfg(test)]
pub mod scripted;

#[derive(Eq, PartialEq, Copy, Clone, Debug, Hash, Deserialize)]
pub enum SearchAlgorithm {
    #[serde(alias = "dfs", alias = "DFS")]
    Dfs,
    #[serde(alias = "bfs", alias = "BFS")]
    Bfs,
}

impl Default for SearchAlgorithm {
    fn default() -> SearchAlgorithm {
        SearchAlgorithm::Bfs
    }
}

impl fmt::Display for SearchAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            SearchAlgorithm::Dfs => write!(f, "DFS"),
            SearchAlgorithm::Bfs => write!(f, "BFS"),
        }
    }
}

/// Owning-thread half of the engine. Not required to be `Send`.
pub trait SnapshotEngine {
    /// Build a fresh maze; generation snapshots start flowing through the port.
    fn init(&mut self, dimensions: GridDimensions, block_length: BlockLength) -> Result<()>;

    /// Search the current maze; search snapshots replace the generation ones.
    fn start_search(&mut self,
                    origin: Cartesian2DCoordinate,
                    target: Cartesian2DCoordinate,
                    algorithm: SearchAlgorithm)
                    -> Result<()>;

    /// Release all engine state.
    fn teardown(&mut self) -> Result<()>;

    fn snapshot_port(&self) -> Arc<dyn SnapshotPort>;
}

/// Polling half of the engine, callable from a producer thread.
pub trait SnapshotPort: Send + Sync {
    /// Fill `buffer` (length * width cells, row-major) with the engine's current snapshot.
    /// There is no end-of-stream signal; an idle engine leaves the buffer `Empty`.
    fn pull_snapshot(&self, buffer: &mut [CellCode]) -> Result<()>;

    /// Free the engine's scratch copy of the last pulled snapshot.
    fn release_snapshot(&self) -> Result<()>;
}

/// Caller-side wrapper that remembers whether the engine holds a maze, so teardown can be
/// requested any number of times and only reaches the engine once per init.
pub struct EngineBinding {
    engine: Box<dyn SnapshotEngine>,
    dimensions: Option<GridDimensions>,
    teardowns: usize,
}

impl EngineBinding {
    pub fn new(engine: Box<dyn SnapshotEngine>) -> EngineBinding {
        EngineBinding {
            engine,
            dimensions: None,
            teardowns: 0,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.dimensions.is_some()
    }

    pub fn dimensions(&self) -> Option<GridDimensions> {
        self.dimensions
    }

    /// Number of teardowns that actually reached the engine.
    pub fn teardowns(&self) -> usize {
        self.teardowns
    }

    pub fn init(&mut self,
                dimensions: GridDimensions,
                block_length: BlockLength)
                -> Result<Arc<dyn SnapshotPort>> {
        if self.is_initialized() {
            self.teardown()?;
        }
        info!("initialising maze engine for a {} grid", dimensions);
        self.engine
            .init(dimensions, block_length)
            .chain_err(|| ErrorKind::EngineCallFailure(format!("init {}", dimensions)))?;
        self.dimensions = Some(dimensions);
        Ok(self.engine.snapshot_port())
    }

    pub fn start_search(&mut self,
                        origin: Cartesian2DCoordinate,
                        target: Cartesian2DCoordinate,
                        algorithm: SearchAlgorithm)
                        -> Result<Arc<dyn SnapshotPort>> {
        if !self.is_initialized() {
            bail!(ErrorKind::EngineNotInitialized);
        }
        info!("starting {} search {} -> {}", algorithm, origin, target);
        self.engine
            .start_search(origin, target, algorithm)
            .chain_err(|| ErrorKind::EngineCallFailure(format!("{} search", algorithm)))?;
        Ok(self.engine.snapshot_port())
    }

    /// Returns whether the engine was actually torn down; a second call without an
    /// intervening init is a no-op.
    pub fn teardown(&mut self) -> Result<bool> {
        if self.dimensions.take().is_none() {
            debug!("engine teardown skipped, nothing initialised");
            return Ok(false);
        }
        self.teardowns += 1;
        self.engine
            .teardown()
            .chain_err(|| ErrorKind::EngineCallFailure(String::from("teardown")))?;
        info!("maze engine torn down");
        Ok(true)
    }
}

impl fmt::Debug for EngineBinding {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "EngineBinding :: dimensions: {:?}, teardowns: {}", self.dimensions, self.teardowns)
    }
}
