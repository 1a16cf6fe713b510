//! A hand-scripted engine for exercising the pipeline without maze logic.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};
use std::time::Duration;

use crate::cells::{Cartesian2DCoordinate, CellCode};
use crate::errors::*;
use crate::grid_dimensions::GridDimensions;
use crate::units::BlockLength;

use super::{SearchAlgorithm, SnapshotEngine, SnapshotPort};

/// What the engine hands out, one entry per release. `None` is a poll that sees nothing.
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub frames: Vec<Option<Vec<CellCode>>>,
    /// Keep serving the final frame once the script is exhausted, instead of going idle.
    pub hold_last: bool,
    pub fail_init: bool,
    pub fail_pulls: bool,
    pub pull_delay: Option<Duration>,
}

impl Script {
    pub fn frames(frames: Vec<Vec<CellCode>>) -> Script {
        Script {
            frames: frames.into_iter().map(Some).collect(),
            ..Script::default()
        }
    }
}

/// Calls the engine has seen, with the threads that made the owning-thread calls.
#[derive(Debug, Default)]
pub struct CallLog {
    pub inits: usize,
    pub searches: usize,
    pub teardowns: usize,
    pub pulls: usize,
    pub releases: usize,
    pub owner_threads: Vec<ThreadId>,
    /// Owning-thread calls in the order they were made.
    pub sequence: Vec<&'static str>,
    pub last_search: Option<(Cartesian2DCoordinate, Cartesian2DCoordinate, SearchAlgorithm)>,
}

pub struct ScriptedEngine {
    script: Script,
    port: Arc<ScriptedPort>,
}

impl ScriptedEngine {
    pub fn new(script: Script) -> (ScriptedEngine, Arc<Mutex<CallLog>>) {
        let calls = Arc::new(Mutex::new(CallLog::default()));
        let port = Arc::new(ScriptedPort {
            frames: Mutex::new(VecDeque::new()),
            hold_last: script.hold_last,
            fail_pulls: script.fail_pulls,
            pull_delay: script.pull_delay,
            calls: calls.clone(),
        });
        (ScriptedEngine { script, port }, calls)
    }

    fn load(&self) {
        let mut frames = self.port.frames.lock().unwrap();
        *frames = self.script.frames.iter().cloned().collect();
    }

    fn record<F: FnOnce(&mut CallLog)>(&self, call: &'static str, f: F) {
        let mut calls = self.port.calls.lock().unwrap();
        calls.owner_threads.push(thread::current().id());
        calls.sequence.push(call);
        f(&mut calls);
    }
}

impl SnapshotEngine for ScriptedEngine {
    fn init(&mut self, _: GridDimensions, _: BlockLength) -> Result<()> {
        self.record("init", |c| c.inits += 1);
        if self.script.fail_init {
            bail!("scripted init failure");
        }
        self.load();
        Ok(())
    }

    fn start_search(&mut self,
                    origin: Cartesian2DCoordinate,
                    target: Cartesian2DCoordinate,
                    algorithm: SearchAlgorithm)
                    -> Result<()> {
        self.record("search", |c| {
            c.searches += 1;
            c.last_search = Some((origin, target, algorithm));
        });
        self.load();
        Ok(())
    }

    fn teardown(&mut self) -> Result<()> {
        self.record("teardown", |c| c.teardowns += 1);
        self.port.frames.lock().unwrap().clear();
        Ok(())
    }

    fn snapshot_port(&self) -> Arc<dyn SnapshotPort> {
        self.port.clone()
    }
}

pub struct ScriptedPort {
    frames: Mutex<VecDeque<Option<Vec<CellCode>>>>,
    hold_last: bool,
    fail_pulls: bool,
    pull_delay: Option<Duration>,
    calls: Arc<Mutex<CallLog>>,
}

impl SnapshotPort for ScriptedPort {
    fn pull_snapshot(&self, buffer: &mut [CellCode]) -> Result<()> {
        self.calls.lock().unwrap().pulls += 1;
        if let Some(delay) = self.pull_delay {
            thread::sleep(delay);
        }
        if self.fail_pulls {
            bail!("scripted pull failure");
        }
        let frames = self.frames.lock().unwrap();
        if let Some(&Some(ref frame)) = frames.front() {
            if frame.len() != buffer.len() {
                bail!(ErrorKind::MalformedSnapshot(buffer.len(), frame.len()));
            }
            buffer.copy_from_slice(frame);
        }
        Ok(())
    }

    fn release_snapshot(&self) -> Result<()> {
        self.calls.lock().unwrap().releases += 1;
        let mut frames = self.frames.lock().unwrap();
        if !(self.hold_last && frames.len() == 1) {
            frames.pop_front();
        }
        Ok(())
    }
}
