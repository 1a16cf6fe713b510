//! Background snapshot producers.
//!
//! One `StreamProducer` per stream kind. Starting it spawns a named worker thread that asks
//! the owning thread to start the engine, then polls the engine's snapshot port, queueing
//! every snapshot worth showing until the completion heuristic, a stop request, or an error
//! ends the session. Results travel back to the owning thread as executor tasks.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};

use crate::cells::{Cartesian2DCoordinate, CellCode};
use crate::completion::{CompletionPolicy, CompletionReason, StabilityTracker, StreamKind, Verdict};
use crate::engine::{EngineBinding, SearchAlgorithm, SnapshotPort};
use crate::errors::*;
use crate::executor::{panic_message, ExecutorHandle};
use crate::frame_queue::FrameQueue;
use crate::grid_dimensions::GridDimensions;
use crate::snapshot::{self, Snapshot};
use crate::units::{BlockLength, FramesCount, SessionId};

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

fn next_session_id() -> SessionId {
    SessionId(NEXT_SESSION.fetch_add(1, Ordering::Relaxed))
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamRequest {
    Generate {
        dimensions: GridDimensions,
        block_length: BlockLength,
    },
    Search {
        dimensions: GridDimensions,
        origin: Cartesian2DCoordinate,
        target: Cartesian2DCoordinate,
        algorithm: SearchAlgorithm,
    },
}

impl StreamRequest {
    pub fn kind(&self) -> StreamKind {
        match *self {
            StreamRequest::Generate { .. } => StreamKind::Generation,
            StreamRequest::Search { .. } => StreamKind::Search,
        }
    }

    pub fn dimensions(&self) -> GridDimensions {
        match *self {
            StreamRequest::Generate { dimensions, .. } |
            StreamRequest::Search { dimensions, .. } => dimensions,
        }
    }

    /// The engine call that starts this stream. Runs on the owning thread.
    fn start_engine(&self, binding: &mut EngineBinding) -> Result<Arc<dyn SnapshotPort>> {
        match *self {
            StreamRequest::Generate { dimensions, block_length } => binding.init(dimensions, block_length),
            StreamRequest::Search { origin, target, algorithm, .. } => {
                binding.start_search(origin, target, algorithm)
            }
        }
    }
}

/// Terminal outcome of a session that was not cancelled.
#[derive(Debug)]
pub enum StreamEvent {
    Completed {
        frames: FramesCount,
        reason: CompletionReason,
    },
    Failed(Error),
}

/// Receives stream events on the owning thread.
pub type EventSink = Arc<dyn Fn(StreamKind, SessionId, StreamEvent) + Send + Sync>;

/// Where the engine's scratch snapshot is freed after each pull.
#[derive(Eq, PartialEq, Copy, Clone, Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleasePolicy {
    /// On the producer thread, straight after the pull.
    Inline,
    /// As an executor task on the owning thread.
    Scheduled,
}

impl Default for ReleasePolicy {
    fn default() -> ReleasePolicy {
        ReleasePolicy::Inline
    }
}

#[derive(Eq, PartialEq, Copy, Clone, Debug)]
pub enum StopOutcome {
    NotRunning,
    Joined,
    /// The worker missed the stop deadline and was left to finish on its own.
    Abandoned,
}

/// State shared between a session's worker and the owning thread.
#[derive(Debug)]
struct StreamShared {
    id: SessionId,
    kind: StreamKind,
    dimensions: GridDimensions,
    queue: Arc<FrameQueue>,
    running: AtomicBool,
    stop_requested: AtomicBool,
    completed: AtomicBool,
    abandoned: AtomicBool,
    frames_accepted: AtomicUsize,
}

impl StreamShared {
    fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }
}

struct StreamSession {
    shared: Arc<StreamShared>,
    worker: Option<JoinHandle<()>>,
    exited: Receiver<()>,
    stop_timeout: Duration,
}

pub struct StreamProducer {
    kind: StreamKind,
    executor: ExecutorHandle<EngineBinding>,
    events: EventSink,
    release_policy: ReleasePolicy,
    session: Option<StreamSession>,
}

impl StreamProducer {
    pub fn new(kind: StreamKind, executor: ExecutorHandle<EngineBinding>, events: EventSink) -> StreamProducer {
        StreamProducer {
            kind,
            executor,
            events,
            release_policy: ReleasePolicy::default(),
            session: None,
        }
    }

    pub fn with_release_policy(mut self, release_policy: ReleasePolicy) -> StreamProducer {
        self.release_policy = release_policy;
        self
    }

    #[inline]
    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    /// Start a session with the default thresholds for the request's grid.
    pub fn start(&mut self, request: StreamRequest) -> Result<SessionId> {
        let policy = CompletionPolicy::for_kind(self.kind, request.dimensions());
        self.start_with_policy(request, policy)
    }

    /// Stops any running session first. Each session gets a fresh queue and counters.
    pub fn start_with_policy(&mut self, request: StreamRequest, policy: CompletionPolicy) -> Result<SessionId> {
        if request.kind() != self.kind {
            bail!("{} request sent to the {} producer", request.kind(), self.kind);
        }
        self.request_stop();

        let dimensions = request.dimensions();
        let shared = Arc::new(StreamShared {
            id: next_session_id(),
            kind: self.kind,
            dimensions,
            queue: Arc::new(FrameQueue::new()),
            running: AtomicBool::new(true),
            stop_requested: AtomicBool::new(false),
            completed: AtomicBool::new(false),
            abandoned: AtomicBool::new(false),
            frames_accepted: AtomicUsize::new(0),
        });
        info!("starting {} session {:?} on a {} grid: stability {}, silence {}, max frames {}",
              self.kind, shared.id, dimensions, policy.stability_limit, policy.silence_limit,
              policy.max_frames);

        let (exit_tx, exited) = channel::bounded(1);
        let stop_timeout = policy.stop_timeout;
        let worker = Worker {
            shared: shared.clone(),
            request,
            policy,
            executor: self.executor.clone(),
            events: self.events.clone(),
            release_policy: self.release_policy,
        };
        let handle = thread::Builder::new()
            .name(format!("{}-producer", self.kind))
            .spawn(move || worker.run(exit_tx))?;

        let id = shared.id;
        self.session = Some(StreamSession {
            shared,
            worker: Some(handle),
            exited,
            stop_timeout,
        });
        Ok(id)
    }

    /// Ask the worker to stop and wait a bounded time for it. Safe to call repeatedly.
    ///
    /// A worker that misses the deadline is detached, never killed; whatever it does
    /// afterwards is ignored.
    pub fn request_stop(&mut self) -> StopOutcome {
        let session = match self.session {
            Some(ref mut session) => session,
            None => return StopOutcome::NotRunning,
        };
        let handle = match session.worker.take() {
            Some(handle) => handle,
            None => return StopOutcome::NotRunning,
        };

        let shared = &session.shared;
        if !shared.running.load(Ordering::Acquire) {
            join(handle, shared.kind);
            return StopOutcome::NotRunning;
        }

        shared.stop_requested.store(true, Ordering::Release);
        match session.exited.recv_timeout(session.stop_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                join(handle, shared.kind);
                debug!("{} session {:?} stopped", shared.kind, shared.id);
                StopOutcome::Joined
            }
            Err(RecvTimeoutError::Timeout) => {
                shared.abandoned.store(true, Ordering::Release);
                let millis = session.stop_timeout.as_millis() as u64;
                warn!("{} session {:?}: {}", shared.kind, shared.id,
                      Error::from(ErrorKind::ShutdownTimeout(millis)));
                StopOutcome::Abandoned
            }
        }
    }

    pub fn try_take_frame(&self) -> Option<Snapshot> {
        self.session.as_ref().and_then(|s| s.shared.queue.try_pop())
    }

    pub fn has_frames(&self) -> bool {
        self.session.as_ref().map_or(false, |s| !s.shared.queue.is_empty())
    }

    /// The session's producer is done and its queue drained.
    pub fn is_finished(&self) -> bool {
        self.session.as_ref().map_or(false, |s| s.shared.queue.is_finished())
    }

    pub fn is_running(&self) -> bool {
        self.session.as_ref().map_or(false, |s| s.shared.running.load(Ordering::Acquire))
    }

    /// Whether the current session ended through its completion heuristic.
    pub fn is_completed(&self) -> bool {
        self.session.as_ref().map_or(false, |s| s.shared.completed.load(Ordering::Acquire))
    }

    pub fn frames_accepted(&self) -> FramesCount {
        FramesCount(self.session.as_ref().map_or(0, |s| s.shared.frames_accepted.load(Ordering::Relaxed)))
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(|s| s.shared.id)
    }

    pub fn dimensions(&self) -> Option<GridDimensions> {
        self.session.as_ref().map(|s| s.shared.dimensions)
    }

    /// The current session's queue, for a consumer to drain.
    pub fn queue(&self) -> Option<Arc<FrameQueue>> {
        self.session.as_ref().map(|s| s.shared.queue.clone())
    }
}

impl Drop for StreamProducer {
    fn drop(&mut self) {
        self.request_stop();
    }
}

fn join(handle: JoinHandle<()>, kind: StreamKind) {
    if handle.join().is_err() {
        error!("{} producer thread panicked outside its worker loop", kind);
    }
}

enum Exit {
    Completed(CompletionReason),
    Stopped,
}

struct Worker {
    shared: Arc<StreamShared>,
    request: StreamRequest,
    policy: CompletionPolicy,
    executor: ExecutorHandle<EngineBinding>,
    events: EventSink,
    release_policy: ReleasePolicy,
}

impl Worker {
    fn run(self, exit_tx: Sender<()>) {
        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| self.produce())) {
            Ok(outcome) => outcome,
            Err(payload) => {
                let message = format!("{} producer panicked: {}", self.shared.kind, panic_message(&*payload));
                Err(ErrorKind::EngineCallFailure(message).into())
            }
        };
        self.finish(outcome);
        let _ = exit_tx.send(());
    }

    fn produce(&self) -> Result<Exit> {
        let port = match self.start_engine()? {
            Some(port) => port,
            None => return Ok(Exit::Stopped),
        };

        let shared = &*self.shared;
        let dimensions = shared.dimensions;
        let interesting = shared.kind.interesting();
        let mut buffer = vec![CellCode::Empty; dimensions.size()];
        let mut tracker = StabilityTracker::new(self.policy.clone(), dimensions);
        let mut failures = 0u32;

        loop {
            if shared.is_stop_requested() {
                return Ok(Exit::Stopped);
            }
            if tracker.frame_limit_reached() {
                return Ok(Exit::Completed(CompletionReason::FrameLimit));
            }

            for cell in buffer.iter_mut() {
                *cell = CellCode::Empty;
            }
            let pulled = port.pull_snapshot(&mut buffer);
            // the engine may already belong to another session
            if shared.is_stop_requested() {
                return Ok(Exit::Stopped);
            }
            let verdict = match pulled {
                Ok(()) => {
                    failures = 0;
                    let class = snapshot::classify(&buffer, interesting);
                    if class.valid {
                        shared.queue.push(Snapshot::capture(dimensions, &buffer)?);
                        let frames = shared.frames_accepted.fetch_add(1, Ordering::Relaxed) + 1;
                        if self.policy.progress_every > 0 && frames % self.policy.progress_every == 0 {
                            info!("{} session {:?}: {} frames, {} {:?} cells ({:.1}% of expected)",
                                  shared.kind, shared.id, frames, class.interesting, interesting,
                                  tracker.completion_fraction() * 100.0);
                        }
                        tracker.on_frame(class.interesting)
                    } else {
                        tracker.on_empty_poll()
                    }
                }
                Err(e) => {
                    if let ErrorKind::MalformedSnapshot(..) = *e.kind() {
                        warn!("{} session {:?}: dropping snapshot, {}", shared.kind, shared.id, e);
                        tracker.on_empty_poll()
                    } else {
                        failures += 1;
                        warn!("{} session {:?}: pull failed ({} in a row): {}", shared.kind, shared.id, failures, e);
                        if failures >= self.policy.max_consecutive_failures {
                            return Err(e).chain_err(|| {
                                ErrorKind::EngineCallFailure(format!("{} consecutive snapshot pulls", failures))
                            });
                        }
                        Verdict::Continue
                    }
                }
            };

            self.release(&port);

            match verdict {
                Verdict::Continue => {}
                Verdict::Complete(reason) => {
                    if reason == CompletionReason::ForcedAfterSilence {
                        warn!("{} session {:?}: {} after {} frames, last count {:?}",
                              shared.kind, shared.id, reason, tracker.frames_accepted().0, tracker.last_count());
                    }
                    return Ok(Exit::Completed(reason));
                }
                Verdict::NoData => bail!(ErrorKind::NoDataProduced),
            }

            thread::sleep(self.policy.poll_interval);
        }
    }

    /// Schedule the engine start on the owning thread and wait for its port. `None` when a
    /// stop arrives first.
    fn start_engine(&self) -> Result<Option<Arc<dyn SnapshotPort>>> {
        let (port_tx, port_rx) = channel::bounded(1);
        let request = self.request.clone();
        self.executor.schedule(move |binding: &mut EngineBinding| {
            let _ = port_tx.send(request.start_engine(binding));
            Ok(())
        })?;

        for _ in 0..self.policy.start_attempts {
            if self.shared.is_stop_requested() {
                return Ok(None);
            }
            match port_rx.recv_timeout(self.policy.start_attempt_interval) {
                Ok(port) => return port.map(Some),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    bail!(ErrorKind::EngineCallFailure(String::from("start task dropped by the executor")))
                }
            }
        }
        bail!(ErrorKind::EngineInitTimeout(self.policy.start_attempts))
    }

    fn release(&self, port: &Arc<dyn SnapshotPort>) {
        let released = match self.release_policy {
            ReleasePolicy::Inline => port.release_snapshot(),
            ReleasePolicy::Scheduled => {
                let port = port.clone();
                self.executor.schedule(move |_: &mut EngineBinding| port.release_snapshot())
            }
        };
        if let Err(e) = released {
            warn!("{} session {:?}: snapshot release failed: {}", self.shared.kind, self.shared.id, e);
        }
    }

    fn finish(&self, outcome: Result<Exit>) {
        let shared = &*self.shared;
        shared.queue.mark_producer_done();
        shared.running.store(false, Ordering::Release);

        if shared.abandoned.load(Ordering::Acquire) {
            debug!("abandoned {} session {:?} exited", shared.kind, shared.id);
            return;
        }

        if shared.is_stop_requested() {
            if let Err(e) = outcome {
                debug!("{} session {:?} stopped while failing: {}", shared.kind, shared.id, e);
            }
            if shared.kind.tears_down_on_stop() {
                let scheduled = self.executor.schedule(|binding: &mut EngineBinding| binding.teardown().map(|_| ()));
                if let Err(e) = scheduled {
                    warn!("could not schedule engine teardown: {}", e);
                }
            }
            info!("{} session {:?} cancelled", shared.kind, shared.id);
            return;
        }

        let event = match outcome {
            Ok(Exit::Completed(reason)) => {
                shared.completed.store(true, Ordering::Release);
                let frames = FramesCount(shared.frames_accepted.load(Ordering::Relaxed));
                info!("{} session {:?} complete: {} after {} frames", shared.kind, shared.id, reason, frames.0);
                StreamEvent::Completed { frames, reason }
            }
            // A stop request that raced the final checks.
            Ok(Exit::Stopped) => return,
            Err(e) => {
                error!("{} session {:?} failed: {}", shared.kind, shared.id, e);
                StreamEvent::Failed(e)
            }
        };

        let (kind, id, sink) = (shared.kind, shared.id, self.events.clone());
        let scheduled = self.executor.schedule(move |_: &mut EngineBinding| {
            sink(kind, id, event);
            Ok(())
        });
        if let Err(e) = scheduled {
            warn!("{} session {:?}: result dropped, {}", kind, id, e);
        }
    }
}
