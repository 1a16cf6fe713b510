//! Drives one maze at a time through generation and then search.
//!
//! The controller lives on the owning thread. It owns the executor the engine binding sits in,
//! one producer and at most one consumer per stream kind, and the presentation layer. Every
//! `tick` runs pending engine calls, applies stream events from the producers, and lets the
//! consumers deliver edits.
//!
//! A stream is only reported complete once its producer has declared completion *and* its
//! consumer has presented everything that was captured.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crossbeam::channel::{self, Receiver};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::cells::{Cartesian2DCoordinate, CellCode};
use crate::completion::{CompletionPolicy, StreamKind};
use crate::config::VisualizerConfig;
use crate::consumer::{ConsumerStatus, StreamConsumer};
use crate::endpoints::{self, Endpoints};
use crate::engine::{EngineBinding, SearchAlgorithm, SnapshotEngine};
use crate::errors::*;
use crate::executor::MainThreadExecutor;
use crate::frame_queue::FrameQueue;
use crate::grid::LogicalGrid;
use crate::grid_dimensions::GridDimensions;
use crate::presentation::Presentation;
use crate::producer::{EventSink, StreamEvent, StreamProducer, StreamRequest};
use crate::snapshot::Snapshot;
use crate::units::{ColumnLength, RowLength, SessionId};
use crate::utils;

#[derive(Eq, PartialEq, Copy, Clone, Debug)]
pub enum SessionState {
    Idle,
    /// Started, nothing presented yet.
    Starting,
    Streaming,
    /// The producer declared completion; the consumer is still catching up.
    Completing,
    Cancelling,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match *self {
            SessionState::Idle => "idle",
            SessionState::Starting => "starting",
            SessionState::Streaming => "streaming",
            SessionState::Completing => "completing",
            SessionState::Cancelling => "cancelling",
        };
        write!(f, "{}", name)
    }
}

pub type PolicySource = Box<dyn Fn(StreamKind, GridDimensions) -> CompletionPolicy>;

struct StreamSlot {
    kind: StreamKind,
    producer: StreamProducer,
    consumer: Option<StreamConsumer>,
    state: SessionState,
    /// The consumer is showing a locally made maze, not engine output.
    placeholder: bool,
}

impl StreamSlot {
    fn new(producer: StreamProducer) -> StreamSlot {
        StreamSlot {
            kind: producer.kind(),
            producer,
            consumer: None,
            state: SessionState::Idle,
            placeholder: false,
        }
    }

    fn is_active(&self) -> bool {
        self.state != SessionState::Idle
    }

    /// Stop the producer and freeze the consumer, leaving what is shown in place.
    fn stop(&mut self) {
        if self.is_active() {
            self.state = SessionState::Cancelling;
        }
        let outcome = self.producer.request_stop();
        if let Some(ref mut consumer) = self.consumer {
            consumer.cancel();
        }
        if self.is_active() {
            info!("{} stream stopped ({:?})", self.kind, outcome);
        }
        self.state = SessionState::Idle;
    }

    /// Stop, then take everything this stream showed off the screen.
    fn clear(&mut self, presentation: &mut dyn Presentation) {
        self.stop();
        if let Some(mut consumer) = self.consumer.take() {
            consumer.clear(presentation);
        }
        self.placeholder = false;
    }

    fn tick(&mut self, now: Instant, presentation: &mut dyn Presentation) {
        let status = match self.consumer {
            Some(ref mut consumer) if self.state != SessionState::Idle => consumer.tick(now, presentation),
            _ => return,
        };
        if status == ConsumerStatus::Streaming && self.state == SessionState::Starting {
            self.state = SessionState::Streaming;
        }
    }

    fn ready_to_finish(&self) -> bool {
        self.state == SessionState::Completing &&
        self.consumer.as_ref().map_or(false, |c| c.status() == ConsumerStatus::Finished)
    }

    fn presented_count(&self) -> usize {
        self.consumer.as_ref().map_or(0, |c| c.presented().len())
    }
}

pub struct SessionController<P: Presentation> {
    config: VisualizerConfig,
    executor: MainThreadExecutor<EngineBinding>,
    events: Receiver<(StreamKind, SessionId, StreamEvent)>,
    generation: StreamSlot,
    search: StreamSlot,
    presentation: P,
    policies: PolicySource,
    dimensions: Option<GridDimensions>,
    maze: Option<LogicalGrid>,
    ready_for_search: bool,
    endpoints: Option<Endpoints>,
    algorithm: Option<SearchAlgorithm>,
    last_error: Option<String>,
    rng: StdRng,
}

impl<P: Presentation> SessionController<P> {
    pub fn new(engine: Box<dyn SnapshotEngine>, config: VisualizerConfig, presentation: P) -> SessionController<P> {
        let executor = MainThreadExecutor::new(EngineBinding::new(engine));
        let (event_tx, events) = channel::unbounded();
        let sink: EventSink = Arc::new(move |kind: StreamKind, id: SessionId, event: StreamEvent| {
            if event_tx.send((kind, id, event)).is_err() {
                debug!("{} event for session {:?} after the controller went away", kind, id);
            }
        });
        let producer = |kind| {
            StreamProducer::new(kind, executor.handle(), sink.clone()).with_release_policy(config.release_policy)
        };
        let generation = StreamSlot::new(producer(StreamKind::Generation));
        let search = StreamSlot::new(producer(StreamKind::Search));
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        SessionController {
            config,
            executor,
            events,
            generation,
            search,
            presentation,
            policies: Box::new(CompletionPolicy::for_kind),
            dimensions: None,
            maze: None,
            ready_for_search: false,
            endpoints: None,
            algorithm: None,
            last_error: None,
            rng,
        }
    }

    /// Replace the completion thresholds handed to each new stream.
    pub fn with_policies<F>(mut self, policies: F) -> SessionController<P>
        where F: Fn(StreamKind, GridDimensions) -> CompletionPolicy + 'static
    {
        self.policies = Box::new(policies);
        self
    }

    /// Throw away any current maze and search, then generate a new maze.
    ///
    /// Lengths below 2 are raised to 2.
    pub fn start_generation(&mut self, length: usize, width: usize, block_length: usize) -> Result<SessionId> {
        self.config.set_length(length);
        self.config.set_width(width);
        self.config.block_length = block_length;
        let dimensions = GridDimensions::new(RowLength(self.config.length), ColumnLength(self.config.width))?;

        self.search.clear(&mut self.presentation);
        self.generation.clear(&mut self.presentation);
        self.maze = None;
        self.ready_for_search = false;
        self.endpoints = None;
        self.algorithm = None;
        self.last_error = None;
        self.dimensions = Some(dimensions);

        self.executor.handle().schedule(|binding: &mut EngineBinding| binding.teardown().map(|_| ()))?;

        let request = StreamRequest::Generate {
            dimensions,
            block_length: self.config.block(),
        };
        let policy = (self.policies)(StreamKind::Generation, dimensions);
        let id = self.generation.producer.start_with_policy(request, policy)?;
        self.attach_consumer(StreamKind::Generation, dimensions);
        Ok(id)
    }

    /// A new maze with the current settings.
    pub fn regenerate(&mut self) -> Result<SessionId> {
        let (length, width, block) = (self.config.length, self.config.width, self.config.block_length);
        self.start_generation(length, width, block)
    }

    /// Search the finished maze. Any earlier search is stopped and its cells cleared.
    pub fn start_search(&mut self,
                        origin: Cartesian2DCoordinate,
                        target: Cartesian2DCoordinate,
                        algorithm: SearchAlgorithm)
                        -> Result<SessionId> {
        let dimensions = match (self.ready_for_search, self.maze.as_ref()) {
            (true, Some(maze)) => {
                for endpoint in &[origin, target] {
                    if !maze.is_walkable(*endpoint) {
                        bail!(ErrorKind::InvalidEndpoint(endpoint.x, endpoint.y));
                    }
                }
                maze.dimensions()
            }
            _ => bail!(ErrorKind::NotReadyForSearch),
        };

        self.search.clear(&mut self.presentation);
        self.last_error = None;
        let request = StreamRequest::Search {
            dimensions,
            origin,
            target,
            algorithm,
        };
        let policy = (self.policies)(StreamKind::Search, dimensions);
        let id = self.search.producer.start_with_policy(request, policy)?;
        self.algorithm = Some(algorithm);
        self.attach_consumer(StreamKind::Search, dimensions);
        info!("searching {} -> {} with {}", origin, target, algorithm);
        Ok(id)
    }

    /// Search between the chosen endpoints.
    pub fn search(&mut self, algorithm: SearchAlgorithm) -> Result<SessionId> {
        match self.endpoints {
            Some(chosen) if self.ready_for_search => self.start_search(chosen.start, chosen.end, algorithm),
            _ => bail!(ErrorKind::NotReadyForSearch),
        }
    }

    /// Stop whatever is streaming. What is already shown stays shown. Safe to call repeatedly.
    pub fn stop_current(&mut self) {
        self.search.stop();
        self.generation.stop();
    }

    /// One owning-thread step: engine calls, stream events, then presentation edits.
    pub fn tick(&mut self, now: Instant) {
        self.executor.run_pending();

        let events: Vec<_> = self.events.try_iter().collect();
        for (kind, id, event) in events {
            self.on_event(kind, id, event);
        }

        self.generation.tick(now, &mut self.presentation);
        self.search.tick(now, &mut self.presentation);

        if self.generation.ready_to_finish() {
            self.finish_generation();
        }
        if self.search.ready_to_finish() {
            self.search.state = SessionState::Idle;
            info!("search finished, {} cells visited", self.search.presented_count());
            self.presentation.on_stream_complete(StreamKind::Search);
        }
    }

    fn slot_mut(&mut self, kind: StreamKind) -> &mut StreamSlot {
        match kind {
            StreamKind::Generation => &mut self.generation,
            StreamKind::Search => &mut self.search,
        }
    }

    fn slot(&self, kind: StreamKind) -> &StreamSlot {
        match kind {
            StreamKind::Generation => &self.generation,
            StreamKind::Search => &self.search,
        }
    }

    fn attach_consumer(&mut self, kind: StreamKind, dimensions: GridDimensions) {
        let settings = match kind {
            StreamKind::Generation => self.config.generation_playback.clone(),
            StreamKind::Search => self.config.search_playback.clone(),
        };
        let slot = self.slot_mut(kind);
        slot.consumer = slot.producer
            .queue()
            .map(|queue| StreamConsumer::new(kind, dimensions, queue, settings));
        slot.state = SessionState::Starting;
    }

    fn on_event(&mut self, kind: StreamKind, id: SessionId, event: StreamEvent) {
        let slot = self.slot_mut(kind);
        if slot.producer.session_id() != Some(id) || slot.state == SessionState::Idle {
            debug!("ignoring {} event from stale session {:?}", kind, id);
            return;
        }
        match event {
            StreamEvent::Completed { frames, reason } => {
                info!("{} session {:?} complete after {} frames ({})", kind, id, frames.0, reason);
                slot.state = SessionState::Completing;
            }
            StreamEvent::Failed(e) => self.on_failure(kind, e),
        }
    }

    fn on_failure(&mut self, kind: StreamKind, e: Error) {
        if let (StreamKind::Generation, &ErrorKind::NoDataProduced) = (kind, e.kind()) {
            if self.config.fallback_on_no_data {
                warn!("{}, showing a placeholder maze", e);
                match self.present_placeholder() {
                    Ok(()) => return,
                    Err(placeholder_error) => error!("placeholder maze failed: {}", placeholder_error),
                }
            }
        }

        let message = e.to_string();
        error!("{} stream failed: {}", kind, message);
        let slot = self.slot_mut(kind);
        if let Some(ref mut consumer) = slot.consumer {
            consumer.cancel();
        }
        slot.state = SessionState::Idle;
        self.presentation.on_stream_error(kind, &message);
        self.last_error = Some(message);
    }

    /// Feed a random maze through a one-shot queue so it is presented like engine output.
    fn present_placeholder(&mut self) -> Result<()> {
        let dimensions = self.config.dimensions()?;
        let keep = self.config.endpoints()?;
        let grid = endpoints::placeholder_maze(dimensions, &[keep.start, keep.end], &mut self.rng);
        let queue = Arc::new(FrameQueue::new());
        queue.push(Snapshot::from_cells(dimensions, grid.cells().to_vec())?);
        queue.mark_producer_done();

        let settings = self.config.generation_playback.clone();
        let slot = &mut self.generation;
        if let Some(mut stale) = slot.consumer.take() {
            stale.clear(&mut self.presentation);
        }
        slot.consumer = Some(StreamConsumer::new(StreamKind::Generation, dimensions, queue, settings));
        slot.placeholder = true;
        slot.state = SessionState::Completing;
        self.dimensions = Some(dimensions);
        Ok(())
    }

    fn finish_generation(&mut self) {
        let captured = self.generation.consumer.as_ref().and_then(|c| c.grid()).cloned();
        let maze = match captured {
            Some(grid) => grid,
            None => {
                self.on_failure(StreamKind::Generation, ErrorKind::NoDataProduced.into());
                return;
            }
        };
        let chosen = if self.generation.placeholder {
            self.config.endpoints().unwrap_or_else(|_| Endpoints::fallback(maze.dimensions()))
        } else {
            endpoints::choose_endpoints(&maze, self.config.distance_coefficient, &mut self.rng)
        };
        info!("maze ready: {} walls, search from {} to {}", maze.count(CellCode::Wall), chosen.start,
              chosen.end);

        self.maze = Some(maze);
        self.endpoints = Some(chosen);
        self.ready_for_search = true;
        self.generation.state = SessionState::Idle;
        self.presentation.on_stream_complete(StreamKind::Generation);
    }

    pub fn is_ready_for_search(&self) -> bool {
        self.ready_for_search
    }

    /// Algorithm of the current or last search since the maze was made.
    pub fn current_algorithm(&self) -> Option<SearchAlgorithm> {
        self.algorithm
    }

    pub fn state(&self, kind: StreamKind) -> SessionState {
        self.slot(kind).state
    }

    /// Any stream still doing work.
    pub fn is_busy(&self) -> bool {
        self.generation.is_active() || self.search.is_active()
    }

    /// The finished maze, or the placeholder standing in for it.
    pub fn maze(&self) -> Option<&LogicalGrid> {
        self.maze.as_ref()
    }

    pub fn is_placeholder_maze(&self) -> bool {
        self.maze.is_some() && self.generation.placeholder
    }

    /// The grid as last captured for a stream, which may be ahead of what is presented.
    pub fn live_grid(&self, kind: StreamKind) -> Option<&LogicalGrid> {
        self.slot(kind).consumer.as_ref().and_then(|c| c.grid())
    }

    pub fn is_position_walkable(&self, position: Cartesian2DCoordinate) -> bool {
        self.maze.as_ref().map_or(false, |maze| maze.is_walkable(position))
    }

    pub fn endpoints(&self) -> Option<Endpoints> {
        self.endpoints
    }

    pub fn dimensions(&self) -> Option<GridDimensions> {
        self.dimensions
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_ref().map(|s| s.as_str())
    }

    pub fn config(&self) -> &VisualizerConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut VisualizerConfig {
        &mut self.config
    }

    pub fn presentation(&self) -> &P {
        &self.presentation
    }

    pub fn presentation_mut(&mut self) -> &mut P {
        &mut self.presentation
    }

    pub fn engine(&self) -> &EngineBinding {
        self.executor.target()
    }

    /// A few lines describing the maze and both streams.
    pub fn summary(&self) -> String {
        let size = self.dimensions.map_or_else(|| "none".to_string(), |d| d.to_string());
        let ends = self.endpoints.map_or_else(|| "not chosen".to_string(),
                                              |e| format!("{} -> {}", e.start, e.end));
        let algorithm = self.algorithm.map_or_else(|| "none".to_string(), |a| a.to_string());
        let cells = self.dimensions.map_or(0, |d| d.size());
        let walls = self.generation.presented_count();
        format!("maze: {}{}\nendpoints: {}\nwalls shown: {} ({:.0}%)\ngeneration: {}\nsearch: {} ({}, {} \
                 cells visited)\n",
                size,
                if self.is_placeholder_maze() { " (placeholder)" } else { "" },
                ends,
                walls,
                utils::percent(walls, cells),
                self.generation.state,
                self.search.state,
                algorithm,
                self.search.presented_count())
    }

    /// Stop both streams, tear the engine down and hand back the presentation layer.
    pub fn shutdown(mut self) -> P {
        self.stop_current();
        self.executor.run_pending();
        if let Err(e) = self.executor.target_mut().teardown() {
            warn!("engine teardown at shutdown failed: {}", e);
        }
        let SessionController { executor, generation, search, presentation, .. } = self;
        drop(generation);
        drop(search);
        executor.shutdown();
        presentation
    }
}
