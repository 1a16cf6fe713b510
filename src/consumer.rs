//! Turning queued snapshots into presentation edits on the owning thread.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cells::Cartesian2DCoordinate;
use crate::completion::StreamKind;
use crate::diff;
use crate::frame_queue::FrameQueue;
use crate::grid::LogicalGrid;
use crate::grid_dimensions::GridDimensions;
use crate::presentation::Presentation;
use crate::snapshot::Snapshot;
use crate::utils::{self, FnvHashSet};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConsumerSettings {
    pub frames_per_second: f32,
    /// Snapshots drained per burst.
    pub batch_size: usize,
    /// Creations handed to the presentation layer per tick; removals are never held back.
    pub max_creations_per_tick: usize,
}

impl ConsumerSettings {
    pub fn generation() -> ConsumerSettings {
        ConsumerSettings {
            frames_per_second: 60.0,
            batch_size: 15,
            max_creations_per_tick: 40,
        }
    }

    pub fn search() -> ConsumerSettings {
        ConsumerSettings {
            frames_per_second: 10.0,
            batch_size: 10,
            max_creations_per_tick: 20,
        }
    }

    pub fn for_kind(kind: StreamKind) -> ConsumerSettings {
        match kind {
            StreamKind::Generation => ConsumerSettings::generation(),
            StreamKind::Search => ConsumerSettings::search(),
        }
    }

    pub fn burst_interval(&self) -> Duration {
        Duration::from_secs_f32(1.0 / self.frames_per_second.max(1.0))
    }
}

#[derive(Eq, PartialEq, Copy, Clone, Debug)]
pub enum ConsumerStatus {
    /// Nothing consumed yet and the producer is still going.
    Waiting,
    Streaming,
    /// Producer done, queue drained, every edit delivered.
    Finished,
    Cancelled,
}

pub struct StreamConsumer {
    kind: StreamKind,
    dimensions: GridDimensions,
    settings: ConsumerSettings,
    queue: Arc<FrameQueue>,
    grid: Option<LogicalGrid>,
    presented: FnvHashSet<Cartesian2DCoordinate>,
    pending_create: FnvHashSet<Cartesian2DCoordinate>,
    pending_remove: FnvHashSet<Cartesian2DCoordinate>,
    next_burst: Option<Instant>,
    frames_consumed: usize,
    frames_dropped: usize,
    cancelled: bool,
    finished: bool,
}

impl StreamConsumer {
    pub fn new(kind: StreamKind,
               dimensions: GridDimensions,
               queue: Arc<FrameQueue>,
               settings: ConsumerSettings)
               -> StreamConsumer {
        StreamConsumer {
            kind,
            dimensions,
            settings,
            queue,
            grid: None,
            presented: utils::fnv_hashset(dimensions.size() / 2),
            pending_create: utils::fnv_hashset(64),
            pending_remove: utils::fnv_hashset(64),
            next_burst: None,
            frames_consumed: 0,
            frames_dropped: 0,
            cancelled: false,
            finished: false,
        }
    }

    #[inline]
    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    #[inline]
    pub fn dimensions(&self) -> GridDimensions {
        self.dimensions
    }

    /// State of the most recently applied snapshot.
    pub fn grid(&self) -> Option<&LogicalGrid> {
        self.grid.as_ref()
    }

    pub fn presented(&self) -> &FnvHashSet<Cartesian2DCoordinate> {
        &self.presented
    }

    pub fn pending_edits(&self) -> usize {
        self.pending_create.len() + self.pending_remove.len()
    }

    pub fn frames_consumed(&self) -> usize {
        self.frames_consumed
    }

    pub fn frames_dropped(&self) -> usize {
        self.frames_dropped
    }

    /// The next tick returns `Cancelled` without touching the queue.
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    pub fn status(&self) -> ConsumerStatus {
        if self.cancelled {
            ConsumerStatus::Cancelled
        } else if self.finished {
            ConsumerStatus::Finished
        } else if self.frames_consumed == 0 {
            ConsumerStatus::Waiting
        } else {
            ConsumerStatus::Streaming
        }
    }

    /// Run at most one burst: drain up to a batch of snapshots, then deliver edits.
    ///
    /// Between bursts, and once finished or cancelled, this only reports status.
    pub fn tick(&mut self, now: Instant, presentation: &mut dyn Presentation) -> ConsumerStatus {
        if self.cancelled || self.finished {
            return self.status();
        }
        match self.next_burst {
            Some(due) if now < due => return self.status(),
            _ => self.next_burst = Some(now + self.settings.burst_interval()),
        }

        for _ in 0..self.settings.batch_size {
            match self.queue.try_pop() {
                Some(snapshot) => self.absorb(snapshot),
                None => break,
            }
        }
        self.deliver(presentation);

        if self.queue.is_finished() && self.pending_edits() == 0 {
            debug!("{} consumer finished after {} snapshots ({} dropped)",
                   self.kind, self.frames_consumed, self.frames_dropped);
            self.finished = true;
        }
        self.status()
    }

    /// Remove every presented cell and forget all state, leaving the consumer cancelled.
    pub fn clear(&mut self, presentation: &mut dyn Presentation) {
        for cell in utils::sorted(&self.presented) {
            presentation.on_cell_removed(self.kind, cell);
        }
        self.presented.clear();
        self.pending_create.clear();
        self.pending_remove.clear();
        self.grid = None;
        self.cancelled = true;
    }

    fn absorb(&mut self, snapshot: Snapshot) {
        if snapshot.dimensions() != self.dimensions {
            warn!("{} consumer dropping a {} snapshot, expected {}",
                  self.kind, snapshot.dimensions(), self.dimensions);
            self.frames_dropped += 1;
            return;
        }
        let interesting = self.kind.interesting();

        match self.grid {
            None => {
                for (index, code) in snapshot.cells().iter().enumerate() {
                    if *code == interesting {
                        let cell = self.dimensions.coordinate_at(index);
                        queue_creation(&self.presented, &mut self.pending_create, &mut self.pending_remove, cell);
                    }
                }
                self.grid = Some(LogicalGrid::from_snapshot(&snapshot));
            }
            Some(ref mut grid) => {
                let changes = diff::diff_grids(self.dimensions, grid.cells(), snapshot.cells(), interesting);
                grid.replace_with(&snapshot);
                for cell in changes.removed {
                    queue_removal(&self.presented, &mut self.pending_create, &mut self.pending_remove, cell);
                }
                for cell in changes.created {
                    queue_creation(&self.presented, &mut self.pending_create, &mut self.pending_remove, cell);
                }
            }
        }
        self.frames_consumed += 1;
    }

    fn deliver(&mut self, presentation: &mut dyn Presentation) {
        for cell in utils::sorted(&self.pending_remove) {
            self.presented.remove(&cell);
            presentation.on_cell_removed(self.kind, cell);
        }
        self.pending_remove.clear();

        let creations: Vec<Cartesian2DCoordinate> = utils::sorted(&self.pending_create)
            .into_iter()
            .take(self.settings.max_creations_per_tick.max(1))
            .collect();
        for cell in creations {
            self.pending_create.remove(&cell);
            self.presented.insert(cell);
            presentation.on_cell_created(self.kind, cell);
        }
    }
}

// A creation cancels a pending removal of the same cell and the other way round.

fn queue_creation(presented: &FnvHashSet<Cartesian2DCoordinate>,
                  pending_create: &mut FnvHashSet<Cartesian2DCoordinate>,
                  pending_remove: &mut FnvHashSet<Cartesian2DCoordinate>,
                  cell: Cartesian2DCoordinate) {
    if !pending_remove.remove(&cell) && !presented.contains(&cell) {
        pending_create.insert(cell);
    }
}

fn queue_removal(presented: &FnvHashSet<Cartesian2DCoordinate>,
                 pending_create: &mut FnvHashSet<Cartesian2DCoordinate>,
                 pending_remove: &mut FnvHashSet<Cartesian2DCoordinate>,
                 cell: Cartesian2DCoordinate) {
    if !pending_create.remove(&cell) && presented.contains(&cell) {
        pending_remove.insert(cell);
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::cells::CellCode;
    use crate::presentation::PresentedCells;
    use crate::units::{ColumnLength, RowLength};

    fn cells_with(grid: &LogicalGrid, code: CellCode) -> Vec<Cartesian2DCoordinate> {
        grid.dimensions()
            .iter()
            .filter(|c| grid.get(*c) == Some(code))
            .collect()
    }

    #[derive(Default)]
    struct Recorder {
        created: Vec<Cartesian2DCoordinate>,
        removed: Vec<Cartesian2DCoordinate>,
    }

    impl Recorder {
        fn reset(&mut self) {
            self.created.clear();
            self.removed.clear();
        }
    }

    impl Presentation for Recorder {
        fn on_cell_created(&mut self, _: StreamKind, cell: Cartesian2DCoordinate) {
            self.created.push(cell);
        }

        fn on_cell_removed(&mut self, _: StreamKind, cell: Cartesian2DCoordinate) {
            self.removed.push(cell);
        }
    }

    fn dims() -> GridDimensions {
        GridDimensions::new(RowLength(10), ColumnLength(10)).unwrap()
    }

    fn gc(x: u32, y: u32) -> Cartesian2DCoordinate {
        Cartesian2DCoordinate::new(x, y)
    }

    fn with_walls(walls: &[Cartesian2DCoordinate]) -> Snapshot {
        let d = dims();
        let mut cells = vec![CellCode::Empty; d.size()];
        for wall in walls {
            cells[d.index_of(*wall).unwrap()] = CellCode::Wall;
        }
        Snapshot::from_cells(d, cells).unwrap()
    }

    /// Forty walls: most of the top and bottom rows, plus (3,3).
    fn forty_walls() -> Vec<Cartesian2DCoordinate> {
        let mut walls: Vec<Cartesian2DCoordinate> = (0..10)
            .flat_map(|x| vec![gc(x, 0), gc(x, 1), gc(x, 8)])
            .collect();
        walls.extend((0..9).map(|x| gc(x, 9)));
        walls.push(gc(3, 3));
        walls
    }

    fn consumer(queue: &Arc<FrameQueue>) -> StreamConsumer {
        StreamConsumer::new(StreamKind::Generation, dims(), queue.clone(), ConsumerSettings::generation())
    }

    #[test]
    fn first_snapshot_creates_every_interesting_cell() {
        let queue = Arc::new(FrameQueue::new());
        queue.push(with_walls(&forty_walls()));
        let mut consumer = consumer(&queue);
        let mut recorder = Recorder::default();

        assert_eq!(consumer.tick(Instant::now(), &mut recorder), ConsumerStatus::Streaming);
        assert_eq!(recorder.created.len(), 40);
        assert!(recorder.removed.is_empty());
    }

    #[test]
    fn later_snapshots_emit_only_the_difference() {
        let queue = Arc::new(FrameQueue::new());
        let mut walls = forty_walls();
        queue.push(with_walls(&walls));
        let mut consumer = consumer(&queue);
        let mut recorder = Recorder::default();
        let start = Instant::now();
        consumer.tick(start, &mut recorder);
        assert_eq!(recorder.created.len(), 40);
        recorder.reset();

        walls.retain(|c| *c != gc(3, 3));
        walls.push(gc(7, 7));
        queue.push(with_walls(&walls));
        consumer.tick(start + Duration::from_millis(20), &mut recorder);
        assert_eq!(recorder.removed, vec![gc(3, 3)]);
        assert_eq!(recorder.created, vec![gc(7, 7)]);
    }

    #[test]
    fn creations_are_throttled_per_tick() {
        let queue = Arc::new(FrameQueue::new());
        let all: Vec<Cartesian2DCoordinate> = dims().iter().collect();
        queue.push(with_walls(&all));
        let mut consumer = consumer(&queue);
        let mut recorder = Recorder::default();
        let start = Instant::now();

        consumer.tick(start, &mut recorder);
        assert_eq!(recorder.created.len(), 40);
        assert_eq!(consumer.pending_edits(), 60);

        // between bursts nothing happens
        consumer.tick(start + Duration::from_millis(1), &mut recorder);
        assert_eq!(recorder.created.len(), 40);

        consumer.tick(start + Duration::from_millis(20), &mut recorder);
        consumer.tick(start + Duration::from_millis(40), &mut recorder);
        assert_eq!(recorder.created.len(), 100);
        assert_eq!(consumer.pending_edits(), 0);
    }

    #[test]
    fn a_zero_creation_cap_still_drains() {
        let queue = Arc::new(FrameQueue::new());
        queue.push(with_walls(&[gc(1, 1), gc(2, 2)]));
        queue.mark_producer_done();
        let settings = ConsumerSettings { max_creations_per_tick: 0, ..ConsumerSettings::generation() };
        let mut consumer = StreamConsumer::new(StreamKind::Generation, dims(), queue.clone(), settings);
        let mut recorder = Recorder::default();
        let start = Instant::now();

        assert_eq!(consumer.tick(start, &mut recorder), ConsumerStatus::Streaming);
        assert_eq!(recorder.created, vec![gc(1, 1)]);
        assert_eq!(consumer.tick(start + Duration::from_millis(20), &mut recorder), ConsumerStatus::Finished);
        assert_eq!(recorder.created, vec![gc(1, 1), gc(2, 2)]);
    }

    #[test]
    fn a_wall_that_comes_and_goes_before_being_shown_is_never_shown() {
        let queue = Arc::new(FrameQueue::new());
        let all: Vec<Cartesian2DCoordinate> = dims().iter().collect();
        queue.push(with_walls(&all));
        let mut consumer = consumer(&queue);
        let mut recorder = Recorder::default();
        let start = Instant::now();
        consumer.tick(start, &mut recorder);
        // (9,9) sorts last so it is still pending
        assert!(!recorder.created.contains(&gc(9, 9)));

        let without: Vec<Cartesian2DCoordinate> = all.iter().cloned().filter(|c| *c != gc(9, 9)).collect();
        queue.push(with_walls(&without));
        for n in 1..5 {
            consumer.tick(start + Duration::from_millis(20 * n), &mut recorder);
        }
        assert!(!recorder.created.contains(&gc(9, 9)));
        assert!(recorder.removed.is_empty());
        assert_eq!(recorder.created.len(), 99);
    }

    #[test]
    fn waits_then_finishes_once_the_producer_is_done() {
        let queue = Arc::new(FrameQueue::new());
        let mut consumer = consumer(&queue);
        let mut shown = PresentedCells::new();
        let start = Instant::now();

        assert_eq!(consumer.tick(start, &mut shown), ConsumerStatus::Waiting);
        queue.push(with_walls(&[gc(1, 1)]));
        queue.mark_producer_done();
        assert_eq!(consumer.tick(start + Duration::from_millis(20), &mut shown), ConsumerStatus::Finished);
        assert_eq!(consumer.tick(start + Duration::from_millis(40), &mut shown), ConsumerStatus::Finished);
        assert_eq!(shown.cells(StreamKind::Generation).len(), 1);
        assert_eq!(cells_with(consumer.grid().unwrap(), CellCode::Wall), vec![gc(1, 1)]);
    }

    #[test]
    fn cancelled_consumers_stop_popping() {
        let queue = Arc::new(FrameQueue::new());
        queue.push(with_walls(&[gc(1, 1)]));
        let mut consumer = consumer(&queue);
        let mut recorder = Recorder::default();
        consumer.cancel();
        assert_eq!(consumer.tick(Instant::now(), &mut recorder), ConsumerStatus::Cancelled);
        assert_eq!(queue.len(), 1);
        assert!(recorder.created.is_empty());
    }

    #[test]
    fn snapshots_for_another_grid_are_dropped() {
        let queue = Arc::new(FrameQueue::new());
        let small = GridDimensions::new(RowLength(2), ColumnLength(2)).unwrap();
        queue.push(Snapshot::from_cells(small, vec![CellCode::Wall; 4]).unwrap());
        queue.push(with_walls(&[gc(0, 0)]));
        let mut consumer = consumer(&queue);
        let mut recorder = Recorder::default();
        consumer.tick(Instant::now(), &mut recorder);
        assert_eq!(consumer.frames_dropped(), 1);
        assert_eq!(recorder.created, vec![gc(0, 0)]);
    }

    #[test]
    fn clearing_removes_everything_shown() {
        let queue = Arc::new(FrameQueue::new());
        queue.push(with_walls(&[gc(1, 1), gc(2, 2)]));
        let mut consumer = consumer(&queue);
        let mut shown = PresentedCells::new();
        consumer.tick(Instant::now(), &mut shown);
        consumer.clear(&mut shown);
        assert!(shown.cells(StreamKind::Generation).is_empty());
        assert_eq!(consumer.status(), ConsumerStatus::Cancelled);
    }
}
