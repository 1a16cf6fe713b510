use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam::queue::SegQueue;

use crate::snapshot::Snapshot;

/// FIFO hand-off of snapshots from one producer thread to the owning thread.
///
/// A queue belongs to one stream session; a new session gets a new queue, so frames and the
/// finished flag of a stopped session can never leak into its successor.
#[derive(Debug, Default)]
pub struct FrameQueue {
    frames: SegQueue<Snapshot>,
    producer_done: AtomicBool,
}

impl FrameQueue {
    pub fn new() -> FrameQueue {
        FrameQueue::default()
    }

    pub fn push(&self, snapshot: Snapshot) {
        self.frames.push(snapshot);
    }

    pub fn try_pop(&self) -> Option<Snapshot> {
        self.frames.pop()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// No more pushes will follow.
    pub fn mark_producer_done(&self) {
        self.producer_done.store(true, Ordering::Release);
    }

    pub fn is_producer_done(&self) -> bool {
        self.producer_done.load(Ordering::Acquire)
    }

    /// Producer done and everything consumed. Once true it stays true.
    pub fn is_finished(&self) -> bool {
        self.is_producer_done() && self.frames.is_empty()
    }
}
