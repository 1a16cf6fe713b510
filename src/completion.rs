//! Deciding when a stream has ended.
//!
//! The engine has no end-of-stream signal. A stream is inferred complete when the count of
//! interesting cells stops changing for long enough (stability), or when the engine stops
//! reporting anything at all (silence). Every constant involved is a knob on
//! `CompletionPolicy`; the heuristic is best effort.

use std::fmt;
use std::time::Duration;

use crate::cells::CellCode;
use crate::grid_dimensions::GridDimensions;
use crate::units::FramesCount;

#[derive(Eq, PartialEq, Copy, Clone, Debug, Hash)]
pub enum StreamKind {
    Generation,
    Search,
}

pub const ALL_STREAM_KINDS: [StreamKind; 2] = [StreamKind::Generation, StreamKind::Search];

impl StreamKind {
    /// The cell code this stream tracks: walls while building, visited cells while searching.
    pub fn interesting(self) -> CellCode {
        match self {
            StreamKind::Generation => CellCode::Wall,
            StreamKind::Search => CellCode::Open,
        }
    }

    /// Stopping a generation abandons a half built maze, so the engine is torn down. A stopped
    /// search leaves the maze in place for the next one.
    pub fn tears_down_on_stop(self) -> bool {
        self == StreamKind::Generation
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            StreamKind::Generation => write!(f, "generation"),
            StreamKind::Search => write!(f, "search"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionPolicy {
    /// Fraction of the grid expected to end up interesting.
    pub expected_density: f32,
    /// Fraction of the expected count that makes silence or stability believable.
    pub reasonable_ratio: f32,
    /// Fraction of the expected count a stable stream must hold to complete.
    pub completion_ratio: f32,
    pub stability_limit: usize,
    pub silence_limit: usize,
    pub min_frames_for_silence: usize,
    pub max_frames: usize,
    pub poll_interval: Duration,
    pub max_consecutive_failures: u32,
    /// Log progress every this many accepted frames.
    pub progress_every: usize,
    pub start_attempts: u32,
    pub start_attempt_interval: Duration,
    pub stop_timeout: Duration,
}

fn clamp(value: usize, min: usize, max: usize) -> usize {
    value.max(min).min(max)
}

impl CompletionPolicy {
    pub fn generation(dimensions: GridDimensions) -> CompletionPolicy {
        let size = dimensions.size();
        CompletionPolicy {
            expected_density: 0.6,
            reasonable_ratio: 0.5,
            completion_ratio: 0.5,
            stability_limit: clamp(size / 30, 50, 300),
            silence_limit: clamp(size / 20, 100, 500),
            min_frames_for_silence: 100,
            max_frames: clamp(size.saturating_mul(10), 5000, 30000),
            poll_interval: Duration::from_millis(10),
            max_consecutive_failures: 50,
            progress_every: 100,
            start_attempts: 50,
            start_attempt_interval: Duration::from_millis(50),
            stop_timeout: Duration::from_millis(2000),
        }
    }

    pub fn search(dimensions: GridDimensions) -> CompletionPolicy {
        CompletionPolicy {
            expected_density: 0.8,
            reasonable_ratio: 0.1,
            completion_ratio: 0.1,
            stability_limit: 30,
            silence_limit: 200,
            min_frames_for_silence: 1,
            max_frames: dimensions.size().saturating_mul(10),
            poll_interval: Duration::from_millis(5),
            max_consecutive_failures: 50,
            progress_every: 20,
            start_attempts: 50,
            start_attempt_interval: Duration::from_millis(50),
            stop_timeout: Duration::from_millis(1000),
        }
    }

    pub fn for_kind(kind: StreamKind, dimensions: GridDimensions) -> CompletionPolicy {
        match kind {
            StreamKind::Generation => CompletionPolicy::generation(dimensions),
            StreamKind::Search => CompletionPolicy::search(dimensions),
        }
    }

    pub fn expected_count(&self, dimensions: GridDimensions) -> f32 {
        dimensions.size() as f32 * self.expected_density
    }
}

#[derive(Eq, PartialEq, Copy, Clone, Debug)]
pub enum CompletionReason {
    /// The interesting count held steady for longer than the stability limit.
    Stable,
    /// The engine went quiet after producing a believable stream.
    Silent,
    /// The engine went quiet for twice the silence limit without a believable stream.
    ForcedAfterSilence,
    FrameLimit,
}

impl fmt::Display for CompletionReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let text = match *self {
            CompletionReason::Stable => "interesting cell count stable",
            CompletionReason::Silent => "engine went silent",
            CompletionReason::ForcedAfterSilence => "forced stop after prolonged silence",
            CompletionReason::FrameLimit => "frame limit reached",
        };
        write!(f, "{}", text)
    }
}

#[derive(Eq, PartialEq, Copy, Clone, Debug)]
pub enum Verdict {
    Continue,
    Complete(CompletionReason),
    /// Silence before any data at all.
    NoData,
}

/// Per-session state of the completion heuristic.
#[derive(Debug, Clone)]
pub struct StabilityTracker {
    policy: CompletionPolicy,
    expected: f32,
    last_count: Option<usize>,
    same_count_streak: usize,
    empty_polls: usize,
    reasonable_reached: bool,
    frames_accepted: FramesCount,
    any_data: bool,
}

impl StabilityTracker {
    pub fn new(policy: CompletionPolicy, dimensions: GridDimensions) -> StabilityTracker {
        let expected = policy.expected_count(dimensions);
        StabilityTracker {
            policy,
            expected,
            last_count: None,
            same_count_streak: 0,
            empty_polls: 0,
            reasonable_reached: false,
            frames_accepted: FramesCount(0),
            any_data: false,
        }
    }

    pub fn policy(&self) -> &CompletionPolicy {
        &self.policy
    }

    pub fn frames_accepted(&self) -> FramesCount {
        self.frames_accepted
    }

    pub fn same_count_streak(&self) -> usize {
        self.same_count_streak
    }

    pub fn empty_polls(&self) -> usize {
        self.empty_polls
    }

    pub fn reasonable_reached(&self) -> bool {
        self.reasonable_reached
    }

    pub fn any_data(&self) -> bool {
        self.any_data
    }

    pub fn last_count(&self) -> Option<usize> {
        self.last_count
    }

    pub fn frame_limit_reached(&self) -> bool {
        self.frames_accepted.0 >= self.policy.max_frames
    }

    /// Fraction of the expected interesting count seen in the most recent frame.
    pub fn completion_fraction(&self) -> f32 {
        match self.last_count {
            Some(count) if self.expected > 0.0 => count as f32 / self.expected,
            _ => 0.0,
        }
    }

    /// A frame was accepted into the queue with `interesting` tracked cells.
    pub fn on_frame(&mut self, interesting: usize) -> Verdict {
        self.frames_accepted.0 += 1;
        self.any_data = true;
        self.empty_polls = 0;

        let count = interesting as f32;
        if count >= self.policy.reasonable_ratio * self.expected {
            self.reasonable_reached = true;
        }

        if self.last_count != Some(interesting) {
            self.last_count = Some(interesting);
            self.same_count_streak = 0;
            return Verdict::Continue;
        }

        self.same_count_streak += 1;
        if self.same_count_streak > self.policy.stability_limit {
            if self.reasonable_reached && count >= self.policy.completion_ratio * self.expected {
                return Verdict::Complete(CompletionReason::Stable);
            }
            debug!("count {} stable for {} polls but below {:.0} expected, waiting on",
                   interesting, self.same_count_streak, self.expected);
            self.same_count_streak = self.policy.stability_limit / 2;
        }
        Verdict::Continue
    }

    /// A poll produced nothing worth queueing.
    pub fn on_empty_poll(&mut self) -> Verdict {
        self.empty_polls += 1;
        if self.empty_polls < self.policy.silence_limit {
            return Verdict::Continue;
        }
        if !self.any_data {
            return Verdict::NoData;
        }
        if self.reasonable_reached && self.frames_accepted.0 >= self.policy.min_frames_for_silence {
            return Verdict::Complete(CompletionReason::Silent);
        }
        if self.empty_polls >= self.policy.silence_limit.saturating_mul(2) {
            return Verdict::Complete(CompletionReason::ForcedAfterSilence);
        }
        Verdict::Continue
    }
}
