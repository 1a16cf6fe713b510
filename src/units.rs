// Row length is the x extent of a grid (the engine calls it `length`), column length the y
// extent (`width`).
#[derive(Eq, PartialEq, Copy, Clone, Debug, Hash)]
pub struct RowLength(pub usize);
#[derive(Eq, PartialEq, Copy, Clone, Debug, Hash)]
pub struct ColumnLength(pub usize);

/// Side length, in cells, of one carved corridor block.
#[derive(Eq, PartialEq, Copy, Clone, Debug)]
pub struct BlockLength(pub usize);

/// Number of snapshots a producer has accepted into its queue.
#[derive(Eq, PartialEq, Copy, Clone, Debug, Ord, PartialOrd, Default)]
pub struct FramesCount(pub usize);

/// Unique per started stream, lets the owning thread ignore events from a previous session.
#[derive(Eq, PartialEq, Copy, Clone, Debug, Hash, Ord, PartialOrd)]
pub struct SessionId(pub u64);
