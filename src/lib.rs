//! **maze_stream** plays a maze engine's generation and search back as a live stream of cell
//! edits.
//!
//! A polling thread per stream pulls whole-grid snapshots from the engine, decides when the
//! stream is done, and queues what it captured; the owning thread drains the queue, diffs
//! successive snapshots and hands throttled cell edits to a presentation layer. Calls the
//! engine only allows on its owning thread are marshalled there through an executor.

#[macro_use]
extern crate error_chain;
#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;

pub mod cells;
pub mod completion;
pub mod config;
pub mod consumer;
pub mod diff;
pub mod endpoints;
pub mod engine;
pub mod errors;
pub mod executor;
pub mod frame_queue;
pub mod grid;
pub mod grid_dimensions;
pub mod presentation;
pub mod producer;
pub mod session;
pub mod snapshot;
pub mod units;
mod utils;
