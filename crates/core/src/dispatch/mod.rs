//! Dispatch strategies for inbound messages.
//!
//! A stage runs exactly one strategy: the [`WorkerPool`] when messages may
//! process independently, or the [`SequentialLane`] when downstream work must
//! not overlap.

mod lane;
mod pool;

pub use lane::{LaneError, LaneWorker, SequentialLane};
pub use pool::WorkerPool;
