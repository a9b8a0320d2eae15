//! Background workers.

pub mod rating_sweep;

pub use rating_sweep::{RatingSweepWorker, WorkerHandle};
