//! wf-exec - Run coordinator for Wharf
//!
//! Executes a [`wf_core::TaskGraph`] against a warehouse: operators run as
//! soon as their predecessors succeed, bounded by a worker count, with
//! per-task retries and failure propagation to downstream tasks.

pub mod context;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod operators;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;

pub use context::RunContext;
pub use coordinator::{CancelSignal, CoordinatorOptions, RunCoordinator};
pub use error::OperatorError;
pub use events::{ChannelEventSink, CollectingEventSink, EventSink, LogEventSink};
pub use operators::Execute;
