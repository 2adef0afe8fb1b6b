//! Progress reporting. The runner's aggregating loop emits one event per finished
//! combination, in completion order; the console layer consumes them via a sink.

use crate::model::{Combination, ResultStatus};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub done: usize,
    pub total: usize,
    pub combination: Combination,
    pub status: ResultStatus,
    pub duration_ms: u64,
    /// Present for failing statuses.
    pub error: Option<String>,
}

/// Sink for progress events. Called from a single task, never concurrently.
pub type ProgressSink = Arc<dyn Fn(ProgressEvent) + Send + Sync>;
