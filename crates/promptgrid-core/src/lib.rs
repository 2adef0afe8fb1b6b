//! Experiment execution engine for prompt evaluation.
//!
//! Runs every prompt against every test case on every configured model,
//! classifies failures into a closed taxonomy and persists one row per
//! combination per run.
//!
//! ```text
//!  ExperimentSource ──▶ Runner ──▶ CompletionClient ──▶ LlmProvider
//!                         │              │
//!                         │         RequestGate (permits + pacing)
//!                         ▼
//!                       Store (SQLite)
//! ```

pub mod config;
pub mod engine;
pub mod errors;
pub mod model;
pub mod providers;
pub mod report;
pub mod sources;
pub mod storage;

pub use engine::{Combination, CombinationSpace, ExecutionMode, Runner};
pub use model::{ExperimentRecord, ExperimentResult, ResultStatus};
pub use providers::{CompletionClient, RequestGate};
pub use storage::Store;
