pub mod client;
pub mod gate;
pub mod llm;

pub use client::CompletionClient;
pub use gate::{GatePermit, RequestGate};
pub use llm::{ChatRequest, CompletionResponse, LlmProvider};
