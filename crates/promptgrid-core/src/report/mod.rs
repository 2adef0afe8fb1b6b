pub mod console;
pub mod export;
pub mod progress;

use crate::model::ExperimentResult;

/// Which stored results a listing or export includes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Success,
    Failed,
}

impl StatusFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusFilter::All => "all",
            StatusFilter::Success => "success",
            StatusFilter::Failed => "failed",
        }
    }

    pub fn matches(&self, result: &ExperimentResult) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Success => result.record.status.is_success(),
            StatusFilter::Failed => !result.record.status.is_success(),
        }
    }

    pub fn apply(&self, results: Vec<ExperimentResult>) -> Vec<ExperimentResult> {
        results.into_iter().filter(|r| self.matches(r)).collect()
    }
}
