use crate::model::{
    Combination, ConfigSnapshot, ErrorDetails, ExperimentRecord, ExperimentResult, ResultStatus,
    TokenUsage,
};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub(crate) const EXPERIMENT_COLUMNS: &str = "id, run_id, recorded_at, prompt_id, test_case_id, \
     model_id, observed_model, system_text, user_text, response_text, status, error_json, \
     usage_json, finish_reason, duration_ms";

pub(crate) const RUN_COLUMNS: &str =
    "run_id, started_at, completed_at, total_count, successful_count, config_json";

/// Run-level bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    /// Absent while the run is in progress (or was interrupted).
    pub completed_at: Option<DateTime<Utc>>,
    pub total_count: u64,
    pub successful_count: Option<u64>,
    pub config: Option<ConfigSnapshot>,
}

impl RunRecord {
    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }
}

/// Aggregate view of one run: declared metadata plus counts over the stored rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run: RunRecord,
    pub stored_count: u64,
    pub successful: u64,
    pub failed: u64,
    pub status_counts: BTreeMap<ResultStatus, u64>,
    pub prompts: Vec<String>,
    pub test_cases: Vec<String>,
    pub models: Vec<String>,
    pub observed_models: Vec<String>,
    pub first_recorded_at: Option<DateTime<Utc>>,
    pub last_recorded_at: Option<DateTime<Utc>>,
}

impl RunSummary {
    /// Percentage of stored rows that succeeded; 0 for an empty run.
    pub fn success_rate(&self) -> f64 {
        if self.stored_count == 0 {
            0.0
        } else {
            self.successful as f64 / self.stored_count as f64 * 100.0
        }
    }
}

fn conversion_error(
    idx: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

pub(crate) fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn parse_json<T: DeserializeOwned>(idx: usize, raw: Option<String>) -> rusqlite::Result<Option<T>> {
    raw.filter(|s| !s.trim().is_empty())
        .map(|s| serde_json::from_str(&s).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

pub(crate) fn row_to_experiment(row: &rusqlite::Row<'_>) -> rusqlite::Result<ExperimentResult> {
    let status_raw: String = row.get(10)?;
    let status = ResultStatus::parse(&status_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            10,
            Type::Text,
            format!("unknown status '{status_raw}'").into(),
        )
    })?;
    let recorded_at: String = row.get(2)?;

    Ok(ExperimentResult {
        id: row.get(0)?,
        run_id: row.get(1)?,
        recorded_at: parse_ts(2, &recorded_at)?,
        record: ExperimentRecord {
            combination: Combination {
                prompt_id: row.get(3)?,
                test_case_id: row.get(4)?,
                model_id: row.get(5)?,
            },
            observed_model: row.get(6)?,
            system_text: row.get(7)?,
            user_text: row.get(8)?,
            response_text: row.get(9)?,
            status,
            error: parse_json::<ErrorDetails>(11, row.get(11)?)?,
            usage: parse_json::<TokenUsage>(12, row.get(12)?)?,
            finish_reason: row.get(13)?,
            duration_ms: row.get::<_, i64>(14)?.max(0) as u64,
        },
    })
}

pub(crate) fn row_to_run(row: &rusqlite::Row<'_>) -> rusqlite::Result<RunRecord> {
    let started_at: String = row.get(1)?;
    let completed_at: Option<String> = row.get(2)?;
    Ok(RunRecord {
        run_id: row.get(0)?,
        started_at: parse_ts(1, &started_at)?,
        completed_at: completed_at.map(|s| parse_ts(2, &s)).transpose()?,
        total_count: row.get::<_, i64>(3)?.max(0) as u64,
        successful_count: row.get::<_, Option<i64>>(4)?.map(|n| n.max(0) as u64),
        config: parse_json::<ConfigSnapshot>(5, row.get(5)?)?,
    })
}
