use super::rows::{
    parse_ts, row_to_experiment, row_to_run, RunRecord, RunSummary, EXPERIMENT_COLUMNS,
    RUN_COLUMNS,
};
use super::{now_rfc3339, StoreError};
use crate::model::{ConfigSnapshot, ExperimentRecord, ExperimentResult, ResultStatus};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed result store. Cheap to clone; clones share one connection,
/// so writes are serialized per physical store.
#[derive(Clone)]
pub struct Store {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open a file-backed store, creating parent directories as needed.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Unavailable(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }
        let conn = Connection::open(path)?;
        Self::init_connection(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory store (for testing).
    pub fn memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_connection(conn: &Connection) -> Result<(), StoreError> {
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        // no-op for in-memory databases
        let _mode: Option<String> = conn
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
            .optional()?;
        Ok(())
    }

    pub fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute_batch(super::schema::DDL)?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("store connection lock poisoned".to_string()))
    }

    /// Fresh, globally unique run identifier.
    pub fn generate_run_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// Register a run before any result is written. Calling again with the same
    /// identifier keeps `started_at`, replaces the total and snapshot, and
    /// reopens the run.
    pub fn start_run(
        &self,
        run_id: &str,
        total_count: usize,
        snapshot: &ConfigSnapshot,
    ) -> Result<(), StoreError> {
        if run_id.trim().is_empty() {
            return Err(StoreError::Malformed("run_id must not be empty".into()));
        }
        let config_json =
            serde_json::to_string(snapshot).map_err(|e| StoreError::Malformed(e.to_string()))?;

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO runs(run_id, started_at, completed_at, total_count, successful_count, config_json)
             VALUES (?1, ?2, NULL, ?3, NULL, ?4)
             ON CONFLICT(run_id) DO UPDATE SET
               completed_at = NULL,
               total_count = excluded.total_count,
               successful_count = NULL,
               config_json = excluded.config_json",
            params![run_id, now_rfc3339(), total_count as i64, config_json],
        )?;
        Ok(())
    }

    /// Insert or atomically replace the row for this combination within the run.
    /// Returns the row id, stable across overwrites.
    pub fn store_result(&self, run_id: &str, record: &ExperimentRecord) -> Result<i64, StoreError> {
        validate_record(record)?;
        let error_json = record
            .error
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| StoreError::Malformed(e.to_string()))?;
        let usage_json = record
            .usage
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| StoreError::Malformed(e.to_string()))?;

        let conn = self.lock()?;
        conn.execute("BEGIN IMMEDIATE", [])?;

        let result = (|| -> Result<i64, StoreError> {
            let known: Option<i64> = conn
                .query_row("SELECT 1 FROM runs WHERE run_id = ?1", [run_id], |row| {
                    row.get(0)
                })
                .optional()?;
            if known.is_none() {
                return Err(StoreError::RunNotFound(run_id.to_string()));
            }

            let c = &record.combination;
            let id = conn.query_row(
                "INSERT INTO experiments(
                   run_id, recorded_at, prompt_id, test_case_id, model_id, observed_model,
                   system_text, user_text, response_text, status, error_json, usage_json,
                   finish_reason, duration_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                 ON CONFLICT(run_id, prompt_id, test_case_id, model_id) DO UPDATE SET
                   recorded_at = excluded.recorded_at,
                   observed_model = excluded.observed_model,
                   system_text = excluded.system_text,
                   user_text = excluded.user_text,
                   response_text = excluded.response_text,
                   status = excluded.status,
                   error_json = excluded.error_json,
                   usage_json = excluded.usage_json,
                   finish_reason = excluded.finish_reason,
                   duration_ms = excluded.duration_ms
                 RETURNING id",
                params![
                    run_id,
                    now_rfc3339(),
                    c.prompt_id,
                    c.test_case_id,
                    c.model_id,
                    record.observed_model,
                    record.system_text,
                    record.user_text,
                    record.response_text,
                    record.status.as_str(),
                    error_json,
                    usage_json,
                    record.finish_reason,
                    record.duration_ms as i64,
                ],
                |row| row.get(0),
            )?;
            Ok(id)
        })();

        match &result {
            Ok(_) => commit_or_rollback(&conn)?,
            Err(_) => {
                let _ = conn.execute("ROLLBACK", []);
            }
        }
        result
    }

    /// Set completion time and final success count. Later calls overwrite.
    pub fn complete_run(&self, run_id: &str, successful_count: usize) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE runs SET completed_at = ?2, successful_count = ?3 WHERE run_id = ?1",
            params![run_id, now_rfc3339(), successful_count as i64],
        )?;
        if changed == 0 {
            return Err(StoreError::RunNotFound(run_id.to_string()));
        }
        Ok(())
    }

    /// Results of one run, ordered by recording time.
    pub fn get_results_by_run(&self, run_id: &str) -> Result<Vec<ExperimentResult>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {EXPERIMENT_COLUMNS} FROM experiments
             WHERE run_id = ?1
             ORDER BY recorded_at ASC, id ASC"
        ))?;
        let rows = stmt
            .query_map([run_id], row_to_experiment)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Most recently started run.
    pub fn get_latest_run_id(&self) -> Result<Option<String>, StoreError> {
        let conn = self.lock()?;
        let id = conn
            .query_row(
                "SELECT run_id FROM runs ORDER BY started_at DESC, rowid DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    /// All run identifiers, newest first.
    pub fn get_all_run_ids(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT run_id FROM runs ORDER BY started_at DESC, rowid DESC")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    /// Run metadata, oldest first.
    pub fn list_runs(&self) -> Result<Vec<RunRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {RUN_COLUMNS} FROM runs ORDER BY started_at ASC, rowid ASC"
        ))?;
        let runs = stmt
            .query_map([], row_to_run)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(runs)
    }

    pub fn get_run(&self, run_id: &str) -> Result<Option<RunRecord>, StoreError> {
        let conn = self.lock()?;
        let run = conn
            .query_row(
                &format!("SELECT {RUN_COLUMNS} FROM runs WHERE run_id = ?1"),
                [run_id],
                row_to_run,
            )
            .optional()?;
        Ok(run)
    }

    /// Results of the latest run; empty if nothing has been run yet.
    pub fn get_latest_results(&self) -> Result<Vec<ExperimentResult>, StoreError> {
        match self.get_latest_run_id()? {
            Some(run_id) => self.get_results_by_run(&run_id),
            None => Ok(Vec::new()),
        }
    }

    pub fn get_run_summary(&self, run_id: &str) -> Result<Option<RunSummary>, StoreError> {
        let Some(run) = self.get_run(run_id)? else {
            return Ok(None);
        };

        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT status, prompt_id, test_case_id, model_id, observed_model, recorded_at
             FROM experiments WHERE run_id = ?1",
        )?;
        let mut rows = stmt.query([run_id])?;

        let mut status_counts: BTreeMap<ResultStatus, u64> = BTreeMap::new();
        let mut prompts = BTreeSet::new();
        let mut test_cases = BTreeSet::new();
        let mut models = BTreeSet::new();
        let mut observed_models = BTreeSet::new();
        let mut first_recorded_at = None;
        let mut last_recorded_at = None;
        let mut stored_count = 0u64;

        while let Some(row) = rows.next()? {
            let status_raw: String = row.get(0)?;
            let status = ResultStatus::parse(&status_raw).ok_or_else(|| {
                StoreError::Malformed(format!("unknown status '{status_raw}' in run {run_id}"))
            })?;
            *status_counts.entry(status).or_default() += 1;
            prompts.insert(row.get::<_, String>(1)?);
            test_cases.insert(row.get::<_, String>(2)?);
            models.insert(row.get::<_, String>(3)?);
            if let Some(observed) = row.get::<_, Option<String>>(4)? {
                observed_models.insert(observed);
            }
            let recorded_at = parse_ts(5, &row.get::<_, String>(5)?)?;
            first_recorded_at = Some(first_recorded_at.map_or(recorded_at, |t| recorded_at.min(t)));
            last_recorded_at = Some(last_recorded_at.map_or(recorded_at, |t| recorded_at.max(t)));
            stored_count += 1;
        }

        let successful = status_counts
            .get(&ResultStatus::Success)
            .copied()
            .unwrap_or(0);
        Ok(Some(RunSummary {
            run,
            stored_count,
            successful,
            failed: stored_count - successful,
            status_counts,
            prompts: prompts.into_iter().collect(),
            test_cases: test_cases.into_iter().collect(),
            models: models.into_iter().collect(),
            observed_models: observed_models.into_iter().collect(),
            first_recorded_at,
            last_recorded_at,
        }))
    }
}

/// A failed COMMIT leaves the transaction open; roll it back so the shared
/// connection is usable for the next write.
fn commit_or_rollback(conn: &Connection) -> Result<(), StoreError> {
    if let Err(e) = conn.execute("COMMIT", []) {
        if !conn.is_autocommit() {
            let _ = conn.execute("ROLLBACK", []);
        }
        return Err(e.into());
    }
    Ok(())
}

fn validate_record(record: &ExperimentRecord) -> Result<(), StoreError> {
    let c = &record.combination;
    for (field, value) in [
        ("prompt_id", &c.prompt_id),
        ("test_case_id", &c.test_case_id),
        ("model_id", &c.model_id),
    ] {
        if value.trim().is_empty() {
            return Err(StoreError::Malformed(format!("{field} must not be empty")));
        }
    }
    match (record.status.is_success(), &record.error) {
        (true, Some(_)) => Err(StoreError::Malformed(format!(
            "{c}: successful result must not carry error details"
        ))),
        (false, None) => Err(StoreError::Malformed(format!(
            "{c}: status {} requires error details",
            record.status
        ))),
        _ if record.status.is_success() && record.response_text.is_none() => Err(
            StoreError::Malformed(format!("{c}: successful result requires a response")),
        ),
        _ => Ok(()),
    }
}
