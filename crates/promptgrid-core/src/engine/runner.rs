use super::combinations::CombinationSpace;
use crate::errors::CompletionError;
use crate::model::{
    Combination, ConfigSnapshot, ErrorDetails, ExecutionMode, ExperimentRecord, ResultStatus,
};
use crate::providers::{CompletionClient, CompletionResponse};
use crate::report::progress::{ProgressEvent, ProgressSink};
use crate::sources::ExperimentSource;
use crate::storage::Store;
use anyhow::Context;
use std::sync::Arc;
use tokio::task::{AbortHandle, JoinError, JoinSet};
use tokio::time::Instant;

#[derive(Clone)]
pub struct Runner {
    pub store: Store,
    pub client: Arc<CompletionClient>,
    pub source: Arc<dyn ExperimentSource>,
    /// Models to run; empty means every model the client is configured with.
    pub models: Vec<String>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub progress: Option<ProgressSink>,
}

impl Runner {
    pub fn new(store: Store, client: Arc<CompletionClient>, source: Arc<dyn ExperimentSource>) -> Self {
        Self {
            store,
            client,
            source,
            models: Vec::new(),
            temperature: 0.1,
            max_tokens: None,
            progress: None,
        }
    }

    pub fn with_models(mut self, models: Vec<String>) -> Self {
        self.models = models;
        self
    }

    pub fn with_progress(mut self, sink: ProgressSink) -> Self {
        self.progress = Some(sink);
        self
    }

    /// Re-derives the product from the current prompt, test-case and model sets.
    pub fn enumerate_combinations(&self) -> anyhow::Result<CombinationSpace> {
        let prompts = self.source.prompt_ids().context("failed to discover prompts")?;
        let test_cases = self
            .source
            .test_case_ids()
            .context("failed to discover test cases")?;
        let models = if self.models.is_empty() {
            self.client.list_models()
        } else {
            self.models.clone()
        };
        Ok(CombinationSpace::new(prompts, test_cases, models))
    }

    /// Execute one combination. Completion failures become data in the returned
    /// record; only loading the input texts can fail.
    pub async fn run_once(&self, combo: &Combination) -> anyhow::Result<ExperimentRecord> {
        let system_text = self
            .source
            .load_prompt(&combo.prompt_id)
            .with_context(|| format!("failed to load prompt {}", combo.prompt_id))?;
        let user_text = self
            .source
            .load_test_case(&combo.test_case_id)
            .with_context(|| format!("failed to load test case {}", combo.test_case_id))?;

        let started = Instant::now();
        // Own task so a panicking provider is recorded like any other failure.
        let call = {
            let client = self.client.clone();
            let (system, user, model) = (
                system_text.clone(),
                user_text.clone(),
                combo.model_id.clone(),
            );
            let (temperature, max_tokens) = (self.temperature, self.max_tokens);
            tokio::spawn(async move {
                client
                    .complete(&system, &user, &model, temperature, max_tokens)
                    .await
            })
        };
        let _abort = AbortOnDrop(call.abort_handle());
        let outcome = call.await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let mut record = ExperimentRecord {
            combination: combo.clone(),
            system_text,
            user_text,
            response_text: None,
            observed_model: None,
            status: ResultStatus::UnknownError,
            error: None,
            usage: None,
            finish_reason: None,
            duration_ms,
        };
        match outcome {
            Ok(Ok(resp)) => apply_response(&mut record, resp),
            Ok(Err(err)) => apply_completion_error(&mut record, &err),
            Err(join_err) => apply_task_failure(&mut record, join_err),
        }
        Ok(record)
    }

    /// Start (or resume) a run, execute every combination, persist each outcome and
    /// complete the run with the success count. Returns the run id.
    ///
    /// Load and storage failures abort the batch; rows written so far stay, and
    /// the run is left incomplete.
    pub async fn run_all(
        &self,
        mode: ExecutionMode,
        run_id: Option<String>,
    ) -> anyhow::Result<String> {
        let run_id = run_id.unwrap_or_else(Store::generate_run_id);
        let space = self.enumerate_combinations()?;
        let total = space.len();

        let gate = self.client.gate();
        let snapshot = ConfigSnapshot {
            models: space.models().to_vec(),
            max_concurrent_requests: gate.max_concurrent(),
            request_delay_seconds: gate.delay().as_secs_f64(),
            prompts_count: space.prompts().len(),
            test_cases_count: space.test_cases().len(),
            execution_mode: mode,
        };
        self.store
            .start_run(&run_id, total, &snapshot)
            .with_context(|| format!("failed to register run {run_id}"))?;
        tracing::info!(run_id = %run_id, total, mode = mode.as_str(), "run started");

        let mut tally = Tally::new(total, self.progress.clone());
        match mode {
            ExecutionMode::Sequential => self.run_sequential(&run_id, &space, &mut tally).await?,
            ExecutionMode::Concurrent => self.run_concurrent(&run_id, &space, &mut tally).await?,
        }

        self.store
            .complete_run(&run_id, tally.successful)
            .with_context(|| format!("failed to complete run {run_id}"))?;
        tracing::info!(
            run_id = %run_id,
            total,
            successful = tally.successful,
            "run completed"
        );
        Ok(run_id)
    }

    async fn run_sequential(
        &self,
        run_id: &str,
        space: &CombinationSpace,
        tally: &mut Tally,
    ) -> anyhow::Result<()> {
        for combo in space {
            let record = self.run_once(&combo).await?;
            self.store
                .store_result(run_id, &record)
                .with_context(|| format!("failed to store result for {combo}"))?;
            tally.record(record);
        }
        Ok(())
    }

    async fn run_concurrent(
        &self,
        run_id: &str,
        space: &CombinationSpace,
        tally: &mut Tally,
    ) -> anyhow::Result<()> {
        let mut join_set = JoinSet::new();
        for combo in space {
            let this = self.clone();
            let run_id = run_id.to_string();
            join_set.spawn(async move {
                let record = this.run_once(&combo).await?;
                this.store
                    .store_result(&run_id, &record)
                    .with_context(|| format!("failed to store result for {combo}"))?;
                anyhow::Ok(record)
            });
        }

        // Single consumer: counters and progress are only touched here.
        while let Some(res) = join_set.join_next().await {
            let record = res.context("experiment task failed")??;
            tally.record(record);
        }
        Ok(())
    }
}

/// Cancels the completion task if the caller stops waiting for it, so an
/// aborted batch does not leave calls holding gate permits.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn apply_response(record: &mut ExperimentRecord, resp: CompletionResponse) {
    record.status = ResultStatus::Success;
    record.response_text = Some(resp.content);
    record.observed_model = resp.model;
    record.usage = resp.usage;
    record.finish_reason = resp.finish_reason;
}

fn apply_completion_error(record: &mut ExperimentRecord, err: &CompletionError) {
    record.status = err
        .kind()
        .map(ResultStatus::from)
        .unwrap_or(ResultStatus::UnknownError);
    record.error = Some(ErrorDetails::new(err.error_type(), err.to_string()));
}

fn apply_task_failure(record: &mut ExperimentRecord, err: JoinError) {
    let message = if err.is_panic() {
        let payload = err.into_panic();
        payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "completion task panicked".to_string())
    } else {
        err.to_string()
    };
    record.status = ResultStatus::UnknownError;
    record.error = Some(ErrorDetails::new("TaskFailure", message));
}

/// Run-level accounting, owned by whichever loop collects outcomes.
struct Tally {
    total: usize,
    done: usize,
    successful: usize,
    progress: Option<ProgressSink>,
}

impl Tally {
    fn new(total: usize, progress: Option<ProgressSink>) -> Self {
        Self {
            total,
            done: 0,
            successful: 0,
            progress,
        }
    }

    fn record(&mut self, record: ExperimentRecord) {
        self.done += 1;
        if record.status.is_success() {
            self.successful += 1;
        }
        tracing::debug!(
            combination = %record.combination,
            status = record.status.as_str(),
            duration_ms = record.duration_ms,
            "experiment finished"
        );
        if let Some(sink) = &self.progress {
            sink(ProgressEvent {
                done: self.done,
                total: self.total,
                combination: record.combination,
                status: record.status,
                duration_ms: record.duration_ms,
                error: record.error.map(|e| e.message),
            });
        }
    }
}
