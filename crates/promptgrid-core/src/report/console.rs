use crate::model::{ExperimentResult, ResultStatus};
use crate::report::progress::{ProgressEvent, ProgressSink};
use crate::storage::{RunRecord, RunSummary};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

/// Longest error excerpt shown on a progress line.
pub const ERROR_EXCERPT_CHARS: usize = 100;

const RULE: &str = "------------------------------------------------------------";

/// Format one progress event. Deterministic, unit-testable.
#[must_use]
pub fn format_progress_line(ev: &ProgressEvent) -> String {
    if ev.status.is_success() {
        format!(
            "  [{}/{}] ✓ {} ({:.2}s)",
            ev.done,
            ev.total,
            ev.combination,
            ev.duration_ms as f64 / 1000.0
        )
    } else {
        let mut line = format!(
            "  [{}/{}] ✗ {} - {}",
            ev.done, ev.total, ev.combination, ev.status
        );
        if let Some(msg) = &ev.error {
            let _ = write!(
                line,
                "\n    Error: {}",
                truncate_message(msg, ERROR_EXCERPT_CHARS)
            );
        }
        line
    }
}

/// Cut to `max` characters, marking the cut with `...`.
pub fn truncate_message(msg: &str, max: usize) -> String {
    if msg.chars().count() > max {
        let head: String = msg.chars().take(max).collect();
        format!("{head}...")
    } else {
        msg.to_string()
    }
}

/// Sink that prints every event to stderr.
pub fn console_progress_sink() -> ProgressSink {
    Arc::new(|ev: ProgressEvent| eprintln!("{}", format_progress_line(&ev)))
}

pub fn print_run_header(
    run_id: &str,
    total: usize,
    prompts: usize,
    test_cases: usize,
    models: usize,
    max_concurrent: usize,
) {
    eprintln!("Starting experimental run: {}", run_id);
    eprintln!("Total combinations to test: {}", total);
    eprintln!("Prompts: {}", prompts);
    eprintln!("Test cases: {}", test_cases);
    eprintln!("Models: {}", models);
    eprintln!("Max concurrent requests: {}", max_concurrent);
    eprintln!("{RULE}");
}

#[must_use]
pub fn format_run_footer(run_id: &str, successful: usize, total: usize) -> String {
    let rate = if total == 0 {
        0.0
    } else {
        successful as f64 / total as f64 * 100.0
    };
    format!(
        "{RULE}\nRun {} completed: {}/{} successful ({:.1}%)",
        run_id, successful, total, rate
    )
}

pub fn print_run_footer(run_id: &str, successful: usize, total: usize) {
    eprintln!("{}", format_run_footer(run_id, successful, total));
}

fn fit(s: &str, width: usize) -> String {
    if s.chars().count() > width {
        let head: String = s.chars().take(width.saturating_sub(1)).collect();
        format!("{head}…")
    } else {
        s.to_string()
    }
}

#[must_use]
pub fn format_results_table(results: &[ExperimentResult]) -> String {
    if results.is_empty() {
        return "No results to display.".to_string();
    }
    let wide = "-".repeat(100);
    let mut out = format!("Results ({} experiments):\n{wide}\n", results.len());
    let _ = writeln!(
        out,
        "{:<20} {:<20} {:<18} {:<18} {:<14}",
        "Prompt", "Test Case", "Config Model", "Response Model", "Status"
    );
    let _ = writeln!(out, "{wide}");
    for r in results {
        let c = &r.record.combination;
        let _ = writeln!(
            out,
            "{:<20} {:<20} {:<18} {:<18} {:<14}",
            fit(&c.prompt_id, 20),
            fit(&c.test_case_id, 20),
            fit(&c.model_id, 18),
            fit(r.record.observed_model.as_deref().unwrap_or("N/A"), 18),
            r.record.status
        );
    }
    out
}

#[must_use]
pub fn format_results_summary(results: &[ExperimentResult]) -> String {
    if results.is_empty() {
        return "No results to display.".to_string();
    }
    let total = results.len();
    let mut counts: BTreeMap<ResultStatus, usize> = BTreeMap::new();
    for r in results {
        *counts.entry(r.record.status).or_default() += 1;
    }
    let successful = counts.get(&ResultStatus::Success).copied().unwrap_or(0);
    let pct = |n: usize| n as f64 / total as f64 * 100.0;

    let mut out = format!(
        "Results Summary ({total} experiments):\nSuccess rate: {successful}/{total} ({:.1}%)\n\nStatus breakdown:\n",
        pct(successful)
    );
    for (status, count) in counts {
        let _ = writeln!(out, "  {}: {} ({:.1}%)", status, count, pct(count));
    }
    out
}

fn ts(t: Option<DateTime<Utc>>) -> String {
    t.map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "N/A".into())
}

#[must_use]
pub fn format_run_summary(summary: &RunSummary) -> String {
    let run = &summary.run;
    let mut out = format!("Experimental Run: {}\n{}\n", run.run_id, "=".repeat(60));
    let _ = writeln!(out, "Total experiments: {}", summary.stored_count);
    let _ = writeln!(out, "Successful: {}", summary.successful);
    let _ = writeln!(out, "Success rate: {:.1}%", summary.success_rate());
    let _ = writeln!(out, "Unique prompts: {}", summary.prompts.len());
    let _ = writeln!(out, "Unique test cases: {}", summary.test_cases.len());
    let _ = writeln!(out, "Configured models: {}", summary.models.len());
    let _ = writeln!(out, "Response models: {}", summary.observed_models.len());
    let _ = writeln!(out, "Run started: {}", ts(Some(run.started_at)));
    let completed = match run.completed_at {
        Some(t) => ts(Some(t)),
        None => "not completed".to_string(),
    };
    let _ = writeln!(out, "Run completed: {}", completed);

    if let Some(cfg) = &run.config {
        let _ = writeln!(out, "\nConfiguration:");
        let _ = writeln!(
            out,
            "  Max concurrent requests: {}",
            cfg.max_concurrent_requests
        );
        let _ = writeln!(out, "  Request delay: {}s", cfg.request_delay_seconds);
        let _ = writeln!(out, "  Execution mode: {}", cfg.execution_mode.as_str());
        let _ = writeln!(out, "  Models: {}", cfg.models.join(", "));
    }

    if !summary.status_counts.is_empty() {
        let _ = writeln!(out, "\nStatus Breakdown:");
        for (status, count) in &summary.status_counts {
            let _ = writeln!(out, "  {}: {}", status, count);
        }
    }
    out
}

#[must_use]
pub fn format_run_list(runs: &[RunRecord]) -> String {
    if runs.is_empty() {
        return "No experimental runs found.".to_string();
    }
    let mut out = format!("Experimental Runs:\n{RULE}\n");
    for run in runs {
        let progress = match run.successful_count {
            Some(ok) if run.total_count > 0 => format!(
                "{}/{} ({:.1}%)",
                ok,
                run.total_count,
                ok as f64 / run.total_count as f64 * 100.0
            ),
            Some(ok) => format!("{}/{}", ok, run.total_count),
            None => format!("?/{} (not completed)", run.total_count),
        };
        let _ = writeln!(
            out,
            "{}: {} - {}",
            run.run_id,
            progress,
            ts(Some(run.started_at))
        );
    }
    out
}
