use crate::model::ExperimentResult;
use crate::report::StatusFilter;
use crate::storage::RunSummary;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Text,
    Json,
    Markdown,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Text => "txt",
            ExportFormat::Json => "json",
            ExportFormat::Markdown => "md",
        }
    }
}

/// Everything an export needs: the run's summary and the (already filtered) rows.
#[derive(Debug, Clone, Copy)]
pub struct ExportInput<'a> {
    pub summary: &'a RunSummary,
    pub results: &'a [ExperimentResult],
    pub filter: StatusFilter,
}

/// `<dir>/results_<first 8 chars of run id>_<timestamp>.<ext>`
pub fn default_export_path(
    dir: &Path,
    run_id: &str,
    format: ExportFormat,
    now: DateTime<Utc>,
) -> PathBuf {
    let prefix: String = run_id.chars().take(8).collect();
    dir.join(format!(
        "results_{}_{}.{}",
        prefix,
        now.format("%Y%m%d_%H%M%S"),
        format.extension()
    ))
}

pub fn write_export(format: ExportFormat, input: ExportInput<'_>, out: &Path) -> anyhow::Result<()> {
    match format {
        ExportFormat::Text => write_text(input, out),
        ExportFormat::Json => write_json(input, out),
        ExportFormat::Markdown => write_markdown(input, out),
    }
}

fn ensure_parent(out: &Path) -> anyhow::Result<()> {
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

pub fn write_json(input: ExportInput<'_>, out: &Path) -> anyhow::Result<()> {
    let v = serde_json::json!({
        "run_id": input.summary.run.run_id,
        "status_filter": input.filter.as_str(),
        "summary": input.summary,
        "results": input.results,
    });
    ensure_parent(out)?;
    std::fs::write(out, serde_json::to_string_pretty(&v)?)?;
    Ok(())
}

pub fn write_markdown(input: ExportInput<'_>, out: &Path) -> anyhow::Result<()> {
    ensure_parent(out)?;
    std::fs::write(out, render_markdown(input))?;
    Ok(())
}

pub fn write_text(input: ExportInput<'_>, out: &Path) -> anyhow::Result<()> {
    ensure_parent(out)?;
    std::fs::write(out, render_text(input))?;
    Ok(())
}

fn fmt_ts(t: Option<DateTime<Utc>>) -> String {
    t.map(|t| t.to_rfc3339()).unwrap_or_else(|| "Unknown".into())
}

fn observed_note(r: &ExperimentResult) -> String {
    match r.record.observed_model.as_deref() {
        Some(m) if m == r.record.combination.model_id => format!("{m} ✓ (matches config)"),
        Some(m) => format!("{m} ⚠️  (differs from config)"),
        None => "Not captured".to_string(),
    }
}

fn error_message(r: &ExperimentResult) -> &str {
    r.record
        .error
        .as_ref()
        .map(|e| e.message.as_str())
        .unwrap_or("Unknown error")
}

/// Grouped report: prompt, then test case, then model.
#[must_use]
pub fn render_markdown(input: ExportInput<'_>) -> String {
    let s = input.summary;
    let mut out = format!("# Experiment results `{}`\n\n", s.run.run_id);
    let _ = writeln!(out, "| | |\n|---|---|");
    let _ = writeln!(out, "| Started | {} |", fmt_ts(Some(s.run.started_at)));
    let _ = writeln!(out, "| Completed | {} |", fmt_ts(s.run.completed_at));
    let _ = writeln!(
        out,
        "| Successful | {}/{} ({:.1}%) |",
        s.successful,
        s.stored_count,
        s.success_rate()
    );
    let _ = writeln!(out, "| Status filter | {} |", input.filter.as_str());
    if let Some(cfg) = &s.run.config {
        let _ = writeln!(
            out,
            "| Execution | {} ({} concurrent, {}s delay) |",
            cfg.execution_mode.as_str(),
            cfg.max_concurrent_requests,
            cfg.request_delay_seconds
        );
    }

    let mut grouped: BTreeMap<&str, BTreeMap<&str, Vec<&ExperimentResult>>> = BTreeMap::new();
    for r in input.results {
        let c = &r.record.combination;
        grouped
            .entry(c.prompt_id.as_str())
            .or_default()
            .entry(c.test_case_id.as_str())
            .or_default()
            .push(r);
    }

    for (prompt, cases) in grouped {
        let _ = writeln!(out, "\n## Prompt `{prompt}`");
        for (case, mut rows) in cases {
            let _ = writeln!(out, "\n### Test case `{case}`");
            rows.sort_by(|a, b| a.record.combination.model_id.cmp(&b.record.combination.model_id));
            for r in rows {
                let _ = writeln!(
                    out,
                    "\n#### {} ({})\n\nResponse model: {}\n",
                    r.record.combination.model_id,
                    r.record.status,
                    observed_note(r)
                );
                match &r.record.response_text {
                    Some(text) if r.record.status.is_success() => {
                        let _ = writeln!(out, "```\n{text}\n```");
                    }
                    _ => {
                        let _ = writeln!(out, "> Error: {}", error_message(r));
                    }
                }
            }
        }
    }
    out
}

/// Plain-text report with a commented metadata header and one block per result.
#[must_use]
pub fn render_text(input: ExportInput<'_>) -> String {
    let s = input.summary;
    let total = input.results.len();
    let mut out = String::new();
    let _ = writeln!(out, "# Experimental Results Export");
    let _ = writeln!(out, "# Run ID: {}", s.run.run_id);
    let _ = writeln!(out, "# Export Date: {}", Utc::now().format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(out, "# Total Results: {}", total);
    let _ = writeln!(out, "# Status Filter: {}", input.filter.as_str());
    let _ = writeln!(out, "#\n# === RUN METADATA ===");
    let _ = writeln!(out, "# Run Started: {}", fmt_ts(Some(s.run.started_at)));
    let _ = writeln!(
        out,
        "# Run Completed: {}",
        fmt_ts(s.run.completed_at.or(s.last_recorded_at))
    );
    let _ = writeln!(
        out,
        "# Success Rate: {}/{} ({:.1}%)",
        s.successful,
        s.stored_count,
        s.success_rate()
    );
    let _ = writeln!(out, "# Unique Prompts: {}", s.prompts.len());
    let _ = writeln!(out, "# Unique Test Cases: {}", s.test_cases.len());
    let _ = writeln!(out, "# Configured Models: {}", s.models.len());
    let _ = writeln!(out, "# Response Models: {}", s.observed_models.len());
    if let Some(cfg) = &s.run.config {
        let _ = writeln!(out, "#\n# === CONFIGURATION SNAPSHOT ===");
        let _ = writeln!(
            out,
            "# Max Concurrent Requests: {}",
            cfg.max_concurrent_requests
        );
        let _ = writeln!(out, "# Request Delay: {}s", cfg.request_delay_seconds);
        let _ = writeln!(out, "# Execution Mode: {}", cfg.execution_mode.as_str());
        let _ = writeln!(out, "# Configured Models: {}", cfg.models.join(", "));
        let _ = writeln!(out, "# Prompts Count: {}", cfg.prompts_count);
        let _ = writeln!(out, "# Test Cases Count: {}", cfg.test_cases_count);
    }
    let _ = writeln!(out, "#\n# === EXPERIMENTAL RESULTS ===\n#\n");

    for (i, r) in input.results.iter().enumerate() {
        let c = &r.record.combination;
        let _ = writeln!(out, "---\n");
        let _ = writeln!(out, "EXPERIMENT {}/{}", i + 1, total);
        let _ = writeln!(out, "TIMESTAMP: {}", r.recorded_at.to_rfc3339());
        let _ = writeln!(out, "STATUS: {}\n", r.record.status);
        let _ = writeln!(out, "TEST CASE: {}", stem(&c.test_case_id));
        let _ = writeln!(out, "CONFIGURED MODEL: {}", c.model_id);
        let _ = writeln!(out, "RESPONSE MODEL: {}", observed_note(r));
        let _ = writeln!(out, "PROMPT FILE: {}\n", stem(&c.prompt_id));
        let _ = writeln!(out, "SYSTEM MESSAGE:\n{}\n", r.record.system_text);
        let _ = writeln!(out, "USER MESSAGE:\n{}\n", r.record.user_text);
        match &r.record.response_text {
            Some(text) if r.record.status.is_success() && !text.is_empty() => {
                let _ = writeln!(out, "ASSISTANT MESSAGE:\n{}\n", text);
            }
            _ => {
                let _ = writeln!(out, "[EXPERIMENT FAILED - Status: {}]", r.record.status);
                let _ = writeln!(out, "Error: {}\n", error_message(r));
            }
        }
    }
    out.push_str("---\n");
    out
}

fn stem(id: &str) -> &str {
    Path::new(id)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(id)
}
