use super::{open_store, resolve_run_id};
use crate::cli::args::ExportArgs;
use crate::exit_codes;
use promptgrid_core::report::export::{default_export_path, write_export, ExportFormat, ExportInput};
use promptgrid_core::report::StatusFilter;
use std::path::Path;

const DEFAULT_EXPORT_DIR: &str = "exports";

pub fn cmd_export(args: ExportArgs) -> anyhow::Result<i32> {
    let store = open_store(&args.store.db)?;
    let Some(run_id) = resolve_run_id(&store, args.run_id)? else {
        eprintln!("No experimental runs found.");
        return Ok(exit_codes::COMMAND_FAILED);
    };
    let Some(summary) = store.get_run_summary(&run_id)? else {
        eprintln!("No results found for run ID: {run_id}");
        return Ok(exit_codes::COMMAND_FAILED);
    };

    let filter = StatusFilter::from(args.status);
    let results = filter.apply(store.get_results_by_run(&run_id)?);
    let format = ExportFormat::from(args.format);
    let out = args.output.unwrap_or_else(|| {
        default_export_path(
            Path::new(DEFAULT_EXPORT_DIR),
            &run_id,
            format,
            chrono::Utc::now(),
        )
    });

    let input = ExportInput {
        summary: &summary,
        results: &results,
        filter,
    };
    write_export(format, input, &out)?;
    tracing::info!(run_id = %run_id, rows = results.len(), path = %out.display(), "export written");
    eprintln!(
        "Exported {} results ({}) to {}",
        results.len(),
        filter.as_str(),
        out.display()
    );
    Ok(exit_codes::SUCCESS)
}
