use super::{open_store, resolve_run_id};
use crate::cli::args::{LatestArgs, ListFormat, ListRunsArgs, ResultsArgs, ResultsFormat};
use crate::exit_codes;
use promptgrid_core::report::console::{
    format_results_summary, format_results_table, format_run_list, format_run_summary,
};
use promptgrid_core::report::StatusFilter;

pub fn cmd_results(args: ResultsArgs) -> anyhow::Result<i32> {
    let store = open_store(&args.store.db)?;
    let Some(run_id) = resolve_run_id(&store, args.run_id)? else {
        println!("No experimental results found.");
        return Ok(exit_codes::COMMAND_FAILED);
    };
    let rows = store.get_results_by_run(&run_id)?;
    if rows.is_empty() {
        println!("No results found for run ID: {run_id}");
        return Ok(exit_codes::COMMAND_FAILED);
    }

    let rows = StatusFilter::from(args.status).apply(rows);
    match args.format {
        ResultsFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        ResultsFormat::Summary => {
            println!("Run: {run_id}");
            println!("{}", format_results_summary(&rows));
        }
        ResultsFormat::Table => {
            println!("Run: {run_id}");
            println!("{}", format_results_table(&rows));
        }
    }
    Ok(exit_codes::SUCCESS)
}

pub fn cmd_latest(args: LatestArgs) -> anyhow::Result<i32> {
    let store = open_store(&args.store.db)?;
    let Some(run_id) = store.get_latest_run_id()? else {
        println!("No experimental runs found.");
        return Ok(exit_codes::COMMAND_FAILED);
    };
    match store.get_run_summary(&run_id)? {
        Some(summary) => {
            println!("{}", format_run_summary(&summary));
            Ok(exit_codes::SUCCESS)
        }
        None => {
            println!("No results found for run ID: {run_id}");
            Ok(exit_codes::COMMAND_FAILED)
        }
    }
}

pub fn cmd_list_runs(args: ListRunsArgs) -> anyhow::Result<i32> {
    let store = open_store(&args.store.db)?;
    let runs = store.list_runs()?;
    match args.format {
        ListFormat::Json => println!("{}", serde_json::to_string_pretty(&runs)?),
        ListFormat::Table => println!("{}", format_run_list(&runs)),
    }
    Ok(exit_codes::SUCCESS)
}
