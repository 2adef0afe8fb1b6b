use super::{open_store, setup_failed};
use crate::cli::args::RunArgs;
use crate::exit_codes;
use promptgrid_core::config::AppConfig;
use promptgrid_core::report::console::{console_progress_sink, print_run_header, print_run_footer};
use promptgrid_core::sources::DirectorySource;
use promptgrid_core::{CompletionClient, ExecutionMode, Runner, Store};
use std::future::Future;
use std::sync::Arc;

pub async fn cmd_run(args: RunArgs) -> anyhow::Result<i32> {
    let mut cfg = match AppConfig::load(&args.input.config) {
        Ok(cfg) => cfg,
        Err(e) => return Ok(setup_failed(e)),
    };
    if let Some(models) = &args.models {
        if let Err(e) = cfg.restrict_models(models) {
            return Ok(setup_failed(e));
        }
    }
    if let Some(n) = args.max_concurrent {
        cfg.max_concurrent_requests = n;
        if let Err(e) = cfg.validate() {
            return Ok(setup_failed(e));
        }
    }

    let source = match DirectorySource::open(&args.input.prompts_dir, &args.input.test_cases_dir) {
        Ok(source) => source,
        Err(e) => return Ok(setup_failed(e)),
    };
    let client = match CompletionClient::from_config(&cfg) {
        Ok(client) => client,
        Err(e) => return Ok(setup_failed(e)),
    };
    let store = match open_store(&args.store.db) {
        Ok(store) => store,
        Err(e) => return Ok(setup_failed(format!("{e:#}"))),
    };
    tracing::debug!(
        config = %args.input.config.display(),
        db = %args.store.db.display(),
        models = ?cfg.model_names(),
        "configuration loaded"
    );

    let mode = if args.sync {
        ExecutionMode::Sequential
    } else {
        ExecutionMode::Concurrent
    };
    let runner = Runner {
        store: store.clone(),
        client: Arc::new(client),
        source: Arc::new(source),
        models: cfg.model_names(),
        temperature: cfg.temperature,
        max_tokens: cfg.max_tokens,
        progress: Some(console_progress_sink()),
    };

    let run_id = args.run_id.unwrap_or_else(Store::generate_run_id);
    let space = runner.enumerate_combinations()?;
    print_run_header(
        &run_id,
        space.len(),
        space.prompts().len(),
        space.test_cases().len(),
        space.models().len(),
        cfg.max_concurrent_requests,
    );
    eprintln!("Using {} execution", mode.as_str());

    match until_interrupted(
        runner.run_all(mode, Some(run_id.clone())),
        tokio::signal::ctrl_c(),
    )
    .await
    {
        RunOutcome::Finished(res) => {
            res?;
        }
        RunOutcome::Interrupted => {
            eprintln!("\nRun {run_id} interrupted. Results stored so far are kept; the run is not marked complete.");
            return Ok(exit_codes::INTERRUPTED);
        }
    }

    let (successful, total) = match store.get_run(&run_id)? {
        Some(run) => (
            run.successful_count.unwrap_or_default() as usize,
            run.total_count as usize,
        ),
        None => anyhow::bail!("run {run_id} disappeared from the results database"),
    };
    print_run_footer(&run_id, successful, total);
    println!("{run_id}");
    eprintln!("To view results: promptgrid results --run-id {run_id}");
    Ok(exit_codes::SUCCESS)
}

enum RunOutcome<T> {
    Finished(T),
    Interrupted,
}

/// Drive `run` to completion unless `signal` fires first. If the signal
/// handler cannot be installed the run continues uninterruptible.
async fn until_interrupted<T>(
    run: impl Future<Output = T>,
    signal: impl Future<Output = std::io::Result<()>>,
) -> RunOutcome<T> {
    tokio::pin!(run);
    tokio::select! {
        out = &mut run => return RunOutcome::Finished(out),
        sig = signal => match sig {
            Ok(()) => return RunOutcome::Interrupted,
            Err(e) => tracing::warn!(error = %e, "cannot listen for Ctrl-C; run is not interruptible"),
        },
    }
    RunOutcome::Finished(run.await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn failed_signal_handler_lets_the_run_finish() {
        let run = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            7
        };
        let signal = async { Err::<(), _>(std::io::Error::other("no signal support")) };
        assert!(matches!(
            until_interrupted(run, signal).await,
            RunOutcome::Finished(7)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn delivered_signal_interrupts_a_pending_run() {
        let run = std::future::pending::<()>();
        let signal = async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            std::io::Result::Ok(())
        };
        assert!(matches!(
            until_interrupted(run, signal).await,
            RunOutcome::Interrupted
        ));
    }

    #[tokio::test]
    async fn finished_run_wins_over_a_silent_signal() {
        let run = async { "done" };
        let signal = std::future::pending::<std::io::Result<()>>();
        assert!(matches!(
            until_interrupted(run, signal).await,
            RunOutcome::Finished("done")
        ));
    }
}
