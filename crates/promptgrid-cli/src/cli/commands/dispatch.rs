use super::{export, results, run, validate};
use crate::cli::args::{Cli, Command};

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Run(args) => run::cmd_run(args).await,
        Command::Results(args) => results::cmd_results(args),
        Command::Latest(args) => results::cmd_latest(args),
        Command::ListRuns(args) => results::cmd_list_runs(args),
        Command::Export(args) => export::cmd_export(args),
        Command::Validate(args) => validate::cmd_validate(args),
    }
}
