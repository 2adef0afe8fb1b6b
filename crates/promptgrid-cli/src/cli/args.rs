use clap::{Args, Parser, Subcommand, ValueEnum};
use promptgrid_core::report::export::ExportFormat;
use promptgrid_core::report::StatusFilter;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "promptgrid",
    version,
    about = "Run prompts x test cases x models and keep every outcome"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run every prompt against every test case on every model
    Run(RunArgs),
    /// Show stored results for a run (latest run by default)
    Results(ResultsArgs),
    /// Summarize the most recent run
    Latest(LatestArgs),
    /// List all stored runs
    ListRuns(ListRunsArgs),
    /// Write a run's results to a file
    Export(ExportArgs),
    /// Check config, input directories and credentials without calling any model
    Validate(ValidateArgs),
}

#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    /// SQLite results database
    #[arg(long, default_value = "results.db", env = "PROMPTGRID_DB")]
    pub db: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    #[arg(long, default_value = "config.json")]
    pub config: PathBuf,

    #[arg(long, default_value = "prompts")]
    pub prompts_dir: PathBuf,

    #[arg(long, default_value = "test_cases")]
    pub test_cases_dir: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[command(flatten)]
    pub store: StoreArgs,

    /// Only run these models (must be present in the config)
    #[arg(long, num_args = 1..)]
    pub models: Option<Vec<String>>,

    /// Execute combinations one at a time
    #[arg(long)]
    pub sync: bool,

    /// Override max_concurrent_requests from the config
    #[arg(long)]
    pub max_concurrent: Option<usize>,

    /// Resume (or name) a run; omitted means a fresh run id
    #[arg(long)]
    pub run_id: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ResultsArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long)]
    pub run_id: Option<String>,

    #[arg(long, value_enum, default_value_t = ResultsFormat::Table)]
    pub format: ResultsFormat,

    #[arg(long, value_enum, default_value_t = StatusArg::All)]
    pub status: StatusArg,
}

#[derive(Args, Debug, Clone)]
pub struct LatestArgs {
    #[command(flatten)]
    pub store: StoreArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ListRunsArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long, value_enum, default_value_t = ListFormat::Table)]
    pub format: ListFormat,
}

#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long)]
    pub run_id: Option<String>,

    /// Output file; defaults to exports/results_<run>_<timestamp>.<ext>
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = ExportFormatArg::Text)]
    pub format: ExportFormatArg,

    #[arg(long, value_enum, default_value_t = StatusArg::All)]
    pub status: StatusArg,
}

#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub input: InputArgs,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResultsFormat {
    Table,
    Json,
    Summary,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListFormat {
    Table,
    Json,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusArg {
    All,
    Success,
    Failed,
}

impl From<StatusArg> for StatusFilter {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::All => StatusFilter::All,
            StatusArg::Success => StatusFilter::Success,
            StatusArg::Failed => StatusFilter::Failed,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormatArg {
    Text,
    Json,
    Markdown,
}

impl From<ExportFormatArg> for ExportFormat {
    fn from(arg: ExportFormatArg) -> Self {
        match arg {
            ExportFormatArg::Text => ExportFormat::Text,
            ExportFormatArg::Json => ExportFormat::Json,
            ExportFormatArg::Markdown => ExportFormat::Markdown,
        }
    }
}
