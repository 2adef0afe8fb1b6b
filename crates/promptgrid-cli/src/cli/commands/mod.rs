pub mod dispatch;
pub mod export;
pub mod results;
pub mod run;
pub mod validate;

pub use dispatch::dispatch;

use crate::exit_codes;
use promptgrid_core::Store;
use std::path::Path;

/// Open the results database, creating file and schema if needed.
pub(crate) fn open_store(db: &Path) -> anyhow::Result<Store> {
    let store = Store::open(db)?;
    store.init_schema()?;
    Ok(store)
}

/// The requested run, or the most recent one when none was named.
pub(crate) fn resolve_run_id(store: &Store, run_id: Option<String>) -> anyhow::Result<Option<String>> {
    match run_id {
        Some(id) => Ok(Some(id)),
        None => Ok(store.get_latest_run_id()?),
    }
}

/// Report a problem found before any work started.
pub(crate) fn setup_failed(err: impl std::fmt::Display) -> i32 {
    eprintln!("Error: {err}");
    exit_codes::CONFIG_ERROR
}
