use anyhow::{Context, Result};

use crate::cli::StoreArgs;
use crate::store::Store;

pub mod bench;
pub mod experiments;
pub mod field;
pub mod import;
pub mod index;
pub mod plot;
pub mod sql;
pub mod status;

pub(crate) fn open_store(args: &StoreArgs) -> Result<Store> {
    Store::open(&args.db_path)
        .with_context(|| format!("failed to open benchmark store {}", args.db_path.display()))
}
