//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `diarystore_core` linkage.
//! - Exercise one plugin round-trip against an in-memory store.
//! - Keep output deterministic for quick local sanity checks.

use diarystore_core::db::open_db_in_memory;
use diarystore_core::{plugin_transaction, PluginStorage, RepoError, StoreContext};
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    println!("diarystore_core ping={}", diarystore_core::ping());
    println!("diarystore_core version={}", diarystore_core::core_version());

    let conn = open_db_in_memory()?;
    let context = StoreContext::new(&conn);
    let storage = PluginStorage::open(&context);
    let value = plugin_transaction::<_, _, RepoError, _>(storage.as_ref(), "smoke", |db| {
        db.set("probe", "ok")?;
        db.get("probe")
    })?;
    diarystore_core::close_storage(storage);

    println!("diarystore_core plugin_probe={}", value.unwrap_or_default());
    Ok(())
}
