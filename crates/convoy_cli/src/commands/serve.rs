//! The `serve` command.

use convoy_repo::{FileVersionedStore, StoreEntry, StoreRegistry, VersionedStore};
use convoy_server::{serve, ServerConfig, SyncDispatcher};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Discovers `<customer>/<name>` store directories under `store_root`,
/// registers each as a master store, and serves the repository and
/// replication endpoints until interrupted.
pub fn run(bind: &str, store_root: &Path, max_commit_bytes: usize) -> CommandResult {
    fs::create_dir_all(store_root)?;
    let registry = Arc::new(StoreRegistry::new());

    for customer_entry in fs::read_dir(store_root)? {
        let customer_entry = customer_entry?;
        if !customer_entry.file_type()?.is_dir() {
            continue;
        }
        let Ok(customer) = customer_entry.file_name().into_string() else {
            continue;
        };
        for name_entry in fs::read_dir(customer_entry.path())? {
            let name_entry = name_entry?;
            if !name_entry.file_type()?.is_dir() {
                continue;
            }
            let Ok(name) = name_entry.file_name().into_string() else {
                continue;
            };
            let store = FileVersionedStore::open(&name_entry.path())?;
            info!(%customer, %name, highest = store.range()?.high(), "registered store");
            registry.register(StoreEntry::new(customer.clone(), name, true, Arc::new(store)));
        }
    }
    info!(stores = registry.len(), root = %store_root.display(), "store discovery done");

    let config = ServerConfig {
        bind_addr: bind.parse()?,
        max_commit_bytes,
    };
    let dispatcher = Arc::new(SyncDispatcher::standard(registry));

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(serve(config, dispatcher))?;
    Ok(())
}
