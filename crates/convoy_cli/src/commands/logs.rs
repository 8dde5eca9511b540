//! Local log inspection commands.

use convoy_log::{LogStore, LogStoreConfig};
use std::path::Path;

type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Prints events for one `(target, store)` within an ID range.
pub fn dump(
    root: &Path,
    target: &str,
    store_id: u64,
    from: u64,
    to: u64,
    format: &str,
) -> CommandResult {
    let store = LogStore::open(root, LogStoreConfig::default())?;
    let events = store.get(target, store_id, from, to);

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&events)?);
    } else {
        for event in &events {
            let properties: Vec<String> = event
                .properties
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            println!(
                "{}\t{}\tkind={}\t{}",
                event.event_id,
                event.timestamp_ms,
                event.kind,
                properties.join(" ")
            );
        }
        println!("{} event(s)", events.len());
    }
    Ok(())
}

/// Lists `(target, store, range)` descriptors.
pub fn descriptors(root: &Path, target: Option<&str>, format: &str) -> CommandResult {
    let store = LogStore::open(root, LogStoreConfig::default())?;
    let descriptors = store.descriptors(target);

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&descriptors)?);
    } else {
        for d in &descriptors {
            println!(
                "{},{},{}",
                d.target_id,
                d.store_id,
                d.ranges.to_representation()
            );
        }
    }
    Ok(())
}
