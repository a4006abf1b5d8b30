//! Print persisted entries

use anyhow::Result;
use cli_lib::{Settings, SledStore};
use owo_colors::OwoColorize;
use std::collections::BTreeMap;

pub fn run(settings: &Settings, json: bool) -> Result<()> {
    let store = SledStore::open(&settings.store.path)?;
    let entries = store.entries()?;

    if json {
        let map: BTreeMap<_, _> = entries.into_iter().collect();
        println!("{}", serde_json::to_string_pretty(&map)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("{}", "No persisted entries".dimmed());
        return Ok(());
    }

    println!(
        "{} {}",
        "Persisted entries".bold(),
        format!("({})", entries.len()).dimmed()
    );
    for (key, entry) in entries {
        println!(
            "  {} = {} {}",
            key.cyan(),
            entry.value,
            format!("@{}ms", entry.persisted_at_ms).dimmed()
        );
    }

    Ok(())
}
