use crate::output::{print_json, print_table};
use modrelay_core::store::Store;
use std::path::Path;

pub fn run(config_path: &Path, json: bool) -> anyhow::Result<()> {
    let config = super::load_checked(config_path)?;
    let store = super::open_store(&config)?;
    let items = store.tracked()?;

    if json {
        return print_json(&items);
    }
    if items.is_empty() {
        println!("No tracked items.");
        return Ok(());
    }
    let rows: Vec<Vec<String>> = items
        .iter()
        .map(|t| vec![t.item_id.clone(), t.handle.to_string()])
        .collect();
    print_table(&["ITEM", "MESSAGE"], &rows);
    Ok(())
}
