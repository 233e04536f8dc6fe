//! The reference wallet, kept in a JSON file between invocations.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use cadence_scheduler::Inventory;

/// Load the wallet, or an empty one if it was never saved.
pub fn load(path: &Path) -> Result<Inventory> {
    if !path.exists() {
        return Ok(Inventory::default());
    }
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read inventory: {}", path.display()))?;
    let inventory = serde_json::from_str(&data)
        .with_context(|| format!("failed to parse inventory: {}", path.display()))?;
    Ok(inventory)
}

pub fn save(path: &Path, inventory: &Inventory) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create inventory dir: {}", dir.display()))?;
    }
    let data = serde_json::to_string_pretty(inventory)?;
    fs::write(path, data).with_context(|| format!("failed to write inventory: {}", path.display()))?;
    debug!(path = %path.display(), "saved inventory");
    Ok(())
}
