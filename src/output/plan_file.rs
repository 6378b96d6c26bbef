//! Writing the plan document.

use crate::engine::Plan;
use std::error::Error;
use std::path::Path;

/// Write `plan` as pretty JSON to `path`.
pub fn write_plan(plan: &Plan, path: &Path) -> Result<(), Box<dyn Error>> {
    let json =
        serde_json::to_string_pretty(plan).map_err(|e| format!("Error serializing plan: {e}"))?;
    std::fs::write(path, json)
        .map_err(|e| format!("Error writing plan file {}: {e}", path.display()))?;
    log::info!(
        "wrote plan with {} resources to {}",
        plan.resources.len(),
        path.display()
    );
    Ok(())
}
