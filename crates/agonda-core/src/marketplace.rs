use crate::error::{AgondaError, Result};
use crate::paths;
use crate::validate::{validate_workbench, WorkbenchReport};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Result of validating every plugin listed in the marketplace manifest.
///
/// `errors` holds problems with the manifest itself; problems inside a plugin
/// are reported in that plugin's [`WorkbenchReport`].
#[derive(Debug, Clone, Serialize)]
pub struct MarketplaceReport {
    pub errors: Vec<String>,
    pub workbenches: Vec<WorkbenchReport>,
}

impl MarketplaceReport {
    pub fn error_count(&self) -> usize {
        self.errors.len() + self.workbenches.iter().map(|w| w.errors.len()).sum::<usize>()
    }
}

/// Validate `.claude-plugin/marketplace.json` and each plugin it declares.
pub fn validate_marketplace(root: &Path) -> Result<MarketplaceReport> {
    let path = paths::marketplace_path(root);
    if !path.is_file() {
        return Err(AgondaError::not_found_with_hint(
            "marketplace manifest",
            paths::MARKETPLACE_MANIFEST,
            "create it at the repository root",
        ));
    }

    let mut report = MarketplaceReport {
        errors: Vec::new(),
        workbenches: Vec::new(),
    };

    let data = std::fs::read_to_string(&path)?;
    let manifest: Value = match serde_json::from_str(&data) {
        Ok(v) => v,
        Err(e) => {
            report
                .errors
                .push(format!("{} is not valid JSON: {e}", paths::MARKETPLACE_MANIFEST));
            return Ok(report);
        }
    };

    let plugins = manifest
        .get("plugins")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    if plugins.is_empty() {
        report
            .errors
            .push(format!("{} declares no plugins", paths::MARKETPLACE_MANIFEST));
        return Ok(report);
    }

    for entry in plugins {
        let name = entry
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("(unnamed)");
        let Some(source) = entry.get("source").and_then(Value::as_str) else {
            report
                .errors
                .push(format!("plugin '{name}' has no source path"));
            continue;
        };
        let dir: PathBuf = root.join(source).components().collect();
        if !dir.exists() {
            report
                .errors
                .push(format!("plugin '{name}' source not found: {source}"));
            continue;
        }
        tracing::debug!(plugin = name, source, "validating marketplace plugin");
        report.workbenches.push(validate_workbench(&dir, root));
    }

    Ok(report)
}
