//! Rule file loading
//!
//! Rule files are YAML maps of rule name to rule body, already in the
//! validated structure this crate consumes; there is no rule DSL here,
//! only deserialization. Load failures are startup failures.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::RuleSet;

/// Load one rule file.
pub fn load_file(path: &Path) -> Result<RuleSet> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read rule file: {}", path.display()))?;
    let rules: RuleSet = serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse rule file: {}", path.display()))?;
    Ok(rules)
}

/// Load every `.yml`/`.yaml` file under a directory into one set.
///
/// A rule name appearing in two files is a configuration error: rules
/// merge by name, so silent overrides would hide half the set.
pub fn load_dir(dir: &Path) -> Result<RuleSet> {
    let mut merged = RuleSet::new();

    let mut paths: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read rule directory: {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("yml") | Some("yaml")
            )
        })
        .collect();
    paths.sort();

    for path in paths {
        let rules = load_file(&path)?;
        for (name, rule) in rules {
            if merged.contains_key(&name) {
                anyhow::bail!("duplicate rule name {:?} in {}", name, path.display());
            }
            merged.insert(name, rule);
        }
    }

    info!(rules = merged.len(), dir = %dir.display(), "loaded rule set");
    Ok(merged)
}
