//! CLI Commands

pub mod list;
pub mod run;

use anyhow::{Context, Result};
use std::path::Path;

use pagecheck_e2e::SuiteSpec;

/// Load suite files from `dir`, keeping only those tagged `tag` when given
pub fn load_specs(dir: &Path, tag: Option<&str>) -> Result<Vec<SuiteSpec>> {
    let specs = SuiteSpec::load_all(dir)
        .with_context(|| format!("failed to load suites from {}", dir.display()))?;
    Ok(match tag {
        Some(tag) => SuiteSpec::filter_by_tag(&specs, tag)
            .into_iter()
            .cloned()
            .collect(),
        None => specs,
    })
}
