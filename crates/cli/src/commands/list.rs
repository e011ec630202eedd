//! List declared suites

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

use pagecheck_common::Config;
use pagecheck_e2e::{Isolation, SuiteSpec};

use crate::output::{print_list, OutputFormat, TableDisplay};

#[derive(Args)]
pub struct ListArgs {
    /// Directory with suite files (defaults to `specs_dir` from the config)
    #[arg(long)]
    pub specs: Option<PathBuf>,

    /// Only list suites carrying this tag
    #[arg(long)]
    pub tag: Option<String>,
}

/// Suite summary for display
#[derive(Debug, Serialize)]
pub struct SuiteInfo {
    pub name: String,
    pub entry: String,
    pub tests: usize,
    pub isolation: String,
    pub viewport: String,
    pub commands: Vec<String>,
    pub tags: Vec<String>,
}

impl SuiteInfo {
    fn new(spec: &SuiteSpec, config: &Config) -> Self {
        let isolation = spec
            .isolation
            .map(|i| i.to_string())
            .unwrap_or_else(|| format!("{} (default)", Isolation::from(config.test_isolation)));
        Self {
            name: spec.name.clone(),
            entry: config.resolve_url(&spec.entry),
            tests: spec.tests.len(),
            isolation,
            viewport: spec
                .viewport
                .as_ref()
                .map(|v| v.to_string())
                .unwrap_or_else(|| config.viewport.to_string()),
            commands: spec.commands.iter().map(|c| c.name.clone()).collect(),
            tags: spec.tags.clone(),
        }
    }
}

impl TableDisplay for SuiteInfo {
    fn headers() -> Vec<&'static str> {
        vec!["Suite", "Entry", "Tests", "Isolation", "Viewport", "Commands", "Tags"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.entry.clone(),
            self.tests.to_string(),
            self.isolation.clone(),
            self.viewport.clone(),
            self.commands.join(", "),
            self.tags.join(", "),
        ]
    }
}

pub fn execute(args: ListArgs, config: &Config, format: OutputFormat) -> Result<()> {
    let dir = args.specs.unwrap_or_else(|| config.specs_dir.clone());
    let specs = super::load_specs(&dir, args.tag.as_deref())?;
    let suites: Vec<SuiteInfo> = specs.iter().map(|s| SuiteInfo::new(s, config)).collect();
    print_list(&suites, format);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUITE: &str = r##"
name: Checkout
entry: /cart
isolation: shared
tags: [smoke]
commands:
  - name: add_item
    params: [sku]
    steps:
      - action: click
        target: { css: "#add-${sku}" }
tests:
  - name: empty cart
    steps:
      - action: expect
        target: { css: ".cart" }
        assert: visible
"##;

    #[test]
    fn test_suite_info_uses_config_defaults() {
        let spec = SuiteSpec::from_yaml(SUITE).unwrap();
        let config = Config {
            base_url: "https://shop.test".to_string(),
            ..Default::default()
        };
        let info = SuiteInfo::new(&spec, &config);

        assert_eq!(info.entry, "https://shop.test/cart");
        assert_eq!(info.tests, 1);
        assert_eq!(info.isolation, "shared");
        assert_eq!(info.viewport, "1000x660");
        assert_eq!(info.commands, ["add_item"]);
    }

    #[test]
    fn test_list_filters_by_tag() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("checkout.yaml"), SUITE).unwrap();
        std::fs::write(
            dir.path().join("home.yaml"),
            "name: Home\ntests:\n  - name: loads\n    steps:\n      - action: navigate\n        url: /\n",
        )
        .unwrap();

        assert_eq!(super::super::load_specs(dir.path(), None).unwrap().len(), 2);
        let smoke = super::super::load_specs(dir.path(), Some("smoke")).unwrap();
        assert_eq!(smoke.len(), 1);
        assert_eq!(smoke[0].name, "Checkout");
    }
}
