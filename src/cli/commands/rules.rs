//! `texguard rules`: list the rules each family checks.

use anyhow::Result;
use clap::Args;
use comfy_table::Cell;

use crate::adapters::rules::{FamilyCatalog, RuleInfo};
use crate::cli::output::{list_table, output, CommandOutput};
use crate::domain::errors::DomainError;
use crate::domain::models::Config;

/// Arguments of `texguard rules`.
#[derive(Args, Debug)]
pub struct RulesArgs {
    /// Show only this family (repeatable)
    #[arg(short, long = "family", value_name = "NAME")]
    pub families: Vec<String>,
}

/// Rules listed by `texguard rules`.
#[derive(Debug, serde::Serialize)]
pub struct RuleListOutput {
    /// Rules in family order.
    pub rules: Vec<RuleInfo>,
    /// Number of rules listed.
    pub total: usize,
}

impl CommandOutput for RuleListOutput {
    fn to_human(&self) -> String {
        if self.rules.is_empty() {
            return "No rules found.".to_string();
        }

        let mut table = list_table(&["family", "rule", "fixer", "description"]);
        for rule in &self.rules {
            table.add_row(vec![
                Cell::new(&rule.family),
                Cell::new(&rule.rule),
                Cell::new(rule.fixer.as_deref().unwrap_or("-")),
                Cell::new(&rule.description),
            ]);
        }
        format!("{} rule(s):\n{table}", self.total)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Rules of the built-in catalog, optionally restricted to `families`.
pub fn list_rules(config: &Config, families: &[String]) -> Result<Vec<RuleInfo>> {
    let catalog = FamilyCatalog::builtin(&config.thresholds)?;
    if let Some(unknown) = families.iter().find(|f| !catalog.contains(f)) {
        return Err(DomainError::UnknownFamily(unknown.clone()).into());
    }

    Ok(catalog
        .rules()
        .into_iter()
        .filter(|r| families.is_empty() || families.contains(&r.family))
        .collect())
}

/// Print the rule list.
pub fn execute(args: RulesArgs, config: &Config, json_mode: bool) -> Result<()> {
    let rules = list_rules(config, &args.families)?;
    let out = RuleListOutput {
        total: rules.len(),
        rules,
    };
    output(&out, json_mode);
    Ok(())
}
