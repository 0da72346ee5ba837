//! Rules command - manage categorization rules

use anyhow::{anyhow, Result};
use clap::Subcommand;
use colored::Colorize;
use walletsync_core::{NewCategoryRule, RuleKind};

use super::{get_context, log_command, parse_id};
use crate::output;

#[derive(Subcommand)]
pub enum RulesCommands {
    /// Add a rule
    Add {
        /// merchant_code, description_contains, description_exact or amount
        #[arg(long)]
        kind: String,
        /// Four digit code, text, or an amount "min-max"
        #[arg(long)]
        pattern: String,
        #[arg(long)]
        category: String,
        #[arg(long)]
        subcategory: Option<String>,
        /// Lower values are tried first
        #[arg(long, default_value = "100")]
        priority: i32,
    },
    /// List rules in evaluation order
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a rule
    Remove { id: String },
    /// Enable a rule
    Enable { id: String },
    /// Disable a rule without deleting it
    Disable { id: String },
    /// Categorize transactions that have no category yet
    Apply {
        /// Limit to one wallet
        #[arg(long)]
        wallet: Option<String>,
    },
    /// Recompute every rule-assigned category; manual choices are kept
    Reapply,
}

pub fn run(command: RulesCommands) -> Result<()> {
    let ctx = get_context()?;
    log_command(&ctx, "rules");
    let service = &ctx.categorization;

    match command {
        RulesCommands::Add {
            kind,
            pattern,
            category,
            subcategory,
            priority,
        } => {
            let kind: RuleKind = kind.parse().map_err(|e: String| anyhow!(e))?;
            let rule = service.add_rule(NewCategoryRule {
                kind,
                pattern,
                category,
                subcategory,
                priority,
            })?;
            output::success(&format!("Added rule {}", rule.id));
        }
        RulesCommands::List { json } => {
            let rules = service.list_rules()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&rules)?);
                return Ok(());
            }
            if rules.is_empty() {
                println!("No rules defined. Use 'ws rules add' to create one.");
                return Ok(());
            }

            let mut table = output::create_table();
            table.set_header(vec!["Id", "Priority", "Kind", "Pattern", "Category", "Active"]);
            for rule in rules {
                let category = match &rule.subcategory {
                    Some(sub) => format!("{} / {}", rule.category, sub),
                    None => rule.category.clone(),
                };
                let active = if rule.is_active {
                    "yes".green().to_string()
                } else {
                    "no".dimmed().to_string()
                };
                table.add_row(vec![
                    rule.id.to_string(),
                    rule.priority.to_string(),
                    rule.kind.to_string(),
                    rule.pattern,
                    category,
                    active,
                ]);
            }
            println!("{}", table);
        }
        RulesCommands::Remove { id } => {
            service.delete_rule(parse_id(&id)?)?;
            output::success("Rule deleted");
        }
        RulesCommands::Enable { id } => {
            service.set_rule_active(parse_id(&id)?, true)?;
            output::success("Rule enabled");
        }
        RulesCommands::Disable { id } => {
            service.set_rule_active(parse_id(&id)?, false)?;
            output::success("Rule disabled");
        }
        RulesCommands::Apply { wallet } => {
            let wallet_id = wallet.as_deref().map(parse_id).transpose()?;
            let changed = service.apply_rules_to_uncategorized(wallet_id)?;
            output::success(&format!("Categorized {} transactions", changed));
        }
        RulesCommands::Reapply => {
            let changed = service.reapply_all_rules()?;
            output::success(&format!("{} transactions changed category", changed));
        }
    }

    Ok(())
}
