use anyhow::{Context as _, Result};
use ims_core::rules::{export_rules, seed_rules, RuleEngine, RuleSeed, RuleSeedFile, DEFAULT_RULES};
use std::path::Path;

use super::Context;

fn describe(rule: &RuleSeed) -> String {
    format!(
        "{} → {}: {}",
        rule.source.as_deref().unwrap_or("(new item)"),
        rule.destination.as_deref().unwrap_or("(removed)"),
        rule.usage_status.as_deref().unwrap_or("(clear status)")
    )
}

/// List the stored rules by type and status value.
pub fn list_rules(ctx: &Context) -> Result<()> {
    let mut db = ctx.open_database()?;
    let session = db.read_transaction("listing rules")?;
    let seed = export_rules(&session)?;

    if seed.rules.is_empty() {
        println!("No rules stored. Run 'ims rules seed' to load the defaults.");
        return Ok(());
    }

    println!("Usage status rules ({}):", seed.rules.len());
    for rule in &seed.rules {
        println!("  {}", describe(rule));
    }
    Ok(())
}

/// Load the stored rules the way the engine does and report problems.
pub fn validate_rules(ctx: &Context) -> Result<()> {
    let mut db = ctx.open_database()?;
    let session = db.read_transaction("validating rules")?;
    let engine = RuleEngine::load(&session).context("Rule table is invalid")?;

    println!(
        "✓ {} rule(s), no duplicate transitions",
        engine.snapshot().len()
    );
    Ok(())
}

/// Write rules from `file`, or the built-in defaults, into the database.
pub fn seed(ctx: &Context, file: Option<&Path>, replace: bool) -> Result<()> {
    let seed = match file {
        Some(path) => RuleSeedFile::load(path)
            .with_context(|| format!("Failed to load rules from {}", path.display()))?,
        None => RuleSeedFile::default_rules()?,
    };

    if replace
        && !ctx.confirm("This will replace every stored rule. Are you sure you wish to proceed?")?
    {
        println!("Aborted.");
        return Ok(());
    }

    let mut db = ctx.open_database()?;
    let table = db.with_transaction("seeding rules", |session| {
        seed_rules(session, &seed, replace)
    })?;

    println!("✓ Stored {} rule(s)", table.len());
    Ok(())
}

pub fn print_example() {
    print!("{}", DEFAULT_RULES);
}
