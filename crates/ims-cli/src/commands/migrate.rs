use anyhow::Result;
use chrono::Utc;
use ims_core::schema::reset_migration_state;
use ims_migrate::error::state_label;
use ims_migrate::{scaffold, Direction, MigrationError, MigrationPlan, Migrator, Registry, LATEST};
use std::process::ExitCode;

use super::Context;

/// Exit status for an explicit target that needed no work under `--strict`.
const NO_OP_EXIT: u8 = 2;

fn migrator() -> Result<Migrator> {
    Ok(Migrator::new(Registry::builtin()?))
}

/// Show the current migration, what is applied and what is pending.
pub fn show_status(ctx: &Context) -> Result<()> {
    let mut db = ctx.open_database()?;
    let status = migrator()?.status(&mut db)?;

    println!("Database: {}", ctx.config.database_path.display());
    println!("Current migration: {}\n", state_label(&status.current));

    if !status.current_known {
        println!("⚠ The recorded migration is not in the registry.");
        println!("  Nothing can run until it is corrected with 'ims migrate set'.\n");
    }

    println!("Migrations:");
    for entry in &status.entries {
        let mark = if entry.applied { "✓" } else { " " };
        println!("  [{}] {} - {}", mark, entry.name, entry.description);
    }

    println!("\nPending: {}", status.pending.len());

    if status.has_drift() {
        println!();
        for name in &status.added_since_last_run {
            println!("⚠ {} was added since the last run", name);
        }
        for name in &status.missing_from_registry {
            println!("⚠ {} was applied but is no longer registered", name);
        }
    }

    Ok(())
}

/// List every registered migration without touching the database.
pub fn list_migrations() -> Result<()> {
    let registry = Registry::builtin()?;
    println!("Registered migrations ({}):", registry.len());
    for unit in registry.units() {
        println!("  {} - {}", unit.name(), unit.description());
    }
    Ok(())
}

/// Report a request that needed no work.
///
/// `latest` with nothing pending is the normal case; a named target that is
/// already reached is reported as a warning and fails only under `--strict`.
fn no_op(ctx: &Context, target: &str, err: &MigrationError) -> ExitCode {
    if target == LATEST {
        println!("Nothing to do: {}", err);
        return ExitCode::SUCCESS;
    }

    log::warn!("{}", err);
    eprintln!("Warning: {}", err);
    if ctx.strict {
        ExitCode::from(NO_OP_EXIT)
    } else {
        ExitCode::SUCCESS
    }
}

fn print_plan(plan: &MigrationPlan) {
    let verb = match plan.direction {
        Direction::Forward => "apply",
        Direction::Backward => "revert",
    };
    println!("This operation will {} the following migrations:", verb);
    for step in &plan.steps {
        println!("  {} - {}", step.name, step.description);
    }
    println!(
        "\nThe migration state will go from {} to {}.",
        state_label(&plan.start),
        plan.end_state().unwrap_or("<none>")
    );
}

fn run(ctx: &Context, target: &str, direction: Direction) -> Result<ExitCode> {
    let migrator = migrator()?;
    let mut db = ctx.open_database()?;

    let planned = match direction {
        Direction::Forward => migrator.plan_forward(&mut db, target),
        Direction::Backward => migrator.plan_backward(&mut db, target),
    };
    let plan = match planned {
        Ok(plan) => plan,
        Err(err) if err.is_no_op() => return Ok(no_op(ctx, target, &err)),
        Err(err) => return Err(err.into()),
    };

    print_plan(&plan);
    if !ctx.confirm("Are you sure you wish to proceed?")? {
        println!("Aborted.");
        return Ok(ExitCode::SUCCESS);
    }

    let state = migrator.execute(&mut db, &plan)?;
    println!(
        "✓ Migrated {} {} unit(s); current migration is {}",
        direction,
        plan.steps.len(),
        state_label(&state)
    );
    Ok(ExitCode::SUCCESS)
}

pub fn forward(ctx: &Context, target: &str) -> Result<ExitCode> {
    run(ctx, target, Direction::Forward)
}

pub fn backward(ctx: &Context, target: &str) -> Result<ExitCode> {
    run(ctx, target, Direction::Backward)
}

/// Record `target` as current without running any migration.
pub fn set_state(ctx: &Context, target: &str) -> Result<()> {
    let migrator = migrator()?;
    let mut db = ctx.open_database()?;

    println!(
        "This will record {} as the current migration without running anything.",
        target
    );
    println!("Only do this if the database already matches that migration.");
    if !ctx.confirm("Are you sure you wish to proceed?")? {
        println!("Aborted.");
        return Ok(());
    }

    let name = migrator.force_state(&mut db, target)?;
    println!("✓ Current migration set to {}", name);
    Ok(())
}

/// Delete the migration state record, leaving the documents untouched.
pub fn reset_state(ctx: &Context) -> Result<()> {
    let mut db = ctx.open_database()?;

    println!("This will forget which migrations have been applied.");
    println!("The documents are not changed.");
    if !ctx.confirm("Are you sure you wish to proceed?")? {
        println!("Aborted.");
        return Ok(());
    }

    let removed = db.with_transaction("resetting migration state", reset_migration_state)?;
    if removed {
        println!("✓ Migration state reset");
    } else {
        println!("No migration state was recorded");
    }
    Ok(())
}

/// Scaffold a new migration unit in the configured scripts directory.
pub fn create(ctx: &Context, name: &str, description: &str) -> Result<()> {
    let created =
        scaffold::create_migration(&ctx.config.scripts_dir, name, description, Utc::now())?;

    println!("✓ Created migration {}", created.name);
    println!("  {}", created.path.display());
    println!("\nFill in forward() and backward(), then rebuild to register it.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ims_migrate::Config;

    fn context(strict: bool) -> Context {
        Context {
            config: Config::default(),
            yes: true,
            strict,
        }
    }

    fn nothing_to_apply(target: &str) -> MigrationError {
        MigrationError::NoOp {
            target: target.to_string(),
            current: Some("20250703083422_system_types".to_string()),
            direction: Direction::Forward,
        }
    }

    #[test]
    fn test_latest_with_nothing_pending_succeeds() {
        let err = nothing_to_apply(LATEST);
        assert_eq!(no_op(&context(false), LATEST, &err), ExitCode::SUCCESS);
        assert_eq!(no_op(&context(true), LATEST, &err), ExitCode::SUCCESS);
    }

    #[test]
    fn test_named_target_reached_warns_and_succeeds() {
        let target = "20241016101400_expected_lifetime";
        let err = nothing_to_apply(target);
        assert_eq!(no_op(&context(false), target, &err), ExitCode::SUCCESS);
    }

    #[test]
    fn test_named_target_reached_fails_when_strict() {
        let target = "20241016101400_expected_lifetime";
        let err = nothing_to_apply(target);
        assert_eq!(
            no_op(&context(true), target, &err),
            ExitCode::from(NO_OP_EXIT)
        );
    }
}
