//! Development-time generation of new migration units.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};

/// What `create_migration` wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scaffold {
    /// Migration name, e.g. `20250703083422_system_types`.
    pub name: String,
    pub module: String,
    pub struct_name: String,
    pub path: PathBuf,
}

/// Check that `name` is lower snake case: starts with a letter, only
/// `[a-z0-9_]`, no empty segments.
pub fn validate_name(name: &str) -> Result<()> {
    let starts_with_letter = name.chars().next().is_some_and(|c| c.is_ascii_lowercase());
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    let no_empty_segments = name.split('_').all(|segment| !segment.is_empty());

    if starts_with_letter && valid_chars && no_empty_segments {
        Ok(())
    } else {
        bail!(
            "migration name '{}' must be snake case (e.g. add_item_notes)",
            name
        )
    }
}

fn struct_name(name: &str) -> String {
    name.split('_')
        .map(|segment| {
            let mut chars = segment.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_ascii_uppercase().to_string() + chars.as_str()
            })
        })
        .collect()
}

fn template(name: &str, struct_name: &str, description: &str) -> String {
    format!(
        r#"use ims_core::schema::Session;

use crate::migration::Migration;

#[derive(Debug, Clone, Copy, Default)]
pub struct {struct_name};

impl Migration for {struct_name} {{
    fn name(&self) -> &str {{
        "{name}"
    }}

    fn description(&self) -> &str {{
        {description:?}
    }}

    fn forward(&self, _session: &Session<'_>) -> ims_core::Result<()> {{
        Ok(())
    }}

    fn backward(&self, _session: &Session<'_>) -> ims_core::Result<()> {{
        Ok(())
    }}
}}
"#
    )
}

/// Add the module declaration after the last migration module and the
/// registry entry at the end of `all()`.
fn register(mod_rs: &str, module: &str, struct_name: &str) -> Result<String> {
    let declaration = format!("mod {};", module);
    let mut lines: Vec<String> = mod_rs.lines().map(str::to_string).collect();

    if lines.iter().any(|line| line.trim() == declaration) {
        bail!("{} is already registered", module);
    }

    let last_module = lines
        .iter()
        .rposition(|line| line.starts_with("mod m"))
        .context("no migration module declarations found")?;
    lines.insert(last_module + 1, declaration);

    let all_fn = lines
        .iter()
        .position(|line| line.trim_start().starts_with("pub fn all()"))
        .context("no `pub fn all()` registry found")?;
    let closing = lines
        .iter()
        .skip(all_fn)
        .position(|line| line.trim() == "]")
        .map(|offset| all_fn + offset)
        .context("registry vec! in `all()` is not closed by a `]` line")?;
    lines.insert(
        closing,
        format!("        Box::new({}::{}),", module, struct_name),
    );

    let mut out = lines.join("\n");
    out.push('\n');
    Ok(out)
}

/// Write a new, empty migration unit into `scripts_dir` and register it.
pub fn create_migration(
    scripts_dir: &Path,
    name: &str,
    description: &str,
    now: DateTime<Utc>,
) -> Result<Scaffold> {
    validate_name(name)?;

    let stamp = now.format("%Y%m%d%H%M%S");
    let full_name = format!("{}_{}", stamp, name);
    let module = format!("m{}", full_name);
    let struct_name = struct_name(name);
    let path = scripts_dir.join(format!("{}.rs", module));
    let mod_path = scripts_dir.join("mod.rs");

    if path.exists() {
        bail!("{} already exists", path.display());
    }

    let mod_rs = fs::read_to_string(&mod_path)
        .with_context(|| format!("Failed to read {}", mod_path.display()))?;
    let registered = register(&mod_rs, &module, &struct_name)?;

    fs::write(&path, template(&full_name, &struct_name, description))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    fs::write(&mod_path, registered)
        .with_context(|| format!("Failed to update {}", mod_path.display()))?;

    log::info!("Created migration {} at {}", full_name, path.display());
    Ok(Scaffold {
        name: full_name,
        module,
        struct_name,
        path,
    })
}
