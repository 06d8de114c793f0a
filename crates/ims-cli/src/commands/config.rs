use anyhow::Result;
use ims_migrate::{config, Config};

/// Show the current effective configuration.
pub fn show_config(config: &Config) {
    println!("Current Configuration");
    println!("=====================\n");

    let config_path = config::config_file_path();
    println!("Config file: {}", config_path.display());
    println!(
        "File exists: {}\n",
        if config_path.exists() { "yes" } else { "no (using defaults)" }
    );

    println!("Settings:");
    println!("  database_path: {}", config.database_path.display());
    println!("  busy_timeout_ms: {}", config.busy_timeout_ms);
    println!("  transaction_retries: {}", config.transaction_retries);
    println!("  retry_min_delay_ms: {}", config.retry_min_delay_ms);
    println!("  scripts_dir: {}", config.scripts_dir.display());
    println!("  logging.level: {:?}", config.logging.level());
    println!("  logging.coloured: {}", config.logging.coloured());
    println!("  logging.output: {:?}", config.logging.output());

    println!("\nPriority: CLI args > ENV vars (IMS_*) > Config file > Defaults");
}

pub fn show_path() {
    println!("{}", config::config_file_path().display());
}

pub fn print_example() {
    print!("{}", config::example_config());
}

/// Create the config file from the example if it is missing.
pub fn init_config() -> Result<()> {
    let config_path = config::config_file_path();
    if config::ensure_config_file()? {
        println!("✓ Created config file: {}", config_path.display());
    } else {
        println!("Config file already exists: {}", config_path.display());
    }
    Ok(())
}
