use anyhow::Result;
use clap::Parser;
use ims_migrate::Config;
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "ims", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the database (default: ~/.local/share/ims/ims.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Answer yes to every confirmation prompt
    #[arg(short, long, global = true)]
    yes: bool,

    /// Exit with status 2 when an explicitly named migration target needs
    /// no work
    #[arg(long, global = true)]
    strict: bool,
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Apply and revert database migrations
    Migrate {
        #[command(subcommand)]
        command: MigrateCommands,
    },
    /// Manage the usage status rules
    Rules {
        #[command(subcommand)]
        command: RulesCommands,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Debug, clap::Subcommand)]
enum MigrateCommands {
    /// Show the current migration and what is pending
    Status,
    /// List every registered migration
    List,
    /// Apply migrations up to and including a target
    ///
    /// Runs every migration after the current one, in order, up to TARGET.
    /// Each migration commits together with the recorded state, so an
    /// interrupted run can be resumed by running the same command again.
    Forward {
        /// Migration name, or `latest`
        target: String,
    },
    /// Revert migrations down to and including a target
    ///
    /// Reverting the first migration returns the database to its state
    /// before any migration was applied.
    Backward {
        /// Migration name
        target: String,
    },
    /// Record a migration as current without running anything
    ///
    /// Use this only when the database is known to match the target already,
    /// for example after restoring a backup.
    Set {
        /// Migration name, or `latest`
        target: String,
    },
    /// Delete the migration state record
    Reset,
    /// Create a new, empty migration (development only)
    Create {
        /// Snake case name, e.g. `add_item_notes`
        name: String,
        /// One line describing the change
        description: String,
    },
}

#[derive(Debug, clap::Subcommand)]
enum RulesCommands {
    /// List the stored rules
    List,
    /// Check the stored rules for duplicate transitions
    Validate,
    /// Write rules from a TOML file (or the default rules) into the database
    Seed {
        /// Rules file (default: the built-in rules)
        #[arg(long)]
        file: Option<PathBuf>,
        /// Replace any rules already stored
        #[arg(long)]
        replace: bool,
    },
    /// Print the default rules file
    Example,
}

#[derive(Debug, clap::Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Show the config file path
    Path,
    /// Print an example config file
    Example,
    /// Create the config file if it does not exist
    Init,
}

fn setup_logging(config: &Config) -> Result<()> {
    twyg::setup(config.logging.clone())
        .map_err(|e| anyhow::anyhow!("Failed to set up logging: {:?}", e))?;
    Ok(())
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = Config::load_with_db_path(cli.db)?;
    setup_logging(&config)?;

    let ctx = commands::Context {
        config,
        yes: cli.yes,
        strict: cli.strict,
    };

    match cli.command {
        Commands::Migrate { command } => match command {
            MigrateCommands::Status => commands::migrate::show_status(&ctx)?,
            MigrateCommands::List => commands::migrate::list_migrations()?,
            MigrateCommands::Forward { target } => {
                return commands::migrate::forward(&ctx, &target);
            }
            MigrateCommands::Backward { target } => {
                return commands::migrate::backward(&ctx, &target);
            }
            MigrateCommands::Set { target } => commands::migrate::set_state(&ctx, &target)?,
            MigrateCommands::Reset => commands::migrate::reset_state(&ctx)?,
            MigrateCommands::Create { name, description } => {
                commands::migrate::create(&ctx, &name, &description)?;
            }
        },
        Commands::Rules { command } => match command {
            RulesCommands::List => commands::rules::list_rules(&ctx)?,
            RulesCommands::Validate => commands::rules::validate_rules(&ctx)?,
            RulesCommands::Seed { file, replace } => {
                commands::rules::seed(&ctx, file.as_deref(), replace)?;
            }
            RulesCommands::Example => commands::rules::print_example(),
        },
        Commands::Config { command } => match command {
            ConfigCommands::Show => commands::config::show_config(&ctx.config),
            ConfigCommands::Path => commands::config::show_path(),
            ConfigCommands::Example => commands::config::print_example(),
            ConfigCommands::Init => commands::config::init_config()?,
        },
    }

    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}
