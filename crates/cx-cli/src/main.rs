use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cx_cli::commands::{classes, open_database, replay, sessions, status};
use cx_cli::{ClassesAction, Cli, Commands, Config};

fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Logs go to stderr so report output on stdout stays machine-readable
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let mut stdout = io::stdout().lock();

    match &cli.command {
        Some(Commands::Replay(args)) => {
            let config = load_config(cli.config.as_deref())?;
            replay::run(&mut stdout, args, &config)?;
        }
        Some(Commands::Sessions { class, json }) => {
            let config = load_config(cli.config.as_deref())?;
            let db = open_database(&config)?;
            sessions::run(&mut stdout, &db, class.as_deref(), *json)?;
        }
        Some(Commands::Classes(action)) => {
            let config = load_config(cli.config.as_deref())?;
            let mut db = open_database(&config)?;
            match action {
                ClassesAction::Set { name, prompt } => {
                    classes::set(&mut stdout, &mut db, name, prompt)?;
                }
                ClassesAction::List => classes::list(&mut stdout, &db)?,
                ClassesAction::Show { name } => classes::show(&mut stdout, &db, name)?,
            }
        }
        Some(Commands::Status) => {
            let config = load_config(cli.config.as_deref())?;
            status::run(&mut stdout, &config)?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
