//! Configuration commands: `config path`, `config show`, `config init`,
//! `config get` and `config set`.

use std::path::Path;

use clap::Subcommand;
use trafficflow::config::{AppConfig, ConfigFile};

use crate::error::CliError;

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the configuration file path
    Path,

    /// Print the effective configuration, defaults included
    Show,

    /// Write a configuration file with every default filled in
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Get a value
    Get {
        /// Key in the form section.key (e.g. collector.poll_interval_secs)
        key: String,
    },

    /// Set a value
    Set {
        /// Key in the form section.key (e.g. cache.enable_l2)
        key: String,

        /// Value to set
        value: String,
    },
}

pub fn run(path: &Path, command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Path => {
            println!("{}", path.display());
            Ok(())
        }
        ConfigCommands::Show => run_show(path),
        ConfigCommands::Init { force } => run_init(path, force),
        ConfigCommands::Get { key } => run_get(path, &key),
        ConfigCommands::Set { key, value } => run_set(path, &key, &value),
    }
}

fn run_show(path: &Path) -> Result<(), CliError> {
    let app = ConfigFile::load_or_default(path)?.to_app_config()?;
    print!("{}", ConfigFile::from_app_config(&app).render());
    Ok(())
}

fn run_init(path: &Path, force: bool) -> Result<(), CliError> {
    if path.exists() && !force {
        return Err(CliError::Config(format!(
            "{} already exists. Use --force to overwrite it.",
            path.display()
        )));
    }
    ConfigFile::from_app_config(&AppConfig::default()).save(path)?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn run_get(path: &Path, key: &str) -> Result<(), CliError> {
    let (section, name) = split_key(key)?;
    let config = ConfigFile::load_or_default(path)?;
    match config.get(section, name) {
        Some(value) if !value.is_empty() => println!("{}", value),
        _ => println!("(not set)"),
    }
    Ok(())
}

fn run_set(path: &Path, key: &str, value: &str) -> Result<(), CliError> {
    let (section, name) = split_key(key)?;
    let mut config = ConfigFile::load_or_default(path)?;
    config.set(section, name, value);

    // Reject values that would make the file unloadable.
    let rendered = ConfigFile::parse(&config.render())?;
    rendered.to_app_config()?;

    config.save(path)?;
    println!("Set {} = {}", key, value);
    Ok(())
}

/// Splits `section.key` at the last dot, so location sections such as
/// `location.west_lake.lng` work.
fn split_key(key: &str) -> Result<(&str, &str), CliError> {
    key.rsplit_once('.')
        .filter(|(section, name)| !section.is_empty() && !name.is_empty())
        .ok_or_else(|| CliError::Config(format!("Invalid key '{}'. Expected section.key", key)))
}
