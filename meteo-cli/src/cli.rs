use anyhow::Context;
use clap::{Parser, Subcommand};
use inquire::Text;
use std::path::PathBuf;

use meteo_core::{Config, Pipeline};

use crate::output;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(
    name = "meteo",
    version,
    about = "Fetch the forecast for a place and store it in SQLite",
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Place name, e.g. "Berlin". Prompted for when omitted.
    pub location: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactively edit and save the configuration file.
    Configure,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Some(Command::Configure) => configure(),
            None => fetch(self.location).await,
        }
    }
}

async fn fetch(location: Option<String>) -> anyhow::Result<()> {
    let config = Config::load()?;

    let location = match location {
        Some(location) => location,
        None => Text::new("Enter a location:").prompt().context("Failed to read location")?,
    };

    let mut pipeline = Pipeline::from_config(&config)?;
    let report = pipeline
        .run(&location)
        .await
        .with_context(|| format!("Failed to fetch weather for '{location}'"))?;

    print!("{}", output::ReportView(&report));
    println!(
        "Saved {} hourly and {} daily rows to {}",
        report.hourly.len(),
        report.daily.len(),
        config.storage.database.display()
    );

    Ok(())
}

fn configure() -> anyhow::Result<()> {
    let mut config = Config::load()?;

    config.forecast.timezone = Text::new("Timezone:")
        .with_default(&config.forecast.timezone)
        .prompt()
        .context("Failed to read timezone")?;

    let database = Text::new("Database file:")
        .with_default(&config.storage.database.display().to_string())
        .prompt()
        .context("Failed to read database path")?;
    config.storage.database = PathBuf::from(database);

    let expiry = Text::new("Cache expiry (seconds, 0 disables):")
        .with_default(&config.cache.expire_after_secs.to_string())
        .prompt()
        .context("Failed to read cache expiry")?;
    config.cache.expire_after_secs = expiry
        .trim()
        .parse()
        .with_context(|| format!("'{expiry}' is not a number of seconds"))?;

    let path = config.save()?;
    println!("Configuration saved to {}", path.display());

    Ok(())
}
