//! Effective configuration.

use clap::Args;

use super::load_config;
use crate::Cli;

/// Prints the configuration after defaults are applied.
#[derive(Args)]
pub struct ConfigCommand {}

impl ConfigCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let config = load_config(cli)?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&config)?);
        } else {
            print!("{}", config.to_yaml()?);
        }
        Ok(())
    }
}
