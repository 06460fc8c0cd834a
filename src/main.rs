//! texguard CLI entry point.

use anyhow::Result;
use clap::Parser;

use texguard::cli::{commands, handle_error, Cli, Commands};
use texguard::domain::models::{Config, Verdict};
use texguard::infrastructure::config::ConfigLoader;
use texguard::infrastructure::logging::{LogConfig, LoggerImpl};

fn load_config(cli: &Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let config = load_config(&cli)?;
    let _logger = LoggerImpl::init(&LogConfig::try_from(&config.logging)?)?;

    match cli.command {
        Commands::Check(args) => {
            let verdict = commands::check::execute(args, config, cli.json).await?;
            Ok(i32::from(verdict == Verdict::Fail))
        }
        Commands::Rules(args) => commands::rules::execute(args, &config, cli.json).map(|()| 0),
        Commands::Chunks(args) => commands::chunks::execute(args, &config, cli.json)
            .await
            .map(|()| 0),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json_mode = cli.json;

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(err) => handle_error(err, json_mode),
    }
}
