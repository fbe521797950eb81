mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use std::path::PathBuf;
use vidgate::{api, config::Config, observability};

type AnyError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), AnyError> {
    observability::init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Server(args) => {
            let mut config = load_config(args.config)?;
            if let Some(address) = args.address {
                config.server.host = address.ip();
                config.server.port = address.port();
            }
            api::run(config).await?
        }
        Commands::Bat(args) => print!("{}", api::utils::render_bat_script(&args.url)),
        Commands::Config(args) => print!("{}", load_config(args.config)?.to_toml()?),
    }

    Ok(())
}

fn load_config(path: Option<PathBuf>) -> Result<Config, AnyError> {
    let config = match path {
        Some(path) => Config::load_with_file(path)?,
        None => Config::load()?,
    };
    Ok(config)
}
