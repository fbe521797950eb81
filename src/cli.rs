use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "vidgate")]
#[command(about = "Admission-gated video download service", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP server
    Server(ServerArgs),
    /// Print the Windows download script for a URL
    Bat(BatArgs),
    /// Print the effective configuration as TOML
    Config(ConfigArgs),
}

#[derive(clap::Args, Debug)]
pub struct ServerArgs {
    /// Address to bind, overriding server.host and server.port
    #[arg(long)]
    pub address: Option<SocketAddr>,

    /// Configuration file (defaults to $VIDGATE_CONFIG or config/vidgate.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct BatArgs {
    /// Video page URL
    pub url: String,
}

#[derive(clap::Args, Debug)]
pub struct ConfigArgs {
    #[arg(long)]
    pub config: Option<PathBuf>,
}
