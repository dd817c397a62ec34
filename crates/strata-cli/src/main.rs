mod cli;
mod commands;
mod output;

use clap::Parser;
use cli::{Cli, Command};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Server { bind, port, database, provisioner } => commands::server(bind, port, database, provisioner).await,
        Command::Cluster(cmd) => commands::cluster(cmd, cli.remote, cli.token).await,
        Command::Installation(cmd) => commands::installation(cmd, cli.remote, cli.token).await,
        Command::Group(cmd) => commands::group(cmd, cli.remote, cli.token).await,
        Command::Schema(cmd) => commands::schema(cmd, cli.remote, cli.token).await,
    };

    if let Err(err) = result {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
    Ok(())
}
