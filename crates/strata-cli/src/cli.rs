use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "strata", about = "Multi-tenant cloud orchestrator control plane", version)]
pub struct Cli {
    /// Base URL of a running server. Defaults to http://localhost:8080.
    #[arg(long, env = "STRATA_URL", global = true)]
    pub remote: Option<String>,

    /// Bearer token used for client subcommands. Falls back to STRATA_TOKEN.
    #[arg(long, env = "STRATA_TOKEN", global = true)]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the API server and the per-kind supervisor loops in-process.
    Server {
        #[arg(long, default_value = "0.0.0.0")]
        bind: String,
        #[arg(long, default_value_t = 8080)]
        port: u16,
        /// "memory" or a postgres:// connection string.
        #[arg(long, env = "STRATA_DATABASE", default_value = "memory")]
        database: String,
        /// Default provisioner name registered against the local no-op driver.
        #[arg(long, env = "STRATA_PROVISIONER", default_value = "local")]
        provisioner: String,
    },

    #[command(subcommand)]
    Cluster(ClusterCommand),

    #[command(subcommand)]
    Installation(InstallationCommand),

    #[command(subcommand)]
    Group(GroupCommand),

    #[command(subcommand)]
    Schema(SchemaCommand),
}

#[derive(Debug, Subcommand)]
pub enum ClusterCommand {
    List,
    Get { id: String },
    Create {
        #[arg(long, default_value = "aws")]
        provider: String,
        #[arg(long)]
        provisioner: String,
    },
    Delete { id: String },
}

#[derive(Debug, Subcommand)]
pub enum InstallationCommand {
    List,
    Get { id: String },
    Create {
        #[arg(long)]
        owner_id: String,
        #[arg(long)]
        dns: String,
    },
    Delete { id: String },
    Hibernate { id: String },
    Wakeup { id: String },
}

#[derive(Debug, Subcommand)]
pub enum GroupCommand {
    List,
    Get { id: String },
    Create {
        #[arg(long)]
        name: String,
        #[arg(long, default_value_t = 1)]
        max_rolling: u32,
    },
    Status { id: String },
    Delete { id: String },
}

#[derive(Debug, Subcommand)]
pub enum SchemaCommand {
    /// Request a new database schema for an Installation.
    Apply {
        #[arg(long)]
        logical_database_id: String,
        #[arg(long)]
        installation_id: String,
        #[arg(long)]
        name: String,
    },
}
