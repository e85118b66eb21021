//! PaperAtlas: paper ingestion and concept extraction.
//! Entry point for the `paperatlas` binary.

mod extract;
mod ingest;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use paperatlas_config::{Config, MySqlConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "paperatlas", version)]
#[command(about = "Ingest research papers and extract the concepts they discuss")]
struct Cli {
    /// Config file (defaults to ./paperatlas.toml)
    #[arg(long, global = true, env = "PAPERATLAS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch papers by identifier, URL or arXiv search and store them
    Ingest(ingest::IngestArgs),

    /// Extract, deduplicate and summarise concepts for stored papers
    Extract(extract::ExtractArgs),
}

/// `--mysql-*` flags shared by both subcommands.
#[derive(Args, Debug, Default, Clone)]
pub struct MySqlOverrides {
    #[arg(long)]
    pub mysql_host: Option<String>,
    #[arg(long)]
    pub mysql_port: Option<u16>,
    #[arg(long)]
    pub mysql_user: Option<String>,
    #[arg(long)]
    pub mysql_password: Option<String>,
    #[arg(long)]
    pub mysql_database: Option<String>,
}

impl MySqlOverrides {
    pub fn apply(&self, cfg: &mut MySqlConfig) {
        if let Some(host) = &self.mysql_host {
            cfg.host = host.clone();
        }
        if let Some(port) = self.mysql_port {
            cfg.port = port;
        }
        if let Some(user) = &self.mysql_user {
            cfg.user = user.clone();
        }
        if let Some(password) = &self.mysql_password {
            cfg.password = password.clone();
        }
        if let Some(database) = &self.mysql_database {
            cfg.database = database.clone();
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("paperatlas=info,info")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("{e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    info!("PaperAtlas {}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Ingest(args) => ingest::run(args, config).await,
        Commands::Extract(args) => extract::run(args, config).await,
    }
}
