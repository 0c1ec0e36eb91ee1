use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cn_core::UserStore;
use cn_engine::EngineConfig;
use cn_graph::SqliteCompanyGraph;
use cn_storage::{SqliteDb, SqliteUserStore};

#[derive(Parser)]
#[command(
    name = "cornet",
    about = "Cornet — company-network intelligence backend",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(long, global = true, default_value = "~/.cornet/config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the REST API server
    Serve {
        /// Bind host
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Bind port
        #[arg(long, short, default_value = "5000")]
        port: u16,
    },

    /// Database management
    Db {
        #[command(subcommand)]
        action: DbAction,
    },

    /// User management
    User {
        #[command(subcommand)]
        action: UserAction,
    },
}

#[derive(Subcommand)]
enum DbAction {
    /// Apply pending schema migrations
    Migrate,

    /// Seed the company graph with the demo dataset
    SeedGraph {
        /// Graph database path (defaults to the configured one)
        #[arg(long)]
        path: Option<String>,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a user if it does not exist
    Ensure {
        username: String,

        #[arg(long, default_value = "user")]
        role: String,
    },
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => Path::new(&home).join(rest),
        _ => PathBuf::from(path),
    }
}

fn open_relational_db(config: &EngineConfig) -> Result<Arc<SqliteDb>> {
    std::fs::create_dir_all(&config.data_dir)?;
    let path = Path::new(&config.data_dir).join("cornet.db");
    Ok(Arc::new(SqliteDb::open(&path)?))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let config_path = expand_home(&cli.config);
    let config = EngineConfig::load(Some(&config_path))?;

    match cli.command {
        Commands::Serve { host, port } => {
            cn_server::serve(config, &host, port).await?;
        }
        Commands::Db { action } => match action {
            DbAction::Migrate => {
                // Opening runs every pending migration.
                open_relational_db(&config)?;
                println!("migrations applied");
            }
            DbAction::SeedGraph { path } => {
                let path = path
                    .or_else(|| config.graph.db_path.clone())
                    .ok_or_else(|| anyhow::anyhow!("no graph db path configured"))?;
                let store = SqliteCompanyGraph::open(Path::new(&path))?;
                store.seed_demo()?;
                println!("company graph seeded at {path}");
            }
        },
        Commands::User { action } => match action {
            UserAction::Ensure { username, role } => {
                let db = open_relational_db(&config)?;
                let users = SqliteUserStore::new(db);
                let user = users.ensure(&username, &role).await?;
                println!("user {} ({})", user.username, user.id);
            }
        },
    }

    Ok(())
}
