use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use sea_orm_migration::MigratorTrait;
use tracing_subscriber::{fmt, EnvFilter};

use possum::loader::Loader;
use possum::{settings, storage};

#[derive(Parser, Debug)]
#[command(
    name = "possum",
    version,
    about = "Load RBAC policy documents into an authorization graph"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "possum.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replace the authorization graph with the contents of a policy file
    Load {
        /// KDL policy document
        policy: PathBuf,
        /// Account to load into (defaults to `policy.account` from the configuration)
        #[arg(short, long)]
        account: Option<String>,
    },
    /// Apply pending schema migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    // logging
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    // load settings
    let settings = settings::Settings::load(&cli.config)?;
    tracing::info!(?settings, "Loaded configuration");

    // init storage (database)
    let db = storage::init(&settings.database).await?;
    migration::Migrator::up(&db, None).await.into_diagnostic()?;

    match cli.command {
        Command::Migrate => {
            tracing::info!("Schema is up to date");
        }
        Command::Load { policy, account } => {
            let account = account.unwrap_or(settings.policy.account);
            let loader = Loader::new(db, settings.policy.reset_scope);
            let summary = loader.load_file(&policy, &account).await?;
            for id in &summary.created {
                tracing::info!(%id, "Created");
            }
        }
    }
    Ok(())
}
