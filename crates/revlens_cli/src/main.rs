//! revlens CLI - command-line interface for review sync and analysis.

mod commands;
mod config;
mod progress;
mod shutdown;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "revlens")]
#[command(version)]
#[command(about = "Incremental code-review sync and local-model analysis")]
#[command(
    long_about = "revlens mirrors changes from a Gerrit review server into a local database, \
one cursor per status, and analyzes them with a locally hosted generative model: \
summaries, merge and abandon reasons, categories and author mental models."
)]
#[command(after_long_help = r#"EXAMPLES
    Create the database schema:
        $ revlens migrate up

    Sync every configured status from its cursor:
        $ revlens sync

    Quick poll of recent activity (labels and owners only):
        $ revlens sync --light --since 2024-05-01

    Analyze up to 50 pending changes:
        $ revlens analyze --limit 50

    Explain one change, including its diff:
        $ revlens explain 12345 --diff

    Run scheduled sync and analysis until Ctrl+C:
        $ revlens run

CONFIGURATION
    revlens reads configuration from:
      1. ~/.config/revlens/config.toml (or $XDG_CONFIG_HOME/revlens/config.toml)
      2. ./revlens.toml
      3. Environment variables (REVLENS_ prefix, `__` between section and key)
      4. .env file in current directory

ENVIRONMENT VARIABLES
    REVLENS_DATABASE__URL      Database connection string (default: ~/.local/state/revlens/revlens.db)
    REVLENS_GERRIT__URL        Review server base URL
    REVLENS_GERRIT__USERNAME   HTTP username for authenticated requests
    REVLENS_GERRIT__PASSWORD   HTTP password for authenticated requests
    REVLENS_GERRIT__PROJECT    Project to sync
    REVLENS_GITILES__URL       Commit browser base URL (for explain --diff)
    REVLENS_MODEL__URL         Model server URL (default: http://localhost:11434)
    REVLENS_MODEL__NAME        Model name (default: llama3)
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate {
        #[command(subcommand)]
        action: MigrateAction,
    },
    /// Fetch changes from the review server into the local database
    Sync {
        /// Smaller pages with labels and owners only
        #[arg(short, long)]
        light: bool,

        /// Fetch changes updated after this date (YYYY-MM-DD) instead of
        /// resuming from the stored cursors
        #[arg(short, long)]
        since: Option<NaiveDate>,
    },
    /// Analyze changes that have no up-to-date analysis
    Analyze {
        /// Maximum changes to analyze (default from config or 20)
        #[arg(short = 'n', long)]
        limit: Option<u64>,
    },
    /// Summarize one stored change
    Explain {
        /// Change number
        number: i64,

        /// Also fetch and summarize the diff
        #[arg(short, long)]
        diff: bool,
    },
    /// Describe how an author approaches their changes
    MentalModel {
        /// Owner display name, as stored
        owner: String,

        /// Number of recent changes to read
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: u64,
    },
    /// Check that the model server is reachable and the model is installed
    CheckModel,
    /// Run scheduled sync and analysis until interrupted
    Run,
    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
enum MigrateAction {
    /// Apply all pending migrations
    Up,
    /// Rollback the last migration
    Down,
    /// Show migration status
    Status,
    /// Fresh install - drop all tables and reapply migrations
    Fresh,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new("revlens=info,revlens_cli=info"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Handle commands that don't require configuration first
    if let Commands::Completions { shell } = &cli.command {
        commands::meta::handle_completions(*shell)?;
        return Ok(());
    }

    // Load configuration (config file -> env vars -> defaults)
    let config = config::Config::load()?;
    let cancel = shutdown::setup_shutdown_handler();

    let database_url = config
        .database_url()
        .ok_or("could not determine a database URL; set database.url")?;

    // Ensure the database directory exists for SQLite
    if database_url.starts_with("sqlite://") {
        let db_path = database_url.trim_start_matches("sqlite://");
        // Strip query parameters (e.g., ?mode=rwc) before path operations
        let db_path = db_path.split('?').next().unwrap_or(db_path);
        let db_path = std::path::Path::new(db_path);

        if db_path.is_relative() && !db_path.as_os_str().is_empty() {
            tracing::warn!(
                "Database path '{}' is relative - behavior depends on current directory. \
                 Consider using an absolute path.",
                db_path.display()
            );
        }

        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
    }

    let result = match cli.command {
        Commands::Migrate { action } => {
            commands::migrate::handle_migrate(action, &database_url).await
        }
        Commands::Sync { light, since } => {
            commands::sync::handle_sync(light, since, &config, &database_url, &cancel).await
        }
        Commands::Analyze { limit } => {
            commands::analyze::handle_analyze(limit, &config, &database_url, &cancel).await
        }
        Commands::Explain { number, diff } => {
            commands::explain::handle_explain(number, diff, &config, &database_url, &cancel).await
        }
        Commands::MentalModel { owner, limit } => {
            commands::explain::handle_mental_model(&owner, limit, &config, &database_url, &cancel)
                .await
        }
        Commands::CheckModel => commands::analyze::handle_check_model(&config, &cancel).await,
        Commands::Run => commands::run::handle_run(&config, &database_url, &cancel).await,
        Commands::Completions { .. } => Ok(()),
    };

    if let Err(e) = &result {
        if cancel.is_cancelled() {
            tracing::warn!("Interrupted");
            std::process::exit(130);
        }
        tracing::error!(error = %e, "Command failed");
    }
    result
}
