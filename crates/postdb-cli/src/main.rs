mod clean;
mod db;
mod load;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use postdb_core::{DedupPolicy, EngagementThresholds};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "postdb")]
#[command(about = "Clean scraped Tumblr posts and load them into SQLite")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Clean a raw scraper file and write the cleaned set
    Clean(CleanArgs),
    /// Load a cleaned file into the database
    Load(LoadArgs),
    /// Clean, then load; stops if the cleaned set is too small
    Run {
        #[command(flatten)]
        clean: CleanArgs,
        /// SQLite database file
        #[arg(long)]
        db: Option<PathBuf>,
        /// Replace previously loaded posts instead of failing
        #[arg(long)]
        replace: bool,
    },
    /// Database management commands
    Db {
        /// SQLite database file
        #[arg(long, global = true)]
        db: Option<PathBuf>,
        #[command(subcommand)]
        command: DbCommands,
    },
}

#[derive(Debug, Clone, Args)]
struct CleanArgs {
    /// Raw CSV produced by the scraper
    #[arg(long)]
    input: Option<PathBuf>,
    /// Where to write the cleaned CSV
    #[arg(long)]
    output: Option<PathBuf>,
    /// YAML file with cleaning settings; replaces the environment's settings
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    min_word_count: Option<usize>,
    #[arg(long)]
    max_word_count: Option<usize>,
    /// Minimum number of posts that must survive cleaning
    #[arg(long)]
    min_records: Option<usize>,
    /// Three ascending notes-count bounds, e.g. `1,10,100`
    #[arg(long)]
    engagement_thresholds: Option<EngagementThresholds>,
    /// `keep-first` or `highest-notes`
    #[arg(long)]
    dedup_policy: Option<DedupPolicy>,
}

#[derive(Debug, Clone, Args)]
struct LoadArgs {
    /// Cleaned CSV to load
    #[arg(long)]
    input: Option<PathBuf>,
    /// SQLite database file
    #[arg(long)]
    db: Option<PathBuf>,
    /// Replace previously loaded posts instead of failing
    #[arg(long)]
    replace: bool,
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Apply pending schema migrations
    Migrate,
    /// Check that the database can be opened and queried
    Ping,
    /// Re-run the post-load integrity check against the latest summary and
    /// validate the stored post count and quality ratio
    Verify {
        /// Minimum number of stored posts; defaults to the cleaning minimum
        #[arg(long)]
        min_records: Option<usize>,
    },
    /// Print row counts, the latest summary and the most used tags
    Stats {
        /// Number of top tags and sample posts to show
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = postdb_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match cli.command {
        Commands::Clean(args) => {
            clean::run_clean(&config, &args)?;
        }
        Commands::Load(args) => load::run_load(&config, &args).await?,
        Commands::Run {
            clean: clean_args,
            db,
            replace,
        } => {
            let cleaned = clean::run_clean(&config, &clean_args)?;
            load::run_load_posts(
                &config,
                &cleaned.posts,
                db.as_deref(),
                replace,
                Some(cleaned.min_records),
            )
            .await?;
        }
        Commands::Db { db, command } => {
            db::run_db_command(&config, db.as_deref(), command).await?;
        }
    }

    Ok(())
}
