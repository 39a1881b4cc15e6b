//! `postdb db ...` management commands.

use std::path::Path;

use anyhow::Context;
use postdb_core::AppConfig;
use postdb_db::{ExpectedCounts, LoadValidation};
use sqlx::SqlitePool;

use crate::DbCommands;

/// Open the database at `path` and bring its schema up to date.
pub(crate) async fn open_pool(config: &AppConfig, path: &Path) -> anyhow::Result<SqlitePool> {
    let pool_config = postdb_db::PoolConfig::from_app_config(config);
    let pool = postdb_db::connect_pool(path, pool_config)
        .await
        .with_context(|| format!("failed to open database {}", path.display()))?;
    let applied = postdb_db::run_migrations(&pool).await?;
    if applied > 0 {
        tracing::info!(applied, "applied migrations");
    }
    Ok(pool)
}

pub(crate) async fn run_db_command(
    config: &AppConfig,
    db: Option<&Path>,
    command: DbCommands,
) -> anyhow::Result<()> {
    let db_path = db.unwrap_or(&config.database_path);
    let pool = open_pool(config, db_path).await?;

    match command {
        DbCommands::Migrate => {
            println!("migrations up to date for {}", db_path.display());
        }
        DbCommands::Ping => {
            postdb_db::ping(&pool).await?;
            println!("database ok");
        }
        DbCommands::Verify { min_records } => {
            let latest = postdb_db::latest_summary(&pool)
                .await?
                .context("no load has been recorded yet")?;
            postdb_db::verify_integrity(&pool, &ExpectedCounts::from_summary(&latest.stats))
                .await?;
            println!("integrity ok for run {}", latest.id);

            let min_records = min_records.unwrap_or(config.clean.min_records_required);
            let validation = postdb_db::validate_loaded(&pool, min_records).await?;
            print_validation(&validation);
        }
        DbCommands::Stats { limit } => print_stats(&pool, limit).await?,
    }

    pool.close().await;
    Ok(())
}

pub(crate) fn print_validation(validation: &LoadValidation) {
    println!(
        "{} posts, {} tags, quality ratio {:.2}% ({} posts with words)",
        validation.posts,
        validation.tags,
        validation.quality_ratio * 100.0,
        validation.posts_with_words
    );
    if validation.is_low_quality() {
        println!(
            "warning: quality ratio below {:.0}%",
            postdb_db::MIN_QUALITY_RATIO * 100.0
        );
    }
}

async fn print_stats(pool: &SqlitePool, limit: i64) -> anyhow::Result<()> {
    let counts = postdb_db::count_rows(pool).await?;
    let summary = postdb_db::latest_summary(pool).await?;
    let top_tags = postdb_db::top_tags(pool, limit).await?;
    let sample = postdb_db::sample_posts(pool, limit).await?;

    let stats = serde_json::json!({
        "counts": counts,
        "latest_summary": summary,
        "top_tags": top_tags,
        "sample_posts": sample,
    });
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
