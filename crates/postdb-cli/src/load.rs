//! `postdb load` and the load half of `postdb run`.

use std::path::Path;

use anyhow::Context;
use chrono::Utc;
use postdb_core::{AppConfig, CleanedPost};
use postdb_db::{LoadMode, LoadReport};

use crate::LoadArgs;

pub(crate) async fn run_load(config: &AppConfig, args: &LoadArgs) -> anyhow::Result<()> {
    let input = args.input.as_deref().unwrap_or(&config.cleaned_path);
    let posts = postdb_cleaner::read_cleaned(input)
        .with_context(|| format!("failed to read cleaned records from {}", input.display()))?;

    run_load_posts(config, &posts, args.db.as_deref(), args.replace, None).await
}

pub(crate) async fn run_load_posts(
    config: &AppConfig,
    posts: &[CleanedPost],
    db: Option<&Path>,
    replace: bool,
    validate_min_records: Option<usize>,
) -> anyhow::Result<()> {
    let db_path = db.unwrap_or(&config.database_path);
    let pool = crate::db::open_pool(config, db_path).await?;

    let mode = if replace {
        LoadMode::Replace
    } else {
        LoadMode::Strict
    };
    let report = postdb_db::load(&pool, posts, mode, Utc::now())
        .await
        .with_context(|| format!("failed to load posts into {}", db_path.display()))?;

    print_load_report(&report, db_path);

    if let Some(min_records) = validate_min_records {
        let validation = postdb_db::validate_loaded(&pool, min_records).await?;
        crate::db::print_validation(&validation);
    }

    pool.close().await;
    Ok(())
}

fn print_load_report(report: &LoadReport, db_path: &Path) {
    let summary = &report.summary;
    println!(
        "loaded {} posts, {} tags, {} post_tags into {} (run {})",
        report.posts_inserted,
        report.tags_inserted,
        report.post_tags_inserted,
        db_path.display(),
        report.run_id
    );
    println!(
        "avg words {:.1}, avg notes {:.1}, {} with images, most common type {}",
        summary.avg_word_count,
        summary.avg_notes,
        summary.posts_with_images,
        summary.most_common_type.as_deref().unwrap_or("-")
    );
    println!(
        "engagement: no_engagement {}, low {}, medium {}, high {}",
        summary.engagement_no_engagement,
        summary.engagement_low,
        summary.engagement_medium,
        summary.engagement_high
    );
}
