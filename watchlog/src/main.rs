//! watchlog - video watch history from the command line
//!
//! Import a watch history export, enrich it with catalog metadata, and print
//! the same statistics and explorer listings the HTTP API serves.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use watchlog_core::duration::humanize;
use watchlog_core::format::{format_count, format_count_opt, format_relative_time_opt};
use watchlog_core::insights::WordMaps;
use watchlog_core::logging::{self, Output};
use watchlog_core::{ingest, Config, Database, Explorer, ExplorerPage, ExplorerParams};
use watchlog_core::{InsightsService, StatsResponse, StatsService};

#[derive(Parser, Debug)]
#[command(name = "watchlog")]
#[command(about = "Video watch history analytics")]
#[command(version)]
struct Args {
    /// Database file (default: from config, else the XDG data directory)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import a watch history export (JSON array)
    Import {
        /// Parsed history or raw Takeout `watch-history.json`
        file: PathBuf,
    },
    /// Apply a video metadata dump (JSON array of camelCase records)
    Enrich {
        file: PathBuf,
    },
    /// Print aggregate statistics
    Stats {
        /// Only count watches at or after this instant (RFC 3339)
        #[arg(long)]
        cutoff: Option<String>,

        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
    /// List videos with their watch history
    Explore {
        /// Case-insensitive match on title or channel
        #[arg(long)]
        search: Option<String>,

        /// Sort field (e.g. viewCount, duration, lastWatchedAt)
        #[arg(long)]
        sort: Option<String>,

        /// Sort descending
        #[arg(long)]
        desc: bool,

        /// Zero-based page
        #[arg(long, default_value_t = 0)]
        page: u32,

        #[arg(long, default_value_t = 25)]
        page_size: u32,

        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
    /// Print tag and topic frequencies
    Words {
        /// Entries to show per list
        #[arg(long, default_value_t = 20)]
        limit: usize,

        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load().context("failed to load configuration")?;
    if let Some(path) = args.db {
        config.database.path = Some(path);
    }
    let _log_guard = logging::init(&config.logging, Output::File).ok();

    let db_path = config.resolved_database_path();
    tracing::info!(path = %db_path.display(), "Opening database");
    let db = Database::open(&db_path).context("failed to open database")?;
    db.migrate().context("failed to run database migrations")?;

    match args.command {
        Command::Import { file } => {
            let entries = ingest::read_history(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let report = ingest::import_history(&db, &entries).context("import failed")?;

            println!("Import complete:");
            println!("  Entries:          {}", format_count(report.entries as i64));
            println!("  Videos created:   {}", format_count(report.videos_created as i64));
            println!("  Watches recorded: {}", format_count(report.events_recorded as i64));
            println!("  Skipped:          {}", format_count(report.skipped.len() as i64));
            for skipped in report.skipped.iter().take(10) {
                println!("    #{}: {}", skipped.index, skipped.reason);
            }
            if report.skipped.len() > 10 {
                println!("    ... {} more", report.skipped.len() - 10);
            }
        }
        Command::Enrich { file } => {
            let records = ingest::read_metadata(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let report = ingest::enrich_metadata(&db, &records).context("enrichment failed")?;

            println!("Enrichment complete:");
            println!("  Records: {}", format_count(report.records as i64));
            println!("  Updated: {}", format_count(report.updated as i64));
            println!("  Skipped: {}", format_count(report.skipped as i64));
        }
        Command::Stats { cutoff, format } => {
            let cutoff = match cutoff {
                Some(raw) => DateTime::parse_from_rfc3339(&raw)
                    .with_context(|| format!("invalid cutoff '{}'", raw))?
                    .with_timezone(&Utc),
                None => config.stats.cutoff().context("invalid configured cutoff")?,
            };
            let service = StatsService::new(Arc::new(db), config.stats.duration_reduction);
            let stats = service.compute(cutoff).await.context("failed to compute stats")?;

            match format {
                Format::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
                Format::Text => print_stats(&stats, cutoff),
            }
        }
        Command::Explore {
            search,
            sort,
            desc,
            page,
            page_size,
            format,
        } => {
            let params = ExplorerParams {
                page: Some(page.to_string()),
                page_size: Some(page_size.to_string()),
                search,
                sort_by: sort.map(|id| serde_json::json!([{ "id": id, "desc": desc }]).to_string()),
            };
            let explorer = Explorer::new(Arc::new(db)).context("invalid explorer setup")?;
            let result = explorer.query(&params).await.context("explorer query failed")?;

            match format {
                Format::Json => println!("{}", serde_json::to_string_pretty(&result)?),
                Format::Text => print_page(&result),
            }
        }
        Command::Words { limit, format } => {
            let maps = InsightsService::new(Arc::new(db))
                .word_maps()
                .await
                .context("failed to compute word maps")?;

            match format {
                Format::Json => println!("{}", serde_json::to_string_pretty(&maps)?),
                Format::Text => print_words(&maps, limit),
            }
        }
    }

    Ok(())
}

fn print_stats(stats: &StatsResponse, cutoff: DateTime<Utc>) {
    let basic = &stats.basic_stats;

    println!();
    println!("WATCH HISTORY since {}", cutoff.format("%Y-%m-%d"));
    println!("{}", "─".repeat(60));

    if basic.total_videos == 0 {
        println!("  No watches found for this period.");
        println!();
        return;
    }

    println!("   Videos:   {:<12} Channels: {}", format_count(basic.total_videos), format_count(basic.unique_channels));
    if let (Some(first), Some(last)) = (basic.date_range.earliest, basic.date_range.latest) {
        println!("   Range:    {} to {}", first.format("%Y-%m-%d"), last.format("%Y-%m-%d"));
    }
    println!();

    println!("TOP CHANNELS BY WATCHES");
    for (i, channel) in stats.channel_stats.top_by_watches.iter().take(10).enumerate() {
        println!("   {:>2}. {:<40} {:>6}", i + 1, channel.channel_title, channel.count);
    }
    println!();

    println!("TOP CHANNELS BY WATCH TIME");
    for (i, channel) in stats.channel_stats.top_by_duration.iter().take(10).enumerate() {
        println!("   {:>2}. {:<40} {:>12}", i + 1, channel.channel_title, humanize(&channel.duration));
    }
    println!();

    println!("BY YEAR");
    for (watches, time) in stats
        .time_stats
        .watches_by_year
        .iter()
        .zip(stats.time_stats.duration_by_year.iter())
    {
        println!("   {}  {:>8} watches  {:>14}", watches.year, format_count(watches.count), humanize(&time.duration));
    }
    println!();

    let attributes = &stats.attribute_stats;
    println!("CATALOG");
    println!(
        "   Livestreams: {:<8} Regular: {}",
        attributes.streaming.livestream, attributes.streaming.regular
    );
    println!(
        "   With tags:   {:<8} Without: {}",
        attributes.metadata.has_tags, attributes.metadata.no_tags
    );
    println!();
}

fn print_page(page: &ExplorerPage) {
    let now = Utc::now();
    println!(
        "{:<12} {:<40} {:>7} {:>14} {:>12}",
        "VIDEO", "TITLE", "WATCHES", "VIEWS", "LAST WATCHED"
    );
    for row in &page.data {
        println!(
            "{:<12} {:<40} {:>7} {:>14} {:>12}",
            row.video.video_id,
            truncate(&row.video.title, 40),
            row.watch_count,
            format_count_opt(row.video.view_count),
            format_relative_time_opt(row.last_watched_at, now),
        );
    }
    println!(
        "Page {} of {} ({} videos)",
        page.meta.page + 1,
        page.meta.page_count.max(1),
        format_count(page.meta.total)
    );
}

fn print_words(maps: &WordMaps, limit: usize) {
    println!("TAGS");
    for tag in maps.tags.iter().take(limit) {
        println!("   {:<40} {:>6}", tag.tag, tag.count);
    }
    println!();
    println!("TOPICS");
    for topic in maps.topics.iter().take(limit) {
        println!("   {:<40} {:>6}", topic.topic, topic.count);
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}
