use anyhow::Result;
use clap::{Parser, Subcommand};
use cli::normalize;
use mural_core::config;
use mural_core::config::AppConfig;
use mural_core::extractor::ImageExtractor;
use mural_core::reconcile::AssetService;
use std::sync::Arc;
use storage::{AssetRecord, CacheStore};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::List {
            collection,
            category,
            json,
        } => {
            let service = build_service(&cfg)?;
            let records = service
                .reconcile_and_list(&collection, category.as_deref())
                .await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else {
                print_records(&records);
            }
            Ok(())
        }
        Commands::Refresh { json } => {
            let service = build_service(&cfg)?;
            let mut counts = serde_json::Map::new();
            for name in service.collection_names() {
                let records = service.reconcile_and_list(&name, None).await?;
                if json {
                    counts.insert(name, records.len().into());
                } else {
                    println!("{name}: {} asset(s)", records.len());
                }
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&counts)?);
            }
            Ok(())
        }
        Commands::Normalize {
            collection,
            prefix,
            author,
            dry_run,
        } => normalize::run(&cfg, &collection, &prefix, &author, dry_run),
    }
}

fn build_service(cfg: &AppConfig) -> Result<AssetService> {
    let store = CacheStore::new(&cfg.cache.dir);
    let extractor = Arc::new(ImageExtractor {
        color_count: cfg.extraction.color_count,
    });
    AssetService::new(cfg, store, extractor)
}

fn print_records(records: &[AssetRecord]) {
    for record in records {
        println!(
            "{:<30} {:<12} {:<10} {:>10}  {}  {}",
            record.name,
            record.category,
            record.resolution,
            record.size,
            format_mtime(record.last_modified),
            record.colors.join(",")
        );
    }
    println!("{} asset(s)", records.len());
}

fn format_mtime(secs: i64) -> String {
    chrono::DateTime::<chrono::Utc>::from_timestamp(secs, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| secs.to_string())
}

#[derive(Parser)]
#[command(name = "mural")]
#[command(about = "Asset metadata indexer with cached reconciliation", long_about = None)]
struct Cli {
    /// Path to config TOML
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile one collection and print its listing
    List {
        collection: String,
        /// Only assets in this category
        #[arg(long)]
        category: Option<String>,
        /// Output JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Reconcile every configured collection
    Refresh {
        /// Output JSON summary
        #[arg(long)]
        json: bool,
    },
    /// Rename a collection's files to the sequential "<prefix> N@<author>" scheme
    Normalize {
        collection: String,
        #[arg(long, default_value = "Wallpaper")]
        prefix: String,
        #[arg(long, default_value = "Unknown")]
        author: String,
        /// Print planned renames without touching the filesystem
        #[arg(long)]
        dry_run: bool,
    },
}
