use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use shelver_core::grouping::PURPOSE_READING;
use shelver_core::{AppConfig, BookGroup, BookVariant, MetadataRecord, ParsedFilename};
use shelver_metadata::Resolver;

// ─── CLI Definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "shelver",
    about = "Resolve ebook metadata from filenames and group format variants",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output in JSON format. Also enabled by setting SHELVER_JSON=1.
    #[arg(long, global = true)]
    json: bool,

    /// Debug logging (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Guess title, author and ISBN from filenames.
    Parse { files: Vec<String> },

    /// Look up metadata for files through the configured providers.
    Resolve { files: Vec<PathBuf> },

    /// Group files that are format variants of the same book.
    Group {
        files: Vec<PathBuf>,
        /// Resolve metadata before grouping.
        #[arg(long)]
        resolve: bool,
    },

    /// Pick the preferred file per book for a purpose.
    Prefer {
        files: Vec<PathBuf>,
        #[arg(long, default_value = PURPOSE_READING)]
        purpose: String,
        #[arg(long)]
        resolve: bool,
    },

    /// Config management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the config file path.
    Path,
    /// Print the effective config as TOML.
    Show,
    /// Write the default config if no file exists yet.
    Init,
}

// ─── Main ────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let start = Instant::now();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let json_output = cli.json || std::env::var("SHELVER_JSON").as_deref() == Ok("1");
    let config = AppConfig::load().context("loading config")?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, cancelling outstanding lookups");
                cancel.cancel();
            }
        });
    }

    match cli.command {
        // ── Parse ──────────────────────────────────────────────────────────
        Commands::Parse { files } => {
            let parsed: Vec<ParsedFilename> = files.iter().map(|f| shelver_core::parse(f)).collect();
            if json_output {
                print_json(&serde_json::json!({
                    "status": "ok",
                    "data": parsed,
                    "meta": {"duration_ms": start.elapsed().as_millis()}
                }))?;
            } else {
                for (file, p) in files.iter().zip(&parsed) {
                    println!("{file}");
                    println!("  title:  {}", p.title);
                    println!("  author: {}", p.author.as_deref().unwrap_or("-"));
                    if let Some(isbn) = &p.isbn {
                        println!("  isbn:   {isbn}");
                    }
                }
            }
        }

        // ── Resolve ────────────────────────────────────────────────────────
        Commands::Resolve { files } => {
            let resolver = Resolver::from_config(&config)?;
            let seeds: Vec<ParsedFilename> = files.iter().map(|f| parse_path(f)).collect();
            let mut records = Vec::with_capacity(seeds.len());
            for result in resolver.resolve_all(&seeds, &cancel).await {
                records.push(result?);
            }

            if json_output {
                print_json(&serde_json::json!({
                    "status": "ok",
                    "data": records,
                    "meta": {"duration_ms": start.elapsed().as_millis()}
                }))?;
            } else {
                for (file, record) in files.iter().zip(&records) {
                    println!("{}", file.display());
                    print_record(record);
                }
            }
        }

        // ── Group ──────────────────────────────────────────────────────────
        Commands::Group { files, resolve } => {
            let variants = load_variants(&files, resolve, &config, &cancel).await?;
            let groups = shelver_core::group(&variants);

            if json_output {
                print_json(&serde_json::json!({
                    "status": "ok",
                    "data": groups,
                    "meta": {"duration_ms": start.elapsed().as_millis()}
                }))?;
            } else {
                println!("{} book(s) from {} file(s):", groups.len(), variants.len());
                for g in &groups {
                    print_group(g);
                }
            }
        }

        // ── Prefer ─────────────────────────────────────────────────────────
        Commands::Prefer {
            files,
            purpose,
            resolve,
        } => {
            if config.formats.priorities(&purpose).is_empty() {
                warn!(%purpose, "unknown purpose, falling back to group order");
            }
            let variants = load_variants(&files, resolve, &config, &cancel).await?;
            let groups = shelver_core::group(&variants);
            let picks: Vec<(&BookGroup, Option<&BookVariant>)> = groups
                .iter()
                .map(|g| (g, shelver_core::preferred_format(g, &purpose, &config.formats)))
                .collect();

            if json_output {
                let data: Vec<serde_json::Value> = picks
                    .iter()
                    .map(|(g, v)| serde_json::json!({"group_key": g.group_key, "preferred": v}))
                    .collect();
                print_json(&serde_json::json!({
                    "status": "ok",
                    "data": data,
                    "meta": {"duration_ms": start.elapsed().as_millis(), "purpose": purpose}
                }))?;
            } else {
                for (g, v) in &picks {
                    match v {
                        Some(v) => println!("{} → {} ({})", g.group_key, v.metadata.title, v.format),
                        None => println!("{} → (none)", g.group_key),
                    }
                }
            }
        }

        // ── Config ─────────────────────────────────────────────────────────
        Commands::Config { action } => match action {
            ConfigAction::Path => println!("{}", AppConfig::config_path().display()),
            ConfigAction::Show => {
                if json_output {
                    print_json(&serde_json::to_value(&config)?)?;
                } else {
                    print!("{}", toml::to_string_pretty(&config)?);
                }
            }
            ConfigAction::Init => {
                let path = AppConfig::config_path();
                if path.exists() {
                    eprintln!("Config already exists: {}", path.display());
                    std::process::exit(1);
                }
                AppConfig::default().save_to(&path)?;
                println!("Wrote default config to {}", path.display());
            }
        },
    }

    Ok(())
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn init_tracing(verbose: bool) {
    let default = if verbose { "shelver=debug" } else { "shelver=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn parse_path(path: &Path) -> ParsedFilename {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned());
    shelver_core::parse(&name)
}

/// Variants for `files`, seeded from their names and optionally resolved.
async fn load_variants(
    files: &[PathBuf],
    resolve: bool,
    config: &AppConfig,
    cancel: &CancellationToken,
) -> Result<Vec<BookVariant>> {
    let seeds: Vec<ParsedFilename> = files.iter().map(|f| parse_path(f)).collect();

    let records: Vec<MetadataRecord> = if resolve {
        let resolver = Resolver::from_config(config)?;
        let mut records = Vec::with_capacity(seeds.len());
        for result in resolver.resolve_all(&seeds, cancel).await {
            records.push(result?);
        }
        records
    } else {
        seeds
            .iter()
            .map(|s| MetadataRecord::from_filename(s, config.resolver.seed_confidence))
            .collect()
    };

    Ok(files
        .iter()
        .zip(records)
        .map(|(path, record)| {
            let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
            BookVariant::from_path(path, size, record)
        })
        .collect())
}

fn print_record(record: &MetadataRecord) {
    println!("  title:      {}", record.title);
    if !record.authors.is_empty() {
        println!("  authors:    {}", record.authors.join(", "));
    }
    if let Some(isbn13) = record.isbn13.as_deref().or(record.isbn.as_deref()) {
        println!("  isbn:       {isbn13}");
    }
    if let Some(publisher) = &record.publisher {
        println!("  publisher:  {publisher}");
    }
    if let Some(date) = record.published_date {
        println!("  published:  {date}");
    }
    if let Some(cover) = &record.cover_image_url {
        println!("  cover:      {cover}");
    }
    println!("  source:     {} ({:.2})", record.source, record.confidence);
}

fn print_group(group: &BookGroup) {
    let title = group
        .primary_variant()
        .map(|v| v.metadata.title.as_str())
        .unwrap_or("?");
    let formats: Vec<String> = group.formats().iter().map(ToString::to_string).collect();
    println!("  {title} [{}] {}", formats.join(", "), group.group_key);
}

fn print_json(val: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(val)?);
    Ok(())
}
