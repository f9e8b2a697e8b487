//! Command-line front end for the URL store.
//!
//! # Usage
//!
//! ```bash
//! # Shorten a URL
//! cargo run -- shorten https://example.com/a --owner user-1
//!
//! # Resolve a short code
//! cargo run -- get abcdEFGH
//!
//! # List an owner's URLs
//! cargo run -- list --owner user-1
//!
//! # Bulk create from a JSON array of {"correlation_id", "original_url"}
//! cargo run -- batch-create --owner user-1 --file urls.json
//!
//! # Bulk soft-delete
//! cargo run -- batch-delete --owner user-1 abcdEFGH ijklMNOP
//!
//! # Check the database connection
//! cargo run -- -d postgres://localhost/urls ping
//! ```
//!
//! Configuration comes from the environment (see [`url_store::config`]);
//! `-b`, `-f` and `-d` override `BASE_URL`, `FILE_STORAGE_PATH` and `DATABASE_URL`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use url_store::config::Config;
use url_store::domain::entities::{BatchItem, Resolution};
use url_store::error::{AppError, StatusCategory, classify};
use url_store::{AppState, bootstrap};

/// URL shortener storage tool.
#[derive(Parser)]
#[command(name = "url-store")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Base for issued short URLs
    #[arg(short = 'b', long, global = true)]
    base_url: Option<String>,

    /// Journal file for the file-backed store (empty for memory only)
    #[arg(short = 'f', long, global = true)]
    file_storage_path: Option<String>,

    /// PostgreSQL connection string
    #[arg(short = 'd', long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Shorten a single URL
    Shorten {
        url: String,

        #[arg(short, long)]
        owner: String,
    },

    /// Resolve a short code
    Get { code: String },

    /// List URLs created by an owner
    List {
        #[arg(short, long)]
        owner: String,
    },

    /// Shorten every URL of a JSON batch file in one transaction
    BatchCreate {
        #[arg(short, long)]
        owner: String,

        /// JSON array of {"correlation_id": ..., "original_url": ...}
        #[arg(long)]
        file: PathBuf,
    },

    /// Soft-delete short codes
    BatchDelete {
        #[arg(short, long)]
        owner: String,

        #[arg(required = true)]
        codes: Vec<String>,
    },

    /// Check the storage backend is reachable
    Ping,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    apply_overrides(&mut config, &cli);
    config.validate()?;

    init_tracing(&config);
    config.print_summary();

    let state = bootstrap::build_state(&config).await?;

    match cli.command {
        Commands::Shorten { url, owner } => shorten(&state, &owner, &url).await,
        Commands::Get { code } => get(&state, &code).await,
        Commands::List { owner } => list(&state, &owner).await,
        Commands::BatchCreate { owner, file } => batch_create(&state, &owner, file).await,
        Commands::BatchDelete { owner, codes } => batch_delete(&state, &owner, codes).await,
        Commands::Ping => ping(&state).await,
    }
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(base_url) = &cli.base_url {
        config.base_url = base_url.clone();
    }
    if let Some(path) = &cli.file_storage_path {
        config.file_storage_path = (!path.is_empty()).then(|| PathBuf::from(path));
    }
    if let Some(database_url) = &cli.database_url {
        config.database_url = Some(database_url.clone());
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if config.log_format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn shorten(state: &AppState, owner: &str, url: &str) -> Result<()> {
    match state.store.save(owner, url).await {
        Ok(short_url) => {
            println!("{} {}", "201".green().bold(), short_url.bright_yellow());
            Ok(())
        }
        Err(err @ AppError::Conflict { .. }) => {
            let (short_url, category) = classify(&err);
            println!(
                "{} {} {}",
                category.status_code().to_string().yellow().bold(),
                short_url.bright_yellow(),
                "(already shortened)".dimmed()
            );
            Ok(())
        }
        Err(err) => Err(report(err)),
    }
}

async fn get(state: &AppState, code: &str) -> Result<()> {
    match state.store.get(code).await {
        Ok(record) => {
            match record.resolution() {
                Resolution::Redirect(target) => {
                    println!("{} {}", "307".green().bold(), target.cyan())
                }
                Resolution::Gone => println!("{} {}", "410".red().bold(), "deleted".dimmed()),
            }
            Ok(())
        }
        Err(AppError::NotFound { message, .. }) => {
            println!("{} {}", "404".red().bold(), message);
            Ok(())
        }
        Err(err) => Err(report(err)),
    }
}

async fn list(state: &AppState, owner: &str) -> Result<()> {
    let records = state.store.index(owner).await.map_err(report)?;

    if records.is_empty() {
        println!("{}", "No URLs for this owner".dimmed());
        return Ok(());
    }

    for record in records {
        let marker = if record.is_deleted {
            "deleted".red()
        } else {
            "active".green()
        };
        println!(
            "{:>7}  {}  {}",
            marker,
            record.short_code.bright_yellow(),
            record.original_url
        );
    }

    Ok(())
}

async fn batch_create(state: &AppState, owner: &str, file: PathBuf) -> Result<()> {
    let content = tokio::fs::read_to_string(&file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let items: Vec<BatchItem> =
        serde_json::from_str(&content).context("Batch file must be a JSON array of items")?;

    let results = state
        .batch_service
        .batch_create(owner, items)
        .await
        .map_err(report)?;

    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}

async fn batch_delete(state: &AppState, owner: &str, codes: Vec<String>) -> Result<()> {
    let count = codes.len();

    state
        .batch_service
        .batch_delete(owner, codes)
        .await
        .map_err(report)?;

    println!("{} {} codes marked deleted", "202".green().bold(), count);
    Ok(())
}

async fn ping(state: &AppState) -> Result<()> {
    let Some(health) = &state.health else {
        anyhow::bail!("The configured backend has no connection to check");
    };

    health.ping().await.map_err(report)?;
    println!("{}", "OK".green().bold());
    Ok(())
}

/// Logs a store failure with its category and converts it for `main`.
fn report(err: AppError) -> anyhow::Error {
    let (message, category) = classify(&err);
    if category == StatusCategory::ServerError {
        tracing::error!(details = %err.details(), "{}", message);
    }
    anyhow::Error::new(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use url_store::config::StorageBackend;

    #[test]
    fn test_cli_parses_batch_delete() {
        let cli = Cli::try_parse_from([
            "url-store",
            "batch-delete",
            "--owner",
            "user-1",
            "abcdEFGH",
            "ijklMNOP",
        ])
        .unwrap();

        match cli.command {
            Commands::BatchDelete { owner, codes } => {
                assert_eq!(owner, "user-1");
                assert_eq!(codes, vec!["abcdEFGH", "ijklMNOP"]);
            }
            _ => panic!("expected batch-delete"),
        }
    }

    #[test]
    fn test_cli_batch_delete_requires_codes() {
        assert!(Cli::try_parse_from(["url-store", "batch-delete", "--owner", "u"]).is_err());
    }

    #[test]
    fn test_overrides_take_priority() {
        let cli = Cli::try_parse_from([
            "url-store",
            "-b",
            "https://s.example.com",
            "-f",
            "",
            "ping",
        ])
        .unwrap();
        let mut config = Config {
            base_url: "http://localhost:8080".to_string(),
            database_url: None,
            file_storage_path: Some(PathBuf::from("short-url-db.json")),
            log_level: "info".to_string(),
            log_format: "text".to_string(),
            batch_timeout_seconds: 30,
            db_max_connections: 10,
            db_connect_timeout: 30,
            db_idle_timeout: 600,
            db_max_lifetime: 1800,
        };

        apply_overrides(&mut config, &cli);

        assert_eq!(config.base_url, "https://s.example.com");
        assert_eq!(config.storage_backend(), StorageBackend::Memory);
    }
}
