//! CodeDoc CLI - Command-line interface for the repository cache
//!
//! Resolves a repository to a cached working copy and reports metadata and change history

mod render;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use codedoc_core::{
    default_config_path, init_logging, CodedocConfig, CodedocError, CodedocResult, ErrorKind,
    LoggingConfig,
};
use codedoc_repo::{Git2Backend, RepositoryCache};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "codedoc")]
#[command(about = "Cached repository working copies and change inspection")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Cache root, overriding the configuration
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Show metadata and language statistics for a repository
    Analyze {
        /// Repository URL or local path
        repo: String,

        /// Write the report to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Include the directory structure
        #[arg(long)]
        structure: bool,

        /// Access token for private repositories
        #[arg(short, long)]
        token: Option<String>,
    },

    /// Show files changed by recent commits, or by one commit
    Changes {
        /// Repository URL or local path
        repo: String,

        /// Number of recent commits
        #[arg(short = 'n', long, default_value = "10")]
        count: usize,

        /// Analyze a single commit instead
        #[arg(long)]
        commit: Option<String>,

        /// Only commits newer than this RFC 3339 timestamp
        #[arg(long, value_parser = parse_timestamp)]
        since: Option<DateTime<Utc>>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Access token for private repositories
        #[arg(short, long)]
        token: Option<String>,
    },

    /// Show the commits that touched one file
    History {
        /// Repository URL or local path
        repo: String,

        /// File path inside the repository
        path: String,

        /// Maximum number of commits
        #[arg(long, default_value = "50")]
        max: usize,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Access token for private repositories
        #[arg(short, long)]
        token: Option<String>,
    },

    /// Show files that change most often
    Hotspots {
        /// Repository URL or local path
        repo: String,

        /// Minimum number of commits touching a file
        #[arg(long, default_value = "5")]
        threshold: usize,

        /// Number of recent commits to scan (defaults to analysis.hotspot_scan_limit)
        #[arg(long)]
        scan_limit: Option<usize>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Access token for private repositories
        #[arg(short, long)]
        token: Option<String>,
    },

    /// Inspect or prune the cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Manage configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,

        /// Write a default configuration file
        #[arg(long)]
        init: bool,

        /// Validate current configuration
        #[arg(long)]
        validate: bool,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// List cached repositories
    List,
    /// Print the working copy directory for a repository
    Path {
        /// Repository URL or local path
        repo: String,
    },
    /// Remove a repository from the cache
    Evict {
        /// Repository URL or local path
        repo: String,
    },
}

#[derive(Serialize)]
struct AnalyzeReport<'a> {
    key: &'a str,
    #[serde(flatten)]
    outcome: &'a codedoc_core::EnsureOutcome,
    info: &'a codedoc_core::RepositoryInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    structure: Option<&'a std::collections::BTreeMap<String, Vec<String>>>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_error(&e);
            ExitCode::from(exit_code(&e))
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = CodedocConfig::load_or_default(cli.config.as_deref())?;
    if let Some(cache_dir) = &cli.cache_dir {
        config.cache.root = cache_dir.clone();
    }

    let logging_config = if cli.verbose {
        LoggingConfig {
            format: config.logging.format.clone(),
            log_to_file: config.logging.log_to_file,
            log_file_path: config.logging.log_file_path.clone(),
            ..LoggingConfig::verbose()
        }
    } else {
        config.logging.clone()
    };
    init_logging(&logging_config)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Starting CodeDoc CLI v{}", env!("CARGO_PKG_VERSION"));
    debug!(cache_root = %config.cache.root.display(), "Using cache root");

    match cli.command {
        Commands::Analyze {
            repo,
            output,
            format,
            structure,
            token,
        } => handle_analyze(repo, output, format, structure, token, &config).await,
        Commands::Changes {
            repo,
            count,
            commit,
            since,
            format,
            token,
        } => handle_changes(repo, count, commit, since, format, token, &config).await,
        Commands::History {
            repo,
            path,
            max,
            format,
            token,
        } => handle_history(repo, path, max, format, token, &config).await,
        Commands::Hotspots {
            repo,
            threshold,
            scan_limit,
            format,
            token,
        } => handle_hotspots(repo, threshold, scan_limit, format, token, &config).await,
        Commands::Cache { action } => handle_cache(action, &config).await,
        Commands::Config {
            show,
            init,
            validate,
        } => handle_config(show, init, validate, cli.config.as_deref(), &config),
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC 3339 timestamp such as 2024-01-31T00:00:00Z: {}", e))
}

fn build_cache(config: &CodedocConfig, token: Option<String>) -> CodedocResult<Arc<RepositoryCache>> {
    let backend = Arc::new(Git2Backend::with_token(token));
    RepositoryCache::with_backend(config.cache.clone(), config.analysis.clone(), backend)
        .map(Arc::new)
}

/// Run blocking cache work off the async runtime
async fn run_blocking<T, F>(task: F) -> anyhow::Result<T>
where
    F: FnOnce() -> CodedocResult<T> + Send + 'static,
    T: Send + 'static,
{
    let result = tokio::task::spawn_blocking(task)
        .await
        .context("Cache task panicked")?;
    result.map_err(|e| {
        e.log();
        anyhow::Error::new(e)
    })
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn handle_analyze(
    repo: String,
    output: Option<PathBuf>,
    format: OutputFormat,
    with_structure: bool,
    token: Option<String>,
    config: &CodedocConfig,
) -> anyhow::Result<()> {
    let cache = build_cache(config, token)?;

    let (key, outcome, info, structure) = run_blocking(move || {
        let copy = cache.ensure(&repo)?;
        let info = cache.info(&copy);
        let structure = with_structure.then(|| cache.structure(&copy));
        let key = copy.key().to_string();
        let outcome = copy.outcome().clone();
        copy.release()?;
        Ok((key, outcome, info?, structure))
    })
    .await?;

    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(&AnalyzeReport {
            key: &key,
            outcome: &outcome,
            info: &info,
            structure: structure.as_ref(),
        })?,
        OutputFormat::Text => {
            let mut text = String::new();
            if let Some(note) = render::outcome_note(&outcome) {
                text.push_str(&note);
                text.push('\n');
            }
            text.push_str(&render::repository_info(&info, structure.as_ref()));
            text
        }
    };

    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&path, rendered)
                .await
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            println!("✅ Report written to {}", path.display());
        }
        None => print!("{}", rendered),
    }

    Ok(())
}

async fn handle_changes(
    repo: String,
    count: usize,
    commit: Option<String>,
    since: Option<DateTime<Utc>>,
    format: OutputFormat,
    token: Option<String>,
    config: &CodedocConfig,
) -> anyhow::Result<()> {
    let cache = build_cache(config, token)?;

    let analyses = run_blocking(move || {
        let copy = cache.ensure(&repo)?;
        let result = match &commit {
            Some(commit) => cache.changes(&copy, commit).map(|analysis| vec![analysis]),
            None => cache.recent_commits(&copy, count, since),
        };
        copy.release()?;
        result
    })
    .await?;

    match format {
        OutputFormat::Json => print_json(&analyses),
        OutputFormat::Text => {
            print!("{}", render::commits(&analyses));
            Ok(())
        }
    }
}

async fn handle_history(
    repo: String,
    path: String,
    max: usize,
    format: OutputFormat,
    token: Option<String>,
    config: &CodedocConfig,
) -> anyhow::Result<()> {
    let cache = build_cache(config, token)?;

    let analyses = run_blocking(move || {
        let copy = cache.ensure(&repo)?;
        let result = cache.file_history(&copy, &path, max);
        copy.release()?;
        result
    })
    .await?;

    match format {
        OutputFormat::Json => print_json(&analyses),
        OutputFormat::Text => {
            print!("{}", render::commits(&analyses));
            Ok(())
        }
    }
}

async fn handle_hotspots(
    repo: String,
    threshold: usize,
    scan_limit: Option<usize>,
    format: OutputFormat,
    token: Option<String>,
    config: &CodedocConfig,
) -> anyhow::Result<()> {
    let cache = build_cache(config, token)?;

    let hotspots = run_blocking(move || {
        let copy = cache.ensure(&repo)?;
        let result = cache.hotspots(&copy, threshold, scan_limit);
        copy.release()?;
        result
    })
    .await?;

    match format {
        OutputFormat::Json => print_json(&hotspots),
        OutputFormat::Text => {
            print!("{}", render::hotspots(&hotspots, threshold));
            Ok(())
        }
    }
}

async fn handle_cache(action: CacheAction, config: &CodedocConfig) -> anyhow::Result<()> {
    let cache = build_cache(config, None)?;

    match action {
        CacheAction::List => {
            let listing = Arc::clone(&cache);
            let keys = run_blocking(move || listing.entries()).await?;
            if keys.is_empty() {
                println!("📭 Cache at {} is empty", cache.root().display());
            }
            for key in keys {
                println!("{}\t{}", key, cache.entry_path(&key).display());
            }
        }
        CacheAction::Path { repo } => {
            let key = cache.locate(&repo)?;
            println!("{}", cache.entry_path(&key).display());
        }
        CacheAction::Evict { repo } => {
            let evicting = Arc::clone(&cache);
            let target = repo.clone();
            let removed = run_blocking(move || evicting.evict(&target)).await?;
            if removed {
                println!("🗑️ Removed {} from the cache", repo);
            } else {
                println!("Nothing cached for {}", repo);
            }
        }
    }

    Ok(())
}

fn handle_config(
    show: bool,
    init: bool,
    validate: bool,
    config_path: Option<&Path>,
    config: &CodedocConfig,
) -> anyhow::Result<()> {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(default_config_path);

    if init {
        if path.exists() {
            println!("⚠️ Configuration already exists at {}", path.display());
        } else {
            CodedocConfig::default().save_to_file(&path)?;
            println!("✅ Configuration initialized at {}", path.display());
        }
    }

    if show {
        println!("📋 Current configuration:");
        println!("{}", toml::to_string_pretty(config)?);
    }

    if validate {
        match config.validate() {
            Ok(()) => println!("✅ Configuration is valid"),
            Err(e) => {
                println!("❌ Configuration validation failed: {}", e);
                return Err(e.into());
            }
        }
    }

    if !show && !init && !validate {
        println!("Configuration file: {}", path.display());
    }

    Ok(())
}

fn error_kind(error: &anyhow::Error) -> ErrorKind {
    error
        .downcast_ref::<CodedocError>()
        .map(CodedocError::kind)
        .unwrap_or(ErrorKind::Unknown)
}

fn exit_code(error: &anyhow::Error) -> u8 {
    match error_kind(error) {
        ErrorKind::Input => 2,
        ErrorKind::Network => 3,
        ErrorKind::CorruptionRecovered => 4,
        ErrorKind::Unknown => 1,
    }
}

fn report_error(error: &anyhow::Error) {
    let label = match error_kind(error) {
        ErrorKind::Input => "Invalid input",
        ErrorKind::Network => "Network failure",
        ErrorKind::CorruptionRecovered => "Corrupted cache entry",
        ErrorKind::Unknown => "Error",
    };
    eprintln!("❌ {}: {:#}", label, error);

    let suggestions = error
        .downcast_ref::<CodedocError>()
        .and_then(CodedocError::context)
        .map(|context| context.recovery_suggestions.clone())
        .unwrap_or_default();
    for suggestion in suggestions {
        eprintln!("💡 {}", suggestion);
    }
}
