//! url-cache command line entry point.
//!
//! Records are printed to stdout as JSON. Logging goes to stderr so output
//! can be piped.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use urlcache_client::{FetchConfig, HttpFetcher, LectitoSummarizer, default_extractors};
use urlcache_core::{AppConfig, UrlCache};

#[derive(Parser)]
#[command(name = "url-cache")]
#[command(about = "Cache metadata and summaries for URLs on disk", long_about = None)]
#[command(version)]
struct Cli {
    /// Base cache directory [env: URL_CACHE_DIR]
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    debug: bool,

    /// Seconds to sleep after each request
    #[arg(long, global = true)]
    sleep_time: Option<u64>,

    /// Don't download YouTube subtitles
    #[arg(long, global = true)]
    skip_subtitles: bool,

    /// Subtitle language to download
    #[arg(long, global = true)]
    subtitle_language: Option<String>,

    /// Re-fetch records older than this, e.g. 5d or 1w2d8h5m20s
    #[arg(long, global = true)]
    expiry: Option<String>,

    /// Store raw HTML instead of a readability summary
    #[arg(long, global = true)]
    no_summarize: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Get information for one or more URLs, fetching when not cached
    Get {
        /// Don't print the records
        #[arg(short, long)]
        quiet: bool,

        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// List cached URLs
    List {
        /// Print as a JSON array
        #[arg(long)]
        json: bool,

        /// Print slot directories instead of URLs
        #[arg(long)]
        location: bool,
    },
    /// Check whether a URL is cached; exits 1 when it is not
    InCache { url: String },
    /// Print every cached record as JSON
    Export,
    /// Print the cache directory
    CacheDir,
}

/// CLI flags layered over every other configuration source. Unset flags are skipped.
#[derive(Debug, Default, Serialize)]
struct Overrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    cache_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sleep_time_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expiry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summarize_html: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    skip_subtitles: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    subtitle_language: Option<String>,
}

impl From<&Cli> for Overrides {
    fn from(cli: &Cli) -> Self {
        Self {
            cache_dir: cli.cache_dir.clone(),
            sleep_time_secs: cli.sleep_time,
            expiry: cli.expiry.clone(),
            summarize_html: cli.no_summarize.then_some(false),
            skip_subtitles: cli.skip_subtitles.then_some(true),
            subtitle_language: cli.subtitle_language.clone(),
        }
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let config = AppConfig::load_with(Overrides::from(&cli)).context("invalid configuration")?;

    match &cli.command {
        Commands::CacheDir => {
            println!("{}", config.resolve_cache_dir()?.display());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Get { quiet, urls } => {
            let cache = open_cache(&config)?;
            let mut records = Vec::with_capacity(urls.len());
            let mut failed = false;
            for url in urls {
                match cache.get(url) {
                    Ok(record) => records.push(record),
                    Err(e) => {
                        tracing::error!("failed to get {}: {}", url, e);
                        failed = true;
                    }
                }
            }
            if !quiet {
                println!("{}", serde_json::to_string_pretty(&records)?);
            }
            Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
        }
        Commands::List { json, location } => {
            let cache = open_cache(&config)?;
            let entries: Vec<String> = if *location {
                cache.list_locations()?.iter().map(|p| p.display().to_string()).collect()
            } else {
                cache.list_keys()?
            };
            if *json {
                println!("{}", serde_json::to_string(&entries)?);
            } else {
                for entry in entries {
                    println!("{entry}");
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::InCache { url } => {
            let cache = open_cache(&config)?;
            let cached = cache.in_cache(url)?;
            println!("{}", serde_json::json!({ "cached": cached }));
            Ok(if cached { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        Commands::Export => {
            let cache = open_cache(&config)?;
            println!("{}", serde_json::to_string(&cache.export()?)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn open_cache(config: &AppConfig) -> Result<UrlCache> {
    let fetcher = HttpFetcher::new(FetchConfig::from(config))?;
    let mut cache = UrlCache::from_config(config, Box::new(fetcher), Box::new(LectitoSummarizer::default()))
        .context("failed to open cache")?;
    for extractor in default_extractors() {
        cache.register_extractor(extractor);
    }
    Ok(cache)
}
