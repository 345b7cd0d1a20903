//! moodle-mirror main entry point
//!
//! This is the command-line interface for mirroring Moodle course material.

use anyhow::Context;
use clap::{CommandFactory, Parser};
use moodle_mirror::config::{load_config, validate, Config};
use moodle_mirror::crawler::Crawler;
use moodle_mirror::output::{generate_markdown_summary, print_statistics, CrawlStatistics};
use moodle_mirror::session::{FormLogin, Session, SessionCookie, SessionProvider, StaticCookies};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// moodle-mirror: download course material from a Moodle portal
///
/// Walks each course page, expands folders and assignments one level deep,
/// and downloads every file that passes the extension filter.
#[derive(Parser, Debug)]
#[command(name = "moodle-mirror")]
#[command(version)]
#[command(about = "Mirror course files from a Moodle portal", long_about = None)]
struct Cli {
    /// Course ids to mirror
    #[arg(value_name = "COURSES")]
    courses: Vec<String>,

    /// Portal username
    #[arg(short, long, env = "MOODLE_USERNAME", requires = "password")]
    username: Option<String>,

    /// Portal password
    #[arg(short, long, env = "MOODLE_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Session cookie copied from a logged-in browser (repeatable)
    #[arg(long = "cookie", value_name = "NAME=VALUE")]
    cookies: Vec<SessionCookie>,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Root URL of the portal
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// Directory to mirror into
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Comma-separated extension allowlist, e.g. ".pdf,.zip"
    #[arg(short, long, value_delimiter = ',', conflicts_with = "all")]
    exts: Option<Vec<String>>,

    /// Download every file regardless of extension
    #[arg(short, long)]
    all: bool,

    /// Treat every anchor on the course page as a container
    #[arg(short, long)]
    force: bool,

    /// Resolve and log every file, but write nothing
    #[arg(long)]
    dry_run: bool,

    /// Replace files that already exist locally
    #[arg(long)]
    overwrite: bool,

    /// Maximum concurrent downloads
    #[arg(short, long, value_name = "N")]
    jobs: Option<u32>,

    /// Write a markdown summary of the run to this path
    #[arg(long, value_name = "FILE")]
    summary: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.courses.is_empty() {
        Cli::command().print_help()?;
        return Ok(());
    }

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let config = build_config(&cli)?;

    let provider = session_provider(&cli, &config)?;
    let cookies = provider
        .session_cookies()
        .await
        .context("Failed to obtain a session")?;

    let session = Arc::new(Session::new(&config.portal, cookies)?);
    session
        .verify()
        .await
        .context("Session was rejected by the portal")?;
    tracing::info!("Logged in to {}", session.base_url());

    if !config.download.dry_run {
        std::fs::create_dir_all(&config.download.output_dir).with_context(|| {
            format!(
                "Failed to create output directory {}",
                config.download.output_dir
            )
        })?;
    }

    let crawler = Crawler::from_config(Arc::clone(&session), &config);
    let report = match crawler.run(&cli.courses).await {
        Ok(report) => {
            tracing::info!("Crawl completed");
            report
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            return Err(e.into());
        }
    };

    let stats = CrawlStatistics::from_reports(&report);
    if !cli.quiet {
        print_statistics(&stats);
    }
    if stats.has_failures() {
        tracing::warn!("Some courses or files failed; rerun to retry them");
    }

    if let Some(path) = &cli.summary {
        generate_markdown_summary(&report, path)?;
        tracing::info!("Summary written to {}", path.display());
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("moodle_mirror=info,warn"),
            1 => EnvFilter::new("moodle_mirror=debug,info"),
            2 => EnvFilter::new("moodle_mirror=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads the optional config file and applies command-line overrides
fn build_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            load_config(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?
        }
        None => Config::default(),
    };

    if let Some(base_url) = &cli.base_url {
        config.portal.base_url = base_url.clone();
    }

    let download = &mut config.download;
    if let Some(output) = &cli.output {
        download.output_dir = output.to_string_lossy().into_owned();
    }
    if cli.all {
        download.extensions.clear();
    } else if let Some(exts) = &cli.exts {
        download.extensions = exts
            .iter()
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .collect();
        // Only --all may clear the allowlist
        if download.extensions.is_empty() {
            anyhow::bail!("--exts needs at least one extension; use --all to download every file");
        }
    }
    if let Some(jobs) = cli.jobs {
        download.max_concurrent_downloads = jobs;
    }
    download.force |= cli.force;
    download.dry_run |= cli.dry_run;
    download.overwrite |= cli.overwrite;

    validate(&config).context("Invalid configuration")?;
    Ok(config)
}

/// Picks how the session cookies are obtained
///
/// Credentials win over cookies; cookies from the command line are added to
/// those from the config file.
fn session_provider(cli: &Cli, config: &Config) -> anyhow::Result<Box<dyn SessionProvider>> {
    if let (Some(username), Some(password)) = (&cli.username, &cli.password) {
        tracing::debug!("Signing in as {}", username);
        return Ok(Box::new(FormLogin::new(
            &config.portal,
            username.clone(),
            password.clone(),
        )?));
    }

    let cookies = config
        .session
        .cookies
        .iter()
        .map(SessionCookie::from)
        .chain(cli.cookies.iter().cloned())
        .collect();
    Ok(Box::new(StaticCookies::new(cookies)))
}
