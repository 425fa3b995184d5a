//! `iptvprobe` CLI - check which channels of an IPTV playlist are alive

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use iptvprobe::{
    playlist, report, ChannelTask, ConfigFile, FfmpegInspector, OutputFormat, ScanConfig, Scanner,
};

#[derive(Parser)]
#[command(name = "iptvprobe")]
#[command(about = "Check which channels of an IPTV playlist are alive")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Also write logs to this file (truncated at start)
    #[arg(long, global = true, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Config file [default: ~/.config/iptvprobe/config.toml]
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe every channel of an M3U playlist
    Scan {
        /// Extended M3U playlist file
        playlist: PathBuf,

        /// Only scan channels with this group-title
        #[arg(short, long)]
        category: Option<String>,

        #[command(flatten)]
        probe: ProbeArgs,
    },

    /// List the group-title categories of a playlist
    Categories {
        /// Extended M3U playlist file
        playlist: PathBuf,
    },

    /// Probe a single stream URL
    Probe {
        /// Stream URL
        url: String,

        /// Name shown in the report line
        #[arg(long, default_value = "stream")]
        name: String,

        #[command(flatten)]
        probe: ProbeArgs,
    },

    /// Check that ffmpeg and ffprobe are installed
    CheckTools,
}

#[derive(Args)]
struct ProbeArgs {
    /// Read timeout in seconds [default: 5]
    #[arg(short, long, value_name = "SECS")]
    timeout: Option<f64>,

    /// Second, more patient pass for streams that failed the first
    #[arg(short = 'e', long, value_name = "SECS")]
    extended_timeout: Option<f64>,

    /// Probes allowed on the network at once [default: 3]
    #[arg(short = 'm', long, value_name = "N")]
    max_connections: Option<usize>,

    /// Channels processed concurrently [default: CPU count]
    #[arg(short = 'w', long, value_name = "N")]
    workers: Option<usize>,

    /// Seconds to wait for a connection slot [default: 10]
    #[arg(long, value_name = "SECS")]
    acquire_timeout: Option<f64>,

    /// Connection slot waits before an attempt is given up [default: 3]
    #[arg(long, value_name = "N")]
    acquire_retries: Option<u32>,

    /// Attempts per timeout phase [default: 6]
    #[arg(long, value_name = "N")]
    retries: Option<u32>,

    /// Bytes a stream must deliver to count as alive [default: 512000]
    #[arg(long, value_name = "BYTES")]
    min_bytes: Option<u64>,

    /// Skip the ffmpeg decode confirmation
    #[arg(long)]
    no_decode_check: bool,

    /// Skip ffprobe video/audio details
    #[arg(long)]
    no_metadata: bool,

    /// Report line format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_file.as_deref())?;

    tokio::select! {
        result = run(cli) => result,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\nInterrupted");
            Ok(ExitCode::from(130))
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Scan {
            playlist,
            category,
            probe,
        } => cmd_scan(&playlist, category.as_deref(), &probe, cli.config.as_deref()).await,
        Commands::Categories { playlist } => cmd_categories(&playlist),
        Commands::Probe { url, name, probe } => {
            cmd_probe(url, name, &probe, cli.config.as_deref()).await
        }
        Commands::CheckTools => Ok(cmd_check_tools().await),
    }
}

fn init_logging(verbose: u8, log_file: Option<&Path>) -> Result<()> {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,iptvprobe={level}")));

    let file_layer = match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .with(file_layer)
        .init();

    Ok(())
}

/// Defaults, then the config file, then flags.
fn build_config(config_path: Option<&Path>, args: &ProbeArgs) -> Result<ScanConfig> {
    let mut config = ScanConfig::default();
    config.merge(&ConfigFile::load(config_path)?);

    if let Some(s) = args.timeout {
        config.timeout = secs(s, "--timeout")?;
    }
    if let Some(s) = args.extended_timeout {
        config.extended_timeout = Some(secs(s, "--extended-timeout")?);
    }
    if let Some(n) = args.max_connections {
        config.max_connections = n;
    }
    if let Some(n) = args.workers {
        config.max_workers = n;
    }
    if let Some(s) = args.acquire_timeout {
        config.acquire_timeout = secs(s, "--acquire-timeout")?;
    }
    if let Some(n) = args.acquire_retries {
        config.acquire_retries = n;
    }
    if let Some(n) = args.retries {
        config.retry_count = n;
    }
    if let Some(n) = args.min_bytes {
        config.min_data_threshold = n;
    }
    if args.no_decode_check {
        config.validate_decode = false;
    }
    if args.no_metadata {
        config.extract_metadata = false;
    }

    config.validate()?;
    Ok(config)
}

fn secs(value: f64, flag: &str) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .ok()
        .filter(|d| !d.is_zero())
        .with_context(|| format!("{flag} must be a positive number of seconds, got {value}"))
}

/// Warn up front when the configured pipeline needs tools that are missing.
async fn warn_missing_tools(inspector: &FfmpegInspector, config: &ScanConfig) {
    if !config.validate_decode && !config.extract_metadata {
        return;
    }
    let (ffmpeg, ffprobe) = inspector.check_available().await;
    if config.validate_decode && !ffmpeg {
        warn!("ffmpeg not found: every stream will fail decode validation (use --no-decode-check)");
    }
    if config.extract_metadata && !ffprobe {
        warn!("ffprobe not found: video/audio details will be Unknown");
    }
}

async fn cmd_scan(
    playlist_path: &Path,
    category: Option<&str>,
    args: &ProbeArgs,
    config_path: Option<&Path>,
) -> Result<ExitCode> {
    let config = build_config(config_path, args)?;
    let content = playlist::read_playlist(playlist_path)?;
    let tasks = playlist::build_tasks(&content, category, config.timeout, config.extended_timeout);

    if tasks.is_empty() {
        match category {
            Some(c) => println!("No channels found for category \"{c}\"."),
            None => println!("No channels found in the playlist."),
        }
        return Ok(ExitCode::SUCCESS);
    }

    let inspector = FfmpegInspector::new();
    warn_missing_tools(&inspector, &config).await;

    eprintln!(
        "Processing {} channels with {} concurrent connections...\n",
        tasks.len(),
        config.max_connections
    );

    let format = args.format;
    let scanner = Scanner::new(config, Arc::new(inspector))?;
    let summary = scanner
        .run(tasks, |report| println!("{}", report::render(report, format)))
        .await;

    eprintln!("\n{}", report::render_summary(&summary));
    Ok(ExitCode::SUCCESS)
}

fn cmd_categories(playlist_path: &Path) -> Result<ExitCode> {
    let content = playlist::read_playlist(playlist_path)?;
    let categories = playlist::discover_categories(&content);

    if categories.is_empty() {
        println!("No categories found in the playlist.");
    }
    for category in categories {
        println!("{category}");
    }
    Ok(ExitCode::SUCCESS)
}

/// Exit status 0 when the stream is alive, 1 when dead.
async fn cmd_probe(
    url: String,
    name: String,
    args: &ProbeArgs,
    config_path: Option<&Path>,
) -> Result<ExitCode> {
    let config = build_config(config_path, args)?;
    let inspector = FfmpegInspector::new();
    warn_missing_tools(&inspector, &config).await;

    let task = ChannelTask {
        index: 1,
        name,
        url,
        timeout: config.timeout,
        extended_timeout: config.extended_timeout,
    };
    let format = args.format;
    let scanner = Scanner::new(config, Arc::new(inspector))?;
    let report = scanner.check_channel(task, 1).await;

    println!("{}", report::render(&report, format));
    Ok(if report.status.is_alive() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn cmd_check_tools() -> ExitCode {
    let inspector = FfmpegInspector::new();
    let (ffmpeg, ffprobe) = inspector.check_available().await;

    for (name, path, ok) in [
        ("ffmpeg", inspector.ffmpeg_path(), ffmpeg),
        ("ffprobe", inspector.ffprobe_path(), ffprobe),
    ] {
        if ok {
            println!("✅ {name}: {path}");
        } else {
            println!("❌ {name}: not found");
        }
    }

    if ffmpeg && ffprobe {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
