//! CLI argument parsing and command dispatch

use crate::backends::{LocalBackend, ProcessMode, RemoteBackend, UnavailableSegmenterFactory};
use crate::config::{ControllerConfig, RelayConfig};
use crate::controller::{BatchController, SourceImage};
use crate::settings::Settings;
use anyhow::{Context, Result};
use bytes::Bytes;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

/// Batch background removal: relay server and queue runner
#[derive(Parser)]
#[command(name = "bgbatch", version, about)]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP relay that forwards uploads to the remote provider
    Serve {
        /// Bind host
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Bind port
        #[arg(long, default_value_t = 8080)]
        port: u16,
        /// Server-held default API key (falls back to REMOVEBG_API_KEY)
        #[arg(long)]
        api_key: Option<String>,
        /// Override the remote provider endpoint
        #[arg(long)]
        upstream_url: Option<String>,
    },
    /// Remove backgrounds from image files through the batch queue
    Run {
        /// Image files to process, in order
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Backend mode: api or local (defaults to persisted settings)
        #[arg(long, value_parser = parse_mode)]
        mode: Option<ProcessMode>,
        /// API key forwarded to the relay (defaults to persisted settings)
        #[arg(long)]
        api_key: Option<String>,
        /// Relay endpoint the remote backend posts to
        #[arg(long)]
        endpoint: Option<String>,
        /// Directory for the processed outputs
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
        /// Persist the effective mode and API key for future runs
        #[arg(long)]
        save_settings: bool,
        /// Settings file location (defaults to the platform config dir)
        #[arg(long)]
        settings_file: Option<PathBuf>,
    },
}

fn parse_mode(raw: &str) -> std::result::Result<ProcessMode, String> {
    raw.parse().map_err(|e: crate::error::BgBatchError| e.to_string())
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// CLI entry point, called from the `bgbatch` binary
///
/// # Errors
/// Returns an error for configuration, I/O, and server failures; per-task
/// processing failures are reported in the summary instead.
pub async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Serve {
            host,
            port,
            api_key,
            upstream_url,
        } => {
            let mut builder = RelayConfig::builder()
                .host(host)
                .port(port)
                .api_key(api_key)
                .api_key_from_env();
            if let Some(url) = upstream_url {
                builder = builder.upstream_url(url);
            }
            let config = builder.build().context("invalid relay configuration")?;
            crate::relay::serve(config).await.context("relay failed")?;
        },
        Command::Run {
            files,
            mode,
            api_key,
            endpoint,
            output_dir,
            save_settings,
            settings_file,
        } => {
            run_batch(RunArgs {
                files,
                mode,
                api_key,
                endpoint,
                output_dir,
                save_settings,
                settings_file,
            })
            .await?;
        },
    }
    Ok(())
}

struct RunArgs {
    files: Vec<PathBuf>,
    mode: Option<ProcessMode>,
    api_key: Option<String>,
    endpoint: Option<String>,
    output_dir: PathBuf,
    save_settings: bool,
    settings_file: Option<PathBuf>,
}

async fn run_batch(args: RunArgs) -> Result<()> {
    let settings_path = args.settings_file.or_else(Settings::default_path);
    let mut settings = settings_path
        .as_deref()
        .map(Settings::load)
        .unwrap_or_default();

    if let Some(mode) = args.mode {
        settings.mode = mode;
    }
    if args.api_key.is_some() {
        settings.api_key = args.api_key;
    }
    if args.save_settings {
        let path = settings_path
            .as_deref()
            .context("no settings path available on this platform")?;
        settings.save(path).context("failed to save settings")?;
        println!("Settings saved to {}", path.display());
    }

    let mut config_builder = ControllerConfig::builder();
    if let Some(endpoint) = args.endpoint {
        config_builder = config_builder.endpoint(endpoint);
    }
    let config = config_builder
        .build()
        .context("invalid controller configuration")?;

    let remote = Arc::new(
        RemoteBackend::with_timeout(config.endpoint.clone(), config.request_timeout)
            .context("failed to build remote backend")?,
    );
    let local = Arc::new(LocalBackend::with_limits(
        Arc::new(UnavailableSegmenterFactory),
        config.init_timeout,
        config.max_local_input_bytes,
    ));

    let controller = BatchController::new(config, settings.mode, remote, local);
    controller.set_credential(settings.api_key.clone());

    let sources = read_sources(&args.files)?;
    match controller.submit(sources) {
        Ok(outcome) => {
            if outcome.skipped > 0 {
                warn!(skipped = outcome.skipped, "some files are not readable images");
            }
        },
        Err(e) => {
            // Whole-batch rejection: one aggregate warning, nothing enqueued.
            anyhow::bail!("{}", e.user_message());
        },
    }

    controller.run().await;

    for notice in controller.take_notices() {
        println!("Note: {notice}");
    }

    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("failed to create {}", args.output_dir.display()))?;

    let mut completed = 0usize;
    let mut failed = 0usize;
    for task in controller.tasks() {
        match task.result() {
            Some(result) => {
                let out_path = output_path(&args.output_dir, task.file_name());
                std::fs::write(&out_path, result)
                    .with_context(|| format!("failed to write {}", out_path.display()))?;
                println!("{} -> {}", task.file_name(), out_path.display());
                completed += 1;
            },
            None => {
                let cause = task.error_detail().unwrap_or("unknown failure");
                println!("{}: {}", task.file_name(), cause);
                failed += 1;
            },
        }
    }
    println!("Done: {completed} completed, {failed} failed");
    Ok(())
}

fn read_sources(files: &[PathBuf]) -> Result<Vec<SourceImage>> {
    files
        .iter()
        .map(|path| {
            let bytes = std::fs::read(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "upload".to_string());
            Ok(SourceImage {
                file_name,
                bytes: Bytes::from(bytes),
            })
        })
        .collect()
}

fn output_path(dir: &Path, file_name: &str) -> PathBuf {
    let stem = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    dir.join(format!("{stem}-nobg.png"))
}
