use anyhow::Context;
use bridge_desktop::ReqwestHttpClient;
use bridge_traits::log::LogLevel;
use clap::{Parser, Subcommand};
use core_auth::ApiCredentials;
use core_index::{Classification, ImageCrateInspector, IndexError, SyncCoordinator};
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use core_runtime::PifConfig;
use provider_flickr::FlickrConnector;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info};

mod paths;

/// Environment variable overriding the log filter
const LOG_ENV: &str = "PIF_LOG";

#[derive(Parser)]
#[command(version, about = "Upload local photos that are not on Flickr yet")]
pub struct Opts {
    /// Increase verbosity (-v, -vv, -vvv). Default WARN.
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Directory holding the index stores (default ~/.pif)
    #[arg(short = 'c', long = "config-dir", global = true)]
    pub config_dir: Option<PathBuf>,

    /// Concurrent remote tail fetches during a refresh
    #[arg(short = 'j', long = "jobs", global = true)]
    pub jobs: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Upload files not yet present remotely
    Upload {
        /// Upload even files already present remotely
        #[arg(short = 'f', long)]
        force: bool,
        /// Trial run with no uploads made
        #[arg(short = 'n', long)]
        dry_run: bool,
        /// Mark files as uploaded instead of uploading them
        #[arg(short = 'm', long)]
        mark: bool,
        /// Do not refresh the remote indexes
        #[arg(short = 'x', long)]
        no_refresh: bool,
        /// Rebuild the remote indexes from scratch
        #[arg(short = 'r', long)]
        reset: bool,
        /// Files and directories to consider
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Print whether each file is new, old or invalid
    Status {
        /// Do not refresh the remote indexes
        #[arg(short = 'x', long)]
        no_refresh: bool,
        /// Files and directories to consider
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Refresh the remote indexes
    Refresh {
        /// Rebuild the remote indexes from scratch
        #[arg(short = 'r', long)]
        reset: bool,
    },
}

fn init_tracing(verbosity: u8) -> anyhow::Result<()> {
    let level = match verbosity {
        0 => LogLevel::Warn,
        1 => LogLevel::Info,
        2 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };

    let mut config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(level);

    if let Ok(filter) = std::env::var(LOG_ENV) {
        config = config.with_filter(filter);
    }

    init_logging(config)?;
    Ok(())
}

#[tokio::main]
async fn main() {
    let opts = Opts::parse();

    if let Err(e) = init_tracing(opts.verbose) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }

    if let Err(e) = run(opts).await {
        error!(error = %e, "Aborted");
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(opts: Opts) -> anyhow::Result<()> {
    match opts.command {
        Command::Upload {
            force,
            dry_run,
            mark,
            no_refresh,
            reset,
            ref paths,
        } => {
            let config = build_config(&opts, no_refresh)?;
            if reset {
                reset_remote_indexes(&config)?;
            }
            let mut coordinator = open(&config).await?;
            let plan = UploadPlan {
                force,
                dry_run,
                mark,
            };
            upload(&mut coordinator, &paths::expand(paths), &plan).await
        }
        Command::Status {
            no_refresh,
            ref paths,
        } => {
            let config = build_config(&opts, no_refresh)?;
            let mut coordinator = open(&config).await?;
            for path in paths::expand(paths) {
                let status = coordinator.classify(&path);
                println!("{}\t{}", status, path.display());
            }
            coordinator.sync()?;
            Ok(())
        }
        Command::Refresh { reset } => {
            let config = build_config(&opts, true)?;
            if reset {
                reset_remote_indexes(&config)?;
            }
            let mut coordinator = open(&config).await?;
            let changed = coordinator.refresh(Some(&report_progress)).await?;
            coordinator.sync()?;
            println!(
                "{} changed, {} photos, {} hashes",
                changed.len(),
                coordinator.hashes().photos().len(),
                coordinator.hashes().len()
            );
            Ok(())
        }
    }
}

fn build_config(opts: &Opts, skip_refresh: bool) -> anyhow::Result<PifConfig> {
    let http_client = ReqwestHttpClient::new().context("Failed to create HTTP client")?;

    let mut builder = PifConfig::builder()
        .skip_refresh(skip_refresh)
        .http_client(Arc::new(http_client));

    if let Some(dir) = &opts.config_dir {
        builder = builder.config_dir(dir);
    }
    if let Some(jobs) = opts.jobs {
        builder = builder.fetch_concurrency(jobs);
    }

    Ok(builder.build()?)
}

/// Drop the remote metadata and hash stores so the next refresh lists everything.
fn reset_remote_indexes(config: &PifConfig) -> anyhow::Result<()> {
    for path in [config.photo_index_path(), config.hash_index_path()] {
        match fs::remove_file(&path) {
            Ok(()) => info!(path = %path.display(), "Removed index"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                return Err(err).with_context(|| format!("Failed to remove {}", path.display()))
            }
        }
    }
    Ok(())
}

async fn open(config: &PifConfig) -> anyhow::Result<SyncCoordinator> {
    let credentials = load_credentials(|name| std::env::var(name).ok()).with_context(|| {
        format!(
            "Set {} and {} to your Flickr credentials",
            core_auth::API_KEY_VAR,
            core_auth::ACCESS_TOKEN_VAR
        )
    })?;

    let connector = FlickrConnector::connect(config.require_http_client()?, credentials)
        .await
        .map_err(IndexError::Auth)
        .context("Could not connect to Flickr")?;

    let coordinator = SyncCoordinator::open(
        config,
        Arc::new(connector),
        Arc::new(ImageCrateInspector),
        Some(&report_progress),
    )
    .await?;

    Ok(coordinator)
}

fn load_credentials<F>(lookup: F) -> core_index::Result<ApiCredentials>
where
    F: Fn(&str) -> Option<String>,
{
    Ok(ApiCredentials::from_lookup(lookup)?)
}

fn report_progress(phase: &str, (done, total): (u64, u64)) {
    debug!(phase, done, total, "Progress");
}

struct UploadPlan {
    force: bool,
    dry_run: bool,
    mark: bool,
}

async fn upload(
    coordinator: &mut SyncCoordinator,
    files: &[PathBuf],
    plan: &UploadPlan,
) -> anyhow::Result<()> {
    let mut outcome = Ok(());

    for path in files {
        match coordinator.classify(path) {
            Classification::Invalid => continue,
            Classification::Old if !plan.force => {
                info!(path = %path.display(), "Skipped (--force to upload)");
                continue;
            }
            _ => {}
        }

        if let Err(e) = handle(coordinator, path, plan).await {
            outcome = Err(e);
            break;
        }
    }

    // Keep the bookkeeping of every upload that went through
    if plan.dry_run {
        coordinator.files().sync()?;
    } else {
        coordinator.sync()?;
    }

    outcome
}

async fn handle(
    coordinator: &mut SyncCoordinator,
    path: &Path,
    plan: &UploadPlan,
) -> anyhow::Result<()> {
    if plan.mark {
        if !plan.dry_run {
            coordinator.ignore(path)?;
        }
        info!(path = %path.display(), "Marked as uploaded");
        return Ok(());
    }

    if plan.dry_run {
        info!(path = %path.display(), "Would upload");
        return Ok(());
    }

    let id = coordinator
        .upload(path, Some(&report_progress))
        .await
        .with_context(|| format!("Failed to upload {}", path.display()))?;

    info!(path = %path.display(), id = %id, "Uploaded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_flags() {
        let opts = Opts::try_parse_from([
            "pif", "-vv", "-c", "/tmp/state", "upload", "--dry-run", "--mark", "a.jpg", "photos",
        ])
        .unwrap();

        assert_eq!(opts.verbose, 2);
        assert_eq!(opts.config_dir, Some(PathBuf::from("/tmp/state")));
        match opts.command {
            Command::Upload {
                force,
                dry_run,
                mark,
                no_refresh,
                reset,
                paths,
            } => {
                assert!(dry_run && mark);
                assert!(!force && !no_refresh && !reset);
                assert_eq!(paths, vec![PathBuf::from("a.jpg"), PathBuf::from("photos")]);
            }
            _ => panic!("expected upload"),
        }
    }

    #[test]
    fn test_short_flags() {
        let opts = Opts::try_parse_from(["pif", "status", "-x", "a.png", "-j", "8"]).unwrap();
        assert_eq!(opts.jobs, Some(8));
        assert!(matches!(opts.command, Command::Status { no_refresh: true, .. }));
    }

    #[test]
    fn test_paths_required() {
        assert!(Opts::try_parse_from(["pif", "upload"]).is_err());
        assert!(Opts::try_parse_from(["pif", "refresh", "--reset"]).is_ok());
    }

    #[test]
    fn test_missing_credentials_are_auth_errors() {
        let result = load_credentials(|name| {
            (name == core_auth::API_KEY_VAR).then(|| "key".to_string())
        });
        assert!(matches!(
            result,
            Err(IndexError::Auth(core_auth::AuthError::MissingCredential(ref var)))
                if var == core_auth::ACCESS_TOKEN_VAR
        ));

        let credentials = load_credentials(|_| Some("value".to_string())).unwrap();
        assert_eq!(credentials.api_key, "value");
    }

    #[test]
    fn test_reset_removes_remote_indexes_only() {
        let dir = tempfile::tempdir().unwrap();
        let config = PifConfig::builder().config_dir(dir.path()).build().unwrap();
        for path in [
            config.file_index_path(),
            config.photo_index_path(),
            config.hash_index_path(),
        ] {
            fs::write(path, b"{}").unwrap();
        }

        reset_remote_indexes(&config).unwrap();
        reset_remote_indexes(&config).unwrap();

        assert!(config.file_index_path().exists());
        assert!(!config.photo_index_path().exists());
        assert!(!config.hash_index_path().exists());
    }
}
