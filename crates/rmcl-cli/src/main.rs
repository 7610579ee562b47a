//! rmcl CLI: mounts the remote document store as a FUSE filesystem.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use rmcl_api::ApiClient;
use rmcl_cache::{DataCache, DatabasePool, DocumentCache};
use rmcl_core::config::Config;
use rmcl_core::domain::Mode;
use rmcl_fuse::RmclFs;
use rmcl_graph::ItemGraph;
use tracing_subscriber::EnvFilter;

fn parse_mode(s: &str) -> Result<Mode, String> {
    Mode::parse(s).ok_or_else(|| format!("invalid mode '{s}' (expected meta, raw, or orig)"))
}

/// Mounts a read-mostly view of the remote document store at `mountpoint`.
#[derive(Debug, Parser)]
#[command(name = "rmcl", version, about = "Mount the remote document store as a filesystem")]
struct Cli {
    /// Directory to mount the filesystem at.
    mountpoint: PathBuf,

    /// Enable debug-level logging.
    #[arg(short, long)]
    debug: bool,

    /// Initial display mode for document contents.
    #[arg(short, long, value_parser = parse_mode, default_value = "raw")]
    mode: Mode,
}

fn init_logging(debug: bool) {
    let filter = if debug { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let config_path = Config::default_path();
    let config = Config::load_or_default(&config_path)
        .with_context(|| format!("failed to load config at {}", config_path.display()))?;

    let db_path = dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rmcl")
        .join("filedata.db");
    let pool = DatabasePool::new(&db_path)
        .await
        .context("failed to open data cache database")?;
    let data_cache = Arc::new(DataCache::new(pool));
    let document_cache = Arc::new(DocumentCache::new());

    let api = Arc::new(ApiClient::new(config, config_path));
    api.ensure_session()
        .await
        .context("failed to establish a session with the remote document store")?;

    let graph = Arc::new(ItemGraph::new(
        Arc::clone(&api),
        data_cache,
        document_cache,
    ));

    let rt_handle = tokio::runtime::Handle::current();
    let fs = RmclFs::new(Arc::clone(&graph), rt_handle, cli.mode);

    let mount_options = vec![
        fuser::MountOption::FSName("rmcl".to_string()),
        fuser::MountOption::AutoUnmount,
    ];

    tracing::info!(mountpoint = %cli.mountpoint.display(), mode = %cli.mode, "mounting");
    let session = fuser::spawn_mount2(fs, &cli.mountpoint, &mount_options).with_context(|| {
        format!("failed to mount filesystem at {}", cli.mountpoint.display())
    })?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    session.join();

    tracing::info!("unmounted");
    Ok(())
}
