use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use forwardcache::cache::CACHE_ROOT;
use forwardcache::config::Cli;
use forwardcache::error::StartupError;
use forwardcache::{blacklist, cache, gc, listener, shutdown, DEFAULT_BUCKET_COUNT};
use forwardcache::{SharedState, Shutdown, TtlMap};

fn init_logging(debug: bool) {
    let default_directive = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("forwardcache={default_directive}"))
        }))
        .init();
}

async fn run(cli: Cli) -> Result<(), StartupError> {
    let hostname_cache = Arc::new(
        TtlMap::new(DEFAULT_BUCKET_COUNT).expect("DEFAULT_BUCKET_COUNT is nonzero"),
    );
    let file_cache = Arc::new(
        cache::new_url_to_path_map(DEFAULT_BUCKET_COUNT, cli.cache_timeout_secs)
            .expect("DEFAULT_BUCKET_COUNT is nonzero"),
    );

    tokio::fs::create_dir_all(CACHE_ROOT)
        .await
        .map_err(|source| StartupError::CacheRoot {
            path: CACHE_ROOT.to_string(),
            source,
        })?;
    cache::set_private_perms(Path::new(CACHE_ROOT))
        .await
        .map_err(|source| StartupError::CacheRoot {
            path: CACHE_ROOT.to_string(),
            source,
        })?;

    let blacklist = Arc::new(blacklist::load(blacklist::BLACKLIST_FILE));
    info!(entries = blacklist.len(), "blacklist loaded");

    let shutdown = Shutdown::new();
    shutdown::install_signal_handlers(shutdown.clone())?;

    let state = Arc::new(SharedState {
        cache_root: CACHE_ROOT.to_string(),
        hostname_cache,
        file_cache: file_cache.clone(),
        blacklist,
        shutdown: shutdown.clone(),
    });

    let gc_handle = tokio::spawn(gc::run(file_cache, shutdown.clone()));

    listener::run(cli.port, state, shutdown).await?;

    let _ = gc_handle.await;
    info!("shutdown complete");
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.debug);

    info!(port = cli.port, cache_timeout_secs = cli.cache_timeout_secs, "forwardcache starting");

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "fatal startup error");
            ExitCode::FAILURE
        }
    }
}
