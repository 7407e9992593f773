//! Cache GC worker (spec §4.6).
//!
//! Grounded in the `cache_gc` thread in `webproxy.c`: a 100ms tick loop that
//! sweeps the file cache roughly once a second, exiting cooperatively on
//! shutdown rather than being cancelled.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::shutdown::Shutdown;
use crate::ttl_map::TtlMap;

const TICK: Duration = Duration::from_millis(100);
const SWEEP_EVERY_N_TICKS: u32 = 10;

/// Run until `shutdown` is requested, sweeping `file_cache` once per second.
pub async fn run(file_cache: Arc<TtlMap>, shutdown: Shutdown) {
    let mut tick: u32 = 0;
    while !shutdown.is_requested() {
        tokio::time::sleep(TICK).await;
        tick = tick.wrapping_add(1);
        if tick % SWEEP_EVERY_N_TICKS == 0 {
            debug!("sweeping file cache");
            file_cache.sweep().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn exits_promptly_once_shutdown_is_requested() {
        let cache = Arc::new(TtlMap::new(4).unwrap());
        let shutdown = Shutdown::new();
        let shutdown_cl = shutdown.clone();

        let handle = tokio::spawn(async move { run(cache, shutdown_cl).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.request();
        tokio::time::timeout(Duration::from_millis(500), handle)
            .await
            .expect("gc worker did not exit after shutdown")
            .unwrap();
    }
}
