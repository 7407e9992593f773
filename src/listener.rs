//! Accept loop (spec §4.5, §5 "Backpressure").
//!
//! Grounded in `proxy`/`initialize_listener` in `webproxy.c` and the
//! `tokio::select!`-based accept loop in `main_backup.rs`: a bound listener
//! backed by the kernel's own backlog, plus the teacher's soft
//! `MAX_CONNECTIONS` ceiling retained as ambient robustness (spec §5).

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::connection::{self, SharedState};
use crate::error::StartupError;
use crate::shutdown::Shutdown;

pub const MAX_BACKLOG: u32 = 100;
pub const MAX_CONNECTIONS: usize = 100;

/// Bind the listener and run the accept loop until `shutdown` is requested.
pub async fn run(port: u16, state: Arc<SharedState>, shutdown: Shutdown) -> Result<(), StartupError> {
    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .map_err(|source| StartupError::Bind { port, source })?;
    info!(port, max_connections = MAX_CONNECTIONS, backlog = MAX_BACKLOG, "listening");

    let active = Arc::new(AtomicUsize::new(0));
    let next_conn_id = Arc::new(AtomicU64::new(0));

    loop {
        if shutdown.is_requested() {
            break;
        }

        tokio::select! {
            _ = tokio::time::sleep(std::time::Duration::from_millis(200)) => {
                continue;
            }
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        let current = active.load(Ordering::Relaxed);
                        if current >= MAX_CONNECTIONS {
                            warn!(%addr, current, "connection limit reached, rejecting");
                            let _ = stream.try_write(b"HTTP/1.1 503 Service Unavailable\r\n\r\n");
                            continue;
                        }

                        active.fetch_add(1, Ordering::Relaxed);
                        let conn_id = next_conn_id.fetch_add(1, Ordering::Relaxed);
                        debug!(%addr, conn_id, active = current + 1, "accepted connection");

                        let state = state.clone();
                        let active = active.clone();
                        tokio::spawn(async move {
                            connection::handle(addr.ip().to_string(), stream, state, conn_id).await;
                            active.fetch_sub(1, Ordering::Relaxed);
                        });
                    }
                    Err(err) => error!(error = %err, "failed to accept connection"),
                }
            }
        }
    }

    info!("listener stopped accepting, in-flight connections drain cooperatively");
    Ok(())
}
