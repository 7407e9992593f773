//! Per-connection state machine (spec §4.5).
//!
//! Grounded in `handle_connection` in `webproxy.c`: a do/while keep-alive
//! loop around READ_REQUEST -> RESOLVE -> CHECK_BLACKLIST -> CHECK_METHOD ->
//! CHECK_CACHE -> (SERVE_CACHE | FETCH_UPSTREAM -> READ_UPSTREAM -> FORWARD
//! -> CACHE_STORE) -> WAIT_KEEPALIVE, re-expressed as owned Rust state
//! instead of the original's explicit `request_destroy`/`response_destroy`
//! calls, which Rust's drop order subsumes.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn, Instrument};

use crate::blacklist;
use crate::cache;
use crate::codec::request::MAX_REQUEST_SIZE;
use crate::codec::{self, Request, Response};
use crate::error::ProxyError;
use crate::resolver::{self, Resolution};
use crate::shutdown::Shutdown;
use crate::ttl_map::TtlMap;

const KEEPALIVE_TIMEOUT: Duration = Duration::from_secs(10);
const KEEPALIVE_POLL: Duration = Duration::from_secs(1);
const READ_CHUNK: usize = 8192;

pub struct SharedState {
    pub cache_root: String,
    pub hostname_cache: Arc<TtlMap>,
    pub file_cache: Arc<TtlMap>,
    pub blacklist: Arc<Vec<String>>,
    pub shutdown: Shutdown,
}

/// Upstream socket retained across keep-alive iterations, reused when the
/// next request resolves to the same `(ip, port)`.
struct Upstream {
    stream: TcpStream,
    ip: String,
    port: u16,
}

/// Drive one client connection end to end. Runs until the peer closes, the
/// keep-alive wait times out, or shutdown is requested.
pub async fn handle(client_ip: String, mut client: TcpStream, state: Arc<SharedState>, conn_id: u64) {
    let span = tracing::info_span!("connection", conn_id, client_ip = %client_ip);
    async {
        let mut upstream: Option<Upstream> = None;

        loop {
            let mut request = match read_request(&mut client, &client_ip).await {
                Ok(Some(req)) => req,
                Ok(None) => break, // peer closed cleanly
                Err(err) => {
                    send_error(&mut client, None, &err).await;
                    break;
                }
            };

            match serve_one_request(&mut client, &mut request, &state, &mut upstream).await {
                Ok(keepalive) if keepalive => {
                    if !wait_for_next_request(&mut client, &state.shutdown).await {
                        break;
                    }
                }
                Ok(_) => break,
                Err(err) => {
                    send_error(&mut client, Some(&request), &err).await;
                    break;
                }
            }
        }

        debug!("connection closed");
    }
    .instrument(span)
    .await;
}

async fn read_request(client: &mut TcpStream, client_ip: &str) -> Result<Option<Request>, ProxyError> {
    let mut request = Request::new(client_ip.to_string());
    let mut buf = [0u8; READ_CHUNK];

    loop {
        let n = client.read(&mut buf).await.map_err(ProxyError::UpstreamUnreachable)?;
        if n == 0 {
            return if request.raw_len() == 0 {
                Ok(None)
            } else {
                Err(ProxyError::PeerClosed)
            };
        }
        request.deserialize(&buf[..n])?;
        if request.complete {
            return Ok(Some(request));
        }
    }
}

async fn serve_one_request(
    client: &mut TcpStream,
    request: &mut Request,
    state: &Arc<SharedState>,
    upstream: &mut Option<Upstream>,
) -> Result<bool, ProxyError> {
    let keepalive = request.is_keepalive();
    let is_get = request.is_get();
    let method = request.method.clone().unwrap_or_default();

    // Scoped so the mutable borrow of `request.url` ends before the
    // remaining checks, which only need immutable access to `request`.
    let (resolution, host, ip, full_url) = {
        let url = request
            .url
            .as_mut()
            .ok_or_else(|| ProxyError::MalformedRequest("missing request URL".to_string()))?;
        let resolution = resolver::lookup_host(url, &state.hostname_cache).await;
        (resolution, url.host.clone(), url.ip.clone(), url.full.clone())
    };

    if matches!(resolution, Resolution::Invalid) {
        return Err(ProxyError::ResolutionFailed(host));
    }
    let ip = ip.expect("lookup_host always sets ip on success");

    if blacklist::is_blacklisted(&state.blacklist, &host, Some(&ip)) {
        return Err(ProxyError::Blacklisted(host));
    }

    if !is_get {
        return Err(ProxyError::UnsupportedMethod(method));
    }

    if let Some(path) = state.file_cache.get(&full_url).await {
        serve_from_cache(client, request, &path).await?;
        return Ok(keepalive);
    }

    fetch_and_forward(client, request, state, upstream).await?;
    Ok(keepalive)
}

async fn serve_from_cache(
    client: &mut TcpStream,
    request: &Request,
    path: &str,
) -> Result<(), ProxyError> {
    let body = tokio::fs::read(path)
        .await
        .map_err(|_| ProxyError::InvalidUrl(path.to_string()))?;

    let mime = cache::mime_for_path(&request.url.as_ref().unwrap().path);
    let res = Response::from_request(request, 200, Some(mime), Some(body.len()));
    let mut out = codec::response::serialize(&res);
    out.extend_from_slice(&body);
    client.write_all(&out).await.map_err(ProxyError::UpstreamUnreachable)?;
    info!(path, "served from cache");
    Ok(())
}

/// Connect/write failures here close the client connection without a
/// response (spec §4.5 FETCH_UPSTREAM); only a failure reading the response
/// back, in [`read_response`], answers the client with a status.
async fn fetch_and_forward(
    client: &mut TcpStream,
    request: &Request,
    state: &Arc<SharedState>,
    upstream_slot: &mut Option<Upstream>,
) -> Result<(), ProxyError> {
    let url = request.url.as_ref().unwrap();
    let ip = url.ip.clone().unwrap();
    let port = url.port;

    let needs_new = match upstream_slot {
        Some(u) => u.ip != ip || u.port != port,
        None => true,
    };
    if needs_new {
        let stream = TcpStream::connect((ip.as_str(), port))
            .await
            .map_err(ProxyError::UpstreamUnreachable)?;
        *upstream_slot = Some(Upstream { stream, ip: ip.clone(), port });
    }
    let upstream = upstream_slot.as_mut().unwrap();

    upstream
        .stream
        .write_all(&request.raw)
        .await
        .map_err(ProxyError::UpstreamUnreachable)?;

    let response = read_response(&mut upstream.stream).await?;

    let mut out = codec::response::serialize(&response);
    out.extend_from_slice(response.content());
    client.write_all(&out).await.map_err(ProxyError::UpstreamUnreachable)?;

    if response.is_ok_2xx() {
        cache_store(request, &response, state).await;
    }

    Ok(())
}

async fn read_response(upstream: &mut TcpStream) -> Result<Response, ProxyError> {
    let mut response = Response::new();
    let mut buf = [0u8; READ_CHUNK];

    loop {
        let n = upstream
            .read(&mut buf)
            .await
            .map_err(ProxyError::UpstreamReadFailed)?;
        if n == 0 {
            if response.complete {
                return Ok(response);
            }
            return Err(ProxyError::MalformedResponse(
                "upstream closed before response was complete".to_string(),
            ));
        }
        response.deserialize(&buf[..n])?;
        if response.complete {
            return Ok(response);
        }
    }
}

async fn cache_store(request: &Request, response: &Response, state: &Arc<SharedState>) {
    let url = request.url.as_ref().unwrap();
    if let Err(err) = cache::ensure_host_dir(&state.cache_root, &url.host).await {
        warn!(error = %err, "failed to create cache host directory");
        return;
    }

    let path = cache::cache_path(&state.cache_root, url);
    if let Err(err) = cache::store_body(&path, response.content(), response.is_chunked()).await {
        warn!(error = %err, "failed to write cache file");
        return;
    }

    state
        .file_cache
        .put(&url.full, &path.to_string_lossy())
        .await;
}

/// Poll the client socket for readability, matching the original's
/// `pselect`-on-remaining-timeout loop in 1-second ticks.
async fn wait_for_next_request(client: &mut TcpStream, shutdown: &Shutdown) -> bool {
    let deadline = tokio::time::Instant::now() + KEEPALIVE_TIMEOUT;

    while tokio::time::Instant::now() < deadline {
        if shutdown.is_requested() {
            return false;
        }
        match tokio::time::timeout(KEEPALIVE_POLL, client.readable()).await {
            Ok(Ok(())) => {
                let mut probe = [0u8; 1];
                match client.peek(&mut probe).await {
                    Ok(0) => return false, // peer closed
                    Ok(_) => return true,
                    Err(_) => return false,
                }
            }
            Ok(Err(_)) => return false,
            Err(_) => continue, // 1-second tick elapsed, re-check shutdown
        }
    }
    false
}

async fn send_error(client: &mut TcpStream, request: Option<&Request>, err: &ProxyError) {
    let Some(status) = err.status() else {
        debug!(%err, "closing connection without a response");
        return;
    };

    warn!(%err, status, "sending error response");

    let placeholder;
    let req = match request {
        Some(r) => r,
        None => {
            placeholder = Request::new(String::new());
            &placeholder
        }
    };
    let res = Response::from_request(req, status, None, None);
    let out = codec::response::serialize(&res);
    let _ = client.write_all(&out).await;
}
