//! Typed error taxonomy for the proxy (see spec §7 ERROR HANDLING DESIGN).
//!
//! Every component returns a `Result<T, ProxyError>`. The connection handler's
//! top level matches on `ProxyError::status()` to decide whether to answer the
//! client with a response or simply close the socket.

use thiserror::Error;

/// Structured error result threaded through request handling.
///
/// Variants that carry an HTTP status are translated into a response to the
/// client (spec §7's "Propagation policy"); all others just close the
/// connection after a log line.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("request header fields too large")]
    HeaderTooLarge,

    #[error("unsupported method {0}, only GET is implemented")]
    UnsupportedMethod(String),

    #[error("malformed request-line url: {0}")]
    MalformedRequestUrl(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("host {0} is blacklisted")]
    Blacklisted(String),

    #[error("dns resolution failed for {0}")]
    ResolutionFailed(String),

    #[error("upstream connection failed: {0}")]
    UpstreamUnreachable(#[from] std::io::Error),

    #[error("failed to read upstream response: {0}")]
    UpstreamReadFailed(std::io::Error),

    #[error("malformed upstream response: {0}")]
    MalformedResponse(String),

    #[error("peer closed the connection")]
    PeerClosed,
}

impl ProxyError {
    /// HTTP status code this error should be reported to the client as, or
    /// `None` if the connection should simply be closed (e.g. a clean peer
    /// close, which is not an error at all).
    pub fn status(&self) -> Option<u16> {
        match self {
            ProxyError::MalformedRequest(_) => Some(400),
            ProxyError::HeaderTooLarge => Some(431),
            ProxyError::UnsupportedMethod(_) => Some(405),
            ProxyError::MalformedRequestUrl(_) => Some(400),
            ProxyError::InvalidUrl(_) => Some(404),
            ProxyError::Blacklisted(_) => Some(403),
            ProxyError::ResolutionFailed(_) => Some(404),
            // FETCH_UPSTREAM connect/write failures close the connection
            // silently; only a failure while reading the response (below)
            // has enough of a request/response cycle to answer with a status.
            ProxyError::UpstreamUnreachable(_) => None,
            ProxyError::UpstreamReadFailed(_) => Some(502),
            ProxyError::MalformedResponse(_) => Some(502),
            ProxyError::PeerClosed => None,
        }
    }
}

/// Fatal startup errors that abort the process rather than a single
/// connection (spec §7: "Fatal startup errors").
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to bind listener on port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to create cache root {path}: {source}")]
    CacheRoot {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to install signal handler: {0}")]
    Signal(#[source] std::io::Error),
}
