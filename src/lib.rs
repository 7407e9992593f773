//! Caching forward HTTP/1.1 proxy.
//!
//! Clients connect over TCP, issue `GET` requests for absolute-form URIs,
//! and receive responses either fetched from the origin server or served
//! from a local on-disk cache. A hostname-to-IP resolution cache and a
//! hostname/IP blacklist sit in front of every request.

pub mod blacklist;
pub mod cache;
pub mod codec;
pub mod config;
pub mod connection;
pub mod error;
pub mod gc;
pub mod listener;
pub mod resolver;
pub mod shutdown;
pub mod ttl_map;
pub mod url;

pub use codec::{Request, Response};
pub use connection::SharedState;
pub use error::{ProxyError, StartupError};
pub use shutdown::Shutdown;
pub use ttl_map::TtlMap;

/// Default bucket count for the hostname and file caches - matches
/// `hashmap_init`'s call sites in `webproxy.c`, which both used a modest
/// fixed bucket count rather than sizing to expected load.
pub const DEFAULT_BUCKET_COUNT: usize = 256;
