//! File cache: URL -> on-disk cached-response path mapping, plus the
//! filesystem operations that back it (spec §4.5 "Cache storage").
//!
//! Grounded in `url_to_cache_path`/`save_cache_file` in `webproxy.c`: the
//! URL path has its `/` bytes flattened into `_`, cached under a per-host
//! subdirectory of the cache root, and chunked bodies are dechunked while
//! being written to disk.

use std::path::{Path, PathBuf};

use xxhash_rust::xxh64::xxh64;

use crate::ttl_map::TtlMap;
use crate::url::Url;

/// Fast non-TTL cache key for callers that want a `u64` rather than a
/// `TtlMap` lookup - kept from the teacher's `create_cache_key`.
pub fn fast_key(host: &str, port: u16, path: &str) -> u64 {
    xxh64(format!("{host}:{port}{path}").as_bytes(), 0)
}

pub const CACHE_ROOT: &str = ".cache";
#[cfg(unix)]
pub const DIR_PERMS: u32 = 0o700;

/// Compute the on-disk path a cached response for `url` would live at,
/// without touching the filesystem.
pub fn cache_path(cache_root: &str, url: &Url) -> PathBuf {
    let flattened = url.path.replace('/', "_");
    Path::new(cache_root).join(&url.host).join(flattened)
}

/// Ensure `<cache_root>/<host>` exists, creating it (and `cache_root`) if
/// necessary, with `0700` permissions on Unix.
pub async fn ensure_host_dir(cache_root: &str, host: &str) -> std::io::Result<PathBuf> {
    let dir = Path::new(cache_root).join(host);
    tokio::fs::create_dir_all(&dir).await?;
    set_private_perms(&dir).await?;
    Ok(dir)
}

/// Chmod `dir` to `0700` on Unix; a no-op elsewhere. Exposed so the cache
/// root itself can be locked down at startup, not just per-host
/// subdirectories created later.
#[cfg(unix)]
pub async fn set_private_perms(dir: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let perms = std::fs::Permissions::from_mode(DIR_PERMS);
    tokio::fs::set_permissions(dir, perms).await
}

#[cfg(not(unix))]
pub async fn set_private_perms(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Write `body` to `path`, dechunking it first if `chunked` is set. Mirrors
/// `save_cache_file`'s dechunking loop: successive `<hex-len>\r\n<bytes>\r\n`
/// segments, stopping at a zero-length segment.
pub async fn store_body(path: &Path, body: &[u8], chunked: bool) -> std::io::Result<()> {
    let decoded;
    let bytes = if chunked {
        decoded = dechunk(body);
        &decoded
    } else {
        body
    };
    tokio::fs::write(path, bytes).await
}

fn dechunk(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len());
    let mut cursor = body;

    loop {
        let Some(crlf) = cursor.windows(2).position(|w| w == b"\r\n") else {
            break;
        };
        let Ok(len_str) = std::str::from_utf8(&cursor[..crlf]) else {
            break;
        };
        let Ok(len) = usize::from_str_radix(len_str.trim(), 16) else {
            break;
        };
        if len == 0 {
            break;
        }

        let data_start = crlf + 2;
        let data_end = data_start + len;
        if data_end > cursor.len() {
            break;
        }
        out.extend_from_slice(&cursor[data_start..data_end]);

        let mut next = data_end;
        if cursor.get(next..next + 2) == Some(b"\r\n") {
            next += 2;
        }
        cursor = &cursor[next..];
    }

    out
}

/// MIME type for a cached file, guessed from the original URL path's
/// extension (spec §4.5 "MIME table").
pub fn mime_for_path(url_path: &str) -> &'static str {
    match url_path.rsplit('.').next() {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("jpg") => "image/jpg",
        Some("txt") => "text/plain",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        _ => "text/html",
    }
}

/// Build a `TtlMap` that maps full URLs to cache-file paths, deleting the
/// backing file whenever an entry expires or is explicitly removed.
pub fn new_url_to_path_map(bucket_count: usize, timeout: u64) -> Result<TtlMap, crate::ttl_map::BucketCountZero> {
    TtlMap::with_timeout_and_unlinker(
        bucket_count,
        timeout,
        Some(Box::new(|path: &str| {
            let path = path.to_string();
            tokio::spawn(async move {
                if let Err(err) = tokio::fs::remove_file(&path).await {
                    if err.kind() != std::io::ErrorKind::NotFound {
                        tracing::warn!(%path, error = %err, "failed to unlink expired cache file");
                    }
                }
            });
        })),
    )
}
