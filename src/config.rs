//! CLI surface (spec §6 "CLI").
//!
//! Grounded in `parse_options` in `webproxy.c`, re-expressed with `clap`'s
//! derive API rather than hand-rolled `getopt` parsing, per the ambient-stack
//! expansion - this is exactly the kind of "thin glue" call-out the spec
//! names explicitly (§OVERVIEW "Out of scope: command-line parsing").

use clap::Parser;

const DEFAULT_CACHE_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Parser)]
#[command(name = "forwardcache", about = "Caching forward HTTP/1.1 proxy")]
pub struct Cli {
    /// Enable debug-level logging.
    #[arg(short, long)]
    pub debug: bool,

    /// Port the proxy listens on.
    #[arg(value_parser = parse_nonzero_u16)]
    pub port: u16,

    /// File-cache entry TTL, in seconds.
    #[arg(default_value_t = DEFAULT_CACHE_TIMEOUT_SECS, value_parser = parse_nonzero_u64)]
    pub cache_timeout_secs: u64,
}

fn parse_nonzero_u16(s: &str) -> Result<u16, String> {
    let value: u16 = s.parse().map_err(|_| format!("`{s}' is not a valid port"))?;
    if value == 0 {
        return Err("port must be at least 1".to_string());
    }
    Ok(value)
}

fn parse_nonzero_u64(s: &str) -> Result<u64, String> {
    let value: u64 = s
        .parse()
        .map_err(|_| format!("`{s}' is not a valid timeout"))?;
    if value == 0 {
        return Err("cache timeout must be at least 1 second".to_string());
    }
    Ok(value)
}
