//! URL parser (spec §4.1).
//!
//! Grounded in the original `url_init` in `url.c`: split on `"://"` for the
//! scheme, then on the first `:` or `/` to separate host/port/path, enforcing
//! that the scheme is `http`, the port is a nonzero decimal number, and the
//! path contains no `/../` traversal. Port parsing matches `url_init`'s
//! `atoi(port)` call exactly: a leading run of digits is taken and anything
//! after is ignored, rather than rejecting the whole port token.

use std::fmt;

/// A parsed absolute-form request URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Url {
    /// The original input string, preserved verbatim.
    pub full: String,
    pub scheme: String,
    pub host: String,
    /// Set later by the resolver (spec §4.4); absent right after parsing.
    pub ip: Option<String>,
    pub port: u16,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlError(pub String);

impl fmt::Display for UrlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for UrlError {}

/// Parse `s` into a [`Url`], enforcing the scheme/port/path invariants.
///
/// Mirrors `url_init`'s algorithm byte for byte, modulo memory management:
/// no partially-built `Url` ever escapes `Err`.
pub fn parse(s: &str) -> Result<Url, UrlError> {
    let full = s.to_string();

    let (scheme, rest) = match s.split_once("://") {
        Some((scheme, rest)) => (scheme.to_string(), rest),
        None => ("http".to_string(), s),
    };

    if scheme != "http" {
        return Err(UrlError(format!("Invalid scheme `{scheme}' - use http")));
    }

    let (host, port, path_part) = split_host_port_path(rest)?;

    let path = match path_part {
        Some(p) if !p.is_empty() => format!("/{p}"),
        _ => "/".to_string(),
    };

    if path.contains("/../") {
        return Err(UrlError("Invalid path includes `/../'".to_string()));
    }

    Ok(Url {
        full,
        scheme,
        host,
        ip: None,
        port,
        path,
    })
}

/// Split `rest` (everything after the scheme) into host, port, and the
/// remaining path segment (without its leading `/`).
///
/// Matches `url_init`'s `strsep` chain: the *first* `:` anywhere in `rest`
/// introduces a port (even one that turns out to lie inside the path
/// segment) - there is no lookahead comparing `:` against `/` position.
fn split_host_port_path(rest: &str) -> Result<(String, u16, Option<&str>), UrlError> {
    match rest.find(':') {
        Some(colon_pos) => {
            let host = rest[..colon_pos].to_string();
            let after_colon = &rest[colon_pos + 1..];
            let (port_str, path_part) = match after_colon.find('/') {
                Some(p) => (&after_colon[..p], Some(&after_colon[p + 1..])),
                None => (after_colon, None),
            };

            let portno = atoi_prefix(port_str);
            if portno == 0 {
                return Err(UrlError(format!("Invalid port `{port_str}'")));
            }

            Ok((host, portno, path_part))
        }
        None => match rest.find('/') {
            Some(p) => Ok((rest[..p].to_string(), 80, Some(&rest[p + 1..]))),
            None => Ok((rest.to_string(), 80, None)),
        },
    }
}

/// `atoi`-style leading-digit-run parse: takes as many leading ASCII digits
/// as it finds and ignores anything after, rather than requiring the whole
/// string to be numeric. `"8080abc"` parses to `8080`, matching the
/// original's `atoi(port)` call. Returns `0` (invalid) when there is no
/// leading digit at all, or the digit run overflows `u16`.
fn atoi_prefix(s: &str) -> u16 {
    let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_host_defaults() {
        let url = parse("example.com").unwrap();
        assert_eq!(url.host, "example.com");
        assert_eq!(url.port, 80);
        assert_eq!(url.path, "/");
        assert_eq!(url.scheme, "http");
    }

    #[test]
    fn host_with_port() {
        let url = parse("example.com:8000").unwrap();
        assert_eq!(url.host, "example.com");
        assert_eq!(url.port, 8000);
        assert_eq!(url.path, "/");
    }

    #[test]
    fn full_absolute_form() {
        let url = parse("http://www.example.com:8080/path/to/resource.html").unwrap();
        assert_eq!(url.host, "www.example.com");
        assert_eq!(url.port, 8080);
        assert_eq!(url.path, "/path/to/resource.html");
    }

    #[test]
    fn invalid_port() {
        let err = parse("example.com:abc").unwrap_err();
        assert!(err.0.contains("Invalid port `abc'"));
    }

    #[test]
    fn invalid_port_zero() {
        let err = parse("example.com:0").unwrap_err();
        assert!(err.0.contains("Invalid port `0'"));
    }

    #[test]
    fn path_traversal_rejected() {
        let err = parse("example.com/../secrets").unwrap_err();
        assert!(err.0.contains("Invalid path includes `/../'"));
    }

    #[test]
    fn non_http_scheme_rejected() {
        let err = parse("https://example.com").unwrap_err();
        assert!(err.0.contains("Invalid scheme `https'"));
    }

    #[test]
    fn empty_path_after_host_is_root() {
        let url = parse("http://example.com/").unwrap();
        assert_eq!(url.path, "/");
    }

    #[test]
    fn path_with_nested_traversal_not_at_start() {
        let err = parse("http://example.com/a/b/../../../etc/passwd").unwrap_err();
        assert!(err.0.contains("Invalid path includes `/../'"));
    }

    #[test]
    fn leading_zeros_in_port_allowed() {
        let url = parse("example.com:0080").unwrap();
        assert_eq!(url.port, 80);
    }

    #[test]
    fn trailing_garbage_after_port_digits_is_ignored() {
        let url = parse("example.com:8080abc/index.html").unwrap();
        assert_eq!(url.port, 8080);
        assert_eq!(url.path, "/index.html");
    }

    #[test]
    fn scheme_defaults_when_no_separator() {
        let url = parse("plainhostname.org/index.html").unwrap();
        assert_eq!(url.scheme, "http");
        assert_eq!(url.host, "plainhostname.org");
        assert_eq!(url.path, "/index.html");
    }
}
