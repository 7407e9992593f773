//! Forbidden-host blacklist (spec §4.7).
//!
//! Grounded in `blacklist_init`/`blacklist_has_entry` in `webproxy.c`: a flat
//! list loaded once from a text file, comments and blank lines skipped,
//! membership tested by linear scan against both the request's hostname and
//! its resolved IP. Read-only after startup, so it is shared as a plain
//! `Arc<Vec<String>>` rather than behind a lock.

use tracing::error;

pub const BLACKLIST_FILE: &str = "blacklist.txt";

/// Load the blacklist from `path`. A missing file is not fatal: it is logged
/// and treated as an empty list, matching the original's non-fatal
/// `blacklist_init` failure path.
pub fn load(path: &str) -> Vec<String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => parse(&contents),
        Err(err) => {
            error!(%path, error = %err, "failed to load blacklist, proceeding with an empty one");
            Vec::new()
        }
    }
}

fn parse(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Is `host` or `ip` present in `blacklist`?
pub fn is_blacklisted(blacklist: &[String], host: &str, ip: Option<&str>) -> bool {
    blacklist
        .iter()
        .any(|entry| entry == host || ip == Some(entry.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_skips_blank_lines_and_comments() {
        let text = "# forbidden hosts\nevil.example\n\n  \n10.0.0.13\n# trailing comment\n";
        let list = parse(text);
        assert_eq!(list, vec!["evil.example".to_string(), "10.0.0.13".to_string()]);
    }

    #[test]
    fn membership_checks_host_and_ip() {
        let list = vec!["evil.example".to_string(), "192.0.2.1".to_string()];
        assert!(is_blacklisted(&list, "evil.example", None));
        assert!(is_blacklisted(&list, "other.example", Some("192.0.2.1")));
        assert!(!is_blacklisted(&list, "fine.example", Some("192.0.2.2")));
    }

    #[test]
    fn missing_file_yields_empty_list() {
        let list = load("/nonexistent/path/to/blacklist.txt");
        assert!(list.is_empty());
    }
}
