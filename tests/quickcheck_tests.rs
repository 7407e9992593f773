use forwardcache::url;
use quickcheck_macros::quickcheck;

/// Re-parsing a URL's own `full` string must reproduce the same host/port.
#[quickcheck]
fn reparsing_full_is_idempotent(host_chars: Vec<char>, port: u16) -> bool {
    let host: String = host_chars
        .into_iter()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    if host.is_empty() || port == 0 {
        return true; // not a meaningful input, skip
    }

    let input = format!("http://{host}:{port}/");
    let Ok(parsed) = url::parse(&input) else {
        return true;
    };
    let Ok(reparsed) = url::parse(&parsed.full) else {
        return false;
    };
    reparsed.host == parsed.host && reparsed.port == parsed.port
}

#[quickcheck]
fn any_path_with_traversal_segment_is_rejected(prefix: String, suffix: String) -> bool {
    let prefix: String = prefix.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    let suffix: String = suffix.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    let input = format!("http://example.com/{prefix}/../{suffix}");
    url::parse(&input).is_err()
}
