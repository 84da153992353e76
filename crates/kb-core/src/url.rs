//! URL slicing utilities
//!
//! These functions avoid allocations and work directly on string slices. They
//! are used to derive context-menu keywords ("block single page" and "block
//! entire domain") and to recognise the blocked-notice page.

// =============================================================================
// Scheme
// =============================================================================

/// Get the position after "://".
#[inline]
pub fn get_scheme_end(url: &str) -> Option<usize> {
    let bytes = url.as_bytes();

    let colon_pos = bytes.iter().position(|&b| b == b':')?;
    if colon_pos == 0 || !bytes[..colon_pos].iter().all(is_scheme_char) {
        return None;
    }

    if bytes.len() > colon_pos + 2
        && bytes[colon_pos + 1] == b'/'
        && bytes[colon_pos + 2] == b'/'
    {
        return Some(colon_pos + 3);
    }

    None
}

#[inline]
fn is_scheme_char(b: &u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'+' | b'-' | b'.')
}

// =============================================================================
// Host Extraction
// =============================================================================

/// Get the start and end positions of the hostname in a URL.
#[inline]
pub fn get_host_position(url: &str) -> Option<(usize, usize)> {
    let scheme_end = get_scheme_end(url)?;
    let bytes = url.as_bytes();

    // Skip userinfo
    let mut host_start = scheme_end;
    for i in scheme_end..bytes.len() {
        match bytes[i] {
            b'@' => {
                host_start = i + 1;
                break;
            }
            b'/' | b'?' | b'#' => break,
            _ => {}
        }
    }

    // Bracketed IPv6 literal; colons inside belong to the host
    if bytes.get(host_start) == Some(&b'[') {
        let close = bytes[host_start..].iter().position(|&b| b == b']')?;
        return Some((host_start, host_start + close + 1));
    }

    let mut host_end = bytes.len();
    for i in host_start..bytes.len() {
        let b = bytes[i];
        if b == b'/' || b == b'?' || b == b'#' || b == b':' {
            host_end = i;
            break;
        }
    }

    Some((host_start, host_end))
}

/// Host extraction without allocations.
/// Returns a slice into the original URL.
#[inline]
pub fn extract_host(url: &str) -> Option<&str> {
    let (host_start, host_end) = get_host_position(url)?;
    Some(&url[host_start..host_end])
}

// =============================================================================
// Path Extraction
// =============================================================================

/// Extract the path portion of a URL (no query, no fragment).
#[inline]
pub fn extract_path(url: &str) -> &str {
    let (_, host_end) = match get_host_position(url) {
        Some(pos) => pos,
        None => return "/",
    };

    let bytes = url.as_bytes();

    // Skip a port, if any
    let mut path_start = None;
    for (i, &b) in bytes[host_end..].iter().enumerate() {
        if b == b'/' {
            path_start = Some(host_end + i);
            break;
        }
        if b == b'?' || b == b'#' {
            return "/";
        }
    }

    let path_start = match path_start {
        Some(pos) => pos,
        None => return "/",
    };

    let mut path_end = bytes.len();
    for (i, &b) in bytes[path_start..].iter().enumerate() {
        if b == b'?' || b == b'#' {
            path_end = path_start + i;
            break;
        }
    }

    &url[path_start..path_end]
}

// =============================================================================
// Context-Menu Keywords
// =============================================================================

/// Keyword blocking one page: lowercased host followed by the path, with the
/// query string and fragment dropped.
pub fn page_keyword(url: &str) -> Option<String> {
    let host = extract_host(url.trim()).filter(|h| !h.is_empty())?;
    let path = extract_path(url.trim());
    let mut keyword = host.to_ascii_lowercase();
    keyword.push_str(path);
    Some(keyword)
}

/// Keyword blocking a whole domain: the lowercased host.
pub fn domain_keyword(url: &str) -> Option<String> {
    extract_host(url.trim())
        .filter(|h| !h.is_empty())
        .map(|h| h.to_ascii_lowercase())
}
