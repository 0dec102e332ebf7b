// src/analyze/domain.rs
use once_cell::sync::Lazy;
use regex::Regex;

/// Host segment between `//` and the next `/` or `?`.
///
/// The class is ASCII letters, digits, `.` and `-`, so the match stops at the first
/// other byte: a port, userinfo (`user@host` yields `user`) or a non-ASCII label
/// (`bücher.de` yields `b`).
static RE_DOMAIN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"//([A-Za-z0-9.-]+)[/?]?").expect("domain regex"));

/// Extract the domain from an expanded URL. `None` when no host segment is found,
/// which callers treat as "count the link, skip the domain".
pub fn extract_domain(url: &str) -> Option<&str> {
    RE_DOMAIN
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_is_extracted() {
        assert_eq!(
            extract_domain("https://example.com/path?x=1"),
            Some("example.com")
        );
        assert_eq!(extract_domain("http://sub.example.org?q=1"), Some("sub.example.org"));
        assert_eq!(extract_domain("https://news.ycombinator.com"), Some("news.ycombinator.com"));
    }

    #[test]
    fn missing_host_yields_none() {
        assert_eq!(extract_domain("mailto:someone"), None);
        assert_eq!(extract_domain("https://"), None);
        assert_eq!(extract_domain("https:///?"), None);
        assert_eq!(extract_domain(""), None);
    }

    #[test]
    fn match_stops_at_first_byte_outside_ascii_host_class() {
        assert_eq!(extract_domain("https://bücher.de/"), Some("b"));
        assert_eq!(extract_domain("https://user@host.example/"), Some("user"));
    }

    #[test]
    fn port_is_not_part_of_domain() {
        assert_eq!(extract_domain("http://localhost:8080/x"), Some("localhost"));
    }
}
