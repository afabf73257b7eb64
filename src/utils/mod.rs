//! Utility functions and helpers.

pub mod http;
pub mod log;
pub mod text;
pub mod url;

use ::url::Url;

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_url() {
        let base = Url::parse("https://forum.test/forum/general/").unwrap();
        assert_eq!(
            resolve_url(&base, "page/2/"),
            "https://forum.test/forum/general/page/2/"
        );
        assert_eq!(
            resolve_url(&base, "/forum/other/"),
            "https://forum.test/forum/other/"
        );
        assert_eq!(
            resolve_url(&base, "https://other.test/x"),
            "https://other.test/x"
        );
    }
}
