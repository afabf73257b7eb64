// src/utils/url.rs

//! URL manipulation utilities.

/// Characters replaced by `-` in cache file names, besides `/`.
const UNSAFE: &[char] = &['?', '&', '=', ':', '#', '%', '*', '"', '<', '>', '|', '\\', ' '];

/// Map a page URL to its cache file name.
///
/// The scheme is dropped, path separators become `_`, and query and other
/// filesystem-hostile characters become `-`. Distinct URLs can map to the
/// same name (`a/b` and `a_b`); that is accepted.
///
/// # Examples
/// ```
/// use forumgraph::utils::url::cache_key;
///
/// assert_eq!(
///     cache_key("https://forum.test/forum/general/?page=2"),
///     "forum.test_forum_general_-page-2.html"
/// );
/// ```
pub fn cache_key(url: &str) -> String {
    let without_scheme = match url.find("://") {
        Some(idx) => &url[idx + 3..],
        None => url,
    };

    let mut key: String = without_scheme
        .chars()
        .map(|c| match c {
            '/' => '_',
            c if UNSAFE.contains(&c) || c.is_control() => '-',
            c => c,
        })
        .collect();
    key.push_str(".html");
    key
}

/// Drop the fragment of an absolute URL so `#post-12` anchors don't
/// look like new pages.
pub fn strip_fragment(url: &str) -> &str {
    match url.find('#') {
        Some(idx) => &url[..idx],
        None => url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_strips_scheme() {
        assert_eq!(cache_key("https://forum.test/a"), "forum.test_a.html");
        assert_eq!(cache_key("http://forum.test/a"), "forum.test_a.html");
    }

    #[test]
    fn test_cache_key_query() {
        assert_eq!(
            cache_key("https://forum.test/t/?page=3&sort=asc"),
            "forum.test_t_-page-3-sort-asc.html"
        );
    }

    #[test]
    fn test_cache_key_port() {
        assert_eq!(cache_key("http://127.0.0.1:8080/x"), "127.0.0.1-8080_x.html");
    }

    #[test]
    fn test_cache_key_is_deterministic() {
        let url = "https://forum.test/forum/general/page/2/";
        assert_eq!(cache_key(url), cache_key(url));
    }

    #[test]
    fn test_strip_fragment() {
        assert_eq!(
            strip_fragment("https://forum.test/t/#post-12"),
            "https://forum.test/t/"
        );
        assert_eq!(strip_fragment("https://forum.test/t/"), "https://forum.test/t/");
    }
}
