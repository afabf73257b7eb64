// src/utils/text.rs

//! Word tokenization for post bodies.

use std::collections::BTreeMap;

/// Escaped control sequences that show up literally in scraped text.
const ESCAPES: [&str; 3] = ["\\n", "\\t", "\\r"];

const PUNCTUATION: &str = "?/!-.,\":;'()[]{}<>\\|@#$%^&*_+=~`";

/// Count the words of a post body.
///
/// Text is lower-cased, whitespace tokens that look like links are dropped,
/// and punctuation is treated as a separator.
pub fn word_counts(content: &str) -> BTreeMap<String, usize> {
    let lowered = content.to_lowercase();
    let mut cleaned = lowered
        .split_whitespace()
        .filter(|word| !word.contains("https") && !word.contains(".com"))
        .collect::<Vec<_>>()
        .join(" ");

    for escape in ESCAPES {
        cleaned = cleaned.replace(escape, " ");
    }
    let cleaned: String = cleaned
        .chars()
        .map(|c| if PUNCTUATION.contains(c) { ' ' } else { c })
        .collect();

    let mut counts = BTreeMap::new();
    for word in cleaned.split_whitespace() {
        *counts.entry(word.to_string()).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_case_insensitively() {
        let counts = word_counts("The cat and THE hat");
        assert_eq!(counts.get("the"), Some(&2));
        assert_eq!(counts.values().sum::<usize>(), 5);
    }

    #[test]
    fn test_drops_links() {
        let counts = word_counts("see https://example.org and example.com/page now");
        assert_eq!(counts.keys().collect::<Vec<_>>(), vec!["and", "now", "see"]);
    }

    #[test]
    fn test_punctuation_splits_words() {
        let counts = word_counts("well-known (really), isn't it?");
        assert_eq!(counts.get("well"), Some(&1));
        assert_eq!(counts.get("known"), Some(&1));
        assert_eq!(counts.get("isn"), Some(&1));
        assert_eq!(counts.get("t"), Some(&1));
        assert!(!counts.contains_key("(really),"));
    }

    #[test]
    fn test_literal_escapes_are_separators() {
        let counts = word_counts("first\\nsecond\\tthird");
        assert_eq!(counts.len(), 3);
        assert!(counts.contains_key("second"));
    }

    #[test]
    fn test_empty_content() {
        assert!(word_counts("  ").is_empty());
    }
}
