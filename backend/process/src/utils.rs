use std::{collections::HashSet, sync::LazyLock};

use regex::Regex;

static SEPARATORS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\s_]+").expect("valid separator pattern"));
static UNSAFE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\p{L}\p{N}-]").expect("valid unsafe pattern"));
static DASHES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-{2,}").expect("valid dash pattern"));

/// Lower-case slug: separators become dashes, anything that is not a letter,
/// digit or dash is dropped.
pub fn slug(input: &str) -> String {
    let s = SEPARATORS.replace_all(input.trim(), "-");
    let s = UNSAFE.replace_all(&s, "");
    let s = DASHES.replace_all(&s, "-");

    s.trim_matches('-').to_lowercase()
}

/// Slugs every id, dropping empties and keeping the first of any repeats.
pub fn slug_all(ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();

    ids.iter()
        .map(|id| slug(id))
        .filter(|id| !id.is_empty() && seen.insert(id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic() {
        assert_eq!(slug("hello_world"), "hello-world");
        assert_eq!(slug("Kimchi Stew"), "kimchi-stew");
        assert_eq!(slug("clean-this_text!"), "clean-this-text");
    }

    #[test]
    fn test_leading_trailing_spaces() {
        assert_eq!(slug("   hello   "), "hello");
        assert_eq!(slug("  multiple   spaces  "), "multiple-spaces");
    }

    #[test]
    fn test_special_characters() {
        assert_eq!(slug("!@#$%^&*()"), "");
        assert_eq!(slug("abc123!@#"), "abc123");
    }

    #[test]
    fn test_underscores_and_dashes() {
        assert_eq!(slug("hello_world--test"), "hello-world-test");
        assert_eq!(slug("_start_end_"), "start-end");
    }

    #[test]
    fn test_hangul_is_kept() {
        assert_eq!(slug("김치 찌개"), "김치-찌개");
    }

    #[test]
    fn test_empty_string() {
        assert_eq!(slug(""), "");
        assert_eq!(slug("     "), "");
    }

    #[test]
    fn test_slug_all_dedupes() {
        let ids = vec!["Korean".to_string(), "korean".to_string(), "!!".to_string(), "Dinner".to_string()];

        assert_eq!(slug_all(&ids), vec!["korean", "dinner"]);
    }
}
