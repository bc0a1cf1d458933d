//! Search-term extraction.
//!
//! Turns a free-text query into the ordered list of terms handed to the
//! host search service:
//!
//! 1. Double-quoted phrases are taken first, each as one trimmed term.
//! 2. Every Han character becomes its own word (`北京` → `北`, `京`).
//! 3. The remaining whitespace-separated words follow in query order.
//!
//! Han splitting stands in for real word segmentation, which the host
//! does not provide.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

static QUOTED_PHRASE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"]+)""#).expect("quoted phrase pattern"));

static HAN_CHAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\p{Han}").expect("han pattern"));

/// Extracts search terms from `query`, preserving their order of discovery.
///
/// A quoted phrase removes every identical quoted occurrence from the query.
/// A word that repeats exactly is only taken once. Phrases that are blank
/// once trimmed are dropped.
pub fn extract_search_terms(query: &str) -> Vec<String> {
    let mut terms = Vec::new();
    let mut rest = query.to_string();

    while let Some(caps) = QUOTED_PHRASE.captures(&rest) {
        let quoted = caps[0].to_string();
        let phrase = caps[1].trim();
        if !phrase.is_empty() {
            terms.push(phrase.to_string());
        }
        rest = rest.replace(&quoted, "");
    }

    let rest = HAN_CHAR.replace_all(&rest, "$0 ");

    let mut seen = HashSet::new();
    for word in rest.split_whitespace() {
        if seen.insert(word) {
            terms.push(word.to_string());
        }
    }

    terms
}
