// src/relevance.rs
//! Authoritative topical filter. Pure substring matching over title + body,
//! case-insensitive. No tokenization: "rape" matches inside "therapeutic".

use crate::source::types::Item;

/// True iff any keyword occurs in the lower-cased `title + " " + body`.
/// An empty keyword list matches nothing.
pub fn keep(item: &Item, keywords: &[String]) -> bool {
    let haystack = format!("{} {}", item.title, item.body).to_lowercase();
    keywords
        .iter()
        .map(|k| k.to_lowercase())
        .filter(|k| !k.is_empty())
        .any(|k| haystack.contains(&k))
}

/// Keywords that hit, in configured order. Used for debug logging only.
pub fn matched_keywords<'a>(item: &Item, keywords: &'a [String]) -> Vec<&'a str> {
    let haystack = format!("{} {}", item.title, item.body).to_lowercase();
    keywords
        .iter()
        .filter(|k| !k.is_empty() && haystack.contains(&k.to_lowercase()))
        .map(String::as_str)
        .collect()
}
