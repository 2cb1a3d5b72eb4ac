// converters/src/name_splitter.rs
//! Name-splitting capability.
//!
//! The real heuristic (titles, suffixes, multi-part surnames, nicknames)
//! lives outside this workspace; the questionnaire reconciler only needs
//! the split result, injected through this trait. A minimal whitespace
//! splitter is provided so the converters are usable without it.

use once_cell::sync::Lazy;
use regex::Regex;

/// Result of splitting a display name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitName {
    pub first: Vec<String>,
    pub surname: Option<String>,
    pub maiden: Option<String>,
    pub nickname: Option<String>,
    pub title: Option<String>,
    pub suffix: Option<String>,
}

impl SplitName {
    pub fn first_joined(&self) -> Option<String> {
        if self.first.is_empty() {
            None
        } else {
            Some(self.first.join(" "))
        }
    }
}

pub trait NameSplitter {
    fn split(&self, text: &str) -> SplitName;
}

// "First [Middle ...] Last (Maiden)": everything but the last word is the
// first name; a trailing parenthesised word is the last name at birth.
static DISPLAY_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*?)( ([^ (]*)) ?(\(([^)]*)\))?$").unwrap());

/// Splits on whitespace, treating a trailing parenthesised word as the
/// maiden name. Good enough for fixtures and defaults; real deployments
/// inject their own heuristic.
#[derive(Debug, Default, Clone, Copy)]
pub struct WhitespaceNameSplitter;

impl NameSplitter for WhitespaceNameSplitter {
    fn split(&self, text: &str) -> SplitName {
        let mut result = SplitName::default();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return result;
        }
        match DISPLAY_NAME.captures(trimmed) {
            None => {
                result.first = vec![trimmed.to_string()];
            }
            Some(caps) => {
                let first = caps.get(1).map_or("", |m| m.as_str()).trim();
                if !first.is_empty() {
                    result.first = first.split_whitespace().map(str::to_string).collect();
                }
                result.surname = caps.get(3).map(|m| m.as_str().to_string()).filter(|s| !s.is_empty());
                result.maiden = caps.get(5).map(|m| m.as_str().to_string()).filter(|s| !s.is_empty());
            }
        }
        result
    }
}

/// Splits a FHIR display name with the same grammar, returning
/// (first, last, last-at-birth); a single word is all first name.
pub fn split_display_name(text: &str) -> (Option<String>, Option<String>, Option<String>) {
    match DISPLAY_NAME.captures(text) {
        None => (Some(text.to_string()), None, None),
        Some(caps) => {
            let first = caps
                .get(1)
                .map(|m| m.as_str().to_string())
                .filter(|s| !s.is_empty());
            let last = caps
                .get(3)
                .map(|m| m.as_str().to_string())
                .filter(|s| !s.is_empty());
            let maiden = caps
                .get(5)
                .map(|m| m.as_str().to_string())
                .filter(|s| !s.is_empty());
            (first, last, maiden)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_split_first_last_and_maiden() {
        let split = WhitespaceNameSplitter.split("Jane Ann Doe (Smith)");
        assert_eq!(split.first, vec!["Jane", "Ann"]);
        assert_eq!(split.surname.as_deref(), Some("Doe"));
        assert_eq!(split.maiden.as_deref(), Some("Smith"));
    }

    #[test]
    fn single_word_is_a_first_name() {
        let (first, last, maiden) = split_display_name("Madonna");
        assert_eq!(first.as_deref(), Some("Madonna"));
        assert!(last.is_none() && maiden.is_none());
    }

    #[test]
    fn should_split_two_word_display_names() {
        let (first, last, maiden) = split_display_name("John Smith");
        assert_eq!(first.as_deref(), Some("John"));
        assert_eq!(last.as_deref(), Some("Smith"));
        assert!(maiden.is_none());
    }
}
