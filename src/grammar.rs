//! Closed command vocabulary
//!
//! A [`CommandGrammar`] is the ordered set of phrases the recognizer is
//! constrained to, plus the sentinel token the engine returns when nothing
//! in the vocabulary matched. It is built once at startup and shared
//! read-only between every decode session.

use crate::{Error, Result};

/// Token the engine emits for out-of-vocabulary speech
pub const DEFAULT_SENTINEL: &str = "[unk]";

/// Directional controls for the paddle game deployment
pub const GAME_PHRASES: &[&str] = &["left", "right", "start", "stop", "exit"];

/// Categories, difficulties, answers and navigation for the quiz deployment
pub const QUIZ_PHRASES: &[&str] = &[
    "general knowledge",
    "history",
    "geography",
    "science",
    "random question",
    "easy",
    "medium",
    "hard",
    "a",
    "b",
    "c",
    "d",
    "start",
    "stop",
    "home",
];

/// Phrase list for a named preset
#[must_use]
pub fn preset(name: &str) -> Option<&'static [&'static str]> {
    match name.trim().to_lowercase().as_str() {
        "game" => Some(GAME_PHRASES),
        "quiz" => Some(QUIZ_PHRASES),
        _ => None,
    }
}

/// Immutable command vocabulary with a distinguished sentinel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandGrammar {
    /// Allowed phrases in configuration order; always ends with the sentinel
    /// unless the sentinel was listed explicitly
    phrases: Vec<String>,
    sentinel: String,
}

impl CommandGrammar {
    /// Build a grammar from an ordered phrase list
    ///
    /// Phrases are trimmed, internal whitespace is collapsed and duplicates
    /// are dropped keeping the first occurrence. The sentinel is appended if
    /// the list does not already contain it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if no non-blank phrase is given or the
    /// sentinel is blank
    pub fn build<I, S>(phrases: I, sentinel: &str) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let sentinel = collapse_whitespace(sentinel);
        if sentinel.is_empty() {
            return Err(Error::Config("grammar sentinel must not be blank".to_string()));
        }

        let mut normalized: Vec<String> = Vec::new();
        for phrase in phrases {
            let phrase = collapse_whitespace(phrase.as_ref());
            if !phrase.is_empty() && !normalized.contains(&phrase) {
                normalized.push(phrase);
            }
        }

        if normalized.is_empty() {
            return Err(Error::Config("grammar must contain at least one phrase".to_string()));
        }

        if !normalized.contains(&sentinel) {
            normalized.push(sentinel.clone());
        }

        tracing::debug!(phrases = ?normalized, sentinel = %sentinel, "command grammar built");

        Ok(Self {
            phrases: normalized,
            sentinel,
        })
    }

    /// Build a grammar from a named preset using the default sentinel
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an unknown preset name
    pub fn from_preset(name: &str) -> Result<Self> {
        let phrases = preset(name)
            .ok_or_else(|| Error::Config(format!("unknown grammar preset: {name}")))?;
        Self::build(phrases, DEFAULT_SENTINEL)
    }

    /// Whether `text` is a member of the vocabulary (sentinel included)
    #[must_use]
    pub fn is_known(&self, text: &str) -> bool {
        !text.is_empty() && self.phrases.iter().any(|p| p == text)
    }

    /// The "unrecognized" token
    #[must_use]
    pub fn sentinel(&self) -> &str {
        &self.sentinel
    }

    /// Every phrase including the sentinel
    #[must_use]
    pub fn phrases(&self) -> &[String] {
        &self.phrases
    }

    /// Phrases that may be emitted as commands (sentinel excluded)
    pub fn commands(&self) -> impl Iterator<Item = &str> {
        self.phrases
            .iter()
            .map(String::as_str)
            .filter(move |p| *p != self.sentinel)
    }

    /// JSON array form consumed by grammar-constrained recognizers
    #[must_use]
    pub fn to_engine_json(&self) -> String {
        // A Vec<String> always serializes
        serde_json::to_string(&self.phrases).unwrap_or_else(|_| "[]".to_string())
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_grammar_is_rejected() {
        let err = CommandGrammar::build(Vec::<String>::new(), DEFAULT_SENTINEL).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = CommandGrammar::build(["  ", ""], DEFAULT_SENTINEL).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn sentinel_is_appended_once() {
        let grammar = CommandGrammar::build(["left", "right"], DEFAULT_SENTINEL).unwrap();
        assert_eq!(grammar.phrases(), &["left", "right", "[unk]"]);

        let grammar = CommandGrammar::build(["left", "[unk]", "right"], DEFAULT_SENTINEL).unwrap();
        assert_eq!(grammar.phrases(), &["left", "[unk]", "right"]);
    }

    #[test]
    fn sentinel_known_empty_unknown() {
        let grammar = CommandGrammar::from_preset("game").unwrap();
        assert!(grammar.is_known(grammar.sentinel()));
        assert!(!grammar.is_known(""));
        assert!(grammar.is_known("left"));
        assert!(!grammar.is_known("jump"));
    }

    #[test]
    fn phrases_are_normalized_and_deduplicated() {
        let phrases = ["  general   knowledge ", "history", "history"];
        let grammar = CommandGrammar::build(phrases, "[unk]").unwrap();
        assert_eq!(grammar.phrases(), &["general knowledge", "history", "[unk]"]);
        assert!(grammar.is_known("general knowledge"));
    }

    #[test]
    fn commands_exclude_sentinel() {
        let grammar = CommandGrammar::build(["a", "b"], "[unk]").unwrap();
        let commands: Vec<&str> = grammar.commands().collect();
        assert_eq!(commands, vec!["a", "b"]);
    }

    #[test]
    fn engine_json_lists_all_phrases() {
        let grammar = CommandGrammar::build(["left", "right"], "[unk]").unwrap();
        assert_eq!(grammar.to_engine_json(), r#"["left","right","[unk]"]"#);
    }

    #[test]
    fn presets_resolve() {
        assert!(preset("Quiz").is_some());
        assert!(preset("unknown").is_none());
        assert!(CommandGrammar::from_preset("nope").is_err());

        let quiz = CommandGrammar::from_preset("quiz").unwrap();
        assert_eq!(quiz.commands().count(), QUIZ_PHRASES.len());
    }
}
