/// Keyword set
///
/// Ordered collection of unique wake-word identifiers the scorer is bound to.

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeywordError {
    #[error("wake_words must contain at least one keyword")]
    Empty,

    #[error("wake word at position {0} is blank")]
    Blank(usize),

    #[error("duplicate wake word: {0}")]
    Duplicate(String),
}

/// Validated, ordered, duplicate-free list of wake words
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct KeywordSet(Vec<String>);

impl KeywordSet {
    pub fn new<I, S>(words: I) -> Result<Self, KeywordError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut validated: Vec<String> = Vec::new();

        for (position, word) in words.into_iter().enumerate() {
            let word = word.into().trim().to_string();

            if word.is_empty() {
                return Err(KeywordError::Blank(position));
            }
            if validated.contains(&word) {
                return Err(KeywordError::Duplicate(word));
            }

            validated.push(word);
        }

        if validated.is_empty() {
            return Err(KeywordError::Empty);
        }

        Ok(Self(validated))
    }

    /// Parse a comma-separated list such as `hey_jarvis,alexa,computer`
    pub fn parse_list(list: &str) -> Result<Self, KeywordError> {
        Self::new(list.split(',').filter(|w| !w.trim().is_empty()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, word: &str) -> bool {
        self.0.iter().any(|w| w == word)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl Default for KeywordSet {
    fn default() -> Self {
        Self(
            ["hey_jarvis", "alexa", "computer"]
                .into_iter()
                .map(String::from)
                .collect(),
        )
    }
}
