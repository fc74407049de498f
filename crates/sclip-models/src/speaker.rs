//! Speaker key normalization.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Filesystem and URL safe token derived from a speaker name.
///
/// Spaces and path separators become `_`, parentheses are dropped.
/// Normalizing an already normalized key returns it unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpeakerKey(String);

impl SpeakerKey {
    /// Normalize a speaker name into a key.
    pub fn normalize(name: &str) -> Self {
        let key = name
            .chars()
            .filter_map(|c| match c {
                ' ' | '/' | '\\' => Some('_'),
                '(' | ')' => None,
                other => Some(other),
            })
            .collect();
        Self(key)
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SpeakerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
