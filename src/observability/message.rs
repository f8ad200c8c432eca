//! Log message record.

use std::fmt;

/// One diagnostic line queued for the logger.
///
/// Immutable once created; the timestamp is added by the logger at write time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogMessage {
    text: String,
}

impl LogMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

impl From<String> for LogMessage {
    fn from(text: String) -> Self {
        Self { text }
    }
}

impl From<&str> for LogMessage {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl fmt::Display for LogMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
