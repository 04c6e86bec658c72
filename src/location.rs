use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque reading position issued by the render engine.
///
/// The core never looks inside a token: it is handed back to the engine and
/// to the position store verbatim. Engines speak either EPUB CFI strings or
/// plain ordinals, so both shapes are kept and serialized untagged (a JSON
/// string or a JSON integer).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocationToken {
    Ordinal(i64),
    Cfi(String),
}

impl LocationToken {
    /// The "start of document" sentinel used before anything was rendered.
    pub fn start() -> Self {
        LocationToken::Ordinal(0)
    }

    pub fn is_start(&self) -> bool {
        matches!(self, LocationToken::Ordinal(0))
    }

    pub fn cfi(value: impl Into<String>) -> Self {
        LocationToken::Cfi(value.into())
    }

    /// Rebuild a token from text that lost its type on the way (links,
    /// command lines): integers become ordinals, anything else stays opaque.
    pub fn from_external(value: &str) -> Self {
        match value.parse::<i64>() {
            Ok(n) => LocationToken::Ordinal(n),
            Err(_) => LocationToken::Cfi(value.to_string()),
        }
    }
}

impl Default for LocationToken {
    fn default() -> Self {
        Self::start()
    }
}

impl fmt::Display for LocationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocationToken::Ordinal(n) => write!(f, "{n}"),
            LocationToken::Cfi(s) => f.write_str(s),
        }
    }
}

impl From<&str> for LocationToken {
    fn from(value: &str) -> Self {
        LocationToken::Cfi(value.to_string())
    }
}

impl From<String> for LocationToken {
    fn from(value: String) -> Self {
        LocationToken::Cfi(value)
    }
}

impl From<i64> for LocationToken {
    fn from(value: i64) -> Self {
        LocationToken::Ordinal(value)
    }
}
