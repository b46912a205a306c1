//! Action kinds a decision can name.
//!
//! The completion service speaks in free-form string tags. Known tags map onto a
//! closed set of variants so every consumer matches exhaustively; anything else is
//! carried verbatim in [`ActionKind::Unknown`] and rejected by the components that
//! cannot handle it.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Kind of work a single step performs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Analyze,
    Generate,
    Test,
    Refactor,
    AskHuman,
    /// Tag not recognized by this version, preserved as received.
    Unknown(String),
}

impl ActionKind {
    /// Map a wire tag onto a kind. Matching ignores case and surrounding whitespace.
    pub fn parse(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "analyze" => Self::Analyze,
            "generate" => Self::Generate,
            "test" => Self::Test,
            "refactor" => Self::Refactor,
            "ask_human" => Self::AskHuman,
            _ => Self::Unknown(tag.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Analyze => "analyze",
            Self::Generate => "generate",
            Self::Test => "test",
            Self::Refactor => "refactor",
            Self::AskHuman => "ask_human",
            Self::Unknown(tag) => tag,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ActionKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ActionKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(Self::parse(&tag))
    }
}
