//! Tag definitions - free-form labels used for multi-key node lookup.

use serde::{Deserialize, Serialize};

/// A label attached to a node.
///
/// Tags may be hierarchical using `.` as a separator (`zone.forest.clearing`).
/// Exact lookups use the whole string; [`Tag::matches`] also accepts ancestors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(String);

impl Tag {
    pub fn new(name: impl Into<String>) -> Self {
        Tag(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The parent tag, if this tag is hierarchical.
    pub fn parent(&self) -> Option<Tag> {
        self.0.rsplit_once('.').map(|(parent, _)| Tag::new(parent))
    }

    /// Check if this tag equals `other` or is nested below it.
    pub fn matches(&self, other: &Tag) -> bool {
        self.0 == other.0
            || (self.0.len() > other.0.len()
                && self.0.starts_with(other.0.as_str())
                && self.0.as_bytes()[other.0.len()] == b'.')
    }
}

impl From<&str> for Tag {
    fn from(name: &str) -> Self {
        Tag::new(name)
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
