//! Data paths
//!
//! Every validation error, conversion note and merge error carries the path of
//! the offending value, as an ordered list of dict keys and list indexes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One step into a document: a dict key or a list index
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => write!(f, "{}", key),
            Self::Index(index) => write!(f, "[{}]", index),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        Self::Key(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        Self::Key(key)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

/// Path from the document root to a value
///
/// Serializes as a plain JSON array, e.g. `["vlans", 0, "id"]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataPath(Vec<PathSegment>);

impl DataPath {
    /// The empty path (document root)
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A new path one step below this one
    pub fn join(&self, segment: impl Into<PathSegment>) -> Self {
        let mut segments = Vec::with_capacity(self.0.len() + 1);
        segments.extend(self.0.iter().cloned());
        segments.push(segment.into());
        Self(segments)
    }

    pub fn push(&mut self, segment: impl Into<PathSegment>) {
        self.0.push(segment.into());
    }

    pub fn pop(&mut self) -> Option<PathSegment> {
        self.0.pop()
    }

    /// Append all segments of `other` below this path
    pub fn extend(&self, other: &DataPath) -> Self {
        let mut segments = self.0.clone();
        segments.extend(other.0.iter().cloned());
        Self(segments)
    }
}

impl fmt::Display for DataPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "<root>");
        }
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Key(key) if i == 0 => write!(f, "{}", key)?,
                PathSegment::Key(key) => write!(f, ".{}", key)?,
                PathSegment::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}

impl<S: Into<PathSegment>> FromIterator<S> for DataPath {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl From<Vec<PathSegment>> for DataPath {
    fn from(segments: Vec<PathSegment>) -> Self {
        Self(segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_display() {
        let path = DataPath::root().join("vlans").join(0).join("id");
        assert_eq!(path.to_string(), "vlans[0].id");
        assert_eq!(DataPath::root().to_string(), "<root>");
    }

    #[test]
    fn test_serializes_as_array() {
        let path: DataPath = vec![PathSegment::from("vlans"), 3.into()].into();
        assert_eq!(serde_json::to_value(&path).unwrap(), json!(["vlans", 3]));
    }

    #[test]
    fn test_join_leaves_parent_untouched() {
        let parent = DataPath::root().join("a");
        let child = parent.join("b");
        assert_eq!(parent.len(), 1);
        assert_eq!(child.len(), 2);
    }
}
