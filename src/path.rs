//! Document paths into the deserialized workflow

use std::fmt;

use serde_yaml::Value;

/// One step of a [`PropertyPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// A mapping key
    Key(String),
    /// A sequence index
    Index(usize),
}

/// Location of a node in the document, from the root down.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PropertyPath(Vec<PathSegment>);

impl PropertyPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn with_key(&self, key: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Key(key.into()));
        Self(segments)
    }

    pub fn with_index(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Index(index));
        Self(segments)
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Key at position `i`, if that segment is a key.
    pub fn key(&self, i: usize) -> Option<&str> {
        match self.0.get(i) {
            Some(PathSegment::Key(key)) => Some(key),
            _ => None,
        }
    }

    /// Index at position `i`, if that segment is a sequence index.
    pub fn index(&self, i: usize) -> Option<usize> {
        match self.0.get(i) {
            Some(PathSegment::Index(index)) => Some(*index),
            _ => None,
        }
    }
}

impl From<Vec<PathSegment>> for PropertyPath {
    fn from(segments: Vec<PathSegment>) -> Self {
        Self(segments)
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$")?;
        for segment in &self.0 {
            match segment {
                PathSegment::Key(key) => write!(f, ".{}", key)?,
                PathSegment::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}

/// Walk `path` through `value`. Stops early at the first segment that does
/// not exist.
pub fn iterate_path<'v>(path: &[PathSegment], value: &'v Value) -> Option<&'v Value> {
    let mut current = value;
    for segment in path {
        current = match segment {
            PathSegment::Key(key) => current.get(key.as_str())?,
            PathSegment::Index(index) => current.get(*index)?,
        };
    }
    Some(current)
}
