

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;


#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("Path is empty")]
    Empty,
    #[error("Path {0:?} contains an empty segment")]
    EmptySegment(String),
    #[error("Path {0:?} does not name a document (expected an even number of segments)")]
    NotADocument(String),
    #[error("Path {0:?} does not name a collection (expected an odd number of segments)")]
    NotACollection(String),
    #[error("Invalid identifier {0:?}")]
    InvalidId(String),
}

fn split_segments(raw: &str) -> Result<Vec<String>, PathError> {
    let trimmed = raw.trim_matches('/');
    if trimmed.is_empty() {
        return Err(PathError::Empty);
    }

    let segments: Vec<String> = trimmed.split('/').map(str::to_string).collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(PathError::EmptySegment(raw.to_string()));
    }
    Ok(segments)
}

fn check_id(id: &str) -> Result<(), PathError> {
    if id.is_empty() || id.contains('/') {
        return Err(PathError::InvalidId(id.to_string()));
    }
    Ok(())
}


/// Slash-separated path naming one document, e.g. `projects/p1`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentPath {
    segments: Vec<String>,
}

impl DocumentPath {
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        let segments = split_segments(raw)?;
        if segments.len() % 2 != 0 {
            return Err(PathError::NotADocument(raw.to_string()));
        }
        Ok(Self { segments })
    }


    pub fn id(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }


    pub fn parent(&self) -> CollectionPath {
        CollectionPath {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        }
    }


    pub fn collection(&self, collection_id: &str) -> Result<CollectionPath, PathError> {
        check_id(collection_id)?;
        let mut segments = self.segments.clone();
        segments.push(collection_id.to_string());
        Ok(CollectionPath { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn depth(&self) -> usize {
        self.segments.len() / 2
    }
}


/// Slash-separated path naming one collection, e.g. `projects/p1/tasks`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CollectionPath {
    segments: Vec<String>,
}

impl CollectionPath {
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        let segments = split_segments(raw)?;
        if segments.len() % 2 == 0 {
            return Err(PathError::NotACollection(raw.to_string()));
        }
        Ok(Self { segments })
    }


    pub fn id(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    /// Owning document, or `None` for a root collection.
    pub fn parent(&self) -> Option<DocumentPath> {
        if self.segments.len() < 2 {
            return None;
        }
        Some(DocumentPath {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }


    pub fn document(&self, document_id: &str) -> Result<DocumentPath, PathError> {
        check_id(document_id)?;
        let mut segments = self.segments.clone();
        segments.push(document_id.to_string());
        Ok(DocumentPath { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

impl FromStr for DocumentPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl FromStr for CollectionPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for DocumentPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DocumentPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

impl Serialize for CollectionPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CollectionPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
