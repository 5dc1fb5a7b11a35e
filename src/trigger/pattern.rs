

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

use crate::store::DocumentPath;


#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("Pattern is empty")]
    Empty,
    #[error("Pattern {0:?} must name documents (even number of segments)")]
    NotADocument(String),
    #[error("Malformed segment {0:?}")]
    MalformedSegment(String),
    #[error("Parameter {0:?} appears more than once")]
    DuplicateParam(String),
}


#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}


/// Document path template such as `projects/{projectId}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn parse(raw: &str) -> Result<Self, PatternError> {
        let trimmed = raw.trim_matches('/');
        if trimmed.is_empty() {
            return Err(PatternError::Empty);
        }

        let mut segments = Vec::new();
        let mut names: Vec<&str> = Vec::new();
        for part in trimmed.split('/') {
            let segment = match part.strip_prefix('{') {
                Some(rest) => {
                    let name = rest
                        .strip_suffix('}')
                        .filter(|name| !name.is_empty() && !name.contains(['{', '}']))
                        .ok_or_else(|| PatternError::MalformedSegment(part.to_string()))?;
                    if names.contains(&name) {
                        return Err(PatternError::DuplicateParam(name.to_string()));
                    }
                    names.push(name);
                    Segment::Param(name.to_string())
                }
                None if part.is_empty() || part.contains(['{', '}']) => {
                    return Err(PatternError::MalformedSegment(part.to_string()));
                }
                None => Segment::Literal(part.to_string()),
            };
            segments.push(segment);
        }

        if segments.len() % 2 != 0 {
            return Err(PatternError::NotADocument(raw.to_string()));
        }

        Ok(Self {
            raw: trimmed.to_string(),
            segments,
        })
    }

    /// Extracted parameters when `path` matches, `None` otherwise.
    pub fn captures(&self, path: &DocumentPath) -> Option<HashMap<String, String>> {
        if path.segments().len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (segment, value) in self.segments.iter().zip(path.segments()) {
            match segment {
                Segment::Literal(literal) if literal != value => return None,
                Segment::Literal(_) => {}
                Segment::Param(name) => {
                    params.insert(name.clone(), value.clone());
                }
            }
        }
        Some(params)
    }

    pub fn matches(&self, path: &DocumentPath) -> bool {
        self.captures(path).is_some()
    }

    /// Singular noun for the matched documents: `projects/{id}` gives `project`.
    pub fn subject(&self) -> String {
        let collection = self
            .segments
            .iter()
            .rev()
            .find_map(|segment| match segment {
                Segment::Literal(literal) => Some(literal.as_str()),
                Segment::Param(_) => None,
            })
            .unwrap_or("document");
        collection
            .strip_suffix('s')
            .filter(|s| !s.is_empty())
            .unwrap_or(collection)
            .to_string()
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_captures_params() {
        let pattern = PathPattern::parse("projects/{projectId}").unwrap();
        let params = pattern
            .captures(&DocumentPath::parse("projects/p1").unwrap())
            .unwrap();
        assert_eq!(params.get("projectId").map(String::as_str), Some("p1"));

        assert!(!pattern.matches(&DocumentPath::parse("users/u1").unwrap()));
        assert!(!pattern.matches(&DocumentPath::parse("projects/p1/tasks/t1").unwrap()));
    }

    #[test]
    fn test_nested_pattern() {
        let pattern = PathPattern::parse("orgs/{orgId}/projects/{projectId}").unwrap();
        let params = pattern
            .captures(&DocumentPath::parse("orgs/o1/projects/p9").unwrap())
            .unwrap();
        assert_eq!(params.len(), 2);
        assert_eq!(params["orgId"], "o1");
        assert_eq!(pattern.subject(), "project");
    }

    #[test]
    fn test_rejects_bad_patterns() {
        assert_eq!(PathPattern::parse(""), Err(PatternError::Empty));
        assert!(matches!(
            PathPattern::parse("projects"),
            Err(PatternError::NotADocument(_))
        ));
        assert!(matches!(
            PathPattern::parse("projects/{"),
            Err(PatternError::MalformedSegment(_))
        ));
        assert!(matches!(
            PathPattern::parse("a/{id}/b/{id}"),
            Err(PatternError::DuplicateParam(_))
        ));
    }
}
