//! Subscription path templates.
//!
//! Templates use `{name}` for a named segment and `*` for a wildcard. A
//! wildcard must be a whole segment: either the last one (`/path/*`) or one
//! between separators (`/path/*/more`).

use crate::error::{ConfigErrorKind, Error, Result};
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    path: String,
}

impl PathTemplate {
    /// Normalise `path` to start with `/` and validate it.
    pub fn parse(path: &str) -> Result<Self> {
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };

        validate(&path)?;
        Ok(Self { path })
    }

    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// The template in the router's own syntax: `{name}` becomes `:name`, a
    /// middle `*` matches exactly one segment and a final `*` matches the rest.
    pub fn to_route(&self) -> String {
        let segments: Vec<&str> = self.path.split('/').collect();
        let last = segments.len() - 1;

        segments
            .iter()
            .enumerate()
            .map(|(i, segment)| match param_name(segment) {
                Some(name) => format!(":{name}"),
                None if *segment == "*" && i == last => "*wildcard".to_string(),
                None if *segment == "*" => format!(":wildcard{i}"),
                None => segment.to_string(),
            })
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.path)
    }
}

fn validate(path: &str) -> Result<()> {
    let mut names = HashSet::new();
    for segment in path.split('/') {
        if let Some(name) = param_name(segment) {
            if name.is_empty() {
                return Err(Error::config(ConfigErrorKind::EmptyPathParam(path.to_string())));
            }
            if !names.insert(name) {
                return Err(Error::config(ConfigErrorKind::DuplicatePathParam(
                    path.to_string(),
                )));
            }
        } else if segment.contains('*') && segment.len() > 1 {
            return Err(Error::config(ConfigErrorKind::InvalidWildcard(path.to_string())));
        }
    }

    Ok(())
}

fn param_name(segment: &str) -> Option<&str> {
    segment.strip_prefix('{')?.strip_suffix('}')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn kind(path: &str) -> ErrorKind {
        PathTemplate::parse(path).unwrap_err().error_kind
    }

    #[test]
    fn test_parse_adds_leading_slash() {
        assert_eq!(PathTemplate::parse("events").unwrap().as_str(), "/events");
        assert_eq!(PathTemplate::parse("/events").unwrap().as_str(), "/events");
    }

    #[test]
    fn test_parse_accepts_params_and_whole_segment_wildcards() {
        assert!(PathTemplate::parse("/streams/{name}/events").is_ok());
        assert!(PathTemplate::parse("/path/*").is_ok());
        assert!(PathTemplate::parse("/path/*/anotherPath").is_ok());
    }

    #[test]
    fn test_parse_rejects_duplicate_params() {
        assert_eq!(
            kind("/a/{id}/b/{id}"),
            ErrorKind::Config(ConfigErrorKind::DuplicatePathParam("/a/{id}/b/{id}".to_string()))
        );
    }

    #[test]
    fn test_parse_rejects_wildcard_mixed_with_text() {
        assert_eq!(
            kind("/path/abc*"),
            ErrorKind::Config(ConfigErrorKind::InvalidWildcard("/path/abc*".to_string()))
        );
        assert!(matches!(
            kind("/*path/more"),
            ErrorKind::Config(ConfigErrorKind::InvalidWildcard(_))
        ));
    }

    #[test]
    fn test_parse_rejects_empty_param_name() {
        assert!(matches!(
            kind("/a/{}"),
            ErrorKind::Config(ConfigErrorKind::EmptyPathParam(_))
        ));
    }

    #[test]
    fn test_to_route() {
        let route = |p: &str| PathTemplate::parse(p).unwrap().to_route();

        assert_eq!(route("/events"), "/events");
        assert_eq!(route("/streams/{name}"), "/streams/:name");
        assert_eq!(route("/path/*"), "/path/*wildcard");
        assert_eq!(route("/path/*/more"), "/path/:wildcard2/more");
    }
}
