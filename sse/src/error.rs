//! Error types for the `sse` crate.
//!
//! Follows the same pattern as the other layers: a root `Error` struct holding
//! an optional source for chaining and a tree of error kind enums.

use std::error::Error as StdError;
use std::fmt;

pub type Result<T> = core::result::Result<T, Error>;

/// Top-level error type for the sse crate.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

/// Major categories of errors in the sse crate.
#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    Config(ConfigErrorKind),
    Store(StoreErrorKind),
    Lifecycle(LifecycleErrorKind),
}

/// Errors detected while validating publisher configuration. Always fatal at
/// initialisation.
#[derive(Debug, PartialEq)]
pub enum ConfigErrorKind {
    /// The same `{name}` segment appears more than once in the path.
    DuplicatePathParam(String),
    /// A `{}` segment without a name.
    EmptyPathParam(String),
    /// A `*` is combined with other characters inside one path segment.
    InvalidWildcard(String),
    /// The route is already registered by another handler.
    DuplicateRoute(String),
}

/// Errors from the durable event store.
#[derive(Debug, PartialEq)]
pub enum StoreErrorKind {
    Io,
    Serialization,
    /// The store's key space cannot hold another id.
    Exhausted,
}

/// Errors from illegal lifecycle transitions.
#[derive(Debug, PartialEq)]
pub enum LifecycleErrorKind {
    NotInitialized,
    NotStarted,
    InvalidTransition { from: String, to: String },
}

impl Error {
    pub fn new(error_kind: ErrorKind) -> Self {
        Self {
            source: None,
            error_kind,
        }
    }

    pub fn with_source(
        error_kind: ErrorKind,
        source: impl Into<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        Self {
            source: Some(source.into()),
            error_kind,
        }
    }

    pub fn config(kind: ConfigErrorKind) -> Self {
        Self::new(ErrorKind::Config(kind))
    }

    pub fn lifecycle(kind: LifecycleErrorKind) -> Self {
        Self::new(ErrorKind::Lifecycle(kind))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.error_kind {
            ErrorKind::Config(ConfigErrorKind::DuplicatePathParam(path)) => {
                write!(f, "Path {path} contains duplicated uri param names")
            }
            ErrorKind::Config(ConfigErrorKind::EmptyPathParam(path)) => {
                write!(f, "Path {path} contains an unnamed uri param")
            }
            ErrorKind::Config(ConfigErrorKind::InvalidWildcard(path)) => write!(
                f,
                "Path {path} contains an invalid use of a wildcard. Wildcards can only be used \
                 at the end of the path (i.e.: /path/*) or between / characters \
                 (i.e.: /path/*/anotherPath)"
            ),
            ErrorKind::Config(ConfigErrorKind::DuplicateRoute(path)) => {
                write!(f, "A handler is already registered for path {path}")
            }
            ErrorKind::Store(kind) => match &self.source {
                Some(source) => write!(f, "Event store error ({kind:?}): {source}"),
                None => write!(f, "Event store error ({kind:?})"),
            },
            ErrorKind::Lifecycle(kind) => write!(f, "Lifecycle error: {kind:?}"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<sled::Error> for Error {
    fn from(err: sled::Error) -> Self {
        Error::with_source(ErrorKind::Store(StoreErrorKind::Io), err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::with_source(ErrorKind::Store(StoreErrorKind::Serialization), err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display_names_the_path() {
        let err = Error::config(ConfigErrorKind::DuplicatePathParam("/a/{x}/{x}".to_string()));
        assert!(err.to_string().contains("/a/{x}/{x}"));
    }

    #[test]
    fn test_serde_error_maps_to_serialization_kind() {
        let serde_err = serde_json::from_str::<u32>("nope").unwrap_err();
        let err: Error = serde_err.into();
        assert_eq!(
            err.error_kind,
            ErrorKind::Store(StoreErrorKind::Serialization)
        );
        assert!(StdError::source(&err).is_some());
    }
}
