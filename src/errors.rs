use thiserror::Error;

/// Every failure a query can surface.
///
/// Variants carry rendered messages rather than source errors so the type stays `Clone`:
/// a build-time fault is stored on the query and copied into each forced command, and
/// a failed connection is shared by every command waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DbError {
    /// Invalid argument captured while chaining (bad `by_ids` input, bad pipeline, unknown command name).
    #[error("Invalid argument: {0}")]
    Build(String),

    /// Guard-rail violation at execution time.
    #[error("Invalid: {0}")]
    Invalid(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Assertion failure: {0}")]
    AssertionFailure(String),

    /// Fault raised by the underlying store, passed through as-is.
    #[error("Store error: {0}")]
    Store(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("BSON: {0}")]
    Bson(String),

    /// A typed `Outcome` accessor was used on an outcome of a different shape.
    #[error("Unexpected result shape: {0}")]
    Shape(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<bson::error::Error> for DbError {
    fn from(e: bson::error::Error) -> Self {
        Self::Bson(e.to_string())
    }
}

impl From<std::io::Error> for DbError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<toml::de::Error> for DbError {
    fn from(e: toml::de::Error) -> Self {
        Self::Config(e.to_string())
    }
}

impl From<tokio::task::JoinError> for DbError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Store(format!("command task failed: {e}"))
    }
}
