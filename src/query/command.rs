use crate::errors::DbError;
use bson::{Bson, Document, doc};
use std::fmt;
use std::str::FromStr;

/// The operation a forced query performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CommandKind {
    #[default]
    Read,
    Count,
    Exists,
    Insert,
    Update,
    FindAndModify,
    ModifyAndFind,
    Pull,
    Upsert,
    Remove,
    RemoveAll,
    Aggregate,
}

impl CommandKind {
    pub const ALL: [Self; 12] = [
        Self::Read,
        Self::Count,
        Self::Exists,
        Self::Insert,
        Self::Update,
        Self::FindAndModify,
        Self::ModifyAndFind,
        Self::Pull,
        Self::Upsert,
        Self::Remove,
        Self::RemoveAll,
        Self::Aggregate,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Count => "count",
            Self::Exists => "exists",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::FindAndModify => "findAndModify",
            Self::ModifyAndFind => "modifyAndFind",
            Self::Pull => "pull",
            Self::Upsert => "upsert",
            Self::Remove => "remove",
            Self::RemoveAll => "removeAll",
            Self::Aggregate => "aggregate",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandKind {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| DbError::UnknownCommand(s.to_string()))
    }
}

/// Frozen snapshot of a query's intent, handed to a store when the query is forced.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub kind: CommandKind,
    pub collection: Option<String>,
    pub filter: Document,
    /// `None` selects every field.
    pub projection: Option<Document>,
    /// `sort`, `limit`, `skip` and any store-specific flags.
    pub options: Document,
    /// Payload of mutating commands: document(s) to insert, change set, or pipeline.
    pub arg: Option<Bson>,
    /// Scalar mode: yield one value instead of a set.
    pub first: bool,
    pub default: Option<Bson>,
    /// Sticky build-time fault; a command carrying one is never executed.
    pub error: Option<DbError>,
}

impl Default for Command {
    fn default() -> Self {
        Self::with_options(doc! { "safe": true })
    }
}

impl Command {
    #[must_use]
    pub fn with_options(options: Document) -> Self {
        Self {
            kind: CommandKind::Read,
            collection: None,
            filter: Document::new(),
            projection: None,
            options,
            arg: None,
            first: false,
            default: None,
            error: None,
        }
    }

    /// # Errors
    /// Returns `DbError::Invalid` when no collection was set.
    pub fn collection_name(&self) -> Result<&str, DbError> {
        self.collection.as_deref().ok_or_else(|| {
            DbError::Invalid(format!(
                "no collection specified for `{}`; call `from` before forcing the query",
                self.kind
            ))
        })
    }

    #[must_use]
    pub fn limit(&self) -> Option<i64> {
        self.options.get("limit").and_then(as_i64)
    }

    #[must_use]
    pub fn skip(&self) -> Option<i64> {
        self.options.get("skip").and_then(as_i64)
    }

    #[must_use]
    pub fn sort(&self) -> Option<&Document> {
        self.options.get("sort").and_then(Bson::as_document)
    }
}

pub(crate) fn as_i64(v: &Bson) -> Option<i64> {
    match v {
        Bson::Int32(i) => Some(i64::from(*i)),
        Bson::Int64(i) => Some(*i),
        #[allow(clippy::cast_possible_truncation)]
        Bson::Double(f) if f.is_finite() => Some(*f as i64),
        _ => None,
    }
}
