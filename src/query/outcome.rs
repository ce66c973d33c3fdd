use crate::errors::DbError;
use crate::types::{DeleteReport, InsertReport, UpdateReport};
use bson::{Bson, Document};

/// Result of a forced query. The variant follows from the command that ran.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// `read` and `aggregate`.
    Many(Vec<Document>),
    /// Scalar `read`: the first match, or the registered default.
    One(Bson),
    /// `findAndModify`, `modifyAndFind` and `pull`.
    Found(Option<Document>),
    Count(u64),
    Exists(bool),
    Inserted(InsertReport),
    Updated(UpdateReport),
    Removed(DeleteReport),
}

impl Outcome {
    /// Size of the result, as checked by `Query::expect`.
    #[must_use]
    pub fn quantity(&self) -> u64 {
        match self {
            Self::Many(docs) => docs.len() as u64,
            Self::One(_) => 1,
            Self::Found(doc) => u64::from(doc.is_some()),
            Self::Count(n) => *n,
            Self::Exists(b) => u64::from(*b),
            Self::Inserted(r) => r.inserted_ids.len() as u64,
            Self::Updated(r) => r.matched,
            Self::Removed(r) => r.deleted,
        }
    }

    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Many(_) => "many",
            Self::One(_) => "one",
            Self::Found(_) => "found",
            Self::Count(_) => "count",
            Self::Exists(_) => "exists",
            Self::Inserted(_) => "inserted",
            Self::Updated(_) => "updated",
            Self::Removed(_) => "removed",
        }
    }

    fn shape_error(&self, wanted: &str) -> DbError {
        DbError::Shape(format!("wanted {wanted}, got {}", self.kind_name()))
    }

    /// # Errors
    /// `DbError::Shape` unless this is `Many`.
    pub fn into_documents(self) -> Result<Vec<Document>, DbError> {
        match self {
            Self::Many(docs) => Ok(docs),
            other => Err(other.shape_error("many")),
        }
    }

    /// # Errors
    /// `DbError::Shape` unless this is `One`.
    pub fn into_one(self) -> Result<Bson, DbError> {
        match self {
            Self::One(v) => Ok(v),
            other => Err(other.shape_error("one")),
        }
    }

    /// A single document from either a scalar read or the find-and-modify family.
    ///
    /// # Errors
    /// `DbError::Shape` when the outcome holds no document slot, or a scalar default that is not a document.
    pub fn into_document(self) -> Result<Option<Document>, DbError> {
        match self {
            Self::One(Bson::Document(d)) => Ok(Some(d)),
            Self::One(Bson::Null) => Ok(None),
            Self::Found(d) => Ok(d),
            other => Err(other.shape_error("document")),
        }
    }

    /// # Errors
    /// `DbError::Shape` unless this is `Count`.
    pub fn into_count(self) -> Result<u64, DbError> {
        match self {
            Self::Count(n) => Ok(n),
            other => Err(other.shape_error("count")),
        }
    }

    /// # Errors
    /// `DbError::Shape` unless this is `Exists`.
    pub fn into_bool(self) -> Result<bool, DbError> {
        match self {
            Self::Exists(b) => Ok(b),
            other => Err(other.shape_error("exists")),
        }
    }
}
