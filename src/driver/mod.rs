//! Driver contract the [`crate::Executor`] runs commands against.

pub mod memory;

use crate::errors::DbError;
use crate::query::Command;
use crate::types::{DeleteReport, DocumentStream, InsertReport, UpdateReport};
use async_trait::async_trait;
use bson::Document;
use futures::StreamExt;
use std::sync::Arc;

/// Find parameters pulled out of a command's options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub projection: Option<Document>,
    pub sort: Option<Document>,
    pub limit: Option<usize>,
    pub skip: Option<usize>,
    /// Every other option (`safe`, `multi`, driver-specific flags), passed through as-is.
    pub extra: Document,
}

impl FindOptions {
    /// A limit of zero or less means "no limit"; a negative skip is ignored.
    #[must_use]
    pub fn from_command(command: &Command) -> Self {
        let extra = command
            .options
            .iter()
            .filter(|(k, _)| !matches!(k.as_str(), "sort" | "limit" | "skip"))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Self {
            projection: command.projection.clone(),
            sort: command.sort().cloned(),
            limit: command.limit().and_then(|n| usize::try_from(n).ok()).filter(|n| *n > 0),
            skip: command.skip().and_then(|n| usize::try_from(n).ok()),
            extra,
        }
    }

    /// Boolean flag from the pass-through options.
    #[must_use]
    pub fn flag(&self, name: &str) -> bool {
        self.extra.get_bool(name).unwrap_or(false)
    }
}

/// An open database handle.
#[async_trait]
pub trait Database: Send + Sync {
    /// Resolve a collection by name.
    async fn collection(&self, name: &str) -> Result<Arc<dyn Collection>, DbError>;

    /// Collection names as the driver reports them, possibly namespaced (`db.name`).
    async fn collection_names(&self) -> Result<Vec<String>, DbError>;

    /// Returns whether the collection existed.
    async fn drop_collection(&self, name: &str) -> Result<bool, DbError>;

    async fn close(&self) -> Result<(), DbError>;
}

/// One collection of a [`Database`].
#[async_trait]
pub trait Collection: Send + Sync {
    fn name(&self) -> &str;

    async fn find(&self, filter: &Document, options: &FindOptions) -> Result<Vec<Document>, DbError>;

    /// Cursor form of [`find`](Self::find). Drivers with real cursors should override this.
    async fn find_stream(
        &self,
        filter: Document,
        options: FindOptions,
    ) -> Result<DocumentStream, DbError> {
        let docs = self.find(&filter, &options).await?;
        Ok(futures::stream::iter(docs.into_iter().map(Ok)).boxed())
    }

    async fn count(&self, filter: &Document) -> Result<u64, DbError>;

    async fn insert(
        &self,
        docs: Vec<Document>,
        options: &Document,
    ) -> Result<InsertReport, DbError>;

    /// Apply `change` to the first match, or every match when `options.multi` is set.
    async fn update(
        &self,
        filter: &Document,
        change: &Document,
        upsert: bool,
        options: &FindOptions,
    ) -> Result<UpdateReport, DbError>;

    /// Atomically update the first match in `sort` order; returns it as it was before the
    /// change, or after it when `return_new` is set.
    async fn find_and_modify(
        &self,
        filter: &Document,
        sort: &Document,
        change: &Document,
        return_new: bool,
        options: &FindOptions,
    ) -> Result<Option<Document>, DbError>;

    /// Atomically remove and return the first match in `sort` order.
    async fn find_and_remove(
        &self,
        filter: &Document,
        sort: &Document,
        options: &FindOptions,
    ) -> Result<Option<Document>, DbError>;

    async fn remove(&self, filter: &Document, options: &FindOptions)
    -> Result<DeleteReport, DbError>;

    async fn aggregate(
        &self,
        pipeline: &[Document],
        options: &FindOptions,
    ) -> Result<Vec<Document>, DbError>;
}
