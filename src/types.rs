use crate::errors::DbError;
use bson::Bson;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

/// Lazy, single-pass sequence of documents delivered by a store.
pub type DocumentStream = BoxStream<'static, Result<bson::Document, DbError>>;

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertReport {
    pub inserted_ids: Vec<Bson>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateReport {
    pub matched: u64,
    pub modified: u64,
    /// `_id` of the document created by an upsert, if one was created.
    pub upserted_id: Option<Bson>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteReport {
    pub deleted: u64,
}
