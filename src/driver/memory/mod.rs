//! In-process document database implementing the driver contract.
//!
//! Collections are created on first use and keep documents in insertion order. Filters,
//! updates, sorting, projection and a small aggregation subset are evaluated in memory.

mod eval;
mod parse;
mod types;
mod update;

pub use eval::eval_filter;
pub use parse::{parse_filter, parse_projection, parse_sort, parse_update};
pub use types::{CmpOp, Filter, Order, Projection, SortSpec, Update, UpdateDoc};

use crate::driver::{Collection, Database, FindOptions};
use crate::errors::DbError;
use crate::query::as_i64;
use crate::types::{DeleteReport, InsertReport, UpdateReport};
use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{Bson, Document, doc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use eval::{compare_docs, project};
use update::{apply_update, seed_from_filter};

pub struct MemoryDatabase {
    name: String,
    collections: RwLock<HashMap<String, Arc<MemoryCollection>>>,
    closed: AtomicBool,
}

impl MemoryDatabase {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), collections: RwLock::new(HashMap::new()), closed: AtomicBool::new(false) }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Concrete handle to a collection, created if missing.
    ///
    /// # Errors
    /// Returns `DbError::Store` once the database is closed.
    pub fn collection_handle(&self, name: &str) -> Result<Arc<MemoryCollection>, DbError> {
        self.ensure_open()?;
        if let Some(col) = self.collections.read().get(name) {
            return Ok(col.clone());
        }
        let mut map = self.collections.write();
        let col = map.entry(name.to_string()).or_insert_with(|| {
            log::debug!("creating collection {}.{name}", self.name);
            Arc::new(MemoryCollection::new(name))
        });
        Ok(col.clone())
    }

    fn ensure_open(&self) -> Result<(), DbError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DbError::Store(format!("database {} is closed", self.name)));
        }
        Ok(())
    }
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self::new("test")
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn collection(&self, name: &str) -> Result<Arc<dyn Collection>, DbError> {
        let col: Arc<dyn Collection> = self.collection_handle(name)?;
        Ok(col)
    }

    /// Names are namespaced with the database name, as a server reports them.
    async fn collection_names(&self) -> Result<Vec<String>, DbError> {
        self.ensure_open()?;
        let mut names: Vec<String> =
            self.collections.read().keys().map(|n| format!("{}.{n}", self.name)).collect();
        names.sort();
        Ok(names)
    }

    async fn drop_collection(&self, name: &str) -> Result<bool, DbError> {
        self.ensure_open()?;
        Ok(self.collections.write().remove(name).is_some())
    }

    async fn close(&self) -> Result<(), DbError> {
        self.closed.store(true, Ordering::Release);
        log::debug!("closed database {}", self.name);
        Ok(())
    }
}

pub struct MemoryCollection {
    name: String,
    docs: RwLock<Vec<Document>>,
}

impl MemoryCollection {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), docs: RwLock::new(Vec::new()) }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.docs.read().is_empty()
    }

    /// Every stored document, in insertion order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Document> {
        self.docs.read().clone()
    }

    fn duplicate(&self, id: &Bson) -> DbError {
        DbError::Store(format!("duplicate key error in {}: _id {id}", self.name))
    }
}

/// Positions of the documents matching `filter`, in `sort` order (insertion order on ties).
fn ordered_matches(docs: &[Document], filter: &Filter, sort: &[SortSpec]) -> Vec<usize> {
    let mut hits: Vec<usize> =
        docs.iter().enumerate().filter(|(_, d)| eval_filter(d, filter)).map(|(i, _)| i).collect();
    if !sort.is_empty() {
        hits.sort_by(|&a, &b| compare_docs(&docs[a], &docs[b], sort));
    }
    hits
}

fn window(len: usize, skip: Option<usize>, limit: Option<usize>) -> std::ops::Range<usize> {
    let start = skip.unwrap_or(0).min(len);
    let end = limit.map_or(len, |n| start.saturating_add(n).min(len));
    start..end
}

/// Give `doc` an `_id` if it has none; the id goes first.
fn with_id(doc: Document) -> (Document, Bson) {
    if let Some(id) = doc.get("_id") {
        let id = id.clone();
        return (doc, id);
    }
    let id = Bson::ObjectId(ObjectId::new());
    let mut out = doc! { "_id": id.clone() };
    for (k, v) in doc {
        out.insert(k, v);
    }
    (out, id)
}

fn sort_spec(sort: Option<&Document>) -> Result<Vec<SortSpec>, DbError> {
    sort.map_or_else(|| Ok(Vec::new()), parse_sort)
}

#[async_trait]
impl Collection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn find(&self, filter: &Document, options: &FindOptions) -> Result<Vec<Document>, DbError> {
        let filter = parse_filter(filter)?;
        let sort = sort_spec(options.sort.as_ref())?;
        let projection = parse_projection(options.projection.as_ref())?;
        let docs = self.docs.read();
        let hits = ordered_matches(&docs, &filter, &sort);
        let range = window(hits.len(), options.skip, options.limit);
        Ok(hits[range].iter().map(|&i| project(&docs[i], &projection)).collect())
    }

    async fn count(&self, filter: &Document) -> Result<u64, DbError> {
        let filter = parse_filter(filter)?;
        let docs = self.docs.read();
        Ok(docs.iter().filter(|d| eval_filter(d, &filter)).count() as u64)
    }

    async fn insert(&self, docs: Vec<Document>, _options: &Document) -> Result<InsertReport, DbError> {
        let prepared: Vec<(Document, Bson)> = docs.into_iter().map(with_id).collect();
        let mut stored = self.docs.write();
        for (i, (_, id)) in prepared.iter().enumerate() {
            let clash = stored.iter().any(|d| d.get("_id") == Some(id))
                || prepared[..i].iter().any(|(_, earlier)| earlier == id);
            if clash {
                return Err(self.duplicate(id));
            }
        }
        let mut inserted_ids = Vec::with_capacity(prepared.len());
        for (doc, id) in prepared {
            stored.push(doc);
            inserted_ids.push(id);
        }
        log::trace!("inserted {} document(s) into {}", inserted_ids.len(), self.name);
        Ok(InsertReport { inserted_ids })
    }

    async fn update(
        &self,
        filter: &Document,
        change: &Document,
        upsert: bool,
        options: &FindOptions,
    ) -> Result<UpdateReport, DbError> {
        let compiled = parse_filter(filter)?;
        let update = parse_update(change)?;
        let mut docs = self.docs.write();
        let mut hits = ordered_matches(&docs, &compiled, &[]);
        if !options.flag("multi") {
            hits.truncate(1);
        }
        if hits.is_empty() && upsert {
            let mut seed = seed_from_filter(filter);
            apply_update(&mut seed, &update)?;
            let (doc, id) = with_id(seed);
            if docs.iter().any(|d| d.get("_id") == Some(&id)) {
                return Err(self.duplicate(&id));
            }
            docs.push(doc);
            return Ok(UpdateReport { matched: 0, modified: 0, upserted_id: Some(id) });
        }
        let mut modified = 0;
        for &i in &hits {
            let mut next = docs[i].clone();
            if apply_update(&mut next, &update)? {
                docs[i] = next;
                modified += 1;
            }
        }
        Ok(UpdateReport { matched: hits.len() as u64, modified, upserted_id: None })
    }

    async fn find_and_modify(
        &self,
        filter: &Document,
        sort: &Document,
        change: &Document,
        return_new: bool,
        options: &FindOptions,
    ) -> Result<Option<Document>, DbError> {
        let compiled = parse_filter(filter)?;
        let sort = parse_sort(sort)?;
        let update = parse_update(change)?;
        let projection = parse_projection(options.projection.as_ref())?;
        let mut docs = self.docs.write();
        let Some(&i) = ordered_matches(&docs, &compiled, &sort).first() else {
            return Ok(None);
        };
        let before = docs[i].clone();
        let mut after = before.clone();
        apply_update(&mut after, &update)?;
        docs[i] = after.clone();
        let shown = if return_new { after } else { before };
        Ok(Some(project(&shown, &projection)))
    }

    async fn find_and_remove(
        &self,
        filter: &Document,
        sort: &Document,
        options: &FindOptions,
    ) -> Result<Option<Document>, DbError> {
        let compiled = parse_filter(filter)?;
        let sort = parse_sort(sort)?;
        let projection = parse_projection(options.projection.as_ref())?;
        let mut docs = self.docs.write();
        let Some(&i) = ordered_matches(&docs, &compiled, &sort).first() else {
            return Ok(None);
        };
        let removed = docs.remove(i);
        Ok(Some(project(&removed, &projection)))
    }

    async fn remove(&self, filter: &Document, _options: &FindOptions) -> Result<DeleteReport, DbError> {
        let compiled = parse_filter(filter)?;
        let mut docs = self.docs.write();
        let before = docs.len();
        docs.retain(|d| !eval_filter(d, &compiled));
        Ok(DeleteReport { deleted: (before - docs.len()) as u64 })
    }

    async fn aggregate(&self, pipeline: &[Document], _options: &FindOptions) -> Result<Vec<Document>, DbError> {
        let mut docs = self.snapshot();
        for stage in pipeline {
            let mut entries = stage.iter();
            let (Some((op, arg)), None) = (entries.next(), entries.next()) else {
                return Err(DbError::QueryError("a pipeline stage must have exactly one key".into()));
            };
            docs = run_stage(docs, op, arg)?;
        }
        Ok(docs)
    }
}

fn run_stage(mut docs: Vec<Document>, op: &str, arg: &Bson) -> Result<Vec<Document>, DbError> {
    let bad = |what: &str| DbError::QueryError(format!("{op} takes {what}"));
    match op {
        "$match" => {
            let filter = parse_filter(arg.as_document().ok_or_else(|| bad("a document"))?)?;
            docs.retain(|d| eval_filter(d, &filter));
        }
        "$sort" => {
            let sort = parse_sort(arg.as_document().ok_or_else(|| bad("a document"))?)?;
            docs.sort_by(|a, b| compare_docs(a, b, &sort));
        }
        "$skip" | "$limit" => {
            let n = as_i64(arg).and_then(|n| usize::try_from(n).ok()).ok_or_else(|| bad("a non-negative number"))?;
            let range = if op == "$skip" { window(docs.len(), Some(n), None) } else { window(docs.len(), None, Some(n)) };
            docs = docs.drain(range).collect();
        }
        "$project" => {
            let projection = parse_projection(Some(arg.as_document().ok_or_else(|| bad("a document"))?))?;
            docs = docs.iter().map(|d| project(d, &projection)).collect();
        }
        "$count" => {
            let field = arg.as_str().filter(|s| !s.is_empty()).ok_or_else(|| bad("a field name"))?;
            let n = i64::try_from(docs.len()).unwrap_or(i64::MAX);
            let mut counted = Document::new();
            counted.insert(field, n);
            docs = vec![counted];
        }
        other => return Err(DbError::QueryError(format!("unsupported aggregation stage {other}"))),
    }
    Ok(docs)
}
