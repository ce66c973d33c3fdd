//! Deferred, fluent query builder.
//!
//! A [`Query`] accumulates intent through chained calls and touches the store only when it is
//! forced: [`Query::run`] for a single value, [`Query::stream`] / [`Query::pipe`] for a lazy
//! document stream, [`Query::for_each`] for per-document iteration. Mutating finalizers
//! (`insert`, `update`, ...) force immediately.

mod assertion;
mod command;
mod outcome;
mod stream;

pub use assertion::Assertion;
pub use command::{Command, CommandKind};
pub(crate) use command::as_i64;
pub use outcome::Outcome;
pub use stream::QueryStream;

use crate::errors::DbError;
use crate::ids::coerce_id;
use crate::pattern::extend;
use crate::store::Store;
use bson::{Bson, Document, doc};
use futures::future::{BoxFuture, FutureExt};
use futures::{Sink, StreamExt, TryStreamExt};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Pending result of a forced query.
pub type Execution = BoxFuture<'static, Result<Outcome, DbError>>;

/// Field selection: either a finished projection or a list of field paths to include.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    Fields(Document),
    Include(Vec<String>),
}

impl Projection {
    fn into_document(self) -> Document {
        match self {
            Self::Fields(d) => d,
            Self::Include(names) => names.into_iter().map(|n| (n, Bson::Boolean(true))).collect(),
        }
    }
}

impl From<Document> for Projection {
    fn from(d: Document) -> Self {
        Self::Fields(d)
    }
}

impl From<Vec<String>> for Projection {
    fn from(v: Vec<String>) -> Self {
        Self::Include(v)
    }
}

impl From<Vec<&str>> for Projection {
    fn from(v: Vec<&str>) -> Self {
        Self::Include(v.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Projection {
    fn from(v: [&str; N]) -> Self {
        Self::Include(v.into_iter().map(str::to_string).collect())
    }
}

/// Fluent query over a shared [`Store`].
///
/// Every chaining method consumes and returns the builder. Faults found while chaining are
/// kept on the query and reported when it is forced, so chaining itself never fails.
#[derive(Clone)]
pub struct Query {
    store: Arc<dyn Store>,
    spec: Command,
    assertion: Option<Assertion>,
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("spec", &self.spec)
            .field("assertion", &self.assertion)
            .finish_non_exhaustive()
    }
}

impl Query {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self::with_options(store, doc! { "safe": true })
    }

    /// Start from `options` instead of the default `{safe: true}`.
    pub fn with_options(store: Arc<dyn Store>, options: Document) -> Self {
        Self { store, spec: Command::with_options(options), assertion: None }
    }

    /// The descriptor as accumulated so far.
    #[must_use]
    pub const fn spec(&self) -> &Command {
        &self.spec
    }

    #[must_use]
    pub const fn error(&self) -> Option<&DbError> {
        self.spec.error.as_ref()
    }

    #[must_use]
    pub const fn assertion(&self) -> Option<&Assertion> {
        self.assertion.as_ref()
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    fn fail(mut self, err: DbError) -> Self {
        log::debug!("query captured build error: {err}");
        self.spec.error = Some(err);
        self
    }

    #[must_use]
    pub fn from(mut self, collection: impl Into<String>) -> Self {
        self.spec.collection = Some(collection.into());
        self
    }

    /// Merge `fragment` into the filter. Keys are overwritten or added, never removed.
    #[must_use]
    pub fn filter(mut self, fragment: Document) -> Self {
        extend(&mut self.spec.filter, fragment);
        self
    }

    /// Match documents where `field` is false, null, or missing.
    #[must_use]
    pub fn not(self, field: &str) -> Self {
        let mut fragment = Document::new();
        fragment.insert(field, doc! { "$in": [false, Bson::Null] });
        self.filter(fragment)
    }

    #[must_use]
    pub fn select(mut self, projection: impl Into<Projection>) -> Self {
        self.spec.projection = Some(projection.into().into_document());
        self
    }

    /// Ignored once [`first`](Self::first) is set; a scalar query always has limit 1.
    #[must_use]
    pub fn limit(mut self, n: i64) -> Self {
        let n = if self.spec.first { 1 } else { n };
        self.spec.options.insert("limit", n);
        self
    }

    #[must_use]
    pub fn skip(mut self, n: i64) -> Self {
        self.spec.options.insert("skip", n);
        self
    }

    #[must_use]
    pub fn sort(mut self, sort: Document) -> Self {
        self.spec.options.insert("sort", sort);
        self
    }

    /// Merge store-specific flags into the options.
    #[must_use]
    pub fn options(mut self, extra: Document) -> Self {
        extend(&mut self.spec.options, extra);
        self
    }

    /// Ask for a single value instead of a set.
    #[must_use]
    pub fn first(mut self) -> Self {
        self.spec.first = true;
        self.limit(1)
    }

    /// Like [`first`](Self::first), yielding `value` when nothing matches.
    #[must_use]
    pub fn first_or_default(mut self, value: impl Into<Bson>) -> Self {
        self.spec.default = Some(value.into());
        self.first()
    }

    #[must_use]
    pub fn by_id(self, id: impl Into<Bson>) -> Self {
        self.filter(doc! { "_id": coerce_id(id) }).first()
    }

    /// Match any of `ids`, which must be an array; anything else is kept as a build error.
    #[must_use]
    pub fn by_ids(self, ids: impl Into<Bson>) -> Self {
        let Bson::Array(ids) = ids.into() else {
            return self.fail(DbError::Build("ids must be an array".into()));
        };
        let n = i64::try_from(ids.len()).unwrap_or(i64::MAX);
        let ids: Vec<Bson> = ids.into_iter().map(coerce_id).collect();
        self.filter(doc! { "_id": { "$in": ids } }).limit(n)
    }

    #[must_use]
    pub fn count(mut self) -> Self {
        self.spec.kind = CommandKind::Count;
        self
    }

    #[must_use]
    pub fn exists(mut self) -> Self {
        self.spec.kind = CommandKind::Exists;
        self
    }

    #[must_use]
    pub fn aggregate(mut self, pipeline: impl Into<Bson>) -> Self {
        let pipeline = pipeline.into();
        if !matches!(pipeline, Bson::Array(_)) {
            return self.fail(DbError::Build("aggregation pipeline must be an array".into()));
        }
        self.spec.kind = CommandKind::Aggregate;
        self.spec.arg = Some(pipeline);
        self
    }

    /// Select the command by its wire name (`"count"`, `"findAndModify"`, ...).
    #[must_use]
    pub fn command(mut self, name: &str) -> Self {
        match name.parse::<CommandKind>() {
            Ok(kind) => {
                self.spec.kind = kind;
                self
            }
            Err(e) => self.fail(e),
        }
    }

    /// Register a post-condition on the whole result, replacing any earlier one.
    #[must_use]
    pub fn assert<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Outcome) -> bool + Send + Sync + 'static,
    {
        self.assertion = Some(Assertion::new(predicate, None));
        self
    }

    #[must_use]
    pub fn assert_msg<F>(mut self, predicate: F, message: impl Into<String>) -> Self
    where
        F: Fn(&Outcome) -> bool + Send + Sync + 'static,
    {
        self.assertion = Some(Assertion::new(predicate, Some(message.into())));
        self
    }

    /// Require exactly `n` results.
    #[must_use]
    pub fn expect(mut self, n: u64) -> Self {
        self.assertion = Some(Assertion::quantity(n));
        self
    }

    /// Force the query as a single value.
    ///
    /// The descriptor is copied before this returns; later changes to the builder do not reach
    /// the running command. A captured build error fails the execution without touching the store.
    pub fn run(&self) -> Execution {
        let command = self.spec.clone();
        let store = Arc::clone(&self.store);
        let assertion = self.assertion.clone();
        async move {
            if let Some(err) = command.error {
                return Err(err);
            }
            let outcome = store.run(command).await?;
            match assertion {
                Some(a) => a.verify(outcome),
                None => Ok(outcome),
            }
        }
        .boxed()
    }

    /// Force the query as a stream of documents. Always a `read`.
    pub fn stream(&self) -> QueryStream {
        let mut command = self.spec.clone();
        command.kind = CommandKind::Read;
        if let Some(err) = command.error.take() {
            return QueryStream::failed(err);
        }
        QueryStream::new(self.store.run_as_stream(command))
    }

    /// Stream the results into `sink`; resolves when the stream ends.
    pub fn pipe<S>(&self, sink: S) -> impl Future<Output = Result<(), DbError>> + Send + 'static
    where
        S: Sink<Document, Error = DbError> + Send + 'static,
    {
        self.stream().forward(sink)
    }

    /// Call `visitor` once per streamed document.
    ///
    /// # Errors
    /// Returns the first error the stream reports.
    pub async fn for_each<F>(&self, mut visitor: F) -> Result<(), DbError>
    where
        F: FnMut(Document),
    {
        self.stream()
            .try_for_each(|doc| {
                visitor(doc);
                futures::future::ready(Ok(()))
            })
            .await
    }

    /// Insert one document, or every document of an array.
    pub fn insert(self, docs: impl Into<Bson>) -> Execution {
        self.finalize(CommandKind::Insert, Some(docs.into()))
    }

    pub fn update(self, change: Document) -> Execution {
        self.finalize(CommandKind::Update, Some(Bson::Document(change)))
    }

    /// Atomically apply `change` to the first match; yields the document as it was before.
    pub fn find_and_modify(self, change: Document) -> Execution {
        self.finalize(CommandKind::FindAndModify, Some(Bson::Document(change)))
    }

    /// Atomically apply `change` to the first match; yields the document as it is after.
    pub fn modify_and_find(self, change: Document) -> Execution {
        self.finalize(CommandKind::ModifyAndFind, Some(Bson::Document(change)))
    }

    /// Atomically remove the first match and yield it.
    pub fn pull(self) -> Execution {
        self.finalize(CommandKind::Pull, None)
    }

    pub fn upsert(self, setter: Document) -> Execution {
        self.finalize(CommandKind::Upsert, Some(Bson::Document(setter)))
    }

    /// Remove every match. Refused by the executor when the filter is empty.
    pub fn remove(self) -> Execution {
        self.finalize(CommandKind::Remove, None)
    }

    pub fn remove_all(self) -> Execution {
        self.finalize(CommandKind::RemoveAll, None)
    }

    fn finalize(mut self, kind: CommandKind, arg: Option<Bson>) -> Execution {
        self.spec.kind = kind;
        self.spec.arg = arg;
        eager(self.run())
    }
}

/// Start `execution` right away when a Tokio runtime is available, so writes happen even if
/// the caller never awaits them. Without a runtime it stays lazy.
fn eager(execution: Execution) -> Execution {
    match tokio::runtime::Handle::try_current() {
        Ok(rt) => {
            let task = rt.spawn(execution);
            async move { task.await? }.boxed()
        }
        Err(_) => execution,
    }
}
