//! Deferred, fluent queries over a document store.
//!
//! ```
//! use bson::doc;
//! use minq::Minq;
//!
//! # async fn demo() -> Result<(), minq::DbError> {
//! let db = Minq::memory("zoo");
//! db.from("bears").insert(doc! { "name": "yogi", "kind": "brown" }).await?;
//! let yogi = db.from("bears").filter(doc! { "name": minq::like("YOGI") }).first().run().await?;
//! assert_eq!(yogi.into_document()?.unwrap().get_str("kind").unwrap(), "brown");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod devlog;
pub mod driver;
pub mod errors;
pub mod executor;
pub mod ids;
pub mod logger;
pub mod pattern;
pub mod query;
pub mod store;
pub mod telemetry;
pub mod types;

pub use config::Config;
pub use driver::memory::MemoryDatabase;
pub use errors::DbError;
pub use executor::Executor;
pub use ids::coerce_id;
pub use pattern::like;
pub use query::{Assertion, Command, CommandKind, Execution, Outcome, Projection, Query, QueryStream};
pub use store::Store;

use bson::{Document, doc};
use driver::Database;
use std::future::Future;
use std::sync::Arc;

/// Entry point bound to one store. Hands out [`Query`] builders.
#[derive(Clone)]
pub struct Minq {
    store: Arc<dyn Store>,
    default_options: Document,
}

impl std::fmt::Debug for Minq {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Minq").field("default_options", &self.default_options).finish_non_exhaustive()
    }
}

impl Minq {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store, default_options: doc! { "safe": true } }
    }

    /// Like [`new`](Self::new), taking query defaults from `config`.
    pub fn with_config(store: Arc<dyn Store>, config: &Config) -> Self {
        Self { store, default_options: config.query.default_options.clone() }
    }

    /// A fresh in-memory database.
    pub fn memory(name: &str) -> Self {
        Self::new(Arc::new(Executor::new(Arc::new(MemoryDatabase::new(name)))))
    }

    /// Bind to a database that is still connecting; queries wait for it.
    pub fn connect<F>(connection: F) -> Self
    where
        F: Future<Output = Result<Arc<dyn Database>, DbError>> + Send + 'static,
    {
        Self::new(Arc::new(Executor::connecting(connection)))
    }

    /// Start a query on `collection`.
    #[must_use]
    pub fn from(&self, collection: impl Into<String>) -> Query {
        self.query().from(collection)
    }

    /// Start a query with no collection set yet.
    #[must_use]
    pub fn query(&self) -> Query {
        Query::with_options(Arc::clone(&self.store), self.default_options.clone())
    }

    /// # Errors
    /// Returns any store error.
    pub async fn collection_names(&self) -> Result<Vec<String>, DbError> {
        self.store.collection_names().await
    }

    /// # Errors
    /// Returns any store error.
    pub async fn disconnect(&self) -> Result<(), DbError> {
        self.store.disconnect().await
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }
}
