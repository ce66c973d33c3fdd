//! Command executor: runs one frozen [`Command`] against a [`Database`] and normalizes the result.

use crate::driver::{Collection, Database, FindOptions};
use crate::errors::DbError;
use crate::query::{Command, CommandKind, Outcome};
use crate::store::Store;
use crate::telemetry;
use crate::types::DocumentStream;
use async_trait::async_trait;
use bson::{Bson, Document, doc};
use futures::future::{BoxFuture, FutureExt, Shared, TryFutureExt};
use futures::stream::StreamExt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

type DatabaseHandle = Shared<BoxFuture<'static, Result<Arc<dyn Database>, DbError>>>;

/// [`Store`] implementation over a database that may still be connecting.
///
/// Every command awaits the shared connection and resolves its collection afresh.
#[derive(Clone)]
pub struct Executor {
    db: DatabaseHandle,
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor").field("connected", &self.db.peek().is_some()).finish()
    }
}

impl Executor {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self::connecting(futures::future::ready(Ok(db)))
    }

    /// Bind to a connection still being established. A failed connection fails every command.
    pub fn connecting<F>(connection: F) -> Self
    where
        F: Future<Output = Result<Arc<dyn Database>, DbError>> + Send + 'static,
    {
        Self { db: connection.boxed().shared() }
    }

    /// # Errors
    /// Returns the connection error if the database could not be opened.
    pub async fn database(&self) -> Result<Arc<dyn Database>, DbError> {
        self.db.clone().await
    }

    /// # Errors
    /// Returns any error raised by the driver.
    pub async fn drop_collection(&self, name: &str) -> Result<bool, DbError> {
        let dropped = self.database().await?.drop_collection(name).await?;
        log::info!("dropped collection {name}: {dropped}");
        Ok(dropped)
    }

    /// Run one command.
    ///
    /// `update` and `upsert` temporarily move an `_id` found in the payload into the filter;
    /// the payload is put back exactly as it was before this returns, whatever the outcome.
    ///
    /// # Errors
    /// The command's captured build error, a guard-rail rejection, `NotFound` for an empty
    /// scalar read without default, or any driver error.
    pub async fn execute(&self, command: &mut Command) -> Result<Outcome, DbError> {
        if let Some(err) = &command.error {
            return Err(err.clone());
        }
        let name = command.collection_name()?.to_string();
        let kind = command.kind;
        log::debug!("executing {kind} on {name}: filter={}", command.filter);
        let started = Instant::now();
        let result = self.dispatch(&name, command).await;
        telemetry::record_command(kind.as_str(), &name, started.elapsed(), result.is_ok());
        if let Err(e) = &result {
            log::warn!("{kind} on {name} failed: {e}");
        }
        result
    }

    async fn dispatch(&self, name: &str, command: &mut Command) -> Result<Outcome, DbError> {
        if command.kind == CommandKind::Remove && command.filter.is_empty() {
            return Err(DbError::Invalid(
                "No `where` query specified. Use `remove_all` to delete every document.".into(),
            ));
        }
        let col = self.collection(name).await?;
        let options = FindOptions::from_command(command);
        let filter = &command.filter;
        match command.kind {
            CommandKind::Read => {
                let docs = col.find(filter, &options).await?;
                if !command.first {
                    return Ok(Outcome::Many(docs));
                }
                match (docs.into_iter().next(), &command.default) {
                    (Some(doc), _) => Ok(Outcome::One(Bson::Document(doc))),
                    (None, Some(default)) => Ok(Outcome::One(default.clone())),
                    (None, None) => Err(DbError::NotFound(format!(
                        "Query returned no results and no default value specified: {} {filter}",
                        col.name()
                    ))),
                }
            }
            CommandKind::Count => Ok(Outcome::Count(col.count(filter).await?)),
            CommandKind::Exists => Ok(Outcome::Exists(col.count(filter).await? > 0)),
            CommandKind::Insert => {
                let docs = insert_payload(command.arg.as_ref())?;
                Ok(Outcome::Inserted(col.insert(docs, &command.options).await?))
            }
            CommandKind::Update | CommandKind::Upsert => {
                let upsert = command.kind == CommandKind::Upsert;
                let mut filter = filter.clone();
                let lift = IdLift::new(&mut command.arg);
                if let Some(id) = lift.id() {
                    filter.insert("_id", id.clone());
                }
                let change = lift.payload(command.kind)?;
                let report = col.update(&filter, change, upsert, &options).await?;
                Ok(Outcome::Updated(report))
            }
            CommandKind::FindAndModify | CommandKind::ModifyAndFind => {
                let change = change_set(command.arg.as_ref(), command.kind)?;
                let return_new = command.kind == CommandKind::ModifyAndFind;
                let sort = atomic_sort(&options);
                let found =
                    col.find_and_modify(filter, &sort, change, return_new, &options).await?;
                Ok(Outcome::Found(found))
            }
            CommandKind::Pull => {
                let sort = atomic_sort(&options);
                Ok(Outcome::Found(col.find_and_remove(filter, &sort, &options).await?))
            }
            CommandKind::Remove => Ok(Outcome::Removed(col.remove(filter, &options).await?)),
            CommandKind::RemoveAll => {
                Ok(Outcome::Removed(col.remove(&Document::new(), &options).await?))
            }
            CommandKind::Aggregate => {
                let stages = pipeline(command.arg.as_ref())?;
                Ok(Outcome::Many(col.aggregate(&stages, &options).await?))
            }
        }
    }

    async fn collection(&self, name: &str) -> Result<Arc<dyn Collection>, DbError> {
        self.database().await?.collection(name).await
    }
}

#[async_trait]
impl Store for Executor {
    async fn run(&self, mut command: Command) -> Result<Outcome, DbError> {
        self.execute(&mut command).await
    }

    fn run_as_stream(&self, command: Command) -> DocumentStream {
        if let Some(err) = command.error {
            return failed(err);
        }
        if command.kind != CommandKind::Read {
            log::warn!("refusing to stream `{}`", command.kind);
            return failed(DbError::Invalid(format!(
                "Query command must be \"read\", got \"{}\"",
                command.kind
            )));
        }
        let db = self.db.clone();
        async move {
            let name = command.collection_name()?.to_string();
            telemetry::record_stream(&name);
            let col = db.await?.collection(&name).await?;
            log::trace!("streaming from {}", col.name());
            let options = FindOptions::from_command(&command);
            col.find_stream(command.filter, options).await
        }
        .try_flatten_stream()
        .boxed()
    }

    /// Collection names without their database prefix.
    async fn collection_names(&self) -> Result<Vec<String>, DbError> {
        let names = self.database().await?.collection_names().await?;
        Ok(names
            .into_iter()
            .map(|n| match n.split_once('.') {
                Some((_, bare)) => bare.to_string(),
                None => n,
            })
            .collect())
    }

    async fn disconnect(&self) -> Result<(), DbError> {
        self.database().await?.close().await?;
        log::info!("disconnected");
        Ok(())
    }
}

fn failed(err: DbError) -> DocumentStream {
    futures::stream::once(futures::future::ready(Err(err))).boxed()
}

/// Find-and-modify family defaults to ascending `_id` so "the first match" is well defined.
fn atomic_sort(options: &FindOptions) -> Document {
    options.sort.clone().unwrap_or_else(|| doc! { "_id": 1 })
}

fn change_set(arg: Option<&Bson>, kind: CommandKind) -> Result<&Document, DbError> {
    match arg {
        Some(Bson::Document(d)) => Ok(d),
        _ => Err(DbError::Build(format!("`{kind}` requires a document argument"))),
    }
}

fn insert_payload(arg: Option<&Bson>) -> Result<Vec<Document>, DbError> {
    let invalid = || DbError::Build("insert expects a document or an array of documents".into());
    match arg {
        Some(Bson::Document(d)) => Ok(vec![d.clone()]),
        Some(Bson::Array(items)) => items
            .iter()
            .map(|b| b.as_document().cloned().ok_or_else(invalid))
            .collect(),
        _ => Err(invalid()),
    }
}

fn pipeline(arg: Option<&Bson>) -> Result<Vec<Document>, DbError> {
    let Some(Bson::Array(stages)) = arg else {
        return Err(DbError::Build("Argument must be an array".into()));
    };
    stages
        .iter()
        .map(|s| {
            s.as_document()
                .cloned()
                .ok_or_else(|| DbError::Build("pipeline stages must be documents".into()))
        })
        .collect()
}

/// Takes `_id` out of an update payload for the duration of a call.
///
/// The payload slot is restored to its original value when the guard drops, so success,
/// failure and cancellation all leave the caller's payload untouched.
struct IdLift<'a> {
    slot: &'a mut Option<Bson>,
    original: Option<Bson>,
    id: Option<Bson>,
}

impl<'a> IdLift<'a> {
    fn new(slot: &'a mut Option<Bson>) -> Self {
        let original = slot.clone();
        let id = match slot.as_mut() {
            Some(Bson::Document(d)) => d.remove("_id"),
            _ => None,
        };
        Self { slot, original, id }
    }

    fn id(&self) -> Option<&Bson> {
        self.id.as_ref()
    }

    fn payload(&self, kind: CommandKind) -> Result<&Document, DbError> {
        change_set(self.slot.as_ref(), kind)
    }
}

impl Drop for IdLift<'_> {
    fn drop(&mut self) {
        *self.slot = self.original.take();
    }
}
