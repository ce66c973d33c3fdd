use crate::errors::DbError;
use crate::query::{Command, Outcome};
use crate::types::DocumentStream;
use async_trait::async_trait;

/// Anything able to execute a frozen [`Command`].
///
/// [`crate::Executor`] is the implementation backed by a document database driver; tests and
/// embedders can plug in their own.
#[async_trait]
pub trait Store: Send + Sync {
    /// Execute one command and normalize its result.
    async fn run(&self, command: Command) -> Result<Outcome, DbError>;

    /// Execute a `read` as a lazy stream of documents.
    ///
    /// Faults, including a command other than `read`, arrive as the stream's only item.
    fn run_as_stream(&self, command: Command) -> DocumentStream;

    async fn collection_names(&self) -> Result<Vec<String>, DbError>;

    async fn disconnect(&self) -> Result<(), DbError> {
        Ok(())
    }
}
