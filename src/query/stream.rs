use crate::errors::DbError;
use crate::types::DocumentStream;
use bson::Document;
use futures::stream::{FusedStream, Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};

/// Push-stream of query results.
///
/// Yields documents until the source ends, or a single `Err` after which it always ends.
/// Every fault (build error, wrong command, store failure) arrives as an item.
pub struct QueryStream {
    inner: DocumentStream,
    done: bool,
}

impl QueryStream {
    #[must_use]
    pub fn new(inner: DocumentStream) -> Self {
        Self { inner, done: false }
    }

    /// A stream whose only item is `err`.
    #[must_use]
    pub fn failed(err: DbError) -> Self {
        Self::new(futures::stream::once(futures::future::ready(Err(err))).boxed())
    }
}

impl Stream for QueryStream {
    type Item = Result<Document, DbError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }
        match self.inner.poll_next_unpin(cx) {
            Poll::Ready(Some(Err(e))) => {
                log::trace!("query stream failed: {e}");
                self.done = true;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                self.done = true;
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

impl FusedStream for QueryStream {
    fn is_terminated(&self) -> bool {
        self.done
    }
}
