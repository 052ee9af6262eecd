//! Ordered event sources feeding the dispatcher

use async_trait::async_trait;
use futures::{Stream, StreamExt};

use super::event::Event;
use crate::Result;

/// Lazy, ordered stream of assistant events
///
/// `Ok(None)` signals end of the session.
#[async_trait]
pub trait EventSource: Send {
    /// Wait for the next event
    ///
    /// # Errors
    ///
    /// Returns error if the underlying transport fails
    async fn next_event(&mut self) -> Result<Option<Event>>;

    /// Wind the session down after a shutdown request
    ///
    /// Only called when the dispatcher is interrupted, never at end of stream.
    ///
    /// # Errors
    ///
    /// Returns error if the session could not be closed cleanly
    async fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Event source over any [`Stream`] of events
pub struct StreamSource<S> {
    inner: S,
}

impl<S> StreamSource<S>
where
    S: Stream<Item = Event> + Send + Unpin,
{
    /// Wrap a stream
    pub const fn new(inner: S) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<S> EventSource for StreamSource<S>
where
    S: Stream<Item = Event> + Send + Unpin,
{
    async fn next_event(&mut self) -> Result<Option<Event>> {
        Ok(self.inner.next().await)
    }
}
