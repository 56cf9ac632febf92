//! Destinations for captured queries

use preflight_core::BoundQuery;
use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;
use tokio::sync::mpsc;

/// Why a sink refused a captured query
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SinkError {
    #[error("sink is closed")]
    Closed,

    #[error("sink is full")]
    Full,

    #[error("sink rejected the query: {0}")]
    Rejected(String),
}

/// Receives captured queries
///
/// `deliver` is called on the application's execution path and must not
/// block.
pub trait QuerySink: Send + Sync {
    fn deliver(&self, query: BoundQuery) -> Result<(), SinkError>;
}

/// A sink backed by a closure
pub struct FnSink<F> {
    f: F,
}

impl<F> FnSink<F>
where
    F: Fn(BoundQuery) -> Result<(), SinkError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> QuerySink for FnSink<F>
where
    F: Fn(BoundQuery) -> Result<(), SinkError> + Send + Sync,
{
    fn deliver(&self, query: BoundQuery) -> Result<(), SinkError> {
        (self.f)(query)
    }
}

impl<F> std::fmt::Debug for FnSink<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnSink").finish_non_exhaustive()
    }
}

/// A sink that forwards into a bounded tokio channel without waiting
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<BoundQuery>,
}

impl ChannelSink {
    /// Creates a sink and the receiver that drains it
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<BoundQuery>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl QuerySink for ChannelSink {
    fn deliver(&self, query: BoundQuery) -> Result<(), SinkError> {
        self.tx.try_send(query).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SinkError::Full,
            mpsc::error::TrySendError::Closed(_) => SinkError::Closed,
        })
    }
}

/// Delivers `query`, logging and swallowing any error or panic from the sink
pub fn deliver_best_effort(sink: &dyn QuerySink, query: BoundQuery) {
    let sql_len = query.sql().len();
    match panic::catch_unwind(AssertUnwindSafe(|| sink.deliver(query))) {
        Ok(Ok(())) => {
            tracing::trace!(sql_len, "captured query delivered");
        }
        Ok(Err(error)) => {
            tracing::warn!(%error, sql_len, "query sink failed, dropping captured query");
        }
        Err(_) => {
            tracing::warn!(sql_len, "query sink panicked, dropping captured query");
        }
    }
}
