//! Preflight Capture - transparent capture of executed statements
//!
//! Wrap any [`preflight_core::Connection`] in an [`InterceptingConnection`]
//! and every statement prepared through it records its bound parameters.
//! When the statement executes, a [`preflight_core::BoundQuery`] is handed to
//! a [`QuerySink`] on a best-effort basis: sink failures never affect the
//! application's own query.
//!
//! A [`CaptureContext`] shared with the advisor suppresses capture while the
//! advisor runs its own `EXPLAIN` traffic.

mod connection;
mod context;
mod sink;
mod statement;

pub use connection::InterceptingConnection;
pub use context::CaptureContext;
pub use sink::{ChannelSink, FnSink, QuerySink, SinkError, deliver_best_effort};
pub use statement::CapturingStatement;

#[cfg(test)]
mod tests;
