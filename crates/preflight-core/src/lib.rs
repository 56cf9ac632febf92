//! Preflight Core - shared abstractions for the preflight query advisor
//!
//! This crate provides the types every other preflight crate depends on:
//!
//! - `Connection` / `PreparedStatement` - the database client interface
//! - `BoundQuery` / `BoundParam` - a captured statement and its bound values
//! - `WireType` - the wire-level type tag of a bound parameter
//! - Common types like `Value`, `Row`, `QueryResult`

mod connection;
mod error;
mod query;
mod types;
mod wire;

pub use connection::*;
pub use error::*;
pub use query::*;
pub use types::*;
pub use wire::*;
