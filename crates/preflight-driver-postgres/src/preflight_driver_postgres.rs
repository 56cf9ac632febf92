//! PostgreSQL driver implementation

mod config;
mod connection;
mod factory;
mod statement;
mod tls;
mod value;

pub use config::{PostgresConfig, SslMode};
pub use connection::PostgresConnection;
pub use factory::PostgresConnectionFactory;
pub use statement::PostgresStatement;
pub use tls::{TlsError, build_tls_connector};
