//! PostgreSQL TLS support
//!
//! Builds the native-tls connector handed to tokio-postgres when the
//! configured [`SslMode`] asks for encryption.

use std::fs;
use std::path::Path;

use native_tls::{Certificate, TlsConnector as NativeTlsConnector, TlsConnectorBuilder};
use postgres_native_tls::MakeTlsConnector;
use tracing::debug;

use crate::config::{PostgresConfig, SslMode};

/// Error types for TLS setup
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("Failed to load CA certificate from {path}: {source}")]
    CaCertLoadFailed {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid CA certificate format: {0}")]
    InvalidCaCert(String),

    #[error("TLS configuration error: {0}")]
    ConfigurationError(String),

    #[error("TLS mode {0} does not use a TLS connector")]
    UnsupportedMode(SslMode),
}

/// Build a TLS connector for `config`
///
/// `prefer` and `require` accept any certificate, `verify-ca` checks the
/// chain only and `verify-full` checks chain and host name. `disable` has no
/// connector and is rejected.
pub fn build_tls_connector(config: &PostgresConfig) -> Result<MakeTlsConnector, TlsError> {
    let mut builder = NativeTlsConnector::builder();

    configure_verification(&mut builder, config.ssl_mode)?;

    if let Some(ca_cert) = &config.ssl_ca_cert {
        apply_ca_cert(&mut builder, ca_cert)?;
    }

    let connector = builder
        .build()
        .map_err(|e| TlsError::ConfigurationError(e.to_string()))?;

    debug!(ssl_mode = %config.ssl_mode, "TLS connector built");
    Ok(MakeTlsConnector::new(connector))
}

fn configure_verification(builder: &mut TlsConnectorBuilder, mode: SslMode) -> Result<(), TlsError> {
    match mode {
        SslMode::Disable => return Err(TlsError::UnsupportedMode(mode)),
        SslMode::Prefer | SslMode::Require => {
            builder.danger_accept_invalid_certs(true);
            builder.danger_accept_invalid_hostnames(true);
        }
        SslMode::VerifyCa => {
            builder.danger_accept_invalid_hostnames(true);
        }
        SslMode::VerifyFull => {}
    }
    Ok(())
}

fn apply_ca_cert(builder: &mut TlsConnectorBuilder, path: &Path) -> Result<(), TlsError> {
    debug!(path = %path.display(), "loading CA certificate");

    let pem = fs::read(path).map_err(|source| TlsError::CaCertLoadFailed {
        path: path.display().to_string(),
        source,
    })?;
    let cert = Certificate::from_pem(&pem).map_err(|e| TlsError::InvalidCaCert(e.to_string()))?;

    builder.add_root_certificate(cert);
    Ok(())
}
