//! TLS termination for `wss` listeners, backed by rustls.
//!
//! ```rust,no_run
//! use std::path::Path;
//! use wsgate::config::ServerConfig;
//! use wsgate::tls;
//!
//! # fn build() -> wsgate::Result<ServerConfig> {
//! let certs = tls::load_certs_from_file(Path::new("cert.pem"))?;
//! let key = tls::load_private_key_from_file(Path::new("key.pem"))?;
//! let config = ServerConfig::from_location("wss://0.0.0.0:8443")?
//!     .with_tls(tls::server_config(certs, key)?);
//! # Ok(config)
//! # }
//! ```

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::server::TlsStream;

use crate::error::{Error, Result};

/// Wraps accepted sockets in a server-side TLS session.
#[derive(Clone)]
pub struct TlsAcceptor {
    inner: tokio_rustls::TlsAcceptor,
}

impl std::fmt::Debug for TlsAcceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsAcceptor").finish_non_exhaustive()
    }
}

impl TlsAcceptor {
    #[must_use]
    pub fn new(config: Arc<ServerConfig>) -> Self {
        Self {
            inner: tokio_rustls::TlsAcceptor::from(config),
        }
    }

    /// Run the TLS handshake on `stream`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Tls`] if the handshake fails.
    pub async fn accept<S>(&self, stream: S) -> Result<TlsStream<S>>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        self.inner
            .accept(stream)
            .await
            .map_err(|e| Error::Tls(format!("handshake failed: {e}")))
    }
}

/// Build a server configuration from a certificate chain and its key.
///
/// # Errors
///
/// Returns [`Error::Tls`] if rustls rejects the certificate or key.
pub fn server_config(
    cert_chain: Vec<CertificateDer<'static>>,
    private_key: PrivateKeyDer<'static>,
) -> Result<Arc<ServerConfig>> {
    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(cert_chain, private_key)
        .map_err(|e| Error::Tls(format!("invalid certificate: {e}")))?;

    Ok(Arc::new(config))
}

/// Read every PEM certificate in `path`.
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be read and [`Error::Tls`] if it
/// holds no certificates.
pub fn load_certs_from_file(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let mut reader = BufReader::new(File::open(path)?);

    let certs = rustls_pemfile::certs(&mut reader).collect::<std::io::Result<Vec<_>>>()?;
    if certs.is_empty() {
        return Err(Error::Tls(format!("no certificates found in {}", path.display())));
    }
    Ok(certs)
}

/// Read the first PKCS#1, PKCS#8 or SEC1 private key in `path`.
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be read and [`Error::Tls`] if it
/// holds no private key.
pub fn load_private_key_from_file(path: &Path) -> Result<PrivateKeyDer<'static>> {
    let mut reader = BufReader::new(File::open(path)?);

    rustls_pemfile::private_key(&mut reader)?
        .ok_or_else(|| Error::Tls(format!("no private key found in {}", path.display())))
}
