//! Byte transports: plain TCP and TLS-wrapped TCP.
//!
//! The secure variant differs only in how the stream is established (rustls
//! handshake before the first write); everything above reads and writes the
//! same `AsyncRead + AsyncWrite` surface.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;

use crate::base::HttpError;
use crate::url::Authority;

/// Root certificate store: platform native certs, webpki-roots as fallback.
fn build_root_store() -> RootCertStore {
    let mut roots = RootCertStore::empty();
    if let Ok(certs) = rustls_native_certs::load_native_certs() {
        for cert in certs {
            let _ = roots.add(cert);
        }
    }
    if roots.is_empty() {
        roots.roots = webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect();
    }
    roots
}

static CONNECTOR: std::sync::OnceLock<TlsConnector> = std::sync::OnceLock::new();

fn connector() -> &'static TlsConnector {
    CONNECTOR.get_or_init(|| {
        let config = ClientConfig::builder()
            .with_root_certificates(build_root_store())
            .with_no_client_auth();
        TlsConnector::from(Arc::new(config))
    })
}

/// One connected byte stream to an authority: plain TCP or TLS over TCP.
pub enum ConnectionStream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl ConnectionStream {
    /// Dial the authority. For the secure scheme the TLS handshake runs
    /// before this returns, so the first write always lands encrypted.
    pub async fn connect(authority: &Authority) -> Result<ConnectionStream, HttpError> {
        let addr = format!("{}:{}", authority.host, authority.port);
        tracing::debug!(authority = %authority, "connecting");
        let tcp = TcpStream::connect(&addr)
            .await
            .map_err(|e| HttpError::Connect(format!("{addr}: {e}")))?;

        if authority.scheme.eq_ignore_ascii_case("https") {
            let server_name = ServerName::try_from(authority.host.clone())
                .map_err(|_| HttpError::Tls(format!("invalid server name: {}", authority.host)))?;
            let tls = connector()
                .connect(server_name, tcp)
                .await
                .map_err(|e| HttpError::Tls(e.to_string()))?;
            Ok(ConnectionStream::Tls(Box::new(tls)))
        } else {
            Ok(ConnectionStream::Plain(tcp))
        }
    }
}

impl AsyncRead for ConnectionStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match &mut *self {
            ConnectionStream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            ConnectionStream::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for ConnectionStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match &mut *self {
            ConnectionStream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            ConnectionStream::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            ConnectionStream::Plain(s) => Pin::new(s).poll_flush(cx),
            ConnectionStream::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            ConnectionStream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            ConnectionStream::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}
