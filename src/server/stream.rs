// src/server/stream.rs

//! The byte streams the HTTP layer runs on, plain or TLS.

use axum::serve::Listener;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;
use tokio_rustls::server::TlsStream;
use tracing::{debug, error, info, warn};

const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// An enum to wrap different stream types (plain TCP or TLS) into a single type.
pub enum AnyStream {
    Tcp(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl AsyncRead for AnyStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            AnyStream::Tcp(s) => Pin::new(s).poll_read(cx, buf),
            AnyStream::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for AnyStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<Result<usize, std::io::Error>> {
        match self.get_mut() {
            AnyStream::Tcp(s) => Pin::new(s).poll_write(cx, buf),
            AnyStream::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), std::io::Error>> {
        match self.get_mut() {
            AnyStream::Tcp(s) => Pin::new(s).poll_flush(cx),
            AnyStream::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<(), std::io::Error>> {
        match self.get_mut() {
            AnyStream::Tcp(s) => Pin::new(s).poll_shutdown(cx),
            AnyStream::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// The listening socket handed to `axum::serve`. Performs the TLS handshake,
/// when TLS is enabled, before a connection reaches HTTP.
pub struct RelayListener {
    inner: TcpListener,
    acceptor: Option<TlsAcceptor>,
}

impl RelayListener {
    pub fn new(inner: TcpListener, acceptor: Option<TlsAcceptor>) -> Self {
        Self { inner, acceptor }
    }

    pub fn is_tls(&self) -> bool {
        self.acceptor.is_some()
    }
}

impl Listener for RelayListener {
    type Io = AnyStream;
    type Addr = SocketAddr;

    async fn accept(&mut self) -> (Self::Io, Self::Addr) {
        loop {
            let (socket, addr) = match self.inner.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    // e.g. EMFILE; back off before retrying.
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    continue;
                }
            };
            info!("Accepted new connection from: {}", addr);

            let Some(acceptor) = &self.acceptor else {
                return (AnyStream::Tcp(socket), addr);
            };
            match acceptor.accept(socket).await {
                Ok(tls_stream) => {
                    debug!("TLS handshake successful for {addr}");
                    return (AnyStream::Tls(Box::new(tls_stream)), addr);
                }
                Err(e) => {
                    warn!("TLS handshake error for {addr}: {e}");
                }
            }
        }
    }

    fn local_addr(&self) -> std::io::Result<Self::Addr> {
        self.inner.local_addr()
    }
}
