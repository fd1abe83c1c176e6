use std::io;
use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpSocket, TcpStream};

use crate::UdptestError;

/// Maximum number of pending control connections queued by the kernel.
pub const LISTEN_BACKLOG: u32 = 1024;

/// Server-side acceptor for control connections.
pub struct Listener {
    inner: TcpListener,
    local_addr: SocketAddr,
}

impl Listener {
    /// Binds and listens on `addr`, reporting bind and listen failures
    /// separately.
    pub fn bind(addr: SocketAddr) -> Result<Self, UdptestError> {
        let socket = match addr {
            SocketAddr::V4(_) => TcpSocket::new_v4(),
            SocketAddr::V6(_) => TcpSocket::new_v6(),
        }
        .map_err(|source| UdptestError::Bind { addr, source })?;

        socket
            .set_reuseaddr(true)
            .map_err(|source| UdptestError::Bind { addr, source })?;
        socket
            .bind(addr)
            .map_err(|source| UdptestError::Bind { addr, source })?;

        let inner = socket
            .listen(LISTEN_BACKLOG)
            .map_err(|source| UdptestError::Listen { addr, source })?;
        let local_addr = inner
            .local_addr()
            .map_err(|source| UdptestError::Listen { addr, source })?;

        Ok(Self { inner, local_addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accepts the next control connection. Cancel safe.
    pub async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        let (stream, peer) = self.inner.accept().await?;
        stream.set_nodelay(true)?;
        Ok((stream, peer))
    }
}
