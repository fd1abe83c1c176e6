use std::io;
use std::net::SocketAddr;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::ControlError;
use crate::protocol::packet::ControlMessage;

/// Control stream carrying fixed-size requests and responses.
///
/// Exchanges are strictly half-duplex: one write, then its matching read.
/// Nothing is pipelined, so a single scratch buffer serves both directions.
pub struct ControlChannel<S = TcpStream> {
    stream: S,
    buf: BytesMut,
}

impl ControlChannel<TcpStream> {
    /// Opens a control connection to the server.
    pub async fn connect(addr: SocketAddr) -> io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self::new(stream))
    }
}

impl<S> ControlChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            buf: BytesMut::with_capacity(16),
        }
    }

    /// Writes one message in full.
    pub async fn send<M: ControlMessage>(&mut self, msg: &M) -> Result<(), ControlError> {
        self.buf.clear();
        msg.encode_wire(&mut self.buf);
        debug_assert_eq!(self.buf.len(), M::WIRE_SIZE);
        self.stream.write_all(&self.buf).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Reads exactly one message. A peer that closes the stream mid-message
    /// surfaces as an `UnexpectedEof` I/O error.
    ///
    /// Not cancel safe: dropping this future part way through a read loses
    /// the bytes read so far.
    pub async fn recv<M: ControlMessage>(&mut self) -> Result<M, ControlError> {
        self.buf.clear();
        self.buf.resize(M::WIRE_SIZE, 0);
        self.stream.read_exact(&mut self.buf[..]).await?;
        let mut src = &self.buf[..];
        Ok(M::decode_wire(&mut src)?)
    }

    /// Sends `req` and waits for the matching reply.
    pub async fn exchange<Req, Rsp>(&mut self, req: &Req) -> Result<Rsp, ControlError>
    where
        Req: ControlMessage,
        Rsp: ControlMessage,
    {
        self.send(req).await?;
        self.recv().await
    }

    /// Shuts down the write half; errors are irrelevant at this point.
    pub async fn shutdown(&mut self) {
        let _ = self.stream.shutdown().await;
    }
}
