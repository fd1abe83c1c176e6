use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use bytes::BytesMut;
use tokio::net::UdpSocket;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::protocol::{
    constants,
    packet::{PacketAck, RandomPacket, WireEncodable},
};

/// Server-side UDP reflector for one session.
///
/// Every datagram received is answered with a `PacketAck` carrying its
/// sequence number, sent back to the exact source address. No buffering,
/// reordering or rate shaping happens here.
pub struct TransportSession {
    local_addr: SocketAddrV4,
    payload_size: u32,
    cancel: Option<oneshot::Sender<()>>,
    task: JoinHandle<io::Result<()>>,
}

impl TransportSession {
    /// Binds a socket on `ip` with an OS-chosen port and starts echoing.
    pub async fn open(ip: Ipv4Addr, payload_size: u32) -> io::Result<Self> {
        let socket = UdpSocket::bind(SocketAddrV4::new(ip, 0)).await?;
        let local_addr = match socket.local_addr()? {
            SocketAddr::V4(addr) => addr,
            SocketAddr::V6(addr) => {
                return Err(io::Error::new(
                    io::ErrorKind::AddrNotAvailable,
                    format!("transport bound to non-IPv4 address {addr}"),
                ));
            }
        };

        let datagram_size = payload_size as usize + constants::SEQUENCE_HEADER_SIZE;
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let task = tokio::spawn(run_echo(socket, datagram_size, cancel_rx));

        Ok(Self {
            local_addr,
            payload_size,
            cancel: Some(cancel_tx),
            task,
        })
    }

    pub fn local_addr(&self) -> SocketAddrV4 {
        self.local_addr
    }

    pub fn payload_size(&self) -> u32 {
        self.payload_size
    }

    /// Resolves only if the echo loop ends on its own, i.e. the socket failed.
    pub async fn failed(&mut self) -> io::Error {
        match (&mut self.task).await {
            Ok(Ok(())) => io::Error::other("echo loop exited"),
            Ok(Err(e)) => e,
            Err(join) => io::Error::other(join),
        }
    }

    /// Cancels any in-flight receive and releases the socket.
    ///
    /// Reports an error if the loop had already failed or panicked.
    pub async fn close(mut self) -> io::Result<()> {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
        match (&mut self.task).await {
            Ok(res) => res,
            Err(join) => Err(io::Error::other(join)),
        }
    }
}

impl Drop for TransportSession {
    fn drop(&mut self) {
        // A session dropped without close() must not leak its socket.
        self.task.abort();
    }
}

async fn run_echo(
    socket: UdpSocket,
    datagram_size: usize,
    mut cancel: oneshot::Receiver<()>,
) -> io::Result<()> {
    let mut buf = vec![0u8; datagram_size];
    let mut ack = BytesMut::with_capacity(constants::PACKET_ACK_SIZE);
    let mut last_peer: Option<SocketAddr> = None;

    loop {
        let (len, peer) = tokio::select! {
            _ = &mut cancel => return Ok(()),
            res = socket.recv_from(&mut buf) => match res {
                Ok(v) => v,
                Err(e) if e.kind() == io::ErrorKind::ConnectionReset => {
                    // Windows ICMP port unreachable - ignore
                    continue;
                }
                Err(e) => {
                    tracing::error!("Transport error on read: {}", e);
                    return Err(e);
                }
            }
        };

        let seq = match RandomPacket::peek_seq(&buf[..len]) {
            Ok(seq) => seq,
            Err(e) => {
                tracing::debug!(peer = %peer, len, error = %e, "dropping runt datagram");
                continue;
            }
        };

        if last_peer != Some(peer) {
            tracing::debug!(peer = %peer, "transport peer");
            last_peer = Some(peer);
        }
        tracing::trace!(peer = %peer, seq = %seq, "received random packet");

        ack.clear();
        PacketAck { seq }.encode_wire(&mut ack);

        tokio::select! {
            _ = &mut cancel => return Ok(()),
            res = socket.send_to(&ack, peer) => {
                if let Err(e) = res {
                    tracing::error!("Transport error on write: {}", e);
                    return Err(e);
                }
                tracing::trace!(seq = %seq, "wrote ack");
            }
        }
    }
}
