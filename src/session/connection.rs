use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};

use crate::protocol::{
    constants,
    packet::{Command, Request, Response, Status},
    state::ControlState,
};
use crate::session::ConnectionId;
use crate::transport::{ControlChannel, TransportSession};

/// One client's control session on the server.
pub struct Connection {
    peer: SocketAddr,
    /// Local address of the control stream; the transport socket binds here.
    local_ip: Option<Ipv4Addr>,
    control: ControlChannel<TcpStream>,
    transport: Option<TransportSession>,
    state: ControlState,
}

/// Why a connection's task ended.
enum Exit {
    Stopped,
    ControlFailed,
    TransportFailed,
}

impl Connection {
    pub fn new(stream: TcpStream) -> io::Result<Self> {
        let peer = stream.peer_addr()?;
        let local_ip = match stream.local_addr()?.ip() {
            IpAddr::V4(ip) => Some(ip),
            IpAddr::V6(ip) => ip.to_ipv4_mapped(),
        };
        Ok(Self {
            peer,
            local_ip,
            control: ControlChannel::new(stream),
            transport: None,
            state: ControlState::Idle,
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn state(&self) -> ControlState {
        self.state
    }

    /// Applies one request to the control state machine and returns the reply.
    pub async fn handle_request(&mut self, req: Request) -> Response {
        match req.command {
            Command::Open => self.open(req.payload_size).await,
            Command::Close => self.close().await,
        }
    }

    async fn open(&mut self, payload_size: u32) -> Response {
        if let Some(transport) = &self.transport {
            tracing::debug!(
                peer = %self.peer,
                endpoint = %transport.local_addr(),
                "open while transport already bound"
            );
            return Response::status(Status::AlreadyOpen);
        }

        if payload_size as usize > constants::MAXIMUM_PAYLOAD_SIZE {
            tracing::warn!(peer = %self.peer, payload_size, "requested payload exceeds datagram limit");
            return Response::status(Status::FailedToOpen);
        }

        let Some(ip) = self.local_ip else {
            tracing::error!(peer = %self.peer, "control stream is not IPv4, cannot open transport");
            return Response::status(Status::FailedToOpen);
        };

        match TransportSession::open(ip, payload_size).await {
            Ok(transport) => {
                let endpoint = transport.local_addr();
                tracing::debug!(
                    peer = %self.peer,
                    endpoint = %endpoint,
                    payload_size,
                    "opened transport socket"
                );
                self.transport = Some(transport);
                self.state = ControlState::Active;
                Response::ok(endpoint)
            }
            Err(e) => {
                tracing::error!(peer = %self.peer, "Failed to open transport socket: {}", e);
                Response::status(Status::FailedToOpen)
            }
        }
    }

    async fn close(&mut self) -> Response {
        self.state = ControlState::Idle;
        let Some(transport) = self.transport.take() else {
            return Response::status(Status::Ok);
        };
        match transport.close().await {
            Ok(()) => {
                tracing::debug!(peer = %self.peer, "closed transport socket");
                Response::status(Status::Ok)
            }
            Err(e) => {
                tracing::warn!(peer = %self.peer, "Failed to close transport socket: {}", e);
                Response::status(Status::FailedToClose)
            }
        }
    }

    /// Serves requests until the peer goes away, a socket fails, or `stop`
    /// fires. Reports self-initiated exits on `finished` so the registry can
    /// evict this connection.
    pub(crate) async fn run(
        mut self,
        id: ConnectionId,
        mut stop: oneshot::Receiver<()>,
        finished: mpsc::UnboundedSender<ConnectionId>,
    ) {
        let exit = loop {
            tokio::select! {
                _ = &mut stop => break Exit::Stopped,

                e = wait_failed(&mut self.transport) => {
                    tracing::error!(peer = %self.peer, id = %id, "Transport failed: {}", e);
                    // The echo task has already been joined; nothing left to close.
                    self.transport = None;
                    break Exit::TransportFailed;
                }

                res = self.control.recv::<Request>() => {
                    let req = match res {
                        Ok(req) => req,
                        Err(e) => {
                            tracing::error!(peer = %self.peer, id = %id, "Control disconnect on read: {}", e);
                            break Exit::ControlFailed;
                        }
                    };
                    tracing::debug!(peer = %self.peer, command = ?req.command, "received request");

                    let rsp = self.handle_request(req).await;
                    if let Err(e) = self.control.send(&rsp).await {
                        tracing::error!(peer = %self.peer, id = %id, "Control disconnect on write: {}", e);
                        break Exit::ControlFailed;
                    }
                    tracing::debug!(peer = %self.peer, status = %rsp.status, state = %self.state, "wrote response");
                }
            }
        };

        self.shutdown().await;
        if !matches!(exit, Exit::Stopped) {
            let _ = finished.send(id);
        }
        tracing::info!(peer = %self.peer, id = %id, "Stopped connection");
    }

    /// Releases both sockets.
    async fn shutdown(&mut self) {
        if let Some(transport) = self.transport.take() {
            let _ = transport.close().await;
        }
        self.state = ControlState::Idle;
        self.control.shutdown().await;
    }
}

async fn wait_failed(transport: &mut Option<TransportSession>) -> io::Error {
    match transport {
        Some(t) => t.failed().await,
        None => std::future::pending().await,
    }
}
