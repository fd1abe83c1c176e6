//! Test bench client.
//!
//! A run is sequenced as: connect the control stream, send `Open`, pace
//! `RandomPacket`s at the negotiated endpoint while matching acks, then send
//! `Close` once the run deadline passes.
//!
//! Setup and teardown go over the reliable control stream; only the measured
//! traffic uses UDP.

use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::net::UdpSocket;

use crate::UdptestError;
use crate::config::{ClientConfig, PacketPlan};
use crate::protocol::{
    constants,
    packet::{Request, Response},
};
use crate::transport::{ControlChannel, resolve_ipv4};

pub mod ingest;
pub mod pacer;
mod run;
pub mod stats;

pub use pacer::Pacer;
pub use stats::{RunReport, StatsAccumulator, WindowReport};

use run::{RunEnd, TransportRun};

pub struct Client {
    server: SocketAddr,
    plan: PacketPlan,
    duration: Duration,
}

impl Client {
    /// Validates `config` and resolves the server address.
    ///
    /// No traffic is sent here; every error returned is a setup error.
    pub async fn new(config: &ClientConfig) -> Result<Self, UdptestError> {
        let plan = config.plan()?;
        let server = resolve_ipv4(&config.address, config.port).await?;

        tracing::debug!(
            "Specified packet size of {} bytes, sending every {} ms",
            plan.payload_size,
            plan.interval.as_secs_f64() * 1000.0
        );
        tracing::info!(server = %server, "Started client");
        Ok(Self {
            server,
            plan,
            duration: config.duration,
        })
    }

    pub fn plan(&self) -> PacketPlan {
        self.plan
    }

    /// Performs one full run against the server.
    ///
    /// Returns `Ok(None)` if `shutdown` completed before the transport phase
    /// began. A run interrupted during the transport phase still yields its
    /// report; the server notices the dropped control stream and cleans up.
    pub async fn run(
        &self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<Option<RunReport>, UdptestError> {
        tokio::pin!(shutdown);
        tracing::info!("Running client");

        let mut control = tokio::select! {
            _ = &mut shutdown => return Ok(None),
            res = ControlChannel::connect(self.server) => res.map_err(|source| {
                tracing::error!(server = %self.server, "Failed to connect: {}", source);
                UdptestError::Connect { addr: self.server, source }
            })?,
        };
        tracing::info!(server = %self.server, "Connected to server");

        let open = Request::open(self.plan.payload_size);
        let rsp: Response = tokio::select! {
            _ = &mut shutdown => return Ok(None),
            res = control.exchange(&open) => res?,
        };
        tracing::debug!(status = %rsp.status, "Got control response");
        if !rsp.is_ok() {
            tracing::error!("Server failed to open transport socket: {}", rsp.status);
            control.shutdown().await;
            return Err(UdptestError::Rejected(rsp.status));
        }

        let endpoint = SocketAddr::V4(rsp.endpoint);
        let local = SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0));
        let socket = UdpSocket::bind(local)
            .await
            .map_err(|source| UdptestError::Bind { addr: local, source })?;
        tracing::debug!(endpoint = %endpoint, "Server opened transport socket, beginning sequence");

        let mut run = TransportRun::new(socket, endpoint, &self.plan);
        let mut end = run.drive(self.duration, shutdown.as_mut()).await;
        let elapsed = run.elapsed();
        if matches!(end, RunEnd::Completed) {
            end = run
                .drain(constants::ACK_DRAIN_TIMEOUT, shutdown.as_mut())
                .await;
        }
        let report = run.report(elapsed);
        drop(run);
        report.log();

        match end {
            RunEnd::Completed => {
                let close = Request::close();
                let closed = tokio::select! {
                    _ = &mut shutdown => None,
                    res = control.exchange::<_, Response>(&close) => Some(res),
                };
                match closed {
                    Some(Ok(rsp)) if rsp.is_ok() => tracing::debug!("Transport closed"),
                    Some(Ok(rsp)) => tracing::warn!("Error on close: {}", rsp.status),
                    Some(Err(e)) => tracing::error!("Control disconnected on close: {}", e),
                    None => tracing::debug!("Interrupted while closing"),
                }
                control.shutdown().await;
                Ok(Some(report))
            }
            RunEnd::Interrupted => {
                control.shutdown().await;
                Ok(Some(report))
            }
            RunEnd::Failed(e) => {
                tracing::error!("Transport failed: {}", e);
                control.shutdown().await;
                Err(UdptestError::Transport(e))
            }
        }
    }
}
