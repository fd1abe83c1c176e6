use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use rand::RngCore;
use tokio::net::UdpSocket;
use tokio::time::{self, Instant};

use crate::client::{
    ingest::ingest_ack,
    pacer::Pacer,
    stats::{RunReport, StatsAccumulator},
};
use crate::config::PacketPlan;
use crate::protocol::{
    constants,
    packet::{RandomPacket, WireEncodable},
    types::Sequence,
};

/// How the measured phase ended.
#[derive(Debug)]
pub(crate) enum RunEnd {
    Completed,
    Interrupted,
    Failed(io::Error),
}

/// Transport phase of one client run: pacer, ack ingestion and stats
/// sharing a single socket on a single task.
pub(crate) struct TransportRun {
    socket: UdpSocket,
    endpoint: SocketAddr,
    payload: Bytes,
    pacer: Pacer,
    stats: StatsAccumulator,
    /// Sequence of the packet encoded in `out`, not yet sent.
    seq: Sequence,
    out: BytesMut,
    started: Instant,
}

impl TransportRun {
    pub(crate) fn new(socket: UdpSocket, endpoint: SocketAddr, plan: &PacketPlan) -> Self {
        let mut payload = vec![0u8; plan.payload_size as usize];
        rand::thread_rng().fill_bytes(&mut payload);

        let started = Instant::now();
        let mut run = Self {
            socket,
            endpoint,
            payload: Bytes::from(payload),
            pacer: Pacer::start(plan.interval, started),
            stats: StatsAccumulator::new(),
            seq: Sequence::ZERO,
            out: BytesMut::with_capacity(plan.datagram_size()),
            started,
        };
        run.encode_current();
        run
    }

    fn encode_current(&mut self) {
        self.out.clear();
        RandomPacket::new(self.seq, self.payload.clone()).encode_wire(&mut self.out);
    }

    /// Runs until `duration` has elapsed since the start, `shutdown`
    /// completes, or the socket fails. Sends still owed at that point are
    /// abandoned.
    pub(crate) async fn drive<F>(&mut self, duration: Duration, mut shutdown: Pin<&mut F>) -> RunEnd
    where
        F: Future<Output = ()>,
    {
        let end = self.started + duration;
        let mut report_deadline = self.started + constants::REPORT_INTERVAL;
        let mut ack_buf = [0u8; 64];
        tracing::info!(endpoint = %self.endpoint, "Started transport");

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => return RunEnd::Interrupted,

                _ = time::sleep_until(end) => {
                    tracing::debug!("Finished");
                    return RunEnd::Completed;
                }

                res = self.socket.recv_from(&mut ack_buf) => match res {
                    Ok((len, _)) => {
                        ingest_ack(&mut self.stats, &ack_buf[..len], Instant::now());
                    }
                    Err(e) if e.kind() == io::ErrorKind::ConnectionReset => continue,
                    Err(e) => {
                        tracing::debug!("Transport disconnected on read: {}", e);
                        return RunEnd::Failed(e);
                    }
                },

                _ = time::sleep_until(self.pacer.deadline()) => {
                    self.pacer.on_fire();
                }

                _ = time::sleep_until(report_deadline) => {
                    self.stats.take_window().log();
                    report_deadline += constants::REPORT_INTERVAL;
                }

                res = self.socket.send_to(&self.out, self.endpoint), if self.pacer.has_pending() => match res {
                    Ok(n) => {
                        self.stats.record_send(self.seq, n, Instant::now());
                        tracing::trace!(seq = %self.seq, "wrote random packet");
                        self.pacer.on_sent();
                        self.seq = self.seq.next();
                        self.encode_current();
                    }
                    Err(e) => {
                        tracing::debug!("Transport disconnected on write: {}", e);
                        return RunEnd::Failed(e);
                    }
                },
            }
        }
    }

    /// Keeps reading acks for at most `timeout` once sending has stopped,
    /// returning early when nothing is outstanding.
    pub(crate) async fn drain<F>(&mut self, timeout: Duration, mut shutdown: Pin<&mut F>) -> RunEnd
    where
        F: Future<Output = ()>,
    {
        let deadline = Instant::now() + timeout;
        let mut ack_buf = [0u8; 64];

        while self.stats.outstanding() > 0 {
            tokio::select! {
                biased;

                _ = &mut shutdown => return RunEnd::Interrupted,

                _ = time::sleep_until(deadline) => break,

                res = self.socket.recv_from(&mut ack_buf) => match res {
                    Ok((len, _)) => {
                        ingest_ack(&mut self.stats, &ack_buf[..len], Instant::now());
                    }
                    Err(e) if e.kind() == io::ErrorKind::ConnectionReset => continue,
                    Err(e) => return RunEnd::Failed(e),
                },
            }
        }
        RunEnd::Completed
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub(crate) fn report(&self, elapsed: Duration) -> RunReport {
        self.stats.finish(self.pacer.pending(), elapsed)
    }
}
