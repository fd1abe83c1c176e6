//! Throughput, loss and latency accounting for one client run.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::protocol::types::Sequence;

const BIT_SUFFIXES: [&str; 4] = ["", "K", "M", "G"];

/// Renders a bit count with a 1000x-step suffix, e.g. `9M`.
pub fn format_bits(mut bits: u64) -> String {
    let mut i = 0;
    while bits > 1000 && i < BIT_SUFFIXES.len() - 1 {
        bits /= 1000;
        i += 1;
    }
    format!("{}{}", bits, BIT_SUFFIXES[i])
}

fn format_latency(latency: Option<Duration>) -> String {
    match latency {
        Some(d) => format!("{:.3} ms", d.as_secs_f64() * 1000.0),
        None => "n/a".to_string(),
    }
}

fn percent(part: u64, whole: u64) -> Option<f64> {
    (whole != 0).then(|| part as f64 / whole as f64 * 100.0)
}

#[derive(Debug, Default, Clone, Copy)]
struct LatencySum {
    total: Duration,
    max: Duration,
    samples: u64,
}

impl LatencySum {
    fn add(&mut self, latency: Duration) {
        self.total += latency;
        self.max = self.max.max(latency);
        self.samples += 1;
    }

    fn average(&self) -> Option<Duration> {
        if self.samples == 0 {
            return None;
        }
        let samples = u32::try_from(self.samples).unwrap_or(u32::MAX);
        Some(self.total / samples)
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Window {
    bytes: u64,
    packets: u64,
    latency: LatencySum,
}

/// Running and windowed counters for one run.
///
/// Every send is timestamped under its sequence number; the matching ack
/// removes the entry exactly once and yields the round trip.
#[derive(Debug, Default)]
pub struct StatsAccumulator {
    send_times: HashMap<Sequence, Instant>,
    bytes_sent: u64,
    packets_sent: u64,
    latency: LatencySum,
    untracked_acks: u64,
    window: Window,
}

impl StatsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_send(&mut self, seq: Sequence, bytes: usize, at: Instant) {
        self.send_times.insert(seq, at);
        self.bytes_sent += bytes as u64;
        self.packets_sent += 1;
        self.window.bytes += bytes as u64;
        self.window.packets += 1;
    }

    /// Matches an ack to its send. Returns the round trip, or `None` for an
    /// ack whose sequence is not outstanding (stray, duplicate or late).
    pub fn record_ack(&mut self, seq: Sequence, at: Instant) -> Option<Duration> {
        let Some(sent_at) = self.send_times.remove(&seq) else {
            self.untracked_acks += 1;
            return None;
        };
        let latency = at.saturating_duration_since(sent_at);
        self.latency.add(latency);
        self.window.latency.add(latency);
        Some(latency)
    }

    /// Sends still waiting for their ack.
    pub fn outstanding(&self) -> usize {
        self.send_times.len()
    }

    pub fn packets_sent(&self) -> u64 {
        self.packets_sent
    }

    pub fn packets_acked(&self) -> u64 {
        self.latency.samples
    }

    /// Returns the counters of the window that just ended and starts a new one.
    pub fn take_window(&mut self) -> WindowReport {
        let window = std::mem::take(&mut self.window);
        WindowReport {
            bytes: window.bytes,
            packets: window.packets,
            acks: window.latency.samples,
            average_latency: window.latency.average(),
            max_latency: (window.latency.samples > 0).then_some(window.latency.max),
        }
    }

    /// Builds the end-of-run report. `pending` is the number of sends still
    /// owed by the pacer when the run was cut off.
    pub fn finish(&self, pending: u32, elapsed: Duration) -> RunReport {
        RunReport {
            packets_sent: self.packets_sent,
            packets_acked: self.latency.samples,
            packets_unsent: u64::from(pending),
            untracked_acks: self.untracked_acks,
            bytes_sent: self.bytes_sent,
            elapsed,
            average_latency: self.latency.average(),
            max_latency: (self.latency.samples > 0).then_some(self.latency.max),
        }
    }
}

/// Counters of one reporting window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowReport {
    pub bytes: u64,
    pub packets: u64,
    pub acks: u64,
    pub average_latency: Option<Duration>,
    pub max_latency: Option<Duration>,
}

impl WindowReport {
    pub fn log(&self) {
        tracing::info!("-------- Info --------");
        tracing::info!(
            "Bits sent: {}\tPackets sent: {}\tAcks received: {}",
            format_bits(self.bytes * 8),
            self.packets,
            self.acks
        );
        tracing::info!(
            "Average latency: {}\tMax latency: {}",
            format_latency(self.average_latency),
            format_latency(self.max_latency)
        );
    }
}

/// End-of-run figures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunReport {
    pub packets_sent: u64,
    pub packets_acked: u64,
    /// Sends the pacer still owed when the run ended.
    pub packets_unsent: u64,
    pub untracked_acks: u64,
    pub bytes_sent: u64,
    pub elapsed: Duration,
    /// `None` when no ack arrived.
    pub average_latency: Option<Duration>,
    pub max_latency: Option<Duration>,
}

impl RunReport {
    pub fn packets_lost(&self) -> u64 {
        self.packets_sent.saturating_sub(self.packets_acked)
    }

    pub fn loss_percent(&self) -> Option<f64> {
        percent(self.packets_lost(), self.packets_sent)
    }

    /// Cosmetic: share of owed sends that never went out.
    pub fn unsent_percent(&self) -> Option<f64> {
        percent(self.packets_unsent, self.packets_unsent + self.packets_sent)
    }

    /// Achieved bits per second over the elapsed run time.
    pub fn ending_bitrate(&self) -> u64 {
        let micros = self.elapsed.as_micros();
        if micros == 0 {
            return 0;
        }
        let bits = u128::from(self.bytes_sent) * 8 * 1_000_000;
        u64::try_from(bits / micros).unwrap_or(u64::MAX)
    }

    pub fn log(&self) {
        let pct = |p: Option<f64>| match p {
            Some(p) => format!("{:.2}%", p),
            None => "n/a".to_string(),
        };
        tracing::info!("End stats:");
        tracing::info!(
            "Total packets sent: {}\tTotal packets received: {}",
            self.packets_sent,
            self.packets_acked
        );
        tracing::info!(
            "Packets lost: {} ({})\tPackets unsent: {} ({})",
            self.packets_lost(),
            pct(self.loss_percent()),
            self.packets_unsent,
            pct(self.unsent_percent())
        );
        tracing::info!(
            "Total bits sent: {}\tEnding bitrate: {}",
            format_bits(self.bytes_sent * 8),
            format_bits(self.ending_bitrate())
        );
        tracing::info!(
            "Average latency: {}\tMax latency: {}",
            format_latency(self.average_latency),
            format_latency(self.max_latency)
        );
        if self.untracked_acks > 0 {
            tracing::warn!("Untracked acks: {}", self.untracked_acks);
        }
    }
}
