use std::time::Duration;

use tokio::time::Instant;

use crate::client::stats::StatsAccumulator;
use crate::protocol::{
    packet::{DecodeError, PacketAck, WireEncodable},
    types::Sequence,
};

/// What became of one datagram read from the transport socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckOutcome {
    /// Matched an outstanding send.
    Tracked { seq: Sequence, latency: Duration },
    /// Stray, duplicate or late ack; counters are left alone.
    Untracked(Sequence),
    /// Too short to carry a sequence number.
    Malformed(DecodeError),
}

/// Folds one received datagram into the run's statistics.
pub fn ingest_ack(stats: &mut StatsAccumulator, datagram: &[u8], now: Instant) -> AckOutcome {
    let mut src = datagram;
    let ack = match PacketAck::decode_wire(&mut src) {
        Ok(ack) => ack,
        Err(e) => {
            tracing::debug!(len = datagram.len(), error = %e, "dropping malformed ack");
            return AckOutcome::Malformed(e);
        }
    };

    match stats.record_ack(ack.seq, now) {
        Some(latency) => {
            tracing::trace!(seq = %ack.seq, ?latency, "received ack");
            AckOutcome::Tracked {
                seq: ack.seq,
                latency,
            }
        }
        None => {
            tracing::warn!("Untracked seq: {}", ack.seq);
            AckOutcome::Untracked(ack.seq)
        }
    }
}
