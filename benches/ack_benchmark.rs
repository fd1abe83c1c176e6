use std::time::Duration;

use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use tokio::time::Instant;

use udptest::client::{StatsAccumulator, ingest::ingest_ack};
use udptest::protocol::types::Sequence;

const IN_FLIGHT: u32 = 1024;

fn primed(start: Instant) -> StatsAccumulator {
    let mut stats = StatsAccumulator::new();
    for seq in 0..IN_FLIGHT {
        stats.record_send(Sequence::new(seq), 1250, start);
    }
    stats
}

fn bench_record(c: &mut Criterion) {
    let start = Instant::now();
    let later = start + Duration::from_millis(1);

    c.bench_function("stats_ack_1024_in_order", |b| {
        b.iter_batched(
            || primed(start),
            |mut stats| {
                for seq in 0..IN_FLIGHT {
                    black_box(stats.record_ack(Sequence::new(seq), later));
                }
                stats
            },
            BatchSize::SmallInput,
        )
    });

    c.bench_function("stats_ack_1024_reversed", |b| {
        b.iter_batched(
            || primed(start),
            |mut stats| {
                for seq in (0..IN_FLIGHT).rev() {
                    black_box(stats.record_ack(Sequence::new(seq), later));
                }
                stats
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_ingest(c: &mut Criterion) {
    let start = Instant::now();
    let later = start + Duration::from_millis(1);
    let datagrams: Vec<[u8; 4]> = (0..IN_FLIGHT).map(u32::to_be_bytes).collect();

    c.bench_function("ingest_ack_1024", |b| {
        b.iter_batched(
            || primed(start),
            |mut stats| {
                for datagram in &datagrams {
                    black_box(ingest_ack(&mut stats, datagram, later));
                }
                stats
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_record, bench_ingest);
criterion_main!(benches);
