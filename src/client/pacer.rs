use std::time::Duration;

use tokio::time::Instant;

/// Fixed-rate send scheduler.
///
/// Deadlines are absolute: each one is the previous deadline plus the
/// interval, never `now + interval`, so late wakeups do not accumulate into
/// rate drift. A wakeup that is several intervals late fires once per missed
/// deadline, and every firing owes one send.
#[derive(Debug, Clone)]
pub struct Pacer {
    interval: Duration,
    next_deadline: Instant,
    pending: u32,
    firings: u64,
}

impl Pacer {
    /// Starts pacing at `start`. The first packet is owed immediately; the
    /// first timer firing is one interval later.
    pub fn start(interval: Duration, start: Instant) -> Self {
        Self {
            interval,
            next_deadline: start + interval,
            pending: 1,
            firings: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Instant at which the timer should next fire.
    pub fn deadline(&self) -> Instant {
        self.next_deadline
    }

    /// Records a timer firing and schedules the next one. The firing owes
    /// one more send; if a send is already outstanding it queues behind it.
    pub fn on_fire(&mut self) {
        self.pending += 1;
        self.firings += 1;
        self.next_deadline += self.interval;
    }

    /// Records a completed send.
    pub fn on_sent(&mut self) {
        self.pending = self.pending.saturating_sub(1);
    }

    /// Whether a send is owed. Sends are issued back to back while this
    /// holds, so a sender that fell behind catches up greedily.
    pub fn has_pending(&self) -> bool {
        self.pending > 0
    }

    pub fn pending(&self) -> u32 {
        self.pending
    }

    pub fn firings(&self) -> u64 {
        self.firings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadlines_form_arithmetic_progression() {
        let start = Instant::now();
        let interval = Duration::from_micros(10_000);
        let mut pacer = Pacer::start(interval, start);

        for k in 1..=500u32 {
            assert_eq!(pacer.deadline(), start + interval * k);
            pacer.on_fire();
            pacer.on_sent();
        }
    }

    #[test]
    fn firing_while_busy_queues_send() {
        let mut pacer = Pacer::start(Duration::from_millis(10), Instant::now());
        assert_eq!(pacer.pending(), 1);

        // Initial send still outstanding.
        pacer.on_fire();
        pacer.on_fire();
        assert_eq!(pacer.pending(), 3);
        assert_eq!(pacer.firings(), 2);

        pacer.on_sent();
        pacer.on_sent();
        pacer.on_sent();
        assert!(!pacer.has_pending());

        pacer.on_fire();
        assert!(pacer.has_pending());
        assert_eq!(pacer.pending(), 1);
    }

    #[test]
    fn on_sent_never_underflows() {
        let mut pacer = Pacer::start(Duration::from_millis(1), Instant::now());
        pacer.on_sent();
        pacer.on_sent();
        assert_eq!(pacer.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn firing_count_matches_rate_under_jitter() {
        let rate = 250u32;
        let run = Duration::from_secs(4);
        let start = Instant::now();
        let end = start + run;
        let mut pacer = Pacer::start(Duration::from_micros(1_000_000 / rate as u64), start);

        let mut jitter = 0u64;
        loop {
            let deadline = pacer.deadline();
            if deadline > end {
                break;
            }
            tokio::time::sleep_until(deadline).await;
            // Wake up late by a varying amount, sometimes past the next deadline.
            jitter = (jitter * 7 + 3) % 11;
            tokio::time::advance(Duration::from_micros(jitter * 700)).await;
            pacer.on_fire();
            pacer.on_sent();
        }

        let expected = rate as u64 * run.as_secs();
        assert!(pacer.firings().abs_diff(expected) <= 1, "fired {}", pacer.firings());
        assert_eq!(pacer.deadline(), start + pacer.interval() * (pacer.firings() as u32 + 1));
    }
}
