use std::{io::Write, time::Duration};

use rama::telemetry::tracing;

use super::{Counters, DurationStats, IterationResultEvent, Reporter};

pub struct HumanReporter<W = std::io::Stdout> {
    writer: W,
    interval: Duration,
    last_tick: Duration,
    interval_counts: Counters,
    total_counts: Counters,
    durations: DurationStats,
    last_pos: Option<(usize, usize)>,
}

impl HumanReporter {
    pub fn new(interval: Duration) -> Self {
        Self::with_writer(interval, std::io::stdout())
    }
}

impl<W> HumanReporter<W> {
    pub fn with_writer(interval: Duration, writer: W) -> Self {
        Self {
            writer,
            interval,
            last_tick: Duration::ZERO,
            interval_counts: Counters::default(),
            total_counts: Counters::default(),
            durations: DurationStats::default(),
            last_pos: None,
        }
    }
}

impl<W: Write + Send + Sync + 'static> Reporter for HumanReporter<W> {
    fn on_result(&mut self, ev: &IterationResultEvent) {
        self.interval_counts.record(&ev.outcome);
        self.total_counts.record(&ev.outcome);
        self.durations.record(ev.duration);
        self.last_pos = Some((ev.vu, ev.iteration));
    }

    fn on_tick(&mut self, now: Duration) {
        if now.saturating_sub(self.last_tick) < self.interval {
            return;
        }
        self.last_tick = now;

        let (vu, it) = self.last_pos.unwrap_or_default();

        if let Err(err) = writeln!(
            self.writer,
            "t={:.1}s vu={} it={} iterations={} ok={} http_fail={} other_fail={} total_ok={} total_fail={}",
            now.as_secs_f64(),
            vu,
            it,
            self.interval_counts.total,
            self.interval_counts.ok,
            self.interval_counts.http_fail,
            self.interval_counts.other_fail,
            self.total_counts.ok,
            self.total_counts.failed(),
        ) {
            tracing::debug!("failed to write human report line: {err}");
        }

        self.interval_counts = Counters::default();
    }

    fn finish(&mut self) {
        if let Err(err) = writeln!(
            self.writer,
            "done ok={} http_fail={} other_fail={} total={} iteration_duration(min={:?} avg={:?} max={:?})",
            self.total_counts.ok,
            self.total_counts.http_fail,
            self.total_counts.other_fail,
            self.total_counts.total,
            self.durations.min(),
            self.durations.avg(),
            self.durations.max(),
        ) {
            tracing::debug!("failed to write human report summary: {err}");
        }
    }
}
