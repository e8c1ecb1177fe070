use std::{io::Write, time::Duration};

use rama::telemetry::tracing;

use super::{Counters, DurationStats, IterationResultEvent, Reporter};

pub struct JsonlReporter<W = std::io::Stdout> {
    writer: W,
    interval: Duration,
    last_tick: Duration,
    interval_counts: Counters,
    total_counts: Counters,
    durations: DurationStats,
    last_pos: Option<(usize, usize)>,
    emit_events: bool,
}

impl JsonlReporter {
    pub fn new(interval: Duration, emit_events: bool) -> Self {
        Self::with_writer(interval, emit_events, std::io::stdout())
    }
}

impl<W> JsonlReporter<W> {
    pub fn with_writer(interval: Duration, emit_events: bool, writer: W) -> Self {
        Self {
            writer,
            interval,
            last_tick: Duration::ZERO,
            interval_counts: Counters::default(),
            total_counts: Counters::default(),
            durations: DurationStats::default(),
            last_pos: None,
            emit_events,
        }
    }
}

impl<W: Write> JsonlReporter<W> {
    fn emit(&mut self, line: serde_json::Value) {
        if let Err(err) = writeln!(self.writer, "{line}") {
            tracing::debug!("failed to write json report line: {err}");
        }
    }
}

fn counters_json(c: &Counters) -> serde_json::Value {
    serde_json::json!({
        "total": c.total,
        "ok": c.ok,
        "http_fail": c.http_fail,
        "other_fail": c.other_fail,
    })
}

impl<W: Write + Send + Sync + 'static> Reporter for JsonlReporter<W> {
    fn on_result(&mut self, ev: &IterationResultEvent) {
        self.interval_counts.record(&ev.outcome);
        self.total_counts.record(&ev.outcome);
        self.durations.record(ev.duration);
        self.last_pos = Some((ev.vu, ev.iteration));

        if self.emit_events {
            self.emit(serde_json::json!({
                "type": "event",
                "t_ms": ev.elapsed.as_millis(),
                "vu": ev.vu,
                "iteration": ev.iteration,
                "duration_ms": ev.duration.as_millis(),
                "ok": ev.outcome.ok,
                "status": ev.outcome.status,
                "failure": ev.outcome.failure.map(|f| f.as_str()),
            }));
        }
    }

    fn on_tick(&mut self, now: Duration) {
        if now.saturating_sub(self.last_tick) < self.interval {
            return;
        }
        self.last_tick = now;

        let (vu, iteration) = self.last_pos.unwrap_or_default();

        let line = serde_json::json!({
            "type": "summary",
            "t_ms": now.as_millis(),
            "vu": vu,
            "iteration": iteration,
            "interval_ms": self.interval.as_millis(),
            "interval": counters_json(&self.interval_counts),
            "total": counters_json(&self.total_counts),
        });
        self.emit(line);

        self.interval_counts = Counters::default();
    }

    fn finish(&mut self) {
        let line = serde_json::json!({
            "type": "final",
            "total": counters_json(&self.total_counts),
            "iteration_duration_ms": {
                "min": self.durations.min().as_millis(),
                "avg": self.durations.avg().as_millis(),
                "max": self.durations.max().as_millis(),
            },
        });
        self.emit(line);
    }
}
