use std::time::Duration;

use rama::{error::BoxError, http::Response};

mod human;
mod json;

pub use self::{human::HumanReporter, json::JsonlReporter};

pub trait Reporter: Send + Sync + 'static {
    fn on_result(&mut self, ev: &IterationResultEvent);
    fn on_tick(&mut self, now: Duration);
    fn finish(&mut self);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub total: u64,
    pub ok: u64,
    pub http_fail: u64,
    pub other_fail: u64,
}

impl Counters {
    pub fn record(&mut self, outcome: &RequestOutcome) {
        self.total += 1;
        if outcome.ok {
            self.ok += 1;
            return;
        }
        match outcome.failure {
            Some(FailureKind::HttpStatus) => self.http_fail += 1,
            _ => self.other_fail += 1,
        }
    }

    pub fn failed(&self) -> u64 {
        self.total - self.ok
    }
}

/// Min, max and mean of iteration durations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DurationStats {
    count: u32,
    min: Duration,
    max: Duration,
    sum: Duration,
}

impl DurationStats {
    pub fn record(&mut self, d: Duration) {
        if self.count == 0 || d < self.min {
            self.min = d;
        }
        if d > self.max {
            self.max = d;
        }
        self.sum = self.sum.saturating_add(d);
        self.count = self.count.saturating_add(1);
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    pub fn avg(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            self.sum / self.count
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    HttpStatus,
    Other,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::HttpStatus => "http_status",
            FailureKind::Other => "other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOutcome {
    pub ok: bool,
    pub status: Option<u16>,
    pub failure: Option<FailureKind>,
}

impl RequestOutcome {
    /// Classify the result of a single iteration for bookkeeping.
    ///
    /// Statuses in `200..400` pass, any other status is a http failure,
    /// and no response at all is an "other" failure.
    pub fn classify(result: &Result<Response, BoxError>) -> Self {
        match result {
            Ok(resp) => {
                let status = resp.status().as_u16();
                if (200..400).contains(&status) {
                    Self {
                        ok: true,
                        status: Some(status),
                        failure: None,
                    }
                } else {
                    Self {
                        ok: false,
                        status: Some(status),
                        failure: Some(FailureKind::HttpStatus),
                    }
                }
            }
            Err(_) => Self {
                ok: false,
                status: None,
                failure: Some(FailureKind::Other),
            },
        }
    }
}

#[derive(Debug)]
pub struct IterationResultEvent {
    /// time since the start of the run
    pub elapsed: Duration,
    pub vu: usize,
    pub iteration: usize,
    /// duration of the full iteration, pause included
    pub duration: Duration,
    pub outcome: RequestOutcome,
}

#[cfg(test)]
mod tests {
    use rama::http::{StatusCode, service::web::response::IntoResponse as _};

    use super::*;

    #[test]
    fn test_classify_outcome() {
        for (result, expected) in [
            (
                Ok(StatusCode::OK.into_response()),
                RequestOutcome {
                    ok: true,
                    status: Some(200),
                    failure: None,
                },
            ),
            (
                Ok(StatusCode::MOVED_PERMANENTLY.into_response()),
                RequestOutcome {
                    ok: true,
                    status: Some(301),
                    failure: None,
                },
            ),
            (
                Ok(StatusCode::NOT_FOUND.into_response()),
                RequestOutcome {
                    ok: false,
                    status: Some(404),
                    failure: Some(FailureKind::HttpStatus),
                },
            ),
            (
                Ok(StatusCode::SERVICE_UNAVAILABLE.into_response()),
                RequestOutcome {
                    ok: false,
                    status: Some(503),
                    failure: Some(FailureKind::HttpStatus),
                },
            ),
            (
                Err(BoxError::from("connection refused")),
                RequestOutcome {
                    ok: false,
                    status: None,
                    failure: Some(FailureKind::Other),
                },
            ),
        ] {
            assert_eq!(RequestOutcome::classify(&result), expected);
        }
    }

    #[test]
    fn test_counters_record() {
        let mut c = Counters::default();
        c.record(&RequestOutcome {
            ok: true,
            status: Some(200),
            failure: None,
        });
        c.record(&RequestOutcome {
            ok: false,
            status: Some(500),
            failure: Some(FailureKind::HttpStatus),
        });
        c.record(&RequestOutcome {
            ok: false,
            status: None,
            failure: Some(FailureKind::Other),
        });
        assert_eq!(
            c,
            Counters {
                total: 3,
                ok: 1,
                http_fail: 1,
                other_fail: 1,
            }
        );
        assert_eq!(c.failed(), 2);
    }

    #[test]
    fn test_duration_stats() {
        let mut stats = DurationStats::default();
        assert_eq!(stats.avg(), Duration::ZERO);

        stats.record(Duration::from_millis(1200));
        stats.record(Duration::from_millis(1000));
        stats.record(Duration::from_millis(1400));

        assert_eq!(stats.min(), Duration::from_millis(1000));
        assert_eq!(stats.max(), Duration::from_millis(1400));
        assert_eq!(stats.avg(), Duration::from_millis(1200));
    }
}
