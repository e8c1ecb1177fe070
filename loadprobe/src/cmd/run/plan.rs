use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use tokio::time::Instant;

/// Upper bound of concurrent virtual users.
pub const MAX_VUS: usize = 10_000;

/// Parse a virtual user count in `1..=MAX_VUS`.
pub fn parse_vus(input: &str) -> Result<usize, String> {
    let vus: usize = input
        .trim()
        .parse()
        .map_err(|err| format!("invalid vus '{input}': {err}"))?;
    if !(1..=MAX_VUS).contains(&vus) {
        return Err(format!("invalid vus '{input}': expected 1..={MAX_VUS}"));
    }
    Ok(vus)
}

/// Parse a (fractional) amount of seconds as a [`Duration`].
///
/// Negative, NaN, infinite and out-of-range values are rejected.
pub fn parse_duration_secs(input: &str) -> Result<Duration, String> {
    let secs: f64 = input
        .trim()
        .parse()
        .map_err(|err| format!("invalid seconds '{input}': {err}"))?;
    if !secs.is_finite() || secs < 0. {
        return Err(format!(
            "invalid seconds '{input}': expected a finite, non-negative number"
        ));
    }
    Duration::try_from_secs_f64(secs).map_err(|err| format!("invalid seconds '{input}': {err}"))
}

/// How many virtual users run the script, and for how long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionPlan {
    pub vus: usize,
    /// Total iterations, shared between all virtual users.
    pub iterations: Option<usize>,
    /// No iteration starts once this much time has passed.
    pub duration: Option<Duration>,
}

impl ExecutionPlan {
    /// Without iterations nor duration the script runs exactly once.
    pub fn new(vus: usize, iterations: Option<usize>, duration: Option<Duration>) -> Self {
        let duration = duration.filter(|d| !d.is_zero());
        let iterations = match (iterations, duration) {
            (None, None) => Some(1),
            (iterations, _) => iterations,
        };
        Self {
            vus: vus.clamp(1, MAX_VUS),
            iterations,
            duration,
        }
    }
}

/// Hands out iteration indices to virtual users until the plan is exhausted.
#[derive(Debug)]
pub(super) struct IterationScheduler {
    next: AtomicUsize,
    limit: Option<usize>,
    deadline: Option<Instant>,
}

impl IterationScheduler {
    pub(super) fn new(plan: &ExecutionPlan, start: Instant) -> Self {
        Self {
            next: AtomicUsize::new(0),
            limit: plan.iterations,
            deadline: plan.duration.map(|d| start + d),
        }
    }

    /// Claim the next iteration, `None` once no iteration is allowed to start anymore.
    pub(super) fn next_iteration(&self) -> Option<usize> {
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return None;
        }
        let index = self.next.fetch_add(1, Ordering::AcqRel);
        match self.limit {
            Some(limit) if index >= limit => None,
            _ => Some(index),
        }
    }
}
