use std::{sync::Arc, time::Duration};

use rama::{
    Service,
    error::{BoxError, ErrorContext as _},
    graceful::ShutdownGuard,
    http::{Request, Response},
    rt::Executor,
    telemetry::tracing,
};

use clap::Args;
use tokio::{
    sync::mpsc::{self, Receiver, Sender},
    task::JoinSet,
    time::{Instant, MissedTickBehavior},
};

use crate::{
    client,
    config::{self, ScriptEnv, parse_env_pair},
    script,
};

mod plan;
pub mod reporter;

pub use self::plan::ExecutionPlan;

use self::{
    plan::{IterationScheduler, parse_duration_secs, parse_vus},
    reporter::*,
};

#[derive(Debug, Clone, Args)]
/// run the probe script across virtual users
pub struct RunCommand {
    /// Number of virtual users running iterations concurrently
    #[arg(long, short = 'u', value_name = "N", default_value_t = 1, value_parser = parse_vus)]
    vus: usize,

    /// Total amount of iterations, shared between all virtual users
    ///
    /// Defaults to a single iteration when no duration is given either.
    #[arg(long, short = 'i', value_name = "N")]
    iterations: Option<usize>,

    /// Stop starting new iterations once this duration has passed
    #[arg(long, short = 'd', value_name = "SECONDS", value_parser = parse_duration_secs)]
    duration: Option<Duration>,

    /// Add an env variable visible to the script, e.g. `-e TEST_URL=http://example.test`
    ///
    /// Takes precedence over the process environment.
    #[arg(long = "env", short = 'e', value_name = "KEY=VALUE", value_parser = parse_env_pair)]
    env: Vec<(String, String)>,

    /// Do not expose the process environment to the script
    #[arg(long, default_value_t = false)]
    no_system_env: bool,

    /// report json instead of a human-friendly format
    #[arg(long, default_value_t = false)]
    json: bool,
}

const REPORT_INTERVAL: Duration = Duration::from_secs(1);

pub async fn exec(guard: ShutdownGuard, args: RunCommand) -> Result<(), BoxError> {
    let options = config::options();
    let client = client::new_web_client(Executor::graceful(guard.clone()), options)
        .context("create probe web client")?;

    let plan = ExecutionPlan::new(args.vus, args.iterations, args.duration);
    let env = ScriptEnv::new(args.env, !args.no_system_env);

    tracing::info!(
        vus = plan.vus,
        iterations = ?plan.iterations,
        duration = ?plan.duration,
        http_debug = ?options.http_debug,
        target_url = %env.target_url(),
        "run config parameters ready",
    );

    let reporter: Box<dyn Reporter> = if args.json {
        const EMIT_EVENTS: bool = true;
        Box::new(JsonlReporter::new(REPORT_INTERVAL, EMIT_EVENTS))
    } else {
        Box::new(HumanReporter::new(REPORT_INTERVAL))
    };

    let (result_tx, result_rx) = mpsc::channel(plan.vus.saturating_mul(8));
    let report_handle = tokio::spawn(report_worker(
        guard.clone(),
        reporter,
        REPORT_INTERVAL,
        result_rx,
    ));

    run_virtual_users_until_cancelled(&guard, client, plan, env, result_tx).await;

    report_handle.await.context("join report worker")?;
    Ok(())
}

/// Like [`run_virtual_users`], but all virtual users are dropped
/// as soon as the guard is cancelled.
async fn run_virtual_users_until_cancelled<S>(
    guard: &ShutdownGuard,
    client: S,
    plan: ExecutionPlan,
    env: ScriptEnv,
    result_tx: Sender<IterationResultEvent>,
) where
    S: Service<Request, Output = Response, Error = BoxError> + Clone,
{
    tokio::select! {
        _ = guard.cancelled() => {
            tracing::error!("exit run early: guard shutdown");
        }
        _ = run_virtual_users(client, plan, env, result_tx) => {
            tracing::debug!("all virtual users done");
        }
    }
}

/// Run all virtual users of the plan to completion,
/// sending the result of every iteration over the given channel.
pub(crate) async fn run_virtual_users<S>(
    client: S,
    plan: ExecutionPlan,
    env: ScriptEnv,
    result_tx: Sender<IterationResultEvent>,
) where
    S: Service<Request, Output = Response, Error = BoxError> + Clone,
{
    let start = Instant::now();
    let scheduler = Arc::new(IterationScheduler::new(&plan, start));

    let mut vus = JoinSet::new();
    for vu in 1..=plan.vus {
        vus.spawn(vu_loop(
            vu,
            client.clone(),
            scheduler.clone(),
            env.clone(),
            start,
            result_tx.clone(),
        ));
    }
    drop(result_tx);

    while let Some(result) = vus.join_next().await {
        if let Err(err) = result {
            tracing::error!("virtual user task failed: {err}");
        }
    }
}

async fn vu_loop<S>(
    vu: usize,
    client: S,
    scheduler: Arc<IterationScheduler>,
    env: ScriptEnv,
    start: Instant,
    result_tx: Sender<IterationResultEvent>,
) where
    S: Service<Request, Output = Response, Error = BoxError>,
{
    tracing::debug!(vu, "virtual user started");

    while let Some(iteration) = scheduler.next_iteration() {
        let iteration_start = Instant::now();
        let result = script::default_iteration(&client, &env).await;
        if let Err(err) = &result {
            tracing::debug!(vu, iteration, "iteration failed: {err}");
        }

        let ev = IterationResultEvent {
            elapsed: start.elapsed(),
            vu,
            iteration,
            duration: iteration_start.elapsed(),
            outcome: RequestOutcome::classify(&result),
        };

        if let Err(err) = result_tx.send(ev).await {
            tracing::debug!(vu, "failed to send iteration result msg: {err}");
            return;
        }
    }

    tracing::debug!(vu, "virtual user done: no iterations left");
}

async fn report_worker(
    guard: ShutdownGuard,
    mut reporter: Box<dyn Reporter>,
    tick_interval: Duration,
    mut result_rx: Receiver<IterationResultEvent>,
) {
    let start = Instant::now();

    // ticks keep going while all iterations are stuck on a slow target
    let mut ticker = tokio::time::interval(tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = guard.cancelled() => {
                tracing::debug!("exit report worker: guard shutdown");
                break;
            }

            _ = ticker.tick() => {
                reporter.on_tick(start.elapsed());
            }

            maybe_ev = result_rx.recv() => {
                let Some(ev) = maybe_ev else {
                    tracing::debug!("exit report worker: result senders closed");
                    break;
                };

                reporter.on_result(&ev);
                reporter.on_tick(start.elapsed());
            }
        }
    }

    reporter.finish();
}
