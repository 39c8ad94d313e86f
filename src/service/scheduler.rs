//! Periodic driver for the status generator.
//!
//! Ticks are awaited inline, so two ticks never overlap. If a tick runs
//! past the next deadline the missed ticks are skipped, not queued.

use std::future::Future;
use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};

use super::generator::{StatusGenerator, TickOutcome};
use crate::error::SimulatorError;
use crate::persistence::StatusStore;
use crate::random::RandomSource;

/// Tick counters for one run of the scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Ticks started.
    pub ticks: u64,
    /// Ticks that wrote a status query.
    pub recorded: u64,
    /// Ticks that also moved a device.
    pub reassigned: u64,
    /// Ticks whose status query failed.
    pub failed: u64,
    /// Ticks whose status query ran past the tick timeout.
    pub timed_out: u64,
}

/// Timing for [`run`].
#[derive(Debug, Clone, Copy)]
pub struct Schedule {
    /// Period between tick starts. The first tick fires one period after start.
    pub interval: Duration,
    /// Upper bound on the status insert of a single tick. A reassignment
    /// that has started is not cut off.
    pub tick_timeout: Duration,
}

/// Drives `generator` on `schedule` until `shutdown` resolves.
///
/// A tick already in progress when shutdown is requested finishes (or
/// times out on its status insert) before the loop exits.
pub async fn run<S, R, F>(
    generator: &mut StatusGenerator<S, R>,
    schedule: Schedule,
    shutdown: F,
) -> RunSummary
where
    S: StatusStore,
    R: RandomSource,
    F: Future<Output = ()>,
{
    let mut ticker = time::interval_at(Instant::now() + schedule.interval, schedule.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    let mut summary = RunSummary::default();
    tracing::info!(
        interval_ms = u64::try_from(schedule.interval.as_millis()).unwrap_or(u64::MAX),
        "generator started"
    );

    loop {
        tokio::select! {
            () = &mut shutdown => {
                tracing::info!("shutdown requested, stopping generator");
                break;
            }
            _ = ticker.tick() => {}
        }

        summary.ticks += 1;
        match generator.tick_within(schedule.tick_timeout).await {
            TickOutcome::Recorded { reassignment, .. } => {
                summary.recorded += 1;
                if reassignment.is_some() {
                    summary.reassigned += 1;
                }
            }
            TickOutcome::Failed(SimulatorError::TickTimedOut(_)) => summary.timed_out += 1,
            TickOutcome::Failed(_) => summary.failed += 1,
        }
    }

    tracing::info!(
        ticks = summary.ticks,
        recorded = summary.recorded,
        reassigned = summary.reassigned,
        failed = summary.failed,
        timed_out = summary.timed_out,
        "generator stopped"
    );
    summary
}

/// Resolves on SIGINT, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::ReferenceData;
    use crate::persistence::memory::MemoryStore;
    use crate::random::SystemRandom;

    async fn generator(store: MemoryStore) -> StatusGenerator<MemoryStore, SystemRandom> {
        generator_moving(store, 0.1).await
    }

    async fn generator_moving(
        store: MemoryStore,
        probability: f64,
    ) -> StatusGenerator<MemoryStore, SystemRandom> {
        let Ok(reference) = ReferenceData::builtin() else {
            panic!("builtin reference data must load");
        };
        let Ok(generator) =
            StatusGenerator::bootstrap(reference, store, SystemRandom::seeded(5), probability)
                .await
        else {
            panic!("bootstrap failed");
        };
        generator
    }

    #[tokio::test]
    async fn runs_ticks_until_shutdown() {
        let mut generator = generator(MemoryStore::new()).await;
        let schedule = Schedule {
            interval: Duration::from_millis(10),
            tick_timeout: Duration::from_secs(1),
        };

        let summary = run(
            &mut generator,
            schedule,
            tokio::time::sleep(Duration::from_millis(75)),
        )
        .await;

        assert!(summary.ticks >= 1);
        assert_eq!(summary.recorded, summary.ticks);
        assert_eq!(summary.failed, 0);
        let written = u64::try_from(generator.store().counts().status_queries).unwrap_or(0);
        assert_eq!(written, summary.recorded);
    }

    #[tokio::test]
    async fn immediate_shutdown_runs_no_tick() {
        let mut generator = generator(MemoryStore::new()).await;
        let schedule = Schedule {
            interval: Duration::from_secs(10),
            tick_timeout: Duration::from_secs(1),
        };

        let summary = run(&mut generator, schedule, std::future::ready(())).await;
        assert_eq!(summary, RunSummary::default());
        assert_eq!(generator.store().counts().status_queries, 0);
    }

    #[tokio::test]
    async fn slow_tick_is_abandoned_without_side_effects() {
        let mut generator = generator(MemoryStore::with_insert_delay(Duration::from_millis(200))).await;
        let before = generator.ledger().clone();
        let schedule = Schedule {
            interval: Duration::from_millis(10),
            tick_timeout: Duration::from_millis(20),
        };

        let summary = run(
            &mut generator,
            schedule,
            tokio::time::sleep(Duration::from_millis(60)),
        )
        .await;

        assert!(summary.timed_out >= 1);
        assert_eq!(summary.recorded, 0);
        assert_eq!(generator.store().counts().status_queries, 0);
        assert!(generator.ledger().iter().eq(before.iter()));
    }

    #[tokio::test]
    async fn slow_reassignments_keep_ledger_and_store_aligned() {
        let store = MemoryStore::with_reassign_ack_delay(Duration::from_millis(50));
        let mut generator = generator_moving(store, 1.0).await;
        let schedule = Schedule {
            interval: Duration::from_millis(10),
            tick_timeout: Duration::from_millis(20),
        };

        let summary = run(
            &mut generator,
            schedule,
            tokio::time::sleep(Duration::from_millis(200)),
        )
        .await;

        assert!(summary.reassigned >= 1);
        assert_eq!(summary.timed_out, 0);
        let Ok(stored) = generator.store().active_assignments().await else {
            panic!("store should list active assignments");
        };
        let mut stored_ids: Vec<_> = stored.iter().map(|a| a.id).collect();
        let mut ledger_ids: Vec<_> = generator.ledger().active().iter().map(|a| a.id).collect();
        stored_ids.sort();
        ledger_ids.sort();
        assert_eq!(stored_ids, ledger_ids);
        assert_eq!(
            u64::try_from(generator.store().counts().assignments).unwrap_or(0),
            8 + summary.reassigned
        );
    }

    #[tokio::test]
    async fn failed_ticks_do_not_stop_the_loop() {
        let store = MemoryStore::new();
        let mut generator = generator(store).await;
        generator.store().reject_next_status_inserts(1);
        let schedule = Schedule {
            interval: Duration::from_millis(10),
            tick_timeout: Duration::from_secs(1),
        };

        let summary = run(
            &mut generator,
            schedule,
            tokio::time::sleep(Duration::from_millis(100)),
        )
        .await;

        assert_eq!(summary.failed, 1);
        assert!(summary.recorded >= 1);
    }
}
