use crate::{
    checker::ConsistencyChecker,
    error::{MonitorError, VerifyError},
    retry::classify_monitor_error,
};
use engine_core::{
    error::LedgerError, ledger::BatchLedger, retry::RetryPolicy, store::RecordStore,
};
use model::core::identifiers::BatchKey;
use std::{fmt, sync::Arc, time::Duration};
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Budget for the whole run; no tick starts once it is spent.
    pub timeout: Duration,
    pub interval: Duration,
    /// Retries of transient store failures within a tick.
    pub retry: RetryPolicy,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
            interval: Duration::from_secs(10),
            retry: RetryPolicy::for_database(),
        }
    }
}

/// Which signal confirmed the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmedBy {
    /// Replication slots acknowledged the batch's end marker.
    ReplicationCaughtUp,
    /// Row counts matched and the record sets compared equal.
    ContentVerified,
}

impl fmt::Display for ConfirmedBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfirmedBy::ReplicationCaughtUp => f.write_str("replication position"),
            ConfirmedBy::ContentVerified => f.write_str("content comparison"),
        }
    }
}

/// Terminal state of a monitor run.
#[derive(Debug)]
pub enum Verdict {
    Confirmed {
        via: ConfirmedBy,
        ticks: u32,
        elapsed: Duration,
    },
    TimedOut {
        ticks: u32,
        elapsed: Duration,
    },
    Error {
        error: MonitorError,
        ticks: u32,
        elapsed: Duration,
    },
    Cancelled {
        ticks: u32,
        elapsed: Duration,
    },
}

impl Verdict {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Verdict::Confirmed { .. })
    }

    pub fn ticks(&self) -> u32 {
        match self {
            Verdict::Confirmed { ticks, .. }
            | Verdict::TimedOut { ticks, .. }
            | Verdict::Error { ticks, .. }
            | Verdict::Cancelled { ticks, .. } => *ticks,
        }
    }

    pub fn elapsed(&self) -> Duration {
        match self {
            Verdict::Confirmed { elapsed, .. }
            | Verdict::TimedOut { elapsed, .. }
            | Verdict::Error { elapsed, .. }
            | Verdict::Cancelled { elapsed, .. } => *elapsed,
        }
    }

    pub fn into_result(self, key: &BatchKey, timeout: Duration) -> Result<ConfirmedBy, VerifyError> {
        match self {
            Verdict::Confirmed { via, .. } => Ok(via),
            Verdict::TimedOut { .. } => Err(VerifyError::Timeout {
                key: key.clone(),
                timeout,
            }),
            Verdict::Error { error, .. } => Err(VerifyError::Store {
                key: key.clone(),
                source: error,
            }),
            Verdict::Cancelled { .. } => Err(VerifyError::Cancelled { key: key.clone() }),
        }
    }
}

enum TickOutcome {
    Confirmed(ConfirmedBy),
    Pending,
}

/// Polls until a batch is known to be replicated, the deadline passes, a
/// store fails for good, or the run is cancelled.
///
/// Every store call opens its own connection, so nothing is held while the
/// monitor sleeps between ticks.
pub struct ReplicationMonitor {
    ledger: Arc<dyn BatchLedger>,
    source: Arc<dyn RecordStore>,
    target: Arc<dyn RecordStore>,
    checker: ConsistencyChecker,
    config: MonitorConfig,
}

impl ReplicationMonitor {
    pub fn new(
        ledger: Arc<dyn BatchLedger>,
        source: Arc<dyn RecordStore>,
        target: Arc<dyn RecordStore>,
        config: MonitorConfig,
    ) -> Self {
        let checker = ConsistencyChecker::new(source.clone(), target.clone());
        Self {
            ledger,
            source,
            target,
            checker,
            config,
        }
    }

    pub async fn run(&self, key: &BatchKey, cancel: CancellationToken) -> Verdict {
        let started = Instant::now();
        let deadline = started + self.config.timeout;
        let mut ticks = 0u32;

        info!(
            batch = %key,
            timeout_secs = self.config.timeout.as_secs(),
            interval_secs = self.config.interval.as_secs(),
            "Waiting for batch to replicate"
        );

        let verdict = loop {
            if cancel.is_cancelled() {
                break Verdict::Cancelled {
                    ticks,
                    elapsed: started.elapsed(),
                };
            }
            if Instant::now() >= deadline {
                break Verdict::TimedOut {
                    ticks,
                    elapsed: started.elapsed(),
                };
            }

            ticks += 1;
            let outcome = self
                .config
                .retry
                .run_until(Some(deadline), || self.tick(key, ticks), classify_monitor_error)
                .await;

            match outcome {
                Ok(TickOutcome::Confirmed(via)) => {
                    break Verdict::Confirmed {
                        via,
                        ticks,
                        elapsed: started.elapsed(),
                    };
                }
                Ok(TickOutcome::Pending) => {}
                Err(err) => {
                    break Verdict::Error {
                        error: err.into_inner(),
                        ticks,
                        elapsed: started.elapsed(),
                    };
                }
            }

            let now = Instant::now();
            if now >= deadline {
                continue;
            }

            let pause = self.config.interval.min(deadline - now);
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = sleep(pause) => {}
            }
        };

        log_verdict(key, &verdict);
        verdict
    }

    async fn tick(&self, key: &BatchKey, tick: u32) -> Result<TickOutcome, MonitorError> {
        let entity = &key.entity;

        // Only a batch the ledger has completed can be confirmed, by either signal.
        let Some(batch) = self.ledger.batch(key).await? else {
            return Err(LedgerError::UnknownBatch(key.clone()).into());
        };
        if !batch.is_completed() {
            info!(batch = %key, tick, status = %batch.status, "Batch is not completed in the ledger");
            return Ok(TickOutcome::Pending);
        }

        if let Some(status) = self.ledger.latest_status(entity).await?
            && status.batch_id == key.batch_id
            && status.caught_up
        {
            info!(
                batch = %key,
                tick,
                end_marker = ?status.end_marker.map(|lsn| lsn.to_string()),
                slots = status.slots.slot_names.len(),
                "Replication slots are past the end marker"
            );
            return Ok(TickOutcome::Confirmed(ConfirmedBy::ReplicationCaughtUp));
        }

        let source_count = self.source.count(entity).await?;
        let target_count = self.target.count(entity).await?;

        if source_count != target_count {
            info!(batch = %key, tick, source_count, target_count, "Row counts differ");
            return Ok(TickOutcome::Pending);
        }

        let report = self.checker.compare(entity).await?;
        info!(
            batch = %key,
            tick,
            source_count,
            target_count,
            mismatches = report.mismatches.len(),
            "Row counts match; compared content"
        );

        if report.equal {
            Ok(TickOutcome::Confirmed(ConfirmedBy::ContentVerified))
        } else {
            Ok(TickOutcome::Pending)
        }
    }
}

fn log_verdict(key: &BatchKey, verdict: &Verdict) {
    match verdict {
        Verdict::Confirmed {
            via,
            ticks,
            elapsed,
        } => info!(batch = %key, ticks, elapsed_secs = elapsed.as_secs_f64(), via = %via, "Batch CONFIRMED"),
        Verdict::TimedOut { ticks, elapsed } => {
            warn!(batch = %key, ticks, elapsed_secs = elapsed.as_secs_f64(), "Batch TIMED_OUT")
        }
        Verdict::Error {
            error,
            ticks,
            elapsed,
        } => error!(batch = %key, ticks, elapsed_secs = elapsed.as_secs_f64(), error = %error, "Batch verification ERROR"),
        Verdict::Cancelled { ticks, elapsed } => {
            warn!(batch = %key, ticks, elapsed_secs = elapsed.as_secs_f64(), "Batch verification CANCELLED")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{LoadSummary, Loader};
    use chrono::NaiveDate;
    use engine_core::memory::MemoryStore;
    use model::{
        core::identifiers::EntityRef,
        records::order::{NewOrder, OrderRecord},
    };
    use rust_decimal::Decimal;
    use tracing_test::traced_test;

    fn orders() -> EntityRef {
        EntityRef::new("public", "orders")
    }

    fn config() -> MonitorConfig {
        MonitorConfig {
            timeout: Duration::from_secs(300),
            interval: Duration::from_secs(10),
            retry: RetryPolicy::new(3, Duration::from_secs(1), Duration::from_secs(4)),
        }
    }

    fn feed() -> Vec<NewOrder> {
        let ts = NaiveDate::from_ymd_opt(2024, 6, 30)
            .unwrap()
            .and_hms_opt(23, 59, 59)
            .unwrap();
        (1..=4)
            .map(|i| NewOrder {
                customer_id: 100 + i,
                amount: Decimal::new(2500 * i64::from(i), 2),
                timestamp: ts,
            })
            .collect()
    }

    struct Fixture {
        source: MemoryStore,
        target: MemoryStore,
        summary: LoadSummary,
    }

    impl Fixture {
        async fn loaded() -> Self {
            let source = MemoryStore::new();
            let loader = Loader::new(Arc::new(source.clone()), Arc::new(source.clone()), orders());
            let summary = loader.load(&feed(), 11).await.unwrap();
            Self {
                source,
                target: MemoryStore::new(),
                summary,
            }
        }

        fn monitor(&self, config: MonitorConfig) -> ReplicationMonitor {
            ReplicationMonitor::new(
                Arc::new(self.source.clone()),
                Arc::new(self.source.clone()),
                Arc::new(self.target.clone()),
                config,
            )
        }

        fn replicate(&self) {
            self.target.insert_records(&orders(), self.source.records(&orders()));
        }
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn confirms_on_first_tick_after_rows_arrive() {
        let fixture = Fixture::loaded().await;
        let source = fixture.source.clone();
        let target = fixture.target.clone();
        tokio::spawn(async move {
            sleep(Duration::from_secs(45)).await;
            target.insert_records(&orders(), source.records(&orders()));
        });

        let verdict = fixture
            .monitor(config())
            .run(&fixture.summary.key, CancellationToken::new())
            .await;

        match verdict {
            Verdict::Confirmed {
                via,
                ticks,
                elapsed,
            } => {
                assert_eq!(via, ConfirmedBy::ContentVerified);
                assert_eq!(ticks, 6);
                assert_eq!(elapsed, Duration::from_secs(50));
            }
            other => panic!("expected confirmation, got {other:?}"),
        }
        assert!(logs_contain("Batch CONFIRMED"));
    }

    #[tokio::test(start_paused = true)]
    async fn slot_progress_confirms_without_comparing_rows() {
        let fixture = Fixture::loaded().await;
        fixture
            .source
            .confirm_slot("orders_slot", fixture.summary.end_marker);

        let verdict = fixture
            .monitor(config())
            .run(&fixture.summary.key, CancellationToken::new())
            .await;

        assert!(matches!(
            verdict,
            Verdict::Confirmed {
                via: ConfirmedBy::ReplicationCaughtUp,
                ticks: 1,
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn slot_behind_end_marker_is_not_enough() {
        let fixture = Fixture::loaded().await;
        fixture
            .source
            .confirm_slot("orders_slot", fixture.summary.start_marker);

        let verdict = fixture
            .monitor(MonitorConfig {
                timeout: Duration::from_secs(30),
                ..config()
            })
            .run(&fixture.summary.key, CancellationToken::new())
            .await;

        assert!(matches!(verdict, Verdict::TimedOut { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_when_rows_never_arrive() {
        let fixture = Fixture::loaded().await;

        let verdict = fixture
            .monitor(config())
            .run(&fixture.summary.key, CancellationToken::new())
            .await;

        match verdict {
            Verdict::TimedOut { ticks, elapsed } => {
                assert_eq!(ticks, 30);
                assert_eq!(elapsed, Duration::from_secs(300));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn content_difference_keeps_polling() {
        let fixture = Fixture::loaded().await;
        let mut drifted = fixture.source.records(&orders());
        drifted[0] = OrderRecord {
            amount: Decimal::new(1, 0),
            ..drifted[0].clone()
        };
        fixture.target.insert_records(&orders(), drifted);

        let verdict = fixture
            .monitor(MonitorConfig {
                timeout: Duration::from_secs(25),
                ..config()
            })
            .run(&fixture.summary.key, CancellationToken::new())
            .await;

        match verdict {
            Verdict::TimedOut { ticks, elapsed } => {
                assert_eq!(ticks, 3);
                assert_eq!(elapsed, Duration::from_secs(25));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn store_outage_is_an_error_not_a_timeout() {
        let fixture = Fixture::loaded().await;
        fixture.source.set_offline(true);

        let verdict = fixture
            .monitor(config())
            .run(&fixture.summary.key, CancellationToken::new())
            .await;

        match verdict {
            Verdict::Error { error, ticks, elapsed } => {
                assert!(matches!(error, MonitorError::Ledger(_)));
                assert_eq!(ticks, 1);
                assert!(elapsed < Duration::from_secs(10));
            }
            other => panic!("expected error, got {other:?}"),
        }
        assert!(logs_contain("Batch verification ERROR"));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_is_retried_within_the_tick() {
        let fixture = Fixture::loaded().await;
        fixture.replicate();
        fixture.source.fail_next(2);

        let verdict = fixture
            .monitor(config())
            .run(&fixture.summary.key, CancellationToken::new())
            .await;

        match verdict {
            Verdict::Confirmed { ticks, elapsed, .. } => {
                assert_eq!(ticks, 1);
                assert_eq!(elapsed, Duration::from_secs(3));
            }
            other => panic!("expected confirmation, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_polling_promptly() {
        let fixture = Fixture::loaded().await;
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_secs(25)).await;
            trigger.cancel();
        });

        let verdict = fixture.monitor(config()).run(&fixture.summary.key, cancel).await;

        match verdict {
            Verdict::Cancelled { ticks, elapsed } => {
                assert_eq!(ticks, 3);
                assert_eq!(elapsed, Duration::from_secs(25));
            }
            other => panic!("expected cancellation, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn newer_batch_does_not_confirm_an_older_one() {
        let fixture = Fixture::loaded().await;
        let loader = Loader::new(
            Arc::new(fixture.source.clone()),
            Arc::new(fixture.source.clone()),
            orders(),
        );
        let newer = loader.load(&feed(), 12).await.unwrap();
        fixture.source.confirm_slot("orders_slot", newer.end_marker);

        // Latest batch is 12, so batch 11 falls back to counts, which differ.
        let verdict = fixture
            .monitor(MonitorConfig {
                timeout: Duration::from_secs(15),
                ..config()
            })
            .run(&fixture.summary.key, CancellationToken::new())
            .await;

        assert!(matches!(verdict, Verdict::TimedOut { ticks: 2, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_load_is_never_confirmed() {
        let source = MemoryStore::new();
        let target = MemoryStore::new();
        source.reject_inserts(true);
        let loader = Loader::new(Arc::new(source.clone()), Arc::new(source.clone()), orders());
        assert!(loader.load(&feed(), 5).await.is_err());

        let key = BatchKey::new(orders(), 5);
        let batch = source.batch(&key).await.unwrap().unwrap();
        assert!(!batch.is_completed());

        // Both sides are empty, so counts and content agree.
        let verdict = ReplicationMonitor::new(
            Arc::new(source.clone()),
            Arc::new(source.clone()),
            Arc::new(target.clone()),
            MonitorConfig {
                timeout: Duration::from_secs(25),
                ..config()
            },
        )
        .run(&key, CancellationToken::new())
        .await;

        match verdict {
            Verdict::TimedOut { ticks, elapsed } => {
                assert_eq!(ticks, 3);
                assert_eq!(elapsed, Duration::from_secs(25));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn unknown_batch_ends_with_an_error() {
        let source = MemoryStore::new();
        let target = MemoryStore::new();

        let verdict = ReplicationMonitor::new(
            Arc::new(source.clone()),
            Arc::new(source),
            Arc::new(target),
            config(),
        )
        .run(&BatchKey::new(orders(), 999), CancellationToken::new())
        .await;

        match verdict {
            Verdict::Error { error, ticks, elapsed } => {
                assert!(matches!(
                    error,
                    MonitorError::Ledger(LedgerError::UnknownBatch(ref key)) if key.batch_id == 999
                ));
                assert_eq!(ticks, 1);
                assert_eq!(elapsed, Duration::ZERO);
            }
            other => panic!("expected error, got {other:?}"),
        }
        assert!(logs_contain("Batch verification ERROR"));
    }

    #[test]
    fn verdict_into_result() {
        let key = BatchKey::new(orders(), 5);
        let timed_out = Verdict::TimedOut {
            ticks: 30,
            elapsed: Duration::from_secs(300),
        };
        assert!(matches!(
            timed_out.into_result(&key, Duration::from_secs(300)),
            Err(VerifyError::Timeout { .. })
        ));
    }
}
