#[cfg(test)]
mod tests {
    use crate::{Harness, sample_orders};
    use engine_core::{
        error::LedgerError, ledger::BatchLedger, position::PositionOracle, store::RecordStore,
    };
    use engine_processing::{
        error::{LoadError, LoadStage},
        loader::Loader,
        monitor::{ConfirmedBy, MonitorConfig, ReplicationMonitor, Verdict},
    };
    use model::{
        core::{identifiers::BatchKey, lsn::Lsn},
        records::batch::BatchStatus,
    };
    use std::{sync::Arc, time::Duration};
    use tokio_util::sync::CancellationToken;
    use tracing_test::traced_test;

    fn loader(h: &Harness) -> Loader {
        Loader::new(
            Arc::new(h.store.clone()),
            Arc::new(h.ledger.clone()),
            h.entity.clone(),
        )
    }

    // Scenario: a batch is loaded through COPY.
    // Expected Outcome: rows are visible, the ledger row is COMPLETED with
    // ordered markers and the expected row count.
    #[traced_test]
    #[tokio::test]
    #[ignore = "requires a local Postgres (CDC_TEST_PG_URL)"]
    async fn load_records_batch_in_ledger() {
        let h = Harness::new("cdc_it_load", true).await;

        let summary = loader(&h).load(&sample_orders(25), 1001).await.unwrap();

        assert_eq!(h.store.count(&h.entity).await.unwrap(), 25);
        let batch = h.ledger.batch(&summary.key).await.unwrap().unwrap();
        assert_eq!(batch.status, BatchStatus::Completed);
        assert_eq!(batch.row_count, 25);
        assert_eq!(batch.start_marker, Some(summary.start_marker));
        assert_eq!(batch.end_marker, Some(summary.end_marker));
        assert!(summary.start_marker <= summary.end_marker);
        assert!(h.store.current_position().await.unwrap() >= summary.end_marker);

        let records = h.store.fetch_records(&h.entity).await.unwrap();
        let expected = sample_orders(25);
        assert_eq!(records.len(), 25);
        assert!(records.windows(2).all(|w| w[0].order_id < w[1].order_id));
        assert_eq!(records[0].amount, expected[0].amount);
        assert_eq!(records[0].timestamp, expected[0].timestamp);
    }

    // Scenario: the same batch key is created twice.
    // Expected Outcome: DuplicateBatch, first row untouched.
    #[tokio::test]
    #[ignore = "requires a local Postgres (CDC_TEST_PG_URL)"]
    async fn duplicate_create_is_rejected() {
        let h = Harness::new("cdc_it_duplicate", true).await;
        let key = BatchKey::new(h.entity.clone(), 7);

        h.ledger.create(&key, 10, Lsn::new(100)).await.unwrap();
        let before = h.ledger.batch(&key).await.unwrap();

        let err = h.ledger.create(&key, 99, Lsn::new(200)).await.unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateBatch(_)));
        assert_eq!(h.ledger.batch(&key).await.unwrap(), before);
    }

    // Scenario: complete is called twice, then for a key that was never created.
    // Expected Outcome: second call is a no-op; the unknown key fails.
    #[tokio::test]
    #[ignore = "requires a local Postgres (CDC_TEST_PG_URL)"]
    async fn complete_is_idempotent() {
        let h = Harness::new("cdc_it_complete", true).await;
        let key = BatchKey::new(h.entity.clone(), 3);

        h.ledger.create(&key, 1, Lsn::new(16)).await.unwrap();
        h.ledger.complete(&key, Lsn::new(32)).await.unwrap();
        let first = h.ledger.batch(&key).await.unwrap().unwrap();

        h.ledger.complete(&key, Lsn::new(64)).await.unwrap();
        let second = h.ledger.batch(&key).await.unwrap().unwrap();
        assert_eq!(first, second);
        assert_eq!(second.end_marker, Some(Lsn::new(32)));

        let missing = BatchKey::new(h.entity.clone(), 404);
        assert!(matches!(
            h.ledger.complete(&missing, Lsn::new(1)).await,
            Err(LedgerError::UnknownBatch(_))
        ));
    }

    // Scenario: the orders table is missing, so COPY fails.
    // Expected Outcome: LoadFailed at the insert stage and an IN_PROGRESS ledger row.
    #[traced_test]
    #[tokio::test]
    #[ignore = "requires a local Postgres (CDC_TEST_PG_URL)"]
    async fn failed_copy_leaves_batch_in_progress() {
        let h = Harness::new("cdc_it_failed", false).await;

        let err = loader(&h).load(&sample_orders(5), 55).await.unwrap_err();
        assert!(matches!(
            err,
            LoadError::LoadFailed {
                stage: LoadStage::Insert,
                ..
            }
        ));

        let batch = h
            .ledger
            .batch(&BatchKey::new(h.entity.clone(), 55))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(batch.status, BatchStatus::InProgress);
        assert_eq!(batch.end_marker, None);
        assert!(logs_contain("Load failed; rolling back"));
    }

    // Scenario: source and target are the same database.
    // Expected Outcome: counts and content match on the first tick.
    #[traced_test]
    #[tokio::test]
    #[ignore = "requires a local Postgres (CDC_TEST_PG_URL)"]
    async fn monitor_confirms_identical_stores() {
        let h = Harness::new("cdc_it_monitor", true).await;
        let summary = loader(&h).load(&sample_orders(12), 9).await.unwrap();

        let store = Arc::new(h.store.clone());
        let monitor = ReplicationMonitor::new(
            Arc::new(h.ledger.clone()),
            store.clone(),
            store,
            MonitorConfig {
                timeout: Duration::from_secs(20),
                interval: Duration::from_secs(1),
                ..MonitorConfig::default()
            },
        );

        let verdict = monitor.run(&summary.key, CancellationToken::new()).await;
        assert!(matches!(
            verdict,
            Verdict::Confirmed {
                via: ConfirmedBy::ContentVerified | ConfirmedBy::ReplicationCaughtUp,
                ..
            }
        ));
    }

    // Scenario: the latest batch is read back through latest_status.
    // Expected Outcome: the newest batch by creation order is reported.
    #[tokio::test]
    #[ignore = "requires a local Postgres (CDC_TEST_PG_URL)"]
    async fn latest_status_reports_newest_batch() {
        let h = Harness::new("cdc_it_latest", true).await;
        let loader = loader(&h);
        loader.load(&sample_orders(2), 50).await.unwrap();
        loader.load(&sample_orders(3), 20).await.unwrap();

        let status = h.ledger.latest_status(&h.entity).await.unwrap().unwrap();
        assert_eq!(status.batch_id, 20);
        assert_eq!(status.status, BatchStatus::Completed);
        assert_eq!(status.row_count, 3);
        assert!(status.end_marker.is_some());
    }
}
