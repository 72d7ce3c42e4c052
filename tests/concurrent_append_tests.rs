use flowlog::{
    Database, DatabaseConfig, ListLimit, NewTransaction, Settings, SharedSettings,
    TransactionLog, TransactionRecord,
};
use flowlog::transactions::DEFAULT_LIST_LIMIT;
use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

type SharedLog = Arc<TransactionLog<Database, SharedSettings>>;

async fn shared_log(max: usize) -> SharedLog {
    let settings = SharedSettings::new(
        Settings::default().with_max_transactions_to_keep(NonZeroUsize::new(max).unwrap()),
    );
    let log = TransactionLog::new(Database::new(), settings);
    log.init().await.unwrap();
    Arc::new(log)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_appends_to_one_flow_respect_limit() {
    let log = shared_log(5).await;
    let flow_id = Uuid::new_v4();

    let mut handles = Vec::new();
    for worker in 0..8 {
        let log = log.clone();
        handles.push(tokio::spawn(async move {
            for step in 0..10 {
                let tx = NewTransaction::new(format!("w{worker}-s{step}"), "success")
                    .flow_id(flow_id);
                log.append(tx).await.unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(log.count_by_flow(flow_id).await.unwrap(), 5);
    assert_eq!(log.store().stats().active, 0);
    assert_eq!(log.store().stats().committed, 80);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_flows_are_trimmed_independently() {
    let log = shared_log(3).await;
    let flows: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();

    let mut handles = Vec::new();
    for (idx, flow_id) in flows.iter().copied().enumerate() {
        let log = log.clone();
        handles.push(tokio::spawn(async move {
            for step in 0..=idx * 2 {
                let tx = NewTransaction::new(format!("v{step}"), "success").flow_id(flow_id);
                log.append(tx).await.unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let counts: Vec<usize> = {
        let mut counts = Vec::new();
        for flow_id in &flows {
            counts.push(log.count_by_flow(*flow_id).await.unwrap());
        }
        counts
    };
    assert_eq!(counts, vec![1, 3, 3, 3]);

    let ids: HashSet<Uuid> = log
        .list_by_flow(flows[3], ListLimit::Unbounded)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids.len(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_limit_lowered_while_appending_converges() {
    let log = shared_log(20).await;
    let flow_id = Uuid::new_v4();

    let writer = {
        let log = log.clone();
        tokio::spawn(async move {
            for step in 0..30 {
                let tx = NewTransaction::new(format!("v{step}"), "success").flow_id(flow_id);
                log.append(tx).await.unwrap();
            }
        })
    };
    log.settings()
        .set_max_transactions_to_keep(NonZeroUsize::new(4).unwrap());
    writer.await.unwrap();

    // the last append ran under the lowered limit
    log.append(NewTransaction::new("final", "success").flow_id(flow_id))
        .await
        .unwrap();
    assert_eq!(log.count_by_flow(flow_id).await.unwrap(), 4);
}

fn assert_oldest_first(records: &[TransactionRecord]) {
    assert!(records
        .windows(2)
        .all(|pair| (pair[0].timestamp, pair[0].id) <= (pair[1].timestamp, pair[1].id)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_listing_while_appending_sees_ordered_bounded_rows() {
    let log = shared_log(6).await;
    let flow_id = Uuid::new_v4();

    let mut writers = Vec::new();
    for worker in 0..3 {
        let log = log.clone();
        writers.push(tokio::spawn(async move {
            for step in 0..20 {
                let tx = NewTransaction::new(format!("w{worker}-s{step}"), "success")
                    .flow_id(flow_id);
                log.append(tx).await.unwrap();
            }
        }));
    }

    let reader = {
        let log = log.clone();
        tokio::spawn(async move {
            for _ in 0..50 {
                let records = log.list_by_flow(flow_id, ListLimit::Unbounded).await.unwrap();
                assert!(records.len() <= 6);
                assert_oldest_first(&records);

                let bounded = log.list_by_flow(flow_id, ListLimit::Max(2)).await.unwrap();
                assert!(bounded.len() <= 2);
                assert_oldest_first(&bounded);
                tokio::task::yield_now().await;
            }
        })
    };

    for writer in writers {
        writer.await.unwrap();
    }
    reader.await.unwrap();
    assert_eq!(log.count_by_flow(flow_id).await.unwrap(), 6);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_full_default_flow_keeps_up_with_concurrent_load() {
    let config = DatabaseConfig::new("busy").lock_timeout(Duration::from_secs(2));
    let db = Database::with_config(config);
    let log = Arc::new(TransactionLog::new(db, Settings::default()));
    log.init().await.unwrap();
    let max = Settings::default().max_transactions_to_keep.get();
    let flow_id = Uuid::new_v4();
    let other_flow = Uuid::new_v4();

    for step in 0..max {
        let tx = NewTransaction::new(format!("seed-{step}"), "success").flow_id(flow_id);
        log.append(tx).await.unwrap();
    }

    let mut handles = Vec::new();
    for worker in 0..4 {
        let log = log.clone();
        let target = if worker % 2 == 0 { flow_id } else { other_flow };
        handles.push(tokio::spawn(async move {
            for step in 0..25 {
                let tx = NewTransaction::new(format!("w{worker}-s{step}"), "success")
                    .flow_id(target);
                log.append(tx).await.unwrap();
            }
        }));
    }
    let reader = {
        let log = log.clone();
        tokio::spawn(async move {
            for _ in 0..20 {
                let records = log.list_by_flow(flow_id, ListLimit::default()).await.unwrap();
                assert_eq!(records.len(), DEFAULT_LIST_LIMIT);
                assert_oldest_first(&records);
            }
        })
    };

    for handle in handles {
        handle.await.unwrap();
    }
    reader.await.unwrap();

    assert_eq!(log.count_by_flow(flow_id).await.unwrap(), max);
    assert_eq!(log.count_by_flow(other_flow).await.unwrap(), 50);
    assert_eq!(log.store().stats().aborted, 0);
}
