//! Contract tests run against every storage backend
//!
//! Memory and SQLite always run. Redis runs when a server is reachable at
//! `REDIS_URL` (default redis://127.0.0.1:6379) and is skipped otherwise.

use drill_frontier::storage::{
    CrawlState, MemoryStorage, QueueItem, RedisStorage, SqliteStorage, StorageBackend,
};
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tempfile::TempDir;

static NEXT_NAMESPACE: AtomicU32 = AtomicU32::new(0);

/// A backend under test plus whatever must outlive it
struct Harness {
    storage: Box<dyn StorageBackend>,
    _dir: Option<TempDir>,
}

async fn redis_backend() -> Option<Box<dyn StorageBackend>> {
    let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
    let namespace = format!(
        "drill-parity-{}-{}",
        std::process::id(),
        NEXT_NAMESPACE.fetch_add(1, Ordering::SeqCst)
    );
    let storage = RedisStorage::new(&url, namespace, None).ok()?;

    match tokio::time::timeout(Duration::from_secs(3), storage.clear()).await {
        Ok(Ok(())) => Some(Box::new(storage)),
        _ => {
            println!("Redis not available, skipping redis backend");
            None
        }
    }
}

/// Fresh, empty instances of every available backend
async fn backends() -> Vec<Harness> {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let sqlite = SqliteStorage::new(dir.path().join("frontier.db"));

    let mut harnesses = vec![
        Harness {
            storage: Box::new(MemoryStorage::new()),
            _dir: None,
        },
        Harness {
            storage: Box::new(sqlite),
            _dir: Some(dir),
        },
    ];

    if let Some(storage) = redis_backend().await {
        harnesses.push(Harness {
            storage,
            _dir: None,
        });
    }

    harnesses
}

async fn teardown(harnesses: Vec<Harness>) {
    for harness in harnesses {
        harness.storage.clear().await.unwrap();
        harness.storage.close().await.unwrap();
    }
}

#[tokio::test]
async fn test_visited_last_write_wins() {
    let harnesses = backends().await;
    for h in &harnesses {
        let s = &h.storage;
        s.mark_visited("https://a.example/", 10.5).await.unwrap();
        s.mark_visited("https://a.example/", 42.25).await.unwrap();

        assert!(s.is_visited("https://a.example/").await.unwrap(), "{}", s.backend_name());
        assert_eq!(
            s.get_visit_time("https://a.example/").await.unwrap(),
            Some(42.25),
            "{}",
            s.backend_name()
        );
    }
    teardown(harnesses).await;
}

#[tokio::test]
async fn test_unknown_url_is_unvisited() {
    let harnesses = backends().await;
    for h in &harnesses {
        let s = &h.storage;
        assert!(!s.is_visited("https://never.example/").await.unwrap());
        assert_eq!(s.get_visit_time("https://never.example/").await.unwrap(), None);
    }
    teardown(harnesses).await;
}

#[tokio::test]
async fn test_fifo_within_lane() {
    let harnesses = backends().await;
    for h in &harnesses {
        let s = &h.storage;
        s.enqueue(QueueItem::new("https://a.example/", 0).with_priority(1))
            .await
            .unwrap();
        s.enqueue(QueueItem::new("https://b.example/", 0).with_priority(9))
            .await
            .unwrap();

        assert_eq!(s.dequeue(None).await.unwrap().unwrap().url, "https://a.example/");
        assert_eq!(s.dequeue(None).await.unwrap().unwrap().url, "https://b.example/");
    }
    teardown(harnesses).await;
}

async fn fill_three_lanes(s: &dyn StorageBackend) {
    s.enqueue(QueueItem::new("https://high.example/", 0).with_priority(1))
        .await
        .unwrap();
    s.enqueue(QueueItem::new("https://normal.example/", 0))
        .await
        .unwrap();
    s.enqueue(QueueItem::new("https://low.example/", 0).with_priority(-1))
        .await
        .unwrap();
}

async fn drain_urls(s: &dyn StorageBackend, prefer: Option<i64>) -> Vec<String> {
    let mut urls = Vec::new();
    while let Some(item) = s.dequeue(prefer).await.unwrap() {
        urls.push(item.url);
    }
    urls
}

#[tokio::test]
async fn test_lane_preference() {
    let harnesses = backends().await;
    for h in &harnesses {
        let s = h.storage.as_ref();

        fill_three_lanes(s).await;
        assert_eq!(
            drain_urls(s, None).await,
            vec!["https://high.example/", "https://normal.example/", "https://low.example/"]
        );

        fill_three_lanes(s).await;
        assert_eq!(
            drain_urls(s, Some(0)).await,
            vec!["https://normal.example/", "https://high.example/", "https://low.example/"]
        );

        fill_three_lanes(s).await;
        assert_eq!(
            drain_urls(s, Some(-1)).await,
            vec!["https://low.example/", "https://normal.example/", "https://high.example/"]
        );
    }
    teardown(harnesses).await;
}

#[tokio::test]
async fn test_queue_size_conservation() {
    let harnesses = backends().await;
    for h in &harnesses {
        let s = &h.storage;
        let mut enqueued = 0u64;
        let mut dequeued = 0u64;

        for i in 0..12i64 {
            s.enqueue(QueueItem::new(format!("https://q.example/{}", i), 1).with_priority(i % 3 - 1))
                .await
                .unwrap();
            enqueued += 1;

            if i % 4 == 3 && s.dequeue(Some(i % 3 - 1)).await.unwrap().is_some() {
                dequeued += 1;
            }
        }

        assert_eq!(s.queue_size().await.unwrap(), enqueued - dequeued);
        let sizes = s.lane_sizes().await.unwrap();
        assert_eq!(sizes.total(), enqueued - dequeued);
    }
    teardown(harnesses).await;
}

#[tokio::test]
async fn test_domain_counter_monotonic() {
    let harnesses = backends().await;
    for h in &harnesses {
        let s = &h.storage;
        assert_eq!(s.get_domain_count("a.example").await.unwrap(), 0);

        for _ in 0..5 {
            s.increment_domain_count("a.example").await.unwrap();
            s.increment_domain_count("b.example").await.unwrap();
        }
        s.increment_domain_count("b.example").await.unwrap();

        assert_eq!(s.get_domain_count("a.example").await.unwrap(), 5);
        assert_eq!(s.get_domain_count("b.example").await.unwrap(), 6);
        assert_eq!(s.get_domain_count("c.example").await.unwrap(), 0);
    }
    teardown(harnesses).await;
}

#[tokio::test]
async fn test_state_round_trip() {
    let harnesses = backends().await;
    for h in &harnesses {
        let s = &h.storage;
        assert!(s.load_state().await.unwrap().is_none());

        let mut state = CrawlState::new();
        state.insert("depth_counters".to_string(), json!({"0": 1, "1": 14}));
        state.insert("mission".to_string(), json!({"id": "recon", "status": "running"}));
        state.insert("seeds".to_string(), json!(["https://a.example/"]));
        s.save_state(&state).await.unwrap();

        assert_eq!(s.load_state().await.unwrap(), Some(state));
    }
    teardown(harnesses).await;
}

/// Drives one mixed sequence of operations and records everything observable
async fn transcript(s: &dyn StorageBackend) -> Vec<String> {
    let mut log = Vec::new();

    s.enqueue(QueueItem::new("https://a.example/", 0).with_priority(1))
        .await
        .unwrap();
    s.enqueue(QueueItem::new("https://b.example/", 1))
        .await
        .unwrap();
    s.enqueue(QueueItem::new("https://c.example/", 1).with_priority(-1))
        .await
        .unwrap();
    s.enqueue(
        QueueItem::new("https://d.example/", 2)
            .with_priority(3)
            .with_mission("recon", Some(7)),
    )
    .await
    .unwrap();
    log.push(format!("size={}", s.queue_size().await.unwrap()));

    for prefer in [None, Some(0), Some(-5), None, None] {
        let item = s.dequeue(prefer).await.unwrap();
        log.push(format!("dequeue({:?})={:?}", prefer, item));
        if let Some(item) = item {
            s.mark_visited(&item.url, 1000.0 + item.depth as f64)
                .await
                .unwrap();
            s.increment_domain_count(item.url.trim_start_matches("https://"))
                .await
                .unwrap();
        }
    }

    for url in ["https://a.example/", "https://b.example/", "https://z.example/"] {
        log.push(format!(
            "visited({})={} at {:?}",
            url,
            s.is_visited(url).await.unwrap(),
            s.get_visit_time(url).await.unwrap()
        ));
    }
    log.push(format!(
        "count(a)={}",
        s.get_domain_count("a.example/").await.unwrap()
    ));
    log.push(format!("size={}", s.queue_size().await.unwrap()));

    log
}

#[tokio::test]
async fn test_backends_are_interchangeable() {
    let harnesses = backends().await;

    let reference = transcript(harnesses[0].storage.as_ref()).await;
    assert!(reference.contains(&"size=4".to_string()));
    assert!(reference.last() == Some(&"size=0".to_string()));

    for h in &harnesses[1..] {
        let other = transcript(h.storage.as_ref()).await;
        assert_eq!(reference, other, "{} diverged", h.storage.backend_name());
    }

    teardown(harnesses).await;
}

#[tokio::test]
async fn test_example_scenario() {
    let harnesses = backends().await;
    for h in &harnesses {
        let s = &h.storage;
        s.enqueue(QueueItem::new("https://a.example/", 0).with_priority(1))
            .await
            .unwrap();
        s.enqueue(QueueItem::new("https://b.example/", 1).with_priority(0))
            .await
            .unwrap();
        s.enqueue(QueueItem::new("https://c.example/", 1).with_priority(-1))
            .await
            .unwrap();
        assert_eq!(s.queue_size().await.unwrap(), 3);

        assert_eq!(s.dequeue(None).await.unwrap().unwrap().url, "https://a.example/");
        assert_eq!(s.dequeue(None).await.unwrap().unwrap().url, "https://b.example/");
        assert_eq!(s.dequeue(None).await.unwrap().unwrap().url, "https://c.example/");
        assert_eq!(s.dequeue(None).await.unwrap(), None);

        s.mark_visited("https://a.example/", 1000.0).await.unwrap();
        assert!(s.is_visited("https://a.example/").await.unwrap());
        assert!(!s.is_visited("https://b.example/").await.unwrap());
    }
    teardown(harnesses).await;
}

#[tokio::test]
async fn test_clear_resets_every_backend() {
    let harnesses = backends().await;
    for h in &harnesses {
        let s = &h.storage;
        s.mark_visited("https://a.example/", 1.0).await.unwrap();
        s.enqueue(QueueItem::new("https://b.example/", 0))
            .await
            .unwrap();
        s.increment_domain_count("a.example").await.unwrap();
        s.save_state(&CrawlState::new()).await.unwrap();

        s.clear().await.unwrap();

        assert!(!s.is_visited("https://a.example/").await.unwrap());
        assert_eq!(s.queue_size().await.unwrap(), 0);
        assert_eq!(s.get_domain_count("a.example").await.unwrap(), 0);
        assert!(s.load_state().await.unwrap().is_none());
    }
    teardown(harnesses).await;
}
