//! Concurrency tests for the notification bus and comment stores.
//!
//! These tests verify that concurrent subscribe/publish/unsubscribe traffic
//! finishes without deadlocks or orphaned registry entries, and that
//! concurrent writers never lose a comment.

use posthread_comments::{
    new_comment, CommentEvent, CommentStore, MemoryCommentStore, NotificationBus,
    SqliteCommentStore,
};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

fn created(post_id: Uuid) -> CommentEvent {
    CommentEvent::created(new_comment(post_id, Uuid::new_v4(), "hello", None).unwrap())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_subscribe_publish_unsubscribe_leaves_no_entries() {
    // Small buffer so some publishes hit full queues.
    let bus = NotificationBus::new(2);
    let posts: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
    let mut handles = Vec::new();

    for i in 0..16 {
        let bus = bus.clone();
        let post_id = posts[i % posts.len()];

        handles.push(tokio::spawn(async move {
            for cycle in 0..500 {
                let mut subscription = bus.subscribe(post_id);
                bus.publish(created(post_id));
                while subscription.try_recv().is_some() {}

                // Alternate between explicit unsubscribe and drop.
                if cycle % 2 == 0 {
                    bus.unsubscribe(&subscription);
                }
                drop(subscription);

                if cycle % 50 == 0 {
                    tokio::task::yield_now().await;
                }
            }
        }));
    }

    let all = async {
        for handle in handles {
            handle.await.expect("task should not panic");
        }
    };
    tokio::time::timeout(Duration::from_secs(30), all)
        .await
        .expect("bus operations should not deadlock");

    assert_eq!(bus.active_posts(), 0);
    for post_id in &posts {
        assert_eq!(bus.subscriber_count(*post_id), 0);
    }
    // Every publish had at least its own subscriber registered.
    assert!(bus.delivered_events() > 0);
    assert!(bus.delivered_events() + bus.dropped_events() >= 16 * 500);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_publish_races_unsubscribe_without_deadlock() {
    let bus = NotificationBus::new(4);
    let post_id = Uuid::new_v4();

    // Long-lived listeners that only drain.
    let listeners: Vec<_> = (0..4).map(|_| bus.subscribe(post_id)).collect();

    let publisher = {
        let bus = bus.clone();
        tokio::spawn(async move {
            for _ in 0..2_000 {
                bus.publish(created(post_id));
            }
        })
    };

    let churn = {
        let bus = bus.clone();
        tokio::spawn(async move {
            for _ in 0..2_000 {
                let subscription = bus.subscribe(post_id);
                assert!(bus.unsubscribe(&subscription));
                assert!(!bus.unsubscribe(&subscription));
            }
        })
    };

    tokio::time::timeout(Duration::from_secs(30), async {
        publisher.await.expect("publisher should not panic");
        churn.await.expect("churn task should not panic");
    })
    .await
    .expect("publish and unsubscribe should not deadlock");

    assert_eq!(bus.subscriber_count(post_id), listeners.len());
    drop(listeners);
    assert_eq!(bus.active_posts(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_dropping_bus_handles_concurrently_with_subscriptions() {
    let bus = NotificationBus::default();
    let post_id = Uuid::new_v4();
    let mut handles = Vec::new();

    for _ in 0..8 {
        let bus = bus.clone();
        handles.push(tokio::spawn(async move {
            let subscriptions: Vec<_> = (0..50).map(|_| bus.subscribe(post_id)).collect();
            bus.publish(created(post_id));
            subscriptions
        }));
    }

    let mut held = Vec::new();
    for handle in handles {
        held.extend(handle.await.expect("task should not panic"));
    }
    assert_eq!(bus.subscriber_count(post_id), 400);

    held.clear();
    assert_eq!(bus.active_posts(), 0);
}

fn concurrent_creates_are_all_counted(store: Arc<dyn CommentStore>) {
    let post_id = Uuid::new_v4();
    let threads: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for _ in 0..25 {
                    let comment = new_comment(post_id, Uuid::new_v4(), "concurrent", None)
                        .expect("valid comment");
                    store.create(&comment).expect("create should succeed");
                }
            })
        })
        .collect();

    for thread in threads {
        thread.join().expect("writer should not panic");
    }

    assert_eq!(store.count_by_post(post_id).unwrap(), 200);
}

#[test]
fn test_concurrent_creates_in_memory() {
    concurrent_creates_are_all_counted(Arc::new(MemoryCommentStore::new()));
}

#[test]
fn test_concurrent_creates_in_sqlite() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let path = dir.path().join("concurrent.db");
    let pool = posthread_db::open_database(
        path.to_str().expect("utf-8 path"),
        posthread_db::DbRuntimeSettings::default(),
    )
    .expect("file database should open");

    concurrent_creates_are_all_counted(Arc::new(SqliteCommentStore::new(pool)));
}
