// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use keeper_adapters::{ClientCall, MemoryClient, MemoryEnsemble};
use std::time::Duration;
use tokio::sync::mpsc;

async fn setup(path: &str) -> (MemoryEnsemble, MemoryClient, DistributedQueue<MemoryClient>) {
    let ensemble = MemoryEnsemble::new();
    let client = ensemble.connect();
    let registry = WatchRegistry::with_client(client.clone());
    registry.install_as_global_dispatcher().unwrap();
    let queue = DistributedQueue::new(client.clone(), registry, path)
        .await
        .unwrap();
    (ensemble, client, queue)
}

async fn recv<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for notification")
        .expect("notification channel closed")
}

#[tokio::test]
async fn new_creates_the_queue_path() {
    let (ensemble, _client, queue) = setup("/jobs/pending").await;

    assert_eq!(queue.path(), "/jobs/pending");
    assert_eq!(ensemble.children_of("/jobs").unwrap(), vec!["pending"]);
}

#[tokio::test]
async fn put_creates_persistent_sequential_items() {
    let (_ensemble, client, queue) = setup("/q").await;
    client.clear_calls();

    let item = queue.put("a").await.unwrap();

    assert_eq!(item, "/q/q-0000000000");
    assert_eq!(
        client.calls(),
        vec![ClientCall::Create {
            path: "/q/q-".to_string(),
            mode: CreateMode::PersistentSequential,
        }]
    );
}

#[tokio::test]
async fn get_is_fifo_then_empty() {
    let (_ensemble, _client, queue) = setup("/q").await;
    queue.put("a").await.unwrap();
    queue.put("b").await.unwrap();

    assert_eq!(queue.get().await.unwrap(), b"a");
    assert_eq!(queue.get().await.unwrap(), b"b");
    assert_eq!(queue.get().await, Err(CoordError::Empty("/q".to_string())));
}

#[tokio::test]
async fn sorted_orders_by_name() {
    let (_ensemble, client, queue) = setup("/q").await;
    for name in ["q-2", "q-4", "q-3"] {
        client
            .create(&format!("/q/{name}"), b"", CreateMode::Persistent)
            .await
            .unwrap();
    }

    assert_eq!(queue.sorted().await.unwrap(), vec!["q-2", "q-3", "q-4"]);
}

#[tokio::test]
async fn sorted_on_empty_queue_is_empty_error() {
    let (_ensemble, _client, queue) = setup("/q").await;

    let err = queue.sorted().await.unwrap_err();
    assert!(err.is_empty());
}

#[tokio::test]
async fn vanished_head_falls_through_to_next_item() {
    let (ensemble, client, queue) = setup("/q").await;
    queue.put("a").await.unwrap();
    queue.put("b").await.unwrap();

    // Another consumer takes the head first
    let other = ensemble.connect();
    other.delete("/q/q-0000000000").await.unwrap();
    client.clear_calls();

    assert_eq!(queue.get().await.unwrap(), b"b");
    assert!(queue.empty().await.unwrap());
}

#[tokio::test]
async fn qsize_empty_and_flush() {
    let (_ensemble, _client, queue) = setup("/q").await;
    assert!(queue.empty().await.unwrap());

    for v in ["a", "b", "c"] {
        queue.put(v).await.unwrap();
    }
    assert_eq!(queue.qsize().await.unwrap(), 3);
    assert!(!queue.empty().await.unwrap());

    queue.flush().await.unwrap();
    assert_eq!(queue.qsize().await.unwrap(), 0);
    // Flushing an empty queue is fine
    queue.flush().await.unwrap();
}

#[tokio::test]
async fn watch_reports_sorted_snapshots() {
    let (_ensemble, _client, queue) = setup("/q").await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    queue
        .watch(move |items| {
            let _ = tx.send(items);
        })
        .await
        .unwrap();

    queue.put("a").await.unwrap();
    assert_eq!(recv(&mut rx).await, vec!["q-0000000000"]);

    queue.put("b").await.unwrap();
    assert_eq!(recv(&mut rx).await, vec!["q-0000000000", "q-0000000001"]);
}

#[tokio::test]
async fn watch_skips_empty_snapshots() {
    let (_ensemble, _client, queue) = setup("/q").await;
    queue.put("a").await.unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    queue
        .watch(move |items| {
            let _ = tx.send(items);
        })
        .await
        .unwrap();

    queue.get().await.unwrap();
    queue.put("b").await.unwrap();

    // The removal left nothing behind and was not reported
    assert_eq!(recv(&mut rx).await, vec!["q-0000000001"]);
}

#[tokio::test]
async fn watchitem_delivers_payloads_in_order() {
    let (_ensemble, _client, queue) = setup("/q").await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    queue
        .watchitem(move |value| {
            let _ = tx.send(value);
        })
        .await
        .unwrap();

    queue.put("first").await.unwrap();
    assert_eq!(recv(&mut rx).await, b"first");

    queue.put("second").await.unwrap();
    assert_eq!(recv(&mut rx).await, b"second");
    assert!(queue.empty().await.unwrap());
}

#[tokio::test]
async fn guard_lock_lives_beside_the_queue() {
    let (ensemble, _client, queue) = setup("/jobs/pending").await;

    let lock = queue.guard_lock().await.unwrap();

    assert_eq!(lock.path(), "/jobs/pending-lock");
    let mut siblings = ensemble.children_of("/jobs").unwrap();
    siblings.sort();
    assert_eq!(siblings, vec!["pending", "pending-lock"]);
}

#[tokio::test]
async fn get_guarded_takes_head_and_releases() {
    let (_ensemble, _client, queue) = setup("/q").await;
    queue.put("a").await.unwrap();
    let ctx = LockContext::new();

    assert_eq!(queue.get_guarded(&ctx).await.unwrap(), b"a");
    assert_eq!(ctx.held_node(), None);
    assert!(queue.guard_lock().await.unwrap().contenders().await.unwrap().is_empty());

    assert!(queue.get_guarded(&ctx).await.unwrap_err().is_empty());
}
