//! Watch re-arm specs
//!
//! A single subscription keeps delivering across many changes made by
//! other sessions.

use crate::prelude::*;
use similar_asserts::assert_eq;
use tokio::sync::mpsc;

#[tokio::test]
async fn subscription_survives_repeated_changes() {
    let cluster = Cluster::new();
    let (watcher, registry) = cluster.watched_session();
    let writer = cluster.session();
    writer.create("/config", b"v0", CreateMode::Persistent).await.unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    registry
        .spyon(
            "/config",
            callback(move |path, kind| {
                let tx = tx.clone();
                async move {
                    let _ = tx.send((path, kind));
                    Ok(())
                }
            }),
            &[EventKind::Changed],
        )
        .await
        .unwrap();

    for n in 1..=5 {
        writer
            .set("/config", format!("v{n}").as_bytes())
            .await
            .unwrap();
        let event = within(rx.recv()).await.unwrap();
        assert_eq!(event, ("/config".to_string(), EventKind::Changed));
        let (value, _) = watcher.get("/config", None).await.unwrap();
        assert_eq!(value, format!("v{n}").into_bytes());
    }
}

#[tokio::test]
async fn queue_watch_sees_every_producer() {
    let cluster = Cluster::new();
    let (watcher, registry) = cluster.watched_session();
    let queue = DistributedQueue::new(watcher, registry, "/inbox").await.unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    queue
        .watch(move |items| {
            let _ = tx.send(items.len());
        })
        .await
        .unwrap();

    for n in 1..=3 {
        let (producer, registry) = cluster.watched_session();
        let theirs = DistributedQueue::new(producer, registry, "/inbox").await.unwrap();
        theirs.put(format!("from {n}")).await.unwrap();
        assert_eq!(within(rx.recv()).await, Some(n));
    }
}
