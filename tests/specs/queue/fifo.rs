//! Queue ordering specs
//!
//! Items leave the queue in the order they were put, and every item is
//! taken exactly once even with consumers racing.

use crate::prelude::*;
use similar_asserts::assert_eq;
use std::collections::BTreeSet;

#[tokio::test]
async fn items_from_many_producers_leave_in_put_order() {
    let cluster = Cluster::new();
    let (a, reg_a) = cluster.watched_session();
    let (b, reg_b) = cluster.watched_session();
    let producer_a = DistributedQueue::new(a, reg_a, "/work").await.unwrap();
    let producer_b = DistributedQueue::new(b, reg_b, "/work").await.unwrap();

    for n in 0..3 {
        producer_a.put(format!("a{n}")).await.unwrap();
        producer_b.put(format!("b{n}")).await.unwrap();
    }

    let mut taken = Vec::new();
    while let Ok(value) = producer_a.get().await {
        taken.push(String::from_utf8(value).unwrap());
    }
    assert_eq!(taken, vec!["a0", "b0", "a1", "b1", "a2", "b2"]);
    assert!(producer_b.empty().await.unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_consumers_take_each_item_once() {
    let cluster = Cluster::new();
    let (producer, registry) = cluster.watched_session();
    let queue = DistributedQueue::new(producer, registry, "/work").await.unwrap();
    for n in 0..40 {
        queue.put(format!("{n:02}")).await.unwrap();
    }

    let mut consumers = Vec::new();
    for _ in 0..3 {
        let (session, registry) = cluster.watched_session();
        let queue = DistributedQueue::new(session, registry, "/work").await.unwrap();
        consumers.push(tokio::spawn(async move {
            let mut mine = Vec::new();
            loop {
                match queue.get().await {
                    Ok(value) => mine.push(String::from_utf8(value).unwrap()),
                    Err(e) if e.is_empty() => return mine,
                    Err(e) => panic!("consumer failed: {e}"),
                }
            }
        }));
    }

    let mut all = BTreeSet::new();
    let mut total = 0;
    for consumer in consumers {
        let mine = within(consumer).await.unwrap();
        let mut sorted = mine.clone();
        sorted.sort();
        // Each consumer sees its items in queue order
        assert_eq!(mine, sorted);
        total += mine.len();
        all.extend(mine);
    }
    assert_eq!(total, 40);
    assert_eq!(all.len(), 40);
}

#[tokio::test]
async fn guarded_consumers_drain_the_queue() {
    let cluster = Cluster::new();
    let (session, registry) = cluster.watched_session();
    let queue = DistributedQueue::new(session, registry, "/jobs/pending").await.unwrap();
    queue.put("x").await.unwrap();
    queue.put("y").await.unwrap();

    let ctx = LockContext::new();
    assert_eq!(queue.get_guarded(&ctx).await.unwrap(), b"x");
    assert_eq!(queue.get_guarded(&ctx).await.unwrap(), b"y");
    assert!(queue.get_guarded(&ctx).await.unwrap_err().is_empty());

    let mut siblings = cluster.ensemble.children_of("/jobs").unwrap();
    siblings.sort();
    assert_eq!(siblings, vec!["pending", "pending-lock"]);
}
