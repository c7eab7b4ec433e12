//! Lock fairness specs
//!
//! Contenders from many sessions acquire one at a time, in the order their
//! contender nodes were created.

use crate::prelude::*;
use similar_asserts::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn contenders_acquire_in_sequence_order() {
    let cluster = Cluster::new();
    let first = DistributedLock::new(cluster.session(), "jobs", "/zooplocks")
        .await
        .unwrap();
    let first_ctx = LockContext::new();
    assert!(first.acquire(&first_ctx, None).await.unwrap());

    let order = Arc::new(Mutex::new(Vec::new()));
    let holders = Arc::new(AtomicUsize::new(0));
    let mut tasks = Vec::new();
    for n in 1..=4 {
        let lock = DistributedLock::new(cluster.session(), "jobs", "/zooplocks")
            .await
            .unwrap();
        let order = Arc::clone(&order);
        let holders = Arc::clone(&holders);
        tasks.push(tokio::spawn(async move {
            let ctx = LockContext::new();
            assert!(lock.acquire(&ctx, None).await.unwrap());
            assert!(holders.fetch_add(1, Ordering::SeqCst) == 0, "two holders at once");
            order.lock().unwrap().push(ctx.held_node().unwrap());
            tokio::time::sleep(Duration::from_millis(10)).await;
            holders.fetch_sub(1, Ordering::SeqCst);
            lock.release(&ctx).await.unwrap();
        }));
        // Contenders enter one by one so their sequence order is known
        let expected = n + 1;
        let probe = first.clone();
        within(async {
            while probe.contenders().await.unwrap().len() < expected {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await;
    }

    first.release(&first_ctx).await.unwrap();
    for task in tasks {
        within(task).await.unwrap();
    }

    let order = order.lock().unwrap().clone();
    let expected: Vec<String> = (1..=4)
        .map(|n| format!("/zooplocks/jobs/lock-{n:010}"))
        .collect();
    assert_eq!(order, expected);
    assert!(first.contenders().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn scoped_sections_never_overlap() {
    let cluster = Cluster::new();
    let inside = Arc::new(AtomicUsize::new(0));
    let entered = Arc::new(AtomicUsize::new(0));

    let mut tasks = Vec::new();
    for _ in 0..6 {
        let lock = DistributedLock::new(cluster.session(), "counter", "/zooplocks")
            .await
            .unwrap();
        let inside = Arc::clone(&inside);
        let entered = Arc::clone(&entered);
        tasks.push(tokio::spawn(async move {
            let ctx = LockContext::new();
            lock.scoped(&ctx, || async {
                assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                tokio::time::sleep(Duration::from_millis(5)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
                entered.fetch_add(1, Ordering::SeqCst);
                Ok::<_, keeper_core::CoordError>(())
            })
            .await
            .unwrap();
        }));
    }
    for task in tasks {
        within(task).await.unwrap();
    }

    assert_eq!(entered.load(Ordering::SeqCst), 6);
}
