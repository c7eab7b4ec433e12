//! Lock revocation specs
//!
//! A holder learns that it lost the lock and the next contender proceeds.

use crate::prelude::*;
use similar_asserts::assert_eq;

#[tokio::test]
async fn expired_holder_is_revoked_and_waiter_proceeds() {
    let cluster = Cluster::new();
    let holder_session = cluster.session();
    let holder = DistributedLock::new(holder_session.clone(), "leader", "/zooplocks")
        .await
        .unwrap();
    let holder_ctx = LockContext::new();
    assert!(holder.acquire(&holder_ctx, None).await.unwrap());

    let waiter = DistributedLock::new(cluster.session(), "leader", "/zooplocks")
        .await
        .unwrap();
    let waiting = tokio::spawn(async move {
        let ctx = LockContext::new();
        let got = waiter.acquire(&ctx, None).await.unwrap();
        (got, ctx.held_node())
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    holder_session.inner().expire();

    eventually("holder revocation", || holder_ctx.revoked()).await;
    let (got, node) = within(waiting).await.unwrap();
    assert!(got);
    assert_eq!(node.as_deref(), Some("/zooplocks/leader/lock-0000000001"));
}

#[tokio::test]
async fn unlock_request_is_honored_by_holder() {
    let cluster = Cluster::new();
    let lock = DistributedLock::new(cluster.session(), "leader", "/zooplocks")
        .await
        .unwrap();
    let ctx = LockContext::new();
    assert!(lock.acquire(&ctx, None).await.unwrap());

    let admin = cluster.session();
    let contenders = lock.contenders().await.unwrap();
    admin
        .set(&format!("{}/{}", lock.path(), contenders[0]), b"unlock")
        .await
        .unwrap();

    eventually("unlock request", || ctx.revoked()).await;
    lock.release(&ctx).await.unwrap();

    let next = LockContext::new();
    assert!(lock
        .acquire(&next, Some(Duration::from_millis(200)))
        .await
        .unwrap());
}
