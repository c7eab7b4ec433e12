//! Shared helpers for specs

#![allow(dead_code)]

pub use keeper_adapters::{MemoryClient, MemoryEnsemble, TracedClient};
pub use keeper_core::{CoordinationClient, CreateMode, EventKind};
pub use keeper_recipes::{callback, DistributedLock, DistributedQueue, LockContext, WatchRegistry};
pub use std::sync::Arc;
pub use std::time::Duration;

use std::sync::Once;

pub type Session = TracedClient<MemoryClient>;

static TRACING: Once = Once::new();

/// Route recipe logs to the test writer, filtered by `RUST_LOG`
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A shared ensemble handing out traced sessions
pub struct Cluster {
    pub ensemble: MemoryEnsemble,
}

impl Cluster {
    pub fn new() -> Self {
        init_tracing();
        Self {
            ensemble: MemoryEnsemble::new(),
        }
    }

    pub fn session(&self) -> Session {
        TracedClient::new(self.ensemble.connect())
    }

    /// A session whose registry receives every watch event
    pub fn watched_session(&self) -> (Session, Arc<WatchRegistry<Session>>) {
        let session = self.session();
        let registry = WatchRegistry::with_client(session.clone());
        registry.install_as_global_dispatcher().unwrap();
        (session, registry)
    }
}

/// Poll `check` until it holds, failing after two seconds
pub async fn eventually(what: &str, check: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !check() {
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

pub async fn within<F: std::future::Future>(f: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(5), f)
        .await
        .expect("scenario timed out")
}
