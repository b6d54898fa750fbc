//! テスト用ストア
//!
//! 呼び出しを順に記録し、指定した n 番目の呼び出しを遅延・失敗させられます。

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::record::{AccessPolicy, Collection, Document};
use crate::impls::InMemoryStatusStore;
use crate::ports::{Filter, StatusStore, StoreError};

/// One observed call on the store, in the order it started.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    Create {
        collection: Collection,
        document: Document,
        access: AccessPolicy,
    },
    Update {
        collection: Collection,
        filter: Filter,
        changes: Document,
    },
    Find {
        collection: Collection,
        filter: Filter,
    },
    Destroy {
        collection: Collection,
        filter: Filter,
    },
}

impl StoreCall {
    pub fn kind(&self) -> &'static str {
        match self {
            StoreCall::Create { .. } => "create",
            StoreCall::Update { .. } => "update",
            StoreCall::Find { .. } => "find",
            StoreCall::Destroy { .. } => "destroy",
        }
    }
}

#[derive(Default)]
struct Script {
    delays: HashMap<usize, Duration>,
    failures: HashMap<usize, StoreError>,
}

/// Wraps [`InMemoryStatusStore`] and keeps a log of every call.
#[derive(Default)]
pub struct RecordingStore {
    inner: InMemoryStatusStore,
    calls: Mutex<Vec<StoreCall>>,
    script: Mutex<Script>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &InMemoryStatusStore {
        &self.inner
    }

    /// Sleep before serving the `n`th call (0-based, across all methods).
    pub fn delay_nth_call(&self, n: usize, delay: Duration) {
        self.script.lock().unwrap().delays.insert(n, delay);
    }

    /// Fail the `n`th call (0-based) with `error` instead of serving it.
    pub fn fail_nth_call(&self, n: usize, error: StoreError) {
        self.script.lock().unwrap().failures.insert(n, error);
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.calls().iter().filter(|c| c.kind() == kind).count()
    }

    /// Highest number of calls that were ever running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn begin(&self, call: StoreCall) -> Result<InFlight<'_>, StoreError> {
        let (delay, failure) = {
            let mut calls = self.calls.lock().unwrap();
            let n = calls.len();
            calls.push(call);
            let mut script = self.script.lock().unwrap();
            (script.delays.remove(&n), script.failures.remove(&n))
        };

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let guard = InFlight(&self.in_flight);

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match failure {
            Some(error) => Err(error),
            None => Ok(guard),
        }
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl StatusStore for RecordingStore {
    async fn create(
        &self,
        collection: Collection,
        document: Document,
        access: AccessPolicy,
    ) -> Result<Document, StoreError> {
        let _guard = self
            .begin(StoreCall::Create {
                collection,
                document: document.clone(),
                access,
            })
            .await?;
        self.inner.create(collection, document, access).await
    }

    async fn update(
        &self,
        collection: Collection,
        filter: &Filter,
        changes: Document,
    ) -> Result<u64, StoreError> {
        let _guard = self
            .begin(StoreCall::Update {
                collection,
                filter: filter.clone(),
                changes: changes.clone(),
            })
            .await?;
        self.inner.update(collection, filter, changes).await
    }

    async fn find(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Vec<Document>, StoreError> {
        let _guard = self
            .begin(StoreCall::Find {
                collection,
                filter: filter.clone(),
            })
            .await?;
        self.inner.find(collection, filter).await
    }

    async fn destroy(&self, collection: Collection, filter: &Filter) -> Result<u64, StoreError> {
        let _guard = self
            .begin(StoreCall::Destroy {
                collection,
                filter: filter.clone(),
            })
            .await?;
        self.inner.destroy(collection, filter).await
    }
}

/// Build a document from a `json!` object literal.
pub fn doc(value: serde_json::Value) -> Document {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}
