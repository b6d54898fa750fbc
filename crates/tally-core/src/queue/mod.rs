//! MutationQueue - レコード単位の順序付きミューテーションキュー
//!
//! # 設計
//! - トラッカー 1 つにつき `MutationQueue` 1 つ（レコード間で共有しない）
//! - 消費側タスクは 1 つだけで、ステップを 1 件ずつ適用する
//!   → 同じレコードへのストア呼び出しは重ならず、enqueue 順に実行される
//! - enqueue は同期的。順序は呼び出し時点で決まり、`Pending` を poll した時点ではない
//! - 失敗したステップは自分の `Pending` だけを reject し、消費側は次へ進む
//!
//! # 制限
//! - チャネルは unbounded（ストアより速く積むとメモリ上のバックログが伸びる）
//! - リトライ・キャンセルはない

mod mutation;
mod pending;

pub use mutation::{Applied, Chain, Mutation};
pub use pending::Pending;

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::{mpsc, oneshot};

use crate::domain::record::Collection;
use crate::error::TrackerError;
use crate::ports::StatusStore;

type Step = Box<dyn FnOnce(Arc<dyn StatusStore>) -> BoxFuture<'static, ()> + Send>;

/// Serializes storage mutations against one logical record.
pub struct MutationQueue {
    label: String,
    collection: Collection,
    tx: mpsc::UnboundedSender<Step>,
}

impl MutationQueue {
    /// Spawn the consumer for a new queue.
    ///
    /// Must be called from within a Tokio runtime. The consumer exits once
    /// the queue is dropped and every step already enqueued has been applied.
    pub fn new(
        store: Arc<dyn StatusStore>,
        collection: Collection,
        label: impl Into<String>,
    ) -> Self {
        let label = label.into();
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(consume(label.clone(), store, rx));
        Self {
            label,
            collection,
            tx,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Append `mutation` to the queue.
    pub fn enqueue(&self, mutation: Mutation) -> Pending<Applied> {
        let collection = self.collection;
        self.submit(mutation.kind(), move |store| async move {
            Ok(mutation.apply(store.as_ref(), collection).await?)
        })
    }

    /// Append a read whose result decides the follow-up mutations.
    ///
    /// `read`, `then` and every follow-up run inside the same queue slot, so
    /// nothing else enqueued on this record can land between the read and the
    /// writes derived from it. `DeleteRelated` follow-ups are best-effort: a
    /// failure is logged and the chain continues. Any other failing follow-up
    /// rejects the chain and skips the rest.
    pub fn enqueue_chained<T, F>(&self, read: Mutation, then: F) -> Pending<T>
    where
        T: Send + 'static,
        F: FnOnce(Applied) -> Result<Chain<T>, TrackerError> + Send + 'static,
    {
        let collection = self.collection;
        let label = self.label.clone();
        self.submit(read.kind(), move |store| async move {
            let applied = read.apply(store.as_ref(), collection).await?;
            let Chain { mutations, output } = then(applied)?;

            for mutation in mutations {
                let kind = mutation.kind();
                let best_effort = matches!(mutation, Mutation::DeleteRelated { .. });
                match mutation.apply(store.as_ref(), collection).await {
                    Ok(applied) => {
                        tracing::debug!(queue = %label, op = kind, ?applied, "applied follow-up")
                    }
                    Err(error) if best_effort => {
                        tracing::warn!(queue = %label, op = kind, %error, "best-effort follow-up failed")
                    }
                    Err(error) => return Err(error.into()),
                }
            }
            Ok(output)
        })
    }

    fn submit<T, F, Fut>(&self, kind: &'static str, op: F) -> Pending<T>
    where
        T: Send + 'static,
        F: FnOnce(Arc<dyn StatusStore>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, TrackerError>> + Send + 'static,
    {
        let (reply, rx) = oneshot::channel();
        let label = self.label.clone();
        let step: Step = Box::new(move |store: Arc<dyn StatusStore>| {
            async move {
                let result = op(store).await;
                match &result {
                    Ok(_) => tracing::debug!(queue = %label, op = kind, "applied"),
                    Err(error) => tracing::warn!(queue = %label, op = kind, %error, "queued mutation failed"),
                }
                // The caller may have dropped its handle; the write still happened.
                let _ = reply.send(result);
            }
            .boxed()
        });

        match self.tx.send(step) {
            Ok(()) => Pending::waiting(rx, self.label.clone()),
            Err(_) => Pending::ready(Err(TrackerError::QueueClosed(self.label.clone()))),
        }
    }
}

async fn consume(
    label: String,
    store: Arc<dyn StatusStore>,
    mut rx: mpsc::UnboundedReceiver<Step>,
) {
    while let Some(step) = rx.recv().await {
        step(Arc::clone(&store)).await;
    }
    tracing::debug!(queue = %label, "mutation queue drained");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::{AccessPolicy, Document};
    use crate::ports::{Filter, StoreError};
    use crate::testing::{doc, StoreCall, RecordingStore};
    use serde_json::json;
    use std::time::Duration;

    fn create(key: &str) -> Mutation {
        Mutation::Create {
            document: doc(json!({"objectId": key, "step": 0})),
            access: AccessPolicy::NoPublicAccess,
        }
    }

    fn set_step(key: &str, step: u64) -> Mutation {
        Mutation::Update {
            filter: Filter::by_id(key),
            changes: doc(json!({ "step": step })),
        }
    }

    #[tokio::test]
    async fn applies_mutations_in_enqueue_order_despite_delays() {
        let store = Arc::new(RecordingStore::new());
        // The create is the slowest call; nothing may overtake it.
        store.delay_nth_call(0, Duration::from_millis(50));
        store.delay_nth_call(2, Duration::from_millis(20));
        let queue = MutationQueue::new(store.clone(), Collection::JobStatus, "job-1");

        let handles: Vec<_> = std::iter::once(queue.enqueue(create("job-1")))
            .chain((1..=5).map(|step| queue.enqueue(set_step("job-1", step))))
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }

        let calls = store.calls();
        assert_eq!(calls.len(), 6);
        assert!(matches!(calls[0], StoreCall::Create { .. }));
        let steps: Vec<_> = calls[1..]
            .iter()
            .map(|call| match call {
                StoreCall::Update { changes, .. } => changes["step"].as_u64().unwrap(),
                other => panic!("unexpected call {other:?}"),
            })
            .collect();
        assert_eq!(steps, vec![1, 2, 3, 4, 5]);
        assert_eq!(store.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn order_is_fixed_at_enqueue_time_not_at_poll_time() {
        let store = Arc::new(RecordingStore::new());
        let queue = MutationQueue::new(store.clone(), Collection::JobStatus, "job-1");

        let first = queue.enqueue(create("job-1"));
        let second = queue.enqueue(set_step("job-1", 1));

        // Await in reverse order.
        second.await.unwrap();
        first.await.unwrap();

        let calls = store.calls();
        assert!(matches!(calls[0], StoreCall::Create { .. }));
        assert!(matches!(calls[1], StoreCall::Update { .. }));
    }

    #[tokio::test]
    async fn failure_rejects_only_its_own_handle() {
        let store = Arc::new(RecordingStore::new());
        store.fail_nth_call(1, StoreError::Backend("disk full".to_string()));
        let queue = MutationQueue::new(store.clone(), Collection::JobStatus, "job-1");

        let created = queue.enqueue(create("job-1"));
        let failed = queue.enqueue(set_step("job-1", 1));
        let after = queue.enqueue(set_step("job-1", 2));

        created.await.unwrap();
        let err = failed.await.unwrap_err();
        assert!(matches!(err, TrackerError::Store(StoreError::Backend(_))));
        assert_eq!(after.await.unwrap(), Applied::Updated { matched: 1 });

        let record = &store.inner().snapshot(Collection::JobStatus).await[0];
        assert_eq!(record["step"], json!(2));
    }

    #[tokio::test]
    async fn chained_writes_are_not_interleaved() {
        let store = Arc::new(RecordingStore::new());
        let queue = MutationQueue::new(store.clone(), Collection::JobStatus, "job-1");
        queue.enqueue(create("job-1")).await.unwrap();

        // Slow down the read so a concurrent enqueue has a chance to race it.
        store.delay_nth_call(1, Duration::from_millis(30));
        let chained = queue.enqueue_chained(
            Mutation::Get {
                filter: Filter::by_id("job-1"),
            },
            |applied| {
                let step = applied.into_found()[0]["step"].as_u64().unwrap_or(0);
                Ok(Chain::new(vec![set_step("job-1", step + 10)], step + 10))
            },
        );
        let later = queue.enqueue(set_step("job-1", 99));

        assert_eq!(chained.await.unwrap(), 10);
        later.await.unwrap();

        let kinds: Vec<_> = store.calls().iter().map(StoreCall::kind).collect();
        assert_eq!(kinds, vec!["create", "find", "update", "update"]);
        let record = &store.inner().snapshot(Collection::JobStatus).await[0];
        assert_eq!(record["step"], json!(99));
    }

    #[tokio::test]
    async fn best_effort_follow_up_failure_does_not_abort_chain() {
        let store = Arc::new(RecordingStore::new());
        let queue = MutationQueue::new(store.clone(), Collection::PushStatus, "push-1");
        queue.enqueue(create("push-1")).await.unwrap();
        store.fail_nth_call(2, StoreError::Backend("installations offline".to_string()));

        let chained = queue.enqueue_chained(
            Mutation::Get {
                filter: Filter::by_id("push-1"),
            },
            |_| {
                Ok(Chain::new(
                    vec![
                        Mutation::DeleteRelated {
                            collection: Collection::Installation,
                            filter: Filter::new().with("deviceToken", "stale"),
                        },
                        set_step("push-1", 1),
                    ],
                    (),
                ))
            },
        );

        chained.await.unwrap();
        let record: Document = store.inner().snapshot(Collection::PushStatus).await[0].clone();
        assert_eq!(record["step"], json!(1));
    }

    #[tokio::test]
    async fn dropping_the_queue_still_applies_enqueued_mutations() {
        let store = Arc::new(RecordingStore::new());
        store.delay_nth_call(0, Duration::from_millis(20));
        let queue = MutationQueue::new(store.clone(), Collection::JobStatus, "job-1");

        let created = queue.enqueue(create("job-1"));
        let updated = queue.enqueue(set_step("job-1", 3));
        drop(queue);

        created.await.unwrap();
        assert_eq!(updated.await.unwrap(), Applied::Updated { matched: 1 });
    }
}
