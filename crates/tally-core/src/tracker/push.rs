//! PushStatusTracker - プッシュ配信バッチのステータス追跡
//!
//! # 状態遷移
//! - pending -> running -> succeeded | failed
//! - `failed` からは抜けない。`succeeded` への `complete` は再集計として加算される
//!
//! # 集計
//! 配信結果は永続化済みのカウンタに加算する。`complete` を複数回呼んでも
//! 上書きではなく累積になる。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::domain::record::{
    to_document, AccessPolicy, Collection, Document, PushCounters, PushStatusChanges,
    PushStatusRecord,
};
use crate::domain::{aggregate, Aggregation, DeliveryResult, PushBody, PushState, PushStatusId};
use crate::error::TrackerError;
use crate::ports::{Clock, Filter};
use crate::queue::{Applied, Chain, Mutation, MutationQueue, Pending};

use super::config::TrackerConfig;

/// Descriptive fields of a batch, set once at creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushOptions {
    /// Where the push was requested from.
    pub source: String,
    pub title: Option<String>,
}

impl PushOptions {
    pub const DEFAULT_SOURCE: &'static str = "rest";

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

impl Default for PushOptions {
    fn default() -> Self {
        Self {
            source: Self::DEFAULT_SOURCE.to_string(),
            title: None,
        }
    }
}

/// Tracks the delivery of one push batch.
///
/// `set_initial` creates the record and must come first. Operations apply to
/// the store in call order.
pub struct PushStatusTracker {
    id: PushStatusId,
    body: PushBody,
    push_hash: String,
    queue: MutationQueue,
    clock: Arc<dyn Clock>,
    created: AtomicBool,
}

impl PushStatusTracker {
    pub fn new(body: PushBody, config: &TrackerConfig) -> Self {
        let id = config.ids.generate_push_status_id();
        let push_hash = body.alert().push_hash();
        Self {
            id,
            body,
            push_hash,
            queue: MutationQueue::new(Arc::clone(&config.store), Collection::PushStatus, id.key()),
            clock: Arc::clone(&config.clock),
            created: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> PushStatusId {
        self.id
    }

    /// Deduplication hash of the notification's alert.
    pub fn push_hash(&self) -> &str {
        &self.push_hash
    }

    /// Create the batch record in the pending state. Resolves with its id.
    pub fn set_initial(&self, query: &serde_json::Value, options: PushOptions) -> Pending<PushStatusId> {
        if self.created.swap(true, Ordering::SeqCst) {
            return Pending::ready(Err(TrackerError::AlreadyCreated(self.id.key())));
        }

        let mut record = PushStatusRecord::pending(self.id, self.clock.now(), self.push_hash.clone());
        record.query = query.to_string();
        record.payload = serde_json::Value::Object(self.body.data.clone()).to_string();
        record.source = options.source;
        record.title = options.title;
        record.expiry = self.body.expiration_time.clone();

        let document = match to_document(&record) {
            Ok(document) => document,
            Err(error) => return Pending::ready(Err(error.into())),
        };

        tracing::info!(push_id = %self.id, push_hash = %self.push_hash, "push status created");
        let id = self.id;
        self.queue
            .enqueue(Mutation::Create {
                document,
                access: AccessPolicy::NoPublicAccess,
            })
            .map(move |_| id)
    }

    /// Mark the batch as being sent. Only a pending batch moves; resolves
    /// with zero when the record had already left `pending`.
    pub fn set_running(&self, installation_count: usize) -> Pending<u64> {
        tracing::info!(push_id = %self.id, installation_count, "sending push to {installation_count} installations");

        let changes = PushStatusChanges {
            status: Some(PushState::Running),
            updated_at: Some(self.clock.now()),
            ..Default::default()
        };
        let guard = Filter::by_id(self.id.key()).with("status", PushState::Pending.as_str());

        let push_id = self.id;
        self.update(guard, &changes).map(move |applied| {
            let matched = applied.matched();
            if matched == 0 {
                tracing::warn!(%push_id, "push was not pending, running transition ignored");
            }
            matched
        })
    }

    /// Fold delivery results onto the persisted counters and mark the batch
    /// succeeded.
    ///
    /// The read, the stale-installation cleanup and the final write share one
    /// queue slot. Resolves with the counters that were written, or with
    /// `AlreadyFinished` when the batch had failed.
    pub fn complete(&self, results: Vec<DeliveryResult>) -> Pending<PushCounters> {
        if let Err(error) = self.ensure_created() {
            return Pending::ready(Err(error));
        }

        let key = self.id.key();
        let updated_at = self.clock.now();
        self.queue.enqueue_chained(
            Mutation::Get {
                filter: Filter::by_id(key.clone()),
            },
            move |applied| {
                let Some(current) = applied.into_found().into_iter().next() else {
                    return Err(TrackerError::RecordNotFound {
                        collection: Collection::PushStatus,
                        key,
                    });
                };
                if record_status(&current) == Some(PushState::Failed) {
                    return Err(TrackerError::AlreadyFinished {
                        key,
                        status: PushState::Failed.as_str(),
                    });
                }
                let base: PushCounters = serde_json::from_value(serde_json::Value::Object(current))?;

                let Aggregation {
                    counters,
                    stale_tokens,
                    skipped,
                } = aggregate(base, &results);
                if skipped > 0 {
                    tracing::debug!(push_id = %key, skipped, "skipped unattributable delivery results");
                }

                let mut mutations: Vec<Mutation> = stale_tokens
                    .into_iter()
                    .map(|token| Mutation::DeleteRelated {
                        collection: Collection::Installation,
                        filter: Filter::new().with("deviceToken", token),
                    })
                    .collect();

                let changes = to_document(&PushStatusChanges {
                    status: Some(PushState::Succeeded),
                    updated_at: Some(updated_at),
                    counters: Some(counters.clone()),
                    ..Default::default()
                })?;
                mutations.push(Mutation::Update {
                    filter: Filter::by_id(key.clone()),
                    changes,
                });

                tracing::info!(
                    push_id = %key,
                    sent = counters.num_sent,
                    failed = counters.num_failed,
                    "push completed"
                );
                Ok(Chain::new(mutations, counters))
            },
        )
    }

    /// Mark the batch failed, recording `error` as JSON.
    ///
    /// An error that cannot be serialized is recorded by type name instead.
    /// Resolves with zero when the batch had already finished.
    pub fn fail<E: Serialize + ?Sized>(&self, error: &E) -> Pending<u64> {
        if let Err(error) = self.ensure_created() {
            return Pending::ready(Err(error));
        }

        let error_message = serde_json::to_string(error).unwrap_or_else(|cause| {
            tracing::warn!(push_id = %self.id, %cause, "push error is not serializable");
            unserializable_error(std::any::type_name::<E>())
        });
        tracing::info!(push_id = %self.id, error = %error_message, "push failed");

        let changes = match to_document(&PushStatusChanges {
            status: Some(PushState::Failed),
            updated_at: Some(self.clock.now()),
            error_message: Some(error_message),
            ..Default::default()
        }) {
            Ok(changes) => changes,
            Err(error) => return Pending::ready(Err(error.into())),
        };

        let key = self.id.key();
        self.queue.enqueue_chained(
            Mutation::Get {
                filter: Filter::by_id(key.clone()),
            },
            move |applied| {
                let Some(current) = applied.into_found().into_iter().next() else {
                    return Err(TrackerError::RecordNotFound {
                        collection: Collection::PushStatus,
                        key,
                    });
                };
                if let Some(status) = record_status(&current).filter(|s| s.is_terminal()) {
                    tracing::warn!(push_id = %key, status = status.as_str(), "push already finished, failure ignored");
                    return Ok(Chain::new(Vec::new(), 0));
                }
                let update = Mutation::Update {
                    filter: Filter::by_id(key),
                    changes,
                };
                Ok(Chain::new(vec![update], 1))
            },
        )
    }

    fn ensure_created(&self) -> Result<(), TrackerError> {
        if self.created.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(TrackerError::NotCreated(self.id.key()))
        }
    }

    fn update(&self, filter: Filter, changes: &PushStatusChanges) -> Pending<Applied> {
        if let Err(error) = self.ensure_created() {
            return Pending::ready(Err(error));
        }
        let changes: Document = match to_document(changes) {
            Ok(changes) => changes,
            Err(error) => return Pending::ready(Err(error.into())),
        };
        self.queue.enqueue(Mutation::Update { filter, changes })
    }
}

fn record_status(record: &Document) -> Option<PushState> {
    serde_json::from_value(record.get("status")?.clone()).ok()
}

fn unserializable_error(type_name: &str) -> String {
    serde_json::json!({ "error": format!("unserializable {type_name}") }).to_string()
}
