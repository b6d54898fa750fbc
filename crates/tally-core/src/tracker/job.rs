//! JobStatusTracker - バックグラウンドジョブのステータス追跡
//!
//! # 状態遷移
//! - (なし) -> running -> succeeded | failed
//! - 終了状態からの遷移は `status == running` のガードで防ぐ

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::domain::record::{to_document, AccessPolicy, Collection, JobStatusChanges, JobStatusRecord};
use crate::domain::{JobState, JobStatusId};
use crate::error::TrackerError;
use crate::ports::{Clock, Filter};
use crate::queue::{Applied, Mutation, MutationQueue, Pending};

use super::config::TrackerConfig;

/// Tracks one background job through `running -> succeeded | failed`.
///
/// `set_running` creates the record and must come first; the other
/// operations are rejected until it has been called. Every operation is
/// applied to the store in the order it was called.
pub struct JobStatusTracker {
    id: JobStatusId,
    queue: MutationQueue,
    clock: Arc<dyn Clock>,
    created: AtomicBool,
}

impl JobStatusTracker {
    pub fn new(config: &TrackerConfig) -> Self {
        let id = config.ids.generate_job_status_id();
        Self {
            id,
            queue: MutationQueue::new(Arc::clone(&config.store), Collection::JobStatus, id.key()),
            clock: Arc::clone(&config.clock),
            created: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> JobStatusId {
        self.id
    }

    /// Create the job record in the running state.
    pub fn set_running(&self, job_name: &str, params: serde_json::Value) -> Pending<()> {
        if self.created.swap(true, Ordering::SeqCst) {
            return Pending::ready(Err(TrackerError::AlreadyCreated(self.id.key())));
        }

        let record = JobStatusRecord::running(self.id, job_name, params, self.clock.now());
        let document = match to_document(&record) {
            Ok(document) => document,
            Err(error) => return Pending::ready(Err(error.into())),
        };

        tracing::info!(job_id = %self.id, job_name, "job running");
        self.queue
            .enqueue(Mutation::Create {
                document,
                access: AccessPolicy::NoPublicAccess,
            })
            .map(|_| ())
    }

    /// Record a progress message. Empty or missing messages are ignored
    /// without touching the store.
    pub fn set_message(&self, message: Option<&str>) -> Pending<()> {
        let Some(message) = non_empty(message) else {
            return Pending::ready(Ok(()));
        };
        let changes = JobStatusChanges {
            message: Some(message.to_string()),
            ..Default::default()
        };
        self.update(Filter::by_id(self.id.key()), &changes).map(|_| ())
    }

    /// Resolves with the number of records the transition applied to: zero
    /// when the job had already finished.
    pub fn set_succeeded(&self, message: Option<&str>) -> Pending<u64> {
        self.set_final_status(JobState::Succeeded, message)
    }

    pub fn set_failed(&self, message: Option<&str>) -> Pending<u64> {
        self.set_final_status(JobState::Failed, message)
    }

    fn set_final_status(&self, status: JobState, message: Option<&str>) -> Pending<u64> {
        let changes = JobStatusChanges {
            status: Some(status),
            message: non_empty(message).map(str::to_string),
            finished_at: Some(self.clock.now()),
        };
        tracing::info!(job_id = %self.id, status = status.as_str(), "job finished");

        let job_id = self.id;
        self.update(self.final_transition_guard(), &changes)
            .map(move |applied| {
                let matched = applied.matched();
                if matched == 0 {
                    tracing::warn!(%job_id, status = status.as_str(), "job was not running, final status ignored");
                }
                matched
            })
    }

    /// Only a running job may finish.
    fn final_transition_guard(&self) -> Filter {
        Filter::by_id(self.id.key()).with("status", JobState::Running.as_str())
    }

    fn update(&self, filter: Filter, changes: &JobStatusChanges) -> Pending<Applied> {
        if !self.created.load(Ordering::SeqCst) {
            return Pending::ready(Err(TrackerError::NotCreated(self.id.key())));
        }
        match to_document(changes) {
            Ok(changes) => self.queue.enqueue(Mutation::Update { filter, changes }),
            Err(error) => Pending::ready(Err(error.into())),
        }
    }
}

fn non_empty(message: Option<&str>) -> Option<&str> {
    message.filter(|m| !m.is_empty())
}
