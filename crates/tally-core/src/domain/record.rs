//! Record - 永続化するレコードの形
//!
//! # 表現
//! - ストアには camelCase のフィールド名を持つ JSON ドキュメントとして書き込む
//! - 部分更新は `*Changes` 構造体で表し、未設定のフィールドはドキュメントに含めない
//!   → マージで既存の値を消さない

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{JobStatusId, PushStatusId};
use super::status::{JobState, PushState};

/// A stored record: top-level field name to JSON value.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Name of the key field every status record carries.
pub const KEY_FIELD: &str = "objectId";

/// Logical collections the trackers touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    JobStatus,
    PushStatus,
    /// Device registrations; only touched by stale-token cleanup.
    Installation,
}

impl Collection {
    pub fn as_str(self) -> &'static str {
        match self {
            Collection::JobStatus => "_JobStatus",
            Collection::PushStatus => "_PushStatus",
            Collection::Installation => "_Installation",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who may read or write a record besides the store's own callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessPolicy {
    /// Locked down: only reachable through the tracker and the store.
    NoPublicAccess,
}

/// Serialize a record into a store document.
///
/// Anything that does not serialize to a JSON object is rejected.
pub fn to_document<T: Serialize>(value: &T) -> Result<Document, serde_json::Error> {
    match serde_json::to_value(value)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(serde::ser::Error::custom(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}

/// Background job status, as created by `JobStatusTracker::set_running`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusRecord {
    pub object_id: String,
    pub job_name: String,
    pub params: serde_json::Value,
    pub status: JobState,
    pub source: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobStatusRecord {
    /// Jobs started through the tracker are always tagged with this source.
    pub const SOURCE: &'static str = "api";

    pub fn running(
        id: JobStatusId,
        job_name: impl Into<String>,
        params: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            object_id: id.key(),
            job_name: job_name.into(),
            params,
            status: JobState::Running,
            source: Self::SOURCE.to_string(),
            created_at: now,
            message: None,
            finished_at: None,
        }
    }
}

/// Partial update of a job status record.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<JobState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

/// Cumulative delivery counters of a push batch.
///
/// Deserialization is lenient: missing counters read as zero and missing
/// maps as empty, so an older record never aborts aggregation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PushCounters {
    pub num_sent: u64,
    pub num_failed: u64,
    pub sent_per_type: BTreeMap<String, u64>,
    pub failed_per_type: BTreeMap<String, u64>,
}

/// Push batch status, as created by `PushStatusTracker::set_initial`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushStatusRecord {
    pub object_id: String,
    pub created_at: DateTime<Utc>,
    /// ISO-8601 rendering of the send time, millisecond precision.
    pub push_time: String,
    /// Target installation query, serialized JSON.
    pub query: String,
    /// Notification `data`, serialized JSON.
    pub payload: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<serde_json::Value>,
    pub status: PushState,
    pub num_opened: u64,
    #[serde(flatten)]
    pub counters: PushCounters,
    pub push_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl PushStatusRecord {
    /// A freshly created batch: pending, zeroed counters, empty per-type maps.
    pub fn pending(id: PushStatusId, now: DateTime<Utc>, push_hash: String) -> Self {
        Self {
            object_id: id.key(),
            created_at: now,
            push_time: now.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            query: String::new(),
            payload: String::new(),
            source: String::new(),
            title: None,
            expiry: None,
            status: PushState::Pending,
            num_opened: 0,
            counters: PushCounters::default(),
            push_hash,
            updated_at: None,
            error_message: None,
        }
    }
}

/// Partial update of a push status record.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushStatusChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PushState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(flatten)]
    pub counters: Option<PushCounters>,
}

/// Convenience for reading a record id back out of a document.
pub fn document_key(document: &Document) -> Option<&str> {
    document.get(KEY_FIELD).and_then(|v| v.as_str())
}
