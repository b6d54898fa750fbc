//! Domain - ドメインモデル
//!
//! ID・ステータス・レコード形状・アラート・配信結果の集計を定義します。
//! ストアやランタイムには依存しません。

pub mod aggregate;
pub mod alert;
pub mod ids;
pub mod outcome;
pub mod record;
pub mod status;

pub use aggregate::{aggregate, Aggregation};
pub use alert::{Alert, PushBody, EMPTY_PUSH_HASH};
pub use ids::{JobStatusId, PushStatusId};
pub use outcome::{DeliveryOutcome, DeliveryResult, Device, Leaves};
pub use record::{
    AccessPolicy, Collection, Document, JobStatusChanges, JobStatusRecord, PushCounters,
    PushStatusChanges, PushStatusRecord,
};
pub use status::{JobState, PushState};
