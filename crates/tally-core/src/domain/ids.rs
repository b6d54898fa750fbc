//! Domain identifiers (strongly-typed IDs).
//!
//! ステータスレコードの `objectId` は ULID ベースの ID で、
//! Phantom type パターンによりジョブ用とプッシュ用を型で区別します。
//!
//! ## ULID の特性
//! - **時刻でソート可能**: timestamp が先頭にあるため、生成順序でソートできる
//! - **分散生成可能**: 調整なしで複数ノードで生成できる
//!
//! `Display` の結果（プレフィックス付き）がストレージ上のキーになります。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// IdMarker は各 ID 型のマーカー trait
///
/// Display で使うプレフィックス（"job-", "push-"）を提供します。
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// ジェネリック ID 型
///
/// `T` は PhantomData で、実行時にはメモリを消費しませんが、
/// コンパイル時に型安全性を提供します。
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }

    /// Storage key (`objectId`) of the record this id names.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

/// Marker for background job status records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JobStatusMarker {}

impl IdMarker for JobStatusMarker {
    fn prefix() -> &'static str {
        "job-"
    }
}

/// Marker for push batch status records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PushStatusMarker {}

impl IdMarker for PushStatusMarker {
    fn prefix() -> &'static str {
        "push-"
    }
}

/// Identifier of a background job status record.
pub type JobStatusId = Id<JobStatusMarker>;

/// Identifier of a push batch status record.
pub type PushStatusId = Id<PushStatusMarker>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_carry_their_prefix() {
        let ulid = Ulid::new();

        let job = JobStatusId::from_ulid(ulid);
        let push = PushStatusId::from_ulid(ulid);

        assert_eq!(job.as_ulid(), push.as_ulid());
        assert_eq!(job.to_string(), format!("job-{ulid}"));
        assert_eq!(push.key(), format!("push-{ulid}"));

        // let _: JobStatusId = push; // <- does not compile
    }

    #[test]
    fn phantom_data_does_not_consume_memory() {
        use std::mem::size_of;

        assert_eq!(size_of::<JobStatusId>(), size_of::<Ulid>());
        assert_eq!(size_of::<PushStatusId>(), 16);
    }
}
