//! IdGenerator port - ID 生成の抽象化
//!
//! トラッカーは構築時に一度だけ ID を生成し、以後変更しません。
//! テスト容易性のために、trait として抽象化しています。
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース（本番用）

use crate::domain::ids::{JobStatusId, PushStatusId};
use crate::ports::Clock;
use ulid::Ulid;

/// IdGenerator はステータスレコードの ID を生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（複数スレッドから使える）
pub trait IdGenerator: Send + Sync {
    fn generate_job_status_id(&self) -> JobStatusId;

    fn generate_push_status_id(&self) -> PushStatusId;
}

/// UlidGenerator は ULID ベースの ID 生成器
///
/// Clock を使って現在時刻ベースの ULID を生成します。
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_job_status_id(&self) -> JobStatusId {
        JobStatusId::from(self.next_ulid())
    }

    fn generate_push_status_id(&self) -> PushStatusId {
        PushStatusId::from(self.next_ulid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{FixedClock, SystemClock};
    use chrono::{TimeZone, Utc};

    #[test]
    fn ulid_generator_generates_unique_ids() {
        let id_gen = UlidGenerator::new(SystemClock);

        let id1 = id_gen.generate_push_status_id();
        let id2 = id_gen.generate_push_status_id();

        assert_ne!(id1, id2);
    }

    #[test]
    fn ulid_generator_with_fixed_clock_shares_timestamp() {
        let fixed_time = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let id_gen = UlidGenerator::new(FixedClock::new(fixed_time));

        let id1 = id_gen.generate_job_status_id();
        let id2 = id_gen.generate_job_status_id();

        // ランダム部分があるので ID は異なるが、timestamp 部分は同じ
        assert_ne!(id1, id2);
        assert_eq!(id1.as_ulid().timestamp_ms(), id2.as_ulid().timestamp_ms());
        assert_eq!(
            id1.as_ulid().timestamp_ms(),
            fixed_time.timestamp_millis() as u64
        );
    }

    #[test]
    fn ids_are_prefixed_by_kind() {
        let id_gen = UlidGenerator::new(SystemClock);

        assert!(id_gen.generate_job_status_id().to_string().starts_with("job-"));
        assert!(id_gen.generate_push_status_id().to_string().starts_with("push-"));
    }
}
