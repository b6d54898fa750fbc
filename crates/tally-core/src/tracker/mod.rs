//! Tracker - ステータスレコードの追跡
//!
//! ジョブ 1 件・プッシュバッチ 1 件につきトラッカー 1 つ。
//! トラッカーはレコードの ID と専用の `MutationQueue` を持ち、
//! 書き込みは呼び出し順にストアへ反映されます。

pub mod config;
pub mod job;
pub mod push;

pub use config::{TrackerConfig, TrackerConfigBuilder};
pub use job::JobStatusTracker;
pub use push::{PushOptions, PushStatusTracker};
