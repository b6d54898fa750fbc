//! tally-core
//!
//! Status tracking for background jobs and push notification batches.
//!
//! # モジュール構成
//! - **domain**: レコード形状、ステータス、ID、配信結果の集計
//! - **ports**: 抽象化レイヤー（StatusStore, Clock, IdGenerator）
//! - **impls**: 実装（InMemoryStatusStore など開発用）
//! - **queue**: レコード単位の順序付きミューテーションキュー
//! - **tracker**: JobStatusTracker / PushStatusTracker
//! - **observability**: tracing subscriber の初期化

pub mod domain;
pub mod error;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod queue;
pub mod tracker;

#[cfg(test)]
mod testing;

pub use error::TrackerError;
pub use queue::Pending;
pub use tracker::{JobStatusTracker, PushOptions, PushStatusTracker, TrackerConfig};
