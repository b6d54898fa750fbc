//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! トラッカーは具体的なストレージや時計を知らず、ここの trait だけに依存します。

pub mod clock;
pub mod id_generator;
pub mod storage;

// 主要な trait を再エクスポート
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::storage::{Filter, StatusStore, StoreError};
