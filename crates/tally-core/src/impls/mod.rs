//! Impls - 実装（開発用・テスト用）
//!
//! このモジュールには ports の実装を含めます。
//!
//! # 含まれる実装
//! - **InMemoryStatusStore**: 開発用のステータスストア
//!
//! # 本番用実装
//! 本番用のストア（MongoDB / PostgreSQL など）は別クレートに配置します。

pub mod memory_store;

// 主要な型を再エクスポート
pub use self::memory_store::InMemoryStatusStore;
