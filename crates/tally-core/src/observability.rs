//! ログ出力の初期化
//!
//! ライブラリ自身は `tracing` のマクロを呼ぶだけで、subscriber はバイナリ側が
//! `init` で設定します。

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "info";

/// Install a fmt subscriber filtered by `RUST_LOG`.
///
/// Safe to call multiple times; only the first call installs anything.
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
