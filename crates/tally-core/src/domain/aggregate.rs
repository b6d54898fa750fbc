//! 配信結果の集計
//!
//! # 方針
//! - 永続化済みのカウンタに加算するだけで、ゼロからは数え直さない
//! - 入力順に依存しない（BTreeMap / BTreeSet で決定的）
//! - デバイス種別が分からない結果は数えずに `skipped` に回す

use std::collections::BTreeSet;

use super::outcome::{flatten, DeliveryResult};
use super::record::PushCounters;

/// Result of folding one `complete` call's outcomes onto persisted counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregation {
    pub counters: PushCounters,
    /// Device tokens the providers reported as re-registered.
    pub stale_tokens: BTreeSet<String>,
    /// Outcomes without a device type, plus the entries `flatten` dropped.
    pub skipped: usize,
}

impl PushCounters {
    pub fn record_sent(&mut self, device_type: &str) {
        self.num_sent += 1;
        *self.sent_per_type.entry(device_type.to_string()).or_insert(0) += 1;
    }

    pub fn record_failed(&mut self, device_type: &str) {
        self.num_failed += 1;
        *self.failed_per_type.entry(device_type.to_string()).or_insert(0) += 1;
    }
}

/// Fold `results` onto `base`.
///
/// Counting is order-independent and only ever adds to `base`. Entries without
/// a device type are ignored entirely, stale-token cleanup included.
pub fn aggregate(base: PushCounters, results: &[DeliveryResult]) -> Aggregation {
    let mut aggregation = Aggregation {
        counters: base,
        ..Default::default()
    };

    let leaves = flatten(results);
    aggregation.skipped = leaves.dropped;

    for outcome in leaves.outcomes {
        let Some(device_type) = outcome.device_type() else {
            aggregation.skipped += 1;
            continue;
        };

        if let Some(token) = outcome.stale_device_token() {
            aggregation.stale_tokens.insert(token.to_string());
        }

        if outcome.transmitted {
            aggregation.counters.record_sent(device_type);
        } else {
            aggregation.counters.record_failed(device_type);
        }
    }

    aggregation
}
