//! TrackerConfig - トラッカー構築時の依存関係
//!
//! # 使用例
//! ```ignore
//! let config = TrackerConfig::builder(Arc::new(InMemoryStatusStore::new()))
//!     .clock(Arc::new(FixedClock::new(at)))
//!     .build();
//! let job = JobStatusTracker::new(&config);
//! ```

use std::sync::Arc;

use crate::ports::{Clock, IdGenerator, StatusStore, SystemClock, UlidGenerator};

/// Shared handles every tracker is built from.
///
/// Cloning is cheap; one config usually serves every tracker in a process.
#[derive(Clone)]
pub struct TrackerConfig {
    pub(crate) store: Arc<dyn StatusStore>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) ids: Arc<dyn IdGenerator>,
}

impl TrackerConfig {
    /// Defaults: [`SystemClock`] and a ULID generator on the same clock.
    pub fn new(store: Arc<dyn StatusStore>) -> Self {
        Self::builder(store).build()
    }

    pub fn builder(store: Arc<dyn StatusStore>) -> TrackerConfigBuilder {
        TrackerConfigBuilder {
            store,
            clock: None,
            ids: None,
        }
    }

    pub fn store(&self) -> &Arc<dyn StatusStore> {
        &self.store
    }
}

pub struct TrackerConfigBuilder {
    store: Arc<dyn StatusStore>,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
}

impl TrackerConfigBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn build(self) -> TrackerConfig {
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(SharedClock(Arc::clone(&clock)))));
        TrackerConfig {
            store: self.store,
            clock,
            ids,
        }
    }
}

/// Lets the default id generator read the configured clock.
struct SharedClock(Arc<dyn Clock>);

impl Clock for SharedClock {
    fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.0.now()
    }
}
