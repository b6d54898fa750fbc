//! StatusStore port - ステータスレコードの永続化先
//!
//! ストレージエンジン自体はこのクレートの範囲外です。
//! 各メソッドは「単一レコードに対してアトミック」であることだけを前提にします。
//! 順序保証は store ではなく `MutationQueue` の責務です。
//!
//! # 実装
//! - **InMemoryStatusStore**: 開発・テスト用（`impls::memory_store`）

use async_trait::async_trait;

use crate::domain::record::{AccessPolicy, Collection, Document, KEY_FIELD};

/// StoreError はストレージ呼び出しの失敗
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("record {key} already exists in {collection}")]
    DuplicateKey { collection: Collection, key: String },

    #[error("document has no objectId field")]
    MissingKey,

    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// A conjunction of top-level field equalities.
///
/// `Filter::by_id(key).with("status", "pending")` matches the record with that
/// key only while its status is still pending.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    fields: Document,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Match the record whose key field equals `key`.
    pub fn by_id(key: impl Into<String>) -> Self {
        Self::new().with(KEY_FIELD, key.into())
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn matches(&self, document: &Document) -> bool {
        self.fields
            .iter()
            .all(|(field, expected)| document.get(field) == Some(expected))
    }

    pub fn fields(&self) -> &Document {
        &self.fields
    }
}

/// StatusStore はレコード単位でアトミックな CRUD を提供
///
/// # Thread Safety
/// - `Send + Sync` を要求（複数のトラッカーから共有される）
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Persist a new record. Fails with `DuplicateKey` if the key exists.
    async fn create(
        &self,
        collection: Collection,
        document: Document,
        access: AccessPolicy,
    ) -> Result<Document, StoreError>;

    /// Merge `changes` into every record matching `filter`.
    ///
    /// Returns the number of records matched.
    async fn update(
        &self,
        collection: Collection,
        filter: &Filter,
        changes: Document,
    ) -> Result<u64, StoreError>;

    async fn find(&self, collection: Collection, filter: &Filter)
    -> Result<Vec<Document>, StoreError>;

    /// Delete every record matching `filter`; returns how many were removed.
    async fn destroy(&self, collection: Collection, filter: &Filter) -> Result<u64, StoreError>;
}
