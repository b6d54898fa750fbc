//! InMemoryStatusStore - 開発用のステータスストア
//!
//! # 実装詳細
//! - コレクションごとに `Vec<StoredRecord>` を保持（挿入順を維持）
//! - tokio::sync::Mutex で排他制御（1 呼び出し = 1 ロック = アトミック）
//! - アクセスポリシーはドキュメントとは別に保存

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::record::{document_key, AccessPolicy, Collection, Document};
use crate::ports::{Filter, StatusStore, StoreError};

#[derive(Debug, Clone)]
struct StoredRecord {
    document: Document,
    access: Option<AccessPolicy>,
}

/// In-memory implementation of [`StatusStore`].
#[derive(Default)]
pub struct InMemoryStatusStore {
    collections: Mutex<HashMap<Collection, Vec<StoredRecord>>>,
}

impl InMemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record directly, bypassing key checks (fixtures, demo data).
    pub async fn insert(&self, collection: Collection, document: Document) {
        let mut collections = self.collections.lock().await;
        collections.entry(collection).or_default().push(StoredRecord {
            document,
            access: None,
        });
    }

    /// Copy of every document in `collection`, in insertion order.
    pub async fn snapshot(&self, collection: Collection) -> Vec<Document> {
        let collections = self.collections.lock().await;
        collections
            .get(&collection)
            .map(|records| records.iter().map(|r| r.document.clone()).collect())
            .unwrap_or_default()
    }

    /// Access policy the record with `key` was created with.
    pub async fn access_policy(&self, collection: Collection, key: &str) -> Option<AccessPolicy> {
        let collections = self.collections.lock().await;
        collections
            .get(&collection)?
            .iter()
            .find(|r| document_key(&r.document) == Some(key))?
            .access
    }
}

#[async_trait]
impl StatusStore for InMemoryStatusStore {
    async fn create(
        &self,
        collection: Collection,
        document: Document,
        access: AccessPolicy,
    ) -> Result<Document, StoreError> {
        let key = document_key(&document)
            .ok_or(StoreError::MissingKey)?
            .to_string();

        let mut collections = self.collections.lock().await;
        let records = collections.entry(collection).or_default();
        if records
            .iter()
            .any(|r| document_key(&r.document) == Some(key.as_str()))
        {
            return Err(StoreError::DuplicateKey { collection, key });
        }

        records.push(StoredRecord {
            document: document.clone(),
            access: Some(access),
        });
        Ok(document)
    }

    async fn update(
        &self,
        collection: Collection,
        filter: &Filter,
        changes: Document,
    ) -> Result<u64, StoreError> {
        let mut collections = self.collections.lock().await;
        let Some(records) = collections.get_mut(&collection) else {
            return Ok(0);
        };

        let mut matched = 0;
        for record in records.iter_mut().filter(|r| filter.matches(&r.document)) {
            for (field, value) in &changes {
                record.document.insert(field.clone(), value.clone());
            }
            matched += 1;
        }
        Ok(matched)
    }

    async fn find(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Vec<Document>, StoreError> {
        let collections = self.collections.lock().await;
        Ok(collections
            .get(&collection)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| filter.matches(&r.document))
                    .map(|r| r.document.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn destroy(&self, collection: Collection, filter: &Filter) -> Result<u64, StoreError> {
        let mut collections = self.collections.lock().await;
        let Some(records) = collections.get_mut(&collection) else {
            return Ok(0);
        };

        let before = records.len();
        records.retain(|r| !filter.matches(&r.document));
        Ok((before - records.len()) as u64)
    }
}
