//! Mutation - キューが適用するストア操作と、その結果

use crate::domain::record::{AccessPolicy, Collection, Document};
use crate::ports::{Filter, StatusStore, StoreError};

/// One storage operation against a queue's record.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Persist the record. Issued at most once per tracker.
    Create {
        document: Document,
        access: AccessPolicy,
    },

    /// Merge `changes` into the record(s) matching `filter`.
    Update { filter: Filter, changes: Document },

    /// Read the record(s) matching `filter`.
    Get { filter: Filter },

    /// Remove records of another collection. Never touches the queue's own
    /// record.
    DeleteRelated {
        collection: Collection,
        filter: Filter,
    },
}

impl Mutation {
    pub fn kind(&self) -> &'static str {
        match self {
            Mutation::Create { .. } => "create",
            Mutation::Update { .. } => "update",
            Mutation::Get { .. } => "get",
            Mutation::DeleteRelated { .. } => "delete_related",
        }
    }

    pub(crate) async fn apply(
        self,
        store: &dyn StatusStore,
        collection: Collection,
    ) -> Result<Applied, StoreError> {
        match self {
            Mutation::Create { document, access } => store
                .create(collection, document, access)
                .await
                .map(Applied::Created),
            Mutation::Update { filter, changes } => store
                .update(collection, &filter, changes)
                .await
                .map(|matched| Applied::Updated { matched }),
            Mutation::Get { filter } => store.find(collection, &filter).await.map(Applied::Found),
            Mutation::DeleteRelated { collection, filter } => store
                .destroy(collection, &filter)
                .await
                .map(|removed| Applied::Deleted { removed }),
        }
    }
}

/// Result of an applied mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    Created(Document),
    Updated { matched: u64 },
    Found(Vec<Document>),
    Deleted { removed: u64 },
}

impl Applied {
    /// Records an update matched; zero for anything else.
    pub fn matched(&self) -> u64 {
        match self {
            Applied::Updated { matched } => *matched,
            _ => 0,
        }
    }

    /// Documents a read returned; empty for anything else.
    pub fn into_found(self) -> Vec<Document> {
        match self {
            Applied::Found(documents) => documents,
            _ => Vec::new(),
        }
    }
}

/// Follow-up mutations computed from a read, plus the value the chain
/// resolves with once they are applied.
#[derive(Debug)]
pub struct Chain<T> {
    pub mutations: Vec<Mutation>,
    pub output: T,
}

impl<T> Chain<T> {
    pub fn new(mutations: Vec<Mutation>, output: T) -> Self {
        Self { mutations, output }
    }
}
