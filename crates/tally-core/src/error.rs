use thiserror::Error;

use crate::domain::Collection;
use crate::ports::StoreError;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("record {key} not found in {collection}")]
    RecordNotFound { collection: Collection, key: String },

    #[error("record {0} has not been created yet")]
    NotCreated(String),

    #[error("record {0} was already created by this tracker")]
    AlreadyCreated(String),

    #[error("record {key} already finished as {status}")]
    AlreadyFinished { key: String, status: &'static str },

    #[error("mutation queue for {0} is closed")]
    QueueClosed(String),

    #[error("record encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}
