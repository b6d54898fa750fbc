//! Alert - 通知本文と重複検出用ハッシュ
//!
//! # ハッシュ規則
//! - テキストのアラートはその文字列の MD5
//! - オブジェクト・配列のアラートはキーをソートした JSON の MD5
//! - アラートなし（null・数値・真偽値を含む）は空文字列の MD5
//!
//! セキュリティ用途のハッシュではありません。

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

use super::record::Document;

/// MD5 of the empty string; the hash of a notification without an alert.
pub const EMPTY_PUSH_HASH: &str = "d41d8cd98f00b204e9800998ecf8427e";

/// Body of a push request: `{ "data": { "alert": ..., ... }, "expiration_time": ... }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PushBody {
    #[serde(default)]
    pub data: Document,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_time: Option<serde_json::Value>,
}

impl PushBody {
    pub fn new(data: Document) -> Self {
        Self {
            data,
            expiration_time: None,
        }
    }

    pub fn with_expiration_time(mut self, expiration_time: serde_json::Value) -> Self {
        self.expiration_time = Some(expiration_time);
        self
    }

    pub fn alert(&self) -> Alert {
        Alert::from_value(self.data.get("alert"))
    }
}

/// The alert of a notification, by shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Alert {
    /// Plain alert text.
    Text(String),
    /// Rich alert (object or array), e.g. `{ "title": ..., "body": ... }`.
    Structured(serde_json::Value),
    None,
}

impl Alert {
    /// Classify a raw `alert` value.
    ///
    /// `null`, numbers and booleans are not alerts and classify as `None`.
    pub fn from_value(value: Option<&serde_json::Value>) -> Self {
        match value {
            Some(serde_json::Value::String(text)) => Alert::Text(text.clone()),
            Some(v @ (serde_json::Value::Object(_) | serde_json::Value::Array(_))) => {
                Alert::Structured(v.clone())
            }
            _ => Alert::None,
        }
    }

    /// Content hash used to recognize repeated notifications. Not a security hash.
    ///
    /// Structured alerts hash their canonical JSON form (object keys sorted).
    pub fn push_hash(&self) -> String {
        match self {
            Alert::Text(text) => md5_hex(text.as_bytes()),
            Alert::Structured(value) => md5_hex(value.to_string().as_bytes()),
            Alert::None => EMPTY_PUSH_HASH.to_string(),
        }
    }
}

fn md5_hex(bytes: &[u8]) -> String {
    hex::encode(Md5::digest(bytes))
}
