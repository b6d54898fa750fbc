//! DeliveryOutcome - プロバイダから返る配信結果
//!
//! # 入力の形
//! - プロバイダごとの配列で届くことが多いが、さらに入れ子になることもある
//! - `null` や壊れたエントリが混ざることもある
//!
//! # 読み取り方針
//! - 集計に使うのは `device.deviceType` だけで、他のフィールドの型崩れでは捨てない
//! - `transmitted` はリテラルの `true` のときだけ送信成功、それ以外は失敗扱い
//! - `response` は任意の JSON として保持し、`registration_id` だけを読む

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Nesting deeper than this is treated as malformed and skipped.
pub const MAX_RESULT_DEPTH: usize = 16;

/// The device a delivery was attempted on.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub device_type: Option<String>,
    pub device_token: Option<String>,
}

impl Device {
    /// Non-string fields read as absent; anything but an object is no device.
    fn from_value(value: Value) -> Option<Self> {
        let Value::Object(fields) = value else {
            return None;
        };
        let string_field = |name: &str| fields.get(name).and_then(Value::as_str).map(str::to_string);
        Some(Self {
            device_type: string_field("deviceType"),
            device_token: string_field("deviceToken"),
        })
    }
}

/// One delivery attempt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeliveryOutcome {
    #[serde(default, deserialize_with = "lenient_device")]
    pub device: Option<Device>,

    #[serde(default, deserialize_with = "literally_true")]
    pub transmitted: bool,

    /// Raw provider answer. A `registration_id` in it means the provider
    /// issued a new registration and the stored device token is stale.
    #[serde(default)]
    pub response: Option<Value>,
}

fn lenient_device<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Device>, D::Error> {
    Ok(Device::from_value(Value::deserialize(deserializer)?))
}

fn literally_true<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(matches!(Value::deserialize(deserializer)?, Value::Bool(true)))
}

impl DeliveryOutcome {
    pub fn transmitted(device_type: impl Into<String>) -> Self {
        Self {
            device: Some(Device {
                device_type: Some(device_type.into()),
                device_token: None,
            }),
            transmitted: true,
            response: None,
        }
    }

    pub fn failed(device_type: impl Into<String>) -> Self {
        Self {
            transmitted: false,
            ..Self::transmitted(device_type)
        }
    }

    pub fn with_device_token(mut self, token: impl Into<String>) -> Self {
        self.device.get_or_insert_with(Device::default).device_token = Some(token.into());
        self
    }

    pub fn with_registration_id(mut self, registration_id: impl Into<String>) -> Self {
        let registration_id = Value::String(registration_id.into());
        match &mut self.response {
            Some(Value::Object(fields)) => {
                fields.insert("registration_id".to_string(), registration_id);
            }
            response => *response = Some(serde_json::json!({ "registration_id": registration_id })),
        }
        self
    }

    /// Device type the outcome is counted under, if it can be attributed.
    pub fn device_type(&self) -> Option<&str> {
        non_empty(self.device.as_ref()?.device_type.as_deref())
    }

    /// Token to clean up when the provider signalled a re-registration.
    pub fn stale_device_token(&self) -> Option<&str> {
        let registration_id = self.response.as_ref()?.get("registration_id")?.as_str();
        non_empty(registration_id)?;
        non_empty(self.device.as_ref()?.device_token.as_deref())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// A delivery result tree: a single outcome, a batch of results, or an entry
/// that is not an outcome at all (`null`, a bare number or string).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeliveryResult {
    Batch(Vec<DeliveryResult>),
    Outcome(DeliveryOutcome),
    Unrecognized(Value),
}

impl From<DeliveryOutcome> for DeliveryResult {
    fn from(outcome: DeliveryOutcome) -> Self {
        DeliveryResult::Outcome(outcome)
    }
}

impl From<Vec<DeliveryResult>> for DeliveryResult {
    fn from(results: Vec<DeliveryResult>) -> Self {
        DeliveryResult::Batch(results)
    }
}

/// Leaf outcomes of a result tree, plus how many entries were thrown away on
/// the way.
#[derive(Debug, Default)]
pub struct Leaves<'a> {
    pub outcomes: Vec<&'a DeliveryOutcome>,
    /// Unrecognized entries, and entries of branches cut at the depth limit.
    pub dropped: usize,
}

/// Flatten nested results into leaf outcomes, in input order.
///
/// Unrecognized entries are dropped. Branches nested deeper than
/// [`MAX_RESULT_DEPTH`] are dropped with a warning.
pub fn flatten(results: &[DeliveryResult]) -> Leaves<'_> {
    let mut leaves = Leaves::default();
    collect(results, 1, &mut leaves);
    leaves
}

fn collect<'a>(results: &'a [DeliveryResult], depth: usize, leaves: &mut Leaves<'a>) {
    if depth > MAX_RESULT_DEPTH {
        tracing::warn!(depth, entries = results.len(), "delivery results nested too deep, skipping");
        leaves.dropped += results.len();
        return;
    }
    for result in results {
        match result {
            DeliveryResult::Outcome(outcome) => leaves.outcomes.push(outcome),
            DeliveryResult::Batch(nested) => collect(nested, depth + 1, leaves),
            DeliveryResult::Unrecognized(_) => leaves.dropped += 1,
        }
    }
}
