use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::errors::OrderError;

/// An order record built from the baseline source file.
///
/// Only `order_uid` and `date_created` are owned by this service; every
/// other field of the baseline object is carried through untouched via the
/// flattened map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_uid: String,
    #[serde(default = "Utc::now")]
    pub date_created: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Read the baseline record and stamp it with the submitted identifier and
/// the current wall-clock time. The source is re-read on every call and
/// the identifier is taken as-is; no validation, no retries.
///
/// # Errors
///
/// Returns `OrderError::SourceUnavailable` if the baseline file cannot be
/// read, or `OrderError::SourceMalformed` if it does not parse into an
/// order-shaped JSON object.
pub fn load_and_stamp(path: &Path, order_uid: &str) -> Result<OrderRecord, OrderError> {
    let raw = fs::read_to_string(path).map_err(OrderError::SourceUnavailable)?;

    let mut record: OrderRecord =
        serde_json::from_str(&raw).map_err(OrderError::SourceMalformed)?;

    record.order_uid = order_uid.to_owned();
    record.date_created = Utc::now();

    Ok(record)
}
