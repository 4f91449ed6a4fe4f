//! Partial-record merge shared by the store implementations.

use boilerbrain_types::{StoreError, StoreResult};
use serde_json::Value;

/// Merge the top-level fields of `partial` into `existing`.
pub(crate) fn merge_top_level(existing: &mut Value, partial: Value) -> StoreResult<()> {
    let Value::Object(fields) = partial else {
        return Err(StoreError::Malformed(
            "partial record must be a JSON object".to_string(),
        ));
    };
    let Value::Object(target) = existing else {
        return Err(StoreError::Malformed(
            "stored record is not a JSON object".to_string(),
        ));
    };
    for (field, value) in fields {
        target.insert(field, value);
    }
    Ok(())
}
