//! Field-by-field merge of configuration tiers.
//!
//! Tiers are merged as JSON values before being deserialized into
//! [`Config`](super::Config), so a tier only has to name the keys it changes.

use serde_json::Value;

/// Merge `overlay` into `base` in place.
///
/// Objects merge key by key. A null in `overlay` leaves `base` alone; any
/// other value (arrays included) replaces it.
pub fn merge_into(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (_, Value::Null) => {}
        (Value::Object(target), Value::Object(source)) => {
            for (key, value) in source {
                match target.get_mut(&key) {
                    Some(existing) => merge_into(existing, value),
                    None if value.is_null() => {}
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Merge two values, with `overlay` taking precedence.
///
/// # Example
/// ```
/// use serde_json::json;
/// use task_sync::config::deep_merge;
///
/// let base = json!({"server": {"http": {"host": "127.0.0.1", "port": 5000}}});
/// let overlay = json!({"server": {"http": {"port": 8080}}});
/// assert_eq!(
///     deep_merge(base, overlay),
///     json!({"server": {"http": {"host": "127.0.0.1", "port": 8080}}})
/// );
/// ```
pub fn deep_merge(mut base: Value, overlay: Value) -> Value {
    merge_into(&mut base, overlay);
    base
}

/// Merge tiers lowest first.
pub fn deep_merge_all(tiers: impl IntoIterator<Item = Value>) -> Value {
    let mut merged = Value::Null;
    for tier in tiers {
        merge_into(&mut merged, tier);
    }
    merged
}
