use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::ServiceError;

/// Upper bound on `limit` for every list endpoint.
pub const MAX_LIMIT: usize = 500;

/// Parameters for list/query operations.
#[derive(Debug, Clone, Deserialize)]
pub struct ListParams {
    /// Maximum number of results to return.
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// Offset for pagination.
    #[serde(default)]
    pub offset: usize,

    /// Sort field.
    #[serde(default)]
    pub sort: Option<String>,

    /// Search query string (matched against codes and names).
    #[serde(default)]
    pub q: Option<String>,
}

fn default_limit() -> usize {
    50
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            offset: 0,
            sort: None,
            q: None,
        }
    }
}

impl ListParams {
    /// The limit clamped to [`MAX_LIMIT`].
    pub fn capped_limit(&self) -> usize {
        self.limit.min(MAX_LIMIT)
    }
}

/// Result wrapper for list operations.
#[derive(Debug, Clone, Serialize)]
pub struct ListResult<T: Serialize> {
    pub items: Vec<T>,
    pub total: usize,
}

/// Generate a new random ID (UUIDv4, no dashes).
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string().replace('-', "")
}

/// Get the current time as an RFC 3339 string.
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Merge a JSON patch into a base value.
///
/// For each key in `patch`:
/// - If the value is `null`, the key is removed from `base`.
/// - Otherwise, the key is set to the patch value.
///
/// This follows RFC 7386 (JSON Merge Patch) semantics.
pub fn merge_patch(base: &mut serde_json::Value, patch: &serde_json::Value) {
    if let (Some(base_obj), Some(patch_obj)) = (base.as_object_mut(), patch.as_object()) {
        for (key, value) in patch_obj {
            if value.is_null() {
                base_obj.remove(key);
            } else if value.is_object() {
                let entry = base_obj
                    .entry(key.clone())
                    .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
                merge_patch(entry, value);
            } else {
                base_obj.insert(key.clone(), value.clone());
            }
        }
    } else {
        *base = patch.clone();
    }
}

/// Apply a JSON merge-patch to a record.
///
/// `id`, `createdAt` and the listed `immutable` fields are ignored;
/// `updatedAt` is refreshed. The patched document must still deserialize.
pub fn apply_patch<T: Serialize + DeserializeOwned>(
    current: &T,
    patch: serde_json::Value,
    immutable: &[&str],
) -> Result<T, ServiceError> {
    let mut json = serde_json::to_value(current).map_err(|e| ServiceError::Internal(e.to_string()))?;

    let mut patch = patch;
    let obj = patch
        .as_object_mut()
        .ok_or_else(|| ServiceError::Validation("patch body must be a JSON object".into()))?;
    obj.remove("id");
    obj.remove("createdAt");
    for field in immutable {
        obj.remove(*field);
    }
    obj.insert("updatedAt".into(), serde_json::json!(now_rfc3339()));

    merge_patch(&mut json, &patch);
    serde_json::from_value(json).map_err(|e| ServiceError::Validation(format!("invalid patch: {e}")))
}

/// Reject zero and negative quantities.
pub fn ensure_positive(field: &str, value: Decimal) -> Result<(), ServiceError> {
    if value <= Decimal::ZERO {
        return Err(ServiceError::Validation(format!(
            "{field} must be positive, got {value}"
        )));
    }
    Ok(())
}

/// Reject negative quantities and prices.
pub fn ensure_non_negative(field: &str, value: Decimal) -> Result<(), ServiceError> {
    if value < Decimal::ZERO {
        return Err(ServiceError::Validation(format!(
            "{field} must not be negative, got {value}"
        )));
    }
    Ok(())
}

/// Reject blank required strings.
pub fn ensure_not_blank(field: &str, value: &str) -> Result<(), ServiceError> {
    if value.trim().is_empty() {
        return Err(ServiceError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_new_id() {
        let id = new_id();
        assert_eq!(id.len(), 32);
        assert!(!id.contains('-'));
    }

    #[test]
    fn test_now_rfc3339() {
        let ts = now_rfc3339();
        assert!(ts.contains('T'));
    }

    #[test]
    fn test_merge_patch() {
        let mut base = serde_json::json!({"a": 1, "b": 2, "c": {"d": 3}});
        let patch = serde_json::json!({"b": null, "c": {"e": 4}, "f": 5});
        merge_patch(&mut base, &patch);
        assert_eq!(
            base,
            serde_json::json!({"a": 1, "c": {"d": 3, "e": 4}, "f": 5})
        );
    }

    #[test]
    fn patch_skips_protected_fields() {
        #[derive(Debug, Serialize, Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Rec {
            id: String,
            code: String,
            name: String,
            updated_at: String,
        }
        let rec = Rec { id: "1".into(), code: "C".into(), name: "old".into(), updated_at: "t0".into() };
        let out = apply_patch(
            &rec,
            serde_json::json!({"id": "2", "code": "X", "name": "new"}),
            &["code"],
        )
        .unwrap();
        assert_eq!(out.id, "1");
        assert_eq!(out.code, "C");
        assert_eq!(out.name, "new");
        assert_ne!(out.updated_at, "t0");

        assert!(apply_patch(&rec, serde_json::json!([1]), &[]).is_err());
    }

    #[test]
    fn limit_is_capped() {
        let params = ListParams { limit: 10_000, ..Default::default() };
        assert_eq!(params.capped_limit(), MAX_LIMIT);
    }

    #[test]
    fn quantity_guards() {
        assert!(ensure_positive("quantity", dec!(0.5)).is_ok());
        assert!(ensure_positive("quantity", dec!(0)).is_err());
        assert!(ensure_non_negative("unitPrice", dec!(0)).is_ok());
        assert!(ensure_non_negative("unitPrice", dec!(-1)).is_err());
        assert!(ensure_not_blank("code", "  ").is_err());
    }
}
