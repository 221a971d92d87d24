//! Public output types for config mutations.
//!
//! Pipeline results live in `pipeline`; these cover the site/server store.

use serde::Serialize;

/// Result of a config merge operation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeResult {
    pub id: String,
    pub updated_fields: Vec<String>,
}

/// Result of a config remove operation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveResult {
    pub id: String,
    pub removed_from: Vec<String>,
}
