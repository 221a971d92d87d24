use crate::error::Error;
use crate::local_files::{self, FileSystem};
use crate::output::{MergeResult, RemoveResult};
use crate::utils::validation;
use crate::Result;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::io::Read;
use std::path::{Path, PathBuf};

// ============================================================================
// JSON Parsing Utilities (internal)
// ============================================================================

/// Parse JSON string into typed value.
pub(crate) fn from_str<T: DeserializeOwned>(s: &str) -> Result<T> {
    serde_json::from_str(s)
        .map_err(|e| Error::validation_invalid_json(e, Some("parse json".to_string())))
}

/// Serialize value to pretty-printed JSON string.
pub(crate) fn to_string_pretty<T: Serialize>(data: &T) -> Result<String> {
    serde_json::to_string_pretty(data)
        .map_err(|e| Error::internal_json(e.to_string(), Some("serialize json".to_string())))
}

/// Read JSON spec from string, file (@path), or stdin (-).
pub(crate) fn read_json_spec_to_string(spec: &str) -> Result<String> {
    use std::io::IsTerminal;

    if spec.trim() == "-" {
        let mut buf = String::new();
        let mut stdin = std::io::stdin();
        if stdin.is_terminal() {
            return Err(Error::validation_invalid_argument(
                "json",
                "Cannot read JSON from stdin when stdin is a TTY",
                None,
                None,
            ));
        }
        stdin
            .read_to_string(&mut buf)
            .map_err(|e| Error::internal_io(e.to_string(), Some("read stdin".to_string())))?;
        return Ok(buf);
    }

    if let Some(path) = spec.strip_prefix('@') {
        if path.trim().is_empty() {
            return Err(Error::validation_invalid_argument(
                "json",
                "Invalid JSON spec '@' (missing file path)",
                None,
                None,
            ));
        }

        return local_files::local().read(Path::new(path));
    }

    Ok(spec.to_string())
}

// ============================================================================
// Merge / Remove (internal)
// ============================================================================

/// Merge a JSON patch into any serializable config type.
/// Returns the top-level keys that were touched.
pub(crate) fn merge_config<T: Serialize + DeserializeOwned>(
    existing: &mut T,
    patch: Value,
) -> Result<Vec<String>> {
    let updated_fields: Vec<String> = match &patch {
        Value::Object(obj) => obj.keys().cloned().collect(),
        _ => {
            return Err(Error::validation_invalid_argument(
                "merge",
                "Merge patch must be a JSON object",
                None,
                None,
            ))
        }
    };

    if updated_fields.is_empty() {
        return Err(Error::validation_invalid_argument(
            "merge",
            "Merge patch cannot be empty",
            None,
            None,
        ));
    }

    let mut base = serde_json::to_value(&*existing)
        .map_err(|e| Error::internal_json(e.to_string(), Some("serialize config".to_string())))?;

    deep_merge(&mut base, patch);

    *existing = serde_json::from_value(base)
        .map_err(|e| Error::validation_invalid_json(e, Some("merge config".to_string())))?;

    Ok(updated_fields)
}

/// Remove items from arrays in any serializable config type.
/// Returns the dotted paths of arrays that actually shrank.
pub(crate) fn remove_config<T: Serialize + DeserializeOwned>(
    existing: &mut T,
    spec: Value,
) -> Result<Vec<String>> {
    if !matches!(&spec, Value::Object(obj) if !obj.is_empty()) {
        return Err(Error::validation_invalid_argument(
            "remove",
            "Remove spec must be a non-empty JSON object",
            None,
            None,
        ));
    }

    let mut base = serde_json::to_value(&*existing)
        .map_err(|e| Error::internal_json(e.to_string(), Some("serialize config".to_string())))?;

    let mut removed_from = Vec::new();
    deep_remove(&mut base, spec, &mut removed_from, String::new());

    *existing = serde_json::from_value(base)
        .map_err(|e| Error::validation_invalid_json(e, Some("remove config".to_string())))?;

    Ok(removed_from)
}

fn deep_remove(base: &mut Value, spec: Value, removed_from: &mut Vec<String>, path: String) {
    match (base, spec) {
        (Value::Object(base_obj), Value::Object(spec_obj)) => {
            for (key, value) in spec_obj {
                let field_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", path, key)
                };
                if let Some(base_value) = base_obj.get_mut(&key) {
                    deep_remove(base_value, value, removed_from, field_path);
                }
            }
        }
        (Value::Array(base_arr), Value::Array(spec_arr)) => {
            let original_len = base_arr.len();
            base_arr.retain(|item| !spec_arr.contains(item));
            if base_arr.len() < original_len {
                removed_from.push(path);
            }
        }
        _ => {}
    }
}

fn deep_merge(base: &mut Value, patch: Value) {
    match (base, patch) {
        (Value::Object(base_obj), Value::Object(patch_obj)) => {
            for (key, value) in patch_obj {
                if value.is_null() {
                    base_obj.remove(&key);
                } else {
                    deep_merge(base_obj.entry(key).or_insert(Value::Null), value);
                }
            }
        }
        (Value::Array(base_arr), Value::Array(patch_arr)) => {
            for item in patch_arr {
                if !base_arr.contains(&item) {
                    base_arr.push(item);
                }
            }
        }
        (base, patch) => *base = patch,
    }
}

// ============================================================================
// Config Entity Trait
// ============================================================================

pub(crate) trait ConfigEntity: Serialize + DeserializeOwned {
    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
    fn config_path(id: &str) -> Result<PathBuf>;
    fn config_dir() -> Result<PathBuf>;
    fn not_found_error(id: String, suggestions: Vec<String>) -> Error;
    fn entity_type() -> &'static str;

    /// Entity-specific validation. Called before every save.
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

pub(crate) fn load<T: ConfigEntity>(id: &str) -> Result<T> {
    let path = T::config_path(id)?;
    if !path.exists() {
        let suggestions = find_similar_ids::<T>(id);
        return Err(T::not_found_error(id.to_string(), suggestions));
    }
    let content = local_files::local().read(&path)?;
    let mut entity: T = serde_json::from_str(&content)
        .map_err(|e| Error::config_invalid_json(path.display().to_string(), e))?;
    entity.set_id(id.to_string());
    Ok(entity)
}

pub(crate) fn list<T: ConfigEntity>() -> Result<Vec<T>> {
    let dir = T::config_dir()?;
    let fs = local_files::local();

    let mut items: Vec<T> = fs
        .list_json(&dir)?
        .into_iter()
        .filter_map(|path| {
            let id = local_files::entity_id(&path)?;
            let content = fs.read(&path).ok()?;
            let mut entity: T = from_str(&content).ok()?;
            entity.set_id(id);
            Some(entity)
        })
        .collect();
    items.sort_by(|a, b| a.id().cmp(b.id()));
    Ok(items)
}

pub(crate) fn save<T: ConfigEntity>(entity: &T) -> Result<()> {
    validation::require_entity_id(entity.id())?;
    entity.validate()?;

    let path = T::config_path(entity.id())?;
    let content = to_string_pretty(entity)?;
    local_files::local().write(&path, &content)?;
    Ok(())
}

/// Create a single entity from a JSON spec. The `id` field is required in the
/// body unless `fallback_id` is provided.
pub(crate) fn create<T: ConfigEntity>(json_spec: &str, fallback_id: Option<String>) -> Result<T> {
    let raw = read_json_spec_to_string(json_spec)?;
    let value: Value = from_str(&raw)?;

    let id = value
        .get("id")
        .and_then(|v| v.as_str())
        .map(String::from)
        .or(fallback_id)
        .ok_or_else(|| {
            Error::validation_invalid_argument("id", "Missing required field: id", None, None)
        })?;

    let mut entity: T = serde_json::from_value(value)
        .map_err(|e| Error::validation_invalid_argument("json", e.to_string(), None, None))?;
    entity.set_id(id);

    if exists::<T>(entity.id()) {
        return Err(Error::validation_invalid_argument(
            format!("{}.id", T::entity_type()),
            format!("{} '{}' already exists", T::entity_type(), entity.id()),
            Some(entity.id().to_string()),
            None,
        ));
    }

    save(&entity)?;
    Ok(entity)
}

pub(crate) fn delete<T: ConfigEntity>(id: &str) -> Result<()> {
    let path = T::config_path(id)?;
    if !path.exists() {
        let suggestions = find_similar_ids::<T>(id);
        return Err(T::not_found_error(id.to_string(), suggestions));
    }
    local_files::local().delete(&path)?;
    Ok(())
}

pub(crate) fn exists<T: ConfigEntity>(id: &str) -> bool {
    T::config_path(id).map(|p| p.exists()).unwrap_or(false)
}

pub(crate) fn list_ids<T: ConfigEntity>() -> Result<Vec<String>> {
    let dir = T::config_dir()?;
    Ok(local_files::local()
        .list_json(&dir)?
        .iter()
        .filter_map(|path| local_files::entity_id(path))
        .collect())
}

pub(crate) fn merge<T: ConfigEntity>(id: &str, json_spec: &str) -> Result<MergeResult> {
    let raw = read_json_spec_to_string(json_spec)?;
    let mut patch: Value = from_str(&raw)?;

    if let Some(obj) = patch.as_object_mut() {
        obj.remove("id");
    }

    let mut entity = load::<T>(id)?;
    let updated_fields = merge_config(&mut entity, patch)?;
    entity.set_id(id.to_string());
    save(&entity)?;

    Ok(MergeResult {
        id: id.to_string(),
        updated_fields,
    })
}

pub(crate) fn remove_from_json<T: ConfigEntity>(id: &str, json_spec: &str) -> Result<RemoveResult> {
    let raw = read_json_spec_to_string(json_spec)?;
    let spec: Value = from_str(&raw)?;

    let mut entity = load::<T>(id)?;
    let removed_from = remove_config(&mut entity, spec)?;
    entity.set_id(id.to_string());
    save(&entity)?;

    Ok(RemoveResult {
        id: id.to_string(),
        removed_from,
    })
}

// ============================================================================
// Fuzzy Matching
// ============================================================================

/// Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let a_len = a_chars.len();
    let b_len = b_chars.len();

    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    let mut prev_row: Vec<usize> = (0..=b_len).collect();
    let mut curr_row: Vec<usize> = vec![0; b_len + 1];

    for (i, a_char) in a_chars.iter().enumerate() {
        curr_row[0] = i + 1;
        for (j, b_char) in b_chars.iter().enumerate() {
            let cost = if a_char == b_char { 0 } else { 1 };
            curr_row[j + 1] = (prev_row[j + 1] + 1)
                .min(curr_row[j] + 1)
                .min(prev_row[j] + cost);
        }
        std::mem::swap(&mut prev_row, &mut curr_row);
    }

    prev_row[b_len]
}

/// Rank candidates similar to `target`: prefix matches, then suffix matches,
/// then anything within edit distance 3. Returns at most 3.
pub(crate) fn suggest_similar<I>(target: &str, candidates: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let target_lower = target.to_lowercase();
    let mut matches: Vec<(String, usize)> = Vec::new();

    for id in candidates {
        let id_lower = id.to_lowercase();

        if id_lower.starts_with(&target_lower) && id_lower != target_lower {
            matches.push((id, 0));
            continue;
        }

        if id_lower.ends_with(&target_lower) {
            matches.push((id, 1));
            continue;
        }

        let dist = levenshtein(&target_lower, &id_lower);
        if dist <= 3 && dist > 0 {
            matches.push((id, dist + 10));
        }
    }

    matches.sort_by_key(|(_, priority)| *priority);
    matches.into_iter().take(3).map(|(id, _)| id).collect()
}

pub(crate) fn find_similar_ids<T: ConfigEntity>(target: &str) -> Vec<String> {
    match list_ids::<T>() {
        Ok(ids) => suggest_similar(target, ids),
        Err(_) => vec![],
    }
}
