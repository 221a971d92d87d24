//! Input validation primitives.
//!
//! Covers the generic emptiness checks plus the path and identifier
//! rules every remote command argument must pass before it is rendered.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result};

/// Require a string to be non-empty after trimming.
///
/// Returns a reference to the trimmed string on success.
pub fn require_non_empty<'a>(value: &'a str, field: &str, message: &str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(Error::validation_invalid_argument(field, message, None, None))
    } else {
        Ok(trimmed)
    }
}

/// Require a collection to be non-empty.
pub fn require_non_empty_vec<'a, T>(vec: &'a [T], field: &str, message: &str) -> Result<&'a [T]> {
    if vec.is_empty() {
        Err(Error::validation_invalid_argument(field, message, None, None))
    } else {
        Ok(vec)
    }
}

fn invalid(field: &str, value: &str, problem: impl Into<String>) -> Error {
    Error::validation_invalid_argument(field, problem, Some(value.to_string()), None)
}

fn check_path_chars(value: &str, field: &str) -> Result<()> {
    if value.is_empty() {
        return Err(invalid(field, value, "Path cannot be empty"));
    }
    if value.chars().any(|c| c == '\0' || c == '\n' || c == '\r') {
        return Err(invalid(field, value, "Path contains control characters"));
    }
    if value.split('/').any(|segment| segment == "..") {
        return Err(invalid(field, value, "Path must not contain '..' segments"));
    }
    Ok(())
}

/// Require an absolute remote path with no traversal or control characters.
pub fn require_absolute_path<'a>(value: &'a str, field: &str) -> Result<&'a str> {
    check_path_chars(value, field)?;
    if !value.starts_with('/') {
        return Err(invalid(field, value, "Path must be absolute"));
    }
    Ok(value)
}

/// Require a path relative to some root (shared assets, shared children).
pub fn require_relative_path<'a>(value: &'a str, field: &str) -> Result<&'a str> {
    check_path_chars(value, field)?;
    if value.starts_with('/') {
        return Err(invalid(field, value, "Path must be relative"));
    }
    if value.split('/').all(|segment| segment.is_empty() || segment == ".") {
        return Err(invalid(field, value, "Path must name a file or directory"));
    }
    Ok(value)
}

/// Hostname-like names: domains and stored entity IDs.
fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9._-]*$").expect("name pattern is valid")
    })
}

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_.-]*$").expect("identifier pattern is valid")
    })
}

/// Require a site domain (`default`, `example.com`, `sub.example.com`).
/// Domains double as Drupal `sites/<domain>` directory names.
pub fn require_domain<'a>(value: &'a str, field: &str) -> Result<&'a str> {
    if !name_pattern().is_match(value) || value.contains("..") {
        return Err(invalid(field, value, "Domain must be a hostname-like identifier"));
    }
    Ok(value)
}

/// Require a 7-40 character hex commit id. Returns it lowercased.
pub fn require_revision(value: &str, field: &str) -> Result<String> {
    let valid = (7..=40).contains(&value.len()) && value.chars().all(|c| c.is_ascii_hexdigit());
    if !valid {
        return Err(invalid(field, value, "Revision must be a 7-40 character hex commit id"));
    }
    Ok(value.to_ascii_lowercase())
}

/// Require a site or server ID. IDs name files under the config dir.
pub fn require_entity_id(value: &str) -> Result<&str> {
    if !name_pattern().is_match(value) || value.contains("..") {
        return Err(invalid(
            "id",
            value,
            "ID may only contain letters, digits, '.', '_' and '-'",
        ));
    }
    Ok(value)
}

/// Require a plain identifier (user, group, variable name, command name).
pub fn require_identifier<'a>(value: &'a str, field: &str) -> Result<&'a str> {
    if !identifier_pattern().is_match(value) {
        return Err(invalid(field, value, "Must be a plain identifier"));
    }
    Ok(value)
}
