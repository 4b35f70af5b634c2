// src/store/key.rs

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::PathBuf;

use crate::error::{IngestError, Result};

static SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.\-]+$").unwrap());

/// Check a hierarchical key such as `wiki/prices` and split it into segments.
pub fn validate_key(key: &str) -> Result<Vec<&str>> {
    let segments: Vec<&str> = key.split('/').collect();
    let ok = segments
        .iter()
        .all(|s| SEGMENT.is_match(s) && *s != "." && *s != "..");
    if key.is_empty() || !ok {
        return Err(IngestError::InvalidKey(key.to_string()));
    }
    Ok(segments)
}

/// Relative file path of a key inside the store root.
pub fn key_to_relative_path(key: &str) -> Result<PathBuf> {
    let segments = validate_key(key)?;
    let mut path: PathBuf = segments.iter().collect();
    let file = format!("{}.parquet", segments[segments.len() - 1]);
    path.set_file_name(file);
    Ok(path)
}
