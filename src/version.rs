//! Version resolution from project metadata.
//!
//! The metadata format is picked from the file extension:
//! - `.toml` - `project.<key>`, `package.<key>`, `tool.poetry.<key>`, then top-level `<key>`
//! - `.json` - top-level string field
//! - anything else (e.g. `__about__.py`) - first `KEY = "value"` assignment line

use regex::Regex;
use std::fs;
use std::path::Path;

use crate::error::VersionError;
use crate::models::Version;

/// Read the version stored under `key` in the metadata file at `path`.
pub fn resolve_version(path: &Path, key: &str) -> Result<Version, VersionError> {
    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            VersionError::FileNotFound(path.to_path_buf())
        } else {
            VersionError::Io(e)
        }
    })?;

    let raw = match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => lookup_toml(&content, key)?,
        Some("json") => lookup_json(&content, key)?,
        _ => lookup_assignment(&content, key),
    };

    let raw = raw.ok_or_else(|| VersionError::KeyMissing {
        key: key.to_string(),
        path: path.to_path_buf(),
    })?;

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(VersionError::Empty(key.to_string()));
    }

    Ok(Version::new(trimmed))
}

/// Python-style dunder keys map onto the plain `version` field of manifests.
fn manifest_key(key: &str) -> &str {
    let stripped = key.trim_matches('_');
    if stripped.is_empty() {
        key
    } else {
        stripped
    }
}

fn lookup_toml(content: &str, key: &str) -> Result<Option<String>, VersionError> {
    let doc: toml::Table = content.parse()?;
    let field = manifest_key(key);

    let tables = [
        doc.get("project").and_then(|v| v.as_table()),
        doc.get("package").and_then(|v| v.as_table()),
        doc.get("tool")
            .and_then(|v| v.get("poetry"))
            .and_then(|v| v.as_table()),
        Some(&doc),
    ];

    let found = tables
        .into_iter()
        .flatten()
        .find_map(|table| table.get(field).and_then(|v| v.as_str()))
        .map(str::to_string);
    Ok(found)
}

fn lookup_json(content: &str, key: &str) -> Result<Option<String>, VersionError> {
    let doc: serde_json::Value = serde_json::from_str(content)?;
    let found = [key, manifest_key(key)]
        .into_iter()
        .find_map(|k| doc.get(k).and_then(|v| v.as_str()))
        .map(str::to_string);
    Ok(found)
}

fn lookup_assignment(content: &str, key: &str) -> Option<String> {
    let pattern = format!(
        r#"(?m)^\s*{}\s*(?::\s*[A-Za-z_][\w\.]*\s*)?=\s*(?:"([^"]*)"|'([^']*)')"#,
        regex::escape(key)
    );
    let re = Regex::new(&pattern).ok()?;
    let caps = re.captures(content)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().to_string())
}
