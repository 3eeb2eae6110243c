//! Content digest, stable under front-matter re-serialization.
//!
//! Two notes whose headers differ only in key order, quoting style, or the
//! volatile fields (`last-updated`, `cast-version`, `cast-codebases`) hash to
//! the same value, as do bodies that differ only in line endings or trailing
//! whitespace.

use std::path::Path;

use serde_yaml::{Mapping, Value};
use sha2::{Digest, Sha256};

use crate::errors::CastError;
use crate::yamlio::{self, ParsedNote};

/// Header fields excluded from the digest input.
const VOLATILE_FIELDS: [&str; 3] = ["last-updated", "cast-version", "cast-codebases"];

/// Digest of a note file.
///
/// # Errors
/// Propagates I/O errors; a malformed header digests as body-only.
pub fn digest_file(path: &Path) -> Result<String, CastError> {
    let note = yamlio::read_note(path)?;
    Ok(digest_note(&note))
}

/// Digest of note text.
#[must_use]
pub fn digest_text(content: &str) -> String {
    match yamlio::parse_cast_text(content) {
        Some(note) => digest_note(&note),
        None => hash_hex(&normalize_body(content)),
    }
}

/// Digest of a parsed note.
#[must_use]
pub fn digest_note(note: &ParsedNote) -> String {
    let body = normalize_body(&note.body);
    match &note.header {
        Some(header) => {
            let canonical = canonicalize_header(header);
            // serde_yaml always emits block style for mappings
            let yaml_text = serde_yaml::to_string(&Value::Mapping(canonical))
                .unwrap_or_default();
            hash_hex(&format!("---\n{yaml_text}---\n{body}"))
        }
        None => hash_hex(&body),
    }
}

/// Canonical digest ordering: cast fields in declaration order, then any
/// other `cast-*` keys lexicographically, then user keys lexicographically.
/// Volatile fields are dropped.
#[must_use]
pub fn canonicalize_header(header: &Mapping) -> Mapping {
    let mut cast_extra: Vec<(&str, &Value)> = Vec::new();
    let mut user: Vec<(&str, &Value)> = Vec::new();
    for (k, v) in header {
        let Some(name) = yamlio::key_str(k) else { continue };
        if VOLATILE_FIELDS.contains(&name) {
            continue;
        }
        if name.starts_with("cast-") {
            if !yamlio::CAST_FIELDS_ORDER.contains(&name) {
                cast_extra.push((name, v));
            }
        } else {
            user.push((name, v));
        }
    }
    cast_extra.sort_by(|a, b| a.0.cmp(b.0));
    user.sort_by(|a, b| a.0.cmp(b.0));

    let mut result = Mapping::new();
    for field in yamlio::CAST_FIELDS_ORDER {
        if VOLATILE_FIELDS.contains(&field) {
            continue;
        }
        if let Some(v) = header.get(Value::from(field)) {
            result.insert(Value::from(field), v.clone());
        }
    }
    for (name, v) in cast_extra {
        result.insert(Value::from(name), v.clone());
    }
    for (name, v) in user {
        result.insert(Value::from(name), v.clone());
    }
    result
}

/// Normalize a body: LF line endings, no trailing whitespace per line,
/// exactly one terminating newline.
#[must_use]
pub fn normalize_body(body: &str) -> String {
    let unified = body.replace("\r\n", "\n");
    let mut out: String =
        unified.split('\n').map(str::trim_end).collect::<Vec<_>>().join("\n");
    while out.ends_with('\n') {
        out.pop();
    }
    out.push('\n');
    out
}

fn hash_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}
