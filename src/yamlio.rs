//! Front-matter codec: parse and emit a note's YAML header and body.
//!
//! Headers are kept as [`serde_yaml::Mapping`], which preserves key order on
//! round-trip. Writes are atomic (temp-then-rename in the same directory).

use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_yaml::{Mapping, Value};

use crate::errors::CastError;
use crate::fsutil;
use crate::types::PeerMode;

/// Canonical order of cast fields after `last-updated`.
pub const CAST_FIELDS_ORDER: [&str; 4] =
    ["cast-id", "cast-vaults", "cast-codebases", "cast-version"];

static FM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\A---[ \t]*\r?\n(.*?)\r?\n---[ \t]*\r?\n?").unwrap());

static VAULT_ENTRY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([^()]+?)\s*\((live|watch)\)\s*$").unwrap());

/// A parsed note: optional header, body, and whether any `cast-*` field is
/// present.
#[derive(Debug, Clone)]
pub struct ParsedNote {
    pub header: Option<Mapping>,
    pub body: String,
    pub has_cast_fields: bool,
}

/// Split raw text into (raw header text, body). Returns `None` for the header
/// when the file has no front-matter fence.
#[must_use]
pub fn split_front_matter(content: &str) -> (Option<&str>, &str) {
    match FM_RE.captures(content) {
        Some(caps) => {
            let whole = caps.get(0).unwrap();
            let header = caps.get(1).unwrap().as_str();
            (Some(header), &content[whole.end()..])
        }
        None => (None, content),
    }
}

/// Parse a note file into header mapping and body.
///
/// # Errors
/// `MalformedHeader` when a front-matter fence is present but its contents do
/// not parse as a YAML mapping. I/O errors are propagated as `Io`.
pub fn parse_cast_file(path: &Path) -> Result<ParsedNote, CastError> {
    let content = fs::read_to_string(path)?;
    parse_cast_text(&content).ok_or_else(|| CastError::MalformedHeader(path.to_path_buf()))
}

/// Parse note text. `None` means a fence was present but held no mapping.
#[must_use]
pub fn parse_cast_text(content: &str) -> Option<ParsedNote> {
    let (raw_header, body) = split_front_matter(content);
    let Some(raw_header) = raw_header else {
        return Some(ParsedNote { header: None, body: content.to_string(), has_cast_fields: false });
    };
    let value: Value = serde_yaml::from_str(raw_header).ok()?;
    let Value::Mapping(header) = value else {
        return None;
    };
    let has_cast_fields = header.keys().any(|k| key_str(k).is_some_and(|s| s.starts_with("cast-")));
    Some(ParsedNote { header: Some(header), body: body.to_string(), has_cast_fields })
}

/// Like [`parse_cast_file`] but treats a malformed header as body-only, per
/// the engine's routing policy.
///
/// # Errors
/// Propagates I/O errors only.
pub fn read_note(path: &Path) -> Result<ParsedNote, CastError> {
    let content = fs::read_to_string(path)?;
    Ok(parse_cast_text(&content).unwrap_or_else(|| {
        log::warn!("malformed front matter in {}, treating as body-only", path.display());
        ParsedNote { header: None, body: content.clone(), has_cast_fields: false }
    }))
}

/// Write a note file with the given header and body, atomically. With
/// `reorder` the header keys are rewritten to the canonical order first.
///
/// # Errors
/// Returns an error if serialization or the atomic replace fails.
pub fn write_cast_file(
    path: &Path,
    header: &Mapping,
    body: &str,
    reorder: bool,
) -> Result<(), CastError> {
    let header = if reorder { reorder_cast_fields(header) } else { header.clone() };
    let yaml_text = serde_yaml::to_string(&Value::Mapping(header))?;
    let content = format!("---\n{yaml_text}---\n{body}");
    fsutil::atomic_write(path, &content)?;
    Ok(())
}

/// Reorder header keys: `last-updated` first, then the cast fields in
/// canonical order, then everything else in its original order.
#[must_use]
pub fn reorder_cast_fields(header: &Mapping) -> Mapping {
    let mut result = Mapping::new();
    if let Some(v) = header.get(Value::from("last-updated")) {
        result.insert(Value::from("last-updated"), v.clone());
    }
    for field in CAST_FIELDS_ORDER {
        if let Some(v) = header.get(Value::from(field)) {
            result.insert(Value::from(field), v.clone());
        }
    }
    for (k, v) in header {
        if key_str(k) == Some("last-updated") {
            continue;
        }
        if !result.contains_key(k) {
            result.insert(k.clone(), v.clone());
        }
    }
    result
}

/// Ensure a header carries `cast-id` and `cast-version`. Returns whether the
/// header was modified in a way that must be written back. `last-updated` is
/// seeded with an empty string but does not count as a modification.
pub fn ensure_cast_fields(header: &mut Mapping, generate_id: bool) -> bool {
    let mut modified = false;

    if !header.contains_key(Value::from("last-updated")) {
        header.insert(Value::from("last-updated"), Value::from(""));
    }
    if generate_id && !header.contains_key(Value::from("cast-id")) {
        header.insert(Value::from("cast-id"), Value::from(uuid::Uuid::new_v4().to_string()));
        modified = true;
    }
    if !header.contains_key(Value::from("cast-version")) {
        header.insert(Value::from("cast-version"), Value::from(1));
        modified = true;
    }
    // cast-vaults is never rewritten here; invalid entries are ignored at
    // routing time.
    modified
}

/// Parse `cast-vaults` entries into a name-to-mode map. A bare `Name` means
/// live; unparsable entries are skipped.
#[must_use]
pub fn parse_vault_entries(entries: Option<&Value>) -> std::collections::BTreeMap<String, PeerMode> {
    let mut result = std::collections::BTreeMap::new();
    let Some(Value::Sequence(seq)) = entries else {
        return result;
    };
    for entry in seq {
        let Value::String(s) = entry else { continue };
        if let Some(caps) = VAULT_ENTRY_RE.captures(s) {
            let mode =
                if &caps[2] == "live" { PeerMode::Live } else { PeerMode::Watch };
            result.insert(caps[1].to_string(), mode);
        } else {
            let name = s.trim();
            if !name.is_empty() && !name.contains('(') {
                result.insert(name.to_string(), PeerMode::Live);
            }
        }
    }
    result
}

/// String form of a mapping key, if it is a string.
#[must_use]
pub fn key_str(key: &Value) -> Option<&str> {
    match key {
        Value::String(s) => Some(s.as_str()),
        _ => None,
    }
}

/// Fetch a string field from a header.
#[must_use]
pub fn get_str<'a>(header: &'a Mapping, key: &str) -> Option<&'a str> {
    match header.get(Value::from(key)) {
        Some(Value::String(s)) => Some(s.as_str()),
        _ => None,
    }
}

/// Fetch a sequence of strings from a header, skipping non-string items.
#[must_use]
pub fn get_string_seq(header: &Mapping, key: &str) -> Vec<String> {
    match header.get(Value::from(key)) {
        Some(Value::Sequence(seq)) => seq
            .iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s.clone()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}
