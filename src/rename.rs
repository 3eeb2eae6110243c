//! Rename-aware link rewriting for wiki-style vaults.
//!
//! Updates intra-vault links when files are renamed or moved. Two link
//! styles are understood: wiki links (`[[Note]]`, `[[Note#Section|Alias]]`)
//! and markdown links (`[text](path/to/Note.md)`, resolved relative to the
//! current file). Only the markdown body is touched; front-matter bytes are
//! preserved verbatim. The module is independent of sync logic so bulk
//! moves and manual refactors can reuse it.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::CastError;
use crate::fsutil::{self, to_posix};
use crate::yamlio;

static WIKI_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[\[([^\[\]]+?)\]\]").unwrap());
// Leading `!?` captures image links so they can be left untouched; the regex
// crate has no lookbehind.
static MDLINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(!?)\[([^\]]*?)\]\(([^)]+?)\)").unwrap());
static SCHEME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]*://").unwrap());

/// One file rename within a vault. Paths are vault-relative, POSIX style.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RenameSpec {
    pub old_rel: String,
    pub new_rel: String,
    old_noext: String,
    new_noext: String,
    old_stem: String,
    new_stem: String,
}

impl RenameSpec {
    #[must_use]
    pub fn new(old_rel: &str, new_rel: &str) -> Self {
        let old_rel = to_posix(old_rel.trim());
        let new_rel = to_posix(new_rel.trim());
        let old_noext = remove_md(&old_rel).to_string();
        let new_noext = remove_md(&new_rel).to_string();
        let old_stem = stem_of(&old_noext);
        let new_stem = stem_of(&new_noext);
        Self { old_rel, new_rel, old_noext, new_noext, old_stem, new_stem }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub relpath: String,
    pub replacements: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkRewriteReport {
    pub files_changed: usize,
    pub total_replacements: usize,
    pub changes: Vec<FileChange>,
}

/// Options for a rewrite pass.
#[derive(Debug, Clone, Default)]
pub struct RewriteOptions {
    /// `None` picks the platform default: case-sensitive everywhere but
    /// Windows.
    pub case_sensitive: Option<bool>,
    /// Absolute paths of files that must not be rewritten.
    pub exclude_files: Vec<PathBuf>,
    /// Auto-correct specs passed in reverse. Defaults to on.
    pub keep_reversed: bool,
}

/// Rewrite links across the vault for a set of renames.
///
/// # Errors
/// Propagates I/O errors from rewriting a file; unreadable files are skipped.
pub fn update_links_for_renames(
    vault_path: &Path,
    renames: &[RenameSpec],
    opts: &RewriteOptions,
) -> Result<LinkRewriteReport, CastError> {
    let case_sensitive = opts.case_sensitive.unwrap_or(!cfg!(windows));
    let flip_reversed = !opts.keep_reversed;
    let exclude: BTreeSet<PathBuf> =
        opts.exclude_files.iter().map(|p| fsutil::canonicalize_lossy(p)).collect();

    let specs = prepare_specs(vault_path, renames, flip_reversed);
    let mut report = LinkRewriteReport::default();
    if specs.is_empty() {
        return Ok(report);
    }

    for entry in walkdir::WalkDir::new(vault_path).follow_links(false) {
        let Ok(entry) = entry else { continue };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("md") {
            continue;
        }
        if exclude.contains(&fsutil::canonicalize_lossy(path)) {
            continue;
        }
        let Ok(content) = std::fs::read_to_string(path) else { continue };

        let (raw_header, body) = yamlio::split_front_matter(&content);
        let header_len = raw_header.map_or(0, |_| content.len() - body.len());
        let cur_rel = to_posix(&path.strip_prefix(vault_path).unwrap_or(path).to_string_lossy());
        let cur_dir = dir_of(&cur_rel);

        let mut new_body = body.to_string();
        let mut replacements = 0;
        for spec in &specs {
            let (b, c1) = rewrite_wiki(&new_body, spec, case_sensitive);
            let (b, c2) = rewrite_mdlinks(&b, spec, &cur_dir, case_sensitive);
            new_body = b;
            replacements += c1 + c2;
        }

        if replacements > 0 {
            // Front matter is reattached byte-for-byte.
            let new_content = format!("{}{}", &content[..header_len], new_body);
            fsutil::atomic_write(path, &new_content)?;
            report.files_changed += 1;
            report.total_replacements += replacements;
            report.changes.push(FileChange { relpath: cur_rel, replacements });
        }
    }
    Ok(report)
}

/// Defensive canonicalization of rename specs to avoid accidental
/// "un-rename": flip specs passed in reverse, drop no-ops and duplicates,
/// collapse chains, resolve inverse pairs by preferring the direction whose
/// destination exists, then order longest-first.
fn prepare_specs(vault_path: &Path, renames: &[RenameSpec], flip_reversed: bool) -> Vec<RenameSpec> {
    let mut prelim: Vec<RenameSpec> = Vec::new();
    let mut seen: BTreeSet<(String, String)> = BTreeSet::new();
    for spec in renames {
        let mut s = spec.clone();
        if s.old_rel == s.new_rel {
            continue;
        }
        if flip_reversed {
            let old_exists = exists_any(vault_path, &s.old_rel);
            let new_exists = exists_any(vault_path, &s.new_rel);
            // A spec whose source still exists while its target does not was
            // almost certainly passed as (new, old) after the move.
            if old_exists && !new_exists {
                s = RenameSpec::new(&spec.new_rel, &spec.old_rel);
            }
        }
        let key = (s.old_rel.clone(), s.new_rel.clone());
        if seen.insert(key) {
            prelim.push(s);
        }
    }
    if prelim.is_empty() {
        return prelim;
    }

    // Collapse chains A->B, B->C into A->C.
    let mapping: BTreeMap<String, String> =
        prelim.iter().map(|s| (s.old_rel.clone(), s.new_rel.clone())).collect();
    let follow = |start: &str| -> String {
        let mut visited: BTreeSet<String> = BTreeSet::new();
        let mut cur = start.to_string();
        while let Some(next) = mapping.get(&cur) {
            if !visited.insert(cur.clone()) {
                break;
            }
            cur = next.clone();
        }
        cur
    };
    let collapsed: BTreeMap<String, String> =
        prelim.iter().map(|s| (s.old_rel.clone(), follow(&s.new_rel))).collect();

    let mut result: Vec<RenameSpec> = Vec::new();
    for (old, new) in &collapsed {
        let has_inverse = collapsed.get(new).is_some_and(|n2| n2 == old);
        if has_inverse {
            let keep_new_exists = exists_any(vault_path, new);
            let inv_new_exists = exists_any(vault_path, old);
            if inv_new_exists && !keep_new_exists {
                result.push(RenameSpec::new(new, old));
            } else {
                result.push(RenameSpec::new(old, new));
            }
        } else {
            result.push(RenameSpec::new(old, new));
        }
    }

    result.sort_by(|a, b| {
        (b.old_rel.len(), b.old_stem.len()).cmp(&(a.old_rel.len(), a.old_stem.len()))
    });
    result.dedup();
    result
}

/// Rewrite wiki links targeting the renamed file.
///
/// Path-bearing targets rewrite on full-path match; bare-name targets only
/// when the filename itself changed. Anchors and aliases survive.
fn rewrite_wiki(body: &str, spec: &RenameSpec, case_sensitive: bool) -> (String, usize) {
    let mut out = String::with_capacity(body.len());
    let mut last = 0;
    let mut count = 0;

    for m in WIKI_RE.captures_iter(body) {
        let whole = m.get(0).unwrap();
        let inner = m.get(1).unwrap().as_str();

        let (target_part, alias) = match inner.split_once('|') {
            Some((t, a)) => (t, Some(a)),
            None => (inner, None),
        };
        let (path_part, anchor) = match target_part.split_once('#') {
            Some((p, a)) => (p, format!("#{a}")),
            None => (target_part, String::new()),
        };

        let target_noext = remove_md(&to_posix(path_part.trim())).to_string();

        let new_target = if target_noext.contains('/') {
            (str_eq(&target_noext, &spec.old_noext, case_sensitive))
                .then(|| spec.new_noext.clone())
        } else {
            (str_eq(&target_noext, &spec.old_stem, case_sensitive)
                && !str_eq(&spec.old_stem, &spec.new_stem, case_sensitive))
            .then(|| spec.new_stem.clone())
        };

        if let Some(new_target) = new_target {
            let mut inner_new = format!("{new_target}{anchor}");
            if let Some(alias) = alias {
                inner_new = format!("{inner_new}|{alias}");
            }
            out.push_str(&body[last..whole.start()]);
            out.push_str(&format!("[[{inner_new}]]"));
            last = whole.end();
            count += 1;
        }
    }
    out.push_str(&body[last..]);
    (out, count)
}

/// Rewrite markdown links pointing at the renamed file.
///
/// URLs resolve relative to the current file's directory; the replacement
/// preserves `.md` presence, anchors, queries, angle brackets,
/// percent-encoding style, and trailing titles. Images, absolute URLs, mail
/// links and page-local anchors are skipped.
fn rewrite_mdlinks(
    body: &str,
    spec: &RenameSpec,
    cur_rel_dir: &str,
    case_sensitive: bool,
) -> (String, usize) {
    let mut out = String::with_capacity(body.len());
    let mut last = 0;
    let mut count = 0;

    for m in MDLINK_RE.captures_iter(body) {
        let whole = m.get(0).unwrap();
        if !m.get(1).unwrap().as_str().is_empty() {
            continue; // image link
        }
        let text = m.get(2).unwrap().as_str();
        let url = m.get(3).unwrap().as_str();
        if should_skip_url(url) {
            continue;
        }

        let mut u = url.trim().to_string();

        let had_angle = u.starts_with('<') && u.ends_with('>');
        if had_angle {
            u = u[1..u.len() - 1].to_string();
        }

        // Peel an optional trailing title: [text](url "title").
        let mut title = None;
        let pos_quote = u.rfind('"').into_iter().chain(u.rfind('\'')).max();
        if let Some(pos_quote) = pos_quote {
            if let Some(pos_space) = u[..pos_quote].rfind(' ') {
                title = Some(u[pos_space + 1..].trim().to_string());
                u = u[..pos_space].trim_end().to_string();
            }
        }

        // Split query, then anchor.
        let (path_part, query) = match u.split_once('?') {
            Some((p, q)) => (p.to_string(), format!("?{q}")),
            None => (u.clone(), String::new()),
        };
        let (path_inner, anchor) = match path_part.split_once('#') {
            Some((p, a)) => (p.to_string(), format!("#{a}")),
            None => (path_part, String::new()),
        };

        // Decode for matching; the original encoding style is kept on output.
        let decoded_inner = percent_decode(&path_inner);
        let norm_path = to_posix(&decoded_inner);
        let resolved = normpath_join(cur_rel_dir, &norm_path);
        let resolved_noext = remove_md(&resolved).to_string();

        let orig_has_ext = decoded_inner.to_lowercase().ends_with(".md");
        let is_match = str_eq(&resolved_noext, &spec.old_noext, case_sensitive)
            || (orig_has_ext && str_eq(&resolved, &spec.old_rel, case_sensitive));
        if !is_match {
            continue;
        }

        let mut repl_path = relpath_from(&spec.new_rel, cur_rel_dir);
        if !orig_has_ext && repl_path.to_lowercase().ends_with(".md") {
            repl_path.truncate(repl_path.len() - 3);
        }
        if path_inner.contains('%') {
            repl_path = percent_encode(&repl_path);
        }

        let mut new_url = format!("{repl_path}{anchor}{query}");
        if had_angle {
            new_url = format!("<{new_url}>");
        }
        if let Some(title) = title {
            new_url = format!("{new_url} {title}");
        }
        out.push_str(&body[last..whole.start()]);
        out.push_str(&format!("[{text}]({new_url})"));
        last = whole.end();
        count += 1;
    }
    out.push_str(&body[last..]);
    (out, count)
}

fn should_skip_url(url: &str) -> bool {
    let u = url.trim();
    u.starts_with('#') || u.starts_with("mailto:") || SCHEME_RE.is_match(u)
}

fn str_eq(a: &str, b: &str, case_sensitive: bool) -> bool {
    if case_sensitive { a == b } else { a.to_lowercase() == b.to_lowercase() }
}

/// Drop a trailing `.md` (case-insensitively).
fn remove_md(path: &str) -> &str {
    if path.to_lowercase().ends_with(".md") { &path[..path.len() - 3] } else { path }
}

fn stem_of(noext: &str) -> String {
    noext.rsplit('/').next().unwrap_or(noext).to_string()
}

fn dir_of(rel: &str) -> String {
    match rel.rsplit_once('/') {
        Some((dir, _)) => dir.to_string(),
        None => String::new(),
    }
}

/// Existence check tolerating specs with or without `.md`.
fn exists_any(vault_path: &Path, rel: &str) -> bool {
    if vault_path.join(rel).exists() {
        return true;
    }
    !rel.to_lowercase().ends_with(".md") && vault_path.join(format!("{rel}.md")).exists()
}

/// Join `base` and `rel` and normalize `.`/`..` components, without touching
/// the file system.
fn normpath_join(base: &str, rel: &str) -> String {
    let joined = if base.is_empty() { rel.to_string() } else { format!("{base}/{rel}") };
    let mut parts: Vec<&str> = Vec::new();
    for seg in joined.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|p| *p != "..") {
                    parts.pop();
                } else {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }
    if parts.is_empty() { ".".to_string() } else { parts.join("/") }
}

/// Relative path from directory `start` to `target` (both vault-relative).
fn relpath_from(target: &str, start: &str) -> String {
    let target_parts: Vec<&str> =
        target.split('/').filter(|s| !s.is_empty() && *s != ".").collect();
    let start_parts: Vec<&str> =
        start.split('/').filter(|s| !s.is_empty() && *s != ".").collect();
    let common = target_parts
        .iter()
        .zip(start_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let mut parts: Vec<String> = Vec::new();
    for _ in common..start_parts.len() {
        parts.push("..".to_string());
    }
    for seg in &target_parts[common..] {
        parts.push((*seg).to_string());
    }
    if parts.is_empty() { ".".to_string() } else { parts.join("/") }
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if let (Some(h), Some(l)) = (
                bytes.get(i + 1).and_then(|b| (*b as char).to_digit(16)),
                bytes.get(i + 2).and_then(|b| (*b as char).to_digit(16)),
            ) {
                out.push((h * 16 + l) as u8);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Percent-encode with `/@:+-._~` kept literal, matching the decoding side's
/// tolerance.
fn percent_encode(s: &str) -> String {
    const SAFE: &[u8] = b"/@:+-._~";
    let mut out = String::with_capacity(s.len());
    for &b in s.as_bytes() {
        if b.is_ascii_alphanumeric() || SAFE.contains(&b) {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normpath_join_collapses_dots() {
        assert_eq!(normpath_join("Refs", "../Notes/Old.md"), "Notes/Old.md");
        assert_eq!(normpath_join("", "./a/b"), "a/b");
    }

    #[test]
    fn relpath_walks_up() {
        assert_eq!(relpath_from("Docs/New.md", "Refs"), "../Docs/New.md");
        assert_eq!(relpath_from("Docs/New.md", ""), "Docs/New.md");
        assert_eq!(relpath_from("a/b.md", "a"), "b.md");
    }

    #[test]
    fn percent_roundtrip() {
        assert_eq!(percent_decode("Old%20Name.md"), "Old Name.md");
        assert_eq!(percent_encode("Docs/New Name.md"), "Docs/New%20Name.md");
    }
}
