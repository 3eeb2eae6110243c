//! Conflict handling: sidecar files plus a resolution prompt.
//!
//! Rendering is a separate collaborator behind [`ConflictUi`] so the prompt
//! can never affect the decision logic; non-interactive runs resolve with a
//! deterministic policy instead.

use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use serde_yaml::Value;

use crate::digest;
use crate::errors::CastError;
use crate::fsutil;
use crate::yamlio;

/// Conflict resolution choices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictResolution {
    KeepLocal,
    KeepPeer,
    Skip,
}

/// What a UI gets to show: both sides split into a canonically-ordered
/// header and a body.
#[derive(Debug, Clone)]
pub struct ConflictPreview {
    pub title: String,
    pub peer_name: String,
    pub local_header: String,
    pub local_body: String,
    pub peer_header: String,
    pub peer_body: String,
}

/// Collaborator that picks a resolution for one conflict.
pub trait ConflictUi {
    fn choose(&mut self, preview: &ConflictPreview) -> ConflictResolution;
}

/// Deterministic policy for non-interactive runs: keep local.
#[derive(Debug, Default)]
pub struct AutoKeepLocal;

impl ConflictUi for AutoKeepLocal {
    fn choose(&mut self, preview: &ConflictPreview) -> ConflictResolution {
        log::warn!("conflict in {}: keeping LOCAL version", preview.title);
        ConflictResolution::KeepLocal
    }
}

/// Interactive terminal prompt with a side-by-side line diff.
#[derive(Debug, Default)]
pub struct TerminalUi;

impl ConflictUi for TerminalUi {
    fn choose(&mut self, preview: &ConflictPreview) -> ConflictResolution {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        let _ = render_preview(&mut out, preview);
        let _ = writeln!(out, "\nOptions:\n  1. Keep LOCAL\n  2. Keep PEER\n  3. Skip (resolve later)");
        let stdin = std::io::stdin();
        loop {
            let _ = write!(out, "\nYour choice [1/2/3]: ");
            let _ = out.flush();
            let mut line = String::new();
            if stdin.lock().read_line(&mut line).is_err() {
                return ConflictResolution::Skip;
            }
            match line.trim() {
                "1" => return ConflictResolution::KeepLocal,
                "2" => return ConflictResolution::KeepPeer,
                "3" => return ConflictResolution::Skip,
                _ => {
                    let _ = writeln!(out, "Invalid choice. Please enter 1, 2, or 3.");
                }
            }
        }
    }
}

/// Write conflict sidecars and obtain a resolution.
///
/// `local_content` / `peer_content` override reading from disk; deletion
/// previews pass an explicit empty string for the missing side.
///
/// # Errors
/// Returns an error if the sidecars cannot be written.
#[allow(clippy::too_many_arguments)]
pub fn handle_conflict(
    local_path: &Path,
    peer_path: Option<&Path>,
    cast_id: &str,
    peer_name: &str,
    cast_root: &Path,
    local_content: Option<&str>,
    peer_content: Option<&str>,
    ui: &mut dyn ConflictUi,
) -> Result<ConflictResolution, CastError> {
    let conflicts_dir = fsutil::conflicts_dir(cast_root);
    fs::create_dir_all(&conflicts_dir)?;

    let title = local_path.file_stem().map_or_else(String::new, |s| s.to_string_lossy().into_owned());
    let ext = local_path
        .extension()
        .map_or_else(|| ".md".to_string(), |e| format!(".{}", e.to_string_lossy()));

    let local_sidecar = conflicts_dir.join(format!("{title}~{cast_id}~LOCAL{ext}"));
    let peer_sidecar = conflicts_dir.join(format!("{title}~{cast_id}~PEER-{peer_name}{ext}"));

    let local_text = side_text(local_content, Some(local_path));
    let peer_text = side_text(peer_content, peer_path);

    write_sidecar(&local_sidecar, local_content, Some(local_path))?;
    write_sidecar(&peer_sidecar, peer_content, peer_path)?;

    let (local_header, local_body) = split_for_preview(&local_text);
    let (peer_header, peer_body) = split_for_preview(&peer_text);
    let preview = ConflictPreview {
        title,
        peer_name: peer_name.to_string(),
        local_header,
        local_body,
        peer_header,
        peer_body,
    };
    Ok(ui.choose(&preview))
}

fn side_text(content: Option<&str>, path: Option<&Path>) -> String {
    if let Some(content) = content {
        return content.to_string();
    }
    path.filter(|p| p.exists())
        .and_then(|p| fs::read_to_string(p).ok())
        .unwrap_or_default()
}

/// Sidecars copy the explicit content when given, even an empty string, else
/// the on-disk file when it exists.
fn write_sidecar(
    sidecar: &PathBuf,
    content: Option<&str>,
    source: Option<&Path>,
) -> Result<(), CastError> {
    if let Some(content) = content {
        fsutil::atomic_write(sidecar, content)?;
    } else if let Some(source) = source.filter(|p| p.exists()) {
        fs::copy(source, sidecar)?;
    }
    Ok(())
}

/// Split preview text into (header shown in canonical order, body).
fn split_for_preview(text: &str) -> (String, String) {
    match yamlio::parse_cast_text(text) {
        Some(note) => {
            let header = note.header.map_or_else(String::new, |h| {
                serde_yaml::to_string(&Value::Mapping(digest::canonicalize_header(&h)))
                    .unwrap_or_default()
            });
            (header, note.body)
        }
        None => (String::new(), text.to_string()),
    }
}

/// Render both sides as two aligned columns, header and body separately.
fn render_preview(out: &mut impl Write, preview: &ConflictPreview) -> std::io::Result<()> {
    writeln!(out, "==== Conflict detected: {} (peer {}) ====", preview.title, preview.peer_name)?;
    writeln!(out, "-- front matter --")?;
    render_side_by_side(out, &preview.local_header, &preview.peer_header, &preview.peer_name)?;
    writeln!(out, "-- body --")?;
    render_side_by_side(out, &preview.local_body, &preview.peer_body, &preview.peer_name)
}

const COL: usize = 48;

fn render_side_by_side(
    out: &mut impl Write,
    left: &str,
    right: &str,
    peer_name: &str,
) -> std::io::Result<()> {
    let a: Vec<&str> = left.lines().collect();
    let b: Vec<&str> = right.lines().collect();
    let col = COL;
    writeln!(out, "{:<col$} | PEER[{}]", "LOCAL", peer_name)?;
    for op in diff_opcodes(&a, &b) {
        let span = (op.a_end - op.a_start).max(op.b_end - op.b_start);
        for k in 0..span {
            let l = a.get(op.a_start + k).filter(|_| op.a_start + k < op.a_end).unwrap_or(&"");
            let r = b.get(op.b_start + k).filter(|_| op.b_start + k < op.b_end).unwrap_or(&"");
            let marker = match op.tag {
                DiffTag::Equal => ' ',
                DiffTag::Replace => '~',
                DiffTag::Delete => '<',
                DiffTag::Insert => '>',
            };
            writeln!(out, "{marker}{l:<col$}| {r}")?;
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DiffTag {
    Equal,
    Replace,
    Delete,
    Insert,
}

#[derive(Debug, Clone, Copy)]
struct Opcode {
    tag: DiffTag,
    a_start: usize,
    a_end: usize,
    b_start: usize,
    b_end: usize,
}

/// Line-diff opcodes from an LCS walk, equivalent in shape to difflib's
/// `get_opcodes`.
fn diff_opcodes(a: &[&str], b: &[&str]) -> Vec<Opcode> {
    let n = a.len();
    let m = b.len();
    let mut lcs = vec![vec![0usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i][j] = if a[i] == b[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut ops = Vec::new();
    let (mut i, mut j) = (0usize, 0usize);
    while i < n || j < m {
        if i < n && j < m && a[i] == b[j] {
            let (ai, bj) = (i, j);
            while i < n && j < m && a[i] == b[j] {
                i += 1;
                j += 1;
            }
            ops.push(Opcode { tag: DiffTag::Equal, a_start: ai, a_end: i, b_start: bj, b_end: j });
        } else {
            let (ai, bj) = (i, j);
            while i < n || j < m {
                if i < n && j < m && a[i] == b[j] {
                    break;
                }
                if i < n && (j >= m || lcs[i + 1][j] >= lcs[i][j + 1]) {
                    i += 1;
                } else if j < m {
                    j += 1;
                }
            }
            let tag = if ai < i && bj < j {
                DiffTag::Replace
            } else if ai < i {
                DiffTag::Delete
            } else {
                DiffTag::Insert
            };
            ops.push(Opcode { tag, a_start: ai, a_end: i, b_start: bj, b_end: j });
        }
    }
    ops
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diff_opcodes_cover_both_sequences() {
        let a = vec!["one", "two", "three"];
        let b = vec!["one", "2", "three", "four"];
        let ops = diff_opcodes(&a, &b);
        assert_eq!(ops.first().map(|o| o.tag), Some(DiffTag::Equal));
        let last = ops.last().unwrap();
        assert_eq!(last.a_end, a.len());
        assert_eq!(last.b_end, b.len());
    }
}
