use cast_sync::digest::{digest_file, digest_text, normalize_body};

#[test]
fn test_digest_is_lowercase_hex() {
    let d = digest_text("---\ncast-id: x\n---\nBody\n");
    assert_eq!(d.len(), 64);
    assert!(d.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
}

#[test]
fn test_digest_stable_under_header_reordering() {
    let a = "---\ncast-id: x\ntitle: T\nauthor: me\n---\nBody\n";
    let b = "---\nauthor: me\ntitle: T\ncast-id: x\n---\nBody\n";
    assert_eq!(digest_text(a), digest_text(b));
}

#[test]
fn test_digest_strips_volatile_fields() {
    let a = "---\ncast-id: x\nlast-updated: 2025-01-01 09:00\ncast-version: 1\ncast-codebases:\n  - repo\n---\nBody\n";
    let b = "---\ncast-id: x\n---\nBody\n";
    assert_eq!(digest_text(a), digest_text(b));
}

#[test]
fn test_digest_stable_under_quoting_style() {
    let a = "---\ncast-id: \"x\"\ntitle: \"T\"\n---\nBody\n";
    let b = "---\ncast-id: x\ntitle: T\n---\nBody\n";
    assert_eq!(digest_text(a), digest_text(b));
}

#[test]
fn test_digest_normalizes_line_endings_and_trailing_ws() {
    let a = "---\ncast-id: x\n---\nline one  \r\nline two\r\n\r\n\r\n";
    let b = "---\ncast-id: x\n---\nline one\nline two\n";
    assert_eq!(digest_text(a), digest_text(b));
}

#[test]
fn test_digest_differs_on_content_change() {
    let a = "---\ncast-id: x\n---\nBody\n";
    let b = "---\ncast-id: x\n---\nOther\n";
    assert_ne!(digest_text(a), digest_text(b));
    // And the id itself participates.
    let c = "---\ncast-id: y\n---\nBody\n";
    assert_ne!(digest_text(a), digest_text(c));
}

#[test]
fn test_body_only_note_digests() {
    let a = digest_text("plain text, no header\n");
    let b = digest_text("plain text, no header   \r\n");
    assert_eq!(a, b);
}

#[test]
fn test_digest_file_matches_text() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("n.md");
    let text = "---\ncast-id: x\n---\nBody\n";
    std::fs::write(&path, text).unwrap();
    assert_eq!(digest_file(&path).unwrap(), digest_text(text));
}

#[test]
fn test_normalize_body_exactly_one_newline() {
    assert_eq!(normalize_body("a"), "a\n");
    assert_eq!(normalize_body("a\n\n\n"), "a\n");
    assert_eq!(normalize_body(""), "\n");
}
