mod common;

use cast_sync::index::{EphemeralIndex, build_ephemeral_index};
use cast_sync::types::PeerMode;
use common::{Sandbox, mk_note, write_file};

#[test]
fn test_scan_collects_ids_paths_and_peers() {
    let sb = Sandbox::new();
    let a = sb.create_vault("Alpha");
    write_file(&a.note_path("one.md"), &mk_note("id-1", "One", "X\n", &["Alpha", "Beta"]));
    write_file(
        &a.note_path("Sub/two.md"),
        &mk_note("id-2", "Two", "Y\n", &["Gamma (watch)"]),
    );
    write_file(&a.note_path("plain.md"), "no front matter\n");

    let index = build_ephemeral_index(&a.vault, false, None).unwrap();
    assert_eq!(index.get_by_id("id-1").unwrap().relpath, "one.md");
    assert_eq!(index.get_by_path("Sub/two.md").unwrap().cast_id, "id-2");
    assert!(index.get_by_path("plain.md").is_none(), "non-cast notes are not indexed");

    let peers = index.all_peers();
    assert!(peers.contains("Alpha") && peers.contains("Beta") && peers.contains("Gamma"));
    assert_eq!(
        index.get_by_id("id-2").unwrap().peers.get("Gamma"),
        Some(&PeerMode::Watch)
    );
}

#[test]
fn test_fixup_generates_missing_cast_id() {
    let sb = Sandbox::new();
    let a = sb.create_vault("Alpha");
    let path = a.note_path("new.md");
    write_file(&path, "---\ncast-vaults:\n  - \"Beta (live)\"\n---\nFresh\n");

    let index = build_ephemeral_index(&a.vault, true, None).unwrap();
    let rec = index.get_by_path("new.md").unwrap();
    assert!(!rec.cast_id.is_empty(), "id generated for a note with peer intent");

    // Written back to disk with the canonical field order.
    let note = cast_sync::yamlio::parse_cast_file(&path).unwrap();
    let header = note.header.unwrap();
    assert_eq!(cast_sync::yamlio::get_str(&header, "cast-id"), Some(rec.cast_id.as_str()));
    let keys: Vec<_> = header.keys().map(|k| k.as_str().unwrap().to_string()).collect();
    assert_eq!(keys[0], "last-updated");
    assert_eq!(keys[1], "cast-id");
}

#[test]
fn test_no_fixup_for_peer_scans() {
    let sb = Sandbox::new();
    let a = sb.create_vault("Alpha");
    let path = a.note_path("new.md");
    let original = "---\ncast-vaults:\n  - \"Beta (live)\"\n---\nFresh\n";
    write_file(&path, original);

    let _ = build_ephemeral_index(&a.vault, false, None).unwrap();
    assert_eq!(common::read_file(&path), original, "peer files are never modified");
}

#[test]
fn test_duplicate_cast_id_first_wins_by_id() {
    let sb = Sandbox::new();
    let a = sb.create_vault("Alpha");
    write_file(&a.note_path("a.md"), &mk_note("dup", "A", "X\n", &["Beta"]));
    write_file(&a.note_path("b.md"), &mk_note("dup", "B", "Y\n", &["Beta"]));

    let index = build_ephemeral_index(&a.vault, false, None).unwrap();
    assert_eq!(index.get_by_id("dup").unwrap().relpath, "a.md");
    // The later record stays reachable by path.
    assert!(index.get_by_path("b.md").is_some());
}

#[test]
fn test_limit_restricts_to_relpath_or_id() {
    let sb = Sandbox::new();
    let a = sb.create_vault("Alpha");
    write_file(&a.note_path("one.md"), &mk_note("id-1", "One", "X\n", &["Beta"]));
    write_file(&a.note_path("two.md"), &mk_note("id-2", "Two", "Y\n", &["Beta"]));

    let by_path = build_ephemeral_index(&a.vault, false, Some("one.md")).unwrap();
    assert!(by_path.get_by_id("id-1").is_some());
    assert!(by_path.get_by_id("id-2").is_none());

    let by_id = build_ephemeral_index(&a.vault, false, Some("id-2")).unwrap();
    assert!(by_id.get_by_id("id-2").is_some());
    assert!(by_id.get_by_path("one.md").is_none());
}

#[test]
fn test_scans_are_additive() {
    let sb = Sandbox::new();
    let a = sb.create_vault("Alpha");
    write_file(&a.note_path("one.md"), &mk_note("id-1", "One", "X\n", &["Beta"]));
    write_file(&a.note_path("two.md"), &mk_note("id-2", "Two", "Y\n", &["Beta"]));

    let mut index = EphemeralIndex::new();
    index.scan(&a.vault, false, Some("one.md")).unwrap();
    index.scan(&a.vault, false, Some("id-2")).unwrap();
    assert!(index.get_by_id("id-1").is_some());
    assert!(index.get_by_id("id-2").is_some());
}

#[test]
fn test_hidden_directories_are_skipped() {
    let sb = Sandbox::new();
    let a = sb.create_vault("Alpha");
    write_file(
        &a.vault.join(".trash").join("gone.md"),
        &mk_note("id-x", "Gone", "X\n", &["Beta"]),
    );
    let index = build_ephemeral_index(&a.vault, false, None).unwrap();
    assert!(index.is_empty());
}
