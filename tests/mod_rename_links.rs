mod common;

use cast_sync::rename::{RenameSpec, RewriteOptions, update_links_for_renames};
use common::{Sandbox, mk_note, opts_cascade, read_file, write_file};

fn rewrite(vault: &std::path::Path, specs: &[RenameSpec]) -> cast_sync::rename::LinkRewriteReport {
    update_links_for_renames(vault, specs, &RewriteOptions::default()).unwrap()
}

#[test]
fn test_wiki_links_rewrite_paths_and_bare_names() {
    let sb = Sandbox::new();
    let a = sb.create_vault("A");
    write_file(&a.note_path("Notes/Old.md"), "content\n");
    write_file(
        &a.note_path("Refs/r.md"),
        "see [[Notes/Old]] and [[Old]] and [[Notes/Old#Sec|alias]]\n",
    );
    // Move the file, then rewrite.
    std::fs::create_dir_all(a.vault.join("Docs")).unwrap();
    std::fs::rename(a.note_path("Notes/Old.md"), a.note_path("Docs/New.md")).unwrap();

    let report = rewrite(&a.vault, &[RenameSpec::new("Notes/Old.md", "Docs/New.md")]);
    assert_eq!(report.files_changed, 1);

    let text = read_file(&a.note_path("Refs/r.md"));
    assert_eq!(text, "see [[Docs/New]] and [[New]] and [[Docs/New#Sec|alias]]\n");
}

#[test]
fn test_bare_wiki_link_untouched_when_only_directory_changed() {
    let sb = Sandbox::new();
    let a = sb.create_vault("A");
    write_file(&a.note_path("Docs/Same.md"), "content\n");
    write_file(&a.note_path("r.md"), "[[Same]] and [[Notes/Same]]\n");

    let report = rewrite(&a.vault, &[RenameSpec::new("Notes/Same.md", "Docs/Same.md")]);
    assert_eq!(report.total_replacements, 1, "bare name keeps working, only the path form moves");
    assert_eq!(read_file(&a.note_path("r.md")), "[[Same]] and [[Docs/Same]]\n");
}

#[test]
fn test_markdown_links_preserve_style() {
    let sb = Sandbox::new();
    let a = sb.create_vault("A");
    write_file(&a.note_path("Docs/New Name.md"), "content\n");
    write_file(
        &a.note_path("Refs/md.md"),
        "[x](../Notes/Old%20Name.md#h1 \"t\") and [y](../Notes/Old%20Name?x=y) and [z](<../Notes/Old Name.md>)\n",
    );

    let report = rewrite(&a.vault, &[RenameSpec::new("Notes/Old Name.md", "Docs/New Name.md")]);
    assert_eq!(report.files_changed, 1);
    let text = read_file(&a.note_path("Refs/md.md"));
    assert!(text.contains("[x](../Docs/New%20Name.md#h1 \"t\")"), "got: {text}");
    assert!(text.contains("[y](../Docs/New%20Name?x=y)"), "got: {text}");
    assert!(text.contains("[z](<../Docs/New Name.md>)"), "got: {text}");
}

#[test]
fn test_absolute_mail_anchor_and_image_links_skipped() {
    let sb = Sandbox::new();
    let a = sb.create_vault("A");
    write_file(&a.note_path("New.md"), "content\n");
    let body = "[a](https://example.com/Old.md) [m](mailto:old@x) [p](#Old) ![img](Old.md)\n";
    write_file(&a.note_path("r.md"), body);

    let report = rewrite(&a.vault, &[RenameSpec::new("Old.md", "New.md")]);
    assert_eq!(report.total_replacements, 0);
    assert_eq!(read_file(&a.note_path("r.md")), body);
}

#[test]
fn test_front_matter_bytes_preserved() {
    let sb = Sandbox::new();
    let a = sb.create_vault("A");
    write_file(&a.note_path("New.md"), "content\n");
    let text = "---\ntitle: \"[[Old]] stays\"\nweird:   spacing\n---\nbody [[Old]]\n";
    write_file(&a.note_path("r.md"), text);

    rewrite(&a.vault, &[RenameSpec::new("Old.md", "New.md")]);
    let out = read_file(&a.note_path("r.md"));
    assert!(out.starts_with("---\ntitle: \"[[Old]] stays\"\nweird:   spacing\n---\n"));
    assert!(out.ends_with("body [[New]]\n"));
}

#[test]
fn test_rewrite_is_idempotent() {
    let sb = Sandbox::new();
    let a = sb.create_vault("A");
    write_file(&a.note_path("Docs/New.md"), "content\n");
    write_file(&a.note_path("r.md"), "[[Notes/Old]]\n");

    let specs = [RenameSpec::new("Notes/Old.md", "Docs/New.md")];
    let first = rewrite(&a.vault, &specs);
    assert_eq!(first.total_replacements, 1);
    let second = rewrite(&a.vault, &specs);
    assert_eq!(second.total_replacements, 0);
}

#[test]
fn test_reversed_spec_is_flipped() {
    let sb = Sandbox::new();
    let a = sb.create_vault("A");
    write_file(&a.note_path("Docs/New.md"), "content\n");
    write_file(&a.note_path("r.md"), "[[Notes/Old]]\n");

    // Caller passed (new, old) after the move; destination of the flipped
    // spec exists, so the rewriter corrects it.
    let report = rewrite(&a.vault, &[RenameSpec::new("Docs/New.md", "Notes/Old.md")]);
    assert_eq!(report.total_replacements, 1);
    assert_eq!(read_file(&a.note_path("r.md")), "[[Docs/New]]\n");
}

#[test]
fn test_chained_specs_collapse() {
    let sb = Sandbox::new();
    let a = sb.create_vault("A");
    write_file(&a.note_path("C.md"), "content\n");
    write_file(&a.note_path("r.md"), "[[A]]\n");

    let specs = [RenameSpec::new("A.md", "B.md"), RenameSpec::new("B.md", "C.md")];
    rewrite(&a.vault, &specs);
    assert_eq!(read_file(&a.note_path("r.md")), "[[C]]\n");
}

#[test]
fn test_hsync_rename_moves_peer_file_and_rewrites_links() {
    let sb = Sandbox::new();
    let a = sb.create_vault("A");
    let b = sb.create_vault("B");

    // Same note (same id, same content) at the new path on A and the old
    // path on B: first-contact rename.
    let note = mk_note("id-r", "Doc", "Hello from A\n", &["A", "B"]);
    write_file(&a.note_path("Docs/New Name.md"), &note);
    write_file(&b.note_path("Notes/Old Name.md"), &note);

    write_file(
        &b.note_path("Refs/wiki.md"),
        "link: [[Notes/Old Name]] / [[Notes/Old Name|alias]]\n",
    );
    write_file(
        &b.note_path("Refs/md.md"),
        "[x](../Notes/Old%20Name.md#h1 \"t\") and [y](../Notes/Old%20Name?x=y)\n",
    );

    let rc = sb.hsync(&a, &opts_cascade());
    assert!(rc <= 1, "no conflicts expected, got {rc}");

    assert!(!b.note_path("Notes/Old Name.md").exists());
    assert!(b.note_path("Docs/New Name.md").exists());

    let w = read_file(&b.note_path("Refs/wiki.md"));
    assert!(!w.contains("[[Notes/Old Name]]"));
    assert!(!w.contains("[[Notes/Old Name|alias]]"));
    assert!(w.contains("[[Docs/New Name]]"));

    let m = read_file(&b.note_path("Refs/md.md"));
    assert!(!m.contains("Notes/Old%20Name"));
    assert!(m.contains("../Docs/New%20Name.md#h1"));
}
