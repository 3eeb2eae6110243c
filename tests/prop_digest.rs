use proptest::prelude::*;

use cast_sync::digest::digest_text;
use cast_sync::yamlio::{parse_cast_text, write_cast_file};

proptest! {
    // Re-serializing a note through the codec never changes its digest.
    #[test]
    fn prop_digest_stable_under_codec_round_trip(
        title in "[a-zA-Z][a-zA-Z0-9 ]{0,20}",
        body in "[a-zA-Z0-9 \n]{0,200}",
    ) {
        let text = format!("---\ncast-id: fixed-id\ntitle: {title}\ncast-version: 1\n---\n{body}");
        let note = parse_cast_text(&text).unwrap();
        let header = note.header.clone().unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.md");
        write_cast_file(&path, &header, &note.body, true).unwrap();
        let rewritten = std::fs::read_to_string(&path).unwrap();

        prop_assert_eq!(digest_text(&text), digest_text(&rewritten));
    }

    // Line-ending and trailing-whitespace noise never changes the digest.
    #[test]
    fn prop_digest_ignores_body_whitespace_noise(
        lines in proptest::collection::vec("[a-z0-9 ]{0,30}", 0..10),
        trailing in proptest::collection::vec("[ \t]{0,4}", 10),
    ) {
        let clean = lines.join("\n");
        let noisy = lines
            .iter()
            .zip(trailing.iter())
            .map(|(l, t)| format!("{l}{t}"))
            .collect::<Vec<_>>()
            .join("\r\n");
        let a = format!("---\ncast-id: x\n---\n{clean}");
        let b = format!("---\ncast-id: x\n---\n{noisy}");
        prop_assert_eq!(digest_text(&a), digest_text(&b));
    }

    // Header key order never affects the digest.
    #[test]
    fn prop_digest_ignores_header_order(swap in any::<bool>()) {
        let (first, second) = if swap { ("alpha: 1", "beta: 2") } else { ("beta: 2", "alpha: 1") };
        let a = format!("---\ncast-id: x\n{first}\n{second}\n---\nBody\n");
        let b = "---\ncast-id: x\nalpha: 1\nbeta: 2\n---\nBody\n".to_string();
        prop_assert_eq!(digest_text(&a), digest_text(&b));
    }
}
