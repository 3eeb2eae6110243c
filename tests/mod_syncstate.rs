mod common;

use cast_sync::syncstate::SyncState;
use common::Sandbox;

#[test]
fn test_update_and_clear_prunes_empty_maps() {
    let mut state = SyncState::default();
    state.update("id-1", "Beta", "d1");
    state.update("id-1", "Gamma", "d2");
    assert_eq!(state.baseline("id-1", "Beta"), Some("d1"));

    state.clear("id-1", "Beta");
    assert!(state.baseline("id-1", "Beta").is_none());
    assert!(state.baselines.contains_key("id-1"), "other peer entry remains");

    state.clear("id-1", "Gamma");
    assert!(!state.baselines.contains_key("id-1"), "empty inner map is pruned");
}

#[test]
fn test_save_load_round_trip() {
    let sb = Sandbox::new();
    let a = sb.create_vault("Alpha");
    let mut state = SyncState::default();
    state.update("id-1", "Beta", "d1");
    state.save(&a.root).unwrap();

    let loaded = SyncState::load(&a.root).unwrap();
    assert_eq!(loaded.version, 1);
    assert_eq!(loaded.baseline("id-1", "Beta"), Some("d1"));
}

#[test]
fn test_missing_file_loads_empty() {
    let dir = tempfile::tempdir().unwrap();
    let state = SyncState::load(dir.path()).unwrap();
    assert!(state.baselines.is_empty());
}

#[test]
fn test_update_both_mirrors_under_our_name() {
    let sb = Sandbox::new();
    let a = sb.create_vault("Alpha");
    let b = sb.create_vault("Beta");

    let mut ours = SyncState::default();
    ours.update_both("id-1", "Beta", "d1", "Alpha", Some(&b.root)).unwrap();
    assert_eq!(ours.baseline("id-1", "Beta"), Some("d1"));

    let theirs = SyncState::load(&b.root).unwrap();
    assert_eq!(theirs.baseline("id-1", "Alpha"), Some("d1"), "peer keys the pair by our name");
    let _ = a;
}

#[test]
fn test_clear_both_removes_mirror() {
    let sb = Sandbox::new();
    let _a = sb.create_vault("Alpha");
    let b = sb.create_vault("Beta");

    let mut ours = SyncState::default();
    ours.update_both("id-1", "Beta", "d1", "Alpha", Some(&b.root)).unwrap();
    ours.clear_both("id-1", "Beta", "Alpha", Some(&b.root)).unwrap();

    assert!(ours.baseline("id-1", "Beta").is_none());
    let theirs = SyncState::load(&b.root).unwrap();
    assert!(theirs.baseline("id-1", "Alpha").is_none());
    assert!(theirs.baselines.is_empty());
}

#[test]
fn test_syncstate_file_shape() {
    let sb = Sandbox::new();
    let a = sb.create_vault("Alpha");
    let mut state = SyncState::default();
    state.update("id-1", "Beta", "abc123");
    state.save(&a.root).unwrap();

    let text = std::fs::read_to_string(a.root.join(".cast").join("syncstate.json")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(json["version"], 1);
    assert_eq!(json["baselines"]["id-1"]["Beta"]["digest"], "abc123");
    let ts = json["baselines"]["id-1"]["Beta"]["ts"].as_str().unwrap();
    assert_eq!(ts.len(), "YYYY-MM-DD HH:MM".len());
}
