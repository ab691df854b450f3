use std::fs;

use super::*;

#[test]
fn replay_presets_falls_back_when_path_is_unusable() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    fs::write(&blocker, "not a directory").unwrap();
    let path = blocker.join("shapes.json");

    let store = replay_presets(&path);
    assert!(store.list().unwrap().is_empty());
    assert!(!path.exists());
}

#[test]
fn replay_presets_reads_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shapes.json");
    let mut file_store = FilePresetStore::open(&path).unwrap();
    file_store.create(NewPreset { name: "Box".into(), ..NewPreset::default() }).unwrap();

    let store = replay_presets(&path);
    let names: Vec<String> = store.list().unwrap().into_iter().map(|p| p.name).collect();
    assert_eq!(names, vec!["Box".to_owned()]);
}
