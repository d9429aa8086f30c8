use std::io::Write;

use ocr_corpus_clean::config::builtin_names;
use ocr_corpus_clean::{
    builtin_profile, parse_profile, resolve_profile, ChapterRecord, ChapterStore, ProfileError, RecordError, Script,
};

#[test]
fn every_builtin_profile_compiles() {
    for name in builtin_names() {
        let p = builtin_profile(name).unwrap_or_else(|e| panic!("{}: {}", name, e));
        assert_eq!(p.spec.name, name);
    }
    assert_eq!(builtin_profile("classical-chinese").unwrap().script(), Script::Han);
}

#[test]
fn unknown_builtin_and_missing_file_are_errors() {
    assert!(matches!(builtin_profile("sumerian"), Err(ProfileError::Invalid(_))));
    assert!(matches!(resolve_profile("/nonexistent/profile.yaml"), Err(ProfileError::Read(_))));
}

#[test]
fn profile_loads_from_path() {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    writeln!(f, "name: custom\nscript: latin\nterminal_punctuation: \".!?\"").unwrap();
    let p = resolve_profile(f.path().to_str().unwrap()).unwrap();
    assert_eq!(p.spec.name, "custom");
    assert!(p.is_terminal('!'));
    assert!(p.ends_terminal("finito!»"));
}

#[test]
fn invalid_profiles_are_rejected() {
    let cases = [
        ("name: ''\nscript: greek", "missing name"),
        ("name: x\nscript: greek\nforeign_scripts: [greek]", "foreign"),
        ("name: x\nscript: greek\nthresholds:\n  script_ratio_floor: 1.5", "script_ratio_floor"),
        ("name: x\nscript: greek\nthresholds:\n  continuation_ratio: 0.9\n  exit_ratio: 0.5", "exceeds"),
        ("name: x\nscript: greek\ngrading:\n  bands:\n    - { grade: A, below: 0.1 }\n    - { grade: B, below: 0.05 }", "ascend"),
        ("name: x\nscript: greek\nthresholds:\n  max_iterations: 0", "max_iterations"),
    ];
    for (raw, needle) in cases {
        match parse_profile(raw) {
            Err(ProfileError::Invalid(msg)) => assert!(msg.contains(needle), "{} not in {}", needle, msg),
            other => panic!("expected Invalid for {:?}, got {:?}", raw, other.map(|p| p.spec.name)),
        }
    }
}

#[test]
fn bad_patterns_name_the_offending_rule() {
    let raw = "name: x\nscript: greek\nrules:\n  - name: broken\n    category: sigla\n    pattern: '(unclosed'";
    match parse_profile(raw) {
        Err(ProfileError::Pattern { name, .. }) => assert_eq!(name, "broken"),
        other => panic!("expected Pattern error, got {:?}", other.map(|p| p.spec.name)),
    }
    assert!(matches!(parse_profile("name: [unterminated"), Err(ProfileError::Parse(_))));
    assert!(matches!(parse_profile("name: x\nscript: klingon"), Err(ProfileError::Parse(_))));
}

#[test]
fn record_round_trips_and_keeps_unknown_fields() {
    let raw = r#"{
        "chapterNumber": 3,
        "title": "Περὶ τῆς ἀρχῆς",
        "slug": "peri-tes-arches",
        "sourceContent": { "paragraphs": [ { "index": 0, "text": "Τούτου δὲ γενομένου." } ] }
    }"#;
    let rec = ChapterRecord::from_json(raw, "chapter-003.json").unwrap();
    assert_eq!(rec.chapter_number, 3);
    assert_eq!(rec.extra.get("slug").and_then(|v| v.as_str()), Some("peri-tes-arches"));
    let back: serde_json::Value = serde_json::to_value(&rec).unwrap();
    assert_eq!(back["slug"], "peri-tes-arches");
    assert_eq!(back["sourceContent"]["paragraphs"][0]["index"], 0);
}

#[test]
fn malformed_records_fail_fast() {
    let gap = r#"{"chapterNumber": 1, "title": "t", "sourceContent": {"paragraphs": [
        {"index": 0, "text": "α"}, {"index": 2, "text": "β"}]}}"#;
    assert!(matches!(ChapterRecord::from_json(gap, "gap.json"), Err(RecordError::Invalid { .. })));

    let empty = r#"{"chapterNumber": 1, "title": "t", "sourceContent": {"paragraphs": []}}"#;
    assert!(matches!(ChapterRecord::from_json(empty, "empty.json"), Err(RecordError::Invalid { .. })));

    let blank = r#"{"chapterNumber": 1, "title": "t", "sourceContent": {"paragraphs": [{"index": 0, "text": "  "}]}}"#;
    assert!(matches!(ChapterRecord::from_json(blank, "blank.json"), Err(RecordError::Invalid { .. })));

    let missing = r#"{"chapterNumber": 1, "title": "t"}"#;
    assert!(matches!(ChapterRecord::from_json(missing, "missing.json"), Err(RecordError::Parse { .. })));
}

#[test]
fn store_writes_backups_before_overwrite() {
    let td = tempfile::tempdir().unwrap();
    let store = ChapterStore::new(td.path());
    let first = ChapterRecord::new(7, "Α".into(), vec!["Τούτου δὲ γενομένου.".into()]);
    let (path, backup) = store.write(&first).unwrap();
    assert_eq!(path, td.path().join("chapter-007.json"));
    assert!(backup.is_none());

    let second = ChapterRecord::new(7, "Α".into(), vec!["Μετὰ δὲ ταῦτα.".into()]);
    let (_, backup) = store.write(&second).unwrap();
    let backup = backup.unwrap();
    assert!(backup.starts_with(store.backup_dir()));
    assert_eq!(ChapterRecord::read(&backup).unwrap(), first);
    assert_eq!(store.load(7).unwrap().unwrap(), second);

    // backups are not enumerated as chapters
    let names: Vec<String> =
        store.enumerate().unwrap().iter().map(|p| p.file_name().unwrap().to_string_lossy().into_owned()).collect();
    assert_eq!(names, vec!["chapter-007.json".to_string()]);
    assert!(store.load(8).unwrap().is_none());
}

#[test]
fn store_refuses_to_write_invalid_records() {
    let td = tempfile::tempdir().unwrap();
    let store = ChapterStore::new(td.path());
    let rec = ChapterRecord::new(1, "t".into(), vec![]);
    assert!(store.write(&rec).is_err());
    assert!(!store.chapter_path(1).exists());
}
