use ocr_corpus_clean::{builtin_profile, clean_title, parse_profile, strip, Profile};

fn greek() -> Profile {
    builtin_profile("byzantine-greek").unwrap()
}

#[test]
fn sigla_block_and_inline_marker_are_removed() {
    let p = greek();
    let out = strip("ἀδαρνάρσην O, ἀδανάρσην AEDwwp2Di Τούτου", &p);
    assert_eq!(out.text, "ἀδαρνάρσην ἀδανάρσην Τούτου");
    assert_eq!(out.findings.len(), 2);
    assert!(out.findings.iter().all(|f| f.category == "sigla"));
    assert_eq!(out.triggers.get("standalone_siglum"), Some(&1));
    assert_eq!(out.triggers.get("wp_sigla"), Some(&1));
    let wp = out.findings.iter().find(|f| f.rule == "wp_sigla").unwrap();
    assert_eq!(wp.matched, "AEDwwp2Di");
    assert!(wp.context.contains("ἀδανάρσην"));
}

#[test]
fn leading_page_number_before_capital_is_stripped() {
    let p = greek();
    let out = strip("924 Τούτου δὲ γενομένου", &p);
    assert_eq!(out.text, "Τούτου δὲ γενομένου");
    assert_eq!(out.triggers.get("leading_page_number"), Some(&1));
}

#[test]
fn interior_page_reference_is_stripped() {
    let p = greek();
    assert_eq!(strip("ὁ λόγος 235 καὶ ἡ γνώμη", &p).text, "ὁ λόγος καὶ ἡ γνώμη");
}

#[test]
fn numerals_next_to_punctuation_survive() {
    let p = greek();
    let out = strip("ἐν ἔτει 1453, καὶ ἡ πόλις ἑάλω.", &p);
    assert_eq!(out.text, "ἐν ἔτει 1453, καὶ ἡ πόλις ἑάλω.");
    assert!(!out.changed());
}

#[test]
fn foreign_script_runs_become_spaces() {
    let p = greek();
    let out = strip("ὁ βασιλεὺςشسي ἦλθεν", &p);
    assert_eq!(out.text, "ὁ βασιλεὺς ἦλθεν");
    assert_eq!(out.findings[0].category, "foreign_script");
}

#[test]
fn roman_numerals_are_not_sigla() {
    let p = greek();
    let out = strip("ἐν τῷ XIV, AE, καὶ", &p);
    assert!(out.text.contains("XIV"));
    assert!(!out.text.contains("AE"));
}

#[test]
fn stripping_is_idempotent() {
    let p = greek();
    let once = strip("Ὁ δὲ 3) βασιλεὺς O, ἦλθεν wp εἰς τὴν πόλιν °) .", &p);
    let twice = strip(&once.text, &p);
    assert_eq!(twice.text, once.text);
    assert!(!twice.changed());
}

#[test]
fn titles_lose_markers_and_trailing_dots() {
    let p = greek();
    assert_eq!(clean_title("Περὶ τῆς ἀρχῆς *) .", &p).text, "Περὶ τῆς ἀρχῆς");
    assert_eq!(clean_title("Περὶ πο- λέμου.", &p).text, "Περὶ πολέμου");
}

#[test]
fn space_action_prevents_word_fusion() {
    let raw = r#"
name: fusion
script: greek
rules:
  - name: dagger
    category: ocr_garbage
    pattern: '†'
    action: space
  - name: star
    category: ocr_garbage
    pattern: '\*'
    action: delete
"#;
    let p = parse_profile(raw).unwrap();
    assert_eq!(strip("λόγος†γνώμη", &p).text, "λόγος γνώμη");
    assert_eq!(strip("λό*γος", &p).text, "λόγος");
}
