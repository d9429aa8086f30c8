use ocr_corpus_clean::{builtin_profile, classify, classify_lines, FootnoteState, LineTag, Profile};

fn greek() -> Profile {
    builtin_profile("byzantine-greek").unwrap()
}

fn lines(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|s| s.to_string()).collect()
}

#[test]
fn standalone_numbers_and_headers_are_removed() {
    let p = greek();
    assert_eq!(classify("924", &p), (true, LineTag::PageNumber));
    assert_eq!(classify("  - 17 -  ", &p), (true, LineTag::PageNumber));
    assert_eq!(classify("THEODORUS METOCHITA 125", &p), (true, LineTag::PageHeader));
    assert_eq!(classify("", &p), (false, LineTag::Blank));
}

#[test]
fn greek_prose_is_content() {
    let p = greek();
    let (remove, tag) = classify("Τούτου δὲ γενομένου πολλοὶ τῶν ἀρχόντων ἀπῆλθον.", &p);
    assert!(!remove);
    assert_eq!(tag, LineTag::Content);
    // short target-script lines are not noise
    assert_eq!(classify("καὶ", &p), (false, LineTag::Content));
}

#[test]
fn footnote_and_foreign_lines() {
    let p = greek();
    assert_eq!(classify("1) Cdd. Mon. et Aug. legunt", &p), (true, LineTag::Footnote));
    assert_eq!(classify("et sic etiam Fabricius in editione sua", &p), (true, LineTag::Footnote));
    assert_eq!(classify("ألف باء تاء", &p), (true, LineTag::ForeignScript));
    assert_eq!(classify("|| // ~~", &p), (true, LineTag::OcrNoise));
}

#[test]
fn footnote_block_swallows_low_ratio_lines_until_prose_returns() {
    let p = greek();
    let input = lines(&[
        "Τούτου δὲ γενομένου πολλοὶ τῶν ἀρχόντων ἀπῆλθον.",
        "1) Cdd. Mon. et Aug. legunt",
        "τῶν Wolfianorum",
        "Ὁ δὲ βασιλεὺς ἐκέλευσε τοὺς στρατιώτας ἐπανελθεῖν εἰς τὴν πόλιν.",
        "τῶν Wolfianorum",
    ]);
    let out = classify_lines(&input, &p);
    let tags: Vec<LineTag> = out.lines.iter().map(|l| l.tag).collect();
    assert_eq!(
        tags,
        vec![
            LineTag::Content,
            LineTag::Footnote,
            LineTag::FootnoteContinuation,
            LineTag::Content,
            LineTag::Content,
        ]
    );
    assert_eq!(out.lines[2].reason.as_deref(), Some("in_footnote_block"));
    assert_eq!(out.removed.get(&LineTag::FootnoteContinuation), Some(&1));
    assert_eq!(out.kept().len(), 3);
}

#[test]
fn state_machine_transitions() {
    let p = greek();
    let (state, _) = FootnoteState::Normal.step("1) x", LineTag::Footnote, &p);
    assert_eq!(state, FootnoteState::InFootnoteBlock);
    let (state, tag) = state.step("Wolfius", LineTag::Content, &p);
    assert_eq!((state, tag), (FootnoteState::InFootnoteBlock, LineTag::FootnoteContinuation));
    let prose = "Ὁ δὲ βασιλεὺς ἐκέλευσε τοὺς στρατιώτας ἐπανελθεῖν.";
    let (state, tag) = state.step(prose, LineTag::Content, &p);
    assert_eq!((state, tag), (FootnoteState::Normal, LineTag::Content));
}

#[test]
fn index_marker_truncates_rest_of_chapter() {
    let p = greek();
    let input = lines(&["Τούτου δὲ γενομένου πολλοὶ ἀπῆλθον.", "INDEX VOCABULORUM", "ἀγαθός 12", "βασιλεύς 14"]);
    let out = classify_lines(&input, &p);
    assert!(out.lines[1..].iter().all(|l| l.tag == LineTag::Index));
    assert_eq!(out.removed.get(&LineTag::Index), Some(&3));
    assert_eq!(out.kept(), vec!["Τούτου δὲ γενομένου πολλοὶ ἀπῆλθον.".to_string()]);
}
