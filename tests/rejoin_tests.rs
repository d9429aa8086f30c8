use ocr_corpus_clean::{
    builtin_profile, rejoin_hyphenated_lines, rejoin_hyphenated_text, rejoin_unhyphenated_lines,
    rejoin_unhyphenated_text, Profile,
};

fn greek() -> Profile {
    builtin_profile("byzantine-greek").unwrap()
}

fn lines(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|s| s.to_string()).collect()
}

#[test]
fn hyphenated_line_break_is_merged() {
    let p = greek();
    let (out, joins) = rejoin_hyphenated_lines(&lines(&["Τὸν δὲ πα-", "ρασκευαστέον δεῖ πρὸς τὸν πόλεμον."]), &p);
    assert_eq!(joins, 1);
    let joined = out.join(" ");
    assert!(joined.contains("παρασκευαστέον δεῖ"));
    assert!(!joined.contains('-'));
}

#[test]
fn stray_digit_between_halves_is_dropped() {
    let p = greek();
    let (out, joins) = rejoin_hyphenated_lines(&lines(&["ὁ στρα-", "3 τηγὸς ἦλθεν"]), &p);
    assert_eq!(joins, 1);
    assert_eq!(out, lines(&["ὁ στρατηγὸς", "ἦλθεν"]));
    assert_eq!(rejoin_hyphenated_text("ὁ στρα- 3τηγὸς ἦλθεν", &p).text, "ὁ στρατηγὸς ἦλθεν");
}

#[test]
fn blank_line_blocks_hyphen_join() {
    let p = greek();
    let input = lines(&["ὁ στρα-", "", "τηγὸς ἦλθεν"]);
    let (out, joins) = rejoin_hyphenated_lines(&input, &p);
    assert_eq!(joins, 0);
    assert_eq!(out, input);
}

#[test]
fn text_level_hyphen_rejoin_reaches_fixed_point() {
    let p = greek();
    let out = rejoin_hyphenated_text("ἡ βασι- λεία καὶ ἡ πο- λιτεία", &p);
    assert_eq!(out.text, "ἡ βασιλεία καὶ ἡ πολιτεία");
    assert_eq!(out.joins, 2);
}

#[test]
fn short_fragment_at_line_end_is_prefixed_to_next_line() {
    let p = greek();
    let (out, joins) = rejoin_unhyphenated_lines(&lines(&["Οἱ δὲ στρα", "τιῶται ἀπῆλθον εἰς τὴν πόλιν"]), &p);
    assert_eq!(joins, 1);
    assert_eq!(out, lines(&["Οἱ δὲ", "στρατιῶται ἀπῆλθον εἰς τὴν πόλιν"]));
}

#[test]
fn allow_listed_words_are_never_merged() {
    let p = greek();
    let input = lines(&["Ἐπειδὴ δὲ ὁ", "βασιλεὺς ἦλθεν εἰς τὴν πόλιν"]);
    let (out, joins) = rejoin_unhyphenated_lines(&input, &p);
    assert_eq!(joins, 0);
    assert_eq!(out, input);

    let text = "Ἐπειδὴ δὲ ὁ βασιλεὺς καὶ οἱ στρατιῶται ἦλθον";
    assert_eq!(rejoin_unhyphenated_text(text, &p).text, text);
}

#[test]
fn fragment_after_clause_punctuation_is_a_new_clause() {
    let p = greek();
    let input = lines(&["Οἱ δέ, στρα", "τιῶται ἀπῆλθον"]);
    let (out, joins) = rejoin_unhyphenated_lines(&input, &p);
    assert_eq!(joins, 0);
    assert_eq!(out, input);
}

#[test]
fn capitalized_next_line_is_not_a_continuation() {
    let p = greek();
    let input = lines(&["Οἱ δὲ στρα", "Τιῶται ἀπῆλθον"]);
    assert_eq!(rejoin_unhyphenated_lines(&input, &p).1, 0);
}

#[test]
fn paragraph_level_pass_merges_short_fragments() {
    let p = greek();
    let out = rejoin_unhyphenated_text("Οἱ δὲ στρ ατιῶται ἀπῆλθον", &p);
    assert_eq!(out.text, "Οἱ δὲ στρατιῶται ἀπῆλθον");
    assert_eq!(out.joins, 1);
    // first token of a paragraph is never treated as a fragment
    let lead = "στρ ατιῶται ἀπῆλθον";
    assert_eq!(rejoin_unhyphenated_text(lead, &p).text, lead);
}

#[test]
fn elided_stems_and_allow_listed_continuations_stay_separate() {
    let p = greek();
    for text in [
        "καὶ ἐπ αὐτῷ ἦλθεν",
        "ἔγραψε δι ἐπιστολῆς πρὸς αὐτόν",
        "ὁ δὲ ἔφη πρὸς αὐτόν",
        "τοῦ πατρός μου καὶ τῆς μητρός",
    ] {
        let out = rejoin_unhyphenated_text(text, &p);
        assert_eq!(out.text, text);
        assert_eq!(out.joins, 0);
    }

    let input = lines(&["Καὶ ἔφη", "πρὸς αὐτόν"]);
    assert_eq!(rejoin_unhyphenated_lines(&input, &p).1, 0);
}

#[test]
fn dashes_and_capitalized_halves_are_not_line_break_hyphens() {
    let p = greek();
    for text in ["Ὁ βασιλεὺς— καὶ οἱ στρατιῶται", "Ὁ βασιλεὺς – καὶ οἱ στρατιῶται", "ἡ πόλις- Ῥώμη"] {
        assert_eq!(rejoin_hyphenated_text(text, &p).text, text);
    }
    assert_eq!(rejoin_hyphenated_text("ἡ βασι- λεία", &p).text, "ἡ βασιλεία");
}
