use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::Profile;
use crate::record::{reindex, Paragraph};
use crate::script::{char_len, is_word_char, starts_with_lower};

static RE_NUMBERED_SECTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\d+\s*[.,]").unwrap());

fn first_word(text: &str) -> String {
    text.split_whitespace()
        .next()
        .unwrap_or("")
        .trim_end_matches(|c: char| c.is_ascii_punctuation() || c == '·')
        .to_lowercase()
}

/// Whether `curr` continues `prev` across a page boundary.
pub fn should_merge(prev: &str, curr: &str, profile: &Profile) -> bool {
    // numbered sections override every other signal
    if RE_NUMBERED_SECTION.is_match(curr) {
        return false;
    }
    if profile.ends_terminal(prev) {
        return false;
    }
    let curr = curr.trim();
    if profile.lines.start_patterns.iter().any(|re| re.is_match(curr)) {
        return false;
    }
    if starts_with_lower(curr, profile.script()) {
        return true;
    }
    if char_len(curr) < profile.thresholds().short_fragment_len {
        return true;
    }
    if profile.words.apparatus_starts.iter().any(|m| curr.starts_with(m.as_str())) {
        return true;
    }
    if prev.trim_end().chars().last().map(|c| profile.is_hyphen(c)).unwrap_or(false) {
        return true;
    }
    profile.words.continuation.contains(&first_word(curr))
}

/// Merge split paragraphs and reindex. Returns the healed list and the merge count.
pub fn heal(paragraphs: &[Paragraph], profile: &Profile) -> (Vec<Paragraph>, usize) {
    let (texts, merges) = heal_texts(paragraphs.iter().map(|p| p.text.clone()).collect(), profile);
    (reindex(texts), merges)
}

/// Join a merge pair with one space. A line-break hyphen closing `prev` is
/// dropped and the halves fused when `curr` opens with a lowercase script letter.
fn join(prev: &str, curr: &str, profile: &Profile) -> String {
    let script = profile.script();
    let prev = prev.trim_end();
    let curr = curr.trim_start();
    let mut rev = prev.chars().rev();
    let hyphen = rev.next().filter(|&c| profile.is_hyphen(c));
    let word_before = rev.next().map(|c| is_word_char(c, script)).unwrap_or(false);
    let word_after = curr.chars().next().map(|c| script.is_letter(c) && !c.is_uppercase()).unwrap_or(false);
    match hyphen {
        Some(h) if word_before && word_after => format!("{}{}", &prev[..prev.len() - h.len_utf8()], curr),
        _ => format!("{} {}", prev, curr),
    }
}

pub fn heal_texts(texts: Vec<String>, profile: &Profile) -> (Vec<String>, usize) {
    heal_texts_where(texts, profile, |_, _, _| true)
}

/// Like `heal_texts`, but `accept(prev, curr, merged)` can veto a merge the
/// signals asked for. A vetoed pair stays split.
pub fn heal_texts_where<F>(texts: Vec<String>, profile: &Profile, mut accept: F) -> (Vec<String>, usize)
where
    F: FnMut(&str, &str, &str) -> bool,
{
    let mut out: Vec<String> = Vec::with_capacity(texts.len());
    let mut merges = 0;
    for text in texts {
        if let Some(prev) = out.last_mut() {
            if should_merge(prev.as_str(), &text, profile) {
                let joined = join(prev.as_str(), &text, profile);
                if accept(prev.as_str(), &text, &joined) {
                    *prev = joined;
                    merges += 1;
                    continue;
                }
            }
        }
        out.push(text);
    }
    (out, merges)
}
