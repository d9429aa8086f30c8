use serde::{Deserialize, Serialize};

use crate::config::Profile;
use crate::script::{is_script_word, is_word_char, script_count, starts_with_upper};
use crate::strip::fixed_point;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejoinOutcome {
    pub text: String,
    pub joins: usize,
}

/// Merge `πα- ρασκευαστέον` style breaks inside running text, dropping any
/// stray digit between the halves (a displaced footnote marker).
pub fn rejoin_hyphenated_text(text: &str, profile: &Profile) -> RejoinOutcome {
    let mut joins = 0;
    let (text, _) = fixed_point(text.to_string(), profile.thresholds().max_iterations, |t| {
        let n = profile.hyphen_break.find_iter(t).count();
        if n == 0 {
            return None;
        }
        joins += n;
        Some(profile.hyphen_break.replace_all(t, "$a$b").into_owned())
    });
    RejoinOutcome { text, joins }
}

/// Hyphenated break spans still present in `text`, for the grader.
pub fn find_hyphenated_breaks(text: &str, profile: &Profile) -> Vec<(usize, usize)> {
    profile.hyphen_break.find_iter(text).map(|m| (m.start(), m.end())).collect()
}

/// Head of a line that ends in `<script letter><hyphen>`, without the hyphen.
fn hyphen_head<'a>(line: &'a str, profile: &Profile) -> Option<&'a str> {
    let trimmed = line.trim_end();
    let mut rev = trimmed.chars().rev();
    let last = rev.next()?;
    let before = rev.next()?;
    if profile.is_hyphen(last) && is_word_char(before, profile.script()) {
        Some(&trimmed[..trimmed.len() - last.len_utf8()])
    } else {
        None
    }
}

/// Split the continuation off the start of `next`, skipping a stray leading digit token.
fn continuation<'a>(next: &'a str, profile: &Profile) -> Option<(&'a str, &'a str)> {
    let mut rest = next.trim_start();
    let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    if digits > 0 {
        rest = rest[digits..].trim_start();
    }
    let end = rest.find(|c: char| !is_word_char(c, profile.script())).unwrap_or(rest.len());
    if end == 0 {
        return None;
    }
    Some((&rest[..end], &rest[end..]))
}

/// Join a line ending in a hyphen with the first token of the following line.
/// Blank lines block joining, so paragraph boundaries survive.
pub fn rejoin_hyphenated_lines(lines: &[String], profile: &Profile) -> (Vec<String>, usize) {
    let mut out: Vec<String> = lines.to_vec();
    let mut joins = 0;
    let mut i = 0;
    while i + 1 < out.len() {
        if out[i + 1].trim().is_empty() {
            i += 1;
            continue;
        }
        let joined = hyphen_head(&out[i], profile).and_then(|head| {
            continuation(&out[i + 1], profile)
                .map(|(word, tail)| (format!("{}{}", head, word), tail.trim().to_string()))
        });
        match joined {
            Some((line, tail)) => {
                out[i] = line;
                if tail.is_empty() {
                    out.remove(i + 1);
                } else {
                    out[i + 1] = tail;
                }
                joins += 1;
            }
            None => i += 1,
        }
    }
    (out, joins)
}

fn ends_clause(token: &str) -> bool {
    matches!(token.chars().last(), Some(',' | ';' | ':'))
}

/// A short script fragment that looks like a truncated word prefix.
fn is_fragment(token: &str, max_len: usize, profile: &Profile) -> bool {
    let script = profile.script();
    is_script_word(token, script) && script_count(token, script) <= max_len && !profile.is_valid_short(token)
}

/// A lowercase script word that could be the tail of a broken word. A word
/// on the allow-list stands on its own and is never a tail.
fn continues_word(token: &str, profile: &Profile) -> bool {
    let script = profile.script();
    let lead: String = token.chars().take_while(|&c| is_word_char(c, script)).collect();
    script_count(&lead, script) >= 2 && !starts_with_upper(&lead, script) && !profile.is_valid_short(&lead)
}

/// Line-wrap breaks without a hyphen: a short non-word fragment closing one
/// line is prefixed onto the first word of the next line.
pub fn rejoin_unhyphenated_lines(lines: &[String], profile: &Profile) -> (Vec<String>, usize) {
    let max = profile.thresholds().max_line_fragment;
    let mut out: Vec<String> = lines.to_vec();
    let mut joins = 0;
    let mut i = 0;
    while i + 1 < out.len() {
        let (cur, next) = (out[i].trim().to_string(), out[i + 1].trim().to_string());
        if cur.is_empty() || next.is_empty() {
            i += 1;
            continue;
        }
        let mut tokens: Vec<&str> = cur.split_whitespace().collect();
        let frag = tokens.pop().unwrap_or("");
        let after_clause = tokens.last().map(|t| ends_clause(t)).unwrap_or(false);
        if after_clause || !is_fragment(frag, max, profile) || !continues_word(&next, profile) {
            i += 1;
            continue;
        }
        out[i + 1] = format!("{}{}", frag, next);
        if tokens.is_empty() {
            out.remove(i);
        } else {
            out[i] = tokens.join(" ");
            i += 1;
        }
        joins += 1;
    }
    (out, joins)
}

/// Byte spans of `fragment continuation` pairs the text-level pass would merge.
pub fn find_unhyphenated_breaks(text: &str, profile: &Profile) -> Vec<(usize, usize)> {
    let max = profile.thresholds().max_text_fragment;
    let mut spans = Vec::new();
    let tokens: Vec<(usize, &str)> = token_offsets(text);
    for w in 1..tokens.len().saturating_sub(1) {
        let (prev, (start, frag), (nstart, next)) = (tokens[w - 1].1, tokens[w], tokens[w + 1]);
        if ends_clause(prev) || profile.ends_terminal(prev) {
            continue;
        }
        if is_fragment(frag, max, profile) && continues_word(next, profile) {
            spans.push((start, nstart + next.len()));
        }
    }
    spans
}

fn token_offsets(text: &str) -> Vec<(usize, &str)> {
    let mut out = Vec::new();
    let mut start = None;
    for (i, c) in text.char_indices() {
        match (c.is_whitespace(), start) {
            (true, Some(s)) => {
                out.push((s, &text[s..i]));
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(s) = start {
        out.push((s, &text[s..]));
    }
    out
}

/// Second, paragraph-level pass. Never touches the first token of a paragraph.
pub fn rejoin_unhyphenated_text(text: &str, profile: &Profile) -> RejoinOutcome {
    let mut joins = 0;
    let (text, _) = fixed_point(text.to_string(), profile.thresholds().max_iterations, |t| {
        let spans = find_unhyphenated_breaks(t, profile);
        if spans.is_empty() {
            return None;
        }
        let mut out = String::with_capacity(t.len());
        let mut last = 0;
        let mut consumed = 0;
        for (s, e) in spans {
            // overlapping candidates wait for the next round
            if s < consumed {
                continue;
            }
            let pair = &t[s..e];
            out.push_str(&t[last..s]);
            out.push_str(&pair.split_whitespace().collect::<String>());
            last = e;
            consumed = e;
            joins += 1;
        }
        out.push_str(&t[last..]);
        Some(out)
    });
    RejoinOutcome { text, joins }
}
