use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::Profile;
use crate::script::{alpha_count, char_len, foreign_words, has_script, is_word_char, script_ratio};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LineTag {
    Content,
    Blank,
    PageHeader,
    PageNumber,
    Footnote,
    FootnoteContinuation,
    Apparatus,
    LatinEditorial,
    ForeignScript,
    OcrNoise,
    Index,
}

impl LineTag {
    pub fn removes(self) -> bool {
        !matches!(self, LineTag::Content | LineTag::Blank)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LineTag::Content => "CONTENT",
            LineTag::Blank => "BLANK",
            LineTag::PageHeader => "PAGE_HEADER",
            LineTag::PageNumber => "PAGE_NUMBER",
            LineTag::Footnote => "FOOTNOTE",
            LineTag::FootnoteContinuation => "FOOTNOTE_CONTINUATION",
            LineTag::Apparatus => "APPARATUS",
            LineTag::LatinEditorial => "LATIN_EDITORIAL",
            LineTag::ForeignScript => "FOREIGN_SCRIPT",
            LineTag::OcrNoise => "OCR_NOISE",
            LineTag::Index => "INDEX",
        }
    }
}

/// A raw line with its tag. Lives only between classification and assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    pub raw: String,
    pub tag: LineTag,
    pub reason: Option<String>,
}

static RE_PAGE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*[-—–]?\s*\d{1,4}\s*\.?\s*[-—–]?\s*$").unwrap());
static RE_NOISE_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*[A-Za-z\d:;.,!?\-*)(\[\]]{0,4}\s*$").unwrap());
static RE_PURE_NOISE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\s\d.,;:!?\-*)(\[\]A-Z/\\|°†‡]+$").unwrap());
static RE_MARKER_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[*\-]?\s*\d{0,2}\s*\)?\s*").unwrap());

type Detector = fn(&str, &Profile) -> Option<&'static str>;

/// Fixed priority: the first detector that fires decides the tag.
const DETECTORS: &[(LineTag, Detector)] = &[
    (LineTag::PageHeader, page_header),
    (LineTag::PageNumber, page_number),
    (LineTag::Footnote, footnote),
    (LineTag::Apparatus, apparatus),
    (LineTag::LatinEditorial, latin_editorial),
    (LineTag::ForeignScript, foreign_script),
    (LineTag::OcrNoise, ocr_noise),
    (LineTag::Index, index_marker),
];

fn page_header(s: &str, p: &Profile) -> Option<&'static str> {
    p.lines.page_headers.iter().any(|re| re.is_match(s)).then_some("page_header_pattern")
}

fn page_number(s: &str, p: &Profile) -> Option<&'static str> {
    if RE_PAGE_NUMBER.is_match(s) {
        return Some("standalone_number");
    }
    p.lines.page_numbers.iter().any(|re| re.is_match(s)).then_some("page_number_pattern")
}

fn has_sigla(s: &str, p: &Profile) -> bool {
    p.lines.sigla.as_ref().map(|re| re.is_match(s)).unwrap_or(false)
}

/// Codepoints of a listed foreign script; those lines belong to `foreign_script`.
fn has_foreign(s: &str, p: &Profile) -> bool {
    s.chars().any(|c| c.is_alphabetic() && p.spec.foreign_scripts.iter().any(|f| f.contains(c)))
}

fn footnote(s: &str, p: &Profile) -> Option<&'static str> {
    if p.lines.footnote_starts.iter().any(|re| re.is_match(s)) {
        return Some("footnote_start");
    }
    if p.words.footnote_prefixes.iter().any(|w| s.starts_with(w.as_str())) {
        return Some("footnote_prefix");
    }
    let script = p.script();
    let ratio = script_ratio(s, script);
    let len = char_len(s);
    if has_sigla(s, p) && (ratio < 0.6 || len < 80) {
        return Some("sigla");
    }
    if !has_foreign(s, p) && foreign_words(s, script) >= 2 && ratio < 0.5 && len < 120 {
        return Some("foreign_vocabulary");
    }
    None
}

fn apparatus(s: &str, p: &Profile) -> Option<&'static str> {
    let script = p.script();
    if has_sigla(s, p) {
        let body = RE_MARKER_PREFIX.replace(s, "");
        if body.chars().next().map(|c| is_word_char(c, script)).unwrap_or(false) {
            return Some("lemma_with_sigla");
        }
        let head: String = s.chars().take(20).collect();
        if !has_script(&head, script) {
            return Some("sigla_without_text");
        }
    }
    p.lines.apparatus.iter().any(|re| re.is_match(s)).then_some("apparatus_pattern")
}

fn latin_editorial(s: &str, p: &Profile) -> Option<&'static str> {
    if p.words.editorial_prefixes.iter().any(|w| s.starts_with(w.as_str())) {
        return Some("editorial_prefix");
    }
    let script = p.script();
    if char_len(s) <= 10 || has_foreign(s, p) {
        return None;
    }
    let words = foreign_words(s, script);
    if !has_script(s, script) && words >= 3 {
        return Some("foreign_prose");
    }
    if script_ratio(s, script) < 0.4 && words >= 4 {
        return Some("foreign_dominant");
    }
    None
}

fn foreign_script(s: &str, p: &Profile) -> Option<&'static str> {
    has_foreign(s, p).then_some("foreign_codepoints")
}

fn ocr_noise(s: &str, p: &Profile) -> Option<&'static str> {
    let script = p.script();
    let has = has_script(s, script);
    let len = char_len(s);
    if len <= 3 && !has {
        return Some("tiny");
    }
    if !has && (RE_NOISE_LINE.is_match(s) || RE_PURE_NOISE.is_match(s)) {
        return Some("symbol_run");
    }
    if p.words.noise_tokens.contains(&s.to_lowercase()) {
        return Some("noise_token");
    }
    let visible = s.chars().filter(|c| !c.is_whitespace()).count();
    if visible > 3 && (alpha_count(s) as f64) < 0.4 * visible as f64 {
        return Some("low_alpha");
    }
    // short lines are judged more strictly
    if len < p.thresholds().short_line_len && !has {
        return Some("short_without_script");
    }
    None
}

fn index_marker(s: &str, p: &Profile) -> Option<&'static str> {
    p.words.index_markers.iter().any(|w| s.starts_with(w.as_str())).then_some("index_marker")
}

/// Stateless classification of one line: `(should_remove, tag, reason)`.
pub fn classify_detail(line: &str, profile: &Profile) -> (bool, LineTag, Option<&'static str>) {
    let s = line.trim();
    if s.is_empty() {
        return (false, LineTag::Blank, None);
    }
    for (tag, detect) in DETECTORS {
        if let Some(reason) = detect(s, profile) {
            return (true, *tag, Some(reason));
        }
    }
    (false, LineTag::Content, None)
}

pub fn classify(line: &str, profile: &Profile) -> (bool, LineTag) {
    let (remove, tag, _) = classify_detail(line, profile);
    (remove, tag)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FootnoteState {
    #[default]
    Normal,
    InFootnoteBlock,
}

impl FootnoteState {
    pub fn enters(tag: LineTag) -> bool {
        matches!(tag, LineTag::Footnote | LineTag::Apparatus | LineTag::LatinEditorial)
    }

    /// Substantial target-script prose ends the block.
    pub fn exits(line: &str, profile: &Profile) -> bool {
        let t = profile.thresholds();
        let s = line.trim();
        script_ratio(s, profile.script()) > t.exit_ratio && char_len(s) > t.exit_min_len
    }

    pub fn continues(line: &str, profile: &Profile) -> bool {
        let s = line.trim();
        !has_script(s, profile.script()) || script_ratio(s, profile.script()) < profile.thresholds().continuation_ratio
    }

    /// Advance on one classified line, returning the next state and the final tag.
    pub fn step(self, line: &str, tag: LineTag, profile: &Profile) -> (FootnoteState, LineTag) {
        match self {
            FootnoteState::Normal if Self::enters(tag) => (FootnoteState::InFootnoteBlock, tag),
            FootnoteState::Normal => (FootnoteState::Normal, tag),
            FootnoteState::InFootnoteBlock => match tag {
                LineTag::Content if Self::exits(line, profile) => (FootnoteState::Normal, tag),
                LineTag::Content if Self::continues(line, profile) => {
                    (FootnoteState::InFootnoteBlock, LineTag::FootnoteContinuation)
                }
                _ => (FootnoteState::InFootnoteBlock, tag),
            },
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassifiedLines {
    pub lines: Vec<Line>,
    pub removed: BTreeMap<LineTag, usize>,
}

impl ClassifiedLines {
    /// Surviving lines, blanks included, in order.
    pub fn kept(&self) -> Vec<String> {
        self.lines.iter().filter(|l| !l.tag.removes()).map(|l| l.raw.clone()).collect()
    }
}

/// Classify a chapter's lines with footnote-block tracking. An index marker
/// ends the chapter body: everything after it is tagged `Index`.
pub fn classify_lines(lines: &[String], profile: &Profile) -> ClassifiedLines {
    let mut out = ClassifiedLines::default();
    let mut state = FootnoteState::Normal;
    let mut in_index = false;
    for raw in lines {
        let (tag, reason) = if in_index || index_marker(raw.trim(), profile).is_some() {
            in_index = true;
            (LineTag::Index, Some("index_section"))
        } else {
            let (_, tag, reason) = classify_detail(raw, profile);
            let (next, tag) = state.step(raw, tag, profile);
            state = next;
            let reason = if tag == LineTag::FootnoteContinuation { Some("in_footnote_block") } else { reason };
            (tag, reason)
        };
        if tag.removes() {
            *out.removed.entry(tag).or_insert(0) += 1;
        }
        out.lines.push(Line { raw: raw.clone(), tag, reason: reason.map(str::to_string) });
    }
    out
}
