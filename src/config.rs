use std::collections::HashSet;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::script::{nfc, Script};
use crate::strip::RuleTable;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Failed to read profile: {0}")]
    Read(String),
    #[error("Failed to parse profile: {0}")]
    Parse(String),
    #[error("Invalid profile: {0}")]
    Invalid(String),
    #[error("Invalid pattern `{name}`: {message}")]
    Pattern { name: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    #[default]
    Delete,
    Space,
}

/// One inline rule as written in the profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSpec {
    pub name: String,
    pub category: String,
    pub pattern: String,
    #[serde(default)]
    pub action: RuleAction,
    /// Skip a match whose contaminant span matches this pattern (e.g. Roman numerals).
    #[serde(default)]
    pub unless: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditSpec {
    pub name: String,
    pub category: String,
    pub pattern: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Lexicon {
    pub valid_short_words: Vec<String>,
    pub continuation_words: Vec<String>,
    pub apparatus_starts: Vec<String>,
    pub footnote_prefixes: Vec<String>,
    pub editorial_prefixes: Vec<String>,
    pub index_markers: Vec<String>,
    pub noise_tokens: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LinePatterns {
    pub page_headers: Vec<String>,
    pub page_numbers: Vec<String>,
    pub footnote_starts: Vec<String>,
    pub apparatus: Vec<String>,
    pub sigla: Vec<String>,
    pub break_patterns: Vec<String>,
    pub start_patterns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub script_ratio_floor: f64,
    pub min_paragraph_len: usize,
    pub short_line_len: usize,
    pub continuation_ratio: f64,
    pub exit_ratio: f64,
    pub exit_min_len: usize,
    pub max_line_fragment: usize,
    pub max_text_fragment: usize,
    pub min_split_line_len: usize,
    pub min_split_buffer_len: usize,
    pub merge_below_len: usize,
    pub short_fragment_len: usize,
    pub max_iterations: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            script_ratio_floor: 0.3,
            min_paragraph_len: 10,
            short_line_len: 20,
            continuation_ratio: 0.4,
            exit_ratio: 0.7,
            exit_min_len: 30,
            max_line_fragment: 4,
            max_text_fragment: 3,
            min_split_line_len: 20,
            min_split_buffer_len: 200,
            merge_below_len: 50,
            short_fragment_len: 50,
            max_iterations: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RateUnit {
    #[default]
    Paragraphs,
    Characters,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeBand {
    pub grade: String,
    pub below: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Grading {
    pub unit: RateUnit,
    pub acceptance_rate: f64,
    pub bands: Vec<GradeBand>,
    pub fallback_grade: String,
    pub max_findings: usize,
}

impl Default for Grading {
    fn default() -> Self {
        let band = |grade: &str, below: f64| GradeBand { grade: grade.into(), below };
        Self {
            unit: RateUnit::Paragraphs,
            acceptance_rate: 0.05,
            bands: vec![band("A", 0.02), band("B+", 0.05), band("B", 0.08), band("C", 0.15)],
            fallback_grade: "D".into(),
            max_findings: 50,
        }
    }
}

fn default_terminal() -> String {
    ".;·".into()
}

/// Line-break hyphens only. Dashes (U+2012..U+2014) are prose punctuation.
fn default_hyphens() -> String {
    "-\u{2010}\u{2011}\u{00AC}".into()
}

fn yes() -> bool {
    true
}

/// Corpus profile as written in YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusProfile {
    pub name: String,
    pub script: Script,
    #[serde(default = "yes")]
    pub normalize_unicode: bool,
    #[serde(default)]
    pub chapter_marker: Option<String>,
    #[serde(default = "default_terminal")]
    pub terminal_punctuation: String,
    #[serde(default = "default_hyphens")]
    pub hyphens: String,
    #[serde(default)]
    pub foreign_scripts: Vec<Script>,
    #[serde(default)]
    pub rejoin_unhyphenated: bool,
    #[serde(default = "yes")]
    pub heal: bool,
    #[serde(default)]
    pub lexicon: Lexicon,
    #[serde(default)]
    pub lines: LinePatterns,
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
    #[serde(default)]
    pub title_rules: Vec<RuleSpec>,
    #[serde(default)]
    pub audit: Vec<AuditSpec>,
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub grading: Grading,
}

#[derive(Debug, Clone)]
pub struct AuditRule {
    pub name: String,
    pub category: String,
    pub matcher: Regex,
}

/// Normalized word lists, ready for membership tests.
#[derive(Debug, Clone, Default)]
pub struct WordSets {
    pub valid_short: HashSet<String>,
    pub continuation: HashSet<String>,
    pub apparatus_starts: Vec<String>,
    pub footnote_prefixes: Vec<String>,
    pub editorial_prefixes: Vec<String>,
    pub index_markers: Vec<String>,
    pub noise_tokens: HashSet<String>,
}

#[derive(Debug, Clone)]
pub struct CompiledLines {
    pub page_headers: Vec<Regex>,
    pub page_numbers: Vec<Regex>,
    pub footnote_starts: Vec<Regex>,
    pub apparatus: Vec<Regex>,
    pub sigla: Option<Regex>,
    pub break_patterns: Vec<Regex>,
    pub start_patterns: Vec<Regex>,
}

/// A validated profile with every pattern compiled.
#[derive(Debug, Clone)]
pub struct Profile {
    pub spec: CorpusProfile,
    pub words: WordSets,
    pub lines: CompiledLines,
    pub chapter_marker: Option<Regex>,
    pub rules: RuleTable,
    pub title_rules: RuleTable,
    pub audit: Vec<AuditRule>,
    /// `word-<ws>[digits]word` with both halves in the target script, the second lowercase.
    pub hyphen_break: Regex,
}

const BUILTIN: &[(&str, &str)] = &[
    ("byzantine-greek", include_str!("../profiles/byzantine-greek.yaml")),
    ("italian", include_str!("../profiles/italian.yaml")),
    ("ottoman-turkish", include_str!("../profiles/ottoman-turkish.yaml")),
    ("classical-chinese", include_str!("../profiles/classical-chinese.yaml")),
];

pub fn builtin_names() -> Vec<&'static str> {
    BUILTIN.iter().map(|(n, _)| *n).collect()
}

pub fn builtin_profile(name: &str) -> Result<Profile, ProfileError> {
    let (_, raw) = BUILTIN
        .iter()
        .find(|(n, _)| *n == name)
        .ok_or_else(|| ProfileError::Invalid(format!("unknown built-in profile: {}", name)))?;
    parse_profile(raw)
}

/// Load a profile from a YAML file.
pub fn load_profile(path: &Path) -> Result<Profile, ProfileError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ProfileError::Read(e.to_string()))?;
    parse_profile(&raw)
}

/// A built-in name wins over a path of the same spelling.
pub fn resolve_profile(name_or_path: &str) -> Result<Profile, ProfileError> {
    if BUILTIN.iter().any(|(n, _)| *n == name_or_path) {
        builtin_profile(name_or_path)
    } else {
        load_profile(Path::new(name_or_path))
    }
}

pub fn parse_profile(raw: &str) -> Result<Profile, ProfileError> {
    let spec: CorpusProfile = serde_yaml::from_str(raw).map_err(|e| ProfileError::Parse(e.to_string()))?;
    validate_profile(&spec)?;
    Profile::compile(spec)
}

fn between_0_1(name: &str, v: f64) -> Result<(), ProfileError> {
    if !(0.0..=1.0).contains(&v) {
        return Err(ProfileError::Invalid(format!("{} must be within 0..=1, got {}", name, v)));
    }
    Ok(())
}

/// Semantic checks that serde cannot express.
pub fn validate_profile(spec: &CorpusProfile) -> Result<(), ProfileError> {
    if spec.name.trim().is_empty() {
        return Err(ProfileError::Invalid("missing name".into()));
    }
    if spec.terminal_punctuation.is_empty() {
        return Err(ProfileError::Invalid("terminal_punctuation is empty".into()));
    }
    if spec.foreign_scripts.contains(&spec.script) {
        return Err(ProfileError::Invalid("target script listed as foreign".into()));
    }
    let t = &spec.thresholds;
    between_0_1("script_ratio_floor", t.script_ratio_floor)?;
    between_0_1("continuation_ratio", t.continuation_ratio)?;
    between_0_1("exit_ratio", t.exit_ratio)?;
    if t.continuation_ratio > t.exit_ratio {
        return Err(ProfileError::Invalid("continuation_ratio exceeds exit_ratio".into()));
    }
    if t.max_iterations == 0 {
        return Err(ProfileError::Invalid("max_iterations must be at least 1".into()));
    }
    if t.max_line_fragment == 0 || t.max_text_fragment == 0 {
        return Err(ProfileError::Invalid("fragment lengths must be at least 1".into()));
    }
    let g = &spec.grading;
    between_0_1("acceptance_rate", g.acceptance_rate)?;
    if g.bands.is_empty() {
        return Err(ProfileError::Invalid("grading.bands is empty".into()));
    }
    for pair in g.bands.windows(2) {
        if pair[0].below >= pair[1].below {
            return Err(ProfileError::Invalid(format!(
                "grade bands must ascend: {} ({}) then {} ({})",
                pair[0].grade, pair[0].below, pair[1].grade, pair[1].below
            )));
        }
    }
    let mut seen = HashSet::new();
    for r in spec.rules.iter().chain(spec.title_rules.iter()) {
        if !seen.insert((r.name.as_str(), r.category.as_str(), r.pattern.as_str())) {
            return Err(ProfileError::Invalid(format!("duplicate rule: {}", r.name)));
        }
    }
    Ok(())
}

pub(crate) fn compile_pattern(name: &str, pattern: &str, script: Script) -> Result<Regex, ProfileError> {
    Regex::new(&script.expand(pattern))
        .map_err(|e| ProfileError::Pattern { name: name.to_string(), message: e.to_string() })
}

fn compile_all(name: &str, patterns: &[String], script: Script) -> Result<Vec<Regex>, ProfileError> {
    patterns
        .iter()
        .enumerate()
        .map(|(i, p)| compile_pattern(&format!("{}[{}]", name, i), p, script))
        .collect()
}

fn word_set(words: &[String]) -> HashSet<String> {
    words.iter().map(|w| nfc(w.trim()).to_lowercase()).collect()
}

fn word_list(words: &[String]) -> Vec<String> {
    words.iter().map(|w| nfc(w.trim())).filter(|w| !w.is_empty()).collect()
}

impl Profile {
    pub fn compile(spec: CorpusProfile) -> Result<Self, ProfileError> {
        let script = spec.script;
        let l = &spec.lines;
        let sigla = if l.sigla.is_empty() {
            None
        } else {
            let joined = l.sigla.iter().map(|p| format!("(?:{})", p)).collect::<Vec<_>>().join("|");
            Some(compile_pattern("lines.sigla", &joined, script)?)
        };
        let lines = CompiledLines {
            page_headers: compile_all("lines.page_headers", &l.page_headers, script)?,
            page_numbers: compile_all("lines.page_numbers", &l.page_numbers, script)?,
            footnote_starts: compile_all("lines.footnote_starts", &l.footnote_starts, script)?,
            apparatus: compile_all("lines.apparatus", &l.apparatus, script)?,
            sigla,
            break_patterns: compile_all("lines.break_patterns", &l.break_patterns, script)?,
            start_patterns: compile_all("lines.start_patterns", &l.start_patterns, script)?,
        };
        let chapter_marker = match &spec.chapter_marker {
            Some(p) => Some(compile_pattern("chapter_marker", p, script)?),
            None => None,
        };
        let lx = &spec.lexicon;
        let words = WordSets {
            valid_short: word_set(&lx.valid_short_words),
            continuation: word_set(&lx.continuation_words),
            apparatus_starts: word_list(&lx.apparatus_starts),
            footnote_prefixes: word_list(&lx.footnote_prefixes),
            editorial_prefixes: word_list(&lx.editorial_prefixes),
            index_markers: word_list(&lx.index_markers),
            noise_tokens: word_set(&lx.noise_tokens),
        };
        let rules = RuleTable::compile(&spec.rules, script)?.with_builtins(script, &spec.foreign_scripts)?;
        let title_rules = RuleTable::compile(&spec.title_rules, script)?;
        let audit = spec
            .audit
            .iter()
            .map(|a| {
                Ok(AuditRule {
                    name: a.name.clone(),
                    category: a.category.clone(),
                    matcher: compile_pattern(&a.name, &a.pattern, script)?,
                })
            })
            .collect::<Result<Vec<_>, ProfileError>>()?;
        let hyphens: String = spec.hyphens.chars().map(|c| regex::escape(&c.to_string())).collect();
        let hyphen_break = compile_pattern(
            "hyphen_break",
            &format!(r"(?P<a>[{{script}}\p{{M}}]+)[{}]\s+\d*(?P<b>{{lower}}[{{script}}\p{{M}}]*)", hyphens),
            script,
        )?;
        Ok(Self { spec, words, lines, chapter_marker, rules, title_rules, audit, hyphen_break })
    }

    pub fn script(&self) -> Script {
        self.spec.script
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.spec.thresholds
    }

    pub fn is_terminal(&self, c: char) -> bool {
        self.spec.terminal_punctuation.contains(c)
    }

    pub fn is_hyphen(&self, c: char) -> bool {
        self.spec.hyphens.contains(c)
    }

    /// Whether the text, ignoring trailing whitespace and closing quotes/brackets, ends a sentence.
    pub fn ends_terminal(&self, text: &str) -> bool {
        text.trim_end()
            .chars()
            .rev()
            .find(|c| !matches!(c, '"' | '\'' | '»' | '”' | '’' | ')' | ']'))
            .map(|c| self.is_terminal(c))
            .unwrap_or(false)
    }

    pub fn is_valid_short(&self, word: &str) -> bool {
        self.words.valid_short.contains(&word.to_lowercase())
    }

    /// Input normalization applied to every line and every persisted paragraph on read.
    pub fn normalize(&self, text: &str) -> String {
        let t = text.replace('\u{00A0}', " ");
        if self.spec.normalize_unicode {
            nfc(&t)
        } else {
            t
        }
    }
}
