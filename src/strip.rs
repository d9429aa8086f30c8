use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::{compile_pattern, Profile, ProfileError, RuleAction, RuleSpec};
use crate::script::Script;

/// A stripped or detected span. Reporting only, never written back into text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContaminationFinding {
    pub category: String,
    pub rule: String,
    #[serde(rename = "match")]
    pub matched: String,
    /// Byte offset into the text the rule ran against.
    pub position: usize,
    pub context: String,
}

const CONTEXT_CHARS: usize = 30;

/// Up to 30 characters either side of `start..end`, on char boundaries.
pub fn context_window(text: &str, start: usize, end: usize) -> String {
    let before = text[..start].char_indices().rev().nth(CONTEXT_CHARS - 1).map(|(i, _)| i).unwrap_or(0);
    let after = text[end..].char_indices().nth(CONTEXT_CHARS).map(|(i, _)| end + i).unwrap_or(text.len());
    text[before..after].to_string()
}

/// One `{category, matcher, action}` entry. Named groups `pre` and `post`
/// are context: they must match but are kept in the output.
#[derive(Debug, Clone)]
pub struct Rule {
    pub name: String,
    pub category: String,
    pub matcher: Regex,
    pub action: RuleAction,
    pub unless: Option<Regex>,
}

impl Rule {
    pub fn new(
        name: &str,
        category: &str,
        pattern: &str,
        action: RuleAction,
        script: Script,
    ) -> Result<Self, ProfileError> {
        Ok(Self {
            name: name.to_string(),
            category: category.to_string(),
            matcher: compile_pattern(name, pattern, script)?,
            action,
            unless: None,
        })
    }

    /// Contaminant spans (context excluded), in order, without touching the text.
    pub fn find_spans(&self, text: &str) -> Vec<(usize, usize)> {
        let mut spans = Vec::new();
        for caps in self.matcher.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            let start = caps.name("pre").map(|m| m.end()).unwrap_or(whole.start());
            let end = caps.name("post").map(|m| m.start()).unwrap_or(whole.end());
            if start >= end {
                continue;
            }
            if let Some(unless) = &self.unless {
                if unless.is_match(&text[start..end]) {
                    continue;
                }
            }
            spans.push((start, end));
        }
        spans
    }

    pub fn findings(&self, text: &str) -> Vec<ContaminationFinding> {
        self.find_spans(text)
            .into_iter()
            .map(|(s, e)| ContaminationFinding {
                category: self.category.clone(),
                rule: self.name.clone(),
                matched: text[s..e].to_string(),
                position: s,
                context: context_window(text, s, e),
            })
            .collect()
    }

    /// One left-to-right pass. `None` when nothing matched.
    pub fn apply(&self, text: &str) -> Option<(String, Vec<ContaminationFinding>)> {
        let spans = self.find_spans(text);
        if spans.is_empty() {
            return None;
        }
        let filler = match self.action {
            RuleAction::Delete => "",
            RuleAction::Space => " ",
        };
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        let mut found = Vec::with_capacity(spans.len());
        for (s, e) in spans {
            out.push_str(&text[last..s]);
            out.push_str(filler);
            found.push(ContaminationFinding {
                category: self.category.clone(),
                rule: self.name.clone(),
                matched: text[s..e].to_string(),
                position: s,
                context: context_window(text, s, e),
            });
            last = e;
        }
        out.push_str(&text[last..]);
        Some((out, found))
    }
}

/// Ordered rule cascade. Order matters: earlier rules can expose matches for later ones.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    pub rules: Vec<Rule>,
}

impl RuleTable {
    pub fn compile(specs: &[RuleSpec], script: Script) -> Result<Self, ProfileError> {
        let mut rules = Vec::with_capacity(specs.len());
        for spec in specs {
            let mut rule = Rule::new(&spec.name, &spec.category, &spec.pattern, spec.action, script)?;
            if let Some(u) = &spec.unless {
                rule.unless = Some(compile_pattern(&format!("{}.unless", spec.name), u, script)?);
            }
            rules.push(rule);
        }
        Ok(Self { rules })
    }

    /// Append the rules every corpus shares: foreign-script runs, symbol
    /// garbage, and page numbers that sit against target-script text.
    pub fn with_builtins(mut self, script: Script, foreign: &[Script]) -> Result<Self, ProfileError> {
        if !foreign.is_empty() {
            let class: String = foreign.iter().map(|s| s.class()).collect();
            let pattern = format!("[{}]+", class);
            self.rules.push(Rule::new("foreign_script_run", "foreign_script", &pattern, RuleAction::Space, script)?);
        }
        self.rules.push(Rule::new("symbol_garbage", "ocr_garbage", r"[\\|/_~^#=<>]{3,}", RuleAction::Space, script)?);
        self.rules.push(Rule::new(
            "leading_page_number",
            "page_number",
            r"^(?P<pre>\s*)\d{2,4}\s+(?P<post>{upper})",
            RuleAction::Delete,
            script,
        )?);
        self.rules.push(Rule::new(
            "interior_page_number",
            "page_number",
            r"(?P<pre>{script}) \d{3,4}(?P<post> {script})",
            RuleAction::Delete,
            script,
        )?);
        Ok(self)
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Every rule once, in order.
    fn pass(
        &self,
        text: &str,
        findings: &mut Vec<ContaminationFinding>,
        triggers: &mut BTreeMap<String, usize>,
    ) -> String {
        let mut cur = text.to_string();
        for rule in &self.rules {
            if let Some((next, found)) = rule.apply(&cur) {
                *triggers.entry(rule.name.clone()).or_insert(0) += found.len();
                findings.extend(found);
                cur = next;
            }
        }
        cur
    }

    /// Read-only scan with every rule against the same text.
    pub fn scan(&self, text: &str) -> Vec<ContaminationFinding> {
        self.rules.iter().flat_map(|r| r.findings(text)).collect()
    }
}

/// Apply `step` until it reports no change or `max_iterations` rounds have run.
/// Returns the final value and the number of rounds that changed it.
pub fn fixed_point<F>(input: String, max_iterations: usize, mut step: F) -> (String, usize)
where
    F: FnMut(&str) -> Option<String>,
{
    let mut cur = input;
    let mut rounds = 0;
    while rounds < max_iterations {
        match step(&cur) {
            Some(next) if next != cur => {
                cur = next;
                rounds += 1;
            }
            _ => break,
        }
    }
    (cur, rounds)
}

static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static RE_EMPTY_BRACKETS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(\s*\)|\[\s*\]|\{\s*\}").unwrap());
static RE_TRAILING_ORPHAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:\s+[,;:·\-–—]+)+$").unwrap());
static RE_SPACE_BEFORE_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+([,;:.·])").unwrap());
static RE_DOUBLE_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"([,;:·])(?:\s*[,;:·])+").unwrap());
static RE_COMMA_DOT: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*\.|\.\s*,").unwrap());
static RE_LEADING_ORPHAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\s,;:.·)\]}]+").unwrap());

/// Whitespace and punctuation tidy-up after stripping. Idempotent.
pub fn normalize_spacing(text: &str) -> String {
    let t = RE_EMPTY_BRACKETS.replace_all(text, " ");
    let t = RE_WS.replace_all(&t, " ");
    let t = RE_SPACE_BEFORE_PUNCT.replace_all(&t, "$1");
    let t = RE_TRAILING_ORPHAN.replace_all(&t, "");
    let t = RE_DOUBLE_PUNCT.replace_all(&t, "$1");
    let t = RE_COMMA_DOT.replace_all(&t, ".");
    let t = RE_LEADING_ORPHAN.replace_all(&t, "");
    t.trim().to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StripOutcome {
    pub text: String,
    pub findings: Vec<ContaminationFinding>,
    pub triggers: BTreeMap<String, usize>,
    pub rounds: usize,
}

impl StripOutcome {
    pub fn changed(&self) -> bool {
        !self.findings.is_empty()
    }
}

/// Run a rule table to a fixed point, normalizing between rounds.
pub fn strip_with(table: &RuleTable, text: &str, max_iterations: usize) -> StripOutcome {
    let mut findings = Vec::new();
    let mut triggers = BTreeMap::new();
    let (text, rounds) = fixed_point(normalize_spacing(text), max_iterations, |t| {
        Some(normalize_spacing(&table.pass(t, &mut findings, &mut triggers)))
    });
    StripOutcome { text, findings, triggers, rounds }
}

/// Strip inline contamination using the profile's body rules.
pub fn strip(text: &str, profile: &Profile) -> StripOutcome {
    strip_with(&profile.rules, text, profile.thresholds().max_iterations)
}

static RE_TITLE_TAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s.:]+$").unwrap());

/// Titles get the title-only rules first, then the body cascade.
pub fn clean_title(title: &str, profile: &Profile) -> StripOutcome {
    let max = profile.thresholds().max_iterations;
    let first = strip_with(&profile.title_rules, &profile.normalize(title), max);
    let mut second = strip_with(&profile.rules, &first.text, max);
    let text = crate::rejoin::rejoin_hyphenated_text(&second.text, profile).text;
    second.text = RE_TITLE_TAIL.replace(&text, "").to_string();
    let mut findings = first.findings;
    findings.append(&mut second.findings);
    for (k, v) in first.triggers {
        *second.triggers.entry(k).or_insert(0) += v;
    }
    StripOutcome { text: second.text, findings, triggers: second.triggers, rounds: first.rounds + second.rounds }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_is_idempotent() {
        let once = normalize_spacing("  , λόγος  ,, καὶ ( )  τε ;  -");
        assert_eq!(once, "λόγος, καὶ τε;");
        assert_eq!(normalize_spacing(&once), once);
    }

    #[test]
    fn context_respects_char_boundaries() {
        let text = "ἀδαρνάρσην O, ἀδανάρσην";
        let start = text.find('O').unwrap();
        let ctx = context_window(text, start, start + 1);
        assert_eq!(ctx, text);
    }

    #[test]
    fn fixed_point_stops_at_bound() {
        let (out, rounds) = fixed_point("aaaa".to_string(), 2, |t| Some(t[1..].to_string()));
        assert_eq!(out, "aa");
        assert_eq!(rounds, 2);
    }
}
