use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::{Grading, Profile, RateUnit};
use crate::record::Paragraph;
use crate::rejoin::{find_hyphenated_breaks, find_unhyphenated_breaks};
use crate::script::{char_len, script_ratio};
use crate::strip::{context_window, ContaminationFinding};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationReport {
    pub total_paragraphs: usize,
    pub contaminated_paragraphs: usize,
    pub total_chars: usize,
    pub contaminated_chars: usize,
    pub unit: RateUnit,
    pub contamination_rate: f64,
    pub grade: String,
    pub approved: bool,
    pub category_counts: BTreeMap<String, usize>,
    pub findings: Vec<ContaminationFinding>,
}

fn span_finding(text: &str, (s, e): (usize, usize), category: &str, rule: &str) -> ContaminationFinding {
    ContaminationFinding {
        category: category.to_string(),
        rule: rule.to_string(),
        matched: text[s..e].to_string(),
        position: s,
        context: context_window(text, s, e),
    }
}

/// Every residual finding in one paragraph. Never mutates.
pub fn scan_paragraph(text: &str, profile: &Profile) -> Vec<ContaminationFinding> {
    let mut found = profile.rules.scan(text);
    for audit in &profile.audit {
        for m in audit.matcher.find_iter(text) {
            found.push(span_finding(text, (m.start(), m.end()), &audit.category, &audit.name));
        }
    }
    for span in find_hyphenated_breaks(text, profile) {
        found.push(span_finding(text, span, "broken_word", "hyphenated_break"));
    }
    if profile.spec.rejoin_unhyphenated {
        for span in find_unhyphenated_breaks(text, profile) {
            found.push(span_finding(text, span, "broken_word", "unhyphenated_break"));
        }
    }
    let ratio = script_ratio(text, profile.script());
    if ratio < profile.thresholds().script_ratio_floor {
        found.push(span_finding(text, (0, text.len()), "low_script_ratio", "script_ratio_floor"));
    }
    found.sort_by_key(|f| f.position);
    found
}

/// Characters covered by at least one finding.
fn covered_chars(text: &str, findings: &[ContaminationFinding]) -> usize {
    let mut spans: Vec<(usize, usize)> = findings.iter().map(|f| (f.position, f.position + f.matched.len())).collect();
    spans.sort_unstable();
    let mut total = 0;
    let mut cur: Option<(usize, usize)> = None;
    for (s, e) in spans {
        cur = match cur {
            Some((cs, ce)) if s <= ce => Some((cs, ce.max(e))),
            Some((cs, ce)) => {
                total += char_len(&text[cs..ce]);
                Some((s, e))
            }
            None => Some((s, e)),
        };
    }
    if let Some((cs, ce)) = cur {
        total += char_len(&text[cs..ce]);
    }
    total
}

pub fn grade_for(rate: f64, grading: &Grading) -> String {
    grading
        .bands
        .iter()
        .find(|b| rate < b.below)
        .map(|b| b.grade.clone())
        .unwrap_or_else(|| grading.fallback_grade.clone())
}

/// Measure residual contamination across a chapter's paragraphs.
pub fn evaluate(paragraphs: &[Paragraph], profile: &Profile) -> ValidationReport {
    let grading = &profile.spec.grading;
    let mut contaminated_paragraphs = 0;
    let mut total_chars = 0;
    let mut contaminated_chars = 0;
    let mut category_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut findings = Vec::new();

    for p in paragraphs {
        total_chars += char_len(&p.text);
        let found = scan_paragraph(&p.text, profile);
        if found.is_empty() {
            continue;
        }
        contaminated_paragraphs += 1;
        contaminated_chars += covered_chars(&p.text, &found);
        for f in found {
            *category_counts.entry(f.category.clone()).or_insert(0) += 1;
            if findings.len() < grading.max_findings {
                findings.push(f);
            }
        }
    }

    let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
    let contamination_rate = match grading.unit {
        RateUnit::Paragraphs => ratio(contaminated_paragraphs, paragraphs.len()),
        RateUnit::Characters => ratio(contaminated_chars, total_chars),
    };
    ValidationReport {
        total_paragraphs: paragraphs.len(),
        contaminated_paragraphs,
        total_chars,
        contaminated_chars,
        unit: grading.unit,
        contamination_rate,
        grade: grade_for(contamination_rate, grading),
        approved: contamination_rate <= grading.acceptance_rate,
        category_counts,
        findings,
    }
}

/// Document gate: every chapter must pass on its own.
pub fn document_approved<'a, I>(reports: I) -> bool
where
    I: IntoIterator<Item = &'a ValidationReport>,
{
    reports.into_iter().all(|r| r.approved)
}
