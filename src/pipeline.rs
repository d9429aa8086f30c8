use std::collections::{BTreeMap, HashSet};
use std::ops::AddAssign;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::assemble::assemble;
use crate::classify::classify_lines;
use crate::config::Profile;
use crate::heal::{heal_texts, heal_texts_where};
use crate::record::{reindex, ChapterRecord};
use crate::rejoin::{
    rejoin_hyphenated_lines, rejoin_hyphenated_text, rejoin_unhyphenated_lines, rejoin_unhyphenated_text,
};
use crate::script::{char_len, script_ratio};
use crate::store::{ChapterStore, StoreError};
use crate::strip::{clean_title, normalize_spacing, strip};
use crate::validate::{document_approved, evaluate, scan_paragraph, ValidationReport};
use crate::sha256_hex;

const MAX_SAMPLES: usize = 50;
const POST_ROUNDS: usize = 8;

#[derive(Debug, Error)]
pub enum ChapterError {
    #[error("chapter {chapter}: undecodable bytes on lines {lines:?}")]
    Encoding { chapter: u32, lines: Vec<usize> },
    #[error("chapter {chapter}: no paragraphs survived cleaning")]
    Empty { chapter: u32 },
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityIssue {
    pub chapter: u32,
    pub issue: String,
    pub ratio: Option<f64>,
    pub text: String,
}

/// Run-scoped counters. Each chapter returns its own value; the run sums them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub chapters_processed: usize,
    pub chapters_failed: usize,
    pub lines_total: usize,
    pub lines_removed: BTreeMap<String, usize>,
    pub rule_triggers: BTreeMap<String, usize>,
    pub paragraphs_emitted: usize,
    pub paragraphs_modified: usize,
    pub paragraphs_dropped: usize,
    pub hyphen_joins: usize,
    pub unhyphenated_joins: usize,
    pub heal_merges: usize,
    pub quality_issues: Vec<QualityIssue>,
    pub removed_samples: Vec<String>,
}

fn add_counts(into: &mut BTreeMap<String, usize>, from: BTreeMap<String, usize>) {
    for (k, v) in from {
        *into.entry(k).or_insert(0) += v;
    }
}

impl AddAssign for RunStats {
    fn add_assign(&mut self, rhs: Self) {
        self.chapters_processed += rhs.chapters_processed;
        self.chapters_failed += rhs.chapters_failed;
        self.lines_total += rhs.lines_total;
        add_counts(&mut self.lines_removed, rhs.lines_removed);
        add_counts(&mut self.rule_triggers, rhs.rule_triggers);
        self.paragraphs_emitted += rhs.paragraphs_emitted;
        self.paragraphs_modified += rhs.paragraphs_modified;
        self.paragraphs_dropped += rhs.paragraphs_dropped;
        self.hyphen_joins += rhs.hyphen_joins;
        self.unhyphenated_joins += rhs.unhyphenated_joins;
        self.heal_merges += rhs.heal_merges;
        self.quality_issues.extend(rhs.quality_issues);
        let room = MAX_SAMPLES.saturating_sub(self.removed_samples.len());
        self.removed_samples.extend(rhs.removed_samples.into_iter().take(room));
    }
}

impl RunStats {
    fn sample(&mut self, s: String) {
        if self.removed_samples.len() < MAX_SAMPLES {
            self.removed_samples.push(s);
        }
    }
}

/// A chapter as cut from raw input, before any cleaning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawChapter {
    pub number: u32,
    pub title: String,
    pub lines: Vec<String>,
    /// 1-based line numbers that were not valid UTF-8.
    pub encoding_errors: Vec<usize>,
}

fn roman_value(s: &str) -> Option<u32> {
    let mut total = 0u32;
    let mut prev = 0u32;
    for c in s.chars().rev() {
        let v = match c.to_ascii_uppercase() {
            'I' => 1,
            'V' => 5,
            'X' => 10,
            'L' => 50,
            'C' => 100,
            'D' => 500,
            'M' => 1000,
            _ => return None,
        };
        if v < prev {
            total = total.checked_sub(v)?;
        } else {
            total += v;
            prev = v;
        }
    }
    (total > 0).then_some(total)
}

fn parse_number(s: &str) -> Option<u32> {
    let s = s.trim();
    s.parse::<u32>().ok().or_else(|| roman_value(s))
}

/// Cut decoded input into chapters on the profile's chapter marker. Without
/// any marker the whole input is one chapter. Text before the first marker
/// becomes chapter 0 so nothing is dropped silently.
pub fn split_chapters(input: &[u8], profile: &Profile) -> Vec<RawChapter> {
    let mut chapters: Vec<RawChapter> = Vec::new();
    let mut current = RawChapter::default();
    let mut last_number = 0u32;
    let mut seen_marker = false;

    for (i, raw) in input.split(|b| *b == b'\n').enumerate() {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        let line = match std::str::from_utf8(raw) {
            Ok(s) => s.to_string(),
            Err(_) => {
                current.encoding_errors.push(i + 1);
                continue;
            }
        };
        let marker = profile.chapter_marker.as_ref().and_then(|re| re.captures(&line)).map(|caps| {
            let num = caps.name("num").and_then(|m| parse_number(m.as_str()));
            let title = caps.name("title").map(|m| m.as_str().trim().to_string()).filter(|t| !t.is_empty());
            (num, title)
        });
        let Some((parsed, title)) = marker else {
            current.lines.push(line);
            continue;
        };
        let has_body = current.lines.iter().any(|l| !l.trim().is_empty()) || !current.encoding_errors.is_empty();
        if seen_marker || has_body {
            chapters.push(std::mem::take(&mut current));
        }
        seen_marker = true;
        let number = parsed.filter(|n| *n > last_number).unwrap_or(last_number + 1);
        last_number = number;
        let title = title.unwrap_or_else(|| line.trim().to_string());
        current = RawChapter { number, title, ..RawChapter::default() };
    }

    if !seen_marker {
        warn!(
            tool = "split_chapters",
            profile = %profile.spec.name,
            "no chapter marker found; treating input as one chapter"
        );
        current.number = 1;
        return vec![current];
    }
    chapters.push(current);
    chapters
}

/// Result of cleaning one chapter, before persistence.
#[derive(Debug, Clone)]
pub struct ChapterOutcome {
    pub record: ChapterRecord,
    pub report: ValidationReport,
    pub stats: RunStats,
}

fn preview(text: &str) -> String {
    text.chars().take(80).collect()
}

fn rate_of(texts: &[String], profile: &Profile) -> f64 {
    evaluate(&reindex(texts.iter().cloned()), profile).contamination_rate
}

/// Healing inside the cleaning pass must not raise contamination. A merge
/// that would carry a finding onto a clean paragraph is vetoed, and the
/// split list is kept if the merged one still grades worse.
fn heal_guarded(texts: Vec<String>, profile: &Profile) -> (Vec<String>, usize) {
    let dirty = |t: &str| !scan_paragraph(t, profile).is_empty();
    let (healed, merges) =
        heal_texts_where(texts.clone(), profile, |prev, curr, merged| !dirty(merged) || (dirty(prev) && dirty(curr)));
    if merges > 0 && rate_of(&healed, profile) > rate_of(&texts, profile) {
        debug!(tool = "post_process", merges, "healing would raise contamination; kept split");
        return (texts, 0);
    }
    (healed, merges)
}

/// Paragraph-level pass, iterated to its own fixed point so that running it
/// on its output changes nothing: strip, rejoin, drop failures, heal.
pub fn post_process(texts: Vec<String>, chapter: u32, profile: &Profile) -> (Vec<String>, RunStats) {
    let t = profile.thresholds();
    let script = profile.script();
    let mut stats = RunStats::default();
    let original: HashSet<String> = texts.iter().cloned().collect();
    let mut cur = texts;

    for round in 0..POST_ROUNDS {
        let mut next = Vec::with_capacity(cur.len());
        for text in &cur {
            let stripped = strip(text, profile);
            add_counts(&mut stats.rule_triggers, stripped.triggers);
            let hyph = rejoin_hyphenated_text(&stripped.text, profile);
            stats.hyphen_joins += hyph.joins;
            let joined = if profile.spec.rejoin_unhyphenated {
                let unhyph = rejoin_unhyphenated_text(&hyph.text, profile);
                stats.unhyphenated_joins += unhyph.joins;
                unhyph.text
            } else {
                hyph.text
            };
            let cleaned = normalize_spacing(&joined);

            let ratio = script_ratio(&cleaned, script);
            let issue = if cleaned.is_empty() {
                Some("empty")
            } else if char_len(&cleaned) <= t.min_paragraph_len {
                Some("too_short")
            } else if ratio < t.script_ratio_floor {
                Some("low_script_ratio")
            } else {
                None
            };
            match issue {
                Some(issue) => {
                    stats.paragraphs_dropped += 1;
                    stats.quality_issues.push(QualityIssue {
                        chapter,
                        issue: issue.to_string(),
                        ratio: Some(ratio),
                        text: preview(text),
                    });
                }
                None => next.push(cleaned),
            }
        }
        if profile.spec.heal {
            let (healed, merges) = heal_guarded(next, profile);
            stats.heal_merges += merges;
            next = healed;
        }
        if next == cur {
            debug!(tool = "post_process", chapter, rounds = round, "paragraphs stable");
            break;
        }
        cur = next;
    }
    stats.paragraphs_modified = cur.iter().filter(|t| !original.contains(*t)).count();
    (cur, stats)
}

/// Full raw-input path for one chapter.
pub fn clean_chapter(raw: &RawChapter, profile: &Profile) -> Result<ChapterOutcome, ChapterError> {
    if !raw.encoding_errors.is_empty() {
        return Err(ChapterError::Encoding { chapter: raw.number, lines: raw.encoding_errors.clone() });
    }
    let mut stats = RunStats { chapters_processed: 1, lines_total: raw.lines.len(), ..RunStats::default() };

    let lines: Vec<String> = raw.lines.iter().map(|l| profile.normalize(l)).collect();
    let classified = classify_lines(&lines, profile);
    for (tag, n) in &classified.removed {
        *stats.lines_removed.entry(tag.as_str().to_string()).or_insert(0) += n;
    }

    let mut kept: Vec<String> = Vec::with_capacity(classified.lines.len());
    for line in &classified.lines {
        if line.tag.removes() {
            stats.sample(format!("{}: {}", line.tag.as_str(), preview(line.raw.trim())));
            continue;
        }
        if line.raw.trim().is_empty() {
            kept.push(String::new());
            continue;
        }
        let stripped = strip(&line.raw, profile);
        add_counts(&mut stats.rule_triggers, stripped.triggers);
        if !stripped.text.is_empty() {
            kept.push(stripped.text);
        }
    }

    let (kept, hyph) = rejoin_hyphenated_lines(&kept, profile);
    stats.hyphen_joins += hyph;
    let kept = if profile.spec.rejoin_unhyphenated {
        let (k, n) = rejoin_unhyphenated_lines(&kept, profile);
        stats.unhyphenated_joins += n;
        k
    } else {
        kept
    };

    let assembled = assemble(&kept, profile);
    let (texts, post) = post_process(assembled, raw.number, profile);
    stats += post;
    if texts.is_empty() {
        return Err(ChapterError::Empty { chapter: raw.number });
    }

    let title = clean_title(&raw.title, profile).text;
    let record = ChapterRecord::new(raw.number, title, texts);
    stats.paragraphs_emitted = record.paragraphs().len();
    let report = evaluate(record.paragraphs(), profile);
    info!(
        tool = "clean_chapter",
        chapter = raw.number,
        lines = stats.lines_total,
        paragraphs = stats.paragraphs_emitted,
        dropped = stats.paragraphs_dropped,
        rate = report.contamination_rate,
        grade = %report.grade,
        "chapter cleaned"
    );
    Ok(ChapterOutcome { record, report, stats })
}

/// Re-run the paragraph pass over an existing record, end to end.
pub fn reclean_record(record: &ChapterRecord, profile: &Profile) -> Result<ChapterOutcome, ChapterError> {
    let texts: Vec<String> = record.texts().iter().map(|t| profile.normalize(t)).collect();
    let before = texts.len();
    let (texts, mut stats) = post_process(texts, record.chapter_number, profile);
    if texts.is_empty() {
        return Err(ChapterError::Empty { chapter: record.chapter_number });
    }
    stats.chapters_processed = 1;
    stats.paragraphs_emitted = texts.len();
    let title = clean_title(&record.title, profile).text;
    let out = record.with_texts(title, texts);
    let report = evaluate(out.paragraphs(), profile);
    debug!(tool = "reclean_record", chapter = record.chapter_number, before, after = out.paragraphs().len());
    Ok(ChapterOutcome { record: out, report, stats })
}

/// Heal paragraph splits only; no stripping.
pub fn heal_record(record: &ChapterRecord, profile: &Profile) -> ChapterOutcome {
    let (texts, merges) = heal_texts(record.texts(), profile);
    let out = record.with_texts(record.title.clone(), texts);
    let report = evaluate(out.paragraphs(), profile);
    let stats = RunStats {
        chapters_processed: 1,
        heal_merges: merges,
        paragraphs_emitted: out.paragraphs().len(),
        ..RunStats::default()
    };
    ChapterOutcome { record: out, report, stats }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChapterStatus {
    Written { path: PathBuf, backup: Option<PathBuf> },
    Unchanged,
    DryRun,
    Graded,
    Regressed { prior_rate: f64, new_rate: f64 },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterSummary {
    pub chapter: u32,
    #[serde(flatten)]
    pub status: ChapterStatus,
    pub approved: bool,
    pub report: Option<ValidationReport>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunOptions {
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub profile: String,
    pub mode: String,
    pub status: String,
    pub approved: bool,
    pub input_sha256: Option<String>,
    pub output_sha256: String,
    pub chapters: Vec<ChapterSummary>,
    pub stats: RunStats,
}

pub const REPORT_FILE: &str = "cleaning-report.json";

/// Persist one outcome unless it regresses against the stored version.
fn persist(
    store: &ChapterStore,
    outcome: &ChapterOutcome,
    profile: &Profile,
    opts: &RunOptions,
) -> Result<ChapterSummary, PipelineError> {
    let number = outcome.record.chapter_number;
    let prior = store.load(number)?;
    let summary = |status: ChapterStatus, approved: bool| ChapterSummary {
        chapter: number,
        status,
        approved,
        report: Some(outcome.report.clone()),
    };
    if let Some(prior) = &prior {
        let prior_rate = evaluate(prior.paragraphs(), profile).contamination_rate;
        let new_rate = outcome.report.contamination_rate;
        if new_rate > prior_rate {
            warn!(tool = "persist", chapter = number, prior_rate, new_rate, "regression; keeping stored version");
            return Ok(summary(ChapterStatus::Regressed { prior_rate, new_rate }, false));
        }
        if *prior == outcome.record {
            return Ok(summary(ChapterStatus::Unchanged, outcome.report.approved));
        }
    }
    if opts.dry_run {
        return Ok(summary(ChapterStatus::DryRun, outcome.report.approved));
    }
    let (path, backup) = store.write(&outcome.record)?;
    info!(tool = "persist", chapter = number, path = %path.display(), backup = ?backup, "chapter written");
    Ok(summary(ChapterStatus::Written { path, backup }, outcome.report.approved))
}

fn failed(chapter: u32, err: &ChapterError) -> ChapterSummary {
    warn!(tool = "pipeline", chapter, error = %err, "chapter failed");
    ChapterSummary { chapter, status: ChapterStatus::Failed { error: err.to_string() }, approved: false, report: None }
}

fn finish(
    profile: &Profile,
    mode: &str,
    input_sha256: Option<String>,
    chapters: Vec<ChapterSummary>,
    stats: RunStats,
    records: &[ChapterRecord],
) -> RunReport {
    let approved = !chapters.is_empty()
        && chapters.iter().all(|c| c.approved)
        && document_approved(chapters.iter().filter_map(|c| c.report.as_ref()));
    let mut digest_input = Vec::new();
    for r in records {
        if let Ok(bytes) = serde_json::to_vec(r) {
            digest_input.extend(bytes);
        }
    }
    let status = if approved { "APPROVED" } else { "NOT APPROVED" };
    info!(tool = "pipeline", mode, chapters = chapters.len(), status, "run finished");
    RunReport {
        profile: profile.spec.name.clone(),
        mode: mode.to_string(),
        status: status.to_string(),
        approved,
        input_sha256,
        output_sha256: sha256_hex(&digest_input),
        chapters,
        stats,
    }
}

fn write_report(store: &ChapterStore, report: &RunReport, opts: &RunOptions) -> Result<(), PipelineError> {
    if !opts.dry_run {
        store.write_json(REPORT_FILE, report)?;
    }
    Ok(())
}

/// Clean raw OCR input into chapter records under `store`.
pub fn run_clean(
    input: &[u8],
    store: &ChapterStore,
    profile: &Profile,
    opts: &RunOptions,
) -> Result<RunReport, PipelineError> {
    let mut stats = RunStats::default();
    let mut chapters = Vec::new();
    let mut records = Vec::new();
    for raw in split_chapters(input, profile) {
        match clean_chapter(&raw, profile) {
            Ok(outcome) => {
                chapters.push(persist(store, &outcome, profile, opts)?);
                stats += outcome.stats;
                records.push(outcome.record);
            }
            Err(e) => {
                stats.chapters_failed += 1;
                chapters.push(failed(raw.number, &e));
            }
        }
    }
    let report = finish(profile, "clean", Some(sha256_hex(input)), chapters, stats, &records);
    write_report(store, &report, opts)?;
    Ok(report)
}

fn run_records<F>(
    store: &ChapterStore,
    profile: &Profile,
    opts: &RunOptions,
    mode: &str,
    mut step: F,
) -> Result<RunReport, PipelineError>
where
    F: FnMut(&ChapterRecord) -> Result<ChapterOutcome, ChapterError>,
{
    let mut stats = RunStats::default();
    let mut chapters = Vec::new();
    let mut records = Vec::new();
    for record in store.load_all()? {
        match step(&record) {
            Ok(outcome) => {
                chapters.push(persist(store, &outcome, profile, opts)?);
                stats += outcome.stats;
                records.push(outcome.record);
            }
            Err(e) => {
                stats.chapters_failed += 1;
                chapters.push(failed(record.chapter_number, &e));
            }
        }
    }
    let report = finish(profile, mode, None, chapters, stats, &records);
    write_report(store, &report, opts)?;
    Ok(report)
}

/// Re-clean every stored chapter end to end.
pub fn run_reclean(store: &ChapterStore, profile: &Profile, opts: &RunOptions) -> Result<RunReport, PipelineError> {
    run_records(store, profile, opts, "reclean", |r| reclean_record(r, profile))
}

pub fn run_heal(store: &ChapterStore, profile: &Profile, opts: &RunOptions) -> Result<RunReport, PipelineError> {
    run_records(store, profile, opts, "heal", |r| Ok(heal_record(r, profile)))
}

/// Grade stored chapters without writing anything.
pub fn run_grade(store: &ChapterStore, profile: &Profile) -> Result<RunReport, PipelineError> {
    let records = store.load_all()?;
    let chapters: Vec<ChapterSummary> = records
        .iter()
        .map(|r| {
            let report = evaluate(r.paragraphs(), profile);
            info!(tool = "grade", chapter = r.chapter_number, rate = report.contamination_rate, grade = %report.grade);
            ChapterSummary {
                chapter: r.chapter_number,
                status: ChapterStatus::Graded,
                approved: report.approved,
                report: Some(report),
            }
        })
        .collect();
    let stats = RunStats { chapters_processed: records.len(), ..RunStats::default() };
    Ok(finish(profile, "grade", None, chapters, stats, &records))
}
