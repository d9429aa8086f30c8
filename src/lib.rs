//! Contamination cleaning for OCR'd historical corpora: line classification,
//! inline stripping, word rejoining, paragraph assembly and healing, and a
//! grading loop that gates what gets persisted.

pub mod assemble;
pub mod classify;
pub mod config;
pub mod heal;
pub mod logging;
pub mod pipeline;
pub mod record;
pub mod rejoin;
pub mod script;
pub mod store;
pub mod strip;
pub mod validate;

pub use assemble::assemble;
pub use classify::{classify, classify_lines, ClassifiedLines, FootnoteState, Line, LineTag};
pub use config::{builtin_profile, load_profile, parse_profile, resolve_profile, CorpusProfile, Profile, ProfileError};
pub use heal::{heal, should_merge};
pub use pipeline::{
    clean_chapter, heal_record, post_process, reclean_record, run_clean, run_grade, run_heal, run_reclean,
    split_chapters, ChapterError, ChapterOutcome, ChapterStatus, PipelineError, RawChapter, RunOptions, RunReport,
    RunStats,
};
pub use record::{ChapterRecord, Paragraph, RecordError};
pub use rejoin::{rejoin_hyphenated_lines, rejoin_hyphenated_text, rejoin_unhyphenated_lines, rejoin_unhyphenated_text};
pub use script::Script;
pub use store::{ChapterStore, StoreError};
pub use strip::{clean_title, strip, ContaminationFinding, Rule, RuleTable, StripOutcome};
pub use validate::{document_approved, evaluate, grade_for, ValidationReport};

// Utility to compute sha256 hex
pub fn sha256_hex(bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let out = hasher.finalize();
    out.iter().map(|b| format!("{:02x}", b)).collect()
}
