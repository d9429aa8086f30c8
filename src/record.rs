use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paragraph {
    pub index: usize,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceContent {
    pub paragraphs: Vec<Paragraph>,
}

/// Persisted chapter. Fields this tool does not own are carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterRecord {
    pub chapter_number: u32,
    pub title: String,
    pub source_content: SourceContent,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Failed to read chapter record {path}: {message}")]
    Read { path: String, message: String },
    #[error("Failed to parse chapter record {path}: {message}")]
    Parse { path: String, message: String },
    #[error("Invalid chapter record {path}: {message}")]
    Invalid { path: String, message: String },
}

/// Assign indices `0..N-1` in order.
pub fn reindex<I>(texts: I) -> Vec<Paragraph>
where
    I: IntoIterator<Item = String>,
{
    texts.into_iter().enumerate().map(|(index, text)| Paragraph { index, text }).collect()
}

impl ChapterRecord {
    pub fn new(chapter_number: u32, title: String, texts: Vec<String>) -> Self {
        Self {
            chapter_number,
            title,
            source_content: SourceContent { paragraphs: reindex(texts) },
            extra: BTreeMap::new(),
        }
    }

    pub fn paragraphs(&self) -> &[Paragraph] {
        &self.source_content.paragraphs
    }

    pub fn texts(&self) -> Vec<String> {
        self.source_content.paragraphs.iter().map(|p| p.text.clone()).collect()
    }

    /// Same chapter, new paragraph texts, extra fields kept.
    pub fn with_texts(&self, title: String, texts: Vec<String>) -> Self {
        Self {
            chapter_number: self.chapter_number,
            title,
            source_content: SourceContent { paragraphs: reindex(texts) },
            extra: self.extra.clone(),
        }
    }

    /// Schema checks: non-empty paragraph list, contiguous indices, non-empty text.
    pub fn validate(&self, path: &str) -> Result<(), RecordError> {
        let invalid = |message: String| RecordError::Invalid { path: path.to_string(), message };
        let paras = &self.source_content.paragraphs;
        if paras.is_empty() {
            return Err(invalid("sourceContent.paragraphs is empty".into()));
        }
        for (i, p) in paras.iter().enumerate() {
            if p.index != i {
                return Err(invalid(format!("paragraph index {} at position {} (expected {})", p.index, i, i)));
            }
            if p.text.trim().is_empty() {
                return Err(invalid(format!("paragraph {} has empty text", i)));
            }
        }
        Ok(())
    }

    pub fn from_json(raw: &str, path: &str) -> Result<Self, RecordError> {
        let rec: ChapterRecord = serde_json::from_str(raw)
            .map_err(|e| RecordError::Parse { path: path.to_string(), message: e.to_string() })?;
        rec.validate(path)?;
        Ok(rec)
    }

    pub fn read(path: &Path) -> Result<Self, RecordError> {
        let shown = path.display().to_string();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| RecordError::Read { path: shown.clone(), message: e.to_string() })?;
        Self::from_json(&raw, &shown)
    }
}
