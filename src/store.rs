use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use globwalk::GlobWalkerBuilder;
use serde::Serialize;
use thiserror::Error;

use crate::record::{ChapterRecord, RecordError};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("WriteFailed: {0}")]
    WriteFailed(String),
    #[error("BackupFailed: {0}")]
    BackupFailed(String),
    #[error("EnumerateFailed: {0}")]
    Enumerate(String),
    #[error(transparent)]
    Record(#[from] RecordError),
}

/// A directory of `chapter-NNN.json` records.
#[derive(Debug, Clone)]
pub struct ChapterStore {
    dir: PathBuf,
}

impl ChapterStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.dir.join("backup")
    }

    pub fn chapter_path(&self, number: u32) -> PathBuf {
        self.dir.join(format!("chapter-{:03}.json", number))
    }

    /// Chapter files in this directory (backups excluded), sorted by name.
    pub fn enumerate(&self) -> Result<Vec<PathBuf>, StoreError> {
        if !self.dir.is_dir() {
            return Err(StoreError::Enumerate(format!("not a directory: {}", self.dir.display())));
        }
        let mut paths: Vec<PathBuf> = GlobWalkerBuilder::from_patterns(&self.dir, &["chapter-*.json"])
            .case_insensitive(false)
            .follow_links(false)
            .max_depth(1)
            .build()
            .map_err(|e| StoreError::Enumerate(e.to_string()))?
            .filter_map(|e| e.ok())
            .map(|e| e.path().to_path_buf())
            .filter(|p| p.is_file())
            .collect();
        paths.sort();
        Ok(paths)
    }

    /// Load every record. A malformed record aborts the load.
    pub fn load_all(&self) -> Result<Vec<ChapterRecord>, StoreError> {
        self.enumerate()?.iter().map(|p| ChapterRecord::read(p).map_err(StoreError::from)).collect()
    }

    pub fn load(&self, number: u32) -> Result<Option<ChapterRecord>, StoreError> {
        let path = self.chapter_path(number);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(ChapterRecord::read(&path)?))
    }

    /// Copy the current file into `backup/` under a millisecond timestamp.
    /// Completes before any overwrite of the original.
    pub fn backup(&self, number: u32) -> Result<Option<PathBuf>, StoreError> {
        let src = self.chapter_path(number);
        if !src.exists() {
            return Ok(None);
        }
        let dir = self.backup_dir();
        std::fs::create_dir_all(&dir).map_err(|e| StoreError::BackupFailed(e.to_string()))?;
        let millis = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis()).unwrap_or(0);
        let mut dst = dir.join(format!("chapter-{:03}.{}.json", number, millis));
        let mut n = 1;
        while dst.exists() {
            dst = dir.join(format!("chapter-{:03}.{}-{}.json", number, millis, n));
            n += 1;
        }
        std::fs::copy(&src, &dst).map_err(|e| StoreError::BackupFailed(e.to_string()))?;
        Ok(Some(dst))
    }

    /// Atomically write a record, backing up any existing version first.
    pub fn write(&self, record: &ChapterRecord) -> Result<(PathBuf, Option<PathBuf>), StoreError> {
        let path = self.chapter_path(record.chapter_number);
        record.validate(&path.display().to_string())?;
        let backup = self.backup(record.chapter_number)?;
        let bytes = serde_json::to_vec_pretty(record).map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        write_atomic(&self.dir, &path, &bytes)?;
        Ok((path, backup))
    }

    pub fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<PathBuf, StoreError> {
        let path = self.dir.join(name);
        let bytes = serde_json::to_vec_pretty(value).map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        write_atomic(&self.dir, &path, &bytes)?;
        Ok(path)
    }
}

/// Write to a temp file in `dir`, then rename over `path`.
pub fn write_atomic(dir: &Path, path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    std::fs::create_dir_all(dir).map_err(|e| StoreError::WriteFailed(e.to_string()))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| StoreError::WriteFailed(e.to_string()))?;
    tmp.write_all(bytes).map_err(|e| StoreError::WriteFailed(e.to_string()))?;
    tmp.flush().map_err(|e| StoreError::WriteFailed(e.to_string()))?;
    tmp.persist(path).map_err(|e| StoreError::WriteFailed(e.error.to_string()))?;
    Ok(())
}
