use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Opaque state → action-value table kept across restarts
///
/// Loaded once before the stream workers start and saved once after they
/// stop. Nothing reads or updates it while streaming in this version:
/// [`LearningTable::record_outcome`] is a deliberate no-op placeholder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LearningTable {
    entries: HashMap<String, Vec<f64>>,
}

impl LearningTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: HashMap<String, Vec<f64>>) -> Self {
        Self { entries }
    }

    pub fn get(&self, state: &str) -> Option<&[f64]> {
        self.entries.get(state).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Update path for a future learning rule. Currently does nothing.
    pub fn record_outcome(&mut self, _state: &str, _action: usize, _reward: f64) {}
}

/// Storage backend for the learning table
pub trait TableStore: Send + Sync {
    /// `Ok(None)` when nothing has been saved yet
    fn load(&self) -> Result<Option<LearningTable>>;

    fn save(&self, table: &LearningTable) -> Result<()>;
}

/// Learning table stored as a single bincode file
#[derive(Debug, Clone)]
pub struct FileTableStore {
    path: PathBuf,
}

impl FileTableStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TableStore for FileTableStore {
    fn load(&self) -> Result<Option<LearningTable>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let bytes = std::fs::read(&self.path)?;
        let table: LearningTable = bincode::deserialize(&bytes).map_err(|e| {
            Error::Persistence(format!("{} is not a learning table: {}", self.path.display(), e))
        })?;

        tracing::info!(
            "Loaded learning table with {} states from {}",
            table.len(),
            self.path.display()
        );

        Ok(Some(table))
    }

    fn save(&self, table: &LearningTable) -> Result<()> {
        let bytes = bincode::serialize(table)?;

        // Write then rename so a crash mid-write keeps the previous table
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, &self.path)?;

        tracing::info!(
            "Saved learning table with {} states to {}",
            table.len(),
            self.path.display()
        );

        Ok(())
    }
}
