//! # Stage Repositories
//!
//! Where a [`StageStore`] lives between runs.
//!
//! - `InMemory`: a held value (tests, embedding, one-shot tools)
//! - `File`: a single file replaced atomically on every save
//!
//! A repository only loads and saves whole stores. Mutation stays in
//! [`StageStore`]; recovery (rebuild on a missing or corrupt store) lives in
//! [`crate::tracker::StageTracker`].

use crate::DrillError;
use crate::formats::StoreFormat;
use crate::store::StageStore;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Load/save seam for the stage store.
pub trait StageRepository {
    /// Load the persisted store.
    ///
    /// `Ok(None)` means nothing has been persisted yet. An `Err` means the
    /// persisted data is unreadable or corrupt.
    fn load(&self) -> Result<Option<StageStore>, DrillError>;

    /// Persist the whole store.
    fn save(&mut self, store: &StageStore) -> Result<(), DrillError>;
}

// =============================================================================
// IN-MEMORY
// =============================================================================

/// Repository holding the last saved store in memory.
#[derive(Debug, Default, Clone)]
pub struct InMemoryRepository {
    stored: Option<StageStore>,
    saves: usize,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an already persisted store.
    #[must_use]
    pub fn with_store(store: StageStore) -> Self {
        Self {
            stored: Some(store),
            saves: 0,
        }
    }

    /// Number of successful saves.
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.saves
    }

    #[must_use]
    pub fn stored(&self) -> Option<&StageStore> {
        self.stored.as_ref()
    }
}

impl StageRepository for InMemoryRepository {
    fn load(&self) -> Result<Option<StageStore>, DrillError> {
        Ok(self.stored.clone())
    }

    fn save(&mut self, store: &StageStore) -> Result<(), DrillError> {
        self.stored = Some(store.clone());
        self.saves = self.saves.saturating_add(1);
        Ok(())
    }
}

// =============================================================================
// FILE
// =============================================================================

/// Repository backed by one file in JSON or binary format.
#[derive(Debug, Clone)]
pub struct FileRepository {
    path: PathBuf,
    format: StoreFormat,
}

impl FileRepository {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, format: StoreFormat) -> Self {
        Self {
            path: path.into(),
            format,
        }
    }

    /// Repository for `dir/<format file name>`.
    #[must_use]
    pub fn in_dir(dir: impl AsRef<Path>, format: StoreFormat) -> Self {
        Self::new(dir.as_ref().join(format.file_name()), format)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn format(&self) -> StoreFormat {
        self.format
    }
}

impl StageRepository for FileRepository {
    fn load(&self) -> Result<Option<StageStore>, DrillError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        self.format.decode(&bytes).map(Some)
    }

    fn save(&mut self, store: &StageStore) -> Result<(), DrillError> {
        let bytes = self.format.encode(store)?;
        write_atomic(&self.path, &bytes)?;
        tracing::debug!(
            path = %self.path.display(),
            format = %self.format,
            states = store.state_count(),
            "stage store saved"
        );
        Ok(())
    }
}

/// Replace `path` with `bytes` so readers never observe a partial file.
///
/// Writes `<path>.tmp`, syncs it, then renames it over `path`. Parent
/// directories are created as needed.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), DrillError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let result = (|| -> Result<(), DrillError> {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    })();

    if result.is_err() {
        // Best effort; the original file is untouched either way.
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

// =============================================================================
// TESTS
// =============================================================================
