//! TestWorld pattern for isolated storage setup.

use anyhow::{Context, Result};
use debugkit_storage::{FileStorage, Format, SqliteStorage};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use walkdir::WalkDir;

/// Isolated temp directory with a `debug/` folder for file storages.
///
/// # Example
/// ```no_run
/// use debugkit_storage::Format;
/// use debugkit_testing::TestWorld;
///
/// let world = TestWorld::new();
/// let _storage = world.file_storage(Format::Json).unwrap();
/// assert!(world.log_files().unwrap().is_empty());
/// ```
pub struct TestWorld {
    temp_dir: TempDir,
    storage_dir: PathBuf,
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl TestWorld {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let storage_dir = temp_dir.path().join("debug");

        std::fs::create_dir_all(&storage_dir).expect("Failed to create storage dir");

        Self {
            temp_dir,
            storage_dir,
        }
    }

    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Directory file storages created by this world write into.
    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn file_storage(&self, format: Format) -> Result<FileStorage> {
        FileStorage::new(&self.storage_dir, format).context("Failed to open file storage")
    }

    pub fn sqlite_path(&self) -> PathBuf {
        self.temp_dir.path().join("debug.sqlite")
    }

    pub fn sqlite_storage(&self, format: Format) -> Result<SqliteStorage> {
        SqliteStorage::open(self.sqlite_path(), format).context("Failed to open sqlite storage")
    }

    /// File names of every `.log` record in the storage directory, sorted.
    pub fn log_files(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in WalkDir::new(&self.storage_dir).min_depth(1).max_depth(1) {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if entry.file_type().is_file() && name.ends_with(".log") {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn read_log(&self, file_name: &str) -> Result<String> {
        let path = self.storage_dir.join(file_name);
        std::fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))
    }
}
