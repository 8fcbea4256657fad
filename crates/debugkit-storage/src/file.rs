use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::{Error, Format, Record, Result, Storage, composite_key, matches_type};

const EXTENSION: &str = "log";

/// Bytes left as-is in the name part of a file name.
const NAME_SET: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.');

/// The id part also escapes `-`, so the first `-` of a stem always ends the id.
const ID_SET: &AsciiSet = &NAME_SET.add(b'-');

/// One file per record: `<dir>/<id>-<name>.log`.
///
/// Both parts are percent-encoded, so every `(id, name)` pair maps to its own
/// file and listing recovers the original pair.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
    format: Format,
}

impl FileStorage {
    /// Opens (creating if needed) a storage directory and checks it is
    /// writable; failures surface here rather than on first save.
    pub fn new(dir: impl Into<PathBuf>, format: Format) -> Result<Self> {
        let dir = dir.into();

        fs::create_dir_all(&dir).map_err(|e| {
            Error::StorageUnavailable(format!("cannot create {}: {}", dir.display(), e))
        })?;

        let marker = dir.join(format!(".debugkit-write-{}", std::process::id()));
        fs::write(&marker, b"").map_err(|e| {
            Error::StorageUnavailable(format!("{} is not writable: {}", dir.display(), e))
        })?;
        let _ = fs::remove_file(&marker);

        Ok(Self { dir, format })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn set_format(&mut self, format: Format) {
        self.format = format;
    }

    pub fn path_for(&self, id: &str, name: &str) -> PathBuf {
        self.dir.join(format!(
            "{}-{}.{}",
            utf8_percent_encode(id, ID_SET),
            utf8_percent_encode(name, NAME_SET),
            EXTENSION
        ))
    }

    /// Every record file, sorted by file name. Files whose stem does not
    /// decode to an `(id, name)` pair are not ours and are skipped.
    fn entries(&self) -> Result<Vec<RecordFile>> {
        let mut entries = Vec::new();

        for entry in WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry?;
            let path = entry.path();
            if !entry.file_type().is_file()
                || path.extension().and_then(|e| e.to_str()) != Some(EXTENSION)
            {
                continue;
            }
            if let Some(file) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|stem| RecordFile::parse(stem, path))
            {
                entries.push(file);
            }
        }

        Ok(entries)
    }

    fn entries_for_id(&self, id: &str) -> Result<Vec<RecordFile>> {
        Ok(self
            .entries()?
            .into_iter()
            .filter(|file| file.id == id)
            .collect())
    }

    fn read(&self, path: &Path) -> Result<Value> {
        let raw = fs::read_to_string(path)?;
        self.format.decode(&raw)
    }
}

#[derive(Debug)]
struct RecordFile {
    id: String,
    name: String,
    path: PathBuf,
}

impl RecordFile {
    fn parse(stem: &str, path: &Path) -> Option<Self> {
        let (id, name) = stem.split_once('-')?;
        Some(Self {
            id: decode(id)?,
            name: decode(name)?,
            path: path.to_path_buf(),
        })
    }
}

fn decode(part: &str) -> Option<String> {
    percent_decode_str(part)
        .decode_utf8()
        .ok()
        .map(|decoded| decoded.into_owned())
}

impl Storage for FileStorage {
    fn format(&self) -> Format {
        self.format
    }

    fn save(&self, id: &str, name: &str, record: &Record) -> Result<()> {
        let path = self.path_for(id, name);
        let encoded = self.format.encode(&record.data)?;
        fs::write(&path, encoded)?;
        tracing::debug!(path = %path.display(), "saved debug record");
        Ok(())
    }

    fn get_by_id(&self, id: &str, name: Option<&str>) -> Result<Option<Value>> {
        if let Some(name) = name {
            let path = self.path_for(id, name);
            if !path.exists() {
                return Ok(None);
            }
            return self.read(&path).map(Some);
        }

        let mut map = Map::new();
        for file in self.entries_for_id(id)? {
            map.insert(file.name, self.read(&file.path)?);
        }
        Ok((!map.is_empty()).then_some(Value::Object(map)))
    }

    fn get_by_type(&self, handler_type: &str) -> Result<Option<Value>> {
        let mut map = Map::new();
        for file in self.entries()? {
            if matches_type(&file.name, handler_type) {
                map.insert(composite_key(&file.id, &file.name), self.read(&file.path)?);
            }
        }
        Ok((!map.is_empty()).then_some(Value::Object(map)))
    }

    fn has(&self, id: &str, name: Option<&str>) -> Result<bool> {
        match name {
            Some(name) => Ok(self.path_for(id, name).exists()),
            None => Ok(!self.entries_for_id(id)?.is_empty()),
        }
    }

    fn delete(&self, id: &str, name: Option<&str>) -> Result<()> {
        let paths = match name {
            Some(name) => vec![self.path_for(id, name)],
            None => self
                .entries_for_id(id)?
                .into_iter()
                .map(|file| file.path)
                .collect(),
        };

        for path in paths {
            if path.exists() {
                fs::remove_file(&path)?;
                tracing::debug!(path = %path.display(), "deleted debug record");
            }
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let entries = self.entries()?;
        for file in &entries {
            fs::remove_file(&file.path)?;
        }
        tracing::debug!(dir = %self.dir.display(), removed = entries.len(), "cleared debug records");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_names_are_percent_encoded() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path(), Format::Json).unwrap();

        assert_eq!(
            storage.path_for("abc", "boot_time.1"),
            temp_dir.path().join("abc-boot_time.1.log")
        );
        assert_eq!(
            storage.path_for("abc", "../etc/passwd"),
            temp_dir.path().join("abc-..%2Fetc%2Fpasswd.log")
        );
        assert_eq!(
            storage.path_for("abc-x", "boot-time"),
            temp_dir.path().join("abc%2Dx-boot-time.log")
        );
    }

    #[test]
    fn test_distinct_names_get_distinct_files() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path(), Format::Json).unwrap();
        storage
            .save("r1", "a/b", &Record::new("a/b", serde_json::json!(1)))
            .unwrap();
        storage
            .save("r1", "a_b", &Record::new("a_b", serde_json::json!(2)))
            .unwrap();

        assert_eq!(
            storage.get_by_id("r1", None).unwrap(),
            Some(serde_json::json!({"a/b": 1, "a_b": 2}))
        );
    }

    #[test]
    fn test_id_prefix_does_not_match_longer_id() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path(), Format::Json).unwrap();
        storage
            .save("abc", "message", &Record::new("message", serde_json::json!(["a"])))
            .unwrap();
        storage
            .save("abc-x", "time", &Record::new("time", serde_json::json!({"elapsed": 1})))
            .unwrap();

        assert_eq!(
            storage.get_by_id("abc", None).unwrap(),
            Some(serde_json::json!({"message": ["a"]}))
        );
        assert_eq!(
            storage.get_by_type("time").unwrap(),
            Some(serde_json::json!({"abc-x-time": {"elapsed": 1}}))
        );

        storage.delete("abc", None).unwrap();
        assert!(storage.has("abc-x", None).unwrap());
    }

    #[test]
    fn test_unwritable_location_fails_at_construction() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let blocker = temp_dir.path().join("not-a-dir");
        fs::write(&blocker, "x").unwrap();

        let err = FileStorage::new(blocker.join("nested"), Format::Json).unwrap_err();
        assert!(matches!(err, Error::StorageUnavailable(_)));
    }
}
