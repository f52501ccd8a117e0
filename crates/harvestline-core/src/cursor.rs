//! Persisted progress cursors
//!
//! Both engines remember "the next unit to process" as a single integer in a
//! small JSON file. The harvester stores `{"start": n}` (record offset, 1-based),
//! the publisher stores `{"last_index": n}` (count of files uploaded).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Location and shape of one persisted cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressFile {
    path: PathBuf,
    field: &'static str,
    baseline: u64,
}

impl ProgressFile {
    /// Harvest record offset: `{"start": n}`, defaulting to 1
    pub fn harvest(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            field: "start",
            baseline: 1,
        }
    }

    /// Publish file index: `{"last_index": n}`, defaulting to 0
    pub fn upload(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            field: "last_index",
            baseline: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn baseline(&self) -> u64 {
        self.baseline
    }

    /// Last committed value, or the baseline if the file is missing or unusable.
    pub fn load(&self) -> u64 {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return self.baseline,
            Err(e) => {
                log::warn!(
                    "cannot read {}: {e}, starting from {}",
                    self.path.display(),
                    self.baseline
                );
                return self.baseline;
            }
        };

        let value = serde_json::from_str::<serde_json::Value>(&text)
            .ok()
            .and_then(|v| v.get(self.field).and_then(serde_json::Value::as_u64));

        match value {
            Some(v) => v,
            None => {
                log::warn!(
                    "corrupt progress file {}, starting from {}",
                    self.path.display(),
                    self.baseline
                );
                self.baseline
            }
        }
    }

    /// Replace the committed value: write `{path}.tmp`, then rename over `{path}`.
    pub fn save(&self, value: u64) -> io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp_path = self.tmp_path();
        let mut object = serde_json::Map::new();
        object.insert(self.field.to_string(), value.into());
        let body = serde_json::Value::Object(object).to_string();
        fs::write(&tmp_path, body)?;
        fs::rename(&tmp_path, &self.path)?;
        log::debug!("{}: {} = {value}", self.path.display(), self.field);
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_uses_baseline() {
        let dir = TempDir::new().unwrap();
        assert_eq!(ProgressFile::harvest(dir.path().join("a.json")).load(), 1);
        assert_eq!(ProgressFile::upload(dir.path().join("b.json")).load(), 0);
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let progress = ProgressFile::harvest(dir.path().join("sru_progress.json"));
        progress.save(301).unwrap();
        assert_eq!(progress.load(), 301);
        progress.save(401).unwrap();
        assert_eq!(progress.load(), 401);
    }

    #[test]
    fn wire_format_matches_field_name() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("upload_progress.json");
        ProgressFile::upload(&path).save(500).unwrap();
        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw, serde_json::json!({ "last_index": 500 }));
    }

    #[test]
    fn reads_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sru_progress.json");
        std::fs::write(&path, r#"{"start": 1201}"#).unwrap();
        assert_eq!(ProgressFile::harvest(&path).load(), 1201);
    }

    #[test]
    fn corrupt_file_uses_baseline() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("p.json");

        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(ProgressFile::upload(&path).load(), 0);

        std::fs::write(&path, r#"{"other": 5}"#).unwrap();
        assert_eq!(ProgressFile::upload(&path).load(), 0);

        std::fs::write(&path, r#"{"last_index": -3}"#).unwrap();
        assert_eq!(ProgressFile::upload(&path).load(), 0);

        std::fs::write(&path, r#"{"start": "12"}"#).unwrap();
        assert_eq!(ProgressFile::harvest(&path).load(), 1);
    }

    #[test]
    fn save_leaves_no_tmp_and_creates_parent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state").join("p.json");
        ProgressFile::upload(&path).save(7).unwrap();
        assert!(path.exists());
        assert!(!dir.path().join("state").join("p.json.tmp").exists());
    }
}
