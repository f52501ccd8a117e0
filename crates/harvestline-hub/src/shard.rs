//! JSON-lines shard payloads

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::listing::relative_url;

/// One line of a shard
#[derive(Debug, Serialize)]
pub struct ShardRecord<'a> {
    pub url: String,
    pub content: String,
    pub source: &'a str,
}

/// Decode as UTF-8, dropping invalid byte sequences.
pub fn decode_lossy_dropping(bytes: &[u8]) -> String {
    bytes.utf8_chunks().map(|chunk| chunk.valid()).collect()
}

/// Shard line for one staged file
pub fn shard_record<'a>(file: &Path, data_dir: &Path, source: &'a str) -> Result<ShardRecord<'a>> {
    let bytes =
        std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    Ok(ShardRecord {
        url: relative_url(file, data_dir),
        content: decode_lossy_dropping(&bytes),
        source,
    })
}

/// Write the shard for `files` into a temporary `.jsonl` file.
///
/// The file is removed when the returned handle is dropped, whatever the
/// outcome of the upload.
pub fn build_shard(files: &[PathBuf], data_dir: &Path, source: &str) -> Result<NamedTempFile> {
    let tmp = tempfile::Builder::new()
        .prefix("shard_")
        .suffix(".jsonl")
        .tempfile()
        .context("Failed to create temporary shard file")?;

    let mut out = BufWriter::new(tmp.as_file());
    for file in files {
        let record = shard_record(file, data_dir, source)?;
        serde_json::to_writer(&mut out, &record).context("Failed to serialize shard line")?;
        out.write_all(b"\n")?;
    }
    out.flush().context("Failed to write temporary shard file")?;
    drop(out);

    Ok(tmp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn decode_drops_invalid_bytes() {
        assert_eq!(decode_lossy_dropping(b"abc"), "abc");
        assert_eq!(decode_lossy_dropping(b"a\xffb\xfe"), "ab");
        assert_eq!(decode_lossy_dropping("één".as_bytes()), "één");
    }

    #[test]
    fn one_json_object_per_file() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("sub")).unwrap();
        let a = dir.path().join("A.xml");
        let b = dir.path().join("sub").join("B.xml");
        std::fs::write(&a, "<a>artikel één</a>").unwrap();
        std::fs::write(&b, b"<b>\xff</b>").unwrap();

        let shard = build_shard(&[a, b], dir.path(), "Basis Wettenbestand").unwrap();
        let text = std::fs::read_to_string(shard.path()).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            serde_json::json!({
                "url": "A.xml",
                "content": "<a>artikel één</a>",
                "source": "Basis Wettenbestand",
            })
        );
        assert_eq!(lines[1]["url"], "sub/B.xml");
        assert_eq!(lines[1]["content"], "<b></b>");
        // non-ASCII is written as UTF-8, not \u escapes
        assert!(text.contains("één"));
    }

    #[test]
    fn temp_file_removed_on_drop() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("A.xml");
        std::fs::write(&a, "<a/>").unwrap();

        let shard = build_shard(&[a], dir.path(), "src").unwrap();
        let path = shard.path().to_path_buf();
        assert!(path.exists());
        drop(shard);
        assert!(!path.exists());
    }

    #[test]
    fn missing_file_is_error() {
        let dir = TempDir::new().unwrap();
        let err = build_shard(&[dir.path().join("gone.xml")], dir.path(), "src").unwrap_err();
        assert!(format!("{err:#}").contains("gone.xml"));
    }
}
