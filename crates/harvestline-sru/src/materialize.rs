//! One durable file per harvested record

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::parser::{RecordDocument, RecordElement};

/// Record ready to be written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestedRecord {
    pub identifier: String,
    pub raw_content: Vec<u8>,
}

impl HarvestedRecord {
    /// Build from a parsed record; `offset` is the record's absolute position in
    /// the result set and only used when the record carries no identifier.
    pub fn from_document(doc: RecordElement, offset: u64) -> Self {
        let identifier = extract_identifier(&doc).unwrap_or_else(|| {
            let synthetic = synthesize_identifier(offset);
            log::debug!("record at {offset} has no identifier, using {synthetic}");
            synthetic
        });
        Self {
            identifier,
            raw_content: doc.into_bytes(),
        }
    }
}

/// Trimmed text of the record's first `identifier` element, if non-empty.
pub fn extract_identifier(doc: &impl RecordDocument) -> Option<String> {
    doc.find_text("identifier")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// `{unix millis}_{offset}`
pub fn synthesize_identifier(offset: u64) -> String {
    format!("{}_{offset}", chrono::Utc::now().timestamp_millis())
}

/// File name for an identifier; separators and NUL become `_`.
pub fn file_name(identifier: &str) -> String {
    let stem: String = identifier
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            c => c,
        })
        .collect();
    format!("{stem}.xml")
}

/// Write `record` to `output_dir/{identifier}.xml`, replacing any previous version.
///
/// The content goes to a `.tmp` sibling first and is renamed into place, so
/// readers listing `*.xml` never see a half-written file.
pub fn materialize(record: &HarvestedRecord, output_dir: &Path) -> io::Result<PathBuf> {
    fs::create_dir_all(output_dir)?;
    let final_path = output_dir.join(file_name(&record.identifier));
    let mut tmp_name = final_path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    fs::write(&tmp_path, &record.raw_content)?;
    fs::rename(&tmp_path, &final_path)?;
    Ok(final_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Fixed(Option<&'static str>);

    impl RecordDocument for Fixed {
        fn find_text(&self, local_name: &str) -> Option<String> {
            assert_eq!(local_name, "identifier");
            self.0.map(String::from)
        }
    }

    fn record(id: &str, content: &str) -> HarvestedRecord {
        HarvestedRecord {
            identifier: id.to_string(),
            raw_content: content.as_bytes().to_vec(),
        }
    }

    #[test]
    fn identifier_present() {
        assert_eq!(extract_identifier(&Fixed(Some("  BWBR01 "))).as_deref(), Some("BWBR01"));
    }

    #[test]
    fn identifier_missing_or_blank() {
        assert_eq!(extract_identifier(&Fixed(None)), None);
        assert_eq!(extract_identifier(&Fixed(Some("   "))), None);
    }

    #[test]
    fn synthesized_identifier_ends_with_offset() {
        let id = synthesize_identifier(42);
        let (millis, offset) = id.split_once('_').unwrap();
        assert!(millis.parse::<i64>().unwrap() > 0);
        assert_eq!(offset, "42");
    }

    #[test]
    fn from_document_synthesizes_distinct_ids() {
        let a = HarvestedRecord::from_document(RecordElement::new("<recordData/>"), 10);
        let b = HarvestedRecord::from_document(RecordElement::new("<recordData/>"), 11);
        assert!(a.identifier.ends_with("_10"));
        assert!(b.identifier.ends_with("_11"));
        assert_ne!(a.identifier, b.identifier);
    }

    #[test]
    fn file_name_replaces_separators() {
        assert_eq!(file_name("BWBR0001840"), "BWBR0001840.xml");
        assert_eq!(file_name("a/b\\c:d"), "a_b_c_d.xml");
    }

    #[test]
    fn writes_file_and_creates_dir() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("data");
        let path = materialize(&record("A", "<a/>"), &out).unwrap();
        assert_eq!(path, out.join("A.xml"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "<a/>");
        assert!(!out.join("A.xml.tmp").exists());
    }

    #[test]
    fn same_identifier_overwrites() {
        let dir = TempDir::new().unwrap();
        materialize(&record("A", "first"), dir.path()).unwrap();
        materialize(&record("A", "second"), dir.path()).unwrap();

        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("A.xml")).unwrap(),
            "second"
        );
    }
}
