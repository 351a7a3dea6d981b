//! Ingestion manifest - per-file fingerprints for incremental ingestion

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Size, modification time and content hash of a source file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileFingerprint {
    pub size: u64,
    /// Seconds since the Unix epoch
    pub mtime: f64,
    pub sha256: String,
}

/// Fingerprint a file, hashing it in 8 KiB blocks
pub fn file_fingerprint(path: &Path) -> Result<FileFingerprint> {
    let stat = std::fs::metadata(path)?;
    let mtime = stat
        .modified()?
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);

    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(FileFingerprint {
        size: stat.len(),
        mtime,
        sha256: format!("{:x}", hasher.finalize()),
    })
}

/// document id -> fingerprint of the file it was ingested from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    files: BTreeMap<String, FileFingerprint>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a manifest, treating a missing file as empty
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| Error::CorruptIndex(format!("manifest.json: {}", e)))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Whether `document_id` was ingested from content with this fingerprint.
    /// Content hash and size decide; mtime alone never forces re-ingestion.
    pub fn is_unchanged(&self, document_id: &str, fingerprint: &FileFingerprint) -> bool {
        self.files
            .get(document_id)
            .is_some_and(|f| f.sha256 == fingerprint.sha256 && f.size == fingerprint.size)
    }

    pub fn record(&mut self, document_id: &str, fingerprint: FileFingerprint) {
        self.files.insert(document_id.to_string(), fingerprint);
    }

    pub fn forget(&mut self, document_id: &str) -> Option<FileFingerprint> {
        self.files.remove(document_id)
    }

    pub fn get(&self, document_id: &str) -> Option<&FileFingerprint> {
        self.files.get(document_id)
    }

    /// Recorded document ids, ascending
    pub fn document_ids(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_known_hash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.txt");
        std::fs::write(&path, "abc").unwrap();

        let fp = file_fingerprint(&path).unwrap();
        assert_eq!(fp.size, 3);
        assert_eq!(
            fp.sha256,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert!(fp.mtime > 0.0);
    }

    #[test]
    fn test_unchanged_ignores_mtime() {
        let fp = FileFingerprint { size: 3, mtime: 1.0, sha256: "x".into() };
        let mut manifest = Manifest::new();
        manifest.record("a.txt", fp.clone());

        assert!(manifest.is_unchanged("a.txt", &FileFingerprint { mtime: 99.0, ..fp.clone() }));
        assert!(!manifest.is_unchanged("a.txt", &FileFingerprint { sha256: "y".into(), ..fp.clone() }));
        assert!(!manifest.is_unchanged("b.txt", &fp));
    }

    #[test]
    fn test_manifest_roundtrip_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        assert!(Manifest::load(&path).unwrap().is_empty());

        let mut manifest = Manifest::new();
        manifest.record("a.txt", FileFingerprint { size: 1, mtime: 2.5, sha256: "h".into() });
        manifest.save(&path).unwrap();

        let loaded = Manifest::load(&path).unwrap();
        assert_eq!(loaded, manifest);
        assert_eq!(loaded.document_ids().collect::<Vec<_>>(), vec!["a.txt"]);
    }
}
