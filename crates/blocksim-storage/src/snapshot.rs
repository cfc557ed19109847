//! Versioned occupancy snapshots
//!
//! On-disk format (JSON):
//!
//! ```text
//! { "version": 1, "total_blocks": N, "occupied": [bool; N] }
//! ```
//!
//! Owners are not part of the snapshot. They are rebuilt by replaying each
//! file's block list after the bitmap has been restored.

use blocksim_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Point-in-time copy of the occupancy bitmap
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskSnapshot {
    /// Format version
    pub version: u32,
    /// Number of blocks covered
    pub total_blocks: u64,
    /// One flag per block, `true` = used
    pub occupied: Vec<bool>,
}

impl DiskSnapshot {
    /// Create a current-version snapshot from occupancy flags
    #[must_use]
    pub fn new(occupied: Vec<bool>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            total_blocks: occupied.len() as u64,
            occupied,
        }
    }

    /// Number of used blocks recorded
    #[must_use]
    pub fn used_count(&self) -> u64 {
        self.occupied.iter().filter(|used| **used).count() as u64
    }

    /// Check version and length consistency
    pub fn validate(&self) -> Result<()> {
        if self.version != SNAPSHOT_VERSION {
            return Err(Error::snapshot(format!(
                "unsupported snapshot version {} (expected {})",
                self.version, SNAPSHOT_VERSION
            )));
        }
        if self.occupied.len() as u64 != self.total_blocks {
            return Err(Error::snapshot(format!(
                "snapshot declares {} blocks but carries {} flags",
                self.total_blocks,
                self.occupied.len()
            )));
        }
        Ok(())
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Parse and validate JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Self =
            serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Write the snapshot, replacing any previous one at `path`
    ///
    /// The data goes to a sibling temporary file first and is renamed into
    /// place, so a reader sees either the old or the new snapshot.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, self.to_json()?)?;
        fs::rename(&tmp, path)?;

        debug!(path = %path.display(), blocks = self.total_blocks, "saved disk snapshot");
        Ok(())
    }

    /// Read a snapshot from `path`
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path.as_ref())?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_json_shape() {
        let snapshot = DiskSnapshot::new(vec![true, false, true]);
        let json = snapshot.to_json().unwrap();
        assert_eq!(
            json,
            r#"{"version":1,"total_blocks":3,"occupied":[true,false,true]}"#
        );
        assert_eq!(snapshot.used_count(), 2);
    }

    #[test]
    fn test_snapshot_rejects_inconsistent_length() {
        let json = r#"{"version":1,"total_blocks":4,"occupied":[true,false]}"#;
        assert!(matches!(
            DiskSnapshot::from_json(json),
            Err(Error::Snapshot(_))
        ));
    }

    #[test]
    fn test_snapshot_rejects_unknown_version() {
        let json = r#"{"version":9,"total_blocks":1,"occupied":[false]}"#;
        assert!(matches!(
            DiskSnapshot::from_json(json),
            Err(Error::Snapshot(_))
        ));
    }

    #[test]
    fn test_snapshot_rejects_bare_array() {
        // Unversioned boolean arrays are not accepted
        assert!(matches!(
            DiskSnapshot::from_json("[true,false]"),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn test_snapshot_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("disk.json");

        let snapshot = DiskSnapshot::new(vec![false, true, true, false, true]);
        snapshot.save(&path).unwrap();

        let loaded = DiskSnapshot::load(&path).unwrap();
        assert_eq!(loaded, snapshot);

        // Overwrite keeps only the latest
        let newer = DiskSnapshot::new(vec![false; 5]);
        newer.save(&path).unwrap();
        assert_eq!(DiskSnapshot::load(&path).unwrap().used_count(), 0);
    }

    #[test]
    fn test_snapshot_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = DiskSnapshot::load(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
