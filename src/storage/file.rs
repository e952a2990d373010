// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! EEPROM image persisted to a YAML file on the host.
//!
//! Used by the command line tool to keep divider and tempo settings
//! between runs.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{EepromImage, PersistentStorage, StorageError};

/// On-disk layout: only written cells are stored
#[derive(Debug, Default, Serialize, Deserialize)]
struct StorageFile {
    #[serde(default)]
    cells: BTreeMap<u16, u8>,
}

/// [`EepromImage`] backed by a file
#[derive(Debug)]
pub struct FileStorage {
    image: EepromImage,
    path: PathBuf,
}

impl FileStorage {
    /// Open the file, starting from an erased image if it does not exist yet
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let mut image = EepromImage::new();

        if path.exists() {
            let contents = fs::read_to_string(&path)?;
            let file: StorageFile = serde_yaml::from_str(&contents)?;
            for (address, value) in file.cells {
                image.write(address, &[value])?;
            }
            debug!(path = %path.display(), "loaded storage image");
        }

        Ok(Self { image, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply queued writes and save the image
    pub fn flush(&mut self) -> Result<(), StorageError> {
        self.image.flush();
        let file = StorageFile {
            cells: self.image.written_cells().collect(),
        };
        fs::write(&self.path, serde_yaml::to_string(&file)?)?;
        debug!(path = %self.path.display(), "saved storage image");
        Ok(())
    }
}

impl PersistentStorage for FileStorage {
    fn queue_update8(&mut self, address: u16, value: u8) {
        self.image.queue_update8(address, value);
    }

    fn queue_update32(&mut self, address: u16, value: u32) {
        self.image.queue_update32(address, value);
    }

    fn read8(&self, address: u16) -> Option<u8> {
        self.image.read8(address)
    }

    fn read32(&self, address: u16) -> Option<u32> {
        self.image.read32(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_starts_erased() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::open(dir.path().join("state.yaml")).unwrap();
        assert_eq!(storage.read8(0x3A), None);
    }

    #[test]
    fn test_values_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.yaml");

        let mut storage = FileStorage::open(&path).unwrap();
        storage.queue_update8(0x3A, 4);
        storage.queue_update32(0x36, 12345);
        storage.flush().unwrap();

        let reopened = FileStorage::open(&path).unwrap();
        assert_eq!(reopened.read8(0x3A), Some(4));
        assert_eq!(reopened.read32(0x36), Some(12345));
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.yaml");
        fs::write(&path, "cells: [not, a, map").unwrap();

        assert!(matches!(
            FileStorage::open(&path),
            Err(StorageError::Format(_))
        ));
    }

    #[test]
    fn test_out_of_range_cell_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.yaml");
        fs::write(&path, "cells:\n  300: 1\n").unwrap();

        assert!(matches!(
            FileStorage::open(&path),
            Err(StorageError::AddressOutOfRange(300))
        ));
    }
}
