// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Persistent storage for clock settings.
//!
//! The clock only ever talks to the [`PersistentStorage`] trait: writes are
//! queued (fire-and-forget, drained later by a slower writer) and reads are
//! synchronous and only done at startup.

pub mod eeprom;
pub mod file;

use thiserror::Error;

pub use eeprom::{EepromImage, EEPROM_SIZE, WRITE_QUEUE_CAPACITY};
pub use file::FileStorage;

/// Fixed address slots used by the clock sources
pub mod addr {
    /// Start of the shared settings area
    pub const BASE_SPACE: u16 = 0x30;
    /// Internal clock target ticks (32-bit)
    pub const CLOCK_TICKS: u16 = BASE_SPACE + 0x06;
    /// External clock divider (8-bit)
    pub const CLOCK_DIVIDER: u16 = BASE_SPACE + 0x0A;
    /// External clock multiplier (8-bit)
    pub const CLOCK_MULTIPLIER: u16 = BASE_SPACE + 0x0B;
    /// MIDI clock divider (8-bit)
    pub const CLOCK_MIDI_DIVIDER: u16 = BASE_SPACE + 0x0C;
}

/// Storage collaborator used by `save_to_memory` / `load_from_memory`
pub trait PersistentStorage {
    /// Queue an 8-bit write; applied asynchronously
    fn queue_update8(&mut self, address: u16, value: u8);

    /// Queue a 32-bit write; applied asynchronously
    fn queue_update32(&mut self, address: u16, value: u32);

    /// Read an 8-bit value, `None` if never written or storage unavailable
    fn read8(&self, address: u16) -> Option<u8>;

    /// Read a 32-bit value, `None` if never written or storage unavailable
    fn read32(&self, address: u16) -> Option<u32>;
}

/// Errors from storage backends that touch the file system
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid storage file: {0}")]
    Format(#[from] serde_yaml::Error),

    #[error("Address {0:#04x} is outside the storage image")]
    AddressOutOfRange(u16),
}
