// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! In-memory EEPROM image with a bounded write-behind queue.

use tracing::warn;

use super::{PersistentStorage, StorageError};

/// Size of the image in bytes
pub const EEPROM_SIZE: usize = 256;

/// Pending writes kept before the oldest one is forced out
pub const WRITE_QUEUE_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, Default)]
struct QueueItem {
    address: u16,
    value: u32,
    size: u8,
}

/// Byte image of a small EEPROM.
///
/// Erased cells read back as `None`. Writes go through a fixed-size ring;
/// when it is full the oldest entry is applied to make room.
#[derive(Debug, Clone)]
pub struct EepromImage {
    bytes: [u8; EEPROM_SIZE],
    written: [bool; EEPROM_SIZE],
    available: bool,
    queue: [QueueItem; WRITE_QUEUE_CAPACITY],
    queue_index: usize,
    queue_len: usize,
}

impl EepromImage {
    pub fn new() -> Self {
        Self {
            bytes: [0xFF; EEPROM_SIZE],
            written: [false; EEPROM_SIZE],
            available: true,
            queue: [QueueItem::default(); WRITE_QUEUE_CAPACITY],
            queue_index: 0,
            queue_len: 0,
        }
    }

    /// An image whose reads always fail (no chip detected)
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Number of writes waiting in the queue
    pub fn pending(&self) -> usize {
        self.queue_len
    }

    /// Apply the oldest queued write. Returns false if the queue was empty.
    pub fn process_queue(&mut self) -> bool {
        if self.queue_len == 0 {
            return false;
        }
        let item = self.queue[self.queue_index];
        self.queue_index = (self.queue_index + 1) % WRITE_QUEUE_CAPACITY;
        self.queue_len -= 1;

        let bytes = item.value.to_le_bytes();
        if let Err(e) = self.write(item.address, &bytes[..item.size as usize]) {
            warn!(address = item.address, "dropping queued write: {}", e);
        }
        true
    }

    /// Apply every queued write
    pub fn flush(&mut self) {
        while self.process_queue() {}
    }

    /// Write bytes immediately, bypassing the queue
    pub fn write(&mut self, address: u16, data: &[u8]) -> Result<(), StorageError> {
        let start = address as usize;
        let end = start + data.len();
        if end > EEPROM_SIZE {
            return Err(StorageError::AddressOutOfRange(address));
        }
        self.bytes[start..end].copy_from_slice(data);
        self.written[start..end].fill(true);
        Ok(())
    }

    /// Iterate over every written cell as (address, value)
    pub fn written_cells(&self) -> impl Iterator<Item = (u16, u8)> + '_ {
        self.bytes
            .iter()
            .zip(self.written.iter())
            .enumerate()
            .filter(|(_, (_, &written))| written)
            .map(|(addr, (&value, _))| (addr as u16, value))
    }

    fn queue_add(&mut self, item: QueueItem) {
        while self.queue_len >= WRITE_QUEUE_CAPACITY {
            self.process_queue();
        }
        let position = (self.queue_index + self.queue_len) % WRITE_QUEUE_CAPACITY;
        self.queue[position] = item;
        self.queue_len += 1;
    }

    fn read_bytes<const L: usize>(&self, address: u16) -> Option<[u8; L]> {
        if !self.available {
            return None;
        }
        let start = address as usize;
        let end = start.checked_add(L)?;
        if end > EEPROM_SIZE || !self.written[start..end].iter().all(|&w| w) {
            return None;
        }
        let mut out = [0u8; L];
        out.copy_from_slice(&self.bytes[start..end]);
        Some(out)
    }
}

impl Default for EepromImage {
    fn default() -> Self {
        Self::new()
    }
}

impl PersistentStorage for EepromImage {
    fn queue_update8(&mut self, address: u16, value: u8) {
        self.queue_add(QueueItem {
            address,
            value: value as u32,
            size: 1,
        });
    }

    fn queue_update32(&mut self, address: u16, value: u32) {
        self.queue_add(QueueItem {
            address,
            value,
            size: 4,
        });
    }

    fn read8(&self, address: u16) -> Option<u8> {
        self.read_bytes::<1>(address).map(|b| b[0])
    }

    fn read32(&self, address: u16) -> Option<u32> {
        self.read_bytes::<4>(address).map(u32::from_le_bytes)
    }
}
