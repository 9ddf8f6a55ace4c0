//! Byte-addressable memory over a resizable, relocatable word bank.
//!
//! Words are little-endian: byte 0 of a word is its least significant
//! byte, so byte address `4w + b` selects byte `b` of word `w`. An access
//! that is not word-aligned straddles two adjacent words; reads and
//! writes recombine/scatter through a 64-bit window over that word pair,
//! keeping the byte order identical in both directions.

use crate::constants::{DEFAULT_MEMORY_WORDS, WORD_BYTES};
use crate::notify::{BankKind, Notification, NotificationHub, Origin};
use crate::snapshot::BankSnapshot;
use crate::storage::{mask_bits, WordBank};
use crate::Result;
use std::rc::Rc;

pub struct MemoryImage {
    bank: WordBank,
}

impl MemoryImage {
    pub fn new(hub: Rc<NotificationHub>) -> Self {
        Self::with_size(hub, DEFAULT_MEMORY_WORDS)
    }

    pub fn with_size(hub: Rc<NotificationHub>, size_words: u32) -> Self {
        Self {
            bank: WordBank::new(BankKind::Memory, size_words, hub),
        }
    }

    pub fn size_words(&self) -> u32 {
        self.bank.len()
    }

    pub fn offset_words(&self) -> u32 {
        self.bank.offset()
    }

    /// Aligned word access by external word index.
    pub fn word(&self, word_index: u32) -> u32 {
        self.bank.get(word_index)
    }

    pub fn set_word(&mut self, word_index: u32, value: u32, notify: bool) {
        self.bank.set(word_index, value, notify);
    }

    pub fn set_word_from(&mut self, origin: Origin, word_index: u32, value: u32, notify: bool) {
        self.bank.set_from(origin, word_index, value, notify);
    }

    /// Read the 32-bit value at an arbitrary byte address, straddling two
    /// words when unaligned.
    pub fn read_word(&self, byte_addr: u32) -> u32 {
        let word_index = byte_addr / WORD_BYTES;
        let misalign = byte_addr % WORD_BYTES;
        if misalign == 0 {
            return self.bank.get(word_index);
        }
        let window = u64::from(self.bank.get(word_index))
            | (u64::from(self.bank.get(word_index + 1)) << 32);
        (window >> (8 * misalign)) as u32
    }

    /// Write a 32-bit value at an arbitrary byte address. Unaligned writes
    /// read-modify-write both straddled words; bytes outside the written
    /// span are untouched. Always notifies.
    pub fn write_word(&mut self, byte_addr: u32, value: u32) {
        let word_index = byte_addr / WORD_BYTES;
        let misalign = byte_addr % WORD_BYTES;
        if misalign == 0 {
            self.bank.set(word_index, value, true);
            return;
        }
        let mut window = u64::from(self.bank.get(word_index))
            | (u64::from(self.bank.get(word_index + 1)) << 32);
        let mask = 0xFFFF_FFFFu64 << (8 * misalign);
        window = (window & !mask) | (u64::from(value) << (8 * misalign));
        self.bank.set(word_index, window as u32, true);
        self.bank.set(word_index + 1, (window >> 32) as u32, true);
    }

    /// Read only the low `width_bits` of the value at `byte_addr`.
    pub fn read_value(&self, byte_addr: u32, width_bits: u32) -> u32 {
        self.read_word(byte_addr) & mask_bits(width_bits)
    }

    /// Update only the low `width_bits` at `byte_addr`, masking the rest.
    pub fn write_value(&mut self, byte_addr: u32, width_bits: u32, value: u32) {
        let mask = mask_bits(width_bits);
        let current = self.read_word(byte_addr);
        self.write_word(byte_addr, (current & !mask) | (value & mask));
    }

    /// Single byte access, a common case of `read_value`/`write_value`.
    pub fn read_byte(&self, byte_addr: u32) -> u8 {
        self.read_value(byte_addr, 8) as u8
    }

    pub fn write_byte(&mut self, byte_addr: u32, value: u8) {
        self.write_value(byte_addr, 8, u32::from(value));
    }

    fn publish_settings(&self) {
        self.bank.publish(&Notification::SettingsChanged {
            bank: BankKind::Memory,
            size_words: self.size_words(),
            offset_words: self.offset_words(),
        });
    }

    /// Resize to `size_words`. A no-op when the size is unchanged;
    /// otherwise the content is reallocated all-zero, the new geometry is
    /// announced first (when `notify_settings`), then the cleared slots
    /// are published (when `notify_clear`).
    pub fn resize(&mut self, size_words: u32, notify_settings: bool, notify_clear: bool) {
        if size_words == self.size_words() {
            return;
        }
        self.bank.reallocate(size_words);
        if notify_settings {
            self.publish_settings();
        }
        if notify_clear {
            self.bank.clear(true);
        }
    }

    /// Move the addressing base. Content is cleared; observers get a
    /// settings notification so they can drop cached views rather than
    /// reinterpret stale data.
    pub fn set_offset(&mut self, offset_words: u32, notify_settings: bool, notify_clear: bool) {
        self.bank.set_offset(offset_words);
        self.bank.reallocate(self.size_words());
        if notify_settings {
            self.publish_settings();
        }
        if notify_clear {
            self.bank.clear(true);
        }
    }

    pub fn clear(&mut self, notify: bool) {
        self.bank.clear(notify);
    }

    pub fn origin(&self) -> Origin {
        self.bank.origin()
    }

    /// Sparse dump plus `sizeW` when the bank is not the default size.
    pub fn serialize(&self) -> BankSnapshot {
        let mut snapshot = self.bank.serialize();
        if self.size_words() != DEFAULT_MEMORY_WORDS {
            snapshot.size_words = Some(self.size_words());
        }
        snapshot
    }

    /// Restore geometry and content. Announces the (possibly changed)
    /// geometry before the per-slot resync that `WordBank::deserialize`
    /// performs.
    pub fn deserialize(&mut self, snapshot: &BankSnapshot) -> Result<()> {
        let size = snapshot.size_words.unwrap_or(DEFAULT_MEMORY_WORDS);
        let offset = snapshot.offset_words.unwrap_or(0);
        for (index, _) in snapshot.word_entries()? {
            if index < offset || index - offset >= size {
                return Err(crate::CoreError::InvalidSnapshot(format!(
                    "word index {index} outside memory bank [{offset}, {})",
                    offset + size,
                )));
            }
        }
        if size != self.size_words() {
            self.bank.reallocate(size);
        }
        self.bank.set_offset(offset);
        self.publish_settings();
        self.bank.deserialize(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NotificationHub;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn memory_with_recorder() -> (MemoryImage, Rc<RefCell<Vec<Notification>>>) {
        let hub = NotificationHub::new();
        let memory = MemoryImage::new(Rc::clone(&hub));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let observer = hub.register_origin();
        hub.subscribe(observer, move |_, notification| {
            sink.borrow_mut().push(notification.clone());
        });
        (memory, seen)
    }

    #[test]
    fn aligned_word_round_trip() {
        let (mut memory, _) = memory_with_recorder();
        memory.write_word(8, 0x1234_5678);
        assert_eq!(memory.read_word(8), 0x1234_5678);
        assert_eq!(memory.word(2), 0x1234_5678);
    }

    #[test]
    fn unaligned_word_straddles_two_words() {
        let (mut memory, _) = memory_with_recorder();
        memory.write_word(2, 0xAABB_CCDD);
        assert_eq!(memory.read_word(2), 0xAABB_CCDD);
        // low half lands in the top bytes of word 0, high half in word 1
        assert_eq!(memory.word(0), 0xCCDD_0000);
        assert_eq!(memory.word(1), 0x0000_AABB);
    }

    #[test]
    fn unaligned_write_preserves_bytes_outside_span() {
        let (mut memory, _) = memory_with_recorder();
        memory.set_word(0, 0x1111_1111, false);
        memory.set_word(1, 0x2222_2222, false);
        memory.write_word(1, 0xAABB_CCDD);
        assert_eq!(memory.word(0), 0xBBCC_DD11);
        assert_eq!(memory.word(1), 0x2222_22AA);
    }

    #[test]
    fn every_width_and_misalignment_round_trips() {
        let (mut memory, _) = memory_with_recorder();
        for addr in 0..8u32 {
            for width in [8, 16, 24, 32] {
                let value = (0x89AB_CDEF ^ addr) & mask_bits(width);
                memory.write_value(addr, width, value);
                assert_eq!(
                    memory.read_value(addr, width),
                    value,
                    "addr {addr} width {width}",
                );
            }
        }
    }

    #[test]
    fn byte_write_at_offset_one_lands_in_second_byte() {
        let (mut memory, _) = memory_with_recorder();
        memory.write_value(1, 8, 0xAB);
        assert_eq!(memory.read_word(0), 0x0000_AB00);
        assert_eq!(memory.read_byte(0), 0);
        assert_eq!(memory.read_byte(1), 0xAB);
        assert_eq!(memory.read_byte(2), 0);
        assert_eq!(memory.read_byte(3), 0);
    }

    #[test]
    fn narrow_write_keeps_high_bits() {
        let (mut memory, _) = memory_with_recorder();
        memory.write_word(0, 0xFFFF_FFFF);
        memory.write_value(0, 8, 0x12);
        assert_eq!(memory.read_word(0), 0xFFFF_FF12);
    }

    #[test]
    fn resize_to_same_size_is_silent() {
        let (mut memory, seen) = memory_with_recorder();
        memory.write_word(0, 7);
        seen.borrow_mut().clear();
        memory.resize(DEFAULT_MEMORY_WORDS, true, true);
        assert!(seen.borrow().is_empty());
        assert_eq!(memory.read_word(0), 7);
    }

    #[test]
    fn resize_announces_settings_before_clearing() {
        let (mut memory, seen) = memory_with_recorder();
        memory.write_word(0, 7);
        seen.borrow_mut().clear();
        memory.resize(8, true, true);
        let seen = seen.borrow();
        assert_eq!(
            seen[0],
            Notification::SettingsChanged {
                bank: BankKind::Memory,
                size_words: 8,
                offset_words: 0,
            }
        );
        // 8 cleared slots follow
        assert_eq!(seen.len(), 9);
        assert_eq!(memory.read_word(0), 0);
    }

    #[test]
    fn reoffset_clears_and_rebases() {
        let (mut memory, seen) = memory_with_recorder();
        memory.write_word(0, 7);
        seen.borrow_mut().clear();
        memory.set_offset(16, true, false);
        assert_eq!(memory.offset_words(), 16);
        assert_eq!(memory.word(16), 0);
        assert_eq!(
            seen.borrow()[0],
            Notification::SettingsChanged {
                bank: BankKind::Memory,
                size_words: DEFAULT_MEMORY_WORDS,
                offset_words: 16,
            }
        );
    }

    #[test]
    fn serialize_includes_size_only_when_nondefault() {
        let (mut memory, _) = memory_with_recorder();
        memory.write_word(4, 9);
        assert_eq!(memory.serialize().size_words, None);
        memory.resize(64, false, false);
        memory.write_word(4, 9);
        let snapshot = memory.serialize();
        assert_eq!(snapshot.size_words, Some(64));
        assert_eq!(snapshot.word_entries().unwrap(), vec![(1, 9)]);
    }

    #[test]
    fn deserialize_restores_geometry_and_content() {
        let (mut memory, _) = memory_with_recorder();
        memory.resize(64, false, false);
        memory.set_offset(8, false, false);
        memory.write_word(4 * 8, 0x55);
        let snapshot = memory.serialize();

        let (mut restored, seen) = memory_with_recorder();
        restored.deserialize(&snapshot).unwrap();
        assert_eq!(restored.size_words(), 64);
        assert_eq!(restored.offset_words(), 8);
        assert_eq!(restored.word(8), 0x55);
        // settings announcement plus one resync per slot
        assert_eq!(seen.borrow().len(), 65);
    }

    #[test]
    fn deserialize_of_default_snapshot_restores_defaults() {
        let (mut memory, _) = memory_with_recorder();
        memory.resize(64, false, false);
        memory.write_word(0, 3);
        memory.deserialize(&BankSnapshot::default()).unwrap();
        assert_eq!(memory.size_words(), DEFAULT_MEMORY_WORDS);
        assert_eq!(memory.offset_words(), 0);
        assert_eq!(memory.read_word(0), 0);
    }
}
