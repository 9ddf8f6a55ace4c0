//! Base storage bank: a fixed run of 32-bit words with an addressing
//! offset, publishing a change notification per mutated word.

use crate::notify::{BankKind, Notification, NotificationHub, Origin};
use crate::snapshot::BankSnapshot;
use crate::Result;
use std::rc::Rc;

/// Mask covering the low `bits` bits of a word.
pub(crate) fn mask_bits(bits: u32) -> u32 {
    if bits >= 32 {
        u32::MAX
    } else if bits == 0 {
        0
    } else {
        (1u32 << bits) - 1
    }
}

/// Fixed-length array of raw 32-bit words.
///
/// External word index `i` maps to internal slot `i - offset`; an index
/// outside `[offset, offset + len)` is a caller bug and panics. Values are
/// raw bit patterns; interpretation (signed, float, packed fields) is the
/// business of the wrapping bank.
pub struct WordBank {
    kind: BankKind,
    words: Vec<u32>,
    offset: u32,
    hub: Rc<NotificationHub>,
    origin: Origin,
}

impl WordBank {
    pub fn new(kind: BankKind, len: u32, hub: Rc<NotificationHub>) -> Self {
        let origin = hub.register_origin();
        Self {
            kind,
            words: vec![0; len as usize],
            offset: 0,
            hub,
            origin,
        }
    }

    pub fn kind(&self) -> BankKind {
        self.kind
    }

    pub fn len(&self) -> u32 {
        self.words.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// External index of internal slot 0.
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Origin under which this bank publishes its own changes.
    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn hub(&self) -> &Rc<NotificationHub> {
        &self.hub
    }

    fn slot(&self, index: u32) -> usize {
        let len = self.len();
        assert!(
            index >= self.offset && index - self.offset < len,
            "{:?} word index {} outside [{}, {})",
            self.kind,
            index,
            self.offset,
            self.offset + len,
        );
        (index - self.offset) as usize
    }

    pub fn get(&self, index: u32) -> u32 {
        self.words[self.slot(index)]
    }

    pub fn set(&mut self, index: u32, value: u32, notify: bool) {
        self.set_from(self.origin, index, value, notify);
    }

    /// Write attributed to `origin` instead of the bank itself, so the
    /// writing component does not receive its own change back.
    pub fn set_from(&mut self, origin: Origin, index: u32, value: u32, notify: bool) {
        let slot = self.slot(index);
        self.words[slot] = value;
        if notify {
            self.hub.publish(
                origin,
                &Notification::ValueChanged {
                    bank: self.kind,
                    index,
                    value,
                },
            );
        }
    }

    /// Zero every slot, one notification per slot when `notify`.
    pub fn clear(&mut self, notify: bool) {
        for slot in 0..self.len() {
            self.set(self.offset + slot, 0, notify);
        }
    }

    /// Change the addressing base. Content is untouched; callers needing
    /// clear-on-reoffset semantics layer that on top.
    pub fn set_offset(&mut self, offset: u32) {
        self.offset = offset;
    }

    /// Replace the backing store with `len` zeroed words, silently.
    pub(crate) fn reallocate(&mut self, len: u32) {
        self.words = vec![0; len as usize];
    }

    /// Publish under this bank's origin.
    pub(crate) fn publish(&self, notification: &Notification) {
        self.hub.publish(self.origin, notification);
    }

    /// Sparse dump: non-zero words keyed by external index, plus the
    /// offset when non-default. Typical sessions touch few slots, so
    /// persisted state stays small.
    pub fn serialize(&self) -> BankSnapshot {
        let mut snapshot = BankSnapshot::default();
        if self.offset != 0 {
            snapshot.offset_words = Some(self.offset);
        }
        for (slot, word) in self.words.iter().enumerate() {
            if *word != 0 {
                snapshot.insert(self.offset + slot as u32, *word);
            }
        }
        snapshot
    }

    /// Restore from a sparse dump: apply the offset (default 0), zero
    /// everything, write the recorded words, then publish one change per
    /// slot - including untouched zero slots - so observers fully resync.
    pub fn deserialize(&mut self, snapshot: &BankSnapshot) -> Result<()> {
        let entries = snapshot.word_entries()?;
        let offset = snapshot.offset_words.unwrap_or(0);
        let len = self.len();
        for (index, _) in &entries {
            if *index < offset || *index - offset >= len {
                return Err(crate::CoreError::InvalidSnapshot(format!(
                    "word index {index} outside {:?} bank [{offset}, {})",
                    self.kind,
                    offset + len,
                )));
            }
        }
        self.offset = offset;
        self.words.fill(0);
        for (index, value) in entries {
            let slot = (index - offset) as usize;
            self.words[slot] = value;
        }
        for slot in 0..self.len() {
            let index = self.offset + slot;
            self.hub.publish(
                self.origin,
                &Notification::ValueChanged {
                    bank: self.kind,
                    index,
                    value: self.words[slot as usize],
                },
            );
        }
        Ok(())
    }
}
