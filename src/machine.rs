//! Aggregate machine state: the four banks plus machine-level signals.

use crate::constants::INSTRUCTION_BYTES;
use crate::memory::MemoryImage;
use crate::notify::{BankKind, Notification, NotificationHub, Origin};
use crate::registers::{GeneralRegisters, StatusRegisters};
use crate::snapshot::{BankSnapshot, MachineSnapshot};
use crate::vector::VectorRegisters;
use crate::Result;
use log::debug;
use std::rc::Rc;

/// One simulation session's storage: general, status, and vector
/// registers plus memory, all publishing through one shared hub.
///
/// Created once per session; instruction effects and controller commands
/// borrow it mutably, observers subscribe read-only on the hub.
pub struct MachineState {
    hub: Rc<NotificationHub>,
    origin: Origin,
    pub general: GeneralRegisters,
    pub status: StatusRegisters,
    pub vector: VectorRegisters,
    pub memory: MemoryImage,
}

impl MachineState {
    pub fn new() -> Self {
        Self::with_hub(NotificationHub::new())
    }

    pub fn with_hub(hub: Rc<NotificationHub>) -> Self {
        let origin = hub.register_origin();
        Self {
            general: GeneralRegisters::new(Rc::clone(&hub)),
            status: StatusRegisters::new(Rc::clone(&hub)),
            vector: VectorRegisters::new(Rc::clone(&hub)),
            memory: MemoryImage::new(Rc::clone(&hub)),
            hub,
            origin,
        }
    }

    pub fn hub(&self) -> &Rc<NotificationHub> {
        &self.hub
    }

    pub fn pc(&self) -> u32 {
        self.general.pc()
    }

    /// Set the program counter, always notifying, so highlighting reacts
    /// even to programmatic jumps.
    pub fn set_pc(&mut self, value: u32) {
        self.general.set_pc(value);
    }

    /// Move the program counter past the current instruction.
    pub fn advance_pc(&mut self) {
        let value = self.pc().wrapping_add(INSTRUCTION_BYTES);
        self.set_pc(value);
    }

    /// Ask observers to highlight one register slot.
    pub fn highlight_register(&self, bank: BankKind, index: u32) {
        self.hub
            .publish(self.origin, &Notification::HighlightRegister { bank, index });
    }

    /// Ask observers to highlight a byte range of memory.
    pub fn highlight_memory(&self, byte_addr: u32, byte_len: u32) {
        self.hub.publish(
            self.origin,
            &Notification::HighlightMemory {
                byte_addr,
                byte_len,
            },
        );
    }

    /// Drop all transient highlights.
    pub fn clear_highlights(&self) {
        self.hub.publish(self.origin, &Notification::ClearHighlights);
    }

    /// Build the persisted shape of the whole machine. The status bank is
    /// included only when it holds something non-zero.
    pub fn snapshot(&self) -> MachineSnapshot {
        MachineSnapshot {
            arm: Some(self.general.serialize()),
            memory: Some(self.memory.serialize()),
            neon: Some(self.vector.serialize()),
            spec: if self.status.any_nonzero() {
                Some(self.status.serialize())
            } else {
                None
            },
        }
    }

    /// Restore the whole machine. A bank absent from the snapshot is
    /// cleared back to its defaults; every slot of every bank republishes
    /// so observers fully resynchronize.
    pub fn restore(&mut self, snapshot: &MachineSnapshot) -> Result<()> {
        let empty = BankSnapshot::default();
        self.general
            .deserialize(snapshot.arm.as_ref().unwrap_or(&empty))?;
        self.memory
            .deserialize(snapshot.memory.as_ref().unwrap_or(&empty))?;
        self.vector
            .deserialize(snapshot.neon.as_ref().unwrap_or(&empty))?;
        self.status
            .deserialize(snapshot.spec.as_ref().unwrap_or(&empty))?;
        debug!("machine state restored, pc={:#010x}", self.pc());
        Ok(())
    }

    /// Clear every bank to its defaults (memory back to its default
    /// geometry) and the program counter to zero.
    pub fn reset(&mut self) {
        debug!("machine reset");
        self.restore(&MachineSnapshot::default())
            .expect("restoring the default snapshot cannot fail");
    }

    pub fn to_json(&self) -> Result<String> {
        self.snapshot().to_json()
    }

    pub fn restore_json(&mut self, text: &str) -> Result<()> {
        let snapshot = MachineSnapshot::from_json(text)?;
        self.restore(&snapshot)
    }
}

impl Default for MachineState {
    fn default() -> Self {
        Self::new()
    }
}
