//! General-purpose and status register banks.

use crate::constants::{
    APPLICATION_STATUS_INDEX, FP_STATUS_INDEX, GENERAL_REGISTER_COUNT, LR_INDEX, PC_INDEX,
    SP_INDEX, STATUS_REGISTER_COUNT,
};
use crate::notify::{BankKind, Notification, NotificationHub, Origin};
use crate::snapshot::BankSnapshot;
use crate::storage::WordBank;
use crate::Result;
use std::rc::Rc;

/// Errors surfaced while parsing register names.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum RegisterError {
    #[error("unknown register '{0}'")]
    UnknownRegister(String),
    #[error("register index {0} is out of range")]
    InvalidIndex(u32),
}

/// Parse a register name (`R0`..`R15`, or the aliases `SP`, `LR`, `PC`)
/// into its bank index.
pub fn parse_register(name: &str) -> std::result::Result<u32, RegisterError> {
    match name.to_ascii_uppercase().as_str() {
        "SP" => Ok(SP_INDEX),
        "LR" => Ok(LR_INDEX),
        "PC" => Ok(PC_INDEX),
        other => {
            let index: u32 = other
                .strip_prefix('R')
                .and_then(|rest| rest.parse().ok())
                .ok_or_else(|| RegisterError::UnknownRegister(other.into()))?;
            if index < GENERAL_REGISTER_COUNT {
                Ok(index)
            } else {
                Err(RegisterError::InvalidIndex(index))
            }
        }
    }
}

/// Canonical display name for a register index.
pub fn register_label(index: u32) -> String {
    match index {
        SP_INDEX => "SP".to_string(),
        LR_INDEX => "LR".to_string(),
        PC_INDEX => "PC".to_string(),
        other => format!("R{other}"),
    }
}

/// The sixteen general-purpose registers. Register 15 is the program
/// counter: any notifying write to it also publishes a `PcChanged`
/// notification on top of the generic value change.
pub struct GeneralRegisters {
    bank: WordBank,
}

impl GeneralRegisters {
    pub fn new(hub: Rc<NotificationHub>) -> Self {
        Self {
            bank: WordBank::new(BankKind::General, GENERAL_REGISTER_COUNT, hub),
        }
    }

    pub fn get(&self, index: u32) -> u32 {
        self.bank.get(index)
    }

    pub fn set(&mut self, index: u32, value: u32, notify: bool) {
        self.set_from(self.bank.origin(), index, value, notify);
    }

    /// Write attributed to an external component (a view edit); the
    /// component does not hear its own change back.
    pub fn set_from(&mut self, origin: Origin, index: u32, value: u32, notify: bool) {
        self.bank.set_from(origin, index, value, notify);
        if index == PC_INDEX && notify {
            self.bank
                .hub()
                .publish(origin, &Notification::PcChanged { value });
        }
    }

    pub fn get_by_name(&self, name: &str) -> std::result::Result<u32, RegisterError> {
        parse_register(name).map(|index| self.get(index))
    }

    pub fn set_by_name(
        &mut self,
        name: &str,
        value: u32,
        notify: bool,
    ) -> std::result::Result<(), RegisterError> {
        let index = parse_register(name)?;
        self.set(index, value, notify);
        Ok(())
    }

    pub fn pc(&self) -> u32 {
        self.bank.get(PC_INDEX)
    }

    pub fn set_pc(&mut self, value: u32) {
        self.set(PC_INDEX, value, true);
    }

    pub fn clear(&mut self, notify: bool) {
        self.bank.clear(notify);
    }

    pub fn origin(&self) -> Origin {
        self.bank.origin()
    }

    pub fn serialize(&self) -> BankSnapshot {
        self.bank.serialize()
    }

    pub fn deserialize(&mut self, snapshot: &BankSnapshot) -> Result<()> {
        self.bank.deserialize(snapshot)?;
        // observers tracking the PC need the post-load value too
        self.bank.publish(&Notification::PcChanged { value: self.pc() });
        Ok(())
    }
}

/// The two status words: application status and floating-point
/// status/control.
pub struct StatusRegisters {
    bank: WordBank,
}

impl StatusRegisters {
    pub fn new(hub: Rc<NotificationHub>) -> Self {
        Self {
            bank: WordBank::new(BankKind::Status, STATUS_REGISTER_COUNT, hub),
        }
    }

    pub fn get(&self, index: u32) -> u32 {
        self.bank.get(index)
    }

    pub fn set(&mut self, index: u32, value: u32, notify: bool) {
        self.bank.set(index, value, notify);
    }

    pub fn set_from(&mut self, origin: Origin, index: u32, value: u32, notify: bool) {
        self.bank.set_from(origin, index, value, notify);
    }

    pub fn application_status(&self) -> u32 {
        self.bank.get(APPLICATION_STATUS_INDEX)
    }

    pub fn set_application_status(&mut self, value: u32, notify: bool) {
        self.bank.set(APPLICATION_STATUS_INDEX, value, notify);
    }

    pub fn fp_status(&self) -> u32 {
        self.bank.get(FP_STATUS_INDEX)
    }

    pub fn set_fp_status(&mut self, value: u32, notify: bool) {
        self.bank.set(FP_STATUS_INDEX, value, notify);
    }

    /// True when any status word holds a non-zero value; the snapshot
    /// omits this bank otherwise.
    pub fn any_nonzero(&self) -> bool {
        (0..STATUS_REGISTER_COUNT).any(|index| self.bank.get(index) != 0)
    }

    pub fn clear(&mut self, notify: bool) {
        self.bank.clear(notify);
    }

    pub fn origin(&self) -> Origin {
        self.bank.origin()
    }

    pub fn serialize(&self) -> BankSnapshot {
        self.bank.serialize()
    }

    pub fn deserialize(&mut self, snapshot: &BankSnapshot) -> Result<()> {
        self.bank.deserialize(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NotificationHub;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn registers_with_recorder() -> (GeneralRegisters, Rc<RefCell<Vec<Notification>>>) {
        let hub = NotificationHub::new();
        let regs = GeneralRegisters::new(Rc::clone(&hub));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let observer = hub.register_origin();
        hub.subscribe(observer, move |_, notification| {
            sink.borrow_mut().push(notification.clone());
        });
        (regs, seen)
    }

    #[test]
    fn pc_write_fires_both_notifications() {
        let (mut regs, seen) = registers_with_recorder();
        regs.set(15, 8, true);
        let seen = seen.borrow();
        assert!(seen.contains(&Notification::ValueChanged {
            bank: BankKind::General,
            index: 15,
            value: 8,
        }));
        assert!(seen.contains(&Notification::PcChanged { value: 8 }));
    }

    #[test]
    fn non_pc_write_fires_only_value_change() {
        let (mut regs, seen) = registers_with_recorder();
        regs.set(3, 8, true);
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn silent_pc_write_fires_nothing() {
        let (mut regs, seen) = registers_with_recorder();
        regs.set(15, 8, false);
        assert!(seen.borrow().is_empty());
        assert_eq!(regs.pc(), 8);
    }

    #[test]
    fn register_names_parse_with_aliases() {
        assert_eq!(parse_register("r0").unwrap(), 0);
        assert_eq!(parse_register("R12").unwrap(), 12);
        assert_eq!(parse_register("sp").unwrap(), 13);
        assert_eq!(parse_register("LR").unwrap(), 14);
        assert_eq!(parse_register("pc").unwrap(), 15);
        assert_eq!(
            parse_register("R16"),
            Err(RegisterError::InvalidIndex(16))
        );
        assert!(matches!(
            parse_register("Q3"),
            Err(RegisterError::UnknownRegister(_))
        ));
    }

    #[test]
    fn labels_use_aliases_for_special_slots() {
        assert_eq!(register_label(4), "R4");
        assert_eq!(register_label(13), "SP");
        assert_eq!(register_label(14), "LR");
        assert_eq!(register_label(15), "PC");
    }

    #[test]
    fn deserialize_republishes_pc() {
        let (mut regs, _) = registers_with_recorder();
        regs.set(15, 20, false);
        let snapshot = regs.serialize();

        let (mut restored, seen) = registers_with_recorder();
        restored.deserialize(&snapshot).unwrap();
        assert_eq!(restored.pc(), 20);
        assert!(seen
            .borrow()
            .contains(&Notification::PcChanged { value: 20 }));
        // 16 per-slot resyncs plus the PC publication
        assert_eq!(seen.borrow().len(), 17);
    }

    #[test]
    fn status_bank_tracks_nonzero() {
        let hub = NotificationHub::new();
        let mut status = StatusRegisters::new(hub);
        assert!(!status.any_nonzero());
        status.set_fp_status(0x0300_0000, false);
        assert!(status.any_nonzero());
        assert_eq!(status.fp_status(), 0x0300_0000);
        assert_eq!(status.application_status(), 0);
        status.clear(false);
        assert!(!status.any_nonzero());
    }

    #[test]
    fn named_access_round_trips() {
        let (mut regs, _) = registers_with_recorder();
        regs.set_by_name("lr", 0x8000, false).unwrap();
        assert_eq!(regs.get_by_name("R14").unwrap(), 0x8000);
        assert!(regs.set_by_name("R99", 1, false).is_err());
    }
}
