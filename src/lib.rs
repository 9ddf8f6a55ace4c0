//! Machine-state model and execution control loop for an interactive
//! 32-bit RISC simulator with a 128-bit-per-register SIMD unit.
//!
//! The crate owns the storage abstraction (general, status, and vector
//! register banks plus byte-addressable memory), the change-notification
//! fabric keeping independent observers consistent, the persisted
//! snapshot format, and the controller that steps and runs a decoded
//! instruction stream against the machine. Parsing, instruction
//! semantics, and rendering live in the embedding application.

use thiserror::Error;

pub mod constants;
pub mod controller;
pub mod machine;
pub mod memory;
pub mod notify;
pub mod program;
pub mod registers;
pub mod snapshot;
pub mod storage;
pub mod vector;

pub use controller::{ExecutionController, RunOutcome, RunStop, StepOutcome};
pub use machine::MachineState;
pub use memory::MemoryImage;
pub use notify::{
    BankKind, Diagnostic, Notification, NotificationHub, Origin, SourceSpan,
};
pub use program::{Instruction, InstructionStream};
pub use registers::{
    parse_register, register_label, GeneralRegisters, RegisterError, StatusRegisters,
};
pub use snapshot::{BankSnapshot, MachineSnapshot};
pub use storage::WordBank;
pub use vector::{RegisterClass, VectorRegisters};

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("serialize error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("snapshot error: {0}")]
    InvalidSnapshot(String),
    #[error("register error: {0}")]
    Register(#[from] RegisterError),
}
