//! Interface to the decoded-instruction collaborator.
//!
//! Parsing and instruction semantics live outside this crate; the core
//! only needs to resolve the instruction at a word index, run its effect
//! against the machine state, and honor its breakpoint flag. A line that
//! failed to parse still occupies its slot in the stream, carrying the
//! diagnostic to show instead of an effect to run.

use crate::machine::MachineState;
use crate::notify::Diagnostic;

/// One decoded instruction slot.
pub trait Instruction {
    /// Apply this instruction's effect to the machine. Implementations
    /// mutate banks (which notify observers) and normally advance the
    /// program counter themselves.
    fn execute(&self, machine: &mut MachineState);

    /// Whether run-to-breakpoint should stop upon reaching this
    /// instruction.
    fn breakpoint(&self) -> bool {
        false
    }

    /// The parse failure carried by this slot, if its source line did not
    /// assemble. Such a slot must never be executed.
    fn parse_error(&self) -> Option<&Diagnostic> {
        None
    }
}

/// The decoded program consumed by the execution controller.
pub trait InstructionStream {
    /// Instruction at `index` (program counter divided by the instruction
    /// width), or `None` past the end of the program.
    fn instruction_at(&self, index: u32) -> Option<&dyn Instruction>;

    /// Number of instruction slots in the program.
    fn len(&self) -> u32;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
