//! Execution control: the fetch-simulate loop driving the machine state
//! against a decoded instruction stream.

use crate::constants::INSTRUCTION_BYTES;
use crate::machine::MachineState;
use crate::notify::{Diagnostic, Notification, NotificationHub, Origin};
use crate::program::InstructionStream;
use log::debug;
use std::rc::Rc;

/// What a single step did.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StepOutcome {
    /// The instruction ran.
    Executed,
    /// The program counter was not instruction-aligned; nothing ran.
    MisalignedPc,
    /// No instruction exists at the program counter; nothing ran.
    InvalidPc,
    /// The slot at the program counter is a parse failure; its diagnostic
    /// was published and nothing ran.
    ParseError,
}

/// Why a run loop stopped.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RunStop {
    /// The instruction at the new program counter is flagged as a
    /// breakpoint.
    Breakpoint,
    /// A step left the program counter unchanged. Not an error: the
    /// termination condition for self-loops and effects that never
    /// advance control flow.
    Stalled,
    /// The program counter ran past the last instruction.
    EndOfProgram,
    /// A step could not execute (invalid/misaligned PC or parse failure);
    /// the diagnostic was already published.
    Fault,
    /// The configured step budget was exhausted.
    StepBudget,
}

/// Result of a run command.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RunOutcome {
    pub stop: RunStop,
    pub steps: u64,
}

/// Drives single-step and run commands against a machine and an
/// instruction stream. Stateless between commands apart from the step
/// budget; diagnostics and highlight-clearing go out through the hub.
pub struct ExecutionController {
    hub: Rc<NotificationHub>,
    origin: Origin,
    /// Upper bound on steps per run command, 0 = unlimited. A second
    /// guard behind stall detection: a program whose PC keeps changing
    /// (wrapping through the program, say) never stalls.
    pub max_steps: u64,
}

impl ExecutionController {
    pub fn new(hub: Rc<NotificationHub>) -> Self {
        let origin = hub.register_origin();
        Self {
            hub,
            origin,
            max_steps: 0,
        }
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    fn report(&self, diagnostic: Diagnostic) {
        debug!("diagnostic: {}", diagnostic.message);
        self.hub
            .publish(self.origin, &Notification::Diagnostic(diagnostic));
    }

    fn clear_highlights(&self) {
        self.hub.publish(self.origin, &Notification::ClearHighlights);
    }

    /// Resolve and run the instruction under the program counter, without
    /// the end-of-program wrap.
    fn step_inner(
        &self,
        machine: &mut MachineState,
        stream: &dyn InstructionStream,
    ) -> StepOutcome {
        let pc = machine.pc();
        if pc % INSTRUCTION_BYTES != 0 {
            self.report(Diagnostic::new(format!(
                "program counter {pc:#010x} is not on an instruction boundary",
            )));
            return StepOutcome::MisalignedPc;
        }
        let index = pc / INSTRUCTION_BYTES;
        let Some(instruction) = stream.instruction_at(index) else {
            self.report(Diagnostic::new(format!(
                "no instruction at program counter {pc:#010x}",
            )));
            return StepOutcome::InvalidPc;
        };
        if let Some(error) = instruction.parse_error() {
            self.report(error.clone());
            return StepOutcome::ParseError;
        }
        instruction.execute(machine);
        StepOutcome::Executed
    }

    /// Wrap the program counter back to the first instruction once it has
    /// run off the end. Lets a free-running program loop forever instead
    /// of falling off the cliff.
    fn wrap_pc(&self, machine: &mut MachineState, stream: &dyn InstructionStream) {
        if machine.pc() / INSTRUCTION_BYTES >= stream.len() {
            machine.set_pc(0);
        }
    }

    /// Execute exactly one instruction.
    pub fn step(
        &self,
        machine: &mut MachineState,
        stream: &dyn InstructionStream,
    ) -> StepOutcome {
        self.clear_highlights();
        let outcome = self.step_inner(machine, stream);
        if outcome == StepOutcome::Executed {
            self.wrap_pc(machine, stream);
        }
        debug!("step: {:?}, pc={:#010x}", outcome, machine.pc());
        outcome
    }

    /// Step until the next breakpoint, a stall, or the end of the
    /// program.
    pub fn run_to_breakpoint(
        &self,
        machine: &mut MachineState,
        stream: &dyn InstructionStream,
    ) -> RunOutcome {
        self.clear_highlights();
        let outcome = self.run_loop(machine, stream, true);
        self.wrap_pc(machine, stream);
        debug!(
            "run-to-breakpoint: {:?} after {} steps, pc={:#010x}",
            outcome.stop,
            outcome.steps,
            machine.pc(),
        );
        outcome
    }

    /// Step until a stall or the end of the program, ignoring
    /// breakpoints.
    pub fn run_to_end(
        &self,
        machine: &mut MachineState,
        stream: &dyn InstructionStream,
    ) -> RunOutcome {
        self.clear_highlights();
        let outcome = self.run_loop(machine, stream, false);
        self.wrap_pc(machine, stream);
        debug!(
            "run-to-end: {:?} after {} steps, pc={:#010x}",
            outcome.stop,
            outcome.steps,
            machine.pc(),
        );
        outcome
    }

    fn run_loop(
        &self,
        machine: &mut MachineState,
        stream: &dyn InstructionStream,
        stop_at_breakpoint: bool,
    ) -> RunOutcome {
        let mut steps = 0u64;
        loop {
            if self.max_steps != 0 && steps >= self.max_steps {
                return RunOutcome {
                    stop: RunStop::StepBudget,
                    steps,
                };
            }
            let pc_before = machine.pc();
            if self.step_inner(machine, stream) != StepOutcome::Executed {
                return RunOutcome {
                    stop: RunStop::Fault,
                    steps,
                };
            }
            steps += 1;
            let pc_after = machine.pc();
            if pc_after == pc_before {
                return RunOutcome {
                    stop: RunStop::Stalled,
                    steps,
                };
            }
            if pc_after % INSTRUCTION_BYTES == 0 {
                match stream.instruction_at(pc_after / INSTRUCTION_BYTES) {
                    None => {
                        return RunOutcome {
                            stop: RunStop::EndOfProgram,
                            steps,
                        }
                    }
                    Some(next) if stop_at_breakpoint && next.breakpoint() => {
                        return RunOutcome {
                            stop: RunStop::Breakpoint,
                            steps,
                        }
                    }
                    Some(_) => {}
                }
            }
        }
    }

    /// Rewind execution to the first instruction; registers and memory
    /// keep their contents.
    pub fn reset_execution(&self, machine: &mut MachineState) {
        self.clear_highlights();
        machine.set_pc(0);
        debug!("execution reset");
    }

    /// Clear the whole machine back to power-on defaults.
    pub fn reset_machine(&self, machine: &mut MachineState) {
        self.clear_highlights();
        machine.reset();
    }
}
