//! Fast dispatch loop (spec §4.E).
//!
//! Every step first gives the interrupt engine a chance to preempt at the
//! instruction boundary (spec §4.G), then fetches the cached micro-op for
//! `pc` — translating it through [`crate::microcode::translate`] exactly
//! once if this is the first time the address is reached — and hands it to
//! [`crate::ops::execute`]. `pc` is advanced past the instruction *before*
//! `execute` runs so relative-offset handlers in [`crate::ops::branch`] can
//! compute their target the same way real AVR hardware does (relative to
//! the already-incremented program counter).

use crate::decode::OpTag;
use crate::error::CoreError;
use crate::microcode::{self, MicroOp, UNTRANSLATED};
use crate::ops;
use crate::state::{Machine, RunState};

impl Machine {
    /// Execute exactly one instruction (or one fused micro-op), or service
    /// one pending interrupt in its place. Returns the number of cycles
    /// consumed; `0` means the machine crashed or was already in a
    /// terminal/non-running state and nothing happened.
    pub(crate) fn step_once(&mut self) -> u32 {
        if !matches!(self.run_state, RunState::Running) {
            return 0;
        }

        if let Some(cycles) = self.service_pending_interrupt() {
            self.cycle += u64::from(cycles);
            return cycles;
        }

        let pc = self.pc;
        let idx = (pc / 2) as usize;
        if idx >= self.uflash.len() {
            self.crash(CoreError::InvalidOpcode { pc, word: 0 });
            return 0;
        }

        let micro = if self.uflash[idx] == UNTRANSLATED {
            let (op, len) = microcode::translate(&self.flash, pc);
            self.uflash[idx] = op.pack();
            self.uflash_aux[idx] = len;
            op
        } else {
            let mut op = MicroOp::unpack(self.uflash[idx]);
            op.length = self.uflash_aux[idx] as u8;
            op
        };

        if micro.op == OpTag::Reserved {
            let word = self.fetch_word(pc);
            self.crash(CoreError::InvalidOpcode { pc, word });
            return 0;
        }

        self.pc = pc.wrapping_add(u32::from(micro.length));
        self.suppress_interrupt_once = false;
        let cycles = ops::execute(self, micro);
        self.cycle += u64::from(cycles);

        #[cfg(debug_assertions)]
        self.debug_check_sreg();

        cycles
    }
}
