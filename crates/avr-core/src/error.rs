//! Crash causes.
//!
//! Only the conditions in spec table form reach here — branch-not-taken,
//! skip-not-taken, and similar "instruction didn't do the thing" outcomes
//! are not errors and never construct a [`CoreError`].

use thiserror::Error;

/// A fatal condition that transitions the machine to [`crate::RunState::Crashed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CoreError {
    /// The 16-bit word at `pc` matched no entry in the reference decoder table.
    #[error("invalid opcode {word:#06x} at pc={pc:#06x}")]
    InvalidOpcode {
        /// Byte address of the offending word.
        pc: u32,
        /// The unmatched program word.
        word: u16,
    },

    /// A load or store addressed past `ramend`.
    #[error("data access past end of ram: addr={addr:#06x} ramend={ramend:#06x} pc={pc:#06x}")]
    RamOverrun {
        /// Byte address out of RAM.
        addr: u32,
        /// Top of RAM for the configured part.
        ramend: u32,
        /// Program counter at the time of the access.
        pc: u32,
    },

    /// A push moved the stack pointer below the I/O register space.
    #[error("stack underflow: sp={sp:#06x} pc={pc:#06x}")]
    StackUnderflow {
        /// Stack pointer value after the offending push.
        sp: u16,
        /// Program counter at the time of the push.
        pc: u32,
    },

    /// `EIJMP`/`EICALL` executed on a part with no configured `EIND`.
    #[error("{mnemonic} requires EIND, but this part has none configured")]
    MissingExtensionRegister {
        /// `"eijmp"` or `"eicall"`.
        mnemonic: &'static str,
    },

    /// Debug-only internal consistency check: the packed SREG byte and the
    /// unpacked flag vector disagreed at an instruction boundary. Never
    /// constructed in release builds; see [`crate::state::Machine::debug_check_sreg`].
    #[error("sreg mismatch: packed={packed:#04x} unpacked={unpacked:#04x} pc={pc:#06x}")]
    SregMismatch {
        /// The packed `SREG` I/O register value.
        packed: u8,
        /// `sreg[]` repacked independently for comparison.
        unpacked: u8,
        /// Program counter at the time of the check.
        pc: u32,
    },
}
