//! Bit-exact AVR instruction decoder, micro-op translation cache, and
//! interrupt/cycle-timer scheduler.
//!
//! This crate owns three things: [`decode`] (the reference bit-pattern
//! decoder AVR Studio-grade tools would call a disassembler), [`microcode`]
//! and [`ops`] (the fast-path translate-once dispatcher, with an advisory
//! instruction-fusion pass), and [`interrupts`]/[`scheduler`] (the
//! vector-priority interrupt table and cycle-timer min-heap a host drives
//! via [`state::Machine::run_many`]). It does not know how to load an ELF,
//! does not implement any specific part's peripherals, and never touches a
//! thread or a clock — a host supplies flash images and peripheral
//! callbacks and drives the clock itself.

mod decode;
mod dispatch;
mod error;
mod flags;
mod interrupts;
mod memory;
mod microcode;
mod ops;
mod scheduler;
mod state;

pub use decode::{decode_reference, Decoded, OpTag, Operands};
pub use error::CoreError;
pub use interrupts::{RegBit, VectorDescriptor, MAX_VECTORS};
pub use state::{Machine, MachineConfig, RunState, MAX_IO, NUM_REGISTERS};
