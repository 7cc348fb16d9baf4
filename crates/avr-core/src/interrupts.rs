//! Interrupt engine (spec §4.G), grounded directly on
//! `original_source/simavr/sim/sim_interrupts.c`: a sticky pending bitset
//! gated by per-vector descriptors, lowest-vector-number priority
//! (`avr_ffsll` in the original becomes [`u64::trailing_zeros`] here), and a
//! raise that is a no-op on the pending bit if the vector is already
//! pending.
//!
//! A peripheral that never calls [`Machine::register_vector`] still gets
//! the original bare-bitset behavior (unconditional raise/clear, no enable
//! gating) — registration only matters to a peripheral that wants the
//! enable/raised/sticky-raise semantics of spec §4.G.

use crate::state::{Machine, RunState};

/// Highest vector number this table can track (fits every AVR part's
/// vector table in a `u64` bitset).
pub const MAX_VECTORS: u8 = 63;

/// One bit inside a data-space byte, the way an interrupt descriptor names
/// its enable and raised-flag locations instead of owning storage for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegBit {
    /// Data-space address of the byte.
    pub addr: u16,
    /// Bit index within that byte, 0 (LSB) to 7.
    pub bit: u8,
}

impl RegBit {
    #[must_use]
    pub fn new(addr: u16, bit: u8) -> Self {
        Self { addr, bit }
    }

    fn get(self, m: &mut Machine) -> bool {
        m.read_data(self.addr) & (1 << self.bit) != 0
    }

    fn set(self, m: &mut Machine, value: bool) {
        let byte = m.read_data(self.addr);
        let byte = if value { byte | (1 << self.bit) } else { byte & !(1 << self.bit) };
        m.write_data(self.addr, byte);
    }
}

type IrqFn = Box<dyn FnMut(&mut Machine, bool)>;

/// A registered interrupt vector's descriptor (spec §4.G's `register_vector`
/// contract): where its enable and raised flags live, whether `clear`
/// should leave the raised flag alone, and an optional notification hook
/// for an external observer (the original's `avr_raise_irq`).
pub struct VectorDescriptor {
    /// 1-indexed vector number; 0 is ignored by `register_vector`.
    pub number: u8,
    /// Bit a peripheral sets to arm this vector.
    pub enable: RegBit,
    /// Bit a peripheral exposes as "this condition has fired", distinct
    /// from `pending` (which also requires `enable`). `None` if the
    /// peripheral has no separate raised flag.
    pub raised: Option<RegBit>,
    /// If set, `clear` leaves the raised bit alone; only the peripheral's
    /// own register write clears it. If unset, `clear` clears both.
    pub sticky_raise: bool,
    /// Emit a `log::trace!` line on raise/clear; some peripherals are too
    /// noisy (timers) to trace by default.
    pub trace: bool,
    /// Notification hook, called on every `raise` regardless of `enable`.
    pub irq: Option<IrqFn>,
}

/// Sticky set of raised-but-not-yet-serviced interrupt vectors, plus the
/// optional descriptor table for vectors that registered one.
pub(crate) struct InterruptTable {
    pending: u64,
    vectors: Vec<Option<VectorDescriptor>>,
}

impl InterruptTable {
    pub(crate) fn new() -> Self {
        Self {
            pending: 0,
            vectors: (0..=MAX_VECTORS).map(|_| None).collect(),
        }
    }

    /// Raise `vector`'s pending bit. Returns `false` if it was already
    /// pending (the original's "double raise" is a no-op, not a queued
    /// second entry).
    fn raise_bit(&mut self, vector: u8) -> bool {
        let bit = 1u64 << vector;
        let already = self.pending & bit != 0;
        self.pending |= bit;
        !already
    }

    fn clear_bit(&mut self, vector: u8) {
        self.pending &= !(1u64 << vector);
    }

    /// The lowest-numbered pending vector, i.e. the next one to service.
    fn lowest_pending(&self) -> Option<u8> {
        if self.pending == 0 {
            None
        } else {
            Some(self.pending.trailing_zeros() as u8)
        }
    }

    fn any_pending(&self) -> bool {
        self.pending != 0
    }

    /// Take a vector's descriptor out of its slot so its `RegBit`/`irq`
    /// operations can run against `&mut Machine` without aliasing this
    /// table's own storage (same idiom as `state.rs`'s I/O callback
    /// dispatch).
    fn take_descriptor(&mut self, vector: u8) -> Option<VectorDescriptor> {
        self.vectors.get_mut(vector as usize)?.take()
    }

    fn put_descriptor(&mut self, vector: u8, descriptor: VectorDescriptor) {
        if let Some(slot) = self.vectors.get_mut(vector as usize) {
            *slot = Some(descriptor);
        }
    }
}

impl Machine {
    /// Install an interrupt vector descriptor (spec §4.G). Vector number 0
    /// is the reset vector and is never registered through this path.
    pub fn register_vector(&mut self, descriptor: VectorDescriptor) {
        let number = descriptor.number;
        if number == 0 {
            return;
        }
        assert!(number <= crate::interrupts::MAX_VECTORS, "vector out of range");
        self.interrupts.put_descriptor(number, descriptor);
    }

    /// Raise interrupt vector `vector` (1-indexed; vector 0 is the reset
    /// vector and is never raised through this path). A peripheral calls
    /// this from inside its own I/O write callback.
    ///
    /// If `vector` has a registered descriptor: its raised bit is set and
    /// its IRQ hook fires regardless of the enable bit, but `pending` (and
    /// therefore servicing) only arms if the enable bit reads true. An
    /// unregistered vector keeps the original bare-bitset behavior: `raise`
    /// always arms `pending`.
    pub fn raise_interrupt(&mut self, vector: u8) {
        assert!(vector > 0 && vector <= crate::interrupts::MAX_VECTORS, "vector out of range");
        match self.interrupts.take_descriptor(vector) {
            Some(mut descriptor) => {
                if let Some(raised) = descriptor.raised {
                    raised.set(self, true);
                }
                if let Some(irq) = descriptor.irq.as_mut() {
                    irq(self, true);
                }
                let enabled = descriptor.enable.get(self);
                let armed = enabled && self.interrupts.raise_bit(vector);
                if descriptor.trace {
                    log::trace!("irq raised: vector={vector} enabled={enabled} armed={armed}");
                }
                self.wake_if_armed(armed);
                self.interrupts.put_descriptor(vector, descriptor);
            }
            None => {
                if self.interrupts.raise_bit(vector) {
                    log::trace!("irq raised: vector={vector}");
                    self.wake_if_armed(true);
                }
            }
        }
    }

    fn wake_if_armed(&mut self, armed: bool) {
        if armed && self.sreg[crate::flags::SregBit::I as usize] && self.run_state == RunState::Sleeping {
            self.run_state = RunState::Running;
        }
    }

    /// Clear a pending (not-yet-serviced) interrupt, e.g. because the
    /// peripheral's flag register was written to acknowledge it before the
    /// core got to it. For a registered vector, the raised bit is left
    /// alone if `sticky_raise` is set.
    pub fn clear_interrupt(&mut self, vector: u8) {
        match self.interrupts.take_descriptor(vector) {
            Some(descriptor) => {
                self.interrupts.clear_bit(vector);
                if !descriptor.sticky_raise && let Some(raised) = descriptor.raised {
                    raised.set(self, false);
                }
                self.interrupts.put_descriptor(vector, descriptor);
            }
            None => self.interrupts.clear_bit(vector),
        }
    }

    /// Clear `vector` only if `condition` holds; spares a peripheral an
    /// `if` around every conditional acknowledge path.
    pub fn clear_interrupt_if(&mut self, vector: u8, condition: bool) {
        if condition {
            self.clear_interrupt(vector);
        }
    }

    #[must_use]
    pub fn has_pending_interrupt(&self) -> bool {
        self.interrupts.any_pending()
    }

    /// If the global interrupt flag is set and a vector is pending,
    /// perform the entry sequence: push the return address, clear `I`,
    /// jump to the vector's table slot, and consume the pending flag.
    /// Returns the number of cycles the entry sequence cost, or `None` if
    /// no interrupt was serviced this boundary.
    pub(crate) fn service_pending_interrupt(&mut self) -> Option<u32> {
        if !self.sreg[crate::flags::SregBit::I as usize] || self.suppress_interrupt_once {
            return None;
        }
        let vector = self.interrupts.lowest_pending()?;
        self.clear_interrupt(vector);
        // Stack holds the AVR's own word-addressed PC, not this crate's
        // byte-addressed `Machine::pc`.
        self.push16be((self.pc / 2) as u16);
        self.sreg[crate::flags::SregBit::I as usize] = false;
        let r_sreg = self.config.r_sreg;
        self.data[r_sreg as usize] = crate::flags::pack(&self.sreg);
        let entry_words = u32::from(self.config.vector_size);
        self.pc = u32::from(vector) * entry_words * 2;
        log::trace!("irq serviced: vector={vector} pc={:#06x}", self.pc);
        Some(4)
    }
}
