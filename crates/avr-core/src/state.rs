//! The machine: one owned aggregate holding every byte of simulated state.
//!
//! A single struct the dispatcher takes `&mut`, the same shape other 8-bit
//! CPU cores use, generalized to AVR's flat data space, packed micro-op
//! cache, and interrupt table rather than a 6502/Z80 register file.

use std::collections::BinaryHeap;

use crate::error::CoreError;
use crate::flags::Sreg;
use crate::interrupts::InterruptTable;

/// Number of general-purpose registers aliased at the bottom of `data`.
pub const NUM_REGISTERS: usize = 32;

/// Maximum directly-dispatched I/O register count (spec §4.B).
pub const MAX_IO: usize = 224;

/// Part-specific constants the loader supplies before [`Machine::init`].
///
/// These vary across AVR part families; hardcoding them to ATmega328
/// values would silently misbehave on any other part, so every caller
/// must supply them explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineConfig {
    /// Last valid SRAM byte address (inclusive).
    pub ramend: u32,
    /// Last valid flash word address (inclusive), in bytes.
    pub flashend: u32,
    /// Interrupt vector table entry size, in 16-bit words (1 or 2).
    pub vector_size: u8,
    /// Program counter width in bytes (2 or 3, for parts with >64K flash).
    pub address_size: u8,
    /// I/O address of `RAMPZ`, if this part has one.
    pub rampz_addr: Option<u16>,
    /// I/O address of `EIND`, if this part has one.
    pub eind_addr: Option<u16>,
    /// End of the directly-dispatched I/O region (exclusive), counted in
    /// data-space addresses, i.e. `32 + MAX_IO` for a part with the full
    /// I/O window.
    pub io_registers_end: u16,
    /// Data-space address of `SREG`.
    pub r_sreg: u16,
    /// Data-space address of `SPL`.
    pub r_spl: u16,
    /// Data-space address of `SPH`.
    pub r_sph: u16,
}

impl MachineConfig {
    /// The classic ATmega328P layout, used by tests and as a starting
    /// point for callers targeting that part.
    #[must_use]
    pub fn atmega328p() -> Self {
        Self {
            ramend: 0x08FF,
            flashend: 0x7FFF,
            vector_size: 1,
            address_size: 2,
            rampz_addr: None,
            eind_addr: None,
            io_registers_end: 32 + 224,
            r_sreg: 0x5F,
            r_spl: 0x5D,
            r_sph: 0x5E,
        }
    }
}

/// The lifecycle state §4.F drives `run_many` with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Fetch-decode-execute is live.
    Running,
    /// `SLEEP` executed; waiting on an interrupt or an external wake.
    Sleeping,
    /// Host requested a stop between instructions; resumable.
    Stopped,
    /// A single-step request completed; the caller must call `run_many`
    /// again to continue.
    StepDone,
    /// Terminal: the machine slept with no way to ever wake (§7).
    Done,
    /// Terminal: a [`CoreError`] occurred; see [`Machine::crash_reason`].
    Crashed,
}

type IoReadFn = Box<dyn FnMut(&mut Machine, u16) -> u8>;
type IoWriteFn = Box<dyn FnMut(&mut Machine, u16, u8)>;
type TimerFn = Box<dyn FnMut(&mut Machine, u64)>;

/// A pending cycle timer, ordered by `due` for the scheduler's min-heap.
pub(crate) struct CycleTimer {
    pub(crate) due: u64,
    pub(crate) id: u64,
    pub(crate) callback: TimerFn,
}

impl PartialEq for CycleTimer {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.id == other.id
    }
}
impl Eq for CycleTimer {}
impl PartialOrd for CycleTimer {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for CycleTimer {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // BinaryHeap is a max-heap; reverse so the earliest `due` sorts first.
        other.due.cmp(&self.due).then(other.id.cmp(&self.id))
    }
}

/// The complete simulated machine: registers, RAM, flash, the micro-op
/// cache, flags, and the interrupt/timer subsystems.
pub struct Machine {
    pub(crate) config: MachineConfig,

    /// Program counter, in bytes (word-aligned; AVR instructions are
    /// 16 or 32 bits).
    pub pc: u32,
    /// Total elapsed cycles since `init`.
    pub cycle: u64,

    /// Data space: registers 0..32, I/O 32..32+MAX_IO, SRAM beyond that.
    pub(crate) data: Vec<u8>,
    /// Unpacked status flags, kept consistent with `data[r_sreg]` at every
    /// instruction boundary.
    pub(crate) sreg: Sreg,

    /// Program memory, addressed in bytes.
    pub(crate) flash: Vec<u8>,
    /// One packed micro-op (or the "untranslated" sentinel) per flash word
    /// address; see [`crate::microcode`].
    pub(crate) uflash: Vec<u32>,
    /// Parallel array of 32-bit immediates for micro-ops that need more
    /// than the 3x8-bit operand slots carry.
    pub(crate) uflash_aux: Vec<u32>,

    pub(crate) run_state: RunState,
    pub(crate) crash: Option<CoreError>,
    pub(crate) reported_sleep_forever: bool,

    pub(crate) interrupts: InterruptTable,
    /// `RETI` delay: global interrupt flag is re-armed one instruction
    /// after it's set, never immediately (so `SEI`+`RETI` can't race).
    pub(crate) suppress_interrupt_once: bool,

    pub(crate) timers: BinaryHeap<CycleTimer>,
    pub(crate) next_timer_id: u64,

    io_read: Vec<Option<IoReadFn>>,
    io_write: Vec<Option<IoWriteFn>>,
}

impl Machine {
    /// Build a fresh machine: all-zero data space, empty flash, an empty
    /// micro-op cache, and no registered peripherals.
    #[must_use]
    pub fn new(config: MachineConfig) -> Self {
        let data_len = config.ramend as usize + 1;
        let flash_len = config.flashend as usize + 1;
        let io_slots = MAX_IO;
        Self {
            config,
            pc: 0,
            cycle: 0,
            data: vec![0u8; data_len],
            sreg: [false; 8],
            flash: vec![0u8; flash_len],
            uflash: vec![0u32; flash_len / 2],
            uflash_aux: vec![0u32; flash_len / 2],
            run_state: RunState::Running,
            crash: None,
            reported_sleep_forever: false,
            interrupts: InterruptTable::new(),
            suppress_interrupt_once: false,
            timers: BinaryHeap::new(),
            next_timer_id: 0,
            io_read: (0..io_slots).map(|_| None).collect(),
            io_write: (0..io_slots).map(|_| None).collect(),
        }
    }

    /// Load a program image into flash starting at byte address 0,
    /// invalidating any cached translations it overlaps.
    pub fn load_flash(&mut self, image: &[u8]) {
        let len = image.len().min(self.flash.len());
        self.flash[..len].copy_from_slice(&image[..len]);
        for word in self.uflash.iter_mut().take(len.div_ceil(2)) {
            *word = crate::microcode::UNTRANSLATED;
        }
    }

    /// Reset PC, cycle count, run state, and the micro-op cache; data space
    /// and flash contents are left as loaded (mirrors a watchdog/external
    /// reset, not a fresh `new`).
    pub fn init(&mut self) {
        self.pc = 0;
        self.cycle = 0;
        self.run_state = RunState::Running;
        self.crash = None;
        self.reported_sleep_forever = false;
        self.suppress_interrupt_once = false;
        for word in &mut self.uflash {
            *word = crate::microcode::UNTRANSLATED;
        }
    }

    #[must_use]
    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    #[must_use]
    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    #[must_use]
    pub fn crash_reason(&self) -> Option<CoreError> {
        self.crash
    }

    pub(crate) fn crash(&mut self, err: CoreError) {
        log::warn!("machine crashed: {err}");
        self.crash = Some(err);
        self.run_state = RunState::Crashed;
    }

    /// Register a callback for reads of I/O register `addr` (data-space
    /// address, i.e. already offset by 32).
    pub fn register_io_read(&mut self, addr: u16, callback: IoReadFn) {
        let idx = (addr as usize).saturating_sub(NUM_REGISTERS);
        if let Some(slot) = self.io_read.get_mut(idx) {
            *slot = Some(callback);
        }
    }

    /// Register a callback for writes of I/O register `addr`.
    pub fn register_io_write(&mut self, addr: u16, callback: IoWriteFn) {
        let idx = (addr as usize).saturating_sub(NUM_REGISTERS);
        if let Some(slot) = self.io_write.get_mut(idx) {
            *slot = Some(callback);
        }
    }

    /// Invoke the read callback for `addr`, if one is registered. Takes the
    /// closure out of its slot before calling it so the callback can itself
    /// take `&mut Machine` without aliasing its own storage, then puts it
    /// back.
    pub(crate) fn dispatch_io_read(&mut self, addr: u16) -> Option<u8> {
        let idx = (addr as usize).saturating_sub(NUM_REGISTERS);
        let mut callback = self.io_read.get_mut(idx)?.take()?;
        let value = callback(self, addr);
        if let Some(slot) = self.io_read.get_mut(idx) {
            *slot = Some(callback);
        }
        Some(value)
    }

    pub(crate) fn dispatch_io_write(&mut self, addr: u16, value: u8) -> bool {
        let idx = (addr as usize).saturating_sub(NUM_REGISTERS);
        let Some(mut callback) = self.io_write.get_mut(idx).and_then(Option::take) else {
            return false;
        };
        callback(self, addr, value);
        if let Some(slot) = self.io_write.get_mut(idx) {
            *slot = Some(callback);
        }
        true
    }

    /// Schedule `callback` to fire once `self.cycle >= self.cycle + delay`.
    /// Returns an id usable with [`Machine::cancel_timer`].
    pub fn register_timer(&mut self, delay: u64, callback: TimerFn) -> u64 {
        let id = self.next_timer_id;
        self.next_timer_id += 1;
        self.timers.push(CycleTimer {
            due: self.cycle + delay,
            id,
            callback,
        });
        id
    }

    /// Remove a pending timer by id, if it hasn't already fired.
    pub fn cancel_timer(&mut self, id: u64) {
        self.timers.retain(|t| t.id != id);
    }

    /// Debug-only cross-check between the packed `SREG` I/O register and
    /// the unpacked flag vector. Only called from `#[cfg(debug_assertions)]`
    /// sites in the dispatcher's instruction-boundary bookkeeping.
    pub(crate) fn debug_check_sreg(&mut self) {
        if !cfg!(debug_assertions) {
            return;
        }
        let packed = self.data[self.config.r_sreg as usize];
        let unpacked = crate::flags::pack(&self.sreg);
        if packed != unpacked {
            let pc = self.pc;
            self.crash(CoreError::SregMismatch {
                packed,
                unpacked,
                pc,
            });
        }
    }
}
