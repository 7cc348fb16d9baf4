//! Data-space access (spec §4.B).
//!
//! Range-dispatches reads and writes across registers, I/O, and SRAM, and
//! owns the `SREG`/stack-pointer special cases that don't fit a flat byte
//! array: writing `SREG` must re-derive the unpacked flag vector, and a
//! write to it that sets the global interrupt bit arms interrupts one
//! cycle late rather than immediately (mirrors `SEI`'s own timing rule,
//! generalized to any write that sets bit 7).

use crate::error::CoreError;
use crate::state::{Machine, NUM_REGISTERS};

impl Machine {
    /// Read one data-space byte, or crash with [`CoreError::RamOverrun`] if
    /// `addr` is past `ramend`.
    pub fn read_data(&mut self, addr: u16) -> u8 {
        let addr_usize = addr as usize;
        if addr_usize > self.config.ramend as usize {
            let pc = self.pc;
            let ramend = self.config.ramend;
            self.crash(CoreError::RamOverrun {
                addr: addr as u32,
                ramend,
                pc,
            });
            return 0;
        }
        if addr == self.config.r_sreg {
            return crate::flags::pack(&self.sreg);
        }
        if addr_usize >= NUM_REGISTERS
            && addr < self.config.io_registers_end
            && let Some(value) = self.dispatch_io_read(addr)
        {
            return value;
        }
        self.data[addr_usize]
    }

    /// Write one data-space byte, or crash with [`CoreError::RamOverrun`]
    /// if `addr` is past `ramend`.
    pub fn write_data(&mut self, addr: u16, value: u8) {
        let addr_usize = addr as usize;
        if addr_usize > self.config.ramend as usize {
            let pc = self.pc;
            let ramend = self.config.ramend;
            self.crash(CoreError::RamOverrun {
                addr: addr as u32,
                ramend,
                pc,
            });
            return;
        }
        if addr == self.config.r_sreg {
            let was_enabled = self.sreg[crate::flags::SregBit::I as usize];
            crate::flags::unpack(value, &mut self.sreg);
            self.data[addr_usize] = value;
            let now_enabled = self.sreg[crate::flags::SregBit::I as usize];
            if now_enabled && !was_enabled {
                self.suppress_interrupt_once = true;
            }
            return;
        }
        if addr_usize >= NUM_REGISTERS && addr < self.config.io_registers_end {
            self.data[addr_usize] = value;
            if self.dispatch_io_write(addr, value) {
                return;
            }
            return;
        }
        self.data[addr_usize] = value;
    }

    /// Read a general-purpose register `r0`..`r31`.
    #[must_use]
    pub fn reg(&self, r: u8) -> u8 {
        self.data[r as usize]
    }

    /// Write a general-purpose register `r0`..`r31`.
    pub fn set_reg(&mut self, r: u8, value: u8) {
        self.data[r as usize] = value;
    }

    /// Read the 16-bit register pair starting at `r` (`r:r+1`, little-endian,
    /// per the AVR `X`/`Y`/`Z` word-pair convention).
    #[must_use]
    pub fn reg_pair(&self, r: u8) -> u16 {
        u16::from(self.data[r as usize]) | (u16::from(self.data[r as usize + 1]) << 8)
    }

    /// Write the 16-bit register pair starting at `r`.
    pub fn set_reg_pair(&mut self, r: u8, value: u16) {
        self.data[r as usize] = (value & 0xFF) as u8;
        self.data[r as usize + 1] = (value >> 8) as u8;
    }

    /// Current stack pointer, assembled from `SPL`/`SPH`.
    #[must_use]
    pub fn sp(&self) -> u16 {
        u16::from(self.data[self.config.r_spl as usize])
            | (u16::from(self.data[self.config.r_sph as usize]) << 8)
    }

    fn set_sp(&mut self, value: u16) {
        let spl = self.config.r_spl as usize;
        let sph = self.config.r_sph as usize;
        self.data[spl] = (value & 0xFF) as u8;
        self.data[sph] = (value >> 8) as u8;
    }

    /// `PUSH`: write `value` at `[SP]`, then decrement SP. Crashes with
    /// [`CoreError::StackUnderflow`] if SP would fall into the register
    /// file.
    pub fn push8(&mut self, value: u8) {
        let sp = self.sp();
        if sp < self.config.io_registers_end {
            let pc = self.pc;
            self.crash(CoreError::StackUnderflow { sp, pc });
            return;
        }
        self.write_data(sp, value);
        self.set_sp(sp.wrapping_sub(1));
    }

    /// `POP`: increment SP, then read `[SP]`.
    pub fn pop8(&mut self) -> u8 {
        let sp = self.sp().wrapping_add(1);
        self.set_sp(sp);
        self.read_data(sp)
    }

    /// Push a 16-bit value high byte first (the `CALL`/interrupt-entry
    /// return-address convention).
    pub fn push16be(&mut self, value: u16) {
        self.push8((value >> 8) as u8);
        self.push8((value & 0xFF) as u8);
    }

    /// Pop a 16-bit value pushed by [`Machine::push16be`].
    pub fn pop16be(&mut self) -> u16 {
        let lo = self.pop8();
        let hi = self.pop8();
        u16::from(lo) | (u16::from(hi) << 8)
    }

    /// Push a 16-bit value low byte first.
    pub fn push16le(&mut self, value: u16) {
        self.push8((value & 0xFF) as u8);
        self.push8((value >> 8) as u8);
    }

    /// Pop a 16-bit value pushed by [`Machine::push16le`].
    pub fn pop16le(&mut self) -> u16 {
        let hi = self.pop8();
        let lo = self.pop8();
        u16::from(lo) | (u16::from(hi) << 8)
    }

    /// Fetch one flash word (little-endian 16-bit), used by the reference
    /// decoder and by `LPM`/`SPM`'s byte-at-a-time variants.
    #[must_use]
    pub fn fetch_word(&self, byte_addr: u32) -> u16 {
        let idx = byte_addr as usize;
        if idx + 1 >= self.flash.len() {
            return 0;
        }
        u16::from(self.flash[idx]) | (u16::from(self.flash[idx + 1]) << 8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MachineConfig;

    #[test]
    fn push_pop_round_trip() {
        let mut m = Machine::new(MachineConfig::atmega328p());
        m.write_data(m.config.r_spl, 0xFF);
        m.write_data(m.config.r_sph, 0x08);
        m.push8(0x42);
        assert_eq!(m.pop8(), 0x42);
    }

    #[test]
    fn push16be_pop16be_round_trip() {
        let mut m = Machine::new(MachineConfig::atmega328p());
        m.write_data(m.config.r_spl, 0xFF);
        m.write_data(m.config.r_sph, 0x08);
        m.push16be(0xBEEF);
        assert_eq!(m.pop16be(), 0xBEEF);
    }

    #[test]
    fn sreg_write_updates_unpacked_flags() {
        let mut m = Machine::new(MachineConfig::atmega328p());
        let r_sreg = m.config.r_sreg;
        m.write_data(r_sreg, 0b1000_0010);
        assert!(m.sreg[crate::flags::SregBit::I as usize]);
        assert!(m.sreg[crate::flags::SregBit::Z as usize]);
        assert_eq!(m.read_data(r_sreg), 0b1000_0010);
    }

    #[test]
    fn reg_pair_is_little_endian() {
        let mut m = Machine::new(MachineConfig::atmega328p());
        m.set_reg_pair(30, 0x1234);
        assert_eq!(m.reg(30), 0x34);
        assert_eq!(m.reg(31), 0x12);
        assert_eq!(m.reg_pair(30), 0x1234);
    }

    #[test]
    fn ram_overrun_crashes() {
        let mut m = Machine::new(MachineConfig::atmega328p());
        let past_end = m.config.ramend as u16 + 1;
        m.read_data(past_end);
        assert_eq!(m.run_state(), crate::state::RunState::Crashed);
        assert!(matches!(m.crash_reason(), Some(CoreError::RamOverrun { .. })));
    }

    #[test]
    fn push_into_io_window_crashes_with_stack_underflow() {
        let mut m = Machine::new(MachineConfig::atmega328p());
        let io_end = m.config.io_registers_end;
        m.write_data(m.config.r_spl, (io_end - 1) as u8);
        m.write_data(m.config.r_sph, ((io_end - 1) >> 8) as u8);
        m.push8(0x11);
        assert_eq!(m.run_state(), crate::state::RunState::Crashed);
        assert!(matches!(m.crash_reason(), Some(CoreError::StackUnderflow { .. })));
    }
}
