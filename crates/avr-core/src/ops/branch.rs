//! Control-flow instructions (spec §4.C "branch" and "control" transfer
//! members): relative/absolute jumps and calls, return, and the
//! conditional family built on `SREG` bits.
//!
//! Convention shared with [`crate::dispatch`]: by the time a handler here
//! runs, `Machine::pc` has already been advanced past the instruction that
//! is executing (mirrors real AVR relative-offset semantics, which are
//! always relative to the *next* instruction). A handler that does nothing
//! to `pc` falls through to that already-advanced address; one that needs
//! to jump overwrites it outright.

use crate::state::Machine;

fn i16_from_slots(lo: u8, hi: u8) -> i16 {
    i16::from_le_bytes([lo, hi])
}

pub fn cpse(m: &mut Machine, rd: u8, rr: u8, next_len: u8) -> u32 {
    if m.reg(rd) == m.reg(rr) {
        m.pc = m.pc.wrapping_add(u32::from(next_len));
        2
    } else {
        1
    }
}

pub fn rjmp(m: &mut Machine, slots: [u8; 3]) -> u32 {
    let offset = i16_from_slots(slots[0], slots[1]);
    m.pc = (m.pc as i32 + i32::from(offset) * 2) as u32;
    2
}

pub fn rcall(m: &mut Machine, slots: [u8; 3], _len: u8) -> u32 {
    let offset = i16_from_slots(slots[0], slots[1]);
    // The stack holds the AVR's own word-addressed PC, not this crate's
    // byte-addressed `Machine::pc`.
    m.push16be((m.pc / 2) as u16);
    m.pc = (m.pc as i32 + i32::from(offset) * 2) as u32;
    3
}

pub fn jmp(m: &mut Machine, slots: [u8; 3]) -> u32 {
    let addr_words = u32::from(slots[0]) | (u32::from(slots[1]) << 8) | (u32::from(slots[2]) << 16);
    m.pc = addr_words * 2;
    3
}

pub fn call(m: &mut Machine, slots: [u8; 3], _len: u8) -> u32 {
    let addr_words = u32::from(slots[0]) | (u32::from(slots[1]) << 8) | (u32::from(slots[2]) << 16);
    m.push16be((m.pc / 2) as u16);
    m.pc = addr_words * 2;
    4
}

pub fn ret(m: &mut Machine) -> u32 {
    let addr = m.pop16be();
    m.pc = u32::from(addr) * 2;
    4
}

pub fn reti(m: &mut Machine) -> u32 {
    let addr = m.pop16be();
    m.pc = u32::from(addr) * 2;
    m.sreg[crate::flags::SregBit::I as usize] = true;
    // Same one-instruction arming delay as `SEI` (see `memory::write_data`).
    m.suppress_interrupt_once = true;
    let r_sreg = m.config.r_sreg;
    let packed = crate::flags::pack(&m.sreg);
    m.data[r_sreg as usize] = packed;
    4
}

pub fn ijmp(m: &mut Machine) -> u32 {
    let z = m.reg_pair(30);
    m.pc = u32::from(z) * 2;
    2
}

pub fn icall(m: &mut Machine, _len: u8) -> u32 {
    let z = m.reg_pair(30);
    m.push16be((m.pc / 2) as u16);
    m.pc = u32::from(z) * 2;
    3
}

/// Read `EIND`, or crash with [`crate::error::CoreError::MissingExtensionRegister`]
/// if this part has none configured (spec §7: `EIJMP`/`EICALL` without
/// `EIND` is a crash, not a silent zero-extend).
fn require_eind(m: &mut Machine, mnemonic: &'static str) -> Option<u8> {
    match m.config.eind_addr {
        Some(addr) => Some(m.read_data(addr)),
        None => {
            m.crash(crate::error::CoreError::MissingExtensionRegister { mnemonic });
            None
        }
    }
}

pub fn eijmp(m: &mut Machine) -> u32 {
    let z = m.reg_pair(30);
    let Some(eind) = require_eind(m, "eijmp") else {
        return 0;
    };
    m.pc = (u32::from(eind) << 16 | u32::from(z)) * 2;
    2
}

pub fn eicall(m: &mut Machine, _len: u8) -> u32 {
    let z = m.reg_pair(30);
    let Some(eind) = require_eind(m, "eicall") else {
        return 0;
    };
    m.push16be((m.pc / 2) as u16);
    m.pc = (u32::from(eind) << 16 | u32::from(z)) * 2;
    3
}

pub fn brbs(m: &mut Machine, slots: [u8; 3]) -> u32 {
    let offset = i16_from_slots(slots[0], slots[2]);
    let s = slots[1] as usize;
    if m.sreg[s] {
        m.pc = (m.pc as i32 + i32::from(offset) * 2) as u32;
        2
    } else {
        1
    }
}

pub fn brbc(m: &mut Machine, slots: [u8; 3]) -> u32 {
    let offset = i16_from_slots(slots[0], slots[2]);
    let s = slots[1] as usize;
    if !m.sreg[s] {
        m.pc = (m.pc as i32 + i32::from(offset) * 2) as u32;
        2
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MachineConfig;

    #[test]
    fn rjmp_moves_pc_relative() {
        let mut m = Machine::new(MachineConfig::atmega328p());
        m.pc = 10;
        rjmp(&mut m, [(-3i16).to_le_bytes()[0], (-3i16).to_le_bytes()[1], 0]);
        assert_eq!(m.pc, 4);
    }

    #[test]
    fn call_then_ret_round_trips_pc() {
        let mut m = Machine::new(MachineConfig::atmega328p());
        m.write_data(m.config.r_spl, 0xFF);
        m.write_data(m.config.r_sph, 0x08);
        m.pc = 20;
        call(&mut m, [0, 0, 0], 4);
        assert_eq!(m.pc, 0);
        ret(&mut m);
        assert_eq!(m.pc, 20);
    }

    #[test]
    fn brbs_takes_branch_when_flag_set() {
        let mut m = Machine::new(MachineConfig::atmega328p());
        m.sreg[crate::flags::SregBit::Z as usize] = true;
        m.pc = 100;
        let cycles = brbs(&mut m, [4, crate::flags::SregBit::Z as u8, 0]);
        assert_eq!(m.pc, 108);
        assert_eq!(cycles, 2);
    }

    #[test]
    fn eijmp_without_eind_crashes() {
        let mut m = Machine::new(MachineConfig::atmega328p());
        eijmp(&mut m);
        assert_eq!(m.run_state(), crate::state::RunState::Crashed);
        assert!(matches!(
            m.crash_reason(),
            Some(crate::error::CoreError::MissingExtensionRegister { mnemonic: "eijmp" })
        ));
    }

    #[test]
    fn eicall_jumps_via_eind_and_z_when_configured() {
        let mut config = MachineConfig::atmega328p();
        config.eind_addr = Some(0x5C);
        let mut m = Machine::new(config);
        m.write_data(m.config.r_spl, 0xFF);
        m.write_data(m.config.r_sph, 0x08);
        m.write_data(0x5C, 0x01);
        m.set_reg_pair(30, 0x0200);
        m.pc = 10;
        eicall(&mut m, 0);
        assert_eq!(m.pc, 0x1_0200 * 2);
        assert_eq!(m.run_state(), crate::state::RunState::Running);
    }
}
