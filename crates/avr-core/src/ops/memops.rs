//! Load/store and I/O transfer instructions (spec §4.C "load/store").
//!
//! The `X`/`Y`/`Z` pointer-register addressing modes are folded into a
//! single mode byte at translate time (see [`crate::microcode::translate`]);
//! `ld`/`st` switch on it here the same way the original simulator's
//! `_avr_op_ld`/`_avr_op_st` dispatch on their low nibble.

use crate::state::Machine;

const MODE_Z_PLUS: u8 = 0x1;
const MODE_Z_MINUS: u8 = 0x2;
const MODE_Y_PLUS: u8 = 0x9;
const MODE_Y_MINUS: u8 = 0xA;
const MODE_X: u8 = 0xC;
const MODE_X_PLUS: u8 = 0xD;
const MODE_X_MINUS: u8 = 0xE;

fn pointer_base(mode: u8) -> u8 {
    match mode {
        MODE_Z_PLUS | MODE_Z_MINUS => 30,
        MODE_Y_PLUS | MODE_Y_MINUS => 28,
        MODE_X | MODE_X_PLUS | MODE_X_MINUS => 26,
        _ => unreachable!("translate only ever emits the seven pointer addressing modes"),
    }
}

/// Resolve the effective address for `mode`, applying any pre-decrement,
/// and returning the (possibly unchanged) pointer value to write back
/// after a post-increment.
fn resolve(m: &mut Machine, mode: u8) -> (u16, u8) {
    let base = pointer_base(mode);
    let mut ptr = m.reg_pair(base);
    if matches!(mode, MODE_Z_MINUS | MODE_Y_MINUS | MODE_X_MINUS) {
        ptr = ptr.wrapping_sub(1);
    }
    (ptr, base)
}

fn writeback(m: &mut Machine, mode: u8, base: u8, ptr: u16) {
    let new_ptr = match mode {
        MODE_Z_PLUS | MODE_Y_PLUS | MODE_X_PLUS => ptr.wrapping_add(1),
        MODE_Z_MINUS | MODE_Y_MINUS | MODE_X_MINUS => ptr,
        _ => return,
    };
    m.set_reg_pair(base, new_ptr);
}

pub fn ld(m: &mut Machine, rd: u8, mode: u8) -> u32 {
    let (addr, base) = resolve(m, mode);
    let v = m.read_data(addr);
    m.set_reg(rd, v);
    writeback(m, mode, base, addr);
    2
}

pub fn st(m: &mut Machine, rr: u8, mode: u8) -> u32 {
    let (addr, base) = resolve(m, mode);
    let v = m.reg(rr);
    m.write_data(addr, v);
    writeback(m, mode, base, addr);
    2
}

pub fn ldd(m: &mut Machine, rd: u8, q: u8) -> u32 {
    let base = m.reg_pair(28); // Y; see microcode::translate's documented simplification
    let addr = base.wrapping_add(u16::from(q));
    let v = m.read_data(addr);
    m.set_reg(rd, v);
    2
}

pub fn std_(m: &mut Machine, rr: u8, q: u8) -> u32 {
    let base = m.reg_pair(28);
    let addr = base.wrapping_add(u16::from(q));
    let v = m.reg(rr);
    m.write_data(addr, v);
    2
}

pub fn lds(m: &mut Machine, rd: u8, lo: u8, hi: u8) -> u32 {
    let addr = u16::from(lo) | (u16::from(hi) << 8);
    let v = m.read_data(addr);
    m.set_reg(rd, v);
    2
}

pub fn sts(m: &mut Machine, rd: u8, lo: u8, hi: u8) -> u32 {
    let addr = u16::from(lo) | (u16::from(hi) << 8);
    let v = m.reg(rd);
    m.write_data(addr, v);
    2
}

pub fn lpm(m: &mut Machine) -> u32 {
    let z = m.reg_pair(30) as usize;
    let v = m.flash.get(z).copied().unwrap_or(0);
    m.set_reg(0, v);
    3
}

pub fn lpm_z(m: &mut Machine, rd: u8, post_increment: bool) -> u32 {
    let z = m.reg_pair(30);
    let v = m.flash.get(z as usize).copied().unwrap_or(0);
    m.set_reg(rd, v);
    if post_increment {
        m.set_reg_pair(30, z.wrapping_add(1));
    }
    3
}

fn rampz(m: &mut Machine) -> u32 {
    u32::from(m.config.rampz_addr.map_or(0, |a| m.read_data(a)))
}

pub fn elpm(m: &mut Machine) -> u32 {
    let addr = (rampz(m) << 16) | u32::from(m.reg_pair(30));
    let v = m.flash.get(addr as usize).copied().unwrap_or(0);
    m.set_reg(0, v);
    3
}

pub fn elpm_z(m: &mut Machine, rd: u8, post_increment: bool) -> u32 {
    let z = m.reg_pair(30);
    let addr = (rampz(m) << 16) | u32::from(z);
    let v = m.flash.get(addr as usize).copied().unwrap_or(0);
    m.set_reg(rd, v);
    if post_increment {
        m.set_reg_pair(30, z.wrapping_add(1));
    }
    3
}

/// `SPM` delegates entirely to a flash-program peripheral (spec §4.C); the
/// core only provides this dispatch point, the same way `wdr` delegates to
/// a watchdog.
pub fn spm() -> u32 {
    log::trace!("spm");
    1
}

pub fn in_(m: &mut Machine, a: u8, rd: u8) -> u32 {
    let addr = u16::from(a) + u16::from(crate::state::NUM_REGISTERS as u8);
    let v = m.read_data(addr);
    m.set_reg(rd, v);
    1
}

pub fn out(m: &mut Machine, a: u8, rr: u8) -> u32 {
    let addr = u16::from(a) + u16::from(crate::state::NUM_REGISTERS as u8);
    let v = m.reg(rr);
    m.write_data(addr, v);
    1
}

pub fn push(m: &mut Machine, rd: u8) -> u32 {
    let v = m.reg(rd);
    m.push8(v);
    2
}

pub fn pop(m: &mut Machine, rd: u8) -> u32 {
    let v = m.pop8();
    m.set_reg(rd, v);
    2
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MachineConfig;

    #[test]
    fn ld_post_increment_advances_pointer() {
        let mut m = Machine::new(MachineConfig::atmega328p());
        m.set_reg_pair(30, 100);
        m.write_data(100, 0x42);
        ld(&mut m, 5, MODE_Z_PLUS);
        assert_eq!(m.reg(5), 0x42);
        assert_eq!(m.reg_pair(30), 101);
    }

    #[test]
    fn st_pre_decrement_writes_at_new_address() {
        let mut m = Machine::new(MachineConfig::atmega328p());
        m.set_reg_pair(30, 100);
        m.set_reg(5, 0x99);
        st(&mut m, 5, MODE_Z_MINUS);
        assert_eq!(m.reg_pair(30), 99);
        assert_eq!(m.read_data(99), 0x99);
    }

    #[test]
    fn push_pop_via_ops_round_trip() {
        let mut m = Machine::new(MachineConfig::atmega328p());
        m.write_data(m.config.r_spl, 0xFF);
        m.write_data(m.config.r_sph, 0x08);
        m.set_reg(7, 0x33);
        push(&mut m, 7);
        pop(&mut m, 8);
        assert_eq!(m.reg(8), 0x33);
    }

    #[test]
    fn elpm_reads_above_64k_via_rampz() {
        let mut config = MachineConfig::atmega328p();
        config.rampz_addr = Some(0x5B);
        let mut m = Machine::new(config);
        m.flash = vec![0u8; 0x1_0002];
        m.flash[0x1_0000] = 0xAB;
        m.write_data(0x5B, 0x01);
        m.set_reg_pair(30, 0x0000);
        elpm(&mut m);
        assert_eq!(m.reg(0), 0xAB);
    }

    #[test]
    fn elpm_z_post_increment_advances_z() {
        let mut m = Machine::new(MachineConfig::atmega328p());
        m.set_reg_pair(30, 5);
        elpm_z(&mut m, 10, true);
        assert_eq!(m.reg_pair(30), 6);
    }
}
