//! Multiply family (spec §4.C "multiply"): `MUL`, `MULS`, `MULSU`, and the
//! fractional `FMUL*` variants. All write the 16-bit product into `R1:R0`
//! and set `Z`/`C` per [`crate::flags::multiply`]; none touch `Rd`/`Rr`.

use crate::state::Machine;

pub fn mul(m: &mut Machine, rd: u8, rr: u8) -> u32 {
    let res = u16::from(m.reg(rd)) * u16::from(m.reg(rr));
    let carry = res & 0x8000 != 0;
    crate::flags::multiply(&mut m.sreg, res, carry);
    m.set_reg_pair(0, res);
    2
}

pub fn muls(m: &mut Machine, rd: u8, rr: u8) -> u32 {
    let a = m.reg(rd) as i8 as i16;
    let b = m.reg(rr) as i8 as i16;
    let res = (a * b) as u16;
    let carry = res & 0x8000 != 0;
    crate::flags::multiply(&mut m.sreg, res, carry);
    m.set_reg_pair(0, res);
    2
}

pub fn mulsu(m: &mut Machine, rd: u8, rr: u8) -> u32 {
    let a = m.reg(rd) as i8 as i16;
    let b = i16::from(m.reg(rr));
    let res = (a * b) as u16;
    let carry = res & 0x8000 != 0;
    crate::flags::multiply(&mut m.sreg, res, carry);
    m.set_reg_pair(0, res);
    2
}

fn fmul_common(m: &mut Machine, raw: u16) {
    let carry = raw & 0x8000 != 0;
    let res = raw << 1;
    crate::flags::multiply(&mut m.sreg, res, carry);
    m.set_reg_pair(0, res);
}

pub fn fmul(m: &mut Machine, rd: u8, rr: u8) -> u32 {
    let raw = u16::from(m.reg(rd)) * u16::from(m.reg(rr));
    fmul_common(m, raw);
    2
}

pub fn fmuls(m: &mut Machine, rd: u8, rr: u8) -> u32 {
    let a = m.reg(rd) as i8 as i16;
    let b = m.reg(rr) as i8 as i16;
    let raw = (a * b) as u16;
    fmul_common(m, raw);
    2
}

pub fn fmulsu(m: &mut Machine, rd: u8, rr: u8) -> u32 {
    let a = m.reg(rd) as i8 as i16;
    let b = i16::from(m.reg(rr));
    let raw = (a * b) as u16;
    fmul_common(m, raw);
    2
}
