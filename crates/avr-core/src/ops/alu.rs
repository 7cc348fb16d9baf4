//! Arithmetic, logical, and compare instructions (spec §4.C "arithmetic/
//! logic" and "compare" families).
//!
//! Each handler reads its operands through [`Machine::reg`]/[`Machine::reg_pair`],
//! computes the result, and routes it through the matching [`crate::flags`]
//! formula before writing back. The `Add`/`Sub`/`Cp` handlers also carry the
//! wide-fusion case (spec §4.D: `ADD`+`ADC` and `SUB`+`SBC` and `CP`+`CPC`
//! pairs collapse into one micro-op whose third slot is a fused-pair flag).

use crate::flags::{self, SregBit};
use crate::state::Machine;

pub fn add(m: &mut Machine, rd: u8, rr: u8, wide: bool) -> u32 {
    let a = m.reg(rd);
    let b = m.reg(rr);
    let res = a.wrapping_add(b);
    flags::add(&mut m.sreg, res, a, b);
    m.set_reg(rd, res);
    if !wide {
        return 1;
    }
    let carry = u8::from(m.sreg[SregBit::C as usize]);
    let rd2 = rd + 1;
    let rr2 = rr + 1;
    let a2 = m.reg(rd2);
    let b2 = m.reg(rr2);
    let res2 = a2.wrapping_add(b2).wrapping_add(carry);
    flags::add(&mut m.sreg, res2, a2, b2);
    m.set_reg(rd2, res2);
    2
}

pub fn adc(m: &mut Machine, rd: u8, rr: u8) -> u32 {
    let a = m.reg(rd);
    let b = m.reg(rr);
    let carry = u8::from(m.sreg[SregBit::C as usize]);
    let res = a.wrapping_add(b).wrapping_add(carry);
    flags::add(&mut m.sreg, res, a, b);
    m.set_reg(rd, res);
    1
}

pub fn sub(m: &mut Machine, rd: u8, rr: u8, wide: bool) -> u32 {
    let a = m.reg(rd);
    let b = m.reg(rr);
    let res = a.wrapping_sub(b);
    flags::sub(&mut m.sreg, res, a, b);
    m.set_reg(rd, res);
    if !wide {
        return 1;
    }
    let borrow = u8::from(m.sreg[SregBit::C as usize]);
    let rd2 = rd + 1;
    let rr2 = rr + 1;
    let a2 = m.reg(rd2);
    let b2 = m.reg(rr2);
    let res2 = a2.wrapping_sub(b2).wrapping_sub(borrow);
    flags::sub_rzns(&mut m.sreg, res2, a2, b2);
    m.set_reg(rd2, res2);
    2
}

pub fn subi(m: &mut Machine, rd: u8, k: u8) -> u32 {
    let a = m.reg(rd);
    let res = a.wrapping_sub(k);
    flags::sub(&mut m.sreg, res, a, k);
    m.set_reg(rd, res);
    1
}

/// Fused `SUBI Rd,Klo` + `SBCI Rd+1,Khi`: 16-bit subtract-immediate.
pub fn subi_wide(m: &mut Machine, rd: u8, k_lo: u8, k_hi: u8) -> u32 {
    let a = m.reg(rd);
    let res = a.wrapping_sub(k_lo);
    flags::sub(&mut m.sreg, res, a, k_lo);
    m.set_reg(rd, res);
    let borrow = u8::from(m.sreg[SregBit::C as usize]);
    let rd2 = rd + 1;
    let a2 = m.reg(rd2);
    let res2 = a2.wrapping_sub(k_hi).wrapping_sub(borrow);
    flags::sub_rzns(&mut m.sreg, res2, a2, k_hi);
    m.set_reg(rd2, res2);
    2
}

pub fn sbc(m: &mut Machine, rd: u8, rr: u8) -> u32 {
    let a = m.reg(rd);
    let b = m.reg(rr);
    let borrow = u8::from(m.sreg[SregBit::C as usize]);
    let res = a.wrapping_sub(b).wrapping_sub(borrow);
    flags::sub_rzns(&mut m.sreg, res, a, b);
    m.set_reg(rd, res);
    1
}

pub fn sbci(m: &mut Machine, rd: u8, k: u8) -> u32 {
    let a = m.reg(rd);
    let borrow = u8::from(m.sreg[SregBit::C as usize]);
    let res = a.wrapping_sub(k).wrapping_sub(borrow);
    flags::sub_rzns(&mut m.sreg, res, a, k);
    m.set_reg(rd, res);
    1
}

pub fn and(m: &mut Machine, rd: u8, rr: u8) -> u32 {
    let res = m.reg(rd) & m.reg(rr);
    flags::logical(&mut m.sreg, res);
    m.set_reg(rd, res);
    1
}

pub fn andi(m: &mut Machine, rd: u8, k: u8) -> u32 {
    let res = m.reg(rd) & k;
    flags::logical(&mut m.sreg, res);
    m.set_reg(rd, res);
    1
}

pub fn or(m: &mut Machine, rd: u8, rr: u8) -> u32 {
    let res = m.reg(rd) | m.reg(rr);
    flags::logical(&mut m.sreg, res);
    m.set_reg(rd, res);
    1
}

pub fn ori(m: &mut Machine, rd: u8, k: u8) -> u32 {
    let res = m.reg(rd) | k;
    flags::logical(&mut m.sreg, res);
    m.set_reg(rd, res);
    1
}

pub fn eor(m: &mut Machine, rd: u8, rr: u8) -> u32 {
    let res = m.reg(rd) ^ m.reg(rr);
    flags::logical(&mut m.sreg, res);
    m.set_reg(rd, res);
    1
}

pub fn com(m: &mut Machine, rd: u8) -> u32 {
    let res = !m.reg(rd);
    flags::com(&mut m.sreg, res);
    m.set_reg(rd, res);
    1
}

pub fn neg(m: &mut Machine, rd: u8) -> u32 {
    let a = m.reg(rd);
    let res = 0u8.wrapping_sub(a);
    flags::neg(&mut m.sreg, res, a);
    m.set_reg(rd, res);
    1
}

pub fn inc(m: &mut Machine, rd: u8) -> u32 {
    let a = m.reg(rd);
    let res = a.wrapping_add(1);
    m.sreg[SregBit::V as usize] = a == 0x7F;
    flags::zns(&mut m.sreg, res);
    m.set_reg(rd, res);
    1
}

pub fn dec(m: &mut Machine, rd: u8) -> u32 {
    let a = m.reg(rd);
    let res = a.wrapping_sub(1);
    m.sreg[SregBit::V as usize] = a == 0x80;
    flags::zns(&mut m.sreg, res);
    m.set_reg(rd, res);
    1
}

pub fn cp(m: &mut Machine, rd: u8, rr: u8, wide: bool) -> u32 {
    let a = m.reg(rd);
    let b = m.reg(rr);
    let res = a.wrapping_sub(b);
    flags::sub(&mut m.sreg, res, a, b);
    if !wide {
        return 1;
    }
    let borrow = u8::from(m.sreg[SregBit::C as usize]);
    let a2 = m.reg(rd + 1);
    let b2 = m.reg(rr + 1);
    let res2 = a2.wrapping_sub(b2).wrapping_sub(borrow);
    flags::sub_rzns(&mut m.sreg, res2, a2, b2);
    2
}

pub fn cpc(m: &mut Machine, rd: u8, rr: u8) -> u32 {
    let a = m.reg(rd);
    let b = m.reg(rr);
    let borrow = u8::from(m.sreg[SregBit::C as usize]);
    let res = a.wrapping_sub(b).wrapping_sub(borrow);
    flags::sub_rzns(&mut m.sreg, res, a, b);
    1
}

pub fn cpi(m: &mut Machine, rd: u8, k: u8) -> u32 {
    let a = m.reg(rd);
    let res = a.wrapping_sub(k);
    flags::sub(&mut m.sreg, res, a, k);
    1
}

pub fn adiw(m: &mut Machine, base: u8, k: u8) -> u32 {
    let rd = m.reg_pair(base);
    let res = rd.wrapping_add(u16::from(k));
    flags::adiw(&mut m.sreg, res, rd);
    m.set_reg_pair(base, res);
    2
}

pub fn sbiw(m: &mut Machine, base: u8, k: u8) -> u32 {
    let rd = m.reg_pair(base);
    let res = rd.wrapping_sub(u16::from(k));
    flags::sbiw(&mut m.sreg, res, rd);
    m.set_reg_pair(base, res);
    2
}

pub fn lsr(m: &mut Machine, rd: u8) -> u32 {
    let a = m.reg(rd);
    let res = a >> 1;
    flags::shift_right(&mut m.sreg, res, a & 1 != 0, false);
    m.set_reg(rd, res);
    1
}

pub fn asr(m: &mut Machine, rd: u8) -> u32 {
    let a = m.reg(rd);
    let res = ((a as i8) >> 1) as u8;
    flags::shift_right(&mut m.sreg, res, a & 1 != 0, res & 0x80 != 0);
    m.set_reg(rd, res);
    1
}

pub fn ror(m: &mut Machine, rd: u8) -> u32 {
    let a = m.reg(rd);
    let carry_in = u8::from(m.sreg[SregBit::C as usize]);
    let res = (a >> 1) | (carry_in << 7);
    flags::shift_right(&mut m.sreg, res, a & 1 != 0, carry_in != 0);
    m.set_reg(rd, res);
    1
}

pub fn swap(m: &mut Machine, rd: u8) -> u32 {
    let a = m.reg(rd);
    let res = (a << 4) | (a >> 4);
    m.set_reg(rd, res);
    1
}
