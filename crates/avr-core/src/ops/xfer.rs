//! Register-to-register transfer and constant load (spec §4.C "transfer/
//! constants"). None of these touch any status flag.

use crate::state::Machine;

pub fn mov(m: &mut Machine, rd: u8, rr: u8) -> u32 {
    let v = m.reg(rr);
    m.set_reg(rd, v);
    1
}

pub fn movw(m: &mut Machine, rd: u8, rr: u8) -> u32 {
    // `MOVW` encodes register-pair indices directly in `D5R5`'s fields,
    // each already doubled by the decoder's field extraction convention
    // shared with `D5R5`; multiply back up to the even register number.
    let v = m.reg_pair(rr * 2);
    m.set_reg_pair(rd * 2, v);
    1
}

pub fn ldi(m: &mut Machine, rd: u8, k: u8) -> u32 {
    m.set_reg(rd, k);
    1
}

/// Fused pair from the `ldi-wide-pair` rule: `LDI Rd,k_lo` immediately
/// followed by `LDI Rd+1,k_hi` loads both halves of a 16-bit constant in
/// one dispatch.
pub fn ldi_wide(m: &mut Machine, rd: u8, k_lo: u8, k_hi: u8) -> u32 {
    m.set_reg(rd, k_lo);
    m.set_reg(rd + 1, k_hi);
    2
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MachineConfig;

    #[test]
    fn ldi_writes_immediate() {
        let mut m = Machine::new(MachineConfig::atmega328p());
        ldi(&mut m, 20, 0xAB);
        assert_eq!(m.reg(20), 0xAB);
    }

    #[test]
    fn movw_copies_register_pair() {
        let mut m = Machine::new(MachineConfig::atmega328p());
        m.set_reg_pair(4, 0xBEEF);
        movw(&mut m, 1, 2);
        assert_eq!(m.reg_pair(2), 0xBEEF);
    }
}
