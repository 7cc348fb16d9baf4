//! Reference decoder (spec §4.C).
//!
//! A linear mask/pattern table, scanned top-to-bottom, mirrors the shape of
//! the original simulator's dispatch table but replaces its function
//! pointers with [`OpTag`] — a closed enum a `match` in [`crate::ops`] can
//! exhaustively cover (the redesign spec §9 calls for). `LDD`/`STD` have
//! their displacement bits scattered across the word in a way no single
//! mask/pattern pair expresses cleanly, so they're special-cased ahead of
//! the table, same as the original.

use crate::error::CoreError;

/// The operand layout a [`DecodeEntry`] extracts from a matched word.
/// Named after the AVR instruction-set manual's own field letters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operands {
    /// No operands (`NOP`, `RET`, `SLEEP`, ...).
    None,
    /// Single 5-bit register `Rd` (`INC`, `COM`, `LSR`, ...).
    D5,
    /// Two 5-bit registers `Rd`, `Rr` (`ADD`, `MOV`, `CP`, ...).
    D5R5,
    /// 4-bit register (16..31) plus 8-bit immediate (`LDI`, `CPI`, ...).
    D4K8,
    /// 5-bit register plus 6-bit I/O address plus 3-bit bit number is not
    /// used; I/O bit ops use `A5B3` instead. `D5Q6` is `Rd`/`Rr` plus a
    /// 6-bit displacement, consumed only by the `LDD`/`STD` special case.
    D5Q6,
    /// 5-bit register implicit X/Y/Z pointer register, no extra bits
    /// (`LD Rd,X`, `ST Z+,Rr`, ...).
    D5rXYZ,
    /// Register pair selector (2-bit, W/X/Y/Z) plus 6-bit immediate
    /// (`ADIW`, `SBIW`).
    P2K6,
    /// 5-bit I/O address plus 3-bit bit number (`SBI`, `CBI`, `SBIC`, `SBIS`).
    A5B3,
    /// 6-bit I/O address plus 5-bit register (`IN`, `OUT`).
    A6D5,
    /// 3-bit status bit number only (`BSET`, `BCLR`).
    S3,
    /// 5-bit register plus 3-bit bit number (`BLD`, `BST`, `SBRC`, `SBRS`).
    D5B3,
    /// 3-bit branch condition plus 7-bit signed relative offset.
    O7S3,
    /// 12-bit signed relative offset (`RJMP`, `RCALL`).
    O12,
    /// 22-bit absolute word address, split across two flash words (`JMP`,
    /// `CALL`).
    X22,
    /// 5-bit register plus a second flash word holding a flat 16-bit
    /// data-space address (`LDS`, `STS`).
    D5K16,
}

/// One entry in the reference decode table.
#[derive(Debug, Clone, Copy)]
pub struct DecodeEntry {
    pub mask: u16,
    pub pattern: u16,
    pub layout: Operands,
    pub op: OpTag,
}

/// Closed tag for every instruction the core implements. Generalizes the
/// original simulator's opcode-indexed function-pointer table into a sum
/// type a `match` in the semantic handlers and the micro-op dispatcher can
/// both exhaustively cover, per spec §9's redesign flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpTag {
    Nop,
    Add,
    Adc,
    Sub,
    Subi,
    Sbc,
    Sbci,
    And,
    Andi,
    Or,
    Ori,
    Eor,
    Com,
    Neg,
    Inc,
    Dec,
    Cp,
    Cpc,
    Cpi,
    Cpse,
    Adiw,
    Sbiw,
    Movw,
    Mov,
    Ldi,
    Lsr,
    Asr,
    Ror,
    Swap,
    Mul,
    Muls,
    Mulsu,
    Fmul,
    Fmuls,
    Fmulsu,
    Rjmp,
    Rcall,
    Jmp,
    Call,
    Ret,
    Reti,
    Ijmp,
    Icall,
    Eijmp,
    Eicall,
    Brbs,
    Brbc,
    Sbi,
    Cbi,
    Sbic,
    Sbis,
    In,
    Out,
    Bset,
    Bclr,
    Bld,
    Bst,
    Sbrc,
    Sbrs,
    Ld,
    St,
    Ldd,
    Std,
    Lds,
    Sts,
    Lpm,
    LpmZ,
    LpmZInc,
    Elpm,
    ElpmZ,
    ElpmZInc,
    Spm,
    Push,
    Pop,
    Sleep,
    Wdr,
    Break,
    /// Reserved: never produced by `decode_reference`, only by the fast
    /// dispatcher's "no translation yet" sentinel (spec §4.D).
    Reserved,
}

/// `D5rXYZ` and `D5Q6`/`D5K16` entries additionally distinguish which
/// pointer register and which increment/decrement/displacement mode, which
/// the flat [`Operands`] enum can't carry; `decode_reference` packs that
/// detail into the returned `raw` word so `crate::ops` re-derives it the
/// same way the original does (cheaper than widening every table row).
#[derive(Debug, Clone, Copy)]
pub struct Decoded {
    pub op: OpTag,
    pub layout: Operands,
    /// The matched instruction word, kept so handlers can re-extract
    /// mode-specific bits (pointer register choice, pre/post-increment).
    pub raw: u16,
}

macro_rules! table {
    ($(($mask:expr, $pattern:expr, $layout:expr, $op:expr)),* $(,)?) => {
        &[$(DecodeEntry { mask: $mask, pattern: $pattern, layout: $layout, op: $op }),*]
    };
}

static TABLE: &[DecodeEntry] = table![
    (0xFFFF, 0x0000, Operands::None, OpTag::Nop),
    (0xFF00, 0x0100, Operands::D5R5, OpTag::Movw),
    (0xFF00, 0x0200, Operands::D5R5, OpTag::Muls),
    (0xFF88, 0x0300, Operands::D5R5, OpTag::Mulsu),
    (0xFF88, 0x0308, Operands::D5R5, OpTag::Fmul),
    (0xFF88, 0x0380, Operands::D5R5, OpTag::Fmuls),
    (0xFF88, 0x0388, Operands::D5R5, OpTag::Fmulsu),
    (0xFC00, 0x0400, Operands::D5R5, OpTag::Cpc),
    (0xFC00, 0x0800, Operands::D5R5, OpTag::Sbc),
    (0xFC00, 0x0C00, Operands::D5R5, OpTag::Add),
    (0xFC00, 0x1000, Operands::D5R5, OpTag::Cpse),
    (0xFC00, 0x1400, Operands::D5R5, OpTag::Cp),
    (0xFC00, 0x1800, Operands::D5R5, OpTag::Sub),
    (0xFC00, 0x1C00, Operands::D5R5, OpTag::Adc),
    (0xFC00, 0x2000, Operands::D5R5, OpTag::And),
    (0xFC00, 0x2400, Operands::D5R5, OpTag::Eor),
    (0xFC00, 0x2800, Operands::D5R5, OpTag::Or),
    (0xFC00, 0x2C00, Operands::D5R5, OpTag::Mov),
    (0xF000, 0x3000, Operands::D4K8, OpTag::Cpi),
    (0xF000, 0x4000, Operands::D4K8, OpTag::Sbci),
    (0xF000, 0x5000, Operands::D4K8, OpTag::Subi),
    (0xF000, 0x6000, Operands::D4K8, OpTag::Ori),
    (0xF000, 0x7000, Operands::D4K8, OpTag::Andi),
    (0xD208, 0x8000, Operands::D5Q6, OpTag::Ldd),
    (0xD208, 0x8200, Operands::D5Q6, OpTag::Std),
    (0xFE0F, 0x9000, Operands::D5K16, OpTag::Lds),
    (0xFE0F, 0x9001, Operands::D5rXYZ, OpTag::Ld),
    (0xFE0F, 0x9002, Operands::D5rXYZ, OpTag::Ld),
    (0xFE0F, 0x9004, Operands::D5rXYZ, OpTag::LpmZ),
    (0xFE0F, 0x9005, Operands::D5rXYZ, OpTag::LpmZInc),
    (0xFE0F, 0x9009, Operands::D5rXYZ, OpTag::Ld),
    (0xFE0F, 0x900A, Operands::D5rXYZ, OpTag::Ld),
    (0xFE0F, 0x900C, Operands::D5rXYZ, OpTag::Ld),
    (0xFE0F, 0x900D, Operands::D5rXYZ, OpTag::Ld),
    (0xFE0F, 0x900E, Operands::D5rXYZ, OpTag::Ld),
    (0xFE0F, 0x900F, Operands::D5, OpTag::Pop),
    (0xFE0F, 0x9200, Operands::D5K16, OpTag::Sts),
    (0xFE0F, 0x9201, Operands::D5rXYZ, OpTag::St),
    (0xFE0F, 0x9202, Operands::D5rXYZ, OpTag::St),
    (0xFE0F, 0x9209, Operands::D5rXYZ, OpTag::St),
    (0xFE0F, 0x920A, Operands::D5rXYZ, OpTag::St),
    (0xFE0F, 0x920C, Operands::D5rXYZ, OpTag::St),
    (0xFE0F, 0x920D, Operands::D5rXYZ, OpTag::St),
    (0xFE0F, 0x920E, Operands::D5rXYZ, OpTag::St),
    (0xFE0F, 0x920F, Operands::D5, OpTag::Push),
    (0xFE0F, 0x9400, Operands::D5, OpTag::Com),
    (0xFE0F, 0x9401, Operands::D5, OpTag::Neg),
    (0xFE0F, 0x9402, Operands::D5, OpTag::Swap),
    (0xFE0F, 0x9403, Operands::D5, OpTag::Inc),
    (0xFE0F, 0x9405, Operands::D5, OpTag::Asr),
    (0xFE0F, 0x9406, Operands::D5, OpTag::Lsr),
    (0xFE0F, 0x9407, Operands::D5, OpTag::Ror),
    (0xFE0F, 0x940A, Operands::D5, OpTag::Dec),
    (0xFE0E, 0x940C, Operands::X22, OpTag::Jmp),
    (0xFE0E, 0x940E, Operands::X22, OpTag::Call),
    (0xFF8F, 0x9408, Operands::S3, OpTag::Bset),
    (0xFF8F, 0x9488, Operands::S3, OpTag::Bclr),
    (0xFFFF, 0x9409, Operands::None, OpTag::Ijmp),
    (0xFFFF, 0x9419, Operands::None, OpTag::Eijmp),
    (0xFFFF, 0x9509, Operands::None, OpTag::Icall),
    (0xFFFF, 0x9519, Operands::None, OpTag::Eicall),
    (0xFFFF, 0x9508, Operands::None, OpTag::Ret),
    (0xFFFF, 0x9518, Operands::None, OpTag::Reti),
    (0xFFFF, 0x9588, Operands::None, OpTag::Sleep),
    (0xFFFF, 0x9598, Operands::None, OpTag::Break),
    (0xFFFF, 0x95A8, Operands::None, OpTag::Wdr),
    (0xFFFF, 0x95C8, Operands::None, OpTag::Lpm),
    (0xFFFF, 0x95D8, Operands::None, OpTag::Elpm),
    (0xFE0F, 0x9006, Operands::D5rXYZ, OpTag::ElpmZ),
    (0xFE0F, 0x9007, Operands::D5rXYZ, OpTag::ElpmZInc),
    (0xFFFF, 0x95E8, Operands::None, OpTag::Spm),
    (0xFF00, 0x9600, Operands::P2K6, OpTag::Adiw),
    (0xFF00, 0x9700, Operands::P2K6, OpTag::Sbiw),
    (0xFF00, 0x9800, Operands::A5B3, OpTag::Cbi),
    (0xFF00, 0x9900, Operands::A5B3, OpTag::Sbic),
    (0xFF00, 0x9A00, Operands::A5B3, OpTag::Sbi),
    (0xFF00, 0x9B00, Operands::A5B3, OpTag::Sbis),
    (0xFC00, 0x9C00, Operands::D5R5, OpTag::Mul),
    (0xF800, 0xB000, Operands::A6D5, OpTag::In),
    (0xF800, 0xB800, Operands::A6D5, OpTag::Out),
    (0xF000, 0xC000, Operands::O12, OpTag::Rjmp),
    (0xF000, 0xD000, Operands::O12, OpTag::Rcall),
    (0xF000, 0xE000, Operands::D4K8, OpTag::Ldi),
    (0xFC00, 0xF000, Operands::O7S3, OpTag::Brbs),
    (0xFC00, 0xF400, Operands::O7S3, OpTag::Brbc),
    (0xFE08, 0xF800, Operands::D5B3, OpTag::Bld),
    (0xFE08, 0xFA00, Operands::D5B3, OpTag::Bst),
    (0xFE08, 0xFC00, Operands::D5B3, OpTag::Sbrc),
    (0xFE08, 0xFE00, Operands::D5B3, OpTag::Sbrs),
];

/// Decode the 16-bit word `word` fetched from `pc`. Scans [`TABLE`]
/// top-to-bottom (more specific masks first) and returns the first match.
///
/// # Errors
/// Returns [`CoreError::InvalidOpcode`] if no entry matches.
pub fn decode_reference(pc: u32, word: u16) -> Result<Decoded, CoreError> {
    for entry in TABLE {
        if word & entry.mask == entry.pattern {
            log::trace!("decode: pc={pc:#06x} word={word:#06x} op={:?}", entry.op);
            return Ok(Decoded {
                op: entry.op,
                layout: entry.layout,
                raw: word,
            });
        }
    }
    Err(CoreError::InvalidOpcode { pc, word })
}

/// Extract `Rd` from a `D5*` word (bits 8:4).
#[must_use]
pub fn field_d5(word: u16) -> u8 {
    ((word >> 4) & 0x1F) as u8
}

/// Extract `Rr` from a `D5R5` word (bit 9 plus bits 3:0).
#[must_use]
pub fn field_r5(word: u16) -> u8 {
    (((word >> 9) & 0x01) << 4 | (word & 0x0F)) as u8
}

/// Extract `Rd` from a `D4K8`/`LDI`/`CPI`-style word (bits 7:4, offset by 16).
#[must_use]
pub fn field_d4(word: u16) -> u8 {
    (((word >> 4) & 0x0F) + 16) as u8
}

/// Extract the 8-bit immediate from a `D4K8` word.
#[must_use]
pub fn field_k8(word: u16) -> u8 {
    (((word >> 4) & 0xF0) | (word & 0x0F)) as u8
}

/// Extract the 6-bit displacement `q` from an `LDD`/`STD` word: bit 13 is
/// `q5`, bits 11:10 are `q4:q3`, bits 2:0 are `q2:q0`.
#[must_use]
pub fn field_q6(word: u16) -> u8 {
    let q5 = (word >> 13) & 0x01;
    let q43 = (word >> 10) & 0x03;
    let q210 = word & 0x07;
    ((q5 << 5) | (q43 << 3) | q210) as u8
}

/// Extract the register-pair selector and 6-bit immediate from an
/// `ADIW`/`SBIW` word. The pair base register is `24 + 2*p`.
#[must_use]
pub fn field_p2k6(word: u16) -> (u8, u8) {
    let p = ((word >> 4) & 0x03) as u8;
    let k = (((word >> 2) & 0x30) | (word & 0x0F)) as u8;
    (24 + p * 2, k)
}

/// Extract the I/O address and bit number from an `A5B3` word.
#[must_use]
pub fn field_a5b3(word: u16) -> (u16, u8) {
    let a = ((word >> 3) & 0x1F) as u16;
    let b = (word & 0x07) as u8;
    (a, b)
}

/// Extract the I/O address and register from an `A6D5` word.
#[must_use]
pub fn field_a6d5(word: u16) -> (u16, u8) {
    let a = (((word >> 5) & 0x30) | (word & 0x0F)) as u16;
    let d = ((word >> 4) & 0x1F) as u8;
    (a, d)
}

/// Extract the 3-bit status bit number from a `BSET`/`BCLR` word.
#[must_use]
pub fn field_s3(word: u16) -> u8 {
    ((word >> 4) & 0x07) as u8
}

/// Extract `Rd`/`Rr` and the 3-bit bit number from a `D5B3` word.
#[must_use]
pub fn field_d5b3(word: u16) -> (u8, u8) {
    (field_d5(word), (word & 0x07) as u8)
}

/// Extract the signed 7-bit relative offset and condition bit from an
/// `O7S3` word, returning the offset already in instruction units (not
/// bytes).
#[must_use]
pub fn field_o7s3(word: u16) -> (i16, u8) {
    let raw = ((word >> 3) & 0x7F) as i16;
    let offset = if raw & 0x40 != 0 { raw - 0x80 } else { raw };
    (offset, (word & 0x07) as u8)
}

/// Extract the signed 12-bit relative offset from an `O12` word, in
/// instruction units.
#[must_use]
pub fn field_o12(word: u16) -> i16 {
    let raw = (word & 0x0FFF) as i16;
    if raw & 0x0800 != 0 { raw - 0x1000 } else { raw }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_nop() {
        let d = decode_reference(0, 0x0000).unwrap();
        assert_eq!(d.op, OpTag::Nop);
    }

    #[test]
    fn decodes_add_and_extracts_fields() {
        // ADD r17, r2: 0000 11 0 10001 00010 -> d=17, r=2
        let word = 0x0C00 | (17 << 4) | 2;
        let d = decode_reference(0, word).unwrap();
        assert_eq!(d.op, OpTag::Add);
        assert_eq!(field_d5(word), 17);
        assert_eq!(field_r5(word), 2);
    }

    #[test]
    fn decodes_ldi_and_splits_immediate() {
        // LDI r20, 0xAB -> d field = 4 (register 20-16), K = 0xAB split hi/lo.
        let k = 0xABu16;
        let d_field = 20u16 - 16;
        let word = 0xE000 | ((k & 0xF0) << 4) | (d_field << 4) | (k & 0x0F);
        let d = decode_reference(0, word).unwrap();
        assert_eq!(d.op, OpTag::Ldi);
        assert_eq!(field_d4(word), 20);
        assert_eq!(field_k8(word), 0xAB);
    }

    #[test]
    fn decodes_rjmp_negative_offset() {
        let word = 0xC000 | (0x1000u16.wrapping_sub(5) & 0x0FFF);
        let d = decode_reference(0, word).unwrap();
        assert_eq!(d.op, OpTag::Rjmp);
        assert_eq!(field_o12(word), -5);
    }

    #[test]
    fn unmatched_word_is_invalid_opcode() {
        // 1111 1111 1111 0111 matches no table entry.
        let err = decode_reference(0x100, 0xFFF7).unwrap_err();
        assert!(matches!(err, CoreError::InvalidOpcode { pc: 0x100, word: 0xFFF7 }));
    }

    #[test]
    fn ldd_q_field_round_trips() {
        // LDD r5, Y+19: q=0b010011, scattered as q5 | q4:q3 | q2:q0.
        let q = 0b01_00_11u16;
        let q5 = (q >> 5) & 1;
        let q43 = (q >> 3) & 0b11;
        let q210 = q & 0b111;
        let word = 0x8008u16 | (5 << 4) | (q5 << 13) | (q43 << 10) | q210;
        let d = decode_reference(0, word).unwrap();
        assert_eq!(d.op, OpTag::Ldd);
        assert_eq!(field_q6(word), q as u8);
    }
}
