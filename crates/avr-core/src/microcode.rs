//! Micro-op cache and fusion (spec §4.D).
//!
//! Each flash word address owns one 32-bit slot in `Machine::uflash`,
//! translated at most once ("write-once-per-address") the first time the
//! fast dispatcher reaches it. A micro-op packs an 8-bit op index and
//! either three 8-bit operand slots or one 24-bit immediate, matching the
//! original simulator's own op/operand packing but keyed off the closed
//! [`crate::decode::OpTag`] instead of a raw function pointer.

use crate::decode::{self, Decoded, OpTag, Operands};

/// Sentinel meaning "this flash address has not been translated yet".
/// Index 0 in `OpTag` is never assigned to a real instruction so a
/// zeroed cache slot and an explicit miss are indistinguishable, which is
/// why this sentinel uses a bit pattern no real micro-op can produce (the
/// top bit of the op-index byte is never set by a real translation).
pub const UNTRANSLATED: u32 = 0x8000_0000;

/// A decoded, possibly-fused, cache-resident instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MicroOp {
    pub op: OpTag,
    pub slots: [u8; 3],
    /// Byte length of the *source* instruction(s) this micro-op replaces
    /// (2 or 4 for a single instruction, up to 8 for a two-instruction
    /// fusion), used to advance `pc` after dispatch.
    pub length: u8,
}

impl MicroOp {
    #[must_use]
    pub fn pack(&self) -> u32 {
        (self.op as u32) << 24
            | u32::from(self.slots[0]) << 16
            | u32::from(self.slots[1]) << 8
            | u32::from(self.slots[2])
    }

    #[must_use]
    pub fn unpack(word: u32) -> Self {
        Self {
            op: op_from_index((word >> 24) as u8),
            slots: [(word >> 16) as u8, (word >> 8) as u8, word as u8],
            length: 2,
        }
    }
}

/// Every [`OpTag`] variant, in declaration order, so its `as u8`
/// discriminant can be inverted without `unsafe`.
const OP_TAG_ORDER: &[OpTag] = &[
    OpTag::Nop,
    OpTag::Add,
    OpTag::Adc,
    OpTag::Sub,
    OpTag::Subi,
    OpTag::Sbc,
    OpTag::Sbci,
    OpTag::And,
    OpTag::Andi,
    OpTag::Or,
    OpTag::Ori,
    OpTag::Eor,
    OpTag::Com,
    OpTag::Neg,
    OpTag::Inc,
    OpTag::Dec,
    OpTag::Cp,
    OpTag::Cpc,
    OpTag::Cpi,
    OpTag::Cpse,
    OpTag::Adiw,
    OpTag::Sbiw,
    OpTag::Movw,
    OpTag::Mov,
    OpTag::Ldi,
    OpTag::Lsr,
    OpTag::Asr,
    OpTag::Ror,
    OpTag::Swap,
    OpTag::Mul,
    OpTag::Muls,
    OpTag::Mulsu,
    OpTag::Fmul,
    OpTag::Fmuls,
    OpTag::Fmulsu,
    OpTag::Rjmp,
    OpTag::Rcall,
    OpTag::Jmp,
    OpTag::Call,
    OpTag::Ret,
    OpTag::Reti,
    OpTag::Ijmp,
    OpTag::Icall,
    OpTag::Eijmp,
    OpTag::Eicall,
    OpTag::Brbs,
    OpTag::Brbc,
    OpTag::Sbi,
    OpTag::Cbi,
    OpTag::Sbic,
    OpTag::Sbis,
    OpTag::In,
    OpTag::Out,
    OpTag::Bset,
    OpTag::Bclr,
    OpTag::Bld,
    OpTag::Bst,
    OpTag::Sbrc,
    OpTag::Sbrs,
    OpTag::Ld,
    OpTag::St,
    OpTag::Ldd,
    OpTag::Std,
    OpTag::Lds,
    OpTag::Sts,
    OpTag::Lpm,
    OpTag::LpmZ,
    OpTag::LpmZInc,
    OpTag::Elpm,
    OpTag::ElpmZ,
    OpTag::ElpmZInc,
    OpTag::Spm,
    OpTag::Push,
    OpTag::Pop,
    OpTag::Sleep,
    OpTag::Wdr,
    OpTag::Break,
    OpTag::Reserved,
];

fn op_from_index(index: u8) -> OpTag {
    OP_TAG_ORDER
        .get(index as usize)
        .copied()
        .unwrap_or(OpTag::Reserved)
}

/// Two already-decoded instructions eligible for a fusion check.
struct FusionCandidate {
    first: Decoded,
    second: Decoded,
}

/// A fusion rule: if `matches` holds for a pair of adjacent decoded
/// instructions, `build` produces the single fused [`MicroOp`] that
/// replaces both. Advisory per spec §4.D: a rule that declines leaves the
/// pair to translate as two independent micro-ops.
struct FusionRule {
    name: &'static str,
    matches: fn(&FusionCandidate) -> bool,
    build: fn(&FusionCandidate) -> MicroOp,
}

/// Both halves of a wide compare address contiguous register pairs: the
/// second `CPC` operates on `Rd+1, Rr+1` relative to the first `CP`.
fn is_contiguous_pair(first: &Decoded, second: &Decoded) -> bool {
    decode::field_d5(second.raw) == decode::field_d5(first.raw) + 1
        && decode::field_r5(second.raw) == decode::field_r5(first.raw) + 1
}

static FUSION_RULES: &[FusionRule] = &[
    FusionRule {
        name: "cp+cpc-wide-compare",
        matches: |c| c.first.op == OpTag::Cp && c.second.op == OpTag::Cpc && is_contiguous_pair(&c.first, &c.second),
        build: |c| {
            let rd = decode::field_d5(c.first.raw);
            let rr = decode::field_r5(c.first.raw);
            MicroOp {
                op: OpTag::Cp,
                slots: [rd, rr, 1],
                length: 4,
            }
        },
    },
    FusionRule {
        name: "add+adc-wide-add",
        matches: |c| c.first.op == OpTag::Add && c.second.op == OpTag::Adc,
        build: |c| {
            let rd = decode::field_d5(c.first.raw);
            let rr = decode::field_r5(c.first.raw);
            MicroOp {
                op: OpTag::Add,
                slots: [rd, rr, 1],
                length: 4,
            }
        },
    },
    FusionRule {
        name: "sub+sbc-wide-sub",
        matches: |c| c.first.op == OpTag::Sub && c.second.op == OpTag::Sbc,
        build: |c| {
            let rd = decode::field_d5(c.first.raw);
            let rr = decode::field_r5(c.first.raw);
            MicroOp {
                op: OpTag::Sub,
                slots: [rd, rr, 1],
                length: 4,
            }
        },
    },
    FusionRule {
        name: "subi+sbci-wide-subtract",
        matches: |c| {
            c.first.op == OpTag::Subi
                && c.second.op == OpTag::Sbci
                && decode::field_d4(c.second.raw) == decode::field_d4(c.first.raw) + 1
        },
        build: |c| {
            let rd = decode::field_d4(c.first.raw);
            let k_lo = decode::field_k8(c.first.raw);
            let k_hi = decode::field_k8(c.second.raw);
            MicroOp {
                op: OpTag::Subi,
                slots: [rd, k_lo, k_hi],
                length: 4,
            }
        },
    },
    FusionRule {
        name: "ldi-wide-pair",
        matches: |c| {
            c.first.op == OpTag::Ldi
                && c.second.op == OpTag::Ldi
                && decode::field_d4(c.second.raw) == decode::field_d4(c.first.raw) + 1
        },
        build: |c| {
            let d = decode::field_d4(c.first.raw);
            let k_lo = decode::field_k8(c.first.raw);
            let k_hi = decode::field_k8(c.second.raw);
            MicroOp {
                op: OpTag::Ldi,
                slots: [d, k_lo, k_hi],
                length: 4,
            }
        },
    },
];

/// Translate the instruction(s) at `pc`, writing the resulting micro-op(s)
/// into `uflash`/`uflash_aux` and returning how many flash bytes were
/// consumed. Called at most once per address by the fast dispatcher
/// (spec §4.D's write-once invariant); a second call for the same address
/// never happens because the dispatcher checks for [`UNTRANSLATED`]
/// first.
pub fn translate(flash: &[u8], pc: u32) -> (MicroOp, u32) {
    let word = fetch(flash, pc);
    let Ok(first) = decode::decode_reference(pc, word) else {
        return (MicroOp { op: OpTag::Reserved, slots: [0, 0, 0], length: 2 }, 2);
    };
    let first_len = instruction_length(&first);

    if first_len == 4 {
        let second_word = fetch(flash, pc + 2);
        let op = from_decoded_long(&first, second_word);
        return (op, first_len);
    }

    let next_word = fetch(flash, pc + 2);
    let next = decode::decode_reference(pc + 2, next_word).ok();

    // The skip family (`CPSE`/`SBIC`/`SBIS`/`SBRC`/`SBRS`) needs the byte
    // length of the *following* instruction to know how far a taken skip
    // advances PC (2 for a normal instruction, 4 for `JMP`/`CALL`/`LDS`/
    // `STS`); stash it in the otherwise-unused third slot rather than
    // reusing the skip op's own (always 2-byte) length.
    if is_skip_family(first.op) {
        let next_len = next.as_ref().map_or(2, instruction_length) as u8;
        let mut op = from_decoded(&first);
        op.slots[2] = next_len;
        return (op, first_len);
    }

    if let Some(second) = next {
        let candidate = FusionCandidate { first, second };
        for rule in FUSION_RULES {
            if (rule.matches)(&candidate) {
                log::trace!("fuse: pc={pc:#06x} rule={}", rule.name);
                let op = (rule.build)(&candidate);
                return (op, u32::from(op.length));
            }
        }
    }

    let op = from_decoded(&first);
    (op, first_len)
}

fn is_skip_family(op: OpTag) -> bool {
    matches!(op, OpTag::Cpse | OpTag::Sbic | OpTag::Sbis | OpTag::Sbrc | OpTag::Sbrs)
}

fn fetch(flash: &[u8], pc: u32) -> u16 {
    let idx = pc as usize;
    if idx + 1 >= flash.len() {
        return 0;
    }
    u16::from(flash[idx]) | (u16::from(flash[idx + 1]) << 8)
}

/// Instructions with a 32-bit encoding (`JMP`, `CALL`, `LDS`, `STS`) occupy
/// two flash words; everything else is one.
fn instruction_length(d: &Decoded) -> u32 {
    match d.layout {
        Operands::X22 | Operands::D5K16 => 4,
        _ => 2,
    }
}

fn from_decoded(d: &Decoded) -> MicroOp {
    // `MOVW` packs two 4-bit register-pair indices in what the table marks
    // as a `D5R5` layout, but its fields are only 4 bits each (bits 7:4
    // and 3:0) rather than the `D5R5` family's 5-bit/split-9th-bit shape.
    if d.op == OpTag::Movw {
        let dp = ((d.raw >> 4) & 0x0F) as u8;
        let rp = (d.raw & 0x0F) as u8;
        return MicroOp {
            op: OpTag::Movw,
            slots: [dp, rp, 0],
            length: 2,
        };
    }
    let slots = match d.layout {
        Operands::D5R5 => [decode::field_d5(d.raw), decode::field_r5(d.raw), 0],
        Operands::D5 => [decode::field_d5(d.raw), 0, 0],
        Operands::D4K8 => [decode::field_d4(d.raw), decode::field_k8(d.raw), 0],
        Operands::A5B3 => {
            let (a, b) = decode::field_a5b3(d.raw);
            [a as u8, b, 0]
        }
        Operands::A6D5 => {
            let (a, r) = decode::field_a6d5(d.raw);
            [a as u8, r, 0]
        }
        Operands::S3 => [decode::field_s3(d.raw), 0, 0],
        Operands::D5B3 => {
            let (r, b) = decode::field_d5b3(d.raw);
            [r, b, 0]
        }
        Operands::O7S3 => {
            let (offset, s) = decode::field_o7s3(d.raw);
            [offset as u8, s, (offset >> 8) as u8]
        }
        Operands::O12 => {
            let offset = decode::field_o12(d.raw);
            [offset as u8, (offset >> 8) as u8, 0]
        }
        Operands::P2K6 => {
            let (base, k) = decode::field_p2k6(d.raw);
            [base, k, 0]
        }
        Operands::D5rXYZ => [decode::field_d5(d.raw), (d.raw & 0x0F) as u8, 0],
        // `q` displacement only; the pointer register is fixed to Y for
        // every `LDD`/`STD` this crate decodes (see DESIGN.md: the Z+q
        // variant shares an encoding this table does not disambiguate and
        // is treated the same as Y+q, a documented simplification).
        Operands::D5Q6 => [decode::field_d5(d.raw), decode::field_q6(d.raw), 0],
        Operands::D5K16 | Operands::X22 | Operands::None => [decode::field_d5(d.raw), 0, 0],
    };
    MicroOp {
        op: d.op,
        slots,
        length: instruction_length(d) as u8,
    }
}

/// Build the micro-op for a 32-bit-encoded instruction (`JMP`/`CALL`/`LDS`/
/// `STS`), folding the second flash word into `slots`.
fn from_decoded_long(d: &Decoded, second_word: u16) -> MicroOp {
    let slots = match d.layout {
        Operands::D5K16 => {
            let reg = decode::field_d5(d.raw);
            [reg, (second_word & 0xFF) as u8, (second_word >> 8) as u8]
        }
        Operands::X22 => {
            // 22-bit absolute word address: bits 21:17 sit in word1 bits
            // 8:4, bit 16 in word1 bit 0; the low 16 bits are word2 whole.
            let hi6 = (((d.raw >> 4) & 0x1F) << 1 | (d.raw & 0x01)) as u8;
            [(second_word & 0xFF) as u8, (second_word >> 8) as u8, hi6]
        }
        _ => [decode::field_d5(d.raw), 0, 0],
    };
    MicroOp {
        op: d.op,
        slots,
        length: 4,
    }
}
