//! Per-instruction semantics (spec §4.C/§4.E), grouped into
//! addressing-mode and instruction-family helper modules the way other
//! 8-bit CPU cores split their opcode handlers.
//!
//! [`execute`] is the single entry point the fast dispatcher
//! ([`crate::dispatch`]) calls for every cached [`crate::microcode::MicroOp`].
//! Control-flow handlers (`branch`, parts of `control`) set `m.pc` directly;
//! every other handler leaves `pc` alone and the dispatcher advances it by
//! the micro-op's `length` afterward.

mod alu;
mod bitops;
mod branch;
mod control;
mod memops;
mod mul;
mod xfer;

use crate::decode::OpTag;
use crate::microcode::MicroOp;
use crate::state::Machine;

/// Execute one micro-op and return the number of cycles it consumed.
///
/// # Panics
/// Never panics on a well-formed [`MicroOp`] produced by
/// [`crate::microcode::translate`]; `OpTag::Reserved` is handled by the
/// dispatcher before reaching here.
pub fn execute(m: &mut Machine, micro: MicroOp) -> u32 {
    let s = micro.slots;
    match micro.op {
        OpTag::Nop => control::nop(),
        OpTag::Sleep => control::sleep(m),
        OpTag::Wdr => control::wdr(),
        OpTag::Break => control::brk(),

        OpTag::Add => alu::add(m, s[0], s[1], s[2] != 0),
        OpTag::Adc => alu::adc(m, s[0], s[1]),
        OpTag::Sub => alu::sub(m, s[0], s[1], s[2] != 0),
        OpTag::Subi if micro.length == 4 => alu::subi_wide(m, s[0], s[1], s[2]),
        OpTag::Subi => alu::subi(m, s[0], s[1]),
        OpTag::Sbc => alu::sbc(m, s[0], s[1]),
        OpTag::Sbci => alu::sbci(m, s[0], s[1]),
        OpTag::And => alu::and(m, s[0], s[1]),
        OpTag::Andi => alu::andi(m, s[0], s[1]),
        OpTag::Or => alu::or(m, s[0], s[1]),
        OpTag::Ori => alu::ori(m, s[0], s[1]),
        OpTag::Eor => alu::eor(m, s[0], s[1]),
        OpTag::Com => alu::com(m, s[0]),
        OpTag::Neg => alu::neg(m, s[0]),
        OpTag::Inc => alu::inc(m, s[0]),
        OpTag::Dec => alu::dec(m, s[0]),
        OpTag::Cp => alu::cp(m, s[0], s[1], s[2] != 0),
        OpTag::Cpc => alu::cpc(m, s[0], s[1]),
        OpTag::Cpi => alu::cpi(m, s[0], s[1]),
        OpTag::Adiw => alu::adiw(m, s[0], s[1]),
        OpTag::Sbiw => alu::sbiw(m, s[0], s[1]),
        OpTag::Lsr => alu::lsr(m, s[0]),
        OpTag::Asr => alu::asr(m, s[0]),
        OpTag::Ror => alu::ror(m, s[0]),
        OpTag::Swap => alu::swap(m, s[0]),

        OpTag::Mul => mul::mul(m, s[0], s[1]),
        OpTag::Muls => mul::muls(m, s[0], s[1]),
        OpTag::Mulsu => mul::mulsu(m, s[0], s[1]),
        OpTag::Fmul => mul::fmul(m, s[0], s[1]),
        OpTag::Fmuls => mul::fmuls(m, s[0], s[1]),
        OpTag::Fmulsu => mul::fmulsu(m, s[0], s[1]),

        OpTag::Mov => xfer::mov(m, s[0], s[1]),
        OpTag::Movw => xfer::movw(m, s[0], s[1]),
        OpTag::Ldi if micro.length == 4 => xfer::ldi_wide(m, s[0], s[1], s[2]),
        OpTag::Ldi => xfer::ldi(m, s[0], s[1]),

        OpTag::Cpse => branch::cpse(m, s[0], s[1], s[2]),
        OpTag::Rjmp => branch::rjmp(m, s),
        OpTag::Rcall => branch::rcall(m, s, micro.length),
        OpTag::Jmp => branch::jmp(m, s),
        OpTag::Call => branch::call(m, s, micro.length),
        OpTag::Ret => branch::ret(m),
        OpTag::Reti => branch::reti(m),
        OpTag::Ijmp => branch::ijmp(m),
        OpTag::Icall => branch::icall(m, micro.length),
        OpTag::Eijmp => branch::eijmp(m),
        OpTag::Eicall => branch::eicall(m, micro.length),
        OpTag::Brbs => branch::brbs(m, s),
        OpTag::Brbc => branch::brbc(m, s),

        OpTag::Sbi => bitops::sbi(m, s[0], s[1]),
        OpTag::Cbi => bitops::cbi(m, s[0], s[1]),
        OpTag::Sbic => bitops::sbic(m, s[0], s[1], s[2]),
        OpTag::Sbis => bitops::sbis(m, s[0], s[1], s[2]),
        OpTag::Bset => bitops::bset(m, s[0]),
        OpTag::Bclr => bitops::bclr(m, s[0]),
        OpTag::Bld => bitops::bld(m, s[0], s[1]),
        OpTag::Bst => bitops::bst(m, s[0], s[1]),
        OpTag::Sbrc => bitops::sbrc(m, s[0], s[1], s[2]),
        OpTag::Sbrs => bitops::sbrs(m, s[0], s[1], s[2]),

        OpTag::In => memops::in_(m, s[0], s[1]),
        OpTag::Out => memops::out(m, s[0], s[1]),
        OpTag::Push => memops::push(m, s[0]),
        OpTag::Pop => memops::pop(m, s[0]),
        OpTag::Ld => memops::ld(m, s[0], s[1]),
        OpTag::St => memops::st(m, s[0], s[1]),
        OpTag::Ldd => memops::ldd(m, s[0], s[1]),
        OpTag::Std => memops::std_(m, s[0], s[1]),
        OpTag::Lds => memops::lds(m, s[0], s[1], s[2]),
        OpTag::Sts => memops::sts(m, s[0], s[1], s[2]),
        OpTag::Lpm => memops::lpm(m),
        OpTag::LpmZ => memops::lpm_z(m, s[0], false),
        OpTag::LpmZInc => memops::lpm_z(m, s[0], true),
        OpTag::Elpm => memops::elpm(m),
        OpTag::ElpmZ => memops::elpm_z(m, s[0], false),
        OpTag::ElpmZInc => memops::elpm_z(m, s[0], true),
        OpTag::Spm => memops::spm(),

        OpTag::Reserved => unreachable!("dispatcher must crash before executing a Reserved micro-op"),
    }
}
