//! RISC-V (RV64GC) decoder and encoder.
//!
//! Driven by [`crate::riscv_tables`]. An instruction whose low two bits are
//! `11` is a 32-bit word; anything else is a 16-bit compressed halfword.
//! Compressed instructions are separate opcodes (`c.addi`, `c.lw`, ...), so
//! the encoder never substitutes one form for the other.
//!
//! ## Operand conventions
//!
//! ```text
//!   addi a0, a1, -1          dst [a0]          src [a1, #-1]
//!   lui a0, 0x12345          dst [a0]          src [#0x12345000]
//!   sd ra, 8(sp)             dst [[sp+8]]      src [ra]
//!   beq a0, a1, L            dst []            src [a0, a1, L]
//!   jalr ra, 0(a0)           dst [ra]          src [a0, #0]
//!   amoadd.w a0, a1, (a2)    dst [a0, [a2]]    src [[a2], a1, #aqrl]
//!   fadd.d fa0, fa1, fa2     dst [fa0]         src [fa1, fa2, #rm]
//!   fmadd.s f0, f1, f2, f3   dst [f0]          src [f1, f2, f3, #rm]
//!   c.addi a0, 4             dst [a0]          src [a0, #4]
//!   c.lwsp a0, 12(sp)        dst [a0]          src [[sp+12]]
//! ```
//!
//! `lui`, `auipc` and `c.lui` carry the immediate already shifted into place.
//! Branch and jump targets are relative to the instruction's own address.
//! Nothing is predicated.

use crate::decode::{apply_entry, read_u16, read_u32, sext, Level};
use crate::encode::{encode_chain, fits_signed, verify, Cursor, InstrBytes, Word};
use crate::error::IrError;
use crate::instr::{Eflags, Instr, Opcode, OperandList, Predicate};
use crate::isa::{Arch, IsaMode};
use crate::opnd::{Operand, OpndFlags};
use crate::reg::{rv, Reg, RegClass};
use crate::size::OpSize;
use crate::table::{find_head, resolve, Flags, OpInfo, Slot};
use crate::riscv_tables::{RvExt, RvLayout, RvTy};

// ── Scattered immediates ─────────────────────────────────────────────────

/// An immediate split across the instruction as `(instruction bit, width,
/// value bit)` pieces. The pieces cover value bits from the lowest `value
/// bit` up to `width - 1` without gaps.
struct Imm {
    pieces: &'static [(u32, u32, u32)],
    width: u32,
    signed: bool,
}

impl Imm {
    fn extract(&self, word: u32) -> i64 {
        let raw = self
            .pieces
            .iter()
            .fold(0u32, |acc, &(at, width, to)| acc | (((word >> at) & ((1 << width) - 1)) << to));
        if self.signed {
            sext(raw, self.width)
        } else {
            raw as i64
        }
    }

    /// Low value bits no piece covers; they must be zero.
    fn align(&self) -> u32 {
        self.pieces.iter().map(|&(_, _, to)| to).min().unwrap_or(0)
    }
}

const IMM_I: Imm = Imm { pieces: &[(20, 12, 0)], width: 12, signed: true };
const IMM_S: Imm = Imm { pieces: &[(7, 5, 0), (25, 7, 5)], width: 12, signed: true };
const IMM_B: Imm = Imm {
    pieces: &[(8, 4, 1), (25, 6, 5), (7, 1, 11), (31, 1, 12)],
    width: 13,
    signed: true,
};
const IMM_J: Imm = Imm {
    pieces: &[(21, 10, 1), (20, 1, 11), (12, 8, 12), (31, 1, 20)],
    width: 21,
    signed: true,
};
const C_IMM6: Imm = Imm { pieces: &[(2, 5, 0), (12, 1, 5)], width: 6, signed: true };
const C_SHAMT: Imm = Imm { pieces: &[(2, 5, 0), (12, 1, 5)], width: 6, signed: false };
const C_SP16: Imm = Imm {
    pieces: &[(6, 1, 4), (2, 1, 5), (5, 1, 6), (3, 2, 7), (12, 1, 9)],
    width: 10,
    signed: true,
};
const C_SPN: Imm = Imm {
    pieces: &[(6, 1, 2), (5, 1, 3), (11, 2, 4), (7, 4, 6)],
    width: 10,
    signed: false,
};
const C_MEM_W: Imm = Imm { pieces: &[(6, 1, 2), (10, 3, 3), (5, 1, 6)], width: 7, signed: false };
const C_MEM_D: Imm = Imm { pieces: &[(10, 3, 3), (5, 2, 6)], width: 8, signed: false };
const C_LWSP: Imm = Imm { pieces: &[(4, 3, 2), (12, 1, 5), (2, 2, 6)], width: 8, signed: false };
const C_LDSP: Imm = Imm { pieces: &[(5, 2, 3), (12, 1, 5), (2, 3, 6)], width: 9, signed: false };
const C_SWSP: Imm = Imm { pieces: &[(9, 4, 2), (7, 2, 6)], width: 8, signed: false };
const C_SDSP: Imm = Imm { pieces: &[(10, 3, 3), (7, 3, 6)], width: 9, signed: false };
const C_J: Imm = Imm {
    pieces: &[(3, 3, 1), (11, 1, 4), (2, 1, 5), (7, 1, 6), (6, 1, 7), (9, 2, 8), (8, 1, 10), (12, 1, 11)],
    width: 12,
    signed: true,
};
const C_B: Imm = Imm {
    pieces: &[(3, 2, 1), (10, 2, 3), (2, 1, 5), (5, 2, 6), (12, 1, 8)],
    width: 9,
    signed: true,
};

// ── Row selection ────────────────────────────────────────────────────────

/// Row of a `kind` table for instruction `w` (a word, or a zero-extended
/// halfword for the compressed kinds).
fn select(kind: RvExt, w: u32) -> usize {
    let bits = |lo: u32, width: u32| ((w >> lo) & ((1 << width) - 1)) as usize;
    match kind {
        RvExt::Top => bits(2, 5),
        RvExt::Funct3 => bits(12, 3),
        RvExt::Funct3Funct7 => {
            let class = match w >> 25 {
                0x00 => 0,
                0x01 => 1,
                0x20 => 2,
                _ => 3,
            };
            class * 8 + bits(12, 3)
        }
        RvExt::Funct7Rv => match w >> 25 {
            0x00 => 0,
            0x01 => 1,
            0x20 => 2,
            _ => 3,
        },
        RvExt::Funct6 => match w >> 26 {
            0x00 => 0,
            0x10 => 1,
            _ => 2,
        },
        RvExt::Funct5 => bits(27, 5),
        RvExt::Imm12 => {
            if w & 0x000f_8f80 != 0 {
                2
            } else {
                (w >> 20).min(2) as usize
            }
        }
        RvExt::Funct7 => bits(25, 7),
        RvExt::Fmt => bits(25, 2),
        RvExt::Rs2 => bits(20, 5),
        RvExt::CQuad => bits(0, 2),
        RvExt::CFunct3 => bits(13, 3),
        RvExt::CZero => usize::from(w != 0),
        RvExt::CSpRd => usize::from(bits(7, 5) == 2),
        RvExt::CFunct2 => bits(10, 2),
        RvExt::CArith => (bits(12, 1) << 2) | bits(5, 2),
        RvExt::CBit12 => match (bits(12, 1), bits(7, 5), bits(2, 5)) {
            (0, _, 0) => 0,
            (0, _, _) => 1,
            (_, 0, 0) => 2,
            (_, _, 0) => 3,
            _ => 4,
        },
    }
}

// ── Decoding ─────────────────────────────────────────────────────────────

struct Fields {
    word: u32,
    pc: u64,
}

impl Fields {
    fn get(&self, lo: u32, width: u32) -> u32 {
        (self.word >> lo) & ((1 << width) - 1)
    }

    fn invalid(&self) -> IrError {
        IrError::InvalidEncoding {
            mode: IsaMode::Riscv64,
            pc: self.pc,
            word: self.word,
        }
    }

    fn x(&self, lo: u32) -> Reg {
        rv::x(self.get(lo, 5) as u8)
    }

    fn f(&self, lo: u32) -> Operand {
        Operand::reg(rv::f(self.get(lo, 5) as u8))
    }

    /// x8..x15 from a 3-bit field.
    fn x_prime(&self, lo: u32) -> Reg {
        rv::x(8 + self.get(lo, 3) as u8)
    }

    fn f_prime(&self, lo: u32) -> Operand {
        Operand::reg(rv::f(8 + self.get(lo, 3) as u8))
    }

    fn x_nonzero(&self, lo: u32) -> Result<Operand, IrError> {
        match self.get(lo, 5) {
            0 => Err(self.invalid()),
            n => Ok(Operand::reg(rv::x(n as u8))),
        }
    }

    fn nonzero(&self, imm: &Imm) -> Result<i64, IrError> {
        match imm.extract(self.word) {
            0 => Err(self.invalid()),
            v => Ok(v),
        }
    }

    fn target(&self, imm: &Imm) -> Operand {
        Operand::pc(self.pc.wrapping_add(imm.extract(self.word) as u64))
    }

    fn mem(&self, base: Reg, imm: &Imm, size: OpSize) -> Operand {
        Operand::base_disp(base, Reg::NULL, 0, imm.extract(self.word) as i32, size)
    }

    fn operand(&self, slot: Slot<RvTy>, out: &mut OperandList) -> Result<(), IrError> {
        let size = slot.size;
        let op = match slot.ty {
            RvTy::None => return Ok(()),
            RvTy::Rd => Operand::reg(self.x(7)),
            RvTy::Rs1 => Operand::reg(self.x(15)),
            RvTy::Rs2 => Operand::reg(self.x(20)),
            RvTy::Fd => self.f(7),
            RvTy::Fs1 => self.f(15),
            RvTy::Fs2 => self.f(20),
            RvTy::Fs3 => self.f(27),
            RvTy::ImmI => Operand::imm_int(IMM_I.extract(self.word), size),
            RvTy::ImmU => Operand::imm_int(sext(self.word & 0xffff_f000, 32), size),
            RvTy::Shamt6 => Operand::imm_uint(self.get(20, 6) as u64, OpSize::Bits(6)),
            RvTy::Shamt5 => Operand::imm_uint(self.get(20, 5) as u64, OpSize::Bits(5)),
            RvTy::PcB => self.target(&IMM_B),
            RvTy::PcJ => self.target(&IMM_J),
            RvTy::Csr => Operand::imm_uint(self.get(20, 12) as u64, size),
            RvTy::Uimm5 => Operand::imm_uint(self.get(15, 5) as u64, OpSize::Bits(5)),
            RvTy::Rm => match self.get(12, 3) {
                5 | 6 => return Err(self.invalid()),
                rm => Operand::imm_uint(rm as u64, OpSize::Bits(3)),
            },
            RvTy::Pred => Operand::imm_uint(self.get(24, 4) as u64, size),
            RvTy::Succ => Operand::imm_uint(self.get(20, 4) as u64, size),
            RvTy::AqRl => Operand::imm_uint(self.get(25, 2) as u64, OpSize::Bits(2)),
            RvTy::MemI => self.mem(self.x(15), &IMM_I, size),
            RvTy::MemS => self.mem(self.x(15), &IMM_S, size),
            RvTy::MemAmo => Operand::base_disp(self.x(15), Reg::NULL, 0, 0, size),
            RvTy::CRd => Operand::reg(self.x(7)),
            RvTy::CRdNz => self.x_nonzero(7)?,
            RvTy::CRs2 => Operand::reg(self.x(2)),
            RvTy::CFd => self.f(7),
            RvTy::CFs2 => self.f(2),
            RvTy::CRdP | RvTy::CRs2P => Operand::reg(self.x_prime(2)),
            RvTy::CRs1P => Operand::reg(self.x_prime(7)),
            RvTy::CFdP | RvTy::CFs2P => self.f_prime(2),
            RvTy::Sp => Operand::reg(rv::SP),
            RvTy::Ra => Operand::reg(rv::RA),
            RvTy::CImm6 => Operand::imm_int(C_IMM6.extract(self.word), size),
            RvTy::CShamt => Operand::imm_uint(C_SHAMT.extract(self.word) as u64, size),
            RvTy::CLui => Operand::imm_int(self.nonzero(&C_IMM6)? << 12, size),
            RvTy::CSp16 => Operand::imm_int(self.nonzero(&C_SP16)?, size),
            RvTy::CSpn => Operand::imm_uint(self.nonzero(&C_SPN)? as u64, size),
            RvTy::CMemW => self.mem(self.x_prime(7), &C_MEM_W, size),
            RvTy::CMemD => self.mem(self.x_prime(7), &C_MEM_D, size),
            RvTy::CLwsp => self.mem(rv::SP, &C_LWSP, size),
            RvTy::CLdsp => self.mem(rv::SP, &C_LDSP, size),
            RvTy::CSwsp => self.mem(rv::SP, &C_SWSP, size),
            RvTy::CSdsp => self.mem(rv::SP, &C_SDSP, size),
            RvTy::CPcJ => self.target(&C_J),
            RvTy::CPcB => self.target(&C_B),
        };
        out.push(op);
        Ok(())
    }
}

/// Decode one instruction at the start of `bytes`. Returns its length.
pub(crate) fn decode(bytes: &[u8], pc: u64, instr: &mut Instr<'_>, level: Level) -> Result<usize, IrError> {
    let half = read_u16(bytes)?;
    let (word, len, root) = if half & 3 != 3 {
        (half as u32, 2, (RvExt::CQuad, 0))
    } else {
        (read_u32(bytes)?, 4, (RvExt::Top, 0))
    };
    if level == Level::Raw {
        return Ok(len);
    }
    let fields = Fields { word, pc };
    let Some((_, info)) = resolve::<RvLayout>(IsaMode::Riscv64, root, |kind| Ok(select(kind, word)))? else {
        return Err(fields.invalid());
    };
    if !info.has_fixed_ones(word) {
        return Err(fields.invalid());
    }
    apply_entry(instr, info, Predicate::None, level, |slot, out| fields.operand(slot, out))?;
    Ok(len)
}

/// Status-flag usage and default predicate of an opcode: RISC-V has neither.
pub(crate) fn defaults(opcode: Opcode) -> Option<(Eflags, Predicate)> {
    let (_, info) = find_head::<RvLayout>(opcode)?;
    Some((info.eflags, Predicate::None))
}

// ── Encoding ─────────────────────────────────────────────────────────────

fn reg_num(op: &Operand, class: RegClass) -> Option<u32> {
    match op {
        Operand::Reg { reg, .. } if reg.arch() == Some(Arch::Riscv) && reg.class() == class => {
            Some(reg.number() as u32)
        }
        _ => None,
    }
}

fn imm(op: &Operand) -> Option<i64> {
    match op {
        Operand::ImmInt { value, .. } => Some(*value),
        _ => None,
    }
}

/// Base register of a memory operand.
#[derive(Clone, Copy)]
enum Base {
    /// rs1, bits 19:15.
    Rs1,
    /// x8..x15 in bits 9:7.
    Prime,
    /// Implicit `sp`.
    Sp,
}

/// Per-attempt encoder state.
struct Encoder {
    word: Word,
    pc: u64,
}

impl Encoder {
    fn mismatch(&self) -> IrError {
        IrError::NoMatchingEncoding {
            opcode: self.word.opcode,
        }
    }

    fn reg(&mut self, op: &Operand, class: RegClass, lo: u32) -> Result<(), IrError> {
        let n = reg_num(op, class).ok_or_else(|| self.mismatch())?;
        self.word.put(lo, 5, n)
    }

    fn prime(&mut self, op: &Operand, class: RegClass, lo: u32) -> Result<(), IrError> {
        let n = reg_num(op, class).ok_or_else(|| self.mismatch())?;
        if !(8..16).contains(&n) {
            return Err(self.word.illegal("compressed register must be x8-x15 or f8-f15"));
        }
        self.word.put(lo, 3, n - 8)
    }

    fn nonzero_reg(&mut self, op: &Operand) -> Result<(), IrError> {
        if reg_num(op, RegClass::Gpr) == Some(0) {
            return Err(self.word.illegal("register must not be x0"));
        }
        self.reg(op, RegClass::Gpr, 7)
    }

    fn implicit(&self, op: &Operand, want: Reg) -> Result<(), IrError> {
        match op {
            Operand::Reg { reg, .. } if *reg == want => Ok(()),
            _ => Err(self.mismatch()),
        }
    }

    fn value(&self, op: &Operand) -> Result<i64, IrError> {
        imm(op).ok_or_else(|| self.mismatch())
    }

    fn put_imm(&mut self, imm: &Imm, value: i64) -> Result<(), IrError> {
        let align = imm.align();
        if value & ((1 << align) - 1) != 0 {
            return Err(self.word.illegal("immediate is not suitably aligned"));
        }
        let fits = if imm.signed {
            fits_signed(value, imm.width)
        } else {
            (0..1i64 << imm.width).contains(&value)
        };
        if !fits {
            return Err(self.word.out_of_range(value, imm.width));
        }
        let raw = value as u32;
        for &(at, width, from) in imm.pieces {
            self.word.put(at, width, (raw >> from) & ((1 << width) - 1))?;
        }
        Ok(())
    }

    fn put_nonzero(&mut self, imm: &Imm, value: i64) -> Result<(), IrError> {
        if value == 0 {
            return Err(self.word.illegal("immediate must be nonzero"));
        }
        self.put_imm(imm, value)
    }

    fn field(&mut self, op: &Operand, lo: u32, width: u32) -> Result<(), IrError> {
        let v = self.value(op)?;
        if !(0..1i64 << width).contains(&v) {
            return Err(self.word.out_of_range(v, width));
        }
        self.word.put(lo, width, v as u32)
    }

    fn upper(&mut self, value: i64) -> Result<(), IrError> {
        if value & 0xfff != 0 {
            return Err(self.word.illegal("upper immediate has low bits set"));
        }
        if !fits_signed(value, 32) {
            return Err(self.word.out_of_range(value, 32));
        }
        self.word.put(12, 20, (value as u32) >> 12)
    }

    fn target(&mut self, op: &Operand, imm: &Imm) -> Result<(), IrError> {
        let Operand::Pc { target, selector: None } = op else {
            return Err(self.mismatch());
        };
        let off = target.wrapping_sub(self.pc) as i64;
        self.put_imm(imm, off)
    }

    fn mem(&mut self, op: &Operand, base: Base, imm: Option<&Imm>) -> Result<(), IrError> {
        let Operand::BaseDisp(m) = op else {
            return Err(self.mismatch());
        };
        if !m.index.is_null() || m.flags.contains(OpndFlags::NEGATED) {
            return Err(self.mismatch());
        }
        let base_op = Operand::reg(m.base);
        match base {
            Base::Rs1 => self.reg(&base_op, RegClass::Gpr, 15)?,
            Base::Prime => self.prime(&base_op, RegClass::Gpr, 7)?,
            Base::Sp => self.implicit(&base_op, rv::SP)?,
        }
        match imm {
            Some(imm) => self.put_imm(imm, m.disp as i64),
            None if m.disp == 0 => Ok(()),
            None => Err(self.word.illegal("atomic access takes no offset")),
        }
    }

    fn operand(&mut self, slot: Slot<RvTy>, op: &Operand) -> Result<(), IrError> {
        use RegClass::{Fp, Gpr};
        match slot.ty {
            RvTy::None => Ok(()),
            RvTy::Rd => self.reg(op, Gpr, 7),
            RvTy::Rs1 => self.reg(op, Gpr, 15),
            RvTy::Rs2 => self.reg(op, Gpr, 20),
            RvTy::Fd => self.reg(op, Fp, 7),
            RvTy::Fs1 => self.reg(op, Fp, 15),
            RvTy::Fs2 => self.reg(op, Fp, 20),
            RvTy::Fs3 => self.reg(op, Fp, 27),
            RvTy::ImmI => {
                let v = self.value(op)?;
                self.put_imm(&IMM_I, v)
            }
            RvTy::ImmU => {
                let v = self.value(op)?;
                self.upper(v)
            }
            RvTy::Shamt6 => self.field(op, 20, 6),
            RvTy::Shamt5 => self.field(op, 20, 5),
            RvTy::PcB => self.target(op, &IMM_B),
            RvTy::PcJ => self.target(op, &IMM_J),
            RvTy::Csr => self.field(op, 20, 12),
            RvTy::Uimm5 => self.field(op, 15, 5),
            RvTy::Rm => {
                if matches!(imm(op), Some(5 | 6)) {
                    return Err(self.word.illegal("reserved rounding mode"));
                }
                self.field(op, 12, 3)
            }
            RvTy::Pred => self.field(op, 24, 4),
            RvTy::Succ => self.field(op, 20, 4),
            RvTy::AqRl => self.field(op, 25, 2),
            RvTy::MemI => self.mem(op, Base::Rs1, Some(&IMM_I)),
            RvTy::MemS => self.mem(op, Base::Rs1, Some(&IMM_S)),
            RvTy::MemAmo => self.mem(op, Base::Rs1, None),
            RvTy::CRd => self.reg(op, Gpr, 7),
            RvTy::CRdNz => self.nonzero_reg(op),
            RvTy::CRs2 => self.reg(op, Gpr, 2),
            RvTy::CFd => self.reg(op, Fp, 7),
            RvTy::CFs2 => self.reg(op, Fp, 2),
            RvTy::CRdP | RvTy::CRs2P => self.prime(op, Gpr, 2),
            RvTy::CRs1P => self.prime(op, Gpr, 7),
            RvTy::CFdP | RvTy::CFs2P => self.prime(op, Fp, 2),
            RvTy::Sp => self.implicit(op, rv::SP),
            RvTy::Ra => self.implicit(op, rv::RA),
            RvTy::CImm6 => {
                let v = self.value(op)?;
                self.put_imm(&C_IMM6, v)
            }
            RvTy::CShamt => {
                let v = self.value(op)?;
                self.put_imm(&C_SHAMT, v)
            }
            RvTy::CLui => {
                let v = self.value(op)?;
                if v & 0xfff != 0 {
                    return Err(self.word.illegal("upper immediate has low bits set"));
                }
                self.put_nonzero(&C_IMM6, v >> 12)
            }
            RvTy::CSp16 => {
                let v = self.value(op)?;
                self.put_nonzero(&C_SP16, v)
            }
            RvTy::CSpn => {
                let v = self.value(op)?;
                self.put_nonzero(&C_SPN, v)
            }
            RvTy::CMemW => self.mem(op, Base::Prime, Some(&C_MEM_W)),
            RvTy::CMemD => self.mem(op, Base::Prime, Some(&C_MEM_D)),
            RvTy::CLwsp => self.mem(op, Base::Sp, Some(&C_LWSP)),
            RvTy::CLdsp => self.mem(op, Base::Sp, Some(&C_LDSP)),
            RvTy::CSwsp => self.mem(op, Base::Sp, Some(&C_SWSP)),
            RvTy::CSdsp => self.mem(op, Base::Sp, Some(&C_SDSP)),
            RvTy::CPcJ => self.target(op, &C_J),
            RvTy::CPcB => self.target(op, &C_B),
        }
    }
}

fn encode_entry(instr: &Instr<'_>, info: &OpInfo<RvLayout>, pc: u64) -> Result<u32, IrError> {
    let mut enc = Encoder {
        word: Word::new(instr.opcode(), info.bits),
        pc,
    };
    if !matches!(instr.predicate(), Predicate::None | Predicate::Always) {
        return Err(enc.word.illegal("RISC-V instructions are not predicated"));
    }
    let mut cur = Cursor::new(instr);
    for (slot, dir) in info.slots() {
        let op = cur.next(dir).ok_or_else(|| enc.mismatch())?;
        enc.operand(slot, &op)?;
    }
    if !cur.is_done() || !info.matches(enc.word.bits) {
        return Err(enc.mismatch());
    }
    Ok(enc.word.bits)
}

/// Encode `instr` for address `pc`.
pub(crate) fn encode(instr: &Instr<'_>, pc: u64) -> Result<InstrBytes, IrError> {
    let opcode = instr.opcode();
    let head = find_head::<RvLayout>(opcode).map(|(_, info)| info);
    encode_chain(opcode, head, |info| {
        let word = encode_entry(instr, info, pc)?;
        let len = if info.flags.contains(Flags::COMPRESSED) { 2 } else { 4 };
        let bytes = InstrBytes::from_slice(&word.to_le_bytes()[..len]);
        let fit = verify(instr, &bytes, pc)?;
        Ok((bytes, fit))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::decode_in;
    use crate::riscv_tables::RvOp;

    const PC: u64 = 0x1_0000;

    fn dis_bytes(bytes: &[u8]) -> Instr<'static> {
        let mut instr = Instr::new(IsaMode::Riscv64);
        decode_in(IsaMode::Riscv64, bytes, PC, &mut instr, Level::Full)
            .unwrap_or_else(|e| panic!("{:02x?}: {}", bytes, e));
        instr.into_static()
    }

    fn dis(word: u32) -> Instr<'static> {
        dis_bytes(&word.to_le_bytes())
    }

    fn dis16(half: u16) -> Instr<'static> {
        dis_bytes(&half.to_le_bytes())
    }

    fn asm(instr: &Instr<'_>) -> Vec<u8> {
        let b = encode(instr, PC).unwrap_or_else(|e| panic!("{}: {}", instr.opcode(), e));
        (0..b.len()).map(|i| b[i]).collect()
    }

    fn build(op: RvOp, dsts: &[Operand], srcs: &[Operand]) -> Instr<'static> {
        Instr::build(IsaMode::Riscv64, Opcode::Rv(op), dsts, srcs)
    }

    fn x(n: u8) -> Operand {
        Operand::reg(rv::x(n))
    }

    fn f(n: u8) -> Operand {
        Operand::reg(rv::f(n))
    }

    fn imm(v: i64) -> Operand {
        Operand::imm_int(v, OpSize::B8)
    }

    fn mem(base: u8, disp: i32, size: OpSize) -> Operand {
        Operand::base_disp(rv::x(base), Reg::NULL, 0, disp, size)
    }

    fn invalid(bytes: &[u8]) -> bool {
        let mut instr = Instr::new(IsaMode::Riscv64);
        matches!(
            decode_in(IsaMode::Riscv64, bytes, PC, &mut instr, Level::Full),
            Err(IrError::InvalidEncoding { .. })
        )
    }

    fn roundtrip_bytes(bytes: &[u8]) {
        let instr = dis_bytes(bytes);
        let fresh = Instr::build(IsaMode::Riscv64, instr.opcode(), instr.dsts(), instr.srcs());
        assert_eq!(asm(&fresh), bytes, "{}", instr.opcode());
    }

    fn roundtrip(word: u32) {
        roundtrip_bytes(&word.to_le_bytes());
    }

    fn roundtrip16(half: u16) {
        roundtrip_bytes(&half.to_le_bytes());
    }

    #[test]
    fn length_follows_the_low_bits() {
        let mut instr = Instr::new(IsaMode::Riscv64);
        assert_eq!(decode_in(IsaMode::Riscv64, &[0x05, 0x05], PC, &mut instr, Level::Raw), Ok(2));
        assert_eq!(
            decode_in(IsaMode::Riscv64, &[0x13, 0x05, 0x15, 0x00], PC, &mut instr, Level::Raw),
            Ok(4)
        );
        assert_eq!(
            decode_in(IsaMode::Riscv64, &[0x13, 0x05], PC, &mut instr, Level::Raw),
            Err(IrError::Truncated {
                needed: 4,
                available: 2
            })
        );
    }

    #[test]
    fn integer_immediates() {
        // addi a0, a1, -1
        let addi = dis(0xfff5_8513);
        assert_eq!(addi.opcode(), Opcode::Rv(RvOp::Addi));
        assert_eq!(addi.dst(0), x(10));
        assert_eq!(addi.src(0), x(11));
        assert_eq!(addi.src(1).imm_value(), -1);
        // lui a0, 0x80000 loads a negative value
        let lui = dis(0x8000_0537);
        assert_eq!(lui.src(0).imm_value(), -0x8000_0000);
        // srai a0, a0, 63
        let srai = dis(0x43f5_5513);
        assert_eq!(srai.opcode(), Opcode::Rv(RvOp::Srai));
        assert_eq!(srai.src(1).imm_value(), 63);
        for w in [0xfff5_8513, 0x8000_0537, 0x43f5_5513, 0x0015_1513, 0x0010_0517, 0x41f5_551b] {
            roundtrip(w);
        }
    }

    #[test]
    fn register_groups() {
        assert_eq!(dis(0x00c5_8533).opcode(), Opcode::Rv(RvOp::Add));
        assert_eq!(dis(0x40c5_8533).opcode(), Opcode::Rv(RvOp::Sub));
        assert_eq!(dis(0x02c5_8533).opcode(), Opcode::Rv(RvOp::Mul));
        assert_eq!(dis(0x02c5_c53b).opcode(), Opcode::Rv(RvOp::Divw));
        // funct7 0x40 is unallocated
        assert!(invalid(&0x80c5_8533u32.to_le_bytes()));
        for w in [0x00c5_8533, 0x40c5_8533, 0x02c5_f533, 0x40c5_d53b, 0x02c5_f53b] {
            roundtrip(w);
        }
    }

    #[test]
    fn loads_and_stores() {
        // ld a0, -8(sp)
        let ld = dis(0xff81_3503);
        assert_eq!(ld.src(0), mem(2, -8, OpSize::B8));
        // sd ra, 8(sp)
        let sd = dis(0x0011_3423);
        assert_eq!(sd.dst(0), mem(2, 8, OpSize::B8));
        assert_eq!(sd.src(0), x(1));
        for w in [0xff81_3503, 0x0011_3423, 0x0041_4503, 0xfea1_2e23, 0x0085_3787, 0x00f5_3427] {
            roundtrip(w);
        }
        let too_far = build(RvOp::Ld, &[x(10)], &[mem(2, 2048, OpSize::B8)]);
        assert!(matches!(encode(&too_far, PC), Err(IrError::OperandOutOfRange { .. })));
    }

    #[test]
    fn control_transfers() {
        // beq a0, a1, -4
        let beq = dis(0xfeb5_0ee3);
        assert_eq!(beq.src(2), Operand::pc(PC - 4));
        // jal ra, +2048
        let jal = dis(0x0010_00ef);
        assert_eq!(jal.dst(0), x(1));
        assert_eq!(jal.src(0), Operand::pc(PC + 2048));
        // jalr zero, 0(ra)
        let ret = dis(0x0000_8067);
        assert_eq!(ret.srcs(), &[x(1), Operand::imm_int(0, OpSize::Bits(12))]);
        for w in [0xfeb5_0ee3, 0x0010_00ef, 0x0000_8067, 0x8000_006f] {
            roundtrip(w);
        }
        let odd = build(RvOp::Jal, &[x(0)], &[Operand::pc(PC + 3)]);
        assert!(matches!(encode(&odd, PC), Err(IrError::IllegalOperand { .. })));
        let far = build(RvOp::Beq, &[], &[x(1), x(2), Operand::pc(PC + 4096)]);
        assert!(matches!(encode(&far, PC), Err(IrError::OperandOutOfRange { .. })));
    }

    #[test]
    fn system_and_fences() {
        assert_eq!(dis(0x0000_0073).opcode(), Opcode::Rv(RvOp::Ecall));
        assert_eq!(dis(0x0010_0073).opcode(), Opcode::Rv(RvOp::Ebreak));
        assert!(invalid(&0x0020_0073u32.to_le_bytes()));
        // csrrs a0, fflags, zero
        let frflags = dis(0x0010_2573);
        assert_eq!(frflags.src(0).imm_value(), 1);
        let fence = dis(0x0ff0_000f);
        assert_eq!(fence.src(0).imm_value(), 0xf);
        assert_eq!(fence.src(1).imm_value(), 0xf);
        for w in [0x0000_0073, 0x0010_0073, 0x0010_2573, 0x3400_5073, 0x0ff0_000f, 0x0000_100f] {
            roundtrip(w);
        }
    }

    #[test]
    fn atomics() {
        // amoadd.w.aqrl a0, a1, (a2)
        let amo = dis(0x06b6_252f);
        assert_eq!(amo.opcode(), Opcode::Rv(RvOp::AmoaddW));
        assert_eq!(amo.dst(1), mem(12, 0, OpSize::B4));
        assert_eq!(amo.src(2).imm_value(), 3);
        // lr.d a0, (a1)
        let lr = dis(0x1005_b52f);
        assert_eq!(lr.opcode(), Opcode::Rv(RvOp::LrD));
        for w in [0x06b6_252f, 0x1005_b52f, 0x18b6_352f, 0x08b6_352f] {
            roundtrip(w);
        }
        let offset = build(RvOp::AmoswapD, &[x(10), mem(12, 8, OpSize::B8)], &[mem(12, 8, OpSize::B8), x(11), imm(0)]);
        assert!(encode(&offset, PC).is_err());
    }

    #[test]
    fn floating_point() {
        // fadd.d fa0, fa1, fa2 (dynamic rounding)
        let fadd = dis(0x02c5_f553);
        assert_eq!(fadd.opcode(), Opcode::Rv(RvOp::FaddD));
        assert_eq!(fadd.srcs()[..2], [f(11), f(12)]);
        assert_eq!(fadd.src(2).imm_value(), 7);
        // fmadd.s f0, f1, f2, f3 with rne
        let fma = dis(0x1820_8043);
        assert_eq!(fma.num_srcs(), 4);
        assert_eq!(fma.src(2), f(3));
        // fcvt.l.d a0, fa0, rtz
        let cvt = dis(0xc225_1553);
        assert_eq!(cvt.opcode(), Opcode::Rv(RvOp::FcvtLD));
        assert_eq!(cvt.dst(0), x(10));
        // rounding modes 5 and 6 are reserved
        assert!(invalid(&0x02c5_d553u32.to_le_bytes()));
        for w in [
            0x02c5_f553, 0x1820_8043, 0xc225_1553, 0xe005_0553, 0xf205_0553, 0xa2b5_2553, 0x4015_7553,
            0x22b5_8553, 0x5a05_f553,
        ] {
            roundtrip(w);
        }
    }

    #[test]
    fn compressed_forms() {
        // c.addi a0, -1
        let addi = dis16(0x157d);
        assert_eq!(addi.opcode(), Opcode::Rv(RvOp::CAddi));
        assert_eq!(addi.srcs(), &[x(10), Operand::imm_int(-1, OpSize::Bits(6))]);
        // c.lwsp a0, 12(sp)
        let lwsp = dis16(0x4532);
        assert_eq!(lwsp.src(0), mem(2, 12, OpSize::B4));
        // c.sd a1, 8(a0)
        let sd = dis16(0xe50c);
        assert_eq!(sd.dst(0), mem(10, 8, OpSize::B8));
        assert_eq!(sd.src(0), x(11));
        // c.addi16sp sp, -64
        let grow = dis16(0x7139);
        assert_eq!(grow.opcode(), Opcode::Rv(RvOp::CAddi16sp));
        assert_eq!(grow.src(1).imm_value(), -64);
        // c.lui a0, 0x1f
        assert_eq!(dis16(0x657d).src(0).imm_value(), 0x1f000);
        for h in [0x157d, 0x4532, 0xe50c, 0x7139, 0x657d, 0x0028, 0x8d0d, 0x9d2d, 0x8505, 0x4505, 0xc62a] {
            roundtrip16(h);
        }
    }

    #[test]
    fn compressed_jumps_and_register_moves() {
        assert_eq!(dis16(0x8082).opcode(), Opcode::Rv(RvOp::CJr));
        assert_eq!(dis16(0x9002).opcode(), Opcode::Rv(RvOp::CEbreak));
        assert_eq!(dis16(0x9502).dst(0), x(1));
        assert_eq!(dis16(0x852e).opcode(), Opcode::Rv(RvOp::CMv));
        assert_eq!(dis16(0x952e).opcode(), Opcode::Rv(RvOp::CAdd));
        // c.j -2
        assert_eq!(dis16(0xbffd).src(0), Operand::pc(PC - 2));
        // c.beqz a0, +8
        assert_eq!(dis16(0xc501).src(1), Operand::pc(PC + 8));
        for h in [0x8082, 0x9002, 0x9502, 0x852e, 0x952e, 0xbffd, 0xc501] {
            roundtrip16(h);
        }
    }

    #[test]
    fn reserved_compressed_encodings() {
        let mut instr = Instr::new(IsaMode::Riscv64);
        decode_in(IsaMode::Riscv64, &[0, 0], PC, &mut instr, Level::Full).unwrap();
        assert_eq!(instr.opcode(), Opcode::Rv(RvOp::Unimp));
        // c.addi4spn with a zero immediate
        assert!(invalid(&0x0004u16.to_le_bytes()));
        // c.jr x0
        assert!(invalid(&0x8002u16.to_le_bytes()));
        // c.lwsp x0
        assert!(invalid(&0x4002u16.to_le_bytes()));
        // c.lui with a zero immediate
        assert!(invalid(&0x6501u16.to_le_bytes()));
        // quadrant 0 funct3 4
        assert!(invalid(&0x8000u16.to_le_bytes()));
    }

    #[test]
    fn compressed_operand_limits() {
        let high = build(RvOp::CLw, &[x(16)], &[mem(10, 0, OpSize::B4)]);
        assert!(matches!(encode(&high, PC), Err(IrError::IllegalOperand { .. })));
        let unaligned = build(RvOp::CSd, &[mem(10, 4, OpSize::B8)], &[x(11)]);
        assert!(matches!(encode(&unaligned, PC), Err(IrError::IllegalOperand { .. })));
        let far = build(RvOp::CAddi, &[x(10)], &[x(10), imm(32)]);
        assert!(matches!(encode(&far, PC), Err(IrError::OperandOutOfRange { .. })));
        let split = build(RvOp::CAddi, &[x(10)], &[x(11), imm(1)]);
        assert!(matches!(encode(&split, PC), Err(IrError::IllegalOperand { .. })));
        let bytes = asm(&build(RvOp::CLw, &[x(8)], &[mem(15, 124, OpSize::B4)]));
        assert_eq!(bytes.len(), 2);
    }

    #[test]
    fn predicates_are_rejected() {
        let mut add = build(RvOp::Add, &[x(1)], &[x(2), x(3)]);
        add.set_predicate(Predicate::Never);
        assert!(matches!(encode(&add, PC), Err(IrError::IllegalOperand { .. })));
    }

    #[test]
    fn defaults_are_unpredicated() {
        assert_eq!(defaults(Opcode::Rv(RvOp::Beq)), Some((Eflags::NONE, Predicate::None)));
        assert_eq!(defaults(Opcode::Rv(RvOp::CJ)), Some((Eflags::NONE, Predicate::None)));
    }

    #[test]
    fn canonical_words_decode_to_their_entry() {
        let mut checked = 0;
        crate::table::walk::<RvLayout>(|_, info| {
            if info.flags.contains(Flags::COMPRESSED) {
                return;
            }
            let bytes = info.bits.to_le_bytes();
            let mut instr = Instr::new(IsaMode::Riscv64);
            let got = decode_in(IsaMode::Riscv64, &bytes, PC, &mut instr, Level::Opcode);
            assert_eq!(got, Ok(4), "{}: {:#010x}", info.name, info.bits);
            assert_eq!(instr.opcode(), info.opcode, "{}", info.name);
            checked += 1;
        });
        assert!(checked > 100);
    }
}
