//! Thumb decoder and encoder.
//!
//! Covers the 16-bit instruction set and the 32-bit branches, data
//! processing and single loads and stores. Encoding tries the narrow forms
//! first, so `b` picks the shortest reach that fits and `ldr` only widens
//! when the offset or registers need it.
//!
//! The pc reads as the instruction address plus 4; literal loads, `adr` and
//! `blx` to A32 code use that value rounded down to a word.
//!
//! Inside an IT block (see [`crate::it_block`]) the caller passes the
//! block's predicate: the narrow flag-setting data-processing forms then
//! decode as their plain opcodes, every member takes the predicate, and
//! conditional branches, `cbz` and nested `it` are invalid.

use crate::arm::{block_disp, core_num, decode_shift, imm32, imm_shift_kind, reg_shift_type, shift_fields, split_offset};
use crate::arm_tables::ArmOp;
use crate::decode::{apply_entry, read_u16, sext, Level};
use crate::encode::{compare, encode_entries, fits_signed, Cursor, Fit, InstrBytes, Word};
use crate::error::IrError;
use crate::instr::{Eflags, Instr, Opcode, OperandList, Predicate};
use crate::isa::IsaMode;
use crate::it_block::ItBlock;
use crate::opnd::{IndexShift, MemRef, Operand, OpndFlags, Shift};
use crate::reg::{arm, Reg};
use crate::size::OpSize;
use crate::table::{chain, find_head, resolve, Dir, Flags, OpInfo, Slot};
use crate::thumb_tables::{ThumbExt, ThumbLayout, ThumbTy};

/// First halfwords at or above this start a 32-bit instruction.
const WIDE: u16 = 0xe800;

fn select(kind: ThumbExt, w: u32) -> usize {
    let bits = |lo: u32, width: u32| ((w >> lo) & ((1 << width) - 1)) as usize;
    match kind {
        ThumbExt::Top16 => bits(12, 4),
        ThumbExt::Bit11 => bits(11, 1),
        ThumbExt::Bits11_10 => bits(10, 2),
        ThumbExt::Bits11_9 => bits(9, 3),
        ThumbExt::Bits11_8 => bits(8, 4),
        ThumbExt::Dp => bits(6, 4),
        ThumbExt::Special => bits(7, 3),
        ThumbExt::Bit7 => bits(7, 1),
        ThumbExt::Bits7_6 => bits(6, 2),
        ThumbExt::ItHint => {
            if w & 0xf != 0 {
                8
            } else {
                bits(4, 4).min(5)
            }
        }
        ThumbExt::RnInList => bits(bits(8, 3) as u32, 1),
        ThumbExt::Top32 => bits(27, 2),
        ThumbExt::T32Br => bits(15, 1) << 2 | bits(14, 1) << 1 | bits(12, 1),
        ThumbExt::T32Bits26_25 => bits(25, 2),
        ThumbExt::T32DpImm => bits(25, 1),
        ThumbExt::T32Op5 => bits(20, 5),
        ThumbExt::T32RdPc => usize::from(bits(8, 4) == 15),
        ThumbExt::T32RnPc => usize::from(bits(16, 4) == 15),
        ThumbExt::T32LsMode => {
            if bits(11, 1) == 0 {
                0
            } else {
                1 + bits(8, 3)
            }
        }
    }
}

/// Narrow flag-setting opcodes and what they decode as inside an IT block.
const IT_FORMS: [(ArmOp, ArmOp); 16] = [
    (ArmOp::Adds, ArmOp::Add),
    (ArmOp::Subs, ArmOp::Sub),
    (ArmOp::Movs, ArmOp::Mov),
    (ArmOp::Lsls, ArmOp::Lsl),
    (ArmOp::Lsrs, ArmOp::Lsr),
    (ArmOp::Asrs, ArmOp::Asr),
    (ArmOp::Rors, ArmOp::Ror),
    (ArmOp::Ands, ArmOp::And),
    (ArmOp::Eors, ArmOp::Eor),
    (ArmOp::Adcs, ArmOp::Adc),
    (ArmOp::Sbcs, ArmOp::Sbc),
    (ArmOp::Rsbs, ArmOp::Rsb),
    (ArmOp::Orrs, ArmOp::Orr),
    (ArmOp::Muls, ArmOp::Mul),
    (ArmOp::Bics, ArmOp::Bic),
    (ArmOp::Mvns, ArmOp::Mvn),
];

fn in_block_form(opcode: Opcode) -> Option<Opcode> {
    IT_FORMS
        .iter()
        .find(|(flags, _)| opcode == Opcode::Arm(*flags))
        .map(|(_, plain)| Opcode::Arm(*plain))
}

fn flag_setting_form(opcode: Opcode) -> Option<Opcode> {
    IT_FORMS
        .iter()
        .find(|(_, plain)| opcode == Opcode::Arm(*plain))
        .map(|(flags, _)| Opcode::Arm(*flags))
}

/// ThumbExpandImm of `i:imm3:imm8`. `None` for the replicated patterns with
/// a zero byte.
fn expand_imm(imm12: u32) -> Option<u32> {
    let imm8 = imm12 & 0xff;
    if imm12 >> 10 != 0 {
        return Some((0x80 | imm12 & 0x7f).rotate_right(imm12 >> 7));
    }
    match (imm12 >> 8) & 3 {
        0 => Some(imm8),
        _ if imm8 == 0 => None,
        1 => Some(imm8 * 0x0001_0001),
        2 => Some(imm8 * 0x0100_0100),
        _ => Some(imm8 * 0x0101_0101),
    }
}

/// Inverse of [`expand_imm`].
fn modified_imm(value: u32) -> Option<u32> {
    let (lo, hi) = (value & 0xff, (value >> 8) & 0xff);
    if value <= 0xff {
        return Some(value);
    }
    if lo != 0 && value == lo * 0x0001_0001 {
        return Some(0x100 | lo);
    }
    if hi != 0 && value == hi * 0x0100_0100 {
        return Some(0x200 | hi);
    }
    if lo != 0 && value == lo * 0x0101_0101 {
        return Some(0x300 | lo);
    }
    (8..32).find_map(|rot| {
        let v = value.rotate_left(rot);
        (v <= 0xff && v & 0x80 != 0).then_some(rot << 7 | v & 0x7f)
    })
}

fn low(n: u32) -> Operand {
    Operand::reg(arm::gpr(n as u8))
}

fn list_reg(reg: Reg) -> Operand {
    Operand::reg_ex(reg, OpSize::None, OpndFlags::IN_LIST)
}

/// Bytes per element of a scaled offset.
fn scale_of(size: OpSize) -> u32 {
    match size {
        OpSize::B1 => 1,
        OpSize::B2 => 2,
        _ => 4,
    }
}

/// Field reader for one Thumb instruction.
struct Fields {
    /// The halfword, or both halfwords with the first in bits 31:16.
    word: u32,
    pc: u32,
}

impl Fields {
    fn get(&self, lo: u32, width: u32) -> u32 {
        (self.word >> lo) & ((1 << width) - 1)
    }

    fn pc_read(&self) -> u32 {
        self.pc.wrapping_add(4)
    }

    fn aligned_pc(&self) -> u32 {
        self.pc_read() & !3
    }

    fn invalid(&self) -> IrError {
        IrError::InvalidEncoding {
            mode: IsaMode::Thumb,
            pc: u64::from(self.pc),
            word: self.word,
        }
    }

    /// `i:imm3:imm8` of a wide immediate.
    fn imm12(&self) -> u32 {
        self.get(26, 1) << 11 | self.get(12, 3) << 8 | self.get(0, 8)
    }

    fn wide_shift(&self) -> (Shift, u32) {
        decode_shift(self.get(4, 2), self.get(12, 3) << 2 | self.get(6, 2))
    }

    /// `[Rn, #disp]` of a wide transfer; `-0` carries the negated flag.
    fn wide_mem(&self, disp: i32, negative: bool, size: OpSize) -> Operand {
        let mut op = Operand::base_disp(arm::gpr(self.get(16, 4) as u8), Reg::NULL, 0, disp, size);
        if negative && disp == 0 {
            op.add_flags(OpndFlags::NEGATED);
        }
        op
    }

    fn branch(&self, base: u32, offset: i64) -> Operand {
        Operand::pc(base.wrapping_add(offset as u32) as u64)
    }

    /// `S:I1:I2` of a wide branch, I = NOT(J XOR S).
    fn wide_high(&self) -> u32 {
        let s = self.get(26, 1);
        let i1 = !(self.get(13, 1) ^ s) & 1;
        let i2 = !(self.get(11, 1) ^ s) & 1;
        s << 24 | i1 << 23 | i2 << 22
    }

    fn push_list(&self, extra: Option<Reg>, out: &mut OperandList) {
        let mask = self.get(0, 8);
        for n in (0..8).filter(|n| mask & (1 << n) != 0) {
            out.push(list_reg(arm::gpr(n as u8)));
        }
        if let Some(reg) = extra.filter(|_| self.get(8, 1) == 1) {
            out.push(list_reg(reg));
        }
    }

    fn operand(&self, slot: Slot<ThumbTy>, out: &mut OperandList) -> Result<(), IrError> {
        let size = slot.size;
        let op = match slot.ty {
            ThumbTy::None => return Ok(()),
            ThumbTy::R0 => low(self.get(0, 3)),
            ThumbTy::R3 => low(self.get(3, 3)),
            ThumbTy::R6 => low(self.get(6, 3)),
            ThumbTy::R8 => low(self.get(8, 3)),
            ThumbTy::RdnHi => low(self.get(7, 1) << 3 | self.get(0, 3)),
            ThumbTy::RmHi => low(self.get(3, 4)),
            ThumbTy::Sp => Operand::reg(arm::SP),
            ThumbTy::Lr => Operand::reg(arm::LR),
            ThumbTy::Imm3 => Operand::imm_uint(self.get(6, 3) as u64, size),
            ThumbTy::Imm5 => Operand::imm_uint(self.get(6, 5) as u64, size),
            ThumbTy::Imm5Shift => match self.get(6, 5) {
                0 => Operand::imm_uint(32, size),
                n => Operand::imm_uint(n as u64, size),
            },
            ThumbTy::Imm7x4 => Operand::imm_uint((self.get(0, 7) << 2) as u64, size),
            ThumbTy::Imm8 => Operand::imm_uint(self.get(0, 8) as u64, size),
            ThumbTy::Imm8x4 => Operand::imm_uint((self.get(0, 8) << 2) as u64, size),
            ThumbTy::Zero => Operand::imm_int(0, size),
            ThumbTy::MemImm5 => {
                let disp = self.get(6, 5) * scale_of(size);
                Operand::base_disp(arm::gpr(self.get(3, 3) as u8), Reg::NULL, 0, disp as i32, size)
            }
            ThumbTy::MemReg => Operand::base_disp_shift(
                arm::gpr(self.get(3, 3) as u8),
                arm::gpr(self.get(6, 3) as u8),
                false,
                IndexShift::NONE,
                0,
                size,
            ),
            ThumbTy::MemSp => {
                Operand::base_disp(arm::SP, Reg::NULL, 0, (self.get(0, 8) << 2) as i32, size)
            }
            ThumbTy::MemLit => {
                let addr = self.aligned_pc().wrapping_add(self.get(0, 8) << 2);
                Operand::rel_addr(addr as u64, size)
            }
            ThumbTy::AdrPc => self.branch(self.aligned_pc(), (self.get(0, 8) << 2) as i64),
            ThumbTy::Pc8 => self.branch(self.pc_read(), sext(self.get(0, 8) << 1, 9)),
            ThumbTy::Pc11 => self.branch(self.pc_read(), sext(self.get(0, 11) << 1, 12)),
            ThumbTy::PcCbz => {
                let offset = self.get(9, 1) << 6 | self.get(3, 5) << 1;
                self.branch(self.pc_read(), offset as i64)
            }
            ThumbTy::RegList8 => {
                self.push_list(None, out);
                return Ok(());
            }
            ThumbTy::RegListLr => {
                self.push_list(Some(arm::LR), out);
                return Ok(());
            }
            ThumbTy::RegListPc => {
                self.push_list(Some(arm::PC), out);
                return Ok(());
            }
            ThumbTy::MemList => Operand::base_disp(arm::gpr(self.get(8, 3) as u8), Reg::NULL, 0, 0, size),
            ThumbTy::MemPush => {
                let count = (self.get(0, 8).count_ones() + self.get(8, 1)) as i32;
                Operand::base_disp(arm::SP, Reg::NULL, 0, block_disp(true, false, count), size)
            }
            ThumbTy::MemPop => Operand::base_disp(arm::SP, Reg::NULL, 0, 0, size),
            ThumbTy::ItCond => Operand::imm_uint(self.get(4, 4) as u64, size),
            ThumbTy::ItMask => Operand::imm_uint(self.get(0, 4) as u64, size),
            ThumbTy::T32Pc20 => {
                let imm = self.get(26, 1) << 20
                    | self.get(11, 1) << 19
                    | self.get(13, 1) << 18
                    | self.get(16, 6) << 12
                    | self.get(0, 11) << 1;
                self.branch(self.pc_read(), sext(imm, 21))
            }
            ThumbTy::T32Pc24 => {
                let imm = self.wide_high() | self.get(16, 10) << 12 | self.get(0, 11) << 1;
                self.branch(self.pc_read(), sext(imm, 25))
            }
            ThumbTy::T32Pc24X => {
                let imm = self.wide_high() | self.get(16, 10) << 12 | self.get(1, 10) << 2;
                self.branch(self.aligned_pc(), sext(imm, 25))
            }
            ThumbTy::T32Rn => low(self.get(16, 4)),
            ThumbTy::T32Rd => low(self.get(8, 4)),
            ThumbTy::T32Rt => low(self.get(12, 4)),
            ThumbTy::T32Rm => low(self.get(0, 4)),
            ThumbTy::T32ModImm => {
                let value = expand_imm(self.imm12()).ok_or_else(|| self.invalid())?;
                Operand::imm_uint(value as u64, size)
            }
            ThumbTy::T32Imm12 => Operand::imm_uint(self.imm12() as u64, size),
            ThumbTy::T32Imm16 => Operand::imm_uint((self.get(16, 4) << 12 | self.imm12()) as u64, size),
            ThumbTy::T32ShTy => Operand::shift_kind(self.wide_shift().0),
            ThumbTy::T32ShAmt => Operand::imm_uint(self.wide_shift().1 as u64, size),
            ThumbTy::T32MemImm12 => self.wide_mem(self.get(0, 12) as i32, false, size),
            ThumbTy::T32MemNeg => self.wide_mem(-(self.get(0, 8) as i32), true, size),
            ThumbTy::T32MemPre => {
                let imm = self.get(0, 8) as i32;
                let up = self.get(9, 1) == 1;
                self.wide_mem(if up { imm } else { -imm }, !up, size)
            }
            ThumbTy::T32MemPost => self.wide_mem(0, false, size),
            ThumbTy::T32Imm8Signed => {
                let imm = self.get(0, 8) as i64;
                let up = self.get(9, 1) == 1;
                let mut op = Operand::imm_int(if up { imm } else { -imm }, size);
                if !up && imm == 0 {
                    op.add_flags(OpndFlags::NEGATED);
                }
                op
            }
            ThumbTy::T32MemReg => {
                let (kind, amount) = decode_shift(0, self.get(4, 2));
                Operand::base_disp_shift(
                    arm::gpr(self.get(16, 4) as u8),
                    arm::gpr(self.get(0, 4) as u8),
                    false,
                    IndexShift::new(kind, amount as u8),
                    0,
                    size,
                )
            }
            ThumbTy::T32MemLit => {
                let imm = self.get(0, 12);
                let addr = if self.get(23, 1) == 1 {
                    self.aligned_pc().wrapping_add(imm)
                } else {
                    self.aligned_pc().wrapping_sub(imm)
                };
                Operand::rel_addr(addr as u64, size)
            }
            ThumbTy::T32AdrUp => self.branch(self.aligned_pc(), self.imm12() as i64),
            ThumbTy::T32AdrDown => self.branch(self.aligned_pc(), -(self.imm12() as i64)),
        };
        out.push(op);
        Ok(())
    }
}

/// Wide byte and halfword loads into the pc are preload hints.
fn is_preload(info: &OpInfo<ThumbLayout>, word: u32) -> bool {
    let narrowing = matches!(
        info.opcode,
        Opcode::Arm(ArmOp::Ldrb | ArmOp::Ldrh | ArmOp::Ldrsb | ArmOp::Ldrsh)
    );
    info.bits > 0xffff && narrowing && (word >> 12) & 0xf == 15
}

/// Decode the Thumb instruction at the start of `bytes`, predicated by `it`
/// when inside a block. Returns the length.
pub(crate) fn decode_in_block(
    bytes: &[u8],
    pc: u64,
    instr: &mut Instr<'_>,
    level: Level,
    it: Option<Predicate>,
) -> Result<usize, IrError> {
    let hw1 = read_u16(bytes)?;
    let (word, len, root) = if hw1 >= WIDE {
        let Some(b) = bytes.get(2..4) else {
            return Err(IrError::Truncated {
                needed: 4,
                available: bytes.len(),
            });
        };
        let hw2 = u16::from_le_bytes([b[0], b[1]]);
        (u32::from(hw1) << 16 | u32::from(hw2), 4, ThumbExt::Top32)
    } else {
        (u32::from(hw1), 2, ThumbExt::Top16)
    };
    if level == Level::Raw {
        return Ok(len);
    }
    let invalid = IrError::InvalidEncoding {
        mode: IsaMode::Thumb,
        pc,
        word,
    };
    let Some((_, info)) = resolve::<ThumbLayout>(IsaMode::Thumb, (root, 0), |kind| Ok(select(kind, word)))? else {
        return Err(invalid);
    };
    if !info.has_fixed_ones(word) || is_preload(info, word) {
        return Err(invalid);
    }
    if info.opcode == Opcode::Arm(ArmOp::It) && ItBlock::from_halfword(word as u16).is_none() {
        return Err(invalid);
    }
    if let Some(block) = it {
        return decode_member(word, pc, info, block, instr, level).map(|()| len);
    }
    let predicate = if info.flags.contains(Flags::PREDICATE_8) {
        Predicate::from_arm((word >> 8) & 0xf)
    } else if info.flags.contains(Flags::PREDICATE_22) {
        let cond = (word >> 22) & 0xf;
        if cond >= 14 {
            return Err(invalid);
        }
        Predicate::from_arm(cond)
    } else {
        Predicate::None
    };
    let fields = Fields {
        word,
        pc: pc as u32,
    };
    apply_entry(instr, info, predicate, level, |slot, out| fields.operand(slot, out))?;
    Ok(len)
}

fn decode_member(
    word: u32,
    pc: u64,
    info: &OpInfo<ThumbLayout>,
    block: Predicate,
    instr: &mut Instr<'_>,
    level: Level,
) -> Result<(), IrError> {
    let branchy = matches!(info.opcode, Opcode::Arm(ArmOp::Cbz | ArmOp::Cbnz | ArmOp::It));
    if info.flags.has_predicate() || branchy {
        return Err(IrError::InvalidEncoding {
            mode: IsaMode::Thumb,
            pc,
            word,
        });
    }
    let predicate = if info.opcode == Opcode::Arm(ArmOp::Bkpt) {
        Predicate::None
    } else {
        block
    };
    let fields = Fields {
        word,
        pc: pc as u32,
    };
    apply_entry(instr, info, predicate, level, |slot, out| fields.operand(slot, out))?;
    if let Some(plain) = in_block_form(info.opcode).filter(|_| info.bits <= 0xffff) {
        instr.set_opcode_decoded(plain);
        instr.set_eflags(info.eflags.reads().union(predicate.reads()));
    }
    Ok(())
}

/// Status-flag usage and default predicate of an opcode's first Thumb entry.
pub(crate) fn defaults(opcode: Opcode) -> Option<(Eflags, Predicate)> {
    let Some((_, info)) = find_head::<ThumbLayout>(opcode) else {
        // Plain forms that only exist inside IT blocks.
        let (_, info) = find_head::<ThumbLayout>(flag_setting_form(opcode)?)?;
        return Some((info.eflags.reads(), Predicate::None));
    };
    let predicate = if info.flags.has_predicate() {
        Predicate::Always
    } else {
        Predicate::None
    };
    Some((info.eflags, predicate))
}

// ── Encoding ─────────────────────────────────────────────────────────────

/// Per-attempt encoder state.
struct Encoder {
    word: Word,
    pc: u32,
    /// Registers in the instruction's register list.
    list_len: i32,
    /// Kind from the shift-type slot, for the amount slot.
    shift: Shift,
}

impl Encoder {
    fn mismatch(&self) -> IrError {
        IrError::NoMatchingEncoding {
            opcode: self.word.opcode,
        }
    }

    fn low(&mut self, op: &Operand, lo: u32) -> Result<(), IrError> {
        match core_num(op) {
            Some(n) if n < 8 => self.word.put(lo, 3, n),
            _ => Err(self.mismatch()),
        }
    }

    fn any(&mut self, op: &Operand) -> Result<u32, IrError> {
        core_num(op).ok_or_else(|| self.mismatch())
    }

    fn reg4(&mut self, op: &Operand, lo: u32) -> Result<(), IrError> {
        let n = self.any(op)?;
        self.word.put(lo, 4, n)
    }

    fn put_imm12(&mut self, v: u32) -> Result<(), IrError> {
        self.word.put(26, 1, v >> 11)?;
        self.word.put(12, 3, (v >> 8) & 7)?;
        self.word.put(0, 8, v & 0xff)
    }

    fn wide_base<'o>(&self, op: &'o Operand) -> Result<(&'o MemRef, u32), IrError> {
        match op {
            Operand::BaseDisp(m) if m.index.is_null() => {
                let rn = core_num(&Operand::reg(m.base)).ok_or_else(|| self.mismatch())?;
                Ok((m, rn))
            }
            _ => Err(self.mismatch()),
        }
    }

    /// U in bit 9 and an 8-bit magnitude.
    fn put_imm8_signed(&mut self, value: i64, flags: OpndFlags) -> Result<(), IrError> {
        let (up, magnitude) = split_offset(value, flags);
        if magnitude > 0xff {
            return Err(self.word.out_of_range(value, 8));
        }
        self.word.put(9, 1, u32::from(up))?;
        self.word.put(0, 8, magnitude as u32)
    }

    fn fixed(&self, op: &Operand, reg: Reg) -> Result<(), IrError> {
        match op {
            Operand::Reg { reg: r, .. } if *r == reg => Ok(()),
            _ => Err(self.mismatch()),
        }
    }

    /// Unsigned immediate, a multiple of `scale`, stored divided by it.
    fn imm(&mut self, op: &Operand, lo: u32, width: u32, scale: i64) -> Result<(), IrError> {
        let Operand::ImmInt { value, .. } = op else {
            return Err(self.mismatch());
        };
        self.scaled(*value, lo, width, scale)
    }

    fn scaled(&mut self, value: i64, lo: u32, width: u32, scale: i64) -> Result<(), IrError> {
        if value % scale != 0 {
            return Err(self.word.illegal("offset is not a multiple of the access size"));
        }
        let field = value / scale;
        if !(0..1 << width).contains(&field) {
            return Err(self.word.out_of_range(value, width));
        }
        self.word.put(lo, width, field as u32)
    }

    fn base<'o>(&self, op: &'o Operand) -> Result<&'o MemRef, IrError> {
        match op {
            Operand::BaseDisp(m) if m.index.is_null() && !m.flags.contains(OpndFlags::NEGATED) => Ok(m),
            _ => Err(self.mismatch()),
        }
    }

    /// Offset of a pc-relative target from `base`.
    fn target(&self, op: &Operand, base: u32) -> Result<i64, IrError> {
        match op {
            Operand::Pc { target, selector: None } => Ok((*target as u32).wrapping_sub(base) as i32 as i64),
            _ => Err(self.mismatch()),
        }
    }

    fn halfword_offset(&self, off: i64, bits: u32) -> Result<i64, IrError> {
        if off & 1 != 0 {
            return Err(self.word.illegal("branch target misaligned"));
        }
        if !fits_signed(off, bits) {
            return Err(self.word.out_of_range(off, bits));
        }
        Ok(off)
    }

    /// `S`, `J1`, `J2` and imm10 of a 25-bit wide branch offset.
    fn wide_branch(&mut self, off: i64) -> Result<(), IrError> {
        let off = self.halfword_offset(off, 25)? as u32;
        let s = (off >> 24) & 1;
        let j1 = (!(off >> 23) ^ s) & 1;
        let j2 = (!(off >> 22) ^ s) & 1;
        self.word.put(26, 1, s)?;
        self.word.put(13, 1, j1)?;
        self.word.put(11, 1, j2)?;
        self.word.put(16, 10, (off >> 12) & 0x3ff)
    }

    fn operand(&mut self, slot: Slot<ThumbTy>, op: &Operand) -> Result<(), IrError> {
        let pc_read = self.pc.wrapping_add(4);
        match slot.ty {
            ThumbTy::None | ThumbTy::RegList8 | ThumbTy::RegListLr | ThumbTy::RegListPc => {
                Err(self.mismatch())
            }
            ThumbTy::R0 => self.low(op, 0),
            ThumbTy::R3 => self.low(op, 3),
            ThumbTy::R6 => self.low(op, 6),
            ThumbTy::R8 => self.low(op, 8),
            ThumbTy::RdnHi => {
                let n = self.any(op)?;
                self.word.put(0, 3, n & 7)?;
                self.word.put(7, 1, n >> 3)
            }
            ThumbTy::RmHi => {
                let n = self.any(op)?;
                self.word.put(3, 4, n)
            }
            ThumbTy::Sp => self.fixed(op, arm::SP),
            ThumbTy::Lr => self.fixed(op, arm::LR),
            ThumbTy::Imm3 => self.imm(op, 6, 3, 1),
            ThumbTy::Imm5 => self.imm(op, 6, 5, 1),
            ThumbTy::Imm5Shift => match op {
                Operand::ImmInt { value: 32, .. } => self.word.put(6, 5, 0),
                Operand::ImmInt { value: 0, .. } => Err(self.word.out_of_range(0, 5)),
                _ => self.imm(op, 6, 5, 1),
            },
            ThumbTy::Imm7x4 => self.imm(op, 0, 7, 4),
            ThumbTy::Imm8 => self.imm(op, 0, 8, 1),
            ThumbTy::Imm8x4 => self.imm(op, 0, 8, 4),
            ThumbTy::Zero => match op {
                Operand::ImmInt { value: 0, .. } => Ok(()),
                _ => Err(self.mismatch()),
            },
            ThumbTy::MemImm5 => {
                let m = self.base(op)?;
                let rn = core_num(&Operand::reg(m.base)).filter(|n| *n < 8).ok_or_else(|| self.mismatch())?;
                self.word.put(3, 3, rn)?;
                self.scaled(m.disp as i64, 6, 5, scale_of(slot.size) as i64)
            }
            ThumbTy::MemReg => {
                let Operand::BaseDisp(m) = op else {
                    return Err(self.mismatch());
                };
                if m.index.is_null()
                    || m.disp != 0
                    || m.scale > 1
                    || m.flags.contains(OpndFlags::NEGATED)
                    || shift_fields(m.shift.kind, m.shift.amount as i64) != Some((0, 0))
                {
                    return Err(self.mismatch());
                }
                self.low(&Operand::reg(m.base), 3)?;
                self.low(&Operand::reg(m.index), 6)
            }
            ThumbTy::MemSp => {
                let m = self.base(op)?;
                if m.base != arm::SP {
                    return Err(self.mismatch());
                }
                self.scaled(m.disp as i64, 0, 8, 4)
            }
            ThumbTy::MemLit => {
                let Operand::RelAddr { addr, .. } = op else {
                    return Err(self.mismatch());
                };
                let off = (*addr as u32).wrapping_sub(pc_read & !3) as i32 as i64;
                self.scaled(off, 0, 8, 4)
            }
            ThumbTy::AdrPc => {
                let off = self.target(op, pc_read & !3)?;
                self.scaled(off, 0, 8, 4)
            }
            ThumbTy::Pc8 => {
                let off = self.target(op, pc_read)?;
                let off = self.halfword_offset(off, 9)?;
                self.word.put_signed(0, 8, off >> 1)
            }
            ThumbTy::Pc11 => {
                let off = self.target(op, pc_read)?;
                let off = self.halfword_offset(off, 12)?;
                self.word.put_signed(0, 11, off >> 1)
            }
            ThumbTy::PcCbz => {
                let off = self.target(op, pc_read)?;
                if off & 1 != 0 {
                    return Err(self.word.illegal("branch target misaligned"));
                }
                if !(0..=126).contains(&off) {
                    return Err(self.word.out_of_range(off, 7));
                }
                let off = off as u32;
                self.word.put(9, 1, off >> 6)?;
                self.word.put(3, 5, (off >> 1) & 0x1f)
            }
            ThumbTy::MemList => {
                let m = self.base(op)?;
                if m.disp != 0 {
                    return Err(self.mismatch());
                }
                self.low(&Operand::reg(m.base), 8)
            }
            ThumbTy::MemPush => {
                let m = self.base(op)?;
                if m.base != arm::SP || m.disp != block_disp(true, false, self.list_len) {
                    return Err(self.mismatch());
                }
                Ok(())
            }
            ThumbTy::MemPop => {
                let m = self.base(op)?;
                if m.base != arm::SP || m.disp != 0 {
                    return Err(self.mismatch());
                }
                Ok(())
            }
            ThumbTy::ItCond => self.imm(op, 4, 4, 1),
            ThumbTy::ItMask => match op {
                Operand::ImmInt { value: 0, .. } => Err(self.word.illegal("it mask must be nonzero")),
                _ => self.imm(op, 0, 4, 1),
            },
            ThumbTy::T32Pc20 => {
                let off = self.target(op, pc_read)?;
                let off = self.halfword_offset(off, 21)? as u32;
                self.word.put(26, 1, (off >> 20) & 1)?;
                self.word.put(11, 1, (off >> 19) & 1)?;
                self.word.put(13, 1, (off >> 18) & 1)?;
                self.word.put(16, 6, (off >> 12) & 0x3f)?;
                self.word.put(0, 11, (off >> 1) & 0x7ff)
            }
            ThumbTy::T32Pc24 => {
                let off = self.target(op, pc_read)?;
                self.wide_branch(off)?;
                self.word.put(0, 11, ((off >> 1) & 0x7ff) as u32)
            }
            ThumbTy::T32Pc24X => {
                let off = self.target(op, pc_read & !3)?;
                if off & 3 != 0 {
                    return Err(self.word.illegal("blx target must be word aligned"));
                }
                self.wide_branch(off)?;
                self.word.put(1, 10, ((off >> 2) & 0x3ff) as u32)
            }
            ThumbTy::T32Rn => self.reg4(op, 16),
            ThumbTy::T32Rd => self.reg4(op, 8),
            ThumbTy::T32Rt => self.reg4(op, 12),
            ThumbTy::T32Rm => self.reg4(op, 0),
            ThumbTy::T32ModImm => {
                let value = imm32(op).ok_or_else(|| self.mismatch())?;
                let imm12 = modified_imm(value).ok_or_else(|| self.word.illegal("not a Thumb modified immediate"))?;
                self.put_imm12(imm12)
            }
            ThumbTy::T32Imm12 => {
                let v = imm32(op).ok_or_else(|| self.mismatch())?;
                if v > 0xfff {
                    return Err(self.word.out_of_range(v as i64, 12));
                }
                self.put_imm12(v)
            }
            ThumbTy::T32Imm16 => {
                let v = imm32(op).ok_or_else(|| self.mismatch())?;
                if v > 0xffff {
                    return Err(self.word.out_of_range(v as i64, 16));
                }
                self.word.put(16, 4, v >> 12)?;
                self.put_imm12(v & 0xfff)
            }
            ThumbTy::T32ShTy => {
                let kind = imm_shift_kind(op).ok_or_else(|| self.mismatch())?;
                let ty = match kind {
                    Shift::Rrx => 3,
                    other => reg_shift_type(other).ok_or_else(|| self.word.illegal("not a shift"))?,
                };
                self.shift = kind;
                self.word.put(4, 2, ty)
            }
            ThumbTy::T32ShAmt => {
                let Operand::ImmInt { value, .. } = op else {
                    return Err(self.mismatch());
                };
                let (ty, imm5) = shift_fields(self.shift, *value)
                    .ok_or_else(|| self.word.out_of_range(*value, 5))?;
                self.word.put(4, 2, ty)?;
                self.word.put(12, 3, imm5 >> 2)?;
                self.word.put(6, 2, imm5 & 3)
            }
            ThumbTy::T32MemImm12 => {
                let (m, rn) = self.wide_base(op)?;
                if m.flags.contains(OpndFlags::NEGATED) {
                    return Err(self.mismatch());
                }
                if !(0..0x1000).contains(&m.disp) {
                    return Err(self.word.out_of_range(m.disp as i64, 12));
                }
                self.word.put(16, 4, rn)?;
                self.word.put(0, 12, m.disp as u32)
            }
            ThumbTy::T32MemNeg => {
                let (m, rn) = self.wide_base(op)?;
                let (up, magnitude) = split_offset(m.disp as i64, m.flags);
                if up {
                    return Err(self.mismatch());
                }
                if magnitude > 0xff {
                    return Err(self.word.out_of_range(m.disp as i64, 8));
                }
                self.word.put(16, 4, rn)?;
                self.word.put(0, 8, magnitude as u32)
            }
            ThumbTy::T32MemPre => {
                let (m, rn) = self.wide_base(op)?;
                self.word.put(16, 4, rn)?;
                self.put_imm8_signed(m.disp as i64, m.flags)
            }
            ThumbTy::T32MemPost => {
                let (m, rn) = self.wide_base(op)?;
                if m.disp != 0 || m.flags.contains(OpndFlags::NEGATED) {
                    return Err(self.mismatch());
                }
                self.word.put(16, 4, rn)
            }
            ThumbTy::T32Imm8Signed => {
                let Operand::ImmInt { value, flags, .. } = op else {
                    return Err(self.mismatch());
                };
                self.put_imm8_signed(*value, *flags)
            }
            ThumbTy::T32MemReg => {
                let Operand::BaseDisp(m) = op else {
                    return Err(self.mismatch());
                };
                if m.index.is_null() || m.disp != 0 || m.scale > 1 || m.flags.contains(OpndFlags::NEGATED) {
                    return Err(self.mismatch());
                }
                let amount = match (m.shift.kind, m.shift.amount) {
                    (Shift::None, 0) => 0,
                    (Shift::Lsl, n) if n <= 3 => u32::from(n),
                    _ => return Err(self.word.illegal("index shift not encodable")),
                };
                let rn = core_num(&Operand::reg(m.base)).ok_or_else(|| self.mismatch())?;
                let rm = core_num(&Operand::reg(m.index)).ok_or_else(|| self.mismatch())?;
                self.word.put(16, 4, rn)?;
                self.word.put(0, 4, rm)?;
                self.word.put(4, 2, amount)
            }
            ThumbTy::T32MemLit => {
                let Operand::RelAddr { addr, .. } = op else {
                    return Err(self.mismatch());
                };
                let off = (*addr as u32).wrapping_sub(pc_read & !3) as i32 as i64;
                if off.unsigned_abs() > 0xfff {
                    return Err(self.word.out_of_range(off, 12));
                }
                self.word.put(23, 1, u32::from(off >= 0))?;
                self.word.put(0, 12, off.unsigned_abs() as u32)
            }
            ThumbTy::T32AdrUp => {
                let off = self.target(op, pc_read & !3)?;
                if !(0..0x1000).contains(&off) {
                    return Err(self.word.out_of_range(off, 12));
                }
                self.put_imm12(off as u32)
            }
            ThumbTy::T32AdrDown => {
                let off = self.target(op, pc_read & !3)?;
                if !(-0xfff..0).contains(&off) {
                    return Err(self.word.out_of_range(off, 12));
                }
                self.put_imm12(off.unsigned_abs() as u32)
            }
        }
    }

    /// Consume the listed registers at the cursor into bits 7:0 and bit 8.
    fn reg_list(&mut self, cur: &mut Cursor<'_>, slot: Slot<ThumbTy>, dir: Dir) -> Result<(), IrError> {
        let high = match slot.ty {
            ThumbTy::RegListLr => Some(arm::LR),
            ThumbTy::RegListPc => Some(arm::PC),
            _ => None,
        };
        let mut mask = 0u32;
        while let Some(op) = cur
            .peek(dir)
            .filter(|op| op.is_reg() && op.flags().contains(OpndFlags::IN_LIST))
        {
            cur.next(dir);
            let reg = op.reg_id();
            if high == Some(reg) {
                mask |= 1 << 8;
                continue;
            }
            match core_num(&Operand::reg(reg)) {
                Some(n) if n < 8 => mask |= 1 << n,
                _ => return Err(self.word.illegal("register not encodable in a narrow list")),
            }
        }
        if mask == 0 {
            return Err(self.word.illegal("empty register list"));
        }
        let width = if high.is_some() { 9 } else { 8 };
        self.word.put(0, width, mask)
    }
}

fn put_predicate(
    word: &mut Word,
    info: &OpInfo<ThumbLayout>,
    pred: Predicate,
    it: Option<Predicate>,
) -> Result<(), IrError> {
    if let Some(block) = it {
        if info.flags.has_predicate() {
            return Err(word.illegal("conditional branch inside an IT block"));
        }
        let expected = if word.opcode == Opcode::Arm(ArmOp::Bkpt) {
            Predicate::None
        } else {
            block
        };
        return if pred == expected {
            Ok(())
        } else {
            Err(word.illegal("predicate differs from the IT block"))
        };
    }
    let lo = if info.flags.contains(Flags::PREDICATE_8) {
        8
    } else if info.flags.contains(Flags::PREDICATE_22) {
        22
    } else {
        return match pred {
            Predicate::None | Predicate::Always | Predicate::Op => Ok(()),
            _ => Err(word.illegal("encoding is not conditional")),
        };
    };
    match pred {
        Predicate::Arm(c) => word.put(lo, 4, c as u32),
        _ => Err(word.illegal("encoding needs a condition")),
    }
}

fn encode_entry(
    instr: &Instr<'_>,
    info: &OpInfo<ThumbLayout>,
    pc: u32,
    list_len: i32,
    it: Option<Predicate>,
) -> Result<u32, IrError> {
    let mut word = Word::new(instr.opcode(), info.bits);
    put_predicate(&mut word, info, instr.predicate(), it)?;
    let mut enc = Encoder {
        word,
        pc,
        list_len,
        shift: Shift::None,
    };
    let mut cur = Cursor::new(instr);
    for (slot, dir) in info.slots() {
        if matches!(slot.ty, ThumbTy::RegList8 | ThumbTy::RegListLr | ThumbTy::RegListPc) {
            enc.reg_list(&mut cur, slot, dir)?;
            continue;
        }
        let op = cur.next(dir).ok_or_else(|| enc.mismatch())?;
        enc.operand(slot, &op)?;
    }
    if !cur.is_done() || !info.matches(enc.word.bits) {
        return Err(enc.mismatch());
    }
    Ok(enc.word.bits)
}

/// Encode `instr` for address `pc`, predicated by `it` when inside a block.
/// A plain data-processing opcode there may also take the narrow encodings
/// of its flag-setting twin.
pub(crate) fn encode_in_block(instr: &Instr<'_>, pc: u64, it: Option<Predicate>) -> Result<InstrBytes, IrError> {
    let opcode = instr.opcode();
    let list_len = instr
        .dsts()
        .iter()
        .chain(instr.srcs())
        .filter(|op| op.is_reg() && op.flags().contains(OpndFlags::IN_LIST))
        .count() as i32;
    let narrow_twin = it
        .and_then(|_| flag_setting_form(opcode))
        .and_then(find_head::<ThumbLayout>)
        .into_iter()
        .flat_map(|(_, head)| chain(head))
        .filter(|info| info.bits <= 0xffff);
    let own = find_head::<ThumbLayout>(opcode)
        .into_iter()
        .flat_map(|(_, head)| chain(head));
    encode_entries(opcode, narrow_twin.chain(own), |info| {
        let word = encode_entry(instr, info, pc as u32, list_len, it)?;
        let mut bytes = InstrBytes::from_slice(&[]);
        if info.bits > 0xffff {
            bytes.push_u16((word >> 16) as u16);
        }
        bytes.push_u16(word as u16);
        let fit = verify_in(instr, &bytes, pc, it)?;
        Ok((bytes, fit))
    })
}

/// Decode `bytes` under the same IT state and check it reproduces `instr`.
fn verify_in(instr: &Instr<'_>, bytes: &[u8], pc: u64, it: Option<Predicate>) -> Result<Fit, IrError> {
    let mut back = Instr::new(IsaMode::Thumb);
    if decode_in_block(bytes, pc, &mut back, Level::Full, it).is_err() {
        return Err(IrError::NoMatchingEncoding {
            opcode: instr.opcode(),
        });
    }
    compare(instr, &back)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arm_tables::ArmOp;
    use crate::decode::decode_in;
    use crate::instr::Cond;

    const PC: u64 = 0x1000;

    fn encode(instr: &Instr<'_>, pc: u64) -> Result<InstrBytes, IrError> {
        encode_in_block(instr, pc, None)
    }

    fn dis(bytes: &[u8]) -> Instr<'static> {
        let mut instr = Instr::new(IsaMode::Thumb);
        decode_in(IsaMode::Thumb, bytes, PC, &mut instr, Level::Full)
            .unwrap_or_else(|e| panic!("{:02x?}: {}", bytes, e));
        instr.into_static()
    }

    fn dis16(hw: u16) -> Instr<'static> {
        dis(&hw.to_le_bytes())
    }

    fn asm(instr: &Instr<'_>) -> Vec<u8> {
        encode(instr, PC)
            .unwrap_or_else(|e| panic!("{}: {}", instr.opcode(), e))
            .to_vec()
    }

    fn asm16(op: ArmOp, dsts: &[Operand], srcs: &[Operand]) -> u16 {
        let b = asm(&build(op, dsts, srcs));
        assert_eq!(b.len(), 2, "{} encoded wide", op.name());
        u16::from_le_bytes([b[0], b[1]])
    }

    fn build(op: ArmOp, dsts: &[Operand], srcs: &[Operand]) -> Instr<'static> {
        Instr::build(IsaMode::Thumb, Opcode::Arm(op), dsts, srcs)
    }

    fn r(n: u8) -> Operand {
        Operand::reg(arm::gpr(n))
    }

    fn imm(v: i64) -> Operand {
        Operand::imm_int(v, OpSize::B4)
    }

    fn mem(base: u8, disp: i32, size: OpSize) -> Operand {
        Operand::base_disp(arm::gpr(base), Reg::NULL, 0, disp, size)
    }

    fn idx(base: u8, index: u8, size: OpSize) -> Operand {
        Operand::base_disp_shift(arm::gpr(base), arm::gpr(index), false, IndexShift::NONE, 0, size)
    }

    fn roundtrip(bytes: &[u8]) {
        let instr = dis(bytes);
        let mut fresh = Instr::build(IsaMode::Thumb, instr.opcode(), instr.dsts(), instr.srcs());
        fresh.set_predicate(instr.predicate());
        assert_eq!(asm(&fresh), bytes, "{}", instr.opcode());
    }

    #[test]
    fn hints_and_traps() {
        assert_eq!(asm16(ArmOp::Nop, &[], &[]), 0xbf00);
        assert_eq!(asm16(ArmOp::Bkpt, &[], &[imm(0)]), 0xbe00);
        assert_eq!(asm16(ArmOp::Bkpt, &[], &[imm(255)]), 0xbeff);
        assert_eq!(asm16(ArmOp::Svc, &[], &[imm(0)]), 0xdf00);
        assert_eq!(asm16(ArmOp::Svc, &[], &[imm(1)]), 0xdf01);
        assert_eq!(dis16(0xbf30).opcode(), Opcode::Arm(ArmOp::Wfi));
        assert!(decode_in(IsaMode::Thumb, &0xbf50u16.to_le_bytes(), PC, &mut Instr::new(IsaMode::Thumb), Level::Full).is_err());
    }

    #[test]
    fn register_branches() {
        assert_eq!(asm16(ArmOp::Bx, &[], &[Operand::reg(arm::LR)]), 0x4770);
        assert_eq!(asm16(ArmOp::Bx, &[], &[r(0)]), 0x4700);
        assert_eq!(asm16(ArmOp::Blx, &[Operand::reg(arm::LR)], &[r(0)]), 0x4780);
    }

    #[test]
    fn moves() {
        assert_eq!(asm16(ArmOp::Movs, &[r(0)], &[imm(0)]), 0x2000);
        assert_eq!(asm16(ArmOp::Movs, &[r(0)], &[imm(42)]), 0x202a);
        assert_eq!(asm16(ArmOp::Movs, &[r(7)], &[imm(255)]), 0x27ff);
        assert_eq!(asm16(ArmOp::Mov, &[r(0)], &[r(8)]), 0x4640);
        // movs between low registers is lsls #0.
        assert_eq!(asm16(ArmOp::Lsls, &[r(0)], &[r(1), imm(0)]), 0x0008);
    }

    #[test]
    fn add_and_subtract_pick_the_narrowest_form() {
        assert_eq!(asm16(ArmOp::Adds, &[r(0)], &[r(1), imm(3)]), 0x1cc8);
        assert_eq!(asm16(ArmOp::Adds, &[r(0)], &[r(0), imm(42)]), 0x302a);
        assert_eq!(asm16(ArmOp::Adds, &[r(0)], &[r(1), r(2)]), 0x1888);
        assert_eq!(asm16(ArmOp::Subs, &[r(0)], &[r(1), imm(3)]), 0x1ec8);
        assert_eq!(asm16(ArmOp::Subs, &[r(0)], &[r(0), imm(42)]), 0x382a);
        assert_eq!(asm16(ArmOp::Subs, &[r(0)], &[r(1), r(2)]), 0x1a88);
        assert_eq!(asm16(ArmOp::Add, &[r(0)], &[r(0), r(8)]), 0x4440);
        let e = encode(&build(ArmOp::Adds, &[r(0)], &[r(1), imm(0x101)]), PC).unwrap_err();
        assert!(matches!(e, IrError::OperandOutOfRange { .. }), "{:?}", e);
    }

    #[test]
    fn compares() {
        assert_eq!(asm16(ArmOp::Cmp, &[], &[r(0), imm(42)]), 0x282a);
        assert_eq!(asm16(ArmOp::Cmp, &[], &[r(0), r(1)]), 0x4288);
        assert_eq!(asm16(ArmOp::Cmp, &[], &[r(0), r(8)]), 0x4540);
        assert_eq!(asm16(ArmOp::Cmn, &[], &[r(0), r(1)]), 0x42c8);
        assert_eq!(asm16(ArmOp::Tst, &[], &[r(0), r(1)]), 0x4208);
    }

    #[test]
    fn two_register_data_processing() {
        let dp = |op| asm16(op, &[r(0)], &[r(0), r(1)]);
        assert_eq!(dp(ArmOp::Ands), 0x4008);
        assert_eq!(dp(ArmOp::Orrs), 0x4308);
        assert_eq!(dp(ArmOp::Eors), 0x4048);
        assert_eq!(dp(ArmOp::Bics), 0x4388);
        assert_eq!(dp(ArmOp::Adcs), 0x4148);
        assert_eq!(dp(ArmOp::Sbcs), 0x4188);
        assert_eq!(dp(ArmOp::Rors), 0x41c8);
        assert_eq!(dp(ArmOp::Lsls), 0x4088);
        assert_eq!(dp(ArmOp::Lsrs), 0x40c8);
        assert_eq!(dp(ArmOp::Asrs), 0x4108);
        assert_eq!(asm16(ArmOp::Mvns, &[r(0)], &[r(1)]), 0x43c8);
        assert_eq!(asm16(ArmOp::Muls, &[r(0)], &[r(1), r(0)]), 0x4348);
        assert_eq!(asm16(ArmOp::Rsbs, &[r(0)], &[r(1), imm(0)]), 0x4248);
    }

    #[test]
    fn immediate_shifts() {
        assert_eq!(asm16(ArmOp::Lsls, &[r(0)], &[r(1), imm(3)]), 0x00c8);
        assert_eq!(asm16(ArmOp::Lsrs, &[r(0)], &[r(1), imm(3)]), 0x08c8);
        assert_eq!(asm16(ArmOp::Asrs, &[r(0)], &[r(1), imm(3)]), 0x10c8);
        let lsr32 = dis16(0x0808);
        assert_eq!(lsr32.src(1).imm_value(), 32);
        roundtrip(&0x0808u16.to_le_bytes());
    }

    #[test]
    fn flag_usage() {
        let adcs = dis16(0x4148);
        assert!(adcs.eflags().intersects(Eflags::READ_CF));
        assert!(adcs.eflags().intersects(Eflags::WRITE_ZF));
        assert_eq!(adcs.predicate(), Predicate::None);
        assert_eq!(dis16(0x4640).eflags(), Eflags::NONE);
    }

    #[test]
    fn immediate_offset_transfers() {
        assert_eq!(asm16(ArmOp::Ldr, &[r(0)], &[mem(1, 0, OpSize::B4)]), 0x6808);
        assert_eq!(asm16(ArmOp::Ldr, &[r(0)], &[mem(1, 4, OpSize::B4)]), 0x6848);
        assert_eq!(asm16(ArmOp::Str, &[mem(1, 0, OpSize::B4)], &[r(0)]), 0x6008);
        assert_eq!(asm16(ArmOp::Ldrb, &[r(0)], &[mem(1, 0, OpSize::B1)]), 0x7808);
        assert_eq!(asm16(ArmOp::Strb, &[mem(1, 0, OpSize::B1)], &[r(0)]), 0x7008);
        assert_eq!(asm16(ArmOp::Ldrh, &[r(0)], &[mem(1, 0, OpSize::B2)]), 0x8808);
        assert_eq!(asm16(ArmOp::Strh, &[mem(1, 0, OpSize::B2)], &[r(0)]), 0x8008);
        let sp = |disp| Operand::base_disp(arm::SP, Reg::NULL, 0, disp, OpSize::B4);
        assert_eq!(asm16(ArmOp::Ldr, &[r(0)], &[sp(0)]), 0x9800);
        assert_eq!(asm16(ArmOp::Ldr, &[r(0)], &[sp(4)]), 0x9801);
        assert_eq!(asm16(ArmOp::Str, &[sp(0)], &[r(0)]), 0x9000);
        let e = encode(&build(ArmOp::Ldr, &[r(0)], &[mem(1, 2, OpSize::B4)]), PC).unwrap_err();
        assert!(matches!(e, IrError::IllegalOperand { .. }), "{:?}", e);
    }

    #[test]
    fn register_offset_transfers() {
        assert_eq!(asm16(ArmOp::Ldr, &[r(0)], &[idx(1, 2, OpSize::B4)]), 0x5888);
        assert_eq!(asm16(ArmOp::Str, &[idx(1, 2, OpSize::B4)], &[r(0)]), 0x5088);
        assert_eq!(asm16(ArmOp::Ldrb, &[r(0)], &[idx(1, 2, OpSize::B1)]), 0x5c88);
        assert_eq!(asm16(ArmOp::Strb, &[idx(1, 2, OpSize::B1)], &[r(0)]), 0x5488);
        assert_eq!(asm16(ArmOp::Ldrh, &[r(0)], &[idx(1, 2, OpSize::B2)]), 0x5a88);
        assert_eq!(asm16(ArmOp::Strh, &[idx(1, 2, OpSize::B2)], &[r(0)]), 0x5288);
        roundtrip(&0x5688u16.to_le_bytes());
        roundtrip(&0x5e88u16.to_le_bytes());
    }

    #[test]
    fn literal_loads_use_the_aligned_pc() {
        // ldr r0, [pc, #8] at 0x1002: Align(0x1006, 4) + 8.
        let bytes = 0x4802u16.to_le_bytes();
        let mut instr = Instr::new(IsaMode::Thumb);
        decode_in(IsaMode::Thumb, &bytes, 0x1002, &mut instr, Level::Full).unwrap();
        assert_eq!(instr.src(0), Operand::rel_addr(0x100c, OpSize::B4));
        let adr = dis16(0xa001);
        assert_eq!(adr.src(0), Operand::pc(0x1008));
        roundtrip(&0xa001u16.to_le_bytes());
        roundtrip(&0x4802u16.to_le_bytes());
    }

    #[test]
    fn stack_lists() {
        assert_eq!(dis16(0xb503).num_srcs(), 4);
        for hw in [0xb503u16, 0xb401, 0xbd03, 0xbc01] {
            roundtrip(&hw.to_le_bytes());
        }
        let push = dis16(0xb503);
        assert_eq!(push.dst(0).disp(), -12);
        assert_eq!(push.src(2).reg_id(), arm::LR);
        let pop = dis16(0xbd03);
        assert_eq!(pop.dst(2).reg_id(), arm::PC);
    }

    #[test]
    fn block_transfer_writeback_follows_the_list() {
        // ldmia r0!, {r1, r2}
        let wb = dis16(0xc806);
        assert_eq!(wb.num_dsts(), 3);
        // ldmia r0, {r0, r1}
        let plain = dis16(0xc803);
        assert_eq!(plain.num_dsts(), 2);
        for hw in [0xc806u16, 0xc803, 0xc106] {
            roundtrip(&hw.to_le_bytes());
        }
    }

    #[test]
    fn it_blocks() {
        let it = |cond, mask| asm16(ArmOp::It, &[], &[imm(cond), imm(mask)]);
        assert_eq!(it(0, 8), 0xbf08);
        assert_eq!(it(1, 4), 0xbf14);
        let e = encode(&build(ArmOp::It, &[], &[imm(0), imm(0)]), PC).unwrap_err();
        assert!(matches!(e, IrError::IllegalOperand { .. }));
    }

    #[test]
    fn extends_and_reverses() {
        for hw in [0xb208u16, 0xb248, 0xb288, 0xb2c8, 0xba08, 0xba48, 0xbac8] {
            roundtrip(&hw.to_le_bytes());
        }
        assert!(decode_in(IsaMode::Thumb, &0xba88u16.to_le_bytes(), PC, &mut Instr::new(IsaMode::Thumb), Level::Full).is_err());
    }

    #[test]
    fn narrow_branches() {
        // b . (0xe7fe) targets itself.
        assert_eq!(dis16(0xe7fe).src(0), Operand::pc(PC));
        let b = build(ArmOp::B, &[], &[Operand::pc(PC + 0x10)]);
        assert_eq!(asm(&b), 0xe006u16.to_le_bytes());
        let mut beq = build(ArmOp::B, &[], &[Operand::pc(PC + 0x10)]);
        beq.set_predicate(Predicate::Arm(Cond::Eq));
        assert_eq!(asm(&beq), 0xd006u16.to_le_bytes());
        let decoded = dis16(0xd106);
        assert_eq!(decoded.predicate(), Predicate::Arm(Cond::Ne));
        assert!(decoded.eflags().intersects(Eflags::READ_ZF));
        let cbz = dis16(0xb11a);
        assert_eq!(cbz.src(1), Operand::pc(PC + 4 + 6));
        roundtrip(&0xb11au16.to_le_bytes());
        roundtrip(&0xbbfau16.to_le_bytes());
    }

    #[test]
    fn wide_branches() {
        // bl from 0x1000 to 0x2000
        let bl = [0x00, 0xf0, 0xfe, 0xff];
        let instr = dis(&bl);
        assert_eq!(instr.opcode(), Opcode::Arm(ArmOp::Bl));
        assert_eq!(instr.src(0), Operand::pc(0x2000));
        assert_eq!(asm(&instr), bl);
        // bl .
        let here = build(ArmOp::Bl, &[Operand::reg(arm::LR)], &[Operand::pc(PC)]);
        assert_eq!(asm(&here), [0xff, 0xf7, 0xfe, 0xff]);
        // Out of narrow reach, b widens.
        let far = build(ArmOp::B, &[], &[Operand::pc(PC + 0x10000)]);
        assert_eq!(asm(&far).len(), 4);
        let mut far_eq = build(ArmOp::B, &[], &[Operand::pc(PC + 0x1000)]);
        far_eq.set_predicate(Predicate::Arm(Cond::Gt));
        let bytes = asm(&far_eq);
        assert_eq!(bytes.len(), 4);
        assert_eq!(dis(&bytes).predicate(), Predicate::Arm(Cond::Gt));
        let blx = build(ArmOp::Blx, &[Operand::reg(arm::LR)], &[Operand::pc(0x2000)]);
        let bytes = asm(&blx);
        assert_eq!(dis(&bytes).src(0), Operand::pc(0x2000));
    }

    #[test]
    fn wide_prefix_needs_both_halfwords() {
        let mut instr = Instr::new(IsaMode::Thumb);
        let e = decode_in(IsaMode::Thumb, &[0x00, 0xf0], PC, &mut instr, Level::Full).unwrap_err();
        assert_eq!(
            e,
            IrError::Truncated {
                needed: 4,
                available: 2
            }
        );
    }

    #[test]
    fn a32_only_opcodes_have_no_encoding() {
        assert!(find_head::<ThumbLayout>(Opcode::Arm(ArmOp::Mla)).is_none());
        assert!(find_head::<ThumbLayout>(Opcode::Arm(ArmOp::Cbz)).is_some());
        assert!(defaults(Opcode::Arm(ArmOp::Mla)).is_none());
        assert_eq!(defaults(Opcode::Arm(ArmOp::B)).map(|d| d.1), Some(Predicate::Always));
    }

    #[test]
    fn high_registers_rejected_by_narrow_lists() {
        let list = [
            Operand::reg_ex(arm::gpr(8), OpSize::None, OpndFlags::IN_LIST),
            Operand::reg(arm::SP),
        ];
        let push = build(
            ArmOp::Push,
            &[Operand::base_disp(arm::SP, Reg::NULL, 0, -4, OpSize::RegList), Operand::reg(arm::SP)],
            &list,
        );
        assert!(encode(&push, PC).is_err());
    }

    #[test]
    fn decoded_immediate_width_selects_the_form() {
        // adds r0, #1 and adds r0, r0, #1 both fit either form.
        roundtrip(&0x3001u16.to_le_bytes());
        roundtrip(&0x1c40u16.to_le_bytes());
    }

    #[test]
    fn modified_immediates_invert() {
        for v in [0u32, 0xab, 0x00ab_00ab, 0xab00_ab00, 0xabab_abab, 0x100, 0xff00_0000, 0x8000_0000, 0x0003_fc00] {
            let imm12 = modified_imm(v).unwrap_or_else(|| panic!("{:#x}", v));
            assert_eq!(expand_imm(imm12), Some(v), "{:#x}", v);
        }
        assert_eq!(modified_imm(0x101), None);
        assert_eq!(modified_imm(0x1234), None);
        assert_eq!(expand_imm(0x100), None);
    }

    #[test]
    fn wide_loads_and_stores() {
        // ldr.w r0, [r0]
        let ldr = dis(&[0xd0, 0xf8, 0x00, 0x00]);
        assert_eq!(ldr.opcode(), Opcode::Arm(ArmOp::Ldr));
        assert_eq!(ldr.dst(0), r(0));
        assert_eq!(ldr.src(0), mem(0, 0, OpSize::B4));
        // High registers and long offsets widen.
        assert_eq!(asm(&build(ArmOp::Ldr, &[r(8)], &[mem(0, 0, OpSize::B4)])), [0xd0, 0xf8, 0x00, 0x80]);
        assert_eq!(asm(&build(ArmOp::Ldr, &[r(0)], &[mem(1, 0x100, OpSize::B4)])), [0xd1, 0xf8, 0x00, 0x01]);
        assert_eq!(asm(&build(ArmOp::Strb, &[mem(1, 1, OpSize::B1)], &[r(8)])), [0x81, 0xf8, 0x01, 0x80]);
        let shifted = Operand::base_disp_shift(
            arm::gpr(1),
            arm::gpr(2),
            false,
            IndexShift::new(Shift::Lsl, 2),
            0,
            OpSize::B4,
        );
        assert_eq!(asm(&build(ArmOp::Ldr, &[r(0)], &[shifted])), [0x51, 0xf8, 0x22, 0x00]);
        let far = build(ArmOp::Ldr, &[r(0)], &[Operand::rel_addr(0x1404, OpSize::B4)]);
        assert_eq!(asm(&far), [0xdf, 0xf8, 0x00, 0x04]);
        // ldr r0, [r1, #-4]; ldr r0, [r1, #4]!; ldr r0, [r1], #4; ldr r0, [r1, r2, lsl #2]
        for bytes in [[0x51, 0xf8, 0x04, 0x0c], [0x51, 0xf8, 0x04, 0x0f], [0x51, 0xf8, 0x04, 0x0b], [0x51, 0xf8, 0x22, 0x00]] {
            roundtrip(&bytes);
        }
        let pre = dis(&[0x51, 0xf8, 0x04, 0x0f]);
        assert_eq!(pre.dsts(), &[r(0), r(1)]);
        assert_eq!(pre.src(0), mem(1, 4, OpSize::B4));
        let post = dis(&[0x51, 0xf8, 0x04, 0x0b]);
        assert_eq!(post.src(0), mem(1, 0, OpSize::B4));
        assert_eq!(post.src(1).imm_value(), 4);
        let lit = dis(&[0x5f, 0xf8, 0x08, 0x00]);
        assert_eq!(lit.src(0), Operand::rel_addr(0x1004 - 8, OpSize::B4));
        // ldrb pc, [r0] is a preload hint.
        assert!(decode_in(IsaMode::Thumb, &[0x90, 0xf8, 0x00, 0xf0], PC, &mut Instr::new(IsaMode::Thumb), Level::Full).is_err());
    }

    #[test]
    fn wide_data_processing() {
        let add = build(ArmOp::Add, &[r(0)], &[r(1), imm(0x100)]);
        assert_eq!(asm(&add), [0x01, 0xf5, 0x80, 0x70]);
        let addw = build(ArmOp::Add, &[r(0)], &[r(1), imm(0xfff)]);
        assert_eq!(asm(&addw), [0x01, 0xf6, 0xff, 0x70]);
        assert_eq!(asm(&build(ArmOp::Movw, &[r(0)], &[imm(0x1234)])), [0x41, 0xf2, 0x34, 0x20]);
        assert_eq!(asm(&build(ArmOp::Movt, &[r(0)], &[imm(0x1234)])), [0xc1, 0xf2, 0x34, 0x20]);
        // adds.w r8, r8, r1, lsl #2
        let adds = dis(&[0x18, 0xeb, 0x81, 0x08]);
        assert_eq!(adds.opcode(), Opcode::Arm(ArmOp::Adds));
        assert_eq!(adds.dst(0), r(8));
        assert_eq!(adds.src(2), Operand::shift_kind(Shift::Lsl));
        assert_eq!(adds.dst(1).imm_value(), 2);
        assert!(adds.eflags().intersects(Eflags::WRITE_ZF));
        // cmp.w r8, #0x100
        let cmp = dis(&[0xb8, 0xf5, 0x80, 0x7f]);
        assert_eq!(cmp.opcode(), Opcode::Arm(ArmOp::Cmp));
        assert_eq!(cmp.src(1).imm_value(), 0x100);
        for bytes in [[0x18, 0xeb, 0x81, 0x08], [0xb8, 0xf5, 0x80, 0x7f], [0x01, 0xf6, 0xff, 0x70]] {
            roundtrip(&bytes);
        }
        // Neither a modified immediate nor a plain 12-bit one.
        assert!(encode(&build(ArmOp::Orr, &[r(0)], &[r(1), imm(0x1234)]), PC).is_err());
    }

    #[test]
    fn it_block_members_drop_flag_setting() {
        let eq = Predicate::Arm(Cond::Eq);
        let member = |bytes: &[u8]| {
            let mut instr = Instr::new(IsaMode::Thumb);
            decode_in_block(bytes, PC, &mut instr, Level::Full, Some(eq)).map(|_| instr)
        };
        let add = member(&0x3001u16.to_le_bytes()).unwrap();
        assert_eq!(add.opcode(), Opcode::Arm(ArmOp::Add));
        assert_eq!(add.predicate(), eq);
        assert!(add.eflags().intersects(Eflags::READ_ZF));
        assert!(!add.eflags().intersects(Eflags::WRITE_ZF));
        assert_eq!(encode_in_block(&add, PC, Some(eq)).unwrap().to_vec(), 0x3001u16.to_le_bytes());
        // Outside a block the plain opcode needs a wide encoding.
        assert_eq!(asm(&build(ArmOp::Add, &[r(0)], &[r(0), imm(1)])).len(), 4);
        // Compares still set flags.
        assert_eq!(member(&0x2801u16.to_le_bytes()).unwrap().opcode(), Opcode::Arm(ArmOp::Cmp));
        // Conditional branches, cbz and it are not members.
        for hw in [0xd006u16, 0xb11a, 0xbf08] {
            assert!(member(&hw.to_le_bytes()).is_err(), "{:#x}", hw);
        }
        let mut ne = add.clone();
        ne.set_predicate(Predicate::Arm(Cond::Ne));
        assert!(encode_in_block(&ne, PC, Some(eq)).is_err());
    }

    #[test]
    fn malformed_it_does_not_decode() {
        // it nv, ite al
        for hw in [0xbff8u16, 0xbfec] {
            assert!(decode_in(IsaMode::Thumb, &hw.to_le_bytes(), PC, &mut Instr::new(IsaMode::Thumb), Level::Full).is_err());
        }
    }
}
