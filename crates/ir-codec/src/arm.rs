//! A32 decoder and encoder.
//!
//! Both directions are driven by the tables in [`crate::arm_tables`]: the
//! decoder resolves a word to a terminal entry and expands its operand slots,
//! the encoder walks the opcode's chain and writes each slot's field into the
//! entry's canonical bits. The field conventions shared with Thumb (shift
//! types, VFP immediates, core register checks) live here.
//!
//! ## Operand conventions
//!
//! ```text
//!   add r0, r1, r2, lsl #3   dst [r0]   src [r1, r2, <lsl>, #3]
//!   add r3, r3, #1           dst [r3]   src [r3, #1]
//!   ldr r0, [r1, #4]!        dst [r0, r1]   src [[r1+4], #4, r1]
//!   ldm r0!, {r1, r2}        dst [r1, r2, r0]   src [[r0], r0]
//! ```
//!
//! The pc reads as the instruction address plus 8. Immediate-offset loads
//! from the pc without writeback decode as pc-relative addresses.

use crate::arm_tables::{A32Ext, A32Layout, A32Ty};
use crate::decode::{apply_entry, read_u32, sext, Level};
use crate::encode::{encode_chain, verify, Cursor, InstrBytes, Word};
use crate::error::IrError;
use crate::fpimm::{vfp_compress, vfp_expand};
use crate::instr::{Eflags, Instr, Opcode, OperandList, Predicate};
use crate::isa::{Arch, IsaMode};
use crate::opnd::{IndexShift, MemRef, Operand, OpndFlags, Shift};
use crate::reg::{arm, Reg, RegClass};
use crate::size::OpSize;
use crate::table::{extras, find_head, resolve, Flags, OpInfo, Slot};

// ── Shared field helpers ─────────────────────────────────────────────────

/// Encode an 8-bit rotated immediate for A32 data processing.
/// Returns `Some((imm8, rotate))` where the value = imm8 ROR (rotate * 2),
/// or `None` if the value cannot be encoded.
pub(crate) fn encode_arm_imm(value: u32) -> Option<(u8, u8)> {
    for rot in 0..16u8 {
        let shift = rot * 2;
        let rotated = value.rotate_left(shift as u32);
        if rotated <= 0xFF {
            return Some((rotated as u8, rot));
        }
    }
    None
}

/// Shift kind and amount of an immediate shift field pair.
///
/// `lsl #0` is no shift, a zero amount means 32 for `lsr`/`asr`, and
/// `ror #0` is `rrx`.
pub(crate) fn decode_shift(ty: u32, imm5: u32) -> (Shift, u32) {
    match (ty & 3, imm5) {
        (0, 0) => (Shift::None, 0),
        (0, n) => (Shift::Lsl, n),
        (1, 0) => (Shift::Lsr, 32),
        (1, n) => (Shift::Lsr, n),
        (2, 0) => (Shift::Asr, 32),
        (2, n) => (Shift::Asr, n),
        (_, 0) => (Shift::Rrx, 0),
        (_, n) => (Shift::Ror, n),
    }
}

/// Inverse of [`decode_shift`]: `(type, imm5)`.
pub(crate) fn shift_fields(kind: Shift, amount: i64) -> Option<(u32, u32)> {
    match kind {
        Shift::None | Shift::Lsl if (0..32).contains(&amount) => Some((0, amount as u32)),
        Shift::Lsr if (1..=32).contains(&amount) => Some((1, amount as u32 & 31)),
        Shift::Asr if (1..=32).contains(&amount) => Some((2, amount as u32 & 31)),
        Shift::Ror if (1..32).contains(&amount) => Some((3, amount as u32)),
        Shift::Rrx if amount == 0 => Some((3, 0)),
        _ => None,
    }
}

/// Shift type of a register-controlled shift.
pub(crate) fn reg_shift_type(kind: Shift) -> Option<u32> {
    match kind {
        Shift::None | Shift::Lsl => Some(0),
        Shift::Lsr => Some(1),
        Shift::Asr => Some(2),
        Shift::Ror => Some(3),
        _ => None,
    }
}

const REG_SHIFTS: [Shift; 4] = [Shift::Lsl, Shift::Lsr, Shift::Asr, Shift::Ror];

/// Encoding number of a plain core register operand.
pub(crate) fn core_num(op: &Operand) -> Option<u32> {
    match op {
        Operand::Reg { reg, flags, .. }
            if reg.arch() == Some(Arch::Arm)
                && reg.class() == RegClass::Gpr
                && !flags.contains(OpndFlags::NEGATED)
                && !flags.contains(OpndFlags::SHIFTED) =>
        {
            Some(reg.number() as u32)
        }
        _ => None,
    }
}

/// Encoding number of an `s` (B4) or `d` (B8) register operand.
pub(crate) fn vfp_num(op: &Operand, size: OpSize) -> Option<u32> {
    match op {
        Operand::Reg { reg, .. }
            if reg.arch() == Some(Arch::Arm) && reg.class() == RegClass::Simd && reg.size() == size =>
        {
            Some(reg.number() as u32)
        }
        _ => None,
    }
}

/// An integer immediate as a 32-bit pattern (negative values wrap).
pub(crate) fn imm32(op: &Operand) -> Option<u32> {
    match op {
        Operand::ImmInt { value, .. } if (-(1i64 << 31)..(1i64 << 32)).contains(value) => {
            Some(*value as u32)
        }
        _ => None,
    }
}

pub(crate) fn imm_shift_kind(op: &Operand) -> Option<Shift> {
    match op {
        Operand::ImmInt { value, .. } => Shift::from_imm(*value),
        _ => None,
    }
}

/// Magnitude and direction of a signed offset; `-0` is carried by the
/// negated flag.
pub(crate) fn split_offset(value: i64, flags: OpndFlags) -> (bool, u64) {
    let up = value > 0 || (value == 0 && !flags.contains(OpndFlags::NEGATED));
    (up, value.unsigned_abs())
}

fn gpr_op(n: u32) -> Operand {
    Operand::reg(arm::gpr(n as u8))
}

// ── Decoding ─────────────────────────────────────────────────────────────

fn select(kind: A32Ext, w: u32) -> usize {
    let bit = |n: u32| ((w >> n) & 1) as usize;
    match kind {
        A32Ext::Top => ((w >> 20) & 0xff) as usize,
        A32Ext::Opc4x => {
            if bit(4) == 0 {
                0
            } else if bit(7) == 0 {
                1
            } else {
                2 + ((w >> 5) & 3) as usize
            }
        }
        A32Ext::Opc4 => ((w >> 4) & 0xf) as usize,
        A32Ext::Imm1916 => usize::from((w >> 16) & 0xf != 0),
        A32Ext::Bits0 => (w & 7) as usize,
        A32Ext::Bit4 => bit(4),
        A32Ext::Bits8 => ((w >> 8) & 0xf) as usize,
        A32Ext::Vfp => {
            if (w >> 9) & 7 != 0b101 {
                8
            } else {
                (bit(4) << 2) | (bit(8) << 1) | bit(6)
            }
        }
        A32Ext::Opc2 => ((w >> 16) & 0xf) as usize * 2 + bit(7),
    }
}

/// Field reader for one A32 word.
struct Fields {
    word: u32,
    pc: u32,
}

impl Fields {
    fn get(&self, lo: u32, width: u32) -> u32 {
        (self.word >> lo) & ((1 << width) - 1)
    }

    fn up(&self) -> bool {
        self.get(23, 1) == 1
    }

    /// P=1 W=0: offset addressing without writeback.
    fn is_plain_offset(&self) -> bool {
        self.get(24, 1) == 1 && self.get(21, 1) == 0
    }

    fn pc_read(&self) -> u32 {
        self.pc.wrapping_add(8)
    }

    fn branch(&self, offset: i64) -> Operand {
        Operand::pc(self.pc_read().wrapping_add(offset as u32) as u64)
    }

    fn signed_imm(&self, magnitude: u32, size: OpSize) -> Operand {
        let mut op = if self.up() {
            Operand::imm_int(magnitude as i64, size)
        } else {
            Operand::imm_int(-(magnitude as i64), size)
        };
        if !self.up() && magnitude == 0 {
            op.add_flags(OpndFlags::NEGATED);
        }
        op
    }

    /// `[Rn, #±imm]`, or a literal address when Rn is the pc.
    fn offset_mem(&self, imm: u32, size: OpSize) -> Operand {
        let rn = self.get(16, 4);
        if rn == 15 && self.is_plain_offset() {
            let base = self.pc_read() & !3;
            let addr = if self.up() {
                base.wrapping_add(imm)
            } else {
                base.wrapping_sub(imm)
            };
            return Operand::rel_addr(addr as u64, size);
        }
        let disp = if self.up() { imm as i32 } else { -(imm as i32) };
        let mut op = Operand::base_disp(arm::gpr(rn as u8), Reg::NULL, 0, disp, size);
        if !self.up() && imm == 0 {
            op.add_flags(OpndFlags::NEGATED);
        }
        op
    }

    fn index_mem(&self, shifted: bool, size: OpSize) -> Operand {
        let shift = if shifted {
            let (kind, amount) = decode_shift(self.get(5, 2), self.get(7, 5));
            IndexShift::new(kind, amount as u8)
        } else {
            IndexShift::NONE
        };
        Operand::base_disp_shift(
            arm::gpr(self.get(16, 4) as u8),
            arm::gpr(self.get(0, 4) as u8),
            !self.up(),
            shift,
            0,
            size,
        )
    }

    fn operand(&self, slot: Slot<A32Ty>, out: &mut OperandList) -> Result<(), IrError> {
        let size = slot.size;
        let op = match slot.ty {
            A32Ty::None => return Ok(()),
            A32Ty::Ra => gpr_op(self.get(16, 4)),
            A32Ty::Rb => gpr_op(self.get(12, 4)),
            A32Ty::Rc => gpr_op(self.get(8, 4)),
            A32Ty::Rd => gpr_op(self.get(0, 4)),
            A32Ty::RbPair => gpr_op((self.get(12, 4) + 1) & 0xf),
            A32Ty::RbApsr => match self.get(12, 4) {
                15 => Operand::reg(arm::CPSR),
                n => gpr_op(n),
            },
            A32Ty::Lr => Operand::reg(arm::LR),
            A32Ty::Cpsr => Operand::reg(arm::CPSR),
            A32Ty::Spsr => Operand::reg(arm::SPSR),
            A32Ty::Fpscr => Operand::reg(arm::FPSCR),
            A32Ty::VbS => Operand::reg(arm::s((self.get(12, 4) << 1 | self.get(22, 1)) as u8)),
            A32Ty::VaS => Operand::reg(arm::s((self.get(16, 4) << 1 | self.get(7, 1)) as u8)),
            A32Ty::VcS => Operand::reg(arm::s((self.get(0, 4) << 1 | self.get(5, 1)) as u8)),
            A32Ty::VbD => Operand::reg(arm::d((self.get(22, 1) << 4 | self.get(12, 4)) as u8)),
            A32Ty::VaD => Operand::reg(arm::d((self.get(7, 1) << 4 | self.get(16, 4)) as u8)),
            A32Ty::VcD => Operand::reg(arm::d((self.get(5, 1) << 4 | self.get(0, 4)) as u8)),
            A32Ty::Imm8Rot => {
                let value = self.get(0, 8).rotate_right(self.get(8, 4) * 2);
                Operand::imm_uint(value as u64, size)
            }
            A32Ty::Imm16 => Operand::imm_uint((self.get(16, 4) << 12 | self.get(0, 12)) as u64, size),
            A32Ty::Imm16Split12 => {
                Operand::imm_uint((self.get(8, 12) << 4 | self.get(0, 4)) as u64, size)
            }
            A32Ty::Imm24 => Operand::imm_uint(self.get(0, 24) as u64, size),
            A32Ty::ShTy | A32Ty::ShTyIdx => {
                Operand::shift_kind(decode_shift(self.get(5, 2), self.get(7, 5)).0)
            }
            A32Ty::Imm5 | A32Ty::Imm5Idx => {
                let amount = decode_shift(self.get(5, 2), self.get(7, 5)).1;
                Operand::imm_uint(amount as u64, size)
            }
            A32Ty::ShTyReg => Operand::shift_kind(REG_SHIFTS[self.get(5, 2) as usize]),
            A32Ty::Imm4Mask => Operand::imm_uint(self.get(16, 4) as u64, size),
            A32Ty::Imm12Signed => self.signed_imm(self.get(0, 12), size),
            A32Ty::Imm8Signed => self.signed_imm(self.get(8, 4) << 4 | self.get(0, 4), size),
            A32Ty::RdIndex => {
                let flags = if self.up() {
                    OpndFlags::NONE
                } else {
                    OpndFlags::NEGATED
                };
                Operand::reg_ex(arm::gpr(self.get(0, 4) as u8), OpSize::None, flags)
            }
            A32Ty::VfpImm8 => {
                let imm8 = self.get(16, 4) << 4 | self.get(0, 4);
                Operand::ImmFloat {
                    bits: vfp_expand(imm8, size),
                    size,
                }
            }
            A32Ty::FpZero => Operand::ImmFloat { bits: 0, size },
            A32Ty::Pc24 => self.branch(sext(self.get(0, 24) << 2, 26)),
            A32Ty::Pc24H => self.branch(sext(self.get(0, 24) << 2 | self.get(24, 1) << 1, 26)),
            A32Ty::MemImm12 => self.offset_mem(self.get(0, 12), size),
            A32Ty::MemImm8 => self.offset_mem(self.get(8, 4) << 4 | self.get(0, 4), size),
            A32Ty::MemPost => Operand::base_disp(arm::gpr(self.get(16, 4) as u8), Reg::NULL, 0, 0, size),
            A32Ty::MemReg => self.index_mem(true, size),
            A32Ty::MemRegPlain => self.index_mem(false, size),
            A32Ty::MemVfp => {
                let imm = self.get(0, 8) << 2;
                let rn = self.get(16, 4);
                if rn == 15 {
                    let base = self.pc_read() & !3;
                    let addr = if self.up() {
                        base.wrapping_add(imm)
                    } else {
                        base.wrapping_sub(imm)
                    };
                    Operand::rel_addr(addr as u64, size)
                } else {
                    let disp = if self.up() { imm as i32 } else { -(imm as i32) };
                    Operand::base_disp(arm::gpr(rn as u8), Reg::NULL, 0, disp, size)
                }
            }
            A32Ty::MemList => {
                let n = self.get(0, 16).count_ones() as i32;
                let disp = block_disp(self.get(24, 1) == 1, self.up(), n);
                Operand::base_disp(arm::gpr(self.get(16, 4) as u8), Reg::NULL, 0, disp, size)
            }
            A32Ty::RegList => {
                let mask = self.get(0, 16);
                for n in (0..16).filter(|n| mask & (1 << n) != 0) {
                    out.push(Operand::reg_ex(arm::gpr(n as u8), OpSize::None, OpndFlags::IN_LIST));
                }
                return Ok(());
            }
        };
        out.push(op);
        Ok(())
    }
}

/// Displacement of the lowest transferred word of a block transfer.
pub(crate) fn block_disp(before: bool, up: bool, count: i32) -> i32 {
    match (before, up) {
        (false, true) => 0,
        (true, true) => 4,
        (false, false) => -(count - 1) * 4,
        (true, false) => -count * 4,
    }
}

/// Decode the A32 word at the start of `bytes`. Returns the length.
pub(crate) fn decode(bytes: &[u8], pc: u64, instr: &mut Instr<'_>, level: Level) -> Result<usize, IrError> {
    let word = read_u32(bytes)?;
    if level == Level::Raw {
        return Ok(4);
    }
    let invalid = IrError::InvalidEncoding {
        mode: IsaMode::ArmA32,
        pc,
        word,
    };
    let cond = word >> 28;
    let root = (A32Ext::Top, u16::from(cond == 0xf));
    let Some((_, info)) = resolve::<A32Layout>(IsaMode::ArmA32, root, |kind| Ok(select(kind, word)))? else {
        return Err(invalid);
    };
    if !info.has_fixed_ones(word) {
        return Err(invalid);
    }
    let predicate = if info.flags.contains(Flags::PREDICATE_28) {
        Predicate::from_arm(cond)
    } else if info.flags.contains(Flags::PREDICATE_28_AL) {
        if cond != 0xe {
            return Err(invalid);
        }
        Predicate::Always
    } else {
        Predicate::Op
    };
    let fields = Fields {
        word,
        pc: pc as u32,
    };
    apply_entry(instr, info, predicate, level, |slot, out| fields.operand(slot, out))?;
    Ok(4)
}

/// Status-flag usage and default predicate of an opcode's first A32 entry.
pub(crate) fn defaults(opcode: Opcode) -> Option<(Eflags, Predicate)> {
    let (_, info) = find_head::<A32Layout>(opcode)?;
    let predicate = if info.flags.has_predicate() {
        Predicate::Always
    } else {
        Predicate::Op
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
    /// Shift kind named by the last shift-type operand.
    shift: Shift,
}

impl Encoder {
    fn mismatch(&self) -> IrError {
        IrError::NoMatchingEncoding {
            opcode: self.word.opcode,
        }
    }

    fn reg(&mut self, op: &Operand, lo: u32) -> Result<(), IrError> {
        let n = core_num(op).ok_or_else(|| self.mismatch())?;
        self.word.put(lo, 4, n)
    }

    fn fixed(&self, op: &Operand, reg: Reg) -> Result<(), IrError> {
        match op {
            Operand::Reg { reg: r, .. } if *r == reg => Ok(()),
            _ => Err(self.mismatch()),
        }
    }

    /// `s` register split as `Vx:lo_bit`, `d` register as `hi_bit:Vx`.
    fn vreg(&mut self, op: &Operand, size: OpSize, four: u32, one: u32) -> Result<(), IrError> {
        let n = vfp_num(op, size).ok_or_else(|| self.mismatch())?;
        let (high4, bit) = if size == OpSize::B4 {
            (n >> 1, n & 1)
        } else {
            (n & 0xf, n >> 4)
        };
        self.word.put(four, 4, high4)?;
        self.word.put(one, 1, bit)
    }

    fn up_bit(&mut self, up: bool) -> Result<(), IrError> {
        self.word.put(23, 1, u32::from(up))
    }

    fn signed_imm(&mut self, op: &Operand, split: bool) -> Result<(), IrError> {
        let Operand::ImmInt { value, flags, .. } = op else {
            return Err(self.mismatch());
        };
        let (up, magnitude) = split_offset(*value, *flags);
        let width = if split { 8 } else { 12 };
        if magnitude >= 1 << width {
            return Err(self.word.out_of_range(*value, width));
        }
        self.up_bit(up)?;
        self.put_offset(magnitude as u32, split)
    }

    fn put_offset(&mut self, magnitude: u32, split: bool) -> Result<(), IrError> {
        if split {
            self.word.put(8, 4, magnitude >> 4)?;
            self.word.put(0, 4, magnitude & 0xf)
        } else {
            self.word.put(0, 12, magnitude)
        }
    }

    /// `[Rn, #±imm]` or a literal address.
    fn offset_mem(&mut self, op: &Operand, split: bool) -> Result<(), IrError> {
        let width = if split { 8 } else { 12 };
        let (rn, up, magnitude, value) = match op {
            Operand::BaseDisp(m) if m.index.is_null() => {
                let rn = core_num(&Operand::reg(m.base)).ok_or_else(|| self.mismatch())?;
                let (up, magnitude) = split_offset(m.disp as i64, m.flags);
                (rn, up, magnitude, m.disp as i64)
            }
            Operand::RelAddr { addr, .. } => {
                let plain = (self.word.bits >> 24) & 1 == 1 && (self.word.bits >> 21) & 1 == 0;
                if !plain {
                    return Err(self.word.illegal("pc-relative form cannot write back"));
                }
                let base = self.pc.wrapping_add(8) & !3;
                let off = (*addr as u32).wrapping_sub(base) as i32 as i64;
                (15, off >= 0, off.unsigned_abs(), off)
            }
            _ => return Err(self.mismatch()),
        };
        if magnitude >= 1 << width {
            return Err(self.word.out_of_range(value, width));
        }
        self.word.put(16, 4, rn)?;
        self.up_bit(up)?;
        self.put_offset(magnitude as u32, split)
    }

    fn index_mem(&mut self, op: &Operand, shifted: bool) -> Result<(), IrError> {
        let Operand::BaseDisp(m) = op else {
            return Err(self.mismatch());
        };
        if m.index.is_null() || m.disp != 0 || m.scale > 1 {
            return Err(self.mismatch());
        }
        let rn = core_num(&Operand::reg(m.base)).ok_or_else(|| self.mismatch())?;
        let rm = core_num(&Operand::reg(m.index)).ok_or_else(|| self.mismatch())?;
        let (ty, imm5) = shift_fields(m.shift.kind, m.shift.amount as i64)
            .ok_or_else(|| self.word.illegal("index shift not encodable"))?;
        if !shifted && (ty, imm5) != (0, 0) {
            return Err(self.mismatch());
        }
        self.word.put(16, 4, rn)?;
        self.word.put(0, 4, rm)?;
        self.up_bit(!m.flags.contains(OpndFlags::NEGATED))?;
        if shifted {
            self.word.put(5, 2, ty)?;
            self.word.put(7, 5, imm5)?;
        }
        Ok(())
    }

    fn plain_base<'o>(&self, op: &'o Operand) -> Result<(&'o MemRef, u32), IrError> {
        match op {
            Operand::BaseDisp(m) if m.index.is_null() => {
                let rn = core_num(&Operand::reg(m.base)).ok_or_else(|| self.mismatch())?;
                Ok((m, rn))
            }
            _ => Err(self.mismatch()),
        }
    }

    fn branch(&mut self, op: &Operand, halfword: bool) -> Result<(), IrError> {
        let Operand::Pc { target, selector: None } = op else {
            return Err(self.mismatch());
        };
        let off = (*target as u32).wrapping_sub(self.pc.wrapping_add(8)) as i32 as i64;
        let align = if halfword { 1 } else { 3 };
        if off & align != 0 {
            return Err(self.word.illegal("branch target misaligned"));
        }
        if halfword {
            self.word.put(24, 1, ((off >> 1) & 1) as u32)?;
        }
        self.word.put_signed(0, 24, off >> 2)
    }

    fn operand(&mut self, slot: Slot<A32Ty>, op: &Operand) -> Result<(), IrError> {
        match slot.ty {
            A32Ty::None | A32Ty::RegList => Err(self.mismatch()),
            A32Ty::Ra => self.reg(op, 16),
            A32Ty::Rb => self.reg(op, 12),
            A32Ty::Rc => self.reg(op, 8),
            A32Ty::Rd => self.reg(op, 0),
            A32Ty::RbPair => {
                let n = core_num(op).ok_or_else(|| self.mismatch())?;
                if n != ((self.word.bits >> 12) & 0xf) + 1 {
                    return Err(self.word.illegal("second register must follow the first"));
                }
                Ok(())
            }
            A32Ty::RbApsr => match op {
                Operand::Reg { reg, .. } if *reg == arm::CPSR => self.word.put(12, 4, 15),
                _ => self.reg(op, 12),
            },
            A32Ty::Lr => self.fixed(op, arm::LR),
            A32Ty::Cpsr => self.fixed(op, arm::CPSR),
            A32Ty::Spsr => self.fixed(op, arm::SPSR),
            A32Ty::Fpscr => self.fixed(op, arm::FPSCR),
            A32Ty::VbS => self.vreg(op, OpSize::B4, 12, 22),
            A32Ty::VaS => self.vreg(op, OpSize::B4, 16, 7),
            A32Ty::VcS => self.vreg(op, OpSize::B4, 0, 5),
            A32Ty::VbD => self.vreg(op, OpSize::B8, 12, 22),
            A32Ty::VaD => self.vreg(op, OpSize::B8, 16, 7),
            A32Ty::VcD => self.vreg(op, OpSize::B8, 0, 5),
            A32Ty::Imm8Rot => {
                let value = imm32(op).ok_or_else(|| self.mismatch())?;
                let (imm8, rot) = encode_arm_imm(value)
                    .ok_or_else(|| self.word.illegal("not a rotated 8-bit immediate"))?;
                self.word.put(0, 8, imm8 as u32)?;
                self.word.put(8, 4, rot as u32)
            }
            A32Ty::Imm16 => {
                let v = imm32(op).ok_or_else(|| self.mismatch())?;
                if v > 0xffff {
                    return Err(self.word.out_of_range(v as i64, 16));
                }
                self.word.put(16, 4, v >> 12)?;
                self.word.put(0, 12, v & 0xfff)
            }
            A32Ty::Imm16Split12 => {
                let v = imm32(op).ok_or_else(|| self.mismatch())?;
                if v > 0xffff {
                    return Err(self.word.out_of_range(v as i64, 16));
                }
                self.word.put(8, 12, v >> 4)?;
                self.word.put(0, 4, v & 0xf)
            }
            A32Ty::Imm24 => {
                let v = imm32(op).ok_or_else(|| self.mismatch())?;
                self.word.put(0, 24, v)
            }
            A32Ty::Imm4Mask => {
                let v = imm32(op).ok_or_else(|| self.mismatch())?;
                self.word.put(16, 4, v)
            }
            A32Ty::ShTy | A32Ty::ShTyIdx => {
                let kind = imm_shift_kind(op).ok_or_else(|| self.mismatch())?;
                let ty = match kind {
                    Shift::Rrx => 3,
                    other => reg_shift_type(other).ok_or_else(|| self.word.illegal("not a shift"))?,
                };
                self.shift = kind;
                self.word.put(5, 2, ty)
            }
            A32Ty::Imm5 | A32Ty::Imm5Idx => {
                let Operand::ImmInt { value, .. } = op else {
                    return Err(self.mismatch());
                };
                let (ty, imm5) = shift_fields(self.shift, *value)
                    .ok_or_else(|| self.word.out_of_range(*value, 5))?;
                self.word.put(5, 2, ty)?;
                self.word.put(7, 5, imm5)
            }
            A32Ty::ShTyReg => {
                let kind = imm_shift_kind(op).ok_or_else(|| self.mismatch())?;
                let ty = reg_shift_type(kind).ok_or_else(|| self.word.illegal("register shift"))?;
                self.word.put(5, 2, ty)
            }
            A32Ty::Imm12Signed => self.signed_imm(op, false),
            A32Ty::Imm8Signed => self.signed_imm(op, true),
            A32Ty::RdIndex => match op {
                Operand::Reg { reg, flags, .. } => {
                    let n = core_num(&Operand::reg(*reg)).ok_or_else(|| self.mismatch())?;
                    self.up_bit(!flags.contains(OpndFlags::NEGATED))?;
                    self.word.put(0, 4, n)
                }
                _ => Err(self.mismatch()),
            },
            A32Ty::VfpImm8 => {
                let Operand::ImmFloat { bits, size } = op else {
                    return Err(self.mismatch());
                };
                if *size != slot.size {
                    return Err(self.mismatch());
                }
                let imm8 = vfp_compress(*bits, *size)
                    .ok_or_else(|| self.word.illegal("float not representable as vmov immediate"))?;
                self.word.put(16, 4, imm8 >> 4)?;
                self.word.put(0, 4, imm8 & 0xf)
            }
            A32Ty::FpZero => match op {
                Operand::ImmFloat { bits: 0, .. } => Ok(()),
                Operand::ImmInt { value: 0, .. } => Ok(()),
                _ => Err(self.mismatch()),
            },
            A32Ty::Pc24 => self.branch(op, false),
            A32Ty::Pc24H => self.branch(op, true),
            A32Ty::MemImm12 => self.offset_mem(op, false),
            A32Ty::MemImm8 => self.offset_mem(op, true),
            A32Ty::MemPost => {
                let (m, rn) = self.plain_base(op)?;
                if m.disp != 0 {
                    return Err(self.mismatch());
                }
                self.word.put(16, 4, rn)
            }
            A32Ty::MemReg => self.index_mem(op, true),
            A32Ty::MemRegPlain => self.index_mem(op, false),
            A32Ty::MemVfp => {
                let (rn, disp) = match op {
                    Operand::RelAddr { addr, .. } => {
                        let base = self.pc.wrapping_add(8) & !3;
                        (15, (*addr as u32).wrapping_sub(base) as i32 as i64)
                    }
                    _ => {
                        let (m, rn) = self.plain_base(op)?;
                        (rn, m.disp as i64)
                    }
                };
                if disp & 3 != 0 {
                    return Err(self.word.illegal("offset must be a multiple of 4"));
                }
                if disp.unsigned_abs() > 1020 {
                    return Err(self.word.out_of_range(disp, 10));
                }
                self.word.put(16, 4, rn)?;
                self.up_bit(disp >= 0)?;
                self.word.put(0, 8, (disp.unsigned_abs() >> 2) as u32)
            }
            A32Ty::MemList => {
                let (m, rn) = self.plain_base(op)?;
                let before = (self.word.bits >> 24) & 1 == 1;
                let up = (self.word.bits >> 23) & 1 == 1;
                if m.disp != block_disp(before, up, self.list_len) {
                    return Err(self.mismatch());
                }
                self.word.put(16, 4, rn)
            }
        }
    }
}

fn put_predicate(word: &mut Word, info: &OpInfo<A32Layout>, pred: Predicate) -> Result<(), IrError> {
    if info.flags.contains(Flags::PREDICATE_28) {
        let cond = match pred {
            Predicate::None | Predicate::Always => 0xe,
            Predicate::Arm(c) => c as u32,
            _ => return Err(word.illegal("predicate has no A32 condition")),
        };
        return word.put(28, 4, cond);
    }
    match pred {
        Predicate::None | Predicate::Always | Predicate::Op => Ok(()),
        _ => Err(word.illegal("encoding is not conditional")),
    }
}

fn encode_entry(instr: &Instr<'_>, info: &OpInfo<A32Layout>, pc: u32, list_len: i32) -> Result<u32, IrError> {
    let mut word = Word::new(instr.opcode(), info.bits);
    put_predicate(&mut word, info, instr.predicate())?;
    let mut enc = Encoder {
        word,
        pc,
        list_len,
        shift: Shift::None,
    };
    let mut cur = Cursor::new(instr);
    for (slot, dir) in info.slots().chain(extras(info).flat_map(|e| e.slots())) {
        if slot.ty == A32Ty::RegList {
            let mut mask = 0u32;
            while let Some(op) = cur
                .peek(dir)
                .filter(|op| op.is_reg() && op.flags().contains(OpndFlags::IN_LIST))
            {
                cur.next(dir);
                let n = core_num(&Operand::reg(op.reg_id())).ok_or_else(|| enc.mismatch())?;
                mask |= 1 << n;
            }
            enc.word.put(0, 16, mask)?;
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

/// Encode `instr` for address `pc`.
pub(crate) fn encode(instr: &Instr<'_>, pc: u64) -> Result<InstrBytes, IrError> {
    let opcode = instr.opcode();
    let list_len = instr
        .dsts()
        .iter()
        .chain(instr.srcs())
        .filter(|op| op.is_reg() && op.flags().contains(OpndFlags::IN_LIST))
        .count() as i32;
    let head = find_head::<A32Layout>(opcode).map(|(_, info)| info);
    encode_chain(opcode, head, |info| {
        let word = encode_entry(instr, info, pc as u32, list_len)?;
        let bytes = InstrBytes::from_slice(&word.to_le_bytes());
        let fit = verify(instr, &bytes, pc)?;
        Ok((bytes, fit))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arm_tables::ArmOp;
    use crate::decode::decode_in;
    use crate::instr::Cond;

    const PC: u64 = 0x1000;

    /// Helper: decode one A32 word at [`PC`].
    fn dis(word: u32) -> Instr<'static> {
        let bytes = word.to_le_bytes();
        let mut instr = Instr::new(IsaMode::ArmA32);
        decode_in(IsaMode::ArmA32, &bytes, PC, &mut instr, Level::Full)
            .unwrap_or_else(|e| panic!("{:08x}: {}", word, e));
        instr.into_static()
    }

    /// Helper: encode at [`PC`] and return the word.
    fn asm(instr: &Instr<'_>) -> u32 {
        let b = encode(instr, PC).unwrap_or_else(|e| panic!("{}: {}", instr.opcode(), e));
        u32::from_le_bytes([b[0], b[1], b[2], b[3]])
    }

    fn build(op: ArmOp, dsts: &[Operand], srcs: &[Operand]) -> Instr<'static> {
        Instr::build(IsaMode::ArmA32, Opcode::Arm(op), dsts, srcs)
    }

    fn r(n: u8) -> Operand {
        Operand::reg(arm::gpr(n))
    }

    fn imm(v: i64) -> Operand {
        Operand::imm_int(v, OpSize::B4)
    }

    fn roundtrip(word: u32) {
        let instr = dis(word);
        let mut fresh = Instr::build(IsaMode::ArmA32, instr.opcode(), instr.dsts(), instr.srcs());
        fresh.set_predicate(instr.predicate());
        assert_eq!(asm(&fresh), word, "{:08x} ({})", word, instr.opcode());
    }

    // ── Rotated immediates ────────────────────────────────────────

    #[test]
    fn arm_imm_rotation() {
        assert_eq!(encode_arm_imm(42), Some((42, 0)));
        assert_eq!(encode_arm_imm(0xFF), Some((0xFF, 0)));
        assert_eq!(encode_arm_imm(0x3FC), Some((0xFF, 15)));
        assert_eq!(encode_arm_imm(0xFF00_0000), Some((0xFF, 4)));
        assert_eq!(encode_arm_imm(0x101), None);
    }

    #[test]
    fn shift_field_inverse() {
        for ty in 0..4 {
            for imm5 in 0..32 {
                let (kind, amount) = decode_shift(ty, imm5);
                assert_eq!(shift_fields(kind, amount as i64), Some((ty, imm5)));
            }
        }
        assert_eq!(shift_fields(Shift::Lsr, 0), None);
    }

    // ── Data processing ───────────────────────────────────────────

    #[test]
    fn dp_mov_imm() {
        // MOV R0, 42 → E3A0002A
        assert_eq!(asm(&build(ArmOp::Mov, &[r(0)], &[imm(42)])), 0xE3A0_002A);
    }

    #[test]
    fn dp_add_regs() {
        // ADD R0, R1, R2 → E0810002
        let shift = [Operand::shift_kind(Shift::Lsl), imm(0)];
        let add = build(ArmOp::Add, &[r(0)], &[r(1), r(2), shift[0], shift[1]]);
        assert_eq!(asm(&add), 0xE081_0002);
    }

    #[test]
    fn dp_sub_imm() {
        // SUB R3, R3, 1 → E2433001
        assert_eq!(asm(&build(ArmOp::Sub, &[r(3)], &[r(3), imm(1)])), 0xE243_3001);
    }

    #[test]
    fn dp_cmp() {
        // CMP R0, 0 → E3500000
        let cmp = build(ArmOp::Cmp, &[], &[r(0), imm(0)]);
        assert_eq!(asm(&cmp), 0xE350_0000);
        assert!(cmp.eflags().intersects(Eflags::WRITE_ZF));
    }

    #[test]
    fn dp_orr_imm() {
        // ORR R0, R0, 0xFF → E38000FF
        assert_eq!(asm(&build(ArmOp::Orr, &[r(0)], &[r(0), imm(0xff)])), 0xE380_00FF);
    }

    #[test]
    fn dp_conditional() {
        // MOVEQ R0, 1 → 03A00001
        let mut mov = build(ArmOp::Mov, &[r(0)], &[imm(1)]);
        mov.set_predicate(Predicate::Arm(Cond::Eq));
        assert_eq!(asm(&mov), 0x03A0_0001);
    }

    #[test]
    fn add_imm_decodes_to_two_regs_and_an_immediate() {
        let add = dis(0xE283_3001);
        assert_eq!(add.opcode(), Opcode::Arm(ArmOp::Add));
        assert_eq!(add.dsts(), &[r(3)]);
        assert_eq!(add.num_srcs(), 2);
        assert_eq!(add.src(0), r(3));
        assert_eq!(add.src(1).imm_value(), 1);
        assert_eq!(add.predicate(), Predicate::Always);
        roundtrip(0xE283_3001);
    }

    #[test]
    fn shifted_register_operands() {
        // add r0, r1, r2, lsl #3
        let add = dis(0xE081_0182);
        assert_eq!(add.num_srcs(), 4);
        assert_eq!(Shift::from_imm(add.src(2).imm_value()), Some(Shift::Lsl));
        assert_eq!(add.src(3).imm_value(), 3);
        // mov r0, r1, lsr #32 keeps the 32
        let mov = dis(0xE1A0_0021);
        assert_eq!(mov.src(2).imm_value(), 32);
        // mov r0, r1, rrx
        let rrx = dis(0xE1A0_0061);
        assert_eq!(Shift::from_imm(rrx.src(1).imm_value()), Some(Shift::Rrx));
        for word in [0xE081_0182, 0xE1A0_0021, 0xE1A0_0061, 0xE091_0312] {
            roundtrip(word);
        }
    }

    #[test]
    fn flag_setting_reads_and_writes() {
        let adcs = dis(0xE0B1_0002);
        assert_eq!(adcs.opcode(), Opcode::Arm(ArmOp::Adcs));
        assert!(adcs.eflags().intersects(Eflags::READ_CF));
        assert!(adcs.eflags().intersects(Eflags::WRITE_OF));
        let ne = dis(0x1281_0001);
        assert_eq!(ne.predicate(), Predicate::Arm(Cond::Ne));
        assert!(ne.eflags().intersects(Eflags::READ_ZF));
    }

    // ── Multiplies and misc ───────────────────────────────────────

    #[test]
    fn multiplies() {
        // mul r0, r1, r2
        let mul = dis(0xE000_0291);
        assert_eq!(mul.opcode(), Opcode::Arm(ArmOp::Mul));
        assert_eq!(mul.dsts(), &[r(0)]);
        assert_eq!(mul.srcs(), &[r(1), r(2)]);
        // umlal r0, r1, r2, r3 reads the accumulator pair
        let umlal = dis(0xE0A1_0392);
        assert_eq!(umlal.dsts(), &[r(0), r(1)]);
        assert_eq!(umlal.srcs(), &[r(2), r(3), r(0), r(1)]);
        for word in [0xE000_0291, 0xE021_3291, 0xE0A1_0392, 0xE0C1_0392, 0xE060_3291] {
            roundtrip(word);
        }
    }

    #[test]
    fn misc_encodings() {
        for word in [
            0xE16F_0F11, // clz r0, r1
            0xE710_F211, // sdiv r0, r1, r2
            0xE300_1234, // movw r1, #0x234
            0xE34F_1FFF, // movt r1, #0xffff
            0xE12F_FF1E, // bx lr
            0xE12F_FF33, // blx r3
            0xE10F_0000, // mrs r0, cpsr
            0xE129_F000, // msr cpsr_fc, r0
            0xE320_F000, // nop
            0xE320_F003, // wfi
            0xEF00_0000, // svc #0
            0xE120_0070, // bkpt #0
            0xE7F0_00F0, // udf #0
        ] {
            roundtrip(word);
        }
        assert_eq!(dis(0xE320_F002).opcode(), Opcode::Arm(ArmOp::Wfe));
        assert_eq!(dis(0xE328_F00F).opcode(), Opcode::Arm(ArmOp::Msr));
    }

    #[test]
    fn always_only_encodings_reject_conditions() {
        let bkpt = 0x0120_0070u32.to_le_bytes();
        let mut instr = Instr::new(IsaMode::ArmA32);
        assert!(decode_in(IsaMode::ArmA32, &bkpt, PC, &mut instr, Level::Full).is_err());
        let mut udf = build(ArmOp::Udf, &[], &[Operand::imm_uint(1, OpSize::B2)]);
        udf.set_predicate(Predicate::Arm(Cond::Eq));
        assert!(matches!(encode(&udf, PC), Err(IrError::IllegalOperand { .. })));
    }

    // ── Branches ──────────────────────────────────────────────────

    #[test]
    fn branch_targets_read_pc_plus_8() {
        // b . → EAFFFFFE
        let b = dis(0xEAFF_FFFE);
        assert_eq!(b.src(0), Operand::pc(PC));
        assert_eq!(asm(&build(ArmOp::B, &[], &[Operand::pc(PC)])), 0xEAFF_FFFE);
        let bl = dis(0xEB00_0000);
        assert_eq!(bl.dst(0), Operand::reg(arm::LR));
        assert_eq!(bl.src(0), Operand::pc(PC + 8));
    }

    #[test]
    fn blx_immediate_is_unconditional_space() {
        // blx to pc+8+6 sets H
        let blx = dis(0xFB00_0001);
        assert_eq!(blx.opcode(), Opcode::Arm(ArmOp::Blx));
        assert_eq!(blx.predicate(), Predicate::Op);
        assert_eq!(blx.src(0), Operand::pc(PC + 14));
        roundtrip(0xFB00_0001);
        let built = build(ArmOp::Blx, &[Operand::reg(arm::LR)], &[Operand::pc(PC + 14)]);
        assert_eq!(asm(&built), 0xFB00_0001);
    }

    #[test]
    fn misaligned_branch_is_rejected() {
        let b = build(ArmOp::B, &[], &[Operand::pc(PC + 2)]);
        assert!(matches!(encode(&b, PC), Err(IrError::IllegalOperand { .. })));
        let far = build(ArmOp::B, &[], &[Operand::pc(PC + 0x0400_0000)]);
        assert!(matches!(encode(&far, PC), Err(IrError::OperandOutOfRange { .. })));
    }

    // ── Loads and stores ──────────────────────────────────────────

    #[test]
    fn word_transfers() {
        // ldr r0, [r1, #4]
        let ldr = dis(0xE591_0004);
        assert_eq!(ldr.src(0).disp(), 4);
        // ldr r0, [r1, #-4]!
        let pre = dis(0xE531_0004);
        assert_eq!(pre.dsts(), &[r(0), r(1)]);
        assert_eq!(pre.src(0).disp(), -4);
        assert_eq!(pre.src(1).imm_value(), -4);
        // ldr r0, [pc, #8] is a literal
        let lit = dis(0xE59F_0008);
        assert_eq!(lit.src(0), Operand::rel_addr(PC + 16, OpSize::B4));
        for word in [
            0xE591_0004, // ldr r0, [r1, #4]
            0xE531_0004, // ldr r0, [r1, #-4]!
            0xE491_0004, // ldr r0, [r1], #4
            0xE511_0000, // ldr r0, [r1, #-0]
            0xE59F_0008, // ldr r0, [pc, #8]
            0xE5C1_0001, // strb r0, [r1, #1]
            0xE791_0102, // ldr r0, [r1, r2, lsl #2]
            0xE711_0002, // ldr r0, [r1, -r2]
            0xE7B1_0102, // ldr r0, [r1, r2, lsl #2]!
            0xE691_0102, // ldr r0, [r1], r2, lsl #2
            0xE681_0002, // str r0, [r1], r2
        ] {
            roundtrip(word);
        }
    }

    #[test]
    fn halfword_and_doubleword_transfers() {
        let ldrd = dis(0xE1C2_00D8);
        assert_eq!(ldrd.opcode(), Opcode::Arm(ArmOp::Ldrd));
        assert_eq!(ldrd.dsts(), &[r(0), r(1)]);
        for word in [
            0xE1D1_00B2, // ldrh r0, [r1, #2]
            0xE1C1_00B2, // strh r0, [r1, #2]
            0xE191_00B2, // ldrh r0, [r1, r2]
            0xE1D1_00D1, // ldrsb r0, [r1, #1]
            0xE0D1_00F2, // ldrsh r0, [r1], #2
            0xE1C2_00D8, // ldrd r0, r1, [r2, #8]
            0xE1E2_00D8, // ldrd r0, r1, [r2, #8]!
            0xE1C2_00F8, // strd r0, r1, [r2, #8]
            0xE0C2_00F8, // strd r0, r1, [r2], #8
        ] {
            roundtrip(word);
        }
    }

    #[test]
    fn ldrd_needs_consecutive_registers() {
        let mem = Operand::base_disp(arm::gpr(2), Reg::NULL, 0, 8, OpSize::B8);
        let bad = build(ArmOp::Ldrd, &[r(0), r(2)], &[mem]);
        assert!(matches!(encode(&bad, PC), Err(IrError::IllegalOperand { .. })));
    }

    #[test]
    fn block_transfers() {
        // ldmia r0!, {r1, r2}
        let ldm = dis(0xE8B0_0006);
        assert_eq!(ldm.opcode(), Opcode::Arm(ArmOp::Ldm));
        assert_eq!(ldm.num_dsts(), 3);
        assert!(ldm.dst(0).flags().contains(OpndFlags::IN_LIST));
        assert_eq!(ldm.dst(2), r(0));
        // stmdb sp!, {r4, lr}
        let stmdb = dis(0xE92D_4010);
        assert_eq!(stmdb.dst(0).disp(), -8);
        for word in [0xE8B0_0006, 0xE92D_4010, 0xE890_0006, 0xE810_0006, 0xE9B0_0006] {
            roundtrip(word);
        }
    }

    #[test]
    fn pld_forms() {
        assert_eq!(dis(0xF5D1_F010).opcode(), Opcode::Arm(ArmOp::Pld));
        roundtrip(0xF5D1_F010);
        roundtrip(0xF7D1_F002);
    }

    // ── VFP ───────────────────────────────────────────────────────

    #[test]
    fn vfp_arithmetic_and_moves() {
        // vadd.f32 s0, s1, s2
        let vadd = dis(0xEE30_0A81);
        assert_eq!(vadd.opcode(), Opcode::Arm(ArmOp::VaddF32));
        assert_eq!(vadd.dst(0), Operand::reg(arm::s(0)));
        assert_eq!(vadd.srcs(), &[Operand::reg(arm::s(1)), Operand::reg(arm::s(2))]);
        // vmov.f32 s0, #1.0
        let vmov = dis(0xEEB7_0A00);
        assert_eq!(vmov.src(0), Operand::imm_f32(1.0));
        for word in [
            0xEE30_0A81, // vadd.f32 s0, s1, s2
            0xEE31_0B02, // vadd.f64 d0, d1, d2
            0xEE21_0B02, // vmul.f64 d0, d1, d2
            0xEE80_0A81, // vdiv.f32 s0, s1, s2
            0xEEB1_0AC1, // vsqrt.f32 s0, s2
            0xEEB7_0A00, // vmov.f32 s0, #1.0
            0xEEB0_0A41, // vmov.f32 s0, s2
            0xEEB7_0AC1, // vcvt.f64.f32 d0, s2
            0xEEB4_0A41, // vcmp.f32 s0, s2
            0xEEB5_0B40, // vcmp.f64 d0, #0
            0xEE00_0A10, // vmov s0, r0
            0xEE10_0A10, // vmov r0, s0
            0xEEF1_FA10, // vmrs APSR_nzcv, fpscr
            0xED91_0A01, // vldr s0, [r1, #4]
            0xED81_0B02, // vstr d0, [r1, #8]
        ] {
            roundtrip(word);
        }
    }

    #[test]
    fn vmov_rejects_unrepresentable_float() {
        let vmov = build(ArmOp::VmovF32, &[Operand::reg(arm::s(0))], &[Operand::imm_f32(0.1)]);
        assert!(encode(&vmov, PC).is_err());
    }

    // ── Failures ──────────────────────────────────────────────────

    #[test]
    fn undefined_space_is_invalid() {
        for word in [0xE7F0_0010u32, 0xE750_0010, 0xF000_0000] {
            let bytes = word.to_le_bytes();
            let mut instr = Instr::new(IsaMode::ArmA32);
            let err = decode_in(IsaMode::ArmA32, &bytes, PC, &mut instr, Level::Full).unwrap_err();
            assert!(matches!(err, IrError::InvalidEncoding { .. }), "{:08x}", word);
        }
    }

    #[test]
    fn operand_count_mismatch_finds_no_encoding() {
        let add = build(ArmOp::Add, &[r(0)], &[r(1)]);
        assert_eq!(
            encode(&add, PC),
            Err(IrError::NoMatchingEncoding {
                opcode: Opcode::Arm(ArmOp::Add)
            })
        );
    }

    #[test]
    fn unencodable_immediate_reports_reason() {
        let mov = build(ArmOp::Mov, &[r(0)], &[imm(0x101)]);
        assert!(matches!(encode(&mov, PC), Err(IrError::IllegalOperand { .. })));
    }

    #[test]
    fn defaults_follow_first_entry() {
        assert_eq!(
            defaults(Opcode::Arm(ArmOp::Add)),
            Some((Eflags::NONE, Predicate::Always))
        );
        assert_eq!(defaults(Opcode::Arm(ArmOp::Cbz)), None);
    }
}
