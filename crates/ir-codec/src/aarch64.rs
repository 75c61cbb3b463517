//! AArch64 decoder and encoder.
//!
//! Driven by [`crate::aarch64_tables`]. Register width is read from and
//! written to the `sf` bit (or the FP `ptype` field) by the register operands
//! themselves, so the encoder rejects mixed widths through the shared field
//! check of [`Word`].
//!
//! ## Operand conventions
//!
//! ```text
//!   add x0, x1, x2, lsl #3        dst [x0]       src [x1, x2, <lsl>, #3]
//!   add sp, sp, #0x1000           dst [sp]       src [sp, #0x1000]
//!   ldr x0, [x1, #-8]!            dst [x0, x1]   src [[x1-8], #-8, x1]
//!   stp x29, x30, [sp], #16       dst [[sp], sp] src [x29, x30, #16, sp]
//!   csel x0, x1, x2, ne           dst [x0]       src [x1, x2, #1]
//!   movz x0, #1, lsl #16          dst [x0]       src [#1, #16]
//! ```
//!
//! Branch targets and literal addresses are relative to the instruction's
//! own address. Only `b.cond` carries a predicate.

use crate::aarch64_tables::{A64Ext, A64Layout, A64Op, A64Ty};
use crate::decode::{apply_entry, read_u32, sext, Level};
use crate::encode::{encode_chain, fits_signed, verify, Cursor, InstrBytes, Word};
use crate::error::IrError;
use crate::fpimm::{vfp_compress, vfp_expand};
use crate::instr::{Eflags, Instr, Opcode, OperandList, Predicate};
use crate::isa::{Arch, IsaMode};
use crate::opnd::{IndexShift, Operand, OpndFlags, Shift};
use crate::reg::{a64, Reg, RegClass};
use crate::size::OpSize;
use crate::table::{extras, find_head, resolve, Flags, OpInfo, Slot};

// ── Bitmask immediates ───────────────────────────────────────────────────

/// Element size in bits named by `N:imms`, if valid.
fn element_size(n: u32, imms: u32) -> Option<u32> {
    let combined = (n << 6) | (!imms & 0x3f);
    if combined == 0 {
        return None;
    }
    let len = 31 - combined.leading_zeros();
    (len >= 1).then_some(1 << len)
}

fn ones(n: u32) -> u64 {
    if n >= 64 {
        u64::MAX
    } else {
        (1u64 << n) - 1
    }
}

/// Rotate the low `size` bits of `value` right by `r`.
fn ror_elem(value: u64, r: u32, size: u32) -> u64 {
    if r == 0 {
        return value;
    }
    ((value >> r) | (value << (size - r))) & ones(size)
}

/// Value of a logical immediate `N:immr:imms`.
pub(crate) fn decode_bitmask(n: u32, immr: u32, imms: u32, is64: bool) -> Option<u64> {
    if n == 1 && !is64 {
        return None;
    }
    let size = element_size(n, imms)?;
    let levels = size - 1;
    let s = imms & levels;
    let r = immr & levels;
    if s == levels {
        return None;
    }
    let mut value = ror_elem(ones(s + 1), r, size);
    let mut width = size;
    while width < 64 {
        value |= value << width;
        width *= 2;
    }
    Some(if is64 { value } else { value & 0xffff_ffff })
}

/// `(N, immr, imms)` of a logical immediate, if `value` is a rotated run of
/// ones replicated across the register.
pub(crate) fn encode_bitmask(value: u64, is64: bool) -> Option<(u32, u32, u32)> {
    let value = if is64 {
        value
    } else {
        if value >> 32 != 0 {
            return None;
        }
        value | (value << 32)
    };
    if value == 0 || value == u64::MAX {
        return None;
    }
    let mut size = 64;
    while size > 2 {
        let half = size / 2;
        if value & ones(half) != (value >> half) & ones(half) {
            break;
        }
        size = half;
    }
    let elem = value & ones(size);
    let count = elem.count_ones();
    // Rotating right by `r` leaves the run at bit 0; the field rotates the
    // other way.
    let r = (0..size).find(|&r| ror_elem(elem, r, size) == ones(count))?;
    let immr = (size - r) % size;
    let imms = (!(size * 2 - 1) & 0x3f) | (count - 1);
    Some((u32::from(size == 64), immr, imms))
}

// ── Decoding ─────────────────────────────────────────────────────────────

fn select(kind: A64Ext, w: u32) -> usize {
    let bits = |lo: u32, width: u32| ((w >> lo) & ((1 << width) - 1)) as usize;
    match kind {
        A64Ext::Top => bits(25, 4),
        A64Ext::DpImm => bits(23, 3),
        A64Ext::OpS => bits(29, 2),
        A64Ext::Bit31 => bits(31, 1),
        A64Ext::Branch => (bits(29, 3) << 1) | bits(25, 1),
        A64Ext::Bit24 => bits(24, 1),
        A64Ext::ExcSys => {
            if bits(24, 1) == 0 {
                bits(21, 3)
            } else if bits(22, 2) != 0 {
                16
            } else {
                8 + ((bits(21, 1) << 2) | bits(19, 2))
            }
        }
        A64Ext::Ll => bits(0, 2),
        A64Ext::SysHint => match (bits(12, 4), bits(8, 4)) {
            (2, 0) => bits(5, 3),
            (3, _) => 8 + bits(5, 3),
            _ => 16,
        },
        A64Ext::BrReg => bits(21, 4),
        A64Ext::LdSt => (bits(28, 2) << 1) | bits(24, 1),
        A64Ext::LitOpc => (bits(30, 2) << 1) | bits(26, 1),
        A64Ext::PairMode => match bits(23, 2) {
            0b10 => 0,
            0b11 => 1,
            0b01 => 2,
            _ => 3,
        },
        A64Ext::PairOpc => (bits(30, 2) << 2) | (bits(26, 1) << 1) | bits(22, 1),
        A64Ext::RegMode => match (bits(21, 1), bits(10, 2)) {
            (1, 0b10) => 0,
            (0, 0b11) => 1,
            (0, 0b01) => 2,
            _ => 3,
        },
        A64Ext::RegOpc => (bits(30, 2) << 3) | (bits(26, 1) << 2) | bits(22, 2),
        A64Ext::DpReg => (bits(28, 1) << 4) | bits(21, 4),
        A64Ext::LogN => (bits(29, 2) << 1) | bits(21, 1),
        A64Ext::CondSel => (bits(30, 1) << 1) | bits(10, 1),
        A64Ext::Bit30 => bits(30, 1),
        A64Ext::Dp2 => {
            if bits(14, 2) != 0 {
                16
            } else {
                bits(10, 4)
            }
        }
        A64Ext::Dp1 => {
            if bits(13, 8) != 0 {
                8
            } else {
                bits(10, 3)
            }
        }
        A64Ext::Dp3 => (bits(21, 3) << 1) | bits(15, 1),
        A64Ext::Fp => {
            if bits(24, 7) != 0x1e || bits(21, 1) == 0 {
                8
            } else if bits(10, 6) == 0 {
                1
            } else if bits(31, 1) == 1 {
                8
            } else {
                match bits(10, 2) {
                    0b10 => 0,
                    0b01 => 5,
                    0b11 => 6,
                    _ if bits(10, 5) == 0b10000 => 2,
                    _ if bits(10, 4) == 0b1000 => 3,
                    _ if bits(10, 3) == 0b100 => 4,
                    _ => 7,
                }
            }
        }
        A64Ext::Fp2 => bits(12, 4),
        A64Ext::FpInt => bits(16, 5),
        A64Ext::Fp1 => {
            if bits(19, 2) != 0 {
                16
            } else {
                bits(15, 4)
            }
        }
        A64Ext::FpCmp => bits(3, 2),
    }
}

const SHIFTS: [Shift; 4] = [Shift::Lsl, Shift::Lsr, Shift::Asr, Shift::Ror];

/// FP register size of a `ptype`/`opc` type field.
fn fp_size(ty: u32) -> Option<OpSize> {
    match ty {
        0 => Some(OpSize::B4),
        1 => Some(OpSize::B8),
        3 => Some(OpSize::B2),
        _ => None,
    }
}

fn fp_type(size: OpSize) -> Option<u32> {
    match size {
        OpSize::B4 => Some(0),
        OpSize::B8 => Some(1),
        OpSize::B2 => Some(3),
        _ => None,
    }
}

/// Bytes a memory operand of `size` accesses.
fn access_bytes(size: OpSize) -> u32 {
    size.size_in_bits() / 8
}

/// Field reader for one A64 word.
struct Fields {
    word: u32,
    pc: u64,
}

impl Fields {
    fn get(&self, lo: u32, width: u32) -> u32 {
        (self.word >> lo) & ((1 << width) - 1)
    }

    fn sf(&self) -> bool {
        self.get(31, 1) == 1
    }

    fn invalid(&self) -> IrError {
        IrError::InvalidEncoding {
            mode: IsaMode::Aarch64,
            pc: self.pc,
            word: self.word,
        }
    }

    fn ptype(&self) -> Result<OpSize, IrError> {
        fp_size(self.get(22, 2)).ok_or_else(|| self.invalid())
    }

    fn gpr(&self, lo: u32, is64: bool, sp: bool) -> Operand {
        Operand::reg(a64::gpr(self.get(lo, 5) as u8, is64, sp))
    }

    fn base(&self) -> Reg {
        a64::gpr(self.get(5, 5) as u8, true, true)
    }

    fn fpr(&self, lo: u32) -> Result<Operand, IrError> {
        Ok(Operand::reg(a64::vreg(self.get(lo, 5) as u8, self.ptype()?)))
    }

    fn rel(&self, field: u32, bits: u32) -> u64 {
        self.pc.wrapping_add(sext(field, bits) as u64)
    }

    /// Element size of a pair transfer.
    fn pair_scale(&self) -> i32 {
        let opc = self.get(30, 2);
        if self.get(26, 1) == 1 {
            4 << opc
        } else {
            4 << (opc >> 1)
        }
    }

    fn narrow_imm(&self, value: u32) -> Result<Operand, IrError> {
        if !self.sf() && value >= 32 {
            return Err(self.invalid());
        }
        Ok(Operand::imm_uint(value as u64, OpSize::Bits(6)))
    }

    fn index_mem(&self, size: OpSize) -> Result<Operand, IrError> {
        let option = self.get(13, 3);
        let scaled = self.get(12, 1) == 1;
        let log2 = access_bytes(size).trailing_zeros() as u8;
        let amount = if scaled { log2 } else { 0 };
        let shift = match option {
            0b011 if scaled => IndexShift::new(Shift::Lsl, amount),
            0b011 => IndexShift::NONE,
            0b010 => IndexShift::new(Shift::Uxtw, amount),
            0b110 => IndexShift::new(Shift::Sxtw, amount),
            0b111 => IndexShift::new(Shift::Sxtx, amount),
            _ => return Err(self.invalid()),
        };
        let index = a64::gpr(self.get(16, 5) as u8, option & 1 == 1, false);
        Ok(Operand::base_disp_shift(self.base(), index, false, shift, 0, size))
    }

    fn operand(&self, slot: Slot<A64Ty>, out: &mut OperandList) -> Result<(), IrError> {
        let size = slot.size;
        let wide = size == OpSize::B8;
        let op = match slot.ty {
            A64Ty::None => return Ok(()),
            A64Ty::Rd => self.gpr(0, self.sf(), false),
            A64Ty::Rn => self.gpr(5, self.sf(), false),
            A64Ty::Rm => self.gpr(16, self.sf(), false),
            A64Ty::Ra => self.gpr(10, self.sf(), false),
            A64Ty::RdSp => self.gpr(0, self.sf(), true),
            A64Ty::RnSp => self.gpr(5, self.sf(), true),
            A64Ty::Gd => self.gpr(0, wide, false),
            A64Ty::Gn => self.gpr(5, wide, false),
            A64Ty::Gm => self.gpr(16, wide, false),
            A64Ty::Ga => self.gpr(10, wide, false),
            A64Ty::Rt5 => self.gpr(0, self.sf(), false),
            A64Ty::Lr => Operand::reg(a64::LR),
            A64Ty::Fd => self.fpr(0)?,
            A64Ty::Fn => self.fpr(5)?,
            A64Ty::Fm => self.fpr(16)?,
            A64Ty::FdOpc => {
                let opc = self.get(15, 2);
                let to = fp_size(opc).ok_or_else(|| self.invalid())?;
                if opc == self.get(22, 2) {
                    return Err(self.invalid());
                }
                Operand::reg(a64::vreg(self.get(0, 5) as u8, to))
            }
            A64Ty::Vd => Operand::reg(a64::vreg(self.get(0, 5) as u8, size)),
            A64Ty::Va => Operand::reg(a64::vreg(self.get(10, 5) as u8, size)),
            A64Ty::Imm12Sh => {
                let value = self.get(10, 12) << (12 * self.get(22, 1));
                Operand::imm_uint(value as u64, size)
            }
            A64Ty::LogImm => {
                let value = decode_bitmask(self.get(22, 1), self.get(16, 6), self.get(10, 6), self.sf())
                    .ok_or_else(|| self.invalid())?;
                let width = if self.sf() { OpSize::B8 } else { OpSize::B4 };
                Operand::imm_uint(value, width)
            }
            A64Ty::Imm16 => Operand::imm_uint(self.get(5, 16) as u64, size),
            A64Ty::Hw => {
                let hw = self.get(21, 2);
                if !self.sf() && hw >= 2 {
                    return Err(self.invalid());
                }
                Operand::imm_uint((hw * 16) as u64, size)
            }
            A64Ty::Immr => {
                if self.get(22, 1) != self.get(31, 1) {
                    return Err(self.invalid());
                }
                self.narrow_imm(self.get(16, 6))?
            }
            A64Ty::Imms | A64Ty::Imm6 => self.narrow_imm(self.get(10, 6))?,
            A64Ty::ShTy => {
                let ty = self.get(22, 2);
                if ty == 0 && self.get(10, 6) == 0 {
                    Operand::shift_kind(Shift::None)
                } else {
                    Operand::shift_kind(SHIFTS[ty as usize])
                }
            }
            A64Ty::Cond => Operand::imm_uint(self.get(12, 4) as u64, size),
            A64Ty::TbBit => {
                let bit = (self.get(31, 1) << 5) | self.get(19, 5);
                Operand::imm_uint(bit as u64, size)
            }
            A64Ty::CRm => Operand::imm_uint(self.get(8, 4) as u64, size),
            A64Ty::PrfOp => Operand::imm_uint(self.get(0, 5) as u64, size),
            A64Ty::FpImm8 => {
                let size = self.ptype()?;
                Operand::ImmFloat {
                    bits: vfp_expand(self.get(13, 8), size),
                    size,
                }
            }
            A64Ty::FpZero => Operand::ImmFloat {
                bits: 0,
                size: self.ptype()?,
            },
            A64Ty::SysReg => match self.get(5, 16) {
                0xda10 => Operand::reg(a64::NZCV),
                0xda20 => Operand::reg(a64::FPCR),
                0xda21 => Operand::reg(a64::FPSR),
                other => Operand::imm_uint(other as u64, size),
            },
            A64Ty::Pc26 => Operand::pc(self.rel(self.get(0, 26) << 2, 28)),
            A64Ty::Pc19 => Operand::pc(self.rel(self.get(5, 19) << 2, 21)),
            A64Ty::Pc14 => Operand::pc(self.rel(self.get(5, 14) << 2, 16)),
            A64Ty::AdrPc => Operand::pc(self.rel((self.get(5, 19) << 2) | self.get(29, 2), 21)),
            A64Ty::AdrpPc => {
                let pages = sext((self.get(5, 19) << 2) | self.get(29, 2), 21);
                Operand::pc((self.pc & !0xfff).wrapping_add((pages << 12) as u64))
            }
            A64Ty::MemUoff => {
                let disp = self.get(10, 12) * access_bytes(size);
                Operand::base_disp(self.base(), Reg::NULL, 0, disp as i32, size)
            }
            A64Ty::MemPre => {
                let disp = sext(self.get(12, 9), 9) as i32;
                Operand::base_disp(self.base(), Reg::NULL, 0, disp, size)
            }
            A64Ty::MemPost => Operand::base_disp(self.base(), Reg::NULL, 0, 0, size),
            A64Ty::MemReg => self.index_mem(size)?,
            A64Ty::MemLit => Operand::rel_addr(self.rel(self.get(5, 19) << 2, 21), size),
            A64Ty::MemPair => {
                let disp = sext(self.get(15, 7), 7) as i32 * self.pair_scale();
                Operand::base_disp(self.base(), Reg::NULL, 0, disp, size)
            }
            A64Ty::Imm9Wb => Operand::imm_int(sext(self.get(12, 9), 9), size),
            A64Ty::Imm7Wb => {
                let amount = sext(self.get(15, 7), 7) * self.pair_scale() as i64;
                Operand::imm_int(amount, size)
            }
            A64Ty::BaseWb => Operand::reg(self.base()),
        };
        out.push(op);
        Ok(())
    }
}

/// `fmov` between general and FP registers moves whole registers: `w`↔`s`,
/// `x`↔`d`, or either with `h`.
fn fmov_widths_agree(word: u32) -> bool {
    let is_transfer = (word >> 24) & 0x7f == 0x1e && word & 0xfc00 == 0;
    let sf = word >> 31;
    !is_transfer || matches!((sf, (word >> 22) & 3), (0, 0) | (1, 1) | (_, 3))
}

/// Decode the A64 word at the start of `bytes`. Returns the length.
pub(crate) fn decode(bytes: &[u8], pc: u64, instr: &mut Instr<'_>, level: Level) -> Result<usize, IrError> {
    let word = read_u32(bytes)?;
    if level == Level::Raw {
        return Ok(4);
    }
    let fields = Fields { word, pc };
    let root = (A64Ext::Top, 0);
    let Some((_, info)) = resolve::<A64Layout>(IsaMode::Aarch64, root, |kind| Ok(select(kind, word)))? else {
        return Err(fields.invalid());
    };
    if !info.has_fixed_ones(word) {
        return Err(fields.invalid());
    }
    if info.opcode == Opcode::A64(A64Op::Fmov) && !fmov_widths_agree(word) {
        return Err(fields.invalid());
    }
    let predicate = if info.flags.contains(Flags::PREDICATE_0) {
        Predicate::from_arm(word & 0xf)
    } else {
        Predicate::None
    };
    apply_entry(instr, info, predicate, level, |slot, out| fields.operand(slot, out))?;
    Ok(4)
}

/// Status-flag usage and default predicate of an opcode's first A64 entry.
pub(crate) fn defaults(opcode: Opcode) -> Option<(Eflags, Predicate)> {
    let (_, info) = find_head::<A64Layout>(opcode)?;
    let predicate = if info.flags.has_predicate() {
        Predicate::Always
    } else {
        Predicate::None
    };
    Some((info.eflags, predicate))
}

// ── Encoding ─────────────────────────────────────────────────────────────

/// Number and width of a general register operand. `sp` selects whether
/// register 31 is the stack pointer or the zero register.
fn gpr_num(op: &Operand, sp: bool) -> Option<(u32, bool)> {
    let Operand::Reg { reg, .. } = op else {
        return None;
    };
    if reg.arch() != Some(Arch::Aarch64) {
        return None;
    }
    let ok = match reg.class() {
        RegClass::Gpr => true,
        RegClass::Sp => sp,
        RegClass::Zero => !sp,
        _ => false,
    };
    ok.then(|| (reg.number() as u32, reg.size() == OpSize::B8))
}

/// Number and width of a SIMD&FP register operand.
fn fpr_num(op: &Operand) -> Option<(u32, OpSize)> {
    match op {
        Operand::Reg { reg, .. } if reg.arch() == Some(Arch::Aarch64) && reg.class() == RegClass::Simd => {
            Some((reg.number() as u32, reg.size()))
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

    fn sf(&self) -> bool {
        self.word.bits >> 31 == 1
    }

    /// Register written with its width into `sf`.
    fn sized_gpr(&mut self, op: &Operand, lo: u32, sp: bool) -> Result<(), IrError> {
        let (n, is64) = gpr_num(op, sp).ok_or_else(|| self.mismatch())?;
        self.word.put(lo, 5, n)?;
        self.word.put(31, 1, u32::from(is64))
    }

    /// Register whose width the entry fixes.
    fn fixed_gpr(&mut self, op: &Operand, lo: u32, size: OpSize) -> Result<(), IrError> {
        let (n, is64) = gpr_num(op, false).ok_or_else(|| self.mismatch())?;
        if is64 != (size == OpSize::B8) {
            return Err(self.mismatch());
        }
        self.word.put(lo, 5, n)
    }

    fn base(&mut self, base: Reg) -> Result<(), IrError> {
        let (n, is64) = gpr_num(&Operand::reg(base), true).ok_or_else(|| self.mismatch())?;
        if !is64 {
            return Err(self.mismatch());
        }
        self.word.put(5, 5, n)
    }

    /// FP register with its precision written to `type_lo`.
    fn fpr(&mut self, op: &Operand, lo: u32, type_lo: u32) -> Result<(), IrError> {
        let (n, size) = fpr_num(op).ok_or_else(|| self.mismatch())?;
        let ty = fp_type(size).ok_or_else(|| self.mismatch())?;
        self.word.put(lo, 5, n)?;
        self.word.put(type_lo, 2, ty)
    }

    fn vreg(&mut self, op: &Operand, lo: u32, size: OpSize) -> Result<(), IrError> {
        match fpr_num(op) {
            Some((n, s)) if s == size => self.word.put(lo, 5, n),
            _ => Err(self.mismatch()),
        }
    }

    fn unsigned(&mut self, op: &Operand, lo: u32, width: u32) -> Result<(), IrError> {
        let v = imm(op).ok_or_else(|| self.mismatch())?;
        if v < 0 || v >= 1 << width {
            return Err(self.word.out_of_range(v, width));
        }
        self.word.put(lo, width, v as u32)
    }

    /// Shift amounts and bitfield positions, below 32 for 32-bit forms.
    fn position(&mut self, op: &Operand, lo: u32) -> Result<(), IrError> {
        let v = imm(op).ok_or_else(|| self.mismatch())?;
        let limit = if self.sf() { 64 } else { 32 };
        if !(0..limit).contains(&v) {
            return Err(self.word.out_of_range(v, if self.sf() { 6 } else { 5 }));
        }
        self.word.put(lo, 6, v as u32)
    }

    /// Word offset from the instruction to `target`.
    fn words_to(&self, target: u64) -> Result<i64, IrError> {
        let off = target.wrapping_sub(self.pc) as i64;
        if off & 3 != 0 {
            return Err(self.word.illegal("target not word aligned"));
        }
        Ok(off >> 2)
    }

    fn branch(&mut self, op: &Operand, lo: u32, width: u32) -> Result<(), IrError> {
        let Operand::Pc { target, selector: None } = op else {
            return Err(self.mismatch());
        };
        let words = self.words_to(*target)?;
        self.word.put_signed(lo, width, words)
    }

    fn adr(&mut self, op: &Operand, page: bool) -> Result<(), IrError> {
        let Operand::Pc { target, selector: None } = op else {
            return Err(self.mismatch());
        };
        let off = if page {
            if target & 0xfff != 0 {
                return Err(self.word.illegal("adrp target is not page aligned"));
            }
            (target.wrapping_sub(self.pc & !0xfff) as i64) >> 12
        } else {
            target.wrapping_sub(self.pc) as i64
        };
        if !fits_signed(off, 21) {
            return Err(self.word.out_of_range(off, 21));
        }
        let imm = (off as u32) & 0x1f_ffff;
        self.word.put(29, 2, imm & 3)?;
        self.word.put(5, 19, imm >> 2)
    }

    fn add_imm(&mut self, op: &Operand) -> Result<(), IrError> {
        let v = imm(op).ok_or_else(|| self.mismatch())?;
        let (imm12, sh) = match v {
            0..=0xfff => (v, 0),
            _ if v & 0xfff == 0 && v >> 12 <= 0xfff => (v >> 12, 1),
            _ => return Err(self.word.out_of_range(v, 24)),
        };
        self.word.put(10, 12, imm12 as u32)?;
        self.word.put(22, 1, sh)
    }

    fn logical_imm(&mut self, op: &Operand) -> Result<(), IrError> {
        let v = imm(op).ok_or_else(|| self.mismatch())?;
        let value = if self.sf() {
            v as u64
        } else if (-(1i64 << 31)..(1i64 << 32)).contains(&v) {
            v as u64 & 0xffff_ffff
        } else {
            return Err(self.word.out_of_range(v, 32));
        };
        let (n, immr, imms) =
            encode_bitmask(value, self.sf()).ok_or_else(|| self.word.illegal("not a bitmask immediate"))?;
        self.word.put(22, 1, n)?;
        self.word.put(16, 6, immr)?;
        self.word.put(10, 6, imms)
    }

    fn shift_type(&mut self, op: &Operand) -> Result<(), IrError> {
        let v = imm(op).ok_or_else(|| self.mismatch())?;
        let ty = match Shift::from_imm(v).ok_or_else(|| self.mismatch())? {
            Shift::None | Shift::Lsl => 0,
            Shift::Lsr => 1,
            Shift::Asr => 2,
            Shift::Ror => 3,
            _ => return Err(self.word.illegal("not a register shift")),
        };
        self.word.put(22, 2, ty)
    }

    fn fp_imm(&mut self, op: &Operand) -> Result<(), IrError> {
        let Operand::ImmFloat { bits, size } = op else {
            return Err(self.mismatch());
        };
        let ty = fp_type(*size).ok_or_else(|| self.mismatch())?;
        let imm8 = vfp_compress(*bits, *size)
            .ok_or_else(|| self.word.illegal("float not representable as fmov immediate"))?;
        self.word.put(22, 2, ty)?;
        self.word.put(13, 8, imm8)
    }

    fn sys_reg(&mut self, op: &Operand) -> Result<(), IrError> {
        let value = match op {
            Operand::Reg { reg, .. } if *reg == a64::NZCV => 0xda10,
            Operand::Reg { reg, .. } if *reg == a64::FPCR => 0xda20,
            Operand::Reg { reg, .. } if *reg == a64::FPSR => 0xda21,
            _ => return self.unsigned(op, 5, 16),
        };
        self.word.put(5, 16, value)
    }

    fn plain_mem(&mut self, op: &Operand) -> Result<i64, IrError> {
        match op {
            Operand::BaseDisp(m) if m.index.is_null() => {
                self.base(m.base)?;
                Ok(m.disp as i64)
            }
            _ => Err(self.mismatch()),
        }
    }

    fn unsigned_offset(&mut self, op: &Operand, size: OpSize) -> Result<(), IrError> {
        let disp = self.plain_mem(op)?;
        let scale = access_bytes(size) as i64;
        if disp % scale != 0 {
            return Err(self.word.illegal("offset not a multiple of the access size"));
        }
        if !(0..4096).contains(&(disp / scale)) {
            return Err(self.word.out_of_range(disp, 12));
        }
        self.word.put(10, 12, (disp / scale) as u32)
    }

    fn index_mem(&mut self, op: &Operand, size: OpSize) -> Result<(), IrError> {
        let Operand::BaseDisp(m) = op else {
            return Err(self.mismatch());
        };
        if m.index.is_null() || m.disp != 0 || m.flags.contains(OpndFlags::NEGATED) {
            return Err(self.mismatch());
        }
        self.base(m.base)?;
        let (n, is64) = gpr_num(&Operand::reg(m.index), false).ok_or_else(|| self.mismatch())?;
        let log2 = access_bytes(size).trailing_zeros() as u8;
        let (option, wants64) = match m.shift.kind {
            Shift::None | Shift::Lsl => (0b011, true),
            Shift::Uxtw => (0b010, false),
            Shift::Sxtw => (0b110, false),
            Shift::Sxtx => (0b111, true),
            _ => return Err(self.word.illegal("index extend not encodable")),
        };
        if is64 != wants64 {
            return Err(self.word.illegal("index register width does not match the extend"));
        }
        let scaled = match (m.shift.kind, m.shift.amount) {
            (Shift::None, 0) => false,
            // Byte accesses spell an explicit `lsl #0` with S set.
            (Shift::Lsl, 0) if log2 == 0 => true,
            (_, 0) => false,
            (Shift::None, _) => return Err(self.word.illegal("index shift without a kind")),
            (_, a) if a == log2 => true,
            _ => return Err(self.word.illegal("index shift must match the access size")),
        };
        self.word.put(16, 5, n)?;
        self.word.put(13, 3, option)?;
        self.word.put(12, 1, u32::from(scaled))
    }

    fn literal(&mut self, op: &Operand) -> Result<(), IrError> {
        let Operand::RelAddr { addr, .. } = op else {
            return Err(self.mismatch());
        };
        let words = self.words_to(*addr)?;
        self.word.put_signed(5, 19, words)
    }

    /// Element size of a pair transfer, from the entry's fixed bits.
    fn pair_scale(&self) -> i64 {
        let opc = self.word.bits >> 30;
        if (self.word.bits >> 26) & 1 == 1 {
            4 << opc
        } else {
            4 << (opc >> 1)
        }
    }

    fn scaled7(&mut self, value: i64) -> Result<(), IrError> {
        let scale = self.pair_scale();
        if value % scale != 0 {
            return Err(self.word.illegal("offset not a multiple of the register size"));
        }
        self.word.put_signed(15, 7, value / scale)
    }

    fn operand(&mut self, slot: Slot<A64Ty>, op: &Operand) -> Result<(), IrError> {
        match slot.ty {
            A64Ty::None => Err(self.mismatch()),
            A64Ty::Rd | A64Ty::Rt5 => self.sized_gpr(op, 0, false),
            A64Ty::Rn => self.sized_gpr(op, 5, false),
            A64Ty::Rm => self.sized_gpr(op, 16, false),
            A64Ty::Ra => self.sized_gpr(op, 10, false),
            A64Ty::RdSp => self.sized_gpr(op, 0, true),
            A64Ty::RnSp => self.sized_gpr(op, 5, true),
            A64Ty::Gd => self.fixed_gpr(op, 0, slot.size),
            A64Ty::Gn => self.fixed_gpr(op, 5, slot.size),
            A64Ty::Gm => self.fixed_gpr(op, 16, slot.size),
            A64Ty::Ga => self.fixed_gpr(op, 10, slot.size),
            A64Ty::Lr => match op {
                Operand::Reg { reg, .. } if *reg == a64::LR => Ok(()),
                _ => Err(self.mismatch()),
            },
            A64Ty::Fd => self.fpr(op, 0, 22),
            A64Ty::Fn => self.fpr(op, 5, 22),
            A64Ty::Fm => self.fpr(op, 16, 22),
            A64Ty::FdOpc => self.fpr(op, 0, 15),
            A64Ty::Vd => self.vreg(op, 0, slot.size),
            A64Ty::Va => self.vreg(op, 10, slot.size),
            A64Ty::Imm12Sh => self.add_imm(op),
            A64Ty::LogImm => self.logical_imm(op),
            A64Ty::Imm16 => self.unsigned(op, 5, 16),
            A64Ty::Hw => {
                let v = imm(op).ok_or_else(|| self.mismatch())?;
                let limit = if self.sf() { 64 } else { 32 };
                if v % 16 != 0 || !(0..limit).contains(&v) {
                    return Err(self.word.illegal("halfword shift must be 0, 16, 32 or 48"));
                }
                self.word.put(21, 2, (v / 16) as u32)
            }
            A64Ty::Immr => {
                let n = u32::from(self.sf());
                self.word.put(22, 1, n)?;
                self.position(op, 16)
            }
            A64Ty::Imms | A64Ty::Imm6 => self.position(op, 10),
            A64Ty::ShTy => self.shift_type(op),
            A64Ty::Cond => self.unsigned(op, 12, 4),
            A64Ty::TbBit => {
                let v = imm(op).ok_or_else(|| self.mismatch())?;
                if !(0..64).contains(&v) {
                    return Err(self.word.out_of_range(v, 6));
                }
                self.word.put(31, 1, (v >> 5) as u32)?;
                self.word.put(19, 5, (v & 31) as u32)
            }
            A64Ty::CRm => self.unsigned(op, 8, 4),
            A64Ty::PrfOp => self.unsigned(op, 0, 5),
            A64Ty::FpImm8 => self.fp_imm(op),
            A64Ty::FpZero => match op {
                Operand::ImmFloat { bits: 0, .. } => Ok(()),
                _ => Err(self.mismatch()),
            },
            A64Ty::SysReg => self.sys_reg(op),
            A64Ty::Pc26 => self.branch(op, 0, 26),
            A64Ty::Pc19 => self.branch(op, 5, 19),
            A64Ty::Pc14 => self.branch(op, 5, 14),
            A64Ty::AdrPc => self.adr(op, false),
            A64Ty::AdrpPc => self.adr(op, true),
            A64Ty::MemUoff => self.unsigned_offset(op, slot.size),
            A64Ty::MemPre => {
                let disp = self.plain_mem(op)?;
                self.word.put_signed(12, 9, disp)
            }
            A64Ty::MemPost => match self.plain_mem(op)? {
                0 => Ok(()),
                _ => Err(self.mismatch()),
            },
            A64Ty::MemReg => self.index_mem(op, slot.size),
            A64Ty::MemLit => self.literal(op),
            A64Ty::MemPair => {
                let disp = self.plain_mem(op)?;
                self.scaled7(disp)
            }
            A64Ty::Imm9Wb => {
                let v = imm(op).ok_or_else(|| self.mismatch())?;
                self.word.put_signed(12, 9, v)
            }
            A64Ty::Imm7Wb => {
                let v = imm(op).ok_or_else(|| self.mismatch())?;
                self.scaled7(v)
            }
            A64Ty::BaseWb => match op {
                Operand::Reg { reg, .. } => self.base(*reg),
                _ => Err(self.mismatch()),
            },
        }
    }
}

fn put_predicate(word: &mut Word, info: &OpInfo<A64Layout>, pred: Predicate) -> Result<(), IrError> {
    if info.flags.contains(Flags::PREDICATE_0) {
        let cond = match pred {
            Predicate::None => 14,
            other => other
                .arm_bits()
                .ok_or_else(|| word.illegal("predicate has no A64 condition"))?,
        };
        return word.put(0, 4, cond);
    }
    match pred {
        Predicate::None | Predicate::Always | Predicate::Op => Ok(()),
        _ => Err(word.illegal("encoding is not conditional")),
    }
}

fn encode_entry(instr: &Instr<'_>, info: &OpInfo<A64Layout>, pc: u64) -> Result<u32, IrError> {
    let mut word = Word::new(instr.opcode(), info.bits);
    put_predicate(&mut word, info, instr.predicate())?;
    let mut enc = Encoder { word, pc };
    let mut cur = Cursor::new(instr);
    for (slot, dir) in info.slots().chain(extras(info).flat_map(|e| e.slots())) {
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
    let head = find_head::<A64Layout>(opcode).map(|(_, info)| info);
    encode_chain(opcode, head, |info| {
        let word = encode_entry(instr, info, pc)?;
        let bytes = InstrBytes::from_slice(&word.to_le_bytes());
        let fit = verify(instr, &bytes, pc)?;
        Ok((bytes, fit))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::decode_in;
    use crate::instr::Cond;

    const PC: u64 = 0x1000;

    fn dis(word: u32) -> Instr<'static> {
        let bytes = word.to_le_bytes();
        let mut instr = Instr::new(IsaMode::Aarch64);
        decode_in(IsaMode::Aarch64, &bytes, PC, &mut instr, Level::Full)
            .unwrap_or_else(|e| panic!("{:08x}: {}", word, e));
        instr.into_static()
    }

    fn asm(instr: &Instr<'_>) -> u32 {
        let b = encode(instr, PC).unwrap_or_else(|e| panic!("{}: {}", instr.opcode(), e));
        u32::from_le_bytes([b[0], b[1], b[2], b[3]])
    }

    fn build(op: A64Op, dsts: &[Operand], srcs: &[Operand]) -> Instr<'static> {
        Instr::build(IsaMode::Aarch64, Opcode::A64(op), dsts, srcs)
    }

    fn x(n: u8) -> Operand {
        Operand::reg(a64::gpr(n, true, false))
    }

    fn w(n: u8) -> Operand {
        Operand::reg(a64::gpr(n, false, false))
    }

    fn d(n: u8) -> Operand {
        Operand::reg(a64::vreg(n, OpSize::B8))
    }

    fn imm(v: i64) -> Operand {
        Operand::imm_int(v, OpSize::B8)
    }

    fn invalid(word: u32) -> bool {
        let bytes = word.to_le_bytes();
        let mut instr = Instr::new(IsaMode::Aarch64);
        matches!(
            decode_in(IsaMode::Aarch64, &bytes, PC, &mut instr, Level::Full),
            Err(IrError::InvalidEncoding { .. })
        )
    }

    fn roundtrip(word: u32) {
        let instr = dis(word);
        let mut fresh = Instr::build(IsaMode::Aarch64, instr.opcode(), instr.dsts(), instr.srcs());
        fresh.set_predicate(instr.predicate());
        assert_eq!(asm(&fresh), word, "{:08x} ({})", word, instr.opcode());
    }

    // ── Bitmask immediates ────────────────────────────────────────

    #[test]
    fn bitmask_rotation_follows_the_field() {
        assert_eq!(encode_bitmask(0xff00, true), Some((1, 56, 7)));
        assert_eq!(decode_bitmask(1, 56, 7, true), Some(0xff00));
        assert_eq!(encode_bitmask(0x5555_5555_5555_5555, true), Some((0, 0, 0x3c)));
        assert_eq!(encode_bitmask(0xff, false), Some((0, 0, 7)));
        assert_eq!(encode_bitmask(0, true), None);
        assert_eq!(encode_bitmask(u64::MAX, true), None);
        assert_eq!(encode_bitmask(0x1234, true), None);
        assert_eq!(decode_bitmask(1, 0, 0, false), None);
    }

    #[test]
    fn every_canonical_bitmask_encodes_back() {
        for n in 0..2 {
            for imms in 0..64 {
                let Some(size) = element_size(n, imms) else {
                    continue;
                };
                for immr in 0..size {
                    if let Some(value) = decode_bitmask(n, immr, imms, true) {
                        assert_eq!(encode_bitmask(value, true), Some((n, immr, imms)), "{:#x}", value);
                    }
                }
            }
        }
    }

    // ── Data processing ───────────────────────────────────────────

    #[test]
    fn multiply_and_divide() {
        let mul = dis(0x9B02_7C20);
        assert_eq!(mul.opcode(), Opcode::A64(A64Op::Madd));
        assert_eq!(mul.dsts(), &[x(0)]);
        assert_eq!(mul.srcs(), &[x(1), x(2), Operand::reg(a64::XZR)]);
        assert_eq!(dis(0x1B02_7C20).dst(0), w(0));
        assert_eq!(dis(0x9AC2_0C20).opcode(), Opcode::A64(A64Op::Sdiv));
        assert_eq!(dis(0x9AC2_0820).opcode(), Opcode::A64(A64Op::Udiv));
        let smull = dis(0x9B22_7C20);
        assert_eq!(smull.srcs(), &[w(1), w(2), Operand::reg(a64::XZR)]);
        for word in [0x9B02_7C20, 0x1B02_7C20, 0x9AC2_0C20, 0x9AC2_0820, 0x9B02_0C20, 0x9B22_7C20, 0x9B42_7C20] {
            roundtrip(word);
        }
    }

    #[test]
    fn add_immediate_forms() {
        // add x0, x1, #1
        let add = dis(0x9100_0420);
        assert_eq!(add.srcs(), &[x(1), Operand::imm_uint(1, OpSize::Bits(24))]);
        assert_eq!(asm(&build(A64Op::Add, &[x(0)], &[x(1), imm(1)])), 0x9100_0420);
        // sub sp, sp, #0x1000 uses the shifted immediate
        let sp = Operand::reg(a64::SP);
        assert_eq!(asm(&build(A64Op::Sub, &[sp], &[sp, imm(0x1000)])), 0xD140_07FF);
        // cmp x0, #0 writes the zero register and the flags
        let cmp = dis(0xF100_001F);
        assert_eq!(cmp.opcode(), Opcode::A64(A64Op::Subs));
        assert_eq!(cmp.dst(0), Operand::reg(a64::XZR));
        assert!(cmp.eflags().intersects(Eflags::WRITE_NZCV));
        let far = build(A64Op::Add, &[x(0)], &[x(1), imm(0x1001)]);
        assert!(matches!(encode(&far, PC), Err(IrError::OperandOutOfRange { .. })));
        for word in [0x9100_0420, 0x9100_43FF, 0xD140_07FF, 0xF100_001F, 0x1100_0420] {
            roundtrip(word);
        }
    }

    #[test]
    fn shifted_register_operands() {
        // add x0, x1, x2, lsl #3
        let add = dis(0x8B02_0C20);
        assert_eq!(add.num_srcs(), 4);
        assert_eq!(Shift::from_imm(add.src(2).imm_value()), Some(Shift::Lsl));
        assert_eq!(add.src(3).imm_value(), 3);
        // mvn x0, x1 is orn from the zero register with no shift
        let mvn = dis(0xAA21_03E0);
        assert_eq!(mvn.opcode(), Opcode::A64(A64Op::Orn));
        assert_eq!(mvn.src(0), Operand::reg(a64::XZR));
        assert_eq!(Shift::from_imm(mvn.src(2).imm_value()), Some(Shift::None));
        let plain = [x(1), x(2), Operand::shift_kind(Shift::None), imm(0)];
        assert_eq!(asm(&build(A64Op::Add, &[x(0)], &plain)), 0x8B02_0020);
        for word in [0x8B02_0C20, 0xAA21_03E0, 0xCB42_1020, 0x6B02_001F, 0x8A02_FC20] {
            roundtrip(word);
        }
    }

    #[test]
    fn mixed_widths_are_rejected() {
        let mixed = build(A64Op::Udiv, &[x(0)], &[w(1), x(2)]);
        assert!(matches!(encode(&mixed, PC), Err(IrError::IllegalOperand { .. })));
        let narrow = build(A64Op::Add, &[w(0)], &[w(1), w(2), Operand::shift_kind(Shift::Lsl), imm(40)]);
        assert!(matches!(encode(&narrow, PC), Err(IrError::OperandOutOfRange { .. })));
    }

    #[test]
    fn logical_immediates() {
        // and x0, x1, #0xff
        let and = dis(0x9240_1C20);
        assert_eq!(and.src(1).imm_value(), 0xff);
        assert_eq!(asm(&build(A64Op::And, &[x(0)], &[x(1), imm(0xff)])), 0x9240_1C20);
        // mov x0, #0x5555555555555555
        let orr = dis(0xB200_F3E0);
        assert_eq!(orr.src(1).imm_value(), 0x5555_5555_5555_5555);
        let bad = build(A64Op::Orr, &[x(0)], &[x(1), imm(0x1234)]);
        assert!(matches!(encode(&bad, PC), Err(IrError::IllegalOperand { .. })));
        for word in [0x9240_1C20, 0xB200_F3E0, 0x1200_1C20, 0x7200_001F] {
            roundtrip(word);
        }
        // N set in a 32-bit form is unallocated
        assert!(invalid(0x1240_1C20));
    }

    #[test]
    fn move_wide_and_bitfields() {
        // movz x0, #0x1234, lsl #16
        let movz = dis(0xD2A2_4680);
        assert_eq!(movz.srcs(), &[Operand::imm_uint(0x1234, OpSize::B2), Operand::imm_uint(16, OpSize::Bits(6))]);
        let movk = dis(0x7280_0020);
        assert_eq!(movk.srcs()[0], w(0));
        // 32-bit move wide cannot shift by 32
        assert!(invalid(0x52C0_0000));
        // uxtb, sxtb, sxtw, lsl
        for word in [0xD2A2_4680, 0x7280_0020, 0x9280_0000, 0x5300_1C20, 0x9340_1C20, 0x9340_7C20, 0xD37C_EC20, 0x3300_1C20] {
            roundtrip(word);
        }
        let bfi = dis(0x3300_1C20);
        assert_eq!(bfi.srcs()[0], w(0));
        assert_eq!(bfi.num_srcs(), 4);
    }

    #[test]
    fn conditional_selects_read_flags() {
        // cset x0, ne is csinc x0, xzr, xzr, eq
        let cset = dis(0x9A9F_17E0);
        assert_eq!(cset.opcode(), Opcode::A64(A64Op::Csinc));
        assert_eq!(cset.src(2).imm_value(), Cond::Ne as i64);
        assert_eq!(cset.predicate(), Predicate::None);
        assert!(cset.eflags().intersects(Eflags::READ_NZCV));
        for word in [0x9A9F_17E0, 0xDA9F_03E0, 0x9A81_1420, 0x9A82_0020] {
            roundtrip(word);
        }
    }

    #[test]
    fn one_source_operations() {
        for word in [0xDAC0_0020, 0xDAC0_0420, 0xDAC0_1020, 0x5AC0_1420] {
            roundtrip(word);
        }
    }

    // ── Branches and system ───────────────────────────────────────

    #[test]
    fn branch_targets_are_instruction_relative() {
        let b = dis(0x1400_0000);
        assert_eq!(b.src(0), Operand::pc(PC));
        let bl = dis(0x9400_0001);
        assert_eq!(bl.dst(0), Operand::reg(a64::LR));
        assert_eq!(bl.src(0), Operand::pc(PC + 4));
        assert_eq!(asm(&build(A64Op::B, &[], &[Operand::pc(PC - 8)])), 0x17FF_FFFE);
        let misaligned = build(A64Op::B, &[], &[Operand::pc(PC + 2)]);
        assert!(matches!(encode(&misaligned, PC), Err(IrError::IllegalOperand { .. })));
    }

    #[test]
    fn conditional_branch_carries_predicate() {
        let beq = dis(0x5400_0040);
        assert_eq!(beq.opcode(), Opcode::A64(A64Op::Bcond));
        assert_eq!(beq.predicate(), Predicate::Arm(Cond::Eq));
        assert_eq!(beq.src(0), Operand::pc(PC + 8));
        assert!(beq.eflags().intersects(Eflags::READ_ZF));
        let mut bne = build(A64Op::Bcond, &[], &[Operand::pc(PC + 8)]);
        bne.set_predicate(Predicate::Arm(Cond::Ne));
        assert_eq!(asm(&bne), 0x5400_0041);
        roundtrip(0x5400_0040);
    }

    #[test]
    fn compare_and_test_branches() {
        let tbz = dis(0x3618_0040);
        assert_eq!(tbz.srcs(), &[w(0), Operand::imm_uint(3, OpSize::Bits(6)), Operand::pc(PC + 8)]);
        let tbnz = dis(0xB7F8_0000);
        assert_eq!(tbnz.src(0), x(0));
        assert_eq!(tbnz.src(1).imm_value(), 63);
        for word in [0xB400_0000, 0x3500_0041, 0x3618_0040, 0xB7F8_0000] {
            roundtrip(word);
        }
    }

    #[test]
    fn register_branches_and_system() {
        let ret = dis(0xD65F_03C0);
        assert_eq!(ret.opcode(), Opcode::A64(A64Op::Ret));
        assert_eq!(ret.src(0), x(30));
        let mrs = dis(0xD53B_4200);
        assert_eq!(mrs.srcs(), &[Operand::reg(a64::NZCV)]);
        assert_eq!(dis(0xD503_201F).opcode(), Opcode::A64(A64Op::Nop));
        assert_eq!(dis(0xD503_3BBF).opcode(), Opcode::A64(A64Op::Dmb));
        for word in [
            0xD65F_03C0, // ret
            0xD63F_0020, // blr x1
            0xD61F_0200, // br x16
            0xD503_201F, // nop
            0xD503_205F, // wfe
            0xD503_3BBF, // dmb ish
            0xD503_3FDF, // isb
            0xD400_0001, // svc #0
            0xD420_0000, // brk #0
            0xD53B_4200, // mrs x0, nzcv
            0xD51B_4200, // msr nzcv, x0
            0xD53B_4400, // mrs x0, fpcr
        ] {
            roundtrip(word);
        }
    }

    #[test]
    fn address_generation() {
        let adr = dis(0x1000_0040);
        assert_eq!(adr.src(0), Operand::pc(PC + 8));
        let adrp = dis(0xB000_0000);
        assert_eq!(adrp.src(0), Operand::pc(0x2000));
        assert_eq!(asm(&build(A64Op::Adrp, &[x(0)], &[Operand::pc(0x2000)])), 0xB000_0000);
        let unaligned = build(A64Op::Adrp, &[x(0)], &[Operand::pc(0x2010)]);
        assert!(matches!(encode(&unaligned, PC), Err(IrError::IllegalOperand { .. })));
        roundtrip(0x1000_0040);
    }

    // ── Loads and stores ──────────────────────────────────────────

    #[test]
    fn single_register_transfers() {
        // ldr x0, [x1, #8]
        let ldr = dis(0xF940_0420);
        assert_eq!(ldr.dsts(), &[x(0)]);
        assert_eq!(ldr.src(0).disp(), 8);
        // str x0, [sp, #-16]!
        let pre = dis(0xF81F_0FE0);
        assert_eq!(pre.dsts().len(), 2);
        assert_eq!(pre.dst(1), Operand::reg(a64::SP));
        assert_eq!(pre.srcs()[1].imm_value(), -16);
        // ldr w0, [x1, x2, lsl #2]
        let idx = dis(0xB862_7820);
        assert_eq!(idx.src(0).index_shift(), IndexShift::new(Shift::Lsl, 2));
        // ldr x0, literal
        let lit = dis(0x5800_0040);
        assert_eq!(lit.src(0), Operand::rel_addr(PC + 8, OpSize::B8));
        for word in [
            0xF940_0420, // ldr x0, [x1, #8]
            0xF81F_0FE0, // str x0, [sp, #-16]!
            0xF841_07E0, // ldr x0, [sp], #16
            0xB862_7820, // ldr w0, [x1, x2, lsl #2]
            0x3862_4820, // ldrb w0, [x1, w2, uxtw]
            0x3862_6820, // ldrb w0, [x1, x2]
            0x3862_7820, // ldrb w0, [x1, x2, lsl #0]
            0x3940_0420, // ldrb w0, [x1, #1]
            0x7980_0420, // ldrsh x0, [x1, #2]
            0xB980_0420, // ldrsw x0, [x1, #4]
            0x3DC0_0420, // ldr q0, [x1, #16]
            0xFD40_0000, // ldr d0, [x0]
            0x5800_0040, // ldr x0, literal
            0x9800_0040, // ldrsw x0, literal
            0xF980_0020, // prfm pldl1keep, [x1]
        ] {
            roundtrip(word);
        }
    }

    #[test]
    fn pair_transfers_with_writeback() {
        // stp x29, x30, [sp, #-16]!
        let stp = dis(0xA9BF_7BFD);
        let sp = Operand::reg(a64::SP);
        assert_eq!(stp.dsts()[1], sp);
        assert_eq!(stp.dst(0).disp(), -16);
        assert_eq!(stp.srcs()[..2], [x(29), x(30)]);
        assert_eq!(stp.src(2).imm_value(), -16);
        assert_eq!(stp.src(3), sp);
        // ldp x29, x30, [sp], #16
        let ldp = dis(0xA8C1_7BFD);
        assert_eq!(ldp.dsts(), &[x(29), x(30), sp]);
        assert_eq!(ldp.src(0).disp(), 0);
        assert_eq!(ldp.src(1).imm_value(), 16);
        assert_eq!(ldp.src(2), sp);
        let mem = Operand::base_disp(a64::SP, Reg::NULL, 0, -16, OpSize::B16);
        let built = build(A64Op::Stp, &[mem, sp], &[x(29), x(30), imm(-16), sp]);
        assert_eq!(asm(&built), 0xA9BF_7BFD);
        // the writeback amount must agree with the address
        let skewed = build(A64Op::Stp, &[mem, sp], &[x(29), x(30), imm(-32), sp]);
        assert!(encode(&skewed, PC).is_err());
        for word in [0xA9BF_7BFD, 0xA8C1_7BFD, 0xA941_07E0, 0x2900_0420, 0x6D41_07E0, 0xAD40_0420] {
            roundtrip(word);
        }
    }

    // ── Floating point ────────────────────────────────────────────

    #[test]
    fn scalar_fp() {
        let fadd = dis(0x1E62_2820);
        assert_eq!(fadd.opcode(), Opcode::A64(A64Op::Fadd));
        assert_eq!(fadd.srcs(), &[d(1), d(2)]);
        let fmov = dis(0x1E6E_1000);
        assert_eq!(fmov.src(0), Operand::imm_f64(1.0));
        assert_eq!(asm(&build(A64Op::Fmov, &[d(0)], &[Operand::imm_f64(1.0)])), 0x1E6E_1000);
        let fcmp = dis(0x1E60_2008);
        assert!(fcmp.eflags().intersects(Eflags::WRITE_NZCV));
        for word in [
            0x1E62_2820, // fadd d0, d1, d2
            0x1E21_1820, // fdiv s0, s1, s1
            0x1E6E_1000, // fmov d0, #1.0
            0x1E60_4020, // fmov d0, d1
            0x1E27_0020, // fmov s0, w1
            0x9E66_0020, // fmov x0, d1
            0x1E22_C020, // fcvt d0, s1
            0x1E61_C020, // fsqrt d0, d1
            0x1E60_2008, // fcmp d0, #0.0
            0x1E21_2000, // fcmp s0, s1
            0x9E62_0020, // scvtf d0, x1
            0x1E78_0020, // fcvtzs w0, d1
        ] {
            roundtrip(word);
        }
    }

    #[test]
    fn fp_register_moves_keep_widths() {
        // fmov x0, s1 does not exist
        assert!(invalid(0x9E26_0020));
        // ptype 10 is unallocated
        assert!(invalid(0x1EA2_2820));
        let fmov = build(A64Op::Fmov, &[x(0)], &[Operand::reg(a64::vreg(1, OpSize::B4))]);
        assert!(encode(&fmov, PC).is_err());
    }

    #[test]
    fn unallocated_space_is_invalid() {
        for word in [0x0000_0000u32, 0x0E20_1C00, 0xD500_0000, 0x1E20_0C00] {
            assert!(invalid(word), "{:08x}", word);
        }
    }

    #[test]
    fn defaults_follow_first_entry() {
        assert_eq!(defaults(Opcode::A64(A64Op::Adds)), Some((Eflags::WRITE_NZCV, Predicate::None)));
        assert_eq!(defaults(Opcode::A64(A64Op::Bcond)), Some((Eflags::NONE, Predicate::Always)));
    }
}
