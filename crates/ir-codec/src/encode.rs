//! Encoder entry points.
//!
//! An instruction whose raw bytes are valid is copied (re-relativized when it
//! moves); otherwise the opcode's encoding chain is walked from its head and
//! the first entry whose slots accept the operands is serialized. Every
//! produced encoding is checked against the entry's fixed bits and decoded
//! back before it is handed out, so an encoder gap surfaces as
//! [`IrError::NoMatchingEncoding`] rather than as wrong bytes.

use core::fmt;

use crate::decode::{self, Level};
use crate::error::IrError;
use crate::instr::{Instr, Opcode, Predicate};
use crate::isa::{Arch, IsaMode};
use crate::opnd::{InstrId, MemRef, Operand, OpndFlags, Shift};
#[cfg(feature = "arm")]
use crate::it_block::{self, Walk};
use crate::table::{chain, Dir, Layout, OpInfo};

// ─── InstrBytes: inline instruction buffer ─────────────────────────────

/// Inline instruction byte buffer, sized for the longest encoding of any mode.
#[derive(Clone, Copy)]
pub struct InstrBytes {
    data: [u8; InstrBytes::CAPACITY],
    len: u8,
}

impl InstrBytes {
    /// Storage capacity.
    pub const CAPACITY: usize = 17;

    /// Create an empty buffer.
    #[inline]
    pub const fn new() -> Self {
        Self {
            data: [0; Self::CAPACITY],
            len: 0,
        }
    }

    /// Create a buffer pre-filled from a byte slice.
    ///
    /// # Panics
    ///
    /// Panics if `src` is longer than [`InstrBytes::CAPACITY`].
    #[inline]
    pub fn from_slice(src: &[u8]) -> Self {
        let mut buf = Self::new();
        buf.extend_from_slice(src);
        buf
    }

    /// Append a single byte.
    ///
    /// # Panics
    ///
    /// Panics if the buffer is full.
    #[inline]
    pub fn push(&mut self, byte: u8) {
        assert!(
            (self.len as usize) < Self::CAPACITY,
            "InstrBytes overflow: cannot push beyond {} bytes",
            Self::CAPACITY
        );
        self.data[self.len as usize] = byte;
        self.len += 1;
    }

    /// Append a slice of bytes.
    ///
    /// # Panics
    ///
    /// Panics if appending would exceed the capacity.
    #[inline]
    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        let start = self.len as usize;
        let end = start + bytes.len();
        assert!(
            end <= Self::CAPACITY,
            "InstrBytes overflow: {} + {} exceeds {}-byte capacity",
            start,
            bytes.len(),
            Self::CAPACITY
        );
        self.data[start..end].copy_from_slice(bytes);
        self.len = end as u8;
    }

    /// Append a little-endian halfword.
    #[inline]
    pub fn push_u16(&mut self, hw: u16) {
        self.extend_from_slice(&hw.to_le_bytes());
    }

    /// Append a little-endian word.
    #[inline]
    pub fn push_u32(&mut self, word: u32) {
        self.extend_from_slice(&word.to_le_bytes());
    }

    /// Number of bytes in the buffer.
    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Whether the buffer is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Convert to a heap-allocated `Vec<u8>`.
    #[inline]
    pub fn to_vec(&self) -> alloc::vec::Vec<u8> {
        self.as_ref().to_vec()
    }
}

impl Default for InstrBytes {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl core::ops::Deref for InstrBytes {
    type Target = [u8];
    #[inline]
    fn deref(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }
}

impl core::ops::DerefMut for InstrBytes {
    #[inline]
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.data[..self.len as usize]
    }
}

impl AsRef<[u8]> for InstrBytes {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        self
    }
}

impl fmt::Debug for InstrBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl PartialEq for InstrBytes {
    fn eq(&self, other: &Self) -> bool {
        **self == **other
    }
}

impl Eq for InstrBytes {}

impl PartialEq<[u8]> for InstrBytes {
    fn eq(&self, other: &[u8]) -> bool {
        **self == *other
    }
}

impl PartialEq<alloc::vec::Vec<u8>> for InstrBytes {
    fn eq(&self, other: &alloc::vec::Vec<u8>) -> bool {
        **self == **other
    }
}

// ─── Instruction references ────────────────────────────────────────────

/// Supplies addresses for [`Operand::InstrRef`] operands at encode time.
pub trait InstrResolver {
    /// Address of instruction `id`, if placed.
    fn resolve(&mut self, id: InstrId) -> Option<u64>;
}

impl<F: FnMut(InstrId) -> Option<u64>> InstrResolver for F {
    fn resolve(&mut self, id: InstrId) -> Option<u64> {
        self(id)
    }
}

/// Resolver that knows no instructions.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRefs;

impl InstrResolver for NoRefs {
    fn resolve(&mut self, _id: InstrId) -> Option<u64> {
        None
    }
}

// ─── Fixed-width field writer ──────────────────────────────────────────

/// Accumulates operand fields into a fixed-width encoding word.
///
/// Writing the same field twice is allowed only with the same value, which
/// is how writeback forms check that the base named in the memory operand
/// matches the separately listed base register.
pub(crate) struct Word {
    pub(crate) opcode: Opcode,
    pub(crate) bits: u32,
    written: u32,
}

impl Word {
    pub(crate) fn new(opcode: Opcode, bits: u32) -> Self {
        Word {
            opcode,
            bits,
            written: 0,
        }
    }

    /// Unsigned field of `width` bits at `shift`.
    pub(crate) fn put(&mut self, shift: u32, width: u32, value: u32) -> Result<(), IrError> {
        let field = if width >= 32 { u32::MAX } else { (1u32 << width) - 1 };
        if value & !field != 0 {
            return Err(self.out_of_range(value as i64, width));
        }
        let mask = field << shift;
        let placed = value << shift;
        if self.written & mask != 0 && (self.bits & mask & self.written) != (placed & self.written) {
            return Err(IrError::IllegalOperand {
                opcode: self.opcode,
                reason: "operands disagree on a shared field",
            });
        }
        self.bits = (self.bits & !mask) | placed;
        self.written |= mask;
        Ok(())
    }

    /// Signed field of `width` bits at `shift`, two's complement.
    pub(crate) fn put_signed(&mut self, shift: u32, width: u32, value: i64) -> Result<(), IrError> {
        if !fits_signed(value, width) {
            return Err(self.out_of_range(value, width));
        }
        let field = if width >= 32 { u32::MAX } else { (1u32 << width) - 1 };
        self.put(shift, width, (value as u32) & field)
    }

    pub(crate) fn out_of_range(&self, value: i64, width: u32) -> IrError {
        IrError::OperandOutOfRange {
            opcode: self.opcode,
            value,
            bits: width as u8,
        }
    }

    pub(crate) fn illegal(&self, reason: &'static str) -> IrError {
        IrError::IllegalOperand {
            opcode: self.opcode,
            reason,
        }
    }
}

/// Whether `value` fits a two's-complement field of `width` bits.
pub(crate) fn fits_signed(value: i64, width: u32) -> bool {
    match width {
        0 => false,
        w if w >= 64 => true,
        _ => {
            let lo = i64::MIN >> (64 - width);
            let hi = i64::MAX >> (64 - width);
            (lo..=hi).contains(&value)
        }
    }
}

// ─── Operand cursor ────────────────────────────────────────────────────

/// Walks an instruction's operands in slot order.
pub(crate) struct Cursor<'i> {
    dsts: &'i [Operand],
    srcs: &'i [Operand],
    d: usize,
    s: usize,
}

impl<'i> Cursor<'i> {
    pub(crate) fn new(instr: &'i Instr<'_>) -> Self {
        Cursor {
            dsts: instr.dsts(),
            srcs: instr.srcs(),
            d: 0,
            s: 0,
        }
    }

    /// Next operand of the list `dir` names.
    pub(crate) fn next(&mut self, dir: Dir) -> Option<Operand> {
        let (list, at) = match dir {
            Dir::Dst => (self.dsts, &mut self.d),
            Dir::Src => (self.srcs, &mut self.s),
        };
        let op = list.get(*at).copied()?;
        *at += 1;
        Some(op)
    }

    /// Next operand without consuming it.
    pub(crate) fn peek(&self, dir: Dir) -> Option<Operand> {
        match dir {
            Dir::Dst => self.dsts.get(self.d).copied(),
            Dir::Src => self.srcs.get(self.s).copied(),
        }
    }

    /// Whether every operand was consumed.
    pub(crate) fn is_done(&self) -> bool {
        self.d == self.dsts.len() && self.s == self.srcs.len()
    }
}

// ─── Chain driver ──────────────────────────────────────────────────────

fn rank(err: &IrError) -> u8 {
    match err {
        IrError::OperandOutOfRange { .. } => 3,
        IrError::IllegalOperand { .. } => 2,
        IrError::NoMatchingEncoding { .. } => 1,
        _ => 0,
    }
}

/// Try every encoding of `head`'s chain in order. The first entry whose
/// re-decode reproduces the operands exactly, size tags included, wins;
/// failing that, the first one `attempt` accepts at all. The most
/// informative rejection is reported when nothing fits.
pub(crate) fn encode_chain<L: Layout, T>(
    opcode: Opcode,
    head: Option<&'static OpInfo<L>>,
    attempt: impl FnMut(&'static OpInfo<L>) -> Result<(T, Fit), IrError>,
) -> Result<T, IrError> {
    encode_entries(opcode, head.into_iter().flat_map(chain::<L>), attempt)
}

/// [`encode_chain`] over an explicit entry sequence.
pub(crate) fn encode_entries<L: Layout, T>(
    opcode: Opcode,
    entries: impl IntoIterator<Item = &'static OpInfo<L>>,
    mut attempt: impl FnMut(&'static OpInfo<L>) -> Result<(T, Fit), IrError>,
) -> Result<T, IrError> {
    let mut best = IrError::NoMatchingEncoding { opcode };
    let mut loose = None;
    let mut tried = false;
    for info in entries {
        tried = true;
        match attempt(info) {
            Ok((out, Fit::Exact)) => return Ok(out),
            Ok((out, Fit::Equivalent)) => {
                if loose.is_none() {
                    loose = Some(out);
                }
            }
            Err(e @ (IrError::UnresolvedTarget | IrError::BufferTooSmall { .. })) => return Err(e),
            Err(e) => {
                if rank(&e) > rank(&best) {
                    best = e;
                }
            }
        }
    }
    if let Some(out) = loose {
        return Ok(out);
    }
    if !tried {
        log::debug!("encode {}: opcode has no {} encoding", opcode, L::NAME);
        return Err(best);
    }
    log::debug!("encode {} failed: {}", opcode, best);
    Err(best)
}

// ─── Verification ──────────────────────────────────────────────────────

fn shift_class(value: i64) -> Option<Shift> {
    match Shift::from_imm(value)? {
        Shift::Lsl => Some(Shift::None),
        other => Some(other),
    }
}

fn same_imm(a: i64, b: i64, mode: IsaMode) -> bool {
    a == b || (mode.pointer_size() == 4 && a as u32 == b as u32)
}

fn same_mem(a: &MemRef, b: &MemRef) -> bool {
    let idx_shift = |m: &MemRef| {
        let kind = if m.shift.kind == Shift::Lsl {
            Shift::None
        } else {
            m.shift.kind
        };
        (kind, m.shift.amount)
    };
    let scale = |m: &MemRef| if m.index.is_null() { 0 } else { m.scale.max(1) };
    a.base == b.base
        && a.index == b.index
        && a.disp == b.disp
        && a.segment == b.segment
        && scale(a) == scale(b)
        && idx_shift(a) == idx_shift(b)
        && a.flags.contains(OpndFlags::NEGATED) == b.flags.contains(OpndFlags::NEGATED)
}

/// Whether two operands denote the same thing, ignoring size tags and
/// cosmetic differences a decoder normalizes away.
pub(crate) fn equivalent(a: &Operand, b: &Operand, mode: IsaMode) -> bool {
    let sig = OpndFlags::NEGATED.union(OpndFlags::SHIFTED);
    match (a, b) {
        (Operand::Reg { reg: r1, flags: f1, .. }, Operand::Reg { reg: r2, flags: f2, .. }) => {
            r1 == r2 && f1.bits() & sig.bits() == f2.bits() & sig.bits()
        }
        (
            Operand::ImmInt {
                value: v1,
                flags: f1,
                ..
            },
            Operand::ImmInt {
                value: v2,
                flags: f2,
                ..
            },
        ) => {
            if f1.contains(OpndFlags::IS_SHIFT) || f2.contains(OpndFlags::IS_SHIFT) {
                shift_class(*v1) == shift_class(*v2)
            } else {
                same_imm(*v1, *v2, mode)
            }
        }
        (Operand::ImmFloat { bits: b1, .. }, Operand::ImmFloat { bits: b2, .. }) => b1 == b2,
        (
            Operand::Pc {
                target: t1,
                selector: s1,
            },
            Operand::Pc {
                target: t2,
                selector: s2,
            },
        ) => s1 == s2 && same_imm(*t1 as i64, *t2 as i64, mode),
        (Operand::BaseDisp(m1), Operand::BaseDisp(m2)) => same_mem(m1, m2),
        (
            Operand::AbsAddr {
                addr: a1,
                segment: s1,
                ..
            },
            Operand::AbsAddr {
                addr: a2,
                segment: s2,
                ..
            },
        )
        | (
            Operand::RelAddr {
                addr: a1,
                segment: s1,
                ..
            },
            Operand::RelAddr {
                addr: a2,
                segment: s2,
                ..
            },
        ) => s1 == s2 && same_imm(*a1 as i64, *a2 as i64, mode),
        _ => false,
    }
}

/// How closely a produced encoding reproduces the requested instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Fit {
    /// Every operand decodes back identical, size tags included.
    Exact,
    /// Operands agree up to size tags and decoder normalization.
    Equivalent,
}

/// Decode `bytes` at `pc` and check it reproduces `instr`.
pub(crate) fn verify(instr: &Instr<'_>, bytes: &[u8], pc: u64) -> Result<Fit, IrError> {
    let mode = instr.isa_mode();
    let mut back = Instr::new(mode);
    if decode::decode_in(mode, bytes, pc, &mut back, Level::Full).is_err() {
        return Err(IrError::NoMatchingEncoding {
            opcode: instr.opcode(),
        });
    }
    compare(instr, &back)
}

/// How closely the decoded `back` reproduces `instr`.
pub(crate) fn compare(instr: &Instr<'_>, back: &Instr<'_>) -> Result<Fit, IrError> {
    let mode = instr.isa_mode();
    let mismatch = IrError::NoMatchingEncoding {
        opcode: instr.opcode(),
    };
    let same_list = |a: &[Operand], b: &[Operand]| {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| equivalent(x, y, mode))
    };
    let unconditional = |p: Predicate| matches!(p, Predicate::None | Predicate::Always | Predicate::Op);
    let same_pred = instr.predicate() == back.predicate()
        || (unconditional(instr.predicate()) && unconditional(back.predicate()));
    if back.opcode() != instr.opcode()
        || !same_pred
        || !same_list(instr.dsts(), back.dsts())
        || !same_list(instr.srcs(), back.srcs())
    {
        log::trace!("encode {}: round trip produced {}", instr, back);
        return Err(mismatch);
    }
    if instr.dsts() == back.dsts() && instr.srcs() == back.srcs() {
        Ok(Fit::Exact)
    } else {
        Ok(Fit::Equivalent)
    }
}

// ─── Entry points ──────────────────────────────────────────────────────

/// Replace every instruction reference with the code address it resolves to.
fn resolve_refs<'a>(
    instr: &Instr<'a>,
    resolver: &mut dyn InstrResolver,
) -> Result<Instr<'a>, IrError> {
    let mut out = instr.clone();
    let resolve = |op: Operand, resolver: &mut dyn InstrResolver| -> Result<Operand, IrError> {
        match op {
            Operand::InstrRef { id, selector } => {
                let target = resolver.resolve(id).ok_or(IrError::UnresolvedTarget)?;
                Ok(Operand::Pc { target, selector })
            }
            other => Ok(other),
        }
    };
    for i in 0..instr.num_dsts() {
        if instr.dst(i).is_instr_ref() {
            out.set_dst(i, resolve(instr.dst(i), resolver)?);
        }
    }
    for i in 0..instr.num_srcs() {
        if instr.src(i).is_instr_ref() {
            out.set_src(i, resolve(instr.src(i), resolver)?);
        }
    }
    Ok(out)
}

/// Encoded bytes of `instr` placed at `final_pc`.
///
/// Thumb encoding follows the thread's IT-block cursor: after an `it` is
/// encoded, the instructions encoded at the following addresses are its
/// members.
pub fn encode_bytes(
    instr: &Instr<'_>,
    final_pc: u64,
    resolver: &mut dyn InstrResolver,
) -> Result<InstrBytes, IrError> {
    let mode = instr.isa_mode();
    if !mode.is_available() {
        return Err(IrError::ModeUnavailable { mode });
    }
    #[cfg(feature = "arm")]
    if mode == IsaMode::Thumb {
        let slot = it_block::slot(Walk::Encode, final_pc);
        let out = encode_at(instr, final_pc, resolver, slot.map(|s| s.1))?;
        it_block::record(Walk::Encode, &out, final_pc, slot.map(|s| s.0));
        return Ok(out);
    }
    encode_at(instr, final_pc, resolver, None)
}

fn encode_at(
    instr: &Instr<'_>,
    final_pc: u64,
    resolver: &mut dyn InstrResolver,
    it: Option<Predicate>,
) -> Result<InstrBytes, IrError> {
    let mode = instr.isa_mode();
    if let Some(raw) = instr.raw_bytes() {
        return copy_raw(mode, raw, instr.raw_pc(), final_pc, it);
    }
    if !instr.operands_valid() || !instr.opcode().is_real() {
        return Err(IrError::NotEncodable);
    }
    if instr.opcode().arch() != Some(mode.arch()) {
        return Err(IrError::NoMatchingEncoding {
            opcode: instr.opcode(),
        });
    }
    let resolved = resolve_refs(instr, resolver)?;
    encode_operands(&resolved, final_pc, it)
}

#[cfg_attr(not(feature = "arm"), allow(unused_variables))]
fn encode_operands(instr: &Instr<'_>, pc: u64, it: Option<Predicate>) -> Result<InstrBytes, IrError> {
    match instr.isa_mode() {
        #[cfg(feature = "x86")]
        IsaMode::Ia32 | IsaMode::Amd64 => crate::x86::encode(instr, pc),
        #[cfg(feature = "arm")]
        IsaMode::ArmA32 => crate::arm::encode(instr, pc),
        #[cfg(feature = "arm")]
        IsaMode::Thumb => crate::thumb::encode_in_block(instr, pc, it),
        #[cfg(feature = "aarch64")]
        IsaMode::Aarch64 => crate::aarch64::encode(instr, pc),
        #[cfg(feature = "riscv")]
        IsaMode::Riscv64 => crate::riscv::encode(instr, pc),
        #[allow(unreachable_patterns)]
        mode => Err(IrError::ModeUnavailable { mode }),
    }
}

/// Copy raw bytes to `final_pc`, re-relativizing position-dependent fields.
fn copy_raw(
    mode: IsaMode,
    raw: &[u8],
    raw_pc: u64,
    final_pc: u64,
    it: Option<Predicate>,
) -> Result<InstrBytes, IrError> {
    if raw_pc == final_pc || raw.len() > InstrBytes::CAPACITY {
        return if raw.len() > InstrBytes::CAPACITY {
            Err(IrError::NotEncodable)
        } else {
            Ok(InstrBytes::from_slice(raw))
        };
    }
    #[cfg(feature = "x86")]
    if mode.arch() == Arch::X86 {
        return crate::x86::relocate_raw(mode, raw, raw_pc, final_pc);
    }
    let mut moved = Instr::new(mode);
    decode::decode_in_block(mode, raw, raw_pc, &mut moved, Level::Full, it)?;
    let position_dependent = moved
        .dsts()
        .iter()
        .chain(moved.srcs())
        .any(|op| op.is_pc() || op.is_rel_addr());
    if position_dependent {
        encode_operands(&moved, final_pc, it)
    } else {
        Ok(InstrBytes::from_slice(raw))
    }
}

fn place(bytes: &InstrBytes, buf: &mut [u8]) -> Result<usize, IrError> {
    if buf.len() < bytes.len() {
        return Err(IrError::BufferTooSmall {
            needed: bytes.len(),
            available: buf.len(),
        });
    }
    buf[..bytes.len()].copy_from_slice(bytes);
    Ok(bytes.len())
}

/// Encode `instr` for address `pc` into `buf`, returning the next address.
pub fn instr_encode(instr: &Instr<'_>, buf: &mut [u8], pc: u64) -> Result<u64, IrError> {
    instr_encode_with(instr, buf, pc, pc, &mut NoRefs)
}

/// Encode into `buf`, which lives at `copy_pc`, with pc-relative fields
/// computed for execution at `final_pc`. Returns the address after the copy.
pub fn instr_encode_to_copy(
    instr: &Instr<'_>,
    buf: &mut [u8],
    copy_pc: u64,
    final_pc: u64,
) -> Result<u64, IrError> {
    instr_encode_with(instr, buf, copy_pc, final_pc, &mut NoRefs)
}

/// [`instr_encode_to_copy`] with instruction references resolved by `resolver`.
pub fn instr_encode_with(
    instr: &Instr<'_>,
    buf: &mut [u8],
    copy_pc: u64,
    final_pc: u64,
    resolver: &mut dyn InstrResolver,
) -> Result<u64, IrError> {
    let bytes = encode_bytes(instr, final_pc, resolver)?;
    let len = place(&bytes, buf)?;
    Ok(copy_pc + len as u64)
}

/// Length `instr` would encode to at its raw address (or 0 without one).
pub fn instr_length(instr: &Instr<'_>) -> Result<usize, IrError> {
    if let Some(len) = instr.length() {
        return Ok(len);
    }
    Ok(encode_bytes(instr, instr.raw_pc(), &mut NoRefs)?.len())
}

/// Encode and attach the produced bytes to `instr` as its owned raw encoding.
pub fn instr_encode_and_record(
    instr: &mut Instr<'_>,
    buf: &mut [u8],
    pc: u64,
) -> Result<u64, IrError> {
    let bytes = encode_bytes(instr, pc, &mut NoRefs)?;
    let len = place(&bytes, buf)?;
    instr.set_raw_bytes_owned(bytes, pc);
    Ok(pc + len as u64)
}
