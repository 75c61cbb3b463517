//! Instruction model.
//!
//! An [`Instr`] is populated either by the decoder (from bytes) or directly
//! through [`Instr::build`]. It carries two representations that must not
//! silently diverge: the operand lists and the raw encoding. Every mutation of
//! the operands (or of anything else that feeds the encoding) invalidates the
//! raw bytes.

use core::fmt;

use bitflags::bitflags;

use crate::encode::InstrBytes;
use crate::isa::{Arch, IsaMode};
use crate::opnd::Operand;
use crate::reg::Reg;

#[cfg(feature = "aarch64")]
use crate::aarch64_tables::A64Op;
#[cfg(feature = "arm")]
use crate::arm_tables::ArmOp;
#[cfg(feature = "riscv")]
use crate::riscv_tables::RvOp;
#[cfg(feature = "x86")]
use crate::x86_tables::X86Op;

// ── Opcode ───────────────────────────────────────────────────────────────

/// Opcode of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Opcode {
    /// Not decoded past the raw bytes.
    #[default]
    Undecoded,
    /// The bytes are not a valid instruction.
    Invalid,
    /// 32-bit ARM (A32 and Thumb).
    #[cfg(feature = "arm")]
    Arm(ArmOp),
    /// AArch64.
    #[cfg(feature = "aarch64")]
    A64(A64Op),
    /// RISC-V.
    #[cfg(feature = "riscv")]
    Rv(RvOp),
    /// x86 / x86-64.
    #[cfg(feature = "x86")]
    X86(X86Op),
}

impl Opcode {
    /// Display name.
    pub fn name(self) -> &'static str {
        match self {
            Opcode::Undecoded => "<undecoded>",
            Opcode::Invalid => "<invalid>",
            #[cfg(feature = "arm")]
            Opcode::Arm(op) => op.name(),
            #[cfg(feature = "aarch64")]
            Opcode::A64(op) => op.name(),
            #[cfg(feature = "riscv")]
            Opcode::Rv(op) => op.name(),
            #[cfg(feature = "x86")]
            Opcode::X86(op) => op.name(),
        }
    }

    /// A real opcode, neither undecoded nor invalid.
    pub fn is_real(self) -> bool {
        !matches!(self, Opcode::Undecoded | Opcode::Invalid)
    }

    /// Architecture of a real opcode.
    pub fn arch(self) -> Option<Arch> {
        match self {
            Opcode::Undecoded | Opcode::Invalid => None,
            #[cfg(feature = "arm")]
            Opcode::Arm(_) => Some(Arch::Arm),
            #[cfg(feature = "aarch64")]
            Opcode::A64(_) => Some(Arch::Aarch64),
            #[cfg(feature = "riscv")]
            Opcode::Rv(_) => Some(Arch::Riscv),
            #[cfg(feature = "x86")]
            Opcode::X86(_) => Some(Arch::X86),
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Predicates ───────────────────────────────────────────────────────────

/// ARM / AArch64 condition (encodings 0..=13).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[allow(missing_docs)]
pub enum Cond {
    Eq,
    Ne,
    Cs,
    Cc,
    Mi,
    Pl,
    Vs,
    Vc,
    Hi,
    Ls,
    Ge,
    Lt,
    Gt,
    Le,
}

const CONDS: [Cond; 14] = [
    Cond::Eq,
    Cond::Ne,
    Cond::Cs,
    Cond::Cc,
    Cond::Mi,
    Cond::Pl,
    Cond::Vs,
    Cond::Vc,
    Cond::Hi,
    Cond::Ls,
    Cond::Ge,
    Cond::Lt,
    Cond::Gt,
    Cond::Le,
];

/// x86 condition code (the low nibble of `jcc`, `setcc`, `cmovcc`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[allow(missing_docs)]
pub enum X86Cond {
    O,
    No,
    B,
    Nb,
    Z,
    Nz,
    Be,
    Nbe,
    S,
    Ns,
    P,
    Np,
    L,
    Nl,
    Le,
    Nle,
}

const X86_CONDS: [X86Cond; 16] = [
    X86Cond::O,
    X86Cond::No,
    X86Cond::B,
    X86Cond::Nb,
    X86Cond::Z,
    X86Cond::Nz,
    X86Cond::Be,
    X86Cond::Nbe,
    X86Cond::S,
    X86Cond::Ns,
    X86Cond::P,
    X86Cond::Np,
    X86Cond::L,
    X86Cond::Nl,
    X86Cond::Le,
    X86Cond::Nle,
];

/// Condition under which an instruction takes effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Predicate {
    /// The encoding has no predicate.
    #[default]
    None,
    /// Predicated, condition always true (ARM `al`).
    Always,
    /// Condition never true (A64 `nv`, treated as always by hardware).
    Never,
    /// ARM unconditional space (`cond == 0b1111` on A32).
    Op,
    /// ARM / AArch64 condition.
    Arm(Cond),
    /// x86 condition.
    X86(X86Cond),
}

impl Predicate {
    /// ARM 4-bit condition field.
    pub fn from_arm(bits: u32) -> Predicate {
        match bits & 0xf {
            14 => Predicate::Always,
            15 => Predicate::Never,
            n => Predicate::Arm(CONDS[n as usize]),
        }
    }

    /// Inverse of [`Predicate::from_arm`]; `None` for non-ARM predicates.
    pub fn arm_bits(self) -> Option<u32> {
        match self {
            Predicate::Arm(c) => Some(c as u32),
            Predicate::Always => Some(14),
            Predicate::Never => Some(15),
            _ => None,
        }
    }

    /// x86 condition from a `cc` nibble.
    pub fn from_x86(bits: u32) -> Predicate {
        Predicate::X86(X86_CONDS[(bits & 0xf) as usize])
    }

    /// x86 `cc` nibble, if this is an x86 condition.
    pub fn x86_bits(self) -> Option<u32> {
        match self {
            Predicate::X86(c) => Some(c as u32),
            _ => None,
        }
    }

    /// Whether this is a real condition (not none/always/never/op).
    pub fn is_conditional(self) -> bool {
        matches!(self, Predicate::Arm(_) | Predicate::X86(_))
    }

    /// Opposite condition.
    ///
    /// # Panics
    ///
    /// Panics on [`Predicate::None`], [`Predicate::Always`], [`Predicate::Never`]
    /// and [`Predicate::Op`].
    pub fn invert(self) -> Predicate {
        match self {
            Predicate::Arm(c) => Predicate::Arm(CONDS[(c as usize) ^ 1]),
            Predicate::X86(c) => Predicate::X86(X86_CONDS[(c as usize) ^ 1]),
            other => panic!("cannot invert predicate {:?}", other),
        }
    }

    /// Status flags a predicate test reads.
    pub fn reads(self) -> Eflags {
        match self {
            Predicate::Arm(_) => Eflags::READ_NZCV,
            Predicate::X86(c) => match c {
                X86Cond::O | X86Cond::No => Eflags::READ_OF,
                X86Cond::B | X86Cond::Nb => Eflags::READ_CF,
                X86Cond::Z | X86Cond::Nz => Eflags::READ_ZF,
                X86Cond::Be | X86Cond::Nbe => Eflags::READ_CF.union(Eflags::READ_ZF),
                X86Cond::S | X86Cond::Ns => Eflags::READ_SF,
                X86Cond::P | X86Cond::Np => Eflags::READ_PF,
                X86Cond::L | X86Cond::Nl => Eflags::READ_SF.union(Eflags::READ_OF),
                X86Cond::Le | X86Cond::Nle => {
                    Eflags::READ_SF.union(Eflags::READ_OF).union(Eflags::READ_ZF)
                }
            },
            _ => Eflags::NONE,
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::None => Ok(()),
            Predicate::Always => write!(f, "al"),
            Predicate::Never => write!(f, "nv"),
            Predicate::Op => write!(f, "op"),
            Predicate::Arm(c) => f.write_str(c.name()),
            Predicate::X86(c) => f.write_str(c.name()),
        }
    }
}

impl Cond {
    /// Mnemonic suffix.
    pub const fn name(self) -> &'static str {
        const NAMES: [&str; 14] = [
            "eq", "ne", "cs", "cc", "mi", "pl", "vs", "vc", "hi", "ls", "ge", "lt", "gt", "le",
        ];
        NAMES[self as usize]
    }
}

impl X86Cond {
    /// Mnemonic suffix.
    pub const fn name(self) -> &'static str {
        const NAMES: [&str; 16] = [
            "o", "no", "b", "nb", "z", "nz", "be", "nbe", "s", "ns", "p", "np", "l", "nl", "le",
            "nle",
        ];
        NAMES[self as usize]
    }
}

// ── Status flags ─────────────────────────────────────────────────────────

bitflags! {
    /// Status-flag read/write usage.
    ///
    /// x86 flags and the ARM `N`/`Z`/`C`/`V` flags share bits (`N` = `SF`,
    /// `Z` = `ZF`, `C` = `CF`, `V` = `OF`); writes are the reads shifted up by 16.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(transparent))]
    pub struct Eflags: u32 {
        const READ_CF = 0x001;
        const READ_PF = 0x002;
        const READ_AF = 0x004;
        const READ_ZF = 0x008;
        const READ_SF = 0x010;
        const READ_DF = 0x020;
        const READ_OF = 0x040;
        /// ARM saturation flag.
        const READ_Q = 0x080;
        /// ARM parallel-arithmetic `GE` flags.
        const READ_GE = 0x100;
        /// The six x86 arithmetic flags.
        const READ_ARITH = 0x05f;
        /// ARM `N`, `Z`, `C`, `V`.
        const READ_NZCV = 0x059;
        /// Every readable flag.
        const READ_ALL = 0x1ff;

        const WRITE_CF = 0x001 << 16;
        const WRITE_PF = 0x002 << 16;
        const WRITE_AF = 0x004 << 16;
        const WRITE_ZF = 0x008 << 16;
        const WRITE_SF = 0x010 << 16;
        const WRITE_DF = 0x020 << 16;
        const WRITE_OF = 0x040 << 16;
        const WRITE_Q = 0x080 << 16;
        const WRITE_GE = 0x100 << 16;
        /// The six x86 arithmetic flags.
        const WRITE_ARITH = 0x05f << 16;
        /// ARM `N`, `Z`, `C`, `V`.
        const WRITE_NZCV = 0x059 << 16;
        /// Every writable flag.
        const WRITE_ALL = 0x1ff << 16;
    }
}

impl Eflags {
    /// No flags.
    pub const NONE: Eflags = Eflags::empty();

    /// Flags read.
    pub const fn reads(self) -> Eflags {
        self.intersection(Eflags::READ_ALL)
    }

    /// Flags written.
    pub const fn writes(self) -> Eflags {
        self.intersection(Eflags::WRITE_ALL)
    }
}

// ── x86 prefixes ─────────────────────────────────────────────────────────

bitflags! {
    /// x86 prefix state of an instruction.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(transparent))]
    pub struct Prefixes: u16 {
        /// `lock`.
        const LOCK = 0x001;
        /// `rep` / `repe` (`F3`).
        const REP = 0x002;
        /// `repne` (`F2`).
        const REPNE = 0x004;
        /// Operand-size override (`66`).
        const DATA16 = 0x008;
        /// Address-size override (`67`).
        const ADDR = 0x010;
        /// A REX prefix is present.
        const REX = 0x020;
        /// `REX.W`.
        const REX_W = 0x040;
        /// `REX.R`.
        const REX_R = 0x080;
        /// `REX.X`.
        const REX_X = 0x100;
        /// `REX.B`.
        const REX_B = 0x200;
        /// A segment override is present.
        const SEG = 0x400;
    }
}

impl Prefixes {
    /// No prefixes.
    pub const NONE: Prefixes = Prefixes::empty();
}

// ── Operand list ─────────────────────────────────────────────────────────

/// Inline operand list.
#[derive(Clone, Copy)]
pub struct OperandList {
    items: [Operand; OperandList::CAPACITY],
    len: u8,
}

impl OperandList {
    /// Storage capacity; per-mode limits are [`IsaMode::max_dsts`] and
    /// [`IsaMode::max_srcs`].
    pub const CAPACITY: usize = 20;

    /// Empty list.
    pub const fn new() -> Self {
        Self {
            items: [Operand::Null; Self::CAPACITY],
            len: 0,
        }
    }

    /// Append.
    ///
    /// # Panics
    ///
    /// Panics if the list is full.
    pub fn push(&mut self, op: Operand) {
        assert!(
            (self.len as usize) < Self::CAPACITY,
            "OperandList overflow: max {} operands",
            Self::CAPACITY
        );
        self.items[self.len as usize] = op;
        self.len += 1;
    }

    /// Number of operands.
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Remove every operand.
    pub fn clear(&mut self) {
        self.items = [Operand::Null; Self::CAPACITY];
        self.len = 0;
    }

    /// Active operands.
    pub fn as_slice(&self) -> &[Operand] {
        &self.items[..self.len as usize]
    }

    /// Active operands, mutable.
    pub fn as_mut_slice(&mut self) -> &mut [Operand] {
        &mut self.items[..self.len as usize]
    }
}

impl core::ops::Deref for OperandList {
    type Target = [Operand];
    fn deref(&self) -> &[Operand] {
        self.as_slice()
    }
}

impl PartialEq for OperandList {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for OperandList {}

impl fmt::Debug for OperandList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice().iter()).finish()
    }
}

impl Default for OperandList {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> IntoIterator for &'a OperandList {
    type Item = &'a Operand;
    type IntoIter = core::slice::Iter<'a, Operand>;
    fn into_iter(self) -> Self::IntoIter {
        self.as_slice().iter()
    }
}

// ── Raw bytes ────────────────────────────────────────────────────────────

/// Raw encoding attached to an instruction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RawBytes<'a> {
    /// No raw bytes.
    #[default]
    None,
    /// View into existing code.
    Borrowed(&'a [u8]),
    /// Small buffer owned by the instruction.
    Owned(InstrBytes),
}

impl RawBytes<'_> {
    /// The bytes, if any.
    pub fn as_slice(&self) -> Option<&[u8]> {
        match self {
            RawBytes::None => None,
            RawBytes::Borrowed(b) => Some(b),
            RawBytes::Owned(b) => Some(b),
        }
    }
}

// ── Instr ────────────────────────────────────────────────────────────────

const RAW_VALID: u8 = 0x1;
const OPERANDS_VALID: u8 = 0x2;
const EFLAGS_VALID: u8 = 0x4;

/// One machine instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instr<'a> {
    opcode: Opcode,
    mode: IsaMode,
    dsts: OperandList,
    srcs: OperandList,
    predicate: Predicate,
    valid: u8,
    eflags: Eflags,
    raw: RawBytes<'a>,
    raw_pc: u64,
    translation: Option<u64>,
    prefixes: Prefixes,
}

impl<'a> Instr<'a> {
    /// Empty instruction (opcode [`Opcode::Undecoded`]).
    pub fn new(mode: IsaMode) -> Self {
        Instr {
            opcode: Opcode::Undecoded,
            mode,
            dsts: OperandList::new(),
            srcs: OperandList::new(),
            predicate: Predicate::None,
            valid: 0,
            eflags: Eflags::NONE,
            raw: RawBytes::None,
            raw_pc: 0,
            translation: None,
            prefixes: Prefixes::NONE,
        }
    }

    /// Synthesize an instruction from an opcode and explicit operands.
    ///
    /// Status-flag usage and the default predicate come from the opcode's
    /// first table entry.
    ///
    /// # Panics
    ///
    /// Panics if the operand counts exceed the mode's capacity.
    pub fn build(mode: IsaMode, opcode: Opcode, dsts: &[Operand], srcs: &[Operand]) -> Self {
        assert!(
            dsts.len() <= mode.max_dsts() && srcs.len() <= mode.max_srcs(),
            "too many operands for {}: {} dsts, {} srcs",
            mode,
            dsts.len(),
            srcs.len()
        );
        let mut instr = Instr::new(mode);
        instr.opcode = opcode;
        for op in dsts {
            instr.dsts.push(*op);
        }
        for op in srcs {
            instr.srcs.push(*op);
        }
        instr.valid = OPERANDS_VALID;
        if let Some((eflags, predicate)) = crate::decode::opcode_defaults(mode, opcode) {
            instr.eflags = eflags;
            instr.predicate = predicate;
            instr.valid |= EFLAGS_VALID;
        }
        instr
    }

    /// Return to the freshly constructed state, keeping the mode.
    pub fn reset(&mut self) {
        *self = Instr::new(self.mode);
    }

    /// Opcode.
    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    /// Change the opcode; invalidates the raw bytes.
    pub fn set_opcode(&mut self, opcode: Opcode) {
        self.opcode = opcode;
        self.invalidate_raw();
    }

    /// ISA mode the instruction belongs to.
    pub fn isa_mode(&self) -> IsaMode {
        self.mode
    }

    /// Change the ISA mode; invalidates the raw bytes.
    pub fn set_isa_mode(&mut self, mode: IsaMode) {
        self.mode = mode;
        self.invalidate_raw();
    }

    // ── Operands ─────────────────────────────────────────────────────────

    /// Number of destinations.
    pub fn num_dsts(&self) -> usize {
        self.dsts.len()
    }

    /// Number of sources.
    pub fn num_srcs(&self) -> usize {
        self.srcs.len()
    }

    /// The `i`th destination.
    ///
    /// # Panics
    ///
    /// Panics if `i >= num_dsts()`.
    pub fn dst(&self, i: usize) -> Operand {
        assert!(i < self.dsts.len(), "dst({}) of {} ({} dsts)", i, self.opcode, self.dsts.len());
        self.dsts[i]
    }

    /// The `i`th source.
    ///
    /// # Panics
    ///
    /// Panics if `i >= num_srcs()`.
    pub fn src(&self, i: usize) -> Operand {
        assert!(i < self.srcs.len(), "src({}) of {} ({} srcs)", i, self.opcode, self.srcs.len());
        self.srcs[i]
    }

    /// Destinations.
    pub fn dsts(&self) -> &[Operand] {
        &self.dsts
    }

    /// Sources.
    pub fn srcs(&self) -> &[Operand] {
        &self.srcs
    }

    /// Replace destination `i`, or append when `i == num_dsts()`.
    ///
    /// # Panics
    ///
    /// Panics if `i` is past the end or the mode's capacity.
    pub fn set_dst(&mut self, i: usize, op: Operand) {
        let max = self.mode.max_dsts();
        Self::set_in(&mut self.dsts, i, op, max, "dst");
        self.operands_changed();
    }

    /// Replace source `i`, or append when `i == num_srcs()`.
    ///
    /// # Panics
    ///
    /// Panics if `i` is past the end or the mode's capacity.
    pub fn set_src(&mut self, i: usize, op: Operand) {
        let max = self.mode.max_srcs();
        Self::set_in(&mut self.srcs, i, op, max, "src");
        self.operands_changed();
    }

    /// Append a destination.
    pub fn push_dst(&mut self, op: Operand) {
        let i = self.dsts.len();
        self.set_dst(i, op);
    }

    /// Append a source.
    pub fn push_src(&mut self, op: Operand) {
        let i = self.srcs.len();
        self.set_src(i, op);
    }

    fn set_in(list: &mut OperandList, i: usize, op: Operand, max: usize, what: &str) {
        assert!(i < max, "{} index {} exceeds capacity {}", what, i, max);
        assert!(i <= list.len(), "{} index {} past end {}", what, i, list.len());
        if i == list.len() {
            list.push(op);
        } else {
            list.as_mut_slice()[i] = op;
        }
    }

    fn operands_changed(&mut self) {
        self.valid |= OPERANDS_VALID;
        self.invalidate_raw();
    }

    /// Decoder-side append that leaves the raw bytes alone.
    pub(crate) fn push_decoded(&mut self, dst: bool, op: Operand) -> Result<(), crate::IrError> {
        let (list, max) = if dst {
            (&mut self.dsts, self.mode.max_dsts())
        } else {
            (&mut self.srcs, self.mode.max_srcs())
        };
        if list.len() >= max {
            return Err(crate::IrError::UnsupportedOperand {
                mode: self.mode,
                what: "operand list overflow",
            });
        }
        list.push(op);
        Ok(())
    }

    /// Decoder-side reset of the operand lists.
    pub(crate) fn clear_operands(&mut self) {
        self.dsts.clear();
        self.srcs.clear();
        self.valid &= !OPERANDS_VALID;
    }

    // ── Validity ─────────────────────────────────────────────────────────

    /// Whether the operand lists are trustworthy.
    pub fn operands_valid(&self) -> bool {
        self.valid & OPERANDS_VALID != 0
    }

    /// Mark the operand lists valid or not.
    pub fn set_operands_valid(&mut self, valid: bool) {
        if valid {
            self.valid |= OPERANDS_VALID;
        } else {
            self.valid &= !OPERANDS_VALID;
        }
    }

    /// Whether the raw bytes are trustworthy.
    pub fn raw_bits_valid(&self) -> bool {
        self.valid & RAW_VALID != 0
    }

    /// Mark the raw bytes valid or not.
    pub fn set_raw_bits_valid(&mut self, valid: bool) {
        if valid {
            self.valid |= RAW_VALID;
        } else {
            self.valid &= !RAW_VALID;
        }
    }

    fn invalidate_raw(&mut self) {
        self.valid &= !RAW_VALID;
    }

    /// Raw bytes, when valid.
    pub fn raw_bytes(&self) -> Option<&[u8]> {
        if self.raw_bits_valid() {
            self.raw.as_slice()
        } else {
            None
        }
    }

    /// Raw byte storage regardless of validity.
    pub fn raw(&self) -> &RawBytes<'a> {
        &self.raw
    }

    /// Address the raw bytes were read from.
    pub fn raw_pc(&self) -> u64 {
        self.raw_pc
    }

    /// Attach a view of existing code as the raw encoding.
    pub fn set_raw_bytes(&mut self, bytes: &'a [u8], pc: u64) {
        self.raw = RawBytes::Borrowed(bytes);
        self.raw_pc = pc;
        self.valid |= RAW_VALID;
    }

    /// Attach an owned copy as the raw encoding.
    pub fn set_raw_bytes_owned(&mut self, bytes: InstrBytes, pc: u64) {
        self.raw = RawBytes::Owned(bytes);
        self.raw_pc = pc;
        self.valid |= RAW_VALID;
    }

    /// Length of the raw encoding, when valid.
    pub fn length(&self) -> Option<usize> {
        self.raw_bytes().map(<[u8]>::len)
    }

    /// Copy borrowed raw bytes into owned storage.
    pub fn to_owned_raw(&mut self) {
        if let RawBytes::Borrowed(b) = self.raw {
            self.raw = RawBytes::Owned(InstrBytes::from_slice(b));
        }
    }

    /// Detach from the code buffer the instruction was decoded from.
    pub fn into_static(mut self) -> Instr<'static> {
        self.to_owned_raw();
        let raw = match self.raw {
            RawBytes::None | RawBytes::Borrowed(_) => RawBytes::None,
            RawBytes::Owned(b) => RawBytes::Owned(b),
        };
        Instr {
            opcode: self.opcode,
            mode: self.mode,
            dsts: self.dsts,
            srcs: self.srcs,
            predicate: self.predicate,
            valid: self.valid,
            eflags: self.eflags,
            raw,
            raw_pc: self.raw_pc,
            translation: self.translation,
            prefixes: self.prefixes,
        }
    }

    // ── Predicate, flags, prefixes ───────────────────────────────────────

    /// Predicate.
    pub fn predicate(&self) -> Predicate {
        self.predicate
    }

    /// Change the predicate; invalidates the raw bytes.
    pub fn set_predicate(&mut self, predicate: Predicate) {
        self.predicate = predicate;
        self.invalidate_raw();
    }

    /// Whether the instruction executes conditionally.
    pub fn is_predicated(&self) -> bool {
        self.predicate.is_conditional()
    }

    pub(crate) fn set_predicate_decoded(&mut self, predicate: Predicate) {
        self.predicate = predicate;
    }

    /// Whether [`Instr::eflags`] may be called.
    pub fn eflags_valid(&self) -> bool {
        self.valid & EFLAGS_VALID != 0
    }

    /// Status-flag usage.
    ///
    /// # Panics
    ///
    /// Panics if the usage is unknown (the instruction was not decoded to at
    /// least opcode level or built from an opcode).
    pub fn eflags(&self) -> Eflags {
        assert!(self.eflags_valid(), "eflags of {} not computed", self.opcode);
        self.eflags
    }

    pub(crate) fn set_eflags(&mut self, eflags: Eflags) {
        self.eflags = eflags;
        self.valid |= EFLAGS_VALID;
    }

    /// Address the instruction conceptually originates at.
    pub fn translation(&self) -> Option<u64> {
        self.translation
    }

    /// Set the translation address.
    pub fn set_translation(&mut self, pc: Option<u64>) {
        self.translation = pc;
    }

    /// x86 prefixes.
    pub fn prefixes(&self) -> Prefixes {
        self.prefixes
    }

    /// Replace the x86 prefixes; invalidates the raw bytes.
    pub fn set_prefixes(&mut self, prefixes: Prefixes) {
        self.prefixes = prefixes;
        self.invalidate_raw();
    }

    pub(crate) fn set_prefixes_decoded(&mut self, prefixes: Prefixes) {
        self.prefixes = prefixes;
    }

    pub(crate) fn set_opcode_decoded(&mut self, opcode: Opcode) {
        self.opcode = opcode;
    }

    // ── Queries ──────────────────────────────────────────────────────────

    /// Cheap syntactic encodability check; not a full encode attempt.
    pub fn is_encodable(&self) -> bool {
        if self.raw_bits_valid() && self.raw.as_slice().is_some() {
            return true;
        }
        self.opcode.is_real()
            && self.opcode.arch() == Some(self.mode.arch())
            && self.operands_valid()
            && self.dsts.len() <= self.mode.max_dsts()
            && self.srcs.len() <= self.mode.max_srcs()
            && !self.dsts.iter().chain(self.srcs.iter()).any(Operand::is_null)
    }

    /// Whether any source (or any destination memory address) reads `reg`.
    pub fn reads_from_reg(&self, reg: Reg) -> bool {
        self.srcs.iter().any(|op| op.uses_reg(reg))
            || self
                .dsts
                .iter()
                .any(|op| op.is_mem() && op.uses_reg(reg))
    }

    /// Whether any register destination overlaps `reg`.
    pub fn writes_to_reg(&self, reg: Reg) -> bool {
        self.dsts
            .iter()
            .any(|op| op.is_reg() && op.reg_id().overlaps(reg))
    }

    /// Whether any destination is a memory operand.
    pub fn writes_memory(&self) -> bool {
        self.dsts.iter().any(Operand::is_mem)
    }

    /// Whether any source is a memory operand.
    pub fn reads_memory(&self) -> bool {
        self.srcs.iter().any(Operand::is_mem)
    }
}

impl fmt::Display for Instr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.opcode)?;
        if self.predicate.is_conditional() {
            write!(f, ".{}", self.predicate)?;
        }
        let mut sep = " ";
        for op in self.dsts.iter() {
            write!(f, "{}{}", sep, op)?;
            sep = ", ";
        }
        if !self.dsts.is_empty() && !self.srcs.is_empty() {
            write!(f, " <-")?;
            sep = " ";
        }
        for op in self.srcs.iter() {
            write!(f, "{}{}", sep, op)?;
            sep = ", ";
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reg::x86;
    use crate::size::OpSize;

    #[test]
    fn new_is_undecoded() {
        let instr = Instr::new(IsaMode::Amd64);
        assert_eq!(instr.opcode(), Opcode::Undecoded);
        assert_eq!(instr.num_dsts(), 0);
        assert!(!instr.raw_bits_valid());
        assert!(!instr.eflags_valid());
        assert!(!instr.is_encodable());
    }

    #[test]
    fn operand_mutation_invalidates_raw() {
        static BYTES: [u8; 1] = [0x90];
        let mut instr = Instr::new(IsaMode::Amd64);
        instr.set_raw_bytes(&BYTES, 0x1000);
        assert_eq!(instr.length(), Some(1));
        instr.push_src(Operand::reg(x86::RAX));
        assert!(!instr.raw_bits_valid());
        assert!(instr.operands_valid());
        assert_eq!(instr.raw_bytes(), None);
    }

    #[test]
    fn set_dst_grows_by_one() {
        let mut instr = Instr::new(IsaMode::Amd64);
        instr.set_dst(0, Operand::reg(x86::RAX));
        instr.set_dst(0, Operand::reg(x86::RBX));
        instr.set_dst(1, Operand::reg(x86::RCX));
        assert_eq!(instr.num_dsts(), 2);
        assert_eq!(instr.dst(0).reg_id(), x86::RBX);
    }

    #[test]
    #[should_panic(expected = "past end")]
    fn set_dst_with_gap_panics() {
        let mut instr = Instr::new(IsaMode::Amd64);
        instr.set_dst(1, Operand::reg(x86::RAX));
    }

    #[test]
    #[should_panic(expected = "src(0)")]
    fn src_past_count_panics() {
        let instr = Instr::new(IsaMode::Amd64);
        let _ = instr.src(0);
    }

    #[test]
    #[should_panic(expected = "not computed")]
    fn eflags_before_decode_panics() {
        let _ = Instr::new(IsaMode::Riscv64).eflags();
    }

    #[test]
    fn predicate_inversion() {
        assert_eq!(Predicate::Arm(Cond::Eq).invert(), Predicate::Arm(Cond::Ne));
        assert_eq!(Predicate::Arm(Cond::Le).invert(), Predicate::Arm(Cond::Gt));
        assert_eq!(Predicate::X86(X86Cond::B).invert(), Predicate::X86(X86Cond::Nb));
        assert_eq!(Predicate::from_arm(0xe), Predicate::Always);
        assert_eq!(Predicate::from_arm(0xb).arm_bits(), Some(0xb));
    }

    #[test]
    #[should_panic(expected = "cannot invert")]
    fn invert_always_panics() {
        let _ = Predicate::Always.invert();
    }

    #[test]
    fn eflags_split() {
        let e = Eflags::READ_CF | Eflags::WRITE_ARITH;
        assert_eq!(e.reads(), Eflags::READ_CF);
        assert_eq!(e.writes(), Eflags::WRITE_ARITH);
        assert!(Eflags::READ_ARITH.intersects(Eflags::READ_NZCV));
    }

    #[test]
    fn memory_and_register_queries() {
        let mut instr = Instr::new(IsaMode::Amd64);
        instr.push_dst(Operand::base_disp(x86::RSP, Reg::NULL, 0, 8, OpSize::B8));
        instr.push_src(Operand::reg(x86::EAX));
        assert!(instr.writes_memory());
        assert!(!instr.reads_memory());
        assert!(instr.reads_from_reg(x86::RSP));
        assert!(instr.reads_from_reg(x86::AL));
        assert!(!instr.writes_to_reg(x86::RSP));
    }

    #[test]
    fn into_static_keeps_bytes() {
        let bytes = [0x90u8];
        let mut instr = Instr::new(IsaMode::Amd64);
        instr.set_raw_bytes(&bytes, 0);
        let owned: Instr<'static> = instr.into_static();
        assert_eq!(owned.raw_bytes(), Some(&[0x90u8][..]));
    }

    #[test]
    fn predicate_display() {
        use alloc::format;
        assert_eq!(format!("{}", Predicate::Arm(Cond::Ne)), "ne");
        assert_eq!(format!("{}", Predicate::X86(X86Cond::Nbe)), "nbe");
    }
}
