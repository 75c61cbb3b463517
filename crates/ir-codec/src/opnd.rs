//! Operand model: registers, immediates, code addresses, memory references.
//!
//! [`Operand`] is a plain `Copy` value. Accessors that extract a field of one
//! specific kind ([`Operand::reg_id`], [`Operand::disp`], ...) panic when called
//! on another kind; callers are expected to check the kind first.

use core::fmt;

use bitflags::bitflags;

use crate::isa::IsaMode;
use crate::reg::Reg;
use crate::size::OpSize;

// ── Flags ────────────────────────────────────────────────────────────────

bitflags! {
    /// Per-operand modifier bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(transparent))]
    pub struct OpndFlags: u16 {
        /// Register (or memory index) is subtracted.
        const NEGATED = 0x01;
        /// Register is shifted before use; the shift follows as further sources.
        const SHIFTED = 0x02;
        /// Immediate names a [`Shift`] kind rather than a value.
        const IS_SHIFT = 0x04;
        /// Register is extended before use.
        const EXTENDED = 0x08;
        /// Register is one element of a register list.
        const IN_LIST = 0x10;
        /// Operand is one part of a multi-part value.
        const MULTI_PART = 0x20;
    }
}

impl OpndFlags {
    /// No modifiers.
    pub const NONE: OpndFlags = OpndFlags::empty();
}

bitflags! {
    /// Encoder hints carried by memory operands.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(transparent))]
    pub struct MemHints: u8 {
        /// Always encode a full-width displacement (x86 disp32 even for 0 or small).
        const FORCE_FULL_DISP = 0x01;
        /// Do not use the x86 address-size prefix to shorten the address.
        const NO_SHORT_ADDR = 0x02;
        /// The address is 16-bit (x86 `addr16` forms).
        const DISP_IS_ADDR16 = 0x04;
    }
}

impl MemHints {
    /// No hints.
    pub const NONE: MemHints = MemHints::empty();
}

// ── Shifts ───────────────────────────────────────────────────────────────

/// Shift or extend applied to a register (ARM, AArch64).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Shift {
    /// No shift.
    #[default]
    None,
    /// Logical shift left.
    Lsl,
    /// Logical shift right.
    Lsr,
    /// Arithmetic shift right.
    Asr,
    /// Rotate right.
    Ror,
    /// Rotate right by one through carry.
    Rrx,
    /// Zero-extend byte.
    Uxtb,
    /// Zero-extend halfword.
    Uxth,
    /// Zero-extend word.
    Uxtw,
    /// Zero-extend doubleword.
    Uxtx,
    /// Sign-extend byte.
    Sxtb,
    /// Sign-extend halfword.
    Sxth,
    /// Sign-extend word.
    Sxtw,
    /// Sign-extend doubleword.
    Sxtx,
}

impl Shift {
    const ALL: [Shift; 14] = [
        Shift::None,
        Shift::Lsl,
        Shift::Lsr,
        Shift::Asr,
        Shift::Ror,
        Shift::Rrx,
        Shift::Uxtb,
        Shift::Uxth,
        Shift::Uxtw,
        Shift::Uxtx,
        Shift::Sxtb,
        Shift::Sxth,
        Shift::Sxtw,
        Shift::Sxtx,
    ];

    /// Value stored in an [`OpndFlags::IS_SHIFT`] immediate.
    pub const fn as_imm(self) -> i64 {
        self as i64
    }

    /// Inverse of [`Shift::as_imm`].
    pub fn from_imm(value: i64) -> Option<Shift> {
        usize::try_from(value)
            .ok()
            .and_then(|i| Shift::ALL.get(i).copied())
    }

    /// Whether this is one of the extend kinds.
    pub const fn is_extend(self) -> bool {
        matches!(
            self,
            Shift::Uxtb
                | Shift::Uxth
                | Shift::Uxtw
                | Shift::Uxtx
                | Shift::Sxtb
                | Shift::Sxth
                | Shift::Sxtw
                | Shift::Sxtx
        )
    }

    fn mnemonic(self) -> &'static str {
        match self {
            Shift::None => "",
            Shift::Lsl => "lsl",
            Shift::Lsr => "lsr",
            Shift::Asr => "asr",
            Shift::Ror => "ror",
            Shift::Rrx => "rrx",
            Shift::Uxtb => "uxtb",
            Shift::Uxth => "uxth",
            Shift::Uxtw => "uxtw",
            Shift::Uxtx => "uxtx",
            Shift::Sxtb => "sxtb",
            Shift::Sxth => "sxth",
            Shift::Sxtw => "sxtw",
            Shift::Sxtx => "sxtx",
        }
    }
}

/// Shift or extend applied to a memory operand's index register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IndexShift {
    /// Shift / extend kind.
    pub kind: Shift,
    /// Shift amount.
    pub amount: u8,
}

impl IndexShift {
    /// No shift.
    pub const NONE: IndexShift = IndexShift {
        kind: Shift::None,
        amount: 0,
    };

    /// `kind #amount`.
    pub const fn new(kind: Shift, amount: u8) -> Self {
        IndexShift { kind, amount }
    }
}

// ── Memory references ────────────────────────────────────────────────────

/// Base + index + displacement memory reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MemRef {
    /// Base register, or [`Reg::NULL`].
    pub base: Reg,
    /// Index register, or [`Reg::NULL`].
    pub index: Reg,
    /// x86 index scale (1, 2, 4, 8; 0 when there is no index).
    pub scale: u8,
    /// ARM / AArch64 index shift or extend.
    pub shift: IndexShift,
    /// Signed displacement.
    pub disp: i32,
    /// Segment override, or [`Reg::NULL`].
    pub segment: Reg,
    /// Access size.
    pub size: OpSize,
    /// [`OpndFlags::NEGATED`] marks a subtracted index.
    pub flags: OpndFlags,
    /// Encoder hints.
    pub hints: MemHints,
}

/// Identifier of a not-yet-placed instruction, resolved at encode time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InstrId(pub u32);

// ── Operand ──────────────────────────────────────────────────────────────

/// One instruction operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Operand {
    /// No operand.
    #[default]
    Null,
    /// Register, optionally a sub-width view of it.
    Reg {
        /// Register id.
        reg: Reg,
        /// Access width; [`OpSize::None`] means the register's natural width.
        size: OpSize,
        /// Modifiers.
        flags: OpndFlags,
    },
    /// Integer immediate.
    ImmInt {
        /// Value (sign-extended when `signed`).
        value: i64,
        /// Field width.
        size: OpSize,
        /// Whether the field is signed.
        signed: bool,
        /// Modifiers ([`OpndFlags::IS_SHIFT`], [`OpndFlags::NEGATED`]).
        flags: OpndFlags,
    },
    /// Floating point immediate, bit-exact.
    ImmFloat {
        /// IEEE-754 bits, zero-extended.
        bits: u64,
        /// [`OpSize::B4`] or [`OpSize::B8`].
        size: OpSize,
    },
    /// Absolute code address.
    Pc {
        /// Target address.
        target: u64,
        /// Far selector.
        selector: Option<u16>,
    },
    /// Reference to another instruction whose address is not yet known.
    InstrRef {
        /// Target instruction.
        id: InstrId,
        /// Far selector.
        selector: Option<u16>,
    },
    /// Base + index + displacement memory reference.
    BaseDisp(MemRef),
    /// Absolute memory address.
    AbsAddr {
        /// Address.
        addr: u64,
        /// Segment override.
        segment: Reg,
        /// Access size.
        size: OpSize,
    },
    /// Pc-relative memory address (x86-64 rip-relative, ARM/A64 literals).
    RelAddr {
        /// Absolute address the relative form names.
        addr: u64,
        /// Segment override.
        segment: Reg,
        /// Access size.
        size: OpSize,
    },
}

impl Operand {
    // ── Constructors ─────────────────────────────────────────────────────

    /// Register at its natural width.
    pub const fn reg(reg: Reg) -> Operand {
        Operand::Reg {
            reg,
            size: OpSize::None,
            flags: OpndFlags::NONE,
        }
    }

    /// Register with an explicit width and modifiers.
    pub const fn reg_ex(reg: Reg, size: OpSize, flags: OpndFlags) -> Operand {
        Operand::Reg { reg, size, flags }
    }

    /// Signed integer immediate.
    pub const fn imm_int(value: i64, size: OpSize) -> Operand {
        Operand::ImmInt {
            value,
            size,
            signed: true,
            flags: OpndFlags::NONE,
        }
    }

    /// Unsigned integer immediate.
    pub const fn imm_uint(value: u64, size: OpSize) -> Operand {
        Operand::ImmInt {
            value: value as i64,
            size,
            signed: false,
            flags: OpndFlags::NONE,
        }
    }

    /// Immediate naming a shift kind.
    pub const fn shift_kind(kind: Shift) -> Operand {
        Operand::ImmInt {
            value: kind.as_imm(),
            size: OpSize::Bits(2),
            signed: false,
            flags: OpndFlags::IS_SHIFT,
        }
    }

    /// Single-precision immediate.
    pub fn imm_f32(value: f32) -> Operand {
        Operand::ImmFloat {
            bits: value.to_bits() as u64,
            size: OpSize::B4,
        }
    }

    /// Double-precision immediate.
    pub fn imm_f64(value: f64) -> Operand {
        Operand::ImmFloat {
            bits: value.to_bits(),
            size: OpSize::B8,
        }
    }

    /// Absolute code address.
    pub const fn pc(target: u64) -> Operand {
        Operand::Pc {
            target,
            selector: None,
        }
    }

    /// Far code address.
    pub const fn far_pc(selector: u16, target: u64) -> Operand {
        Operand::Pc {
            target,
            selector: Some(selector),
        }
    }

    /// Reference to a not yet placed instruction.
    pub const fn instr_ref(id: InstrId) -> Operand {
        Operand::InstrRef { id, selector: None }
    }

    /// Far reference to a not yet placed instruction.
    pub const fn far_instr_ref(selector: u16, id: InstrId) -> Operand {
        Operand::InstrRef {
            id,
            selector: Some(selector),
        }
    }

    /// `[base + index*scale + disp]`.
    pub const fn base_disp(base: Reg, index: Reg, scale: u8, disp: i32, size: OpSize) -> Operand {
        Operand::BaseDisp(MemRef {
            base,
            index,
            scale,
            shift: IndexShift::NONE,
            disp,
            segment: Reg::NULL,
            size,
            flags: OpndFlags::NONE,
            hints: MemHints::NONE,
        })
    }

    /// [`Operand::base_disp`] with segment and encoder hints.
    #[allow(clippy::too_many_arguments)]
    pub const fn base_disp_ex(
        segment: Reg,
        base: Reg,
        index: Reg,
        scale: u8,
        disp: i32,
        size: OpSize,
        hints: MemHints,
    ) -> Operand {
        Operand::BaseDisp(MemRef {
            base,
            index,
            scale,
            shift: IndexShift::NONE,
            disp,
            segment,
            size,
            flags: OpndFlags::NONE,
            hints,
        })
    }

    /// ARM-style `[base, ±index, shift #amount]` plus displacement.
    pub const fn base_disp_shift(
        base: Reg,
        index: Reg,
        negated: bool,
        shift: IndexShift,
        disp: i32,
        size: OpSize,
    ) -> Operand {
        Operand::BaseDisp(MemRef {
            base,
            index,
            scale: 0,
            shift,
            disp,
            segment: Reg::NULL,
            size,
            flags: if negated {
                OpndFlags::NEGATED
            } else {
                OpndFlags::NONE
            },
            hints: MemHints::NONE,
        })
    }

    /// `seg:[base + index*scale + disp]`.
    pub const fn far_base_disp(
        segment: Reg,
        base: Reg,
        index: Reg,
        scale: u8,
        disp: i32,
        size: OpSize,
    ) -> Operand {
        Operand::base_disp_ex(segment, base, index, scale, disp, size, MemHints::NONE)
    }

    /// Absolute address.
    pub const fn abs_addr(addr: u64, size: OpSize) -> Operand {
        Operand::AbsAddr {
            addr,
            segment: Reg::NULL,
            size,
        }
    }

    /// Absolute address with a segment override.
    pub const fn far_abs_addr(segment: Reg, addr: u64, size: OpSize) -> Operand {
        Operand::AbsAddr {
            addr,
            segment,
            size,
        }
    }

    /// Pc-relative address.
    pub const fn rel_addr(addr: u64, size: OpSize) -> Operand {
        Operand::RelAddr {
            addr,
            segment: Reg::NULL,
            size,
        }
    }

    // ── Predicates ───────────────────────────────────────────────────────

    /// [`Operand::Null`].
    pub const fn is_null(&self) -> bool {
        matches!(self, Operand::Null)
    }

    /// Register operand.
    pub const fn is_reg(&self) -> bool {
        matches!(self, Operand::Reg { .. })
    }

    /// Integer or float immediate.
    pub const fn is_imm(&self) -> bool {
        matches!(self, Operand::ImmInt { .. } | Operand::ImmFloat { .. })
    }

    /// Integer immediate.
    pub const fn is_imm_int(&self) -> bool {
        matches!(self, Operand::ImmInt { .. })
    }

    /// Float immediate.
    pub const fn is_imm_float(&self) -> bool {
        matches!(self, Operand::ImmFloat { .. })
    }

    /// Absolute code address.
    pub const fn is_pc(&self) -> bool {
        matches!(self, Operand::Pc { .. })
    }

    /// Far code address.
    pub const fn is_far_pc(&self) -> bool {
        matches!(
            self,
            Operand::Pc {
                selector: Some(_),
                ..
            }
        )
    }

    /// Instruction reference.
    pub const fn is_instr_ref(&self) -> bool {
        matches!(self, Operand::InstrRef { .. })
    }

    /// Code address of either form.
    pub const fn is_code_addr(&self) -> bool {
        self.is_pc() || self.is_instr_ref()
    }

    /// Memory reference of any shape.
    pub const fn is_mem(&self) -> bool {
        matches!(
            self,
            Operand::BaseDisp(_) | Operand::AbsAddr { .. } | Operand::RelAddr { .. }
        )
    }

    /// Base + displacement memory reference.
    pub const fn is_base_disp(&self) -> bool {
        matches!(self, Operand::BaseDisp(_))
    }

    /// Absolute memory address.
    pub const fn is_abs_addr(&self) -> bool {
        matches!(self, Operand::AbsAddr { .. })
    }

    /// Pc-relative memory address.
    pub const fn is_rel_addr(&self) -> bool {
        matches!(self, Operand::RelAddr { .. })
    }

    /// Far code address, far instruction reference, or segment-overridden memory.
    pub fn is_far(&self) -> bool {
        match self {
            Operand::Pc { selector, .. } | Operand::InstrRef { selector, .. } => {
                selector.is_some()
            }
            _ => false,
        }
    }

    // ── Accessors ────────────────────────────────────────────────────────

    /// Register id.
    ///
    /// # Panics
    ///
    /// Panics if the operand is not a register.
    pub fn reg_id(&self) -> Reg {
        match self {
            Operand::Reg { reg, .. } => *reg,
            other => panic!("reg_id on non-register operand {:?}", other),
        }
    }

    /// Integer immediate value.
    ///
    /// # Panics
    ///
    /// Panics if the operand is not an integer immediate.
    pub fn imm_value(&self) -> i64 {
        match self {
            Operand::ImmInt { value, .. } => *value,
            other => panic!("imm_value on non-immediate operand {:?}", other),
        }
    }

    /// Float immediate bits.
    ///
    /// # Panics
    ///
    /// Panics if the operand is not a float immediate.
    pub fn imm_float_bits(&self) -> u64 {
        match self {
            Operand::ImmFloat { bits, .. } => *bits,
            other => panic!("imm_float_bits on non-float operand {:?}", other),
        }
    }

    /// Code address target.
    ///
    /// # Panics
    ///
    /// Panics if the operand is not a [`Operand::Pc`].
    pub fn pc_target(&self) -> u64 {
        match self {
            Operand::Pc { target, .. } => *target,
            other => panic!("pc_target on non-pc operand {:?}", other),
        }
    }

    /// Referenced instruction.
    ///
    /// # Panics
    ///
    /// Panics if the operand is not an [`Operand::InstrRef`].
    pub fn instr_id(&self) -> InstrId {
        match self {
            Operand::InstrRef { id, .. } => *id,
            other => panic!("instr_id on non-reference operand {:?}", other),
        }
    }

    /// Memory reference fields.
    ///
    /// # Panics
    ///
    /// Panics if the operand is not [`Operand::BaseDisp`].
    pub fn mem(&self) -> &MemRef {
        match self {
            Operand::BaseDisp(m) => m,
            other => panic!("mem on non-base-disp operand {:?}", other),
        }
    }

    /// Base register of a base-disp operand.
    pub fn base(&self) -> Reg {
        self.mem().base
    }

    /// Index register of a base-disp operand.
    pub fn index(&self) -> Reg {
        self.mem().index
    }

    /// Index scale of a base-disp operand.
    pub fn scale(&self) -> u8 {
        self.mem().scale
    }

    /// Displacement of a base-disp operand.
    pub fn disp(&self) -> i32 {
        self.mem().disp
    }

    /// Index shift of a base-disp operand.
    pub fn index_shift(&self) -> IndexShift {
        self.mem().shift
    }

    /// Segment of a memory operand.
    ///
    /// # Panics
    ///
    /// Panics if the operand is not a memory reference.
    pub fn segment(&self) -> Reg {
        match self {
            Operand::BaseDisp(m) => m.segment,
            Operand::AbsAddr { segment, .. } | Operand::RelAddr { segment, .. } => *segment,
            other => panic!("segment on non-memory operand {:?}", other),
        }
    }

    /// Absolute address named by an [`Operand::AbsAddr`] or [`Operand::RelAddr`].
    ///
    /// # Panics
    ///
    /// Panics on any other kind.
    pub fn addr(&self) -> u64 {
        match self {
            Operand::AbsAddr { addr, .. } | Operand::RelAddr { addr, .. } => *addr,
            other => panic!("addr on operand without an address {:?}", other),
        }
    }

    /// Modifier flags (empty for kinds without flags).
    pub fn flags(&self) -> OpndFlags {
        match self {
            Operand::Reg { flags, .. } | Operand::ImmInt { flags, .. } => *flags,
            Operand::BaseDisp(m) => m.flags,
            _ => OpndFlags::NONE,
        }
    }

    /// Add modifier flags; ignored on kinds without flags.
    pub fn add_flags(&mut self, extra: OpndFlags) {
        match self {
            Operand::Reg { flags, .. } | Operand::ImmInt { flags, .. } => *flags |= extra,
            Operand::BaseDisp(m) => m.flags |= extra,
            _ => {}
        }
    }

    /// Size tag; registers without an explicit width report their natural one.
    pub fn size(&self) -> OpSize {
        match self {
            Operand::Null | Operand::Pc { .. } | Operand::InstrRef { .. } => OpSize::None,
            Operand::Reg { reg, size, .. } => {
                if *size == OpSize::None {
                    reg.size()
                } else {
                    *size
                }
            }
            Operand::ImmInt { size, .. } | Operand::ImmFloat { size, .. } => *size,
            Operand::BaseDisp(m) => m.size,
            Operand::AbsAddr { size, .. } | Operand::RelAddr { size, .. } => *size,
        }
    }

    /// Replace the size tag; ignored on kinds without one.
    pub fn set_size(&mut self, new: OpSize) {
        match self {
            Operand::Reg { size, .. }
            | Operand::ImmInt { size, .. }
            | Operand::ImmFloat { size, .. }
            | Operand::AbsAddr { size, .. }
            | Operand::RelAddr { size, .. } => *size = new,
            Operand::BaseDisp(m) => m.size = new,
            _ => {}
        }
    }

    /// Concrete size in bytes under `mode`'s defaults.
    pub fn size_in_bytes(&self, mode: IsaMode) -> usize {
        self.size().size_in_bytes(mode)
    }

    // ── Equality ─────────────────────────────────────────────────────────

    /// Full equality, size included.
    pub fn same(&self, other: &Operand) -> bool {
        self == other
    }

    /// Equality ignoring size tags.
    pub fn same_ignoring_size(&self, other: &Operand) -> bool {
        let mut a = *self;
        let mut b = *other;
        a.set_size(OpSize::None);
        b.set_size(OpSize::None);
        a == b
    }

    /// Whether two memory operands name the same address expression.
    pub fn same_address(&self, other: &Operand) -> bool {
        match (self, other) {
            (Operand::BaseDisp(a), Operand::BaseDisp(b)) => {
                a.base == b.base
                    && a.index == b.index
                    && a.scale == b.scale
                    && a.shift == b.shift
                    && a.disp == b.disp
                    && a.segment == b.segment
                    && a.flags.contains(OpndFlags::NEGATED) == b.flags.contains(OpndFlags::NEGATED)
            }
            (
                Operand::AbsAddr {
                    addr: a,
                    segment: sa,
                    ..
                },
                Operand::AbsAddr {
                    addr: b,
                    segment: sb,
                    ..
                },
            )
            | (
                Operand::RelAddr {
                    addr: a,
                    segment: sa,
                    ..
                },
                Operand::RelAddr {
                    addr: b,
                    segment: sb,
                    ..
                },
            ) => a == b && sa == sb,
            _ => false,
        }
    }

    // ── Registers used ───────────────────────────────────────────────────

    fn reg_slots(&self) -> ([Reg; 3], usize) {
        let mut out = [Reg::NULL; 3];
        let mut n = 0;
        let mut add = |r: Reg| {
            if !r.is_null() && !out[..n].contains(&r) {
                out[n] = r;
                n += 1;
            }
        };
        match self {
            Operand::Reg { reg, .. } => add(*reg),
            Operand::BaseDisp(m) => {
                add(m.base);
                add(m.index);
                add(m.segment);
            }
            Operand::AbsAddr { segment, .. } | Operand::RelAddr { segment, .. } => add(*segment),
            _ => {}
        }
        (out, n)
    }

    /// Number of distinct registers the operand touches.
    pub fn num_regs_used(&self) -> usize {
        self.reg_slots().1
    }

    /// The `i`th register touched.
    ///
    /// # Panics
    ///
    /// Panics if `i >= num_regs_used()`.
    pub fn reg_used(&self, i: usize) -> Reg {
        let (regs, n) = self.reg_slots();
        assert!(i < n, "reg_used({}) with only {} registers", i, n);
        regs[i]
    }

    /// Registers touched, in base / index / segment order.
    pub fn regs_used(&self) -> impl Iterator<Item = Reg> {
        let (regs, n) = self.reg_slots();
        regs.into_iter().take(n)
    }

    /// Whether any touched register overlaps `reg`.
    pub fn uses_reg(&self, reg: Reg) -> bool {
        self.regs_used().any(|r| r.overlaps(reg))
    }

    /// Replace every exact occurrence of `old` with `new`; returns whether
    /// anything changed.
    pub fn replace_reg(&mut self, old: Reg, new: Reg) -> bool {
        let mut changed = false;
        let mut swap = |r: &mut Reg| {
            if *r == old {
                *r = new;
                changed = true;
            }
        };
        match self {
            Operand::Reg { reg, .. } => swap(reg),
            Operand::BaseDisp(m) => {
                swap(&mut m.base);
                swap(&mut m.index);
                swap(&mut m.segment);
            }
            Operand::AbsAddr { segment, .. } | Operand::RelAddr { segment, .. } => swap(segment),
            _ => {}
        }
        changed
    }
}

fn write_hex(f: &mut fmt::Formatter<'_>, value: i64) -> fmt::Result {
    if value < 0 {
        write!(f, "-0x{:x}", value.unsigned_abs())
    } else {
        write!(f, "0x{:x}", value)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Null => write!(f, "<null>"),
            Operand::Reg { reg, flags, .. } => {
                if flags.contains(OpndFlags::NEGATED) {
                    write!(f, "-")?;
                }
                write!(f, "{}", reg)
            }
            Operand::ImmInt { value, flags, .. } if flags.contains(OpndFlags::IS_SHIFT) => {
                match Shift::from_imm(*value) {
                    Some(kind) if kind != Shift::None => f.write_str(kind.mnemonic()),
                    _ => write!(f, "noshift"),
                }
            }
            Operand::ImmInt { value, .. } => {
                write!(f, "#")?;
                write_hex(f, *value)
            }
            Operand::ImmFloat { bits, size } => {
                if *size == OpSize::B4 {
                    write!(f, "#{}", f32::from_bits(*bits as u32))
                } else {
                    write!(f, "#{}", f64::from_bits(*bits))
                }
            }
            Operand::Pc { target, selector } => match selector {
                Some(sel) => write!(f, "0x{:x}:0x{:x}", sel, target),
                None => write!(f, "0x{:x}", target),
            },
            Operand::InstrRef { id, selector } => match selector {
                Some(sel) => write!(f, "0x{:x}:@{}", sel, id.0),
                None => write!(f, "@{}", id.0),
            },
            Operand::BaseDisp(m) => {
                if !m.segment.is_null() {
                    write!(f, "{}:", m.segment)?;
                }
                write!(f, "[")?;
                let mut first = true;
                if !m.base.is_null() {
                    write!(f, "{}", m.base)?;
                    first = false;
                }
                if !m.index.is_null() {
                    if !first {
                        write!(f, "{}", if m.flags.contains(OpndFlags::NEGATED) { "-" } else { "+" })?;
                    }
                    write!(f, "{}", m.index)?;
                    if m.scale > 1 {
                        write!(f, "*{}", m.scale)?;
                    }
                    if m.shift.kind != Shift::None {
                        write!(f, " {} #{}", m.shift.kind.mnemonic(), m.shift.amount)?;
                    }
                    first = false;
                }
                if m.disp != 0 || first {
                    if !first && m.disp >= 0 {
                        write!(f, "+")?;
                    }
                    write_hex(f, m.disp as i64)?;
                }
                write!(f, "]")
            }
            Operand::AbsAddr { addr, segment, .. } => {
                if !segment.is_null() {
                    write!(f, "{}:", segment)?;
                }
                write!(f, "[0x{:x}]", addr)
            }
            Operand::RelAddr { addr, .. } => write!(f, "<rel> [0x{:x}]", addr),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reg::{arm, x86};
    use alloc::format;
    use alloc::vec::Vec;

    #[test]
    fn size_is_independent_of_kind() {
        let full = Operand::reg(x86::RAX);
        let low = Operand::reg_ex(x86::RAX, OpSize::B2, OpndFlags::NONE);
        assert_eq!(full.size(), OpSize::B8);
        assert_eq!(low.size(), OpSize::B2);
        assert!(!full.same(&low));
        assert!(full.same_ignoring_size(&low));
    }

    #[test]
    fn memory_registers_enumerated() {
        let m = Operand::far_base_disp(x86::FS, x86::RBX, x86::RCX, 4, 8, OpSize::B4);
        let regs: Vec<_> = m.regs_used().collect();
        assert_eq!(regs, [x86::RBX, x86::RCX, x86::FS]);
        assert_eq!(m.num_regs_used(), 3);
        assert_eq!(m.reg_used(1), x86::RCX);
        assert!(m.uses_reg(x86::ECX));
        assert!(!m.uses_reg(x86::RDX));
    }

    #[test]
    fn duplicate_registers_counted_once() {
        let m = Operand::base_disp(x86::RAX, x86::RAX, 2, 0, OpSize::B8);
        assert_eq!(m.num_regs_used(), 1);
    }

    #[test]
    fn replace_register() {
        let mut m = Operand::base_disp(arm::R1, arm::R2, 0, 4, OpSize::B4);
        assert!(m.replace_reg(arm::R2, arm::R7));
        assert_eq!(m.index(), arm::R7);
        assert!(!m.replace_reg(arm::R9, arm::R0));
    }

    #[test]
    fn same_address_ignores_size() {
        let a = Operand::base_disp(x86::RSP, Reg::NULL, 0, 16, OpSize::B4);
        let b = Operand::base_disp(x86::RSP, Reg::NULL, 0, 16, OpSize::B8);
        assert!(a.same_address(&b));
        assert!(!a.same_address(&Operand::reg(x86::RSP)));
    }

    #[test]
    #[should_panic(expected = "reg_id on non-register")]
    fn wrong_kind_accessor_panics() {
        let _ = Operand::imm_int(1, OpSize::B1).reg_id();
    }

    #[test]
    fn shift_immediates_roundtrip() {
        for kind in [Shift::Lsl, Shift::Ror, Shift::Sxtw] {
            let op = Operand::shift_kind(kind);
            assert!(op.flags().contains(OpndFlags::IS_SHIFT));
            assert_eq!(Shift::from_imm(op.imm_value()), Some(kind));
        }
        assert_eq!(Shift::from_imm(-1), None);
    }

    #[test]
    fn display_forms() {
        assert_eq!(format!("{}", Operand::imm_int(-4, OpSize::B1)), "#-0x4");
        assert_eq!(
            format!("{}", Operand::base_disp(x86::RBP, x86::RSI, 8, -8, OpSize::B8)),
            "[rbp+rsi*8-0x8]"
        );
        assert_eq!(format!("{}", Operand::pc(0x1000)), "0x1000");
        assert_eq!(format!("{}", Operand::shift_kind(Shift::Asr)), "asr");
    }

    #[test]
    fn float_immediates_are_bit_exact() {
        let a = Operand::imm_f64(1.5);
        assert_eq!(a.imm_float_bits(), 1.5f64.to_bits());
        assert_eq!(a, Operand::imm_f64(1.5));
        assert_eq!(Operand::imm_f32(2.0).size(), OpSize::B4);
    }
}
