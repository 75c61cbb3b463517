//! x86 and x86-64 opcodes and decode tables.
//!
//! The root is indexed by the primary opcode byte. Extension kinds refine by
//! the two-byte escape, by ModRM fields, by the mandatory SSE prefix, by the
//! processor mode and by `REX.W`.
//!
//! An entry's `bits` is not an instruction word but a packed description of
//! the encoding:
//!
//! ```text
//!   23..16  15      14..12  11     10..9     8    7..0
//!   modrm   fixed   digit   /digit mandatory 0F   opcode byte
//!                                  prefix
//! ```
//!
//! The ModRM field is exact when the fixed bit is set (`lfence`, `fninit`);
//! x87 register forms keep a template there with `rm` zero.
//!
//! Mandatory prefixes are numbered 1 = `66`, 2 = `F3`, 3 = `F2`. Entries
//! whose register lives in the opcode byte (`50+r`, `b8+r`, ...) and
//! condition-code entries carry the low bits of the opcode byte as zero.

use crate::instr::{Eflags, Opcode};
use crate::size::OpSize;
use crate::table::{opcode_enum, span_table, Entry, EntryRef, Flags, Layout, Link, OpInfo, Slot};

opcode_enum! {
    /// x86 opcode.
    pub enum X86Op {
        Add => "add",
        Or => "or",
        Adc => "adc",
        Sbb => "sbb",
        And => "and",
        Sub => "sub",
        Xor => "xor",
        Cmp => "cmp",
        Inc => "inc",
        Dec => "dec",
        Push => "push",
        Pop => "pop",
        Movsxd => "movsxd",
        Imul => "imul",
        Jcc => "j",
        JccShort => "j.short",
        Test => "test",
        Xchg => "xchg",
        Mov => "mov",
        Lea => "lea",
        Nop => "nop",
        Pause => "pause",
        Cwde => "cwde",
        Cdq => "cdq",
        CallFar => "call.far",
        Fwait => "fwait",
        Pushf => "pushf",
        Popf => "popf",
        Sahf => "sahf",
        Lahf => "lahf",
        Movs => "movs",
        Cmps => "cmps",
        Stos => "stos",
        Lods => "lods",
        Scas => "scas",
        Rol => "rol",
        Ror => "ror",
        Rcl => "rcl",
        Rcr => "rcr",
        Shl => "shl",
        Shr => "shr",
        Sar => "sar",
        Ret => "ret",
        RetFar => "ret.far",
        Enter => "enter",
        Leave => "leave",
        Int3 => "int3",
        Int => "int",
        Into => "into",
        Iret => "iret",
        Loopne => "loopne",
        Loope => "loope",
        Loop => "loop",
        Jecxz => "jecxz",
        In => "in",
        Out => "out",
        Call => "call",
        Jmp => "jmp",
        JmpFar => "jmp.far",
        JmpShort => "jmp.short",
        Hlt => "hlt",
        Cmc => "cmc",
        Not => "not",
        Neg => "neg",
        Mul => "mul",
        Div => "div",
        Idiv => "idiv",
        Clc => "clc",
        Stc => "stc",
        Cli => "cli",
        Sti => "sti",
        Cld => "cld",
        Std => "std",
        CallInd => "call.ind",
        CallFarInd => "call.far.ind",
        JmpInd => "jmp.ind",
        JmpFarInd => "jmp.far.ind",
        Syscall => "syscall",
        Sysenter => "sysenter",
        Ud2 => "ud2",
        Cpuid => "cpuid",
        Rdtsc => "rdtsc",
        Setcc => "set",
        Cmovcc => "cmov",
        Movzx => "movzx",
        Movsx => "movsx",
        Bt => "bt",
        Bts => "bts",
        Btr => "btr",
        Btc => "btc",
        Bsf => "bsf",
        Bsr => "bsr",
        Xadd => "xadd",
        Cmpxchg => "cmpxchg",
        Bswap => "bswap",
        Prefetchnta => "prefetchnta",
        Prefetcht0 => "prefetcht0",
        Prefetcht1 => "prefetcht1",
        Prefetcht2 => "prefetcht2",
        Lfence => "lfence",
        Mfence => "mfence",
        Sfence => "sfence",
        Movups => "movups",
        Movupd => "movupd",
        Movaps => "movaps",
        Movapd => "movapd",
        Movss => "movss",
        Movsd => "movsd",
        Addss => "addss",
        Addsd => "addsd",
        Subss => "subss",
        Subsd => "subsd",
        Mulss => "mulss",
        Mulsd => "mulsd",
        Divss => "divss",
        Divsd => "divsd",
        Sqrtss => "sqrtss",
        Sqrtsd => "sqrtsd",
        Xorps => "xorps",
        Xorpd => "xorpd",
        Cvtsi2ss => "cvtsi2ss",
        Cvtsi2sd => "cvtsi2sd",
        Cvttss2si => "cvttss2si",
        Cvttsd2si => "cvttsd2si",
        Cvtss2sd => "cvtss2sd",
        Cvtsd2ss => "cvtsd2ss",
        Ucomiss => "ucomiss",
        Ucomisd => "ucomisd",
        Ldmxcsr => "ldmxcsr",
        Stmxcsr => "stmxcsr",
        Fxsave => "fxsave",
        Fxrstor => "fxrstor",
        Fld => "fld",
        Fst => "fst",
        Fstp => "fstp",
        Fild => "fild",
        Fistp => "fistp",
        Fadd => "fadd",
        Fsub => "fsub",
        Fmul => "fmul",
        Fdiv => "fdiv",
        Fldcw => "fldcw",
        Fnstcw => "fnstcw",
        Fnstsw => "fnstsw",
        Fninit => "fninit",
    }
}

// ── Layout ───────────────────────────────────────────────────────────────

/// The x86 table forest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct X86Layout;

/// x86 table kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum X86Ext {
    /// Primary opcode byte.
    Top,
    /// Second byte after `0f`.
    Escape0F,
    /// ModRM.reg.
    ModrmReg,
    /// Row 0 for a memory operand, row 1 for ModRM.mod == 3.
    ModrmMod,
    /// Mandatory prefix: none, `66`, `F3`, `F2`.
    Prefix,
    /// Row 0 in 32-bit mode, row 1 in 64-bit mode.
    Mode,
    /// `REX.W` clear or set.
    Rexw,
    /// x87 escape: ModRM.reg, plus 8 for register forms.
    X87,
}

/// x86 operand types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum X86Ty {
    None,
    /// General register or memory from ModRM.rm.
    E,
    /// Memory from ModRM.rm; a register form is invalid.
    M,
    /// General register from ModRM.reg.
    G,
    /// XMM register from ModRM.reg.
    V,
    /// XMM register or memory from ModRM.rm.
    W,
    /// `st(rm)`.
    Sti,
    /// `st(0)`.
    St0,
    /// General register in the opcode's low three bits, extended by `REX.B`.
    Z,
    /// Sign-extended immediate.
    Imm,
    /// Zero-extended immediate.
    UImm,
    /// Shift count byte.
    Count,
    /// The constant shift count 1.
    One,
    /// Relative branch target.
    J,
    /// Far pointer `ptr16:32`.
    A,
    /// Absolute memory offset (`moffs`), address-sized.
    O,
    /// `al`/`ax`/`eax`/`rax` at the slot size.
    RegA,
    /// Accumulator at half the slot size.
    RegAHalf,
    /// Counter register, slot size.
    RegC,
    /// `edx` family, slot size.
    RegD,
    /// `ah`.
    Ah,
    /// `cl`.
    Cl,
    /// `dx` as a port number.
    Dx,
    /// Stack pointer.
    Sp,
    /// Frame pointer.
    Bp,
    /// String source index.
    RegSi,
    /// String destination index.
    RegDi,
    /// The slot pushed: `[sp - size]`.
    StackPush,
    /// The slot popped: `[sp]`.
    StackPop,
    /// `[bp]`.
    MemBp,
    /// String source `[seg:si]`.
    MemSi,
    /// String destination `es:[di]`.
    MemDi,
}

impl Layout for X86Layout {
    type Ext = X86Ext;
    type Ty = X86Ty;

    const NONE: X86Ty = X86Ty::None;
    const MAX_HOPS: usize = 3;
    const NAME: &'static str = "x86";

    fn roots() -> &'static [(X86Ext, u16)] {
        &[(X86Ext::Top, 0)]
    }

    fn table(kind: X86Ext, set: u16) -> Option<&'static [Entry<Self>]> {
        let set = set as usize;
        let one = |t: &'static [Entry<Self>]| (set == 0).then_some(t);
        match kind {
            X86Ext::Top => one(&X86_TOP),
            X86Ext::Escape0F => one(&X86_0F),
            X86Ext::ModrmReg => X86_GROUPS.get(set).map(|t| &t[..]),
            X86Ext::ModrmMod => X86_MOD.get(set).map(|t| &t[..]),
            X86Ext::Prefix => X86_PREFIX.get(set).map(|t| &t[..]),
            X86Ext::Mode => X86_MODE.get(set).map(|t| &t[..]),
            X86Ext::Rexw => X86_REXW.get(set).map(|t| &t[..]),
            X86Ext::X87 => X86_X87.get(set).map(|t| &t[..]),
        }
    }

    fn width(kind: X86Ext) -> usize {
        match kind {
            X86Ext::Top | X86Ext::Escape0F => 256,
            X86Ext::ModrmReg => 8,
            X86Ext::ModrmMod | X86Ext::Mode | X86Ext::Rexw => 2,
            X86Ext::Prefix => 4,
            X86Ext::X87 => 16,
        }
    }

    fn extra(index: u16) -> Option<&'static OpInfo<Self>> {
        X86_EXTRAS.get(index as usize)
    }
}

// ── Packed-bits accessors ────────────────────────────────────────────────

/// Opcode byte.
pub(crate) const fn opcode_byte(bits: u32) -> u8 {
    bits as u8
}

/// Whether the opcode lives in the `0f` map.
pub(crate) const fn is_0f(bits: u32) -> bool {
    bits & 0x100 != 0
}

/// Mandatory prefix byte, if any.
pub(crate) const fn mandatory_prefix(bits: u32) -> Option<u8> {
    match (bits >> 9) & 3 {
        1 => Some(0x66),
        2 => Some(0xf3),
        3 => Some(0xf2),
        _ => None,
    }
}

/// ModRM.reg digit of a group member.
pub(crate) const fn digit(bits: u32) -> Option<u8> {
    if bits & 0x800 != 0 {
        Some(((bits >> 12) & 7) as u8)
    } else {
        None
    }
}

/// The exact ModRM byte an entry requires.
pub(crate) const fn fixed_modrm(bits: u32) -> Option<u8> {
    if bits & 0x8000 != 0 {
        Some((bits >> 16) as u8)
    } else {
        None
    }
}

// ── Entry builders ───────────────────────────────────────────────────────

type XEntry = Entry<X86Layout>;
type XInfo = OpInfo<X86Layout>;
type S = Slot<X86Ty>;

const fn s(ty: X86Ty, size: OpSize) -> S {
    Slot { ty, size }
}

const fn is(slot: S, ty: X86Ty) -> bool {
    slot.ty as u8 == ty as u8
}

const NO: S = s(X86Ty::None, OpSize::None);
const B1: OpSize = OpSize::B1;
const B2: OpSize = OpSize::B2;
const B4: OpSize = OpSize::B4;
const B8: OpSize = OpSize::B8;
const VS: OpSize = OpSize::V;
const ZS: OpSize = OpSize::Z;
const PS: OpSize = OpSize::P;

/// A terminal entry under construction.
#[derive(Clone, Copy)]
struct Def(XInfo);

const fn def(op: X86Op, bits: u32) -> Def {
    Def(OpInfo {
        opcode: Opcode::X86(op),
        bits,
        mask: 0,
        name: op.name(),
        dst: [NO, NO],
        src: [NO, NO, NO],
        flags: Flags::NONE,
        eflags: Eflags::NONE,
        next: Link::End,
    })
}

impl Def {
    const fn dst(mut self, ty: X86Ty, size: OpSize) -> Def {
        if is(self.0.dst[0], X86Ty::None) {
            self.0.dst[0] = s(ty, size);
        } else {
            self.0.dst[1] = s(ty, size);
        }
        self
    }

    const fn src(mut self, ty: X86Ty, size: OpSize) -> Def {
        let mut i = 0;
        while i < 2 && !is(self.0.src[i], X86Ty::None) {
            i += 1;
        }
        self.0.src[i] = s(ty, size);
        self
    }

    const fn fl(mut self, flags: Flags) -> Def {
        self.0.flags = self.0.flags.union(flags);
        self
    }

    const fn ef(mut self, eflags: Eflags) -> Def {
        self.0.eflags = self.0.eflags.union(eflags);
        self
    }

    const fn link(mut self, next: Link<X86Layout>) -> Def {
        self.0.next = next;
        self
    }

    /// The finished entry, mask derived from the slots.
    const fn info(self) -> XInfo {
        let mut info = self.0;
        let slots = [info.dst[0], info.dst[1], info.src[0], info.src[1], info.src[2]];
        let mut mask = 0x00ff_ffff;
        let mut i = 0;
        while i < 5 {
            if is(slots[i], X86Ty::Z) {
                mask &= !0x7;
            }
            if is(slots[i], X86Ty::Sti) {
                mask &= !0x7_0000;
            }
            i += 1;
        }
        if info.flags.contains(Flags::PREDICATE_0) {
            mask &= !0xf;
        }
        info.mask = mask;
        info
    }

    const fn e(self) -> XEntry {
        Entry::Op(self.info())
    }
}

const fn at(kind: X86Ext, set: u16, row: usize) -> Link<X86Layout> {
    Link::At(EntryRef {
        kind,
        set,
        row: row as u16,
    })
}

const fn top(row: usize) -> Link<X86Layout> {
    at(X86Ext::Top, 0, row)
}

const fn esc(row: usize) -> Link<X86Layout> {
    at(X86Ext::Escape0F, 0, row)
}

const fn grp(set: u16, row: usize) -> Link<X86Layout> {
    at(X86Ext::ModrmReg, set, row)
}

const fn pfx(set: u16, row: usize) -> Link<X86Layout> {
    at(X86Ext::Prefix, set, row)
}

const fn x87(set: u16, row: usize) -> Link<X86Layout> {
    at(X86Ext::X87, set, row)
}

const fn two(byte: u32) -> u32 {
    0x100 | byte
}

const fn with_pfx(bits: u32, prefix: u32) -> u32 {
    bits | (prefix << 9)
}

const fn slash(bits: u32, digit: u32) -> u32 {
    bits | 0x800 | (digit << 12)
}

const fn fixed(bits: u32, modrm: u32) -> u32 {
    bits | 0x8000 | (modrm << 16)
}

// ModrmReg sets.
const G80: u16 = 0;
const G81: u16 = 1;
const G83: u16 = 2;
const GC0: u16 = 3;
const GC1: u16 = 4;
const GD0: u16 = 5;
const GD1: u16 = 6;
const GD2: u16 = 7;
const GD3: u16 = 8;
const GC6: u16 = 9;
const GC7: u16 = 10;
const GF6: u16 = 11;
const GF7: u16 = 12;
const GFE: u16 = 13;
const GFF: u16 = 14;
const G8F: u16 = 15;
const G0F18: u16 = 16;
const G0FBA: u16 = 17;
const G0FAE_MEM: u16 = 18;
const G0FAE_REG: u16 = 19;

// Prefix sets.
const P90: u16 = 0;
const P0F10: u16 = 1;
const P0F11: u16 = 2;
const P0F28: u16 = 3;
const P0F29: u16 = 4;
const P0F2A: u16 = 5;
const P0F2C: u16 = 6;
const P0F2E: u16 = 7;
const P0F51: u16 = 8;
const P0F57: u16 = 9;
const P0F58: u16 = 10;
const P0F59: u16 = 11;
const P0F5A: u16 = 12;
const P0F5C: u16 = 13;
const P0F5E: u16 = 14;

// Mode sets.
const M_INC: u16 = 0;
const M_DEC: u16 = 1;
const M_63: u16 = 2;
const M_9A: u16 = 3;
const M_CE: u16 = 4;
const M_EA: u16 = 5;

const ARITH: Eflags = Eflags::WRITE_ARITH;
const ARITH_CF: Eflags = Eflags::WRITE_ARITH.union(Eflags::READ_CF);
const INC: Eflags = Eflags::from_bits_retain(0x5e << 16);
const ROTATE: Eflags = Eflags::WRITE_CF.union(Eflags::WRITE_OF);
const ROTATE_CF: Eflags = ROTATE.union(Eflags::READ_CF);
const STRING: Eflags = Eflags::READ_DF;
const STRING_CMP: Eflags = Eflags::READ_DF.union(Eflags::WRITE_ARITH);
const SAHF: Eflags = Eflags::from_bits_retain(0x1f << 16);
const LAHF: Eflags = Eflags::from_bits_retain(0x1f);
const PUSHF: Eflags = Eflags::from_bits_retain(0x7f);
const POPF: Eflags = Eflags::from_bits_retain(0x7f << 16);
const CMC: Eflags = Eflags::READ_CF.union(Eflags::WRITE_CF);

// ── Arithmetic groups ────────────────────────────────────────────────────

const ALU: [X86Op; 8] = [
    X86Op::Add,
    X86Op::Or,
    X86Op::Adc,
    X86Op::Sbb,
    X86Op::And,
    X86Op::Sub,
    X86Op::Xor,
    X86Op::Cmp,
];

/// Form `form` of arithmetic op `i`: 0-5 are opcodes `8i+form`, 6-8 are
/// `80`, `81` and `83` with digit `i`.
const fn alu(i: usize, form: usize) -> XEntry {
    use X86Ty::*;
    let base = (i * 8) as u32;
    let (bits, x, xs, y, ys) = match form {
        0 => (base, E, B1, G, B1),
        1 => (base + 1, E, VS, G, VS),
        2 => (base + 2, G, B1, E, B1),
        3 => (base + 3, G, VS, E, VS),
        4 => (base + 4, RegA, B1, Imm, B1),
        5 => (base + 5, RegA, VS, Imm, ZS),
        6 => (slash(0x80, i as u32), E, B1, Imm, B1),
        7 => (slash(0x81, i as u32), E, VS, Imm, ZS),
        _ => (slash(0x83, i as u32), E, VS, Imm, B1),
    };
    let row = i * 8;
    let next = match form {
        0 => top(row + 1),
        1 => top(row + 3),
        3 => top(row + 2),
        2 => top(row + 4),
        4 => grp(G83, i),
        8 => top(row + 5),
        5 => grp(G81, i),
        7 => grp(G80, i),
        _ => Link::End,
    };
    let op = ALU[i];
    let d = def(op, bits);
    let d = if matches!(op, X86Op::Cmp) {
        d.src(x, xs).src(y, ys)
    } else {
        d.dst(x, xs).src(y, ys).src(x, xs)
    };
    let ef = if matches!(op, X86Op::Adc | X86Op::Sbb) {
        ARITH_CF
    } else {
        ARITH
    };
    d.ef(ef).link(next).e()
}

const fn alu_group(form: usize) -> [XEntry; 8] {
    let mut t = [Entry::Invalid; 8];
    let mut i = 0;
    while i < 8 {
        t[i] = alu(i, form);
        i += 1;
    }
    t
}

const SHIFT: [Option<(X86Op, Eflags)>; 8] = [
    Some((X86Op::Rol, ROTATE)),
    Some((X86Op::Ror, ROTATE)),
    Some((X86Op::Rcl, ROTATE_CF)),
    Some((X86Op::Rcr, ROTATE_CF)),
    Some((X86Op::Shl, ARITH)),
    Some((X86Op::Shr, ARITH)),
    None,
    Some((X86Op::Sar, ARITH)),
];

/// Shift groups in chain order: `c0`, `d0`, `d2`, `c1`, `d1`, `d3`.
const SHIFT_FORMS: [(u32, u16, OpSize, X86Ty); 6] = [
    (0xc0, GC0, B1, X86Ty::Count),
    (0xd0, GD0, B1, X86Ty::One),
    (0xd2, GD2, B1, X86Ty::Cl),
    (0xc1, GC1, VS, X86Ty::Count),
    (0xd1, GD1, VS, X86Ty::One),
    (0xd3, GD3, VS, X86Ty::Cl),
];

const fn shift_group(form: usize) -> [XEntry; 8] {
    let (byte, _, size, count) = SHIFT_FORMS[form];
    let mut t = [Entry::Invalid; 8];
    let mut d = 0;
    while d < 8 {
        if let Some((op, ef)) = SHIFT[d] {
            let next = if form + 1 < 6 {
                grp(SHIFT_FORMS[form + 1].1, d)
            } else {
                Link::End
            };
            t[d] = def(op, slash(byte, d as u32))
                .dst(X86Ty::E, size)
                .src(count, B1)
                .src(X86Ty::E, size)
                .ef(ef)
                .link(next)
                .e();
        }
        d += 1;
    }
    t
}

/// Group 3 (`f6` when `wide` is false, `f7` otherwise).
const fn group3(wide: bool) -> [XEntry; 8] {
    use X86Ty::*;
    let (byte, size, imm) = if wide { (0xf7, VS, ZS) } else { (0xf6, B1, B1) };
    let mut t = [Entry::Invalid; 8];
    t[0] = def(X86Op::Test, slash(byte, 0))
        .src(E, size)
        .src(Imm, imm)
        .ef(ARITH)
        .link(to_f7(wide, 0))
        .e();
    t[2] = def(X86Op::Not, slash(byte, 2)).dst(E, size).src(E, size).link(to_f7(wide, 2)).e();
    t[3] = def(X86Op::Neg, slash(byte, 3))
        .dst(E, size)
        .src(E, size)
        .ef(ARITH)
        .link(to_f7(wide, 3))
        .e();
    t
}

/// Byte forms of group 3 continue at the same digit of `f7`.
const fn to_f7(wide: bool, digit: usize) -> Link<X86Layout> {
    if wide {
        Link::End
    } else {
        grp(GF7, digit)
    }
}

// ── Primary map ──────────────────────────────────────────────────────────

/// Primary-map row `r`.
const fn top_row(r: usize) -> XEntry {
    use X86Ty::*;
    let b = r as u32;
    match r {
        0x00..=0x3f if r & 7 < 6 => alu(r / 8, r & 7),
        0x0f => Entry::Ext(X86Ext::Escape0F, 0),
        0x40..=0x47 => Entry::Ext(X86Ext::Mode, M_INC),
        0x48..=0x4f => Entry::Ext(X86Ext::Mode, M_DEC),
        0x50..=0x57 => def(X86Op::Push, 0x50)
            .dst(Sp, PS)
            .dst(StackPush, PS)
            .src(Z, PS)
            .src(Sp, PS)
            .link(top(0x6a))
            .e(),
        0x58..=0x5f => def(X86Op::Pop, 0x58)
            .dst(Z, PS)
            .dst(Sp, PS)
            .src(Sp, PS)
            .src(StackPop, PS)
            .link(grp(G8F, 0))
            .e(),
        0x63 => Entry::Ext(X86Ext::Mode, M_63),
        0x68 => def(X86Op::Push, b)
            .dst(Sp, PS)
            .dst(StackPush, PS)
            .src(Imm, ZS)
            .src(Sp, PS)
            .link(grp(GFF, 6))
            .e(),
        0x69 => def(X86Op::Imul, b)
            .dst(G, VS)
            .src(E, VS)
            .src(Imm, ZS)
            .ef(ARITH)
            .link(grp(GF7, 5))
            .e(),
        0x6a => def(X86Op::Push, b)
            .dst(Sp, PS)
            .dst(StackPush, PS)
            .src(Imm, B1)
            .src(Sp, PS)
            .link(top(0x68))
            .e(),
        0x6b => def(X86Op::Imul, b)
            .dst(G, VS)
            .src(E, VS)
            .src(Imm, B1)
            .ef(ARITH)
            .link(top(0x69))
            .e(),
        0x70..=0x7f => def(X86Op::JccShort, 0x70).src(J, B1).fl(Flags::PREDICATE_0).e(),
        0x80 => Entry::Ext(X86Ext::ModrmReg, G80),
        0x81 => Entry::Ext(X86Ext::ModrmReg, G81),
        0x83 => Entry::Ext(X86Ext::ModrmReg, G83),
        0x84 => def(X86Op::Test, b).src(E, B1).src(G, B1).ef(ARITH).link(top(0x85)).e(),
        0x85 => def(X86Op::Test, b).src(E, VS).src(G, VS).ef(ARITH).link(top(0xa8)).e(),
        0x86 => def(X86Op::Xchg, b)
            .dst(E, B1)
            .dst(G, B1)
            .src(E, B1)
            .src(G, B1)
            .link(top(0x91))
            .e(),
        0x87 => def(X86Op::Xchg, b).dst(E, VS).dst(G, VS).src(E, VS).src(G, VS).e(),
        0x88 => def(X86Op::Mov, b).dst(E, B1).src(G, B1).link(top(0x89)).e(),
        0x89 => def(X86Op::Mov, b).dst(E, VS).src(G, VS).link(top(0x8b)).e(),
        0x8a => def(X86Op::Mov, b).dst(G, B1).src(E, B1).link(top(0xb0)).e(),
        0x8b => def(X86Op::Mov, b).dst(G, VS).src(E, VS).link(top(0x8a)).e(),
        0x8d => def(X86Op::Lea, b).dst(G, VS).src(M, OpSize::None).e(),
        0x8f => Entry::Ext(X86Ext::ModrmReg, G8F),
        0x90 => Entry::Ext(X86Ext::Prefix, P90),
        0x91..=0x97 => def(X86Op::Xchg, 0x90)
            .dst(Z, VS)
            .dst(RegA, VS)
            .src(Z, VS)
            .src(RegA, VS)
            .link(top(0x87))
            .e(),
        0x98 => def(X86Op::Cwde, b).dst(RegA, VS).src(RegAHalf, VS).e(),
        0x99 => def(X86Op::Cdq, b).dst(RegD, VS).src(RegA, VS).e(),
        0x9a => Entry::Ext(X86Ext::Mode, M_9A),
        0x9b => def(X86Op::Fwait, b).e(),
        0x9c => def(X86Op::Pushf, b)
            .dst(Sp, PS)
            .dst(StackPush, PS)
            .src(Sp, PS)
            .ef(PUSHF)
            .e(),
        0x9d => def(X86Op::Popf, b)
            .dst(Sp, PS)
            .src(Sp, PS)
            .src(StackPop, PS)
            .ef(POPF)
            .e(),
        0x9e => def(X86Op::Sahf, b).src(Ah, B1).ef(SAHF).e(),
        0x9f => def(X86Op::Lahf, b).dst(Ah, B1).ef(LAHF).e(),
        0xa0 => def(X86Op::Mov, b).dst(RegA, B1).src(O, B1).link(top(0xa1)).e(),
        0xa1 => def(X86Op::Mov, b).dst(RegA, VS).src(O, VS).link(top(0xa2)).e(),
        0xa2 => def(X86Op::Mov, b).dst(O, B1).src(RegA, B1).link(top(0xa3)).e(),
        0xa3 => def(X86Op::Mov, b).dst(O, VS).src(RegA, VS).e(),
        0xa4 | 0xa5 => {
            let size = if r == 0xa4 { B1 } else { VS };
            def(X86Op::Movs, b)
                .dst(MemDi, size)
                .dst(RegSi, PS)
                .src(MemSi, size)
                .src(RegSi, PS)
                .src(RegDi, PS)
                .fl(Flags::EXTRA_OPERANDS)
                .ef(STRING)
                .link(Link::Extra((r - 0xa4) as u16))
                .e()
        }
        0xa6 | 0xa7 => {
            let size = if r == 0xa6 { B1 } else { VS };
            def(X86Op::Cmps, b)
                .dst(RegSi, PS)
                .dst(RegDi, PS)
                .src(MemSi, size)
                .src(MemDi, size)
                .src(RegSi, PS)
                .fl(Flags::EXTRA_OPERANDS)
                .ef(STRING_CMP)
                .link(Link::Extra((r - 0xa6 + 2) as u16))
                .e()
        }
        0xa8 => def(X86Op::Test, b).src(RegA, B1).src(Imm, B1).ef(ARITH).link(top(0xa9)).e(),
        0xa9 => def(X86Op::Test, b)
            .src(RegA, VS)
            .src(Imm, ZS)
            .ef(ARITH)
            .link(grp(GF6, 0))
            .e(),
        0xaa | 0xab => {
            let size = if r == 0xaa { B1 } else { VS };
            def(X86Op::Stos, b)
                .dst(MemDi, size)
                .dst(RegDi, PS)
                .src(RegA, size)
                .src(RegDi, PS)
                .ef(STRING)
                .link(if r == 0xaa { top(0xab) } else { Link::End })
                .e()
        }
        0xac | 0xad => {
            let size = if r == 0xac { B1 } else { VS };
            def(X86Op::Lods, b)
                .dst(RegA, size)
                .dst(RegSi, PS)
                .src(MemSi, size)
                .src(RegSi, PS)
                .ef(STRING)
                .link(if r == 0xac { top(0xad) } else { Link::End })
                .e()
        }
        0xae | 0xaf => {
            let size = if r == 0xae { B1 } else { VS };
            def(X86Op::Scas, b)
                .dst(RegDi, PS)
                .src(RegA, size)
                .src(MemDi, size)
                .src(RegDi, PS)
                .ef(STRING_CMP)
                .link(if r == 0xae { top(0xaf) } else { Link::End })
                .e()
        }
        0xb0..=0xb7 => def(X86Op::Mov, 0xb0).dst(Z, B1).src(Imm, B1).link(top(0xb8)).e(),
        0xb8..=0xbf => def(X86Op::Mov, 0xb8).dst(Z, VS).src(Imm, VS).link(grp(GC7, 0)).e(),
        0xc0 => Entry::Ext(X86Ext::ModrmReg, GC0),
        0xc1 => Entry::Ext(X86Ext::ModrmReg, GC1),
        0xc2 => def(X86Op::Ret, b)
            .dst(Sp, PS)
            .src(UImm, B2)
            .src(Sp, PS)
            .src(StackPop, PS)
            .link(top(0xc3))
            .e(),
        0xc3 => def(X86Op::Ret, b).dst(Sp, PS).src(Sp, PS).src(StackPop, PS).e(),
        0xc6 => Entry::Ext(X86Ext::ModrmReg, GC6),
        0xc7 => Entry::Ext(X86Ext::ModrmReg, GC7),
        0xc8 => def(X86Op::Enter, b)
            .dst(Sp, PS)
            .dst(StackPush, PS)
            .src(UImm, B2)
            .src(UImm, B1)
            .src(Bp, PS)
            .e(),
        0xc9 => def(X86Op::Leave, b)
            .dst(Sp, PS)
            .dst(Bp, PS)
            .src(Bp, PS)
            .src(Sp, PS)
            .src(MemBp, PS)
            .e(),
        0xca => def(X86Op::RetFar, b)
            .dst(Sp, PS)
            .src(UImm, B2)
            .src(Sp, PS)
            .src(StackPop, B8)
            .link(top(0xcb))
            .e(),
        0xcb => def(X86Op::RetFar, b).dst(Sp, PS).src(Sp, PS).src(StackPop, B8).e(),
        0xcc => def(X86Op::Int3, b).e(),
        0xcd => def(X86Op::Int, b).src(UImm, B1).e(),
        0xce => Entry::Ext(X86Ext::Mode, M_CE),
        0xcf => def(X86Op::Iret, b).dst(Sp, PS).src(Sp, PS).src(StackPop, PS).ef(POPF).e(),
        0xd0 => Entry::Ext(X86Ext::ModrmReg, GD0),
        0xd1 => Entry::Ext(X86Ext::ModrmReg, GD1),
        0xd2 => Entry::Ext(X86Ext::ModrmReg, GD2),
        0xd3 => Entry::Ext(X86Ext::ModrmReg, GD3),
        0xd8..=0xdf if r != 0xda && r != 0xde => Entry::Ext(X86Ext::X87, (r - 0xd8) as u16),
        0xe0..=0xe2 => {
            let op = match r {
                0xe0 => X86Op::Loopne,
                0xe1 => X86Op::Loope,
                _ => X86Op::Loop,
            };
            let ef = if r == 0xe2 { Eflags::NONE } else { Eflags::READ_ZF };
            def(op, b).dst(RegC, PS).src(J, B1).src(RegC, PS).ef(ef).e()
        }
        0xe3 => def(X86Op::Jecxz, b).src(J, B1).src(RegC, PS).e(),
        0xe4 => def(X86Op::In, b).dst(RegA, B1).src(UImm, B1).link(top(0xe5)).e(),
        0xe5 => def(X86Op::In, b).dst(RegA, ZS).src(UImm, B1).link(top(0xec)).e(),
        0xe6 => def(X86Op::Out, b).src(UImm, B1).src(RegA, B1).link(top(0xe7)).e(),
        0xe7 => def(X86Op::Out, b).src(UImm, B1).src(RegA, ZS).link(top(0xee)).e(),
        0xe8 => def(X86Op::Call, b).dst(Sp, PS).dst(StackPush, PS).src(J, B4).src(Sp, PS).e(),
        0xe9 => def(X86Op::Jmp, b).src(J, B4).e(),
        0xea => Entry::Ext(X86Ext::Mode, M_EA),
        0xeb => def(X86Op::JmpShort, b).src(J, B1).e(),
        0xec => def(X86Op::In, b).dst(RegA, B1).src(Dx, B2).link(top(0xed)).e(),
        0xed => def(X86Op::In, b).dst(RegA, ZS).src(Dx, B2).e(),
        0xee => def(X86Op::Out, b).src(Dx, B2).src(RegA, B1).link(top(0xef)).e(),
        0xef => def(X86Op::Out, b).src(Dx, B2).src(RegA, ZS).e(),
        0xf4 => def(X86Op::Hlt, b).e(),
        0xf5 => def(X86Op::Cmc, b).ef(CMC).e(),
        0xf6 => Entry::Ext(X86Ext::ModrmReg, GF6),
        0xf7 => Entry::Ext(X86Ext::ModrmReg, GF7),
        0xf8 => def(X86Op::Clc, b).ef(Eflags::WRITE_CF).e(),
        0xf9 => def(X86Op::Stc, b).ef(Eflags::WRITE_CF).e(),
        0xfa => def(X86Op::Cli, b).e(),
        0xfb => def(X86Op::Sti, b).e(),
        0xfc => def(X86Op::Cld, b).ef(Eflags::WRITE_DF).e(),
        0xfd => def(X86Op::Std, b).ef(Eflags::WRITE_DF).e(),
        0xfe => Entry::Ext(X86Ext::ModrmReg, GFE),
        0xff => Entry::Ext(X86Ext::ModrmReg, GFF),
        _ => Entry::Invalid,
    }
}

/// String-op operands that do not fit the five regular slots.
const fn extras() -> [XInfo; 4] {
    use X86Ty::*;
    [
        def(X86Op::Movs, 0).dst(RegDi, PS).link(top(0xa5)).info(),
        def(X86Op::Movs, 0).dst(RegDi, PS).info(),
        def(X86Op::Cmps, 0).src(RegDi, PS).link(top(0xa7)).info(),
        def(X86Op::Cmps, 0).src(RegDi, PS).info(),
    ]
}

// ── Groups ───────────────────────────────────────────────────────────────

const fn groups() -> [[XEntry; 8]; 20] {
    use X86Ty::*;
    let mut t = [[Entry::Invalid; 8]; 20];
    t[G80 as usize] = alu_group(6);
    t[G81 as usize] = alu_group(7);
    t[G83 as usize] = alu_group(8);
    t[GC0 as usize] = shift_group(0);
    t[GD0 as usize] = shift_group(1);
    t[GD2 as usize] = shift_group(2);
    t[GC1 as usize] = shift_group(3);
    t[GD1 as usize] = shift_group(4);
    t[GD3 as usize] = shift_group(5);
    t[GC6 as usize][0] = def(X86Op::Mov, slash(0xc6, 0)).dst(E, B1).src(Imm, B1).link(top(0xa0)).e();
    t[GC7 as usize][0] = def(X86Op::Mov, slash(0xc7, 0)).dst(E, VS).src(Imm, ZS).link(grp(GC6, 0)).e();

    let mut f6 = group3(false);
    let mut f7 = group3(true);
    f6[4] = def(X86Op::Mul, slash(0xf6, 4))
        .dst(RegA, B2)
        .src(E, B1)
        .src(RegA, B1)
        .ef(ARITH)
        .link(grp(GF7, 4))
        .e();
    f7[4] = def(X86Op::Mul, slash(0xf7, 4))
        .dst(RegD, VS)
        .dst(RegA, VS)
        .src(E, VS)
        .src(RegA, VS)
        .ef(ARITH)
        .e();
    f6[5] = def(X86Op::Imul, slash(0xf6, 5)).dst(RegA, B2).src(E, B1).src(RegA, B1).ef(ARITH).e();
    f7[5] = def(X86Op::Imul, slash(0xf7, 5))
        .dst(RegD, VS)
        .dst(RegA, VS)
        .src(E, VS)
        .src(RegA, VS)
        .ef(ARITH)
        .link(grp(GF6, 5))
        .e();
    let mut d = 6;
    while d < 8 {
        let op = if d == 6 { X86Op::Div } else { X86Op::Idiv };
        f6[d] = def(op, slash(0xf6, d as u32))
            .dst(Ah, B1)
            .dst(RegA, B1)
            .src(E, B1)
            .src(RegA, B2)
            .ef(ARITH)
            .link(grp(GF7, d))
            .e();
        f7[d] = def(op, slash(0xf7, d as u32))
            .dst(RegD, VS)
            .dst(RegA, VS)
            .src(E, VS)
            .src(RegD, VS)
            .src(RegA, VS)
            .ef(ARITH)
            .e();
        d += 1;
    }
    t[GF6 as usize] = f6;
    t[GF7 as usize] = f7;

    t[GFE as usize][0] = def(X86Op::Inc, slash(0xfe, 0)).dst(E, B1).src(E, B1).ef(INC).link(grp(GFF, 0)).e();
    t[GFE as usize][1] = def(X86Op::Dec, slash(0xfe, 1)).dst(E, B1).src(E, B1).ef(INC).link(grp(GFF, 1)).e();
    t[GFF as usize] = [
        def(X86Op::Inc, slash(0xff, 0)).dst(E, VS).src(E, VS).ef(INC).e(),
        def(X86Op::Dec, slash(0xff, 1)).dst(E, VS).src(E, VS).ef(INC).e(),
        def(X86Op::CallInd, slash(0xff, 2))
            .dst(Sp, PS)
            .dst(StackPush, PS)
            .src(E, PS)
            .src(Sp, PS)
            .e(),
        def(X86Op::CallFarInd, slash(0xff, 3))
            .dst(Sp, PS)
            .dst(StackPush, B8)
            .src(M, OpSize::B6)
            .src(Sp, PS)
            .e(),
        def(X86Op::JmpInd, slash(0xff, 4)).src(E, PS).e(),
        def(X86Op::JmpFarInd, slash(0xff, 5)).src(M, OpSize::B6).e(),
        def(X86Op::Push, slash(0xff, 6))
            .dst(Sp, PS)
            .dst(StackPush, PS)
            .src(E, PS)
            .src(Sp, PS)
            .e(),
        Entry::Invalid,
    ];
    t[G8F as usize][0] = def(X86Op::Pop, slash(0x8f, 0))
        .dst(E, PS)
        .dst(Sp, PS)
        .src(Sp, PS)
        .src(StackPop, PS)
        .e();

    let prefetch = [X86Op::Prefetchnta, X86Op::Prefetcht0, X86Op::Prefetcht1, X86Op::Prefetcht2];
    let mut d = 0;
    while d < 4 {
        t[G0F18 as usize][d] = def(prefetch[d], slash(two(0x18), d as u32)).src(M, B1).e();
        d += 1;
    }

    let bit_ops = [X86Op::Bt, X86Op::Bts, X86Op::Btr, X86Op::Btc];
    let mut d = 4;
    while d < 8 {
        let op = bit_ops[d - 4];
        let base = def(op, slash(two(0xba), d as u32)).ef(ARITH);
        t[G0FBA as usize][d] = if d == 4 {
            base.src(E, VS).src(UImm, B1).e()
        } else {
            let next = if d == 7 { esc(0xbb) } else { Link::End };
            base.dst(E, VS).src(UImm, B1).src(E, VS).link(next).e()
        };
        d += 1;
    }

    t[G0FAE_MEM as usize][0] = def(X86Op::Fxsave, slash(two(0xae), 0)).dst(M, OpSize::B512).e();
    t[G0FAE_MEM as usize][1] = def(X86Op::Fxrstor, slash(two(0xae), 1)).src(M, OpSize::B512).e();
    t[G0FAE_MEM as usize][2] = def(X86Op::Ldmxcsr, slash(two(0xae), 2)).src(M, B4).e();
    t[G0FAE_MEM as usize][3] = def(X86Op::Stmxcsr, slash(two(0xae), 3)).dst(M, B4).e();
    t[G0FAE_REG as usize][5] = def(X86Op::Lfence, fixed(slash(two(0xae), 5), 0xe8)).e();
    t[G0FAE_REG as usize][6] = def(X86Op::Mfence, fixed(slash(two(0xae), 6), 0xf0)).e();
    t[G0FAE_REG as usize][7] = def(X86Op::Sfence, fixed(slash(two(0xae), 7), 0xf8)).e();
    t
}

// ── Two-byte map ─────────────────────────────────────────────────────────

const fn escape_row(r: usize) -> XEntry {
    use X86Ty::*;
    let b = two(r as u32);
    match r {
        0x05 => def(X86Op::Syscall, b).e(),
        0x0b => def(X86Op::Ud2, b).e(),
        0x10 => Entry::Ext(X86Ext::Prefix, P0F10),
        0x11 => Entry::Ext(X86Ext::Prefix, P0F11),
        0x18 => Entry::Ext(X86Ext::ModrmReg, G0F18),
        0x1f => def(X86Op::Nop, b).src(E, VS).link(pfx(P90, 0)).e(),
        0x28 => Entry::Ext(X86Ext::Prefix, P0F28),
        0x29 => Entry::Ext(X86Ext::Prefix, P0F29),
        0x2a => Entry::Ext(X86Ext::Prefix, P0F2A),
        0x2c => Entry::Ext(X86Ext::Prefix, P0F2C),
        0x2e => Entry::Ext(X86Ext::Prefix, P0F2E),
        0x31 => def(X86Op::Rdtsc, b).dst(RegD, B4).dst(RegA, B4).e(),
        0x34 => def(X86Op::Sysenter, b).e(),
        0x40..=0x4f => def(X86Op::Cmovcc, two(0x40))
            .dst(G, VS)
            .src(E, VS)
            .fl(Flags::PREDICATE_0)
            .e(),
        0x51 => Entry::Ext(X86Ext::Prefix, P0F51),
        0x57 => Entry::Ext(X86Ext::Prefix, P0F57),
        0x58 => Entry::Ext(X86Ext::Prefix, P0F58),
        0x59 => Entry::Ext(X86Ext::Prefix, P0F59),
        0x5a => Entry::Ext(X86Ext::Prefix, P0F5A),
        0x5c => Entry::Ext(X86Ext::Prefix, P0F5C),
        0x5e => Entry::Ext(X86Ext::Prefix, P0F5E),
        0x80..=0x8f => def(X86Op::Jcc, two(0x80)).src(J, B4).fl(Flags::PREDICATE_0).e(),
        0x90..=0x9f => def(X86Op::Setcc, two(0x90)).dst(E, B1).fl(Flags::PREDICATE_0).e(),
        0xa2 => def(X86Op::Cpuid, b).e(),
        0xa3 => def(X86Op::Bt, b).src(E, VS).src(G, VS).ef(ARITH).link(grp(G0FBA, 4)).e(),
        0xab => def(X86Op::Bts, b)
            .dst(E, VS)
            .src(G, VS)
            .src(E, VS)
            .ef(ARITH)
            .link(grp(G0FBA, 5))
            .e(),
        0xae => Entry::Ext(X86Ext::ModrmMod, 0),
        0xaf => def(X86Op::Imul, b)
            .dst(G, VS)
            .src(E, VS)
            .src(G, VS)
            .ef(ARITH)
            .link(top(0x6b))
            .e(),
        0xb0 | 0xb1 => {
            let size = if r == 0xb0 { B1 } else { VS };
            def(X86Op::Cmpxchg, b)
                .dst(E, size)
                .dst(RegA, size)
                .src(G, size)
                .src(E, size)
                .src(RegA, size)
                .ef(ARITH)
                .link(if r == 0xb0 { esc(0xb1) } else { Link::End })
                .e()
        }
        0xb3 => def(X86Op::Btr, b)
            .dst(E, VS)
            .src(G, VS)
            .src(E, VS)
            .ef(ARITH)
            .link(grp(G0FBA, 6))
            .e(),
        0xb6 => def(X86Op::Movzx, b).dst(G, VS).src(E, B1).link(esc(0xb7)).e(),
        0xb7 => def(X86Op::Movzx, b).dst(G, VS).src(E, B2).e(),
        0xba => Entry::Ext(X86Ext::ModrmReg, G0FBA),
        0xbb => def(X86Op::Btc, b).dst(E, VS).src(G, VS).src(E, VS).ef(ARITH).e(),
        0xbc => def(X86Op::Bsf, b).dst(G, VS).src(E, VS).ef(ARITH).e(),
        0xbd => def(X86Op::Bsr, b).dst(G, VS).src(E, VS).ef(ARITH).e(),
        0xbe => def(X86Op::Movsx, b).dst(G, VS).src(E, B1).link(esc(0xbf)).e(),
        0xbf => def(X86Op::Movsx, b).dst(G, VS).src(E, B2).e(),
        0xc0 | 0xc1 => {
            let size = if r == 0xc0 { B1 } else { VS };
            def(X86Op::Xadd, b)
                .dst(E, size)
                .dst(G, size)
                .src(E, size)
                .src(G, size)
                .ef(ARITH)
                .link(if r == 0xc0 { esc(0xc1) } else { Link::End })
                .e()
        }
        0xc8..=0xcf => def(X86Op::Bswap, two(0xc8)).dst(Z, OpSize::Y).src(Z, OpSize::Y).e(),
        _ => Entry::Invalid,
    }
}

// ── Mandatory-prefix sets ────────────────────────────────────────────────

/// Packed-bits prefix numbers by row.
const fn row_pfx(bits: u32, row: usize) -> u32 {
    with_pfx(bits, row as u32)
}

/// `op xmm, xmm/m` with the destination also read.
const fn sse_arith(op: X86Op, byte: u32, row: usize, size: OpSize) -> XEntry {
    use X86Ty::*;
    def(op, row_pfx(two(byte), row)).dst(V, size).src(W, size).src(V, size).e()
}

const fn sse_sets() -> [[XEntry; 4]; 15] {
    use X86Ty::*;
    let x16 = OpSize::B16;
    let mut t = [[Entry::Invalid; 4]; 15];

    t[P90 as usize] = [
        def(X86Op::Nop, 0x90).e(),
        def(X86Op::Nop, 0x90).e(),
        def(X86Op::Pause, with_pfx(0x90, 2)).e(),
        def(X86Op::Nop, 0x90).e(),
    ];

    let moves = [X86Op::Movups, X86Op::Movupd, X86Op::Movss, X86Op::Movsd];
    let move_sizes = [x16, x16, B4, B8];
    let mut row = 0;
    while row < 4 {
        let size = move_sizes[row];
        t[P0F10 as usize][row] = def(moves[row], row_pfx(two(0x10), row))
            .dst(V, size)
            .src(W, size)
            .link(pfx(P0F11, row))
            .e();
        t[P0F11 as usize][row] = def(moves[row], row_pfx(two(0x11), row)).dst(W, size).src(V, size).e();
        row += 1;
    }

    let aligned = [X86Op::Movaps, X86Op::Movapd];
    let mut row = 0;
    while row < 2 {
        t[P0F28 as usize][row] = def(aligned[row], row_pfx(two(0x28), row))
            .dst(V, x16)
            .src(W, x16)
            .link(pfx(P0F29, row))
            .e();
        t[P0F29 as usize][row] = def(aligned[row], row_pfx(two(0x29), row)).dst(W, x16).src(V, x16).e();
        row += 1;
    }

    t[P0F2A as usize][2] = Entry::Ext(X86Ext::Rexw, 0);
    t[P0F2A as usize][3] = Entry::Ext(X86Ext::Rexw, 1);
    t[P0F2C as usize][2] = Entry::Ext(X86Ext::Rexw, 2);
    t[P0F2C as usize][3] = Entry::Ext(X86Ext::Rexw, 3);

    t[P0F2E as usize][0] = def(X86Op::Ucomiss, two(0x2e)).src(V, B4).src(W, B4).ef(ARITH).e();
    t[P0F2E as usize][1] = def(X86Op::Ucomisd, row_pfx(two(0x2e), 1)).src(V, B8).src(W, B8).ef(ARITH).e();

    t[P0F51 as usize][2] = def(X86Op::Sqrtss, row_pfx(two(0x51), 2)).dst(V, B4).src(W, B4).e();
    t[P0F51 as usize][3] = def(X86Op::Sqrtsd, row_pfx(two(0x51), 3)).dst(V, B8).src(W, B8).e();

    t[P0F57 as usize][0] = sse_arith(X86Op::Xorps, 0x57, 0, x16);
    t[P0F57 as usize][1] = sse_arith(X86Op::Xorpd, 0x57, 1, x16);

    let scalar = [
        (P0F58, 0x58, X86Op::Addss, X86Op::Addsd),
        (P0F59, 0x59, X86Op::Mulss, X86Op::Mulsd),
        (P0F5C, 0x5c, X86Op::Subss, X86Op::Subsd),
        (P0F5E, 0x5e, X86Op::Divss, X86Op::Divsd),
    ];
    let mut i = 0;
    while i < 4 {
        let (set, byte, ss, sd) = scalar[i];
        t[set as usize][2] = sse_arith(ss, byte, 2, B4);
        t[set as usize][3] = sse_arith(sd, byte, 3, B8);
        i += 1;
    }

    t[P0F5A as usize][2] = def(X86Op::Cvtss2sd, row_pfx(two(0x5a), 2)).dst(V, B8).src(W, B4).e();
    t[P0F5A as usize][3] = def(X86Op::Cvtsd2ss, row_pfx(two(0x5a), 3)).dst(V, B4).src(W, B8).e();
    t
}

/// Integer/scalar conversions split on `REX.W`: sets 0-1 are `cvtsi2ss`/`cvtsi2sd`,
/// sets 2-3 `cvttss2si`/`cvttsd2si`.
const fn rexw_sets() -> [[XEntry; 2]; 4] {
    use X86Ty::*;
    let mut t = [[Entry::Invalid; 2]; 4];
    let from_int = [(X86Op::Cvtsi2ss, B4, 2u32), (X86Op::Cvtsi2sd, B8, 3)];
    let to_int = [(X86Op::Cvttss2si, B4, 2u32), (X86Op::Cvttsd2si, B8, 3)];
    let mut i = 0;
    while i < 2 {
        let (op, fp, prefix) = from_int[i];
        let bits = with_pfx(two(0x2a), prefix);
        t[i][0] = def(op, bits)
            .dst(V, fp)
            .src(E, B4)
            .link(at(X86Ext::Rexw, i as u16, 1))
            .e();
        t[i][1] = def(op, bits).dst(V, fp).src(E, B8).fl(Flags::REQUIRES_REX_W).e();

        let (op, fp, prefix) = to_int[i];
        let bits = with_pfx(two(0x2c), prefix);
        t[i + 2][0] = def(op, bits)
            .dst(G, B4)
            .src(W, fp)
            .link(at(X86Ext::Rexw, (i + 2) as u16, 1))
            .e();
        t[i + 2][1] = def(op, bits).dst(G, B8).src(W, fp).fl(Flags::REQUIRES_REX_W).e();
        i += 1;
    }
    t
}

/// Mode-dependent rows: 32-bit only in row 0, 64-bit only in row 1.
const fn mode_sets() -> [[XEntry; 2]; 6] {
    use X86Ty::*;
    let only32 = Flags::X86_ONLY;
    let mut t = [[Entry::Invalid; 2]; 6];
    t[M_INC as usize][0] = def(X86Op::Inc, 0x40)
        .dst(Z, VS)
        .src(Z, VS)
        .fl(only32)
        .ef(INC)
        .link(grp(GFE, 0))
        .e();
    t[M_DEC as usize][0] = def(X86Op::Dec, 0x48)
        .dst(Z, VS)
        .src(Z, VS)
        .fl(only32)
        .ef(INC)
        .link(grp(GFE, 1))
        .e();
    t[M_63 as usize][1] = def(X86Op::Movsxd, 0x63).dst(G, VS).src(E, B4).fl(Flags::X64_ONLY).e();
    t[M_9A as usize][0] = def(X86Op::CallFar, 0x9a)
        .dst(Sp, PS)
        .dst(StackPush, B8)
        .src(A, OpSize::B6)
        .src(Sp, PS)
        .fl(only32)
        .e();
    t[M_CE as usize][0] = def(X86Op::Into, 0xce).fl(only32).ef(Eflags::READ_OF).e();
    t[M_EA as usize][0] = def(X86Op::JmpFar, 0xea).src(A, OpSize::B6).fl(only32).e();
    t
}

// ── x87 ──────────────────────────────────────────────────────────────────

/// `op st0, m` / `op st0, st(i)` (`d8`) and `op st0, m64` / `op st(i), st0` (`dc`).
const X87_ARITH: [(X86Op, usize, usize); 4] = [
    (X86Op::Fadd, 0, 0),
    (X86Op::Fmul, 1, 1),
    (X86Op::Fsub, 4, 5),
    (X86Op::Fdiv, 6, 7),
];

/// Packed bits of x87 row `row` in set `set`. Register forms carry their
/// ModRM template (`mod` 3, `rm` 0) without the fixed flag.
const fn x87_bits(set: usize, row: usize) -> u32 {
    let byte = (0xd8 + set) as u32;
    if row < 8 {
        slash(byte, row as u32)
    } else {
        let reg = (row - 8) as u32;
        slash(byte, reg) | ((0xc0 | (reg << 3)) << 16)
    }
}

const fn x87_sets() -> [[XEntry; 16]; 8] {
    use X86Ty::*;
    let st = OpSize::B10;
    let mut t = [[Entry::Invalid; 16]; 8];

    let mut i = 0;
    while i < 4 {
        let (op, mem, reg_dc) = X87_ARITH[i];
        t[0][mem] = def(op, x87_bits(0, mem))
            .dst(St0, st)
            .src(M, B4)
            .src(St0, st)
            .link(x87(4, mem))
            .e();
        t[4][mem] = def(op, x87_bits(4, mem))
            .dst(St0, st)
            .src(M, B8)
            .src(St0, st)
            .link(x87(0, mem + 8))
            .e();
        t[0][mem + 8] = def(op, x87_bits(0, mem + 8))
            .dst(St0, st)
            .src(Sti, st)
            .src(St0, st)
            .link(x87(4, reg_dc + 8))
            .e();
        t[4][reg_dc + 8] = def(op, x87_bits(4, reg_dc + 8))
            .dst(Sti, st)
            .src(St0, st)
            .src(Sti, st)
            .e();
        i += 1;
    }

    // d9
    t[1][0] = def(X86Op::Fld, x87_bits(1, 0)).dst(St0, st).src(M, B4).link(x87(5, 0)).e();
    t[1][2] = def(X86Op::Fst, x87_bits(1, 2)).dst(M, B4).src(St0, st).link(x87(5, 2)).e();
    t[1][3] = def(X86Op::Fstp, x87_bits(1, 3)).dst(M, B4).src(St0, st).link(x87(5, 3)).e();
    t[1][5] = def(X86Op::Fldcw, x87_bits(1, 5)).src(M, B2).e();
    t[1][7] = def(X86Op::Fnstcw, x87_bits(1, 7)).dst(M, B2).e();
    t[1][8] = def(X86Op::Fld, x87_bits(1, 8)).dst(St0, st).src(Sti, st).e();

    // db
    t[3][0] = def(X86Op::Fild, x87_bits(3, 0)).dst(St0, st).src(M, B4).link(x87(7, 0)).e();
    t[3][3] = def(X86Op::Fistp, x87_bits(3, 3)).dst(M, B4).src(St0, st).link(x87(7, 3)).e();
    t[3][5] = def(X86Op::Fld, x87_bits(3, 5)).dst(St0, st).src(M, st).link(x87(1, 8)).e();
    t[3][7] = def(X86Op::Fstp, x87_bits(3, 7)).dst(M, st).src(St0, st).link(x87(5, 11)).e();
    t[3][12] = def(X86Op::Fninit, fixed(slash(0xdb, 4), 0xe3)).e();

    // dd
    t[5][0] = def(X86Op::Fld, x87_bits(5, 0)).dst(St0, st).src(M, B8).link(x87(3, 5)).e();
    t[5][2] = def(X86Op::Fst, x87_bits(5, 2)).dst(M, B8).src(St0, st).link(x87(5, 10)).e();
    t[5][3] = def(X86Op::Fstp, x87_bits(5, 3)).dst(M, B8).src(St0, st).link(x87(3, 7)).e();
    t[5][7] = def(X86Op::Fnstsw, x87_bits(5, 7)).dst(M, B2).link(x87(7, 12)).e();
    t[5][10] = def(X86Op::Fst, x87_bits(5, 10)).dst(Sti, st).src(St0, st).e();
    t[5][11] = def(X86Op::Fstp, x87_bits(5, 11)).dst(Sti, st).src(St0, st).e();

    // df
    t[7][0] = def(X86Op::Fild, x87_bits(7, 0)).dst(St0, st).src(M, B2).link(x87(7, 5)).e();
    t[7][3] = def(X86Op::Fistp, x87_bits(7, 3)).dst(M, B2).src(St0, st).link(x87(7, 7)).e();
    t[7][5] = def(X86Op::Fild, x87_bits(7, 5)).dst(St0, st).src(M, B8).e();
    t[7][7] = def(X86Op::Fistp, x87_bits(7, 7)).dst(M, B8).src(St0, st).e();
    t[7][12] = def(X86Op::Fnstsw, fixed(slash(0xdf, 4), 0xe0)).dst(RegA, B2).e();
    t
}

// ── Tables ───────────────────────────────────────────────────────────────

static X86_TOP: [XEntry; 256] = {
    let mut t = [Entry::Invalid; 256];
    let mut r = 0;
    while r < 256 {
        t[r] = top_row(r);
        r += 1;
    }
    t
};

static X86_0F: [XEntry; 256] = {
    let mut t = [Entry::Invalid; 256];
    let mut r = 0;
    while r < 256 {
        t[r] = escape_row(r);
        r += 1;
    }
    t
};

static X86_GROUPS: [[XEntry; 8]; 20] = groups();
static X86_MOD: [[XEntry; 2]; 1] = [span_table!(2;
    0 => Entry::Ext(X86Ext::ModrmReg, G0FAE_MEM),
    1 => Entry::Ext(X86Ext::ModrmReg, G0FAE_REG),
)];
static X86_PREFIX: [[XEntry; 4]; 15] = sse_sets();
static X86_MODE: [[XEntry; 2]; 6] = mode_sets();
static X86_REXW: [[XEntry; 2]; 4] = rexw_sets();
static X86_X87: [[XEntry; 16]; 8] = x87_sets();
static X86_EXTRAS: [XInfo; 4] = extras();

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{chain, find_head, validate, walk};

    fn head(op: X86Op) -> &'static XInfo {
        find_head::<X86Layout>(Opcode::X86(op)).unwrap().1
    }

    #[test]
    fn forest_is_well_formed() {
        let terminals = validate::<X86Layout>().unwrap();
        assert!(terminals > 300, "only {} terminals", terminals);
    }

    #[test]
    fn every_opcode_has_an_encoding() {
        for &op in X86Op::ALL {
            assert!(
                find_head::<X86Layout>(Opcode::X86(op)).is_some(),
                "{} has no table entry",
                op.name()
            );
        }
    }

    #[test]
    fn every_form_is_on_its_chain() {
        walk::<X86Layout>(|at, info| {
            let on_chain = chain(head_of(info.opcode))
                .any(|c| c.bits == info.bits && c.flags == info.flags);
            assert!(on_chain, "{:?} ({}) is unreachable from its head", at, info.name);
        });

        fn head_of(op: Opcode) -> &'static XInfo {
            find_head::<X86Layout>(op).unwrap().1
        }
    }

    #[test]
    fn arithmetic_chain_prefers_short_forms() {
        let bits: Vec<u32> = chain(head(X86Op::Sub)).map(|i| i.bits).collect();
        assert_eq!(
            bits,
            vec![0x28, 0x29, 0x2b, 0x2a, 0x2c, slash(0x83, 5), 0x2d, slash(0x81, 5), slash(0x80, 5)]
        );
    }

    #[test]
    fn packed_bits_round_trip_through_accessors() {
        let cvt = chain(head(X86Op::Cvtsi2sd)).last().unwrap();
        assert!(is_0f(cvt.bits));
        assert_eq!(opcode_byte(cvt.bits), 0x2a);
        assert_eq!(mandatory_prefix(cvt.bits), Some(0xf2));
        assert!(cvt.flags.contains(Flags::REQUIRES_REX_W));

        let sfence = head(X86Op::Sfence);
        assert_eq!(fixed_modrm(sfence.bits), Some(0xf8));
        assert_eq!(digit(sfence.bits), Some(7));

        let fsub_reg = chain(head(X86Op::Fsub)).last().unwrap();
        assert_eq!(opcode_byte(fsub_reg.bits), 0xdc);
        assert_eq!(digit(fsub_reg.bits), Some(5));
        assert_eq!(fixed_modrm(fsub_reg.bits), None);
        assert_eq!(fsub_reg.bits >> 16, 0xe8);
    }

    #[test]
    fn register_in_opcode_clears_the_low_mask_bits() {
        let push = head(X86Op::Push);
        assert_eq!(push.bits, 0x50);
        assert_eq!(push.mask & 7, 0);
        let jcc = head(X86Op::Jcc);
        assert_eq!(jcc.mask & 0xf, 0);
        assert!(jcc.flags.contains(Flags::PREDICATE_0));
        assert_eq!(head(X86Op::Lea).mask & 0xff, 0xff);
    }

    #[test]
    fn string_ops_carry_extra_operands() {
        let movs = head(X86Op::Movs);
        assert!(movs.flags.contains(Flags::EXTRA_OPERANDS));
        assert_eq!(crate::table::extras(movs).count(), 1);
        assert_eq!(chain(movs).count(), 2);
        assert_eq!(movs.num_slots(), 5);
    }

    #[test]
    fn mode_specific_rows() {
        assert!(head(X86Op::Inc).flags.contains(Flags::X86_ONLY));
        assert_eq!(chain(head(X86Op::Inc)).count(), 3);
        assert!(head(X86Op::Movsxd).flags.contains(Flags::X64_ONLY));
    }
}
