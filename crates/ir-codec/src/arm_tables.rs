//! 32-bit ARM opcodes and the A32 decode tables.
//!
//! A32 and Thumb share one opcode set; each has its own table forest. The A32
//! forest is rooted at two 256-row tables indexed by bits 27:20, one for
//! conditional encodings and one for the `cond == 0b1111` space. Row-regular
//! families (data processing, loads and stores, block transfers) are
//! generated by const functions that also compute each entry's chain link,
//! so the chains always follow table walk order.
//!
//! ```text
//! 31..28  27..20   19..16  15..12  11..8  7..4   3..0
//! cond    top row  Rn      Rd      Rs     op2    Rm
//! ```

use crate::instr::{Eflags, Opcode};
use crate::size::OpSize;
use crate::table::{opcode_enum, Entry, EntryRef, Flags, Layout, Link, OpInfo, Slot};

opcode_enum! {
    /// 32-bit ARM opcode, shared by A32 and Thumb.
    pub enum ArmOp {
        And => "and",
        Ands => "ands",
        Eor => "eor",
        Eors => "eors",
        Sub => "sub",
        Subs => "subs",
        Rsb => "rsb",
        Rsbs => "rsbs",
        Add => "add",
        Adds => "adds",
        Adc => "adc",
        Adcs => "adcs",
        Sbc => "sbc",
        Sbcs => "sbcs",
        Rsc => "rsc",
        Rscs => "rscs",
        Tst => "tst",
        Teq => "teq",
        Cmp => "cmp",
        Cmn => "cmn",
        Orr => "orr",
        Orrs => "orrs",
        Mov => "mov",
        Movs => "movs",
        Bic => "bic",
        Bics => "bics",
        Mvn => "mvn",
        Mvns => "mvns",
        Lsls => "lsls",
        Lsrs => "lsrs",
        Asrs => "asrs",
        Rors => "rors",
        Lsl => "lsl",
        Lsr => "lsr",
        Asr => "asr",
        Ror => "ror",
        Mul => "mul",
        Muls => "muls",
        Mla => "mla",
        Mlas => "mlas",
        Mls => "mls",
        Umull => "umull",
        Umulls => "umulls",
        Umlal => "umlal",
        Umlals => "umlals",
        Smull => "smull",
        Smulls => "smulls",
        Smlal => "smlal",
        Smlals => "smlals",
        Clz => "clz",
        Sdiv => "sdiv",
        Udiv => "udiv",
        Movw => "movw",
        Movt => "movt",
        Sxtb => "sxtb",
        Sxth => "sxth",
        Uxtb => "uxtb",
        Uxth => "uxth",
        Rev => "rev",
        Rev16 => "rev16",
        Revsh => "revsh",
        Nop => "nop",
        Yield => "yield",
        Wfe => "wfe",
        Wfi => "wfi",
        Sev => "sev",
        It => "it",
        Mrs => "mrs",
        Msr => "msr",
        B => "b",
        Bl => "bl",
        Blx => "blx",
        Bx => "bx",
        Cbz => "cbz",
        Cbnz => "cbnz",
        Svc => "svc",
        Udf => "udf",
        Bkpt => "bkpt",
        Ldr => "ldr",
        Str => "str",
        Ldrb => "ldrb",
        Strb => "strb",
        Ldrh => "ldrh",
        Strh => "strh",
        Ldrsb => "ldrsb",
        Ldrsh => "ldrsh",
        Ldrd => "ldrd",
        Strd => "strd",
        Adr => "adr",
        Pld => "pld",
        Ldm => "ldm",
        Ldmda => "ldmda",
        Ldmdb => "ldmdb",
        Ldmib => "ldmib",
        Stm => "stm",
        Stmda => "stmda",
        Stmdb => "stmdb",
        Stmib => "stmib",
        Push => "push",
        Pop => "pop",
        VaddF32 => "vadd.f32",
        VaddF64 => "vadd.f64",
        VsubF32 => "vsub.f32",
        VsubF64 => "vsub.f64",
        VmulF32 => "vmul.f32",
        VmulF64 => "vmul.f64",
        VdivF32 => "vdiv.f32",
        VdivF64 => "vdiv.f64",
        VmovF32 => "vmov.f32",
        VmovF64 => "vmov.f64",
        VabsF32 => "vabs.f32",
        VabsF64 => "vabs.f64",
        VnegF32 => "vneg.f32",
        VnegF64 => "vneg.f64",
        VsqrtF32 => "vsqrt.f32",
        VsqrtF64 => "vsqrt.f64",
        VcmpF32 => "vcmp.f32",
        VcmpF64 => "vcmp.f64",
        VcvtF64F32 => "vcvt.f64.f32",
        VcvtF32F64 => "vcvt.f32.f64",
        Vmov => "vmov",
        Vldr => "vldr",
        Vstr => "vstr",
        Vmrs => "vmrs",
        Vmsr => "vmsr",
    }
}

// ── Layout ───────────────────────────────────────────────────────────────

/// The A32 table forest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct A32Layout;

/// A32 table kinds; each documents the bits it selects a row with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum A32Ext {
    /// Bits 27:20. Set 0 is conditional, set 1 the unconditional space.
    Top,
    /// Bit 4 clear → 0; bit 7 clear → 1; else 2 + bits 6:5.
    Opc4x,
    /// Bits 7:4.
    Opc4,
    /// Bits 19:16 zero or not.
    Imm1916,
    /// Bits 2:0.
    Bits0,
    /// Bit 4.
    Bit4,
    /// Bits 11:8.
    Bits8,
    /// Bit 4, bit 8 and bit 6 when bits 11:9 are `101`; else row 8.
    Vfp,
    /// Bits 19:16 times two plus bit 7.
    Opc2,
}

/// A32 operand types. The comment names the field each one reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum A32Ty {
    None,
    /// Core register, 19:16.
    Ra,
    /// Core register, 15:12.
    Rb,
    /// Core register, 11:8.
    Rc,
    /// Core register, 3:0.
    Rd,
    /// Second register of an even pair starting at 15:12.
    RbPair,
    /// 15:12 where 15 names the flags.
    RbApsr,
    Lr,
    Cpsr,
    Spsr,
    Fpscr,
    /// Single precision, 15:12 and 22.
    VbS,
    /// Single precision, 19:16 and 7.
    VaS,
    /// Single precision, 3:0 and 5.
    VcS,
    /// Double precision, 22 and 15:12.
    VbD,
    /// Double precision, 7 and 19:16.
    VaD,
    /// Double precision, 5 and 3:0.
    VcD,
    /// Rotated 8-bit immediate, 11:0.
    Imm8Rot,
    /// 16-bit immediate, 19:16 and 11:0.
    Imm16,
    /// 16-bit immediate, 19:8 and 3:0.
    Imm16Split12,
    /// 24-bit immediate.
    Imm24,
    /// Shift type 6:5 of an immediate shift.
    ShTy,
    /// Shift amount 11:7; reads the type to decode 0.
    Imm5,
    /// Shift type 6:5 of a register shift.
    ShTyReg,
    /// Field mask of `msr`, 19:16.
    Imm4Mask,
    /// Writeback amount: ±imm12 with U.
    Imm12Signed,
    /// Writeback amount: ±imm8 split over 11:8 and 3:0, with U.
    Imm8Signed,
    /// Writeback index: ±Rm with U.
    RdIndex,
    /// Writeback index shift type.
    ShTyIdx,
    /// Writeback index shift amount.
    Imm5Idx,
    /// VFP modified immediate, 19:16 and 3:0.
    VfpImm8,
    /// Floating zero.
    FpZero,
    /// Branch target, imm24 words from pc+8.
    Pc24,
    /// `blx` target, imm24:H halfwords from pc+8.
    Pc24H,
    /// `[Rn, #±imm12]`.
    MemImm12,
    /// `[Rn]` of a post-indexed access.
    MemPost,
    /// `[Rn, ±Rm, shift #imm5]`.
    MemReg,
    /// `[Rn, #±imm8]`, imm8 split over 11:8 and 3:0.
    MemImm8,
    /// `[Rn, ±Rm]`.
    MemRegPlain,
    /// Block transfer base; the displacement follows the addressing mode.
    MemList,
    /// `{...}` register list, 15:0.
    RegList,
    /// `[Rn, #±imm8*4]`.
    MemVfp,
}

/// Encoding bits an operand type occupies.
const fn field(ty: A32Ty) -> u32 {
    match ty {
        A32Ty::None
        | A32Ty::RbPair
        | A32Ty::Lr
        | A32Ty::Cpsr
        | A32Ty::Spsr
        | A32Ty::Fpscr
        | A32Ty::FpZero => 0,
        A32Ty::Ra | A32Ty::Imm4Mask | A32Ty::MemPost | A32Ty::MemList => 0x000f_0000,
        A32Ty::Rb | A32Ty::RbApsr => 0x0000_f000,
        A32Ty::Rc => 0x0000_0f00,
        A32Ty::Rd => 0x0000_000f,
        A32Ty::VbS | A32Ty::VbD => 0x0040_f000,
        A32Ty::VaS | A32Ty::VaD => 0x000f_0080,
        A32Ty::VcS | A32Ty::VcD => 0x0000_002f,
        A32Ty::Imm8Rot => 0x0000_0fff,
        A32Ty::Imm16 => 0x000f_0fff,
        A32Ty::Imm16Split12 => 0x000f_ff0f,
        A32Ty::Imm24 | A32Ty::Pc24 => 0x00ff_ffff,
        A32Ty::Pc24H => 0x01ff_ffff,
        A32Ty::ShTy | A32Ty::ShTyReg => 0x0000_0060,
        A32Ty::Imm5 => 0x0000_0f80,
        // The writeback index shift is split over two slots of which only
        // the first sits in the owning entry.
        A32Ty::ShTyIdx | A32Ty::Imm5Idx => 0x0000_0fe0,
        A32Ty::Imm12Signed => 0x0080_0fff,
        A32Ty::Imm8Signed => 0x0080_0f0f,
        A32Ty::RdIndex => 0x0080_000f,
        A32Ty::VfpImm8 => 0x000f_000f,
        A32Ty::MemImm12 => 0x008f_0fff,
        A32Ty::MemReg => 0x008f_0fef,
        A32Ty::MemImm8 => 0x008f_0f0f,
        A32Ty::MemRegPlain => 0x008f_000f,
        A32Ty::RegList => 0x0000_ffff,
        A32Ty::MemVfp => 0x008f_00ff,
    }
}

impl Layout for A32Layout {
    type Ext = A32Ext;
    type Ty = A32Ty;

    const NONE: A32Ty = A32Ty::None;
    const MAX_HOPS: usize = 3;
    const NAME: &'static str = "a32";

    fn roots() -> &'static [(A32Ext, u16)] {
        &[(A32Ext::Top, 0), (A32Ext::Top, 1)]
    }

    fn table(kind: A32Ext, set: u16) -> Option<&'static [Entry<Self>]> {
        let set = set as usize;
        match kind {
            A32Ext::Top => match set {
                0 => Some(&A32_PRED),
                1 => Some(&A32_UNCOND),
                _ => None,
            },
            A32Ext::Opc4x => A32_OPC4X.get(set).map(|t| &t[..]),
            A32Ext::Opc4 => A32_OPC4.get(set).map(|t| &t[..]),
            A32Ext::Imm1916 => A32_IMM1916.get(set).map(|t| &t[..]),
            A32Ext::Bits0 => A32_BITS0.get(set).map(|t| &t[..]),
            A32Ext::Bit4 => A32_BIT4.get(set).map(|t| &t[..]),
            A32Ext::Bits8 => A32_BITS8.get(set).map(|t| &t[..]),
            A32Ext::Vfp => A32_VFP.get(set).map(|t| &t[..]),
            A32Ext::Opc2 => A32_OPC2.get(set).map(|t| &t[..]),
        }
    }

    fn width(kind: A32Ext) -> usize {
        match kind {
            A32Ext::Top => 256,
            A32Ext::Opc4x => 6,
            A32Ext::Opc4 => 16,
            A32Ext::Imm1916 | A32Ext::Bit4 => 2,
            A32Ext::Bits0 => 8,
            A32Ext::Bits8 => 16,
            A32Ext::Vfp => 9,
            A32Ext::Opc2 => 32,
        }
    }

    fn extra(index: u16) -> Option<&'static OpInfo<Self>> {
        A32_EXTRAS.get(index as usize)
    }
}

// ── Entry builders ───────────────────────────────────────────────────────

type A32Entry = Entry<A32Layout>;
type A32Info = OpInfo<A32Layout>;
type S = Slot<A32Ty>;

const fn s(ty: A32Ty, size: OpSize) -> S {
    Slot { ty, size }
}

const fn w(ty: A32Ty) -> S {
    s(ty, OpSize::B4)
}

const NO: S = s(A32Ty::None, OpSize::None);
const P: Flags = Flags::PREDICATE_28;

const fn info(
    op: ArmOp,
    bits: u32,
    dst: [S; 2],
    src: [S; 3],
    flags: Flags,
    eflags: Eflags,
    next: Link<A32Layout>,
) -> A32Info {
    let mut fields = field(dst[0].ty)
        | field(dst[1].ty)
        | field(src[0].ty)
        | field(src[1].ty)
        | field(src[2].ty);
    if flags.contains(Flags::PREDICATE_28) {
        fields |= 0xf000_0000;
    }
    OpInfo {
        opcode: Opcode::Arm(op),
        bits,
        mask: !fields,
        name: op.name(),
        dst,
        src,
        flags,
        eflags,
        next,
    }
}

const fn op(op: ArmOp, bits: u32, dst: [S; 2], src: [S; 3], eflags: Eflags) -> A32Entry {
    Entry::Op(info(op, bits, dst, src, P, eflags, Link::End))
}

const fn linked(
    op: ArmOp,
    bits: u32,
    dst: [S; 2],
    src: [S; 3],
    flags: Flags,
    eflags: Eflags,
    next: Link<A32Layout>,
) -> A32Entry {
    Entry::Op(info(op, bits, dst, src, flags, eflags, next))
}

const fn at(kind: A32Ext, set: usize, row: usize) -> Link<A32Layout> {
    Link::At(EntryRef {
        kind,
        set: set as u16,
        row: row as u16,
    })
}

const NZC: Eflags = Eflags::WRITE_SF.union(Eflags::WRITE_ZF).union(Eflags::WRITE_CF);
const NZ: Eflags = Eflags::WRITE_SF.union(Eflags::WRITE_ZF);
const STATUS_READ: Eflags = Eflags::READ_NZCV.union(Eflags::READ_Q).union(Eflags::READ_GE);
const STATUS_WRITE: Eflags = Eflags::WRITE_NZCV.union(Eflags::WRITE_Q).union(Eflags::WRITE_GE);

// ── Data processing ──────────────────────────────────────────────────────

/// Opcodes by bits 24:21, without and with S.
const DP: [(ArmOp, ArmOp); 16] = [
    (ArmOp::And, ArmOp::Ands),
    (ArmOp::Eor, ArmOp::Eors),
    (ArmOp::Sub, ArmOp::Subs),
    (ArmOp::Rsb, ArmOp::Rsbs),
    (ArmOp::Add, ArmOp::Adds),
    (ArmOp::Adc, ArmOp::Adcs),
    (ArmOp::Sbc, ArmOp::Sbcs),
    (ArmOp::Rsc, ArmOp::Rscs),
    (ArmOp::Tst, ArmOp::Tst),
    (ArmOp::Teq, ArmOp::Teq),
    (ArmOp::Cmp, ArmOp::Cmp),
    (ArmOp::Cmn, ArmOp::Cmn),
    (ArmOp::Orr, ArmOp::Orrs),
    (ArmOp::Mov, ArmOp::Movs),
    (ArmOp::Bic, ArmOp::Bics),
    (ArmOp::Mvn, ArmOp::Mvns),
];

const fn dp_eflags(n: usize, set_flags: bool) -> Eflags {
    let reads = if matches!(n, 5..=7) {
        Eflags::READ_CF
    } else {
        Eflags::NONE
    };
    let writes = if !set_flags {
        Eflags::NONE
    } else if matches!(n, 0 | 1 | 8 | 9 | 12..=15) {
        NZC
    } else {
        Eflags::WRITE_NZCV
    };
    reads.union(writes)
}

const IMM_SHIFT: u32 = 0;
const REG_SHIFT: u32 = 1;
const IMMEDIATE: u32 = 2;

/// Data-processing row `r` (bits 24:20) in one of its three operand forms.
/// Chain: immediate shift → register shift → immediate.
const fn dp(r: usize, form: u32) -> A32Entry {
    let n = r >> 1;
    let set_flags = r & 1 == 1;
    let opcode = if set_flags { DP[n].1 } else { DP[n].0 };
    let compare = n >= 8 && n <= 11;
    let unary = n == 13 || n == 15;
    let mut bits = 0xe000_0000 | ((r as u32) << 20);
    let (a, b, c) = match form {
        IMM_SHIFT => (w(A32Ty::Rd), s(A32Ty::ShTy, OpSize::Bits(2)), s(A32Ty::Imm5, OpSize::Bits(5))),
        REG_SHIFT => {
            bits |= 0x10;
            (w(A32Ty::Rd), s(A32Ty::ShTyReg, OpSize::Bits(2)), w(A32Ty::Rc))
        }
        _ => {
            bits |= 0x0200_0000;
            (w(A32Ty::Imm8Rot), NO, NO)
        }
    };
    let next = match form {
        IMM_SHIFT => at(A32Ext::Opc4x, r, 1),
        REG_SHIFT => at(A32Ext::Top, 0, 0x20 | r),
        _ => Link::End,
    };
    let eflags = dp_eflags(n, set_flags);
    let rn = w(A32Ty::Ra);
    let rd = w(A32Ty::Rb);
    if form == IMMEDIATE {
        let (dst, src) = if compare {
            ([NO, NO], [rn, a, NO])
        } else if unary {
            ([rd, NO], [a, NO, NO])
        } else {
            ([rd, NO], [rn, a, NO])
        };
        return linked(opcode, bits, dst, src, P, eflags, next);
    }
    if unary {
        return linked(opcode, bits, [rd, NO], [a, b, c], P, eflags, next);
    }
    // The shift amount (or register) is the fourth source.
    let dst0 = if compare { NO } else { rd };
    linked(opcode, bits, [dst0, c], [rn, a, b], P.union(Flags::SRC4), eflags, next)
}

// ── Multiplies ───────────────────────────────────────────────────────────

const fn nz_if(set_flags: bool) -> Eflags {
    if set_flags {
        NZ
    } else {
        Eflags::NONE
    }
}

const fn multiply(r: usize) -> A32Entry {
    let bits = 0xe000_0090 | ((r as u32) << 20);
    let (ra, rb, rc, rd) = (w(A32Ty::Ra), w(A32Ty::Rb), w(A32Ty::Rc), w(A32Ty::Rd));
    match r {
        0 | 1 => op(
            if r == 0 { ArmOp::Mul } else { ArmOp::Muls },
            bits,
            [ra, NO],
            [rd, rc, NO],
            nz_if(r == 1),
        ),
        2 | 3 => op(
            if r == 2 { ArmOp::Mla } else { ArmOp::Mlas },
            bits,
            [ra, NO],
            [rd, rc, rb],
            nz_if(r == 3),
        ),
        6 => op(ArmOp::Mls, bits, [ra, NO], [rd, rc, rb], Eflags::NONE),
        8 | 9 | 0xc | 0xd => {
            let opcode = match r {
                8 => ArmOp::Umull,
                9 => ArmOp::Umulls,
                0xc => ArmOp::Smull,
                _ => ArmOp::Smulls,
            };
            op(opcode, bits, [rb, ra], [rd, rc, NO], nz_if(r & 1 == 1))
        }
        0xa | 0xb | 0xe | 0xf => {
            let opcode = match r {
                0xa => ArmOp::Umlal,
                0xb => ArmOp::Umlals,
                0xe => ArmOp::Smlal,
                _ => ArmOp::Smlals,
            };
            // The accumulator halves are read too; they follow as extras.
            let extra = if r < 0xe { r - 0xa } else { r - 0xc };
            linked(
                opcode,
                bits,
                [rb, ra],
                [rd, rc, NO],
                P.union(Flags::EXTRA_OPERANDS),
                nz_if(r & 1 == 1),
                Link::Extra(extra as u16),
            )
        }
        _ => Entry::Invalid,
    }
}

// ── Halfword, signed byte and doubleword transfers ───────────────────────

/// Row bases (P, I, W) of the extra load/store forms in walk order:
/// post reg, post imm, offset reg, pre reg, offset imm, pre imm.
const XLD_FORMS: [usize; 6] = [0x00, 0x04, 0x10, 0x12, 0x14, 0x16];
const LDRD_EXTRAS: u16 = 4;

const fn form_index(forms: &[usize; 6], base: usize) -> usize {
    let mut i = 0;
    while i < 6 {
        if forms[i] == base {
            return i;
        }
        i += 1;
    }
    6
}

/// Extra load/store in row `r` (bits 24:20), Opc4x column `k` (3..=5).
const fn extra_ldst(r: usize, k: usize) -> A32Entry {
    let l = r & 1;
    let form = form_index(&XLD_FORMS, r & 0x16);
    if form == 6 {
        return Entry::Invalid;
    }
    let (opcode, size, load) = match (k, l) {
        (3, 0) => (ArmOp::Strh, OpSize::B2, false),
        (3, _) => (ArmOp::Ldrh, OpSize::B2, true),
        (4, 0) => (ArmOp::Ldrd, OpSize::B8, true),
        (4, _) => (ArmOp::Ldrsb, OpSize::B1, true),
        (5, 0) => (ArmOp::Strd, OpSize::B8, false),
        _ => (ArmOp::Ldrsh, OpSize::B2, true),
    };
    let pair = k != 3 && l == 0;
    let bits = 0xe000_0090 | (((r & !0x8) as u32) << 20) | (((k - 2) as u32) << 5);
    let cont = if form + 1 < 6 {
        at(A32Ext::Opc4x, XLD_FORMS[form + 1] | l, k)
    } else {
        Link::End
    };
    let imm = form == 1 || form == 4 || form == 5;
    let post = form < 2;
    let writeback = form != 2 && form != 4;
    let mem = if post {
        s(A32Ty::MemPost, size)
    } else if imm {
        s(A32Ty::MemImm8, size)
    } else {
        s(A32Ty::MemRegPlain, size)
    };
    let amount = if imm {
        s(A32Ty::Imm8Signed, OpSize::B2)
    } else {
        w(A32Ty::RdIndex)
    };
    let (rt, rn) = (w(A32Ty::Rb), w(A32Ty::Ra));
    let rt2 = w(A32Ty::RbPair);
    if !writeback {
        let (dst, src) = match (load, pair) {
            (true, false) => ([rt, NO], [mem, NO, NO]),
            (true, true) => ([rt, rt2], [mem, NO, NO]),
            (false, false) => ([mem, NO], [rt, NO, NO]),
            (false, true) => ([mem, NO], [rt, rt2, NO]),
        };
        return linked(opcode, bits, dst, src, P, Eflags::NONE, cont);
    }
    if !pair {
        let (dst, src) = if load {
            ([rt, rn], [mem, amount, rn])
        } else {
            ([mem, rn], [rt, amount, rn])
        };
        return linked(opcode, bits, dst, src, P, Eflags::NONE, cont);
    }
    // Doubleword writeback forms run out of slots; the base read is an extra.
    let slot = match form {
        0 => 0,
        1 => 1,
        3 => 2,
        _ => 3,
    };
    let extra = LDRD_EXTRAS + (k as u16 - 4) * 4 + slot;
    let flags = P.union(Flags::EXTRA_OPERANDS).union(Flags::EXTRA_WRITEBACK);
    if load {
        linked(
            opcode,
            bits,
            [rt, rt2],
            [rn, mem, amount],
            flags.union(Flags::DST3),
            Eflags::NONE,
            Link::Extra(extra),
        )
    } else {
        linked(
            opcode,
            bits,
            [mem, rn],
            [rt, rt2, amount],
            flags,
            Eflags::NONE,
            Link::Extra(extra),
        )
    }
}

// ── Word and byte transfers ──────────────────────────────────────────────

/// Row bases (I, P, W) of the word/byte forms in walk order:
/// post imm, offset imm, pre imm, post reg, offset reg, pre reg.
const LDST_FORMS: [usize; 6] = [0x40, 0x50, 0x52, 0x60, 0x70, 0x72];
const LDST_EXTRAS: u16 = 12;

const fn ldst_at(row: usize) -> Link<A32Layout> {
    if row < 0x60 {
        at(A32Ext::Top, 0, row)
    } else {
        at(A32Ext::Bit4, row - 0x60, 0)
    }
}

/// `ldr`/`str`/`ldrb`/`strb` in top row `r` (0x40..=0x7f).
const fn ldst(r: usize) -> A32Entry {
    let b = (r >> 2) & 1;
    let l = r & 1;
    let form = form_index(&LDST_FORMS, r & 0x72);
    if form == 6 {
        return Entry::Invalid;
    }
    let (opcode, size) = match (b, l) {
        (0, 0) => (ArmOp::Str, OpSize::B4),
        (0, _) => (ArmOp::Ldr, OpSize::B4),
        (_, 0) => (ArmOp::Strb, OpSize::B1),
        _ => (ArmOp::Ldrb, OpSize::B1),
    };
    let load = l == 1;
    let bits = 0xe000_0000 | (((r & !0x8) as u32) << 20);
    let cont = if form + 1 < 6 {
        ldst_at(LDST_FORMS[form + 1] | (b << 2) | l)
    } else {
        Link::End
    };
    let imm = form < 3;
    let post = form == 0 || form == 3;
    let writeback = form != 1 && form != 4;
    let mem = if post {
        s(A32Ty::MemPost, size)
    } else if imm {
        s(A32Ty::MemImm12, size)
    } else {
        s(A32Ty::MemReg, size)
    };
    let (rt, rn) = (w(A32Ty::Rb), w(A32Ty::Ra));
    if !writeback {
        let (dst, src) = if load {
            ([rt, NO], [mem, NO, NO])
        } else {
            ([mem, NO], [rt, NO, NO])
        };
        return linked(opcode, bits, dst, src, P, Eflags::NONE, cont);
    }
    if imm {
        let amount = s(A32Ty::Imm12Signed, OpSize::B2);
        let (dst, src) = if load {
            ([rt, rn], [mem, amount, rn])
        } else {
            ([mem, rn], [rt, amount, rn])
        };
        return linked(opcode, bits, dst, src, P, Eflags::NONE, cont);
    }
    // Register writeback: index, shift type, then the amount and base as extras.
    let index = w(A32Ty::RdIndex);
    let shift = s(A32Ty::ShTyIdx, OpSize::Bits(2));
    let extra = LDST_EXTRAS + ((b * 2 + l) as u16) * 2 + if form == 5 { 1 } else { 0 };
    let flags = P
        .union(Flags::EXTRA_OPERANDS)
        .union(Flags::EXTRA_SHIFT)
        .union(Flags::EXTRA_WRITEBACK);
    let (dst, src) = if load {
        ([rt, rn], [mem, index, shift])
    } else {
        ([mem, rn], [rt, index, shift])
    };
    linked(opcode, bits, dst, src, flags, Eflags::NONE, Link::Extra(extra))
}

/// Extra operands of the register-writeback forms, indexed like
/// [`LDST_EXTRAS`]: opcode (str, ldr, strb, ldrb) times two plus pre.
const fn ldst_extra(i: usize) -> A32Info {
    let b = (i >> 2) & 1;
    let l = (i >> 1) & 1;
    let pre = i & 1 == 1;
    let opcode = match (b, l) {
        (0, 0) => ArmOp::Str,
        (0, _) => ArmOp::Ldr,
        (_, 0) => ArmOp::Strb,
        _ => ArmOp::Ldrb,
    };
    let form = if pre { 5 } else { 3 };
    let cont = if form + 1 < 6 {
        ldst_at(LDST_FORMS[form + 1] | (b << 2) | l)
    } else {
        Link::End
    };
    side(
        opcode,
        [s(A32Ty::Imm5Idx, OpSize::Bits(5)), w(A32Ty::Ra), NO],
        cont,
    )
}

/// Extra base read of the doubleword writeback forms.
const fn ldrd_extra(i: usize) -> A32Info {
    let k = 4 + i / 4;
    let form = match i % 4 {
        0 => 0,
        1 => 1,
        2 => 3,
        _ => 5,
    };
    let opcode = if k == 4 { ArmOp::Ldrd } else { ArmOp::Strd };
    let cont = if form + 1 < 6 {
        at(A32Ext::Opc4x, XLD_FORMS[form + 1], k)
    } else {
        Link::End
    };
    side(opcode, [w(A32Ty::Ra), NO, NO], cont)
}

const fn side(opcode: ArmOp, src: [S; 3], next: Link<A32Layout>) -> A32Info {
    OpInfo {
        opcode: Opcode::Arm(opcode),
        bits: 0,
        mask: 0,
        name: opcode.name(),
        dst: [NO, NO],
        src,
        flags: Flags::NONE,
        eflags: Eflags::NONE,
        next,
    }
}

// ── Block transfers ──────────────────────────────────────────────────────

/// `ldm`/`stm` in top row `r` (0x80..=0x9f).
const fn block(r: usize) -> A32Entry {
    if r & 0x4 != 0 {
        return Entry::Invalid;
    }
    let p = (r >> 4) & 1;
    let u = (r >> 3) & 1;
    let wb = r & 0x2 != 0;
    let load = r & 1 == 1;
    let opcode = match (p, u, load) {
        (0, 0, false) => ArmOp::Stmda,
        (0, 1, false) => ArmOp::Stm,
        (1, 0, false) => ArmOp::Stmdb,
        (1, _, false) => ArmOp::Stmib,
        (0, 0, true) => ArmOp::Ldmda,
        (0, 1, true) => ArmOp::Ldm,
        (1, 0, true) => ArmOp::Ldmdb,
        _ => ArmOp::Ldmib,
    };
    let bits = 0xe000_0000 | ((r as u32) << 20);
    let next = if wb { Link::End } else { at(A32Ext::Top, 0, r | 2) };
    let mem = s(A32Ty::MemList, OpSize::RegList);
    let list = w(A32Ty::RegList);
    let rn = w(A32Ty::Ra);
    let (dst, src) = match (load, wb) {
        (true, false) => ([list, NO], [mem, NO, NO]),
        (true, true) => ([list, rn], [mem, rn, NO]),
        (false, false) => ([mem, NO], [list, NO, NO]),
        (false, true) => ([mem, rn], [list, rn, NO]),
    };
    linked(opcode, bits, dst, src, P, Eflags::NONE, next)
}

// ── VFP ──────────────────────────────────────────────────────────────────

const V: Flags = Flags::PREDICATE_28.union(Flags::VFP);

const fn vfp(op: ArmOp, bits: u32, dst: [S; 2], src: [S; 3]) -> A32Entry {
    Entry::Op(info(op, bits, dst, src, V, Eflags::NONE, Link::End))
}

const fn vfp_linked(op: ArmOp, bits: u32, dst: [S; 2], src: [S; 3], next: Link<A32Layout>) -> A32Entry {
    Entry::Op(info(op, bits, dst, src, V, Eflags::NONE, next))
}

const SS: S = s(A32Ty::VbS, OpSize::B4);
const SN: S = s(A32Ty::VaS, OpSize::B4);
const SM: S = s(A32Ty::VcS, OpSize::B4);
const DD: S = s(A32Ty::VbD, OpSize::B8);
const DN: S = s(A32Ty::VaD, OpSize::B8);
const DM: S = s(A32Ty::VcD, OpSize::B8);
const FPSCR: S = w(A32Ty::Fpscr);

/// Three-register arithmetic at `bits` (single) and `bits | 0x100` (double).
const fn vfp_arith(f32op: ArmOp, f64op: ArmOp, bits: u32) -> (A32Entry, A32Entry) {
    (
        vfp(f32op, bits, [SS, NO], [SN, SM, NO]),
        vfp(f64op, bits | 0x100, [DD, NO], [DN, DM, NO]),
    )
}

/// `1D11` space: immediate moves, the Opc2 group, and `vmrs` when D is set.
const fn vfp_misc(with_vmrs: bool) -> [A32Entry; 9] {
    let mut t = [Entry::Invalid; 9];
    let imm = s(A32Ty::VfpImm8, OpSize::B4);
    t[0] = vfp_linked(ArmOp::VmovF32, 0xeeb0_0a00, [SS, NO], [imm, NO, NO], at(A32Ext::Opc2, 0, 0));
    t[1] = Entry::Ext(A32Ext::Opc2, 0);
    t[2] = vfp_linked(
        ArmOp::VmovF64,
        0xeeb0_0b00,
        [DD, NO],
        [s(A32Ty::VfpImm8, OpSize::B8), NO, NO],
        at(A32Ext::Opc2, 1, 0),
    );
    t[3] = Entry::Ext(A32Ext::Opc2, 1);
    if with_vmrs {
        t[4] = Entry::Op(info(
            ArmOp::Vmrs,
            0xeef1_0a10,
            [w(A32Ty::RbApsr), NO],
            [FPSCR, NO, NO],
            V,
            Eflags::WRITE_NZCV,
            Link::End,
        ));
    }
    t
}

const fn vfp_sets() -> [[A32Entry; 9]; 8] {
    let mut sets = [[Entry::Invalid; 9]; 8];
    sets[0][4] = vfp_linked(ArmOp::Vmov, 0xee00_0a10, [SN, NO], [w(A32Ty::Rb), NO, NO], at(A32Ext::Vfp, 1, 4));
    sets[1][4] = vfp(ArmOp::Vmov, 0xee10_0a10, [w(A32Ty::Rb), NO], [SN, NO, NO]);
    // Row 0 / 2 single / double; row 1 / 3 the same with bit 6 set.
    (sets[2][0], sets[2][2]) = vfp_arith(ArmOp::VmulF32, ArmOp::VmulF64, 0xee20_0a00);
    (sets[3][0], sets[3][2]) = vfp_arith(ArmOp::VaddF32, ArmOp::VaddF64, 0xee30_0a00);
    (sets[3][1], sets[3][3]) = vfp_arith(ArmOp::VsubF32, ArmOp::VsubF64, 0xee30_0a40);
    (sets[4][0], sets[4][2]) = vfp_arith(ArmOp::VdivF32, ArmOp::VdivF64, 0xee80_0a00);
    sets[5] = vfp_misc(false);
    sets[6] = vfp_misc(true);
    sets[7][4] = vfp(ArmOp::Vmsr, 0xeee1_0a10, [FPSCR, NO], [w(A32Ty::Rb), NO, NO]);
    sets
}

/// Two-register operations by opc2:bit7, for one precision.
const fn opc2_set(double: bool) -> [A32Entry; 32] {
    let mut t = [Entry::Invalid; 32];
    let sz = if double { 0x100 } else { 0 };
    let (d, m) = if double { (DD, DM) } else { (SS, SM) };
    let set = if double { 1 } else { 0 };
    t[0] = vfp(if double { ArmOp::VmovF64 } else { ArmOp::VmovF32 }, 0xeeb0_0a40 | sz, [d, NO], [m, NO, NO]);
    t[1] = vfp(if double { ArmOp::VabsF64 } else { ArmOp::VabsF32 }, 0xeeb0_0ac0 | sz, [d, NO], [m, NO, NO]);
    t[2] = vfp(if double { ArmOp::VnegF64 } else { ArmOp::VnegF32 }, 0xeeb1_0a40 | sz, [d, NO], [m, NO, NO]);
    t[3] = vfp(if double { ArmOp::VsqrtF64 } else { ArmOp::VsqrtF32 }, 0xeeb1_0ac0 | sz, [d, NO], [m, NO, NO]);
    t[8] = vfp_linked(
        if double { ArmOp::VcmpF64 } else { ArmOp::VcmpF32 },
        0xeeb4_0a40 | sz,
        [FPSCR, NO],
        [d, m, NO],
        at(A32Ext::Opc2, set, 10),
    );
    let zero = s(A32Ty::FpZero, if double { OpSize::B8 } else { OpSize::B4 });
    t[10] = vfp(
        if double { ArmOp::VcmpF64 } else { ArmOp::VcmpF32 },
        0xeeb5_0a40 | sz,
        [FPSCR, NO],
        [d, zero, NO],
    );
    t[15] = if double {
        vfp(ArmOp::VcvtF32F64, 0xeeb7_0bc0, [SS, NO], [DM, NO, NO])
    } else {
        vfp(ArmOp::VcvtF64F32, 0xeeb7_0ac0, [DD, NO], [SM, NO, NO])
    };
    t
}

const fn vfp_ldst(load: bool) -> [A32Entry; 16] {
    let mut t = [Entry::Invalid; 16];
    let (opcode, base) = if load {
        (ArmOp::Vldr, 0xed10_0a00)
    } else {
        (ArmOp::Vstr, 0xed00_0a00)
    };
    let set = if load { 1 } else { 0 };
    let m4 = s(A32Ty::MemVfp, OpSize::B4);
    let m8 = s(A32Ty::MemVfp, OpSize::B8);
    let (single, double) = if load {
        (([SS, NO], [m4, NO, NO]), ([DD, NO], [m8, NO, NO]))
    } else {
        (([m4, NO], [SS, NO, NO]), ([m8, NO], [DD, NO, NO]))
    };
    t[10] = vfp_linked(opcode, base, single.0, single.1, at(A32Ext::Bits8, set, 11));
    t[11] = vfp(opcode, base | 0x100, double.0, double.1);
    t
}

// ── Top tables ───────────────────────────────────────────────────────────

const fn is_misc(r: usize) -> bool {
    matches!(r, 0x10 | 0x12 | 0x14 | 0x16)
}

/// Conditional top row `r`.
const fn pred_row(r: usize) -> A32Entry {
    match r >> 5 {
        0 => Entry::Ext(A32Ext::Opc4x, r as u16),
        1 => match r & 0x1f {
            0x10 => op(ArmOp::Movw, 0xe300_0000, [w(A32Ty::Rb), NO], [s(A32Ty::Imm16, OpSize::B2), NO, NO], Eflags::NONE),
            0x14 => op(ArmOp::Movt, 0xe340_0000, [w(A32Ty::Rb), NO], [s(A32Ty::Imm16, OpSize::B2), NO, NO], Eflags::NONE),
            0x12 => Entry::Ext(A32Ext::Imm1916, 0),
            0x16 => Entry::Invalid,
            low => dp(low, IMMEDIATE),
        },
        2 => ldst(r),
        3 => Entry::Ext(A32Ext::Bit4, (r - 0x60) as u16),
        4 => block(r),
        5 => {
            let pc = s(A32Ty::Pc24, OpSize::None);
            if r < 0xb0 {
                op(ArmOp::B, 0xea00_0000, [NO, NO], [pc, NO, NO], Eflags::NONE)
            } else {
                op(ArmOp::Bl, 0xeb00_0000, [w(A32Ty::Lr), NO], [pc, NO, NO], Eflags::NONE)
            }
        }
        6 => {
            // vldr / vstr: P=1 W=0 only.
            if r & 0xf2 == 0xd0 {
                Entry::Ext(A32Ext::Bits8, (r & 1) as u16)
            } else {
                Entry::Invalid
            }
        }
        _ => match r {
            0xe0 => Entry::Ext(A32Ext::Vfp, 0),
            0xe1 => Entry::Ext(A32Ext::Vfp, 1),
            0xe2 | 0xe6 => Entry::Ext(A32Ext::Vfp, 2),
            0xe3 | 0xe7 => Entry::Ext(A32Ext::Vfp, 3),
            0xe8 | 0xec => Entry::Ext(A32Ext::Vfp, 4),
            0xeb => Entry::Ext(A32Ext::Vfp, 5),
            0xef => Entry::Ext(A32Ext::Vfp, 6),
            0xee => Entry::Ext(A32Ext::Vfp, 7),
            0xf0..=0xff => op(ArmOp::Svc, 0xef00_0000, [NO, NO], [w(A32Ty::Imm24), NO, NO], Eflags::NONE),
            _ => Entry::Invalid,
        },
    }
}

/// Unconditional-space top row `r`.
const fn uncond_row(r: usize) -> A32Entry {
    match r {
        0x55 | 0x5d => linked(
            ArmOp::Pld,
            0xf550_f000,
            [NO, NO],
            [s(A32Ty::MemImm12, OpSize::None), NO, NO],
            Flags::NONE,
            Eflags::NONE,
            at(A32Ext::Bit4, 32, 0),
        ),
        0x75 | 0x7d => Entry::Ext(A32Ext::Bit4, 32),
        0xa0..=0xbf => linked(
            ArmOp::Blx,
            0xfa00_0000,
            [w(A32Ty::Lr), NO],
            [s(A32Ty::Pc24H, OpSize::None), NO, NO],
            Flags::NONE,
            Eflags::NONE,
            Link::End,
        ),
        _ => Entry::Invalid,
    }
}

const fn opc4x_set(r: usize) -> [A32Entry; 6] {
    let mut t = [Entry::Invalid; 6];
    if is_misc(r) {
        t[0] = Entry::Ext(A32Ext::Opc4, ((r - 0x10) / 2) as u16);
        t[1] = Entry::Ext(A32Ext::Opc4, ((r - 0x10) / 2) as u16);
    } else {
        t[0] = dp(r, IMM_SHIFT);
        t[1] = dp(r, REG_SHIFT);
    }
    if r < 0x10 {
        t[2] = multiply(r);
    }
    t[3] = extra_ldst(r, 3);
    t[4] = extra_ldst(r, 4);
    t[5] = extra_ldst(r, 5);
    t
}

const fn misc_sets() -> [[A32Entry; 16]; 4] {
    let mut t = [[Entry::Invalid; 16]; 4];
    let rm = w(A32Ty::Rd);
    let mask = s(A32Ty::Imm4Mask, OpSize::Bits(4));
    t[0][0] = Entry::Op(info(
        ArmOp::Mrs,
        0xe10f_0000,
        [w(A32Ty::Rb), NO],
        [w(A32Ty::Cpsr), NO, NO],
        P,
        STATUS_READ,
        at(A32Ext::Opc4, 2, 0),
    ));
    t[1][0] = Entry::Op(info(
        ArmOp::Msr,
        0xe120_f000,
        [w(A32Ty::Cpsr), NO],
        [mask, rm, NO],
        P,
        STATUS_WRITE,
        at(A32Ext::Opc4, 3, 0),
    ));
    t[1][1] = linked(ArmOp::Bx, 0xe12f_ff10, [NO, NO], [rm, NO, NO], P, Eflags::NONE, Link::End);
    t[1][3] = linked(
        ArmOp::Blx,
        0xe12f_ff30,
        [w(A32Ty::Lr), NO],
        [rm, NO, NO],
        P,
        Eflags::NONE,
        at(A32Ext::Top, 1, 0xa0),
    );
    t[1][7] = linked(
        ArmOp::Bkpt,
        0xe120_0070,
        [NO, NO],
        [s(A32Ty::Imm16Split12, OpSize::B2), NO, NO],
        Flags::PREDICATE_28_AL,
        Eflags::NONE,
        Link::End,
    );
    t[2][0] = op(ArmOp::Mrs, 0xe14f_0000, [w(A32Ty::Rb), NO], [w(A32Ty::Spsr), NO, NO], Eflags::NONE);
    t[3][0] = Entry::Op(info(
        ArmOp::Msr,
        0xe160_f000,
        [w(A32Ty::Spsr), NO],
        [mask, rm, NO],
        P,
        Eflags::NONE,
        at(A32Ext::Imm1916, 0, 1),
    ));
    t[3][1] = op(ArmOp::Clz, 0xe16f_0f10, [w(A32Ty::Rb), NO], [rm, NO, NO], Eflags::NONE);
    t
}

const fn hints() -> [A32Entry; 8] {
    let mut t = [Entry::Invalid; 8];
    let ops = [ArmOp::Nop, ArmOp::Yield, ArmOp::Wfe, ArmOp::Wfi, ArmOp::Sev];
    let mut i = 0;
    while i < ops.len() {
        t[i] = op(ops[i], 0xe320_f000 | i as u32, [NO, NO], [NO, NO, NO], Eflags::NONE);
        i += 1;
    }
    t
}

const fn bit4_sets() -> [[A32Entry; 2]; 33] {
    let mut t = [[Entry::Invalid; 2]; 33];
    let mut i = 0;
    while i < 32 {
        let r = 0x60 + i;
        t[i][0] = ldst(r);
        let (ra, rc, rd) = (w(A32Ty::Ra), w(A32Ty::Rc), w(A32Ty::Rd));
        t[i][1] = match r {
            0x71 => op(ArmOp::Sdiv, 0xe710_f010, [ra, NO], [rd, rc, NO], Eflags::NONE),
            0x73 => op(ArmOp::Udiv, 0xe730_f010, [ra, NO], [rd, rc, NO], Eflags::NONE),
            0x7f => linked(
                ArmOp::Udf,
                0xe7f0_00f0,
                [NO, NO],
                [s(A32Ty::Imm16Split12, OpSize::B2), NO, NO],
                Flags::PREDICATE_28_AL,
                Eflags::NONE,
                Link::End,
            ),
            _ => Entry::Invalid,
        };
        i += 1;
    }
    t[32][0] = linked(
        ArmOp::Pld,
        0xf750_f000,
        [NO, NO],
        [s(A32Ty::MemReg, OpSize::None), NO, NO],
        Flags::NONE,
        Eflags::NONE,
        Link::End,
    );
    t
}

const fn extras() -> [A32Info; 20] {
    let long = [ArmOp::Umlal, ArmOp::Umlals, ArmOp::Smlal, ArmOp::Smlals];
    let mut t = [side(ArmOp::Umlal, [NO, NO, NO], Link::End); 20];
    let mut i = 0;
    while i < 4 {
        t[i] = side(long[i], [w(A32Ty::Rb), w(A32Ty::Ra), NO], Link::End);
        i += 1;
    }
    while i < 12 {
        t[i] = ldrd_extra(i - LDRD_EXTRAS as usize);
        i += 1;
    }
    while i < 20 {
        t[i] = ldst_extra(i - LDST_EXTRAS as usize);
        i += 1;
    }
    t
}

static A32_PRED: [A32Entry; 256] = {
    let mut t = [Entry::Invalid; 256];
    let mut r = 0;
    while r < 256 {
        t[r] = pred_row(r);
        r += 1;
    }
    t
};

static A32_UNCOND: [A32Entry; 256] = {
    let mut t = [Entry::Invalid; 256];
    let mut r = 0;
    while r < 256 {
        t[r] = uncond_row(r);
        r += 1;
    }
    t
};

static A32_OPC4X: [[A32Entry; 6]; 32] = {
    let mut t = [[Entry::Invalid; 6]; 32];
    let mut r = 0;
    while r < 32 {
        t[r] = opc4x_set(r);
        r += 1;
    }
    t
};

static A32_OPC4: [[A32Entry; 16]; 4] = misc_sets();

static A32_IMM1916: [[A32Entry; 2]; 1] = [[
    Entry::Ext(A32Ext::Bits0, 0),
    linked(
        ArmOp::Msr,
        // Field mask `f`; an all-zero mask selects the hint space.
        0xe328_f000,
        [w(A32Ty::Cpsr), NO],
        [s(A32Ty::Imm4Mask, OpSize::Bits(4)), w(A32Ty::Imm8Rot), NO],
        P,
        STATUS_WRITE,
        Link::End,
    ),
]];

static A32_BITS0: [[A32Entry; 8]; 1] = [hints()];
static A32_BIT4: [[A32Entry; 2]; 33] = bit4_sets();
static A32_BITS8: [[A32Entry; 16]; 2] = [vfp_ldst(false), vfp_ldst(true)];
static A32_VFP: [[A32Entry; 9]; 8] = vfp_sets();
static A32_OPC2: [[A32Entry; 32]; 2] = [opc2_set(false), opc2_set(true)];
static A32_EXTRAS: [A32Info; 20] = extras();
