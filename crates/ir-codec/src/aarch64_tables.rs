//! AArch64 opcodes and decode tables.
//!
//! The root table is indexed by op0 (bits 28:25), which separates the five
//! encoding groups the forest covers: data processing with immediates,
//! branches and system instructions, loads and stores, data processing with
//! registers, and scalar floating point. Operand width is not a table
//! dimension. The `sf` bit and the FP `ptype` field belong to the register
//! operand types, so one entry serves both the 32- and 64-bit forms and the
//! encoder derives those bits from the registers it is given.
//!
//! ```text
//! 31  30..29  28..25  24..21   20..16  15..10  9..5  4..0
//! sf  opc     op0     (group)  Rm      imm6    Rn    Rd
//! ```

use crate::instr::{Eflags, Opcode};
use crate::size::OpSize;
use crate::table::{opcode_enum, Entry, EntryRef, Flags, Layout, Link, OpInfo, Slot};

opcode_enum! {
    /// AArch64 opcode.
    pub enum A64Op {
        Add => "add",
        Adds => "adds",
        Sub => "sub",
        Subs => "subs",
        And => "and",
        Ands => "ands",
        Orr => "orr",
        Eor => "eor",
        Bic => "bic",
        Bics => "bics",
        Orn => "orn",
        Eon => "eon",
        Movn => "movn",
        Movz => "movz",
        Movk => "movk",
        Adr => "adr",
        Adrp => "adrp",
        Sbfm => "sbfm",
        Bfm => "bfm",
        Ubfm => "ubfm",
        Madd => "madd",
        Msub => "msub",
        Smaddl => "smaddl",
        Smsubl => "smsubl",
        Umaddl => "umaddl",
        Umsubl => "umsubl",
        Smulh => "smulh",
        Umulh => "umulh",
        Udiv => "udiv",
        Sdiv => "sdiv",
        Lslv => "lslv",
        Lsrv => "lsrv",
        Asrv => "asrv",
        Rorv => "rorv",
        Rbit => "rbit",
        Rev16 => "rev16",
        Clz => "clz",
        Cls => "cls",
        Csel => "csel",
        Csinc => "csinc",
        Csinv => "csinv",
        Csneg => "csneg",
        B => "b",
        Bl => "bl",
        Bcond => "b.cond",
        Cbz => "cbz",
        Cbnz => "cbnz",
        Tbz => "tbz",
        Tbnz => "tbnz",
        Br => "br",
        Blr => "blr",
        Ret => "ret",
        Svc => "svc",
        Hvc => "hvc",
        Brk => "brk",
        Hlt => "hlt",
        Nop => "nop",
        Yield => "yield",
        Wfe => "wfe",
        Wfi => "wfi",
        Sev => "sev",
        Sevl => "sevl",
        Dsb => "dsb",
        Dmb => "dmb",
        Isb => "isb",
        Mrs => "mrs",
        Msr => "msr",
        Ldr => "ldr",
        Str => "str",
        Ldrb => "ldrb",
        Strb => "strb",
        Ldrh => "ldrh",
        Strh => "strh",
        Ldrsb => "ldrsb",
        Ldrsh => "ldrsh",
        Ldrsw => "ldrsw",
        Ldp => "ldp",
        Stp => "stp",
        Prfm => "prfm",
        Fadd => "fadd",
        Fsub => "fsub",
        Fmul => "fmul",
        Fdiv => "fdiv",
        Fnmul => "fnmul",
        Fmax => "fmax",
        Fmin => "fmin",
        Fmov => "fmov",
        Fabs => "fabs",
        Fneg => "fneg",
        Fsqrt => "fsqrt",
        Fcvt => "fcvt",
        Fcmp => "fcmp",
        Fcmpe => "fcmpe",
        Scvtf => "scvtf",
        Ucvtf => "ucvtf",
        Fcvtzs => "fcvtzs",
        Fcvtzu => "fcvtzu",
    }
}

// ── Layout ───────────────────────────────────────────────────────────────

/// The A64 table forest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct A64Layout;

/// A64 table kinds; each documents the bits it selects a row with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum A64Ext {
    /// op0, bits 28:25.
    Top,
    /// Bits 25:23.
    DpImm,
    /// Bits 30:29. Sets: add/sub immediate, logical immediate, move wide,
    /// bitfield, add/sub shifted register.
    OpS,
    /// Bit 31.
    Bit31,
    /// Bits 31:29 then bit 25.
    Branch,
    /// Bit 24.
    Bit24,
    /// Exceptions by bits 23:21 when bit 24 is clear; system by L and op0
    /// from row 8 when bits 23:22 are clear; else row 16.
    ExcSys,
    /// Bits 1:0.
    Ll,
    /// op2 for hints (CRn 2, CRm 0), 8 + op2 for barriers (CRn 3); else 16.
    SysHint,
    /// Bits 24:21.
    BrReg,
    /// Bits 29:28 then bit 24.
    LdSt,
    /// Bits 31:30 then bit 26.
    LitOpc,
    /// Bits 24:23: offset, pre-index, post-index, then the rest.
    PairMode,
    /// Bits 31:30, 26 and 22.
    PairOpc,
    /// Register offset, pre-index, post-index (bit 21 and bits 11:10); else 3.
    RegMode,
    /// size (31:30), V (26) and opc (23:22). Sets: register offset,
    /// pre-index, post-index, unsigned offset.
    RegOpc,
    /// Bit 28 then bits 24:21.
    DpReg,
    /// opc (30:29) then N (21).
    LogN,
    /// op (30) then o2 (10).
    CondSel,
    /// Bit 30.
    Bit30,
    /// Bits 13:10 when 15:14 are clear; else 16.
    Dp2,
    /// Bits 12:10 when 20:13 are clear; else 8.
    Dp1,
    /// op31 (23:21) then o0 (15).
    Dp3,
    /// Scalar FP class; 8 outside the scalar space.
    Fp,
    /// Bits 15:12.
    Fp2,
    /// rmode:opcode, bits 20:16.
    FpInt,
    /// Bits 18:15 when 20:19 are clear; else 16.
    Fp1,
    /// Bits 4:3.
    FpCmp,
}

/// A64 operand types. The comment names the field each one reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum A64Ty {
    None,
    /// 4:0, width from sf; 31 is the zero register.
    Rd,
    /// 9:5, width from sf; 31 is the zero register.
    Rn,
    /// 20:16, width from sf.
    Rm,
    /// 14:10, width from sf.
    Ra,
    /// 4:0, width from sf; 31 is the stack pointer.
    RdSp,
    /// 9:5, width from sf; 31 is the stack pointer.
    RnSp,
    /// 4:0 at the slot's width.
    Gd,
    /// 9:5 at the slot's width.
    Gn,
    /// 20:16 at the slot's width.
    Gm,
    /// 14:10 at the slot's width.
    Ga,
    /// 4:0 of a test-and-branch, width from b5.
    Rt5,
    Lr,
    /// 4:0, precision from ptype (23:22).
    Fd,
    /// 9:5, precision from ptype.
    Fn,
    /// 20:16, precision from ptype.
    Fm,
    /// 4:0, precision from the `fcvt` target type (16:15).
    FdOpc,
    /// SIMD&FP 4:0 at the slot's width.
    Vd,
    /// SIMD&FP 14:10 at the slot's width.
    Va,
    /// imm12 (21:10), shifted by 12 when bit 22 is set.
    Imm12Sh,
    /// Bitmask immediate N:immr:imms, 22:10.
    LogImm,
    /// 20:5.
    Imm16,
    /// Move-wide shift, hw (22:21) times 16.
    Hw,
    /// immr (21:16) with N (22), which must equal sf.
    Immr,
    /// imms, 15:10.
    Imms,
    /// Shift type 23:22.
    ShTy,
    /// Shift amount 15:10.
    Imm6,
    /// Condition 15:12.
    Cond,
    /// Bit number b5:b40 (31, 23:19).
    TbBit,
    /// Barrier option 11:8.
    CRm,
    /// Prefetch operation 4:0.
    PrfOp,
    /// FP immediate 20:13, precision from ptype.
    FpImm8,
    FpZero,
    /// System register o0:op1:CRn:CRm:op2, 19:5.
    SysReg,
    /// imm26 words from pc.
    Pc26,
    /// imm19 words from pc.
    Pc19,
    /// imm14 words from pc.
    Pc14,
    /// immhi:immlo bytes from pc.
    AdrPc,
    /// immhi:immlo pages from the pc's page.
    AdrpPc,
    /// `[Xn|SP, #imm12*size]`.
    MemUoff,
    /// `[Xn|SP, #simm9]` of a pre-indexed access.
    MemPre,
    /// `[Xn|SP]` of a post-indexed access.
    MemPost,
    /// `[Xn|SP, Rm, extend #amount]`.
    MemReg,
    /// imm19 words from pc.
    MemLit,
    /// `[Xn|SP, #imm7*scale]`.
    MemPair,
    /// Writeback amount simm9, 20:12.
    Imm9Wb,
    /// Writeback amount imm7 times the pair's element size.
    Imm7Wb,
    /// Writeback base Xn|SP, 9:5.
    BaseWb,
}

/// Encoding bits an operand type occupies.
const fn field(ty: A64Ty) -> u32 {
    match ty {
        A64Ty::None | A64Ty::Lr | A64Ty::FpZero => 0,
        A64Ty::Rd | A64Ty::RdSp | A64Ty::Rt5 => 0x8000_001f,
        A64Ty::Rn | A64Ty::RnSp => 0x8000_03e0,
        A64Ty::Rm => 0x801f_0000,
        A64Ty::Ra => 0x8000_7c00,
        A64Ty::Gd | A64Ty::Vd | A64Ty::PrfOp => 0x0000_001f,
        A64Ty::Gn | A64Ty::MemPost | A64Ty::BaseWb => 0x0000_03e0,
        A64Ty::Gm => 0x001f_0000,
        A64Ty::Ga | A64Ty::Va => 0x0000_7c00,
        A64Ty::Fd => 0x00c0_001f,
        A64Ty::Fn => 0x00c0_03e0,
        A64Ty::Fm => 0x00df_0000,
        A64Ty::FdOpc => 0x0001_801f,
        A64Ty::Imm12Sh | A64Ty::LogImm => 0x007f_fc00,
        A64Ty::Imm16 => 0x001f_ffe0,
        A64Ty::Hw => 0x0060_0000,
        A64Ty::Immr => 0x007f_0000,
        A64Ty::Imms | A64Ty::Imm6 => 0x0000_fc00,
        A64Ty::ShTy => 0x00c0_0000,
        A64Ty::Cond => 0x0000_f000,
        A64Ty::TbBit => 0x80f8_0000,
        A64Ty::CRm => 0x0000_0f00,
        A64Ty::FpImm8 => 0x001f_e000,
        A64Ty::SysReg => 0x000f_ffe0,
        A64Ty::Pc26 => 0x03ff_ffff,
        A64Ty::Pc19 | A64Ty::MemLit => 0x00ff_ffe0,
        A64Ty::Pc14 => 0x0007_ffe0,
        A64Ty::AdrPc | A64Ty::AdrpPc => 0x60ff_ffe0,
        A64Ty::MemUoff => 0x003f_ffe0,
        A64Ty::MemPre | A64Ty::MemReg => 0x001f_f3e0,
        A64Ty::MemPair => 0x003f_83e0,
        A64Ty::Imm9Wb => 0x001f_f000,
        A64Ty::Imm7Wb => 0x003f_8000,
    }
}

impl Layout for A64Layout {
    type Ext = A64Ext;
    type Ty = A64Ty;

    const NONE: A64Ty = A64Ty::None;
    const MAX_HOPS: usize = 3;
    const NAME: &'static str = "a64";

    fn roots() -> &'static [(A64Ext, u16)] {
        &[(A64Ext::Top, 0)]
    }

    fn table(kind: A64Ext, set: u16) -> Option<&'static [Entry<Self>]> {
        let set = set as usize;
        let one = |t: &'static [Entry<Self>]| (set == 0).then_some(t);
        match kind {
            A64Ext::Top => one(&A64_TOP),
            A64Ext::DpImm => one(&A64_DP_IMM),
            A64Ext::OpS => A64_OPS.get(set).map(|t| &t[..]),
            A64Ext::Bit31 => one(&A64_ADR),
            A64Ext::Branch => one(&A64_BRANCH),
            A64Ext::Bit24 => A64_BIT24.get(set).map(|t| &t[..]),
            A64Ext::ExcSys => one(&A64_EXC_SYS),
            A64Ext::Ll => one(&A64_EXCEPTION),
            A64Ext::SysHint => one(&A64_SYS_HINT),
            A64Ext::BrReg => one(&A64_BR_REG),
            A64Ext::LdSt => one(&A64_LDST),
            A64Ext::LitOpc => one(&A64_LITERAL),
            A64Ext::PairMode => one(&A64_PAIR_MODE),
            A64Ext::PairOpc => A64_PAIRS.get(set).map(|t| &t[..]),
            A64Ext::RegMode => one(&A64_REG_MODE),
            A64Ext::RegOpc => A64_REG_OPC.get(set).map(|t| &t[..]),
            A64Ext::DpReg => one(&A64_DP_REG),
            A64Ext::LogN => one(&A64_LOGICAL),
            A64Ext::CondSel => one(&A64_COND_SEL),
            A64Ext::Bit30 => one(&A64_DP_SRC),
            A64Ext::Dp2 => one(&A64_DP2),
            A64Ext::Dp1 => one(&A64_DP1),
            A64Ext::Dp3 => one(&A64_DP3),
            A64Ext::Fp => one(&A64_FP),
            A64Ext::Fp2 => one(&A64_FP2),
            A64Ext::FpInt => one(&A64_FP_INT),
            A64Ext::Fp1 => one(&A64_FP1),
            A64Ext::FpCmp => one(&A64_FP_CMP),
        }
    }

    fn width(kind: A64Ext) -> usize {
        match kind {
            A64Ext::OpS | A64Ext::Ll | A64Ext::PairMode | A64Ext::RegMode | A64Ext::CondSel | A64Ext::FpCmp => 4,
            A64Ext::Bit31 | A64Ext::Bit24 | A64Ext::Bit30 => 2,
            A64Ext::DpImm | A64Ext::LdSt | A64Ext::LitOpc | A64Ext::LogN | A64Ext::Dp1 | A64Ext::Fp => 8,
            A64Ext::Top
            | A64Ext::Branch
            | A64Ext::ExcSys
            | A64Ext::SysHint
            | A64Ext::BrReg
            | A64Ext::PairOpc
            | A64Ext::Dp2
            | A64Ext::Dp3
            | A64Ext::Fp2
            | A64Ext::Fp1 => 16,
            A64Ext::RegOpc | A64Ext::DpReg | A64Ext::FpInt => 32,
        }
    }

    fn extra(index: u16) -> Option<&'static OpInfo<Self>> {
        A64_EXTRAS.get(index as usize)
    }
}

// ── Entry builders ───────────────────────────────────────────────────────

type A64Entry = Entry<A64Layout>;
type A64Info = OpInfo<A64Layout>;
type S = Slot<A64Ty>;

const fn s(ty: A64Ty, size: OpSize) -> S {
    Slot { ty, size }
}

/// Slot whose width comes from the encoding (sf or ptype).
const fn r(ty: A64Ty) -> S {
    s(ty, OpSize::None)
}

const NO: S = s(A64Ty::None, OpSize::None);
const X: OpSize = OpSize::B8;
const W: OpSize = OpSize::B4;

const fn info(
    op: A64Op,
    bits: u32,
    dst: [S; 2],
    src: [S; 3],
    flags: Flags,
    eflags: Eflags,
    next: Link<A64Layout>,
) -> A64Info {
    let mut fields = field(dst[0].ty)
        | field(dst[1].ty)
        | field(src[0].ty)
        | field(src[1].ty)
        | field(src[2].ty);
    if flags.contains(Flags::PREDICATE_0) {
        fields |= 0xf;
    }
    OpInfo {
        opcode: Opcode::A64(op),
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

const fn op(op: A64Op, bits: u32, dst: [S; 2], src: [S; 3], eflags: Eflags) -> A64Entry {
    Entry::Op(info(op, bits, dst, src, Flags::NONE, eflags, Link::End))
}

const fn linked(
    op: A64Op,
    bits: u32,
    dst: [S; 2],
    src: [S; 3],
    flags: Flags,
    eflags: Eflags,
    next: Link<A64Layout>,
) -> A64Entry {
    Entry::Op(info(op, bits, dst, src, flags, eflags, next))
}

const fn at(kind: A64Ext, set: usize, row: usize) -> Link<A64Layout> {
    Link::At(EntryRef {
        kind,
        set: set as u16,
        row: row as u16,
    })
}

const fn same(a: A64Op, b: A64Op) -> bool {
    a as u16 == b as u16
}

const NZCV_OUT: Eflags = Eflags::WRITE_NZCV;
const NZCV_IN: Eflags = Eflags::READ_NZCV;

const fn nzcv_if(set_flags: bool) -> Eflags {
    if set_flags {
        NZCV_OUT
    } else {
        Eflags::NONE
    }
}

// ── Data processing, immediate ───────────────────────────────────────────

const ADDSUB_IMM: usize = 0;
const LOGICAL_IMM: usize = 1;
const MOVE_WIDE: usize = 2;
const BITFIELD: usize = 3;
const ADDSUB_REG: u16 = 4;

const ADDSUB: [A64Op; 4] = [A64Op::Add, A64Op::Adds, A64Op::Sub, A64Op::Subs];

/// Add/sub immediate, row `i` = op:S. The flag-setting forms write the zero
/// register rather than sp.
const fn add_sub_imm(i: usize) -> A64Entry {
    let rd = if i & 1 == 1 { r(A64Ty::Rd) } else { r(A64Ty::RdSp) };
    op(
        ADDSUB[i],
        0x1100_0000 | ((i as u32) << 29),
        [rd, NO],
        [r(A64Ty::RnSp), s(A64Ty::Imm12Sh, OpSize::Bits(24)), NO],
        nzcv_if(i & 1 == 1),
    )
}

/// Add/sub shifted register. Chain: shifted register → immediate.
const fn add_sub_reg(i: usize) -> A64Entry {
    linked(
        ADDSUB[i],
        0x0b00_0000 | ((i as u32) << 29),
        [r(A64Ty::Rd), s(A64Ty::Imm6, OpSize::Bits(6))],
        [r(A64Ty::Rn), r(A64Ty::Rm), s(A64Ty::ShTy, OpSize::Bits(2))],
        Flags::SRC4,
        nzcv_if(i & 1 == 1),
        at(A64Ext::OpS, ADDSUB_IMM, i),
    )
}

const LOGICAL_IMM_OPS: [A64Op; 4] = [A64Op::And, A64Op::Orr, A64Op::Eor, A64Op::Ands];

const fn logical_imm(i: usize) -> A64Entry {
    let rd = if i == 3 { r(A64Ty::Rd) } else { r(A64Ty::RdSp) };
    op(
        LOGICAL_IMM_OPS[i],
        0x1200_0000 | ((i as u32) << 29),
        [rd, NO],
        [r(A64Ty::Rn), s(A64Ty::LogImm, OpSize::B8), NO],
        nzcv_if(i == 3),
    )
}

/// Logical shifted register, row `i` = opc:N. The four opcodes with an
/// immediate form chain to it.
const fn logical_reg(i: usize) -> A64Entry {
    const OPS: [A64Op; 8] = [
        A64Op::And,
        A64Op::Bic,
        A64Op::Orr,
        A64Op::Orn,
        A64Op::Eor,
        A64Op::Eon,
        A64Op::Ands,
        A64Op::Bics,
    ];
    let next = if i & 1 == 0 {
        at(A64Ext::OpS, LOGICAL_IMM, i >> 1)
    } else {
        Link::End
    };
    linked(
        OPS[i],
        0x0a00_0000 | (((i >> 1) as u32) << 29) | (((i & 1) as u32) << 21),
        [r(A64Ty::Rd), s(A64Ty::Imm6, OpSize::Bits(6))],
        [r(A64Ty::Rn), r(A64Ty::Rm), s(A64Ty::ShTy, OpSize::Bits(2))],
        Flags::SRC4,
        nzcv_if(i >= 6),
        next,
    )
}

const fn move_wide(i: usize) -> A64Entry {
    let bits = 0x1280_0000 | ((i as u32) << 29);
    let imm = s(A64Ty::Imm16, OpSize::B2);
    let hw = s(A64Ty::Hw, OpSize::Bits(6));
    match i {
        0 => op(A64Op::Movn, bits, [r(A64Ty::Rd), NO], [imm, hw, NO], Eflags::NONE),
        2 => op(A64Op::Movz, bits, [r(A64Ty::Rd), NO], [imm, hw, NO], Eflags::NONE),
        // movk keeps the other halfwords, so it reads its destination.
        3 => op(A64Op::Movk, bits, [r(A64Ty::Rd), NO], [r(A64Ty::Rd), imm, hw], Eflags::NONE),
        _ => Entry::Invalid,
    }
}

const fn bitfield(i: usize) -> A64Entry {
    let bits = 0x1300_0000 | ((i as u32) << 29);
    let immr = s(A64Ty::Immr, OpSize::Bits(6));
    let imms = s(A64Ty::Imms, OpSize::Bits(6));
    match i {
        0 => op(A64Op::Sbfm, bits, [r(A64Ty::Rd), NO], [r(A64Ty::Rn), immr, imms], Eflags::NONE),
        1 => linked(
            A64Op::Bfm,
            bits,
            [r(A64Ty::Rd), imms],
            [r(A64Ty::Rd), r(A64Ty::Rn), immr],
            Flags::SRC4,
            Eflags::NONE,
            Link::End,
        ),
        2 => op(A64Op::Ubfm, bits, [r(A64Ty::Rd), NO], [r(A64Ty::Rn), immr, imms], Eflags::NONE),
        _ => Entry::Invalid,
    }
}

const fn ops_sets() -> [[A64Entry; 4]; 5] {
    let mut t = [[Entry::Invalid; 4]; 5];
    let mut i = 0;
    while i < 4 {
        t[ADDSUB_IMM][i] = add_sub_imm(i);
        t[LOGICAL_IMM][i] = logical_imm(i);
        t[MOVE_WIDE][i] = move_wide(i);
        t[BITFIELD][i] = bitfield(i);
        t[ADDSUB_REG as usize][i] = add_sub_reg(i);
        i += 1;
    }
    t
}

// ── Branches, exceptions, system ─────────────────────────────────────────

const fn hints() -> [A64Entry; 16] {
    let mut t = [Entry::Invalid; 16];
    let ops = [A64Op::Nop, A64Op::Yield, A64Op::Wfe, A64Op::Wfi, A64Op::Sev, A64Op::Sevl];
    let mut i = 0;
    while i < ops.len() {
        t[i] = op(ops[i], 0xd503_201f | ((i as u32) << 5), [NO, NO], [NO, NO, NO], Eflags::NONE);
        i += 1;
    }
    let crm = s(A64Ty::CRm, OpSize::Bits(4));
    t[8 + 4] = op(A64Op::Dsb, 0xd503_309f, [NO, NO], [crm, NO, NO], Eflags::NONE);
    t[8 + 5] = op(A64Op::Dmb, 0xd503_30bf, [NO, NO], [crm, NO, NO], Eflags::NONE);
    t[8 + 6] = op(A64Op::Isb, 0xd503_30df, [NO, NO], [crm, NO, NO], Eflags::NONE);
    t
}

const fn exc_sys() -> [A64Entry; 16] {
    let mut t = [Entry::Invalid; 16];
    let imm16 = s(A64Ty::Imm16, OpSize::B2);
    let sysreg = s(A64Ty::SysReg, OpSize::B2);
    t[0] = Entry::Ext(A64Ext::Ll, 0);
    t[1] = op(A64Op::Brk, 0xd420_0000, [NO, NO], [imm16, NO, NO], Eflags::NONE);
    t[2] = op(A64Op::Hlt, 0xd440_0000, [NO, NO], [imm16, NO, NO], Eflags::NONE);
    t[8] = Entry::Ext(A64Ext::SysHint, 0);
    let msr = op(A64Op::Msr, 0xd510_0000, [sysreg, NO], [s(A64Ty::Gd, X), NO, NO], Eflags::NONE);
    let mrs = op(A64Op::Mrs, 0xd530_0000, [s(A64Ty::Gd, X), NO], [sysreg, NO, NO], Eflags::NONE);
    t[10] = msr;
    t[11] = msr;
    t[14] = mrs;
    t[15] = mrs;
    t
}

const fn branch_regs() -> [A64Entry; 16] {
    let mut t = [Entry::Invalid; 16];
    let xn = s(A64Ty::Gn, X);
    t[0] = op(A64Op::Br, 0xd61f_0000, [NO, NO], [xn, NO, NO], Eflags::NONE);
    t[1] = op(A64Op::Blr, 0xd63f_0000, [s(A64Ty::Lr, X), NO], [xn, NO, NO], Eflags::NONE);
    t[2] = op(A64Op::Ret, 0xd65f_0000, [NO, NO], [xn, NO, NO], Eflags::NONE);
    t
}

const fn branches() -> [A64Entry; 16] {
    let mut t = [Entry::Invalid; 16];
    let target = s(A64Ty::Pc26, OpSize::None);
    let b = op(A64Op::B, 0x1400_0000, [NO, NO], [target, NO, NO], Eflags::NONE);
    let bl = op(A64Op::Bl, 0x9400_0000, [s(A64Ty::Lr, X), NO], [target, NO, NO], Eflags::NONE);
    t[0] = b;
    t[1] = b;
    t[2] = Entry::Ext(A64Ext::Bit24, 0);
    t[3] = Entry::Ext(A64Ext::Bit24, 1);
    t[4] = linked(
        A64Op::Bcond,
        0x5400_0000,
        [NO, NO],
        [s(A64Ty::Pc19, OpSize::None), NO, NO],
        Flags::PREDICATE_0,
        Eflags::NONE,
        Link::End,
    );
    t[8] = bl;
    t[9] = bl;
    t[10] = Entry::Ext(A64Ext::Bit24, 0);
    t[11] = Entry::Ext(A64Ext::Bit24, 1);
    t[12] = Entry::Ext(A64Ext::ExcSys, 0);
    t[13] = Entry::Ext(A64Ext::BrReg, 0);
    t
}

const fn compare_branches() -> [[A64Entry; 2]; 2] {
    let pc19 = s(A64Ty::Pc19, OpSize::None);
    let pc14 = s(A64Ty::Pc14, OpSize::None);
    let bit = s(A64Ty::TbBit, OpSize::Bits(6));
    [
        [
            op(A64Op::Cbz, 0x3400_0000, [NO, NO], [r(A64Ty::Rd), pc19, NO], Eflags::NONE),
            op(A64Op::Cbnz, 0x3500_0000, [NO, NO], [r(A64Ty::Rd), pc19, NO], Eflags::NONE),
        ],
        [
            op(A64Op::Tbz, 0x3600_0000, [NO, NO], [r(A64Ty::Rt5), bit, pc14], Eflags::NONE),
            op(A64Op::Tbnz, 0x3700_0000, [NO, NO], [r(A64Ty::Rt5), bit, pc14], Eflags::NONE),
        ],
    ]
}

// ── Loads and stores ─────────────────────────────────────────────────────

const REG_OFFSET: usize = 0;
const PRE_INDEX: usize = 1;
const POST_INDEX: usize = 2;
const UNSIGNED_OFFSET: usize = 3;

/// Fixed bits of each RegOpc set.
const LDST_BASE: [u32; 4] = [0x3820_0800, 0x3800_0c00, 0x3800_0400, 0x3900_0000];

/// Shape of a single-register load or store.
#[derive(Clone, Copy)]
struct Shape {
    op: A64Op,
    access: OpSize,
    reg: OpSize,
    vector: bool,
}

const fn is_store(op: A64Op) -> bool {
    matches!(op, A64Op::Str | A64Op::Strb | A64Op::Strh | A64Op::Stp)
}

/// RegOpc row `size:V:opc` in `set`, if allocated.
const fn ldst_shape(set: usize, row: usize) -> Option<Shape> {
    const BYTES: [OpSize; 4] = [OpSize::B1, OpSize::B2, OpSize::B4, OpSize::B8];
    let size = row >> 3;
    let opc = row & 3;
    if row & 4 != 0 {
        let (load, access) = match (size, opc) {
            (0, 2) | (0, 3) => (opc == 3, OpSize::B16),
            (_, 0) | (_, 1) => (opc == 1, BYTES[size]),
            _ => return None,
        };
        return Some(Shape {
            op: if load { A64Op::Ldr } else { A64Op::Str },
            access,
            reg: access,
            vector: true,
        });
    }
    let (op, reg) = match (size, opc) {
        (0, 0) => (A64Op::Strb, W),
        (0, 1) => (A64Op::Ldrb, W),
        (0, 2) => (A64Op::Ldrsb, X),
        (0, 3) => (A64Op::Ldrsb, W),
        (1, 0) => (A64Op::Strh, W),
        (1, 1) => (A64Op::Ldrh, W),
        (1, 2) => (A64Op::Ldrsh, X),
        (1, 3) => (A64Op::Ldrsh, W),
        (2, 0) => (A64Op::Str, W),
        (2, 1) => (A64Op::Ldr, W),
        (2, 2) => (A64Op::Ldrsw, X),
        (3, 0) => (A64Op::Str, X),
        (3, 1) => (A64Op::Ldr, X),
        // Prefetch has no writeback forms.
        (3, 2) if set == REG_OFFSET || set == UNSIGNED_OFFSET => (A64Op::Prfm, X),
        _ => return None,
    };
    Some(Shape {
        op,
        access: BYTES[size],
        reg,
        vector: false,
    })
}

/// First RegOpc entry of `op` at or after (`set`, `row`) in walk order.
const fn ldst_from(op: A64Op, set: usize, row: usize) -> Link<A64Layout> {
    let mut s = set;
    let mut r = row;
    while s < 4 {
        while r < 32 {
            if let Some(shape) = ldst_shape(s, r) {
                if same(shape.op, op) {
                    return at(A64Ext::RegOpc, s, r);
                }
            }
            r += 1;
        }
        s += 1;
        r = 0;
    }
    Link::End
}

const fn ldst(set: usize, row: usize) -> A64Entry {
    let Some(shape) = ldst_shape(set, row) else {
        return Entry::Invalid;
    };
    let row32 = row as u32;
    let bits = LDST_BASE[set] | ((row32 >> 3) << 30) | (((row32 >> 2) & 1) << 26) | ((row32 & 3) << 22);
    let rt = if shape.vector {
        s(A64Ty::Vd, shape.reg)
    } else {
        s(A64Ty::Gd, shape.reg)
    };
    let mem_ty = match set {
        REG_OFFSET => A64Ty::MemReg,
        PRE_INDEX => A64Ty::MemPre,
        POST_INDEX => A64Ty::MemPost,
        _ => A64Ty::MemUoff,
    };
    let mem = s(mem_ty, shape.access);
    let next = ldst_from(shape.op, set, row + 1);
    if same(shape.op, A64Op::Prfm) {
        let prfop = s(A64Ty::PrfOp, OpSize::Bits(5));
        return linked(shape.op, bits, [NO, NO], [prfop, mem, NO], Flags::NONE, Eflags::NONE, next);
    }
    let store = is_store(shape.op);
    let (dst, src) = if set == PRE_INDEX || set == POST_INDEX {
        let base = s(A64Ty::BaseWb, X);
        let amount = s(A64Ty::Imm9Wb, OpSize::Bits(9));
        if store {
            ([mem, base], [rt, amount, base])
        } else {
            ([rt, base], [mem, amount, base])
        }
    } else if store {
        ([mem, NO], [rt, NO, NO])
    } else {
        ([rt, NO], [mem, NO, NO])
    };
    linked(shape.op, bits, dst, src, Flags::NONE, Eflags::NONE, next)
}

const fn reg_opc_sets() -> [[A64Entry; 32]; 4] {
    let mut t = [[Entry::Invalid; 32]; 4];
    let mut set = 0;
    while set < 4 {
        let mut row = 0;
        while row < 32 {
            t[set][row] = ldst(set, row);
            row += 1;
        }
        set += 1;
    }
    t
}

/// LitOpc row `opc:V`: opcode, register width, vector.
const fn literal_shape(row: usize) -> Option<(A64Op, OpSize, bool)> {
    match row {
        0 => Some((A64Op::Ldr, W, false)),
        1 => Some((A64Op::Ldr, W, true)),
        2 => Some((A64Op::Ldr, X, false)),
        3 => Some((A64Op::Ldr, X, true)),
        4 => Some((A64Op::Ldrsw, X, false)),
        5 => Some((A64Op::Ldr, OpSize::B16, true)),
        6 => Some((A64Op::Prfm, X, false)),
        _ => None,
    }
}

/// Literal loads head their opcodes' chains, continuing into RegOpc.
const fn literal(row: usize) -> A64Entry {
    let Some((opcode, reg, vector)) = literal_shape(row) else {
        return Entry::Invalid;
    };
    let mut next = ldst_from(opcode, 0, 0);
    let mut later = row + 1;
    while later < 8 {
        if let Some((other, _, _)) = literal_shape(later) {
            if same(other, opcode) {
                next = at(A64Ext::LitOpc, 0, later);
                break;
            }
        }
        later += 1;
    }
    let bits = 0x1800_0000 | (((row >> 1) as u32) << 30) | (((row & 1) as u32) << 26);
    if same(opcode, A64Op::Prfm) {
        let prfop = s(A64Ty::PrfOp, OpSize::Bits(5));
        let mem = s(A64Ty::MemLit, X);
        return linked(opcode, bits, [NO, NO], [prfop, mem, NO], Flags::NONE, Eflags::NONE, next);
    }
    let access = if same(opcode, A64Op::Ldrsw) { W } else { reg };
    let rt = if vector { s(A64Ty::Vd, reg) } else { s(A64Ty::Gd, reg) };
    linked(opcode, bits, [rt, NO], [s(A64Ty::MemLit, access), NO, NO], Flags::NONE, Eflags::NONE, next)
}

const PAIR_OFFSET: usize = 0;
const PAIR_PRE: usize = 1;
const PAIR_POST: usize = 2;

/// Addressing-mode bits 24:23 of each PairOpc set.
const PAIR_MODE_BITS: [u32; 3] = [0x0100_0000, 0x0180_0000, 0x0080_0000];

/// PairOpc row `opc:V:L`: opcode, register width, vector.
const fn pair_shape(row: usize) -> Option<(A64Op, OpSize, bool)> {
    let vector = row & 2 != 0;
    let reg = match (row >> 2, vector) {
        (0, _) => W,
        (1, true) | (2, false) => X,
        (2, true) => OpSize::B16,
        _ => return None,
    };
    let op = if row & 1 == 1 { A64Op::Ldp } else { A64Op::Stp };
    Some((op, reg, vector))
}

const fn pair_from(op: A64Op, set: usize, row: usize) -> Link<A64Layout> {
    let mut s = set;
    let mut r = row;
    while s < 3 {
        while r < 16 {
            if let Some((other, _, _)) = pair_shape(r) {
                if same(other, op) {
                    return at(A64Ext::PairOpc, s, r);
                }
            }
            r += 1;
        }
        s += 1;
        r = 0;
    }
    Link::End
}

const fn double(size: OpSize) -> OpSize {
    match size {
        OpSize::B4 => OpSize::B8,
        OpSize::B8 => OpSize::B16,
        _ => OpSize::B32,
    }
}

/// Index of the extra operands of writeback pair (`set`, `row`).
const fn pair_extra(set: usize, row: usize) -> usize {
    (set - PAIR_PRE) * 16 + row
}

/// `ldp`/`stp`. Writeback forms list the base as destination and source,
/// which overflows the slots: the source copy lives in a side entry.
const fn pair(set: usize, row: usize) -> A64Entry {
    let Some((opcode, reg, vector)) = pair_shape(row) else {
        return Entry::Invalid;
    };
    let row32 = row as u32;
    let bits = 0x2800_0000
        | ((row32 >> 2) << 30)
        | (((row32 >> 1) & 1) << 26)
        | PAIR_MODE_BITS[set]
        | ((row32 & 1) << 22);
    let (rt, rt2) = if vector {
        (s(A64Ty::Vd, reg), s(A64Ty::Va, reg))
    } else {
        (s(A64Ty::Gd, reg), s(A64Ty::Ga, reg))
    };
    let mem = s(if set == PAIR_POST { A64Ty::MemPost } else { A64Ty::MemPair }, double(reg));
    let load = row & 1 == 1;
    if set == PAIR_OFFSET {
        let next = pair_from(opcode, set, row + 1);
        let (dst, src) = if load {
            ([rt, rt2], [mem, NO, NO])
        } else {
            ([mem, NO], [rt, rt2, NO])
        };
        return linked(opcode, bits, dst, src, Flags::NONE, Eflags::NONE, next);
    }
    let base = s(A64Ty::BaseWb, X);
    let amount = s(A64Ty::Imm7Wb, OpSize::Bits(10));
    let extra = Link::Extra(pair_extra(set, row) as u16);
    let flags = Flags::EXTRA_OPERANDS.union(Flags::EXTRA_WRITEBACK);
    if load {
        linked(
            opcode,
            bits,
            [rt, rt2],
            [base, mem, amount],
            flags.union(Flags::DST3),
            Eflags::NONE,
            extra,
        )
    } else {
        linked(opcode, bits, [mem, base], [rt, rt2, amount], flags, Eflags::NONE, extra)
    }
}

const fn pair_sets() -> [[A64Entry; 16]; 3] {
    let mut t = [[Entry::Invalid; 16]; 3];
    let mut set = 0;
    while set < 3 {
        let mut row = 0;
        while row < 16 {
            t[set][row] = pair(set, row);
            row += 1;
        }
        set += 1;
    }
    t
}

const fn side(opcode: A64Op, src: [S; 3], next: Link<A64Layout>) -> A64Info {
    OpInfo {
        opcode: Opcode::A64(opcode),
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

/// Source copies of the writeback pair bases; each carries its entry's chain
/// continuation.
const fn extras() -> [A64Info; 32] {
    let mut t = [side(A64Op::Ldp, [NO, NO, NO], Link::End); 32];
    let mut set = PAIR_PRE;
    while set <= PAIR_POST {
        let mut row = 0;
        while row < 16 {
            if let Some((opcode, _, _)) = pair_shape(row) {
                t[pair_extra(set, row)] = side(
                    opcode,
                    [s(A64Ty::BaseWb, X), NO, NO],
                    pair_from(opcode, set, row + 1),
                );
            }
            row += 1;
        }
        set += 1;
    }
    t
}

// ── Data processing, register ────────────────────────────────────────────

const fn dp_reg() -> [A64Entry; 32] {
    let mut t = [Entry::Invalid; 32];
    let mut i = 0;
    while i < 8 {
        t[i] = Entry::Ext(A64Ext::LogN, 0);
        t[24 + i] = Entry::Ext(A64Ext::Dp3, 0);
        i += 1;
    }
    // Shift type 11 is reserved for add/sub; bit 21 set is the extended form.
    t[8] = Entry::Ext(A64Ext::OpS, ADDSUB_REG);
    t[10] = Entry::Ext(A64Ext::OpS, ADDSUB_REG);
    t[12] = Entry::Ext(A64Ext::OpS, ADDSUB_REG);
    t[20] = Entry::Ext(A64Ext::CondSel, 0);
    t[22] = Entry::Ext(A64Ext::Bit30, 0);
    t
}

const fn logical_regs() -> [A64Entry; 8] {
    let mut t = [Entry::Invalid; 8];
    let mut i = 0;
    while i < 8 {
        t[i] = logical_reg(i);
        i += 1;
    }
    t
}

const fn cond_selects() -> [A64Entry; 4] {
    let ops = [A64Op::Csel, A64Op::Csinc, A64Op::Csinv, A64Op::Csneg];
    let mut t = [Entry::Invalid; 4];
    let mut i = 0;
    while i < 4 {
        t[i] = op(
            ops[i],
            0x1a80_0000 | (((i >> 1) as u32) << 30) | (((i & 1) as u32) << 10),
            [r(A64Ty::Rd), NO],
            [r(A64Ty::Rn), r(A64Ty::Rm), s(A64Ty::Cond, OpSize::Bits(4))],
            NZCV_IN,
        );
        i += 1;
    }
    t
}

const fn two_source() -> [A64Entry; 16] {
    let mut t = [Entry::Invalid; 16];
    let rows = [
        (2, A64Op::Udiv),
        (3, A64Op::Sdiv),
        (8, A64Op::Lslv),
        (9, A64Op::Lsrv),
        (10, A64Op::Asrv),
        (11, A64Op::Rorv),
    ];
    let mut i = 0;
    while i < rows.len() {
        let (row, opcode) = rows[i];
        t[row] = op(
            opcode,
            0x1ac0_0000 | ((row as u32) << 10),
            [r(A64Ty::Rd), NO],
            [r(A64Ty::Rn), r(A64Ty::Rm), NO],
            Eflags::NONE,
        );
        i += 1;
    }
    t
}

const fn one_source() -> [A64Entry; 8] {
    let mut t = [Entry::Invalid; 8];
    let rows = [(0, A64Op::Rbit), (1, A64Op::Rev16), (4, A64Op::Clz), (5, A64Op::Cls)];
    let mut i = 0;
    while i < rows.len() {
        let (row, opcode) = rows[i];
        t[row] = op(
            opcode,
            0x5ac0_0000 | ((row as u32) << 10),
            [r(A64Ty::Rd), NO],
            [r(A64Ty::Rn), NO, NO],
            Eflags::NONE,
        );
        i += 1;
    }
    t
}

const fn three_source() -> [A64Entry; 16] {
    let mut t = [Entry::Invalid; 16];
    let (rd, rn, rm, ra) = (r(A64Ty::Rd), r(A64Ty::Rn), r(A64Ty::Rm), r(A64Ty::Ra));
    t[0] = op(A64Op::Madd, 0x1b00_0000, [rd, NO], [rn, rm, ra], Eflags::NONE);
    t[1] = op(A64Op::Msub, 0x1b00_8000, [rd, NO], [rn, rm, ra], Eflags::NONE);
    // The long forms take 32-bit sources and a 64-bit accumulator.
    let (xd, wn, wm, xa) = (s(A64Ty::Gd, X), s(A64Ty::Gn, W), s(A64Ty::Gm, W), s(A64Ty::Ga, X));
    t[2] = op(A64Op::Smaddl, 0x9b20_0000, [xd, NO], [wn, wm, xa], Eflags::NONE);
    t[3] = op(A64Op::Smsubl, 0x9b20_8000, [xd, NO], [wn, wm, xa], Eflags::NONE);
    t[10] = op(A64Op::Umaddl, 0x9ba0_0000, [xd, NO], [wn, wm, xa], Eflags::NONE);
    t[11] = op(A64Op::Umsubl, 0x9ba0_8000, [xd, NO], [wn, wm, xa], Eflags::NONE);
    let (xn, xm) = (s(A64Ty::Gn, X), s(A64Ty::Gm, X));
    t[4] = op(A64Op::Smulh, 0x9b40_7c00, [xd, NO], [xn, xm, NO], Eflags::NONE);
    t[12] = op(A64Op::Umulh, 0x9bc0_7c00, [xd, NO], [xn, xm, NO], Eflags::NONE);
    t
}

// ── Scalar floating point ────────────────────────────────────────────────

const fn fp_two_source() -> [A64Entry; 16] {
    let mut t = [Entry::Invalid; 16];
    let rows = [
        (0, A64Op::Fmul),
        (1, A64Op::Fdiv),
        (2, A64Op::Fadd),
        (3, A64Op::Fsub),
        (4, A64Op::Fmax),
        (5, A64Op::Fmin),
        (8, A64Op::Fnmul),
    ];
    let mut i = 0;
    while i < rows.len() {
        let (row, opcode) = rows[i];
        t[row] = op(
            opcode,
            0x1e20_0800 | ((row as u32) << 12),
            [r(A64Ty::Fd), NO],
            [r(A64Ty::Fn), r(A64Ty::Fm), NO],
            Eflags::NONE,
        );
        i += 1;
    }
    t
}

/// Chain: to general register → from general register → register → immediate.
const fn fp_int() -> [A64Entry; 32] {
    let mut t = [Entry::Invalid; 32];
    let (rd, rn, fd, fn_) = (r(A64Ty::Rd), r(A64Ty::Rn), r(A64Ty::Fd), r(A64Ty::Fn));
    t[2] = op(A64Op::Scvtf, 0x1e22_0000, [fd, NO], [rn, NO, NO], Eflags::NONE);
    t[3] = op(A64Op::Ucvtf, 0x1e23_0000, [fd, NO], [rn, NO, NO], Eflags::NONE);
    t[6] = linked(
        A64Op::Fmov,
        0x1e26_0000,
        [rd, NO],
        [fn_, NO, NO],
        Flags::NONE,
        Eflags::NONE,
        at(A64Ext::FpInt, 0, 7),
    );
    t[7] = linked(
        A64Op::Fmov,
        0x1e27_0000,
        [fd, NO],
        [rn, NO, NO],
        Flags::NONE,
        Eflags::NONE,
        at(A64Ext::Fp1, 0, 0),
    );
    t[24] = op(A64Op::Fcvtzs, 0x1e38_0000, [rd, NO], [fn_, NO, NO], Eflags::NONE);
    t[25] = op(A64Op::Fcvtzu, 0x1e39_0000, [rd, NO], [fn_, NO, NO], Eflags::NONE);
    t
}

const fn fp_one_source() -> [A64Entry; 16] {
    let mut t = [Entry::Invalid; 16];
    let (fd, fn_) = (r(A64Ty::Fd), r(A64Ty::Fn));
    t[0] = linked(
        A64Op::Fmov,
        0x1e20_4000,
        [fd, NO],
        [fn_, NO, NO],
        Flags::NONE,
        Eflags::NONE,
        at(A64Ext::Fp, 0, 4),
    );
    t[1] = op(A64Op::Fabs, 0x1e20_c000, [fd, NO], [fn_, NO, NO], Eflags::NONE);
    t[2] = op(A64Op::Fneg, 0x1e21_4000, [fd, NO], [fn_, NO, NO], Eflags::NONE);
    t[3] = op(A64Op::Fsqrt, 0x1e21_c000, [fd, NO], [fn_, NO, NO], Eflags::NONE);
    // Target types single, double and half; 10 is unallocated.
    let fcvt = op(A64Op::Fcvt, 0x1e22_4000, [r(A64Ty::FdOpc), NO], [fn_, NO, NO], Eflags::NONE);
    t[4] = fcvt;
    t[5] = fcvt;
    t[7] = fcvt;
    t
}

const fn fp_compares() -> [A64Entry; 4] {
    let (fn_, fm, zero) = (r(A64Ty::Fn), r(A64Ty::Fm), r(A64Ty::FpZero));
    [
        linked(
            A64Op::Fcmp,
            0x1e20_2000,
            [NO, NO],
            [fn_, fm, NO],
            Flags::NONE,
            NZCV_OUT,
            at(A64Ext::FpCmp, 0, 1),
        ),
        op(A64Op::Fcmp, 0x1e20_2008, [NO, NO], [fn_, zero, NO], NZCV_OUT),
        linked(
            A64Op::Fcmpe,
            0x1e20_2010,
            [NO, NO],
            [fn_, fm, NO],
            Flags::NONE,
            NZCV_OUT,
            at(A64Ext::FpCmp, 0, 3),
        ),
        op(A64Op::Fcmpe, 0x1e20_2018, [NO, NO], [fn_, zero, NO], NZCV_OUT),
    ]
}

// ── Tables ───────────────────────────────────────────────────────────────

static A64_TOP: [A64Entry; 16] = {
    let mut t = [Entry::Invalid; 16];
    t[4] = Entry::Ext(A64Ext::LdSt, 0);
    t[5] = Entry::Ext(A64Ext::DpReg, 0);
    t[6] = Entry::Ext(A64Ext::LdSt, 0);
    t[8] = Entry::Ext(A64Ext::DpImm, 0);
    t[9] = Entry::Ext(A64Ext::DpImm, 0);
    t[10] = Entry::Ext(A64Ext::Branch, 0);
    t[11] = Entry::Ext(A64Ext::Branch, 0);
    t[12] = Entry::Ext(A64Ext::LdSt, 0);
    t[13] = Entry::Ext(A64Ext::DpReg, 0);
    t[14] = Entry::Ext(A64Ext::LdSt, 0);
    t[15] = Entry::Ext(A64Ext::Fp, 0);
    t
};

static A64_DP_IMM: [A64Entry; 8] = [
    Entry::Ext(A64Ext::Bit31, 0),
    Entry::Ext(A64Ext::Bit31, 0),
    Entry::Ext(A64Ext::OpS, ADDSUB_IMM as u16),
    Entry::Invalid,
    Entry::Ext(A64Ext::OpS, LOGICAL_IMM as u16),
    Entry::Ext(A64Ext::OpS, MOVE_WIDE as u16),
    Entry::Ext(A64Ext::OpS, BITFIELD as u16),
    Entry::Invalid,
];

static A64_OPS: [[A64Entry; 4]; 5] = ops_sets();

static A64_ADR: [A64Entry; 2] = [
    op(A64Op::Adr, 0x1000_0000, [s(A64Ty::Gd, X), NO], [s(A64Ty::AdrPc, OpSize::None), NO, NO], Eflags::NONE),
    op(A64Op::Adrp, 0x9000_0000, [s(A64Ty::Gd, X), NO], [s(A64Ty::AdrpPc, OpSize::None), NO, NO], Eflags::NONE),
];

static A64_BRANCH: [A64Entry; 16] = branches();
static A64_BIT24: [[A64Entry; 2]; 2] = compare_branches();
static A64_EXC_SYS: [A64Entry; 16] = exc_sys();

static A64_EXCEPTION: [A64Entry; 4] = [
    Entry::Invalid,
    op(A64Op::Svc, 0xd400_0001, [NO, NO], [s(A64Ty::Imm16, OpSize::B2), NO, NO], Eflags::NONE),
    op(A64Op::Hvc, 0xd400_0002, [NO, NO], [s(A64Ty::Imm16, OpSize::B2), NO, NO], Eflags::NONE),
    Entry::Invalid,
];

static A64_SYS_HINT: [A64Entry; 16] = hints();
static A64_BR_REG: [A64Entry; 16] = branch_regs();

static A64_LDST: [A64Entry; 8] = [
    Entry::Invalid,
    Entry::Invalid,
    Entry::Ext(A64Ext::LitOpc, 0),
    Entry::Invalid,
    Entry::Ext(A64Ext::PairMode, 0),
    Entry::Ext(A64Ext::PairMode, 0),
    Entry::Ext(A64Ext::RegMode, 0),
    Entry::Ext(A64Ext::RegOpc, UNSIGNED_OFFSET as u16),
];

static A64_LITERAL: [A64Entry; 8] = {
    let mut t = [Entry::Invalid; 8];
    let mut row = 0;
    while row < 8 {
        t[row] = literal(row);
        row += 1;
    }
    t
};

static A64_PAIR_MODE: [A64Entry; 4] = [
    Entry::Ext(A64Ext::PairOpc, PAIR_OFFSET as u16),
    Entry::Ext(A64Ext::PairOpc, PAIR_PRE as u16),
    Entry::Ext(A64Ext::PairOpc, PAIR_POST as u16),
    Entry::Invalid,
];

static A64_PAIRS: [[A64Entry; 16]; 3] = pair_sets();

static A64_REG_MODE: [A64Entry; 4] = [
    Entry::Ext(A64Ext::RegOpc, REG_OFFSET as u16),
    Entry::Ext(A64Ext::RegOpc, PRE_INDEX as u16),
    Entry::Ext(A64Ext::RegOpc, POST_INDEX as u16),
    Entry::Invalid,
];

static A64_REG_OPC: [[A64Entry; 32]; 4] = reg_opc_sets();
static A64_DP_REG: [A64Entry; 32] = dp_reg();
static A64_LOGICAL: [A64Entry; 8] = logical_regs();
static A64_COND_SEL: [A64Entry; 4] = cond_selects();
static A64_DP_SRC: [A64Entry; 2] = [Entry::Ext(A64Ext::Dp2, 0), Entry::Ext(A64Ext::Dp1, 0)];
static A64_DP2: [A64Entry; 16] = two_source();
static A64_DP1: [A64Entry; 8] = one_source();
static A64_DP3: [A64Entry; 16] = three_source();

static A64_FP: [A64Entry; 8] = [
    Entry::Ext(A64Ext::Fp2, 0),
    Entry::Ext(A64Ext::FpInt, 0),
    Entry::Ext(A64Ext::Fp1, 0),
    Entry::Ext(A64Ext::FpCmp, 0),
    op(A64Op::Fmov, 0x1e20_1000, [r(A64Ty::Fd), NO], [r(A64Ty::FpImm8), NO, NO], Eflags::NONE),
    Entry::Invalid,
    Entry::Invalid,
    Entry::Invalid,
];

static A64_FP2: [A64Entry; 16] = fp_two_source();
static A64_FP_INT: [A64Entry; 32] = fp_int();
static A64_FP1: [A64Entry; 16] = fp_one_source();
static A64_FP_CMP: [A64Entry; 4] = fp_compares();
static A64_EXTRAS: [A64Info; 32] = extras();

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{chain, find_head, validate, walk};

    fn head(op: A64Op) -> &'static A64Info {
        find_head::<A64Layout>(Opcode::A64(op))
            .unwrap_or_else(|| panic!("no entry for {}", op.name()))
            .1
    }

    #[test]
    fn forest_is_well_formed() {
        let terminals = validate::<A64Layout>().unwrap();
        assert!(terminals > 200, "only {} terminals", terminals);
    }

    #[test]
    fn every_opcode_has_an_encoding() {
        for &op in A64Op::ALL {
            head(op);
        }
    }

    #[test]
    fn register_forms_come_before_immediates() {
        let add = head(A64Op::Add);
        assert_eq!(add.bits, 0x0b00_0000);
        let forms: Vec<u32> = chain(add).map(|i| i.bits).collect();
        assert_eq!(forms, [0x0b00_0000, 0x1100_0000]);
        assert_eq!(chain(head(A64Op::Orr)).count(), 2);
        assert_eq!(chain(head(A64Op::Orn)).count(), 1);
    }

    #[test]
    fn load_chains_cover_every_addressing_form() {
        // Five literal forms, then seven register files in four modes.
        assert_eq!(chain(head(A64Op::Ldr)).count(), 5 + 7 * 4);
        assert_eq!(chain(head(A64Op::Str)).count(), 7 * 4);
        assert_eq!(chain(head(A64Op::Prfm)).count(), 3);
        assert_eq!(chain(head(A64Op::Ldp)).count(), 5 * 3);
    }

    #[test]
    fn fmov_chain_ends_with_the_immediate() {
        let forms: Vec<u32> = chain(head(A64Op::Fmov)).map(|i| i.bits).collect();
        assert_eq!(forms, [0x1e26_0000, 0x1e27_0000, 0x1e20_4000, 0x1e20_1000]);
    }

    #[test]
    fn width_bits_are_operand_fields() {
        let madd = head(A64Op::Madd);
        assert_eq!(madd.mask & (1 << 31), 0);
        let fadd = head(A64Op::Fadd);
        assert_eq!(fadd.mask & 0x00c0_0000, 0);
        let smaddl = head(A64Op::Smaddl);
        assert_ne!(smaddl.mask & (1 << 31), 0);
    }

    #[test]
    fn canonical_bits_keep_fixed_ones() {
        walk::<A64Layout>(|at, info| {
            assert!(info.has_fixed_ones(info.bits), "{:?}", at);
            assert!(info.matches(info.bits), "{:?}", at);
        });
    }

    #[test]
    fn conditional_branch_masks_out_the_condition() {
        let bcond = head(A64Op::Bcond);
        assert!(bcond.flags.contains(Flags::PREDICATE_0));
        assert_eq!(bcond.mask & 0xf, 0);
    }
}
