//! Thumb decode tables.
//!
//! Two roots: the 16-bit space indexed by bits 15:12 of the halfword, and
//! the 32-bit space indexed by bits 28:27. A 32-bit instruction is tabled as
//! one word with the first halfword in bits 31:16. The 32-bit groups covered
//! are branches, data processing (shifted register, modified immediate and
//! plain binary immediate) and single loads and stores.
//!
//! ```text
//!   T16   15..12  11..0
//!         row     (per-row extension kinds)
//!   T32   31..27  26  25  24..20  19..16  15  14..12  11..8  7..0
//!         11101   0   1   op S    Rn      0   imm3    Rd     imm2 type Rm
//!         11110   i   0   op S    Rn      0   imm3    Rd     imm8
//!         11110   S   imm10/cond          1   op J1 x J2     imm11
//!         11111   0   0   s U sz L Rn     Rt          1PUW   imm8
//! ```

use crate::arm_tables::ArmOp;
use crate::instr::{Eflags, Opcode};
use crate::size::OpSize;
use crate::table::{span_table, Entry, EntryRef, Flags, Layout, Link, OpInfo, Slot};

// ── Layout ───────────────────────────────────────────────────────────────

/// The Thumb table forest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ThumbLayout;

/// Thumb table kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ThumbExt {
    /// Bits 15:12 of a 16-bit instruction.
    Top16,
    /// Bit 11.
    Bit11,
    /// Bits 11:10.
    Bits11_10,
    /// Bits 11:9.
    Bits11_9,
    /// Bits 11:8.
    Bits11_8,
    /// Bits 9:6, the data-processing opcode.
    Dp,
    /// Bits 9:7 of the special data group.
    Special,
    /// Bit 7.
    Bit7,
    /// Bits 7:6.
    Bits7_6,
    /// `it` when bits 3:0 are nonzero (row 8), else the hint in bits 7:4.
    ItHint,
    /// Whether the base in 10:8 is in the register list.
    RnInList,
    /// Bits 28:27 of a 32-bit instruction.
    Top32,
    /// Bits 15, 14 and 12 of the second halfword.
    T32Br,
    /// Bits 26:25.
    T32Bits26_25,
    /// Bit 25: modified or plain immediate.
    T32DpImm,
    /// Bits 24:20: data-processing op and S, or the transfer's sign, size and L.
    T32Op5,
    /// Whether Rd (11:8) is the pc.
    T32RdPc,
    /// Whether Rn (19:16) is the pc.
    T32RnPc,
    /// Addressing mode of an 8-bit offset transfer: row 0 for a register
    /// offset (bit 11 clear), else 1 + PUW from bits 10:8.
    T32LsMode,
}

/// Thumb operand types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ThumbTy {
    None,
    /// Low register, 2:0.
    R0,
    /// Low register, 5:3.
    R3,
    /// Low register, 8:6.
    R6,
    /// Low register, 10:8.
    R8,
    /// Any register, 7 and 2:0.
    RdnHi,
    /// Any register, 6:3.
    RmHi,
    Sp,
    Lr,
    /// 8:6.
    Imm3,
    /// 10:6.
    Imm5,
    /// 10:6, zero meaning 32.
    Imm5Shift,
    /// 6:0 times four.
    Imm7x4,
    /// 7:0.
    Imm8,
    /// 7:0 times four.
    Imm8x4,
    /// Constant zero.
    Zero,
    /// `[R3, #imm5 * size]`.
    MemImm5,
    /// `[R3, R6]`.
    MemReg,
    /// `[sp, #imm8 * 4]`.
    MemSp,
    /// Literal at the aligned pc plus imm8 * 4.
    MemLit,
    /// Address at the aligned pc plus imm8 * 4.
    AdrPc,
    /// Branch, 7:0 halfwords.
    Pc8,
    /// Branch, 10:0 halfwords.
    Pc11,
    /// Forward branch, 9 and 7:3 halfwords.
    PcCbz,
    /// Low registers, 7:0.
    RegList8,
    /// Low registers plus `lr` from bit 8.
    RegListLr,
    /// Low registers plus `pc` from bit 8.
    RegListPc,
    /// `[R8]` for a block transfer.
    MemList,
    /// Stack slot a push stores to.
    MemPush,
    /// Stack slot a pop loads from.
    MemPop,
    /// `it` first condition, 7:4.
    ItCond,
    /// `it` mask, 3:0.
    ItMask,
    /// Conditional wide branch offset.
    T32Pc20,
    /// Wide branch offset.
    T32Pc24,
    /// Wide branch offset to A32 code.
    T32Pc24X,
    /// Any register, 19:16.
    T32Rn,
    /// Any register, 11:8.
    T32Rd,
    /// Any register, 15:12.
    T32Rt,
    /// Any register, 3:0.
    T32Rm,
    /// `i:imm3:imm8` through the Thumb immediate expansion.
    T32ModImm,
    /// `i:imm3:imm8`, zero-extended.
    T32Imm12,
    /// `imm4:i:imm3:imm8`.
    T32Imm16,
    /// Shift type, 5:4.
    T32ShTy,
    /// Shift amount, `imm3:imm2`.
    T32ShAmt,
    /// `[Rn, #imm12]`.
    T32MemImm12,
    /// `[Rn, #-imm8]`.
    T32MemNeg,
    /// `[Rn, #±imm8]` with writeback.
    T32MemPre,
    /// `[Rn]` of a post-indexed transfer.
    T32MemPost,
    /// Writeback amount, ±imm8 with U in bit 9.
    T32Imm8Signed,
    /// `[Rn, Rm, lsl #imm2]`.
    T32MemReg,
    /// Literal at the aligned pc ± imm12, U in bit 23.
    T32MemLit,
    /// Address at the aligned pc plus `i:imm3:imm8`.
    T32AdrUp,
    /// Address at the aligned pc minus `i:imm3:imm8`.
    T32AdrDown,
}

const fn field(ty: ThumbTy) -> u32 {
    match ty {
        ThumbTy::None
        | ThumbTy::Sp
        | ThumbTy::Lr
        | ThumbTy::Zero
        | ThumbTy::MemPush
        | ThumbTy::MemPop => 0,
        ThumbTy::R0 => 0x0007,
        ThumbTy::R3 => 0x0038,
        ThumbTy::R6 | ThumbTy::Imm3 => 0x01c0,
        ThumbTy::R8 | ThumbTy::MemList => 0x0700,
        ThumbTy::RdnHi => 0x0087,
        ThumbTy::RmHi => 0x0078,
        ThumbTy::Imm5 | ThumbTy::Imm5Shift => 0x07c0,
        ThumbTy::Imm7x4 => 0x007f,
        ThumbTy::Imm8
        | ThumbTy::Imm8x4
        | ThumbTy::MemSp
        | ThumbTy::MemLit
        | ThumbTy::AdrPc
        | ThumbTy::Pc8
        | ThumbTy::RegList8 => 0x00ff,
        ThumbTy::MemImm5 => 0x07f8,
        ThumbTy::MemReg => 0x01f8,
        ThumbTy::Pc11 => 0x07ff,
        ThumbTy::PcCbz => 0x02f8,
        ThumbTy::RegListLr | ThumbTy::RegListPc => 0x01ff,
        ThumbTy::ItCond => 0x00f0,
        ThumbTy::ItMask => 0x000f,
        ThumbTy::T32Pc20 => 0x043f_2fff,
        ThumbTy::T32Pc24 => 0x07ff_2fff,
        ThumbTy::T32Pc24X => 0x07ff_2ffe,
        ThumbTy::T32Rn | ThumbTy::T32MemPost => 0x000f_0000,
        ThumbTy::T32Rd => 0x0000_0f00,
        ThumbTy::T32Rt => 0x0000_f000,
        ThumbTy::T32Rm => 0x0000_000f,
        ThumbTy::T32ModImm | ThumbTy::T32Imm12 | ThumbTy::T32AdrUp | ThumbTy::T32AdrDown => 0x0400_70ff,
        ThumbTy::T32Imm16 => 0x040f_70ff,
        ThumbTy::T32ShTy => 0x0000_0030,
        ThumbTy::T32ShAmt => 0x0000_70c0,
        ThumbTy::T32MemImm12 => 0x000f_0fff,
        ThumbTy::T32MemNeg => 0x000f_00ff,
        ThumbTy::T32MemPre => 0x000f_02ff,
        ThumbTy::T32Imm8Signed => 0x0000_02ff,
        ThumbTy::T32MemReg => 0x000f_003f,
        ThumbTy::T32MemLit => 0x0080_0fff,
    }
}

impl Layout for ThumbLayout {
    type Ext = ThumbExt;
    type Ty = ThumbTy;

    const NONE: ThumbTy = ThumbTy::None;
    const MAX_HOPS: usize = 4;
    const NAME: &'static str = "thumb";

    fn roots() -> &'static [(ThumbExt, u16)] {
        &[(ThumbExt::Top16, 0), (ThumbExt::Top32, 0)]
    }

    fn table(kind: ThumbExt, set: u16) -> Option<&'static [Entry<Self>]> {
        let set = set as usize;
        match kind {
            ThumbExt::Top16 => (set == 0).then_some(&T16_TOP[..]),
            ThumbExt::Bit11 => T16_BIT11.get(set).map(|t| &t[..]),
            ThumbExt::Bits11_10 => (set == 0).then_some(&T16_BITS11_10[..]),
            ThumbExt::Bits11_9 => T16_BITS11_9.get(set).map(|t| &t[..]),
            ThumbExt::Bits11_8 => T16_BITS11_8.get(set).map(|t| &t[..]),
            ThumbExt::Dp => (set == 0).then_some(&T16_DP[..]),
            ThumbExt::Special => (set == 0).then_some(&T16_SPECIAL[..]),
            ThumbExt::Bit7 => (set == 0).then_some(&T16_BIT7[..]),
            ThumbExt::Bits7_6 => T16_BITS7_6.get(set).map(|t| &t[..]),
            ThumbExt::ItHint => (set == 0).then_some(&T16_IT_HINT[..]),
            ThumbExt::RnInList => (set == 0).then_some(&T16_LDM[..]),
            ThumbExt::Top32 => (set == 0).then_some(&T32_TOP[..]),
            ThumbExt::T32Br => (set == 0).then_some(&T32_BRANCH[..]),
            ThumbExt::T32Bits26_25 => T32_BITS26_25.get(set).map(|t| &t[..]),
            ThumbExt::T32DpImm => (set == 0).then_some(&T32_DP_IMM[..]),
            ThumbExt::T32Op5 => match set as u16 {
                DP_REG => Some(&T32_DP_REG[..]),
                DP_MOD => Some(&T32_DP_MOD[..]),
                DP_PLAIN => Some(&T32_DP_PLAIN[..]),
                LDST => Some(&T32_LDST[..]),
                _ => None,
            },
            ThumbExt::T32RdPc => T32_RD_PC.get(set).map(|t| &t[..]),
            ThumbExt::T32RnPc => T32_RN_PC.get(set).map(|t| &t[..]),
            ThumbExt::T32LsMode => T32_LS_MODE.get(set).map(|t| &t[..]),
        }
    }

    fn width(kind: ThumbExt) -> usize {
        match kind {
            ThumbExt::Top16 | ThumbExt::Bits11_8 | ThumbExt::Dp => 16,
            ThumbExt::Bit11
            | ThumbExt::Bit7
            | ThumbExt::RnInList
            | ThumbExt::T32DpImm
            | ThumbExt::T32RdPc
            | ThumbExt::T32RnPc => 2,
            ThumbExt::Bits11_10 | ThumbExt::Bits7_6 | ThumbExt::Top32 | ThumbExt::T32Bits26_25 => 4,
            ThumbExt::Bits11_9 | ThumbExt::Special | ThumbExt::T32Br => 8,
            ThumbExt::ItHint | ThumbExt::T32LsMode => 9,
            ThumbExt::T32Op5 => 32,
        }
    }

    fn extra(_: u16) -> Option<&'static OpInfo<Self>> {
        None
    }
}

// ── Entry builders ───────────────────────────────────────────────────────

type TEntry = Entry<ThumbLayout>;
type S = Slot<ThumbTy>;

const fn s(ty: ThumbTy, size: OpSize) -> S {
    Slot { ty, size }
}

const fn w(ty: ThumbTy) -> S {
    s(ty, OpSize::B4)
}

const NO: S = s(ThumbTy::None, OpSize::None);
const LO: S = w(ThumbTy::R0);
const MID: S = w(ThumbTy::R3);
const HI3: S = w(ThumbTy::R6);
const R8: S = w(ThumbTy::R8);
const SP: S = w(ThumbTy::Sp);
const LR: S = w(ThumbTy::Lr);

const fn entry(
    op: ArmOp,
    bits: u32,
    dst: [S; 2],
    src: [S; 3],
    flags: Flags,
    eflags: Eflags,
    next: Link<ThumbLayout>,
) -> TEntry {
    let mut fields = field(dst[0].ty)
        | field(dst[1].ty)
        | field(src[0].ty)
        | field(src[1].ty)
        | field(src[2].ty);
    if flags.contains(Flags::PREDICATE_8) {
        fields |= 0x0f00;
    }
    if flags.contains(Flags::PREDICATE_22) {
        fields |= 0x03c0_0000;
    }
    let width = if bits > 0xffff { u32::MAX } else { 0xffff };
    Entry::Op(OpInfo {
        opcode: Opcode::Arm(op),
        bits,
        mask: !fields & width,
        name: op.name(),
        dst,
        src,
        flags,
        eflags,
        next,
    })
}

const fn op(op: ArmOp, bits: u32, dst: [S; 2], src: [S; 3], eflags: Eflags) -> TEntry {
    entry(op, bits, dst, src, Flags::NONE, eflags, Link::End)
}

const fn linked(
    op: ArmOp,
    bits: u32,
    dst: [S; 2],
    src: [S; 3],
    eflags: Eflags,
    next: Link<ThumbLayout>,
) -> TEntry {
    entry(op, bits, dst, src, Flags::NONE, eflags, next)
}

const fn at(kind: ThumbExt, set: u16, row: u16) -> Link<ThumbLayout> {
    Link::At(EntryRef { kind, set, row })
}

const NZ: Eflags = Eflags::WRITE_SF.union(Eflags::WRITE_ZF);
const NZC: Eflags = NZ.union(Eflags::WRITE_CF);
const NZCV: Eflags = Eflags::WRITE_NZCV;
const CARRY_IN: Eflags = Eflags::READ_CF.union(Eflags::WRITE_NZCV);

// ── 16-bit tables ────────────────────────────────────────────────────────

static T16_TOP: [TEntry; 16] = span_table!(16;
    0 => Entry::Ext(ThumbExt::Bit11, 0),
    1 => Entry::Ext(ThumbExt::Bits11_9, 0),
    2 => Entry::Ext(ThumbExt::Bit11, 1),
    3 => Entry::Ext(ThumbExt::Bit11, 2),
    4 => Entry::Ext(ThumbExt::Bits11_10, 0),
    5 => Entry::Ext(ThumbExt::Bits11_9, 1),
    6 => Entry::Ext(ThumbExt::Bit11, 3),
    7 => Entry::Ext(ThumbExt::Bit11, 4),
    8 => Entry::Ext(ThumbExt::Bit11, 5),
    9 => Entry::Ext(ThumbExt::Bit11, 6),
    10 => Entry::Ext(ThumbExt::Bit11, 7),
    11 => Entry::Ext(ThumbExt::Bits11_8, 0),
    12 => Entry::Ext(ThumbExt::Bit11, 8),
    13 => Entry::Ext(ThumbExt::Bits11_8, 1),
    // 0xe800 and up start a 32-bit instruction.
    14 => linked(ArmOp::B, 0xe000, [NO, NO], [s(ThumbTy::Pc11, OpSize::None), NO, NO], Eflags::NONE, at(ThumbExt::T32Br, 0, 4)),
);

/// Immediate-offset transfer pair `[store, load]` at `bits`.
const fn imm5_pair(
    store: ArmOp,
    load: ArmOp,
    bits: u32,
    size: OpSize,
    st_next: Link<ThumbLayout>,
    ld_next: Link<ThumbLayout>,
) -> [TEntry; 2] {
    let mem = s(ThumbTy::MemImm5, size);
    [
        linked(store, bits, [mem, NO], [LO, NO, NO], Eflags::NONE, st_next),
        linked(load, bits | 0x0800, [LO, NO], [mem, NO, NO], Eflags::NONE, ld_next),
    ]
}

static T16_BIT11: [[TEntry; 2]; 9] = [
    [
        linked(ArmOp::Lsls, 0x0000, [LO, NO], [MID, s(ThumbTy::Imm5, OpSize::Bits(5)), NO], NZC, at(ThumbExt::Dp, 0, 2)),
        linked(ArmOp::Lsrs, 0x0800, [LO, NO], [MID, s(ThumbTy::Imm5Shift, OpSize::Bits(6)), NO], NZC, at(ThumbExt::Dp, 0, 3)),
    ],
    [
        linked(ArmOp::Movs, 0x2000, [R8, NO], [s(ThumbTy::Imm8, OpSize::B1), NO, NO], NZ, dp_at(DP_REG, 2, 1, true)),
        linked(ArmOp::Cmp, 0x2800, [NO, NO], [R8, s(ThumbTy::Imm8, OpSize::B1), NO], NZCV, at(ThumbExt::Dp, 0, 10)),
    ],
    [
        linked(ArmOp::Adds, 0x3000, [R8, NO], [R8, s(ThumbTy::Imm8, OpSize::B1), NO], NZCV, dp_at(DP_REG, 8, 1, false)),
        linked(ArmOp::Subs, 0x3800, [R8, NO], [R8, s(ThumbTy::Imm8, OpSize::B1), NO], NZCV, dp_at(DP_REG, 13, 1, false)),
    ],
    imm5_pair(ArmOp::Str, ArmOp::Ldr, 0x6000, OpSize::B4, at(ThumbExt::Bit11, 6, 0), at(ThumbExt::Bit11, 6, 1)),
    imm5_pair(ArmOp::Strb, ArmOp::Ldrb, 0x7000, OpSize::B1, wide_transfer(W_STRB), wide_transfer(W_LDRB)),
    imm5_pair(ArmOp::Strh, ArmOp::Ldrh, 0x8000, OpSize::B2, wide_transfer(W_STRH), wide_transfer(W_LDRH)),
    [
        linked(ArmOp::Str, 0x9000, [s(ThumbTy::MemSp, OpSize::B4), NO], [R8, NO, NO], Eflags::NONE, wide_transfer(W_STR)),
        linked(ArmOp::Ldr, 0x9800, [R8, NO], [s(ThumbTy::MemSp, OpSize::B4), NO, NO], Eflags::NONE, wide_transfer(W_LDR)),
    ],
    [
        linked(ArmOp::Adr, 0xa000, [R8, NO], [s(ThumbTy::AdrPc, OpSize::None), NO, NO], Eflags::NONE, at(ThumbExt::T32RnPc, ADDW, 1)),
        linked(ArmOp::Add, 0xa800, [R8, NO], [SP, s(ThumbTy::Imm8x4, OpSize::B2), NO], Eflags::NONE, at(ThumbExt::Bit7, 0, 0)),
    ],
    [
        op(
            ArmOp::Stm,
            0xc000,
            [s(ThumbTy::MemList, OpSize::RegList), R8],
            [w(ThumbTy::RegList8), R8, NO],
            Eflags::NONE,
        ),
        Entry::Ext(ThumbExt::RnInList, 0),
    ],
];

static T16_LDM: [TEntry; 2] = [
    linked(
        ArmOp::Ldm,
        0xc800,
        [w(ThumbTy::RegList8), R8],
        [s(ThumbTy::MemList, OpSize::RegList), R8, NO],
        Eflags::NONE,
        at(ThumbExt::RnInList, 0, 1),
    ),
    op(
        ArmOp::Ldm,
        0xc800,
        [w(ThumbTy::RegList8), NO],
        [s(ThumbTy::MemList, OpSize::RegList), NO, NO],
        Eflags::NONE,
    ),
];

const IMM3: S = s(ThumbTy::Imm3, OpSize::Bits(3));
const ASRS_IMM: TEntry = linked(
    ArmOp::Asrs,
    0x1000,
    [LO, NO],
    [MID, s(ThumbTy::Imm5Shift, OpSize::Bits(6)), NO],
    NZC,
    at(ThumbExt::Dp, 0, 4),
);

const fn reg_offset(store: bool, op: ArmOp, bits: u32, size: OpSize, next: Link<ThumbLayout>) -> TEntry {
    let mem = s(ThumbTy::MemReg, size);
    if store {
        linked(op, bits, [mem, NO], [LO, NO, NO], Eflags::NONE, next)
    } else {
        linked(op, bits, [LO, NO], [mem, NO, NO], Eflags::NONE, next)
    }
}

static T16_BITS11_9: [[TEntry; 8]; 2] = [
    [
        ASRS_IMM,
        ASRS_IMM,
        ASRS_IMM,
        ASRS_IMM,
        linked(ArmOp::Adds, 0x1800, [LO, NO], [MID, HI3, NO], NZCV, at(ThumbExt::Bits11_9, 0, 6)),
        linked(ArmOp::Subs, 0x1a00, [LO, NO], [MID, HI3, NO], NZCV, at(ThumbExt::Bits11_9, 0, 7)),
        linked(ArmOp::Adds, 0x1c00, [LO, NO], [MID, IMM3, NO], NZCV, at(ThumbExt::Bit11, 2, 0)),
        linked(ArmOp::Subs, 0x1e00, [LO, NO], [MID, IMM3, NO], NZCV, at(ThumbExt::Bit11, 2, 1)),
    ],
    [
        reg_offset(true, ArmOp::Str, 0x5000, OpSize::B4, at(ThumbExt::Bit11, 3, 0)),
        reg_offset(true, ArmOp::Strh, 0x5200, OpSize::B2, at(ThumbExt::Bit11, 5, 0)),
        reg_offset(true, ArmOp::Strb, 0x5400, OpSize::B1, at(ThumbExt::Bit11, 4, 0)),
        reg_offset(false, ArmOp::Ldrsb, 0x5600, OpSize::B1, wide_transfer(W_LDRSB)),
        reg_offset(false, ArmOp::Ldr, 0x5800, OpSize::B4, at(ThumbExt::Bit11, 3, 1)),
        reg_offset(false, ArmOp::Ldrh, 0x5a00, OpSize::B2, at(ThumbExt::Bit11, 5, 1)),
        reg_offset(false, ArmOp::Ldrb, 0x5c00, OpSize::B1, at(ThumbExt::Bit11, 4, 1)),
        reg_offset(false, ArmOp::Ldrsh, 0x5e00, OpSize::B2, wide_transfer(W_LDRSH)),
    ],
];

const LDR_LIT: TEntry = linked(
    ArmOp::Ldr,
    0x4800,
    [R8, NO],
    [s(ThumbTy::MemLit, OpSize::B4), NO, NO],
    Eflags::NONE,
    at(ThumbExt::Bits11_9, 1, 4),
);

static T16_BITS11_10: [TEntry; 4] = [
    Entry::Ext(ThumbExt::Dp, 0),
    Entry::Ext(ThumbExt::Special, 0),
    LDR_LIT,
    LDR_LIT,
];

/// Two-register data processing: `op Rdn, Rm` reads and writes Rdn.
const fn dp2(op: ArmOp, n: u32, eflags: Eflags, next: Link<ThumbLayout>) -> TEntry {
    entry(op, 0x4000 | (n << 6), [LO, NO], [LO, MID, NO], Flags::NONE, eflags, next)
}

static T16_DP: [TEntry; 16] = [
    dp2(ArmOp::Ands, 0, NZC, dp_at(DP_REG, 0, 1, false)),
    dp2(ArmOp::Eors, 1, NZC, dp_at(DP_REG, 4, 1, false)),
    dp2(ArmOp::Lsls, 2, NZC, Link::End),
    dp2(ArmOp::Lsrs, 3, NZC, Link::End),
    dp2(ArmOp::Asrs, 4, NZC, Link::End),
    dp2(ArmOp::Adcs, 5, CARRY_IN, dp_at(DP_REG, 10, 1, false)),
    dp2(ArmOp::Sbcs, 6, CARRY_IN, dp_at(DP_REG, 11, 1, false)),
    dp2(ArmOp::Rors, 7, NZC, Link::End),
    linked(ArmOp::Tst, 0x4200, [NO, NO], [LO, MID, NO], NZC, dp_at(DP_REG, 0, 1, true)),
    linked(
        ArmOp::Rsbs,
        0x4240,
        [LO, NO],
        [MID, s(ThumbTy::Zero, OpSize::B1), NO],
        NZCV,
        dp_at(DP_REG, 14, 1, false),
    ),
    linked(ArmOp::Cmp, 0x4280, [NO, NO], [LO, MID, NO], NZCV, at(ThumbExt::Special, 0, 2)),
    linked(ArmOp::Cmn, 0x42c0, [NO, NO], [LO, MID, NO], NZCV, dp_at(DP_REG, 8, 1, true)),
    dp2(ArmOp::Orrs, 12, NZC, dp_at(DP_REG, 2, 1, false)),
    op(ArmOp::Muls, 0x4340, [LO, NO], [MID, LO, NO], NZ),
    dp2(ArmOp::Bics, 14, NZC, dp_at(DP_REG, 1, 1, false)),
    linked(ArmOp::Mvns, 0x43c0, [LO, NO], [MID, NO, NO], NZC, dp_at(DP_REG, 3, 1, true)),
];

const RDN: S = w(ThumbTy::RdnHi);
const RM: S = w(ThumbTy::RmHi);
const ADD_HI: TEntry = linked(ArmOp::Add, 0x4400, [RDN, NO], [RDN, RM, NO], Eflags::NONE, at(ThumbExt::Bit11, 7, 1));
const CMP_HI: TEntry = linked(ArmOp::Cmp, 0x4500, [NO, NO], [RDN, RM, NO], NZCV, dp_at(DP_REG, 13, 1, true));
const MOV_HI: TEntry = linked(ArmOp::Mov, 0x4600, [RDN, NO], [RM, NO, NO], Eflags::NONE, dp_at(DP_REG, 2, 0, true));

static T16_SPECIAL: [TEntry; 8] = [
    ADD_HI,
    ADD_HI,
    CMP_HI,
    CMP_HI,
    MOV_HI,
    MOV_HI,
    op(ArmOp::Bx, 0x4700, [NO, NO], [RM, NO, NO], Eflags::NONE),
    linked(ArmOp::Blx, 0x4780, [LR, NO], [RM, NO, NO], Eflags::NONE, at(ThumbExt::T32Br, 0, 6)),
];

const SP_IMM: S = s(ThumbTy::Imm7x4, OpSize::B2);

static T16_BIT7: [TEntry; 2] = [
    linked(ArmOp::Add, 0xb000, [SP, NO], [SP, SP_IMM, NO], Eflags::NONE, dp_at(DP_REG, 8, 0, false)),
    linked(ArmOp::Sub, 0xb080, [SP, NO], [SP, SP_IMM, NO], Eflags::NONE, dp_at(DP_REG, 13, 0, false)),
];

const fn unary(op_: ArmOp, bits: u32) -> TEntry {
    op(op_, bits, [LO, NO], [MID, NO, NO], Eflags::NONE)
}

static T16_BITS7_6: [[TEntry; 4]; 2] = [
    [
        unary(ArmOp::Sxth, 0xb200),
        unary(ArmOp::Sxtb, 0xb240),
        unary(ArmOp::Uxth, 0xb280),
        unary(ArmOp::Uxtb, 0xb2c0),
    ],
    [
        unary(ArmOp::Rev, 0xba00),
        unary(ArmOp::Rev16, 0xba40),
        Entry::Invalid,
        unary(ArmOp::Revsh, 0xbac0),
    ],
];

const CBZ: TEntry = op(ArmOp::Cbz, 0xb100, [NO, NO], [LO, s(ThumbTy::PcCbz, OpSize::None), NO], Eflags::NONE);
const CBNZ: TEntry = op(ArmOp::Cbnz, 0xb900, [NO, NO], [LO, s(ThumbTy::PcCbz, OpSize::None), NO], Eflags::NONE);
const PUSH: TEntry = op(
    ArmOp::Push,
    0xb400,
    [s(ThumbTy::MemPush, OpSize::RegList), SP],
    [w(ThumbTy::RegListLr), SP, NO],
    Eflags::NONE,
);
const POP: TEntry = op(
    ArmOp::Pop,
    0xbc00,
    [w(ThumbTy::RegListPc), SP],
    [s(ThumbTy::MemPop, OpSize::RegList), SP, NO],
    Eflags::NONE,
);
const IMM8: S = s(ThumbTy::Imm8, OpSize::B1);

static T16_BITS11_8: [[TEntry; 16]; 2] = [
    span_table!(16;
        0 => Entry::Ext(ThumbExt::Bit7, 0),
        1 => CBZ,
        2 => Entry::Ext(ThumbExt::Bits7_6, 0),
        3 => CBZ,
        4..=5 => PUSH,
        9 => CBNZ,
        10 => Entry::Ext(ThumbExt::Bits7_6, 1),
        11 => CBNZ,
        12..=13 => POP,
        14 => op(ArmOp::Bkpt, 0xbe00, [NO, NO], [IMM8, NO, NO], Eflags::NONE),
        15 => Entry::Ext(ThumbExt::ItHint, 0),
    ),
    span_table!(16;
        0..=13 => entry(
            ArmOp::B,
            0xd000,
            [NO, NO],
            [s(ThumbTy::Pc8, OpSize::None), NO, NO],
            Flags::PREDICATE_8,
            Eflags::NONE,
            at(ThumbExt::Top16, 0, 14),
        ),
        14 => op(ArmOp::Udf, 0xde00, [NO, NO], [IMM8, NO, NO], Eflags::NONE),
        15 => op(ArmOp::Svc, 0xdf00, [NO, NO], [IMM8, NO, NO], Eflags::NONE),
    ),
];

const fn hint(op_: ArmOp, n: u32) -> TEntry {
    op(op_, 0xbf00 | (n << 4), [NO, NO], [NO, NO, NO], Eflags::NONE)
}

static T16_IT_HINT: [TEntry; 9] = span_table!(9;
    0 => hint(ArmOp::Nop, 0),
    1 => hint(ArmOp::Yield, 1),
    2 => hint(ArmOp::Wfe, 2),
    3 => hint(ArmOp::Wfi, 3),
    4 => hint(ArmOp::Sev, 4),
    8 => op(
        ArmOp::It,
        0xbf00,
        [NO, NO],
        [s(ThumbTy::ItCond, OpSize::Bits(4)), s(ThumbTy::ItMask, OpSize::Bits(4)), NO],
        Eflags::NONE,
    ),
);

// ── 32-bit branches ──────────────────────────────────────────────────────

static T32_TOP: [TEntry; 4] = span_table!(4;
    1 => Entry::Ext(ThumbExt::T32Bits26_25, 0),
    2 => Entry::Ext(ThumbExt::T32Br, 0),
    3 => Entry::Ext(ThumbExt::T32Bits26_25, 1),
);

static T32_BITS26_25: [[TEntry; 4]; 2] = [
    span_table!(4; 1 => Entry::Ext(ThumbExt::T32Op5, DP_REG)),
    span_table!(4; 0 => Entry::Ext(ThumbExt::T32Op5, LDST)),
];

static T32_BRANCH: [TEntry; 8] = span_table!(8;
    0..=3 => Entry::Ext(ThumbExt::T32DpImm, 0),
    4 => entry(
        ArmOp::B,
        0xf000_8000,
        [NO, NO],
        [s(ThumbTy::T32Pc20, OpSize::None), NO, NO],
        Flags::PREDICATE_22,
        Eflags::NONE,
        at(ThumbExt::T32Br, 0, 5),
    ),
    5 => op(ArmOp::B, 0xf000_9000, [NO, NO], [s(ThumbTy::T32Pc24, OpSize::None), NO, NO], Eflags::NONE),
    6 => op(ArmOp::Blx, 0xf000_c000, [LR, NO], [s(ThumbTy::T32Pc24X, OpSize::None), NO, NO], Eflags::NONE),
    7 => op(ArmOp::Bl, 0xf000_d000, [LR, NO], [s(ThumbTy::T32Pc24, OpSize::None), NO, NO], Eflags::NONE),
);

// ── 32-bit data processing ───────────────────────────────────────────────

/// [`ThumbExt::T32Op5`] sets.
const DP_REG: u16 = 0;
const DP_MOD: u16 = 1;
const DP_PLAIN: u16 = 2;
const LDST: u16 = 3;

/// [`ThumbExt::T32RnPc`] sets of the plain binary immediates.
const ADDW: u16 = 8;
const SUBW: u16 = 9;
/// First [`ThumbExt::T32RnPc`] set of the loads; two per load.
const LOAD_RN_PC: u16 = 10;

/// Data-processing ops by bits 24:21, `(plain, flag-setting)`.
const T32_DP: [Option<(ArmOp, ArmOp)>; 16] = [
    Some((ArmOp::And, ArmOp::Ands)),
    Some((ArmOp::Bic, ArmOp::Bics)),
    Some((ArmOp::Orr, ArmOp::Orrs)),
    None,
    Some((ArmOp::Eor, ArmOp::Eors)),
    None,
    None,
    None,
    Some((ArmOp::Add, ArmOp::Adds)),
    None,
    Some((ArmOp::Adc, ArmOp::Adcs)),
    Some((ArmOp::Sbc, ArmOp::Sbcs)),
    None,
    Some((ArmOp::Sub, ArmOp::Subs)),
    Some((ArmOp::Rsb, ArmOp::Rsbs)),
    None,
];

/// The [`ThumbExt::T32RdPc`] set offset of ops whose S form with Rd = pc is
/// a compare.
const fn rd_pc_set(n: usize) -> Option<u16> {
    match n {
        0 => Some(0),
        4 => Some(1),
        8 => Some(2),
        13 => Some(3),
        _ => None,
    }
}

/// Location of the wide data-processing entry for op `n` in `form`. `alt`
/// picks the compare (Rd = pc) or the move (Rn = pc).
const fn dp_at(form: u16, n: usize, sf: usize, alt: bool) -> Link<ThumbLayout> {
    if sf == 1 {
        if let Some(k) = rd_pc_set(n) {
            return at(ThumbExt::T32RdPc, form * 4 + k, alt as u16);
        }
    }
    match n {
        2 => at(ThumbExt::T32RnPc, form * 2 + sf as u16, alt as u16),
        3 => at(ThumbExt::T32RnPc, 4 + form * 2 + sf as u16, 1),
        _ => at(ThumbExt::T32Op5, form, (n << 1 | sf) as u16),
    }
}

const fn wide_dp_eflags(n: usize, set_flags: bool) -> Eflags {
    let reads = if n == 10 || n == 11 { Eflags::READ_CF } else { Eflags::NONE };
    let writes = if !set_flags {
        Eflags::NONE
    } else if n <= 4 {
        NZC
    } else {
        NZCV
    };
    reads.union(writes)
}

const IMM12: S = s(ThumbTy::T32Imm12, OpSize::Bits(12));

/// One wide data-processing entry. Register forms link to the modified
/// immediate; `add`/`sub` immediates go on to the plain 12-bit forms.
const fn wide_dp(form: u16, n: usize, sf: usize, alt: bool) -> TEntry {
    let unary = alt && (n == 2 || n == 3);
    let compare = alt && !unary;
    let opcode = if unary {
        match (n, sf) {
            (2, 0) => ArmOp::Mov,
            (2, _) => ArmOp::Movs,
            (_, 0) => ArmOp::Mvn,
            _ => ArmOp::Mvns,
        }
    } else if compare {
        match n {
            0 => ArmOp::Tst,
            4 => ArmOp::Teq,
            8 => ArmOp::Cmn,
            _ => ArmOp::Cmp,
        }
    } else {
        match T32_DP[n] {
            Some((_, flag)) if sf == 1 => flag,
            Some((plain, _)) => plain,
            None => return Entry::Invalid,
        }
    };
    let base = if form == DP_REG { 0xea00_0000 } else { 0xf000_0000 };
    let mut bits = base | (n as u32) << 21 | (sf as u32) << 20;
    if compare {
        bits |= 0x0f00;
    }
    if unary {
        bits |= 0x000f_0000;
    }
    let eflags = wide_dp_eflags(n, sf == 1);
    let next = if form == DP_REG {
        dp_at(DP_MOD, n, sf, alt)
    } else if !alt && sf == 0 && n == 8 {
        at(ThumbExt::T32RnPc, ADDW, 0)
    } else if !alt && sf == 0 && n == 13 {
        at(ThumbExt::T32RnPc, SUBW, 0)
    } else {
        Link::End
    };
    let (rd, rn) = (w(ThumbTy::T32Rd), w(ThumbTy::T32Rn));
    if form == DP_MOD {
        let imm = s(ThumbTy::T32ModImm, OpSize::Bits(12));
        return match (unary, compare) {
            (true, _) => linked(opcode, bits, [rd, NO], [imm, NO, NO], eflags, next),
            (_, true) => linked(opcode, bits, [NO, NO], [rn, imm, NO], eflags, next),
            _ => linked(opcode, bits, [rd, NO], [rn, imm, NO], eflags, next),
        };
    }
    let rm = w(ThumbTy::T32Rm);
    let ty = s(ThumbTy::T32ShTy, OpSize::Bits(2));
    let amount = s(ThumbTy::T32ShAmt, OpSize::Bits(5));
    match (unary, compare) {
        (true, _) => linked(opcode, bits, [rd, NO], [rm, ty, amount], eflags, next),
        (_, true) => entry(opcode, bits, [NO, amount], [rn, rm, ty], Flags::SRC4, eflags, next),
        _ => entry(opcode, bits, [rd, amount], [rn, rm, ty], Flags::SRC4, eflags, next),
    }
}

const fn dp_rows(form: u16) -> [TEntry; 32] {
    let mut t = [Entry::Invalid; 32];
    let mut r = 0;
    while r < 32 {
        let (n, sf) = (r >> 1, r & 1);
        t[r] = match (n, rd_pc_set(n)) {
            (_, Some(k)) if sf == 1 => Entry::Ext(ThumbExt::T32RdPc, form * 4 + k),
            (2, _) => Entry::Ext(ThumbExt::T32RnPc, form * 2 + sf as u16),
            (3, _) => Entry::Ext(ThumbExt::T32RnPc, 4 + form * 2 + sf as u16),
            _ => wide_dp(form, n, sf, false),
        };
        r += 1;
    }
    t
}

const fn rd_pc_sets() -> [[TEntry; 2]; 8] {
    let ops = [0, 4, 8, 13];
    let mut t = [[Entry::Invalid; 2]; 8];
    let mut i = 0;
    while i < 8 {
        let (form, n) = ((i / 4) as u16, ops[i % 4]);
        t[i] = [wide_dp(form, n, 1, false), wide_dp(form, n, 1, true)];
        i += 1;
    }
    t
}

/// `[Rn != pc, Rn == pc]` pairs: orr/mov, orn/mvn, addw/adr, subw/adr and
/// each load's offset forms against its literal form.
const fn rn_pc_sets() -> [[TEntry; 2]; 20] {
    let mut t = [[Entry::Invalid; 2]; 20];
    let mut i = 0;
    while i < 4 {
        let (form, sf) = ((i / 2) as u16, i % 2);
        t[i] = [wide_dp(form, 2, sf, false), wide_dp(form, 2, sf, true)];
        t[4 + i] = [Entry::Invalid, wide_dp(form, 3, sf, true)];
        i += 1;
    }
    let (rd, rn) = (w(ThumbTy::T32Rd), w(ThumbTy::T32Rn));
    t[ADDW as usize] = [
        op(ArmOp::Add, 0xf200_0000, [rd, NO], [rn, IMM12, NO], Eflags::NONE),
        linked(
            ArmOp::Adr,
            0xf20f_0000,
            [rd, NO],
            [s(ThumbTy::T32AdrUp, OpSize::None), NO, NO],
            Eflags::NONE,
            at(ThumbExt::T32RnPc, SUBW, 1),
        ),
    ];
    t[SUBW as usize] = [
        op(ArmOp::Sub, 0xf2a0_0000, [rd, NO], [rn, IMM12, NO], Eflags::NONE),
        op(ArmOp::Adr, 0xf2af_0000, [rd, NO], [s(ThumbTy::T32AdrDown, OpSize::None), NO, NO], Eflags::NONE),
    ];
    let mut j = 0;
    while j < 5 {
        let i = W_LDRB + j;
        let set = LOAD_RN_PC as usize + 2 * j;
        t[set] = [Entry::Ext(ThumbExt::T32LsMode, i as u16), transfer(i, LS_LIT)];
        t[set + 1] = [transfer(i, LS_IMM12), transfer(i, LS_LIT)];
        j += 1;
    }
    t
}

static T32_DP_IMM: [TEntry; 2] = [Entry::Ext(ThumbExt::T32Op5, DP_MOD), Entry::Ext(ThumbExt::T32Op5, DP_PLAIN)];
static T32_DP_REG: [TEntry; 32] = dp_rows(DP_REG);
static T32_DP_MOD: [TEntry; 32] = dp_rows(DP_MOD);
static T32_RD_PC: [[TEntry; 2]; 8] = rd_pc_sets();
static T32_RN_PC: [[TEntry; 2]; 20] = rn_pc_sets();

const IMM16: S = s(ThumbTy::T32Imm16, OpSize::B2);

static T32_DP_PLAIN: [TEntry; 32] = span_table!(32;
    0 => Entry::Ext(ThumbExt::T32RnPc, ADDW),
    4 => op(ArmOp::Movw, 0xf240_0000, [w(ThumbTy::T32Rd), NO], [IMM16, NO, NO], Eflags::NONE),
    10 => Entry::Ext(ThumbExt::T32RnPc, SUBW),
    12 => op(ArmOp::Movt, 0xf2c0_0000, [w(ThumbTy::T32Rd), NO], [IMM16, NO, NO], Eflags::NONE),
);

// ── 32-bit loads and stores ──────────────────────────────────────────────

/// Wide single transfers: opcode, bits 24:20 without the imm12 bit, and
/// access size.
const TRANSFERS: [(ArmOp, u32, OpSize); 8] = [
    (ArmOp::Strb, 0x00, OpSize::B1),
    (ArmOp::Strh, 0x02, OpSize::B2),
    (ArmOp::Str, 0x04, OpSize::B4),
    (ArmOp::Ldrb, 0x01, OpSize::B1),
    (ArmOp::Ldrh, 0x03, OpSize::B2),
    (ArmOp::Ldr, 0x05, OpSize::B4),
    (ArmOp::Ldrsb, 0x11, OpSize::B1),
    (ArmOp::Ldrsh, 0x13, OpSize::B2),
];

const W_STRB: usize = 0;
const W_STRH: usize = 1;
const W_STR: usize = 2;
const W_LDRB: usize = 3;
const W_LDRH: usize = 4;
const W_LDR: usize = 5;
const W_LDRSB: usize = 6;
const W_LDRSH: usize = 7;

/// Addressing forms in chain order.
const LS_LIT: u8 = 0;
const LS_IMM12: u8 = 1;
const LS_NEG: u8 = 2;
const LS_PRE: u8 = 3;
const LS_POST: u8 = 4;
const LS_REG: u8 = 5;

const fn is_load(i: usize) -> bool {
    i >= W_LDRB
}

const fn transfer_at(i: usize, form: u8) -> Link<ThumbLayout> {
    match form {
        LS_LIT => at(ThumbExt::T32RnPc, LOAD_RN_PC + 2 * (i - W_LDRB) as u16, 1),
        LS_IMM12 if is_load(i) => at(ThumbExt::T32RnPc, LOAD_RN_PC + 2 * (i - W_LDRB) as u16 + 1, 0),
        LS_IMM12 => at(ThumbExt::T32Op5, LDST, (TRANSFERS[i].1 | 8) as u16),
        LS_NEG => at(ThumbExt::T32LsMode, i as u16, 5),
        LS_PRE => at(ThumbExt::T32LsMode, i as u16, 8),
        LS_POST => at(ThumbExt::T32LsMode, i as u16, 4),
        _ => at(ThumbExt::T32LsMode, i as u16, 0),
    }
}

/// First wide form of transfer `i`; narrow chains end here.
const fn wide_transfer(i: usize) -> Link<ThumbLayout> {
    if is_load(i) {
        transfer_at(i, LS_LIT)
    } else {
        transfer_at(i, LS_IMM12)
    }
}

const fn transfer(i: usize, form: u8) -> TEntry {
    let (opcode, row, size) = TRANSFERS[i];
    let mut bits = 0xf800_0000 | row << 20;
    let next = if form == LS_REG { Link::End } else { transfer_at(i, form + 1) };
    let (mem, writeback) = match form {
        LS_LIT => {
            bits |= 0x000f_0000;
            (s(ThumbTy::T32MemLit, size), false)
        }
        LS_IMM12 => {
            bits |= 0x0080_0000;
            (s(ThumbTy::T32MemImm12, size), false)
        }
        LS_NEG => {
            bits |= 0x0c00;
            (s(ThumbTy::T32MemNeg, size), false)
        }
        LS_PRE => {
            bits |= 0x0d00;
            (s(ThumbTy::T32MemPre, size), true)
        }
        LS_POST => {
            bits |= 0x0900;
            (s(ThumbTy::T32MemPost, size), true)
        }
        _ => (s(ThumbTy::T32MemReg, size), false),
    };
    let (rt, rn) = (w(ThumbTy::T32Rt), w(ThumbTy::T32Rn));
    let amount = s(ThumbTy::T32Imm8Signed, OpSize::B2);
    match (is_load(i), writeback) {
        (true, false) => linked(opcode, bits, [rt, NO], [mem, NO, NO], Eflags::NONE, next),
        (false, false) => linked(opcode, bits, [mem, NO], [rt, NO, NO], Eflags::NONE, next),
        (true, true) => linked(opcode, bits, [rt, rn], [mem, amount, rn], Eflags::NONE, next),
        (false, true) => linked(opcode, bits, [mem, rn], [rt, amount, rn], Eflags::NONE, next),
    }
}

/// One transfer's 8-bit offset forms by [`ThumbExt::T32LsMode`] row.
const fn ls_modes(i: usize) -> [TEntry; 9] {
    let mut t = [Entry::Invalid; 9];
    t[0] = transfer(i, LS_REG);
    t[2] = transfer(i, LS_POST);
    t[4] = t[2];
    t[5] = transfer(i, LS_NEG);
    t[6] = transfer(i, LS_PRE);
    t[8] = t[6];
    t
}

const fn ldst_rows() -> [TEntry; 32] {
    let mut t = [Entry::Invalid; 32];
    let mut i = 0;
    while i < TRANSFERS.len() {
        let row = TRANSFERS[i].1 as usize;
        if is_load(i) {
            let set = LOAD_RN_PC + 2 * (i - W_LDRB) as u16;
            t[row] = Entry::Ext(ThumbExt::T32RnPc, set);
            t[row | 8] = Entry::Ext(ThumbExt::T32RnPc, set + 1);
        } else {
            t[row] = Entry::Ext(ThumbExt::T32LsMode, i as u16);
            t[row | 8] = transfer(i, LS_IMM12);
        }
        i += 1;
    }
    t
}

static T32_LDST: [TEntry; 32] = ldst_rows();
static T32_LS_MODE: [[TEntry; 9]; 8] = [
    ls_modes(0),
    ls_modes(1),
    ls_modes(2),
    ls_modes(3),
    ls_modes(4),
    ls_modes(5),
    ls_modes(6),
    ls_modes(7),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{chain, find_head, validate, walk};

    fn head(op: ArmOp) -> &'static OpInfo<ThumbLayout> {
        find_head::<ThumbLayout>(Opcode::Arm(op)).unwrap().1
    }

    #[test]
    fn forest_is_well_formed() {
        let terminals = validate::<ThumbLayout>().unwrap();
        assert!(terminals > 150, "only {} terminals", terminals);
    }

    #[test]
    fn chains_try_narrow_forms_first() {
        let bits: Vec<u32> = chain(head(ArmOp::B)).map(|i| i.bits).collect();
        assert_eq!(bits, [0xd000, 0xe000, 0xf000_8000, 0xf000_9000]);
        let bits: Vec<u32> = chain(head(ArmOp::Ldr)).map(|i| i.bits).collect();
        assert_eq!(
            bits,
            [
                0x4800,
                0x5800,
                0x6800,
                0x9800,
                0xf85f_0000,
                0xf8d0_0000,
                0xf850_0c00,
                0xf850_0d00,
                0xf850_0900,
                0xf850_0000,
            ]
        );
        let bits: Vec<u32> = chain(head(ArmOp::Add)).map(|i| i.bits).collect();
        assert_eq!(&bits[bits.len() - 3..], [0xeb00_0000, 0xf100_0000, 0xf200_0000]);
        assert_eq!(chain(head(ArmOp::Cmp)).count(), 5);
        let bits: Vec<u32> = chain(head(ArmOp::Strb)).map(|i| i.bits).collect();
        assert_eq!(bits, [0x5400, 0x7000, 0xf880_0000, 0xf800_0c00, 0xf800_0d00, 0xf800_0900, 0xf800_0000]);
    }

    #[test]
    fn wide_forms_sit_above_the_halfword_space() {
        walk::<ThumbLayout>(|at, info| {
            if info.bits > 0xffff {
                assert!(info.bits >> 27 >= 0x1d, "{:?}", at);
            }
        });
    }

    #[test]
    fn wide_only_ops_have_heads() {
        for op in [ArmOp::Movw, ArmOp::Movt, ArmOp::Teq, ArmOp::Orr, ArmOp::Mvn, ArmOp::Ldrb] {
            assert!(find_head::<ThumbLayout>(Opcode::Arm(op)).is_some(), "{:?}", op);
        }
        assert_eq!(head(ArmOp::Movw).bits, 0xf240_0000);
    }

    #[test]
    fn narrow_masks_stay_in_the_halfword() {
        walk::<ThumbLayout>(|at, info| {
            if info.bits <= 0xffff {
                assert_eq!(info.mask >> 16, 0, "{:?}", at);
            }
            assert!(info.matches(info.bits), "{:?}", at);
        });
    }

    #[test]
    fn conditional_branch_masks_out_the_condition() {
        let b = head(ArmOp::B);
        assert!(b.flags.contains(Flags::PREDICATE_8));
        assert_eq!(b.mask & 0x0f00, 0);
    }
}
