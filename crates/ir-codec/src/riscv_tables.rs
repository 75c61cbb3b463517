//! RISC-V (RV64GC) opcodes and decode tables.
//!
//! Two roots. Full-width instructions (low bits `11`) start at the major
//! opcode in bits 6:2 and refine through funct3, funct7 and friends.
//! Compressed instructions start at the quadrant (bits 1:0) and refine
//! through funct3 (bits 15:13) and the few sub-fields the C extension packs
//! below it.
//!
//! ```text
//!   32-bit  31..25  24..20  19..15  14..12  11..7  6..2   1..0
//!           funct7  rs2     rs1     funct3  rd     major  11
//!   16-bit  15..13  12  11..7  6..2  1..0
//!           funct3  .   rd/rs1 rs2   quadrant
//! ```

use crate::instr::{Eflags, Opcode};
use crate::size::OpSize;
use crate::table::{opcode_enum, span_table, Entry, Flags, Layout, Link, OpInfo, Slot};

opcode_enum! {
    /// RISC-V opcode.
    pub enum RvOp {
        Lui => "lui",
        Auipc => "auipc",
        Jal => "jal",
        Jalr => "jalr",
        Beq => "beq",
        Bne => "bne",
        Blt => "blt",
        Bge => "bge",
        Bltu => "bltu",
        Bgeu => "bgeu",
        Lb => "lb",
        Lh => "lh",
        Lw => "lw",
        Ld => "ld",
        Lbu => "lbu",
        Lhu => "lhu",
        Lwu => "lwu",
        Sb => "sb",
        Sh => "sh",
        Sw => "sw",
        Sd => "sd",
        Addi => "addi",
        Slti => "slti",
        Sltiu => "sltiu",
        Xori => "xori",
        Ori => "ori",
        Andi => "andi",
        Slli => "slli",
        Srli => "srli",
        Srai => "srai",
        Add => "add",
        Sub => "sub",
        Sll => "sll",
        Slt => "slt",
        Sltu => "sltu",
        Xor => "xor",
        Srl => "srl",
        Sra => "sra",
        Or => "or",
        And => "and",
        Addiw => "addiw",
        Slliw => "slliw",
        Srliw => "srliw",
        Sraiw => "sraiw",
        Addw => "addw",
        Subw => "subw",
        Sllw => "sllw",
        Srlw => "srlw",
        Sraw => "sraw",
        Fence => "fence",
        FenceI => "fence.i",
        Ecall => "ecall",
        Ebreak => "ebreak",
        Csrrw => "csrrw",
        Csrrs => "csrrs",
        Csrrc => "csrrc",
        Csrrwi => "csrrwi",
        Csrrsi => "csrrsi",
        Csrrci => "csrrci",
        Mul => "mul",
        Mulh => "mulh",
        Mulhsu => "mulhsu",
        Mulhu => "mulhu",
        Div => "div",
        Divu => "divu",
        Rem => "rem",
        Remu => "remu",
        Mulw => "mulw",
        Divw => "divw",
        Divuw => "divuw",
        Remw => "remw",
        Remuw => "remuw",
        LrW => "lr.w",
        ScW => "sc.w",
        AmoswapW => "amoswap.w",
        AmoaddW => "amoadd.w",
        AmoxorW => "amoxor.w",
        AmoandW => "amoand.w",
        AmoorW => "amoor.w",
        AmominW => "amomin.w",
        AmomaxW => "amomax.w",
        AmominuW => "amominu.w",
        AmomaxuW => "amomaxu.w",
        LrD => "lr.d",
        ScD => "sc.d",
        AmoswapD => "amoswap.d",
        AmoaddD => "amoadd.d",
        AmoxorD => "amoxor.d",
        AmoandD => "amoand.d",
        AmoorD => "amoor.d",
        AmominD => "amomin.d",
        AmomaxD => "amomax.d",
        AmominuD => "amominu.d",
        AmomaxuD => "amomaxu.d",
        Flw => "flw",
        Fsw => "fsw",
        FmaddS => "fmadd.s",
        FmsubS => "fmsub.s",
        FnmsubS => "fnmsub.s",
        FnmaddS => "fnmadd.s",
        FaddS => "fadd.s",
        FsubS => "fsub.s",
        FmulS => "fmul.s",
        FdivS => "fdiv.s",
        FsqrtS => "fsqrt.s",
        FsgnjS => "fsgnj.s",
        FsgnjnS => "fsgnjn.s",
        FsgnjxS => "fsgnjx.s",
        FminS => "fmin.s",
        FmaxS => "fmax.s",
        FcvtWS => "fcvt.w.s",
        FcvtWuS => "fcvt.wu.s",
        FcvtLS => "fcvt.l.s",
        FcvtLuS => "fcvt.lu.s",
        FmvXW => "fmv.x.w",
        FeqS => "feq.s",
        FltS => "flt.s",
        FleS => "fle.s",
        FclassS => "fclass.s",
        FcvtSW => "fcvt.s.w",
        FcvtSWu => "fcvt.s.wu",
        FcvtSL => "fcvt.s.l",
        FcvtSLu => "fcvt.s.lu",
        FmvWX => "fmv.w.x",
        Fld => "fld",
        Fsd => "fsd",
        FmaddD => "fmadd.d",
        FmsubD => "fmsub.d",
        FnmsubD => "fnmsub.d",
        FnmaddD => "fnmadd.d",
        FaddD => "fadd.d",
        FsubD => "fsub.d",
        FmulD => "fmul.d",
        FdivD => "fdiv.d",
        FsqrtD => "fsqrt.d",
        FsgnjD => "fsgnj.d",
        FsgnjnD => "fsgnjn.d",
        FsgnjxD => "fsgnjx.d",
        FminD => "fmin.d",
        FmaxD => "fmax.d",
        FcvtSD => "fcvt.s.d",
        FcvtDS => "fcvt.d.s",
        FeqD => "feq.d",
        FltD => "flt.d",
        FleD => "fle.d",
        FclassD => "fclass.d",
        FcvtWD => "fcvt.w.d",
        FcvtWuD => "fcvt.wu.d",
        FcvtLD => "fcvt.l.d",
        FcvtLuD => "fcvt.lu.d",
        FmvXD => "fmv.x.d",
        FcvtDW => "fcvt.d.w",
        FcvtDWu => "fcvt.d.wu",
        FcvtDL => "fcvt.d.l",
        FcvtDLu => "fcvt.d.lu",
        FmvDX => "fmv.d.x",
        CAddi4spn => "c.addi4spn",
        CFld => "c.fld",
        CLw => "c.lw",
        CLd => "c.ld",
        CFsd => "c.fsd",
        CSw => "c.sw",
        CSd => "c.sd",
        CAddi => "c.addi",
        CAddiw => "c.addiw",
        CLi => "c.li",
        CAddi16sp => "c.addi16sp",
        CLui => "c.lui",
        CSrli => "c.srli",
        CSrai => "c.srai",
        CAndi => "c.andi",
        CSub => "c.sub",
        CXor => "c.xor",
        COr => "c.or",
        CAnd => "c.and",
        CSubw => "c.subw",
        CAddw => "c.addw",
        CJ => "c.j",
        CBeqz => "c.beqz",
        CBnez => "c.bnez",
        CSlli => "c.slli",
        CFldsp => "c.fldsp",
        CLwsp => "c.lwsp",
        CLdsp => "c.ldsp",
        CJr => "c.jr",
        CMv => "c.mv",
        CEbreak => "c.ebreak",
        CJalr => "c.jalr",
        CAdd => "c.add",
        CFsdsp => "c.fsdsp",
        CSwsp => "c.swsp",
        CSdsp => "c.sdsp",
        Unimp => "unimp",
    }
}

// ── Layout ───────────────────────────────────────────────────────────────

/// The RISC-V table forest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RvLayout;

/// RISC-V table kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RvExt {
    /// Major opcode, bits 6:2.
    Top,
    /// funct3, bits 14:12.
    Funct3,
    /// Integer register-register groups: funct7 0x00, 0x01 and 0x20 select
    /// a block of eight rows, funct3 the row within it.
    Funct3Funct7,
    /// funct7 of the 32-bit shift immediates: 0x00 and 0x20 map to rows 0 and 2.
    Funct7Rv,
    /// 64-bit shift-immediate funct6 (31:26): 0x00 and 0x10 map to rows 0 and 1.
    Funct6,
    /// funct5 of the atomics, bits 31:27.
    Funct5,
    /// System immediate 31:20, with rs1 and rd required zero.
    Imm12,
    /// Full funct7 of the FP group, bits 31:25.
    Funct7,
    /// Precision of a fused multiply-add, bits 26:25.
    Fmt,
    /// rs2 used as an opcode extension (FP conversions), bits 24:20.
    Rs2,
    /// Quadrant of a compressed instruction, bits 1:0.
    CQuad,
    /// funct3 of a compressed instruction, bits 15:13.
    CFunct3,
    /// The all-zero halfword versus `c.addi4spn`.
    CZero,
    /// rd of quadrant 1 funct3 3: `sp` selects `c.addi16sp`.
    CSpRd,
    /// Bits 11:10 of quadrant 1 funct3 4.
    CFunct2,
    /// Bit 12 with bits 6:5 of the compressed register-register group.
    CArith,
    /// Bit 12 with whether rs1 and rs2 are zero, quadrant 2 funct3 4.
    CBit12,
}

/// RISC-V operand types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RvTy {
    None,
    /// Integer register 11:7.
    Rd,
    /// Integer register 19:15.
    Rs1,
    /// Integer register 24:20.
    Rs2,
    /// FP register 11:7.
    Fd,
    /// FP register 19:15.
    Fs1,
    /// FP register 24:20.
    Fs2,
    /// FP register 31:27.
    Fs3,
    /// Signed 31:20.
    ImmI,
    /// 31:12, shifted into place and sign-extended.
    ImmU,
    /// 25:20.
    Shamt6,
    /// 24:20.
    Shamt5,
    /// Branch offset imm[12|10:5] (31:25) and imm[4:1|11] (11:7).
    PcB,
    /// Jump offset imm[20|10:1|11|19:12], 31:12.
    PcJ,
    /// CSR number, 31:20.
    Csr,
    /// CSR immediate in the rs1 field.
    Uimm5,
    /// Rounding mode, 14:12.
    Rm,
    /// Fence predecessor set, 27:24.
    Pred,
    /// Fence successor set, 23:20.
    Succ,
    /// Atomic ordering bits aq:rl, 26:25.
    AqRl,
    /// `[rs1 + imm12]` of a load.
    MemI,
    /// `[rs1 + imm12]` of a store, the immediate split around rd's bits.
    MemS,
    /// `[rs1]` of an atomic.
    MemAmo,
    /// Integer register 11:7 of a compressed instruction.
    CRd,
    /// Like [`RvTy::CRd`], reserved when zero.
    CRdNz,
    /// Integer register 6:2.
    CRs2,
    /// FP register 11:7.
    CFd,
    /// FP register 6:2.
    CFs2,
    /// x8..x15 from bits 4:2.
    CRdP,
    /// x8..x15 from bits 9:7.
    CRs1P,
    /// x8..x15 from bits 4:2, read.
    CRs2P,
    /// f8..f15 from bits 4:2.
    CFdP,
    /// f8..f15 from bits 4:2, read.
    CFs2P,
    /// Implicit `sp`.
    Sp,
    /// Implicit `ra`.
    Ra,
    /// Signed imm[5] (12) and imm[4:0] (6:2).
    CImm6,
    /// Unsigned shamt[5] (12) and shamt[4:0] (6:2).
    CShamt,
    /// Nonzero `c.lui` immediate, 17:12 of the value.
    CLui,
    /// Nonzero `c.addi16sp` immediate in multiples of 16.
    CSp16,
    /// Nonzero `c.addi4spn` immediate in multiples of 4.
    CSpn,
    /// `[rs1' + uimm]` of a word access.
    CMemW,
    /// `[rs1' + uimm]` of a doubleword access.
    CMemD,
    /// `[sp + uimm]` of a word load.
    CLwsp,
    /// `[sp + uimm]` of a doubleword load.
    CLdsp,
    /// `[sp + uimm]` of a word store.
    CSwsp,
    /// `[sp + uimm]` of a doubleword store.
    CSdsp,
    /// `c.j` offset.
    CPcJ,
    /// `c.beqz`/`c.bnez` offset.
    CPcB,
}

/// Encoding bits an operand type occupies.
const fn field(ty: RvTy) -> u32 {
    match ty {
        RvTy::None | RvTy::Sp | RvTy::Ra => 0,
        RvTy::Rd | RvTy::Fd => 0x0000_0f80,
        RvTy::Rs1 | RvTy::Fs1 | RvTy::Uimm5 | RvTy::MemAmo => 0x000f_8000,
        RvTy::Rs2 | RvTy::Fs2 | RvTy::Shamt5 => 0x01f0_0000,
        RvTy::Fs3 => 0xf800_0000,
        RvTy::ImmI | RvTy::Csr => 0xfff0_0000,
        RvTy::ImmU | RvTy::PcJ => 0xffff_f000,
        RvTy::Shamt6 => 0x03f0_0000,
        RvTy::PcB => 0xfe00_0f80,
        RvTy::Rm => 0x0000_7000,
        RvTy::Pred => 0x0f00_0000,
        RvTy::Succ => 0x00f0_0000,
        RvTy::AqRl => 0x0600_0000,
        RvTy::MemI => 0xffff_8000,
        RvTy::MemS => 0xfe0f_8f80,
        RvTy::CRd | RvTy::CRdNz | RvTy::CFd => 0x0f80,
        RvTy::CRs2 | RvTy::CFs2 => 0x007c,
        RvTy::CRdP | RvTy::CRs2P | RvTy::CFdP | RvTy::CFs2P => 0x001c,
        RvTy::CRs1P => 0x0380,
        RvTy::CImm6 | RvTy::CShamt | RvTy::CLui | RvTy::CSp16 | RvTy::CLwsp | RvTy::CLdsp => 0x107c,
        RvTy::CSpn | RvTy::CMemW | RvTy::CMemD => 0x1fe0,
        RvTy::CSwsp | RvTy::CSdsp => 0x1f80,
        RvTy::CPcJ => 0x1ffc,
        RvTy::CPcB => 0x1c7c,
    }
}

impl Layout for RvLayout {
    type Ext = RvExt;
    type Ty = RvTy;

    const NONE: RvTy = RvTy::None;
    const MAX_HOPS: usize = 3;
    const NAME: &'static str = "riscv";

    fn roots() -> &'static [(RvExt, u16)] {
        &[(RvExt::Top, 0), (RvExt::CQuad, 0)]
    }

    fn table(kind: RvExt, set: u16) -> Option<&'static [Entry<Self>]> {
        let set = set as usize;
        let one = |t: &'static [Entry<Self>]| (set == 0).then_some(t);
        match kind {
            RvExt::Top => one(&RV_TOP),
            RvExt::Funct3 => RV_FUNCT3.get(set).map(|t| &t[..]),
            RvExt::Funct3Funct7 => RV_OP.get(set).map(|t| &t[..]),
            RvExt::Funct7Rv => RV_FUNCT7_RV.get(set).map(|t| &t[..]),
            RvExt::Funct6 => RV_FUNCT6.get(set).map(|t| &t[..]),
            RvExt::Funct5 => RV_AMO.get(set).map(|t| &t[..]),
            RvExt::Imm12 => one(&RV_SYSTEM),
            RvExt::Funct7 => one(&RV_FP),
            RvExt::Fmt => RV_FMA.get(set).map(|t| &t[..]),
            RvExt::Rs2 => RV_FCVT.get(set).map(|t| &t[..]),
            RvExt::CQuad => one(&RVC_QUAD),
            RvExt::CFunct3 => RVC_FUNCT3.get(set).map(|t| &t[..]),
            RvExt::CZero => one(&RVC_ZERO),
            RvExt::CSpRd => one(&RVC_SP_RD),
            RvExt::CFunct2 => one(&RVC_FUNCT2),
            RvExt::CArith => one(&RVC_ARITH),
            RvExt::CBit12 => one(&RVC_BIT12),
        }
    }

    fn width(kind: RvExt) -> usize {
        match kind {
            RvExt::Funct6 | RvExt::Imm12 | RvExt::Fmt | RvExt::CZero | RvExt::CSpRd => 2,
            RvExt::Funct7Rv | RvExt::CQuad => 3,
            RvExt::Rs2 | RvExt::CFunct2 => 4,
            RvExt::CBit12 => 5,
            RvExt::Funct3 | RvExt::CFunct3 | RvExt::CArith => 8,
            RvExt::Funct3Funct7 => 24,
            RvExt::Top | RvExt::Funct5 => 32,
            RvExt::Funct7 => 128,
        }
    }

    fn extra(_index: u16) -> Option<&'static OpInfo<Self>> {
        None
    }
}

// ── Entry builders ───────────────────────────────────────────────────────

type RvEntry = Entry<RvLayout>;
type RvInfo = OpInfo<RvLayout>;
type S = Slot<RvTy>;

const fn s(ty: RvTy, size: OpSize) -> S {
    Slot { ty, size }
}

const fn r(ty: RvTy) -> S {
    s(ty, OpSize::None)
}

const NO: S = r(RvTy::None);
const B: OpSize = OpSize::B1;
const H: OpSize = OpSize::B2;
const W: OpSize = OpSize::B4;
const D: OpSize = OpSize::B8;

const fn info(op: RvOp, bits: u32, dst: [S; 2], src: [S; 3], flags: Flags) -> RvInfo {
    let fields = field(dst[0].ty) | field(dst[1].ty) | field(src[0].ty) | field(src[1].ty) | field(src[2].ty);
    let mask = if flags.contains(Flags::COMPRESSED) {
        !fields & 0xffff
    } else {
        !fields
    };
    OpInfo {
        opcode: Opcode::Rv(op),
        bits,
        mask,
        name: op.name(),
        dst,
        src,
        flags,
        eflags: Eflags::NONE,
        next: Link::End,
    }
}

const fn op(op: RvOp, bits: u32, dst: [S; 2], src: [S; 3]) -> RvEntry {
    Entry::Op(info(op, bits, dst, src, Flags::NONE))
}

/// Compressed entry.
const fn c(op: RvOp, bits: u32, dst: [S; 2], src: [S; 3]) -> RvEntry {
    Entry::Op(info(op, bits, dst, src, Flags::COMPRESSED))
}

const fn i_bits(major: u32, funct3: u32) -> u32 {
    (funct3 << 12) | major
}

const fn r_bits(major: u32, funct3: u32, funct7: u32) -> u32 {
    (funct7 << 25) | (funct3 << 12) | major
}

const LOAD: u32 = 0x03;
const LOAD_FP: u32 = 0x07;
const MISC_MEM: u32 = 0x0f;
const OP_IMM: u32 = 0x13;
const OP_IMM_32: u32 = 0x1b;
const STORE: u32 = 0x23;
const STORE_FP: u32 = 0x27;
const AMO: u32 = 0x2f;
const OP: u32 = 0x33;
const OP_32: u32 = 0x3b;
const OP_FP: u32 = 0x53;
const BRANCH: u32 = 0x63;
const SYSTEM: u32 = 0x73;

const fn load(o: RvOp, funct3: u32, size: OpSize) -> RvEntry {
    op(o, i_bits(LOAD, funct3), [r(RvTy::Rd), NO], [s(RvTy::MemI, size), NO, NO])
}

const fn store(o: RvOp, funct3: u32, size: OpSize) -> RvEntry {
    op(o, i_bits(STORE, funct3), [s(RvTy::MemS, size), NO], [r(RvTy::Rs2), NO, NO])
}

const fn imm_alu(o: RvOp, major: u32, funct3: u32) -> RvEntry {
    op(o, i_bits(major, funct3), [r(RvTy::Rd), NO], [r(RvTy::Rs1), s(RvTy::ImmI, OpSize::Bits(12)), NO])
}

const fn shift_imm(o: RvOp, bits: u32, amount: RvTy) -> RvEntry {
    op(o, bits, [r(RvTy::Rd), NO], [r(RvTy::Rs1), r(amount), NO])
}

const fn reg_alu(o: RvOp, major: u32, funct3: u32, funct7: u32) -> RvEntry {
    op(o, r_bits(major, funct3, funct7), [r(RvTy::Rd), NO], [r(RvTy::Rs1), r(RvTy::Rs2), NO])
}

const fn branch(o: RvOp, funct3: u32) -> RvEntry {
    op(o, i_bits(BRANCH, funct3), [NO, NO], [r(RvTy::Rs1), r(RvTy::Rs2), r(RvTy::PcB)])
}

const fn csr(o: RvOp, funct3: u32, source: RvTy) -> RvEntry {
    op(o, i_bits(SYSTEM, funct3), [r(RvTy::Rd), NO], [s(RvTy::Csr, OpSize::Bits(12)), r(source), NO])
}

/// Read-modify-write atomic: `rd <- [rs1]; [rs1] <- [rs1] op rs2`.
const fn amo(o: RvOp, funct5: u32, funct3: u32, size: OpSize) -> RvEntry {
    let mem = s(RvTy::MemAmo, size);
    op(o, r_bits(AMO, funct3, funct5 << 2), [r(RvTy::Rd), mem], [mem, r(RvTy::Rs2), r(RvTy::AqRl)])
}

const fn amo_set(funct3: u32) -> [RvEntry; 32] {
    let d = funct3 == 3;
    let size = if d { D } else { W };
    let mem = s(RvTy::MemAmo, size);
    let mut t = [Entry::Invalid; 32];
    t[0x00] = amo(if d { RvOp::AmoaddD } else { RvOp::AmoaddW }, 0x00, funct3, size);
    t[0x01] = amo(if d { RvOp::AmoswapD } else { RvOp::AmoswapW }, 0x01, funct3, size);
    t[0x02] = op(
        if d { RvOp::LrD } else { RvOp::LrW },
        r_bits(AMO, funct3, 0x02 << 2),
        [r(RvTy::Rd), NO],
        [mem, r(RvTy::AqRl), NO],
    );
    t[0x03] = op(
        if d { RvOp::ScD } else { RvOp::ScW },
        r_bits(AMO, funct3, 0x03 << 2),
        [r(RvTy::Rd), mem],
        [r(RvTy::Rs2), r(RvTy::AqRl), NO],
    );
    t[0x04] = amo(if d { RvOp::AmoxorD } else { RvOp::AmoxorW }, 0x04, funct3, size);
    t[0x08] = amo(if d { RvOp::AmoorD } else { RvOp::AmoorW }, 0x08, funct3, size);
    t[0x0c] = amo(if d { RvOp::AmoandD } else { RvOp::AmoandW }, 0x0c, funct3, size);
    t[0x10] = amo(if d { RvOp::AmominD } else { RvOp::AmominW }, 0x10, funct3, size);
    t[0x14] = amo(if d { RvOp::AmomaxD } else { RvOp::AmomaxW }, 0x14, funct3, size);
    t[0x18] = amo(if d { RvOp::AmominuD } else { RvOp::AmominuW }, 0x18, funct3, size);
    t[0x1c] = amo(if d { RvOp::AmomaxuD } else { RvOp::AmomaxuW }, 0x1c, funct3, size);
    t
}

/// `fd <- fs1 op fs2` under a rounding mode.
const fn fp_arith(o: RvOp, funct7: u32) -> RvEntry {
    op(o, r_bits(OP_FP, 0, funct7), [r(RvTy::Fd), NO], [r(RvTy::Fs1), r(RvTy::Fs2), r(RvTy::Rm)])
}

/// Single-source FP op under a rounding mode; `rs2` is an opcode field.
const fn fp_unary(o: RvOp, funct7: u32, rs2: u32, dst: RvTy, src: RvTy) -> RvEntry {
    op(o, r_bits(OP_FP, 0, funct7) | (rs2 << 20), [r(dst), NO], [r(src), r(RvTy::Rm), NO])
}

/// FP op without a rounding mode; funct3 is an opcode field.
const fn fp_fixed(o: RvOp, funct3: u32, funct7: u32, dst: RvTy, srcs: [S; 3]) -> RvEntry {
    op(o, r_bits(OP_FP, funct3, funct7), [r(dst), NO], srcs)
}

const fn fma(o: RvOp, major: u32, fmt: u32) -> RvEntry {
    Entry::Op(info(
        o,
        (fmt << 25) | major,
        [r(RvTy::Fd), r(RvTy::Rm)],
        [r(RvTy::Fs1), r(RvTy::Fs2), r(RvTy::Fs3)],
        Flags::SRC4,
    ))
}

// ── 32-bit tables ────────────────────────────────────────────────────────

const F3_LOAD: u16 = 0;
const F3_LOAD_FP: u16 = 1;
const F3_MISC_MEM: u16 = 2;
const F3_OP_IMM: u16 = 3;
const F3_OP_IMM_32: u16 = 4;
const F3_STORE: u16 = 5;
const F3_STORE_FP: u16 = 6;
const F3_AMO: u16 = 7;
const F3_BRANCH: u16 = 8;
const F3_SYSTEM: u16 = 9;
const F3_JALR: u16 = 10;
const F3_FSGNJ_S: u16 = 11;
const F3_FSGNJ_D: u16 = 12;
const F3_FMINMAX_S: u16 = 13;
const F3_FMINMAX_D: u16 = 14;
const F3_FCMP_S: u16 = 15;
const F3_FCMP_D: u16 = 16;
const F3_FMV_X_S: u16 = 17;
const F3_FMV_X_D: u16 = 18;
const F3_FMV_F_S: u16 = 19;
const F3_FMV_F_D: u16 = 20;

static RV_TOP: [RvEntry; 32] = span_table!(32;
    0 => Entry::Ext(RvExt::Funct3, F3_LOAD),
    1 => Entry::Ext(RvExt::Funct3, F3_LOAD_FP),
    3 => Entry::Ext(RvExt::Funct3, F3_MISC_MEM),
    4 => Entry::Ext(RvExt::Funct3, F3_OP_IMM),
    5 => op(RvOp::Auipc, 0x17, [r(RvTy::Rd), NO], [s(RvTy::ImmU, W), NO, NO]),
    6 => Entry::Ext(RvExt::Funct3, F3_OP_IMM_32),
    8 => Entry::Ext(RvExt::Funct3, F3_STORE),
    9 => Entry::Ext(RvExt::Funct3, F3_STORE_FP),
    11 => Entry::Ext(RvExt::Funct3, F3_AMO),
    12 => Entry::Ext(RvExt::Funct3Funct7, 0),
    13 => op(RvOp::Lui, 0x37, [r(RvTy::Rd), NO], [s(RvTy::ImmU, W), NO, NO]),
    14 => Entry::Ext(RvExt::Funct3Funct7, 1),
    16 => Entry::Ext(RvExt::Fmt, 0),
    17 => Entry::Ext(RvExt::Fmt, 1),
    18 => Entry::Ext(RvExt::Fmt, 2),
    19 => Entry::Ext(RvExt::Fmt, 3),
    20 => Entry::Ext(RvExt::Funct7, 0),
    24 => Entry::Ext(RvExt::Funct3, F3_BRANCH),
    25 => Entry::Ext(RvExt::Funct3, F3_JALR),
    27 => op(RvOp::Jal, 0x6f, [r(RvTy::Rd), NO], [r(RvTy::PcJ), NO, NO]),
    28 => Entry::Ext(RvExt::Funct3, F3_SYSTEM),
);

static RV_FUNCT3: [[RvEntry; 8]; 21] = [
    span_table!(8;
        0 => load(RvOp::Lb, 0, B),
        1 => load(RvOp::Lh, 1, H),
        2 => load(RvOp::Lw, 2, W),
        3 => load(RvOp::Ld, 3, D),
        4 => load(RvOp::Lbu, 4, B),
        5 => load(RvOp::Lhu, 5, H),
        6 => load(RvOp::Lwu, 6, W),
    ),
    span_table!(8;
        2 => op(RvOp::Flw, i_bits(LOAD_FP, 2), [r(RvTy::Fd), NO], [s(RvTy::MemI, W), NO, NO]),
        3 => op(RvOp::Fld, i_bits(LOAD_FP, 3), [r(RvTy::Fd), NO], [s(RvTy::MemI, D), NO, NO]),
    ),
    span_table!(8;
        0 => op(RvOp::Fence, MISC_MEM, [NO, NO], [s(RvTy::Pred, OpSize::Bits(4)), s(RvTy::Succ, OpSize::Bits(4)), NO]),
        1 => op(RvOp::FenceI, i_bits(MISC_MEM, 1), [NO, NO], [NO, NO, NO]),
    ),
    span_table!(8;
        0 => imm_alu(RvOp::Addi, OP_IMM, 0),
        1 => Entry::Ext(RvExt::Funct6, 0),
        2 => imm_alu(RvOp::Slti, OP_IMM, 2),
        3 => imm_alu(RvOp::Sltiu, OP_IMM, 3),
        4 => imm_alu(RvOp::Xori, OP_IMM, 4),
        5 => Entry::Ext(RvExt::Funct6, 1),
        6 => imm_alu(RvOp::Ori, OP_IMM, 6),
        7 => imm_alu(RvOp::Andi, OP_IMM, 7),
    ),
    span_table!(8;
        0 => imm_alu(RvOp::Addiw, OP_IMM_32, 0),
        1 => Entry::Ext(RvExt::Funct7Rv, 0),
        5 => Entry::Ext(RvExt::Funct7Rv, 1),
    ),
    span_table!(8;
        0 => store(RvOp::Sb, 0, B),
        1 => store(RvOp::Sh, 1, H),
        2 => store(RvOp::Sw, 2, W),
        3 => store(RvOp::Sd, 3, D),
    ),
    span_table!(8;
        2 => op(RvOp::Fsw, i_bits(STORE_FP, 2), [s(RvTy::MemS, W), NO], [r(RvTy::Fs2), NO, NO]),
        3 => op(RvOp::Fsd, i_bits(STORE_FP, 3), [s(RvTy::MemS, D), NO], [r(RvTy::Fs2), NO, NO]),
    ),
    span_table!(8;
        2 => Entry::Ext(RvExt::Funct5, 0),
        3 => Entry::Ext(RvExt::Funct5, 1),
    ),
    span_table!(8;
        0 => branch(RvOp::Beq, 0),
        1 => branch(RvOp::Bne, 1),
        4 => branch(RvOp::Blt, 4),
        5 => branch(RvOp::Bge, 5),
        6 => branch(RvOp::Bltu, 6),
        7 => branch(RvOp::Bgeu, 7),
    ),
    span_table!(8;
        0 => Entry::Ext(RvExt::Imm12, 0),
        1 => csr(RvOp::Csrrw, 1, RvTy::Rs1),
        2 => csr(RvOp::Csrrs, 2, RvTy::Rs1),
        3 => csr(RvOp::Csrrc, 3, RvTy::Rs1),
        5 => csr(RvOp::Csrrwi, 5, RvTy::Uimm5),
        6 => csr(RvOp::Csrrsi, 6, RvTy::Uimm5),
        7 => csr(RvOp::Csrrci, 7, RvTy::Uimm5),
    ),
    span_table!(8;
        0 => op(RvOp::Jalr, 0x67, [r(RvTy::Rd), NO], [r(RvTy::Rs1), s(RvTy::ImmI, OpSize::Bits(12)), NO]),
    ),
    fp_sign_inject(RvOp::FsgnjS, RvOp::FsgnjnS, RvOp::FsgnjxS, 0x10),
    fp_sign_inject(RvOp::FsgnjD, RvOp::FsgnjnD, RvOp::FsgnjxD, 0x11),
    span_table!(8;
        0 => fp_fixed(RvOp::FminS, 0, 0x14, RvTy::Fd, [r(RvTy::Fs1), r(RvTy::Fs2), NO]),
        1 => fp_fixed(RvOp::FmaxS, 1, 0x14, RvTy::Fd, [r(RvTy::Fs1), r(RvTy::Fs2), NO]),
    ),
    span_table!(8;
        0 => fp_fixed(RvOp::FminD, 0, 0x15, RvTy::Fd, [r(RvTy::Fs1), r(RvTy::Fs2), NO]),
        1 => fp_fixed(RvOp::FmaxD, 1, 0x15, RvTy::Fd, [r(RvTy::Fs1), r(RvTy::Fs2), NO]),
    ),
    fp_compare(RvOp::FleS, RvOp::FltS, RvOp::FeqS, 0x50),
    fp_compare(RvOp::FleD, RvOp::FltD, RvOp::FeqD, 0x51),
    span_table!(8;
        0 => fp_fixed(RvOp::FmvXW, 0, 0x70, RvTy::Rd, [r(RvTy::Fs1), NO, NO]),
        1 => fp_fixed(RvOp::FclassS, 1, 0x70, RvTy::Rd, [r(RvTy::Fs1), NO, NO]),
    ),
    span_table!(8;
        0 => fp_fixed(RvOp::FmvXD, 0, 0x71, RvTy::Rd, [r(RvTy::Fs1), NO, NO]),
        1 => fp_fixed(RvOp::FclassD, 1, 0x71, RvTy::Rd, [r(RvTy::Fs1), NO, NO]),
    ),
    span_table!(8;
        0 => fp_fixed(RvOp::FmvWX, 0, 0x78, RvTy::Fd, [r(RvTy::Rs1), NO, NO]),
    ),
    span_table!(8;
        0 => fp_fixed(RvOp::FmvDX, 0, 0x79, RvTy::Fd, [r(RvTy::Rs1), NO, NO]),
    ),
];

const fn fp_sign_inject(j: RvOp, jn: RvOp, jx: RvOp, funct7: u32) -> [RvEntry; 8] {
    let srcs = [r(RvTy::Fs1), r(RvTy::Fs2), NO];
    span_table!(8;
        0 => fp_fixed(j, 0, funct7, RvTy::Fd, srcs),
        1 => fp_fixed(jn, 1, funct7, RvTy::Fd, srcs),
        2 => fp_fixed(jx, 2, funct7, RvTy::Fd, srcs),
    )
}

const fn fp_compare(le: RvOp, lt: RvOp, eq: RvOp, funct7: u32) -> [RvEntry; 8] {
    let srcs = [r(RvTy::Fs1), r(RvTy::Fs2), NO];
    span_table!(8;
        0 => fp_fixed(le, 0, funct7, RvTy::Rd, srcs),
        1 => fp_fixed(lt, 1, funct7, RvTy::Rd, srcs),
        2 => fp_fixed(eq, 2, funct7, RvTy::Rd, srcs),
    )
}

/// funct7 class (0x00, 0x01, 0x20) times 8 plus funct3.
static RV_OP: [[RvEntry; 24]; 2] = [
    concat_groups(
        span_table!(8;
            0 => reg_alu(RvOp::Add, OP, 0, 0x00),
            1 => reg_alu(RvOp::Sll, OP, 1, 0x00),
            2 => reg_alu(RvOp::Slt, OP, 2, 0x00),
            3 => reg_alu(RvOp::Sltu, OP, 3, 0x00),
            4 => reg_alu(RvOp::Xor, OP, 4, 0x00),
            5 => reg_alu(RvOp::Srl, OP, 5, 0x00),
            6 => reg_alu(RvOp::Or, OP, 6, 0x00),
            7 => reg_alu(RvOp::And, OP, 7, 0x00),
        ),
        span_table!(8;
            0 => reg_alu(RvOp::Mul, OP, 0, 0x01),
            1 => reg_alu(RvOp::Mulh, OP, 1, 0x01),
            2 => reg_alu(RvOp::Mulhsu, OP, 2, 0x01),
            3 => reg_alu(RvOp::Mulhu, OP, 3, 0x01),
            4 => reg_alu(RvOp::Div, OP, 4, 0x01),
            5 => reg_alu(RvOp::Divu, OP, 5, 0x01),
            6 => reg_alu(RvOp::Rem, OP, 6, 0x01),
            7 => reg_alu(RvOp::Remu, OP, 7, 0x01),
        ),
        span_table!(8;
            0 => reg_alu(RvOp::Sub, OP, 0, 0x20),
            5 => reg_alu(RvOp::Sra, OP, 5, 0x20),
        ),
    ),
    concat_groups(
        span_table!(8;
            0 => reg_alu(RvOp::Addw, OP_32, 0, 0x00),
            1 => reg_alu(RvOp::Sllw, OP_32, 1, 0x00),
            5 => reg_alu(RvOp::Srlw, OP_32, 5, 0x00),
        ),
        span_table!(8;
            0 => reg_alu(RvOp::Mulw, OP_32, 0, 0x01),
            4 => reg_alu(RvOp::Divw, OP_32, 4, 0x01),
            5 => reg_alu(RvOp::Divuw, OP_32, 5, 0x01),
            6 => reg_alu(RvOp::Remw, OP_32, 6, 0x01),
            7 => reg_alu(RvOp::Remuw, OP_32, 7, 0x01),
        ),
        span_table!(8;
            0 => reg_alu(RvOp::Subw, OP_32, 0, 0x20),
            5 => reg_alu(RvOp::Sraw, OP_32, 5, 0x20),
        ),
    ),
];

const fn concat_groups(base: [RvEntry; 8], muldiv: [RvEntry; 8], alt: [RvEntry; 8]) -> [RvEntry; 24] {
    let mut t = [Entry::Invalid; 24];
    let mut i = 0;
    while i < 8 {
        t[i] = base[i];
        t[8 + i] = muldiv[i];
        t[16 + i] = alt[i];
        i += 1;
    }
    t
}

static RV_FUNCT7_RV: [[RvEntry; 3]; 2] = [
    [
        shift_imm(RvOp::Slliw, i_bits(OP_IMM_32, 1), RvTy::Shamt5),
        Entry::Invalid,
        Entry::Invalid,
    ],
    [
        shift_imm(RvOp::Srliw, i_bits(OP_IMM_32, 5), RvTy::Shamt5),
        Entry::Invalid,
        shift_imm(RvOp::Sraiw, r_bits(OP_IMM_32, 5, 0x20), RvTy::Shamt5),
    ],
];

static RV_FUNCT6: [[RvEntry; 2]; 2] = [
    [shift_imm(RvOp::Slli, i_bits(OP_IMM, 1), RvTy::Shamt6), Entry::Invalid],
    [
        shift_imm(RvOp::Srli, i_bits(OP_IMM, 5), RvTy::Shamt6),
        shift_imm(RvOp::Srai, r_bits(OP_IMM, 5, 0x20), RvTy::Shamt6),
    ],
];

static RV_AMO: [[RvEntry; 32]; 2] = [amo_set(2), amo_set(3)];

static RV_SYSTEM: [RvEntry; 2] = [
    op(RvOp::Ecall, SYSTEM, [NO, NO], [NO, NO, NO]),
    op(RvOp::Ebreak, 0x0010_0000 | SYSTEM, [NO, NO], [NO, NO, NO]),
];

static RV_FP: [RvEntry; 128] = span_table!(128;
    0x00 => fp_arith(RvOp::FaddS, 0x00),
    0x01 => fp_arith(RvOp::FaddD, 0x01),
    0x04 => fp_arith(RvOp::FsubS, 0x04),
    0x05 => fp_arith(RvOp::FsubD, 0x05),
    0x08 => fp_arith(RvOp::FmulS, 0x08),
    0x09 => fp_arith(RvOp::FmulD, 0x09),
    0x0c => fp_arith(RvOp::FdivS, 0x0c),
    0x0d => fp_arith(RvOp::FdivD, 0x0d),
    0x10 => Entry::Ext(RvExt::Funct3, F3_FSGNJ_S),
    0x11 => Entry::Ext(RvExt::Funct3, F3_FSGNJ_D),
    0x14 => Entry::Ext(RvExt::Funct3, F3_FMINMAX_S),
    0x15 => Entry::Ext(RvExt::Funct3, F3_FMINMAX_D),
    0x20 => Entry::Ext(RvExt::Rs2, 4),
    0x21 => Entry::Ext(RvExt::Rs2, 5),
    0x2c => fp_unary(RvOp::FsqrtS, 0x2c, 0, RvTy::Fd, RvTy::Fs1),
    0x2d => fp_unary(RvOp::FsqrtD, 0x2d, 0, RvTy::Fd, RvTy::Fs1),
    0x50 => Entry::Ext(RvExt::Funct3, F3_FCMP_S),
    0x51 => Entry::Ext(RvExt::Funct3, F3_FCMP_D),
    0x60 => Entry::Ext(RvExt::Rs2, 0),
    0x61 => Entry::Ext(RvExt::Rs2, 1),
    0x68 => Entry::Ext(RvExt::Rs2, 2),
    0x69 => Entry::Ext(RvExt::Rs2, 3),
    0x70 => Entry::Ext(RvExt::Funct3, F3_FMV_X_S),
    0x71 => Entry::Ext(RvExt::Funct3, F3_FMV_X_D),
    0x78 => Entry::Ext(RvExt::Funct3, F3_FMV_F_S),
    0x79 => Entry::Ext(RvExt::Funct3, F3_FMV_F_D),
);

static RV_FMA: [[RvEntry; 2]; 4] = [
    [fma(RvOp::FmaddS, 0x43, 0), fma(RvOp::FmaddD, 0x43, 1)],
    [fma(RvOp::FmsubS, 0x47, 0), fma(RvOp::FmsubD, 0x47, 1)],
    [fma(RvOp::FnmsubS, 0x4b, 0), fma(RvOp::FnmsubD, 0x4b, 1)],
    [fma(RvOp::FnmaddS, 0x4f, 0), fma(RvOp::FnmaddD, 0x4f, 1)],
];

/// Conversions indexed by rs2: to integer, from integer, between precisions.
static RV_FCVT: [[RvEntry; 4]; 6] = [
    to_int([RvOp::FcvtWS, RvOp::FcvtWuS, RvOp::FcvtLS, RvOp::FcvtLuS], 0x60),
    to_int([RvOp::FcvtWD, RvOp::FcvtWuD, RvOp::FcvtLD, RvOp::FcvtLuD], 0x61),
    from_int([RvOp::FcvtSW, RvOp::FcvtSWu, RvOp::FcvtSL, RvOp::FcvtSLu], 0x68),
    from_int([RvOp::FcvtDW, RvOp::FcvtDWu, RvOp::FcvtDL, RvOp::FcvtDLu], 0x69),
    [
        Entry::Invalid,
        fp_unary(RvOp::FcvtSD, 0x20, 1, RvTy::Fd, RvTy::Fs1),
        Entry::Invalid,
        Entry::Invalid,
    ],
    [
        fp_unary(RvOp::FcvtDS, 0x21, 0, RvTy::Fd, RvTy::Fs1),
        Entry::Invalid,
        Entry::Invalid,
        Entry::Invalid,
    ],
];

const fn to_int(ops: [RvOp; 4], funct7: u32) -> [RvEntry; 4] {
    [
        fp_unary(ops[0], funct7, 0, RvTy::Rd, RvTy::Fs1),
        fp_unary(ops[1], funct7, 1, RvTy::Rd, RvTy::Fs1),
        fp_unary(ops[2], funct7, 2, RvTy::Rd, RvTy::Fs1),
        fp_unary(ops[3], funct7, 3, RvTy::Rd, RvTy::Fs1),
    ]
}

const fn from_int(ops: [RvOp; 4], funct7: u32) -> [RvEntry; 4] {
    [
        fp_unary(ops[0], funct7, 0, RvTy::Fd, RvTy::Rs1),
        fp_unary(ops[1], funct7, 1, RvTy::Fd, RvTy::Rs1),
        fp_unary(ops[2], funct7, 2, RvTy::Fd, RvTy::Rs1),
        fp_unary(ops[3], funct7, 3, RvTy::Fd, RvTy::Rs1),
    ]
}

// ── Compressed tables ────────────────────────────────────────────────────

static RVC_QUAD: [RvEntry; 3] = [
    Entry::Ext(RvExt::CFunct3, 0),
    Entry::Ext(RvExt::CFunct3, 1),
    Entry::Ext(RvExt::CFunct3, 2),
];

static RVC_FUNCT3: [[RvEntry; 8]; 3] = [
    [
        Entry::Ext(RvExt::CZero, 0),
        c(RvOp::CFld, 0x2000, [r(RvTy::CFdP), NO], [s(RvTy::CMemD, D), NO, NO]),
        c(RvOp::CLw, 0x4000, [r(RvTy::CRdP), NO], [s(RvTy::CMemW, W), NO, NO]),
        c(RvOp::CLd, 0x6000, [r(RvTy::CRdP), NO], [s(RvTy::CMemD, D), NO, NO]),
        Entry::Invalid,
        c(RvOp::CFsd, 0xa000, [s(RvTy::CMemD, D), NO], [r(RvTy::CFs2P), NO, NO]),
        c(RvOp::CSw, 0xc000, [s(RvTy::CMemW, W), NO], [r(RvTy::CRs2P), NO, NO]),
        c(RvOp::CSd, 0xe000, [s(RvTy::CMemD, D), NO], [r(RvTy::CRs2P), NO, NO]),
    ],
    [
        c(RvOp::CAddi, 0x0001, [r(RvTy::CRd), NO], [r(RvTy::CRd), s(RvTy::CImm6, OpSize::Bits(6)), NO]),
        c(RvOp::CAddiw, 0x2001, [r(RvTy::CRdNz), NO], [r(RvTy::CRdNz), s(RvTy::CImm6, OpSize::Bits(6)), NO]),
        c(RvOp::CLi, 0x4001, [r(RvTy::CRd), NO], [s(RvTy::CImm6, OpSize::Bits(6)), NO, NO]),
        Entry::Ext(RvExt::CSpRd, 0),
        Entry::Ext(RvExt::CFunct2, 0),
        c(RvOp::CJ, 0xa001, [NO, NO], [r(RvTy::CPcJ), NO, NO]),
        c(RvOp::CBeqz, 0xc001, [NO, NO], [r(RvTy::CRs1P), r(RvTy::CPcB), NO]),
        c(RvOp::CBnez, 0xe001, [NO, NO], [r(RvTy::CRs1P), r(RvTy::CPcB), NO]),
    ],
    [
        c(RvOp::CSlli, 0x0002, [r(RvTy::CRd), NO], [r(RvTy::CRd), s(RvTy::CShamt, OpSize::Bits(6)), NO]),
        c(RvOp::CFldsp, 0x2002, [r(RvTy::CFd), NO], [s(RvTy::CLdsp, D), NO, NO]),
        c(RvOp::CLwsp, 0x4002, [r(RvTy::CRdNz), NO], [s(RvTy::CLwsp, W), NO, NO]),
        c(RvOp::CLdsp, 0x6002, [r(RvTy::CRdNz), NO], [s(RvTy::CLdsp, D), NO, NO]),
        Entry::Ext(RvExt::CBit12, 0),
        c(RvOp::CFsdsp, 0xa002, [s(RvTy::CSdsp, D), NO], [r(RvTy::CFs2), NO, NO]),
        c(RvOp::CSwsp, 0xc002, [s(RvTy::CSwsp, W), NO], [r(RvTy::CRs2), NO, NO]),
        c(RvOp::CSdsp, 0xe002, [s(RvTy::CSdsp, D), NO], [r(RvTy::CRs2), NO, NO]),
    ],
];

static RVC_ZERO: [RvEntry; 2] = [
    c(RvOp::Unimp, 0x0000, [NO, NO], [NO, NO, NO]),
    c(RvOp::CAddi4spn, 0x0000, [r(RvTy::CRdP), NO], [r(RvTy::Sp), s(RvTy::CSpn, OpSize::Bits(10)), NO]),
];

static RVC_SP_RD: [RvEntry; 2] = [
    c(RvOp::CLui, 0x6001, [r(RvTy::CRdNz), NO], [s(RvTy::CLui, W), NO, NO]),
    c(RvOp::CAddi16sp, 0x6101, [r(RvTy::Sp), NO], [r(RvTy::Sp), s(RvTy::CSp16, OpSize::Bits(10)), NO]),
];

static RVC_FUNCT2: [RvEntry; 4] = [
    c(RvOp::CSrli, 0x8001, [r(RvTy::CRs1P), NO], [r(RvTy::CRs1P), s(RvTy::CShamt, OpSize::Bits(6)), NO]),
    c(RvOp::CSrai, 0x8401, [r(RvTy::CRs1P), NO], [r(RvTy::CRs1P), s(RvTy::CShamt, OpSize::Bits(6)), NO]),
    c(RvOp::CAndi, 0x8801, [r(RvTy::CRs1P), NO], [r(RvTy::CRs1P), s(RvTy::CImm6, OpSize::Bits(6)), NO]),
    Entry::Ext(RvExt::CArith, 0),
];

const fn c_arith(o: RvOp, bits: u32) -> RvEntry {
    c(o, bits, [r(RvTy::CRs1P), NO], [r(RvTy::CRs1P), r(RvTy::CRs2P), NO])
}

static RVC_ARITH: [RvEntry; 8] = span_table!(8;
    0 => c_arith(RvOp::CSub, 0x8c01),
    1 => c_arith(RvOp::CXor, 0x8c21),
    2 => c_arith(RvOp::COr, 0x8c41),
    3 => c_arith(RvOp::CAnd, 0x8c61),
    4 => c_arith(RvOp::CSubw, 0x9c01),
    5 => c_arith(RvOp::CAddw, 0x9c21),
);

/// Rows: `c.jr`, `c.mv`, `c.ebreak`, `c.jalr`, `c.add`.
static RVC_BIT12: [RvEntry; 5] = [
    c(RvOp::CJr, 0x8002, [NO, NO], [r(RvTy::CRdNz), NO, NO]),
    c(RvOp::CMv, 0x8002, [r(RvTy::CRd), NO], [r(RvTy::CRs2), NO, NO]),
    c(RvOp::CEbreak, 0x9002, [NO, NO], [NO, NO, NO]),
    c(RvOp::CJalr, 0x9002, [r(RvTy::Ra), NO], [r(RvTy::CRdNz), NO, NO]),
    c(RvOp::CAdd, 0x9002, [r(RvTy::CRd), NO], [r(RvTy::CRd), r(RvTy::CRs2), NO]),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{find_head, validate, walk};

    fn head(op: RvOp) -> &'static RvInfo {
        find_head::<RvLayout>(Opcode::Rv(op))
            .unwrap_or_else(|| panic!("no entry for {}", op.name()))
            .1
    }

    #[test]
    fn forest_is_well_formed() {
        let terminals = validate::<RvLayout>().unwrap();
        assert!(terminals > 150, "only {} terminals", terminals);
    }

    #[test]
    fn every_opcode_has_an_encoding() {
        for &op in RvOp::ALL {
            head(op);
        }
    }

    #[test]
    fn canonical_words() {
        assert_eq!(head(RvOp::Add).bits, 0x0000_0033);
        assert_eq!(head(RvOp::Sub).bits, 0x4000_0033);
        assert_eq!(head(RvOp::Srai).bits, 0x4000_5013);
        assert_eq!(head(RvOp::Ebreak).bits, 0x0010_0073);
        assert_eq!(head(RvOp::FcvtSD).bits, 0x4010_0053);
        assert_eq!(head(RvOp::AmoswapD).bits, 0x0800_302f);
        assert_eq!(head(RvOp::FmaddD).bits, 0x0200_0043);
    }

    #[test]
    fn masks_cover_fixed_fields() {
        assert_eq!(head(RvOp::Addi).mask, 0x0000_707f);
        assert_eq!(head(RvOp::Add).mask, 0xfe00_707f);
        assert_eq!(head(RvOp::Jal).mask, 0x0000_007f);
        // The rounding mode is an operand, so funct3 is free.
        assert_eq!(head(RvOp::FaddS).mask, 0xfe00_007f);
        assert_eq!(head(RvOp::Slli).mask, 0xfc00_707f);
    }

    #[test]
    fn compressed_entries_stay_in_the_halfword() {
        let mut seen = 0;
        walk::<RvLayout>(|_, info| {
            let compressed = info.flags.contains(Flags::COMPRESSED);
            assert_eq!(compressed, info.bits & 3 != 3, "{}", info.name);
            if compressed {
                assert_eq!(info.mask >> 16, 0, "{}", info.name);
                assert_eq!(info.bits >> 16, 0, "{}", info.name);
                seen += 1;
            }
        });
        assert_eq!(seen, 37);
    }

    #[test]
    fn register_forms_are_single_entries() {
        for op in [RvOp::Add, RvOp::CAdd, RvOp::FaddD, RvOp::LrW] {
            assert!(matches!(head(op).next, Link::End));
        }
    }
}
