//! Control-flow and instruction-class queries on decoded instructions.
//!
//! Every query panics on an instruction whose opcode is
//! [`Opcode::Undecoded`] or [`Opcode::Invalid`]; decode at least to the
//! opcode level first.

use crate::instr::{Instr, Opcode, Prefixes};
use crate::isa::IsaMode;
use crate::opnd::Operand;
use crate::reg::Reg;

/// Shape of a control transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    None,
    /// Conditional direct branch.
    Cond { short: bool, looping: bool },
    /// Unconditional direct jump.
    Jump { short: bool, far: bool },
    Call { direct: bool, far: bool, conditional: bool },
    /// Indirect jump; `mem` when the target is loaded from memory.
    Indirect { far: bool, mem: bool },
    Return { far: bool },
}

/// How a branch reaches its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BranchTarget {
    /// Target encoded in the instruction.
    Direct,
    /// Target read from a register or memory.
    Indirect,
}

/// What a branch does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BranchKind {
    #[allow(missing_docs)]
    Call,
    #[allow(missing_docs)]
    Jump,
    #[allow(missing_docs)]
    Return,
}

/// Branch classification returned by [`branch_type`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BranchType {
    /// Direct or indirect.
    pub target: BranchTarget,
    /// Call, jump or return.
    pub kind: BranchKind,
    /// The target carries a segment selector (x86 far transfers).
    pub far: bool,
}

/// Floating-point instruction category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FpType {
    /// Saves, restores or configures floating-point state.
    State,
    /// Moves floating-point values without changing them.
    Move,
    /// Converts between formats.
    Convert,
    /// Computes.
    Math,
}

fn opcode(instr: &Instr<'_>) -> Opcode {
    let op = instr.opcode();
    assert!(op.is_real(), "classifying an instruction with opcode {}", op);
    op
}

fn reg_at(ops: &[Operand], i: usize) -> Reg {
    match ops.get(i) {
        Some(Operand::Reg { reg, .. }) => *reg,
        _ => Reg::NULL,
    }
}

fn imm_at(ops: &[Operand], i: usize) -> Option<i64> {
    match ops.get(i) {
        Some(op @ Operand::ImmInt { .. }) => Some(op.imm_value()),
        _ => None,
    }
}

fn flow(instr: &Instr<'_>) -> Flow {
    match opcode(instr) {
        #[cfg(feature = "x86")]
        Opcode::X86(op) => x86::flow(instr, op),
        #[cfg(feature = "arm")]
        Opcode::Arm(op) => arm::flow(instr, op),
        #[cfg(feature = "aarch64")]
        Opcode::A64(op) => a64::flow(op),
        #[cfg(feature = "riscv")]
        Opcode::Rv(op) => rv::flow(instr, op),
        _ => Flow::None,
    }
}

/// Any control transfer.
pub fn is_cti(instr: &Instr<'_>) -> bool {
    flow(instr) != Flow::None
}

/// Conditional direct branch. Conditional direct calls count too.
pub fn is_cbr(instr: &Instr<'_>) -> bool {
    matches!(
        flow(instr),
        Flow::Cond { .. }
            | Flow::Call {
                direct: true,
                conditional: true,
                ..
            }
    )
}

/// Unconditional direct jump.
pub fn is_ubr(instr: &Instr<'_>) -> bool {
    matches!(flow(instr), Flow::Jump { .. })
}

/// Transfer whose target is only known at run time.
pub fn is_mbr(instr: &Instr<'_>) -> bool {
    matches!(
        flow(instr),
        Flow::Indirect { .. } | Flow::Return { .. } | Flow::Call { direct: false, .. }
    )
}

pub fn is_call(instr: &Instr<'_>) -> bool {
    matches!(flow(instr), Flow::Call { .. })
}

pub fn is_call_direct(instr: &Instr<'_>) -> bool {
    matches!(flow(instr), Flow::Call { direct: true, .. })
}

/// Direct call without a segment selector.
pub fn is_near_call_direct(instr: &Instr<'_>) -> bool {
    matches!(
        flow(instr),
        Flow::Call {
            direct: true,
            far: false,
            ..
        }
    )
}

pub fn is_call_indirect(instr: &Instr<'_>) -> bool {
    matches!(flow(instr), Flow::Call { direct: false, .. })
}

/// Return from a call or interrupt. On ARM this covers `bx lr`, any pc
/// write that reads `lr`, and pops into the pc.
pub fn is_return(instr: &Instr<'_>) -> bool {
    matches!(flow(instr), Flow::Return { .. })
}

/// Indirect jump through a memory operand.
pub fn is_jump_mem(instr: &Instr<'_>) -> bool {
    matches!(flow(instr), Flow::Indirect { mem: true, .. })
}

/// x86 transfer to a `segment:offset` target.
pub fn is_far_cti(instr: &Instr<'_>) -> bool {
    match flow(instr) {
        Flow::Jump { far, .. }
        | Flow::Call { far, .. }
        | Flow::Indirect { far, .. }
        | Flow::Return { far } => far,
        Flow::Cond { .. } | Flow::None => false,
    }
}

/// Branch with a short reach: x86 rel8 forms, `cbz`/`cbnz`, 16-bit Thumb
/// `b`, and compressed RISC-V branches and jumps.
pub fn is_cti_short(instr: &Instr<'_>) -> bool {
    matches!(
        flow(instr),
        Flow::Cond { short: true, .. } | Flow::Jump { short: true, .. }
    )
}

/// x86 `loop`, `loope`, `loopne` and `jecxz`.
pub fn is_cti_loop(instr: &Instr<'_>) -> bool {
    matches!(flow(instr), Flow::Cond { looping: true, .. })
}

/// System call instruction.
pub fn is_syscall(instr: &Instr<'_>) -> bool {
    match opcode(instr) {
        #[cfg(feature = "x86")]
        Opcode::X86(op) => {
            use crate::x86_tables::X86Op;
            matches!(op, X86Op::Syscall | X86Op::Sysenter)
                || (op == X86Op::Int && imm_at(instr.srcs(), 0) == Some(0x80))
        }
        #[cfg(feature = "arm")]
        Opcode::Arm(op) => op == crate::arm_tables::ArmOp::Svc,
        #[cfg(feature = "aarch64")]
        Opcode::A64(op) => op == crate::aarch64_tables::A64Op::Svc,
        #[cfg(feature = "riscv")]
        Opcode::Rv(op) => op == crate::riscv_tables::RvOp::Ecall,
        _ => false,
    }
}

/// Software interrupt or breakpoint.
pub fn is_interrupt(instr: &Instr<'_>) -> bool {
    match opcode(instr) {
        #[cfg(feature = "x86")]
        Opcode::X86(op) => {
            use crate::x86_tables::X86Op;
            matches!(op, X86Op::Int | X86Op::Int3 | X86Op::Into)
        }
        #[cfg(feature = "arm")]
        Opcode::Arm(op) => {
            use crate::arm_tables::ArmOp;
            matches!(op, ArmOp::Svc | ArmOp::Bkpt)
        }
        #[cfg(feature = "aarch64")]
        Opcode::A64(op) => {
            use crate::aarch64_tables::A64Op;
            matches!(op, A64Op::Svc | A64Op::Hvc | A64Op::Brk)
        }
        #[cfg(feature = "riscv")]
        Opcode::Rv(op) => {
            use crate::riscv_tables::RvOp;
            matches!(op, RvOp::Ecall | RvOp::Ebreak | RvOp::CEbreak)
        }
        _ => false,
    }
}

/// Architecturally undefined instruction (`ud2`, `udf`, `unimp`).
pub fn is_undefined(instr: &Instr<'_>) -> bool {
    match opcode(instr) {
        #[cfg(feature = "x86")]
        Opcode::X86(op) => op == crate::x86_tables::X86Op::Ud2,
        #[cfg(feature = "arm")]
        Opcode::Arm(op) => op == crate::arm_tables::ArmOp::Udf,
        #[cfg(feature = "riscv")]
        Opcode::Rv(op) => op == crate::riscv_tables::RvOp::Unimp,
        _ => false,
    }
}

pub fn is_prefetch(instr: &Instr<'_>) -> bool {
    match opcode(instr) {
        #[cfg(feature = "x86")]
        Opcode::X86(op) => {
            use crate::x86_tables::X86Op;
            matches!(
                op,
                X86Op::Prefetchnta | X86Op::Prefetcht0 | X86Op::Prefetcht1 | X86Op::Prefetcht2
            )
        }
        #[cfg(feature = "arm")]
        Opcode::Arm(op) => op == crate::arm_tables::ArmOp::Pld,
        #[cfg(feature = "aarch64")]
        Opcode::A64(op) => op == crate::aarch64_tables::A64Op::Prfm,
        _ => false,
    }
}

/// x86 string instruction (`movs`, `cmps`, `stos`, `lods`, `scas`).
pub fn is_string_op(instr: &Instr<'_>) -> bool {
    match opcode(instr) {
        #[cfg(feature = "x86")]
        Opcode::X86(op) => {
            use crate::x86_tables::X86Op;
            matches!(
                op,
                X86Op::Movs | X86Op::Cmps | X86Op::Stos | X86Op::Lods | X86Op::Scas
            )
        }
        _ => false,
    }
}

/// String instruction with a `rep` or `repne` prefix.
pub fn is_rep_string_op(instr: &Instr<'_>) -> bool {
    let p = instr.prefixes();
    is_string_op(instr) && (p.contains(Prefixes::REP) || p.contains(Prefixes::REPNE))
}

/// Load from the stack that moves the stack pointer up.
pub fn is_pop(instr: &Instr<'_>) -> bool {
    match opcode(instr) {
        #[cfg(feature = "x86")]
        Opcode::X86(op) => {
            use crate::x86_tables::X86Op;
            matches!(op, X86Op::Pop | X86Op::Popf)
        }
        #[cfg(feature = "arm")]
        Opcode::Arm(op) => arm::is_pop(instr, op),
        #[cfg(feature = "aarch64")]
        Opcode::A64(op) => a64::is_pop(instr, op),
        _ => false,
    }
}

/// ARM store-multiple: reads a register list.
pub fn reads_gpr_list(instr: &Instr<'_>) -> bool {
    match opcode(instr) {
        #[cfg(feature = "arm")]
        Opcode::Arm(op) => {
            use crate::arm_tables::ArmOp;
            matches!(
                op,
                ArmOp::Stm | ArmOp::Stmda | ArmOp::Stmdb | ArmOp::Stmib | ArmOp::Push
            )
        }
        _ => false,
    }
}

/// ARM load-multiple: writes a register list.
pub fn writes_gpr_list(instr: &Instr<'_>) -> bool {
    match opcode(instr) {
        #[cfg(feature = "arm")]
        Opcode::Arm(op) => {
            use crate::arm_tables::ArmOp;
            matches!(
                op,
                ArmOp::Ldm | ArmOp::Ldmda | ArmOp::Ldmdb | ArmOp::Ldmib | ArmOp::Pop
            )
        }
        _ => false,
    }
}

/// The constant a register-immediate move (or a self-xor) leaves in its
/// destination.
pub fn is_mov_constant(instr: &Instr<'_>) -> Option<i64> {
    match opcode(instr) {
        #[cfg(feature = "x86")]
        Opcode::X86(op) => x86::mov_constant(instr, op),
        #[cfg(feature = "arm")]
        Opcode::Arm(op) => arm::mov_constant(instr, op),
        #[cfg(feature = "aarch64")]
        Opcode::A64(op) => a64::mov_constant(instr, op),
        #[cfg(feature = "riscv")]
        Opcode::Rv(op) => rv::mov_constant(instr, op),
        _ => None,
    }
}

pub fn fp_type(instr: &Instr<'_>) -> Option<FpType> {
    match opcode(instr) {
        #[cfg(feature = "x86")]
        Opcode::X86(op) => x86::fp_type(op),
        #[cfg(feature = "arm")]
        Opcode::Arm(op) => arm::fp_type(op),
        #[cfg(feature = "aarch64")]
        Opcode::A64(op) => a64::fp_type(instr, op),
        #[cfg(feature = "riscv")]
        Opcode::Rv(op) => rv::fp_type(instr, op),
        _ => None,
    }
}

pub fn is_floating(instr: &Instr<'_>) -> bool {
    fp_type(instr).is_some()
}

/// Classify a control transfer.
///
/// # Panics
///
/// If `instr` is not a control transfer.
pub fn branch_type(instr: &Instr<'_>) -> BranchType {
    let (target, kind, far) = match flow(instr) {
        Flow::None => panic!("{} is not a control transfer", instr.opcode()),
        Flow::Cond { .. } => (BranchTarget::Direct, BranchKind::Jump, false),
        Flow::Jump { far, .. } => (BranchTarget::Direct, BranchKind::Jump, far),
        Flow::Call { direct, far, .. } => {
            let target = if direct {
                BranchTarget::Direct
            } else {
                BranchTarget::Indirect
            };
            (target, BranchKind::Call, far)
        }
        Flow::Indirect { far, .. } => (BranchTarget::Indirect, BranchKind::Jump, far),
        Flow::Return { far } => (BranchTarget::Indirect, BranchKind::Return, far),
    };
    BranchType { target, kind, far }
}

/// Invert a conditional branch in place: flip its predicate, or swap
/// zero/non-zero and equal/not-equal opcode pairs.
///
/// # Panics
///
/// If `instr` is not a conditional branch, or is an x86 `loop`/`jecxz`,
/// which have no inverse.
pub fn invert_cbr(instr: &mut Instr<'_>) {
    assert!(is_cbr(instr), "{} is not a conditional branch", instr.opcode());
    let swapped = match instr.opcode() {
        #[cfg(feature = "arm")]
        Opcode::Arm(op) => {
            use crate::arm_tables::ArmOp;
            match op {
                ArmOp::Cbz => Some(Opcode::Arm(ArmOp::Cbnz)),
                ArmOp::Cbnz => Some(Opcode::Arm(ArmOp::Cbz)),
                _ => None,
            }
        }
        #[cfg(feature = "aarch64")]
        Opcode::A64(op) => {
            use crate::aarch64_tables::A64Op;
            match op {
                A64Op::Cbz => Some(Opcode::A64(A64Op::Cbnz)),
                A64Op::Cbnz => Some(Opcode::A64(A64Op::Cbz)),
                A64Op::Tbz => Some(Opcode::A64(A64Op::Tbnz)),
                A64Op::Tbnz => Some(Opcode::A64(A64Op::Tbz)),
                _ => None,
            }
        }
        #[cfg(feature = "riscv")]
        Opcode::Rv(op) => Some(Opcode::Rv(rv::inverse(op))),
        _ => None,
    };
    match swapped {
        Some(op) => instr.set_opcode(op),
        None => {
            let pred = instr.predicate();
            assert!(pred.is_conditional(), "{} has no condition to invert", instr.opcode());
            instr.set_predicate(pred.invert());
        }
    }
}

#[cfg(feature = "x86")]
mod x86 {
    use super::*;
    use crate::x86_tables::X86Op;

    pub(super) fn flow(instr: &Instr<'_>, op: X86Op) -> Flow {
        match op {
            X86Op::Jcc => Flow::Cond {
                short: false,
                looping: false,
            },
            X86Op::JccShort => Flow::Cond {
                short: true,
                looping: false,
            },
            X86Op::Loop | X86Op::Loope | X86Op::Loopne | X86Op::Jecxz => Flow::Cond {
                short: true,
                looping: true,
            },
            X86Op::Jmp => Flow::Jump {
                short: false,
                far: false,
            },
            X86Op::JmpShort => Flow::Jump {
                short: true,
                far: false,
            },
            X86Op::JmpFar => Flow::Jump {
                short: false,
                far: true,
            },
            X86Op::Call | X86Op::CallFar | X86Op::CallInd | X86Op::CallFarInd => Flow::Call {
                direct: matches!(op, X86Op::Call | X86Op::CallFar),
                far: matches!(op, X86Op::CallFar | X86Op::CallFarInd),
                conditional: false,
            },
            X86Op::JmpInd => Flow::Indirect {
                far: false,
                mem: instr.srcs().first().is_some_and(Operand::is_mem),
            },
            X86Op::JmpFarInd => Flow::Indirect {
                far: true,
                mem: true,
            },
            X86Op::Ret => Flow::Return { far: false },
            X86Op::RetFar | X86Op::Iret => Flow::Return { far: true },
            _ => Flow::None,
        }
    }

    pub(super) fn mov_constant(instr: &Instr<'_>, op: X86Op) -> Option<i64> {
        let srcs = instr.srcs();
        let dst = reg_at(instr.dsts(), 0);
        match op {
            X86Op::Mov if !dst.is_null() => imm_at(srcs, 0),
            X86Op::Xor if !dst.is_null() && reg_at(srcs, 0) == dst && reg_at(srcs, 1) == dst => Some(0),
            _ => None,
        }
    }

    pub(super) fn fp_type(op: X86Op) -> Option<FpType> {
        use X86Op::*;
        Some(match op {
            Fxsave | Fxrstor | Ldmxcsr | Stmxcsr | Fldcw | Fnstcw | Fnstsw | Fninit | Fwait => FpType::State,
            Movups | Movupd | Movaps | Movapd | Movss | Movsd | Fld | Fst | Fstp => FpType::Move,
            Cvtsi2ss | Cvtsi2sd | Cvttss2si | Cvttsd2si | Cvtss2sd | Cvtsd2ss | Fild | Fistp => {
                FpType::Convert
            }
            Addss | Addsd | Subss | Subsd | Mulss | Mulsd | Divss | Divsd | Sqrtss | Sqrtsd | Xorps
            | Xorpd | Ucomiss | Ucomisd | Fadd | Fsub | Fmul | Fdiv => FpType::Math,
            _ => return None,
        })
    }
}

#[cfg(feature = "arm")]
mod arm {
    use super::*;
    use crate::arm_tables::ArmOp;
    use crate::reg::arm::{LR, PC, SP};

    fn conditional(instr: &Instr<'_>) -> bool {
        instr.predicate().is_conditional()
    }

    pub(super) fn flow(instr: &Instr<'_>, op: ArmOp) -> Flow {
        let narrow = instr.isa_mode() == IsaMode::Thumb && instr.length() == Some(2);
        match op {
            ArmOp::B if conditional(instr) => Flow::Cond {
                short: narrow,
                looping: false,
            },
            ArmOp::B => Flow::Jump {
                short: narrow,
                far: false,
            },
            ArmOp::Cbz | ArmOp::Cbnz => Flow::Cond {
                short: true,
                looping: false,
            },
            ArmOp::Bl | ArmOp::Blx => Flow::Call {
                direct: instr.srcs().first().is_some_and(Operand::is_pc),
                far: false,
                conditional: conditional(instr),
            },
            ArmOp::Bx if reg_at(instr.srcs(), 0) == LR => Flow::Return { far: false },
            ArmOp::Bx => Flow::Indirect {
                far: false,
                mem: false,
            },
            _ if instr.writes_to_reg(PC) => {
                if instr.reads_from_reg(LR) || is_pop(instr, op) {
                    Flow::Return { far: false }
                } else {
                    Flow::Indirect {
                        far: false,
                        mem: op == ArmOp::Ldr,
                    }
                }
            }
            _ => Flow::None,
        }
    }

    pub(super) fn is_pop(instr: &Instr<'_>, op: ArmOp) -> bool {
        let from_stack = || {
            instr
                .srcs()
                .iter()
                .any(|s| matches!(s, Operand::BaseDisp(m) if m.base == SP))
                && instr.writes_to_reg(SP)
        };
        match op {
            ArmOp::Pop => true,
            ArmOp::Ldm | ArmOp::Ldr => from_stack(),
            _ => false,
        }
    }

    pub(super) fn mov_constant(instr: &Instr<'_>, op: ArmOp) -> Option<i64> {
        let srcs = instr.srcs();
        match op {
            ArmOp::Mov | ArmOp::Movs | ArmOp::Movw => imm_at(srcs, 0),
            ArmOp::Mvn | ArmOp::Mvns => imm_at(srcs, 0).map(|v| !(v as u32) as i32 as i64),
            ArmOp::Eor => {
                let dst = reg_at(instr.dsts(), 0);
                let unshifted = srcs.len() == 4
                    && srcs[2] == Operand::shift_kind(crate::opnd::Shift::None)
                    && imm_at(srcs, 3) == Some(0);
                (!dst.is_null() && reg_at(srcs, 0) == dst && reg_at(srcs, 1) == dst && unshifted)
                    .then_some(0)
            }
            _ => None,
        }
    }

    pub(super) fn fp_type(op: ArmOp) -> Option<FpType> {
        use ArmOp::*;
        Some(match op {
            Vmrs | Vmsr => FpType::State,
            VmovF32 | VmovF64 | Vmov | Vldr | Vstr => FpType::Move,
            VcvtF64F32 | VcvtF32F64 => FpType::Convert,
            VaddF32 | VaddF64 | VsubF32 | VsubF64 | VmulF32 | VmulF64 | VdivF32 | VdivF64 | VabsF32
            | VabsF64 | VnegF32 | VnegF64 | VsqrtF32 | VsqrtF64 | VcmpF32 | VcmpF64 => FpType::Math,
            _ => return None,
        })
    }
}

#[cfg(feature = "aarch64")]
mod a64 {
    use super::*;
    use crate::aarch64_tables::A64Op;
    use crate::reg::a64::{FPCR, FPSR, SP, WZR, XZR};

    pub(super) fn flow(op: A64Op) -> Flow {
        match op {
            A64Op::B => Flow::Jump {
                short: false,
                far: false,
            },
            A64Op::Bcond | A64Op::Cbz | A64Op::Cbnz | A64Op::Tbz | A64Op::Tbnz => Flow::Cond {
                short: false,
                looping: false,
            },
            A64Op::Bl | A64Op::Blr => Flow::Call {
                direct: op == A64Op::Bl,
                far: false,
                conditional: false,
            },
            A64Op::Br => Flow::Indirect {
                far: false,
                mem: false,
            },
            A64Op::Ret => Flow::Return { far: false },
            _ => Flow::None,
        }
    }

    pub(super) fn is_pop(instr: &Instr<'_>, op: A64Op) -> bool {
        matches!(op, A64Op::Ldr | A64Op::Ldp)
            && instr
                .srcs()
                .iter()
                .any(|s| matches!(s, Operand::BaseDisp(m) if m.base == SP))
            && instr.writes_to_reg(SP)
    }

    pub(super) fn mov_constant(instr: &Instr<'_>, op: A64Op) -> Option<i64> {
        let srcs = instr.srcs();
        let narrow = reg_at(instr.dsts(), 0).size() == crate::size::OpSize::B4;
        let zero = |r: Reg| r == XZR || r == WZR;
        let value = match op {
            A64Op::Movz | A64Op::Movn => {
                let shifted = (imm_at(srcs, 0)? as u64) << imm_at(srcs, 1).unwrap_or(0);
                if op == A64Op::Movz {
                    shifted
                } else {
                    !shifted
                }
            }
            A64Op::Orr | A64Op::Add if zero(reg_at(srcs, 0)) => imm_at(srcs, 1)? as u64,
            A64Op::Sub if zero(reg_at(srcs, 0)) => (imm_at(srcs, 1)? as u64).wrapping_neg(),
            _ => return None,
        };
        Some(if narrow {
            value as u32 as i64
        } else {
            value as i64
        })
    }

    pub(super) fn fp_type(instr: &Instr<'_>, op: A64Op) -> Option<FpType> {
        use A64Op::*;
        Some(match op {
            Mrs | Msr => {
                let fp = |ops: &[Operand]| matches!(reg_at(ops, 0), r if r == FPCR || r == FPSR);
                if fp(instr.srcs()) || fp(instr.dsts()) {
                    FpType::State
                } else {
                    return None;
                }
            }
            Fmov => FpType::Move,
            Fcvt | Scvtf | Ucvtf | Fcvtzs | Fcvtzu => FpType::Convert,
            Fadd | Fsub | Fmul | Fdiv | Fnmul | Fmax | Fmin | Fabs | Fneg | Fsqrt | Fcmp | Fcmpe => {
                FpType::Math
            }
            _ => return None,
        })
    }
}

#[cfg(feature = "riscv")]
mod rv {
    use super::*;
    use crate::reg::rv::{RA, ZERO};
    use crate::riscv_tables::RvOp;

    /// `fflags`, `frm` and `fcsr`.
    const FP_CSRS: core::ops::RangeInclusive<i64> = 1..=3;

    fn links(instr: &Instr<'_>) -> bool {
        let rd = reg_at(instr.dsts(), 0);
        !rd.is_null() && rd != ZERO
    }

    pub(super) fn flow(instr: &Instr<'_>, op: RvOp) -> Flow {
        let srcs = instr.srcs();
        match op {
            RvOp::Beq | RvOp::Bne | RvOp::Blt | RvOp::Bge | RvOp::Bltu | RvOp::Bgeu => Flow::Cond {
                short: false,
                looping: false,
            },
            RvOp::CBeqz | RvOp::CBnez => Flow::Cond {
                short: true,
                looping: false,
            },
            RvOp::CJ => Flow::Jump {
                short: true,
                far: false,
            },
            RvOp::Jal if links(instr) => Flow::Call {
                direct: true,
                far: false,
                conditional: false,
            },
            RvOp::Jal => Flow::Jump {
                short: false,
                far: false,
            },
            RvOp::Jalr | RvOp::CJalr if op == RvOp::CJalr || links(instr) => Flow::Call {
                direct: false,
                far: false,
                conditional: false,
            },
            RvOp::Jalr if reg_at(srcs, 0) == RA && imm_at(srcs, 1) == Some(0) => Flow::Return { far: false },
            RvOp::CJr if reg_at(srcs, 0) == RA => Flow::Return { far: false },
            RvOp::Jalr | RvOp::CJr => Flow::Indirect {
                far: false,
                mem: false,
            },
            _ => Flow::None,
        }
    }

    pub(super) fn inverse(op: RvOp) -> RvOp {
        match op {
            RvOp::Beq => RvOp::Bne,
            RvOp::Bne => RvOp::Beq,
            RvOp::Blt => RvOp::Bge,
            RvOp::Bge => RvOp::Blt,
            RvOp::Bltu => RvOp::Bgeu,
            RvOp::Bgeu => RvOp::Bltu,
            RvOp::CBeqz => RvOp::CBnez,
            RvOp::CBnez => RvOp::CBeqz,
            other => panic!("{} has no inverse", other.name()),
        }
    }

    pub(super) fn mov_constant(instr: &Instr<'_>, op: RvOp) -> Option<i64> {
        let srcs = instr.srcs();
        match op {
            RvOp::Addi if reg_at(srcs, 0) == ZERO => imm_at(srcs, 1),
            RvOp::Lui | RvOp::CLi | RvOp::CLui => imm_at(srcs, 0),
            RvOp::Xor if !reg_at(srcs, 0).is_null() && reg_at(srcs, 0) == reg_at(srcs, 1) => Some(0),
            _ => None,
        }
    }

    pub(super) fn fp_type(instr: &Instr<'_>, op: RvOp) -> Option<FpType> {
        use RvOp::*;
        Some(match op {
            Csrrw | Csrrs | Csrrc | Csrrwi | Csrrsi | Csrrci => {
                if imm_at(instr.srcs(), 0).is_some_and(|csr| FP_CSRS.contains(&csr)) {
                    FpType::State
                } else {
                    return None;
                }
            }
            Flw | Fsw | Fld | Fsd | CFld | CFsd | CFldsp | CFsdsp | FmvXW | FmvWX | FmvXD | FmvDX => {
                FpType::Move
            }
            FcvtWS | FcvtWuS | FcvtLS | FcvtLuS | FcvtSW | FcvtSWu | FcvtSL | FcvtSLu | FcvtSD
            | FcvtDS | FcvtWD | FcvtWuD | FcvtLD | FcvtLuD | FcvtDW | FcvtDWu | FcvtDL | FcvtDLu => {
                FpType::Convert
            }
            FmaddS | FmsubS | FnmsubS | FnmaddS | FaddS | FsubS | FmulS | FdivS | FsqrtS | FsgnjS
            | FsgnjnS | FsgnjxS | FminS | FmaxS | FeqS | FltS | FleS | FclassS | FmaddD | FmsubD
            | FnmsubD | FnmaddD | FaddD | FsubD | FmulD | FdivD | FsqrtD | FsgnjD | FsgnjnD
            | FsgnjxD | FminD | FmaxD | FeqD | FltD | FleD | FclassD => FpType::Math,
            _ => return None,
        })
    }
}
