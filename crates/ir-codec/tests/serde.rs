//! Serde round-trip tests for the public IR value types.

#![cfg(feature = "serde")]

use ir_codec::{
    reg, BranchKind, BranchTarget, BranchType, Cond, Eflags, FpType, IrError, IsaMode, OpSize,
    Opcode, Operand, Predicate, Prefixes, Reg, Shift, X86Cond,
};

/// Helper: serialize to JSON, deserialize back, assert equality.
fn round_trip<T>(val: &T)
where
    T: serde::Serialize + serde::de::DeserializeOwned + PartialEq + core::fmt::Debug,
{
    let json = serde_json::to_string(val).expect("serialize");
    let back: T = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(val, &back, "round-trip mismatch for JSON: {json}");
}

// ─── Modes ──────────────────────────────────────────────────────────────────

#[test]
fn serde_isa_mode() {
    for mode in [
        IsaMode::Ia32,
        IsaMode::Amd64,
        IsaMode::ArmA32,
        IsaMode::Thumb,
        IsaMode::Aarch64,
        IsaMode::Riscv64,
    ] {
        round_trip(&mode);
    }
}

// ─── Opcodes and predicates ─────────────────────────────────────────────────

#[test]
fn serde_opcode() {
    round_trip(&Opcode::Undecoded);
    round_trip(&Opcode::Invalid);
    #[cfg(feature = "arm")]
    round_trip(&Opcode::Arm(ir_codec::ArmOp::Ldrd));
    #[cfg(feature = "aarch64")]
    round_trip(&Opcode::A64(ir_codec::A64Op::Bcond));
    #[cfg(feature = "riscv")]
    round_trip(&Opcode::Rv(ir_codec::RvOp::CAddi));
    #[cfg(feature = "x86")]
    round_trip(&Opcode::X86(ir_codec::X86Op::Jcc));
}

#[test]
fn serde_predicate() {
    round_trip(&Predicate::None);
    round_trip(&Predicate::Always);
    round_trip(&Predicate::Arm(Cond::Ge));
    round_trip(&Predicate::X86(X86Cond::Nz));
}

#[test]
fn serde_flag_sets() {
    round_trip(&Eflags::READ_ZF);
    round_trip(&Prefixes::REP);
}

// ─── Operands ───────────────────────────────────────────────────────────────

#[test]
fn serde_operand() {
    round_trip(&Operand::Null);
    round_trip(&Operand::reg(Reg::NULL));
    round_trip(&Operand::imm_int(-42, OpSize::B4));
    round_trip(&Operand::imm_f64(1.5));
    round_trip(&Operand::shift_kind(Shift::Lsl));
    round_trip(&Operand::pc(0x1000));
    round_trip(&Operand::rel_addr(0x40_1000, OpSize::B8));
    #[cfg(feature = "x86")]
    round_trip(&Operand::base_disp(
        reg::x86::RBX,
        reg::x86::RCX,
        4,
        -8,
        OpSize::B8,
    ));
    #[cfg(feature = "riscv")]
    round_trip(&Operand::reg(reg::rv::x(10)));
}

// ─── Classification ─────────────────────────────────────────────────────────

#[test]
fn serde_classification() {
    round_trip(&BranchType {
        target: BranchTarget::Indirect,
        kind: BranchKind::Return,
        far: false,
    });
    for fp in [FpType::State, FpType::Move, FpType::Convert, FpType::Math] {
        round_trip(&fp);
    }
}

// ─── Errors ─────────────────────────────────────────────────────────────────

#[test]
fn serde_errors() {
    let errors = [
        IrError::Truncated {
            needed: 4,
            available: 2,
        },
        IrError::InvalidEncoding {
            mode: IsaMode::Aarch64,
            pc: 0x1000,
            word: 0,
        },
        IrError::UnresolvedTarget,
        IrError::BufferTooSmall {
            needed: 4,
            available: 0,
        },
        IrError::ModeUnavailable {
            mode: IsaMode::Thumb,
        },
        IrError::IllegalOperand {
            opcode: Opcode::Invalid,
            reason: "base register required",
        },
    ];
    for err in errors {
        // Static reason strings borrow from the input, so it must outlive the value.
        let json: &'static str =
            Box::leak(serde_json::to_string(&err).expect("serialize").into_boxed_str());
        let back: IrError = serde_json::from_str(json).expect("deserialize");
        assert_eq!(err, back, "round-trip mismatch for JSON: {json}");
    }
}
