//! # ir-codec — table-driven instruction decode/encode IR
//!
//! `ir-codec` turns raw machine code into an architecture-normalized
//! instruction object and back. It covers 32-bit ARM (A32 and Thumb),
//! x86 / x86-64, AArch64 and RISC-V RV64GC, each driven by a static forest
//! of decode tables that the encoder walks in reverse.
//!
//! ## Quick Start
//!
//! ```rust
//! use ir_codec::{decode, instr_encode, isa, Instr, IsaMode, Predicate};
//!
//! let bytes = 0xE283_3001u32.to_le_bytes(); // add r3, r3, #1
//! isa::with_isa_mode(IsaMode::ArmA32, || {
//!     let mut instr = Instr::new(IsaMode::ArmA32);
//!     let next = decode(&bytes, 0x8000, &mut instr).unwrap();
//!     assert_eq!(next, 0x8004);
//!     assert_eq!(instr.opcode().name(), "add");
//!     assert_eq!(instr.predicate(), Predicate::Always);
//!
//!     let mut out = [0u8; 4];
//!     instr_encode(&instr, &mut out, 0x8000).unwrap();
//!     assert_eq!(out, bytes);
//! });
//! ```
//!
//! ## Features
//!
//! - **Per-architecture features** — `x86`, `x86_64`, `arm`, `aarch64`,
//!   `riscv`; a disabled architecture reports
//!   [`IrError::ModeUnavailable`].
//! - **Three decode depths** — length only ([`decode_raw`]), opcode and
//!   flags ([`decode_opcode`]), or full operands ([`decode`]).
//! - **Copy-aware encoding** — pc-relative operands are recomputed for the
//!   address the bytes will finally run at.
//! - **`no_std` + `alloc`** — the per-thread ISA mode falls back to a
//!   global atomic without `std`.

#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]
// Table-driven bit twiddling narrows and sign-changes integers all over
// the place and spells encodings as bare hex words.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_lossless,
    clippy::cast_possible_wrap,
    clippy::unreadable_literal,
    clippy::match_same_arms,
    clippy::redundant_closure_for_method_calls,
    clippy::bool_to_int_with_if,
    clippy::wildcard_imports,
    clippy::enum_glob_use,
    clippy::must_use_candidate,
    clippy::module_name_repetitions,
    clippy::uninlined_format_args,
    clippy::doc_markdown,
    clippy::similar_names,
    clippy::too_many_lines,
    clippy::single_match_else,
    clippy::manual_let_else,
    clippy::many_single_char_names,
    clippy::return_self_not_must_use,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

extern crate alloc;

/// Instruction classification: branches, calls, constants, floating point.
pub mod classify;
/// Decoder entry points.
pub mod decode;
/// Encoder entry points and the encoded-bytes buffer.
pub mod encode;
/// Error type.
pub mod error;
/// Instructions, opcodes, predicates, prefixes and status flags.
pub mod instr;
/// Per-thread ISA mode and the engine-memory hook.
pub mod isa;
/// Operands.
pub mod opnd;
/// Register id space.
pub mod reg;
/// Operand size tags.
pub mod size;
/// Decode table engine and validation.
pub mod table;

#[cfg(feature = "aarch64")]
pub(crate) mod aarch64;
#[cfg(feature = "aarch64")]
pub(crate) mod aarch64_tables;
#[cfg(feature = "arm")]
pub(crate) mod arm;
#[cfg(feature = "arm")]
pub(crate) mod arm_tables;
#[cfg(any(feature = "arm", feature = "aarch64"))]
pub(crate) mod fpimm;
/// Thumb IT-block state.
#[cfg(feature = "arm")]
pub mod it_block;
#[cfg(feature = "riscv")]
pub(crate) mod riscv;
#[cfg(feature = "riscv")]
pub(crate) mod riscv_tables;
#[cfg(feature = "arm")]
pub(crate) mod thumb;
#[cfg(feature = "arm")]
pub(crate) mod thumb_tables;
#[cfg(feature = "x86")]
pub(crate) mod x86;
#[cfg(feature = "x86")]
pub(crate) mod x86_length;
#[cfg(feature = "x86")]
pub(crate) mod x86_tables;

pub use classify::{
    branch_type, fp_type, invert_cbr, is_call, is_call_direct, is_call_indirect, is_cbr, is_cti,
    is_cti_loop, is_cti_short, is_far_cti, is_floating, is_interrupt, is_jump_mem, is_mbr,
    is_mov_constant, is_near_call_direct, is_pop, is_prefetch, is_rep_string_op, is_return,
    is_string_op, is_syscall, is_ubr, is_undefined, reads_gpr_list, writes_gpr_list, BranchKind,
    BranchTarget, BranchType, FpType,
};
#[cfg(feature = "x86")]
pub use decode::decode_sizeof;
pub use decode::{decode, decode_from_copy, decode_next_pc, decode_opcode, decode_raw};
pub use encode::{
    encode_bytes, instr_encode, instr_encode_and_record, instr_encode_to_copy, instr_encode_with,
    instr_length, InstrBytes, InstrResolver, NoRefs,
};
pub use error::IrError;
pub use instr::{Cond, Eflags, Instr, Opcode, OperandList, Predicate, Prefixes, RawBytes, X86Cond};
pub use isa::{Arch, IsaMode};
pub use opnd::{IndexShift, InstrId, MemHints, MemRef, Operand, OpndFlags, Shift};
pub use reg::{Reg, RegClass};
pub use size::OpSize;

pub use table::{validate_mode, TableIssue};

#[cfg(feature = "aarch64")]
pub use aarch64_tables::A64Op;
#[cfg(feature = "arm")]
pub use arm_tables::ArmOp;
#[cfg(feature = "arm")]
pub use it_block::{reset_it_state, ItBlock};
#[cfg(feature = "riscv")]
pub use riscv_tables::RvOp;
#[cfg(feature = "x86")]
pub use x86_length::X86Sizeof;
#[cfg(feature = "x86")]
pub use x86_tables::X86Op;
