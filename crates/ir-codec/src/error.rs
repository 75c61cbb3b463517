//! Error types for decode and encode failures.
//!
//! Only *expected* failures are reported through [`IrError`]: malformed or
//! architecturally undefined bytes, and operand values an encoder cannot
//! represent. Calling an accessor on the wrong operand kind or querying an
//! undecoded instruction is a programming error and panics instead.

use core::fmt;

use crate::instr::Opcode;
use crate::isa::IsaMode;

/// Decode/encode failure.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IrError {
    /// The byte window ended before the instruction did.
    Truncated {
        /// Bytes required to make progress.
        needed: usize,
        /// Bytes that were available.
        available: usize,
    },

    /// The bytes do not form a valid instruction for the mode.
    InvalidEncoding {
        /// ISA mode the decode ran in.
        mode: IsaMode,
        /// Address of the instruction.
        pc: u64,
        /// Instruction word (first bytes, little-endian, for x86).
        word: u32,
    },

    /// A table entry names an operand shape the resolver rejects for these bits.
    UnsupportedOperand {
        /// ISA mode the decode ran in.
        mode: IsaMode,
        /// Short description of the rejected field.
        what: &'static str,
    },

    /// Table resolution exceeded the architecture's hop bound.
    TableDepth {
        /// ISA mode the decode ran in.
        mode: IsaMode,
    },

    /// No table entry for the opcode accepts the instruction's operands.
    NoMatchingEncoding {
        /// Opcode that could not be encoded.
        opcode: Opcode,
    },

    /// An operand value does not fit the field of any candidate encoding.
    OperandOutOfRange {
        /// Opcode being encoded.
        opcode: Opcode,
        /// The value that did not fit.
        value: i64,
        /// Width of the field, in bits.
        bits: u8,
    },

    /// Operand combination forbidden by the architecture's addressing rules.
    IllegalOperand {
        /// Opcode being encoded.
        opcode: Opcode,
        /// What is illegal.
        reason: &'static str,
    },

    /// An instruction-reference operand had no address at encode time.
    UnresolvedTarget,

    /// The output buffer cannot hold the encoding.
    BufferTooSmall {
        /// Bytes required.
        needed: usize,
        /// Bytes available.
        available: usize,
    },

    /// The architecture for this mode was not compiled in.
    ModeUnavailable {
        /// The requested mode.
        mode: IsaMode,
    },

    /// The instruction has neither valid operands nor valid raw bytes.
    NotEncodable,
}

impl fmt::Display for IrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrError::Truncated { needed, available } => {
                write!(
                    f,
                    "truncated instruction: need {} bytes, have {}",
                    needed, available
                )
            }
            IrError::InvalidEncoding { mode, pc, word } => {
                write!(f, "invalid {} instruction 0x{:08x} at 0x{:x}", mode, word, pc)
            }
            IrError::UnsupportedOperand { mode, what } => {
                write!(f, "unsupported {} operand: {}", mode, what)
            }
            IrError::TableDepth { mode } => {
                write!(f, "{} decode table nesting exceeds its bound", mode)
            }
            IrError::NoMatchingEncoding { opcode } => {
                write!(f, "no encoding of '{}' matches the operands", opcode)
            }
            IrError::OperandOutOfRange {
                opcode,
                value,
                bits,
            } => {
                write!(
                    f,
                    "operand value {} does not fit a {}-bit field of '{}'",
                    value, bits, opcode
                )
            }
            IrError::IllegalOperand { opcode, reason } => {
                write!(f, "illegal operand for '{}': {}", opcode, reason)
            }
            IrError::UnresolvedTarget => write!(f, "instruction reference has no address"),
            IrError::BufferTooSmall { needed, available } => {
                write!(
                    f,
                    "output buffer too small: need {} bytes, have {}",
                    needed, available
                )
            }
            IrError::ModeUnavailable { mode } => {
                write!(f, "{} support is not compiled in", mode)
            }
            IrError::NotEncodable => write!(f, "instruction has no valid operands or raw bytes"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for IrError {}
