//! Decoder entry points.
//!
//! Every entry point decodes in the calling thread's [`IsaMode`] (see
//! [`crate::isa`]); on 32-bit ARM an address with its low bit set selects
//! Thumb regardless of the thread mode. Failures leave the instruction with
//! [`Opcode::Invalid`] and no operands.
//!
//! Thumb decoding (other than [`decode_raw`]) follows the thread's IT-block
//! cursor: decoding an `it` and then the instructions at the following
//! addresses predicates them (see [`crate::it_block`]).

use crate::error::IrError;
use crate::instr::{Eflags, Instr, Opcode, OperandList, Predicate};
use crate::isa::{self, Arch, IsaMode};
#[cfg(feature = "arm")]
use crate::it_block::{self, Walk};
use crate::table::{extras, Dir, Layout, OpInfo, Slot};

/// How far a decode goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Level {
    /// Length only.
    Raw,
    /// Opcode, predicate and status flags.
    Opcode,
    /// Everything, operands included.
    Full,
}

/// Record a resolved terminal on `instr`, filling operands when `full`.
///
/// `operand` expands one slot into zero or more operands (a register list
/// slot expands to one register per set bit).
pub(crate) fn apply_entry<L: Layout>(
    instr: &mut Instr<'_>,
    info: &OpInfo<L>,
    predicate: Predicate,
    level: Level,
    mut operand: impl FnMut(Slot<L::Ty>, &mut OperandList) -> Result<(), IrError>,
) -> Result<(), IrError> {
    instr.set_opcode_decoded(info.opcode);
    instr.set_predicate_decoded(predicate);
    let mut eflags = info.eflags;
    if predicate.is_conditional() {
        eflags = eflags.union(predicate.reads());
    }
    instr.set_eflags(eflags);
    if level != Level::Full {
        return Ok(());
    }
    let mut out = OperandList::new();
    for (slot, dir) in info.slots().chain(extras(info).flat_map(|e| e.slots())) {
        out.clear();
        operand(slot, &mut out)?;
        for op in out.as_slice() {
            instr.push_decoded(dir == Dir::Dst, *op)?;
        }
    }
    instr.set_operands_valid(true);
    Ok(())
}

/// Decode `bytes` in an explicit mode; pc-relative operands resolve against
/// `pc`. Returns the instruction length. No diagnostics, no raw-byte
/// bookkeeping.
pub(crate) fn decode_in<'a>(
    mode: IsaMode,
    bytes: &'a [u8],
    pc: u64,
    instr: &mut Instr<'a>,
    level: Level,
) -> Result<usize, IrError> {
    decode_in_block(mode, bytes, pc, instr, level, None)
}

/// [`decode_in`] with the predicate of the IT block a Thumb instruction
/// sits in.
#[cfg_attr(not(feature = "arm"), allow(unused_variables))]
pub(crate) fn decode_in_block<'a>(
    mode: IsaMode,
    bytes: &'a [u8],
    pc: u64,
    instr: &mut Instr<'a>,
    level: Level,
    it: Option<Predicate>,
) -> Result<usize, IrError> {
    instr.set_isa_mode(mode);
    instr.clear_operands();
    let len = match mode {
        #[cfg(feature = "x86")]
        IsaMode::Ia32 | IsaMode::Amd64 => crate::x86::decode(mode, bytes, pc, instr, level)?,
        #[cfg(feature = "arm")]
        IsaMode::ArmA32 => crate::arm::decode(bytes, pc, instr, level)?,
        #[cfg(feature = "arm")]
        IsaMode::Thumb => crate::thumb::decode_in_block(bytes, pc, instr, level, it)?,
        #[cfg(feature = "aarch64")]
        IsaMode::Aarch64 => crate::aarch64::decode(bytes, pc, instr, level)?,
        #[cfg(feature = "riscv")]
        IsaMode::Riscv64 => crate::riscv::decode(bytes, pc, instr, level)?,
        #[allow(unreachable_patterns)]
        mode => return Err(IrError::ModeUnavailable { mode }),
    };
    instr.set_raw_bytes(&bytes[..len], pc);
    Ok(len)
}

/// Thread mode, switched to Thumb for odd ARM addresses; the bit is stripped.
fn effective_mode(pc: u64) -> (IsaMode, u64, u64) {
    let mode = isa::isa_mode();
    if mode.arch() == Arch::Arm && pc & 1 == 1 {
        (IsaMode::Thumb, pc & !1, 1)
    } else {
        (mode, pc, 0)
    }
}

fn decode_common<'a>(
    bytes: &'a [u8],
    copy_pc: u64,
    orig_pc: u64,
    instr: &mut Instr<'a>,
    level: Level,
) -> Result<u64, IrError> {
    let (mode, orig, thumb_bit) = effective_mode(orig_pc | (copy_pc & 1));
    let copy = copy_pc & !thumb_bit;
    instr.reset();
    let decoded = match mode {
        #[cfg(feature = "arm")]
        IsaMode::Thumb if level != Level::Raw => decode_tracked(bytes, orig, instr, level),
        _ => decode_in(mode, bytes, orig, instr, level),
    };
    match decoded {
        Ok(len) => {
            instr.set_raw_bytes(&bytes[..len], copy);
            if copy != orig {
                instr.set_raw_bits_valid(false);
                instr.set_translation(Some(orig));
            }
            if level == Level::Raw {
                instr.set_opcode_decoded(Opcode::Undecoded);
            }
            Ok((copy + len as u64) | thumb_bit)
        }
        Err(err) => {
            instr.reset();
            instr.set_isa_mode(mode);
            instr.set_opcode_decoded(Opcode::Invalid);
            if !isa::is_engine_address(orig) {
                log::debug!("decode failed at 0x{:x}: {}", orig, err);
            }
            Err(err)
        }
    }
}

/// Thumb decode through the thread's IT-block cursor.
#[cfg(feature = "arm")]
fn decode_tracked<'a>(bytes: &'a [u8], pc: u64, instr: &mut Instr<'a>, level: Level) -> Result<usize, IrError> {
    let slot = it_block::slot(Walk::Decode, pc);
    match decode_in_block(IsaMode::Thumb, bytes, pc, instr, level, slot.map(|s| s.1)) {
        Ok(len) => {
            it_block::record(Walk::Decode, &bytes[..len], pc, slot.map(|s| s.0));
            Ok(len)
        }
        Err(err) => {
            it_block::reset(Walk::Decode);
            Err(err)
        }
    }
}

/// Decode just enough to know the opcode, predicate and status-flag usage.
/// Returns the address of the next instruction.
pub fn decode_opcode<'a>(bytes: &'a [u8], pc: u64, instr: &mut Instr<'a>) -> Result<u64, IrError> {
    decode_common(bytes, pc, pc, instr, Level::Opcode)
}

/// Fully decode one instruction. Returns the address of the next instruction.
pub fn decode<'a>(bytes: &'a [u8], pc: u64, instr: &mut Instr<'a>) -> Result<u64, IrError> {
    decode_common(bytes, pc, pc, instr, Level::Full)
}

/// Determine only the instruction length and record the raw span; the opcode
/// stays [`Opcode::Undecoded`].
pub fn decode_raw<'a>(bytes: &'a [u8], pc: u64, instr: &mut Instr<'a>) -> Result<u64, IrError> {
    decode_common(bytes, pc, pc, instr, Level::Raw)
}

/// Fully decode bytes read from a copy at `copy_pc` as if they lived at
/// `orig_pc`. Returns the address after the copy.
pub fn decode_from_copy<'a>(
    bytes: &'a [u8],
    copy_pc: u64,
    orig_pc: u64,
    instr: &mut Instr<'a>,
) -> Result<u64, IrError> {
    decode_common(bytes, copy_pc, orig_pc, instr, Level::Full)
}

/// Address of the instruction following the one at `pc`.
pub fn decode_next_pc(bytes: &[u8], pc: u64) -> Result<u64, IrError> {
    let mut scratch = Instr::new(isa::isa_mode());
    decode_common(bytes, pc, pc, &mut scratch, Level::Raw)
}

/// x86 length details of the instruction at the start of `bytes`.
#[cfg(feature = "x86")]
pub fn decode_sizeof(bytes: &[u8], mode: IsaMode) -> Result<crate::x86_length::X86Sizeof, IrError> {
    crate::x86_length::sizeof(bytes, mode)
}

/// Status-flag usage and default predicate of `opcode`'s first encoding.
pub(crate) fn opcode_defaults(mode: IsaMode, opcode: Opcode) -> Option<(Eflags, Predicate)> {
    match (mode, opcode) {
        #[cfg(feature = "x86")]
        (IsaMode::Ia32 | IsaMode::Amd64, Opcode::X86(_)) => crate::x86::defaults(opcode),
        #[cfg(feature = "arm")]
        (IsaMode::ArmA32, Opcode::Arm(_)) => crate::arm::defaults(opcode),
        #[cfg(feature = "arm")]
        (IsaMode::Thumb, Opcode::Arm(_)) => crate::thumb::defaults(opcode),
        #[cfg(feature = "aarch64")]
        (IsaMode::Aarch64, Opcode::A64(_)) => crate::aarch64::defaults(opcode),
        #[cfg(feature = "riscv")]
        (IsaMode::Riscv64, Opcode::Rv(_)) => crate::riscv::defaults(opcode),
        _ => None,
    }
}

/// Read a little-endian word, or report how much was missing.
pub(crate) fn read_u32(bytes: &[u8]) -> Result<u32, IrError> {
    match bytes.get(..4) {
        Some(b) => Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]])),
        None => Err(IrError::Truncated {
            needed: 4,
            available: bytes.len(),
        }),
    }
}

/// Read a little-endian halfword.
pub(crate) fn read_u16(bytes: &[u8]) -> Result<u16, IrError> {
    match bytes.get(..2) {
        Some(b) => Ok(u16::from_le_bytes([b[0], b[1]])),
        None => Err(IrError::Truncated {
            needed: 2,
            available: bytes.len(),
        }),
    }
}

/// Sign-extend the low `bits` bits of `value`.
pub(crate) fn sext(value: u32, bits: u32) -> i64 {
    let shift = 64 - bits;
    (((value as u64) << shift) as i64) >> shift
}
