//! Thumb IT blocks.
//!
//! An `it` instruction predicates the next one to four instructions. Inside
//! a block the narrow data-processing encodings lose their flag-setting
//! behavior, so `adds` decodes as `add` and the block's condition becomes the
//! instruction's predicate.
//!
//! Decoding and encoding each keep a per-thread cursor keyed on addresses:
//! walking `it` and then its members at consecutive addresses predicates the
//! members. Decoding anything else closes the decode cursor. Decoding or
//! encoding the same address twice gives the same answer both times.

use crate::arm_tables::ArmOp;
use crate::instr::{Instr, Opcode, Predicate};
use crate::isa::IsaMode;
use crate::opnd::Operand;
use crate::size::OpSize;

/// The condition and mask of one `it` instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ItBlock {
    firstcond: u8,
    mask: u8,
}

impl ItBlock {
    /// A block from the `it` fields. `None` for a zero mask, a condition
    /// above `al`, or an `al` block with an else slot.
    pub fn new(firstcond: u8, mask: u8) -> Option<ItBlock> {
        if firstcond > 14 || mask == 0 || mask > 0xf {
            return None;
        }
        let block = ItBlock { firstcond, mask };
        if firstcond == 14 && (1..block.len()).any(|i| block.is_else(i)) {
            return None;
        }
        Some(block)
    }

    /// The block opened by a decoded or built `it`.
    pub fn from_instr(instr: &Instr<'_>) -> Option<ItBlock> {
        if instr.opcode() != Opcode::Arm(ArmOp::It) || instr.num_srcs() != 2 {
            return None;
        }
        let field = |op: Operand| match op {
            Operand::ImmInt { value, .. } => u8::try_from(value).ok(),
            _ => None,
        };
        ItBlock::new(field(instr.src(0))?, field(instr.src(1))?)
    }

    pub(crate) fn from_halfword(hw: u16) -> Option<ItBlock> {
        if hw & 0xff00 != 0xbf00 {
            return None;
        }
        ItBlock::new((hw >> 4) as u8 & 0xf, hw as u8 & 0xf)
    }

    /// The block predicating each of `members` in turn. All conditions must
    /// share their upper three bits.
    pub fn from_predicates(members: &[Predicate]) -> Option<ItBlock> {
        let (first, rest) = members.split_first()?;
        if rest.len() > 3 {
            return None;
        }
        let firstcond = first.arm_bits().filter(|c| *c < 15)?;
        let mut mask = 1u8 << (3 - rest.len());
        for (i, pred) in rest.iter().enumerate() {
            let cond = pred.arm_bits()?;
            if cond >> 1 != firstcond >> 1 {
                return None;
            }
            mask |= ((cond & 1) as u8) << (3 - i);
        }
        ItBlock::new(firstcond as u8, mask)
    }

    /// Condition of the first member.
    pub fn firstcond(&self) -> u8 {
        self.firstcond
    }

    /// Then/else bits and terminator, as encoded.
    pub fn mask(&self) -> u8 {
        self.mask
    }

    /// Instructions in the block, 1 to 4.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        4 - self.mask.trailing_zeros() as usize
    }

    /// Whether member `index` runs on the inverse condition.
    pub fn is_else(&self, index: usize) -> bool {
        index > 0 && index < 4 && (self.mask >> (4 - index)) & 1 != self.firstcond & 1
    }

    /// Predicate of member `index`.
    pub fn predicate(&self, index: usize) -> Option<Predicate> {
        if index >= self.len() {
            return None;
        }
        let low = if index == 0 {
            self.firstcond & 1
        } else {
            (self.mask >> (4 - index)) & 1
        };
        Some(Predicate::from_arm(u32::from(self.firstcond & 0xe | low)))
    }

    /// The `it` instruction opening this block.
    pub fn to_instr(&self) -> Instr<'static> {
        Instr::build(
            IsaMode::Thumb,
            Opcode::Arm(ArmOp::It),
            &[],
            &[
                Operand::imm_uint(u64::from(self.firstcond), OpSize::Bits(4)),
                Operand::imm_uint(u64::from(self.mask), OpSize::Bits(4)),
            ],
        )
    }
}

/// Position inside an open block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Cursor {
    block: ItBlock,
    /// Address and index of the member seen last.
    last: Option<(u64, u8)>,
    next_pc: u64,
    next: u8,
}

impl Cursor {
    fn open(block: ItBlock, it_pc: u64) -> Cursor {
        Cursor {
            block,
            last: None,
            next_pc: it_pc + 2,
            next: 0,
        }
    }

    fn member_at(&self, pc: u64) -> Option<u8> {
        match self.last {
            Some((at, index)) if at == pc => Some(index),
            _ => (pc == self.next_pc && usize::from(self.next) < self.block.len()).then_some(self.next),
        }
    }
}

/// Which cursor a lookup uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Walk {
    Decode,
    Encode,
}

#[cfg(feature = "std")]
mod state {
    use super::{Cursor, Walk};
    use core::cell::Cell;

    std::thread_local! {
        static DECODE: Cell<Option<Cursor>> = const { Cell::new(None) };
        static ENCODE: Cell<Option<Cursor>> = const { Cell::new(None) };
    }

    pub(super) fn get(walk: Walk) -> Option<Cursor> {
        match walk {
            Walk::Decode => DECODE.with(Cell::get),
            Walk::Encode => ENCODE.with(Cell::get),
        }
    }

    pub(super) fn set(walk: Walk, cursor: Option<Cursor>) {
        match walk {
            Walk::Decode => DECODE.with(|c| c.set(cursor)),
            Walk::Encode => ENCODE.with(|c| c.set(cursor)),
        }
    }
}

// Without std every instruction is walked outside any block.
#[cfg(not(feature = "std"))]
mod state {
    use super::{Cursor, Walk};

    pub(super) fn get(_walk: Walk) -> Option<Cursor> {
        None
    }

    pub(super) fn set(_walk: Walk, _cursor: Option<Cursor>) {}
}

/// Member index and predicate for an instruction at `pc`, if it sits in the
/// open block.
pub(crate) fn slot(walk: Walk, pc: u64) -> Option<(u8, Predicate)> {
    let cursor = state::get(walk)?;
    let index = cursor.member_at(pc)?;
    Some((index, cursor.block.predicate(usize::from(index))?))
}

/// Note the instruction just walked at `pc`: an `it` opens a block, a member
/// advances it.
pub(crate) fn record(walk: Walk, bytes: &[u8], pc: u64, member: Option<u8>) {
    if member.is_none() && bytes.len() == 2 {
        if let Some(block) = ItBlock::from_halfword(u16::from_le_bytes([bytes[0], bytes[1]])) {
            log::trace!("it block {:?} opened at 0x{:x}", block, pc);
            state::set(walk, Some(Cursor::open(block, pc)));
            return;
        }
    }
    match (state::get(walk), member) {
        (Some(mut cursor), Some(index)) => {
            cursor.last = Some((pc, index));
            cursor.next_pc = pc + bytes.len() as u64;
            cursor.next = index + 1;
            state::set(walk, Some(cursor));
        }
        (Some(_), None) if walk == Walk::Decode => state::set(walk, None),
        _ => {}
    }
}

pub(crate) fn reset(walk: Walk) {
    state::set(walk, None);
}

/// Forget any open IT block on this thread, for both decoding and encoding.
pub fn reset_it_state() {
    reset(Walk::Decode);
    reset(Walk::Encode);
}
