//! Abstract operand size tags.

use core::fmt;

use crate::isa::IsaMode;

/// Size tag carried by every operand and by every table slot.
///
/// The tag is independent of the operand kind: the same register can appear
/// at several widths, the same memory template can describe loads of any
/// size. Variable tags resolve against an [`IsaMode`] default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OpSize {
    /// No size; for registers, the register's natural width.
    #[default]
    None,
    /// Sub-byte field width in bits (1..=31).
    Bits(u8),
    /// 1 byte.
    B1,
    /// 2 bytes.
    B2,
    /// 4 bytes.
    B4,
    /// 6 bytes (far pointer with 32-bit offset).
    B6,
    /// 8 bytes.
    B8,
    /// 10 bytes (x87 extended precision, far pointer with 64-bit offset).
    B10,
    /// 12 bytes.
    B12,
    /// 16 bytes.
    B16,
    /// 28 bytes (x87 environment).
    B28,
    /// 32 bytes.
    B32,
    /// 64 bytes.
    B64,
    /// 94 bytes (16-bit x87 state).
    B94,
    /// 108 bytes (x87 state).
    B108,
    /// 512 bytes (`fxsave` area).
    B512,
    /// x86 operand-size dependent: 2, 4 or 8 bytes.
    V,
    /// x86 operand-size dependent: 2 or 4 bytes.
    Z,
    /// x86 operand-size dependent: 4 or 8 bytes.
    Y,
    /// Pointer / address sized.
    P,
    /// Sized by the register list of the same instruction.
    RegList,
}

impl OpSize {
    /// Concrete byte count.
    ///
    /// Sub-byte widths round up. Variable tags use the mode's default
    /// operand and pointer sizes; a register list falls back to one slot.
    pub fn size_in_bytes(self, mode: IsaMode) -> usize {
        match self {
            OpSize::None => 0,
            OpSize::Bits(n) => (n as usize).div_ceil(8),
            OpSize::B1 => 1,
            OpSize::B2 => 2,
            OpSize::B4 => 4,
            OpSize::B6 => 6,
            OpSize::B8 => 8,
            OpSize::B10 => 10,
            OpSize::B12 => 12,
            OpSize::B16 => 16,
            OpSize::B28 => 28,
            OpSize::B32 => 32,
            OpSize::B64 => 64,
            OpSize::B94 => 94,
            OpSize::B108 => 108,
            OpSize::B512 => 512,
            OpSize::V | OpSize::Z => 4,
            OpSize::Y | OpSize::P => mode.pointer_size(),
            OpSize::RegList => mode.pointer_size(),
        }
    }

    /// Width in bits, or 0 for variable and empty tags.
    pub fn size_in_bits(self) -> u32 {
        match self {
            OpSize::Bits(n) => n as u32,
            OpSize::None | OpSize::V | OpSize::Z | OpSize::Y | OpSize::P | OpSize::RegList => 0,
            fixed => fixed.size_in_bytes(IsaMode::Amd64) as u32 * 8,
        }
    }

    /// Fixed tag for a byte count, if one exists.
    pub fn from_bytes(n: usize) -> Option<OpSize> {
        Some(match n {
            0 => OpSize::None,
            1 => OpSize::B1,
            2 => OpSize::B2,
            4 => OpSize::B4,
            6 => OpSize::B6,
            8 => OpSize::B8,
            10 => OpSize::B10,
            12 => OpSize::B12,
            16 => OpSize::B16,
            28 => OpSize::B28,
            32 => OpSize::B32,
            64 => OpSize::B64,
            94 => OpSize::B94,
            108 => OpSize::B108,
            512 => OpSize::B512,
            _ => return None,
        })
    }

    /// Whether the concrete size depends on context outside the operand.
    pub fn is_variable(self) -> bool {
        matches!(
            self,
            OpSize::V | OpSize::Z | OpSize::Y | OpSize::P | OpSize::RegList
        )
    }

    /// Resolve an x86 variable tag against explicit operand/address sizes.
    pub(crate) fn resolve_x86(self, data16: bool, rex_w: bool, x64: bool) -> OpSize {
        match self {
            OpSize::V if rex_w => OpSize::B8,
            OpSize::V | OpSize::Z if data16 => OpSize::B2,
            OpSize::V | OpSize::Z => OpSize::B4,
            OpSize::Y if rex_w => OpSize::B8,
            OpSize::Y => OpSize::B4,
            OpSize::P if x64 => OpSize::B8,
            OpSize::P => OpSize::B4,
            other => other,
        }
    }
}

impl fmt::Display for OpSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpSize::None => write!(f, "none"),
            OpSize::Bits(n) => write!(f, "{}b", n),
            OpSize::V => write!(f, "v"),
            OpSize::Z => write!(f, "z"),
            OpSize::Y => write!(f, "y"),
            OpSize::P => write!(f, "p"),
            OpSize::RegList => write!(f, "reglist"),
            fixed => write!(f, "{}", fixed.size_in_bytes(IsaMode::Amd64)),
        }
    }
}
