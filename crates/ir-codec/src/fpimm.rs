//! The 8-bit floating-point immediate shared by VFP `vmov` and A64 `fmov`.
//!
//! `imm8 = a:b:cdefgh` expands to sign `a`, an exponent of `NOT(b)` followed
//! by copies of `b`, and a fraction starting with `cdefgh`.

use crate::size::OpSize;

/// Expansion to half precision.
pub(crate) fn vfp_expand_f16(imm8: u32) -> u64 {
    let a = (imm8 >> 7) & 1;
    let b = (imm8 >> 6) & 1;
    let repl = if b == 1 { 3 } else { 0 };
    ((a << 15) | ((b ^ 1) << 14) | (repl << 12) | ((imm8 & 0x3f) << 6)) as u64
}

/// Expansion to single precision.
pub(crate) fn vfp_expand_f32(imm8: u32) -> u64 {
    let a = (imm8 >> 7) & 1;
    let b = (imm8 >> 6) & 1;
    let repl = if b == 1 { 0x1f } else { 0 };
    let bits = (a << 31) | ((b ^ 1) << 30) | (repl << 25) | ((imm8 & 0x3f) << 19);
    bits as u64
}

/// Expansion to double precision.
pub(crate) fn vfp_expand_f64(imm8: u32) -> u64 {
    let a = ((imm8 >> 7) & 1) as u64;
    let b = ((imm8 >> 6) & 1) as u64;
    let cdefgh = (imm8 & 0x3f) as u64;
    let repl = if b == 1 { 0xff } else { 0 };
    (a << 63) | ((b ^ 1) << 62) | (repl << 54) | (cdefgh << 48)
}

/// Expansion for a `size`-byte register (2, 4 or 8).
pub(crate) fn vfp_expand(imm8: u32, size: OpSize) -> u64 {
    match size {
        OpSize::B8 => vfp_expand_f64(imm8),
        OpSize::B2 => vfp_expand_f16(imm8),
        _ => vfp_expand_f32(imm8),
    }
}

/// The imm8 a float expands from, if it is representable.
pub(crate) fn vfp_compress(bits: u64, size: OpSize) -> Option<u32> {
    let imm8 = match size {
        OpSize::B2 => {
            if bits >> 16 != 0 {
                return None;
            }
            let h = bits as u32;
            (((h >> 15) & 1) << 7) | (((h >> 13) & 1) << 6) | ((h >> 6) & 0x3f)
        }
        OpSize::B4 => {
            let b = bits as u32;
            if bits >> 32 != 0 {
                return None;
            }
            (((b >> 31) & 1) << 7) | (((b >> 29) & 1) << 6) | ((b >> 19) & 0x3f)
        }
        OpSize::B8 => (((bits >> 63) & 1) << 7 | ((bits >> 61) & 1) << 6 | ((bits >> 48) & 0x3f)) as u32,
        _ => return None,
    };
    (vfp_expand(imm8, size) == bits).then_some(imm8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expansion_and_compression() {
        assert_eq!(vfp_expand_f32(0x70), 1.0f32.to_bits() as u64);
        assert_eq!(vfp_expand_f64(0x00), 2.0f64.to_bits());
        assert_eq!(vfp_compress(0.5f32.to_bits() as u64, OpSize::B4), Some(0x60));
        assert_eq!(vfp_compress(0.1f32.to_bits() as u64, OpSize::B4), None);
        assert_eq!(vfp_compress((-1.0f64).to_bits(), OpSize::B8), Some(0xf0));
        assert_eq!(vfp_expand_f16(0x70), 0x3c00);
    }

    #[test]
    fn every_imm8_survives_every_width() {
        for imm8 in 0..256 {
            for size in [OpSize::B2, OpSize::B4, OpSize::B8] {
                assert_eq!(vfp_compress(vfp_expand(imm8, size), size), Some(imm8));
            }
        }
    }
}
