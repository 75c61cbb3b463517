#![cfg(not(target_arch = "wasm32"))]
//! Property-based tests using proptest.
//!
//! Random instruction bytes exercise the decoder well beyond the curated
//! cases: no input may panic, failures leave the instruction invalid, and
//! whatever decodes must decode the same way twice and copy back verbatim.
//! Rebuilding a decoded instruction from its operands and encoding it must
//! give bytes that decode to the same operation with the same operands.

use ir_codec::{decode, decode_opcode, decode_raw, instr_encode, isa, Instr, IsaMode, Opcode};
use proptest::prelude::*;

const PC: u64 = 0x10_0000;

// ── Strategies ──────────────────────────────────────────────────────────

/// Arbitrary 32-bit instruction words.
fn arb_word() -> impl Strategy<Value = [u8; 4]> {
    any::<u32>().prop_map(u32::to_le_bytes)
}

/// Arbitrary byte windows up to one maximal x86 instruction.
fn arb_window() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=15)
}

/// x86 windows that start with a common prefix or opcode-map escape.
fn arb_x86_window() -> impl Strategy<Value = Vec<u8>> {
    (
        prop::sample::select(vec![
            vec![],
            vec![0x48],
            vec![0x66],
            vec![0xf3],
            vec![0x0f],
            vec![0x41, 0x0f],
            vec![0xf2, 0x0f],
            vec![0x64, 0x48],
        ]),
        prop::collection::vec(any::<u8>(), 1..=12),
    )
        .prop_map(|(mut head, tail)| {
            head.extend(tail);
            head
        })
}

// ── Properties ──────────────────────────────────────────────────────────

/// Decode `bytes` fully and check the shared invariants. Returns the
/// decoded length on success.
fn check_decode(mode: IsaMode, bytes: &[u8]) -> Result<Option<usize>, TestCaseError> {
    isa::with_isa_mode(mode, || {
        let mut instr = Instr::new(mode);
        let Ok(next) = decode(bytes, PC, &mut instr) else {
            prop_assert_eq!(instr.opcode(), Opcode::Invalid);
            return Ok(None);
        };
        let len = (next - PC) as usize;
        prop_assert!(len >= 1 && len <= bytes.len());
        prop_assert_eq!(instr.length(), Some(len));
        prop_assert!(instr.opcode().is_real());
        prop_assert!(instr.operands_valid());

        // Same bytes, same instruction.
        let mut again = Instr::new(mode);
        prop_assert_eq!(decode(bytes, PC, &mut again), Ok(next));
        prop_assert_eq!(again.opcode(), instr.opcode());
        prop_assert_eq!(again.dsts(), instr.dsts());
        prop_assert_eq!(again.srcs(), instr.srcs());
        prop_assert_eq!(again.predicate(), instr.predicate());

        // Opcode-depth decoding agrees with full decoding.
        let mut shallow = Instr::new(mode);
        prop_assert_eq!(decode_opcode(bytes, PC, &mut shallow), Ok(next));
        prop_assert_eq!(shallow.opcode(), instr.opcode());

        // Raw bytes copy back unchanged at the same address.
        let mut out = vec![0u8; len];
        prop_assert_eq!(instr_encode(&instr, &mut out, PC), Ok(next));
        prop_assert_eq!(&out[..], &bytes[..len]);

        check_rebuild(mode, &instr)?;
        Ok(Some(len))
    })
}

/// Encode a fresh copy of `instr` built from its operands, then decode the
/// result. Operands compare with their sizes.
fn check_rebuild(mode: IsaMode, instr: &Instr<'_>) -> Result<(), TestCaseError> {
    let mut fresh = Instr::build(mode, instr.opcode(), instr.dsts(), instr.srcs());
    fresh.set_predicate(instr.predicate());
    fresh.set_prefixes(instr.prefixes());
    let mut out = [0u8; 16];
    let Ok(next) = instr_encode(&fresh, &mut out, PC) else {
        return Ok(());
    };
    let len = (next - PC) as usize;
    let mut back = Instr::new(mode);
    prop_assert_eq!(decode(&out[..len], PC, &mut back), Ok(next), "{} -> {:02x?}", instr.opcode(), &out[..len]);
    prop_assert_eq!(back.opcode(), instr.opcode());
    prop_assert_eq!(back.dsts(), instr.dsts(), "{:02x?}", &out[..len]);
    prop_assert_eq!(back.srcs(), instr.srcs(), "{:02x?}", &out[..len]);
    prop_assert_eq!(back.predicate(), instr.predicate());
    Ok(())
}

/// For fixed-length encodings the length-only decoder sees the same size.
fn check_raw_length(mode: IsaMode, bytes: &[u8], len: usize) -> Result<(), TestCaseError> {
    isa::with_isa_mode(mode, || {
        let mut raw = Instr::new(mode);
        prop_assert_eq!(decode_raw(bytes, PC, &mut raw), Ok(PC + len as u64));
        Ok(())
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(2048))]

    #[test]
    #[cfg(feature = "arm")]
    fn a32_random_words(bytes in arb_word()) {
        if let Some(len) = check_decode(IsaMode::ArmA32, &bytes)? {
            prop_assert_eq!(len, 4);
            check_raw_length(IsaMode::ArmA32, &bytes, len)?;
        }
    }

    #[test]
    #[cfg(feature = "arm")]
    fn thumb_random_halfwords(bytes in arb_word()) {
        if let Some(len) = check_decode(IsaMode::Thumb, &bytes)? {
            prop_assert!(len == 2 || len == 4);
            check_raw_length(IsaMode::Thumb, &bytes, len)?;
        }
    }

    #[test]
    #[cfg(feature = "aarch64")]
    fn aarch64_random_words(bytes in arb_word()) {
        if let Some(len) = check_decode(IsaMode::Aarch64, &bytes)? {
            prop_assert_eq!(len, 4);
            check_raw_length(IsaMode::Aarch64, &bytes, len)?;
        }
    }

    #[test]
    #[cfg(feature = "riscv")]
    fn riscv_random_words(bytes in arb_word()) {
        if let Some(len) = check_decode(IsaMode::Riscv64, &bytes)? {
            prop_assert!(len == 2 || len == 4);
            check_raw_length(IsaMode::Riscv64, &bytes, len)?;
        }
    }

    #[test]
    #[cfg(feature = "x86_64")]
    fn x86_64_random_windows(bytes in arb_x86_window()) {
        if let Some(len) = check_decode(IsaMode::Amd64, &bytes)? {
            prop_assert!(len <= 15);
        }
    }

    #[test]
    #[cfg(feature = "x86")]
    fn ia32_random_windows(bytes in arb_window()) {
        if let Some(len) = check_decode(IsaMode::Ia32, &bytes)? {
            prop_assert!(len <= 15);
        }
    }

    #[test]
    #[cfg(feature = "riscv")]
    fn short_windows_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..4)) {
        check_decode(IsaMode::Riscv64, &bytes)?;
        #[cfg(feature = "aarch64")]
        check_decode(IsaMode::Aarch64, &bytes)?;
    }
}
