#![cfg(not(target_arch = "wasm32"))]
//! Regression tests for bug fixes.
//!
//! Each test documents a specific bug that was found and fixed, ensuring the
//! fix is never accidentally reverted.

use ir_codec::{
    decode, decode_from_copy, decode_next_pc, decode_raw, instr_encode, is_mov_constant, isa,
    Instr, IrError, IsaMode, OpSize, Opcode,
};
#[cfg(feature = "x86_64")]
use ir_codec::{reg::x86, Operand, X86Op};

fn dis(mode: IsaMode, bytes: &[u8], pc: u64) -> Instr<'static> {
    isa::with_isa_mode(mode, || {
        let mut instr = Instr::new(mode);
        decode(bytes, pc, &mut instr).unwrap_or_else(|e| panic!("{mode}: {bytes:02x?}: {e}"));
        instr.into_static()
    })
}

/// Regression: a Thumb copy lost the mode bit of the copy address, so the
/// next-pc pointed into A32 code.
#[test]
#[cfg(feature = "arm")]
fn thumb_copy_keeps_the_mode_bit() {
    let bytes = [0x2a, 0x20]; // movs r0, #42
    isa::with_isa_mode(IsaMode::ArmA32, || {
        let mut instr = Instr::new(IsaMode::ArmA32);
        let next = decode_from_copy(&bytes, 0x2001, 0x1001, &mut instr).unwrap();
        assert_eq!(next, 0x2003);
        assert_eq!(instr.isa_mode(), IsaMode::Thumb);
        assert_eq!(instr.translation(), Some(0x1000));
    });
}

/// Regression: `eor r0, r0, r0, lsl #1` was reported as a zeroing idiom
/// because the shift operands were ignored.
#[test]
#[cfg(feature = "arm")]
fn a32_shifted_self_xor_is_not_a_constant() {
    let plain = dis(IsaMode::ArmA32, &0xE020_0000u32.to_le_bytes(), 0x8000);
    assert_eq!(is_mov_constant(&plain), Some(0));
    let shifted = dis(IsaMode::ArmA32, &0xE020_0080u32.to_le_bytes(), 0x8000);
    assert_eq!(is_mov_constant(&shifted), None);
}

/// Regression: 32-bit AArch64 destinations were reported at 64-bit width.
#[test]
#[cfg(feature = "aarch64")]
fn aarch64_w_registers_are_four_bytes() {
    let add = dis(IsaMode::Aarch64, &0x1100_0420u32.to_le_bytes(), 0x1000); // add w0, w1, #1
    assert_eq!(add.dst(0).reg_id().size(), OpSize::B4);
    assert_eq!(add.src(0).reg_id().size(), OpSize::B4);
}

/// Regression: an instruction decoded only to its length, then modified,
/// was encoded as garbage instead of being refused.
#[test]
#[cfg(feature = "riscv")]
fn length_only_instruction_is_not_encodable() {
    let bytes = 0x00c5_8533u32.to_le_bytes();
    isa::with_isa_mode(IsaMode::Riscv64, || {
        let mut instr = Instr::new(IsaMode::Riscv64);
        decode_raw(&bytes, 0x1000, &mut instr).unwrap();
        assert_eq!(instr.opcode(), Opcode::Undecoded);
        instr.set_raw_bits_valid(false);
        let mut buf = [0u8; 4];
        assert_eq!(instr_encode(&instr, &mut buf, 0x1000), Err(IrError::NotEncodable));
    });
}

/// Regression: changing the opcode kept the stale raw bytes valid, so the
/// old encoding was copied out.
#[test]
#[cfg(feature = "riscv")]
fn changing_the_opcode_drops_the_raw_bytes() {
    let mut beq = dis(IsaMode::Riscv64, &0xfeb5_0ee3u32.to_le_bytes(), 0x1000);
    assert!(beq.raw_bytes().is_some());
    beq.set_opcode(Opcode::Rv(ir_codec::RvOp::Bne));
    assert_eq!(beq.raw_bytes(), None);
    let mut buf = [0u8; 4];
    instr_encode(&beq, &mut buf, 0x1000).unwrap();
    assert_eq!(u32::from_le_bytes(buf), 0xfeb5_1ee3);
}

/// Regression: compressed instructions advanced the pc by four.
#[test]
#[cfg(feature = "riscv")]
fn compressed_next_pc_is_two_bytes_on() {
    isa::with_isa_mode(IsaMode::Riscv64, || {
        assert_eq!(decode_next_pc(&[0x05, 0x05], 0x1000), Ok(0x1002));
        assert_eq!(decode_next_pc(&0x00c5_8533u32.to_le_bytes(), 0x1000), Ok(0x1004));
    });
}

/// Regression: the REX prefix was counted into the rip-relative offset twice.
#[test]
#[cfg(feature = "x86_64")]
fn rip_relative_offset_counts_rex_once() {
    let s = ir_codec::decode_sizeof(&[0x48, 0x8b, 0x05, 0x10, 0, 0, 0], IsaMode::Amd64).unwrap();
    assert_eq!(s.length, 7);
    assert_eq!(s.num_prefixes, 1);
    assert_eq!(s.rip_rel_pos, Some(3));
}

/// Regression: a failed decode left the previous instruction's operands
/// behind.
#[test]
#[cfg(feature = "aarch64")]
fn failed_decode_clears_operands() {
    isa::with_isa_mode(IsaMode::Aarch64, || {
        let good = 0x9100_0420u32.to_le_bytes();
        let bad = [0u8; 4];
        let mut instr = Instr::new(IsaMode::Aarch64);
        decode(&good, 0x1000, &mut instr).unwrap();
        assert_eq!(instr.num_srcs(), 2);
        assert!(decode(&bad, 0x1004, &mut instr).is_err());
        assert_eq!(instr.opcode(), Opcode::Invalid);
        assert_eq!(instr.num_srcs(), 0);
        assert_eq!(instr.num_dsts(), 0);
    });
}

/// Regression: a 64-bit immediate that does not fit 32 bits was rejected by
/// the width check instead of selecting `mov r64, imm64`.
#[test]
#[cfg(feature = "x86_64")]
fn mov_imm64_keeps_all_eight_bytes() {
    let mov = Instr::build(
        IsaMode::Amd64,
        Opcode::X86(X86Op::Mov),
        &[Operand::reg(x86::RAX)],
        &[Operand::imm_int(0x1_0000_0000, OpSize::B8)],
    );
    let mut buf = [0u8; 16];
    let next = instr_encode(&mov, &mut buf, 0x1000).unwrap();
    assert_eq!(&buf[..(next - 0x1000) as usize], &[0x48, 0xb8, 0, 0, 0, 0, 1, 0, 0, 0]);

    let back = dis(IsaMode::Amd64, &buf[..10], 0x1000);
    assert_eq!(back.opcode(), Opcode::X86(X86Op::Mov));
    assert_eq!(back.src(0), Operand::imm_int(0x1_0000_0000, OpSize::B8));
}

/// Regression: string moves and compares re-encoded at one width whatever
/// their decoded operand size.
#[test]
#[cfg(all(feature = "x86", feature = "x86_64"))]
fn string_ops_reencode_at_their_width() {
    let cases: &[(IsaMode, &[u8])] = &[
        (IsaMode::Amd64, &[0xa4]),
        (IsaMode::Amd64, &[0xa5]),
        (IsaMode::Amd64, &[0x66, 0xa5]),
        (IsaMode::Amd64, &[0x48, 0xa5]),
        (IsaMode::Amd64, &[0xa6]),
        (IsaMode::Amd64, &[0xa7]),
        (IsaMode::Amd64, &[0x66, 0xa7]),
        (IsaMode::Amd64, &[0x48, 0xa7]),
        (IsaMode::Ia32, &[0xf3, 0xa5]),
    ];
    for &(mode, bytes) in cases {
        let mut instr = dis(mode, bytes, 0x1000);
        instr.set_raw_bits_valid(false);
        let mut buf = [0u8; 16];
        let next = isa::with_isa_mode(mode, || instr_encode(&instr, &mut buf, 0x1000))
            .unwrap_or_else(|e| panic!("{bytes:02x?}: {e}"));
        assert_eq!(&buf[..(next - 0x1000) as usize], bytes, "{}", instr.opcode());
    }
}
