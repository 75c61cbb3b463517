#![cfg(not(target_arch = "wasm32"))]
//! Decode → encode round trips, one representative per addressing family.
//!
//! The raw bytes of every decoded instruction are invalidated before
//! encoding so the table-driven encoder, not the raw copy path, produces
//! the output.

use ir_codec::{
    decode, instr_encode, instr_encode_and_record, instr_encode_to_copy, instr_encode_with,
    instr_length, isa, Instr, InstrId, IrError, IsaMode, Operand,
};

// ─── Helpers ──────────────────────────────────────────────────────────────────

fn dis(mode: IsaMode, bytes: &[u8], pc: u64) -> Instr<'static> {
    isa::with_isa_mode(mode, || {
        let mut instr = Instr::new(mode);
        decode(bytes, pc, &mut instr).unwrap_or_else(|e| panic!("{mode}: {bytes:02x?}: {e}"));
        instr.into_static()
    })
}

fn reencode(mode: IsaMode, bytes: &[u8], pc: u64) -> Vec<u8> {
    let mut instr = dis(mode, bytes, pc);
    instr.set_raw_bits_valid(false);
    let mut buf = [0u8; 32];
    let next = instr_encode(&instr, &mut buf, pc)
        .unwrap_or_else(|e| panic!("{mode}: {bytes:02x?} ({}): {e}", instr.opcode()));
    buf[..(next - pc) as usize].to_vec()
}

fn check(mode: IsaMode, cases: &[(&str, &[u8])]) {
    for &(what, bytes) in cases {
        assert_eq!(reencode(mode, bytes, 0x1_0000), bytes, "{mode}: {what}");
    }
}

fn words(ws: &[u32]) -> Vec<[u8; 4]> {
    ws.iter().map(|w| w.to_le_bytes()).collect()
}

// ─── Per architecture ─────────────────────────────────────────────────────────

#[test]
#[cfg(feature = "arm")]
fn a32_families() {
    let ws = words(&[
        0xE283_3001, // add r3, r3, #1
        0xE081_0182, // add r0, r1, r2, lsl #3
        0xE091_0312, // adds r0, r1, r2, lsl r3
        0xE591_0004, // ldr r0, [r1, #4]
        0xE531_0004, // ldr r0, [r1, #-4]!
        0xE791_0102, // ldr r0, [r1, r2, lsl #2]
        0xE1C2_00D8, // ldrd r0, r1, [r2, #8]
        0xE92D_4010, // push {r4, lr}
        0xEB00_0000, // bl
        0x1A00_0004, // bne
        0xE12F_FF1E, // bx lr
        0xEE30_0A81, // vadd.f32 s0, s1, s2
        0xED91_0A01, // vldr s0, [r1, #4]
    ]);
    for w in &ws {
        assert_eq!(reencode(IsaMode::ArmA32, w, 0x8000), w, "{:02x?}", w);
    }
}

#[test]
#[cfg(feature = "arm")]
fn thumb_families() {
    check(
        IsaMode::Thumb,
        &[
            ("movs r0, #42", &[0x2a, 0x20]),
            ("adds r0, r1, r2", &[0x88, 0x18]),
            ("ldr r0, [r1, #4]", &[0x48, 0x68]),
            ("ldr r0, [r1, r2]", &[0x88, 0x58]),
            ("push {r0, r1, lr}", &[0x03, 0xb5]),
            ("pop {r0, r1, pc}", &[0x03, 0xbd]),
            ("cbz r2", &[0x1a, 0xb1]),
            ("bx lr", &[0x70, 0x47]),
            ("bl", &[0x00, 0xf0, 0xfe, 0xff]),
            ("ldr r0, [r1, #4]!", &[0x51, 0xf8, 0x04, 0x0f]),
            ("strb.w r8, [r1, #1]", &[0x81, 0xf8, 0x01, 0x80]),
            ("adds.w r8, r8, r1, lsl #2", &[0x18, 0xeb, 0x81, 0x08]),
            ("add.w r0, r1, #0x100", &[0x01, 0xf5, 0x80, 0x70]),
            ("movw r0, #0x1234", &[0x41, 0xf2, 0x34, 0x20]),
        ],
    );
}

#[test]
#[cfg(feature = "aarch64")]
fn aarch64_families() {
    let ws = words(&[
        0x9100_0420, // add x0, x1, #1
        0x8B02_0C20, // add x0, x1, x2, lsl #3
        0x9240_1C20, // and x0, x1, #0xff
        0xD2A2_4680, // movz x0, #0x1234, lsl #16
        0xF940_0420, // ldr x0, [x1, #8]
        0xB862_7820, // ldr w0, [x1, x2, lsl #2]
        0xA9BF_7BFD, // stp x29, x30, [sp, #-16]!
        0x5800_0040, // ldr x0, literal
        0x9400_0001, // bl
        0x5400_0040, // b.eq
        0xB400_0000, // cbz x0
        0xD65F_03C0, // ret
        0x1E62_2820, // fadd d0, d1, d2
        0xD53B_4200, // mrs x0, nzcv
    ]);
    for w in &ws {
        assert_eq!(reencode(IsaMode::Aarch64, w, 0x4000), w, "{:02x?}", w);
    }
}

#[test]
#[cfg(feature = "riscv")]
fn riscv_families() {
    let ws = words(&[
        0xfff5_8513, // addi a0, a1, -1
        0x8000_0537, // lui a0, 0x80000
        0x00c5_8533, // add a0, a1, a2
        0xff81_3503, // ld a0, -8(sp)
        0x0011_3423, // sd ra, 8(sp)
        0xfeb5_0ee3, // beq a0, a1, -4
        0x0010_00ef, // jal ra, +2048
        0x0000_8067, // ret
        0x0010_2573, // frflags a0
        0x02c5_f553, // fadd.d fa0, fa1, fa2
        0x06b6_252f, // amoadd.w.aqrl a0, a1, (a2)
    ]);
    for w in &ws {
        assert_eq!(reencode(IsaMode::Riscv64, w, 0x1_0000), w, "{:02x?}", w);
    }
    check(IsaMode::Riscv64, &[("c.addi a0, 1", &[0x05, 0x05])]);
}

#[test]
#[cfg(feature = "x86_64")]
fn x86_64_families() {
    check(
        IsaMode::Amd64,
        &[
            ("add rax, rbx", &[0x48, 0x01, 0xd8]),
            ("sub rsp, 0x28", &[0x48, 0x83, 0xec, 0x28]),
            ("mov eax, [rsp+8]", &[0x8b, 0x44, 0x24, 0x08]),
            ("lea r8, [rbx+rcx*4]", &[0x4c, 0x8d, 0x04, 0x8b]),
            ("mov rax, [rip+0x10]", &[0x48, 0x8b, 0x05, 0x10, 0, 0, 0]),
            ("mov rax, fs:[0x28]", &[0x64, 0x48, 0x8b, 0x04, 0x25, 0x28, 0, 0, 0]),
            ("push r12", &[0x41, 0x54]),
            ("call rel32", &[0xe8, 0, 0, 0, 0]),
            ("jne short", &[0x75, 0xfe]),
            ("jmp [rip]", &[0xff, 0x25, 0, 0x10, 0, 0]),
            ("rep movsb", &[0xf3, 0xa4]),
            ("sete al", &[0x0f, 0x94, 0xc0]),
        ],
    );
}

#[test]
#[cfg(feature = "x86")]
fn ia32_families() {
    check(
        IsaMode::Ia32,
        &[
            ("inc eax", &[0x40]),
            ("pop ebp", &[0x5d]),
            ("mov eax, [ebx+ecx*2+0x10]", &[0x8b, 0x44, 0x4b, 0x10]),
        ],
    );
}

// ─── Copies ───────────────────────────────────────────────────────────────────

#[test]
#[cfg(feature = "aarch64")]
fn branch_copied_elsewhere_keeps_its_target() {
    let bl = dis(IsaMode::Aarch64, &0x9400_0010u32.to_le_bytes(), 0x1000);
    let target = bl.src(0).pc_target();
    let mut buf = [0u8; 4];
    let next = instr_encode_to_copy(&bl, &mut buf, 0x9000, 0x2000).unwrap();
    assert_eq!(next, 0x9004);
    let moved = dis(IsaMode::Aarch64, &buf, 0x2000);
    assert_eq!(moved.src(0).pc_target(), target);
}

#[test]
#[cfg(feature = "x86_64")]
fn rip_relative_raw_copy_is_rerelativized() {
    let bytes = [0x48, 0x8b, 0x05, 0x10, 0x00, 0x00, 0x00];
    let mov = dis(IsaMode::Amd64, &bytes, 0x1000);
    assert!(mov.raw_bytes().is_some());
    let mut buf = [0u8; 16];
    let next = instr_encode_to_copy(&mov, &mut buf, 0x5000, 0x5000).unwrap();
    assert_eq!(next, 0x5007);
    let moved = dis(IsaMode::Amd64, &buf[..7], 0x5000);
    assert_eq!(moved.src(0), mov.src(0));
}

#[test]
#[cfg(feature = "riscv")]
fn raw_copy_in_place_is_verbatim() {
    let bytes = 0x00c5_8533u32.to_le_bytes();
    let add = dis(IsaMode::Riscv64, &bytes, 0x1000);
    let mut buf = [0u8; 4];
    instr_encode(&add, &mut buf, 0x1000).unwrap();
    assert_eq!(buf, bytes);
}

// ─── Other entry points ───────────────────────────────────────────────────────

#[test]
#[cfg(feature = "aarch64")]
fn instruction_references_resolve_at_encode_time() {
    let b = Instr::build(
        IsaMode::Aarch64,
        ir_codec::Opcode::A64(ir_codec::A64Op::B),
        &[],
        &[Operand::instr_ref(InstrId(7))],
    );
    let mut buf = [0u8; 4];
    assert_eq!(
        instr_encode(&b, &mut buf, 0x1000),
        Err(IrError::UnresolvedTarget)
    );
    let mut placed = |id: InstrId| (id == InstrId(7)).then_some(0x1010);
    instr_encode_with(&b, &mut buf, 0x1000, 0x1000, &mut placed).unwrap();
    assert_eq!(buf, 0x1400_0004u32.to_le_bytes());
}

#[test]
#[cfg(feature = "riscv")]
fn small_buffer_is_reported() {
    let add = dis(IsaMode::Riscv64, &0x00c5_8533u32.to_le_bytes(), 0x1000);
    let mut buf = [0u8; 2];
    assert_eq!(
        instr_encode(&add, &mut buf, 0x1000),
        Err(IrError::BufferTooSmall {
            needed: 4,
            available: 2
        })
    );
}

#[test]
#[cfg(feature = "arm")]
fn record_attaches_owned_bytes() {
    let mut mov = Instr::build(
        IsaMode::ArmA32,
        ir_codec::Opcode::Arm(ir_codec::ArmOp::Mov),
        &[Operand::reg(ir_codec::reg::arm::gpr(0))],
        &[Operand::imm_int(42, ir_codec::OpSize::B4)],
    );
    assert_eq!(mov.length(), None);
    assert_eq!(instr_length(&mov), Ok(4));
    let mut buf = [0u8; 4];
    assert_eq!(instr_encode_and_record(&mut mov, &mut buf, 0x8000), Ok(0x8004));
    assert_eq!(mov.raw_bytes(), Some(&0xE3A0_002Au32.to_le_bytes()[..]));
    assert_eq!(mov.raw_pc(), 0x8000);
}
