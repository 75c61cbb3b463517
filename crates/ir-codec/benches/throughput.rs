//! Performance benchmarks for `ir_codec`.
//!
//! Measures:
//! - Single instruction decode latency at each decode depth
//! - Linear decode throughput over instruction streams (bytes/s)
//! - Encoding from operands and raw-copy relocation
//! - Classification over a decoded block
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use ir_codec::{
    decode, decode_opcode, decode_raw, instr_encode, instr_encode_to_copy, is_cti, isa, Instr,
    IsaMode,
};

// ─── Streams ─────────────────────────────────────────────────────────────────

/// Repeat a block of encodings until the stream holds `n` instructions.
fn stream(block: &[&[u8]], n: usize) -> Vec<u8> {
    block.iter().cycle().take(n).flat_map(|b| b.iter().copied()).collect()
}

fn words(ws: &[u32]) -> Vec<[u8; 4]> {
    ws.iter().map(|w| w.to_le_bytes()).collect()
}

const X86_64_BLOCK: &[&[u8]] = &[
    &[0x55],                         // push rbp
    &[0x48, 0x89, 0xe5],             // mov rbp, rsp
    &[0x48, 0x83, 0xec, 0x28],       // sub rsp, 0x28
    &[0x8b, 0x44, 0x24, 0x08],       // mov eax, [rsp+8]
    &[0x4c, 0x8d, 0x04, 0x8b],       // lea r8, [rbx+rcx*4]
    &[0x48, 0x8b, 0x05, 0x10, 0, 0, 0], // mov rax, [rip+0x10]
    &[0x31, 0xc0],                   // xor eax, eax
    &[0x75, 0x02],                   // jne +2
    &[0xe8, 0, 0, 0, 0],             // call
    &[0xc9],                         // leave
    &[0xc3],                         // ret
];

const AARCH64_WORDS: &[u32] = &[
    0xA9BF_7BFD, // stp x29, x30, [sp, #-16]!
    0x9100_0420, // add x0, x1, #1
    0xF940_0420, // ldr x0, [x1, #8]
    0x8B02_0C20, // add x0, x1, x2, lsl #3
    0xB400_0000, // cbz x0
    0x9400_0001, // bl
    0xD65F_03C0, // ret
];

const A32_WORDS: &[u32] = &[
    0xE92D_4010, // push {r4, lr}
    0xE283_3001, // add r3, r3, #1
    0xE591_0004, // ldr r0, [r1, #4]
    0xE081_0182, // add r0, r1, r2, lsl #3
    0x1A00_0004, // bne
    0xE12F_FF1E, // bx lr
];

const RISCV_BLOCK: &[&[u8]] = &[
    &[0x13, 0x01, 0x01, 0xff], // addi sp, sp, -16
    &[0x23, 0x34, 0x11, 0x00], // sd ra, 8(sp)
    &[0x05, 0x05],             // c.addi a0, 1
    &[0x33, 0x85, 0xc5, 0x00], // add a0, a1, a2
    &[0xe3, 0x0e, 0xb5, 0xfe], // beq a0, a1, -4
    &[0x82, 0x80],             // c.jr ra
];

fn decode_all(mode: IsaMode, bytes: &[u8]) -> usize {
    isa::with_isa_mode(mode, || {
        let mut pc = 0x1000u64;
        let mut count = 0;
        let mut off = 0;
        while off < bytes.len() {
            let mut instr = Instr::new(mode);
            let next = decode(&bytes[off..], pc, &mut instr).unwrap();
            off += (next - pc) as usize;
            pc = next;
            count += 1;
        }
        count
    })
}

// ─── Single-Instruction Latency ──────────────────────────────────────────────

fn bench_single_instruction(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_instruction");
    let lea: &[u8] = &[0x4c, 0x8d, 0x04, 0x8b];
    let stp = 0xA9BF_7BFDu32.to_le_bytes();

    isa::with_isa_mode(IsaMode::Amd64, || {
        group.bench_function("x86_64_lea_raw", |b| {
            b.iter(|| {
                let mut instr = Instr::new(IsaMode::Amd64);
                decode_raw(black_box(lea), 0x1000, &mut instr).unwrap()
            })
        });
        group.bench_function("x86_64_lea_opcode", |b| {
            b.iter(|| {
                let mut instr = Instr::new(IsaMode::Amd64);
                decode_opcode(black_box(lea), 0x1000, &mut instr).unwrap()
            })
        });
        group.bench_function("x86_64_lea_full", |b| {
            b.iter(|| {
                let mut instr = Instr::new(IsaMode::Amd64);
                decode(black_box(lea), 0x1000, &mut instr).unwrap()
            })
        });
    });

    isa::with_isa_mode(IsaMode::Aarch64, || {
        group.bench_function("aarch64_stp_full", |b| {
            b.iter(|| {
                let mut instr = Instr::new(IsaMode::Aarch64);
                decode(black_box(&stp), 0x1000, &mut instr).unwrap()
            })
        });
    });

    group.finish();
}

// ─── Decode Throughput ───────────────────────────────────────────────────────

fn bench_decode_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_throughput");

    let x64 = stream(X86_64_BLOCK, 1000);
    group.throughput(Throughput::Bytes(x64.len() as u64));
    group.bench_function("x86_64_1000_insn", |b| {
        b.iter(|| decode_all(IsaMode::Amd64, black_box(&x64)))
    });

    let a64_words = words(AARCH64_WORDS);
    let a64_block: Vec<&[u8]> = a64_words.iter().map(|w| &w[..]).collect();
    let a64 = stream(&a64_block, 1000);
    group.throughput(Throughput::Bytes(a64.len() as u64));
    group.bench_function("aarch64_1000_insn", |b| {
        b.iter(|| decode_all(IsaMode::Aarch64, black_box(&a64)))
    });

    let a32_words = words(A32_WORDS);
    let a32_block: Vec<&[u8]> = a32_words.iter().map(|w| &w[..]).collect();
    let a32 = stream(&a32_block, 1000);
    group.throughput(Throughput::Bytes(a32.len() as u64));
    group.bench_function("a32_1000_insn", |b| {
        b.iter(|| decode_all(IsaMode::ArmA32, black_box(&a32)))
    });

    let rv = stream(RISCV_BLOCK, 1000);
    group.throughput(Throughput::Bytes(rv.len() as u64));
    group.bench_function("riscv_1000_insn", |b| {
        b.iter(|| decode_all(IsaMode::Riscv64, black_box(&rv)))
    });

    group.finish();
}

// ─── Encoding ────────────────────────────────────────────────────────────────

fn decoded(mode: IsaMode, bytes: &[u8]) -> Instr<'static> {
    isa::with_isa_mode(mode, || {
        let mut instr = Instr::new(mode);
        decode(bytes, 0x1000, &mut instr).unwrap();
        instr.into_static()
    })
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");

    let mut lea = decoded(IsaMode::Amd64, &[0x4c, 0x8d, 0x04, 0x8b]);
    lea.set_raw_bits_valid(false);
    group.bench_function("x86_64_lea_from_operands", |b| {
        let mut buf = [0u8; 16];
        b.iter(|| instr_encode(black_box(&lea), &mut buf, 0x1000).unwrap())
    });

    let mut ldr = decoded(IsaMode::Aarch64, &0xF940_0420u32.to_le_bytes());
    ldr.set_raw_bits_valid(false);
    group.bench_function("aarch64_ldr_from_operands", |b| {
        let mut buf = [0u8; 4];
        b.iter(|| instr_encode(black_box(&ldr), &mut buf, 0x1000).unwrap())
    });

    let rip = decoded(IsaMode::Amd64, &[0x48, 0x8b, 0x05, 0x10, 0, 0, 0]);
    group.bench_function("x86_64_rip_relative_relocation", |b| {
        let mut buf = [0u8; 16];
        b.iter(|| instr_encode_to_copy(black_box(&rip), &mut buf, 0x9000, 0x9000).unwrap())
    });

    let bl = decoded(IsaMode::Aarch64, &0x9400_0010u32.to_le_bytes());
    group.bench_function("aarch64_branch_relocation", |b| {
        let mut buf = [0u8; 4];
        b.iter(|| instr_encode_to_copy(black_box(&bl), &mut buf, 0x2000, 0x2000).unwrap())
    });

    group.finish();
}

// ─── Classification ──────────────────────────────────────────────────────────

fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify");
    let block: Vec<Instr<'static>> = X86_64_BLOCK
        .iter()
        .map(|b| decoded(IsaMode::Amd64, b))
        .collect();
    group.throughput(Throughput::Elements(block.len() as u64));
    group.bench_function("x86_64_block_is_cti", |b| {
        b.iter(|| block.iter().filter(|i| is_cti(black_box(i))).count())
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_single_instruction,
    bench_decode_throughput,
    bench_encode,
    bench_classify,
);
criterion_main!(benches);
