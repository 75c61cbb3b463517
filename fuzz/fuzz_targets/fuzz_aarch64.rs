#![no_main]
use ir_codec::{decode, instr_encode, instr_encode_to_copy, isa, Instr, IsaMode};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Decoding AArch64 bytes must never panic, only return Ok/Err.
    isa::with_isa_mode(IsaMode::Aarch64, || {
        let pc = 0x40_0000;
        let mut instr = Instr::new(IsaMode::Aarch64);
        let Ok(next) = decode(data, pc, &mut instr) else {
            return;
        };
        let len = (next - pc) as usize;

        // Raw bytes copy back unchanged in place.
        let mut buf = [0u8; 32];
        assert_eq!(instr_encode(&instr, &mut buf, pc), Ok(next));
        assert_eq!(&buf[..len], &data[..len]);

        // Moving the bytes may fail on reach, never panic.
        let _ = instr_encode_to_copy(&instr, &mut buf, 0x7fff_0000, 0x7fff_0000);

        // Re-encoding from operands must decode back to the same opcode.
        instr.set_raw_bits_valid(false);
        if let Ok(end) = instr_encode(&instr, &mut buf, pc) {
            let out = &buf[..(end - pc) as usize];
            let mut again = Instr::new(IsaMode::Aarch64);
            assert!(decode(out, pc, &mut again).is_ok(), "{:02x?} -> {:02x?}", &data[..len], out);
            assert_eq!(again.opcode(), instr.opcode());
        }
    });
});
