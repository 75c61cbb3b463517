#![no_main]
use ir_codec::{decode, instr_encode, instr_encode_to_copy, isa, Instr, IsaMode};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // The first byte picks A32 or Thumb; the rest is the instruction.
    let Some((&sel, bytes)) = data.split_first() else {
        return;
    };
    let mode = if sel & 1 == 0 {
        IsaMode::ArmA32
    } else {
        IsaMode::Thumb
    };
    isa::with_isa_mode(mode, || {
        let pc = 0x40_0000;
        let mut instr = Instr::new(mode);
        let Ok(next) = decode(bytes, pc, &mut instr) else {
            return;
        };
        let len = (next - pc) as usize;

        let mut buf = [0u8; 32];
        assert_eq!(instr_encode(&instr, &mut buf, pc), Ok(next));
        assert_eq!(&buf[..len], &bytes[..len]);

        // Branches moved out of reach fail, never panic.
        let _ = instr_encode_to_copy(&instr, &mut buf, 0x7fff_0000, 0x7fff_0000);

        instr.set_raw_bits_valid(false);
        if let Ok(end) = instr_encode(&instr, &mut buf, pc) {
            let out = &buf[..(end - pc) as usize];
            let mut again = Instr::new(mode);
            assert!(decode(out, pc, &mut again).is_ok(), "{:02x?} -> {:02x?}", &bytes[..len], out);
            assert_eq!(again.opcode(), instr.opcode());
        }
    });
});
