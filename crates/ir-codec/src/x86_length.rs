//! x86 instruction length without a table lookup.
//!
//! A prefix walk followed by per-opcode knowledge of which bytes carry a
//! ModRM and how wide the immediate is. This covers the whole opcode space,
//! including VEX, EVEX and XOP encodings the decoder itself does not model,
//! so raw copies of any instruction can be sized and relocated.

use crate::error::IrError;
use crate::isa::IsaMode;

/// Length details of one x86 instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct X86Sizeof {
    /// Total length in bytes.
    pub length: usize,
    /// Prefix bytes, including REX and the VEX/EVEX/XOP prefix bytes.
    pub num_prefixes: usize,
    /// Offset of a rip-relative memory displacement (four bytes).
    pub rip_rel_pos: Option<usize>,
    /// Offset and width of a relative branch displacement.
    pub branch_disp: Option<(usize, usize)>,
}

/// Immediate shapes following the ModRM/SIB/displacement bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Imm {
    None,
    B1,
    B2,
    /// `iw ib` of `enter`.
    B3,
    /// 2 or 4 bytes with the operand-size prefix.
    Z,
    /// 2, 4 or 8 bytes: `mov r, imm` with `REX.W`.
    V,
    /// Absolute address, address sized.
    Moffs,
    /// `ptr16:32` far pointer.
    Far,
    /// One-byte relative branch.
    Rel8,
    /// Four-byte relative branch (two with `66` outside 64-bit mode).
    RelZ,
    /// `f6`/`f7` group 3: `test` carries an immediate.
    Group3,
}

#[derive(Debug, Clone, Copy)]
struct Shape {
    modrm: bool,
    imm: Imm,
}

const fn shape(modrm: bool, imm: Imm) -> Shape {
    Shape { modrm, imm }
}

/// One-byte opcode map.
const fn one_byte(op: u8) -> Shape {
    match op {
        0x00..=0x3f => match op & 7 {
            0..=3 => shape(true, Imm::None),
            4 => shape(false, Imm::B1),
            5 => shape(false, Imm::Z),
            _ => shape(false, Imm::None),
        },
        0x62 | 0x63 => shape(true, Imm::None),
        0x68 => shape(false, Imm::Z),
        0x69 => shape(true, Imm::Z),
        0x6a => shape(false, Imm::B1),
        0x6b => shape(true, Imm::B1),
        0x70..=0x7f => shape(false, Imm::Rel8),
        0x80 | 0x82 | 0x83 => shape(true, Imm::B1),
        0x81 => shape(true, Imm::Z),
        0x84..=0x8f => shape(true, Imm::None),
        0x9a => shape(false, Imm::Far),
        0xa0..=0xa3 => shape(false, Imm::Moffs),
        0xa8 => shape(false, Imm::B1),
        0xa9 => shape(false, Imm::Z),
        0xb0..=0xb7 => shape(false, Imm::B1),
        0xb8..=0xbf => shape(false, Imm::V),
        0xc0 | 0xc1 | 0xc6 => shape(true, Imm::B1),
        0xc2 | 0xca => shape(false, Imm::B2),
        0xc4 | 0xc5 | 0xd0..=0xd3 | 0xd8..=0xdf | 0xfe | 0xff => shape(true, Imm::None),
        0xc7 => shape(true, Imm::Z),
        0xc8 => shape(false, Imm::B3),
        0xcd | 0xd4 | 0xd5 | 0xe4..=0xe7 => shape(false, Imm::B1),
        0xe0..=0xe3 | 0xeb => shape(false, Imm::Rel8),
        0xe8 | 0xe9 => shape(false, Imm::RelZ),
        0xea => shape(false, Imm::Far),
        0xf6 | 0xf7 => shape(true, Imm::Group3),
        _ => shape(false, Imm::None),
    }
}

/// Two-byte (`0f xx`) opcode map.
const fn two_byte(op: u8) -> Shape {
    match op {
        0x0f => shape(true, Imm::B1),
        0x70..=0x73 | 0xa4 | 0xac | 0xba | 0xc2 | 0xc4..=0xc6 => shape(true, Imm::B1),
        0x80..=0x8f => shape(false, Imm::RelZ),
        0x04..=0x0b | 0x0e | 0x30..=0x37 | 0x39 | 0x3b..=0x3f | 0x77 => shape(false, Imm::None),
        0xa0..=0xa2 | 0xa8..=0xaa | 0xc8..=0xcf => shape(false, Imm::None),
        _ => shape(true, Imm::None),
    }
}

/// Immediate of a VEX/EVEX/XOP opcode in `map`.
const fn vex_imm(map: u8, op: u8) -> Imm {
    match map {
        1 => two_byte(op).imm,
        3 | 8 => Imm::B1,
        0xa => Imm::Z,
        _ => Imm::None,
    }
}

struct Walk<'b> {
    bytes: &'b [u8],
    pos: usize,
    data16: bool,
    rex_w: bool,
    addr16: bool,
    rip_rel_pos: Option<usize>,
    rel_field: Option<usize>,
    rel_width: usize,
    x64: bool,
}

impl<'b> Walk<'b> {
    fn byte(&self, at: usize) -> Result<u8, IrError> {
        self.bytes.get(at).copied().ok_or(IrError::Truncated {
            needed: at + 1,
            available: self.bytes.len(),
        })
    }

    fn next(&mut self) -> Result<u8, IrError> {
        let b = self.byte(self.pos)?;
        self.pos += 1;
        Ok(b)
    }

    /// ModRM, SIB and displacement bytes.
    fn modrm(&mut self) -> Result<u8, IrError> {
        let m = self.next()?;
        let (md, rm) = (m >> 6, m & 7);
        if md == 3 {
            return Ok(m);
        }
        if self.addr16 && !self.x64 {
            self.pos += match (md, rm) {
                (0, 6) | (2, _) => 2,
                (1, _) => 1,
                _ => 0,
            };
            return Ok(m);
        }
        let mut base = rm;
        if rm == 4 {
            base = self.next()? & 7;
        }
        match md {
            0 if rm == 5 => {
                if self.x64 {
                    self.rip_rel_pos = Some(self.pos);
                }
                self.pos += 4;
            }
            0 if base == 5 => self.pos += 4,
            1 => self.pos += 1,
            2 => self.pos += 4,
            _ => {}
        }
        Ok(m)
    }

    fn imm(&mut self, imm: Imm, modrm: u8) -> usize {
        let z = if self.data16 && !self.rex_w { 2 } else { 4 };
        match imm {
            Imm::None => 0,
            Imm::B1 => 1,
            Imm::B2 => 2,
            Imm::B3 => 3,
            Imm::Z => z,
            Imm::V if self.rex_w => 8,
            Imm::V => z,
            Imm::Moffs => match (self.x64, self.addr16) {
                (true, false) => 8,
                (true, true) | (false, false) => 4,
                (false, true) => 2,
            },
            Imm::Far => z + 2,
            Imm::Rel8 => {
                self.rel_field = Some(self.pos);
                self.rel_width = 1;
                1
            }
            Imm::RelZ => {
                let w = if self.data16 && !self.x64 { 2 } else { 4 };
                self.rel_field = Some(self.pos);
                self.rel_width = w;
                w
            }
            Imm::Group3 if (modrm >> 3) & 6 == 0 => z,
            Imm::Group3 => 0,
        }
    }

    /// Opcode byte(s) onward, once the map is known.
    fn body(&mut self, op: u8, s: Shape) -> Result<(), IrError> {
        let m = if s.modrm { self.modrm()? } else { 0 };
        let imm = match (op, s.imm) {
            (0xf6, Imm::Group3) => {
                if (m >> 3) & 6 == 0 {
                    1
                } else {
                    0
                }
            }
            (_, imm) => self.imm(imm, m),
        };
        self.pos += imm;
        Ok(())
    }

    /// VEX (`c4`/`c5`), EVEX (`62`) or XOP (`8f`) prefixed instruction.
    fn vex(&mut self, lead: u8) -> Result<(), IrError> {
        let p0 = self.next()?;
        let map = match lead {
            0xc5 => 1,
            0xc4 | 0x8f => {
                let _ = self.next()?;
                p0 & 0x1f
            }
            _ => {
                self.pos += 2;
                p0 & 3
            }
        };
        let op = self.next()?;
        let modrm = !(map == 1 && op == 0x77);
        self.body(op, shape(modrm, vex_imm(map, op)))
    }
}

/// Length of the x86 instruction at the start of `bytes`.
pub fn sizeof(bytes: &[u8], mode: IsaMode) -> Result<X86Sizeof, IrError> {
    let x64 = mode == IsaMode::Amd64;
    let mut w = Walk {
        bytes,
        pos: 0,
        data16: false,
        rex_w: false,
        addr16: false,
        rip_rel_pos: None,
        rel_field: None,
        rel_width: 0,
        x64,
    };
    let mut rex = false;
    let num_prefixes;
    loop {
        let b = w.byte(w.pos)?;
        match b {
            0x40..=0x4f if x64 => {
                rex = true;
                w.rex_w = b & 8 != 0;
                w.pos += 1;
                continue;
            }
            0x66 => w.data16 = true,
            0x67 => w.addr16 = true,
            0xf0 | 0xf2 | 0xf3 | 0x26 | 0x2e | 0x36 | 0x3e | 0x64 | 0x65 => {}
            0xc4 | 0xc5 | 0x62 => {
                let next = w.byte(w.pos + 1)?;
                if x64 || next >> 6 == 3 {
                    w.pos += 1;
                    let start = w.pos;
                    w.vex(b)?;
                    num_prefixes = start + if b == 0xc5 { 1 } else if b == 0x62 { 3 } else { 2 };
                    break;
                }
                num_prefixes = w.pos;
                w.pos += 1;
                w.body(b, one_byte(b))?;
                break;
            }
            0x8f if w.byte(w.pos + 1)? & 0x1f >= 8 => {
                w.pos += 1;
                num_prefixes = w.pos + 2;
                w.vex(b)?;
                break;
            }
            _ => {
                num_prefixes = w.pos;
                w.pos += 1;
                match b {
                    0x0f => {
                        let op = w.next()?;
                        match op {
                            0x38 => {
                                w.next()?;
                                w.body(op, shape(true, Imm::None))?;
                            }
                            0x3a => {
                                w.next()?;
                                w.body(op, shape(true, Imm::B1))?;
                            }
                            _ => w.body(op, two_byte(op))?,
                        }
                    }
                    _ => w.body(b, one_byte(b))?,
                }
                break;
            }
        }
        // A legacy prefix after REX cancels it.
        if rex {
            rex = false;
            w.rex_w = false;
        }
        w.pos += 1;
    }
    let length = w.pos;
    if length > mode.max_instr_len() {
        return Err(IrError::InvalidEncoding {
            mode,
            pc: 0,
            word: first_word(bytes),
        });
    }
    if length > bytes.len() {
        return Err(IrError::Truncated {
            needed: length,
            available: bytes.len(),
        });
    }
    log::trace!("x86 sizeof {:02x?} = {}", &bytes[..length], length);
    Ok(X86Sizeof {
        length,
        num_prefixes,
        rip_rel_pos: w.rip_rel_pos,
        branch_disp: w.rel_field.map(|pos| (pos, w.rel_width)),
    })
}

/// Up to four leading bytes, little-endian, for error reports.
pub(crate) fn first_word(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .take(4)
        .enumerate()
        .fold(0, |acc, (i, &b)| acc | (b as u32) << (8 * i))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn len64(bytes: &[u8]) -> usize {
        sizeof(bytes, IsaMode::Amd64).unwrap().length
    }

    fn len32(bytes: &[u8]) -> usize {
        sizeof(bytes, IsaMode::Ia32).unwrap().length
    }

    #[test]
    fn one_byte_forms() {
        assert_eq!(len64(&[0x90]), 1);
        assert_eq!(len64(&[0x48, 0x89, 0xd8]), 3);
        assert_eq!(len64(&[0x83, 0xc0, 0x01]), 3);
        assert_eq!(len64(&[0x05, 1, 0, 0, 0]), 5);
        assert_eq!(len64(&[0x66, 0x05, 1, 0]), 4);
        assert_eq!(len64(&[0x48, 0xb8, 1, 2, 3, 4, 5, 6, 7, 8]), 10);
        assert_eq!(len64(&[0xc8, 0x10, 0x00, 0x00]), 4);
        assert_eq!(len64(&[0xc2, 0x08, 0x00]), 3);
    }

    #[test]
    fn group3_test_has_an_immediate() {
        assert_eq!(len64(&[0xf6, 0xc1, 0x01]), 3);
        assert_eq!(len64(&[0xf7, 0xc1, 1, 0, 0, 0]), 6);
        assert_eq!(len64(&[0xf7, 0xd9]), 2);
        assert_eq!(len64(&[0xf6, 0xd9]), 2);
    }

    #[test]
    fn addressing_forms() {
        // mov eax, [rsp+8]
        assert_eq!(len64(&[0x8b, 0x44, 0x24, 0x08]), 4);
        // mov eax, [rbp+0x100]
        assert_eq!(len64(&[0x8b, 0x85, 0x00, 0x01, 0x00, 0x00]), 6);
        // mov eax, [0x1000] through SIB with no base
        assert_eq!(len64(&[0x8b, 0x04, 0x25, 0x00, 0x10, 0x00, 0x00]), 7);
        // 16-bit addressing in 32-bit mode: mov ax, [bx+si+4]
        assert_eq!(len32(&[0x67, 0x66, 0x8b, 0x40, 0x04]), 5);
    }

    #[test]
    fn rip_relative_position() {
        let s = sizeof(&[0x48, 0x8b, 0x05, 0x10, 0, 0, 0], IsaMode::Amd64).unwrap();
        assert_eq!(s.length, 7);
        assert_eq!(s.num_prefixes, 1);
        assert_eq!(s.rip_rel_pos, Some(3));
        // The same bytes are an absolute address in 32-bit mode.
        let s = sizeof(&[0x8b, 0x05, 0x10, 0, 0, 0], IsaMode::Ia32).unwrap();
        assert_eq!(s.rip_rel_pos, None);
    }

    #[test]
    fn branch_fields() {
        let s = sizeof(&[0x74, 0x05], IsaMode::Amd64).unwrap();
        assert_eq!(s.branch_disp, Some((1, 1)));
        let s = sizeof(&[0x0f, 0x84, 0, 0, 0, 0], IsaMode::Amd64).unwrap();
        assert_eq!(s.branch_disp, Some((2, 4)));
        let s = sizeof(&[0xe8, 0, 0, 0, 0], IsaMode::Ia32).unwrap();
        assert_eq!((s.length, s.branch_disp), (5, Some((1, 4))));
        let s = sizeof(&[0x66, 0xe8, 0, 0], IsaMode::Ia32).unwrap();
        assert_eq!((s.length, s.branch_disp), (4, Some((2, 2))));
    }

    #[test]
    fn escape_maps() {
        assert_eq!(len64(&[0x0f, 0x05]), 2);
        assert_eq!(len64(&[0x0f, 0xaf, 0xc1]), 3);
        assert_eq!(len64(&[0x0f, 0xba, 0xe0, 0x03]), 4);
        // pshufb xmm0, xmm1
        assert_eq!(len64(&[0x66, 0x0f, 0x38, 0x00, 0xc1]), 5);
        // palignr xmm0, xmm1, 4
        assert_eq!(len64(&[0x66, 0x0f, 0x3a, 0x0f, 0xc1, 0x04]), 6);
        // movss xmm0, [rip+0]
        let s = sizeof(&[0xf3, 0x0f, 0x10, 0x05, 0, 0, 0, 0], IsaMode::Amd64).unwrap();
        assert_eq!((s.length, s.rip_rel_pos), (8, Some(4)));
    }

    #[test]
    fn vex_and_evex() {
        // vaddps ymm0, ymm1, ymm2
        assert_eq!(len64(&[0xc5, 0xf4, 0x58, 0xc2]), 4);
        // vpermq ymm0, ymm1, 0x1b
        assert_eq!(len64(&[0xc4, 0xe3, 0xfd, 0x00, 0xc1, 0x1b]), 6);
        // vzeroupper
        assert_eq!(len64(&[0xc5, 0xf8, 0x77]), 3);
        // vaddps zmm0, zmm1, zmm2
        assert_eq!(len64(&[0x62, 0xf1, 0x74, 0x48, 0x58, 0xc2]), 6);
        // In 32-bit mode c5 with a memory ModRM is lds.
        assert_eq!(len32(&[0xc5, 0x06]), 2);
    }

    #[test]
    fn prefixes_are_counted() {
        let s = sizeof(&[0xf0, 0x48, 0x0f, 0xb1, 0x0a], IsaMode::Amd64).unwrap();
        assert_eq!((s.length, s.num_prefixes), (5, 2));
        // A REX followed by a legacy prefix is dropped; the 66 still counts.
        let s = sizeof(&[0x48, 0x66, 0xb8, 1, 0], IsaMode::Amd64).unwrap();
        assert_eq!(s.length, 5);
    }

    #[test]
    fn truncation_and_overlong() {
        assert_eq!(
            sizeof(&[0x0f], IsaMode::Amd64),
            Err(IrError::Truncated { needed: 2, available: 1 })
        );
        assert_eq!(
            sizeof(&[0xe8, 0, 0], IsaMode::Amd64),
            Err(IrError::Truncated { needed: 5, available: 3 })
        );
        let mut overlong = [0x66u8; 20];
        overlong[19] = 0x90;
        assert!(matches!(
            sizeof(&overlong, IsaMode::Amd64),
            Err(IrError::InvalidEncoding { .. })
        ));
    }
}
