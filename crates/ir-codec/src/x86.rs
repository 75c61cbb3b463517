//! x86 and x86-64 decoder and encoder.
//!
//! Driven by [`crate::x86_tables`]. Legacy and REX prefixes are scanned
//! first, then the table walk consumes the opcode bytes, ModRM fields and
//! mandatory prefix it needs. Instruction length always comes from
//! [`crate::x86_length`], so a raw decode never touches the tables.
//!
//! ## Operand conventions
//!
//! ```text
//!   add rax, rbx              dst [rax]                 src [rbx, rax]
//!   cmp eax, 5                dst []                    src [eax, #5]
//!   push r12                  dst [rsp, [rsp-8]]        src [r12, rsp]
//!   mov rax, [rip+0x10]       dst [rax]                 src [rel next+0x10]
//!   jnz L                     predicate nz              src [L]
//!   rep movsb                 dst [[rdi], rsi, rdi]     src [[rsi], rsi, rdi]
//!   div ecx                   dst [edx, eax]            src [ecx, edx, eax]
//!   fadd st0, st(1)           dst [st0]                 src [st(1), st0]
//! ```
//!
//! `jcc`, `setcc` and `cmovcc` are single opcodes carrying an x86 predicate.
//! Immediates are sign-extended from their encoded width except where the
//! architecture zero-extends them (`ret`, `int`, `enter`, ports, bit
//! indexes). The `rep`/`repne` and `lock` state lives in
//! [`Instr::prefixes`]; operand size, address size, REX and segment
//! prefixes are derived from the operands when encoding.

use crate::decode::{apply_entry, Level};
use crate::encode::{encode_chain, equivalent, fits_signed, verify, Cursor, InstrBytes};
use crate::error::IrError;
use crate::instr::{Eflags, Instr, Opcode, OperandList, Predicate, Prefixes};
use crate::isa::{Arch, IsaMode};
use crate::opnd::{MemHints, Operand};
use crate::reg::{x86 as xr, Reg, RegClass};
use crate::size::OpSize;
use crate::table::{extras, find_head, resolve, Flags, OpInfo, Slot};
use crate::x86_length::{self, first_word};
use crate::x86_tables::{
    digit, fixed_modrm, is_0f, mandatory_prefix, opcode_byte, X86Ext, X86Layout, X86Ty,
};

type XInfo = OpInfo<X86Layout>;

const REX_B: u8 = 1;
const REX_X: u8 = 2;
const REX_R: u8 = 4;
const REX_W: u8 = 8;

fn segment_of(byte: u8) -> Option<Reg> {
    Some(match byte {
        0x26 => xr::ES,
        0x2e => xr::CS,
        0x36 => xr::SS,
        0x3e => xr::DS,
        0x64 => xr::FS,
        0x65 => xr::GS,
        _ => return None,
    })
}

fn segment_byte(seg: Reg) -> Option<u8> {
    [
        (xr::ES, 0x26),
        (xr::CS, 0x2e),
        (xr::SS, 0x36),
        (xr::DS, 0x3e),
        (xr::FS, 0x64),
        (xr::GS, 0x65),
    ]
    .iter()
    .find(|&&(r, _)| r == seg)
    .map(|&(_, b)| b)
}

/// Sign-extend the low `n` bytes of `v`.
fn signed(v: u64, n: usize) -> i64 {
    let shift = 64 - 8 * n as u32;
    ((v << shift) as i64) >> shift
}

fn half(size: OpSize) -> OpSize {
    match size {
        OpSize::B8 => OpSize::B4,
        OpSize::B4 => OpSize::B2,
        _ => OpSize::B1,
    }
}

fn uses(info: &XInfo, pred: impl Fn(X86Ty) -> bool) -> bool {
    info.slots().any(|(s, _)| pred(s.ty))
}

fn mode_ok(info: &XInfo, x64: bool) -> bool {
    let f = info.flags;
    !(f.contains(Flags::X64_ONLY) && !x64 || f.contains(Flags::X86_ONLY) && x64)
}

fn needs_modrm(info: &XInfo) -> bool {
    digit(info.bits).is_some()
        || uses(info, |t| {
            matches!(t, X86Ty::E | X86Ty::M | X86Ty::G | X86Ty::V | X86Ty::W | X86Ty::Sti)
        })
}

// ── Sizing ───────────────────────────────────────────────────────────────

/// Operand-size, address-size and segment state one instruction resolves
/// its variable slots against.
#[derive(Debug, Clone, Copy)]
struct Sizing {
    x64: bool,
    data16: bool,
    rex_w: bool,
    /// Address size: 8 or 4 in 64-bit mode, 4 or 2 otherwise.
    addr: OpSize,
    /// Segment override, or null.
    segment: Reg,
}

impl Sizing {
    fn of(&self, size: OpSize) -> OpSize {
        size.resolve_x86(self.data16, self.rex_w, self.x64)
    }

    fn stack(&self) -> OpSize {
        if self.x64 {
            OpSize::B8
        } else {
            OpSize::B4
        }
    }

    fn default_addr(x64: bool) -> OpSize {
        if x64 {
            OpSize::B8
        } else {
            OpSize::B4
        }
    }

    /// Operand an implicit slot stands for.
    fn implicit(&self, slot: Slot<X86Ty>) -> Option<Operand> {
        let size = self.of(slot.size);
        let sp = xr::gpr(4, self.stack(), false);
        let bytes = size.size_in_bytes(IsaMode::Amd64) as i32;
        let mem = |base: Reg, disp: i32| Operand::base_disp(base, Reg::NULL, 0, disp, size);
        Some(match slot.ty {
            X86Ty::RegA => Operand::reg(xr::gpr(0, size, false)),
            X86Ty::RegAHalf => Operand::reg(xr::gpr(0, half(size), false)),
            X86Ty::RegC => Operand::reg(xr::gpr(1, self.addr, false)),
            X86Ty::RegD => Operand::reg(xr::gpr(2, size, false)),
            X86Ty::RegSi => Operand::reg(xr::gpr(6, self.addr, false)),
            X86Ty::RegDi => Operand::reg(xr::gpr(7, self.addr, false)),
            X86Ty::Ah => Operand::reg(xr::AH),
            X86Ty::Cl => Operand::reg(xr::CL),
            X86Ty::Dx => Operand::reg(xr::DX),
            X86Ty::St0 => Operand::reg(xr::ST0),
            X86Ty::Sp => Operand::reg(sp),
            X86Ty::Bp => Operand::reg(xr::gpr(5, self.stack(), false)),
            X86Ty::StackPush => mem(sp, -bytes),
            X86Ty::StackPop => mem(sp, 0),
            X86Ty::MemBp => mem(xr::gpr(5, self.stack(), false), 0),
            X86Ty::MemSi => Operand::base_disp_ex(
                self.segment,
                xr::gpr(6, self.addr, false),
                Reg::NULL,
                0,
                0,
                size,
                MemHints::NONE,
            ),
            X86Ty::MemDi => mem(xr::gpr(7, self.addr, false), 0),
            X86Ty::One => Operand::imm_int(1, OpSize::B1),
            _ => return None,
        })
    }
}

// ── Decoding ─────────────────────────────────────────────────────────────

/// Legacy and REX prefixes ahead of the opcode.
#[derive(Debug, Clone, Copy)]
struct Scan {
    flags: Prefixes,
    /// The last of `f2`/`f3`.
    rep: Option<u8>,
    segment: Reg,
    rex: u8,
    len: usize,
}

fn scan_prefixes(bytes: &[u8], x64: bool) -> Scan {
    let mut s = Scan {
        flags: Prefixes::NONE,
        rep: None,
        segment: Reg::NULL,
        rex: 0,
        len: 0,
    };
    for &b in bytes {
        match b {
            0x40..=0x4f if x64 => {
                s.rex = b;
                s.len += 1;
                continue;
            }
            0xf0 => s.flags.insert(Prefixes::LOCK),
            0xf2 | 0xf3 => s.rep = Some(b),
            0x66 => s.flags.insert(Prefixes::DATA16),
            0x67 => s.flags.insert(Prefixes::ADDR),
            _ => match segment_of(b) {
                // Only fs and gs survive in 64-bit mode.
                Some(seg) if !x64 || seg == xr::FS || seg == xr::GS => {
                    s.segment = seg;
                    s.flags.insert(Prefixes::SEG);
                }
                Some(_) => {}
                None => break,
            },
        }
        s.rex = 0;
        s.len += 1;
    }
    s
}

struct Decoder<'b> {
    bytes: &'b [u8],
    mode: IsaMode,
    pc: u64,
    next_pc: u64,
    pos: usize,
    scan: Scan,
    sizing: Sizing,
    /// Last opcode byte.
    op: u8,
    modrm: Option<u8>,
    /// ModRM memory operand, unsized.
    mem: Option<Operand>,
}

impl Decoder<'_> {
    fn invalid(&self) -> IrError {
        IrError::InvalidEncoding {
            mode: self.mode,
            pc: self.pc,
            word: first_word(self.bytes),
        }
    }

    fn take(&mut self, n: usize) -> Result<u64, IrError> {
        let end = self.pos + n;
        let Some(b) = self.bytes.get(self.pos..end) else {
            return Err(IrError::Truncated {
                needed: end,
                available: self.bytes.len(),
            });
        };
        self.pos = end;
        Ok(b.iter().rev().fold(0, |acc, &x| (acc << 8) | x as u64))
    }

    fn byte(&mut self) -> Result<u8, IrError> {
        Ok(self.take(1)? as u8)
    }

    fn rex(&self, bit: u8) -> u8 {
        if self.scan.rex & bit != 0 {
            8
        } else {
            0
        }
    }

    fn modrm(&mut self) -> Result<u8, IrError> {
        match self.modrm {
            Some(m) => Ok(m),
            None => {
                let m = self.byte()?;
                self.modrm = Some(m);
                Ok(m)
            }
        }
    }

    fn select(&mut self, kind: X86Ext) -> Result<usize, IrError> {
        Ok(match kind {
            X86Ext::Top => {
                let b = self.byte()?;
                self.op = b;
                // 90 with REX.B is xchg r8, rax, not nop.
                if b == 0x90 && self.scan.rex & REX_B != 0 {
                    0x91
                } else {
                    b as usize
                }
            }
            X86Ext::Escape0F => {
                let b = self.byte()?;
                self.op = b;
                b as usize
            }
            X86Ext::ModrmReg => ((self.modrm()? >> 3) & 7) as usize,
            X86Ext::ModrmMod => usize::from(self.modrm()? >> 6 == 3),
            X86Ext::Prefix => match self.scan.rep {
                Some(0xf3) => 2,
                Some(_) => 3,
                None if self.scan.flags.contains(Prefixes::DATA16) => 1,
                None => 0,
            },
            X86Ext::Mode => usize::from(self.sizing.x64),
            X86Ext::Rexw => usize::from(self.scan.rex & REX_W != 0),
            X86Ext::X87 => {
                let m = self.modrm()?;
                let reg = ((m >> 3) & 7) as usize;
                if m >> 6 == 3 {
                    reg + 8
                } else {
                    reg
                }
            }
        })
    }

    fn gpr(&self, num: u8, size: OpSize) -> Reg {
        xr::gpr(num, size, self.scan.rex == 0)
    }

    /// Parse the SIB byte and displacement of a ModRM memory form.
    fn rm_memory(&mut self, modrm: u8) -> Result<Operand, IrError> {
        let md = modrm >> 6;
        let rm = modrm & 7;
        let seg = self.sizing.segment;
        let wide = self.sizing.addr == OpSize::B8;
        let mut base = Some(rm | self.rex(REX_B));
        let mut index = None;
        let mut ss = 0;
        if rm == 4 {
            let sib = self.byte()?;
            ss = sib >> 6;
            let idx = ((sib >> 3) & 7) | self.rex(REX_X);
            if idx != 4 {
                index = Some(idx);
            }
            base = if sib & 7 == 5 && md == 0 {
                None
            } else {
                Some((sib & 7) | self.rex(REX_B))
            };
        } else if rm == 5 && md == 0 {
            let disp = self.take(4)? as u32 as i32;
            return Ok(if self.sizing.x64 {
                let mut addr = self.next_pc.wrapping_add(disp as i64 as u64);
                if !wide {
                    addr &= 0xffff_ffff;
                }
                Operand::RelAddr {
                    addr,
                    segment: seg,
                    size: OpSize::None,
                }
            } else {
                Operand::far_abs_addr(seg, disp as u32 as u64, OpSize::None)
            });
        }
        let disp = match md {
            0 if base.is_none() => self.take(4)? as u32 as i32,
            0 => 0,
            1 => self.take(1)? as u8 as i8 as i32,
            _ => self.take(4)? as u32 as i32,
        };
        if base.is_none() && index.is_none() {
            let addr = if wide {
                disp as i64 as u64
            } else {
                disp as u32 as u64
            };
            return Ok(Operand::far_abs_addr(seg, addr, OpSize::None));
        }
        let hints = if md == 2 && fits_signed(disp as i64, 8) {
            MemHints::FORCE_FULL_DISP
        } else {
            MemHints::NONE
        };
        let reg = |n: u8| xr::gpr(n, self.sizing.addr, false);
        Ok(Operand::base_disp_ex(
            seg,
            base.map_or(Reg::NULL, reg),
            index.map_or(Reg::NULL, reg),
            if index.is_some() { 1 << ss } else { 0 },
            disp,
            OpSize::None,
            hints,
        ))
    }

    fn sized_mem(&self, size: OpSize) -> Result<Operand, IrError> {
        let mut op = self.mem.ok_or_else(|| self.invalid())?;
        op.set_size(size);
        Ok(op)
    }

    /// The ModRM.rm register number, or `None` for a memory form.
    fn rm_reg(&self) -> Option<u8> {
        let m = self.modrm?;
        (m >> 6 == 3).then(|| (m & 7) | self.rex(REX_B))
    }

    fn reg_field(&self) -> u8 {
        self.modrm.map_or(0, |m| (m >> 3) & 7) | self.rex(REX_R)
    }

    fn operand(&mut self, slot: Slot<X86Ty>, out: &mut OperandList) -> Result<(), IrError> {
        let size = self.sizing.of(slot.size);
        let bytes = size.size_in_bytes(self.mode);
        let op = match slot.ty {
            X86Ty::None => return Ok(()),
            X86Ty::E => match self.rm_reg() {
                Some(n) => Operand::reg(self.gpr(n, size)),
                None => self.sized_mem(size)?,
            },
            X86Ty::M => self.sized_mem(size)?,
            X86Ty::G => Operand::reg(self.gpr(self.reg_field(), size)),
            X86Ty::V => Operand::reg(xr::xmm(self.reg_field())),
            X86Ty::W => match self.rm_reg() {
                Some(n) => Operand::reg(xr::xmm(n)),
                None => self.sized_mem(size)?,
            },
            X86Ty::Sti => Operand::reg(xr::st(self.modrm.unwrap_or(0) & 7)),
            X86Ty::Z => Operand::reg(self.gpr((self.op & 7) | self.rex(REX_B), size)),
            X86Ty::Imm => Operand::imm_int(signed(self.take(bytes)?, bytes), size),
            X86Ty::UImm => Operand::imm_uint(self.take(bytes)?, size),
            X86Ty::Count => Operand::imm_uint(self.take(1)?, OpSize::B1),
            X86Ty::J => {
                let width = match size {
                    OpSize::B1 => 1,
                    _ if self.sizing.data16 && !self.sizing.x64 => 2,
                    _ => 4,
                };
                let disp = signed(self.take(width)?, width);
                let mut target = self.next_pc.wrapping_add(disp as u64);
                if !self.sizing.x64 {
                    target &= if width == 2 { 0xffff } else { 0xffff_ffff };
                }
                Operand::pc(target)
            }
            X86Ty::A => {
                let width = if self.sizing.data16 { 2 } else { 4 };
                let target = self.take(width)?;
                let selector = self.take(2)? as u16;
                Operand::far_pc(selector, target)
            }
            X86Ty::O => {
                let width = self.sizing.addr.size_in_bytes(self.mode);
                let addr = self.take(width)?;
                Operand::far_abs_addr(self.sizing.segment, addr, size)
            }
            _ => self.sizing.implicit(slot).ok_or_else(|| self.invalid())?,
        };
        out.push(op);
        Ok(())
    }
}

/// Decode one instruction at the start of `bytes`. Returns its length.
pub(crate) fn decode(
    mode: IsaMode,
    bytes: &[u8],
    pc: u64,
    instr: &mut Instr<'_>,
    level: Level,
) -> Result<usize, IrError> {
    let len = match x86_length::sizeof(bytes, mode) {
        Ok(s) => s.length,
        Err(IrError::InvalidEncoding { mode, word, .. }) => {
            return Err(IrError::InvalidEncoding { mode, pc, word })
        }
        Err(e) => return Err(e),
    };
    if level == Level::Raw {
        return Ok(len);
    }
    let x64 = mode == IsaMode::Amd64;
    let scan = scan_prefixes(bytes, x64);
    let mut d = Decoder {
        bytes: &bytes[..len],
        mode,
        pc,
        next_pc: pc.wrapping_add(len as u64),
        pos: scan.len,
        scan,
        sizing: Sizing {
            x64,
            data16: false,
            rex_w: scan.rex & REX_W != 0,
            addr: Sizing::default_addr(x64),
            segment: scan.segment,
        },
        op: 0,
        modrm: None,
        mem: None,
    };
    let resolved = resolve::<X86Layout>(mode, (X86Ext::Top, 0), |kind| d.select(kind))?;
    let Some((_, info)) = resolved else {
        return Err(d.invalid());
    };
    if !mode_ok(info, x64) {
        return Err(d.invalid());
    }

    let mut flags = d.scan.flags;
    let mut rep = d.scan.rep;
    match mandatory_prefix(info.bits) {
        Some(0x66) => flags.remove(Prefixes::DATA16),
        Some(_) => rep = None,
        None => {}
    }
    match rep {
        Some(0xf3) => flags.insert(Prefixes::REP),
        Some(_) => flags.insert(Prefixes::REPNE),
        None => {}
    }
    let rex = d.scan.rex;
    if rex != 0 {
        flags.insert(Prefixes::REX);
        for (bit, flag) in [
            (REX_W, Prefixes::REX_W),
            (REX_R, Prefixes::REX_R),
            (REX_X, Prefixes::REX_X),
            (REX_B, Prefixes::REX_B),
        ] {
            if rex & bit != 0 {
                flags.insert(flag);
            }
        }
    }
    d.sizing.data16 = flags.contains(Prefixes::DATA16);
    if flags.contains(Prefixes::ADDR) {
        d.sizing.addr = if x64 { OpSize::B4 } else { OpSize::B2 };
    }

    let mut mem_form = false;
    if needs_modrm(info) {
        let m = d.modrm()?;
        if fixed_modrm(info.bits).is_some_and(|f| f != m) {
            return Err(d.invalid());
        }
        if m >> 6 != 3 {
            mem_form = uses(info, |t| matches!(t, X86Ty::E | X86Ty::M | X86Ty::W));
        } else if uses(info, |t| t == X86Ty::M) {
            return Err(d.invalid());
        }
    }
    let addressing = mem_form
        || uses(info, |t| {
            matches!(
                t,
                X86Ty::O | X86Ty::RegC | X86Ty::RegSi | X86Ty::RegDi | X86Ty::MemSi | X86Ty::MemDi
            )
        });
    if addressing && d.sizing.addr == OpSize::B2 {
        return Err(IrError::UnsupportedOperand {
            mode,
            what: "16-bit addressing",
        });
    }
    if mem_form {
        let m = d.modrm()?;
        d.mem = Some(d.rm_memory(m)?);
    }

    let predicate = if info.flags.contains(Flags::PREDICATE_0) {
        Predicate::from_x86(d.op as u32)
    } else {
        Predicate::None
    };
    instr.set_prefixes_decoded(flags);
    apply_entry(instr, info, predicate, level, |slot, out| d.operand(slot, out))?;
    if level == Level::Full && d.pos != len {
        log::trace!("x86 decode consumed {} of {} bytes at 0x{:x}", d.pos, len, pc);
        return Err(d.invalid());
    }
    Ok(len)
}

/// Status-flag usage and default predicate of an opcode.
pub(crate) fn defaults(opcode: Opcode) -> Option<(Eflags, Predicate)> {
    let (_, info) = find_head::<X86Layout>(opcode)?;
    Some((info.eflags, Predicate::None))
}

// ── Encoding ─────────────────────────────────────────────────────────────

/// Fixed-capacity output; overlong encodings are counted, then rejected.
struct Out {
    buf: [u8; 24],
    len: usize,
}

impl Out {
    fn push(&mut self, b: u8) {
        if let Some(slot) = self.buf.get_mut(self.len) {
            *slot = b;
        }
        self.len += 1;
    }

    fn le(&mut self, v: u64, n: usize) {
        for i in 0..n {
            self.push((v >> (8 * i)) as u8);
        }
    }

    fn patch(&mut self, at: usize, v: u64, n: usize) {
        for i in 0..n {
            if let Some(slot) = self.buf.get_mut(at + i) {
                *slot = (v >> (8 * i)) as u8;
            }
        }
    }
}

/// Bytes after the ModRM/SIB/displacement.
#[derive(Debug, Clone, Copy)]
enum Piece {
    Imm(u64, usize),
    Rel(u64, usize),
}

/// Per-attempt encoder state.
struct Encoder {
    opcode: Opcode,
    mode: IsaMode,
    sizing: Sizing,
    reg: Option<Operand>,
    rm: Option<Operand>,
    low: Option<Operand>,
    tail: [Option<Piece>; 3],
    force_rex: bool,
    high8: bool,
}

impl Encoder {
    fn mismatch(&self) -> IrError {
        IrError::NoMatchingEncoding { opcode: self.opcode }
    }

    fn illegal(&self, reason: &'static str) -> IrError {
        IrError::IllegalOperand {
            opcode: self.opcode,
            reason,
        }
    }

    fn out_of_range(&self, value: i64, bits: usize) -> IrError {
        IrError::OperandOutOfRange {
            opcode: self.opcode,
            value,
            bits: bits as u8,
        }
    }

    /// Record `op` for a ModRM field; a second use must name the same thing.
    fn bind(&self, field: &mut Option<Operand>, op: Operand) -> Result<(), IrError> {
        match field {
            Some(prev) if !equivalent(prev, &op, self.mode) => {
                Err(self.illegal("read and written operands differ"))
            }
            Some(_) => Ok(()),
            None => {
                *field = Some(op);
                Ok(())
            }
        }
    }

    fn push_tail(&mut self, piece: Piece) -> Result<(), IrError> {
        let slot = self
            .tail
            .iter_mut()
            .find(|p| p.is_none())
            .ok_or(IrError::NoMatchingEncoding { opcode: self.opcode })?;
        *slot = Some(piece);
        Ok(())
    }

    fn gpr(&mut self, op: &Operand, size: OpSize) -> Result<(), IrError> {
        let Operand::Reg { reg, .. } = op else {
            return Err(self.mismatch());
        };
        if !reg.is_gpr() || reg.arch() != Some(Arch::X86) || reg.size() != size {
            return Err(self.mismatch());
        }
        if reg.class() == RegClass::GprHigh8 {
            self.high8 = true;
        } else if reg.x86_needs_rex() && reg.number() < 8 {
            self.force_rex = true;
        }
        Ok(())
    }

    fn xmm(&self, op: &Operand) -> Result<(), IrError> {
        match op {
            Operand::Reg { reg, .. } if reg.is_simd() && reg.arch() == Some(Arch::X86) => Ok(()),
            _ => Err(self.mismatch()),
        }
    }

    fn mem(&self, op: &Operand, size: OpSize) -> Result<(), IrError> {
        if !matches!(op, Operand::BaseDisp(_) | Operand::AbsAddr { .. } | Operand::RelAddr { .. }) {
            return Err(self.mismatch());
        }
        let tagged = op.size();
        if tagged != OpSize::None && size != OpSize::None && tagged != size {
            return Err(self.mismatch());
        }
        Ok(())
    }

    fn imm_value(&self, op: &Operand, size: OpSize) -> Result<(i64, bool), IrError> {
        match op {
            Operand::ImmInt { value, size: tag, .. } if *tag == OpSize::None || *tag == size => {
                Ok((*value, *tag == OpSize::None))
            }
            _ => Err(self.mismatch()),
        }
    }

    fn unsigned(&mut self, op: &Operand, size: OpSize) -> Result<(), IrError> {
        let (v, _) = self.imm_value(op, size)?;
        let width = size.size_in_bytes(self.mode);
        if v < 0 || (v as u64) >> (8 * width) != 0 {
            return Err(self.out_of_range(v, 8 * width));
        }
        self.push_tail(Piece::Imm(v as u64, width))
    }

    fn operand(&mut self, slot: Slot<X86Ty>, op: Operand) -> Result<(), IrError> {
        let size = self.sizing.of(slot.size);
        match slot.ty {
            X86Ty::None => Ok(()),
            X86Ty::E => {
                if op.is_reg() {
                    self.gpr(&op, size)?;
                } else {
                    self.mem(&op, size)?;
                }
                let mut rm = self.rm;
                self.bind(&mut rm, op)?;
                self.rm = rm;
                Ok(())
            }
            X86Ty::M | X86Ty::W | X86Ty::Sti => {
                match slot.ty {
                    X86Ty::M => self.mem(&op, size)?,
                    X86Ty::W if op.is_reg() => self.xmm(&op)?,
                    X86Ty::W => self.mem(&op, size)?,
                    _ => match op {
                        Operand::Reg { reg, .. } if reg.class() == RegClass::X87 => {}
                        _ => return Err(self.mismatch()),
                    },
                }
                let mut rm = self.rm;
                self.bind(&mut rm, op)?;
                self.rm = rm;
                Ok(())
            }
            X86Ty::G | X86Ty::V => {
                if slot.ty == X86Ty::G {
                    self.gpr(&op, size)?;
                } else {
                    self.xmm(&op)?;
                }
                let mut reg = self.reg;
                self.bind(&mut reg, op)?;
                self.reg = reg;
                Ok(())
            }
            X86Ty::Z => {
                self.gpr(&op, size)?;
                let mut low = self.low;
                self.bind(&mut low, op)?;
                self.low = low;
                Ok(())
            }
            X86Ty::Imm => {
                let (v, untagged) = self.imm_value(&op, size)?;
                let width = size.size_in_bytes(self.mode);
                if !fits_signed(v, 8 * width as u32) {
                    return Err(self.out_of_range(v, 8 * width));
                }
                if width == 8 && untagged && fits_signed(v, 32) {
                    return Err(self.illegal("immediate fits the sign-extended form"));
                }
                self.push_tail(Piece::Imm(v as u64, width))
            }
            X86Ty::UImm => self.unsigned(&op, size),
            X86Ty::Count => {
                // A byte-tagged unsigned count is what `c0`/`c1` decode to.
                if matches!(op, Operand::ImmInt { value: 1, .. }) && op != Operand::imm_uint(1, OpSize::B1) {
                    return Err(self.illegal("a count of one has its own form"));
                }
                self.unsigned(&op, OpSize::B1)
            }
            X86Ty::J => {
                let Operand::Pc { target, selector: None } = op else {
                    return Err(self.mismatch());
                };
                let width = if size == OpSize::B1 { 1 } else { 4 };
                self.push_tail(Piece::Rel(target, width))
            }
            X86Ty::A => {
                let Operand::Pc {
                    target,
                    selector: Some(sel),
                } = op
                else {
                    return Err(self.mismatch());
                };
                if target > u32::MAX as u64 {
                    return Err(self.out_of_range(target as i64, 32));
                }
                self.push_tail(Piece::Imm(target, 4))?;
                self.push_tail(Piece::Imm(sel as u64, 2))
            }
            X86Ty::O => {
                let Operand::AbsAddr { addr, .. } = op else {
                    return Err(self.mismatch());
                };
                self.mem(&op, size)?;
                let width = self.sizing.addr.size_in_bytes(self.mode);
                if width < 8 && addr >> (8 * width) != 0 {
                    return Err(self.out_of_range(addr as i64, 8 * width));
                }
                self.push_tail(Piece::Imm(addr, width))
            }
            _ => {
                let want = self.sizing.implicit(slot).ok_or_else(|| self.mismatch())?;
                if want.is_mem() {
                    self.mem(&op, want.size())?;
                }
                if equivalent(&want, &op, self.mode) {
                    Ok(())
                } else {
                    Err(self.mismatch())
                }
            }
        }
    }

    fn rex_bits(&self) -> u8 {
        let high = |r: Reg| !r.is_null() && r.number() >= 8;
        let mut rex = 0;
        if self.sizing.rex_w {
            rex |= REX_W;
        }
        if let Some(Operand::Reg { reg, .. }) = self.reg {
            if high(reg) {
                rex |= REX_R;
            }
        }
        match self.rm {
            Some(Operand::Reg { reg, .. }) if high(reg) => rex |= REX_B,
            Some(Operand::BaseDisp(m)) => {
                if high(m.base) {
                    rex |= REX_B;
                }
                if high(m.index) {
                    rex |= REX_X;
                }
            }
            _ => {}
        }
        if let Some(Operand::Reg { reg, .. }) = self.low {
            if high(reg) {
                rex |= REX_B;
            }
        }
        rex
    }

    /// ModRM, SIB and displacement of a memory operand. Returns where a
    /// rip-relative displacement goes and the address it must reach.
    fn emit_mem(
        &self,
        out: &mut Out,
        reg3: u8,
        op: &Operand,
    ) -> Result<Option<(usize, u64)>, IrError> {
        let modrm = |md: u8, rm: u8| (md << 6) | (reg3 << 3) | rm;
        match *op {
            Operand::BaseDisp(m) => {
                let general = |r: Reg| r.is_null() || r.is_gpr();
                if !general(m.base) || !general(m.index) {
                    return Err(self.illegal("address registers must be general registers"));
                }
                if m.base.is_null() && m.index.is_null() {
                    return Err(self.illegal("displacement-only operands are absolute addresses"));
                }
                let ss = match (m.index.is_null(), m.scale) {
                    (true, _) | (false, 0 | 1) => 0,
                    (false, 2) => 1,
                    (false, 4) => 2,
                    (false, 8) => 3,
                    _ => return Err(self.illegal("scale must be 1, 2, 4 or 8")),
                };
                if !m.index.is_null() && m.index.number() == 4 {
                    return Err(self.illegal("the stack pointer cannot be an index"));
                }
                let idx = if m.index.is_null() { 4 } else { m.index.number() & 7 };
                if m.base.is_null() {
                    out.push(modrm(0, 4));
                    out.push((ss << 6) | (idx << 3) | 5);
                    out.le(m.disp as u32 as u64, 4);
                    return Ok(None);
                }
                let b = m.base.number() & 7;
                let sib = !m.index.is_null() || b == 4;
                let md = if m.hints.contains(MemHints::FORCE_FULL_DISP) {
                    2
                } else if m.disp == 0 && b != 5 {
                    0
                } else if fits_signed(m.disp as i64, 8) {
                    1
                } else {
                    2
                };
                out.push(modrm(md, if sib { 4 } else { b }));
                if sib {
                    out.push((ss << 6) | (idx << 3) | b);
                }
                match md {
                    1 => out.push(m.disp as u8),
                    2 => out.le(m.disp as u32 as u64, 4),
                    _ => {}
                }
                Ok(None)
            }
            Operand::AbsAddr { addr, .. } if self.sizing.x64 => {
                if !fits_signed(addr as i64, 32) {
                    return Err(self.out_of_range(addr as i64, 32));
                }
                out.push(modrm(0, 4));
                out.push(0x25);
                out.le(addr, 4);
                Ok(None)
            }
            Operand::AbsAddr { addr, .. } => {
                if addr > u32::MAX as u64 {
                    return Err(self.out_of_range(addr as i64, 32));
                }
                out.push(modrm(0, 5));
                out.le(addr, 4);
                Ok(None)
            }
            Operand::RelAddr { addr, .. } if self.sizing.x64 => {
                out.push(modrm(0, 5));
                let at = out.len;
                out.le(0, 4);
                Ok(Some((at, addr)))
            }
            _ => Err(self.mismatch()),
        }
    }

    fn finish(
        &self,
        instr: &Instr<'_>,
        info: &XInfo,
        cc: u8,
        pc: u64,
    ) -> Result<InstrBytes, IrError> {
        let bits = info.bits;
        let rex = self.rex_bits();
        let with_rex = rex != 0 || self.force_rex;
        if with_rex && !self.sizing.x64 {
            return Err(self.illegal("REX prefix outside 64-bit mode"));
        }
        if with_rex && self.high8 {
            return Err(self.illegal("high byte registers cannot be used with a REX prefix"));
        }

        let mut out = Out { buf: [0; 24], len: 0 };
        let prefixes = instr.prefixes();
        if prefixes.contains(Prefixes::LOCK) {
            out.push(0xf0);
        }
        let mandatory = mandatory_prefix(bits);
        if !matches!(mandatory, Some(0xf2 | 0xf3)) {
            if prefixes.contains(Prefixes::REP) {
                out.push(0xf3);
            } else if prefixes.contains(Prefixes::REPNE) {
                out.push(0xf2);
            }
        }
        if let Some(b) = segment_byte(self.sizing.segment) {
            out.push(b);
        }
        if self.sizing.data16 {
            out.push(0x66);
        }
        if self.sizing.addr != Sizing::default_addr(self.sizing.x64) {
            out.push(0x67);
        }
        if let Some(p) = mandatory {
            out.push(p);
        }
        if with_rex {
            out.push(0x40 | rex);
        }
        if is_0f(bits) {
            out.push(0x0f);
        }
        let low = match self.low {
            Some(Operand::Reg { reg, .. }) => reg.number() & 7,
            _ => 0,
        };
        out.push(opcode_byte(bits) | low | cc);

        let mut rip = None;
        if let Some(m) = fixed_modrm(bits) {
            out.push(m);
        } else if digit(bits).is_some() || self.reg.is_some() || self.rm.is_some() {
            let reg3 = match (digit(bits), self.reg) {
                (Some(d), _) => d,
                (None, Some(Operand::Reg { reg, .. })) => reg.number() & 7,
                _ => 0,
            };
            match self.rm {
                Some(Operand::Reg { reg, .. }) => out.push(0xc0 | (reg3 << 3) | (reg.number() & 7)),
                Some(ref op) => rip = self.emit_mem(&mut out, reg3, op)?,
                None => return Err(self.mismatch()),
            }
        }

        let mut rels: [Option<(usize, u64, usize)>; 3] = [None; 3];
        for (piece, rel) in self.tail.iter().zip(rels.iter_mut()) {
            match *piece {
                Some(Piece::Imm(v, n)) => out.le(v, n),
                Some(Piece::Rel(target, n)) => {
                    *rel = Some((out.len, target, n));
                    out.le(0, n);
                }
                None => {}
            }
        }
        if out.len > self.mode.max_instr_len() {
            return Err(self.illegal("encoding exceeds the maximum instruction length"));
        }

        let end = pc.wrapping_add(out.len as u64);
        if let Some((at, addr)) = rip {
            let disp = addr.wrapping_sub(end) as i64;
            if !fits_signed(disp, 32) {
                return Err(self.out_of_range(disp, 32));
            }
            out.patch(at, disp as u64, 4);
        }
        for (at, target, n) in rels.iter().flatten().copied() {
            let mut disp = target.wrapping_sub(end) as i64;
            if !self.sizing.x64 {
                disp = disp as i32 as i64;
            }
            if !fits_signed(disp, 8 * n as u32) {
                return Err(self.out_of_range(disp, 8 * n));
            }
            out.patch(at, disp as u64, n);
        }
        Ok(InstrBytes::from_slice(&out.buf[..out.len]))
    }
}

/// Operand size, address size and segment implied by the operands bound to
/// `pairs`.
fn sizing_for(
    opcode: Opcode,
    info: &XInfo,
    pairs: &[(Slot<X86Ty>, Operand)],
    x64: bool,
) -> Result<Sizing, IrError> {
    let illegal = |reason| IrError::IllegalOperand { opcode, reason };
    let mut osz = None;
    let mut addr = None;
    let mut segment = Reg::NULL;
    let mut note_addr = |r: Reg| -> Result<(), IrError> {
        if r.is_null() || !r.is_gpr() {
            return Ok(());
        }
        match addr {
            Some(prev) if prev != r.size() => Err(illegal("address registers differ in size")),
            _ => {
                addr = Some(r.size());
                Ok(())
            }
        }
    };
    for (slot, op) in pairs {
        let variable = matches!(slot.size, OpSize::V | OpSize::Y | OpSize::Z);
        let sized = !matches!(
            slot.ty,
            X86Ty::RegAHalf | X86Ty::Imm | X86Ty::UImm | X86Ty::Count | X86Ty::J | X86Ty::A
        );
        if variable && sized {
            let width = match op {
                Operand::Reg { reg, .. } if reg.is_gpr() => Some(reg.size()),
                op if op.is_mem() && op.size() != OpSize::None => Some(op.size()),
                _ => None,
            };
            match (osz, width) {
                (Some(prev), Some(w)) if prev != w => return Err(illegal("operand sizes disagree")),
                (None, Some(w)) => osz = Some(w),
                _ => {}
            }
        }
        match (slot.ty, op) {
            (X86Ty::E | X86Ty::M | X86Ty::W | X86Ty::MemSi | X86Ty::MemDi, Operand::BaseDisp(m)) => {
                note_addr(m.base)?;
                note_addr(m.index)?;
            }
            (X86Ty::RegC | X86Ty::RegSi | X86Ty::RegDi, Operand::Reg { reg, .. }) => note_addr(*reg)?,
            _ => {}
        }
        if matches!(slot.ty, X86Ty::E | X86Ty::M | X86Ty::W | X86Ty::O | X86Ty::MemSi) && op.is_mem() {
            let seg = op.segment();
            if !seg.is_null() {
                if !segment.is_null() && segment != seg {
                    return Err(illegal("memory operands name different segments"));
                }
                segment = seg;
            }
        }
    }
    if x64 && !segment.is_null() && segment != xr::FS && segment != xr::GS {
        return Err(illegal("only fs and gs overrides apply in 64-bit mode"));
    }
    let addr = match (x64, addr) {
        (_, None) => Sizing::default_addr(x64),
        (true, Some(OpSize::B8)) | (false, Some(OpSize::B4)) => Sizing::default_addr(x64),
        (true, Some(OpSize::B4)) => OpSize::B4,
        (false, Some(OpSize::B2)) => return Err(illegal("16-bit addressing is not supported")),
        _ => return Err(illegal("unsupported address size")),
    };
    let rex_w = osz == Some(OpSize::B8) || info.flags.contains(Flags::REQUIRES_REX_W);
    if rex_w && !x64 {
        return Err(illegal("64-bit operand size outside 64-bit mode"));
    }
    Ok(Sizing {
        x64,
        data16: osz == Some(OpSize::B2),
        rex_w,
        addr,
        segment,
    })
}

fn encode_entry(instr: &Instr<'_>, info: &'static XInfo, pc: u64) -> Result<InstrBytes, IrError> {
    let mode = instr.isa_mode();
    let opcode = instr.opcode();
    let x64 = mode == IsaMode::Amd64;
    let mismatch = || IrError::NoMatchingEncoding { opcode };
    if !mode_ok(info, x64) {
        return Err(mismatch());
    }
    let cc = if info.flags.contains(Flags::PREDICATE_0) {
        match instr.predicate().x86_bits() {
            Some(cc) => cc as u8,
            None => {
                return Err(IrError::IllegalOperand {
                    opcode,
                    reason: "conditional form needs an x86 condition",
                })
            }
        }
    } else if matches!(instr.predicate(), Predicate::None | Predicate::Always) {
        0
    } else {
        return Err(IrError::IllegalOperand {
            opcode,
            reason: "instruction is not predicated",
        });
    };

    let mut pairs = [(Slot { ty: X86Ty::None, size: OpSize::None }, Operand::Null); 8];
    let mut n = 0;
    let mut cur = Cursor::new(instr);
    for (slot, dir) in info.slots().chain(extras(info).flat_map(|e| e.slots())) {
        let op = cur.next(dir).ok_or_else(mismatch)?;
        let at = pairs.get_mut(n).ok_or_else(mismatch)?;
        *at = (slot, op);
        n += 1;
    }
    if !cur.is_done() {
        return Err(mismatch());
    }
    let pairs = &pairs[..n];

    let mut enc = Encoder {
        opcode,
        mode,
        sizing: sizing_for(opcode, info, pairs, x64)?,
        reg: None,
        rm: None,
        low: None,
        tail: [None; 3],
        force_rex: false,
        high8: false,
    };
    for &(slot, op) in pairs {
        enc.operand(slot, op)?;
    }
    enc.finish(instr, info, cc, pc)
}

/// Encode `instr` for address `pc`.
pub(crate) fn encode(instr: &Instr<'_>, pc: u64) -> Result<InstrBytes, IrError> {
    let opcode = instr.opcode();
    let head = find_head::<X86Layout>(opcode).map(|(_, info)| info);
    encode_chain(opcode, head, |info| {
        let bytes = encode_entry(instr, info, pc)?;
        let fit = verify(instr, &bytes, pc)?;
        Ok((bytes, fit))
    })
}

// ── Raw copies ───────────────────────────────────────────────────────────

/// Move an undecoded instruction from `raw_pc` to `final_pc`, rewriting its
/// rip-relative displacement and relative branch offset.
pub(crate) fn relocate_raw(
    mode: IsaMode,
    raw: &[u8],
    raw_pc: u64,
    final_pc: u64,
) -> Result<InstrBytes, IrError> {
    let size = x86_length::sizeof(raw, mode)?;
    let mut out = InstrBytes::from_slice(&raw[..size.length]);
    let shift = raw_pc.wrapping_sub(final_pc) as i64;
    let fields = size.rip_rel_pos.map(|at| (at, 4)).into_iter().chain(size.branch_disp);
    for (at, width) in fields {
        let old = out[at..at + width]
            .iter()
            .rev()
            .fold(0u64, |acc, &b| (acc << 8) | b as u64);
        let mut new = signed(old, width).wrapping_add(shift);
        if mode == IsaMode::Ia32 && width == 4 {
            new = new as i32 as i64;
        }
        if !fits_signed(new, 8 * width as u32) {
            let mut scratch = Instr::new(mode);
            let opcode = match crate::decode::decode_in(mode, raw, raw_pc, &mut scratch, Level::Opcode) {
                Ok(_) => scratch.opcode(),
                Err(_) => Opcode::Undecoded,
            };
            log::debug!("relocating {} from 0x{:x} to 0x{:x} overflows", opcode, raw_pc, final_pc);
            return Err(IrError::OperandOutOfRange {
                opcode,
                value: new,
                bits: (8 * width) as u8,
            });
        }
        for (i, b) in out[at..at + width].iter_mut().enumerate() {
            *b = (new >> (8 * i)) as u8;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::decode_in;
    use crate::instr::X86Cond;
    use crate::x86_tables::X86Op;

    const PC: u64 = 0x40_1000;

    fn dis_in(mode: IsaMode, bytes: &[u8]) -> Instr<'static> {
        let mut instr = Instr::new(mode);
        let len = decode_in(mode, bytes, PC, &mut instr, Level::Full)
            .unwrap_or_else(|e| panic!("{:02x?}: {}", bytes, e));
        assert_eq!(len, bytes.len(), "{:02x?}", bytes);
        instr.into_static()
    }

    fn dis(bytes: &[u8]) -> Instr<'static> {
        dis_in(IsaMode::Amd64, bytes)
    }

    fn dis32(bytes: &[u8]) -> Instr<'static> {
        dis_in(IsaMode::Ia32, bytes)
    }

    fn asm(instr: &Instr<'_>) -> Vec<u8> {
        encode(instr, PC)
            .unwrap_or_else(|e| panic!("{}: {}", instr.opcode(), e))
            .to_vec()
    }

    fn op(o: X86Op) -> Opcode {
        Opcode::X86(o)
    }

    fn build(o: X86Op, dsts: &[Operand], srcs: &[Operand]) -> Instr<'static> {
        Instr::build(IsaMode::Amd64, op(o), dsts, srcs)
    }

    fn r(reg: Reg) -> Operand {
        Operand::reg(reg)
    }

    fn invalid_in(mode: IsaMode, bytes: &[u8]) -> bool {
        let mut instr = Instr::new(mode);
        matches!(
            decode_in(mode, bytes, PC, &mut instr, Level::Full),
            Err(IrError::InvalidEncoding { .. })
        )
    }

    fn roundtrip_in(mode: IsaMode, bytes: &[u8]) {
        let instr = dis_in(mode, bytes);
        let mut fresh = Instr::build(mode, instr.opcode(), instr.dsts(), instr.srcs());
        fresh.set_predicate(instr.predicate());
        fresh.set_prefixes(instr.prefixes());
        let out = encode(&fresh, PC).unwrap_or_else(|e| panic!("{:02x?} ({}): {}", bytes, instr.opcode(), e));
        assert_eq!(&out[..], bytes, "{}", instr.opcode());
    }

    fn roundtrip(bytes: &[u8]) {
        roundtrip_in(IsaMode::Amd64, bytes);
    }

    #[test]
    fn raw_level_uses_the_length_walker() {
        let mut instr = Instr::new(IsaMode::Amd64);
        let bytes = [0x48, 0x8b, 0x05, 0x10, 0, 0, 0];
        assert_eq!(decode_in(IsaMode::Amd64, &bytes, PC, &mut instr, Level::Raw), Ok(7));
        assert!(matches!(
            decode_in(IsaMode::Amd64, &bytes[..5], PC, &mut instr, Level::Full),
            Err(IrError::Truncated { needed: 7, .. })
        ));
    }

    #[test]
    fn arithmetic_forms() {
        let add = dis(&[0x48, 0x01, 0xd8]);
        assert_eq!(add.opcode(), op(X86Op::Add));
        assert_eq!(add.dsts(), &[r(xr::RAX)]);
        assert_eq!(add.srcs(), &[r(xr::RBX), r(xr::RAX)]);
        assert!(add.prefixes().contains(Prefixes::REX_W));

        let sub = dis(&[0x48, 0x83, 0xec, 0x28]);
        assert_eq!(sub.opcode(), op(X86Op::Sub));
        assert_eq!(sub.src(0), Operand::imm_int(0x28, OpSize::B1));
        assert_eq!(sub.src(1), r(xr::RSP));

        let cmp = dis(&[0x3d, 0x00, 0x01, 0x00, 0x00]);
        assert_eq!(cmp.num_dsts(), 0);
        assert_eq!(cmp.srcs(), &[r(xr::EAX), Operand::imm_int(0x100, OpSize::B4)]);

        for bytes in [
            &[0x48, 0x01, 0xd8][..],
            &[0x48, 0x83, 0xec, 0x28],
            &[0x3d, 0x00, 0x01, 0x00, 0x00],
            &[0x66, 0x05, 0x34, 0x12],
            &[0x80, 0xc1, 0x7f],
            &[0x4d, 0x29, 0xc8],
            &[0x13, 0x04, 0x24],
            &[0xf7, 0xd8],
            &[0x48, 0xf7, 0xf1],
            &[0x0f, 0xaf, 0xc1],
            &[0x6b, 0xc1, 0x10],
        ] {
            roundtrip(bytes);
        }
    }

    #[test]
    fn memory_addressing() {
        // mov eax, [rsp+8]
        let load = dis(&[0x8b, 0x44, 0x24, 0x08]);
        assert_eq!(load.src(0), Operand::base_disp(xr::RSP, Reg::NULL, 0, 8, OpSize::B4));
        // lea r8, [rbx+rcx*4]
        let lea = dis(&[0x4c, 0x8d, 0x04, 0x8b]);
        assert_eq!(lea.dst(0), r(xr::R8));
        assert_eq!(lea.src(0), Operand::base_disp(xr::RBX, xr::RCX, 4, 0, OpSize::None));
        // mov rax, [rip+0x10]
        let rel = dis(&[0x48, 0x8b, 0x05, 0x10, 0x00, 0x00, 0x00]);
        assert_eq!(rel.src(0), Operand::rel_addr(PC + 7 + 0x10, OpSize::B8));
        // mov rax, fs:[0x28]
        let tls = dis(&[0x64, 0x48, 0x8b, 0x04, 0x25, 0x28, 0x00, 0x00, 0x00]);
        assert_eq!(tls.src(0), Operand::far_abs_addr(xr::FS, 0x28, OpSize::B8));
        // mov eax, [rax+0] with a forced 32-bit displacement
        let wide = dis(&[0x8b, 0x80, 0x00, 0x00, 0x00, 0x00]);
        assert!(wide.src(0).mem().hints.contains(MemHints::FORCE_FULL_DISP));

        for bytes in [
            &[0x8b, 0x44, 0x24, 0x08][..],
            &[0x4c, 0x8d, 0x04, 0x8b],
            &[0x48, 0x8b, 0x05, 0x10, 0x00, 0x00, 0x00],
            &[0x64, 0x48, 0x8b, 0x04, 0x25, 0x28, 0x00, 0x00, 0x00],
            &[0x8b, 0x80, 0x00, 0x00, 0x00, 0x00],
            &[0x8b, 0x45, 0x00],
            &[0x41, 0x8b, 0x45, 0x00],
            &[0x41, 0x8b, 0x04, 0x24],
            &[0x8b, 0x04, 0x8d, 0x00, 0x10, 0x00, 0x00],
            &[0x67, 0x8b, 0x03],
            &[0x42, 0x8b, 0x04, 0xa0],
            &[0xc7, 0x44, 0x24, 0xfc, 0x01, 0x00, 0x00, 0x00],
        ] {
            roundtrip(bytes);
        }
    }

    #[test]
    fn byte_registers() {
        // mov al, ah has no REX prefix
        let high = dis(&[0x88, 0xe0]);
        assert_eq!(high.srcs(), &[r(xr::AH)]);
        // the same ModRM with a REX prefix names spl
        let low = dis(&[0x40, 0x88, 0xe0]);
        assert_eq!(low.srcs(), &[r(xr::SPL)]);
        roundtrip(&[0x88, 0xe0]);
        roundtrip(&[0x40, 0x88, 0xe0]);
        roundtrip(&[0x41, 0x88, 0xc0]);

        let mixed = build(X86Op::Mov, &[r(xr::AH)], &[r(xr::SIL)]);
        assert!(matches!(encode(&mixed, PC), Err(IrError::IllegalOperand { .. })));
    }

    #[test]
    fn control_transfers() {
        let jne = dis(&[0x75, 0xfe]);
        assert_eq!(jne.opcode(), op(X86Op::JccShort));
        assert_eq!(jne.predicate(), Predicate::X86(X86Cond::Nz));
        assert_eq!(jne.src(0), Operand::pc(PC));
        assert!(jne.eflags().reads().intersects(Eflags::READ_ZF));

        let jz = dis(&[0x0f, 0x84, 0x00, 0x01, 0x00, 0x00]);
        assert_eq!(jz.opcode(), op(X86Op::Jcc));
        assert_eq!(jz.src(0), Operand::pc(PC + 6 + 0x100));

        let call = dis(&[0xe8, 0x00, 0x00, 0x00, 0x00]);
        assert_eq!(call.srcs(), &[Operand::pc(PC + 5), r(xr::RSP)]);
        assert_eq!(call.dst(1), Operand::base_disp(xr::RSP, Reg::NULL, 0, -8, OpSize::B8));

        let ret = dis(&[0xc2, 0x08, 0x00]);
        assert_eq!(ret.src(0), Operand::imm_uint(8, OpSize::B2));

        for bytes in [
            &[0x75, 0xfe][..],
            &[0x0f, 0x84, 0x00, 0x01, 0x00, 0x00],
            &[0xe8, 0x00, 0x00, 0x00, 0x00],
            &[0xe9, 0xfb, 0xff, 0xff, 0xff],
            &[0xeb, 0x10],
            &[0xff, 0xd0],
            &[0x41, 0xff, 0xe3],
            &[0xff, 0x25, 0x00, 0x10, 0x00, 0x00],
            &[0xc3],
            &[0xc2, 0x08, 0x00],
            &[0xe2, 0xfe],
            &[0xcd, 0x80],
            &[0xcc],
        ] {
            roundtrip(bytes);
        }

        let mut far = build(X86Op::JccShort, &[], &[Operand::pc(PC + 0x200)]);
        far.set_predicate(Predicate::X86(X86Cond::Z));
        assert!(matches!(encode(&far, PC), Err(IrError::OperandOutOfRange { .. })));
        let unconditional = build(X86Op::Jcc, &[], &[Operand::pc(PC)]);
        assert!(matches!(encode(&unconditional, PC), Err(IrError::IllegalOperand { .. })));
    }

    #[test]
    fn stack_operations() {
        let push = dis(&[0x41, 0x54]);
        assert_eq!(push.opcode(), op(X86Op::Push));
        assert_eq!(push.srcs(), &[r(xr::R12), r(xr::RSP)]);
        let pop = dis32(&[0x5d]);
        assert_eq!(pop.dst(0), r(xr::EBP));
        assert_eq!(pop.src(1), Operand::base_disp(xr::ESP, Reg::NULL, 0, 0, OpSize::B4));
        for bytes in [
            &[0x41, 0x54][..],
            &[0x55],
            &[0x5d],
            &[0x6a, 0xff],
            &[0x68, 0x00, 0x10, 0x00, 0x00],
            &[0xc9],
        ] {
            roundtrip(bytes);
        }
        roundtrip_in(IsaMode::Ia32, &[0x5d]);
        let slot = Operand::base_disp(xr::RSP, Reg::NULL, 0, -8, OpSize::B8);
        let narrow = build(X86Op::Push, &[r(xr::RSP), slot], &[r(xr::EAX), r(xr::RSP)]);
        assert!(encode(&narrow, PC).is_err());
    }

    #[test]
    fn immediates_pick_the_shortest_form() {
        let mov = |v: i64, size: OpSize| build(X86Op::Mov, &[r(xr::RAX)], &[Operand::imm_int(v, size)]);
        assert_eq!(asm(&mov(-1, OpSize::None)), [0x48, 0xc7, 0xc0, 0xff, 0xff, 0xff, 0xff]);
        assert_eq!(
            asm(&mov(0x1_0000_0000, OpSize::None)),
            [0x48, 0xb8, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00]
        );
        let add = |v: i64| build(X86Op::Add, &[r(xr::ECX)], &[Operand::imm_int(v, OpSize::None), r(xr::ECX)]);
        assert_eq!(asm(&add(1)), [0x83, 0xc1, 0x01]);
        assert_eq!(asm(&add(0x1000)), [0x81, 0xc1, 0x00, 0x10, 0x00, 0x00]);
        let byte = build(X86Op::Add, &[r(xr::AL)], &[Operand::imm_int(300, OpSize::None), r(xr::AL)]);
        assert!(matches!(encode(&byte, PC), Err(IrError::OperandOutOfRange { .. })));

        roundtrip(&[0xb8, 0x78, 0x56, 0x34, 0x12]);
        roundtrip(&[0x48, 0xc7, 0xc0, 0xff, 0xff, 0xff, 0xff]);
        roundtrip(&[0xd1, 0xe0]);
        roundtrip(&[0xc1, 0xe0, 0x04]);
        roundtrip(&[0xd3, 0xe8]);
    }

    #[test]
    fn explicit_count_of_one_keeps_its_form() {
        roundtrip(&[0xc1, 0xe0, 0x01]);
        roundtrip(&[0xc0, 0xe0, 0x01]);
        roundtrip(&[0xd0, 0xe0]);
        let shl = build(X86Op::Shl, &[r(xr::EAX)], &[Operand::imm_int(1, OpSize::None), r(xr::EAX)]);
        assert_eq!(asm(&shl), [0xd1, 0xe0]);
    }

    #[test]
    fn conditional_moves_and_sets() {
        let sete = dis(&[0x0f, 0x94, 0xc0]);
        assert_eq!(sete.opcode(), op(X86Op::Setcc));
        assert_eq!(sete.predicate(), Predicate::X86(X86Cond::Z));
        let cmov = dis(&[0x48, 0x0f, 0x4c, 0xc1]);
        assert_eq!(cmov.predicate(), Predicate::X86(X86Cond::L));
        assert_eq!(cmov.dsts(), &[r(xr::RAX)]);
        roundtrip(&[0x0f, 0x94, 0xc0]);
        roundtrip(&[0x48, 0x0f, 0x4c, 0xc1]);
        roundtrip(&[0x0f, 0xb6, 0xc1]);
        roundtrip(&[0x48, 0x0f, 0xbf, 0x06]);
        roundtrip(&[0x0f, 0xc8]);
        roundtrip(&[0x49, 0x0f, 0xc8]);
    }

    #[test]
    fn string_operations() {
        let movs = dis(&[0xf3, 0xa4]);
        assert_eq!(movs.opcode(), op(X86Op::Movs));
        assert!(movs.prefixes().contains(Prefixes::REP));
        assert_eq!(
            movs.dsts(),
            &[
                Operand::base_disp(xr::RDI, Reg::NULL, 0, 0, OpSize::B1),
                r(xr::RSI),
                r(xr::RDI)
            ]
        );
        assert_eq!(movs.srcs()[1..], [r(xr::RSI), r(xr::RDI)]);
        let cmps = dis(&[0xa6]);
        assert_eq!(cmps.num_srcs(), 4);
        roundtrip(&[0xf3, 0xa4]);
        roundtrip(&[0xf3, 0x48, 0xab]);
        roundtrip(&[0xf2, 0xae]);
        roundtrip(&[0xa6]);
        roundtrip(&[0xac]);
        roundtrip_in(IsaMode::Ia32, &[0xf3, 0xa5]);
    }

    #[test]
    fn string_operand_width_selects_the_form() {
        for (bytes, size) in [
            (&[0xa5][..], OpSize::B4),
            (&[0x66, 0xa5][..], OpSize::B2),
            (&[0x48, 0xa5][..], OpSize::B8),
            (&[0xa7][..], OpSize::B4),
            (&[0x48, 0xa7][..], OpSize::B8),
        ] {
            let instr = dis(bytes);
            let mem = instr.srcs().iter().find(|o| o.is_mem()).copied().unwrap();
            assert_eq!(mem.size(), size, "{:02x?}", bytes);
            roundtrip(bytes);
        }
        roundtrip_in(IsaMode::Ia32, &[0xa5]);
        roundtrip_in(IsaMode::Ia32, &[0xa7]);

        // A dword source cannot use the byte form.
        let wide = Operand::base_disp(xr::RSI, Reg::NULL, 0, 0, OpSize::B4);
        let dst = Operand::base_disp(xr::RDI, Reg::NULL, 0, 0, OpSize::B4);
        let movs = build(X86Op::Movs, &[dst, r(xr::RSI), r(xr::RDI)], &[wide, r(xr::RSI), r(xr::RDI)]);
        assert_eq!(asm(&movs), [0xa5]);
    }


    #[test]
    fn sse_and_mandatory_prefixes() {
        let addss = dis(&[0xf3, 0x0f, 0x58, 0xc1]);
        assert_eq!(addss.opcode(), op(X86Op::Addss));
        assert_eq!(addss.srcs(), &[r(xr::XMM1), r(xr::XMM0)]);
        assert!(!addss.prefixes().contains(Prefixes::REP));
        let cvt = dis(&[0xf2, 0x48, 0x0f, 0x2a, 0xc0]);
        assert_eq!(cvt.opcode(), op(X86Op::Cvtsi2sd));
        assert_eq!(cvt.src(0), r(xr::RAX));
        assert_eq!(dis(&[0xf3, 0x90]).opcode(), op(X86Op::Pause));
        assert_eq!(dis(&[0x90]).opcode(), op(X86Op::Nop));
        assert_eq!(dis(&[0x41, 0x90]).opcode(), op(X86Op::Xchg));
        for bytes in [
            &[0xf3, 0x0f, 0x58, 0xc1][..],
            &[0x66, 0x0f, 0x57, 0xc0],
            &[0xf2, 0x48, 0x0f, 0x2a, 0xc0],
            &[0xf2, 0x0f, 0x2a, 0xc0],
            &[0xf3, 0x0f, 0x2c, 0xc0],
            &[0x0f, 0x28, 0xc8],
            &[0xf2, 0x44, 0x0f, 0x10, 0x47, 0x08],
            &[0x0f, 0x2e, 0xc1],
            &[0xf3, 0x90],
            &[0x90],
            &[0x0f, 0xae, 0xf8],
            &[0x0f, 0xae, 0x14, 0x24],
        ] {
            roundtrip(bytes);
        }
        // lfence is only recognized with its canonical ModRM
        assert!(invalid_in(IsaMode::Amd64, &[0x0f, 0xae, 0xe9]));
    }

    #[test]
    fn x87_forms() {
        let fld = dis(&[0xd9, 0xc1]);
        assert_eq!(fld.opcode(), op(X86Op::Fld));
        assert_eq!(fld.srcs(), &[r(xr::ST1)]);
        let fsub = dis(&[0xdc, 0xe9]);
        assert_eq!(fsub.opcode(), op(X86Op::Fsub));
        assert_eq!(fsub.dsts(), &[r(xr::ST1)]);
        let mem = dis(&[0xdd, 0x45, 0xf8]);
        assert_eq!(mem.src(0), Operand::base_disp(xr::RBP, Reg::NULL, 0, -8, OpSize::B8));
        for bytes in [
            &[0xd9, 0xc1][..],
            &[0xdc, 0xe9],
            &[0xd8, 0xc2],
            &[0xdd, 0x45, 0xf8],
            &[0xd9, 0x04, 0x24],
            &[0xdb, 0x6d, 0x00],
            &[0xdb, 0xe3],
            &[0xdf, 0xe0],
            &[0xd9, 0x7d, 0xfe],
        ] {
            roundtrip(bytes);
        }
        let fld80 = build(X86Op::Fld, &[r(xr::ST0)], &[Operand::base_disp(xr::RAX, Reg::NULL, 0, 0, OpSize::B10)]);
        assert_eq!(asm(&fld80), [0xdb, 0x28]);
    }

    #[test]
    fn mode_specific_encodings() {
        assert_eq!(dis32(&[0x40]).opcode(), op(X86Op::Inc));
        assert_eq!(dis(&[0x48, 0x63, 0xc1]).opcode(), op(X86Op::Movsxd));
        assert!(invalid_in(IsaMode::Amd64, &[0xea, 0, 0, 0, 0, 0, 0]));
        let far = dis32(&[0xea, 0x78, 0x56, 0x34, 0x12, 0x08, 0x00]);
        assert_eq!(far.src(0), Operand::far_pc(8, 0x1234_5678));
        let abs = dis32(&[0x8b, 0x0d, 0x78, 0x56, 0x34, 0x12]);
        assert_eq!(abs.src(0), Operand::abs_addr(0x1234_5678, OpSize::B4));
        for bytes in [
            &[0x40][..],
            &[0xea, 0x78, 0x56, 0x34, 0x12, 0x08, 0x00],
            &[0x8b, 0x0d, 0x78, 0x56, 0x34, 0x12],
            &[0xff, 0x15, 0x78, 0x56, 0x34, 0x12],
            &[0x3e, 0x8b, 0x00],
            &[0x66, 0xb8, 0x34, 0x12],
        ] {
            roundtrip_in(IsaMode::Ia32, bytes);
        }
        let wide = Instr::build(IsaMode::Ia32, op(X86Op::Mov), &[r(xr::RAX)], &[r(xr::RBX)]);
        assert!(matches!(encode(&wide, PC), Err(IrError::IllegalOperand { .. })));
        let mut instr = Instr::new(IsaMode::Ia32);
        assert!(matches!(
            decode_in(IsaMode::Ia32, &[0x67, 0x8b, 0x07], PC, &mut instr, Level::Full),
            Err(IrError::UnsupportedOperand { .. })
        ));
    }

    #[test]
    fn segment_overrides() {
        // ds is dropped in 64-bit mode
        let plain = dis(&[0x3e, 0x8b, 0x00]);
        assert!(plain.src(0).segment().is_null());
        let gs = dis(&[0x65, 0x8b, 0x00]);
        assert_eq!(gs.src(0).segment(), xr::GS);
        roundtrip(&[0x65, 0x8b, 0x00]);
        let ds = build(
            X86Op::Mov,
            &[r(xr::EAX)],
            &[Operand::far_base_disp(xr::DS, xr::RAX, Reg::NULL, 0, 0, OpSize::B4)],
        );
        assert!(matches!(encode(&ds, PC), Err(IrError::IllegalOperand { .. })));
    }

    #[test]
    fn locked_and_exchanging_forms() {
        let xadd = dis(&[0xf0, 0x0f, 0xc1, 0x03]);
        assert!(xadd.prefixes().contains(Prefixes::LOCK));
        assert_eq!(xadd.dst(1), r(xr::EAX));
        roundtrip(&[0xf0, 0x0f, 0xc1, 0x03]);
        roundtrip(&[0x87, 0xd9]);
        roundtrip(&[0x41, 0x90]);
        roundtrip(&[0xf0, 0x48, 0x0f, 0xb1, 0x0e]);
        let split = build(X86Op::Add, &[r(xr::EAX)], &[r(xr::EBX), r(xr::ECX)]);
        assert!(matches!(encode(&split, PC), Err(IrError::IllegalOperand { .. })));
    }

    #[test]
    fn unallocated_bytes() {
        assert!(invalid_in(IsaMode::Amd64, &[0x0f, 0x0a]));
        assert!(invalid_in(IsaMode::Amd64, &[0xd6]));
        // lea with a register operand
        assert!(invalid_in(IsaMode::Amd64, &[0x8d, 0xc0]));
        // VEX encodings are sized but not decoded
        assert!(invalid_in(IsaMode::Amd64, &[0xc5, 0xf8, 0x77]));
        let mut instr = Instr::new(IsaMode::Amd64);
        assert_eq!(decode_in(IsaMode::Amd64, &[0xc5, 0xf8, 0x77], PC, &mut instr, Level::Raw), Ok(3));
    }

    #[test]
    fn full_decode_agrees_with_the_length_walker() {
        let corpus: &[&[u8]] = &[
            &[0x48, 0x81, 0xc4, 0x00, 0x01, 0x00, 0x00],
            &[0x66, 0x81, 0x3d, 0x10, 0x00, 0x00, 0x00, 0x34, 0x12],
            &[0xc8, 0x10, 0x00, 0x01],
            &[0x48, 0xa1, 1, 2, 3, 4, 5, 6, 7, 8],
            &[0xf6, 0x04, 0x24, 0x01],
            &[0x0f, 0xba, 0xe0, 0x1f],
            &[0xe4, 0x60],
            &[0xec],
        ];
        for bytes in corpus {
            let size = x86_length::sizeof(bytes, IsaMode::Amd64).unwrap();
            let mut instr = Instr::new(IsaMode::Amd64);
            assert_eq!(decode_in(IsaMode::Amd64, bytes, PC, &mut instr, Level::Full), Ok(size.length));
        }
    }

    #[test]
    fn raw_copies_are_rerelativized() {
        let call = relocate_raw(IsaMode::Amd64, &[0xe8, 0, 0, 0, 0], 0x1000, 0x2000).unwrap();
        assert_eq!(&call[..], [0xe8, 0x00, 0xf0, 0xff, 0xff]);
        let load = relocate_raw(IsaMode::Amd64, &[0x48, 0x8b, 0x05, 0x10, 0, 0, 0], 0x1000, 0x1100).unwrap();
        assert_eq!(&load[..], [0x48, 0x8b, 0x05, 0x10, 0xff, 0xff, 0xff]);
        let plain = relocate_raw(IsaMode::Amd64, &[0x48, 0x01, 0xd8], 0x1000, 0x9000).unwrap();
        assert_eq!(&plain[..], [0x48, 0x01, 0xd8]);
        assert!(matches!(
            relocate_raw(IsaMode::Amd64, &[0xeb, 0x00], 0x1000, 0x2000),
            Err(IrError::OperandOutOfRange {
                opcode: Opcode::X86(X86Op::JmpShort),
                ..
            })
        ));
    }

    #[test]
    fn defaults_come_from_the_first_encoding() {
        let (eflags, predicate) = defaults(op(X86Op::Adc)).unwrap();
        assert!(eflags.intersects(Eflags::READ_CF));
        assert_eq!(predicate, Predicate::None);
        assert!(defaults(Opcode::Invalid).is_none());
    }
}
