//! Architecture-neutral register id space.
//!
//! Every register of every supported architecture has one [`Reg`] id. Ids are
//! grouped in contiguous runs (one run per register class and width) so that
//! decoders can compute a register from an encoding number with plain
//! arithmetic, and so that sub-register relationships ("`eax` lives inside
//! `rax`", "`s3` lives inside `d1` inside `q0`") are cheap to answer.

use core::fmt;

use crate::isa::Arch;
use crate::size::OpSize;

/// Register id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Reg(u16);

/// Coarse register class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegClass {
    /// The null register.
    None,
    /// General purpose register.
    Gpr,
    /// x86 legacy high-byte register (`ah`, `ch`, `dh`, `bh`).
    GprHigh8,
    /// x86 segment register.
    Segment,
    /// SIMD / vector register (`xmm`, ARM `s`/`d`/`q`, AArch64 `b`..`q`).
    Simd,
    /// x87 stack register.
    X87,
    /// MMX register.
    Mmx,
    /// RISC-V floating point register.
    Fp,
    /// Instruction pointer (`rip`, `eip`).
    Pc,
    /// Stack pointer that is not a numbered GPR (AArch64 `sp`, `wsp`).
    Sp,
    /// AArch64 zero register.
    Zero,
    /// Status / control register (`cpsr`, `nzcv`, `fcsr`, ...).
    Status,
}

// ── Id layout ────────────────────────────────────────────────────────────

const X86_GPR64: u16 = 1;
const X86_GPR32: u16 = X86_GPR64 + 16;
const X86_GPR16: u16 = X86_GPR32 + 16;
const X86_GPR8: u16 = X86_GPR16 + 16;
const X86_GPR8H: u16 = X86_GPR8 + 16;
const X86_SEG: u16 = X86_GPR8H + 4;
const X86_XMM: u16 = X86_SEG + 6;
const X86_ST: u16 = X86_XMM + 16;
const X86_MM: u16 = X86_ST + 8;
const X86_RIP: u16 = X86_MM + 8;
const X86_EIP: u16 = X86_RIP + 1;
const X86_END: u16 = X86_EIP + 1;

const ARM_R: u16 = 128;
const ARM_S: u16 = ARM_R + 16;
const ARM_D: u16 = ARM_S + 32;
const ARM_Q: u16 = ARM_D + 32;
const ARM_CPSR: u16 = ARM_Q + 16;
const ARM_SPSR: u16 = ARM_CPSR + 1;
const ARM_FPSCR: u16 = ARM_SPSR + 1;
const ARM_END: u16 = ARM_FPSCR + 1;

const A64_X: u16 = 256;
const A64_SP: u16 = A64_X + 31;
const A64_XZR: u16 = A64_SP + 1;
const A64_W: u16 = A64_XZR + 1;
const A64_WSP: u16 = A64_W + 31;
const A64_WZR: u16 = A64_WSP + 1;
const A64_B: u16 = A64_WZR + 1;
const A64_H: u16 = A64_B + 32;
const A64_S: u16 = A64_H + 32;
const A64_D: u16 = A64_S + 32;
const A64_Q: u16 = A64_D + 32;
const A64_NZCV: u16 = A64_Q + 32;
const A64_FPCR: u16 = A64_NZCV + 1;
const A64_FPSR: u16 = A64_FPCR + 1;
const A64_END: u16 = A64_FPSR + 1;

const RV_X: u16 = 512;
const RV_F: u16 = RV_X + 32;
const RV_FCSR: u16 = RV_F + 32;
const RV_END: u16 = RV_FCSR + 1;

macro_rules! sequential {
    ($base:expr; $($name:ident),+ $(,)?) => {
        sequential!(@ $base; $($name),+);
    };
    (@ $n:expr; $first:ident $(, $rest:ident)*) => {
        #[allow(missing_docs)]
        pub const $first: Reg = Reg($n);
        sequential!(@ $n + 1; $($rest),*);
    };
    (@ $n:expr;) => {};
}

/// x86 / x86-64 registers.
pub mod x86 {
    use super::*;

    sequential!(X86_GPR64; RAX, RCX, RDX, RBX, RSP, RBP, RSI, RDI,
        R8, R9, R10, R11, R12, R13, R14, R15);
    sequential!(X86_GPR32; EAX, ECX, EDX, EBX, ESP, EBP, ESI, EDI,
        R8D, R9D, R10D, R11D, R12D, R13D, R14D, R15D);
    sequential!(X86_GPR16; AX, CX, DX, BX, SP, BP, SI, DI,
        R8W, R9W, R10W, R11W, R12W, R13W, R14W, R15W);
    sequential!(X86_GPR8; AL, CL, DL, BL, SPL, BPL, SIL, DIL,
        R8B, R9B, R10B, R11B, R12B, R13B, R14B, R15B);
    sequential!(X86_GPR8H; AH, CH, DH, BH);
    sequential!(X86_SEG; ES, CS, SS, DS, FS, GS);
    sequential!(X86_XMM; XMM0, XMM1, XMM2, XMM3, XMM4, XMM5, XMM6, XMM7,
        XMM8, XMM9, XMM10, XMM11, XMM12, XMM13, XMM14, XMM15);
    sequential!(X86_ST; ST0, ST1, ST2, ST3, ST4, ST5, ST6, ST7);
    sequential!(X86_MM; MM0, MM1, MM2, MM3, MM4, MM5, MM6, MM7);
    #[allow(missing_docs)]
    pub const RIP: Reg = Reg(X86_RIP);
    #[allow(missing_docs)]
    pub const EIP: Reg = Reg(X86_EIP);

    /// General purpose register `num` (0..=15) at `size`.
    ///
    /// With `size == B1` and `legacy_high` set, numbers 4..=7 name
    /// `ah`/`ch`/`dh`/`bh` (no REX prefix present).
    pub fn gpr(num: u8, size: OpSize, legacy_high: bool) -> Reg {
        let num = (num & 0xf) as u16;
        match size {
            OpSize::B8 => Reg(X86_GPR64 + num),
            OpSize::B2 => Reg(X86_GPR16 + num),
            OpSize::B1 if legacy_high && (4..8).contains(&num) => Reg(X86_GPR8H + num - 4),
            OpSize::B1 => Reg(X86_GPR8 + num),
            _ => Reg(X86_GPR32 + num),
        }
    }

    /// Segment register by its 3-bit encoding, if defined.
    pub fn segment(num: u8) -> Option<Reg> {
        (num < 6).then(|| Reg(X86_SEG + num as u16))
    }

    /// `xmm` register `num`.
    pub fn xmm(num: u8) -> Reg {
        Reg(X86_XMM + (num & 0xf) as u16)
    }

    /// x87 stack register `st(num)`.
    pub fn st(num: u8) -> Reg {
        Reg(X86_ST + (num & 7) as u16)
    }

    /// MMX register `num`.
    pub fn mm(num: u8) -> Reg {
        Reg(X86_MM + (num & 7) as u16)
    }
}

/// 32-bit ARM (A32 / Thumb) registers.
pub mod arm {
    use super::*;

    sequential!(ARM_R; R0, R1, R2, R3, R4, R5, R6, R7, R8, R9, R10, R11, R12, SP, LR, PC);
    #[allow(missing_docs)]
    pub const CPSR: Reg = Reg(ARM_CPSR);
    #[allow(missing_docs)]
    pub const SPSR: Reg = Reg(ARM_SPSR);
    #[allow(missing_docs)]
    pub const FPSCR: Reg = Reg(ARM_FPSCR);

    /// Core register `num` (0..=15).
    pub fn gpr(num: u8) -> Reg {
        Reg(ARM_R + (num & 0xf) as u16)
    }

    /// Single-precision register `s<num>` (0..=31).
    pub fn s(num: u8) -> Reg {
        Reg(ARM_S + (num & 0x1f) as u16)
    }

    /// Double-precision register `d<num>` (0..=31).
    pub fn d(num: u8) -> Reg {
        Reg(ARM_D + (num & 0x1f) as u16)
    }

    /// Quad register `q<num>` (0..=15).
    pub fn q(num: u8) -> Reg {
        Reg(ARM_Q + (num & 0xf) as u16)
    }
}

/// AArch64 registers.
pub mod a64 {
    use super::*;

    sequential!(A64_X; X0, X1, X2, X3, X4, X5, X6, X7, X8, X9, X10, X11, X12, X13, X14, X15,
        X16, X17, X18, X19, X20, X21, X22, X23, X24, X25, X26, X27, X28, X29, X30);
    sequential!(A64_W; W0, W1, W2, W3, W4, W5, W6, W7, W8, W9, W10, W11, W12, W13, W14, W15,
        W16, W17, W18, W19, W20, W21, W22, W23, W24, W25, W26, W27, W28, W29, W30);
    #[allow(missing_docs)]
    pub const SP: Reg = Reg(A64_SP);
    #[allow(missing_docs)]
    pub const XZR: Reg = Reg(A64_XZR);
    #[allow(missing_docs)]
    pub const WSP: Reg = Reg(A64_WSP);
    #[allow(missing_docs)]
    pub const WZR: Reg = Reg(A64_WZR);
    #[allow(missing_docs)]
    pub const NZCV: Reg = Reg(A64_NZCV);
    #[allow(missing_docs)]
    pub const FPCR: Reg = Reg(A64_FPCR);
    #[allow(missing_docs)]
    pub const FPSR: Reg = Reg(A64_FPSR);
    /// Link register alias.
    pub const LR: Reg = X30;

    /// General purpose register `num`; 31 is `sp` when `sp_form`, else the
    /// zero register.
    pub fn gpr(num: u8, is64: bool, sp_form: bool) -> Reg {
        let num = (num & 0x1f) as u16;
        match (num, is64, sp_form) {
            (31, true, true) => Reg(A64_SP),
            (31, true, false) => Reg(A64_XZR),
            (31, false, true) => Reg(A64_WSP),
            (31, false, false) => Reg(A64_WZR),
            (n, true, _) => Reg(A64_X + n),
            (n, false, _) => Reg(A64_W + n),
        }
    }

    /// Scalar SIMD/FP register `num` of `size` bytes (1, 2, 4, 8 or 16).
    pub fn vreg(num: u8, size: OpSize) -> Reg {
        let num = (num & 0x1f) as u16;
        let base = match size {
            OpSize::B1 => A64_B,
            OpSize::B2 => A64_H,
            OpSize::B4 => A64_S,
            OpSize::B8 => A64_D,
            _ => A64_Q,
        };
        Reg(base + num)
    }
}

/// RISC-V registers.
pub mod rv {
    use super::*;

    sequential!(RV_X; X0, X1, X2, X3, X4, X5, X6, X7, X8, X9, X10, X11, X12, X13, X14, X15,
        X16, X17, X18, X19, X20, X21, X22, X23, X24, X25, X26, X27, X28, X29, X30, X31);
    sequential!(RV_F; F0, F1, F2, F3, F4, F5, F6, F7, F8, F9, F10, F11, F12, F13, F14, F15,
        F16, F17, F18, F19, F20, F21, F22, F23, F24, F25, F26, F27, F28, F29, F30, F31);
    #[allow(missing_docs)]
    pub const FCSR: Reg = Reg(RV_FCSR);
    /// `zero` alias.
    pub const ZERO: Reg = X0;
    /// Return address alias.
    pub const RA: Reg = X1;
    /// Stack pointer alias.
    pub const SP: Reg = X2;

    /// Integer register `num` (0..=31).
    pub fn x(num: u8) -> Reg {
        Reg(RV_X + (num & 0x1f) as u16)
    }

    /// Floating point register `num` (0..=31).
    pub fn f(num: u8) -> Reg {
        Reg(RV_F + (num & 0x1f) as u16)
    }
}

const X86_GPR8_NAMES: [&str; 16] = [
    "al", "cl", "dl", "bl", "spl", "bpl", "sil", "dil", "r8b", "r9b", "r10b", "r11b", "r12b",
    "r13b", "r14b", "r15b",
];
const X86_GPR16_NAMES: [&str; 8] = ["ax", "cx", "dx", "bx", "sp", "bp", "si", "di"];
const X86_GPR64_NAMES: [&str; 8] = ["rax", "rcx", "rdx", "rbx", "rsp", "rbp", "rsi", "rdi"];
const X86_HIGH8_NAMES: [&str; 4] = ["ah", "ch", "dh", "bh"];
const X86_SEG_NAMES: [&str; 6] = ["es", "cs", "ss", "ds", "fs", "gs"];
const RV_ABI_NAMES: [&str; 32] = [
    "zero", "ra", "sp", "gp", "tp", "t0", "t1", "t2", "s0", "s1", "a0", "a1", "a2", "a3", "a4",
    "a5", "a6", "a7", "s2", "s3", "s4", "s5", "s6", "s7", "s8", "s9", "s10", "s11", "t3", "t4",
    "t5", "t6",
];

fn in_run(id: u16, base: u16, len: u16) -> Option<u16> {
    (id >= base && id < base + len).then(|| id - base)
}

impl Reg {
    /// "No register".
    pub const NULL: Reg = Reg(0);

    /// Raw id.
    pub const fn id(self) -> u16 {
        self.0
    }

    /// Whether this is [`Reg::NULL`].
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Architecture owning this register.
    pub fn arch(self) -> Option<Arch> {
        match self.0 {
            0 => None,
            id if id < X86_END => Some(Arch::X86),
            id if (ARM_R..ARM_END).contains(&id) => Some(Arch::Arm),
            id if (A64_X..A64_END).contains(&id) => Some(Arch::Aarch64),
            id if (RV_X..RV_END).contains(&id) => Some(Arch::Riscv),
            _ => None,
        }
    }

    /// Register class.
    pub fn class(self) -> RegClass {
        let id = self.0;
        match id {
            0 => RegClass::None,
            _ if id < X86_GPR8H => RegClass::Gpr,
            _ if id < X86_SEG => RegClass::GprHigh8,
            _ if id < X86_XMM => RegClass::Segment,
            _ if id < X86_ST => RegClass::Simd,
            _ if id < X86_MM => RegClass::X87,
            _ if id < X86_RIP => RegClass::Mmx,
            _ if id < X86_END => RegClass::Pc,
            _ if (ARM_R..ARM_S).contains(&id) => RegClass::Gpr,
            _ if (ARM_S..ARM_CPSR).contains(&id) => RegClass::Simd,
            _ if (ARM_CPSR..ARM_END).contains(&id) => RegClass::Status,
            _ if (A64_X..A64_SP).contains(&id) || (A64_W..A64_WSP).contains(&id) => RegClass::Gpr,
            _ if id == A64_SP || id == A64_WSP => RegClass::Sp,
            _ if id == A64_XZR || id == A64_WZR => RegClass::Zero,
            _ if (A64_B..A64_NZCV).contains(&id) => RegClass::Simd,
            _ if (A64_NZCV..A64_END).contains(&id) => RegClass::Status,
            _ if (RV_X..RV_F).contains(&id) => RegClass::Gpr,
            _ if (RV_F..RV_FCSR).contains(&id) => RegClass::Fp,
            _ if id == RV_FCSR => RegClass::Status,
            _ => RegClass::None,
        }
    }

    /// Encoding number within the register's class (`r13` → 13, `w31`-forms → 31).
    pub fn number(self) -> u8 {
        let id = self.0;
        let runs: &[(u16, u16)] = &[
            (X86_GPR64, 16),
            (X86_GPR32, 16),
            (X86_GPR16, 16),
            (X86_GPR8, 16),
            (X86_XMM, 16),
            (X86_ST, 8),
            (X86_MM, 8),
            (X86_SEG, 6),
            (ARM_R, 16),
            (ARM_S, 32),
            (ARM_D, 32),
            (ARM_Q, 16),
            (A64_X, 31),
            (A64_W, 31),
            (A64_B, 32),
            (A64_H, 32),
            (A64_S, 32),
            (A64_D, 32),
            (A64_Q, 32),
            (RV_X, 32),
            (RV_F, 32),
        ];
        for &(base, len) in runs {
            if let Some(n) = in_run(id, base, len) {
                return n as u8;
            }
        }
        match id {
            _ if (X86_GPR8H..X86_SEG).contains(&id) => (id - X86_GPR8H + 4) as u8,
            A64_SP | A64_XZR | A64_WSP | A64_WZR => 31,
            X86_RIP | X86_EIP => 5,
            _ => 0,
        }
    }

    /// Natural width.
    pub fn size(self) -> OpSize {
        let id = self.0;
        match id {
            0 => OpSize::None,
            _ if id < X86_GPR32 => OpSize::B8,
            _ if id < X86_GPR16 => OpSize::B4,
            _ if id < X86_GPR8 => OpSize::B2,
            _ if id < X86_SEG => OpSize::B1,
            _ if id < X86_XMM => OpSize::B2,
            _ if id < X86_ST => OpSize::B16,
            _ if id < X86_MM => OpSize::B10,
            _ if id < X86_RIP => OpSize::B8,
            X86_RIP => OpSize::B8,
            X86_EIP => OpSize::B4,
            _ if (ARM_R..ARM_S).contains(&id) => OpSize::B4,
            _ if (ARM_S..ARM_D).contains(&id) => OpSize::B4,
            _ if (ARM_D..ARM_Q).contains(&id) => OpSize::B8,
            _ if (ARM_Q..ARM_CPSR).contains(&id) => OpSize::B16,
            _ if (ARM_CPSR..ARM_END).contains(&id) => OpSize::B4,
            _ if (A64_X..A64_W).contains(&id) => OpSize::B8,
            _ if (A64_W..A64_B).contains(&id) => OpSize::B4,
            _ if (A64_B..A64_H).contains(&id) => OpSize::B1,
            _ if (A64_H..A64_S).contains(&id) => OpSize::B2,
            _ if (A64_S..A64_D).contains(&id) => OpSize::B4,
            _ if (A64_D..A64_Q).contains(&id) => OpSize::B8,
            _ if (A64_Q..A64_NZCV).contains(&id) => OpSize::B16,
            _ if (A64_NZCV..A64_END).contains(&id) => OpSize::B4,
            _ if (RV_X..RV_FCSR).contains(&id) => OpSize::B8,
            RV_FCSR => OpSize::B4,
            _ => OpSize::None,
        }
    }

    /// The widest register that contains this one (itself if none does).
    pub fn containing(self) -> Reg {
        let id = self.0;
        let n = self.number() as u16;
        match id {
            _ if (X86_GPR32..X86_GPR8H).contains(&id) => Reg(X86_GPR64 + n),
            _ if (X86_GPR8H..X86_SEG).contains(&id) => Reg(X86_GPR64 + n - 4),
            X86_EIP => Reg(X86_RIP),
            _ if (ARM_S..ARM_D).contains(&id) => Reg(ARM_Q + n / 4),
            _ if (ARM_D..ARM_Q).contains(&id) => Reg(ARM_Q + n / 2),
            _ if (A64_W..A64_WSP).contains(&id) => Reg(A64_X + n),
            A64_WSP => Reg(A64_SP),
            A64_WZR => Reg(A64_XZR),
            _ if (A64_B..A64_Q).contains(&id) => Reg(A64_Q + n),
            _ => self,
        }
    }

    /// Whether the two registers share any storage.
    pub fn overlaps(self, other: Reg) -> bool {
        if self.is_null() || other.is_null() {
            return false;
        }
        if self == other {
            return true;
        }
        if self.containing() != other.containing() {
            return false;
        }
        // ah/al and ARM s/d pairs share a container without overlapping.
        match (self.class(), other.class()) {
            (RegClass::GprHigh8, RegClass::Gpr) | (RegClass::Gpr, RegClass::GprHigh8) => {
                let low = if self.class() == RegClass::Gpr { self } else { other };
                low.size() != OpSize::B1
            }
            _ if self.arch() == Some(Arch::Arm) => {
                let span = |r: Reg| -> (u16, u16) {
                    let n = r.number() as u16;
                    match r.size() {
                        OpSize::B4 => (n, n + 1),
                        OpSize::B8 => (n * 2, n * 2 + 2),
                        _ => (n * 4, n * 4 + 4),
                    }
                };
                let (a0, a1) = span(self);
                let (b0, b1) = span(other);
                a0 < b1 && b0 < a1
            }
            _ => true,
        }
    }

    /// Same-numbered register at another width, if the class has one.
    pub fn resize(self, size: OpSize) -> Option<Reg> {
        let n = self.number();
        match self.arch()? {
            Arch::X86 if matches!(self.class(), RegClass::Gpr | RegClass::GprHigh8) => {
                let num = if self.class() == RegClass::GprHigh8 { n - 4 } else { n };
                match size {
                    OpSize::B1 | OpSize::B2 | OpSize::B4 | OpSize::B8 => {
                        Some(x86::gpr(num, size, false))
                    }
                    _ => None,
                }
            }
            Arch::Aarch64 => match (self.class(), size) {
                (RegClass::Gpr | RegClass::Sp | RegClass::Zero, OpSize::B8 | OpSize::B4) => {
                    Some(a64::gpr(n, size == OpSize::B8, self.class() == RegClass::Sp))
                }
                (RegClass::Simd, _) => Some(a64::vreg(n, size)),
                _ => None,
            },
            _ if self.size() == size => Some(self),
            _ => None,
        }
    }

    /// General purpose register (of any width).
    pub fn is_gpr(self) -> bool {
        matches!(self.class(), RegClass::Gpr | RegClass::GprHigh8)
    }

    /// SIMD / vector register.
    pub fn is_simd(self) -> bool {
        self.class() == RegClass::Simd
    }

    /// Floating point register (x87 stack or RISC-V `f`).
    pub fn is_fp(self) -> bool {
        matches!(self.class(), RegClass::X87 | RegClass::Fp)
    }

    /// x86 segment register.
    pub fn is_segment(self) -> bool {
        self.class() == RegClass::Segment
    }

    /// x86 register that needs a REX prefix bit (number ≥ 8) or forces REX
    /// (`spl`..`dil`).
    pub(crate) fn x86_needs_rex(self) -> bool {
        let id = self.0;
        self.number() >= 8 || (X86_GPR8 + 4..X86_GPR8 + 8).contains(&id)
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = self.0;
        let n = self.number();
        match id {
            0 => write!(f, "null"),
            _ if id < X86_GPR32 => match X86_GPR64_NAMES.get(n as usize) {
                Some(name) => f.write_str(name),
                None => write!(f, "r{}", n),
            },
            _ if id < X86_GPR16 => match X86_GPR16_NAMES.get(n as usize) {
                Some(name) => write!(f, "e{}", name),
                None => write!(f, "r{}d", n),
            },
            _ if id < X86_GPR8 => match X86_GPR16_NAMES.get(n as usize) {
                Some(name) => f.write_str(name),
                None => write!(f, "r{}w", n),
            },
            _ if id < X86_GPR8H => f.write_str(X86_GPR8_NAMES[n as usize]),
            _ if id < X86_SEG => f.write_str(X86_HIGH8_NAMES[(n - 4) as usize]),
            _ if id < X86_XMM => f.write_str(X86_SEG_NAMES[n as usize]),
            _ if id < X86_ST => write!(f, "xmm{}", n),
            _ if id < X86_MM => write!(f, "st{}", n),
            _ if id < X86_RIP => write!(f, "mm{}", n),
            X86_RIP => write!(f, "rip"),
            X86_EIP => write!(f, "eip"),
            _ if (ARM_R..ARM_S).contains(&id) => match n {
                13 => write!(f, "sp"),
                14 => write!(f, "lr"),
                15 => write!(f, "pc"),
                _ => write!(f, "r{}", n),
            },
            _ if (ARM_S..ARM_D).contains(&id) => write!(f, "s{}", n),
            _ if (ARM_D..ARM_Q).contains(&id) => write!(f, "d{}", n),
            _ if (ARM_Q..ARM_CPSR).contains(&id) => write!(f, "q{}", n),
            ARM_CPSR => write!(f, "cpsr"),
            ARM_SPSR => write!(f, "spsr"),
            ARM_FPSCR => write!(f, "fpscr"),
            _ if (A64_X..A64_SP).contains(&id) => write!(f, "x{}", n),
            A64_SP => write!(f, "sp"),
            A64_XZR => write!(f, "xzr"),
            _ if (A64_W..A64_WSP).contains(&id) => write!(f, "w{}", n),
            A64_WSP => write!(f, "wsp"),
            A64_WZR => write!(f, "wzr"),
            _ if (A64_B..A64_H).contains(&id) => write!(f, "b{}", n),
            _ if (A64_H..A64_S).contains(&id) => write!(f, "h{}", n),
            _ if (A64_S..A64_D).contains(&id) => write!(f, "s{}", n),
            _ if (A64_D..A64_Q).contains(&id) => write!(f, "d{}", n),
            _ if (A64_Q..A64_NZCV).contains(&id) => write!(f, "q{}", n),
            A64_NZCV => write!(f, "nzcv"),
            A64_FPCR => write!(f, "fpcr"),
            A64_FPSR => write!(f, "fpsr"),
            _ if (RV_X..RV_F).contains(&id) => f.write_str(RV_ABI_NAMES[n as usize]),
            _ if (RV_F..RV_FCSR).contains(&id) => write!(f, "f{}", n),
            RV_FCSR => write!(f, "fcsr"),
            _ => write!(f, "reg{}", id),
        }
    }
}
