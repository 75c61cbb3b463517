//! Architectures, ISA modes, and the per-thread current mode.

use core::fmt;

/// Instruction-set architecture family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Arch {
    /// 32-bit and 64-bit x86.
    X86,
    /// 32-bit ARM (A32 and Thumb).
    Arm,
    /// 64-bit ARM.
    Aarch64,
    /// 64-bit RISC-V.
    Riscv,
}

/// Encoding a decode or encode call assumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IsaMode {
    /// 32-bit x86.
    Ia32,
    /// x86-64.
    Amd64,
    /// 32-bit ARM, A32 encoding.
    ArmA32,
    /// 32-bit ARM, Thumb (T16 / T32) encoding.
    Thumb,
    /// AArch64 (A64 encoding).
    Aarch64,
    /// RV64GC.
    Riscv64,
}

impl IsaMode {
    /// Architecture family of the mode.
    pub const fn arch(self) -> Arch {
        match self {
            IsaMode::Ia32 | IsaMode::Amd64 => Arch::X86,
            IsaMode::ArmA32 | IsaMode::Thumb => Arch::Arm,
            IsaMode::Aarch64 => Arch::Aarch64,
            IsaMode::Riscv64 => Arch::Riscv,
        }
    }

    /// Whether the instruction length is determined by at most one halfword.
    pub const fn is_fixed_width(self) -> bool {
        !matches!(self, IsaMode::Ia32 | IsaMode::Amd64)
    }

    /// Longest instruction in bytes.
    pub const fn max_instr_len(self) -> usize {
        match self {
            IsaMode::Ia32 | IsaMode::Amd64 => 17,
            _ => 4,
        }
    }

    /// Default pointer width in bytes.
    pub const fn pointer_size(self) -> usize {
        match self {
            IsaMode::Ia32 | IsaMode::ArmA32 | IsaMode::Thumb => 4,
            IsaMode::Amd64 | IsaMode::Aarch64 | IsaMode::Riscv64 => 8,
        }
    }

    /// Destination-list capacity for instructions of this mode.
    pub const fn max_dsts(self) -> usize {
        match self.arch() {
            Arch::Arm => 18,
            _ => 8,
        }
    }

    /// Source-list capacity for instructions of this mode.
    pub const fn max_srcs(self) -> usize {
        match self.arch() {
            Arch::Arm => 18,
            _ => 8,
        }
    }

    /// Whether support for this mode was compiled in.
    pub const fn is_available(self) -> bool {
        match self {
            IsaMode::Ia32 => cfg!(feature = "x86"),
            IsaMode::Amd64 => cfg!(feature = "x86_64"),
            IsaMode::ArmA32 | IsaMode::Thumb => cfg!(feature = "arm"),
            IsaMode::Aarch64 => cfg!(feature = "aarch64"),
            IsaMode::Riscv64 => cfg!(feature = "riscv"),
        }
    }

    #[cfg_attr(feature = "std", allow(dead_code))]
    const fn to_u8(self) -> u8 {
        match self {
            IsaMode::Ia32 => 0,
            IsaMode::Amd64 => 1,
            IsaMode::ArmA32 => 2,
            IsaMode::Thumb => 3,
            IsaMode::Aarch64 => 4,
            IsaMode::Riscv64 => 5,
        }
    }

    #[cfg(not(feature = "std"))]
    const fn from_u8(v: u8) -> IsaMode {
        match v {
            0 => IsaMode::Ia32,
            1 => IsaMode::Amd64,
            2 => IsaMode::ArmA32,
            3 => IsaMode::Thumb,
            4 => IsaMode::Aarch64,
            _ => IsaMode::Riscv64,
        }
    }
}

impl fmt::Display for IsaMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IsaMode::Ia32 => "ia32",
            IsaMode::Amd64 => "amd64",
            IsaMode::ArmA32 => "arm",
            IsaMode::Thumb => "thumb",
            IsaMode::Aarch64 => "aarch64",
            IsaMode::Riscv64 => "riscv64",
        })
    }
}

// ── Default mode ─────────────────────────────────────────────────────────

/// Mode a thread starts in: the host's own encoding when compiled in,
/// otherwise the first enabled architecture.
pub const fn default_isa_mode() -> IsaMode {
    if cfg!(all(target_arch = "x86_64", feature = "x86_64")) {
        IsaMode::Amd64
    } else if cfg!(all(target_arch = "x86", feature = "x86")) {
        IsaMode::Ia32
    } else if cfg!(all(target_arch = "aarch64", feature = "aarch64")) {
        IsaMode::Aarch64
    } else if cfg!(all(target_arch = "arm", feature = "arm")) {
        IsaMode::ArmA32
    } else if cfg!(all(target_arch = "riscv64", feature = "riscv")) {
        IsaMode::Riscv64
    } else if cfg!(feature = "x86_64") {
        IsaMode::Amd64
    } else if cfg!(feature = "x86") {
        IsaMode::Ia32
    } else if cfg!(feature = "aarch64") {
        IsaMode::Aarch64
    } else if cfg!(feature = "arm") {
        IsaMode::ArmA32
    } else {
        IsaMode::Riscv64
    }
}

// ── Current mode ─────────────────────────────────────────────────────────

#[cfg(feature = "std")]
mod state {
    use super::{default_isa_mode, IsaMode};
    use core::cell::Cell;

    std::thread_local! {
        static MODE: Cell<IsaMode> = const { Cell::new(default_isa_mode()) };
        static ENGINE: Cell<Option<fn(u64) -> bool>> = const { Cell::new(None) };
    }

    pub(super) fn get() -> IsaMode {
        MODE.with(Cell::get)
    }

    pub(super) fn set(mode: IsaMode) -> IsaMode {
        MODE.with(|m| m.replace(mode))
    }

    pub(super) fn set_engine(pred: Option<fn(u64) -> bool>) {
        ENGINE.with(|e| e.set(pred));
    }

    pub(super) fn engine() -> Option<fn(u64) -> bool> {
        ENGINE.with(Cell::get)
    }
}

#[cfg(not(feature = "std"))]
mod state {
    use super::{default_isa_mode, IsaMode};
    use core::sync::atomic::{AtomicU8, Ordering};

    static MODE: AtomicU8 = AtomicU8::new(default_isa_mode().to_u8());

    pub(super) fn get() -> IsaMode {
        IsaMode::from_u8(MODE.load(Ordering::Relaxed))
    }

    pub(super) fn set(mode: IsaMode) -> IsaMode {
        IsaMode::from_u8(MODE.swap(mode.to_u8(), Ordering::Relaxed))
    }

    pub(super) fn set_engine(_pred: Option<fn(u64) -> bool>) {}

    pub(super) fn engine() -> Option<fn(u64) -> bool> {
        None
    }
}

/// Current thread's ISA mode.
///
/// Without `std` there are no threads to distinguish and the mode is a single
/// process-wide value.
pub fn isa_mode() -> IsaMode {
    state::get()
}

/// Switch the current thread's ISA mode, returning the previous one.
pub fn set_isa_mode(mode: IsaMode) -> IsaMode {
    let old = state::set(mode);
    if old != mode {
        log::trace!("isa mode {} -> {}", old, mode);
    }
    old
}

/// Run `f` with the thread switched to `mode`, then restore the previous mode.
pub fn with_isa_mode<R>(mode: IsaMode, f: impl FnOnce() -> R) -> R {
    struct Restore(IsaMode);
    impl Drop for Restore {
        fn drop(&mut self) {
            state::set(self.0);
        }
    }
    let _restore = Restore(state::set(mode));
    f()
}

/// Install (or clear) the predicate naming engine-owned code addresses.
///
/// The predicate only silences decode-failure diagnostics; it never changes
/// a decode result. Requires `std` (without it the call is ignored).
pub fn set_engine_memory(pred: Option<fn(u64) -> bool>) {
    state::set_engine(pred);
}

/// Whether `pc` lies in engine-owned memory according to the installed predicate.
pub fn is_engine_address(pc: u64) -> bool {
    state::engine().is_some_and(|pred| pred(pc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_properties() {
        assert_eq!(IsaMode::Amd64.max_instr_len(), 17);
        assert_eq!(IsaMode::Thumb.max_instr_len(), 4);
        assert_eq!(IsaMode::Ia32.pointer_size(), 4);
        assert_eq!(IsaMode::Riscv64.pointer_size(), 8);
        assert!(IsaMode::Aarch64.is_fixed_width());
        assert!(!IsaMode::Ia32.is_fixed_width());
        assert!(IsaMode::ArmA32.max_dsts() > 16);
        assert_eq!(IsaMode::Thumb.arch(), Arch::Arm);
    }

    #[cfg(feature = "std")]
    #[test]
    fn set_returns_previous() {
        let start = isa_mode();
        let prev = set_isa_mode(IsaMode::Riscv64);
        assert_eq!(prev, start);
        assert_eq!(isa_mode(), IsaMode::Riscv64);
        set_isa_mode(start);
    }

    #[cfg(feature = "std")]
    #[test]
    fn scoped_mode_restores() {
        let start = isa_mode();
        let inside = with_isa_mode(IsaMode::Thumb, isa_mode);
        assert_eq!(inside, IsaMode::Thumb);
        assert_eq!(isa_mode(), start);
    }

    #[cfg(feature = "std")]
    #[test]
    fn mode_is_per_thread() {
        set_isa_mode(IsaMode::Thumb);
        let other = std::thread::spawn(isa_mode).join().unwrap_or(IsaMode::Thumb);
        assert_eq!(other, default_isa_mode());
        set_isa_mode(default_isa_mode());
    }

    #[cfg(feature = "std")]
    #[test]
    fn engine_predicate() {
        assert!(!is_engine_address(0x1000));
        set_engine_memory(Some(|pc| (0x1000..0x2000).contains(&pc)));
        assert!(is_engine_address(0x1800));
        assert!(!is_engine_address(0x2000));
        set_engine_memory(None);
        assert!(!is_engine_address(0x1800));
    }
}
