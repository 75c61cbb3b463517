//! Decode table engine.
//!
//! Every architecture describes its encodings as a forest of static tables.
//! A table is an array of [`Entry`] records; an entry is either a terminal
//! opcode definition ([`OpInfo`]), an extension marker redirecting to a
//! secondary table, or the invalid sentinel. Secondary tables are addressed by
//! `(kind, set)` pairs so that many rows can share one table, and same-opcode
//! entries are chained through coordinates ([`EntryRef`]) rather than
//! pointers. The architecture-specific part is the [`Layout`] trait: which
//! tables exist, how wide each kind is, and which bits pick a row.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use bitflags::bitflags;

use crate::error::IrError;
use crate::instr::{Eflags, Opcode};
use crate::isa::IsaMode;
use crate::size::OpSize;

// ── Entry flags ──────────────────────────────────────────────────────────

bitflags! {
    /// Per-entry flag word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Flags: u32 {
        /// `next` leads to a side-table entry holding more operand slots.
        const EXTRA_OPERANDS = 0x0000_0001;
        /// The extra operands are a shift (type, amount).
        const EXTRA_SHIFT = 0x0000_0002;
        /// The extra operands include a writeback base.
        const EXTRA_WRITEBACK = 0x0000_0004;
        /// Second writeback form of the extra operands.
        const EXTRA_WRITEBACK2 = 0x0000_0008;
        /// The second destination slot holds a fourth source.
        const SRC4 = 0x0000_0010;
        /// The first source slot holds a third destination.
        const DST3 = 0x0000_0020;
        /// Predicate in bits 31:28.
        const PREDICATE_28 = 0x0000_0040;
        /// Predicate in bits 31:28, which must be `al`.
        const PREDICATE_28_AL = 0x0000_0080;
        /// Predicate in bits 25:22 (Thumb conditional branch, T32 `b.w`).
        const PREDICATE_22 = 0x0000_0100;
        /// Predicate in bits 11:8 (Thumb conditional branch).
        const PREDICATE_8 = 0x0000_0200;
        /// Architecturally unpredictable for some operand values; informational.
        const UNPREDICTABLE = 0x0000_0400;
        /// Introduced in ARMv8.
        const ARM_V8 = 0x0000_0800;
        /// VFP instruction.
        const VFP = 0x0000_1000;
        /// Valid only in 64-bit mode.
        const X64_ONLY = 0x0000_2000;
        /// Valid only in 32-bit mode.
        const X86_ONLY = 0x0000_4000;
        /// Requires `REX.W`.
        const REQUIRES_REX_W = 0x0000_8000;
        /// 16-bit compressed encoding.
        const COMPRESSED = 0x0001_0000;
        /// Predicate in bits 3:0: the A64 `b.cond` word, the x86 `jcc`/`setcc`/`cmovcc`
        /// opcode byte.
        const PREDICATE_0 = 0x0002_0000;
    }
}

impl Flags {
    /// No flags.
    pub const NONE: Flags = Flags::empty();

    /// Whether the entry carries any predicate field.
    pub const fn has_predicate(self) -> bool {
        self.intersects(
            Flags::PREDICATE_28
                .union(Flags::PREDICATE_28_AL)
                .union(Flags::PREDICATE_22)
                .union(Flags::PREDICATE_8)
                .union(Flags::PREDICATE_0),
        )
    }
}

// ── Layout ───────────────────────────────────────────────────────────────

/// Operand slot: an architecture operand-type tag plus a size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot<T> {
    /// Operand type tag.
    pub ty: T,
    /// Size tag.
    pub size: OpSize,
}

/// Architecture description consumed by the engine.
pub trait Layout: Copy + Eq + fmt::Debug + 'static {
    /// Table kinds (the discriminant of extension markers and of root tables).
    type Ext: Copy + Eq + fmt::Debug + 'static;
    /// Operand type tags.
    type Ty: Copy + Eq + fmt::Debug + 'static;

    /// Operand type closing out an unused slot.
    const NONE: Self::Ty;
    /// Most extension markers followed by one resolution.
    const MAX_HOPS: usize;
    /// Name used in diagnostics.
    const NAME: &'static str;

    /// Root tables.
    fn roots() -> &'static [(Self::Ext, u16)];
    /// Table `set` of `kind`.
    fn table(kind: Self::Ext, set: u16) -> Option<&'static [Entry<Self>]>;
    /// Row count every table of `kind` has.
    fn width(kind: Self::Ext) -> usize;
    /// Extra-operand side table.
    fn extra(index: u16) -> Option<&'static OpInfo<Self>>;
}

/// Coordinates of one table row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryRef<L: Layout> {
    /// Table kind.
    pub kind: L::Ext,
    /// Table index within the kind.
    pub set: u16,
    /// Row.
    pub row: u16,
}

/// Link from a terminal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link<L: Layout> {
    /// No further entries.
    End,
    /// Next physical encoding of the same opcode.
    At(EntryRef<L>),
    /// Extra operand slots in the side table.
    Extra(u16),
}

/// Terminal opcode definition.
#[derive(Debug, Clone, Copy)]
pub struct OpInfo<L: Layout> {
    /// Opcode.
    pub opcode: Opcode,
    /// Canonical encoding with every operand field zero.
    pub bits: u32,
    /// Bits fixed by the encoding (everything outside operand and predicate fields).
    pub mask: u32,
    /// Display name.
    pub name: &'static str,
    /// Destination slots.
    pub dst: [Slot<L::Ty>; 2],
    /// Source slots.
    pub src: [Slot<L::Ty>; 3],
    /// Flags.
    pub flags: Flags,
    /// Status-flag usage.
    pub eflags: Eflags,
    /// Chain link.
    pub next: Link<L>,
}

/// One table row.
#[derive(Debug, Clone, Copy)]
pub enum Entry<L: Layout> {
    /// Undefined encoding.
    Invalid,
    /// Terminal.
    Op(OpInfo<L>),
    /// Continue in table `(kind, set)`.
    Ext(L::Ext, u16),
}

/// Where an operand slot lands in the instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dir {
    /// Destination list.
    Dst,
    /// Source list.
    Src,
}

impl<L: Layout> OpInfo<L> {
    /// Slots in instruction order, honoring [`Flags::SRC4`] and [`Flags::DST3`].
    /// Unused slots are skipped.
    pub fn slots(&self) -> impl Iterator<Item = (Slot<L::Ty>, Dir)> {
        let src4 = self.flags.contains(Flags::SRC4);
        let dst3 = self.flags.contains(Flags::DST3);
        let order = [
            (self.dst[0], Dir::Dst),
            (self.dst[1], if src4 { Dir::Src } else { Dir::Dst }),
            (self.src[0], if dst3 { Dir::Dst } else { Dir::Src }),
            (self.src[1], Dir::Src),
            (self.src[2], Dir::Src),
        ];
        // A relocated fourth source comes after the three regular sources.
        let sequence: [usize; 5] = if src4 { [0, 2, 3, 4, 1] } else { [0, 1, 2, 3, 4] };
        (0..5)
            .map(move |i| order[sequence[i]])
            .filter(|(slot, _)| slot.ty != L::NONE)
    }

    /// Number of declared (non-empty) slots.
    pub fn num_slots(&self) -> usize {
        self.slots().count()
    }

    /// Whether `word` carries the entry's fixed bits.
    pub fn matches(&self, word: u32) -> bool {
        word & self.mask == self.bits & self.mask
    }

    /// Whether every fixed one-bit of the canonical encoding is set in
    /// `word`. Decoders accept should-be-zero bits, so this is the check
    /// they apply rather than [`OpInfo::matches`].
    pub fn has_fixed_ones(&self, word: u32) -> bool {
        let ones = self.bits & self.mask;
        word & ones == ones
    }
}

// ── Resolution ───────────────────────────────────────────────────────────

/// Row at `at`, if the table and row exist.
pub fn lookup<L: Layout>(at: EntryRef<L>) -> Option<&'static Entry<L>> {
    L::table(at.kind, at.set)?.get(at.row as usize)
}

/// Resolve from `root` to a terminal entry.
///
/// `select` maps the kind of the table being visited to the row to take,
/// reading whatever instruction bits that kind documents. `Ok(None)` means
/// the invalid sentinel was reached.
pub fn resolve<L: Layout>(
    mode: IsaMode,
    root: (L::Ext, u16),
    mut select: impl FnMut(L::Ext) -> Result<usize, IrError>,
) -> Result<Option<(EntryRef<L>, &'static OpInfo<L>)>, IrError> {
    let (mut kind, mut set) = root;
    for _ in 0..=L::MAX_HOPS {
        let Some(table) = L::table(kind, set) else {
            log::trace!("{}: missing table {:?}/{}", L::NAME, kind, set);
            return Ok(None);
        };
        let row = select(kind)?;
        let here = EntryRef {
            kind,
            set,
            row: row as u16,
        };
        match table.get(row) {
            None | Some(Entry::Invalid) => return Ok(None),
            Some(Entry::Op(info)) => return Ok(Some((here, info))),
            Some(Entry::Ext(next_kind, next_set)) => {
                log::trace!(
                    "{}: {:?}/{}[{}] -> {:?}/{}",
                    L::NAME,
                    kind,
                    set,
                    row,
                    next_kind,
                    next_set
                );
                kind = *next_kind;
                set = *next_set;
            }
        }
    }
    Err(IrError::TableDepth { mode })
}

const CHAIN_LIMIT: usize = 64;

/// Next physical encoding of the same opcode, skipping extra-operand entries.
pub fn next_encoding<L: Layout>(info: &OpInfo<L>) -> Option<&'static OpInfo<L>> {
    let mut link = info.next;
    for _ in 0..CHAIN_LIMIT {
        match link {
            Link::End => return None,
            Link::At(at) => {
                return match lookup(at) {
                    Some(Entry::Op(next)) => Some(next),
                    _ => None,
                }
            }
            Link::Extra(i) => link = L::extra(i)?.next,
        }
    }
    None
}

/// The chain of encodings starting at `head` (inclusive).
pub fn chain<L: Layout>(head: &'static OpInfo<L>) -> impl Iterator<Item = &'static OpInfo<L>> {
    let mut cur = Some(head);
    let mut steps = 0;
    core::iter::from_fn(move || {
        let here = cur?;
        steps += 1;
        cur = if steps >= CHAIN_LIMIT {
            None
        } else {
            next_encoding(here)
        };
        Some(here)
    })
}

/// Extra-operand entries attached to `info`, in order.
pub fn extras<L: Layout>(info: &OpInfo<L>) -> impl Iterator<Item = &'static OpInfo<L>> {
    let mut link = if info.flags.contains(Flags::EXTRA_OPERANDS) {
        info.next
    } else {
        Link::End
    };
    let mut steps = 0;
    core::iter::from_fn(move || {
        steps += 1;
        match link {
            Link::Extra(i) if steps <= CHAIN_LIMIT => {
                let extra = L::extra(i)?;
                link = extra.next;
                Some(extra)
            }
            _ => None,
        }
    })
}

// ── Enumeration ──────────────────────────────────────────────────────────

fn visit<L: Layout>(
    at: (L::Ext, u16),
    depth: usize,
    seen: &mut Vec<(L::Ext, u16)>,
    f: &mut dyn FnMut(EntryRef<L>, &'static OpInfo<L>) -> bool,
) -> bool {
    if depth > L::MAX_HOPS || seen.contains(&at) {
        return false;
    }
    seen.push(at);
    let Some(table) = L::table(at.0, at.1) else {
        return false;
    };
    for (row, entry) in table.iter().enumerate() {
        let here = EntryRef {
            kind: at.0,
            set: at.1,
            row: row as u16,
        };
        let stop = match entry {
            Entry::Invalid => false,
            Entry::Op(info) => f(here, info),
            Entry::Ext(kind, set) => visit((*kind, *set), depth + 1, seen, f),
        };
        if stop {
            return true;
        }
    }
    false
}

/// Visit every reachable terminal entry once per table, roots first, depth first.
pub fn walk<L: Layout>(mut f: impl FnMut(EntryRef<L>, &'static OpInfo<L>)) {
    let mut seen = Vec::new();
    for &root in L::roots() {
        visit::<L>(root, 0, &mut seen, &mut |at, info| {
            f(at, info);
            false
        });
    }
}

/// First terminal of `opcode` in walk order: the head of its encoding chain.
pub fn find_head<L: Layout>(opcode: Opcode) -> Option<(EntryRef<L>, &'static OpInfo<L>)> {
    let mut seen = Vec::new();
    let mut found = None;
    for &root in L::roots() {
        let stop = visit::<L>(root, 0, &mut seen, &mut |at, info| {
            if info.opcode == opcode {
                found = Some((at, info));
                true
            } else {
                false
            }
        });
        if stop {
            break;
        }
    }
    found
}

// ── Validation ───────────────────────────────────────────────────────────

/// A structural defect found by [`validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableIssue {
    /// Human-readable description.
    pub detail: String,
}

impl fmt::Display for TableIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.detail)
    }
}

fn issue<L: Layout>(detail: String) -> TableIssue {
    TableIssue {
        detail: format!("{}: {}", L::NAME, detail),
    }
}

fn check_links<L: Layout>(at: EntryRef<L>, info: &OpInfo<L>) -> Result<(), TableIssue> {
    let mut link = info.next;
    let mut steps = 0;
    loop {
        steps += 1;
        if steps > CHAIN_LIMIT {
            return Err(issue::<L>(format!("chain from {:?} does not terminate", at)));
        }
        match link {
            Link::End => return Ok(()),
            Link::Extra(i) => {
                let Some(extra) = L::extra(i) else {
                    return Err(issue::<L>(format!("{:?}: extra index {} out of range", at, i)));
                };
                link = extra.next;
            }
            Link::At(to) => match lookup(to) {
                Some(Entry::Op(next)) if next.opcode == info.opcode => link = next.next,
                Some(Entry::Op(next)) => {
                    return Err(issue::<L>(format!(
                        "{:?} ({}) links to {:?} ({})",
                        at, info.opcode, to, next.opcode
                    )))
                }
                _ => {
                    return Err(issue::<L>(format!(
                        "{:?} links to non-terminal {:?}",
                        at, to
                    )))
                }
            },
        }
    }
}

fn check_table<L: Layout>(
    at: (L::Ext, u16),
    path: &mut Vec<(L::Ext, u16)>,
    terminals: &mut usize,
) -> Result<(), TableIssue> {
    if path.contains(&at) {
        return Err(issue::<L>(format!("cycle through {:?}", at)));
    }
    if path.len() > L::MAX_HOPS {
        return Err(issue::<L>(format!(
            "{:?} is {} hops deep (max {})",
            at,
            path.len(),
            L::MAX_HOPS
        )));
    }
    let Some(table) = L::table(at.0, at.1) else {
        return Err(issue::<L>(format!("missing table {:?}", at)));
    };
    if table.len() != L::width(at.0) {
        return Err(issue::<L>(format!(
            "table {:?} has {} rows, kind declares {}",
            at,
            table.len(),
            L::width(at.0)
        )));
    }
    path.push(at);
    for (row, entry) in table.iter().enumerate() {
        match entry {
            Entry::Invalid => {}
            Entry::Op(info) => {
                *terminals += 1;
                let here = EntryRef {
                    kind: at.0,
                    set: at.1,
                    row: row as u16,
                };
                if matches!(info.next, Link::Extra(_)) && !info.flags.contains(Flags::EXTRA_OPERANDS)
                {
                    return Err(issue::<L>(format!(
                        "{:?} links to extra operands without the flag",
                        here
                    )));
                }
                check_links(here, info)?;
            }
            Entry::Ext(kind, set) => check_table::<L>((*kind, *set), path, terminals)?,
        }
    }
    path.pop();
    Ok(())
}

/// Check the whole forest: every referenced table exists with its kind's
/// width, no marker points back into an ancestor, depth stays within
/// [`Layout::MAX_HOPS`], every chain terminates on same-opcode terminals, and
/// every extra-operand index is in range.
///
/// Returns the number of terminal rows visited (shared tables count once per
/// path that reaches them).
pub fn validate<L: Layout>() -> Result<usize, TableIssue> {
    let mut terminals = 0;
    for &root in L::roots() {
        let mut path = Vec::new();
        check_table::<L>(root, &mut path, &mut terminals)?;
    }
    Ok(terminals)
}

/// [`validate`] the forest that decodes `mode`.
pub fn validate_mode(mode: IsaMode) -> Result<usize, TableIssue> {
    match mode {
        #[cfg(feature = "x86")]
        IsaMode::Ia32 | IsaMode::Amd64 => validate::<crate::x86_tables::X86Layout>(),
        #[cfg(feature = "arm")]
        IsaMode::ArmA32 => validate::<crate::arm_tables::A32Layout>(),
        #[cfg(feature = "arm")]
        IsaMode::Thumb => validate::<crate::thumb_tables::ThumbLayout>(),
        #[cfg(feature = "aarch64")]
        IsaMode::Aarch64 => validate::<crate::aarch64_tables::A64Layout>(),
        #[cfg(feature = "riscv")]
        IsaMode::Riscv64 => validate::<crate::riscv_tables::RvLayout>(),
        #[allow(unreachable_patterns)]
        mode => Err(TableIssue {
            detail: format!("{}: not compiled in", mode),
        }),
    }
}

// ── Table-building helpers ───────────────────────────────────────────────

/// Build a fixed-size table from row spans, the rest invalid.
macro_rules! span_table {
    ($len:expr; $($lo:literal $(..= $hi:literal)? => $e:expr),* $(,)?) => {{
        let mut t = [$crate::table::Entry::Invalid; $len];
        $( span_table!(@fill t, $lo $(, $hi)?, $e); )*
        t
    }};
    (@fill $t:ident, $lo:literal, $hi:literal, $e:expr) => {{
        let mut i = $lo;
        while i <= $hi {
            $t[i] = $e;
            i += 1;
        }
    }};
    (@fill $t:ident, $lo:literal, $e:expr) => {
        $t[$lo] = $e;
    };
}
pub(crate) use span_table;

/// Declare an architecture's opcode enumeration with display names.
macro_rules! opcode_enum {
    ($(#[$meta:meta])* $vis:vis enum $name:ident { $($var:ident => $text:literal,)* }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[allow(missing_docs)]
        $vis enum $name {
            $($var,)*
        }

        impl $name {
            /// Every opcode, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$var,)*];

            /// Display name.
            pub const fn name(self) -> &'static str {
                match self {
                    $($name::$var => $text,)*
                }
            }
        }
    };
}
pub(crate) use opcode_enum;

#[cfg(test)]
mod tests {
    use super::*;

    // A miniature layout exercising the engine without any real ISA.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Toy;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Kind {
        Top,
        Low,
        Loop,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Ty {
        None,
        R,
    }

    const fn toy(bits: u32, next: Link<Toy>) -> Entry<Toy> {
        let none = Slot {
            ty: Ty::None,
            size: OpSize::None,
        };
        Entry::Op(OpInfo {
            opcode: Opcode::Invalid,
            bits,
            mask: 0xf0,
            name: "toy",
            dst: [
                Slot {
                    ty: Ty::R,
                    size: OpSize::B4,
                },
                none,
            ],
            src: [none, none, none],
            flags: Flags::NONE,
            eflags: Eflags::NONE,
            next,
        })
    }

    static TOP: [Entry<Toy>; 4] = [
        toy(
            0x00,
            Link::At(EntryRef {
                kind: Kind::Low,
                set: 0,
                row: 1,
            }),
        ),
        Entry::Ext(Kind::Low, 0),
        Entry::Invalid,
        Entry::Ext(Kind::Loop, 0),
    ];
    static LOW: [Entry<Toy>; 2] = [Entry::Invalid, toy(0x11, Link::End)];
    static LOOP: [Entry<Toy>; 2] = [Entry::Ext(Kind::Loop, 0), Entry::Invalid];

    impl Layout for Toy {
        type Ext = Kind;
        type Ty = Ty;
        const NONE: Ty = Ty::None;
        const MAX_HOPS: usize = 3;
        const NAME: &'static str = "toy";

        fn roots() -> &'static [(Kind, u16)] {
            &[(Kind::Top, 0)]
        }
        fn table(kind: Kind, set: u16) -> Option<&'static [Entry<Toy>]> {
            match (kind, set) {
                (Kind::Top, 0) => Some(&TOP),
                (Kind::Low, 0) => Some(&LOW),
                (Kind::Loop, 0) => Some(&LOOP),
                _ => None,
            }
        }
        fn width(kind: Kind) -> usize {
            match kind {
                Kind::Top => 4,
                Kind::Low | Kind::Loop => 2,
            }
        }
        fn extra(_: u16) -> Option<&'static OpInfo<Toy>> {
            None
        }
    }

    #[test]
    fn resolves_through_marker() {
        let word = 0x11u32;
        let got = resolve::<Toy>(IsaMode::ArmA32, (Kind::Top, 0), |k| {
            Ok(match k {
                Kind::Top => (word >> 4) as usize,
                _ => (word & 1) as usize,
            })
        })
        .unwrap();
        let (at, info) = got.unwrap();
        assert_eq!(at.kind, Kind::Low);
        assert_eq!(info.bits, 0x11);
    }

    #[test]
    fn invalid_sentinel_is_none() {
        let got = resolve::<Toy>(IsaMode::ArmA32, (Kind::Top, 0), |_| Ok(2)).unwrap();
        assert!(got.is_none());
    }

    #[test]
    fn cyclic_tables_hit_hop_bound() {
        let err = resolve::<Toy>(IsaMode::ArmA32, (Kind::Top, 0), |k| {
            Ok(if k == Kind::Top { 3 } else { 0 })
        })
        .unwrap_err();
        assert_eq!(
            err,
            IrError::TableDepth {
                mode: IsaMode::ArmA32
            }
        );
    }

    #[test]
    fn validation_reports_cycle() {
        let err = validate::<Toy>().unwrap_err();
        assert!(err.detail.contains("cycle"), "{}", err);
    }

    #[test]
    fn chain_follows_links() {
        let (_, head) = find_head::<Toy>(Opcode::Invalid).unwrap();
        assert_eq!(chain(head).count(), 2);
    }

    #[test]
    fn slots_skip_empty() {
        let Entry::Op(info) = TOP[0] else {
            panic!("expected terminal")
        };
        assert_eq!(info.num_slots(), 1);
        assert!(info.matches(0x0f));
        assert!(!info.matches(0x10));
    }
}
