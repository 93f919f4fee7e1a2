//! arm64 page tables, 4K granule with 48-bit virtual addresses.

use super::{ArchModule, PageTableLayout};

pub const PAGE_SHIFT: u32 = 12;
pub const PGTABLE_LEVELS: u32 = 4;
pub const VA_BITS: u32 = 48;
// -(1 << VA_BITS)
pub const PAGE_OFFSET: u64 = 0xffff_0000_0000_0000;

pub const LAYOUT: PageTableLayout = PageTableLayout {
    page_shift: PAGE_SHIFT,
    levels: PGTABLE_LEVELS,
    va_bits: VA_BITS,
    page_offset: PAGE_OFFSET,
};

crate::exports!(PAGE_SHIFT, PGTABLE_LEVELS, VA_BITS, PAGE_OFFSET, LAYOUT);

pub static PGTABLE: ArchModule = ArchModule {
    name: "pgtable",
    exports: EXPORTS,
    layout: LAYOUT,
};
