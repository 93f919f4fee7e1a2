//! x86_64 page tables (4-level paging, 4K pages).

use super::{ArchModule, PageTableLayout};

pub const PAGE_SHIFT: u32 = 12;
pub const PGTABLE_LEVELS: u32 = 4;
pub const VA_BITS: u32 = 48;
pub const PAGE_OFFSET: u64 = 0xffff_8880_0000_0000;

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
