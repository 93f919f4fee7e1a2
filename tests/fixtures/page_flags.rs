pub const PG_LOCKED: u32 = 0;
pub const PG_REFERENCED: u32 = 2;
pub const PG_DIRTY: u32 = 4;

pub fn page_flag_set(flags: u64, bit: u32) -> bool {
    flags & (1 << bit) != 0
}
