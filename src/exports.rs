//! Explicit export lists.
//!
//! A module names its public declarations with [`exports!`](crate::exports!),
//! which defines `pub const EXPORTS: &[&str]`. Every listed name must resolve
//! to an item of the module, so a stale list fails to build.

/// Declare the names a module exports.
///
/// ```ignore
/// pub const PAGE_SHIFT: u32 = 12;
/// pub fn page_size() -> u64 { 1 << PAGE_SHIFT }
///
/// kdump_utils::exports!(PAGE_SHIFT, page_size);
/// assert_eq!(EXPORTS, &["PAGE_SHIFT", "page_size"]);
/// ```
#[macro_export]
macro_rules! exports {
    ($($name:ident),* $(,)?) => {
        $(
            #[allow(unused_imports)]
            use self::$name as _;
        )*

        /// Names declared by this module
        pub const EXPORTS: &[&str] = &[$(stringify!($name)),*];
    };
}

/// Whether `name` is in an export list
pub fn is_exported(exports: &[&str], name: &str) -> bool {
    exports.contains(&name)
}
