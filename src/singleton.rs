//! Identity cache for wrappers over dump memory.
//!
//! Each wrapper type owns one cache mapping an address to the single
//! wrapper instance built for it. Lookups for the same address always
//! return the same `Rc`. Entries are never evicted or refreshed: dump
//! memory is static, so a wrapper built once stays valid for the session.
//!
//! ```ignore
//! struct Task { value: StructValue }
//!
//! impl Wrapper for Task {
//!     const STRUCT_TYPE: &'static str = "task_struct";
//!     fn wrap(value: StructValue) -> Self { Task { value } }
//! }
//!
//! singleton!(Task);
//!
//! let a = Task::get(&dump, 0x1000)?;
//! let b = Task::get(&dump, 0x1000)?;
//! assert!(Rc::ptr_eq(&a.unwrap(), &b.unwrap()));
//! ```

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::{debug, trace};

use crate::dump::{DumpError, DumpReader, StructValue};

/// A high-level object built from one structured value.
pub trait Wrapper: Sized + 'static {
    /// Struct type read when the wrapper is requested by raw address.
    const STRUCT_TYPE: &'static str;

    fn wrap(value: StructValue) -> Self;
}

/// What a cache lookup was asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    /// Nothing to wrap
    Absent,
    /// Raw address, read on a cache miss
    Address(u64),
    /// A value already read from the dump
    Struct(StructValue),
}

impl From<u64> for Target {
    fn from(address: u64) -> Self {
        Target::Address(address)
    }
}

impl From<StructValue> for Target {
    fn from(value: StructValue) -> Self {
        Target::Struct(value)
    }
}

impl From<&StructValue> for Target {
    fn from(value: &StructValue) -> Self {
        Target::Struct(value.clone())
    }
}

impl<T: Into<Target>> From<Option<T>> for Target {
    fn from(obj: Option<T>) -> Self {
        obj.map_or(Target::Absent, Into::into)
    }
}

/// Address-keyed store of wrapper instances.
pub struct InstanceCache<T> {
    entries: RefCell<HashMap<u64, Rc<T>>>,
}

impl<T> InstanceCache<T> {
    pub fn new() -> Self {
        Self {
            entries: RefCell::new(HashMap::new()),
        }
    }

    /// Number of distinct instances created so far
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn contains(&self, address: u64) -> bool {
        self.entries.borrow().contains_key(&address)
    }
}

impl<T: Wrapper> InstanceCache<T> {
    /// Return the canonical wrapper for `obj`, building it on first access.
    ///
    /// `Absent` and address 0 give `Ok(None)` without touching the cache.
    /// Read failures from `reader` are returned unchanged.
    pub fn get<R: DumpReader + ?Sized>(
        &self,
        reader: &R,
        obj: impl Into<Target>,
    ) -> Result<Option<Rc<T>>, DumpError> {
        let (address, value) = match obj.into() {
            Target::Absent | Target::Address(0) => return Ok(None),
            Target::Address(address) => (address, None),
            Target::Struct(value) => (reader.address_of(&value), Some(value)),
        };
        if address == 0 {
            return Ok(None);
        }

        if let Some(existing) = self.entries.borrow().get(&address) {
            trace!(struct_type = T::STRUCT_TYPE, address, "cache hit");
            return Ok(Some(Rc::clone(existing)));
        }

        let value = match value {
            Some(value) => value,
            None => reader.read_struct(T::STRUCT_TYPE, address)?,
        };
        debug!(struct_type = T::STRUCT_TYPE, address, "wrapping struct");
        let instance = Rc::new(T::wrap(value));

        // wrap() may have re-entered the cache for this address; first insert wins
        let mut entries = self.entries.borrow_mut();
        Ok(Some(Rc::clone(entries.entry(address).or_insert(instance))))
    }
}

impl<T> Default for InstanceCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A wrapper type with its own process-lifetime identity cache.
///
/// Implemented through [`singleton!`](crate::singleton!).
pub trait Singleton: Wrapper {
    /// Run `f` against this type's cache.
    fn with_cache<O>(f: impl FnOnce(&InstanceCache<Self>) -> O) -> O;

    /// Canonical instance for an address or an already-read value.
    fn get<R: DumpReader + ?Sized>(
        reader: &R,
        obj: impl Into<Target>,
    ) -> Result<Option<Rc<Self>>, DumpError> {
        Self::with_cache(|cache| cache.get(reader, obj))
    }

    fn cached_count() -> usize {
        Self::with_cache(|cache| cache.len())
    }
}

/// Attach an identity cache to a [`Wrapper`] type.
///
/// Caches are thread-local: wrappers hold `Rc`s and the analysis session
/// is single threaded.
#[macro_export]
macro_rules! singleton {
    ($ty:ty) => {
        impl $crate::singleton::Singleton for $ty {
            fn with_cache<O>(
                f: impl FnOnce(&$crate::singleton::InstanceCache<Self>) -> O,
            ) -> O {
                ::std::thread_local! {
                    static CACHE: $crate::singleton::InstanceCache<$ty> =
                        $crate::singleton::InstanceCache::new();
                }
                CACHE.with(f)
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;
    use std::cell::Cell;

    mock! {
        Reader {}
        impl DumpReader for Reader {
            fn read_struct(&self, type_name: &str, address: u64) -> Result<StructValue, DumpError>;
            fn address_of(&self, value: &StructValue) -> u64;
        }
    }

    #[derive(Debug)]
    struct Page {
        value: StructValue,
    }

    impl Wrapper for Page {
        const STRUCT_TYPE: &'static str = "page";

        fn wrap(value: StructValue) -> Self {
            Page { value }
        }
    }

    crate::singleton!(Page);

    thread_local! {
        static INODE_WRAPS: Cell<usize> = Cell::new(0);
    }

    struct Inode;

    impl Wrapper for Inode {
        const STRUCT_TYPE: &'static str = "inode";

        fn wrap(_value: StructValue) -> Self {
            INODE_WRAPS.with(|n| n.set(n.get() + 1));
            Inode
        }
    }

    crate::singleton!(Inode);

    fn reader_reading(times: usize) -> MockReader {
        let mut reader = MockReader::new();
        reader
            .expect_read_struct()
            .times(times)
            .returning(|t, a| Ok(StructValue::new(t, a)));
        reader
            .expect_address_of()
            .returning(|v| v.address);
        reader
    }

    #[test]
    fn test_same_address_same_instance() {
        let reader = reader_reading(1);
        let cache: InstanceCache<Page> = InstanceCache::new();

        let a = cache.get(&reader, 0x1000u64).unwrap().unwrap();
        let b = cache.get(&reader, 0x1000u64).unwrap().unwrap();
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(a.value.type_name, "page");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_struct_and_address_share_instance() {
        let reader = reader_reading(0);
        let cache: InstanceCache<Page> = InstanceCache::new();

        let value = StructValue::new("page", 0x2000);
        let from_struct = cache.get(&reader, value).unwrap().unwrap();
        // Already cached: no read even though asked by address
        let from_addr = cache.get(&reader, 0x2000u64).unwrap().unwrap();
        assert!(Rc::ptr_eq(&from_struct, &from_addr));
    }

    #[test]
    fn test_absent_and_zero_return_none() {
        let reader = reader_reading(0);
        let cache: InstanceCache<Page> = InstanceCache::new();

        assert!(cache.get(&reader, 0u64).unwrap().is_none());
        assert!(cache.get(&reader, Target::Absent).unwrap().is_none());
        assert!(cache.get(&reader, None::<u64>).unwrap().is_none());
        assert!(cache.get(&reader, StructValue::new("page", 0)).unwrap().is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_after_entries_exist() {
        let reader = reader_reading(1);
        let cache: InstanceCache<Page> = InstanceCache::new();
        cache.get(&reader, 0x1000u64).unwrap();

        assert!(cache.get(&reader, 0u64).unwrap().is_none());
        assert_eq!(cache.len(), 1);
        assert!(!cache.contains(0));
    }

    #[test]
    fn test_read_error_propagates() {
        let mut reader = MockReader::new();
        reader
            .expect_read_struct()
            .returning(|_, a| Err(DumpError::InvalidAddress(a)));
        let cache: InstanceCache<Page> = InstanceCache::new();

        let err = cache.get(&reader, 0xbadu64).unwrap_err();
        assert!(matches!(err, DumpError::InvalidAddress(0xbad)));
        assert!(!cache.contains(0xbad));
    }

    #[test]
    fn test_instances_bounded_by_distinct_addresses() {
        let reader = reader_reading(3);
        let cache: InstanceCache<Page> = InstanceCache::new();

        for addr in [0x1000u64, 0x2000, 0x1000, 0x3000, 0x2000, 0x1000] {
            cache.get(&reader, addr).unwrap();
        }
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_singleton_macro_per_type_cache() {
        let reader = reader_reading(2);
        let pages = Page::cached_count();
        let inodes = Inode::cached_count();

        let a = Page::get(&reader, 0x1000u64).unwrap().unwrap();
        let b = Page::get(&reader, Some(0x1000u64)).unwrap().unwrap();
        assert!(Rc::ptr_eq(&a, &b));

        // Same address, different wrapper type: separate cache
        Inode::get(&reader, 0x1000u64).unwrap().unwrap();
        assert_eq!(Page::cached_count(), pages + 1);
        assert_eq!(Inode::cached_count(), inodes + 1);
    }

    #[test]
    fn test_cached_instance_not_rebuilt() {
        let reader = reader_reading(1);
        let wraps = INODE_WRAPS.with(Cell::get);

        Inode::get(&reader, 0x4000u64).unwrap();
        Inode::get(&reader, 0x4000u64).unwrap();
        Inode::get(&reader, 0x4000u64).unwrap();
        assert_eq!(INODE_WRAPS.with(Cell::get), wraps + 1);
    }
}
