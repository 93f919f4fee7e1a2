//! Architecture-specific modules.
//!
//! Modules are addressed as `<namespace>.arch.<machine>.<module>`, where
//! `machine` is the `uname -m` identifier of the running host unless
//! overridden (e.g. when reading a dump taken on another architecture).
//! Rust has no runtime import, so each architecture's modules are
//! registered in an [`ArchModules`] table when it is built.

pub mod aarch64;
pub mod x86_64;

use std::collections::HashMap;
use tracing::{debug, warn};

/// Namespace of the modules shipped with this crate
pub const DEFAULT_NAMESPACE: &str = "kdumplib.linux";

/// Errors from architecture module lookup
#[derive(Debug, thiserror::Error)]
pub enum ArchError {
    #[error("no module named '{0}'")]
    ModuleNotFound(String),
}

/// Machine identifier of the running host, as reported by `uname(2)`.
///
/// Falls back to the compile target architecture if `uname` fails.
#[cfg(unix)]
pub fn machine() -> String {
    use std::ffi::CStr;
    use std::mem::MaybeUninit;

    unsafe {
        let mut uts = MaybeUninit::<libc::utsname>::uninit();
        if libc::uname(uts.as_mut_ptr()) == 0 {
            let uts = uts.assume_init();
            return CStr::from_ptr(uts.machine.as_ptr())
                .to_string_lossy()
                .into_owned();
        }
    }

    warn!("uname failed, using compile target architecture");
    std::env::consts::ARCH.to_string()
}

#[cfg(not(unix))]
pub fn machine() -> String {
    std::env::consts::ARCH.to_string()
}

/// Full path of an architecture module
pub fn module_path(namespace: &str, machine: &str, module: &str) -> String {
    format!("{namespace}.arch.{machine}.{module}")
}

/// Page table geometry of one architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageTableLayout {
    pub page_shift: u32,
    pub levels: u32,
    pub va_bits: u32,
    /// Start of the kernel direct map
    pub page_offset: u64,
}

impl PageTableLayout {
    pub fn page_size(&self) -> u64 {
        1 << self.page_shift
    }

    /// Index bits resolved per table level (8-byte entries)
    pub fn bits_per_level(&self) -> u32 {
        self.page_shift - 3
    }

    /// Table index of `vaddr` at `level`, 0 being the last (PTE) level.
    pub fn level_index(&self, vaddr: u64, level: u32) -> u64 {
        let shift = self.page_shift + level * self.bits_per_level();
        (vaddr >> shift) & ((1 << self.bits_per_level()) - 1)
    }

    /// Physical address of a direct-map virtual address
    pub fn virt_to_phys(&self, vaddr: u64) -> Option<u64> {
        vaddr.checked_sub(self.page_offset)
    }
}

/// A module provided for one architecture.
#[derive(Debug)]
pub struct ArchModule {
    pub name: &'static str,
    /// Names the module declares public
    pub exports: &'static [&'static str],
    pub layout: PageTableLayout,
}

/// Table of architecture modules, resolved against one machine.
pub struct ArchModules<T> {
    namespace: String,
    machine: String,
    modules: HashMap<String, T>,
}

impl<T> ArchModules<T> {
    /// Empty table resolving against the running host's machine
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            machine: machine(),
            modules: HashMap::new(),
        }
    }

    /// Resolve against `machine` instead of the running host
    pub fn with_machine(mut self, machine: impl Into<String>) -> Self {
        self.machine = machine.into();
        self
    }

    pub fn machine(&self) -> &str {
        &self.machine
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Register `value` as `module` for architecture `machine`
    pub fn register(&mut self, machine: &str, module: &str, value: T) {
        let path = module_path(&self.namespace, machine, module);
        debug!(path = %path, "registering arch module");
        self.modules.insert(path, value);
    }

    /// Import `module` for the configured machine. No other architecture is tried.
    pub fn arch_import(&self, module: &str) -> Result<&T, ArchError> {
        let path = module_path(&self.namespace, &self.machine, module);
        self.modules.get(&path).ok_or(ArchError::ModuleNotFound(path))
    }
}

impl ArchModules<&'static ArchModule> {
    /// Table with every module shipped with this crate
    pub fn builtin(namespace: impl Into<String>) -> Self {
        let mut modules = Self::new(namespace);
        modules.register("x86_64", x86_64::PGTABLE.name, &x86_64::PGTABLE);
        modules.register("aarch64", aarch64::PGTABLE.name, &aarch64::PGTABLE);
        modules
    }
}
