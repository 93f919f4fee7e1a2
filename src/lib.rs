//! Helpers for crash dump analysis tools.
//!
//! - [`singleton`]: address-keyed identity cache for struct wrappers
//! - [`registry`]: `do_*` handlers to clap subcommands
//! - [`color`], [`arch`], [`include`], [`exports`]: output and module plumbing

pub mod arch;
pub mod color;
pub mod commands;
pub mod config;
pub mod dump;
pub mod exports;
pub mod include;
pub mod kernel;
pub mod registry;
pub mod singleton;

pub use dump::{DumpError, DumpReader, MemoryDump, StructValue};
pub use registry::{add_arg, add_help, CommandModule, CommandParser, ParsedArgs};
pub use singleton::{InstanceCache, Singleton, Target, Wrapper};
