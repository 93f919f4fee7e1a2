//! Crash dump collaborator: the two primitives wrappers are built on.
//!
//! `DumpReader` reads a structured value at an address and resolves the
//! address of a value already read. `MemoryDump` is an in-memory reader
//! backed by a JSON snapshot of decoded structs:
//!
//! ```json
//! {"structs": [
//!   {"type": "task_struct", "address": 4096, "fields": {"pid": 1, "comm": "init"}}
//! ]}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// Errors raised while reading structured values from a dump.
#[derive(Debug, thiserror::Error)]
pub enum DumpError {
    #[error("invalid address {0:#x}")]
    InvalidAddress(u64),
    #[error("type mismatch at {address:#x}: expected {expected}, found {found}")]
    TypeMismatch {
        address: u64,
        expected: String,
        found: String,
    },
    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A typed record read from the dump at a known address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructValue {
    #[serde(rename = "type")]
    pub type_name: String,
    pub address: u64,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl StructValue {
    pub fn new(type_name: impl Into<String>, address: u64) -> Self {
        Self {
            type_name: type_name.into(),
            address,
            fields: Map::new(),
        }
    }

    /// Builder-style field setter
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Integer field, `None` when missing or not an unsigned number
    pub fn field_u64(&self, name: &str) -> Option<u64> {
        self.fields.get(name).and_then(Value::as_u64)
    }

    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }
}

/// Access to the structured values of a crash dump.
pub trait DumpReader {
    /// Read the value of type `type_name` stored at `address`.
    fn read_struct(&self, type_name: &str, address: u64) -> Result<StructValue, DumpError>;

    /// Address of a value previously read from this dump.
    fn address_of(&self, value: &StructValue) -> u64 {
        value.address
    }
}

impl<R: DumpReader + ?Sized> DumpReader for &R {
    fn read_struct(&self, type_name: &str, address: u64) -> Result<StructValue, DumpError> {
        (**self).read_struct(type_name, address)
    }

    fn address_of(&self, value: &StructValue) -> u64 {
        (**self).address_of(value)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    structs: Vec<StructValue>,
}

/// Dump reader over a fixed set of decoded structs, keyed by address.
#[derive(Debug, Default, Clone)]
pub struct MemoryDump {
    structs: BTreeMap<u64, StructValue>,
}

impl MemoryDump {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON snapshot file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, DumpError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let dump = Self::from_json_str(&content)?;
        info!(path = %path.as_ref().display(), structs = dump.len(), "snapshot loaded");
        Ok(dump)
    }

    pub fn from_json_str(content: &str) -> Result<Self, DumpError> {
        let snapshot: Snapshot = serde_json::from_str(content)?;
        let mut dump = Self::new();
        for value in snapshot.structs {
            dump.insert(value);
        }
        Ok(dump)
    }

    /// Add a value; a later value at the same address replaces the earlier one.
    pub fn insert(&mut self, value: StructValue) {
        self.structs.insert(value.address, value);
    }

    pub fn len(&self) -> usize {
        self.structs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.structs.is_empty()
    }

    /// Addresses of every value of the given type, in address order
    pub fn addresses_of_type<'a>(&'a self, type_name: &'a str) -> impl Iterator<Item = u64> + 'a {
        self.structs
            .values()
            .filter(move |v| v.type_name == type_name)
            .map(|v| v.address)
    }
}

impl DumpReader for MemoryDump {
    fn read_struct(&self, type_name: &str, address: u64) -> Result<StructValue, DumpError> {
        let value = self
            .structs
            .get(&address)
            .ok_or(DumpError::InvalidAddress(address))?;
        if value.type_name != type_name {
            return Err(DumpError::TypeMismatch {
                address,
                expected: type_name.to_string(),
                found: value.type_name.clone(),
            });
        }
        Ok(value.clone())
    }
}

/// Parse an address given as `0x`-prefixed hex or decimal.
pub fn parse_address(s: &str) -> Result<u64, std::num::ParseIntError> {
    let s = s.trim();
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    }
}
