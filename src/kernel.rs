//! Identity-cached wrappers over kernel structures.

use std::collections::HashSet;
use std::rc::Rc;

use crate::dump::{DumpError, DumpReader, StructValue};
use crate::singleton::{Singleton, Wrapper};

/// A process, wrapping one `task_struct`.
#[derive(Debug)]
pub struct Task {
    value: StructValue,
}

impl Wrapper for Task {
    const STRUCT_TYPE: &'static str = "task_struct";

    fn wrap(value: StructValue) -> Self {
        Task { value }
    }
}

crate::singleton!(Task);

impl Task {
    pub fn address(&self) -> u64 {
        self.value.address
    }

    pub fn pid(&self) -> Option<u64> {
        self.value.field_u64("pid")
    }

    /// Command name, empty when the snapshot does not record one
    pub fn comm(&self) -> &str {
        self.value.field_str("comm").unwrap_or("")
    }

    pub fn value(&self) -> &StructValue {
        &self.value
    }

    /// The `real_parent` task; `None` when unset or null
    pub fn parent<R: DumpReader + ?Sized>(&self, reader: &R) -> Result<Option<Rc<Task>>, DumpError> {
        Task::get(reader, self.value.field_u64("real_parent"))
    }

    /// Parent chain from the direct parent up, stopping at the first task
    /// seen twice (the idle task is its own parent).
    pub fn ancestors<R: DumpReader + ?Sized>(&self, reader: &R) -> Result<Vec<Rc<Task>>, DumpError> {
        let mut seen = HashSet::from([self.address()]);
        let mut chain = Vec::new();
        let mut next = self.parent(reader)?;
        while let Some(task) = next {
            if !seen.insert(task.address()) {
                break;
            }
            next = task.parent(reader)?;
            chain.push(task);
        }
        Ok(chain)
    }
}
