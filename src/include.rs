//! Inclusion of files relative to the including file.
//!
//! [`include_sibling!`](crate::include_sibling!) splices `<name>.rs`, found
//! next to the calling source file, into the caller's scope at build time.
//! [`sibling_path`] and [`read_sibling`] do the same lookup at run time for
//! data files (snapshots, config fragments).

use std::path::{Path, PathBuf};

/// Errors from file inclusion
#[derive(Debug, thiserror::Error)]
pub enum IncludeError {
    #[error("included file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Include `<name>.rs` from the directory of the calling source file.
///
/// The included declarations become items of the calling module. A missing
/// file is a build error.
#[macro_export]
macro_rules! include_sibling {
    ($name:literal) => {
        include!(concat!($name, ".rs"));
    };
}

/// Path of `<name>.<ext>` next to `caller`. An empty `ext` leaves `name` as is.
pub fn sibling_path(caller: &Path, name: &str, ext: &str) -> PathBuf {
    let dir = caller.parent().unwrap_or_else(|| Path::new(""));
    let mut file = name.to_string();
    if !ext.is_empty() && Path::new(name).extension().is_none() {
        file.push('.');
        file.push_str(ext);
    }
    dir.join(file)
}

/// Locate `<name>.<ext>` next to `caller`, failing if it does not exist.
pub fn resolve_sibling(caller: &Path, name: &str, ext: &str) -> Result<PathBuf, IncludeError> {
    let path = sibling_path(caller, name, ext);
    if !path.is_file() {
        return Err(IncludeError::NotFound(path));
    }
    Ok(path)
}

/// Read `<name>.<ext>` next to `caller`.
pub fn read_sibling(caller: &Path, name: &str, ext: &str) -> Result<String, IncludeError> {
    let path = resolve_sibling(caller, name, ext)?;
    std::fs::read_to_string(&path).map_err(|source| IncludeError::Io { path, source })
}
