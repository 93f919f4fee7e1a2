//! Terminal colors
//!
//! ANSI escape codes for dump listings. Output kinds (`link`, `dir`) map
//! to a fixed set of font attributes so every command renders the same
//! kind of object the same way.

use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;

/// Errors from color handling
#[derive(Debug, thiserror::Error)]
pub enum ColorError {
    #[error("unknown print type: {0}")]
    UnknownType(String),
}

/// A single font attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontAttr {
    Bold,
    Underline,
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Purple,
    Cyan,
    White,
    Off,
}

impl FontAttr {
    pub fn code(self) -> &'static str {
        match self {
            FontAttr::Bold => "\x1b[1m",
            FontAttr::Underline => "\x1b[4m",
            FontAttr::Black => "\x1b[0;90m",
            FontAttr::Red => "\x1b[0;91m",
            FontAttr::Green => "\x1b[0;92m",
            FontAttr::Yellow => "\x1b[0;93m",
            FontAttr::Blue => "\x1b[0;94m",
            FontAttr::Purple => "\x1b[0;95m",
            FontAttr::Cyan => "\x1b[0;96m",
            FontAttr::White => "\x1b[0;97m",
            FontAttr::Off => "\x1b[0m",
        }
    }
}

impl fmt::Display for FontAttr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Kind of object being printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintType {
    /// Reference to another object (addresses, pointers)
    Link,
    /// Container-like object
    Dir,
}

impl PrintType {
    pub fn attrs(self) -> &'static [FontAttr] {
        match self {
            PrintType::Link => &[FontAttr::Cyan, FontAttr::Bold],
            PrintType::Dir => &[FontAttr::Blue, FontAttr::Bold],
        }
    }
}

impl FromStr for PrintType {
    type Err = ColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "link" => Ok(PrintType::Link),
            "dir" => Ok(PrintType::Dir),
            other => Err(ColorError::UnknownType(other.to_string())),
        }
    }
}

/// Write `text` followed by a newline, wrapped in the attributes of `kind`.
///
/// The reset code is emitted after the newline, as the line terminator
/// belongs to the colored output.
pub fn cwrite<W: Write>(out: &mut W, kind: Option<PrintType>, text: impl fmt::Display) -> io::Result<()> {
    if let Some(kind) = kind {
        for attr in kind.attrs() {
            write!(out, "{attr}")?;
        }
    }

    writeln!(out, "{text}")?;

    if kind.is_some() {
        write!(out, "{}", FontAttr::Off)?;
    }
    Ok(())
}

/// Color print to stdout
pub fn cprint(kind: Option<PrintType>, text: impl fmt::Display) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    cwrite(&mut out, kind, text)
}
