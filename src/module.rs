//! Source modules and the character cursor the scanner reads from.
//!
//! A module is a named, immutable source buffer. The cursor owns the read
//! position and the line bookkeeping; saving and restoring a cursor by value
//! is what lets the parser recurse into imported modules without disturbing
//! the outer read position.

use std::fs;
use std::rc::Rc;

use crate::error::{Error, ErrorKind, Result};

/// A loaded source module. The buffer always ends with a newline so every
/// line, including the last, is terminated.
#[derive(Debug, PartialEq, Eq)]
pub struct ModuleCode {
    pub name: String,
    pub code: String,
}

impl ModuleCode {
    /// Load a module from disk.
    pub fn load(name: &str) -> Result<Rc<ModuleCode>> {
        let bytes = fs::read(name).map_err(|err| {
            Error::new(
                ErrorKind::System,
                format!("error importing {name}: {err}"),
            )
        })?;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        Ok(Self::from_source(name, &text))
    }

    /// Wrap an in-memory source text as a module.
    pub fn from_source(name: &str, source: &str) -> Rc<ModuleCode> {
        let mut code = source.to_string();
        code.push('\n');
        Rc::new(ModuleCode {
            name: name.to_string(),
            code,
        })
    }

    /// The text of the line starting at byte offset `bol`, leading
    /// whitespace stripped. Used when rendering diagnostics.
    pub fn line_at(&self, bol: usize) -> &str {
        let rest = self.code.get(bol..).unwrap_or("");
        let rest = rest.trim_start_matches([' ', '\t']);
        match rest.find('\n') {
            Some(end) => &rest[..end],
            None => rest,
        }
    }
}

/// A position in a module, recorded on every AST node for error reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    pub module: Rc<ModuleCode>,
    pub lineno: usize,
    pub bol: usize,
}

/// Byte-level read cursor over a module.
///
/// `bol` tracks the offset of the current line's first byte and `lineno` the
/// 1-based line number; both advance when the byte before the new position is
/// a newline.
#[derive(Debug, Clone)]
pub struct Cursor {
    module: Rc<ModuleCode>,
    pos: usize,
    bol: usize,
    lineno: usize,
}

impl Cursor {
    pub fn new(module: Rc<ModuleCode>) -> Self {
        Self {
            module,
            pos: 0,
            bol: 0,
            lineno: 1,
        }
    }

    pub fn module(&self) -> &Rc<ModuleCode> {
        &self.module
    }

    pub fn source(&self) -> Source {
        Source {
            module: Rc::clone(&self.module),
            lineno: self.lineno,
            bol: self.bol,
        }
    }

    /// Read the next byte, or `None` at end of input.
    pub fn next_char(&mut self) -> Option<u8> {
        let code = self.module.code.as_bytes();
        if self.pos >= code.len() {
            return None;
        }
        if self.pos > 0 && code[self.pos - 1] == b'\n' {
            self.bol = self.pos;
            self.lineno += 1;
        }
        let ch = code[self.pos];
        self.pos += 1;
        Some(ch)
    }

    /// Look at the next byte without consuming it.
    pub fn peek_char(&self) -> Option<u8> {
        self.module.code.as_bytes().get(self.pos).copied()
    }

    /// Undo the most recent `next_char`. Must not be called at end of input.
    pub fn push_back(&mut self) {
        if self.pos > 0 {
            self.pos -= 1;
            if self.pos > 0 && self.module.code.as_bytes()[self.pos - 1] == b'\n' {
                self.lineno -= 1;
            }
        }
    }

    /// Rewind to the beginning of the current line so its indentation can be
    /// measured again (multiple dedents on one line).
    pub fn rewind_to_bol(&mut self) {
        if self.pos > self.bol && self.bol > 0 {
            // Re-reading the line will bump the counter again.
            self.lineno -= 1;
        }
        self.pos = self.bol;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_line_numbers_and_bol() {
        let module = ModuleCode::from_source("m", "ab\ncd");
        let mut cursor = Cursor::new(module);

        assert_eq!(cursor.next_char(), Some(b'a'));
        assert_eq!(cursor.source().lineno, 1);
        assert_eq!(cursor.next_char(), Some(b'b'));
        assert_eq!(cursor.next_char(), Some(b'\n'));
        assert_eq!(cursor.source().lineno, 1);
        assert_eq!(cursor.next_char(), Some(b'c'));
        let source = cursor.source();
        assert_eq!(source.lineno, 2);
        assert_eq!(source.bol, 3);
    }

    #[test]
    fn push_back_crossing_newline_restores_line_number() {
        let module = ModuleCode::from_source("m", "a\nb");
        let mut cursor = Cursor::new(module);
        cursor.next_char();
        cursor.next_char();
        cursor.next_char();
        assert_eq!(cursor.source().lineno, 2);
        cursor.push_back();
        assert_eq!(cursor.source().lineno, 1);
    }

    #[test]
    fn appends_terminating_newline() {
        let module = ModuleCode::from_source("m", "x = 1");
        assert!(module.code.ends_with('\n'));
    }

    #[test]
    fn line_at_strips_leading_whitespace() {
        let module = ModuleCode::from_source("m", "    print 1\nnext");
        assert_eq!(module.line_at(0), "print 1");
    }
}
