//! C++ source writer - builds generated text with consistent indentation

use std::fmt::Write;

/// A buffer for building C++ source with proper indentation.
///
/// Preprocessor lines always start at column 0, whatever the current indentation.
#[derive(Debug)]
pub struct CppWriter {
    buffer: String,
    indent_level: usize,
    indent_str: &'static str,
}

impl Default for CppWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl CppWriter {
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            indent_level: 0,
            indent_str: "  ", // 2 spaces, clang-format's LLVM default
        }
    }

    /// Get the generated code
    pub fn finish(self) -> String {
        self.buffer
    }

    pub fn as_str(&self) -> &str {
        &self.buffer
    }

    /// Write a line with current indentation
    pub fn line(&mut self, s: &str) {
        if s.starts_with('#') {
            self.buffer.push_str(s);
        } else if !s.is_empty() {
            self.write_indent();
            self.buffer.push_str(s);
        }
        self.buffer.push('\n');
    }

    /// Write formatted text as one line
    pub fn linef(&mut self, args: std::fmt::Arguments<'_>) {
        let mut s = String::new();
        let _ = s.write_fmt(args);
        self.line(&s);
    }

    /// Write every line of a multi-line fragment at the current indentation.
    ///
    /// Continuation lines of a raw string literal are copied verbatim.
    pub fn lines(&mut self, text: &str) {
        let mut open: Option<String> = None;
        for l in text.lines() {
            match &open {
                Some(close) => {
                    if l.contains(close.as_str()) {
                        open = None;
                    }
                    self.buffer.push_str(l);
                    self.buffer.push('\n');
                }
                None => {
                    self.line(l);
                    open = unterminated_raw_string(l);
                }
            }
        }
    }

    pub fn blank_line(&mut self) {
        self.buffer.push('\n');
    }

    fn write_indent(&mut self) {
        for _ in 0..self.indent_level {
            self.buffer.push_str(self.indent_str);
        }
    }

    pub fn indent(&mut self) {
        self.indent_level += 1;
    }

    pub fn dedent(&mut self) {
        if self.indent_level > 0 {
            self.indent_level -= 1;
        }
    }

    /// Write a brace block: `header {`, body, `}`
    pub fn block<F>(&mut self, header: &str, f: F)
    where
        F: FnOnce(&mut Self),
    {
        self.block_with_close(header, "}", f);
    }

    /// Write a class or struct body, closed with `};`
    pub fn class_block<F>(&mut self, header: &str, f: F)
    where
        F: FnOnce(&mut Self),
    {
        self.block_with_close(header, "};", f);
    }

    fn block_with_close<F>(&mut self, header: &str, close: &str, f: F)
    where
        F: FnOnce(&mut Self),
    {
        self.line(&format!("{header} {{"));
        self.indent();
        f(self);
        self.dedent();
        self.line(close);
    }

    /// Access label (`public:`), outdented by one level
    pub fn label(&mut self, s: &str) {
        self.dedent();
        self.line(s);
        self.indent();
    }

    /// `#ifndef guard` ... `#endif`, optionally preceded by `#define guard`
    pub fn guarded<F>(&mut self, guard: &str, disabled: bool, f: F)
    where
        F: FnOnce(&mut Self),
    {
        if disabled {
            self.line(&format!("#define {guard}"));
        }
        self.line(&format!("#ifndef {guard}"));
        f(self);
        self.line(&format!("#endif // {guard}"));
    }
}

/// Closing delimiter of a raw string literal opened but not closed on `line`.
fn unterminated_raw_string(line: &str) -> Option<String> {
    let start = line.rfind("R\"")?;
    let rest = &line[start + 2..];
    let paren = rest.find('(')?;
    let close = format!("){}\"", &rest[..paren]);
    (!rest[paren..].contains(&close)).then_some(close)
}
