//! Human-readable plan rendering.

/// Options controlling how much an explanation shows.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExplainOptions {
    /// Render operand data ids alongside operator names.
    pub with_data: bool,
}

/// Text sink for explain output.
///
/// Nested operators push the no-newline state so a compound expression stays
/// on one line, and pop it when they are done.
#[derive(Debug, Default)]
pub struct Explain {
    options: ExplainOptions,
    buf: String,
    indent: usize,
    no_newline: u32,
    line_open: bool,
}

impl Explain {
    /// Creates a sink with the given options.
    pub fn new(options: ExplainOptions) -> Self {
        Explain {
            options,
            ..Explain::default()
        }
    }

    /// Whether operand data should be rendered.
    pub fn with_data(&self) -> bool {
        self.options.with_data
    }

    /// Appends text to the current line.
    pub fn put(&mut self, text: &str) -> &mut Self {
        self.buf.push_str(text);
        self.line_open = true;
        self
    }

    /// Appends an integer to the current line.
    pub fn put_i32(&mut self, value: i32) -> &mut Self {
        self.put(&value.to_string())
    }

    /// Starts a new line unless a no-newline scope is active.
    pub fn new_line(&mut self) -> &mut Self {
        if self.no_newline == 0 && self.line_open {
            self.buf.push('\n');
            for _ in 0..self.indent {
                self.buf.push_str("  ");
            }
            self.line_open = false;
        }
        self
    }

    /// Increases the indent of subsequent lines.
    pub fn push_indent(&mut self) -> &mut Self {
        self.indent += 1;
        self
    }

    /// Decreases the indent of subsequent lines.
    pub fn pop_indent(&mut self) -> &mut Self {
        self.indent = self.indent.saturating_sub(1);
        self
    }

    /// Enters a no-newline scope.
    pub fn push_no_newline(&mut self) -> &mut Self {
        self.no_newline += 1;
        self
    }

    /// Leaves a no-newline scope.
    pub fn pop_no_newline(&mut self) -> &mut Self {
        self.no_newline = self.no_newline.saturating_sub(1);
        self
    }

    /// The rendered text.
    pub fn text(&self) -> &str {
        &self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_newline_scope_keeps_one_line() {
        let mut e = Explain::new(ExplainOptions::default());
        e.put("a");
        e.push_no_newline();
        e.new_line();
        e.put("b");
        e.pop_no_newline();
        e.new_line();
        e.put("c");
        assert_eq!(e.text(), "ab\nc");
    }
}
