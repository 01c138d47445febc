//! Trace recording and tokenisation.
//!
//! One action per line, write-through with a flush after every line so a
//! crashing back-end still leaves the line that killed it on disk.
//! Object-creating actions are followed by a `return s<id>` or
//! `return t<id>` line. Comments run from `;` to end of line; quoted
//! strings may contain spaces, `;`, and `|`.

use crate::error::Result;
use std::io::Write;

/// Write-through sink for trace lines.
pub struct TraceWriter {
    out: Option<Box<dyn Write>>,
    last_line: String,
    num_lines: usize,
}

impl std::fmt::Debug for TraceWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceWriter")
            .field("num_lines", &self.num_lines)
            .field("last_line", &self.last_line)
            .finish()
    }
}

impl TraceWriter {
    /// Writer over an externally owned sink.
    #[must_use]
    pub fn new(out: Box<dyn Write>) -> Self {
        Self {
            out: Some(out),
            last_line: String::new(),
            num_lines: 0,
        }
    }

    /// Writer that records the last line but emits nothing.
    #[must_use]
    pub fn sink() -> Self {
        Self {
            out: None,
            last_line: String::new(),
            num_lines: 0,
        }
    }

    /// Emit one trace line, flushing immediately.
    pub fn line(&mut self, line: &str) -> Result<()> {
        debug_assert!(!line.contains('\n'));
        self.last_line.clear();
        self.last_line.push_str(line);
        self.num_lines += 1;
        if let Some(out) = self.out.as_mut() {
            writeln!(out, "{line}")?;
            out.flush()?;
        }
        Ok(())
    }

    /// The most recently emitted line.
    #[must_use]
    pub fn last_line(&self) -> &str {
        &self.last_line
    }

    /// Number of lines emitted so far.
    #[must_use]
    pub fn num_lines(&self) -> usize {
        self.num_lines
    }
}

/// Split a trace line into its action id and argument tokens.
///
/// Returns `None` for blank and comment-only lines. Quoted tokens keep
/// their quotes stripped; everything after an unquoted `;` is dropped.
#[must_use]
pub fn tokenize(line: &str) -> Option<(String, Vec<String>)> {
    let mut tokens: Vec<String> = Vec::new();
    let mut cur = String::new();
    let mut in_quote = false;
    let mut quoted = false;
    for c in line.chars() {
        match c {
            '"' => {
                in_quote = !in_quote;
                quoted = true;
            }
            ';' if !in_quote => break,
            c if c.is_whitespace() && !in_quote => {
                if !cur.is_empty() || quoted {
                    tokens.push(std::mem::take(&mut cur));
                    quoted = false;
                }
            }
            c => cur.push(c),
        }
    }
    if !cur.is_empty() || quoted {
        tokens.push(cur);
    }
    if tokens.is_empty() {
        return None;
    }
    let id = tokens.remove(0);
    Some((id, tokens))
}

/// Quote a symbol or literal for the trace.
#[must_use]
pub fn quote(s: &str) -> String {
    format!("\"{s}\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_plain() {
        let (id, tokens) = tokenize("mk-term bv-add 2 t1 t2").unwrap();
        assert_eq!(id, "mk-term");
        assert_eq!(tokens, vec!["bv-add", "2", "t1", "t2"]);
    }

    #[test]
    fn test_tokenize_quoted_with_spaces() {
        let (id, tokens) = tokenize("mk-const s1 \"|a b; c|\"").unwrap();
        assert_eq!(id, "mk-const");
        assert_eq!(tokens, vec!["s1", "|a b; c|"]);
    }

    #[test]
    fn test_tokenize_empty_quoted() {
        let (id, tokens) = tokenize("mk-value s3 \"\"").unwrap();
        assert_eq!(id, "mk-value");
        assert_eq!(tokens, vec!["s3", ""]);
    }

    #[test]
    fn test_tokenize_comments_and_blank() {
        assert!(tokenize("; a comment").is_none());
        assert!(tokenize("   ").is_none());
        let (id, tokens) = tokenize("check-sat ; inline comment").unwrap();
        assert_eq!(id, "check-sat");
        assert!(tokens.is_empty());
    }

    #[test]
    fn test_writer_records_last_line() {
        let mut w = TraceWriter::sink();
        w.line("new").unwrap();
        w.line("check-sat").unwrap();
        assert_eq!(w.last_line(), "check-sat");
        assert_eq!(w.num_lines(), 2);
    }

    #[test]
    fn test_writer_flushes_through() {
        let buf: Vec<u8> = Vec::new();
        let mut w = TraceWriter::new(Box::new(buf));
        w.line("new").unwrap();
        // the sink is owned by the writer; the observable contract is
        // that no error surfaced and the line count advanced
        assert_eq!(w.num_lines(), 1);
    }
}
