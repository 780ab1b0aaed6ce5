//! MD-002: Structural statement scanner.
//!
//! Splits raw Chef DSL text into top-level statements: `do ... end` resource
//! blocks, single-line statements (attribute assignments, bare resource
//! declarations), and comments (skipped). The scanner is an explicit state
//! machine over quote state, bracket depth, and block depth, so multi-line
//! array/hash literals and nested interpolation never split a statement
//! mid-token.
//!
//! Unterminated quotes or blocks surface as a recoverable `StructuralError`;
//! callers skip the file and continue with its siblings.

use super::types::StructuralError;

/// Statement shape as seen by the extractors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// Header + body + matching `end` terminator.
    Block,
    /// One logical line (continuations already joined).
    Line,
}

/// One top-level statement span. Comment text is already stripped.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    pub text: String,

    /// 1-based line where the statement starts.
    pub line: usize,
}

/// String/interpolation context, innermost last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ctx {
    Single,
    Double,
    /// `#{ ... }` inside a double-quoted string; brace depth tracks nesting.
    Interp(usize),
}

/// Keywords that open a block when they lead a statement. `do` opens
/// anywhere; trailing-modifier `if`/`unless` must not.
const LEADING_OPENERS: &[&str] = &["if", "unless", "case", "begin", "def", "while", "until"];

struct Scanner {
    ctx: Vec<Ctx>,
    bracket_depth: usize,
    block_depth: usize,

    /// Line where the innermost open quote started, for error spans.
    quote_start_line: usize,

    current: Vec<String>,
    current_start: usize,
    current_has_block: bool,
    statements: Vec<Statement>,
}

impl Scanner {
    fn new() -> Self {
        Self {
            ctx: Vec::new(),
            bracket_depth: 0,
            block_depth: 0,
            quote_start_line: 0,
            current: Vec::new(),
            current_start: 0,
            current_has_block: false,
            statements: Vec::new(),
        }
    }

    /// Consume one raw line. Returns the line with any top-level comment
    /// stripped, or an error on malformed nesting.
    fn scan_line(&mut self, raw: &str, line_no: usize) -> Result<String, StructuralError> {
        let mut kept = String::with_capacity(raw.len());
        let mut chars = raw.chars().peekable();
        let mut word = String::new();
        // A block keyword like `if` only opens when it leads its line;
        // trailing modifiers (`package 'x' if cond`) must not.
        let mut line_leading = true;

        while let Some(ch) = chars.next() {
            match self.ctx.last().copied() {
                Some(Ctx::Single) => {
                    kept.push(ch);
                    if ch == '\\' {
                        if let Some(next) = chars.next() {
                            kept.push(next);
                        }
                    } else if ch == '\'' {
                        self.ctx.pop();
                    }
                }
                Some(Ctx::Double) => {
                    kept.push(ch);
                    if ch == '\\' {
                        if let Some(next) = chars.next() {
                            kept.push(next);
                        }
                    } else if ch == '"' {
                        self.ctx.pop();
                    } else if ch == '#' && chars.peek() == Some(&'{') {
                        kept.push(chars.next().unwrap_or('{'));
                        self.ctx.push(Ctx::Interp(1));
                    }
                }
                _ => {
                    // Code position: top level or inside interpolation.
                    if ch == '#' && self.ctx.is_empty() {
                        // Comment to end of line.
                        break;
                    }
                    if ch.is_alphanumeric() || ch == '_' || ch == '?' || ch == '!' {
                        word.push(ch);
                        kept.push(ch);
                        continue;
                    }
                    self.finish_word(&mut word, &mut line_leading, line_no)?;
                    kept.push(ch);
                    match ch {
                        '\'' => {
                            self.ctx.push(Ctx::Single);
                            self.quote_start_line = line_no;
                            line_leading = false;
                        }
                        '"' => {
                            self.ctx.push(Ctx::Double);
                            self.quote_start_line = line_no;
                            line_leading = false;
                        }
                        '(' | '[' => {
                            self.bracket_depth += 1;
                            line_leading = false;
                        }
                        ')' | ']' => {
                            self.bracket_depth = self.bracket_depth.saturating_sub(1);
                            line_leading = false;
                        }
                        '{' => {
                            if let Some(Ctx::Interp(depth)) = self.ctx.last_mut() {
                                *depth += 1;
                            } else {
                                self.bracket_depth += 1;
                            }
                            line_leading = false;
                        }
                        '}' => {
                            if let Some(Ctx::Interp(depth)) = self.ctx.last_mut() {
                                *depth -= 1;
                                if *depth == 0 {
                                    self.ctx.pop();
                                }
                            } else {
                                self.bracket_depth = self.bracket_depth.saturating_sub(1);
                            }
                            line_leading = false;
                        }
                        ch if !ch.is_whitespace() => line_leading = false,
                        _ => {}
                    }
                }
            }
        }
        self.finish_word(&mut word, &mut line_leading, line_no)?;

        Ok(kept.trim_end().to_string())
    }

    /// Apply block-keyword semantics for a completed identifier token.
    fn finish_word(
        &mut self,
        word: &mut String,
        line_leading: &mut bool,
        line_no: usize,
    ) -> Result<(), StructuralError> {
        if word.is_empty() {
            return Ok(());
        }
        if self.ctx.is_empty() {
            match word.as_str() {
                "do" => {
                    self.block_depth += 1;
                    self.current_has_block = true;
                }
                "end" => {
                    if self.block_depth == 0 {
                        return Err(StructuralError::new(
                            "unexpected 'end' with no open block",
                            line_no,
                        ));
                    }
                    self.block_depth -= 1;
                }
                kw if *line_leading && LEADING_OPENERS.contains(&kw) => {
                    self.block_depth += 1;
                    self.current_has_block = true;
                }
                _ => {}
            }
        }
        *line_leading = false;
        word.clear();
        Ok(())
    }

    /// Whether the statement in progress continues onto the next line.
    fn continues(&self, stripped: &str) -> bool {
        if !self.ctx.is_empty() || self.bracket_depth > 0 || self.block_depth > 0 {
            return true;
        }
        let trimmed = stripped.trim_end();
        trimmed.ends_with(',')
            || trimmed.ends_with('\\')
            || trimmed.ends_with('=')
            || trimmed.ends_with("=>")
            || trimmed.ends_with("&&")
            || trimmed.ends_with("||")
            || trimmed.ends_with('+')
            || trimmed.ends_with('.')
    }

    fn flush_statement(&mut self) {
        let text = self.current.join("\n");
        let is_blank = text.trim().is_empty();
        if !is_blank {
            self.statements.push(Statement {
                kind: if self.current_has_block {
                    StatementKind::Block
                } else {
                    StatementKind::Line
                },
                text,
                line: self.current_start,
            });
        }
        self.current.clear();
        self.current_has_block = false;
    }
}

/// Scan raw source text into top-level statements.
///
/// Comment lines are skipped, continuations joined, and `do ... end` blocks
/// kept whole. Returns a `StructuralError` when the text ends inside a
/// quote, bracket, or block.
pub fn scan(source: &str) -> Result<Vec<Statement>, StructuralError> {
    let mut scanner = Scanner::new();

    for (idx, raw) in source.lines().enumerate() {
        let line_no = idx + 1;
        if scanner.current.is_empty() {
            scanner.current_start = line_no;
        }

        let stripped = scanner.scan_line(raw, line_no)?;

        let blank = stripped.trim().is_empty();
        if blank && scanner.current.is_empty() {
            continue;
        }
        scanner.current.push(stripped.clone());

        if !scanner.continues(&stripped) {
            scanner.flush_statement();
        }
    }

    if !scanner.ctx.is_empty() {
        let kind = match scanner.ctx.last() {
            Some(Ctx::Single) => "single-quoted string",
            Some(Ctx::Double) => "double-quoted string",
            _ => "string interpolation",
        };
        return Err(StructuralError::new(
            format!("unterminated {}", kind),
            scanner.quote_start_line,
        ));
    }
    if scanner.block_depth > 0 {
        return Err(StructuralError::new(
            "unterminated block (missing 'end')",
            scanner.current_start,
        ));
    }
    if scanner.bracket_depth > 0 {
        return Err(StructuralError::new(
            "unterminated bracket or brace literal",
            scanner.current_start,
        ));
    }
    scanner.flush_statement();

    Ok(scanner.statements)
}
