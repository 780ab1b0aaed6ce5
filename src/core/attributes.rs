//! MD-004: Attribute extraction and precedence resolution.
//!
//! The extractor turns attribute-file statements into raw
//! `AttributeAssignment`s: precedence keyword, bracketed path, normalized
//! right-hand literal. The resolver merges all assignments into one
//! authoritative value per top-level attribute path: highest tier wins,
//! same-tier ties go to the assignment declared latest in the caller-supplied
//! order, and mapping values deep-merge key by key instead of replacing the
//! whole subtree. Callers that need deterministic tie-breaking must feed
//! files in a stable order (the cookbook driver uses lexical path order).

use super::scanner::{self, StatementKind};
use super::types::{
    AttrValue, AttributeAssignment, Diagnostic, Precedence, ResolvedAttribute, StructuralError,
};
use indexmap::IndexMap;
use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use std::sync::OnceLock;

/// Raw assignments extracted from one attribute file.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeParse {
    pub assignments: Vec<AttributeAssignment>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Output of precedence resolution across one or more files.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// One entry per top-level attribute key, first-seen order. The value is
    /// the fully merged subtree.
    pub attributes: Vec<ResolvedAttribute>,

    /// Number of distinct full paths assigned from two or more tiers.
    pub conflict_count: usize,

    pub diagnostics: Vec<Diagnostic>,
}

impl Resolution {
    /// Look up the resolved value at a path, walking merged subtrees.
    pub fn get(&self, path: &[&str]) -> Option<&AttrValue> {
        let first = path.first()?;
        let entry = self
            .attributes
            .iter()
            .find(|a| a.path.len() == 1 && a.path[0] == *first)?;
        let mut value = &entry.value;
        for segment in &path[1..] {
            match value {
                AttrValue::Map(entries) => value = entries.get(*segment)?,
                _ => return None,
            }
        }
        Some(value)
    }
}

fn assignment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?s)^(?:node\.)?(default|force_default|normal|set|override|force_override|automatic)\s*((?:\[[^\]]+\]\s*)+)(<<|\+=|=)\s*(.*)$",
        )
        .expect("assignment regex")
    })
}

fn node_assignment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)^node\s*((?:\[[^\]]+\]\s*)+)(<<|\+=|=)\s*(.*)$").expect("node regex")
    })
}

fn path_segment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"\[\s*(?:'([^']*)'|"([^"]*)"|:(\w+))\s*\]"#).expect("segment regex")
    })
}

/// Parse one attribute file.
///
/// `file` is a provenance label only — the engine never opens files.
/// `precedence_hint` supplies the tier for bare `node[...]` assignments,
/// which carry no keyword of their own.
pub fn parse_attributes(
    text: &str,
    file: &str,
    precedence_hint: Precedence,
) -> Result<AttributeParse, StructuralError> {
    let statements = scanner::scan(text)?;
    let mut assignments = Vec::new();
    let mut diagnostics = Vec::new();

    for stmt in &statements {
        if stmt.kind == StatementKind::Block {
            diagnostics.push(Diagnostic::UnmappedConstruct {
                construct: "conditional block".to_string(),
                detail: format!(
                    "{}:{}: block statement in attribute file left unconverted",
                    file, stmt.line
                ),
            });
            continue;
        }

        let (keyword_tier, path_text, op, rhs) =
            if let Some(caps) = assignment_re().captures(&stmt.text) {
                (
                    Precedence::from_keyword(&caps[1]),
                    caps[2].to_string(),
                    caps[3].to_string(),
                    caps[4].to_string(),
                )
            } else if let Some(caps) = node_assignment_re().captures(&stmt.text) {
                (
                    Some(precedence_hint),
                    caps[1].to_string(),
                    caps[2].to_string(),
                    caps[3].to_string(),
                )
            } else {
                diagnostics.push(Diagnostic::UnmappedConstruct {
                    construct: "statement".to_string(),
                    detail: format!(
                        "{}:{}: not an attribute assignment: {}",
                        file,
                        stmt.line,
                        first_line(&stmt.text)
                    ),
                });
                continue;
            };

        let Some(precedence) = keyword_tier else {
            continue;
        };

        if op != "=" {
            diagnostics.push(Diagnostic::UnmappedConstruct {
                construct: format!("append ({})", op),
                detail: format!(
                    "{}:{}: append assignment left unconverted",
                    file, stmt.line
                ),
            });
            continue;
        }

        let path: Vec<String> = path_segment_re()
            .captures_iter(&path_text)
            .map(|caps| {
                caps.get(1)
                    .or_else(|| caps.get(2))
                    .or_else(|| caps.get(3))
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default()
            })
            .collect();
        if path.is_empty() {
            diagnostics.push(Diagnostic::UnmappedConstruct {
                construct: "attribute path".to_string(),
                detail: format!("{}:{}: unreadable path segments", file, stmt.line),
            });
            continue;
        }

        match parse_value(&rhs) {
            Some(value) => assignments.push(AttributeAssignment {
                precedence,
                path,
                value,
                file: file.to_string(),
                line: stmt.line,
            }),
            None => diagnostics.push(Diagnostic::UnmappedConstruct {
                construct: "attribute value".to_string(),
                detail: format!(
                    "{}:{}: right-hand side left unconverted: {}",
                    file,
                    stmt.line,
                    first_line(&rhs)
                ),
            }),
        }
    }

    if assignments.is_empty() {
        diagnostics.push(Diagnostic::EmptyResult {
            detail: format!("{}: no attribute assignments found", file),
        });
    }

    Ok(AttributeParse {
        assignments,
        diagnostics,
    })
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("")
}

// ============================================================================
// Literal values
// ============================================================================

/// Parse a Ruby-ish literal into a normalized value. Whitespace-tolerant so
/// multi-line array/hash continuations joined by the scanner parse as-is.
/// Unrecognized expressions (method calls, interpolation-heavy strings)
/// fall back to their raw text as a string; `nil` has no counterpart and
/// returns None.
pub fn parse_value(input: &str) -> Option<AttrValue> {
    let trimmed = input.trim();
    if trimmed.is_empty() || trimmed == "nil" {
        return None;
    }
    let mut parser = ValueParser::new(trimmed);
    let value = parser.parse()?;
    parser.skip_ws();
    if parser.at_end() {
        Some(value)
    } else {
        // Trailing tokens mean this was an expression, not a literal.
        Some(AttrValue::Str(trimmed.to_string()))
    }
}

struct ValueParser {
    chars: Vec<char>,
    pos: usize,
}

impl ValueParser {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn parse(&mut self) -> Option<AttrValue> {
        self.skip_ws();
        match self.peek()? {
            '\'' | '"' => self.parse_string(),
            '[' => self.parse_array(),
            '{' => self.parse_hash(),
            ':' => self.parse_symbol(),
            '%' => self.parse_word_array(),
            c if c == '-' || c.is_ascii_digit() => self.parse_number(),
            _ => self.parse_bareword(),
        }
    }

    fn parse_string(&mut self) -> Option<AttrValue> {
        let quote = self.bump()?;
        let mut out = String::new();
        while let Some(ch) = self.bump() {
            if ch == '\\' {
                match self.bump() {
                    Some('n') if quote == '"' => out.push('\n'),
                    Some('t') if quote == '"' => out.push('\t'),
                    Some(other) => out.push(other),
                    None => return None,
                }
            } else if ch == quote {
                return Some(AttrValue::Str(out));
            } else {
                out.push(ch);
            }
        }
        None
    }

    fn parse_array(&mut self) -> Option<AttrValue> {
        self.bump(); // '['
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(']') {
                self.bump();
                return Some(AttrValue::Seq(items));
            }
            items.push(self.parse()?);
            self.skip_ws();
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                Some(']') => {}
                _ => return None,
            }
        }
    }

    fn parse_hash(&mut self) -> Option<AttrValue> {
        self.bump(); // '{'
        let mut entries = IndexMap::new();
        loop {
            self.skip_ws();
            if self.peek() == Some('}') {
                self.bump();
                return Some(AttrValue::Map(entries));
            }
            let key = self.parse_hash_key()?;
            self.skip_ws();
            if self.peek() == Some('=') {
                // '=>' arrow
                self.bump();
                if self.bump() != Some('>') {
                    return None;
                }
            }
            let value = self.parse()?;
            entries.insert(key, value);
            self.skip_ws();
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                Some('}') => {}
                _ => return None,
            }
        }
    }

    /// Hash keys: `'k' =>`, `"k" =>`, `:k =>`, or the `k:` shorthand.
    fn parse_hash_key(&mut self) -> Option<String> {
        self.skip_ws();
        match self.peek()? {
            '\'' | '"' => match self.parse_string()? {
                AttrValue::Str(s) => Some(s),
                _ => None,
            },
            ':' => {
                self.bump();
                Some(self.take_word())
            }
            c if c.is_alphanumeric() || c == '_' => {
                let word = self.take_word();
                self.skip_ws();
                if self.peek() == Some(':') {
                    self.bump();
                    Some(word)
                } else {
                    // Bare word followed by '=>'.
                    Some(word)
                }
            }
            _ => None,
        }
    }

    fn parse_symbol(&mut self) -> Option<AttrValue> {
        self.bump(); // ':'
        let word = self.take_word();
        if word.is_empty() {
            None
        } else {
            Some(AttrValue::Str(word))
        }
    }

    /// `%w(a b c)` and `%w[a b c]` word arrays.
    fn parse_word_array(&mut self) -> Option<AttrValue> {
        self.bump(); // '%'
        if self.peek() != Some('w') && self.peek() != Some('W') {
            return None;
        }
        self.bump();
        let close = match self.bump()? {
            '(' => ')',
            '[' => ']',
            '{' => '}',
            _ => return None,
        };
        let mut words = Vec::new();
        let mut word = String::new();
        loop {
            match self.bump()? {
                c if c == close => {
                    if !word.is_empty() {
                        words.push(AttrValue::Str(word));
                    }
                    return Some(AttrValue::Seq(words));
                }
                c if c.is_whitespace() => {
                    if !word.is_empty() {
                        words.push(AttrValue::Str(std::mem::take(&mut word)));
                    }
                }
                c => word.push(c),
            }
        }
    }

    fn parse_number(&mut self) -> Option<AttrValue> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.bump();
        }
        let mut saw_dot = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == '_' {
                self.bump();
            } else if c == '.' && !saw_dot && matches!(self.chars.get(self.pos + 1), Some(d) if d.is_ascii_digit())
            {
                saw_dot = true;
                self.bump();
            } else {
                break;
            }
        }
        let text: String = self.chars[start..self.pos]
            .iter()
            .filter(|c| **c != '_')
            .collect();
        if saw_dot {
            text.parse().ok().map(AttrValue::Float)
        } else {
            text.parse().ok().map(AttrValue::Int)
        }
    }

    fn parse_bareword(&mut self) -> Option<AttrValue> {
        let word = self.take_word();
        match word.as_str() {
            "true" => Some(AttrValue::Bool(true)),
            "false" => Some(AttrValue::Bool(false)),
            "" => None,
            _ => {
                // Expressions are kept verbatim; the caller's trailing-token
                // check widens this to the whole input.
                Some(AttrValue::Str(word))
            }
        }
    }

    fn take_word(&mut self) -> String {
        let mut word = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' || c == '.' || c == '-' || c == '?' {
                word.push(c);
                self.bump();
            } else {
                break;
            }
        }
        word
    }
}

// ============================================================================
// Precedence resolution
// ============================================================================

/// Merge all assignments into one authoritative value per top-level path.
///
/// Assignments are ranked by (tier, input order): the fold applies them
/// lowest-first, so the highest tier wins at every leaf and same-tier ties go
/// to the latest declaration. Mapping values merge key-wise; any other
/// combination replaces outright, which is how a higher-tier scalar shadows a
/// whole lower-tier subtree.
pub fn resolve_attributes(assignments: &[AttributeAssignment]) -> Resolution {
    let mut ranked: Vec<(usize, &AttributeAssignment)> = assignments.iter().enumerate().collect();
    ranked.sort_by_key(|(idx, a)| (a.precedence, *idx));

    // Merged subtree per top-level key, first-seen order.
    let mut merged: IndexMap<String, AttrValue> = IndexMap::new();
    for assignment in assignments {
        merged
            .entry(assignment.path[0].clone())
            .or_insert_with(|| AttrValue::Map(IndexMap::new()));
    }
    for (_, assignment) in &ranked {
        let slot = merged
            .get_mut(&assignment.path[0])
            .expect("top-level key seeded above");
        merge_at(slot, &assignment.path[1..], assignment.value.clone());
    }

    // Tier sets per full path, for the conflict report.
    let mut tiers_by_path: HashMap<String, BTreeSet<Precedence>> = HashMap::new();
    let mut path_order: Vec<String> = Vec::new();
    for assignment in assignments {
        let key = assignment.path_key();
        let entry = tiers_by_path.entry(key.clone()).or_default();
        if entry.is_empty() {
            path_order.push(key.clone());
        }
        entry.insert(assignment.precedence);
    }

    let mut conflict_count = 0;
    let mut diagnostics = Vec::new();
    for key in &path_order {
        let tiers = &tiers_by_path[key];
        if tiers.len() >= 2 {
            conflict_count += 1;
            diagnostics.push(Diagnostic::PrecedenceConflict {
                path: key.clone(),
                tiers: tiers.iter().map(|t| t.to_string()).collect(),
            });
        }
    }

    let attributes = merged
        .into_iter()
        .map(|(top, value)| {
            let contributors: Vec<AttributeAssignment> = assignments
                .iter()
                .filter(|a| a.path[0] == top)
                .cloned()
                .collect();
            let winning_precedence = contributors
                .iter()
                .map(|a| a.precedence)
                .max()
                .unwrap_or(Precedence::Default);
            // A single bare top-level assignment keeps its own shape instead
            // of the seeded empty map.
            ResolvedAttribute {
                path: vec![top],
                value,
                winning_precedence,
                contributors,
            }
        })
        .collect();

    Resolution {
        attributes,
        conflict_count,
        diagnostics,
    }
}

/// Merge `incoming` into `slot` at the relative `path`. Interior segments
/// force mapping nodes; at the leaf, mapping-vs-mapping merges key-wise and
/// anything else replaces.
fn merge_at(slot: &mut AttrValue, path: &[String], incoming: AttrValue) {
    if path.is_empty() {
        let old = std::mem::replace(slot, AttrValue::Bool(false));
        *slot = merge_values(old, incoming);
        return;
    }
    if !slot.is_map() {
        *slot = AttrValue::Map(IndexMap::new());
    }
    if let AttrValue::Map(entries) = slot {
        let child = entries
            .entry(path[0].clone())
            .or_insert_with(|| AttrValue::Map(IndexMap::new()));
        if path.len() == 1 {
            let old = std::mem::replace(child, AttrValue::Bool(false));
            *child = merge_values(old, incoming);
        } else {
            merge_at(child, &path[1..], incoming);
        }
    }
}

fn merge_values(old: AttrValue, new: AttrValue) -> AttrValue {
    match (old, new) {
        (AttrValue::Map(mut base), AttrValue::Map(over)) => {
            for (key, value) in over {
                match base.shift_remove(&key) {
                    Some(existing) => {
                        base.insert(key, merge_values(existing, value));
                    }
                    None => {
                        base.insert(key, value);
                    }
                }
            }
            AttrValue::Map(base)
        }
        (_, new) => new,
    }
}
