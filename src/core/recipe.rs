//! MD-003: Recipe resource extraction.
//!
//! Walks scanner output for one recipe file and yields the ordered resource
//! declarations: type, name, actions, properties, guards, and notification
//! edges. Top-level `if`/`unless` wrappers are flattened by attaching the
//! condition as a guard on every resource inside them. Anything without an
//! extraction rule (include_recipe, ruby_block bodies, else-branches) is
//! flagged, never silently dropped.

use super::scanner::{self, Statement, StatementKind};
use super::types::{
    Diagnostic, Guard, GuardKind, Notification, NotifyTiming, ResourceDeclaration,
    StructuralError,
};
use indexmap::IndexMap;
use regex::Regex;
use std::sync::OnceLock;

/// Everything extracted from one recipe file.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeParse {
    pub resources: Vec<ResourceDeclaration>,
    pub diagnostics: Vec<Diagnostic>,
}

fn block_header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^([a-z_]\w*)\s+(?:'([^']+)'|"([^"]+)")\s+do\s*$"#).expect("header regex")
    })
}

fn bare_resource_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^([a-z_]\w*)\s+(?:'([^']+)'|"([^"]+)")\s*$"#).expect("bare regex")
    })
}

fn control_header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(if|unless)\s+(.+)$").expect("control regex"))
}

fn notifies_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"^(notifies|subscribes)\s+:(\w+)\s*,\s*(?:'([^']+)'|"([^"]+)")\s*(?:,\s*:(\w+))?\s*$"#,
        )
        .expect("notifies regex")
    })
}

fn action_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^action\s+(.+)$").expect("action regex"))
}

fn guard_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)^(only_if|not_if|unless)\s+(.+)$").expect("guard regex"))
}

fn property_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)^([a-z_]\w*)\s+(.+)$").expect("property regex"))
}

/// Default action per resource type when the source names none.
pub fn default_action(type_name: &str) -> &'static str {
    match type_name {
        "package" => "install",
        "service" => "start",
        "execute" | "bash" | "script" => "run",
        "file" | "directory" | "template" | "cookbook_file" | "remote_file" | "link" => "create",
        "user" | "group" => "create",
        _ => "create",
    }
}

/// Parse one recipe file into ordered resource declarations.
///
/// A file that parses cleanly but declares no resources yields an explicit
/// `EmptyResult` diagnostic rather than an error.
pub fn parse_recipe(text: &str) -> Result<RecipeParse, StructuralError> {
    let statements = scanner::scan(text)?;
    let mut parse = RecipeParse {
        resources: Vec::new(),
        diagnostics: Vec::new(),
    };
    extract_statements(&statements, &[], &mut parse);

    if parse.resources.is_empty() {
        parse.diagnostics.push(Diagnostic::EmptyResult {
            detail: "no resource declarations found".to_string(),
        });
    }
    Ok(parse)
}

/// Extract resources from a statement list, attaching `inherited` guards
/// (from enclosing `if`/`unless` wrappers) to everything found.
fn extract_statements(statements: &[Statement], inherited: &[Guard], parse: &mut RecipeParse) {
    for stmt in statements {
        match stmt.kind {
            StatementKind::Block => extract_block(stmt, inherited, parse),
            StatementKind::Line => {
                let header = stmt.text.trim();
                if let Some(caps) = bare_resource_re().captures(header) {
                    let type_name = caps[1].to_string();
                    let name = string_group(&caps, 2, 3);
                    parse.resources.push(ResourceDeclaration {
                        actions: vec![default_action(&type_name).to_string()],
                        type_name,
                        name,
                        properties: IndexMap::new(),
                        guards: inherited.to_vec(),
                        notifications: Vec::new(),
                        line: stmt.line,
                    });
                } else {
                    parse.diagnostics.push(Diagnostic::UnmappedConstruct {
                        construct: first_word(header).to_string(),
                        detail: format!("line {}: statement left unconverted", stmt.line),
                    });
                }
            }
        }
    }
}

fn extract_block(stmt: &Statement, inherited: &[Guard], parse: &mut RecipeParse) {
    let mut lines = stmt.text.lines();
    let header = lines.next().unwrap_or("").trim().to_string();
    let body: Vec<&str> = stmt.text.lines().skip(1).collect();
    // Drop the matching terminator; everything between is the block body.
    let body = match body.split_last() {
        Some((last, rest)) if last.trim() == "end" => rest.join("\n"),
        _ => body.join("\n"),
    };

    if let Some(caps) = block_header_re().captures(&header) {
        let type_name = caps[1].to_string();
        let name = string_group(&caps, 2, 3);
        match scanner::scan(&body) {
            Ok(body_statements) => {
                let decl = extract_resource(
                    type_name,
                    name,
                    stmt.line,
                    &body_statements,
                    inherited,
                    parse,
                );
                parse.resources.push(decl);
            }
            Err(err) => parse.diagnostics.push(Diagnostic::UnmappedConstruct {
                construct: type_name,
                detail: format!("line {}: unreadable block body: {}", stmt.line, err),
            }),
        }
        return;
    }

    if let Some(caps) = control_header_re().captures(&header) {
        let kind = if &caps[1] == "if" {
            GuardKind::OnlyIf
        } else {
            GuardKind::NotIf
        };
        let condition = caps[2].trim().to_string();
        let mut guards = inherited.to_vec();
        guards.push(Guard {
            kind,
            expression: condition,
        });

        match scanner::scan(&body) {
            Ok(body_statements) => {
                // Only the first branch converts; else/elsif would need the
                // negated condition and is flagged instead.
                let branch_end = body_statements.iter().position(|s| {
                    let t = s.text.trim();
                    t == "else" || t.starts_with("elsif")
                });
                if let Some(pos) = branch_end {
                    parse.diagnostics.push(Diagnostic::UnmappedConstruct {
                        construct: "else".to_string(),
                        detail: format!(
                            "line {}: alternate branch left unconverted",
                            stmt.line
                        ),
                    });
                    extract_statements(&body_statements[..pos], &guards, parse);
                } else {
                    extract_statements(&body_statements, &guards, parse);
                }
            }
            Err(err) => parse.diagnostics.push(Diagnostic::UnmappedConstruct {
                construct: caps[1].to_string(),
                detail: format!("line {}: unreadable conditional body: {}", stmt.line, err),
            }),
        }
        return;
    }

    parse.diagnostics.push(Diagnostic::UnmappedConstruct {
        construct: first_word(&header).to_string(),
        detail: format!("line {}: block left unconverted", stmt.line),
    });
}

/// Parse one resource block body into a declaration.
fn extract_resource(
    type_name: String,
    name: String,
    line: usize,
    body: &[Statement],
    inherited: &[Guard],
    parse: &mut RecipeParse,
) -> ResourceDeclaration {
    let mut actions: Vec<String> = Vec::new();
    let mut properties = IndexMap::new();
    let mut guards = inherited.to_vec();
    let mut notifications = Vec::new();

    for stmt in body {
        let text = stmt.text.trim();

        // Guard with a do-block expression.
        if stmt.kind == StatementKind::Block {
            if let Some(guard) = parse_block_guard(text) {
                guards.push(guard);
            } else {
                parse.diagnostics.push(Diagnostic::UnmappedConstruct {
                    construct: first_word(text).to_string(),
                    detail: format!(
                        "line {}: nested block inside resource left unconverted",
                        line
                    ),
                });
            }
            continue;
        }

        if let Some(caps) = action_line_re().captures(text) {
            actions.extend(parse_action_list(&caps[1]));
            continue;
        }

        if let Some(caps) = notifies_re().captures(text) {
            let verb = caps[1].to_string();
            let action = caps[2].to_string();
            let target = caps
                .get(3)
                .or_else(|| caps.get(4))
                .map(|m| m.as_str())
                .unwrap_or("");
            let timing = match caps.get(5).map(|m| m.as_str()) {
                Some("immediately" | "immediate") => NotifyTiming::Immediate,
                _ => NotifyTiming::Delayed,
            };
            if verb == "subscribes" {
                parse.diagnostics.push(Diagnostic::UnmappedConstruct {
                    construct: "subscribes".to_string(),
                    detail: format!(
                        "line {}: reverse notification edge left unconverted",
                        line
                    ),
                });
                continue;
            }
            match parse_target_reference(target) {
                Some((target_type, target_name)) => notifications.push(Notification {
                    target_type,
                    target_name,
                    action,
                    timing,
                }),
                None => parse.diagnostics.push(Diagnostic::UnmappedConstruct {
                    construct: "notifies".to_string(),
                    detail: format!("line {}: unreadable target '{}'", line, target),
                }),
            }
            continue;
        }

        if let Some(caps) = guard_line_re().captures(text) {
            let kind = if &caps[1] == "only_if" {
                GuardKind::OnlyIf
            } else {
                GuardKind::NotIf
            };
            guards.push(Guard {
                kind,
                expression: unwrap_guard_expression(&caps[2]),
            });
            continue;
        }

        if let Some(caps) = property_line_re().captures(text) {
            properties.insert(caps[1].to_string(), caps[2].trim().to_string());
            continue;
        }

        parse.diagnostics.push(Diagnostic::UnmappedConstruct {
            construct: first_word(text).to_string(),
            detail: format!("line {}: statement inside resource left unconverted", line),
        });
    }

    if actions.is_empty() {
        actions.push(default_action(&type_name).to_string());
    }

    ResourceDeclaration {
        type_name,
        name,
        actions,
        properties,
        guards,
        notifications,
        line,
    }
}

/// `only_if do ... end` / `not_if do ... end` guard blocks.
fn parse_block_guard(text: &str) -> Option<Guard> {
    let mut lines = text.lines();
    let header = lines.next()?.trim();
    let kind = if header.starts_with("only_if") {
        GuardKind::OnlyIf
    } else if header.starts_with("not_if") {
        GuardKind::NotIf
    } else {
        return None;
    };
    let rest: Vec<&str> = text.lines().skip(1).collect();
    let body = match rest.split_last() {
        Some((last, init)) if last.trim() == "end" => init.join("\n"),
        _ => rest.join("\n"),
    };
    Some(Guard {
        kind,
        expression: body.trim().to_string(),
    })
}

/// `action :install` or `action [:create, :enable]`.
fn parse_action_list(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    let inner = trimmed
        .strip_prefix('[')
        .and_then(|r| r.strip_suffix(']'))
        .unwrap_or(trimmed);
    inner
        .split(',')
        .map(|part| part.trim().trim_start_matches(':').to_string())
        .filter(|part| !part.is_empty())
        .collect()
}

/// `service[nginx]` → (`service`, `nginx`).
pub fn parse_target_reference(reference: &str) -> Option<(String, String)> {
    let open = reference.find('[')?;
    let close = reference.rfind(']')?;
    if close <= open + 1 {
        return None;
    }
    let target_type = reference[..open].trim();
    let target_name = reference[open + 1..close].trim();
    if target_type.is_empty() || target_name.is_empty() {
        return None;
    }
    Some((target_type.to_string(), target_name.to_string()))
}

/// Strip string quotes or `{ ... }` braces from a guard expression.
fn unwrap_guard_expression(raw: &str) -> String {
    let trimmed = raw.trim();
    if (trimmed.starts_with('\'') && trimmed.ends_with('\'') && trimmed.len() >= 2)
        || (trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2)
    {
        return trimmed[1..trimmed.len() - 1].to_string();
    }
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return trimmed[1..trimmed.len() - 1].trim().to_string();
    }
    trimmed.to_string()
}

fn string_group(caps: &regex::Captures<'_>, single: usize, double: usize) -> String {
    caps.get(single)
        .or_else(|| caps.get(double))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

fn first_word(text: &str) -> &str {
    text.split_whitespace().next().unwrap_or(text)
}
