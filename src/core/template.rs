//! MD-005: ERB to Jinja2 template transpilation.
//!
//! Rewrites embedded-Ruby delimiters into Jinja2 while copying literal text
//! byte-for-byte. Control flow is tracked with an explicit stack of open
//! construct kinds so each `end` closes with the matching `endif`/`endfor`,
//! even when conditionals and loops nest. Constructs with no Jinja2
//! counterpart pass through unchanged and are flagged, never dropped.

use super::types::{Diagnostic, TemplateConversionResult};
use regex::Regex;
use std::sync::OnceLock;

/// Open construct kinds, innermost last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenConstruct {
    If,
    For,
}

fn each_loop_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)^(.+?)\.each\s+do\s*\|([^|]+)\|\s*$").expect("each-loop regex")
    })
}

fn node_ref_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"node((?:\[\s*(?:'[^']*'|"[^"]*"|:\w+)\s*\])+)"#).expect("node-ref regex")
    })
}

fn ref_segment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"\[\s*(?:'([^']*)'|"([^"]*)"|:(\w+))\s*\]"#).expect("segment regex")
    })
}

fn ivar_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // The boundary class keeps `@` inside quoted literals (emails) intact.
    RE.get_or_init(|| Regex::new(r#"(^|[^\w'"])@([A-Za-z_]\w*)"#).expect("ivar regex"))
}

fn bare_ident_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_]\w*$").expect("ident regex"))
}

struct Converter {
    out: String,
    variables: Vec<String>,
    warnings: Vec<Diagnostic>,
    stack: Vec<OpenConstruct>,
}

impl Converter {
    fn new() -> Self {
        Self {
            out: String::new(),
            variables: Vec::new(),
            warnings: Vec::new(),
            stack: Vec::new(),
        }
    }

    fn record_var(&mut self, name: &str) {
        if !name.is_empty() && !self.variables.iter().any(|v| v == name) {
            self.variables.push(name.to_string());
        }
    }

    /// Rewrite a Ruby expression into its Jinja2 form and record referenced
    /// variables: `node['a']['b']` becomes `a.b`, `@host` becomes `host`,
    /// `&&`/`||`/`!` become `and`/`or`/`not` outside quoted strings.
    fn translate_expr(&mut self, expr: &str) -> String {
        let mut text = expr.trim().to_string();

        // Attribute-path references first, so their brackets don't confuse
        // the operator pass.
        loop {
            let Some(caps) = node_ref_re().captures(&text) else {
                break;
            };
            let whole = caps.get(0).expect("match");
            let segments: Vec<String> = ref_segment_re()
                .captures_iter(&caps[1])
                .map(|c| {
                    c.get(1)
                        .or_else(|| c.get(2))
                        .or_else(|| c.get(3))
                        .map(|m| m.as_str().to_string())
                        .unwrap_or_default()
                })
                .collect();
            let dotted = segments.join(".");
            self.record_var(&dotted);
            let range = whole.range();
            text.replace_range(range, &dotted);
        }

        while let Some(caps) = ivar_re().captures(&text) {
            let whole = caps.get(0).expect("match");
            let prefix = caps.get(1).map(|m| m.as_str()).unwrap_or("").to_string();
            let name = caps[2].to_string();
            self.record_var(&name);
            let range = whole.range();
            text.replace_range(range, &format!("{}{}", prefix, name));
        }

        let text = translate_operators(&text);

        if bare_ident_re().is_match(&text) {
            self.record_var(&text);
        }

        text
    }

    /// Convert one `<% ... %>` statement body. Returns the Jinja2 tag, or
    /// None when the construct is unsupported (caller passes the original
    /// through).
    fn convert_statement(&mut self, body: &str, ltrim: bool, rtrim: bool) -> Option<String> {
        let inner = body.trim();

        let tag = |open: &str, content: &str, close: &str, ltrim: bool, rtrim: bool| {
            format!(
                "{}{}{}{}{}",
                open,
                if ltrim { "- " } else { " " },
                content,
                if rtrim { " -" } else { " " },
                close
            )
        };

        if let Some(cond) = inner.strip_prefix("if ") {
            self.stack.push(OpenConstruct::If);
            let cond = self.translate_expr(cond);
            return Some(tag("{%", &format!("if {}", cond), "%}", ltrim, rtrim));
        }
        if let Some(cond) = inner.strip_prefix("elsif ") {
            let cond = self.translate_expr(cond);
            return Some(tag("{%", &format!("elif {}", cond), "%}", ltrim, rtrim));
        }
        if inner == "else" {
            return Some(tag("{%", "else", "%}", ltrim, rtrim));
        }
        if let Some(cond) = inner.strip_prefix("unless ") {
            self.stack.push(OpenConstruct::If);
            let cond = self.translate_expr(cond);
            return Some(tag("{%", &format!("if not ({})", cond), "%}", ltrim, rtrim));
        }
        if let Some(caps) = each_loop_re().captures(inner) {
            let iterable = caps[1].to_string();
            let binders = caps[2].to_string();
            self.stack.push(OpenConstruct::For);
            let iterable = self.translate_expr(&iterable);
            let names: Vec<String> = binders
                .split(',')
                .map(|b| b.trim().to_string())
                .filter(|b| !b.is_empty())
                .collect();
            for name in &names {
                self.record_var(name);
            }
            return Some(tag(
                "{%",
                &format!("for {} in {}", names.join(", "), iterable),
                "%}",
                ltrim,
                rtrim,
            ));
        }
        if inner == "end" {
            return match self.stack.pop() {
                Some(OpenConstruct::If) => Some(tag("{%", "endif", "%}", ltrim, rtrim)),
                Some(OpenConstruct::For) => Some(tag("{%", "endfor", "%}", ltrim, rtrim)),
                None => {
                    self.warnings.push(Diagnostic::UnmappedConstruct {
                        construct: "end".to_string(),
                        detail: "'end' with no open construct; tag left unchanged".to_string(),
                    });
                    None
                }
            };
        }

        self.warnings.push(Diagnostic::UnmappedConstruct {
            construct: first_word(inner).to_string(),
            detail: format!("unsupported template statement left unchanged: {}", inner),
        });
        None
    }
}

/// Translate `&&`, `||`, and `!` outside quoted strings.
fn translate_operators(expr: &str) -> String {
    let mut out = String::with_capacity(expr.len());
    let chars: Vec<char> = expr.chars().collect();
    let mut quote: Option<char> = None;
    let mut i = 0;
    while i < chars.len() {
        let ch = chars[i];
        if let Some(q) = quote {
            out.push(ch);
            if ch == '\\' && i + 1 < chars.len() {
                out.push(chars[i + 1]);
                i += 2;
                continue;
            }
            if ch == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        match ch {
            '\'' | '"' => {
                quote = Some(ch);
                out.push(ch);
                i += 1;
            }
            '&' if chars.get(i + 1) == Some(&'&') => {
                out.push_str(" and ");
                i += 2;
            }
            '|' if chars.get(i + 1) == Some(&'|') => {
                out.push_str(" or ");
                i += 2;
            }
            '!' if chars.get(i + 1) != Some(&'=') => {
                out.push_str("not ");
                i += 1;
            }
            _ => {
                out.push(ch);
                i += 1;
            }
        }
    }
    // Operator replacement may introduce doubled spaces around words.
    collapse_spaces(&out)
}

fn collapse_spaces(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_space = false;
    for ch in text.chars() {
        if ch == ' ' {
            if !last_space {
                out.push(ch);
            }
            last_space = true;
        } else {
            out.push(ch);
            last_space = false;
        }
    }
    out
}

fn first_word(text: &str) -> &str {
    text.split_whitespace().next().unwrap_or(text)
}

/// Find the closing `%>` of a tag starting after `from`, skipping quoted
/// strings. Returns the byte offset of `%` in `%>`.
fn find_tag_close(chars: &[char], from: usize) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut i = from;
    while i < chars.len() {
        let ch = chars[i];
        if let Some(q) = quote {
            if ch == '\\' {
                i += 2;
                continue;
            }
            if ch == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        match ch {
            '\'' | '"' => quote = Some(ch),
            '%' if chars.get(i + 1) == Some(&'>') => return Some(i),
            _ => {}
        }
        i += 1;
    }
    None
}

/// Convert one ERB template to Jinja2.
///
/// Literal text is copied verbatim; only `<% ... %>` markup is rewritten.
/// Never fails: malformed or unsupported markup passes through with a
/// warning.
pub fn convert_template(source: &str) -> TemplateConversionResult {
    let chars: Vec<char> = source.chars().collect();
    let mut converter = Converter::new();
    let mut i = 0;

    while i < chars.len() {
        if chars[i] == '<' && chars.get(i + 1) == Some(&'%') {
            let tag_start = i;
            let mut j = i + 2;

            let comment = chars.get(j) == Some(&'#');
            let expression = chars.get(j) == Some(&'=');
            if comment || expression {
                j += 1;
            }
            let ltrim = chars.get(j) == Some(&'-');
            if ltrim {
                j += 1;
            }

            let Some(close) = find_tag_close(&chars, j) else {
                converter.warnings.push(Diagnostic::UnmappedConstruct {
                    construct: "tag".to_string(),
                    detail: "unterminated '<%' tag; remainder copied verbatim".to_string(),
                });
                converter.out.extend(&chars[tag_start..]);
                break;
            };

            let mut body_end = close;
            let rtrim = body_end > j && chars[body_end - 1] == '-';
            if rtrim {
                body_end -= 1;
            }
            let body: String = chars[j..body_end].iter().collect();

            if comment {
                converter
                    .out
                    .push_str(&format!("{{# {} #}}", body.trim()));
            } else if expression {
                let expr = converter.translate_expr(&body);
                converter.out.push_str(&format!("{{{{ {} }}}}", expr));
            } else {
                match converter.convert_statement(&body, ltrim, rtrim) {
                    Some(tag) => converter.out.push_str(&tag),
                    None => converter.out.extend(&chars[tag_start..close + 2]),
                }
            }
            i = close + 2;
        } else {
            converter.out.push(chars[i]);
            i += 1;
        }
    }

    for open in &converter.stack {
        let kind = match open {
            OpenConstruct::If => "if",
            OpenConstruct::For => "for",
        };
        converter.warnings.push(Diagnostic::UnmappedConstruct {
            construct: kind.to_string(),
            detail: format!("'{}' construct never closed before end of template", kind),
        });
    }

    TemplateConversionResult {
        variables: converter.variables,
        converted_text: converter.out,
        source_text: source.to_string(),
        warnings: converter.warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_md005_literal_text_roundtrips() {
        let src = "server {\n  listen 80;\n  # plain comment\n}\n";
        let result = convert_template(src);
        assert_eq!(result.converted_text, src);
        assert!(result.variables.is_empty());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_md005_expression_node_ref() {
        let result = convert_template("listen <%= node['nginx']['port'] %>;\n");
        assert_eq!(result.converted_text, "listen {{ nginx.port }};\n");
        assert_eq!(result.variables, vec!["nginx.port"]);
    }

    #[test]
    fn test_md005_expression_ivar() {
        let result = convert_template("host <%= @hostname %>\n");
        assert_eq!(result.converted_text, "host {{ hostname }}\n");
        assert_eq!(result.variables, vec!["hostname"]);
    }

    #[test]
    fn test_md005_expression_bare_identifier() {
        let result = convert_template("<%= port %>");
        assert_eq!(result.converted_text, "{{ port }}");
        assert_eq!(result.variables, vec!["port"]);
    }

    #[test]
    fn test_md005_if_else_end() {
        let src = "<% if node['ssl'] %>on<% else %>off<% end %>";
        let result = convert_template(src);
        assert_eq!(
            result.converted_text,
            "{% if ssl %}on{% else %}off{% endif %}"
        );
    }

    #[test]
    fn test_md005_elsif_becomes_elif() {
        let src = "<% if a %>1<% elsif b %>2<% end %>";
        let result = convert_template(src);
        assert_eq!(
            result.converted_text,
            "{% if a %}1{% elif b %}2{% endif %}"
        );
    }

    #[test]
    fn test_md005_unless_becomes_if_not() {
        let result = convert_template("<% unless node['debug'] %>quiet<% end %>");
        assert_eq!(
            result.converted_text,
            "{% if not (debug) %}quiet{% endif %}"
        );
    }

    #[test]
    fn test_md005_each_loop() {
        let src = "<% items.each do |i| %>- <%= i %>\n<% end %>";
        let result = convert_template(src);
        assert_eq!(
            result.converted_text,
            "{% for i in items %}- {{ i }}\n{% endfor %}"
        );
        assert!(result.variables.contains(&"items".to_string()));
        assert!(result.variables.contains(&"i".to_string()));
    }

    #[test]
    fn test_md005_each_loop_two_binders() {
        let src = "<% node['env'].each do |k, v| %><%= k %>=<%= v %>\n<% end %>";
        let result = convert_template(src);
        assert!(result
            .converted_text
            .starts_with("{% for k, v in env %}"));
        assert!(result.converted_text.ends_with("{% endfor %}"));
    }

    #[test]
    fn test_md005_nested_if_in_for_closes_in_order() {
        let src = "<% servers.each do |s| %><% if s %>x<% end %><% end %>";
        let result = convert_template(src);
        assert_eq!(
            result.converted_text,
            "{% for s in servers %}{% if s %}x{% endif %}{% endfor %}"
        );
    }

    #[test]
    fn test_md005_boolean_operators_translated() {
        let result = convert_template("<% if node['a'] && !node['b'] %>x<% end %>");
        assert_eq!(
            result.converted_text,
            "{% if a and not b %}x{% endif %}"
        );
    }

    #[test]
    fn test_md005_operators_inside_strings_untouched() {
        let result = convert_template("<%= 'a && b' %>");
        assert_eq!(result.converted_text, "{{ 'a && b' }}");
    }

    #[test]
    fn test_md005_comment_tag() {
        let result = convert_template("<%# generated file %>\n");
        assert_eq!(result.converted_text, "{# generated file #}\n");
    }

    #[test]
    fn test_md005_trim_markers_carry_over() {
        let result = convert_template("<%- if a -%>\nx\n<%- end -%>\n");
        assert_eq!(
            result.converted_text,
            "{%- if a -%}\nx\n{%- endif -%}\n"
        );
    }

    #[test]
    fn test_md005_unsupported_statement_passes_through() {
        let src = "<% case node['platform'] %>";
        let result = convert_template(src);
        assert_eq!(result.converted_text, src);
        assert!(result
            .warnings
            .iter()
            .any(|w| matches!(w, Diagnostic::UnmappedConstruct { construct, .. } if construct == "case")));
    }

    #[test]
    fn test_md005_unmatched_end_passes_through() {
        let src = "<% end %>";
        let result = convert_template(src);
        assert_eq!(result.converted_text, src);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_md005_unclosed_construct_flagged() {
        let result = convert_template("<% if a %>never closed");
        assert!(result
            .warnings
            .iter()
            .any(|w| matches!(w, Diagnostic::UnmappedConstruct { construct, .. } if construct == "if")));
    }

    #[test]
    fn test_md005_unterminated_tag_copied_verbatim() {
        let src = "before <%= node['x'] ";
        let result = convert_template(src);
        assert!(result.converted_text.starts_with("before <%= node['x']"));
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_md005_variables_first_occurrence_order() {
        let src = "<%= node['b'] %><%= node['a'] %><%= node['b'] %>";
        let result = convert_template(src);
        assert_eq!(result.variables, vec!["b", "a"]);
    }

    #[test]
    fn test_md005_source_text_retained() {
        let src = "<%= node['x'] %>";
        let result = convert_template(src);
        assert_eq!(result.source_text, src);
    }

    #[test]
    fn test_md005_conversion_is_deterministic() {
        let src = "<% if a %><%= node['x']['y'] %><% end %>";
        assert_eq!(convert_template(src), convert_template(src));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Marker-free text converts to itself byte-for-byte.
            #[test]
            fn test_md005_markerless_roundtrip(src in "[a-zA-Z0-9 \n:;{}/.#_-]{0,200}") {
                prop_assume!(!src.contains("<%"));
                let result = convert_template(&src);
                prop_assert_eq!(result.converted_text, src);
            }
        }
    }
}
