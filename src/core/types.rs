//! MD-001: All types from the mudanza data model.
//!
//! Defines the structures flowing through the conversion pipeline: attribute
//! values and precedence tiers, extracted resource declarations, mapped task
//! definitions, assembled playbooks, and the error/diagnostic values every
//! stage reports instead of aborting.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Attribute values
// ============================================================================

/// A normalized Chef attribute value.
///
/// Chef attribute files assign booleans, numbers, strings, arrays, and hashes
/// without static typing; this union carries them losslessly. `Map` preserves
/// key insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Seq(Vec<AttrValue>),
    Map(IndexMap<String, AttrValue>),
}

impl AttrValue {
    /// Short type label for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::Seq(_) => "array",
            Self::Map(_) => "hash",
        }
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Self::Map(_))
    }

    /// Convert to a YAML value for playbook/vars serialization.
    pub fn to_yaml(&self) -> serde_yaml_ng::Value {
        match self {
            Self::Bool(b) => serde_yaml_ng::Value::Bool(*b),
            Self::Int(n) => serde_yaml_ng::Value::Number((*n).into()),
            Self::Float(x) => serde_yaml_ng::Value::Number(serde_yaml_ng::Number::from(*x)),
            Self::Str(s) => serde_yaml_ng::Value::String(s.clone()),
            Self::Seq(items) => {
                serde_yaml_ng::Value::Sequence(items.iter().map(Self::to_yaml).collect())
            }
            Self::Map(entries) => {
                let mut mapping = serde_yaml_ng::Mapping::new();
                for (key, value) in entries {
                    mapping.insert(
                        serde_yaml_ng::Value::String(key.clone()),
                        value.to_yaml(),
                    );
                }
                serde_yaml_ng::Value::Mapping(mapping)
            }
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(n) => write!(f, "{}", n),
            Self::Float(x) => write!(f, "{}", x),
            Self::Str(s) => write!(f, "{}", s),
            Self::Seq(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Self::Map(entries) => {
                let parts: Vec<String> =
                    entries.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
        }
    }
}

// ============================================================================
// Precedence tiers
// ============================================================================

/// Chef attribute precedence tiers, lowest to highest.
///
/// The derived `Ord` is the authoritative ranking: `automatic` outranks
/// everything and is system-derived (never produced from cookbook text).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Precedence {
    Default,
    ForceDefault,
    Normal,
    Override,
    ForceOverride,
    Automatic,
}

impl Precedence {
    /// Parse an attribute-file keyword (`default`, `force_override`, ...).
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "default" => Some(Self::Default),
            "force_default" => Some(Self::ForceDefault),
            "normal" | "set" => Some(Self::Normal),
            "override" => Some(Self::Override),
            "force_override" => Some(Self::ForceOverride),
            "automatic" => Some(Self::Automatic),
            _ => None,
        }
    }
}

impl fmt::Display for Precedence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::ForceDefault => write!(f, "force_default"),
            Self::Normal => write!(f, "normal"),
            Self::Override => write!(f, "override"),
            Self::ForceOverride => write!(f, "force_override"),
            Self::Automatic => write!(f, "automatic"),
        }
    }
}

// ============================================================================
// Attribute assignments and resolution
// ============================================================================

/// One raw attribute assignment as written in a cookbook file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeAssignment {
    pub precedence: Precedence,

    /// Path segments, e.g. `["nginx", "ssl", "protocols"]`. Never empty.
    pub path: Vec<String>,

    pub value: AttrValue,

    /// Source file label, supplied by the caller (the engine never reads
    /// files itself).
    pub file: String,

    /// 1-based source line of the assignment statement.
    pub line: usize,
}

impl AttributeAssignment {
    /// Dotted path key used for grouping during resolution.
    pub fn path_key(&self) -> String {
        self.path.join(".")
    }
}

/// The winning value for one attribute path after precedence resolution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedAttribute {
    pub path: Vec<String>,
    pub value: AttrValue,
    pub winning_precedence: Precedence,

    /// Every assignment that touched this path, in input order.
    pub contributors: Vec<AttributeAssignment>,
}

impl ResolvedAttribute {
    pub fn path_key(&self) -> String {
        self.path.join(".")
    }
}

// ============================================================================
// Resource declarations
// ============================================================================

/// Guard kind: `only_if` runs the action when true, `not_if` skips it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardKind {
    OnlyIf,
    NotIf,
}

/// A guard expression gating a resource action. Multiple guards on one
/// resource are ANDed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Guard {
    pub kind: GuardKind,
    pub expression: String,
}

/// When a notification fires relative to the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyTiming {
    Delayed,
    Immediate,
}

/// A notification edge: `notifies :restart, 'service[nginx]', :immediately`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub target_type: String,
    pub target_name: String,
    pub action: String,
    pub timing: NotifyTiming,
}

impl Notification {
    /// Handler name derived from the target, e.g. `restart nginx`.
    pub fn handler_name(&self) -> String {
        format!("{} {}", self.action, self.target_name)
    }

    /// Dedup key: two edges to the same (type, name, action) share a handler.
    pub fn handler_key(&self) -> (String, String, String) {
        (
            self.target_type.clone(),
            self.target_name.clone(),
            self.action.clone(),
        )
    }
}

/// One parsed Chef resource block, immutable after extraction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceDeclaration {
    /// Resource type identifier (`package`, `service`, or a custom name).
    pub type_name: String,

    /// Resource name — often a path or logical identifier.
    pub name: String,

    /// Ordered action symbols. Never empty; the extractor fills in the
    /// per-type default when the source names none.
    pub actions: Vec<String>,

    /// Property name → raw literal text, in source order.
    pub properties: IndexMap<String, String>,

    pub guards: Vec<Guard>,
    pub notifications: Vec<Notification>,

    /// 1-based line of the declaration header.
    pub line: usize,
}

impl ResourceDeclaration {
    /// The `type[name]` reference form used by notification targets.
    pub fn reference(&self) -> String {
        format!("{}[{}]", self.type_name, self.name)
    }
}

// ============================================================================
// Template conversion
// ============================================================================

/// Output of converting one ERB template to Jinja2.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateConversionResult {
    /// Referenced variable/attribute-path names, first-occurrence order.
    pub variables: Vec<String>,

    pub converted_text: String,

    /// Verbatim input, retained for diagnostics.
    pub source_text: String,

    /// Unsupported constructs passed through unchanged.
    pub warnings: Vec<Diagnostic>,
}

// ============================================================================
// Task definitions and playbooks
// ============================================================================

/// A task's `when` clause — a list means multiple ANDed conditions.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum WhenClause {
    One(String),
    Many(Vec<String>),
}

impl WhenClause {
    /// Build from extracted guard strings: none → None, one → scalar,
    /// several → list.
    pub fn from_conditions(mut conditions: Vec<String>) -> Option<Self> {
        match conditions.len() {
            0 => None,
            1 => Some(Self::One(conditions.remove(0))),
            _ => Some(Self::Many(conditions)),
        }
    }

    fn to_yaml(&self) -> serde_yaml_ng::Value {
        match self {
            Self::One(cond) => serde_yaml_ng::Value::String(cond.clone()),
            Self::Many(conds) => serde_yaml_ng::Value::Sequence(
                conds
                    .iter()
                    .map(|c| serde_yaml_ng::Value::String(c.clone()))
                    .collect(),
            ),
        }
    }
}

/// One Ansible task, produced by the mapper from a (resource, action) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDefinition {
    /// Ansible module identifier, e.g. `ansible.builtin.package`.
    pub module: String,

    /// Human-readable task label. Always the first emitted key.
    pub name: String,

    /// Module parameters, in emission order.
    pub parameters: IndexMap<String, AttrValue>,

    pub when: Option<WhenClause>,

    /// Override for idempotence reporting (`execute` has no signal).
    pub changed_when: Option<String>,

    /// Handler names this task notifies.
    pub notify: Vec<String>,
}

impl TaskDefinition {
    pub fn new(module: &str, name: &str) -> Self {
        Self {
            module: module.to_string(),
            name: name.to_string(),
            parameters: IndexMap::new(),
            when: None,
            changed_when: None,
            notify: Vec::new(),
        }
    }

    /// Add a module parameter, preserving insertion order.
    pub fn param(mut self, key: &str, value: AttrValue) -> Self {
        self.parameters.insert(key.to_string(), value);
        self
    }

    /// Serialize to the Ansible task mapping. `name` is always first.
    pub fn to_yaml(&self) -> serde_yaml_ng::Value {
        let mut task = serde_yaml_ng::Mapping::new();
        task.insert(
            serde_yaml_ng::Value::String("name".to_string()),
            serde_yaml_ng::Value::String(self.name.clone()),
        );

        let mut params = serde_yaml_ng::Mapping::new();
        for (key, value) in &self.parameters {
            params.insert(serde_yaml_ng::Value::String(key.clone()), value.to_yaml());
        }
        task.insert(
            serde_yaml_ng::Value::String(self.module.clone()),
            serde_yaml_ng::Value::Mapping(params),
        );

        if let Some(ref when) = self.when {
            task.insert(
                serde_yaml_ng::Value::String("when".to_string()),
                when.to_yaml(),
            );
        }
        if let Some(ref changed_when) = self.changed_when {
            task.insert(
                serde_yaml_ng::Value::String("changed_when".to_string()),
                serde_yaml_ng::Value::String(changed_when.clone()),
            );
        }
        if !self.notify.is_empty() {
            task.insert(
                serde_yaml_ng::Value::String("notify".to_string()),
                serde_yaml_ng::Value::Sequence(
                    self.notify
                        .iter()
                        .map(|n| serde_yaml_ng::Value::String(n.clone()))
                        .collect(),
                ),
            );
        }

        serde_yaml_ng::Value::Mapping(task)
    }
}

/// An assembled playbook: one play with ordered tasks and deduplicated
/// handlers.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybookDocument {
    pub name: String,
    pub hosts: String,
    pub r#become: bool,
    pub tasks: Vec<TaskDefinition>,
    pub handlers: Vec<TaskDefinition>,
}

impl PlaybookDocument {
    pub fn to_yaml(&self) -> serde_yaml_ng::Value {
        let mut play = serde_yaml_ng::Mapping::new();
        play.insert(
            serde_yaml_ng::Value::String("name".to_string()),
            serde_yaml_ng::Value::String(self.name.clone()),
        );
        play.insert(
            serde_yaml_ng::Value::String("hosts".to_string()),
            serde_yaml_ng::Value::String(self.hosts.clone()),
        );
        play.insert(
            serde_yaml_ng::Value::String("become".to_string()),
            serde_yaml_ng::Value::Bool(self.r#become),
        );
        play.insert(
            serde_yaml_ng::Value::String("tasks".to_string()),
            serde_yaml_ng::Value::Sequence(self.tasks.iter().map(TaskDefinition::to_yaml).collect()),
        );
        if !self.handlers.is_empty() {
            play.insert(
                serde_yaml_ng::Value::String("handlers".to_string()),
                serde_yaml_ng::Value::Sequence(
                    self.handlers.iter().map(TaskDefinition::to_yaml).collect(),
                ),
            );
        }
        serde_yaml_ng::Value::Sequence(vec![serde_yaml_ng::Value::Mapping(play)])
    }

    /// Serialize to Ansible playbook YAML text.
    pub fn to_yaml_string(&self) -> Result<String, String> {
        serde_yaml_ng::to_string(&self.to_yaml())
            .map(|body| format!("---\n{}", body))
            .map_err(|e| format!("playbook serialize error: {}", e))
    }

    /// Serialize to JSON for scripting consumers.
    pub fn to_json_string(&self) -> Result<String, String> {
        serde_json::to_string_pretty(&self.to_yaml())
            .map_err(|e| format!("playbook serialize error: {}", e))
    }
}

// ============================================================================
// Errors and diagnostics
// ============================================================================

/// Malformed block/quote nesting. Recoverable per file: callers skip the
/// offending unit and continue with siblings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuralError {
    pub message: String,

    /// 1-based line where the malformed span starts.
    pub line: usize,
}

impl StructuralError {
    pub fn new(message: impl Into<String>, line: usize) -> Self {
        Self {
            message: message.into(),
            line,
        }
    }
}

impl fmt::Display for StructuralError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

/// Non-fatal signals produced during conversion. These are data, not
/// exceptions: zero resources in a file or an unknown construct never abort
/// the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// File parsed cleanly but contained no extractable units.
    EmptyResult { detail: String },

    /// Resource type or template construct with no semantic rule; converted
    /// best-effort and flagged.
    UnmappedConstruct { construct: String, detail: String },

    /// Two or more precedence tiers touched the same attribute path.
    PrecedenceConflict { path: String, tiers: Vec<String> },

    /// A notify target matched no declared resource; a stub handler was
    /// emitted anyway.
    UnresolvedNotification { target: String, detail: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyResult { detail } => write!(f, "empty result: {}", detail),
            Self::UnmappedConstruct { construct, detail } => {
                write!(f, "unmapped construct '{}': {}", construct, detail)
            }
            Self::PrecedenceConflict { path, tiers } => {
                write!(f, "precedence conflict at '{}': {}", path, tiers.join(" vs "))
            }
            Self::UnresolvedNotification { target, detail } => {
                write!(f, "unresolved notification target '{}': {}", target, detail)
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
