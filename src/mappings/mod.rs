//! Resource family mappings — build one Ansible task per (type, action).
//!
//! Each module covers one resource family and returns `None` for actions
//! outside its semantic table, letting the mapper fall back to a flagged
//! generic task.

pub mod execute;
pub mod file;
pub mod identity;
pub mod package;
pub mod service;

use crate::core::attributes::parse_value;
use crate::core::types::{AttrValue, ResourceDeclaration};

/// Parse a property's raw literal text into a value, falling back to the raw
/// text as a string.
pub(crate) fn prop_value(decl: &ResourceDeclaration, key: &str) -> Option<AttrValue> {
    let raw = decl.properties.get(key)?;
    Some(parse_value(raw).unwrap_or_else(|| AttrValue::Str(raw.trim().to_string())))
}

/// Property as plain text. Quoted literals lose their quotes; anything else
/// (octal modes, expressions) keeps its raw spelling.
pub(crate) fn prop_str(decl: &ResourceDeclaration, key: &str) -> Option<String> {
    let raw = decl.properties.get(key)?;
    match parse_value(raw) {
        Some(AttrValue::Str(s)) => Some(s),
        _ => Some(raw.trim().to_string()),
    }
}

/// Copy `mode`/`owner`/`group` onto a task when present.
pub(crate) fn copy_permissions(
    mut task: crate::core::types::TaskDefinition,
    decl: &ResourceDeclaration,
) -> crate::core::types::TaskDefinition {
    for key in ["owner", "group", "mode"] {
        if let Some(value) = prop_str(decl, key) {
            task = task.param(key, AttrValue::Str(value));
        }
    }
    task
}

/// `install` → `Install`, for task labels.
pub(crate) fn title(action: &str) -> String {
    let mut chars = action.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
