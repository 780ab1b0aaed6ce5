//! MD-006: Service resource mapping.

use super::title;
use crate::core::types::{AttrValue, ResourceDeclaration, TaskDefinition};

/// start/stop set both `enabled` and `state`; enable/disable touch only the
/// boot flag; restart/reload only the running state.
pub fn task(decl: &ResourceDeclaration, action: &str) -> Option<TaskDefinition> {
    let (enabled, state) = match action {
        "start" => (Some(true), Some("started")),
        "stop" => (Some(false), Some("stopped")),
        "restart" => (None, Some("restarted")),
        "reload" => (None, Some("reloaded")),
        "enable" => (Some(true), None),
        "disable" => (Some(false), None),
        _ => return None,
    };

    let mut t = TaskDefinition::new(
        "ansible.builtin.service",
        &format!("{} {}", title(action), decl.name),
    )
    .param("name", AttrValue::Str(decl.name.clone()));
    if let Some(enabled) = enabled {
        t = t.param("enabled", AttrValue::Bool(enabled));
    }
    if let Some(state) = state {
        t = t.param("state", AttrValue::Str(state.to_string()));
    }
    Some(t)
}
