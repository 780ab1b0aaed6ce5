//! MD-006: Resource-to-task mapping — dispatch to family handlers.
//!
//! A fixed semantic table maps each (resource type, action) pair onto an
//! Ansible module with its parameter-construction rule. Unrecognized pairs
//! fall back to a best-effort generic task and are flagged, never dropped.
//! Guards become `when` clauses, notification edges become `notify` entries.

use super::attributes::parse_value;
use super::types::{
    AttrValue, Diagnostic, GuardKind, ResourceDeclaration, TaskDefinition, WhenClause,
};
use crate::mappings;

/// All tasks produced from one declaration, one per action in source order.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedResource {
    pub tasks: Vec<TaskDefinition>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Convert one declaration. Multi-action resources expand to one task per
/// action; `:nothing` actions produce no task (the resource only runs when
/// notified, which handler synthesis covers).
pub fn convert_resource(decl: &ResourceDeclaration) -> MappedResource {
    let mut mapped = MappedResource {
        tasks: Vec::new(),
        diagnostics: Vec::new(),
    };
    for action in &decl.actions {
        if action == "nothing" {
            continue;
        }
        let (task, mut diagnostics) = convert_action(decl, action);
        mapped.tasks.push(task);
        mapped.diagnostics.append(&mut diagnostics);
    }
    mapped
}

/// Convert a single (declaration, action) pair. Deterministic: identical
/// inputs yield identical tasks.
pub fn convert_action(
    decl: &ResourceDeclaration,
    action: &str,
) -> (TaskDefinition, Vec<Diagnostic>) {
    let mut diagnostics = Vec::new();

    let mut task = match dispatch(decl, action) {
        Some(task) => task,
        None => {
            diagnostics.push(Diagnostic::UnmappedConstruct {
                construct: format!("{} ({})", decl.type_name, action),
                detail: format!(
                    "line {}: no semantic rule; emitted a best-effort generic task",
                    decl.line
                ),
            });
            generic_task(decl, action)
        }
    };

    task.when = WhenClause::from_conditions(guard_conditions(decl));
    task.notify = decl
        .notifications
        .iter()
        .map(|edge| edge.handler_name())
        .collect();

    (task, diagnostics)
}

fn dispatch(decl: &ResourceDeclaration, action: &str) -> Option<TaskDefinition> {
    match decl.type_name.as_str() {
        "package" => mappings::package::task(decl, action),
        "service" => mappings::service::task(decl, action),
        "template" | "file" | "directory" | "cookbook_file" | "remote_file" | "link" => {
            mappings::file::task(decl, action)
        }
        "execute" | "bash" | "script" => mappings::execute::task(decl, action),
        "user" | "group" => mappings::identity::task(decl, action),
        _ => None,
    }
}

/// Best-effort task for unrecognized types: the type passes through as the
/// module name and every property is carried as a parameter.
fn generic_task(decl: &ResourceDeclaration, action: &str) -> TaskDefinition {
    let mut task = TaskDefinition::new(
        &decl.type_name,
        &format!("{} {} ({})", mappings::title(action), decl.name, decl.type_name),
    )
    .param("name", AttrValue::Str(decl.name.clone()));
    for (key, raw) in &decl.properties {
        let value = parse_value(raw).unwrap_or_else(|| AttrValue::Str(raw.trim().to_string()));
        task = task.param(key, value);
    }
    task
}

/// Guard strings in declaration order; `not_if` negates.
fn guard_conditions(decl: &ResourceDeclaration) -> Vec<String> {
    decl.guards
        .iter()
        .map(|guard| match guard.kind {
            GuardKind::OnlyIf => guard.expression.clone(),
            GuardKind::NotIf => format!("not ({})", guard.expression),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Guard, Notification, NotifyTiming};
    use indexmap::IndexMap;

    fn decl(type_name: &str, name: &str, action: &str) -> ResourceDeclaration {
        ResourceDeclaration {
            type_name: type_name.to_string(),
            name: name.to_string(),
            actions: vec![action.to_string()],
            properties: IndexMap::new(),
            guards: vec![],
            notifications: vec![],
            line: 1,
        }
    }

    #[test]
    fn test_md006_semantic_table_concrete_cases() {
        let (package, _) = convert_action(&decl("package", "nginx", "install"), "install");
        assert_eq!(
            package.parameters["state"],
            AttrValue::Str("present".to_string())
        );

        let (service, _) = convert_action(&decl("service", "nginx", "start"), "start");
        assert_eq!(service.parameters["enabled"], AttrValue::Bool(true));
        assert_eq!(
            service.parameters["state"],
            AttrValue::Str("started".to_string())
        );

        let (directory, _) = convert_action(&decl("directory", "/var/www", "create"), "create");
        assert_eq!(
            directory.parameters["state"],
            AttrValue::Str("directory".to_string())
        );

        let (execute, _) = convert_action(&decl("execute", "echo hi", "run"), "run");
        assert_eq!(execute.changed_when.as_deref(), Some("false"));
    }

    #[test]
    fn test_md006_conversion_is_deterministic() {
        let d = decl("package", "nginx", "install");
        assert_eq!(convert_action(&d, "install"), convert_action(&d, "install"));
    }

    #[test]
    fn test_md006_multi_action_expands_in_order() {
        let mut d = decl("service", "nginx", "enable");
        d.actions.push("start".to_string());
        let mapped = convert_resource(&d);
        assert_eq!(mapped.tasks.len(), 2);
        assert_eq!(mapped.tasks[0].name, "Enable nginx");
        assert_eq!(mapped.tasks[1].name, "Start nginx");
    }

    #[test]
    fn test_md006_nothing_action_produces_no_task() {
        let mut d = decl("service", "nginx", "nothing");
        let mapped = convert_resource(&d);
        assert!(mapped.tasks.is_empty());
        assert!(mapped.diagnostics.is_empty());
        d.actions = vec!["nothing".to_string(), "enable".to_string()];
        assert_eq!(convert_resource(&d).tasks.len(), 1);
    }

    #[test]
    fn test_md006_unknown_type_gets_generic_task_and_warning() {
        let mut d = decl("acme_certificate", "example.com", "create");
        d.properties
            .insert("wildcard".to_string(), "true".to_string());
        let (task, diagnostics) = convert_action(&d, "create");
        assert_eq!(task.module, "acme_certificate");
        assert_eq!(task.parameters["wildcard"], AttrValue::Bool(true));
        assert!(matches!(
            diagnostics[0],
            Diagnostic::UnmappedConstruct { .. }
        ));
    }

    #[test]
    fn test_md006_single_guard_is_scalar_when() {
        let mut d = decl("package", "nginx", "install");
        d.guards.push(Guard {
            kind: GuardKind::OnlyIf,
            expression: "test -f /etc/ready".to_string(),
        });
        let (task, _) = convert_action(&d, "install");
        assert_eq!(
            task.when,
            Some(WhenClause::One("test -f /etc/ready".to_string()))
        );
    }

    #[test]
    fn test_md006_multiple_guards_become_list() {
        let mut d = decl("package", "nginx", "install");
        d.guards.push(Guard {
            kind: GuardKind::OnlyIf,
            expression: "a".to_string(),
        });
        d.guards.push(Guard {
            kind: GuardKind::NotIf,
            expression: "b".to_string(),
        });
        let (task, _) = convert_action(&d, "install");
        assert_eq!(
            task.when,
            Some(WhenClause::Many(vec![
                "a".to_string(),
                "not (b)".to_string()
            ]))
        );
    }

    #[test]
    fn test_md006_notifications_become_notify_entries() {
        let mut d = decl("template", "/etc/nginx.conf", "create");
        d.properties
            .insert("source".to_string(), "'nginx.conf.erb'".to_string());
        d.notifications.push(Notification {
            target_type: "service".to_string(),
            target_name: "nginx".to_string(),
            action: "restart".to_string(),
            timing: NotifyTiming::Delayed,
        });
        let (task, _) = convert_action(&d, "create");
        assert_eq!(task.notify, vec!["restart nginx"]);
    }

    #[test]
    fn test_md006_known_type_unknown_action_flagged() {
        let (task, diagnostics) = convert_action(&decl("package", "x", "frobnicate"), "frobnicate");
        assert_eq!(task.module, "package");
        assert_eq!(diagnostics.len(), 1);
    }
}
