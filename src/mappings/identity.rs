//! MD-006: User and group resource mappings.

use super::{prop_str, prop_value};
use crate::core::types::{AttrValue, ResourceDeclaration, TaskDefinition};

pub fn task(decl: &ResourceDeclaration, action: &str) -> Option<TaskDefinition> {
    let state = match action {
        "create" | "manage" => "present",
        "remove" => "absent",
        _ => return None,
    };
    match decl.type_name.as_str() {
        "user" => Some(user_task(decl, action, state)),
        "group" => Some(group_task(decl, action, state)),
        _ => None,
    }
}

fn user_task(decl: &ResourceDeclaration, action: &str, state: &str) -> TaskDefinition {
    let mut t = TaskDefinition::new(
        "ansible.builtin.user",
        &format!("{} user {}", super::title(action), decl.name),
    )
    .param("name", AttrValue::Str(decl.name.clone()))
    .param("state", AttrValue::Str(state.to_string()));

    if let Some(uid) = prop_value(decl, "uid") {
        t = t.param("uid", uid);
    }
    if let Some(gid) = prop_str(decl, "gid") {
        t = t.param("group", AttrValue::Str(gid));
    }
    for key in ["home", "shell", "comment"] {
        if let Some(value) = prop_str(decl, key) {
            t = t.param(key, AttrValue::Str(value));
        }
    }
    if let Some(AttrValue::Bool(true)) = prop_value(decl, "system") {
        t = t.param("system", AttrValue::Bool(true));
    }
    t
}

fn group_task(decl: &ResourceDeclaration, action: &str, state: &str) -> TaskDefinition {
    let mut t = TaskDefinition::new(
        "ansible.builtin.group",
        &format!("{} group {}", super::title(action), decl.name),
    )
    .param("name", AttrValue::Str(decl.name.clone()))
    .param("state", AttrValue::Str(state.to_string()));

    if let Some(gid) = prop_value(decl, "gid") {
        t = t.param("gid", gid);
    }
    if let Some(AttrValue::Bool(true)) = prop_value(decl, "system") {
        t = t.param("system", AttrValue::Bool(true));
    }
    t
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn decl(type_name: &str, name: &str) -> ResourceDeclaration {
        ResourceDeclaration {
            type_name: type_name.to_string(),
            name: name.to_string(),
            actions: vec!["create".to_string()],
            properties: IndexMap::new(),
            guards: vec![],
            notifications: vec![],
            line: 1,
        }
    }

    #[test]
    fn test_md006_user_create_is_present() {
        let t = task(&decl("user", "deploy"), "create").unwrap();
        assert_eq!(t.module, "ansible.builtin.user");
        assert_eq!(t.name, "Create user deploy");
        assert_eq!(t.parameters["state"], AttrValue::Str("present".to_string()));
    }

    #[test]
    fn test_md006_user_remove_is_absent() {
        let t = task(&decl("user", "deploy"), "remove").unwrap();
        assert_eq!(t.parameters["state"], AttrValue::Str("absent".to_string()));
    }

    #[test]
    fn test_md006_user_properties_copied() {
        let mut d = decl("user", "deploy");
        d.properties.insert("uid".to_string(), "1500".to_string());
        d.properties
            .insert("shell".to_string(), "'/bin/bash'".to_string());
        d.properties.insert("system".to_string(), "true".to_string());
        let t = task(&d, "create").unwrap();
        assert_eq!(t.parameters["uid"], AttrValue::Int(1500));
        assert_eq!(
            t.parameters["shell"],
            AttrValue::Str("/bin/bash".to_string())
        );
        assert_eq!(t.parameters["system"], AttrValue::Bool(true));
    }

    #[test]
    fn test_md006_group_with_gid() {
        let mut d = decl("group", "admins");
        d.properties.insert("gid".to_string(), "300".to_string());
        let t = task(&d, "create").unwrap();
        assert_eq!(t.module, "ansible.builtin.group");
        assert_eq!(t.parameters["gid"], AttrValue::Int(300));
    }

    #[test]
    fn test_md006_lock_action_unmapped() {
        assert!(task(&decl("user", "deploy"), "lock").is_none());
    }
}
