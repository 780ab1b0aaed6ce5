//! MD-006: Package resource mapping.

use super::{prop_str, title};
use crate::core::types::{AttrValue, ResourceDeclaration, TaskDefinition};

/// install/upgrade/remove map onto package states present/latest/absent.
pub fn task(decl: &ResourceDeclaration, action: &str) -> Option<TaskDefinition> {
    let state = match action {
        "install" => "present",
        "upgrade" => "latest",
        "remove" | "purge" => "absent",
        _ => return None,
    };
    let package = prop_str(decl, "package_name").unwrap_or_else(|| decl.name.clone());
    Some(
        TaskDefinition::new(
            "ansible.builtin.package",
            &format!("{} {}", title(action), package),
        )
        .param("name", AttrValue::Str(package.clone()))
        .param("state", AttrValue::Str(state.to_string())),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn decl(action: &str) -> ResourceDeclaration {
        ResourceDeclaration {
            type_name: "package".to_string(),
            name: "nginx".to_string(),
            actions: vec![action.to_string()],
            properties: IndexMap::new(),
            guards: vec![],
            notifications: vec![],
            line: 1,
        }
    }

    #[test]
    fn test_md006_install_is_present() {
        let t = task(&decl("install"), "install").unwrap();
        assert_eq!(t.module, "ansible.builtin.package");
        assert_eq!(t.name, "Install nginx");
        assert_eq!(t.parameters["state"], AttrValue::Str("present".to_string()));
        assert_eq!(t.parameters["name"], AttrValue::Str("nginx".to_string()));
    }

    #[test]
    fn test_md006_upgrade_is_latest() {
        let t = task(&decl("upgrade"), "upgrade").unwrap();
        assert_eq!(t.parameters["state"], AttrValue::Str("latest".to_string()));
    }

    #[test]
    fn test_md006_remove_is_absent() {
        let t = task(&decl("remove"), "remove").unwrap();
        assert_eq!(t.parameters["state"], AttrValue::Str("absent".to_string()));
    }

    #[test]
    fn test_md006_package_name_property_overrides() {
        let mut d = decl("install");
        d.properties
            .insert("package_name".to_string(), "'nginx-full'".to_string());
        let t = task(&d, "install").unwrap();
        assert_eq!(
            t.parameters["name"],
            AttrValue::Str("nginx-full".to_string())
        );
    }

    #[test]
    fn test_md006_unknown_action_unmapped() {
        assert!(task(&decl("frobnicate"), "frobnicate").is_none());
    }
}
