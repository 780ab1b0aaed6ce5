//! MD-006: Command execution mappings (`execute`, `bash`, `script`).

use super::prop_str;
use crate::core::types::{AttrValue, ResourceDeclaration, TaskDefinition};

/// `execute` becomes a command task, `bash`/`script` a shell task. Neither
/// carries an idempotence signal, so `changed_when: "false"` is injected
/// unless the source declared `creates`.
pub fn task(decl: &ResourceDeclaration, action: &str) -> Option<TaskDefinition> {
    if action != "run" {
        return None;
    }

    let shell = decl.type_name != "execute";
    let module = if shell {
        "ansible.builtin.shell"
    } else {
        "ansible.builtin.command"
    };
    let command = if shell {
        prop_str(decl, "code").unwrap_or_else(|| decl.name.clone())
    } else {
        prop_str(decl, "command").unwrap_or_else(|| decl.name.clone())
    };

    let mut t = TaskDefinition::new(module, &format!("Run {}", decl.name))
        .param("cmd", AttrValue::Str(command));
    if let Some(cwd) = prop_str(decl, "cwd") {
        t = t.param("chdir", AttrValue::Str(cwd));
    }
    match prop_str(decl, "creates") {
        Some(creates) => {
            t = t.param("creates", AttrValue::Str(creates));
        }
        None => {
            t.changed_when = Some("false".to_string());
        }
    }
    Some(t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn decl(type_name: &str, name: &str) -> ResourceDeclaration {
        ResourceDeclaration {
            type_name: type_name.to_string(),
            name: name.to_string(),
            actions: vec!["run".to_string()],
            properties: IndexMap::new(),
            guards: vec![],
            notifications: vec![],
            line: 1,
        }
    }

    #[test]
    fn test_md006_execute_injects_changed_when_false() {
        let t = task(&decl("execute", "echo hi"), "run").unwrap();
        assert_eq!(t.module, "ansible.builtin.command");
        assert_eq!(t.changed_when.as_deref(), Some("false"));
        assert_eq!(t.parameters["cmd"], AttrValue::Str("echo hi".to_string()));
    }

    #[test]
    fn test_md006_execute_command_property_overrides_name() {
        let mut d = decl("execute", "bootstrap");
        d.properties
            .insert("command".to_string(), "'/opt/bootstrap.sh --now'".to_string());
        let t = task(&d, "run").unwrap();
        assert_eq!(
            t.parameters["cmd"],
            AttrValue::Str("/opt/bootstrap.sh --now".to_string())
        );
    }

    #[test]
    fn test_md006_creates_supplies_idempotence_signal() {
        let mut d = decl("execute", "make install");
        d.properties
            .insert("creates".to_string(), "'/usr/local/bin/tool'".to_string());
        let t = task(&d, "run").unwrap();
        assert!(t.changed_when.is_none());
        assert_eq!(
            t.parameters["creates"],
            AttrValue::Str("/usr/local/bin/tool".to_string())
        );
    }

    #[test]
    fn test_md006_cwd_maps_to_chdir() {
        let mut d = decl("execute", "make");
        d.properties.insert("cwd".to_string(), "'/opt/src'".to_string());
        let t = task(&d, "run").unwrap();
        assert_eq!(
            t.parameters["chdir"],
            AttrValue::Str("/opt/src".to_string())
        );
    }

    #[test]
    fn test_md006_bash_uses_shell_and_code() {
        let mut d = decl("bash", "tune kernel");
        d.properties
            .insert("code".to_string(), "'sysctl -w vm.swappiness=1'".to_string());
        let t = task(&d, "run").unwrap();
        assert_eq!(t.module, "ansible.builtin.shell");
        assert_eq!(
            t.parameters["cmd"],
            AttrValue::Str("sysctl -w vm.swappiness=1".to_string())
        );
    }

    #[test]
    fn test_md006_non_run_action_unmapped() {
        assert!(task(&decl("execute", "x"), "create").is_none());
    }
}
