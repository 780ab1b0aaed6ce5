//! MD-006: File-shaped resource mappings.
//!
//! Covers `template`, `file`, `directory`, `cookbook_file`, `remote_file`,
//! and `link` — everything whose name is a filesystem path.

use super::{copy_permissions, prop_str};
use crate::core::types::{AttrValue, ResourceDeclaration, TaskDefinition};

const CREATE_LIKE: &[&str] = &["create", "create_if_missing", "touch"];

pub fn task(decl: &ResourceDeclaration, action: &str) -> Option<TaskDefinition> {
    match decl.type_name.as_str() {
        "template" => template_task(decl, action),
        "directory" => directory_task(decl, action),
        "file" => file_task(decl, action),
        "cookbook_file" => cookbook_file_task(decl, action),
        "remote_file" => remote_file_task(decl, action),
        "link" => link_task(decl, action),
        _ => None,
    }
}

/// The rendered destination keeps the resource name, minus any trailing
/// template-engine extension; `src` is the original template filename.
fn template_task(decl: &ResourceDeclaration, action: &str) -> Option<TaskDefinition> {
    if action == "delete" {
        return Some(absent_task(decl));
    }
    if !CREATE_LIKE.contains(&action) {
        return None;
    }
    let dest = decl
        .name
        .strip_suffix(".erb")
        .unwrap_or(&decl.name)
        .to_string();
    let src = prop_str(decl, "source").unwrap_or_else(|| format!("{}.erb", basename(&dest)));
    let t = TaskDefinition::new(
        "ansible.builtin.template",
        &format!("Create {}", dest),
    )
    .param("src", AttrValue::Str(src))
    .param("dest", AttrValue::Str(dest));
    Some(copy_permissions(t, decl))
}

fn directory_task(decl: &ResourceDeclaration, action: &str) -> Option<TaskDefinition> {
    if action == "delete" {
        return Some(absent_task(decl));
    }
    if !CREATE_LIKE.contains(&action) {
        return None;
    }
    let mut t = TaskDefinition::new(
        "ansible.builtin.file",
        &format!("Create directory {}", decl.name),
    )
    .param("path", AttrValue::Str(decl.name.clone()))
    .param("state", AttrValue::Str("directory".to_string()));
    if let Some(AttrValue::Bool(true)) = super::prop_value(decl, "recursive") {
        t = t.param("recurse", AttrValue::Bool(true));
    }
    Some(copy_permissions(t, decl))
}

fn file_task(decl: &ResourceDeclaration, action: &str) -> Option<TaskDefinition> {
    if action == "delete" {
        return Some(absent_task(decl));
    }
    if !CREATE_LIKE.contains(&action) {
        return None;
    }
    // Inline content becomes a copy task; otherwise a plain state task.
    if let Some(content) = prop_str(decl, "content") {
        let t = TaskDefinition::new(
            "ansible.builtin.copy",
            &format!("Create file {}", decl.name),
        )
        .param("content", AttrValue::Str(content))
        .param("dest", AttrValue::Str(decl.name.clone()));
        return Some(copy_permissions(t, decl));
    }
    let t = TaskDefinition::new(
        "ansible.builtin.file",
        &format!("Create file {}", decl.name),
    )
    .param("path", AttrValue::Str(decl.name.clone()))
    .param("state", AttrValue::Str("touch".to_string()));
    Some(copy_permissions(t, decl))
}

fn cookbook_file_task(decl: &ResourceDeclaration, action: &str) -> Option<TaskDefinition> {
    if action == "delete" {
        return Some(absent_task(decl));
    }
    if !CREATE_LIKE.contains(&action) {
        return None;
    }
    let src = prop_str(decl, "source").unwrap_or_else(|| basename(&decl.name).to_string());
    let t = TaskDefinition::new(
        "ansible.builtin.copy",
        &format!("Copy {}", decl.name),
    )
    .param("src", AttrValue::Str(src))
    .param("dest", AttrValue::Str(decl.name.clone()));
    Some(copy_permissions(t, decl))
}

fn remote_file_task(decl: &ResourceDeclaration, action: &str) -> Option<TaskDefinition> {
    if !CREATE_LIKE.contains(&action) {
        return None;
    }
    let url = prop_str(decl, "source")?;
    let t = TaskDefinition::new(
        "ansible.builtin.get_url",
        &format!("Download {}", decl.name),
    )
    .param("url", AttrValue::Str(url))
    .param("dest", AttrValue::Str(decl.name.clone()));
    Some(copy_permissions(t, decl))
}

fn link_task(decl: &ResourceDeclaration, action: &str) -> Option<TaskDefinition> {
    if action == "delete" {
        return Some(absent_task(decl));
    }
    if !CREATE_LIKE.contains(&action) {
        return None;
    }
    let target = prop_str(decl, "to")?;
    Some(
        TaskDefinition::new("ansible.builtin.file", &format!("Link {}", decl.name))
            .param("src", AttrValue::Str(target))
            .param("dest", AttrValue::Str(decl.name.clone()))
            .param("state", AttrValue::Str("link".to_string())),
    )
}

fn absent_task(decl: &ResourceDeclaration) -> TaskDefinition {
    TaskDefinition::new(
        "ansible.builtin.file",
        &format!("Delete {}", decl.name),
    )
    .param("path", AttrValue::Str(decl.name.clone()))
    .param("state", AttrValue::Str("absent".to_string()))
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
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
    fn test_md006_template_src_and_dest() {
        let mut d = decl("template", "/etc/nginx/nginx.conf");
        d.properties
            .insert("source".to_string(), "'nginx.conf.erb'".to_string());
        d.properties.insert("mode".to_string(), "'0644'".to_string());
        let t = task(&d, "create").unwrap();
        assert_eq!(t.module, "ansible.builtin.template");
        assert_eq!(
            t.parameters["src"],
            AttrValue::Str("nginx.conf.erb".to_string())
        );
        assert_eq!(
            t.parameters["dest"],
            AttrValue::Str("/etc/nginx/nginx.conf".to_string())
        );
        assert_eq!(t.parameters["mode"], AttrValue::Str("0644".to_string()));
    }

    #[test]
    fn test_md006_template_extension_stripped_from_dest() {
        let d = decl("template", "nginx.conf.erb");
        let t = task(&d, "create").unwrap();
        assert_eq!(
            t.parameters["dest"],
            AttrValue::Str("nginx.conf".to_string())
        );
        assert_eq!(
            t.parameters["src"],
            AttrValue::Str("nginx.conf.erb".to_string())
        );
    }

    #[test]
    fn test_md006_directory_state() {
        let t = task(&decl("directory", "/var/www"), "create").unwrap();
        assert_eq!(t.module, "ansible.builtin.file");
        assert_eq!(
            t.parameters["state"],
            AttrValue::Str("directory".to_string())
        );
    }

    #[test]
    fn test_md006_directory_recursive() {
        let mut d = decl("directory", "/var/www/html");
        d.properties
            .insert("recursive".to_string(), "true".to_string());
        let t = task(&d, "create").unwrap();
        assert_eq!(t.parameters["recurse"], AttrValue::Bool(true));
    }

    #[test]
    fn test_md006_file_with_content_becomes_copy() {
        let mut d = decl("file", "/etc/motd");
        d.properties
            .insert("content".to_string(), "'welcome'".to_string());
        let t = task(&d, "create").unwrap();
        assert_eq!(t.module, "ansible.builtin.copy");
        assert_eq!(
            t.parameters["content"],
            AttrValue::Str("welcome".to_string())
        );
    }

    #[test]
    fn test_md006_file_without_content_is_state_task() {
        let t = task(&decl("file", "/etc/motd"), "create").unwrap();
        assert_eq!(t.module, "ansible.builtin.file");
        assert_eq!(t.parameters["state"], AttrValue::Str("touch".to_string()));
    }

    #[test]
    fn test_md006_file_delete_is_absent() {
        let t = task(&decl("file", "/etc/motd"), "delete").unwrap();
        assert_eq!(t.parameters["state"], AttrValue::Str("absent".to_string()));
    }

    #[test]
    fn test_md006_remote_file_preserves_properties() {
        let mut d = decl("remote_file", "/usr/local/bin/kubectl");
        d.properties.insert(
            "source".to_string(),
            "'https://example.com/kubectl'".to_string(),
        );
        d.properties.insert("mode".to_string(), "'0755'".to_string());
        d.properties.insert("owner".to_string(), "'root'".to_string());
        let t = task(&d, "create").unwrap();
        assert_eq!(t.module, "ansible.builtin.get_url");
        assert_eq!(
            t.parameters["url"],
            AttrValue::Str("https://example.com/kubectl".to_string())
        );
        assert_eq!(t.parameters["mode"], AttrValue::Str("0755".to_string()));
        assert_eq!(t.parameters["owner"], AttrValue::Str("root".to_string()));
    }

    #[test]
    fn test_md006_remote_file_without_source_unmapped() {
        assert!(task(&decl("remote_file", "/x"), "create").is_none());
    }

    #[test]
    fn test_md006_link() {
        let mut d = decl("link", "/usr/bin/python");
        d.properties
            .insert("to".to_string(), "'/usr/bin/python3'".to_string());
        let t = task(&d, "create").unwrap();
        assert_eq!(t.parameters["state"], AttrValue::Str("link".to_string()));
        assert_eq!(
            t.parameters["src"],
            AttrValue::Str("/usr/bin/python3".to_string())
        );
    }

    #[test]
    fn test_md006_cookbook_file_defaults_src_to_basename() {
        let t = task(&decl("cookbook_file", "/etc/ssl/dhparam.pem"), "create").unwrap();
        assert_eq!(t.module, "ansible.builtin.copy");
        assert_eq!(
            t.parameters["src"],
            AttrValue::Str("dhparam.pem".to_string())
        );
    }
}
