//! MD-007: Playbook assembly — task ordering and handler synthesis.
//!
//! Tasks keep source declaration order, matching the source's execution
//! semantics. Notification edges across all tasks are collected into exactly
//! one handler per distinct (target resource, action), in first-reference
//! order. A notify target that resolves to no declared resource still gets a
//! best-effort handler synthesized from the `type[name]` reference itself,
//! plus a diagnostic — never a silent drop.

use super::mapper;
use super::types::{
    Diagnostic, Notification, PlaybookDocument, ResourceDeclaration, TaskDefinition,
};
use indexmap::IndexMap;

/// Assembled playbook plus everything flagged along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyResult {
    pub playbook: PlaybookDocument,
    pub diagnostics: Vec<Diagnostic>,
}

/// Assemble one play from ordered resource declarations.
pub fn assemble_playbook(play_name: &str, declarations: &[ResourceDeclaration]) -> AssemblyResult {
    let mut tasks: Vec<TaskDefinition> = Vec::new();
    let mut diagnostics: Vec<Diagnostic> = Vec::new();

    for decl in declarations {
        let mut mapped = mapper::convert_resource(decl);
        tasks.append(&mut mapped.tasks);
        diagnostics.append(&mut mapped.diagnostics);
    }

    let handlers = synthesize_handlers(declarations, &mut diagnostics);

    AssemblyResult {
        playbook: PlaybookDocument {
            name: play_name.to_string(),
            hosts: "all".to_string(),
            r#become: true,
            tasks,
            handlers,
        },
        diagnostics,
    }
}

/// One handler per distinct notification target, first-reference order.
fn synthesize_handlers(
    declarations: &[ResourceDeclaration],
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<TaskDefinition> {
    let mut edges: IndexMap<(String, String, String), Notification> = IndexMap::new();
    for decl in declarations {
        for edge in &decl.notifications {
            edges.entry(edge.handler_key()).or_insert_with(|| edge.clone());
        }
    }

    let mut handlers = Vec::new();
    for edge in edges.values() {
        let target = declarations
            .iter()
            .find(|d| d.type_name == edge.target_type && d.name == edge.target_name);

        let base = match target {
            Some(decl) => decl.clone(),
            None => {
                diagnostics.push(Diagnostic::UnresolvedNotification {
                    target: format!("{}[{}]", edge.target_type, edge.target_name),
                    detail: "no matching declaration in this unit; emitted a stub handler"
                        .to_string(),
                });
                stub_declaration(edge)
            }
        };

        let (mut handler, mut handler_diagnostics) = mapper::convert_action(&base, &edge.action);
        diagnostics.append(&mut handler_diagnostics);
        handler.name = edge.handler_name();
        // Handlers fire only when notified; chained notifications would
        // reference handlers this unit never declared.
        handler.notify.clear();
        handlers.push(handler);
    }
    handlers
}

/// Minimal declaration reconstructed from a dangling `type[name]` reference.
fn stub_declaration(edge: &Notification) -> ResourceDeclaration {
    ResourceDeclaration {
        type_name: edge.target_type.clone(),
        name: edge.target_name.clone(),
        actions: vec![edge.action.clone()],
        properties: IndexMap::new(),
        guards: Vec::new(),
        notifications: Vec::new(),
        line: 0,
    }
}
