//! MD-008: Cookbook batch conversion.
//!
//! The only module that touches the filesystem. Lists a cookbook's
//! `recipes/`, `attributes/`, `templates/`, and `resources/` trees in lexical
//! path order (the stable order same-tier attribute tie-breaking depends on),
//! feeds each file through the pure core pipeline, and aggregates a per-file
//! report. A file that fails structurally is skipped with its error recorded;
//! siblings still convert.

use crate::core::attributes::{self, Resolution};
use crate::core::playbook::{self, AssemblyResult};
use crate::core::recipe;
use crate::core::scanner;
use crate::core::template;
use crate::core::types::{Diagnostic, Precedence, StructuralError, TemplateConversionResult};
use glob::glob;
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Ordered file lists per cookbook category.
#[derive(Debug, Clone, PartialEq)]
pub struct CookbookLayout {
    pub name: String,
    pub root: PathBuf,
    pub recipes: Vec<PathBuf>,
    pub attributes: Vec<PathBuf>,
    pub templates: Vec<PathBuf>,
    pub resources: Vec<PathBuf>,
}

/// Outcome of one file in a batch run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileReport {
    /// Path relative to the cookbook root.
    pub path: String,

    pub converted: bool,

    /// Why the file was skipped, when it was.
    pub error: Option<String>,

    pub warnings: Vec<Diagnostic>,
}

/// Per-file outcomes plus summary counts for one cookbook run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CookbookReport {
    pub cookbook: String,
    pub files: Vec<FileReport>,
}

impl CookbookReport {
    pub fn converted_count(&self) -> usize {
        self.files.iter().filter(|f| f.converted).count()
    }

    pub fn skipped_count(&self) -> usize {
        self.files.iter().filter(|f| !f.converted).count()
    }

    pub fn warning_count(&self) -> usize {
        self.files.iter().map(|f| f.warnings.len()).sum()
    }

    fn converted(&mut self, path: String, warnings: Vec<Diagnostic>) {
        self.files.push(FileReport {
            path,
            converted: true,
            error: None,
            warnings,
        });
    }

    fn skipped(&mut self, path: String, error: String) {
        self.files.push(FileReport {
            path,
            converted: false,
            error: Some(error),
            warnings: Vec::new(),
        });
    }
}

/// One recipe converted into an assembled play.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertedRecipe {
    /// Recipe file stem, e.g. `default`.
    pub name: String,
    pub assembly: AssemblyResult,
}

/// One template converted to Jinja2.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertedTemplate {
    /// Path relative to the `templates/` directory, e.g. `default/nginx.conf.erb`.
    pub rel_path: String,
    pub result: TemplateConversionResult,
}

/// Declared surface of a custom resource definition (`resources/*.rb`).
///
/// Uses of the type in recipes still map to best-effort generic tasks; the
/// declared properties and actions let the report name what the cookbook
/// defines.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomResourceDef {
    /// Resource type name, from the file stem.
    pub name: String,
    pub properties: Vec<String>,
    pub actions: Vec<String>,
    pub default_action: Option<String>,
}

/// Everything produced from one cookbook.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertedCookbook {
    pub name: String,
    pub recipes: Vec<ConvertedRecipe>,
    pub resolution: Resolution,
    pub templates: Vec<ConvertedTemplate>,
    pub custom_resources: Vec<CustomResourceDef>,
    pub report: CookbookReport,
}

/// List a cookbook's files per category, sorted lexically within each.
pub fn list_cookbook(root: &Path) -> Result<CookbookLayout, String> {
    if !root.is_dir() {
        return Err(format!("{} is not a directory", root.display()));
    }
    let name = root
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "cookbook".to_string());
    Ok(CookbookLayout {
        name,
        root: root.to_path_buf(),
        recipes: list_category(root, "recipes/*.rb")?,
        attributes: list_category(root, "attributes/*.rb")?,
        templates: list_category(root, "templates/**/*.erb")?,
        resources: list_category(root, "resources/*.rb")?,
    })
}

fn list_category(root: &Path, pattern: &str) -> Result<Vec<PathBuf>, String> {
    let full = format!("{}/{}", root.display(), pattern);
    let mut paths: Vec<PathBuf> = glob(&full)
        .map_err(|e| format!("bad file pattern {}: {}", full, e))?
        .filter_map(Result::ok)
        .filter(|p| p.is_file())
        .collect();
    paths.sort();
    Ok(paths)
}

/// Convert a whole cookbook directory.
///
/// File reads happen only here; everything downstream is the pure engine.
/// Returns `Err` only when the root itself is unusable — individual file
/// failures land in the report.
pub fn convert_cookbook(root: &Path) -> Result<ConvertedCookbook, String> {
    let layout = list_cookbook(root)?;
    let mut report = CookbookReport {
        cookbook: layout.name.clone(),
        files: Vec::new(),
    };

    let mut recipes = Vec::new();
    for path in &layout.recipes {
        let rel = rel_label(&layout.root, path);
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                report.skipped(rel, format!("cannot read: {}", e));
                continue;
            }
        };
        match recipe::parse_recipe(&text) {
            Ok(parse) => {
                let stem = file_stem(path);
                let play_name = format!("{}::{}", layout.name, stem);
                let assembly = playbook::assemble_playbook(&play_name, &parse.resources);
                let mut warnings = parse.diagnostics;
                warnings.extend(assembly.diagnostics.iter().cloned());
                report.converted(rel, warnings);
                recipes.push(ConvertedRecipe {
                    name: stem,
                    assembly,
                });
            }
            Err(err) => report.skipped(rel, err.to_string()),
        }
    }

    // Bare `node[...]` writes in attribute files act at the normal tier.
    let mut assignments = Vec::new();
    for path in &layout.attributes {
        let rel = rel_label(&layout.root, path);
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                report.skipped(rel, format!("cannot read: {}", e));
                continue;
            }
        };
        match attributes::parse_attributes(&text, &rel, Precedence::Normal) {
            Ok(parse) => {
                report.converted(rel, parse.diagnostics);
                assignments.extend(parse.assignments);
            }
            Err(err) => report.skipped(rel, err.to_string()),
        }
    }
    let resolution = attributes::resolve_attributes(&assignments);

    let mut templates = Vec::new();
    let templates_root = layout.root.join("templates");
    for path in &layout.templates {
        let rel = rel_label(&layout.root, path);
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                report.skipped(rel, format!("cannot read: {}", e));
                continue;
            }
        };
        let result = template::convert_template(&text);
        report.converted(rel, result.warnings.clone());
        templates.push(ConvertedTemplate {
            rel_path: rel_label(&templates_root, path),
            result,
        });
    }

    let mut custom_resources = Vec::new();
    for path in &layout.resources {
        let rel = rel_label(&layout.root, path);
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                report.skipped(rel, format!("cannot read: {}", e));
                continue;
            }
        };
        match parse_resource_definition(&file_stem(path), &text) {
            Ok(def) => {
                report.converted(rel, Vec::new());
                custom_resources.push(def);
            }
            Err(err) => report.skipped(rel, err.to_string()),
        }
    }

    Ok(ConvertedCookbook {
        name: layout.name,
        recipes,
        resolution,
        templates,
        custom_resources,
        report,
    })
}

fn property_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^property\s+:(\w+)").expect("property regex"))
}

fn action_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^action\s+:(\w+)\s+do\b").expect("action regex"))
}

fn default_action_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^default_action\s+:(\w+)").expect("default_action regex"))
}

/// Parse a custom resource definition file for its declared surface:
/// `property :name, ...` lines, `action :x do ... end` blocks, and an
/// optional `default_action`.
pub fn parse_resource_definition(
    name: &str,
    text: &str,
) -> Result<CustomResourceDef, StructuralError> {
    let statements = scanner::scan(text)?;
    let mut def = CustomResourceDef {
        name: name.to_string(),
        properties: Vec::new(),
        actions: Vec::new(),
        default_action: None,
    };
    for stmt in &statements {
        let header = stmt.text.lines().next().unwrap_or("").trim();
        if let Some(caps) = property_re().captures(header) {
            def.properties.push(caps[1].to_string());
        } else if let Some(caps) = action_block_re().captures(header) {
            def.actions.push(caps[1].to_string());
        } else if let Some(caps) = default_action_re().captures(header) {
            def.default_action = Some(caps[1].to_string());
        }
    }
    Ok(def)
}

/// Resolved attributes as an Ansible vars file body.
pub fn vars_yaml(resolution: &Resolution) -> Result<String, String> {
    let mut mapping = serde_yaml_ng::Mapping::new();
    for attr in &resolution.attributes {
        mapping.insert(
            serde_yaml_ng::Value::String(attr.path_key()),
            attr.value.to_yaml(),
        );
    }
    serde_yaml_ng::to_string(&serde_yaml_ng::Value::Mapping(mapping))
        .map(|body| format!("---\n{}", body))
        .map_err(|e| format!("vars serialize error: {}", e))
}

fn rel_label(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
