//! MD-009: CLI subcommands — recipe, attributes, template, cookbook, check.

use crate::cookbook;
use crate::core::attributes::{self, Resolution};
use crate::core::playbook;
use crate::core::recipe;
use crate::core::template;
use crate::core::types::{Diagnostic, Precedence};
use clap::Subcommand;
use std::path::{Path, PathBuf};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Convert one Chef recipe to an Ansible playbook
    Recipe {
        /// Recipe file (recipes/*.rb)
        file: PathBuf,

        /// Write the playbook here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Emit JSON instead of YAML/text
        #[arg(long)]
        json: bool,
    },

    /// Extract and resolve attributes across one or more attribute files
    Attributes {
        /// Attribute files, in precedence-relevant order (same-tier ties go
        /// to the file listed last)
        files: Vec<PathBuf>,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Convert one ERB template to Jinja2
    Template {
        /// Template file (templates/**/*.erb)
        file: PathBuf,

        /// Write the converted template here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Emit JSON instead of the converted text
        #[arg(long)]
        json: bool,
    },

    /// Convert a whole cookbook directory into Ansible artifacts
    Cookbook {
        /// Cookbook root (containing recipes/, attributes/, ...)
        path: PathBuf,

        /// Output directory for playbooks, templates, and vars
        #[arg(short, long, default_value = "ansible")]
        output: PathBuf,

        /// Emit the batch report as JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Parse a cookbook and report problems without writing anything
    Check {
        /// Cookbook root
        path: PathBuf,
    },
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> Result<(), String> {
    match cmd {
        Commands::Recipe { file, output, json } => cmd_recipe(&file, output.as_deref(), json),
        Commands::Attributes { files, json } => cmd_attributes(&files, json),
        Commands::Template { file, output, json } => cmd_template(&file, output.as_deref(), json),
        Commands::Cookbook { path, output, json } => cmd_cookbook(&path, &output, json),
        Commands::Check { path } => cmd_check(&path),
    }
}

fn read_input(path: &Path) -> Result<String, String> {
    std::fs::read_to_string(path).map_err(|e| format!("cannot read {}: {}", path.display(), e))
}

fn write_output(path: &Path, content: &str) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("cannot create dir {}: {}", parent.display(), e))?;
        }
    }
    std::fs::write(path, content).map_err(|e| format!("cannot write {}: {}", path.display(), e))
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn print_warnings(diagnostics: &[Diagnostic]) {
    for d in diagnostics {
        eprintln!("warning: {}", d);
    }
}

fn cmd_recipe(file: &Path, output: Option<&Path>, json: bool) -> Result<(), String> {
    let text = read_input(file)?;
    let parse = recipe::parse_recipe(&text).map_err(|e| format!("{}: {}", file.display(), e))?;
    let result = playbook::assemble_playbook(&file_stem(file), &parse.resources);
    let mut diagnostics = parse.diagnostics;
    diagnostics.extend(result.diagnostics);

    if json {
        let doc = serde_json::json!({
            "playbook": result.playbook.to_yaml(),
            "diagnostics": diagnostics,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&doc).map_err(|e| format!("json error: {}", e))?
        );
        return Ok(());
    }

    let yaml = result.playbook.to_yaml_string()?;
    match output {
        Some(path) => {
            write_output(path, &yaml)?;
            println!(
                "Converted {} → {} ({} tasks, {} handlers)",
                file.display(),
                path.display(),
                result.playbook.tasks.len(),
                result.playbook.handlers.len()
            );
        }
        None => print!("{}", yaml),
    }
    print_warnings(&diagnostics);
    Ok(())
}

fn cmd_attributes(files: &[PathBuf], json: bool) -> Result<(), String> {
    if files.is_empty() {
        return Err("no attribute files given".to_string());
    }

    let mut assignments = Vec::new();
    let mut diagnostics = Vec::new();
    for file in files {
        let text = read_input(file)?;
        let label = file.display().to_string();
        let parse = attributes::parse_attributes(&text, &label, Precedence::Normal)
            .map_err(|e| format!("{}: {}", label, e))?;
        assignments.extend(parse.assignments);
        diagnostics.extend(parse.diagnostics);
    }
    let resolution = attributes::resolve_attributes(&assignments);
    diagnostics.extend(resolution.diagnostics.iter().cloned());

    if json {
        let doc = serde_json::json!({
            "attributes": resolution.attributes,
            "conflict_count": resolution.conflict_count,
            "diagnostics": diagnostics,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&doc).map_err(|e| format!("json error: {}", e))?
        );
        return Ok(());
    }

    print_resolution(&resolution);
    print_warnings(&diagnostics);
    Ok(())
}

/// Display a resolved attribute table to stdout.
fn print_resolution(resolution: &Resolution) {
    for attr in &resolution.attributes {
        println!(
            "{} = {}  [{}, {} assignment(s)]",
            attr.path_key(),
            attr.value,
            attr.winning_precedence,
            attr.contributors.len()
        );
    }
    println!();
    println!(
        "{} attribute(s), {} cross-tier conflict(s).",
        resolution.attributes.len(),
        resolution.conflict_count
    );
}

fn cmd_template(file: &Path, output: Option<&Path>, json: bool) -> Result<(), String> {
    let text = read_input(file)?;
    let result = template::convert_template(&text);

    if json {
        let doc = serde_json::json!({
            "variables": result.variables,
            "converted_text": result.converted_text,
            "warnings": result.warnings,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&doc).map_err(|e| format!("json error: {}", e))?
        );
        return Ok(());
    }

    match output {
        Some(path) => {
            write_output(path, &result.converted_text)?;
            println!(
                "Converted {} → {} ({} variable(s))",
                file.display(),
                path.display(),
                result.variables.len()
            );
        }
        None => print!("{}", result.converted_text),
    }
    print_warnings(&result.warnings);
    Ok(())
}

fn cmd_cookbook(path: &Path, output: &Path, json: bool) -> Result<(), String> {
    let converted = cookbook::convert_cookbook(path)?;

    for recipe in &converted.recipes {
        let dest = output.join(format!("{}.yml", recipe.name));
        write_output(&dest, &recipe.assembly.playbook.to_yaml_string()?)?;
    }
    for tpl in &converted.templates {
        let rel = tpl.rel_path.strip_suffix(".erb").unwrap_or(&tpl.rel_path);
        let dest = output.join("templates").join(rel);
        write_output(&dest, &tpl.result.converted_text)?;
    }
    if !converted.resolution.attributes.is_empty() {
        let dest = output.join("vars.yml");
        write_output(&dest, &cookbook::vars_yaml(&converted.resolution)?)?;
    }

    if json {
        let doc = serde_json::json!({
            "report": converted.report,
            "conflict_count": converted.resolution.conflict_count,
            "custom_resources": converted.custom_resources,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&doc).map_err(|e| format!("json error: {}", e))?
        );
        return Ok(());
    }

    print_report(&converted);
    println!("Output written to {}/", output.display());
    Ok(())
}

fn print_report(converted: &cookbook::ConvertedCookbook) {
    println!(
        "Cookbook {}: {} file(s) converted, {} skipped, {} warning(s).",
        converted.name,
        converted.report.converted_count(),
        converted.report.skipped_count(),
        converted.report.warning_count()
    );
    for file in &converted.report.files {
        if file.converted {
            if file.warnings.is_empty() {
                println!("  ok   {}", file.path);
            } else {
                println!("  warn {} ({} warning(s))", file.path, file.warnings.len());
                for w in &file.warnings {
                    println!("         {}", w);
                }
            }
        } else {
            println!(
                "  SKIP {} ({})",
                file.path,
                file.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
    if converted.resolution.conflict_count > 0 {
        println!(
            "  {} attribute path(s) set from more than one precedence tier:",
            converted.resolution.conflict_count
        );
        for d in &converted.resolution.diagnostics {
            println!("         {}", d);
        }
    }
    for def in &converted.custom_resources {
        println!(
            "  custom resource {} ({} property(ies), actions: {})",
            def.name,
            def.properties.len(),
            def.actions.join(", ")
        );
    }
}

fn cmd_check(path: &Path) -> Result<(), String> {
    let converted = cookbook::convert_cookbook(path)?;
    print_report(&converted);

    let skipped = converted.report.skipped_count();
    if skipped > 0 {
        return Err(format!("{} file(s) failed to parse", skipped));
    }
    Ok(())
}
