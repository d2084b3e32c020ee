//! Schema-definition linting - static analysis of type schema files.
//!
//! Validates definition files for:
//! - JSON syntax errors
//! - Structure (field kinds, relationship form)
//! - Relationships to types the file does not define
//! - Field names that clash with JSON:API members or normalized keys
//! - Files that cannot be read

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::LoadError;
use crate::loader::{check_definition, escape_pointer, load_document, parse_type_schema};
use crate::schema::{Field, TypeSchema};

/// Field names JSON:API reserves for resource identity.
const RESERVED_FIELDS: &[&str] = &["id", "type"];

/// Field names that overwrite members of a normalized resource object.
const SHADOWING_FIELDS: &[&str] = &["links", "meta", ".attributes", ".relationships"];

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single diagnostic message from linting.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    pub file: PathBuf,
    /// JSON path to the issue (e.g., "/articles/author")
    pub path: String,
    pub message: String,
}

/// Result of linting a single file.
#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    pub file: PathBuf,
    pub status: FileStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

/// Status of a linted file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Ok,
    Error,
    Warning,
}

/// Result of linting a directory or set of files.
#[derive(Debug, Clone, Serialize)]
pub struct LintResult {
    pub path: PathBuf,
    pub files_checked: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub warnings: usize,
    pub results: Vec<FileResult>,
}

impl LintResult {
    /// Returns true if all files passed (no errors).
    pub fn is_ok(&self) -> bool {
        self.errors == 0
    }

    /// Overall verdict: no errors, and no warnings either when `strict`.
    pub fn passes(&self, strict: bool) -> bool {
        self.is_ok() && (!strict || self.warnings == 0)
    }
}

/// Lint a file or directory.
///
/// If path is a directory, recursively finds all .json files.
/// If `strict` is true, warnings are treated as errors.
pub fn lint(path: &Path, strict: bool) -> LintResult {
    let files = collect_definition_files(path);
    let mut results = Vec::new();
    let mut total_errors = 0;
    let mut total_warnings = 0;

    for file in &files {
        let file_result = lint_file(file, path);
        total_errors += count(&file_result.diagnostics, Severity::Error);
        total_warnings += count(&file_result.diagnostics, Severity::Warning);
        results.push(file_result);
    }

    let failed = results
        .iter()
        .filter(|r| {
            if strict {
                r.status != FileStatus::Ok
            } else {
                r.status == FileStatus::Error
            }
        })
        .count();

    LintResult {
        path: path.to_path_buf(),
        files_checked: files.len(),
        passed: files.len() - failed,
        failed,
        errors: total_errors,
        warnings: total_warnings,
        results,
    }
}

fn count(diagnostics: &[Diagnostic], severity: Severity) -> usize {
    diagnostics.iter().filter(|d| d.severity == severity).count()
}

/// Lint a single schema-definition file.
pub fn lint_file(file: &Path, base_path: &Path) -> FileResult {
    let mut diagnostics = Vec::new();
    let mut report = |severity: Severity, code: &str, path: String, message: String| {
        diagnostics.push(Diagnostic {
            severity,
            code: code.to_string(),
            file: file.to_path_buf(),
            path,
            message,
        });
    };

    match load_document(file) {
        Err(LoadError::InvalidJson { source }) => report(
            Severity::Error,
            "E001",
            "/".to_string(),
            format!("syntax error: {}", source),
        ),
        Err(e) => report(
            Severity::Error,
            "E005",
            "/".to_string(),
            format!("cannot read file: {}", e),
        ),
        Ok(definition) => {
            let structural = check_definition(&definition);
            if structural.is_empty() {
                match parse_type_schema(&definition) {
                    Ok(schema) => check_schema(&schema, &mut report),
                    Err(e) => report(Severity::Error, "E002", "/".to_string(), e.to_string()),
                }
            } else {
                for error in structural {
                    let path = if error.path.is_empty() {
                        "/".to_string()
                    } else {
                        error.path
                    };
                    report(Severity::Error, "E002", path, error.message);
                }
            }
        }
    }

    let has_errors = diagnostics.iter().any(|d| d.severity == Severity::Error);
    let has_warnings = diagnostics.iter().any(|d| d.severity == Severity::Warning);

    let status = if has_errors {
        FileStatus::Error
    } else if has_warnings {
        FileStatus::Warning
    } else {
        FileStatus::Ok
    };

    FileResult {
        file: file.strip_prefix(base_path).unwrap_or(file).to_path_buf(),
        status,
        diagnostics,
    }
}

/// Cross-type checks on a structurally valid definition.
fn check_schema<F>(schema: &TypeSchema, report: &mut F)
where
    F: FnMut(Severity, &str, String, String),
{
    for (type_name, resource) in schema.types() {
        let type_path = format!("/{}", escape_pointer(type_name));

        if resource.is_empty() {
            report(
                Severity::Warning,
                "W002",
                type_path.clone(),
                format!("type \"{}\" declares no fields", type_name),
            );
        }

        for (field_name, field) in resource.fields() {
            let field_path = format!("{}/{}", type_path, escape_pointer(field_name));

            if RESERVED_FIELDS.contains(&field_name) {
                report(
                    Severity::Error,
                    "E004",
                    field_path.clone(),
                    format!("\"{}\" is reserved for resource identity", field_name),
                );
            } else if SHADOWING_FIELDS.contains(&field_name) {
                report(
                    Severity::Warning,
                    "W001",
                    field_path.clone(),
                    format!(
                        "field \"{}\" overwrites the member of the same name in normalized output",
                        field_name
                    ),
                );
            }

            if let Field::ToOne(_) | Field::ToMany(_) = field {
                let targets = field.targets();
                for (i, target) in targets.iter().enumerate() {
                    if !schema.contains(target) {
                        report(
                            Severity::Error,
                            "E003",
                            field_path.clone(),
                            format!("relationship target \"{}\" is not a defined type", target),
                        );
                    }
                    if targets[..i].contains(target) {
                        report(
                            Severity::Warning,
                            "W003",
                            field_path.clone(),
                            format!("relationship target \"{}\" is listed twice", target),
                        );
                    }
                }
            }
        }
    }
}

/// Collect all .json files in a path (file or directory).
fn collect_definition_files(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        if path.extension().map(|e| e == "json").unwrap_or(false) {
            return vec![path.to_path_buf()];
        }
        return vec![];
    }

    let mut files = Vec::new();
    collect_files_recursive(path, &mut files);
    files.sort();
    files
}

fn collect_files_recursive(dir: &Path, files: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files_recursive(&path, files);
        } else if path.extension().map(|e| e == "json").unwrap_or(false) {
            files.push(path);
        }
    }
}
