//! Loading documents and schema definitions from files and strings.
//!
//! Also parses the command-line forms of include trees and sparse fieldsets.

use std::path::Path;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{DefinitionError, LoadError};
use crate::schema::{Field, ResourceType, Scalar, TypeSchema, SCALAR_KINDS};
use crate::types::{Fieldsets, IncludeTree};

/// Load a JSON document from a file path.
///
/// # Errors
///
/// Returns `LoadError::FileNotFound` if the file doesn't exist,
/// or `LoadError::InvalidJson` if the file isn't valid JSON.
pub fn load_document(path: &Path) -> Result<Value, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| LoadError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    load_document_str(&content)
}

/// Load a JSON document from a string.
///
/// # Errors
///
/// Returns `LoadError::InvalidJson` if the string isn't valid JSON.
pub fn load_document_str(content: &str) -> Result<Value, LoadError> {
    serde_json::from_str(content).map_err(|source| LoadError::InvalidJson { source })
}

/// Load a type schema from a definition file.
pub fn load_type_schema(path: &Path) -> Result<TypeSchema, LoadError> {
    let definition = load_document(path)?;
    parse_type_schema(&definition)
}

/// JSON Schema that every schema-definition file must satisfy.
pub fn definition_schema() -> Value {
    json!({
        "type": "object",
        "additionalProperties": {
            "type": "object",
            "additionalProperties": { "$ref": "#/$defs/field" }
        },
        "$defs": {
            "kind": { "enum": SCALAR_KINDS },
            "field": {
                "oneOf": [
                    { "$ref": "#/$defs/kind" },
                    {
                        "type": "object",
                        "properties": {
                            "type": { "$ref": "#/$defs/kind" },
                            "nullable": { "type": "boolean" }
                        },
                        "required": ["type"],
                        "additionalProperties": false
                    },
                    {
                        "type": "object",
                        "properties": {
                            "rel": {
                                "oneOf": [
                                    { "type": "string" },
                                    {
                                        "type": "array",
                                        "items": { "type": "string" },
                                        "minItems": 1
                                    }
                                ]
                            }
                        },
                        "required": ["rel"],
                        "additionalProperties": false
                    }
                ]
            }
        }
    })
}

/// Check a definition against [`definition_schema`], returning every violation.
pub fn check_definition(definition: &Value) -> Vec<DefinitionError> {
    let validator = match jsonschema::validator_for(&definition_schema()) {
        Ok(v) => v,
        Err(e) => {
            return vec![DefinitionError {
                path: String::new(),
                message: format!("definition schema is unusable: {}", e),
            }]
        }
    };

    validator
        .iter_errors(definition)
        .map(|e| DefinitionError {
            path: e.instance_path.to_string(),
            message: e.to_string(),
        })
        .collect()
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FieldDef {
    Kind(String),
    Relationship {
        rel: RelTarget,
    },
    Scalar {
        #[serde(rename = "type")]
        kind: String,
        #[serde(default)]
        nullable: bool,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RelTarget {
    One(String),
    Many(Vec<String>),
}

/// Convert a schema definition into a [`TypeSchema`].
///
/// Relationship targets are not checked here; see the linter.
///
/// # Errors
///
/// Returns `LoadError::InvalidDefinition` with every problem found.
pub fn parse_type_schema(definition: &Value) -> Result<TypeSchema, LoadError> {
    let errors = check_definition(definition);
    if !errors.is_empty() {
        return Err(LoadError::InvalidDefinition { errors });
    }

    let mut schema = TypeSchema::new();
    let mut errors = Vec::new();
    for (type_name, fields) in definition.as_object().into_iter().flatten() {
        let mut resource = ResourceType::new();
        for (field_name, raw) in fields.as_object().into_iter().flatten() {
            let path = format!("/{}/{}", escape_pointer(type_name), escape_pointer(field_name));
            match field_from_def(raw) {
                Ok(field) => resource.insert(field_name.clone(), field),
                Err(message) => errors.push(DefinitionError { path, message }),
            }
        }
        schema.insert(type_name.clone(), resource);
    }

    if errors.is_empty() {
        Ok(schema)
    } else {
        Err(LoadError::InvalidDefinition { errors })
    }
}

fn field_from_def(raw: &Value) -> Result<Field, String> {
    let def: FieldDef = serde_json::from_value(raw.clone()).map_err(|e| e.to_string())?;
    let scalar = |kind: &str| {
        Scalar::kind(kind).ok_or_else(|| format!("unknown scalar kind \"{}\"", kind))
    };
    match def {
        FieldDef::Kind(kind) => Ok(Field::Scalar(scalar(&kind)?)),
        FieldDef::Scalar { kind, nullable } => {
            let scalar = scalar(&kind)?;
            Ok(Field::Scalar(if nullable { scalar.nullable() } else { scalar }))
        }
        FieldDef::Relationship {
            rel: RelTarget::One(target),
        } => Ok(Field::ToOne(target)),
        FieldDef::Relationship {
            rel: RelTarget::Many(targets),
        } => Ok(Field::ToMany(targets)),
    }
}

/// Escape a JSON Pointer token (`~` to `~0`, `/` to `~1`).
pub(crate) fn escape_pointer(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// Parse `author.articles,comments` into an include tree.
pub fn parse_include_arg(arg: &str) -> IncludeTree {
    IncludeTree::from_paths(arg.split(',').map(str::trim).filter(|p| !p.is_empty()))
}

/// Parse `TYPE=FIELD,FIELD` arguments into sparse fieldsets.
///
/// `TYPE=` with no fields restricts the type to no fields at all.
///
/// # Errors
///
/// Returns `LoadError::InvalidArgument` for an argument without `=` or with an empty type.
pub fn parse_fields_args<I, S>(args: I) -> Result<Fieldsets, LoadError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut fieldsets = Fieldsets::new();
    for arg in args {
        let arg = arg.as_ref();
        let Some((type_name, names)) = arg.split_once('=') else {
            return Err(LoadError::InvalidArgument {
                value: arg.to_string(),
                message: "expected TYPE=FIELD,FIELD".to_string(),
            });
        };
        let type_name = type_name.trim();
        if type_name.is_empty() {
            return Err(LoadError::InvalidArgument {
                value: arg.to_string(),
                message: "type name is empty".to_string(),
            });
        }
        let names = names.split(',').map(str::trim).filter(|n| !n.is_empty());
        fieldsets = fieldsets.with(type_name, names);
    }
    Ok(fieldsets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn load_document_valid_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"data": null}}"#).unwrap();

        let doc = load_document(file.path()).unwrap();
        assert!(doc["data"].is_null());
    }

    #[test]
    fn load_document_file_not_found() {
        let result = load_document(Path::new("/nonexistent/doc.json"));
        assert!(matches!(result, Err(LoadError::FileNotFound { .. })));
    }

    #[test]
    fn load_document_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not valid json").unwrap();

        let result = load_document(file.path());
        assert!(matches!(result, Err(LoadError::InvalidJson { .. })));
    }

    #[test]
    fn load_document_str_invalid() {
        let result = load_document_str("{");
        assert!(matches!(result, Err(LoadError::InvalidJson { .. })));
    }

    #[test]
    fn parse_type_schema_all_forms() {
        let definition = json!({
            "articles": {
                "title": "string",
                "subtitle": { "type": "string", "nullable": true },
                "author": { "rel": "people" },
                "comments": { "rel": ["comments"] }
            },
            "people": { "name": "string" },
            "comments": {}
        });
        let schema = parse_type_schema(&definition).unwrap();
        assert_eq!(schema.len(), 3);

        let articles = schema.get("articles").unwrap();
        let names: Vec<&str> = articles.fields().map(|(n, _)| n).collect();
        assert_eq!(names, ["title", "subtitle", "author", "comments"]);

        assert!(matches!(articles.field("author"), Some(Field::ToOne(t)) if t == "people"));
        assert!(matches!(articles.field("comments"), Some(Field::ToMany(t)) if t == &["comments"]));
        let Some(Field::Scalar(subtitle)) = articles.field("subtitle") else {
            panic!("subtitle should be a scalar");
        };
        assert!(subtitle.check(&Value::Null).is_ok());
        let Some(Field::Scalar(title)) = articles.field("title") else {
            panic!("title should be a scalar");
        };
        assert!(title.check(&Value::Null).is_err());
    }

    #[test]
    fn parse_type_schema_rejects_unknown_kind() {
        let definition = json!({"articles": {"title": "text"}});
        let err = parse_type_schema(&definition).unwrap_err();
        let LoadError::InvalidDefinition { errors } = err else {
            panic!("expected InvalidDefinition");
        };
        assert!(errors.iter().any(|e| e.path == "/articles/title"));
    }

    #[test]
    fn parse_type_schema_rejects_empty_rel_list() {
        let definition = json!({"articles": {"comments": {"rel": []}}});
        assert!(matches!(
            parse_type_schema(&definition),
            Err(LoadError::InvalidDefinition { .. })
        ));
    }

    #[test]
    fn parse_type_schema_rejects_non_object() {
        assert!(parse_type_schema(&json!(["articles"])).is_err());
        assert!(parse_type_schema(&json!({"articles": "string"})).is_err());
    }

    #[test]
    fn load_type_schema_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"people": {{"name": "string"}}}}"#).unwrap();
        let schema = load_type_schema(file.path()).unwrap();
        assert!(schema.contains("people"));
    }

    #[test]
    fn escape_pointer_tokens() {
        assert_eq!(escape_pointer("a/b~c"), "a~1b~0c");
    }

    #[test]
    fn include_arg_round_trip() {
        let tree = parse_include_arg("author.articles, comments,");
        assert_eq!(tree, IncludeTree::from_paths(["author.articles", "comments"]));
        assert!(parse_include_arg("").is_empty());
    }

    #[test]
    fn fields_args_parse() {
        let fields = parse_fields_args(["articles=title,body", "people="]).unwrap();
        assert_eq!(
            fields.get("articles"),
            Some(&["title".to_string(), "body".to_string()][..])
        );
        assert_eq!(fields.get("people"), Some(&[][..]));
    }

    #[test]
    fn fields_args_reject_malformed() {
        assert!(matches!(
            parse_fields_args(["articles"]),
            Err(LoadError::InvalidArgument { .. })
        ));
        assert!(matches!(
            parse_fields_args(["=title"]),
            Err(LoadError::InvalidArgument { .. })
        ));
    }
}
