//! Resource index: every resource in a document, keyed by (type, id).

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use serde_json::Value;

use crate::error::ValidationError;
use crate::schema::TypeSchema;
use crate::types::{json_type_name, ResourceKey};

/// A raw resource node and where it sits in the document.
#[derive(Debug, Clone, Copy)]
pub struct IndexedResource<'a> {
    pub node: &'a Value,
    /// JSON Pointer of the node, e.g. `/included/3`.
    pub path: &'a str,
}

/// Lookup table built once per validation run from `data` and `included`.
///
/// The first occurrence of a (type, id) pair wins; later duplicates are
/// ignored. Every indexed node has a type declared in the schema.
#[derive(Debug, Default)]
pub struct ResourceIndex<'a> {
    paths: Vec<String>,
    entries: HashMap<ResourceKey, (&'a Value, usize)>,
}

impl<'a> ResourceIndex<'a> {
    /// Index the primary data (object or list) and the `included` array.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if a node lacks a string `type`/`id`, if its
    /// type is not in the schema, or if `included` is not an array.
    pub fn build(document: &'a Value, schema: &TypeSchema) -> Result<Self, ValidationError> {
        let mut index = ResourceIndex::default();

        match document.get("data") {
            Some(Value::Array(items)) => {
                for (i, node) in items.iter().enumerate() {
                    index.insert(node, format!("/data/{}", i), schema)?;
                }
            }
            Some(node @ Value::Object(_)) => index.insert(node, "/data".to_string(), schema)?,
            _ => {}
        }

        match document.get("included") {
            None => {}
            Some(Value::Array(items)) => {
                for (i, node) in items.iter().enumerate() {
                    index.insert(node, format!("/included/{}", i), schema)?;
                }
            }
            Some(other) => {
                return Err(ValidationError::MalformedResource {
                    path: "/included".to_string(),
                    message: format!("included must be an array, got {}", json_type_name(other)),
                })
            }
        }

        Ok(index)
    }

    fn insert(
        &mut self,
        node: &'a Value,
        path: String,
        schema: &TypeSchema,
    ) -> Result<(), ValidationError> {
        let key = resource_key(node, &path)?;
        if !schema.contains(&key.type_name) {
            return Err(ValidationError::UnknownType {
                path: format!("{}/type", path),
                type_name: key.type_name,
            });
        }

        match self.entries.entry(key) {
            Entry::Occupied(existing) => {
                tracing::trace!(
                    resource = %existing.key(),
                    path = %path,
                    "duplicate resource ignored"
                );
            }
            Entry::Vacant(slot) => {
                slot.insert((node, self.paths.len()));
                self.paths.push(path);
            }
        }
        Ok(())
    }

    /// Look up a resource by type and id.
    pub fn find(&self, key: &ResourceKey) -> Option<IndexedResource<'_>> {
        self.entries.get(key).map(|&(node, slot)| IndexedResource {
            node,
            path: self.paths[slot].as_str(),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Read the (type, id) identity of a resource node or resource identifier.
///
/// # Errors
///
/// Returns `ValidationError::MalformedResource` unless `node` is an object
/// with string `type` and `id` members.
pub fn resource_key(node: &Value, path: &str) -> Result<ResourceKey, ValidationError> {
    let Some(map) = node.as_object() else {
        return Err(ValidationError::MalformedResource {
            path: path.to_string(),
            message: format!("expected object, got {}", json_type_name(node)),
        });
    };

    let member = |name: &str| match map.get(name) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(ValidationError::MalformedResource {
            path: format!("{}/{}", path, name),
            message: format!("{} must be a string, got {}", name, json_type_name(other)),
        }),
        None => Err(ValidationError::MalformedResource {
            path: path.to_string(),
            message: format!("missing \"{}\"", name),
        }),
    };

    Ok(ResourceKey::new(member("type")?, member("id")?))
}
