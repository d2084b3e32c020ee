//! Type schema: resource types, their fields, and scalar validators.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::types::json_type_name;

/// Validator body: accept a raw attribute value (possibly transformed) or reject it.
pub type CheckFn = dyn Fn(&Value) -> Result<Value, String> + Send + Sync;

/// Scalar kinds accepted in schema-definition files.
pub const SCALAR_KINDS: &[&str] = &[
    "string", "integer", "number", "boolean", "object", "array", "any",
];

fn is_integer(value: &Value) -> bool {
    value.is_i64() || value.is_u64()
}

fn is_anything(_: &Value) -> bool {
    true
}

const BUILTIN_KINDS: &[(&str, fn(&Value) -> bool)] = &[
    ("string", Value::is_string),
    ("integer", is_integer),
    ("number", Value::is_number),
    ("boolean", Value::is_boolean),
    ("object", Value::is_object),
    ("array", Value::is_array),
    ("any", is_anything),
];

/// A named, pluggable attribute validator.
#[derive(Clone)]
pub struct Scalar {
    name: String,
    check: Arc<CheckFn>,
}

impl Scalar {
    pub fn new<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            check: Arc::new(check),
        }
    }

    /// Built-in validator for a JSON kind (see [`SCALAR_KINDS`]).
    pub fn kind(kind: &str) -> Option<Self> {
        BUILTIN_KINDS
            .iter()
            .find(|(name, _)| *name == kind)
            .map(|(name, accepts)| Self::predicate(name, *accepts))
    }

    fn predicate(kind: &str, accepts: fn(&Value) -> bool) -> Self {
        let expected = kind.to_string();
        Self::new(kind, move |value| {
            if accepts(value) {
                Ok(value.clone())
            } else {
                Err(format!("expected {}, got {}", expected, json_type_name(value)))
            }
        })
    }

    /// Wrap this validator so that `null` is accepted as-is.
    pub fn nullable(self) -> Self {
        let inner = self.check;
        Self {
            name: format!("{}?", self.name),
            check: Arc::new(move |value: &Value| {
                if value.is_null() {
                    Ok(Value::Null)
                } else {
                    inner(value)
                }
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the validator against a raw value.
    pub fn check(&self, value: &Value) -> Result<Value, String> {
        (self.check)(value)
    }
}

impl fmt::Debug for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Scalar").field(&self.name).finish()
    }
}

/// Field descriptor: an attribute or a relationship.
#[derive(Debug, Clone)]
pub enum Field {
    /// Attribute checked by a validator.
    Scalar(Scalar),
    /// Relationship to a single resource of the named type.
    ToOne(String),
    /// Relationship to a list of resources, each of one of the named types.
    ToMany(Vec<String>),
}

impl Field {
    pub fn string() -> Self {
        Field::Scalar(Scalar::predicate("string", Value::is_string))
    }

    pub fn integer() -> Self {
        Field::Scalar(Scalar::predicate("integer", is_integer))
    }

    pub fn number() -> Self {
        Field::Scalar(Scalar::predicate("number", Value::is_number))
    }

    pub fn boolean() -> Self {
        Field::Scalar(Scalar::predicate("boolean", Value::is_boolean))
    }

    pub fn object() -> Self {
        Field::Scalar(Scalar::predicate("object", Value::is_object))
    }

    pub fn array() -> Self {
        Field::Scalar(Scalar::predicate("array", Value::is_array))
    }

    pub fn any() -> Self {
        Field::Scalar(Scalar::predicate("any", is_anything))
    }

    /// Attribute with a custom validator.
    pub fn scalar<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        Field::Scalar(Scalar::new(name, check))
    }

    pub fn to_one(type_name: impl Into<String>) -> Self {
        Field::ToOne(type_name.into())
    }

    pub fn to_many<I, S>(type_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Field::ToMany(type_names.into_iter().map(Into::into).collect())
    }

    /// Accept `null` for a scalar field. Relationships are returned unchanged;
    /// they already accept `data: null`.
    pub fn nullable(self) -> Self {
        match self {
            Field::Scalar(scalar) => Field::Scalar(scalar.nullable()),
            other => other,
        }
    }

    pub fn is_relationship(&self) -> bool {
        !matches!(self, Field::Scalar(_))
    }

    /// Allowed target types of a relationship; empty for scalars.
    pub fn targets(&self) -> &[String] {
        match self {
            Field::Scalar(_) => &[],
            Field::ToOne(target) => std::slice::from_ref(target),
            Field::ToMany(targets) => targets,
        }
    }
}

/// Fields of one resource type, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct ResourceType {
    fields: Vec<(String, Field)>,
}

impl ResourceType {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a field. Redeclaring a name replaces the earlier descriptor in place.
    pub fn with(mut self, name: impl Into<String>, field: Field) -> Self {
        self.insert(name, field);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, field: Field) {
        let name = name.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = field,
            None => self.fields.push((name, field)),
        }
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, f)| f)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(n, f)| (n.as_str(), f))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, Field)> for ResourceType {
    fn from_iter<I: IntoIterator<Item = (S, Field)>>(iter: I) -> Self {
        let mut resource = ResourceType::new();
        for (name, field) in iter {
            resource.insert(name, field);
        }
        resource
    }
}

/// Mapping from resource-type name to its declared fields.
///
/// Relationship targets are not checked here; the engine checks them
/// when a relationship is encountered in a document.
#[derive(Debug, Clone, Default)]
pub struct TypeSchema {
    types: BTreeMap<String, ResourceType>,
}

impl TypeSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a type from `(field name, descriptor)` pairs.
    pub fn with_type<I, S>(mut self, name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = (S, Field)>,
        S: Into<String>,
    {
        self.insert(name, fields.into_iter().collect());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, resource: ResourceType) {
        self.types.insert(name.into(), resource);
    }

    pub fn get(&self, type_name: &str) -> Option<&ResourceType> {
        self.types.get(type_name)
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    pub fn types(&self) -> impl Iterator<Item = (&str, &ResourceType)> {
        self.types.iter().map(|(n, t)| (n.as_str(), t))
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
