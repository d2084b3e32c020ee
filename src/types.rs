//! Configuration types shared by the engine and the query builders.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Shape constraint on a document's primary data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Top {
    /// Primary data is a single resource of exactly this type.
    One(String),
    /// Primary data is a list; every element has one of these types.
    Many(Vec<String>),
}

impl Top {
    /// Single-resource document of the given type.
    pub fn one(type_name: impl Into<String>) -> Self {
        Top::One(type_name.into())
    }

    /// Collection document whose elements may be any of the given types.
    pub fn many<I, S>(type_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Top::Many(type_names.into_iter().map(Into::into).collect())
    }

    /// Returns true if a resource of `type_name` is allowed as primary data.
    pub fn allows(&self, type_name: &str) -> bool {
        match self {
            Top::One(expected) => expected == type_name,
            Top::Many(allowed) => allowed.iter().any(|t| t == type_name),
        }
    }

    /// Human-readable description of the allowed types.
    pub fn describe_types(&self) -> String {
        match self {
            Top::One(expected) => format!("\"{}\"", expected),
            Top::Many(allowed) => {
                let quoted: Vec<String> = allowed.iter().map(|t| format!("\"{}\"", t)).collect();
                format!("one of [{}]", quoted.join(", "))
            }
        }
    }
}

/// Relationships that must be present with data, nested by relationship name.
///
/// `{"author": {"articles": {}}, "comments": {}}` requires `author` and
/// `comments` on the primary resources and `articles` on each author.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IncludeTree(BTreeMap<String, IncludeTree>);

/// Shared empty subtree for relationships the include tree does not name.
pub(crate) static EMPTY_INCLUDE: IncludeTree = IncludeTree(BTreeMap::new());

impl IncludeTree {
    /// Empty tree: no required includes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a relationship with its own nested requirements.
    pub fn with(mut self, relationship: impl Into<String>, subtree: IncludeTree) -> Self {
        self.0.insert(relationship.into(), subtree);
        self
    }

    /// Build a tree from dot-joined paths such as `"author.articles"`.
    ///
    /// Empty segments are ignored, so `"author..articles"` equals `"author.articles"`.
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut root = IncludeTree::new();
        for path in paths {
            let mut node = &mut root;
            for segment in path.as_ref().split('.').filter(|s| !s.is_empty()) {
                node = node.0.entry(segment.to_string()).or_default();
            }
        }
        root
    }

    /// Nested requirements for a relationship, if it is named here.
    pub fn get(&self, relationship: &str) -> Option<&IncludeTree> {
        self.0.get(relationship)
    }

    /// Nested requirements for a relationship, or the empty tree.
    pub fn subtree(&self, relationship: &str) -> &IncludeTree {
        self.0.get(relationship).unwrap_or(&EMPTY_INCLUDE)
    }

    pub fn contains(&self, relationship: &str) -> bool {
        self.0.contains_key(relationship)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &IncludeTree)> {
        self.0.iter()
    }
}

/// Sparse fieldsets: per-type allow-lists of field names, in configured order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fieldsets(BTreeMap<String, Vec<String>>);

impl Fieldsets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict `type_name` to the given fields. Replaces any previous list.
    pub fn with<I, S>(mut self, type_name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0
            .insert(type_name.into(), fields.into_iter().map(Into::into).collect());
        self
    }

    /// Allow-list for a type, if one is configured.
    pub fn get(&self, type_name: &str) -> Option<&[String]> {
        self.0.get(type_name).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }
}

/// Identity of a resource within one document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    pub type_name: String,
    pub id: String,
}

impl ResourceKey {
    pub fn new(type_name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.type_name, self.id)
    }
}
