//! Validation engine - checks a document against a type schema and
//! returns it with relationships resolved and attributes merged in.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::error::ValidationError;
use crate::index::{resource_key, ResourceIndex};
use crate::query;
use crate::schema::{Field, ResourceType, TypeSchema};
use crate::types::{json_type_name, Fieldsets, IncludeTree, ResourceKey, Top};

/// Default limit on nested relationship resolution.
///
/// Each level costs several stack frames; this stays well inside a 2 MiB
/// thread stack in unoptimized builds.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Validator for documents of one shape against one schema.
///
/// Built once and reused; `validate` keeps no state between calls.
///
/// ```
/// use jsonapi_validate::{Engine, Field, Top, TypeSchema};
/// use serde_json::json;
///
/// let schema = TypeSchema::new().with_type("people", [("name", Field::string())]);
/// let engine = Engine::new(Top::one("people"), schema);
///
/// let doc = json!({"data": {"type": "people", "id": "9", "attributes": {"name": "Dan"}}});
/// let normalized = engine.validate(&doc).unwrap();
/// assert_eq!(normalized["data"]["name"], "Dan");
/// ```
#[derive(Debug, Clone)]
pub struct Engine {
    top: Top,
    schema: TypeSchema,
    include: IncludeTree,
    fields: Fieldsets,
    lenient_references: bool,
    max_depth: usize,
}

impl Engine {
    /// Create an engine with no required includes and no sparse fieldsets.
    pub fn new(top: Top, schema: TypeSchema) -> Self {
        Self {
            top,
            schema,
            include: IncludeTree::new(),
            fields: Fieldsets::new(),
            lenient_references: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Relationships that must carry resolvable data.
    pub fn include(mut self, include: IncludeTree) -> Self {
        self.include = include;
        self
    }

    /// Per-type allow-lists of fields to validate and emit.
    pub fn fields(mut self, fields: Fieldsets) -> Self {
        self.fields = fields;
        self
    }

    /// Keep references that are outside the include tree and missing from
    /// the document as bare resource identifiers instead of failing.
    pub fn lenient_references(mut self, lenient: bool) -> Self {
        self.lenient_references = lenient;
        self
    }

    /// Limit on nested relationship resolution.
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn top(&self) -> &Top {
        &self.top
    }

    pub fn schema(&self) -> &TypeSchema {
        &self.schema
    }

    pub fn include_tree(&self) -> &IncludeTree {
        &self.include
    }

    pub fn fieldsets(&self) -> &Fieldsets {
        &self.fields
    }

    /// `include=` values for the configured include tree.
    pub fn include_args(&self) -> BTreeSet<String> {
        query::include_args(&self.include)
    }

    /// `fields[...]=` parameters for the configured fieldsets.
    pub fn fields_args(&self) -> BTreeSet<String> {
        query::fields_args(&self.fields)
    }

    /// Full query string for the configured include tree and fieldsets.
    pub fn query_string(&self) -> String {
        query::query_string(&self.include, &self.fields)
    }

    /// Validate a document and return its normalized form.
    ///
    /// Every resource object in `data` gains its attributes and resolved
    /// relationships as top-level members; the raw `attributes` and
    /// `relationships` objects move to `.attributes` and `.relationships`.
    /// Other document members (`links`, `meta`, `included`) are copied as-is.
    ///
    /// # Errors
    ///
    /// Returns the first `ValidationError` found. No partial result is produced.
    pub fn validate(&self, document: &Value) -> Result<Value, ValidationError> {
        let Some(map) = document.as_object() else {
            return Err(ValidationError::NotADocument {
                path: String::new(),
                actual: json_type_name(document).to_string(),
            });
        };
        let Some(data) = map.get("data") else {
            return Err(ValidationError::MissingPrimaryData {
                path: String::new(),
            });
        };

        self.check_top(data)?;
        let index = ResourceIndex::build(document, &self.schema)?;
        debug!(
            types = self.schema.len(),
            resources = index.len(),
            "validating document"
        );

        let mut walk = Walk::new(self, &index);

        let normalized = match data {
            Value::Array(items) => {
                let mut resources = Vec::with_capacity(items.len());
                for (i, node) in items.iter().enumerate() {
                    resources.push(walk.primary(node, &format!("/data/{}", i))?);
                }
                Value::Array(resources)
            }
            node => walk.primary(node, "/data")?,
        };
        debug!(normalized = walk.memo.len(), "document valid");

        let mut output = map.clone();
        output.insert("data".to_string(), normalized);
        Ok(Value::Object(output))
    }

    fn check_top(&self, data: &Value) -> Result<(), ValidationError> {
        let expected_shape = match self.top {
            Top::One(_) => "a single resource object",
            Top::Many(_) => "a list of resources",
        };
        let shape_error = || ValidationError::TopShape {
            path: "/data".to_string(),
            expected: expected_shape.to_string(),
            actual: json_type_name(data).to_string(),
        };

        match (&self.top, data) {
            (Top::One(_), Value::Object(_)) => self.check_top_type(data, "/data"),
            (Top::Many(_), Value::Array(items)) => {
                for (i, node) in items.iter().enumerate() {
                    self.check_top_type(node, &format!("/data/{}", i))?;
                }
                Ok(())
            }
            _ => Err(shape_error()),
        }
    }

    fn check_top_type(&self, node: &Value, path: &str) -> Result<(), ValidationError> {
        let key = resource_key(node, path)?;
        if self.top.allows(&key.type_name) {
            Ok(())
        } else {
            Err(ValidationError::TopType {
                path: format!("{}/type", path),
                expected: self.top.describe_types(),
                actual: key.type_name,
            })
        }
    }

    /// Fields validated and emitted for a type, in order.
    fn active_fields<'s>(
        &'s self,
        type_name: &str,
        resource_type: &'s ResourceType,
        path: &str,
    ) -> Result<Vec<(&'s str, &'s Field)>, ValidationError> {
        let Some(allowed) = self.fields.get(type_name) else {
            return Ok(resource_type.fields().collect());
        };
        allowed
            .iter()
            .map(|name| {
                resource_type
                    .field(name)
                    .map(|field| (name.as_str(), field))
                    .ok_or_else(|| ValidationError::UnknownField {
                        path: path.to_string(),
                        type_name: type_name.to_string(),
                        field: name.clone(),
                    })
            })
            .collect()
    }

    fn is_active(&self, type_name: &str, field: &str) -> bool {
        self.fields
            .get(type_name)
            .map_or(true, |allowed| allowed.iter().any(|name| name == field))
    }
}

/// Relationship `data` as found in the document.
enum Linkage<'v> {
    /// No `data` member; links only.
    Missing,
    Null,
    One(&'v Value),
    Many(&'v [Value]),
}

/// State for one `validate` call.
struct Walk<'e, 'd> {
    engine: &'e Engine,
    index: &'e ResourceIndex<'d>,
    /// Finished resources, reused when referenced again.
    memo: HashMap<ResourceKey, Value>,
    /// Resources on the current resolution path.
    resolving: HashSet<ResourceKey>,
    /// Resources whose required includes already passed for a subtree.
    /// Subtrees all borrow from the engine's include tree, so their
    /// addresses are stable for the whole call.
    checked: HashSet<(ResourceKey, *const IncludeTree)>,
}

impl<'e, 'd> Walk<'e, 'd> {
    fn new(engine: &'e Engine, index: &'e ResourceIndex<'d>) -> Self {
        Self {
            engine,
            index,
            memo: HashMap::new(),
            resolving: HashSet::new(),
            checked: HashSet::new(),
        }
    }

    fn primary(&mut self, node: &Value, path: &str) -> Result<Value, ValidationError> {
        let key = resource_key(node, path)?;
        let engine = self.engine;
        self.enter(key, node, path, &engine.include, 0)
    }

    /// Normalize a resource once, or reuse its earlier result.
    fn enter(
        &mut self,
        key: ResourceKey,
        node: &Value,
        path: &str,
        include: &IncludeTree,
        depth: usize,
    ) -> Result<Value, ValidationError> {
        if self.resolving.contains(&key) {
            trace!(resource = %key, path, "back-reference");
            self.check_includes(&key, node, path, include)?;
            return Ok(identifier(&key));
        }
        if let Some(done) = self.memo.get(&key) {
            trace!(resource = %key, path, "reusing normalized resource");
            let done = done.clone();
            self.check_includes(&key, node, path, include)?;
            return Ok(done);
        }
        if depth > self.engine.max_depth {
            return Err(ValidationError::DepthExceeded {
                path: path.to_string(),
                limit: self.engine.max_depth,
            });
        }

        self.resolving.insert(key.clone());
        let result = self.normalize(&key.type_name, node, path, include, depth);
        self.resolving.remove(&key);

        let value = result?;
        trace!(resource = %key, path, "normalized resource");
        self.checked.insert((key.clone(), include as *const IncludeTree));
        self.memo.insert(key, value.clone());
        Ok(value)
    }

    fn normalize(
        &mut self,
        type_name: &str,
        node: &Value,
        path: &str,
        include: &IncludeTree,
        depth: usize,
    ) -> Result<Value, ValidationError> {
        let engine = self.engine;
        let resource_type = lookup_type(&engine.schema, type_name, path)?;
        let map = resource_object(node, path)?;
        let attributes = member_object(map, "attributes", path)?;
        let relationships = member_object(map, "relationships", path)?;
        let active = engine.active_fields(type_name, resource_type, path)?;

        check_include_names(resource_type, type_name, include, path)?;

        if let Some(relationships) = relationships {
            for name in relationships.keys() {
                if !resource_type.field(name).is_some_and(Field::is_relationship) {
                    return Err(ValidationError::UndeclaredRelationship {
                        path: format!("{}/relationships/{}", path, name),
                        type_name: type_name.to_string(),
                        field: name.clone(),
                    });
                }
            }
        }

        let mut out = Map::new();
        for (key, value) in map {
            if key != "attributes" && key != "relationships" {
                out.insert(key.clone(), value.clone());
            }
        }
        if let Some(raw) = map.get("attributes") {
            out.insert(".attributes".to_string(), raw.clone());
        }
        if let Some(raw) = map.get("relationships") {
            out.insert(".relationships".to_string(), raw.clone());
        }

        for (name, field) in active {
            let value = match field {
                Field::Scalar(scalar) => {
                    let Some(raw) = attributes.and_then(|a| a.get(name)) else {
                        return Err(ValidationError::MissingAttribute {
                            path: format!("{}/attributes", path),
                            field: name.to_string(),
                        });
                    };
                    scalar
                        .check(raw)
                        .map_err(|message| ValidationError::ScalarRejected {
                            path: format!("{}/attributes/{}", path, name),
                            field: name.to_string(),
                            message,
                        })?
                }
                _ => {
                    let Some(raw) = relationships.and_then(|r| r.get(name)) else {
                        return Err(ValidationError::MissingRelationship {
                            path: format!("{}/relationships", path),
                            field: name.to_string(),
                        });
                    };
                    let rel_path = format!("{}/relationships/{}", path, name);
                    self.relationship(name, field, raw, &rel_path, include, depth)?
                }
            };
            out.insert(name.to_string(), value);
        }

        Ok(Value::Object(out))
    }

    /// Resolve one relationship object, keeping its other members.
    fn relationship(
        &mut self,
        name: &str,
        field: &Field,
        raw: &Value,
        rel_path: &str,
        include: &IncludeTree,
        depth: usize,
    ) -> Result<Value, ValidationError> {
        let rel = relationship_object(name, raw, rel_path)?;
        for target in field.targets() {
            lookup_type(&self.engine.schema, target, rel_path)?;
        }
        let required = include.contains(name);
        let subtree = include.subtree(name);

        let mut out = Map::new();
        for (key, value) in rel {
            if key != "data" {
                out.insert(key.clone(), value.clone());
            }
        }

        let data = match linkage(name, field, rel, rel_path)? {
            Linkage::Missing if required => {
                return Err(ValidationError::IncludeWithoutData {
                    path: rel_path.to_string(),
                    field: name.to_string(),
                })
            }
            Linkage::Missing => return Ok(Value::Object(out)),
            Linkage::Null => Value::Null,
            Linkage::One(reference) => {
                let ref_path = format!("{}/data", rel_path);
                self.reference(name, field, reference, &ref_path, subtree, required, depth)?
            }
            Linkage::Many(references) => {
                let mut resolved = Vec::with_capacity(references.len());
                for (i, reference) in references.iter().enumerate() {
                    let ref_path = format!("{}/data/{}", rel_path, i);
                    resolved.push(self.reference(
                        name, field, reference, &ref_path, subtree, required, depth,
                    )?);
                }
                Value::Array(resolved)
            }
        };

        out.insert("data".to_string(), data);
        Ok(Value::Object(out))
    }

    /// Resolve a resource identifier through the index.
    #[allow(clippy::too_many_arguments)]
    fn reference(
        &mut self,
        name: &str,
        field: &Field,
        reference: &Value,
        ref_path: &str,
        subtree: &IncludeTree,
        required: bool,
        depth: usize,
    ) -> Result<Value, ValidationError> {
        let key = resource_key(reference, ref_path)?;
        check_target(name, field, &key, ref_path)?;

        let index = self.index;
        match index.find(&key) {
            Some(found) => self.enter(key, found.node, found.path, subtree, depth + 1),
            None if self.engine.lenient_references && !required => {
                trace!(resource = %key, path = ref_path, "keeping unresolved reference");
                Ok(reference.clone())
            }
            None => Err(ValidationError::DanglingReference {
                path: ref_path.to_string(),
                type_name: key.type_name,
                id: key.id,
            }),
        }
    }

    /// Check that every relationship the include tree requires below `node`
    /// has data that resolves, without building output.
    ///
    /// Used for resources that are already normalized or being normalized.
    /// Terminates because each step descends into a strictly smaller subtree;
    /// a (resource, subtree) pair that passed once is not walked again.
    fn check_includes(
        &mut self,
        key: &ResourceKey,
        node: &Value,
        path: &str,
        include: &IncludeTree,
    ) -> Result<(), ValidationError> {
        if include.is_empty() {
            return Ok(());
        }
        let check = (key.clone(), include as *const IncludeTree);
        if self.checked.contains(&check) {
            return Ok(());
        }
        let type_name = key.type_name.as_str();
        let engine = self.engine;
        let index = self.index;
        let resource_type = lookup_type(&engine.schema, type_name, path)?;
        let map = resource_object(node, path)?;
        let relationships = member_object(map, "relationships", path)?;
        check_include_names(resource_type, type_name, include, path)?;

        for (name, subtree) in include.iter() {
            if !engine.is_active(type_name, name) {
                continue;
            }
            let Some(field) = resource_type.field(name) else {
                continue;
            };
            let Some(raw) = relationships.and_then(|r| r.get(name)) else {
                return Err(ValidationError::MissingRelationship {
                    path: format!("{}/relationships", path),
                    field: name.clone(),
                });
            };
            let rel_path = format!("{}/relationships/{}", path, name);
            let rel = relationship_object(name, raw, &rel_path)?;

            let references: Vec<(&Value, String)> = match linkage(name, field, rel, &rel_path)? {
                Linkage::Missing => {
                    return Err(ValidationError::IncludeWithoutData {
                        path: rel_path,
                        field: name.clone(),
                    })
                }
                Linkage::Null => Vec::new(),
                Linkage::One(reference) => vec![(reference, format!("{}/data", rel_path))],
                Linkage::Many(references) => references
                    .iter()
                    .enumerate()
                    .map(|(i, reference)| (reference, format!("{}/data/{}", rel_path, i)))
                    .collect(),
            };

            for (reference, ref_path) in references {
                let target = resource_key(reference, &ref_path)?;
                check_target(name, field, &target, &ref_path)?;
                let Some(found) = index.find(&target) else {
                    return Err(ValidationError::DanglingReference {
                        path: ref_path,
                        type_name: target.type_name,
                        id: target.id,
                    });
                };
                self.check_includes(&target, found.node, found.path, subtree)?;
            }
        }

        self.checked.insert(check);
        Ok(())
    }
}

fn identifier(key: &ResourceKey) -> Value {
    let mut map = Map::new();
    map.insert("type".to_string(), Value::String(key.type_name.clone()));
    map.insert("id".to_string(), Value::String(key.id.clone()));
    Value::Object(map)
}

fn lookup_type<'s>(
    schema: &'s TypeSchema,
    type_name: &str,
    path: &str,
) -> Result<&'s ResourceType, ValidationError> {
    schema
        .get(type_name)
        .ok_or_else(|| ValidationError::UnknownType {
            path: path.to_string(),
            type_name: type_name.to_string(),
        })
}

fn resource_object<'v>(
    node: &'v Value,
    path: &str,
) -> Result<&'v Map<String, Value>, ValidationError> {
    node.as_object()
        .ok_or_else(|| ValidationError::MalformedResource {
            path: path.to_string(),
            message: format!("expected object, got {}", json_type_name(node)),
        })
}

/// An optional member that must be an object when present.
fn member_object<'v>(
    map: &'v Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<Option<&'v Map<String, Value>>, ValidationError> {
    match map.get(key) {
        None => Ok(None),
        Some(Value::Object(inner)) => Ok(Some(inner)),
        Some(other) => Err(ValidationError::MalformedResource {
            path: format!("{}/{}", path, key),
            message: format!("{} must be an object, got {}", key, json_type_name(other)),
        }),
    }
}

fn relationship_object<'v>(
    name: &str,
    raw: &'v Value,
    rel_path: &str,
) -> Result<&'v Map<String, Value>, ValidationError> {
    raw.as_object()
        .ok_or_else(|| ValidationError::RelationshipShape {
            path: rel_path.to_string(),
            field: name.to_string(),
            message: format!("must be an object, got {}", json_type_name(raw)),
        })
}

/// Read a relationship's `data` member, checking it matches the field's cardinality.
fn linkage<'v>(
    name: &str,
    field: &Field,
    rel: &'v Map<String, Value>,
    rel_path: &str,
) -> Result<Linkage<'v>, ValidationError> {
    let shape_error = |message: String| ValidationError::RelationshipShape {
        path: format!("{}/data", rel_path),
        field: name.to_string(),
        message,
    };

    match (field, rel.get("data")) {
        (_, None) => Ok(Linkage::Missing),
        (_, Some(Value::Null)) => Ok(Linkage::Null),
        (Field::ToOne(_), Some(reference @ Value::Object(_))) => Ok(Linkage::One(reference)),
        (Field::ToMany(_), Some(Value::Array(references))) => Ok(Linkage::Many(references)),
        (Field::ToOne(_), Some(Value::Array(_))) => {
            Err(shape_error("is to-one but data is an array".to_string()))
        }
        (Field::ToMany(_), Some(Value::Object(_))) => {
            Err(shape_error("is to-many but data is an object".to_string()))
        }
        (_, Some(other)) => Err(shape_error(format!(
            "data must be an object, array or null, got {}",
            json_type_name(other)
        ))),
    }
}

fn check_target(
    name: &str,
    field: &Field,
    key: &ResourceKey,
    ref_path: &str,
) -> Result<(), ValidationError> {
    let targets = field.targets();
    if targets.iter().any(|t| *t == key.type_name) {
        return Ok(());
    }
    let quoted: Vec<String> = targets.iter().map(|t| format!("\"{}\"", t)).collect();
    Err(ValidationError::TargetTypeMismatch {
        path: format!("{}/type", ref_path),
        field: name.to_string(),
        expected: quoted.join(" or "),
        actual: key.type_name.clone(),
    })
}

/// Every include-tree key at this level must name a declared relationship.
fn check_include_names(
    resource_type: &ResourceType,
    type_name: &str,
    include: &IncludeTree,
    path: &str,
) -> Result<(), ValidationError> {
    for (name, _) in include.iter() {
        let message = match resource_type.field(name) {
            Some(field) if field.is_relationship() => continue,
            Some(_) => "field is an attribute, not a relationship",
            None => "no such relationship",
        };
        return Err(ValidationError::InvalidInclude {
            path: path.to_string(),
            type_name: type_name.to_string(),
            field: name.clone(),
            message: message.to_string(),
        });
    }
    Ok(())
}
