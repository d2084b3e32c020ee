//! JSON:API document validation
//!
//! Checks documents in the JSON:API envelope (`data`, `included`,
//! `relationships`, `attributes`, `links`) against a caller-supplied type
//! schema, resolves relationship references through the document's
//! resources, and returns a normalized copy with attributes and resolved
//! relationships merged onto each resource object.
//!
//! # Example
//!
//! ```
//! use jsonapi_validate::{Engine, Field, IncludeTree, Top, TypeSchema};
//! use serde_json::json;
//!
//! let schema = TypeSchema::new()
//!     .with_type("articles", [
//!         ("title", Field::string()),
//!         ("author", Field::to_one("people")),
//!     ])
//!     .with_type("people", [("name", Field::string())]);
//!
//! let engine = Engine::new(Top::many(["articles"]), schema)
//!     .include(IncludeTree::from_paths(["author"]));
//!
//! let doc = json!({
//!     "data": [{
//!         "type": "articles",
//!         "id": "1",
//!         "attributes": { "title": "JSON:API paints my bikeshed!" },
//!         "relationships": {
//!             "author": { "data": { "type": "people", "id": "9" } }
//!         }
//!     }],
//!     "included": [{
//!         "type": "people",
//!         "id": "9",
//!         "attributes": { "name": "Dan" }
//!     }]
//! });
//!
//! let normalized = engine.validate(&doc).unwrap();
//! let article = &normalized["data"][0];
//! assert_eq!(article["title"], "JSON:API paints my bikeshed!");
//! assert_eq!(article["author"]["data"]["name"], "Dan");
//! assert_eq!(engine.query_string(), "include=author");
//! ```
//!
//! # Normalized resources
//!
//! | Member | Content |
//! |--------|---------|
//! | `type`, `id`, `links`, `meta` | copied from the input |
//! | `<attribute>` | validated value of each active attribute |
//! | `<relationship>` | relationship object with `data` replaced by resolved resources |
//! | `.attributes`, `.relationships` | the raw input objects |
//!
//! A relationship without `data` keeps only its other members (usually
//! `links`); `data: null` stays `null`. Fields filtered out by a sparse
//! fieldset are neither validated nor emitted.

mod engine;
mod error;
mod index;
mod linter;
mod loader;
mod query;
mod schema;
mod types;

pub use engine::{Engine, DEFAULT_MAX_DEPTH};
pub use error::{DefinitionError, LoadError, ValidationError};
pub use index::{resource_key, IndexedResource, ResourceIndex};
pub use linter::{lint, lint_file, Diagnostic, FileResult, FileStatus, LintResult, Severity};
pub use loader::{
    check_definition, definition_schema, load_document, load_document_str, load_type_schema,
    parse_fields_args, parse_include_arg, parse_type_schema,
};
pub use query::{fields_args, include_args, query_string};
pub use schema::{CheckFn, Field, ResourceType, Scalar, TypeSchema, SCALAR_KINDS};
pub use types::{json_type_name, Fieldsets, IncludeTree, ResourceKey, Top};
