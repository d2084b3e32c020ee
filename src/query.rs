//! Query-parameter builders for `include` and sparse fieldsets.
//!
//! Pure projections of configuration; no document is involved.

use std::collections::BTreeSet;

use crate::types::{Fieldsets, IncludeTree};

/// Dot-joined path of every node in the include tree, intermediates included.
///
/// `{"author": {"articles": {}}}` gives `author` and `author.articles`.
pub fn include_args(include: &IncludeTree) -> BTreeSet<String> {
    let mut args = BTreeSet::new();
    collect_paths(include, "", &mut args);
    args
}

fn collect_paths(include: &IncludeTree, prefix: &str, args: &mut BTreeSet<String>) {
    for (name, subtree) in include.iter() {
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{}.{}", prefix, name)
        };
        collect_paths(subtree, &path, args);
        args.insert(path);
    }
}

/// One `fields[<type>]=<a>,<b>` string per configured type, names in configured order.
pub fn fields_args(fields: &Fieldsets) -> BTreeSet<String> {
    fields
        .iter()
        .map(|(type_name, names)| format!("fields[{}]={}", type_name, names.join(",")))
        .collect()
}

/// `include=...&fields[...]=...` for a request URL, or an empty string.
pub fn query_string(include: &IncludeTree, fields: &Fieldsets) -> String {
    let mut params = Vec::new();
    let includes = include_args(include);
    if !includes.is_empty() {
        let joined: Vec<&str> = includes.iter().map(String::as_str).collect();
        params.push(format!("include={}", joined.join(",")));
    }
    params.extend(fields_args(fields));
    params.join("&")
}
