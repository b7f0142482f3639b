//! Fingerprints and structural document comparison.
//!
//! Opaque text is compared by SHA-256 fingerprint. JSON and API-spec
//! documents are deep-diffed into a [`ChangeSet`]; arrays are compared as
//! multisets, so reordering alone is never a change.

use apiwatch_core::{ChangeCategories, ChangeSet, DiffEntry, DiffKind, DocPath, PathSegment};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashSet;

// ============================================================================
// Fingerprints
// ============================================================================

/// SHA-256 of `text`, hex encoded.
pub fn fingerprint(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// Returns true if the two texts differ.
pub fn compare_opaque_text(old: &str, new: &str) -> bool {
    fingerprint(old) != fingerprint(new)
}

// ============================================================================
// Structural Diff
// ============================================================================

/// Paths ignored when comparing API specs: the version string and the server
/// list change on every release without affecting the contract.
pub fn api_spec_exclusions() -> Vec<DocPath> {
    vec![
        DocPath::root().key("info").key("version"),
        DocPath::root().key("servers"),
    ]
}

/// Deep-diffs two documents, skipping `exclude` and everything below it.
pub fn compare_structured(old: &Value, new: &Value, exclude: &[DocPath]) -> ChangeSet {
    let mut differ = Differ {
        exclude,
        entries: Vec::new(),
    };
    differ.diff(old, new, &DocPath::root());
    ChangeSet::from_entries(differ.entries)
}

/// Compares two API specs and sorts the differences into categories.
pub fn compare_api_spec(old: &Value, new: &Value) -> ChangeSet {
    let mut change_set = compare_structured(old, new, &api_spec_exclusions());
    change_set.categorized = categorize(&change_set.entries);
    change_set.severity = change_set.categorized.severity();
    change_set
}

struct Differ<'a> {
    exclude: &'a [DocPath],
    entries: Vec<DiffEntry>,
}

impl Differ<'_> {
    fn is_excluded(&self, path: &DocPath) -> bool {
        self.exclude.iter().any(|prefix| path.starts_with(prefix))
    }

    fn push(&mut self, kind: DiffKind, path: DocPath, old: Option<&Value>, new: Option<&Value>) {
        if self.is_excluded(&path) {
            return;
        }
        self.entries.push(DiffEntry {
            kind,
            path,
            old_value: old.cloned(),
            new_value: new.cloned(),
        });
    }

    fn diff(&mut self, old: &Value, new: &Value, path: &DocPath) {
        if old == new || self.is_excluded(path) {
            return;
        }

        match (old, new) {
            (Value::Object(a), Value::Object(b)) => {
                for (key, old_child) in a {
                    match b.get(key) {
                        Some(new_child) => self.diff(old_child, new_child, &path.key(key)),
                        None => self.push(DiffKind::ItemRemoved, path.key(key), Some(old_child), None),
                    }
                }
                for (key, new_child) in b {
                    if !a.contains_key(key) {
                        self.push(DiffKind::ItemAdded, path.key(key), None, Some(new_child));
                    }
                }
            }
            (Value::Array(a), Value::Array(b)) => self.diff_unordered(a, b, path),
            _ if same_type(old, new) => {
                self.push(DiffKind::ValueChanged, path.clone(), Some(old), Some(new));
            }
            _ => self.push(DiffKind::TypeChanged, path.clone(), Some(old), Some(new)),
        }
    }

    fn diff_unordered(&mut self, old: &[Value], new: &[Value], path: &DocPath) {
        let old_keys: Vec<String> = old.iter().map(canonical).collect();
        let new_keys: Vec<String> = new.iter().map(canonical).collect();
        let mut matched = vec![false; new.len()];

        for (i, key) in old_keys.iter().enumerate() {
            let hit = new_keys
                .iter()
                .enumerate()
                .find(|(j, candidate)| !matched[*j] && *candidate == key)
                .map(|(j, _)| j);
            match hit {
                Some(j) => matched[j] = true,
                None => self.push(DiffKind::IterableItemRemoved, path.index(i), Some(&old[i]), None),
            }
        }

        for (j, value) in new.iter().enumerate() {
            if !matched[j] {
                self.push(DiffKind::IterableItemAdded, path.index(j), None, Some(value));
            }
        }
    }
}

fn same_type(a: &Value, b: &Value) -> bool {
    matches!(
        (a, b),
        (Value::Null, Value::Null)
            | (Value::Bool(_), Value::Bool(_))
            | (Value::Number(_), Value::Number(_))
            | (Value::String(_), Value::String(_))
    )
}

/// Order-independent rendering used to match array elements.
fn canonical(value: &Value) -> String {
    match value {
        Value::Array(items) => {
            let mut parts: Vec<String> = items.iter().map(canonical).collect();
            parts.sort();
            format!("[{}]", parts.join(","))
        }
        Value::Object(map) => {
            let mut parts: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}:{}", Value::String(k.clone()), canonical(v)))
                .collect();
            parts.sort();
            format!("{{{}}}", parts.join(","))
        }
        scalar => scalar.to_string(),
    }
}

// ============================================================================
// Categorization
// ============================================================================

fn is_schema_path(path: &DocPath) -> bool {
    match path.key_at(0) {
        Some("components") => path.key_at(1) == Some("schemas") && path.depth() >= 3,
        Some("definitions") => path.depth() >= 2,
        _ => false,
    }
}

/// Keys whose children are user-chosen names rather than schema keywords.
const NAME_MAPS: &[&str] = &["properties", "patternProperties", "definitions", "schemas"];

/// Returns true if `path` passes through a `required` keyword. A property or
/// schema that happens to be named `required` does not count.
fn touches_required(path: &DocPath) -> bool {
    let segments = path.segments();
    segments.iter().enumerate().any(|(i, segment)| {
        let PathSegment::Key(key) = segment else {
            return false;
        };
        key == "required"
            && !(i > 0 && path.key_at(i - 1).is_some_and(|parent| NAME_MAPS.contains(&parent)))
    })
}

fn categorize(entries: &[DiffEntry]) -> ChangeCategories {
    let mut categories = ChangeCategories::default();
    let mut seen_required = HashSet::new();

    for entry in entries {
        let rendered = entry.path.to_string();

        if entry.path.key_at(0) == Some("paths") {
            let endpoint_level = entry.path.depth() == 2;
            match entry.kind {
                DiffKind::ItemAdded if endpoint_level => {
                    categories.new_endpoints.push(rendered.clone());
                }
                DiffKind::ItemRemoved if endpoint_level => {
                    categories
                        .breaking_changes
                        .push(format!("Removed endpoint: {rendered}"));
                    categories.removed_endpoints.push(rendered.clone());
                }
                _ => categories.modified_endpoints.push(rendered.clone()),
            }
        } else if is_schema_path(&entry.path)
            && matches!(entry.kind, DiffKind::ItemAdded | DiffKind::ItemRemoved)
        {
            if entry.kind == DiffKind::ItemRemoved {
                categories
                    .breaking_changes
                    .push(format!("Removed schema: {rendered}"));
            }
            categories.schema_changes.push(rendered.clone());
        }

        if touches_required(&entry.path) && seen_required.insert(rendered.clone()) {
            categories
                .breaking_changes
                .push(format!("Required fields changed: {rendered}"));
        }
    }

    categories
}

#[cfg(test)]
mod tests {
    use super::*;
    use apiwatch_core::Severity;
    use serde_json::json;

    fn petstore() -> Value {
        json!({
            "openapi": "3.0.0",
            "info": {"title": "Petstore", "version": "1.0.0"},
            "servers": [{"url": "https://api.example.com/v1"}],
            "paths": {
                "/pets": {"get": {"summary": "List pets"}},
                "/pets/{id}": {"get": {"summary": "Get pet"}}
            },
            "components": {
                "schemas": {
                    "Pet": {"type": "object", "required": ["id", "name"]}
                }
            }
        })
    }

    #[test]
    fn test_fingerprint_is_sha256_hex() {
        assert_eq!(
            fingerprint("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert!(!compare_opaque_text("same", "same"));
        assert!(compare_opaque_text("same", "other"));
    }

    #[test]
    fn test_version_and_servers_are_ignored() {
        let old = petstore();
        let mut new = petstore();
        new["info"]["version"] = json!("1.1.0");
        new["servers"] = json!([{"url": "https://api.example.com/v2"}]);

        let change_set = compare_api_spec(&old, &new);
        assert!(!change_set.has_changes);
        assert!(change_set.categorized.is_empty());
        assert_eq!(change_set.severity, Severity::Minor);
    }

    #[test]
    fn test_removed_path_is_breaking() {
        let old = petstore();
        let mut new = petstore();
        new["paths"].as_object_mut().unwrap().remove("/pets/{id}");

        let change_set = compare_api_spec(&old, &new);
        assert!(change_set.has_changes);
        assert_eq!(change_set.severity, Severity::Major);
        assert_eq!(
            change_set.categorized.removed_endpoints,
            vec!["root['paths']['/pets/{id}']".to_string()]
        );
        assert!(
            change_set
                .categorized
                .breaking_changes
                .iter()
                .any(|b| b.contains("/pets/{id}"))
        );
    }

    #[test]
    fn test_added_path_is_moderate() {
        let old = petstore();
        let mut new = petstore();
        new["paths"]["/owners"] = json!({"get": {"summary": "List owners"}});

        let change_set = compare_api_spec(&old, &new);
        assert_eq!(change_set.severity, Severity::Moderate);
        assert_eq!(
            change_set.categorized.new_endpoints,
            vec!["root['paths']['/owners']".to_string()]
        );
        assert!(change_set.categorized.breaking_changes.is_empty());
    }

    #[test]
    fn test_edit_inside_endpoint_is_modification() {
        let old = petstore();
        let mut new = petstore();
        new["paths"]["/pets"]["get"]["summary"] = json!("List all pets");

        let change_set = compare_api_spec(&old, &new);
        assert_eq!(change_set.severity, Severity::Minor);
        assert_eq!(
            change_set.categorized.modified_endpoints,
            vec!["root['paths']['/pets']['get']['summary']".to_string()]
        );
        assert_eq!(change_set.entries[0].kind, DiffKind::ValueChanged);
    }

    #[test]
    fn test_schema_changes_and_required_fields() {
        let old = petstore();
        let mut new = petstore();
        new["components"]["schemas"]["Owner"] = json!({"type": "object"});
        new["components"]["schemas"]["Pet"]["required"] = json!(["id", "name", "tag"]);

        let change_set = compare_api_spec(&old, &new);
        let categories = &change_set.categorized;
        assert_eq!(
            categories.schema_changes,
            vec!["root['components']['schemas']['Owner']".to_string()]
        );
        assert_eq!(categories.breaking_changes.len(), 1);
        assert!(categories.breaking_changes[0].starts_with("Required fields changed"));
        assert_eq!(change_set.severity, Severity::Major);
    }

    #[test]
    fn test_property_named_required_is_not_a_required_change() {
        let mut old = petstore();
        old["components"]["schemas"]["Pet"]["properties"] =
            json!({"required": {"type": "boolean"}, "id": {"type": "integer"}});
        let mut new = old.clone();
        new["components"]["schemas"]["Pet"]["properties"]["required"]["type"] = json!("string");

        let change_set = compare_api_spec(&old, &new);
        assert!(change_set.has_changes);
        assert!(change_set.categorized.breaking_changes.is_empty());
        assert_eq!(change_set.severity, Severity::Minor);
    }

    #[test]
    fn test_required_keyword_below_named_property_is_breaking() {
        let mut old = petstore();
        old["components"]["schemas"]["Pet"]["properties"] = json!({
            "required": {"type": "object", "required": ["a"]}
        });
        let mut new = old.clone();
        new["components"]["schemas"]["Pet"]["properties"]["required"]["required"] = json!(["a", "b"]);

        let change_set = compare_api_spec(&old, &new);
        let breaking = &change_set.categorized.breaking_changes;
        assert_eq!(breaking.len(), 1);
        assert!(breaking[0].starts_with("Required fields changed"));
        assert_eq!(change_set.severity, Severity::Major);
    }

    #[test]
    fn test_parameter_required_flag_is_breaking() {
        let mut old = petstore();
        old["paths"]["/pets"]["get"]["parameters"] =
            json!([{"name": "limit", "in": "query", "required": false}]);
        let mut new = old.clone();
        new["paths"]["/pets"]["get"]["parameters"][0]["required"] = json!(true);

        let change_set = compare_api_spec(&old, &new);
        assert!(change_set
            .categorized
            .breaking_changes
            .iter()
            .any(|c| c.starts_with("Required fields changed")));
    }

    #[test]
    fn test_removed_schema_is_breaking() {
        let old = json!({"definitions": {"Pet": {}, "Owner": {}}});
        let new = json!({"definitions": {"Pet": {}}});

        let change_set = compare_api_spec(&old, &new);
        assert_eq!(
            change_set.categorized.breaking_changes,
            vec!["Removed schema: root['definitions']['Owner']".to_string()]
        );
    }

    #[test]
    fn test_array_order_is_ignored() {
        let old = json!({"tags": ["a", "b", {"x": [1, 2]}]});
        let new = json!({"tags": [{"x": [2, 1]}, "b", "a"]});
        assert!(!compare_structured(&old, &new, &[]).has_changes);
    }

    #[test]
    fn test_array_multiset_changes() {
        let old = json!({"tags": ["a", "a", "b"]});
        let new = json!({"tags": ["b", "a", "c"]});

        let change_set = compare_structured(&old, &new, &[]);
        let kinds: Vec<(DiffKind, String)> = change_set
            .entries
            .iter()
            .map(|e| (e.kind, e.path.to_string()))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (DiffKind::IterableItemRemoved, "root['tags'][1]".to_string()),
                (DiffKind::IterableItemAdded, "root['tags'][2]".to_string()),
            ]
        );
    }

    #[test]
    fn test_type_change() {
        let change_set = compare_structured(&json!({"a": 1}), &json!({"a": "1"}), &[]);
        assert_eq!(change_set.len(), 1);
        assert_eq!(change_set.entries[0].kind, DiffKind::TypeChanged);
        assert_eq!(change_set.entries[0].old_value, Some(json!(1)));
    }

    #[test]
    fn test_exclusion_covers_descendants() {
        let old = json!({"meta": {"generated": "mon", "nested": {"x": 1}}, "v": 1});
        let new = json!({"meta": {"generated": "tue", "nested": {"x": 2}}, "v": 1});
        let exclude = [DocPath::root().key("meta")];
        assert!(!compare_structured(&old, &new, &exclude).has_changes);
    }
}
