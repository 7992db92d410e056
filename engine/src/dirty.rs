//! Dirty-field tracking.
//!
//! Derives, from the working content and the last synchronized snapshot, the
//! top-level field paths the user changed. Pure: call it again whenever either
//! side changes.
//!
//! # Comparison rules
//!
//! - Blank values (`null`, missing, `""`, `[]`, empty rich text) are equal
//! - Taxonomy and linked-product lists compare as multisets
//! - Images and attributes compare element-wise, paired by identity key
//! - Numbers and numeric strings compare by value (`"12"` equals `12.0`)
//! - Everything else compares structurally

use crate::{content::is_blank, schema::numeric_value, ContentPath, ProductContent};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Synthetic path reported when sub-records (variations) are dirty.
pub const VARIATIONS_PATH: &str = "variations";

/// How two values under a top-level key are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// Structural comparison with blank equivalence
    Deep,
    /// Order-insensitive multiset of primitives (or of `name`/`id` identities)
    UnorderedSet,
    /// Records paired by the given identity key, then compared structurally
    Keyed(&'static str),
}

/// The comparison used for a top-level content key.
pub fn comparison_for(key: &str) -> Comparison {
    match key {
        "categories" | "tags" | "upsell_ids" | "cross_sell_ids" => Comparison::UnorderedSet,
        "images" => Comparison::Keyed("id"),
        "attributes" => Comparison::Keyed("name"),
        _ => Comparison::Deep,
    }
}

/// Whether two values stored under `key` are equivalent.
pub fn values_equivalent(key: &str, a: Option<&Value>, b: Option<&Value>) -> bool {
    let a_blank = a.map_or(true, is_blank);
    let b_blank = b.map_or(true, is_blank);
    match (a, b) {
        _ if a_blank && b_blank => true,
        (Some(a), Some(b)) if !a_blank && !b_blank => match comparison_for(key) {
            Comparison::Deep => deep_equal(a, b),
            Comparison::UnorderedSet => set_equal(a, b),
            Comparison::Keyed(identity) => keyed_equal(a, b, identity),
        },
        _ => false,
    }
}

/// Top-level paths whose values differ between `working` and `snapshot`.
///
/// When `dirty_sub_records` is non-zero, [`VARIATIONS_PATH`] is appended.
pub fn dirty_fields(
    working: &ProductContent,
    snapshot: &ProductContent,
    dirty_sub_records: usize,
) -> Vec<ContentPath> {
    let keys: BTreeSet<&String> = working.keys().chain(snapshot.keys()).collect();

    let mut dirty: Vec<ContentPath> = keys
        .into_iter()
        .filter(|key| !values_equivalent(key, working.get(key), snapshot.get(key)))
        .cloned()
        .collect();

    if dirty_sub_records > 0 && !dirty.iter().any(|p| p == VARIATIONS_PATH) {
        dirty.push(VARIATIONS_PATH.to_string());
    }
    dirty
}

fn deep_equal(a: &Value, b: &Value) -> bool {
    if is_blank(a) && is_blank(b) {
        return true;
    }
    match (a, b) {
        (Value::Object(a), Value::Object(b)) => {
            let keys: BTreeSet<&String> = a.keys().chain(b.keys()).collect();
            keys.into_iter().all(|k| match (a.get(k), b.get(k)) {
                (Some(x), Some(y)) => deep_equal(x, y),
                (Some(v), None) | (None, Some(v)) => is_blank(v),
                (None, None) => true,
            })
        }
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| deep_equal(x, y))
        }
        (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) => {
            match (numeric_value(a), numeric_value(b)) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            }
        }
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Identity of a set member: its `name` or `id`, else its JSON text.
fn set_member(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("name")
            .or_else(|| map.get("id"))
            .map(set_member)
            .unwrap_or_else(|| value.to_string()),
        other => other.to_string(),
    }
}

fn set_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Array(a), Value::Array(b)) => {
            let mut a: Vec<String> = a.iter().map(set_member).collect();
            let mut b: Vec<String> = b.iter().map(set_member).collect();
            a.sort();
            b.sort();
            a == b
        }
        _ => deep_equal(a, b),
    }
}

/// Group records by identity. Records sharing an identity stay together.
fn keyed_records<'a>(
    items: &'a [Value],
    identity: &str,
) -> BTreeMap<String, Vec<&'a Value>> {
    let mut groups: BTreeMap<String, Vec<&'a Value>> = BTreeMap::new();
    for (index, item) in items.iter().enumerate() {
        let key = item
            .get(identity)
            .filter(|v| !v.is_null())
            .map(set_member)
            .unwrap_or_else(|| format!("#{index}"));
        groups.entry(key).or_default().push(item);
    }
    groups
}

/// Multiset equality of two record groups under `deep_equal`.
fn group_equal(a: &[&Value], b: &[&Value]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut matched = vec![false; b.len()];
    a.iter().all(|x| {
        let found = b
            .iter()
            .enumerate()
            .find(|(i, y)| !matched[*i] && deep_equal(x, y))
            .map(|(i, _)| i);
        match found {
            Some(i) => {
                matched[i] = true;
                true
            }
            None => false,
        }
    })
}

fn keyed_equal(a: &Value, b: &Value, identity: &str) -> bool {
    match (a, b) {
        (Value::Array(a), Value::Array(b)) => {
            if a.len() != b.len() {
                return false;
            }
            let a = keyed_records(a, identity);
            let b = keyed_records(b, identity);
            a.len() == b.len()
                && a.iter()
                    .all(|(key, x)| b.get(key).is_some_and(|y| group_equal(x, y)))
        }
        _ => deep_equal(a, b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn content(value: Value) -> ProductContent {
        ProductContent::from_value(value).unwrap()
    }

    #[test]
    fn duplicate_image_ids_are_compared_as_multiset() {
        let snapshot = content(json!({"images": [
            {"id": 1, "alt": "front"},
            {"id": 1, "alt": "back"}
        ]}));
        let edited = content(json!({"images": [
            {"id": 1, "alt": "back"},
            {"id": 1, "alt": "back"}
        ]}));
        let reordered = content(json!({"images": [
            {"id": 1, "alt": "back"},
            {"id": 1, "alt": "front"}
        ]}));

        assert_eq!(dirty_fields(&edited, &snapshot, 0), vec!["images"]);
        assert!(dirty_fields(&reordered, &snapshot, 0).is_empty());
    }

    #[test]
    fn identical_content_is_clean() {
        let c = content(json!({"title": "Mug", "seo": {"title": "Mug"}}));
        assert!(dirty_fields(&c, &c, 0).is_empty());
    }

    #[test]
    fn changed_scalar_is_dirty() {
        let working = content(json!({"title": "Big mug", "sku": "M-1"}));
        let snapshot = content(json!({"title": "Mug", "sku": "M-1"}));
        assert_eq!(dirty_fields(&working, &snapshot, 0), vec!["title"]);
    }

    #[test]
    fn nested_change_reports_top_level_key() {
        let working = content(json!({"seo": {"title": "New", "description": "D"}}));
        let snapshot = content(json!({"seo": {"title": "Old", "description": "D"}}));
        assert_eq!(dirty_fields(&working, &snapshot, 0), vec!["seo"]);
    }

    #[test]
    fn blank_values_are_equivalent() {
        let working = content(json!({"description": "<p></p>", "sale_price": "", "tags": []}));
        let snapshot = content(json!({"description": null}));
        assert!(dirty_fields(&working, &snapshot, 0).is_empty());
    }

    #[test]
    fn category_order_is_ignored() {
        let working = content(json!({"categories": ["Kitchen", "Mugs"]}));
        let snapshot = content(json!({"categories": ["Mugs", "Kitchen"]}));
        assert!(dirty_fields(&working, &snapshot, 0).is_empty());

        let working = content(json!({"categories": [{"id": 2, "name": "Mugs"}, {"id": 1, "name": "Kitchen"}]}));
        let snapshot = content(json!({"categories": [{"id": 1, "name": "Kitchen"}, {"id": 2, "name": "Mugs"}]}));
        assert!(dirty_fields(&working, &snapshot, 0).is_empty());
    }

    #[test]
    fn category_multiplicity_matters() {
        let working = content(json!({"tags": ["a", "a"]}));
        let snapshot = content(json!({"tags": ["a"]}));
        assert_eq!(dirty_fields(&working, &snapshot, 0), vec!["tags"]);
    }

    #[test]
    fn images_paired_by_id() {
        let snapshot = content(json!({"images": [
            {"id": 1, "src": "a.png", "alt": ""},
            {"id": 2, "src": "b.png", "alt": "B"}
        ]}));
        let reordered = content(json!({"images": [
            {"id": 2, "src": "b.png", "alt": "B"},
            {"id": 1, "src": "a.png"}
        ]}));
        assert!(dirty_fields(&reordered, &snapshot, 0).is_empty());

        let edited = content(json!({"images": [
            {"id": 1, "src": "a.png", "alt": "New alt"},
            {"id": 2, "src": "b.png", "alt": "B"}
        ]}));
        assert_eq!(dirty_fields(&edited, &snapshot, 0), vec!["images"]);
    }

    #[test]
    fn numeric_strings_match_numbers() {
        let working = content(json!({"regular_price": "12.00"}));
        let snapshot = content(json!({"regular_price": 12}));
        assert!(dirty_fields(&working, &snapshot, 0).is_empty());
    }

    #[test]
    fn removed_field_is_dirty() {
        let working = content(json!({}));
        let snapshot = content(json!({"sku": "M-1"}));
        assert_eq!(dirty_fields(&working, &snapshot, 0), vec!["sku"]);
    }

    #[test]
    fn sub_records_add_synthetic_path() {
        let c = content(json!({"title": "Mug"}));
        assert_eq!(dirty_fields(&c, &c, 3), vec![VARIATIONS_PATH]);

        let working = content(json!({"title": "Cup"}));
        assert_eq!(
            dirty_fields(&working, &c, 1),
            vec!["title".to_string(), VARIATIONS_PATH.to_string()]
        );
    }

    #[test]
    fn comparison_table() {
        assert_eq!(comparison_for("tags"), Comparison::UnorderedSet);
        assert_eq!(comparison_for("images"), Comparison::Keyed("id"));
        assert_eq!(comparison_for("attributes"), Comparison::Keyed("name"));
        assert_eq!(comparison_for("title"), Comparison::Deep);
    }
}
