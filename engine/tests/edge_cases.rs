//! Edge case tests for quill-engine
//!
//! These tests cover boundary conditions and unusual inputs.

use quill_engine::{
    content::is_blank, dirty_fields, ContentBuffer, Editor, EditorConfig, Error, FormSnapshot,
    FormValues, ProductContent, ProductField, ProductRecord,
};
use serde_json::{json, Map, Value};

fn content(value: Value) -> ProductContent {
    ProductContent::from_value(value).unwrap()
}

// ============================================================================
// String Edge Cases
// ============================================================================

#[test]
fn unicode_titles_roundtrip_through_content() {
    let titles = vec![
        "日本語のマグカップ",
        "Кружка ручной работы",
        "كوب خزفي",
        "🍵☕",
        "Tab\tand\nnewline",
    ];
    for title in titles {
        let record = ProductRecord::new("p-1", content(json!({"title": title})));
        let values = FormValues::project(&record);
        let back = values.to_content(&record.working_content);
        assert_eq!(back.get("title"), Some(&json!(title)));
        assert_eq!(FormValues::project(&ProductRecord::new("p-1", back)), values);
    }
}

#[test]
fn whitespace_only_is_blank() {
    assert!(is_blank(&json!("   \n\t")));
    assert!(is_blank(&json!("<p><br></p>")));
    assert!(!is_blank(&json!("<p>x</p>")));
    assert!(!is_blank(&json!(0)));
    assert!(!is_blank(&json!(false)));
}

#[test]
fn very_long_description() {
    let long = format!("<p>{}</p>", "stoneware ".repeat(50_000));
    let snapshot = content(json!({"description": long}));
    let mut working = snapshot.clone();
    assert!(dirty_fields(&working, &snapshot, 0).is_empty());

    working.set("description", json!(format!("{long}!")));
    assert_eq!(dirty_fields(&working, &snapshot, 0), vec!["description"]);
}

// ============================================================================
// Numeric Edge Cases
// ============================================================================

#[test]
fn price_representations_compare_by_value() {
    let cases = [
        (json!("12"), json!(12)),
        (json!("12.0"), json!(12.0)),
        (json!(" 12.50 "), json!(12.5)),
    ];
    for (a, b) in cases {
        let working = content(json!({ "regular_price": a }));
        let snapshot = content(json!({ "regular_price": b }));
        assert!(dirty_fields(&working, &snapshot, 0).is_empty(), "{a} vs {b}");
    }
}

#[test]
fn non_numeric_price_strings_compare_as_text() {
    let working = content(json!({"regular_price": "twelve"}));
    let snapshot = content(json!({"regular_price": 12}));
    assert_eq!(dirty_fields(&working, &snapshot, 0), vec!["regular_price"]);
}

#[test]
fn negative_price_fails_validation() {
    let mut editor = Editor::new(EditorConfig::default());
    editor
        .load(ProductRecord::new("p-1", content(json!({"title": "Mug"}))), None, 0)
        .unwrap();
    editor.set_value("regularPrice", json!("-1"), 10).unwrap();

    match editor.begin_save(10) {
        Err(Error::Validation(errors)) => {
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].field, "regularPrice");
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

// ============================================================================
// Structure Edge Cases
// ============================================================================

#[test]
fn deeply_nested_unknown_keys_are_tracked() {
    let mut nested = json!("leaf");
    for i in 0..64 {
        let mut level = Map::new();
        level.insert(format!("level_{i}"), nested);
        nested = Value::Object(level);
    }
    let snapshot = content(json!({"meta_data": nested}));
    let mut working = snapshot.clone();
    assert!(dirty_fields(&working, &snapshot, 0).is_empty());

    working.set("meta_data", json!({}));
    assert_eq!(dirty_fields(&working, &snapshot, 0), vec!["meta_data"]);
}

#[test]
fn images_without_ids_pair_by_position() {
    let snapshot = content(json!({"images": [{"src": "a.png"}, {"src": "b.png"}]}));
    let swapped = content(json!({"images": [{"src": "b.png"}, {"src": "a.png"}]}));
    assert_eq!(dirty_fields(&swapped, &snapshot, 0), vec!["images"]);
}

#[test]
fn empty_containers_are_blank() {
    let working = content(json!({"tags": [], "seo": {"title": "", "description": null}}));
    let snapshot = content(json!({}));
    assert!(dirty_fields(&working, &snapshot, 0).is_empty());
}

#[test]
fn non_object_content_rejected() {
    assert!(matches!(
        ProductContent::from_value(json!(["title"])),
        Err(Error::InvalidContent(_))
    ));
}

#[test]
fn legacy_meta_fills_missing_seo() {
    let mut legacy = Map::new();
    legacy.insert("_seo_description".into(), json!("From legacy"));
    let record =
        ProductRecord::new("p-1", content(json!({"title": "Mug"}))).with_legacy_meta(legacy);

    let mut editor = Editor::new(EditorConfig::default());
    editor.load(record, None, 0).unwrap();
    assert_eq!(
        editor.values().field(ProductField::MetaDescription),
        Some(&json!("From legacy"))
    );
    // Projected legacy values are not edits
    assert!(editor.dirty_fields().is_empty());
}

// ============================================================================
// Snapshot Edge Cases
// ============================================================================

#[test]
fn snapshot_with_unknown_keys_still_restores() {
    let snapshot = FormSnapshot::from_value(json!({
        "formatVersion": 1,
        "values": {"title": "Old", "retiredField": true}
    }))
    .unwrap();

    let mut editor = Editor::new(EditorConfig::default());
    editor
        .load(ProductRecord::new("p-1", content(json!({"title": "Mug"}))), None, 0)
        .unwrap();
    editor.restore_version(snapshot.values, 100).unwrap();
    editor.finish_restore(116);

    assert_eq!(editor.values().get("title"), Some(&json!("Old")));
    // Keys outside the field table never reach content
    assert!(editor.working_content().get("retiredField").is_none());
}

#[test]
fn stale_buffer_dirty_list_is_not_trusted() {
    let mut buffer = ContentBuffer::new(
        "p-1",
        content(json!({"title": "Mug"})),
        content(json!({"title": "Mug"})),
    );
    buffer.dirty_fields_content = vec!["title".into(), "sku".into()];

    assert!(!buffer.is_consistent());
    assert!(buffer.verified_dirty_fields().is_empty());
}
