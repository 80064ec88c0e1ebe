//! Projection resolver tests.
//!
//! A resolved projection must never let a caller read a column outside its ACL, and
//! every rejection must happen before the store is reached.

use bson::doc;
use crudlayer_core::{
    error::CrudError,
    projection::{AclColumns, ProjectionRequest, ProjectionResolver, resolve_projection},
};
use pretty_assertions::assert_eq;

// =============================================================================
// Helper Functions
// =============================================================================

fn fields(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

fn resolver() -> ProjectionResolver {
    ProjectionResolver::new(fields(&["_id", "name", "street", "price", "tags"]))
}

fn rejection(request: ProjectionRequest<'_>) -> String {
    match resolver().resolve(&request) {
        Err(CrudError::InvalidRequest(reason)) => reason,
        other => panic!("expected an invalid request, got {other:?}"),
    }
}

// =============================================================================
// Defaulting and ACL Tests
// =============================================================================

#[test]
fn test_no_selection_includes_every_field() {
    let projection = resolve_projection(None, None, &fields(&["a", "b", "c"]), None).unwrap();

    assert_eq!(projection.as_document(), &doc! { "a": 1, "b": 1, "c": 1 });
}

#[test]
fn test_no_selection_is_intersected_with_acl() {
    let projection = resolve_projection(None, Some("c, a"), &fields(&["a", "b", "c"]), None).unwrap();

    assert_eq!(projection.as_document(), &doc! { "a": 1, "c": 1 });
}

#[test]
fn test_client_fields_are_intersected_with_acl() {
    let projection = resolve_projection(Some("a,b,c"), Some("a,c"), &fields(&["a", "b", "c"]), None).unwrap();

    assert_eq!(projection.as_document(), &doc! { "a": 1, "c": 1 });
}

#[test]
fn test_acl_never_adds_fields() {
    let projection = resolve_projection(Some("a"), Some("a,c"), &fields(&["a", "b", "c"]), None).unwrap();

    assert_eq!(projection.as_document(), &doc! { "a": 1 });
}

#[test]
fn test_client_fields_are_trimmed_and_empties_dropped() {
    let projection = resolve_projection(Some(" a , ,b,"), None, &fields(&["a", "b"]), None).unwrap();

    assert_eq!(projection.as_document(), &doc! { "a": 1, "b": 1 });
}

#[test]
fn test_empty_result_defaults_to_id() {
    let disjoint = resolve_projection(Some("b"), Some("a"), &fields(&["a", "b"]), None).unwrap();
    let no_fields = resolve_projection(None, None, &[], None).unwrap();
    let nulls = resolve_projection(None, None, &fields(&["a"]), Some(r#"{ "a": null }"#)).unwrap();

    for projection in [disjoint, no_fields, nulls] {
        assert_eq!(projection.as_document(), &doc! { "_id": 1 });
    }
}

#[test]
fn test_acl_columns_parsing() {
    let acl = AclColumns::parse(Some(" a,, b ,a "));

    assert_eq!(acl.columns(), &["a".to_string(), "b".to_string()]);
    assert!(acl.allows("a"));
    assert!(!acl.allows("c"));
    assert!(AclColumns::parse(Some(" , ")).is_unrestricted());
    assert!(AclColumns::parse(None).allows("anything"));
}

// =============================================================================
// Mutual Exclusivity Tests
// =============================================================================

#[test]
fn test_fields_and_raw_projection_are_mutually_exclusive() {
    let reason = rejection(
        ProjectionRequest::new()
            .fields("name")
            .raw_projection(r#"{ "name": 1 }"#),
    );

    assert!(reason.contains("cannot be used together"));
}

#[test]
fn test_whitespace_fields_still_conflict_with_raw_projection() {
    let reason = rejection(ProjectionRequest::new().fields("  ").raw_projection(r#"{ "name": 1 }"#));

    assert!(reason.contains("cannot be used together"));
}

#[test]
fn test_blank_values_count_as_absent() {
    let blank_fields = resolver().resolve(&ProjectionRequest::new().fields("  ")).unwrap();
    let empty_raw = resolver()
        .resolve(&ProjectionRequest::new().fields("name").raw_projection(""))
        .unwrap();

    assert_eq!(
        blank_fields.as_document(),
        &doc! { "_id": 1, "name": 1, "street": 1, "price": 1, "tags": 1 },
    );
    assert_eq!(empty_raw.as_document(), &doc! { "name": 1 });
}

// =============================================================================
// Raw Projection Tests
// =============================================================================

#[test]
fn test_raw_projection_is_forwarded() {
    let projection = resolver()
        .resolve(&ProjectionRequest::new().raw_projection(
            r#"{ "name": 1, "fullPrice": { "$multiply": ["$price", 1.22] } }"#,
        ))
        .unwrap();

    assert_eq!(
        projection.as_document(),
        &doc! { "name": 1, "fullPrice": { "$multiply": ["$price", 1.22] } },
    );
}

#[test]
fn test_raw_projection_drops_null_values() {
    let projection = resolver()
        .resolve(&ProjectionRequest::new().raw_projection(r#"{ "name": 1, "price": null }"#))
        .unwrap();

    assert_eq!(projection.as_document(), &doc! { "name": 1 });
}

#[test]
fn test_malformed_raw_projection_is_rejected() {
    let not_json = rejection(ProjectionRequest::new().raw_projection("{ name: 1"));
    let not_object = rejection(ProjectionRequest::new().raw_projection("[1, 2]"));

    assert!(not_json.contains("not valid JSON"));
    assert!(not_object.contains("must be a JSON object"));
}

#[test]
fn test_system_variables_are_rejected() {
    for raw in [
        r#"{ "doc": "$$ROOT" }"#,
        r#"{ "doc": { "$mergeObjects": ["$$CURRENT", {}] } }"#,
        r#"{ "$$ROOT": 1 }"#,
        r#"{ "now": "$$NOW" }"#,
    ] {
        let reason = rejection(ProjectionRequest::new().raw_projection(raw));
        assert!(reason.contains("system variable"), "{raw}: {reason}");
    }
}

#[test]
fn test_user_variables_are_rejected() {
    let reason = rejection(ProjectionRequest::new().raw_projection(r#"{ "x": "$$item" }"#));

    assert!(reason.contains("$$item"));
}

#[test]
fn test_operators_outside_the_allow_list_are_rejected() {
    for operator in ["$where", "$function", "$getField", "$let", "$meta"] {
        let raw = format!(r#"{{ "x": {{ "{operator}": "name" }} }}"#);
        let reason = rejection(ProjectionRequest::new().raw_projection(&raw));
        assert!(reason.contains(operator), "{operator}: {reason}");
    }
}

#[test]
fn test_field_references_are_checked_against_acl() {
    let allowed = resolver().resolve(
        &ProjectionRequest::new()
            .acl_columns("name,price")
            .raw_projection(r#"{ "label": { "$concat": ["$name", "!"] } }"#),
    );
    let reason = rejection(
        ProjectionRequest::new()
            .acl_columns("name")
            .raw_projection(r#"{ "label": { "$toString": "$price" } }"#),
    );

    assert!(allowed.is_ok());
    assert!(reason.contains("$price"));
}

#[test]
fn test_field_references_are_checked_against_all_fields_without_acl() {
    let reason = rejection(ProjectionRequest::new().raw_projection(r#"{ "x": "$secret" }"#));

    assert!(reason.contains("$secret"));
}

#[test]
fn test_exclusive_projection_of_acl_column_is_rejected() {
    let reason = rejection(
        ProjectionRequest::new()
            .acl_columns("street,name")
            .raw_projection(r#"{ "street": 0 }"#),
    );
    let with_false = rejection(
        ProjectionRequest::new()
            .acl_columns("street")
            .raw_projection(r#"{ "street": false }"#),
    );

    assert!(reason.contains("street"));
    assert!(with_false.contains("street"));
}

#[test]
fn test_raw_inclusions_outside_acl_are_dropped() {
    let projection = resolver()
        .resolve(
            &ProjectionRequest::new()
                .acl_columns("name")
                .raw_projection(r#"{ "name": 1, "price": 1, "name.first": 1 }"#),
        )
        .unwrap();

    assert_eq!(projection.as_document(), &doc! { "name": 1, "name.first": 1 });
}

#[test]
fn test_raw_exclusions_of_non_acl_columns_are_dropped_under_acl() {
    let projection = resolver()
        .resolve(
            &ProjectionRequest::new()
                .acl_columns("name")
                .raw_projection(r#"{ "name": 1, "price": 0, "name.secret": 0 }"#),
        )
        .unwrap();

    assert_eq!(projection.as_document(), &doc! { "name": 1 });
}

#[test]
fn test_field_selectors_outside_acl_are_dropped() {
    for raw in [
        r#"{ "name": 1, "tags": { "$slice": 5 } }"#,
        r#"{ "name": 1, "tags": { "$elemMatch": { "label": "sale" } } }"#,
        r#"{ "name": 1, "street": { "city": 1 } }"#,
    ] {
        let projection = resolver()
            .resolve(&ProjectionRequest::new().acl_columns("name").raw_projection(raw))
            .unwrap();

        assert_eq!(projection.as_document(), &doc! { "name": 1 }, "{raw}");
    }
}

#[test]
fn test_field_selector_on_a_non_acl_column_falls_back_to_id() {
    let projection = resolver()
        .resolve(&ProjectionRequest::new().acl_columns("name").raw_projection(r#"{ "price": { "$slice": 5 } }"#))
        .unwrap();

    assert_eq!(projection.as_document(), &doc! { "_id": 1 });
}

#[test]
fn test_field_selectors_on_acl_columns_are_kept() {
    let projection = resolver()
        .resolve(
            &ProjectionRequest::new()
                .acl_columns("name,tags")
                .raw_projection(r#"{ "name": 1, "tags": { "$slice": [1, 2] } }"#),
        )
        .unwrap();

    assert_eq!(projection.as_document(), &doc! { "name": 1, "tags": { "$slice": [1, 2] } });
}

#[test]
fn test_selector_only_projections_are_rejected_under_acl() {
    for raw in [
        r#"{ "tags": { "$slice": 1 } }"#,
        r#"{ "tags": { "$elemMatch": { "label": "sale" } } }"#,
        r#"{ "tags": { "$slice": 1 }, "price": 1 }"#,
    ] {
        let reason = rejection(ProjectionRequest::new().acl_columns("name,tags").raw_projection(raw));

        assert!(reason.contains("include at least one readable column"), "{raw}");
    }
}

#[test]
fn test_selector_only_projection_without_acl_is_kept() {
    let projection = resolver()
        .resolve(&ProjectionRequest::new().raw_projection(r#"{ "tags": { "$slice": 1 } }"#))
        .unwrap();

    assert_eq!(projection.as_document(), &doc! { "tags": { "$slice": 1 } });
}

#[test]
fn test_raw_exclusion_without_acl_is_kept() {
    let projection = resolver()
        .resolve(&ProjectionRequest::new().raw_projection(r#"{ "price": 0 }"#))
        .unwrap();

    assert_eq!(projection.as_document(), &doc! { "price": 0 });
    assert!(projection.is_exclusive());
}
