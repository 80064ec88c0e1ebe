//! Collection registry tests.

use bson::{doc, oid::ObjectId};
use crudlayer_core::{
    definition::{CollectionDefinition, FieldDefinition, FieldKind},
    error::CrudError,
    projection::ProjectionRequest,
    registry::{CollectionRegistry, CompiledCollection},
};
use pretty_assertions::assert_eq;

fn books() -> CollectionDefinition {
    CollectionDefinition::new(
        "books",
        "/books",
        vec![
            FieldDefinition::new("title", FieldKind::String).required(),
            FieldDefinition::new("pages", FieldKind::Number),
            FieldDefinition::new("authorId", FieldKind::ObjectId),
        ],
    )
}

fn shops() -> CollectionDefinition {
    CollectionDefinition::new(
        "shops",
        "/shops",
        vec![FieldDefinition::new("position", FieldKind::GeoPoint)],
    )
}

#[test]
fn test_registry_compiles_every_definition() {
    let registry = CollectionRegistry::builder()
        .with_definitions([books(), shops()])
        .build()
        .unwrap();

    assert_eq!(registry.len(), 2);
    assert_eq!(registry.names(), vec!["books", "shops"]);
    assert_eq!(registry.by_endpoint("/shops").unwrap().name(), "shops");
    assert!(registry.by_endpoint("/nowhere").is_none());
}

#[test]
fn test_unknown_collection_is_not_found() {
    let registry = CollectionRegistry::builder().with_definition(books()).build().unwrap();

    assert!(matches!(registry.get("authors"), Err(CrudError::CollectionNotFound(name)) if name == "authors"));
}

#[test]
fn test_duplicate_names_and_endpoints_are_definition_errors() {
    let mut same_endpoint = shops();
    same_endpoint.endpoint_base_path = "/books".into();

    let duplicate_name = CollectionRegistry::builder()
        .with_definition(books())
        .with_definition(books())
        .build();
    let duplicate_endpoint = CollectionRegistry::builder()
        .with_definition(books())
        .with_definition(same_endpoint)
        .build();

    assert!(matches!(duplicate_name, Err(CrudError::Definition(_))));
    assert!(matches!(duplicate_endpoint, Err(CrudError::Definition(_))));
}

#[test]
fn test_one_bad_definition_fails_the_whole_registry() {
    let broken = CollectionDefinition::new(
        "broken",
        "/broken",
        vec![FieldDefinition::new("items", FieldKind::Array)],
    );

    let result = CollectionRegistry::builder()
        .with_definition(books())
        .with_definition(broken)
        .build();

    assert!(matches!(result, Err(CrudError::Definition(_))));
}

#[test]
fn test_compiled_collection_ties_resolver_and_caster_together() {
    let books = CompiledCollection::compile(books()).unwrap();
    let author = ObjectId::new();

    let projection = books
        .resolve_projection(&ProjectionRequest::new().fields("title,pages,secret").acl_columns("title,authorId"))
        .unwrap();
    let cast = books.cast(doc! { "title": 7, "pages": "310", "authorId": author });

    assert_eq!(projection.as_document(), &doc! { "title": 1 });
    assert_eq!(cast, doc! { "title": "7", "pages": 310, "authorId": author.to_hex() });
    assert!(books.field_names().contains(&"__STATE__".to_string()));
}

#[test]
fn test_compiled_collection_validates_queries_against_its_fields() {
    let books = CompiledCollection::compile(books()).unwrap();

    assert!(books.parse_query(r#"{ "$expr": { "$gt": ["$pages", 100] } }"#).is_ok());
    assert!(books.parse_query(r#"{ "$expr": { "$gt": ["$price", 100] } }"#).is_err());
}
