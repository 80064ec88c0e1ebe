//! In-memory backend tests.

use bson::{Bson, Document, doc};
use crudlayer_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    error::{CrudError, CrudResult},
    projection::{Projection, ProjectionFragment, id_only},
};
use crudlayer_memory::InMemoryStore;
use futures::TryStreamExt;
use pretty_assertions::assert_eq;

fn projection(document: Document) -> Projection {
    Projection::from_fragments([ProjectionFragment::Expression(document)])
}

async fn find(store: &InMemoryStore, filter: Document, projection: &Projection) -> CrudResult<Vec<Document>> {
    store
        .find_documents("books", filter, projection)
        .await?
        .try_collect()
        .await
}

#[tokio::test]
async fn test_missing_collection_yields_nothing() {
    let store = InMemoryStore::new();

    let found = find(&store, doc! {}, &id_only()).await.unwrap();

    assert!(found.is_empty());
}

#[tokio::test]
async fn test_insert_assigns_object_ids() {
    let store = InMemoryStore::new();
    store
        .insert_documents(vec![doc! { "title": "Dune" }], "books")
        .await
        .unwrap();

    let found = find(&store, doc! {}, &id_only()).await.unwrap();

    assert_eq!(found.len(), 1);
    assert!(matches!(found[0].get("_id"), Some(Bson::ObjectId(_))));
}

#[tokio::test]
async fn test_duplicate_ids_are_rejected() {
    let result = InMemoryStore::builder()
        .with_documents("books", vec![doc! { "_id": 1, "title": "Dune" }, doc! { "_id": 1, "title": "Emma" }])
        .build()
        .await;

    assert!(matches!(result, Err(CrudError::Backend(_))));
}

#[tokio::test]
async fn test_rejected_batches_are_not_partially_written() {
    let store = InMemoryStore::builder()
        .with_documents("books", vec![doc! { "_id": 1, "title": "Dune" }])
        .build()
        .await
        .unwrap();

    let against_stored = store
        .insert_documents(vec![doc! { "_id": 2, "title": "Emma" }, doc! { "_id": 1, "title": "Ubik" }], "books")
        .await;
    let within_batch = store
        .insert_documents(vec![doc! { "_id": 3, "title": "Emma" }, doc! { "_id": 3, "title": "Ubik" }], "books")
        .await;

    assert!(matches!(against_stored, Err(CrudError::Backend(_))));
    assert!(matches!(within_batch, Err(CrudError::Backend(_))));
    assert_eq!(store.count("books").await, 1);
}

#[tokio::test]
async fn test_filters_and_projections_are_applied() {
    let store = InMemoryStore::builder()
        .with_documents(
            "books",
            vec![
                doc! { "_id": 1, "title": "Dune", "pages": 412, "secret": "x" },
                doc! { "_id": 2, "title": "Emma", "pages": 474, "secret": "y" },
                doc! { "_id": 3, "title": "Ubik", "pages": 202, "secret": "z" },
            ],
        )
        .build()
        .await
        .unwrap();

    let included = find(&store, doc! { "pages": { "$gte": 400 } }, &projection(doc! { "title": 1 }))
        .await
        .unwrap();
    let excluded = find(&store, doc! { "_id": 3 }, &projection(doc! { "secret": 0 }))
        .await
        .unwrap();

    assert_eq!(included, vec![doc! { "_id": 1, "title": "Dune" }, doc! { "_id": 2, "title": "Emma" }]);
    assert_eq!(excluded, vec![doc! { "_id": 3, "title": "Ubik", "pages": 202 }]);
}

#[tokio::test]
async fn test_expression_projections_are_backend_errors() {
    let store = InMemoryStore::builder()
        .with_documents("books", vec![doc! { "_id": 1, "title": "Dune" }])
        .build()
        .await
        .unwrap();

    let err = find(&store, doc! {}, &projection(doc! { "upper": { "$toUpper": "$title" } }))
        .await
        .unwrap_err();

    assert!(matches!(err, CrudError::Backend(_)));
}

#[tokio::test]
async fn test_clones_share_data() {
    let store = InMemoryStore::new();
    let clone = store.clone();

    clone
        .insert_documents(vec![doc! { "title": "Dune" }], "books")
        .await
        .unwrap();

    assert_eq!(store.count("books").await, 1);
}
