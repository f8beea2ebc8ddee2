use quarry::{
    memory::{InMemoryStore, NamespaceRegistry},
    prelude::*,
};

async fn store_with(id: &str, document: Document) -> DocumentStore<InMemoryStore> {
    let store = DocumentStore::new(InMemoryStore::new());
    store.save(id, document).await.unwrap();
    store
}

async fn updated(document: Document, spec: Document) -> Document {
    let store = store_with("x", document).await;
    store
        .update(doc! {}, spec, UpdateOptions::default())
        .await
        .unwrap();
    store.get("x").await.unwrap()
}

#[tokio::test]
async fn inc_parses_numeric_strings() {
    assert_eq!(
        updated(doc! { "count": "3" }, doc! { "$inc": { "count": 2 } }).await,
        doc! { "count": 5 }
    );
    assert_eq!(
        updated(doc! {}, doc! { "$inc": { "count": 4 } }).await,
        doc! { "count": 4 }
    );
}

#[tokio::test]
async fn push_promotes_scalars_to_sequences() {
    assert_eq!(
        updated(doc! { "tags": "a" }, doc! { "$push": { "tags": "b" } }).await,
        doc! { "tags": ["a", "b"] }
    );
}

#[tokio::test]
async fn compound_updates_apply_in_operator_order() {
    let document = updated(
        doc! { "name": "pen", "old": 1, "list": [1, 2, 2, 3] },
        doc! {
            "$inc": { "visits": 1 },
            "$pull": { "list": 2 },
            "$push": { "list": 4 },
            "$rename": { "old": "new" },
            "$unset": { "name": 1 },
            "$set": { "visits": 10 },
        },
    )
    .await;

    assert_eq!(document, doc! { "list": [1, 3, 4], "visits": 11, "new": 1 });
}

#[tokio::test]
async fn update_reports_affected_documents_and_upserts() {
    let store = DocumentStore::new(InMemoryStore::new());
    for n in 0..4 {
        store
            .insert(doc! { "group": n % 2, "n": n })
            .await
            .unwrap();
    }

    let report = store
        .update(doc! { "group": 1 }, doc! { "$set": { "seen": true } }, UpdateOptions::default())
        .await
        .unwrap();
    assert_eq!(report, UpdateReport { affected: 2, upserted: None });
    assert_eq!(store.count(doc! { "seen": true }).await.unwrap(), 2);

    let report = store
        .update(
            doc! { "group": 7 },
            doc! { "$inc": { "n": 1 } },
            UpdateOptions::default().upsert(),
        )
        .await
        .unwrap();
    let upserted = report.upserted.unwrap();
    assert_eq!(store.get(&upserted).await.unwrap(), doc! { "group": 7, "n": 1 });
}

#[tokio::test]
async fn find_and_modify_takes_the_first_in_order() {
    let store = DocumentStore::new(InMemoryStore::new());
    for (id, priority) in [("low", 1), ("high", 9), ("mid", 5)] {
        store
            .save(id, doc! { "priority": priority, "state": "queued" })
            .await
            .unwrap();
    }

    let claimed = store
        .find_and_modify(
            doc! { "state": "queued" },
            doc! { "priority": -1 },
            doc! { "$set": { "state": "running" } },
            FindAndModifyOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(claimed, Some(doc! { "priority": 9, "state": "running" }));
    assert_eq!(store.count(doc! { "state": "queued" }).await.unwrap(), 2);

    let upserted = store
        .find_and_modify(
            doc! { "state": "parked" },
            Order::Natural,
            doc! { "$set": { "priority": 0 } },
            FindAndModifyOptions { upsert: true, ..Default::default() },
        )
        .await
        .unwrap();
    assert_eq!(upserted, Some(doc! { "state": "parked", "priority": 0 }));
    assert_eq!(store.ids().await.unwrap().len(), 4);
}

#[tokio::test]
async fn remove_erases_matches() {
    let store = DocumentStore::new(InMemoryStore::new());
    for n in 0..5 {
        store.insert(doc! { "odd": n % 2 == 1 }).await.unwrap();
    }

    assert_eq!(
        store
            .remove(doc! { "odd": true }, RemoveOptions::default())
            .await
            .unwrap(),
        2
    );
    assert_eq!(store.count(doc! {}).await.unwrap(), 3);
    assert_eq!(
        store
            .remove(doc! { "odd": true }, RemoveOptions::default())
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn invalid_updates_leave_documents_untouched() {
    let store = store_with("x", doc! { "n": 1 }).await;

    let result = store
        .update(doc! {}, doc! { "$setOnInsert": { "n": 2 } }, UpdateOptions::default())
        .await;

    assert_eq!(
        result,
        Err(DocumentStoreError::InvalidUpdateOperator("$setOnInsert".into()))
    );
    assert_eq!(store.get("x").await.unwrap(), doc! { "n": 1 });
}

async fn jobs(registry: &NamespaceRegistry) -> DocumentStore<InMemoryStore> {
    DocumentStore::new(
        InMemoryStore::builder()
            .registry(registry.clone())
            .namespace("jobs")
            .build()
            .await
            .unwrap(),
    )
}

#[tokio::test]
async fn stores_sharing_a_namespace_see_each_others_updates() {
    let registry = NamespaceRegistry::new();
    let writer = jobs(&registry).await;
    let reader = jobs(&registry).await;

    writer.save("j1", doc! { "runs": 0 }).await.unwrap();
    writer
        .update(doc! {}, doc! { "$inc": { "runs": 1 } }, UpdateOptions::default())
        .await
        .unwrap();

    assert_eq!(reader.find_one(doc! { "runs": 1 }).await.unwrap(), doc! { "runs": 1 });
}

#[tokio::test]
async fn dynamic_stores_behave_like_typed_ones() {
    let store = store_with("x", doc! { "n": 1 }).await.into_dyn();

    store
        .update(doc! { "n": 1 }, doc! { "$inc": { "n": 1.5 } }, UpdateOptions::default())
        .await
        .unwrap();

    assert_eq!(store.get("x").await.unwrap(), doc! { "n": 2.5 });
    assert!(store.backend_as::<InMemoryStore>().is_some());
}
