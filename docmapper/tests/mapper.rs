use bson::{Bson, bson, doc};
use docmapper::{memory::InMemoryStore, prelude::*};
use pretty_assertions::assert_eq;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct User {
    id: i32,
    email: String,
    name: String,
}

impl Document for User {
    fn primary_key(&self) -> Bson {
        Bson::Int32(self.id)
    }

    fn collection_name() -> &'static str {
        "users"
    }
}

impl Schema for User {
    fn schema_name() -> &'static str {
        "User"
    }

    fn indexes() -> Vec<IndexSpec> {
        vec![IndexSpec::unique("email"), IndexSpec::new("name")]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Comment {
    id: i32,
    body: String,
}

impl Document for Comment {
    fn primary_key(&self) -> Bson {
        Bson::Int32(self.id)
    }

    fn collection_name() -> &'static str {
        "comments"
    }
}

impl Schema for Comment {
    fn schema_name() -> &'static str {
        "Comment"
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn connect() -> Connection {
    init_tracing();

    let registry = SchemaRegistry::builder()
        .register::<User>()
        .register::<Comment>()
        .build()
        .unwrap();

    Connection::new(InMemoryStore::builder().build().await.unwrap(), registry)
}

async fn seed_users(connection: &Connection) {
    connection
        .collection("users")
        .unwrap()
        .insert(vec![
            bson!({ "_id": 1, "name": "Alice", "role": "admin" }),
            bson!({ "_id": 2, "name": "Bob", "role": "staff" }),
            bson!({ "_id": 3, "name": "Carol", "role": "staff" }),
        ])
        .await
        .unwrap();
}

#[tokio::test]
async fn one_returns_none_single_or_errors() {
    let connection = connect().await;
    seed_users(&connection).await;
    let users = connection.mapper("users").unwrap();

    assert_eq!(users.one(Filter::eq("role", "guest")).await.unwrap(), None);
    assert_eq!(
        users.one(Filter::eq("role", "admin")).await.unwrap(),
        Some(bson!({ "_id": 1, "name": "Alice", "role": "admin" }))
    );

    match users.one(Filter::eq("role", "staff")).await {
        Err(DocumentStoreError::MultipleResults { count, collection }) => {
            assert_eq!(count, 2);
            assert_eq!(collection, "users");
        }
        other => panic!("expected MultipleResults, got {other:?}"),
    }
}

#[tokio::test]
async fn get_by_primary_key_finds_or_misses() {
    let connection = connect().await;
    seed_users(&connection).await;
    let users = connection.mapper("users").unwrap();

    assert_eq!(
        users.get_by_primary_key(2).await.unwrap(),
        Some(bson!({ "_id": 2, "name": "Bob", "role": "staff" }))
    );
    assert_eq!(users.get_by_primary_key(42).await.unwrap(), None);
}

#[tokio::test]
async fn large_integer_primary_keys_resolve_exactly() {
    let connection = connect().await;
    let events = connection.mapper("events").unwrap();
    let low = 9_007_199_254_740_992_i64;
    let high = low + 1;

    events
        .collection()
        .insert(vec![bson!({ "_id": low, "kind": "low" }), bson!({ "_id": high, "kind": "high" })])
        .await
        .unwrap();

    assert_eq!(
        events.get_by_primary_key(high).await.unwrap(),
        Some(bson!({ "_id": high, "kind": "high" }))
    );
    assert_eq!(
        events.one(Filter::primary_key(high)).await.unwrap(),
        Some(bson!({ "_id": high, "kind": "high" }))
    );
}

#[tokio::test]
async fn random_one_on_empty_collection_fails() {
    let connection = connect().await;
    let logs = connection.mapper("logs").unwrap();

    match logs.random_one().await {
        Err(DocumentStoreError::EmptyCollection(name)) => assert_eq!(name, "logs"),
        other => panic!("expected EmptyCollection, got {other:?}"),
    }
}

#[tokio::test]
async fn random_one_reaches_every_document() {
    let connection = connect().await;
    let items = connection.collection("items").unwrap();

    items
        .insert((0..5).map(|i| bson!({ "_id": i, "n": i })).collect())
        .await
        .unwrap();

    let mut seen = HashSet::new();
    for _ in 0..300 {
        let document = items.random_one().await.unwrap();
        seen.insert(document.as_document().unwrap().get_i32("_id").unwrap());
    }

    assert_eq!(seen, (0..5).collect::<HashSet<_>>());
}

#[tokio::test]
async fn resolving_a_schema_ensures_its_indexes() {
    let connection = connect().await;
    let app = connection.mapper("app").unwrap();

    let bound = app.resolve("User").await.unwrap().into_schema().unwrap();
    assert_eq!(bound.name(), "User");
    assert_eq!(bound.collection().name(), "app");

    // A second resolution binds afresh and leaves the indexes unchanged.
    app.resolve("User").await.unwrap();

    assert_eq!(
        connection.collection("app").unwrap().indexes().await.unwrap(),
        vec![IndexSpec::unique("email"), IndexSpec::new("name")]
    );
}

#[tokio::test]
async fn resolved_unique_index_guards_inserts() {
    let connection = connect().await;
    let users = connection
        .mapper("accounts")
        .unwrap()
        .resolve("User")
        .await
        .unwrap()
        .into_schema()
        .unwrap()
        .typed::<User>()
        .unwrap();

    let alice = User {
        id: 1,
        email: "alice@example.com".to_string(),
        name: "Alice".to_string(),
    };
    users.insert(vec![alice.clone()]).await.unwrap();

    let impostor = User { id: 2, ..alice.clone() };
    assert!(matches!(
        users.insert(vec![impostor]).await,
        Err(DocumentStoreError::DuplicateKey { .. })
    ));

    assert_eq!(users.get_by_primary_key(1).await.unwrap(), Some(alice));
}

#[tokio::test]
async fn unregistered_names_navigate_into_sub_collections() {
    let connection = connect().await;

    let nested = connection
        .mapper("users")
        .unwrap()
        .resolve("name")
        .await
        .unwrap()
        .into_sub_collection()
        .unwrap();
    assert_eq!(nested.name(), "users.name");

    let deeper = nested.resolve("first").await.unwrap();
    assert!(!deeper.is_schema());
    assert_eq!(deeper.into_sub_collection().unwrap().name(), "users.name.first");

    // Registered names still bind at any depth.
    let bound = nested.resolve("Comment").await.unwrap().into_schema().unwrap();
    assert_eq!(bound.collection().name(), "users.name");
}

#[tokio::test]
async fn resolve_rejects_invalid_names() {
    let connection = connect().await;
    let users = connection.mapper("users").unwrap();

    for name in ["", "a.b", "$where", "nul\0"] {
        assert!(matches!(
            users.resolve(name).await,
            Err(DocumentStoreError::InvalidName(_))
        ));
    }
    assert!(matches!(
        connection.mapper("users..posts"),
        Err(DocumentStoreError::InvalidName(_))
    ));
}

#[tokio::test]
async fn bound_schema_checks_requested_type() {
    let connection = connect().await;
    let bound = connection
        .mapper("users")
        .unwrap()
        .resolve("User")
        .await
        .unwrap()
        .into_schema()
        .unwrap();

    assert!(bound.typed::<User>().is_ok());
    match bound.typed::<Comment>() {
        Err(DocumentStoreError::SchemaMismatch { expected, found }) => {
            assert_eq!(expected, "Comment");
            assert_eq!(found, "User");
        }
        other => panic!("expected SchemaMismatch, got {:?}", other.map(|c| c.name().to_string())),
    }

    assert!(bound.validate(&bson!({ "_id": 1, "id": 1, "email": "a@b.c", "name": "A" })).is_ok());
    assert!(bound.validate(&bson!({ "_id": 1, "email": 3 })).is_err());
}

#[tokio::test]
async fn cached_index_checks_skip_known_pairs() {
    init_tracing();
    let registry = SchemaRegistry::builder().register::<User>().build().unwrap();
    let connection = Connection::new(InMemoryStore::new(), registry)
        .with_options(ConnectionOptions { cache_index_checks: true });

    let app = connection.mapper("app").unwrap();
    app.resolve("User").await.unwrap();

    let store = connection.backend_as::<InMemoryStore>().unwrap();
    StoreBackend::drop_index(store, "app", "name").await.unwrap();

    // The pair is cached, so the dropped index is not recreated.
    app.resolve("User").await.unwrap();
    assert_eq!(
        connection.collection("app").unwrap().indexes().await.unwrap(),
        vec![IndexSpec::unique("email")]
    );

    // Dropping the collection forgets the cached pair.
    connection.drop_collection("app").await.unwrap();
    app.resolve("User").await.unwrap();
    assert_eq!(connection.collection("app").unwrap().indexes().await.unwrap().len(), 2);
}

#[tokio::test]
async fn uncached_resolution_restores_dropped_indexes() {
    let connection = connect().await;
    let app = connection.mapper("app").unwrap();
    app.resolve("User").await.unwrap();

    let store = connection.backend_as::<InMemoryStore>().unwrap();
    StoreBackend::drop_index(store, "app", "name").await.unwrap();

    app.resolve("User").await.unwrap();
    assert_eq!(
        connection.collection("app").unwrap().indexes().await.unwrap(),
        vec![IndexSpec::unique("email"), IndexSpec::new("name")]
    );
}

#[tokio::test]
async fn typed_collections_round_trip_documents() {
    let connection = connect().await;
    let users = connection.typed::<User>();

    let bob = User {
        id: 7,
        email: "bob@example.com".to_string(),
        name: "Bob".to_string(),
    };
    users.insert(vec![bob.clone()]).await.unwrap();

    assert_eq!(users.name(), "users");
    assert_eq!(users.one(Filter::eq("email", "bob@example.com")).await.unwrap(), Some(bob.clone()));
    assert_eq!(users.random_one().await.unwrap(), bob);
    assert_eq!(users.count(None).await.unwrap(), 1);

    let raw = connection.collection("users").unwrap().get(vec![7]).await.unwrap();
    assert_eq!(raw[0].as_document().unwrap().get("_id"), Some(&Bson::Int32(7)));

    users.delete(vec![7]).await.unwrap();
    assert_eq!(users.get_by_primary_key(7).await.unwrap(), None);
}

#[tokio::test]
async fn connection_manages_collections() {
    let connection = connect().await;

    connection.create_collection("blog.posts").await.unwrap();
    connection.create_collection("blog.posts").await.unwrap();
    connection
        .collection("audit")
        .unwrap()
        .insert(vec![bson!({ "_id": "a1", "event": doc! { "kind": "login" } })])
        .await
        .unwrap();

    assert_eq!(
        connection.list_collections().await.unwrap(),
        vec!["audit".to_string(), "blog.posts".to_string()]
    );

    connection.drop_collection("blog.posts").await.unwrap();
    assert!(matches!(
        connection.drop_collection("blog.posts").await,
        Err(DocumentStoreError::CollectionNotFound(_))
    ));

    connection.shutdown().await.unwrap();
}
