use std::path::Path;

use postboard::dao::{PostDao, PostStore};
use postboard::db::models::Post;
use postboard::db::schema::{COMMENTS, POSTS, USERS};
use postboard::db::{Database, DatabaseOptions, MigrationStrategy, Schema, Table};
use postboard::error::StoreError;
use rusqlite::Connection;
use tempfile::TempDir;

fn options(migration: MigrationStrategy, version: u32) -> DatabaseOptions {
    DatabaseOptions {
        migration,
        schema: Schema::current().with_version(version),
        ..DatabaseOptions::default()
    }
}

async fn seed_one_post(path: &Path) {
    let db = Database::open(path, &DatabaseOptions::default()).await.unwrap();
    PostDao::new(db.clone())
        .insert(&Post::new("old", "data", "a"))
        .await
        .unwrap();
    db.close();
}

/// A store as the first release left it: no items table, version 1.
fn write_version_one_store(path: &Path) {
    let conn = Connection::open(path).unwrap();
    for table in [USERS, POSTS, COMMENTS] {
        conn.execute_batch(&table.create_sql()).unwrap();
    }
    conn.execute(
        "INSERT INTO posts (title, content, author, timestamp, likes, dislikes) VALUES ('v1', 'c', 'a', 1, 4, 0)",
        [],
    )
    .unwrap();
    conn.pragma_update(None, "user_version", 1).unwrap();
}

#[tokio::test]
async fn destructive_bump_discards_everything() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("store.db");
    seed_one_post(&path).await;

    let db = Database::open(&path, &options(MigrationStrategy::Destructive, 3))
        .await
        .unwrap();
    let stats = db.stats().await.unwrap();
    assert_eq!(stats.schema_version, 3);
    assert_eq!(stats.posts, 0);
}

#[tokio::test]
async fn strict_refuses_a_different_version() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("store.db");
    seed_one_post(&path).await;

    let err = Database::open(&path, &options(MigrationStrategy::Strict, 3))
        .await
        .err()
        .unwrap();
    assert!(matches!(
        err,
        StoreError::SchemaVersionMismatch { found: 2, expected: 3 }
    ));

    // Nothing was touched.
    let db = Database::open(&path, &DatabaseOptions::default()).await.unwrap();
    assert_eq!(db.stats().await.unwrap().posts, 1);
}

#[tokio::test]
async fn incremental_without_a_step_fails() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("store.db");
    seed_one_post(&path).await;

    let err = Database::open(&path, &options(MigrationStrategy::Incremental, 3))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, StoreError::SchemaVersionMismatch { .. }));
}

#[tokio::test]
async fn incremental_upgrade_from_version_one_keeps_posts() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("store.db");
    write_version_one_store(&path);

    let db = Database::open(&path, &options(MigrationStrategy::Incremental, 2))
        .await
        .unwrap();
    let stats = db.stats().await.unwrap();
    assert_eq!(stats.schema_version, 2);
    assert_eq!((stats.posts, stats.items), (1, 0));

    db.write(Table::Items, |conn| {
        conn.execute(
            "INSERT INTO items (name, price, quantity) VALUES ('new', 1.0, 1)",
            [],
        )?;
        Ok(())
    })
    .await
    .unwrap();
    assert_eq!(db.stats().await.unwrap().items, 1);
}
