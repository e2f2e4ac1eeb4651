use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use crate::dao::{expect_row, id_param};
use crate::db::models::Post;
use crate::db::{Database, Subscription, Table};
use crate::error::StoreResult;

const COLUMNS: &str = "id, title, content, author, timestamp, likes, dislikes";

#[async_trait]
pub trait PostStore: Send + Sync {
    async fn insert(&self, post: &Post) -> StoreResult<i64>;

    async fn update(&self, post: &Post) -> StoreResult<()>;

    async fn delete(&self, post: &Post) -> StoreResult<bool>;

    async fn get_post(&self, id: i64) -> StoreResult<Option<Post>>;

    /// Newest first; re-emits on every write to `posts`.
    fn observe_all_posts(&self) -> Subscription<Vec<Post>>;

    /// `likes = likes + 1` as one statement.
    async fn like_post(&self, id: i64) -> StoreResult<()>;

    async fn dislike_post(&self, id: i64) -> StoreResult<()>;
}

pub struct PostDao {
    db: Database,
}

impl PostDao {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    async fn bump(&self, id: i64, column: &'static str) -> StoreResult<()> {
        self.db
            .write(Table::Posts, move |conn| {
                let changed = conn.execute(
                    &format!("UPDATE posts SET {column} = {column} + 1 WHERE id = ?1"),
                    params![id],
                )?;
                expect_row(changed, "post", id)
            })
            .await?;
        debug!(post_id = id, column, "Post vote counted");
        Ok(())
    }
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        author: row.get(3)?,
        timestamp: row.get(4)?,
        likes: row.get(5)?,
        dislikes: row.get(6)?,
    })
}

fn all_posts(conn: &Connection) -> StoreResult<Vec<Post>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM posts ORDER BY timestamp DESC, id DESC"
    ))?;
    let posts = stmt
        .query_map([], from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(posts)
}

#[async_trait]
impl PostStore for PostDao {
    async fn insert(&self, post: &Post) -> StoreResult<i64> {
        let post = post.clone();
        self.db
            .write(Table::Posts, move |conn| {
                conn.execute(
                    "INSERT INTO posts (id, title, content, author, timestamp, likes, dislikes)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        id_param(&post),
                        post.title,
                        post.content,
                        post.author,
                        post.timestamp,
                        post.likes,
                        post.dislikes,
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
    }

    async fn update(&self, post: &Post) -> StoreResult<()> {
        let post = post.clone();
        self.db
            .write(Table::Posts, move |conn| {
                let changed = conn.execute(
                    "UPDATE posts SET title = ?2, content = ?3, author = ?4, timestamp = ?5,
                                      likes = ?6, dislikes = ?7
                     WHERE id = ?1",
                    params![
                        post.id,
                        post.title,
                        post.content,
                        post.author,
                        post.timestamp,
                        post.likes,
                        post.dislikes,
                    ],
                )?;
                expect_row(changed, "post", post.id)
            })
            .await
    }

    async fn delete(&self, post: &Post) -> StoreResult<bool> {
        let id = post.id;
        self.db
            .write(Table::Posts, move |conn| {
                Ok(conn.execute("DELETE FROM posts WHERE id = ?1", params![id])? > 0)
            })
            .await
    }

    async fn get_post(&self, id: i64) -> StoreResult<Option<Post>> {
        self.db
            .call(move |conn| {
                Ok(conn
                    .query_row(
                        &format!("SELECT {COLUMNS} FROM posts WHERE id = ?1"),
                        params![id],
                        from_row,
                    )
                    .optional()?)
            })
            .await
    }

    fn observe_all_posts(&self) -> Subscription<Vec<Post>> {
        Subscription::spawn(self.db.clone(), Table::Posts, all_posts)
    }

    async fn like_post(&self, id: i64) -> StoreResult<()> {
        self.bump(id, "likes").await
    }

    async fn dislike_post(&self, id: i64) -> StoreResult<()> {
        self.bump(id, "dislikes").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DatabaseOptions;
    use crate::error::StoreError;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::time::timeout;

    async fn create_test_dao() -> (PostDao, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::open(&temp_dir.path().join("test.db"), &DatabaseOptions::default())
            .await
            .unwrap();
        (PostDao::new(db), temp_dir)
    }

    async fn next_posts(sub: &mut Subscription<Vec<Post>>) -> Vec<Post> {
        timeout(Duration::from_secs(5), sub.next())
            .await
            .expect("timed out")
            .expect("subscription ended")
            .unwrap()
    }

    #[tokio::test]
    async fn insert_and_get_round_trip() {
        let (dao, _temp) = create_test_dao().await;
        let post = Post::new("Hello", "First!", "ada").at(1_000);

        let id = dao.insert(&post).await.unwrap();
        let loaded = dao.get_post(id).await.unwrap().unwrap();
        assert_eq!(loaded, Post { id, ..post });
    }

    #[tokio::test]
    async fn likes_and_dislikes_count_independently() {
        let (dao, _temp) = create_test_dao().await;
        let id = dao.insert(&Post::new("t", "c", "a")).await.unwrap();

        dao.like_post(id).await.unwrap();
        dao.like_post(id).await.unwrap();
        dao.dislike_post(id).await.unwrap();

        let post = dao.get_post(id).await.unwrap().unwrap();
        assert_eq!((post.likes, post.dislikes), (2, 1));
    }

    #[tokio::test]
    async fn liking_a_missing_post_is_not_found() {
        let (dao, _temp) = create_test_dao().await;
        assert!(matches!(
            dao.like_post(404).await.unwrap_err(),
            StoreError::NotFound(_)
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_likes_are_never_lost() {
        let (dao, _temp) = create_test_dao().await;
        let dao = Arc::new(dao);
        let id = dao.insert(&Post::new("popular", "c", "a")).await.unwrap();

        let handles: Vec<_> = (0..64)
            .map(|_| {
                let dao = Arc::clone(&dao);
                tokio::spawn(async move { dao.like_post(id).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(dao.get_post(id).await.unwrap().unwrap().likes, 64);
    }

    #[tokio::test]
    async fn update_replaces_fields() {
        let (dao, _temp) = create_test_dao().await;
        let id = dao.insert(&Post::new("draft", "c", "a")).await.unwrap();
        let mut post = dao.get_post(id).await.unwrap().unwrap();

        post.title = "final".into();
        dao.update(&post).await.unwrap();

        assert_eq!(dao.get_post(id).await.unwrap().unwrap().title, "final");
    }

    #[tokio::test]
    async fn observe_orders_newest_first_and_tracks_writes() {
        let (dao, _temp) = create_test_dao().await;
        dao.insert(&Post::new("old", "c", "a").at(100)).await.unwrap();
        dao.insert(&Post::new("new", "c", "a").at(300)).await.unwrap();

        let mut sub = dao.observe_all_posts();
        let titles = |posts: &[Post]| posts.iter().map(|p| p.title.clone()).collect::<Vec<_>>();
        assert_eq!(titles(&next_posts(&mut sub).await), vec!["new", "old"]);

        let middle = dao.insert(&Post::new("middle", "c", "a").at(200)).await.unwrap();
        assert_eq!(
            titles(&next_posts(&mut sub).await),
            vec!["new", "middle", "old"]
        );

        let stored = dao.get_post(middle).await.unwrap().unwrap();
        dao.delete(&stored).await.unwrap();
        assert_eq!(titles(&next_posts(&mut sub).await), vec!["new", "old"]);
    }

    #[tokio::test]
    async fn delete_twice_is_not_an_error() {
        let (dao, _temp) = create_test_dao().await;
        let id = dao.insert(&Post::new("t", "c", "a")).await.unwrap();
        let post = dao.get_post(id).await.unwrap().unwrap();

        assert!(dao.delete(&post).await.unwrap());
        assert!(!dao.delete(&post).await.unwrap());
    }
}
