use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::dao::{expect_row, id_param};
use crate::db::models::Comment;
use crate::db::{Database, Subscription, Table};
use crate::error::StoreResult;

const COLUMNS: &str = "id, post_id, title, content, author, timestamp";

#[async_trait]
pub trait CommentStore: Send + Sync {
    async fn insert(&self, comment: &Comment) -> StoreResult<i64>;

    async fn update(&self, comment: &Comment) -> StoreResult<()>;

    async fn delete(&self, comment: &Comment) -> StoreResult<bool>;

    async fn get_comment(&self, id: i64) -> StoreResult<Option<Comment>>;

    async fn get_comments_for_post(&self, post_id: i64) -> StoreResult<Vec<Comment>>;

    /// Comments on one post, newest first. Any write to `comments`
    /// triggers a re-run, whichever post it touched.
    fn observe_comments_for_post(&self, post_id: i64) -> Subscription<Vec<Comment>>;
}

pub struct CommentDao {
    db: Database,
}

impl CommentDao {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        post_id: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        author: row.get(4)?,
        timestamp: row.get(5)?,
    })
}

fn comments_for_post(conn: &Connection, post_id: i64) -> StoreResult<Vec<Comment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM comments WHERE post_id = ?1 ORDER BY timestamp DESC, id DESC"
    ))?;
    let comments = stmt
        .query_map(params![post_id], from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(comments)
}

#[async_trait]
impl CommentStore for CommentDao {
    async fn insert(&self, comment: &Comment) -> StoreResult<i64> {
        let comment = comment.clone();
        self.db
            .write(Table::Comments, move |conn| {
                conn.execute(
                    "INSERT INTO comments (id, post_id, title, content, author, timestamp)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        id_param(&comment),
                        comment.post_id,
                        comment.title,
                        comment.content,
                        comment.author,
                        comment.timestamp,
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
    }

    async fn update(&self, comment: &Comment) -> StoreResult<()> {
        let comment = comment.clone();
        self.db
            .write(Table::Comments, move |conn| {
                let changed = conn.execute(
                    "UPDATE comments SET post_id = ?2, title = ?3, content = ?4, author = ?5, timestamp = ?6
                     WHERE id = ?1",
                    params![
                        comment.id,
                        comment.post_id,
                        comment.title,
                        comment.content,
                        comment.author,
                        comment.timestamp,
                    ],
                )?;
                expect_row(changed, "comment", comment.id)
            })
            .await
    }

    async fn delete(&self, comment: &Comment) -> StoreResult<bool> {
        let id = comment.id;
        self.db
            .write(Table::Comments, move |conn| {
                Ok(conn.execute("DELETE FROM comments WHERE id = ?1", params![id])? > 0)
            })
            .await
    }

    async fn get_comment(&self, id: i64) -> StoreResult<Option<Comment>> {
        self.db
            .call(move |conn| {
                Ok(conn
                    .query_row(
                        &format!("SELECT {COLUMNS} FROM comments WHERE id = ?1"),
                        params![id],
                        from_row,
                    )
                    .optional()?)
            })
            .await
    }

    async fn get_comments_for_post(&self, post_id: i64) -> StoreResult<Vec<Comment>> {
        self.db
            .call(move |conn| comments_for_post(conn, post_id))
            .await
    }

    fn observe_comments_for_post(&self, post_id: i64) -> Subscription<Vec<Comment>> {
        Subscription::spawn(self.db.clone(), Table::Comments, move |conn| {
            comments_for_post(conn, post_id)
        })
    }
}
