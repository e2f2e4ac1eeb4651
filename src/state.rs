use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use tracing::info;

use crate::config::Config;
use crate::dao::{
    CommentDao, CommentStore, DynCommentStore, DynPostStore, ItemDao, PostDao, PostStore, UserDao,
    UserPolicy,
};
use crate::db::Database;
use crate::error::StoreResult;
use crate::repository::{ItemsRepository, StoreItemsRepository, UserRepository};

pub type DbPool = Pool<SqliteConnectionManager>;

/// Everything storage-related a caller needs, bound to one [`Database`].
///
/// Built once at startup and cloned into whatever needs it. Every clone
/// shares the same store handle and the same repository instances.
#[derive(Clone)]
pub struct Container {
    db: Database,
    users: Arc<UserRepository>,
    posts: DynPostStore,
    comments: DynCommentStore,
    items: Arc<dyn ItemsRepository>,
}

impl Container {
    pub async fn open(config: &Config) -> StoreResult<Self> {
        let db = Database::open(config.db_path(), &config.database_options()).await?;
        Ok(Self::from_database(db, config.users))
    }

    pub fn from_database(db: Database, policy: UserPolicy) -> Self {
        let users = UserRepository::new(Arc::new(UserDao::new(db.clone(), policy)));
        let items = StoreItemsRepository::new(Arc::new(ItemDao::new(db.clone())));

        info!(path = %db.path().display(), ?policy, "Container ready");

        Self {
            users: Arc::new(users),
            posts: Arc::new(PostDao::new(db.clone())),
            comments: Arc::new(CommentDao::new(db.clone())),
            items: Arc::new(items),
            db,
        }
    }

    pub fn user_repository(&self) -> Arc<UserRepository> {
        Arc::clone(&self.users)
    }

    pub fn post_store(&self) -> Arc<dyn PostStore> {
        Arc::clone(&self.posts)
    }

    pub fn comment_store(&self) -> Arc<dyn CommentStore> {
        Arc::clone(&self.comments)
    }

    pub fn item_repository(&self) -> Arc<dyn ItemsRepository> {
        Arc::clone(&self.items)
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Close the shared store. Every clone of this container, and every
    /// handle it gave out, fails with `StoreUnavailable` afterwards.
    pub fn close(&self) {
        self.db.close();
    }
}
