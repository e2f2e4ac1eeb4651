// Data-access objects: fixed, parameterised queries per table.
pub mod comments;
pub mod items;
pub mod posts;
pub mod users;

use std::sync::Arc;

use crate::db::models::Keyed;
use crate::error::{StoreError, StoreResult};

pub use comments::{CommentDao, CommentStore};
pub use items::{ItemDao, ItemStore};
pub use posts::{PostDao, PostStore};
pub use users::{UserDao, UserPolicy, UserStore};

pub type DynUserStore = Arc<dyn UserStore>;
pub type DynPostStore = Arc<dyn PostStore>;
pub type DynCommentStore = Arc<dyn CommentStore>;
pub type DynItemStore = Arc<dyn ItemStore>;

/// `NULL` lets SQLite assign the key; anything else is used verbatim.
pub(crate) fn id_param(record: &impl Keyed) -> Option<i64> {
    (!record.is_unassigned()).then(|| record.id())
}

pub(crate) fn expect_row(changed: usize, what: &str, id: i64) -> StoreResult<()> {
    if changed == 0 {
        return Err(StoreError::NotFound(format!("{what} {id}")));
    }
    Ok(())
}
