use std::sync::Arc;

use crate::dao::UserStore;
use crate::db::models::User;
use crate::error::StoreResult;

/// Forwards to whichever [`UserStore`] it was built with.
#[derive(Clone)]
pub struct UserRepository {
    store: Arc<dyn UserStore>,
}

impl UserRepository {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    pub async fn insert_user(&self, user: &User) -> StoreResult<i64> {
        self.store.insert_user(user).await
    }

    pub async fn update_user(&self, user: &User) -> StoreResult<()> {
        self.store.update_user(user).await
    }

    pub async fn delete_user(&self, user: &User) -> StoreResult<bool> {
        self.store.delete_user(user).await
    }

    pub async fn get_user(&self, id: i64) -> StoreResult<Option<User>> {
        self.store.get_user(id).await
    }

    pub async fn get_user_by_email_and_password(
        &self,
        email: &str,
        password: &str,
    ) -> StoreResult<Option<User>> {
        self.store
            .get_user_by_email_and_password(email, password)
            .await
    }

    pub async fn get_user_by_full_name(&self, full_name: &str) -> StoreResult<Option<User>> {
        self.store.get_user_by_full_name(full_name).await
    }

    pub async fn get_all_users(&self) -> StoreResult<Vec<User>> {
        self.store.get_all_users().await
    }
}
