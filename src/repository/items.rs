use std::sync::Arc;

use async_trait::async_trait;

use crate::dao::ItemStore;
use crate::db::models::Item;
use crate::db::Subscription;
use crate::error::StoreResult;

/// What callers see of the item catalogue. Implemented over an
/// [`ItemStore`] in production and by hand in tests.
#[async_trait]
pub trait ItemsRepository: Send + Sync {
    fn get_all_items_stream(&self) -> Subscription<Vec<Item>>;

    fn get_item_stream(&self, id: i64) -> Subscription<Option<Item>>;

    async fn insert_item(&self, item: &Item) -> StoreResult<i64>;

    async fn update_item(&self, item: &Item) -> StoreResult<()>;

    async fn delete_item(&self, item: &Item) -> StoreResult<bool>;
}

pub struct StoreItemsRepository {
    store: Arc<dyn ItemStore>,
}

impl StoreItemsRepository {
    pub fn new(store: Arc<dyn ItemStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ItemsRepository for StoreItemsRepository {
    fn get_all_items_stream(&self) -> Subscription<Vec<Item>> {
        self.store.observe_all_items()
    }

    fn get_item_stream(&self, id: i64) -> Subscription<Option<Item>> {
        self.store.observe_item(id)
    }

    async fn insert_item(&self, item: &Item) -> StoreResult<i64> {
        self.store.insert(item).await
    }

    async fn update_item(&self, item: &Item) -> StoreResult<()> {
        self.store.update(item).await
    }

    async fn delete_item(&self, item: &Item) -> StoreResult<bool> {
        self.store.delete(item).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::ItemDao;
    use crate::db::{Database, DatabaseOptions};
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    async fn create_test_repo() -> (StoreItemsRepository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::open(&temp_dir.path().join("test.db"), &DatabaseOptions::default())
            .await
            .unwrap();
        (
            StoreItemsRepository::new(Arc::new(ItemDao::new(db))),
            temp_dir,
        )
    }

    #[tokio::test]
    async fn streams_reflect_repository_writes() {
        let (repo, _temp) = create_test_repo().await;
        let mut all = repo.get_all_items_stream();
        let first = timeout(Duration::from_secs(5), all.next()).await.unwrap().unwrap().unwrap();
        assert!(first.is_empty());

        let id = repo.insert_item(&Item::new("bolt", 0.25, 10)).await.unwrap();
        let second = timeout(Duration::from_secs(5), all.next()).await.unwrap().unwrap().unwrap();
        assert_eq!(second.len(), 1);

        let mut one = repo.get_item_stream(id);
        let item = timeout(Duration::from_secs(5), one.next()).await.unwrap().unwrap().unwrap();
        assert_eq!(item.map(|i| i.name), Some("bolt".to_string()));
        all.unsubscribe();
    }

    struct CannedItems;

    #[async_trait]
    impl ItemsRepository for CannedItems {
        fn get_all_items_stream(&self) -> Subscription<Vec<Item>> {
            let (tx, rx) = mpsc::channel(1);
            let _ = tx.try_send(Ok(vec![Item::new("canned", 1.0, 1)]));
            Subscription::from_receiver(rx)
        }

        fn get_item_stream(&self, _id: i64) -> Subscription<Option<Item>> {
            let (_tx, rx) = mpsc::channel(1);
            Subscription::from_receiver(rx)
        }

        async fn insert_item(&self, _item: &Item) -> StoreResult<i64> {
            Ok(1)
        }

        async fn update_item(&self, _item: &Item) -> StoreResult<()> {
            Ok(())
        }

        async fn delete_item(&self, _item: &Item) -> StoreResult<bool> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn a_test_double_can_stand_in() {
        let repo: Arc<dyn ItemsRepository> = Arc::new(CannedItems);
        let mut stream = repo.get_all_items_stream();
        let items = stream.next().await.unwrap().unwrap();
        assert_eq!(items[0].name, "canned");
        assert!(stream.next().await.is_none());
    }
}
