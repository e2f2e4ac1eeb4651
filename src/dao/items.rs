use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::dao::{expect_row, id_param};
use crate::db::models::Item;
use crate::db::{Database, Subscription, Table};
use crate::error::StoreResult;

const COLUMNS: &str = "id, name, price, quantity";

#[async_trait]
pub trait ItemStore: Send + Sync {
    async fn insert(&self, item: &Item) -> StoreResult<i64>;

    async fn update(&self, item: &Item) -> StoreResult<()>;

    async fn delete(&self, item: &Item) -> StoreResult<bool>;

    async fn get_item(&self, id: i64) -> StoreResult<Option<Item>>;

    /// Emits `None` while no item has this id.
    fn observe_item(&self, id: i64) -> Subscription<Option<Item>>;

    /// Sorted by name, ascending.
    fn observe_all_items(&self) -> Subscription<Vec<Item>>;
}

pub struct ItemDao {
    db: Database,
}

impl ItemDao {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<Item> {
    Ok(Item {
        id: row.get(0)?,
        name: row.get(1)?,
        price: row.get(2)?,
        quantity: row.get(3)?,
    })
}

fn item_by_id(conn: &Connection, id: i64) -> StoreResult<Option<Item>> {
    Ok(conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM items WHERE id = ?1"),
            params![id],
            from_row,
        )
        .optional()?)
}

fn all_items(conn: &Connection) -> StoreResult<Vec<Item>> {
    let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM items ORDER BY name ASC"))?;
    let items = stmt
        .query_map([], from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(items)
}

#[async_trait]
impl ItemStore for ItemDao {
    async fn insert(&self, item: &Item) -> StoreResult<i64> {
        let item = item.clone();
        self.db
            .write(Table::Items, move |conn| {
                conn.execute(
                    "INSERT INTO items (id, name, price, quantity) VALUES (?1, ?2, ?3, ?4)",
                    params![id_param(&item), item.name, item.price, item.quantity],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
    }

    async fn update(&self, item: &Item) -> StoreResult<()> {
        let item = item.clone();
        self.db
            .write(Table::Items, move |conn| {
                let changed = conn.execute(
                    "UPDATE items SET name = ?2, price = ?3, quantity = ?4 WHERE id = ?1",
                    params![item.id, item.name, item.price, item.quantity],
                )?;
                expect_row(changed, "item", item.id)
            })
            .await
    }

    async fn delete(&self, item: &Item) -> StoreResult<bool> {
        let id = item.id;
        self.db
            .write(Table::Items, move |conn| {
                Ok(conn.execute("DELETE FROM items WHERE id = ?1", params![id])? > 0)
            })
            .await
    }

    async fn get_item(&self, id: i64) -> StoreResult<Option<Item>> {
        self.db.call(move |conn| item_by_id(conn, id)).await
    }

    fn observe_item(&self, id: i64) -> Subscription<Option<Item>> {
        Subscription::spawn(self.db.clone(), Table::Items, move |conn| {
            item_by_id(conn, id)
        })
    }

    fn observe_all_items(&self) -> Subscription<Vec<Item>> {
        Subscription::spawn(self.db.clone(), Table::Items, all_items)
    }
}
