use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Deserialize;
use tracing::info;

use crate::dao::{expect_row, id_param};
use crate::db::models::{now_millis, User};
use crate::db::{with_immediate_transaction, Database, Table};
use crate::error::{StoreError, StoreResult};

const COLUMNS: &str =
    "id, full_name, date_of_birth, secondary_school_email, password, date_created, date_updated";

/// Optional user rules. Both default to off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UserPolicy {
    /// Reject a second user with the same email.
    pub unique_email: bool,
    /// Stamp `date_updated` on every update.
    pub refresh_date_updated: bool,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Returns the assigned id.
    async fn insert_user(&self, user: &User) -> StoreResult<i64>;

    async fn update_user(&self, user: &User) -> StoreResult<()>;

    /// `false` if there was nothing to delete.
    async fn delete_user(&self, user: &User) -> StoreResult<bool>;

    async fn get_user(&self, id: i64) -> StoreResult<Option<User>>;

    async fn get_user_by_email_and_password(
        &self,
        email: &str,
        password: &str,
    ) -> StoreResult<Option<User>>;

    async fn get_user_by_full_name(&self, full_name: &str) -> StoreResult<Option<User>>;

    /// In no particular order.
    async fn get_all_users(&self) -> StoreResult<Vec<User>>;
}

pub struct UserDao {
    db: Database,
    policy: UserPolicy,
}

impl UserDao {
    pub fn new(db: Database, policy: UserPolicy) -> Self {
        Self { db, policy }
    }

    pub fn policy(&self) -> UserPolicy {
        self.policy
    }
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        full_name: row.get(1)?,
        date_of_birth: row.get(2)?,
        secondary_school_email: row.get(3)?,
        password: row.get(4)?,
        date_created: row.get(5)?,
        date_updated: row.get(6)?,
    })
}

fn ensure_email_free(conn: &Connection, email: &str, except_id: i64) -> StoreResult<()> {
    let taken: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM users WHERE secondary_school_email = ?1 AND id != ?2",
        params![email, except_id],
        |row| row.get(0),
    )?;
    if taken {
        return Err(StoreError::Constraint(format!("email already registered: {email}")));
    }
    Ok(())
}

fn insert_row(conn: &Connection, user: &User) -> StoreResult<i64> {
    conn.execute(
        "INSERT INTO users (id, full_name, date_of_birth, secondary_school_email, password, date_created, date_updated)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            id_param(user),
            user.full_name,
            user.date_of_birth,
            user.secondary_school_email,
            user.password,
            user.date_created,
            user.date_updated,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn update_row(conn: &Connection, user: &User, date_updated: i64) -> StoreResult<()> {
    let changed = conn.execute(
        "UPDATE users SET full_name = ?2, date_of_birth = ?3, secondary_school_email = ?4,
                          password = ?5, date_created = ?6, date_updated = ?7
         WHERE id = ?1",
        params![
            user.id,
            user.full_name,
            user.date_of_birth,
            user.secondary_school_email,
            user.password,
            user.date_created,
            date_updated,
        ],
    )?;
    expect_row(changed, "user", user.id)
}

#[async_trait]
impl UserStore for UserDao {
    async fn insert_user(&self, user: &User) -> StoreResult<i64> {
        let user = user.clone();
        let unique_email = self.policy.unique_email;

        let id = self
            .db
            .write(Table::Users, move |conn| {
                if unique_email {
                    with_immediate_transaction(conn, |conn| {
                        ensure_email_free(conn, &user.secondary_school_email, user.id)?;
                        insert_row(conn, &user)
                    })
                } else {
                    insert_row(conn, &user)
                }
            })
            .await?;

        info!(user_id = id, "User inserted");
        Ok(id)
    }

    async fn update_user(&self, user: &User) -> StoreResult<()> {
        let user = user.clone();
        let policy = self.policy;

        self.db
            .write(Table::Users, move |conn| {
                let date_updated = if policy.refresh_date_updated {
                    now_millis()
                } else {
                    user.date_updated
                };

                if policy.unique_email {
                    with_immediate_transaction(conn, |conn| {
                        ensure_email_free(conn, &user.secondary_school_email, user.id)?;
                        update_row(conn, &user, date_updated)
                    })
                } else {
                    update_row(conn, &user, date_updated)
                }
            })
            .await
    }

    async fn delete_user(&self, user: &User) -> StoreResult<bool> {
        let id = user.id;
        let deleted = self
            .db
            .write(Table::Users, move |conn| {
                Ok(conn.execute("DELETE FROM users WHERE id = ?1", params![id])? > 0)
            })
            .await?;

        if deleted {
            info!(user_id = id, "User deleted");
        }
        Ok(deleted)
    }

    async fn get_user(&self, id: i64) -> StoreResult<Option<User>> {
        self.db
            .call(move |conn| {
                Ok(conn
                    .query_row(
                        &format!("SELECT {COLUMNS} FROM users WHERE id = ?1"),
                        params![id],
                        from_row,
                    )
                    .optional()?)
            })
            .await
    }

    async fn get_user_by_email_and_password(
        &self,
        email: &str,
        password: &str,
    ) -> StoreResult<Option<User>> {
        let email = email.to_string();
        let password = password.to_string();
        self.db
            .call(move |conn| {
                Ok(conn
                    .query_row(
                        &format!(
                            "SELECT {COLUMNS} FROM users
                             WHERE secondary_school_email = ?1 AND password = ?2
                             LIMIT 1"
                        ),
                        params![email, password],
                        from_row,
                    )
                    .optional()?)
            })
            .await
    }

    async fn get_user_by_full_name(&self, full_name: &str) -> StoreResult<Option<User>> {
        let full_name = full_name.to_string();
        self.db
            .call(move |conn| {
                Ok(conn
                    .query_row(
                        &format!("SELECT {COLUMNS} FROM users WHERE full_name = ?1 LIMIT 1"),
                        params![full_name],
                        from_row,
                    )
                    .optional()?)
            })
            .await
    }

    async fn get_all_users(&self) -> StoreResult<Vec<User>> {
        self.db
            .call(|conn| {
                let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM users"))?;
                let users = stmt
                    .query_map([], from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(users)
            })
            .await
    }
}
