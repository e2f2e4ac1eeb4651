//! Explicit schema definitions.
//!
//! The declared schema is data, not annotations: each table lists its
//! columns and indexes, and the migration runner renders DDL from it.

use std::fmt;

/// Version tag stored in `PRAGMA user_version`.
pub const SCHEMA_VERSION: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Users,
    Posts,
    Comments,
    Items,
}

impl Table {
    pub const ALL: [Table; 4] = [Table::Users, Table::Posts, Table::Comments, Table::Items];

    pub fn name(&self) -> &'static str {
        match self {
            Table::Users => "users",
            Table::Posts => "posts",
            Table::Comments => "comments",
            Table::Items => "items",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Real,
    Text,
}

impl ColumnType {
    fn sql(&self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub ty: ColumnType,
    pub primary_key: bool,
}

const fn pk(name: &'static str) -> Column {
    Column {
        name,
        ty: ColumnType::Integer,
        primary_key: true,
    }
}

const fn col(name: &'static str, ty: ColumnType) -> Column {
    Column {
        name,
        ty,
        primary_key: false,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TableSchema {
    pub table: Table,
    pub columns: &'static [Column],
    pub indexes: &'static [&'static str],
}

impl TableSchema {
    /// `CREATE TABLE IF NOT EXISTS` for this table. Primary keys use
    /// AUTOINCREMENT so a deleted row's id is never handed out again.
    pub fn create_sql(&self) -> String {
        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|c| {
                if c.primary_key {
                    format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", c.name)
                } else {
                    format!("{} {} NOT NULL", c.name, c.ty.sql())
                }
            })
            .collect();

        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
            self.table.name(),
            columns.join(",\n    ")
        )
    }
}

pub const USERS: TableSchema = TableSchema {
    table: Table::Users,
    columns: &[
        pk("id"),
        col("full_name", ColumnType::Text),
        col("date_of_birth", ColumnType::Text),
        col("secondary_school_email", ColumnType::Text),
        col("password", ColumnType::Text),
        col("date_created", ColumnType::Integer),
        col("date_updated", ColumnType::Integer),
    ],
    // Not UNIQUE: duplicate emails are allowed unless UserPolicy says otherwise.
    indexes: &["CREATE INDEX IF NOT EXISTS idx_users_email ON users(secondary_school_email)"],
};

pub const POSTS: TableSchema = TableSchema {
    table: Table::Posts,
    columns: &[
        pk("id"),
        col("title", ColumnType::Text),
        col("content", ColumnType::Text),
        col("author", ColumnType::Text),
        col("timestamp", ColumnType::Integer),
        col("likes", ColumnType::Integer),
        col("dislikes", ColumnType::Integer),
    ],
    indexes: &["CREATE INDEX IF NOT EXISTS idx_posts_timestamp ON posts(timestamp)"],
};

// post_id is a logical reference only; comments may outlive their post.
pub const COMMENTS: TableSchema = TableSchema {
    table: Table::Comments,
    columns: &[
        pk("id"),
        col("post_id", ColumnType::Integer),
        col("title", ColumnType::Text),
        col("content", ColumnType::Text),
        col("author", ColumnType::Text),
        col("timestamp", ColumnType::Integer),
    ],
    indexes: &["CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id, timestamp)"],
};

pub const ITEMS: TableSchema = TableSchema {
    table: Table::Items,
    columns: &[
        pk("id"),
        col("name", ColumnType::Text),
        col("price", ColumnType::Real),
        col("quantity", ColumnType::Integer),
    ],
    indexes: &["CREATE INDEX IF NOT EXISTS idx_items_name ON items(name)"],
};

pub const TABLES: &[TableSchema] = &[USERS, POSTS, COMMENTS, ITEMS];

/// A versioned set of tables.
#[derive(Debug, Clone)]
pub struct Schema {
    pub version: u32,
    pub tables: &'static [TableSchema],
}

impl Schema {
    pub fn current() -> Self {
        Self {
            version: SCHEMA_VERSION,
            tables: TABLES,
        }
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn table(&self, table: Table) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.table == table)
    }

    /// Every statement needed to build this schema from scratch.
    pub fn create_statements(&self) -> Vec<String> {
        let mut stmts: Vec<String> = self.tables.iter().map(|t| t.create_sql()).collect();
        stmts.extend(
            self.tables
                .iter()
                .flat_map(|t| t.indexes.iter().map(|i| i.to_string())),
        );
        stmts
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_schema_declares_all_four_tables() {
        let schema = Schema::current();
        assert_eq!(schema.version, SCHEMA_VERSION);
        for table in Table::ALL {
            assert!(schema.table(table).is_some(), "missing {table}");
        }
    }

    #[test]
    fn create_sql_renders_autoincrement_primary_key() {
        let sql = POSTS.create_sql();
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS posts"));
        assert!(sql.contains("id INTEGER PRIMARY KEY AUTOINCREMENT"));
        assert!(sql.contains("likes INTEGER NOT NULL"));
        assert!(!sql.contains("REFERENCES"));
    }

    #[test]
    fn users_email_is_not_unique() {
        assert!(USERS.indexes.iter().all(|i| !i.contains("UNIQUE")));
    }

    #[test]
    fn create_statements_execute_cleanly() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        for stmt in Schema::current().create_statements() {
            conn.execute_batch(&stmt).unwrap();
        }

        let mut names: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        names.sort();
        assert_eq!(names, vec!["comments", "items", "posts", "users"]);
    }

    #[test]
    fn with_version_only_changes_the_tag() {
        let bumped = Schema::current().with_version(7);
        assert_eq!(bumped.version, 7);
        assert_eq!(bumped.tables.len(), Schema::current().tables.len());
    }
}
