use std::fs;
use std::path::Path;

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::Result;

/// The one connection the app holds for its whole lifetime.
pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        info!(path = %path.display(), "opened sales database");
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        // deletes cascade explicitly in code, not through foreign keys
        conn.execute_batch("PRAGMA foreign_keys = OFF;")?;
        Self::run_migrations(&mut conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    fn run_migrations(conn: &mut Connection) -> Result<()> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS customers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT
            );

            CREATE TABLE IF NOT EXISTS items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT,
                price REAL,
                image TEXT,
                pieces INTEGER DEFAULT 1,
                stock_quantity INTEGER DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS sales_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                customer_name TEXT,
                items TEXT,
                total REAL,
                date TEXT
            );

            CREATE TABLE IF NOT EXISTS display_items (
                item_id INTEGER PRIMARY KEY,
                is_displayed INTEGER
            );
            ",
        )?;
        // databases from the first releases predate these columns
        ensure_column(
            conn,
            "items",
            "pieces",
            "ALTER TABLE items ADD COLUMN pieces INTEGER DEFAULT 1",
        )?;
        ensure_column(
            conn,
            "items",
            "stock_quantity",
            "ALTER TABLE items ADD COLUMN stock_quantity INTEGER DEFAULT 0",
        )?;
        Ok(())
    }
}

fn ensure_column(conn: &mut Connection, table: &str, column: &str, alter_sql: &str) -> Result<()> {
    let pragma = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&pragma)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(());
        }
    }
    drop(rows);
    drop(stmt);
    debug!(table, column, "adding missing column");
    conn.execute(alter_sql, [])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(conn: &Connection, table: &str) -> Vec<String> {
        let mut stmt = conn
            .prepare(&format!("PRAGMA table_info({})", table))
            .expect("prepare");
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .expect("query");
        rows.map(|r| r.expect("row")).collect()
    }

    #[test]
    fn fresh_database_has_every_table() {
        let db = Database::open_in_memory().expect("open");
        assert_eq!(
            columns(db.conn(), "items"),
            vec!["id", "name", "price", "image", "pieces", "stock_quantity"]
        );
        assert_eq!(columns(db.conn(), "customers"), vec!["id", "name"]);
        assert_eq!(
            columns(db.conn(), "sales_history"),
            vec!["id", "customer_name", "items", "total", "date"]
        );
        assert_eq!(columns(db.conn(), "display_items"), vec!["item_id", "is_displayed"]);
    }

    #[test]
    fn old_items_table_gains_stock_columns() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("sellsnap.db");
        {
            let conn = Connection::open(&path).expect("open raw");
            conn.execute_batch(
                "CREATE TABLE items (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT, price REAL, image TEXT);
                 INSERT INTO items (name, price) VALUES ('Tea', 2.5);",
            )
            .expect("seed");
        }

        let db = Database::open(&path).expect("migrate");
        let (pieces, stock): (i64, i64) = db
            .conn()
            .query_row(
                "SELECT pieces, stock_quantity FROM items WHERE name = 'Tea'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .expect("row");
        assert_eq!((pieces, stock), (1, 0));
    }

    #[test]
    fn reopening_keeps_data() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("sellsnap.db");
        {
            let db = Database::open(&path).expect("open");
            db.conn()
                .execute("INSERT INTO customers (name) VALUES ('Ali')", [])
                .expect("insert");
        }
        let db = Database::open(&path).expect("reopen");
        let count: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM customers", [], |row| row.get(0))
            .expect("count");
        assert_eq!(count, 1);
    }
}
