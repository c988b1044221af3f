use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{AppError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Customer {
    pub id: i64,
    pub name: String,
}

pub fn add_customer(conn: &Connection, name: &str) -> Result<Customer> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::validation("يرجى إدخال اسم العميل"));
    }
    conn.execute("INSERT INTO customers (name) VALUES (?)", params![name])?;
    let id = conn.last_insert_rowid();
    info!(customer_id = id, "customer added");
    Ok(Customer {
        id,
        name: name.to_string(),
    })
}

/// Sales keep their own copy of the customer name, so history is untouched.
pub fn delete_customer(conn: &Connection, id: i64) -> Result<()> {
    let removed = conn.execute("DELETE FROM customers WHERE id = ?", params![id])?;
    info!(customer_id = id, removed, "customer deleted");
    Ok(())
}

pub fn list_customers(conn: &Connection) -> Result<Vec<Customer>> {
    let mut stmt = conn.prepare("SELECT id, name FROM customers ORDER BY id")?;
    let rows = stmt.query_map([], |row| {
        Ok(Customer {
            id: row.get(0)?,
            name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        })
    })?;

    let mut customers = Vec::new();
    for row in rows {
        customers.push(row?);
    }
    debug!(count = customers.len(), "customers loaded");
    Ok(customers)
}

pub fn get_customer(conn: &Connection, id: i64) -> Result<Option<Customer>> {
    let customer = conn
        .query_row(
            "SELECT id, name FROM customers WHERE id = ?",
            params![id],
            |row| {
                Ok(Customer {
                    id: row.get(0)?,
                    name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                })
            },
        )
        .optional()?;
    Ok(customer)
}

/// Case-insensitive substring search; blank text matches everyone.
pub fn search_customers(conn: &Connection, text: &str) -> Result<Vec<Customer>> {
    let needle = text.trim().to_lowercase();
    let customers = list_customers(conn)?;
    if needle.is_empty() {
        return Ok(customers);
    }
    Ok(customers
        .into_iter()
        .filter(|c| c.name.to_lowercase().contains(&needle))
        .collect())
}
