use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{AppError, Result};

/// Reference to a picked image. Stored in `items.image` as `{"uri": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub uri: String,
}

impl ImageRef {
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }

    fn to_db(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| AppError::Config(format!("image reference: {e}")))
    }

    /// Accepts the JSON object form and bare URIs written by hand.
    fn from_db(raw: Option<String>) -> Option<Self> {
        let raw = raw?;
        let raw = raw.trim();
        if raw.is_empty() || raw == "null" {
            return None;
        }
        serde_json::from_str::<ImageRef>(raw)
            .ok()
            .or_else(|| Some(ImageRef::new(raw)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Item {
    pub id: i64,
    pub name: String,
    pub price: f64,
    pub pieces: i64,
    pub stock_quantity: i64,
    pub image: Option<ImageRef>,
}

/// Raw form input, as typed on the add/update item screens.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemForm {
    pub name: String,
    pub price: String,
    #[serde(default)]
    pub pieces: Option<String>,
    #[serde(default)]
    pub stock_quantity: Option<String>,
    #[serde(default)]
    pub image: Option<ImageRef>,
}

#[derive(Debug, PartialEq)]
struct ValidItem {
    name: String,
    price: f64,
    pieces: i64,
    stock_quantity: i64,
}

impl ItemForm {
    pub fn new(name: &str, price: &str) -> Self {
        Self {
            name: name.to_string(),
            price: price.to_string(),
            ..Self::default()
        }
    }

    pub fn pieces(mut self, pieces: &str) -> Self {
        self.pieces = Some(pieces.to_string());
        self
    }

    pub fn stock(mut self, stock: &str) -> Self {
        self.stock_quantity = Some(stock.to_string());
        self
    }

    pub fn image(mut self, image: ImageRef) -> Self {
        self.image = Some(image);
        self
    }

    fn validate(&self) -> Result<ValidItem> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(AppError::validation("يرجى إدخال اسم الصنف"));
        }
        let price_text = self.price.trim();
        if price_text.is_empty() {
            return Err(AppError::validation("يرجى إدخال سعر الصنف"));
        }
        let price = price_text
            .parse::<f64>()
            .ok()
            .filter(|p| p.is_finite() && *p > 0.0)
            .ok_or_else(|| AppError::validation("يرجى إدخال سعر صحيح"))?;

        Ok(ValidItem {
            name: name.to_string(),
            price,
            pieces: parse_count(self.pieces.as_deref(), 1).unwrap_or(1),
            stock_quantity: parse_count(self.stock_quantity.as_deref(), 0).unwrap_or(0),
        })
    }
}

/// Whole number at or above `min`; anything else means "use the default".
fn parse_count(raw: Option<&str>, min: i64) -> Option<i64> {
    raw?.trim().parse::<i64>().ok().filter(|n| *n >= min)
}

const ITEM_COLUMNS: &str = "id, name, price, pieces, stock_quantity, image";

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<Item> {
    Ok(Item {
        id: row.get(0)?,
        name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        price: row.get::<_, Option<f64>>(2)?.unwrap_or(0.0),
        pieces: row.get::<_, Option<i64>>(3)?.unwrap_or(1),
        stock_quantity: row.get::<_, Option<i64>>(4)?.unwrap_or(0),
        image: ImageRef::from_db(row.get(5)?),
    })
}

pub fn add_item(conn: &Connection, form: &ItemForm) -> Result<Item> {
    let valid = form.validate()?;
    let image = form.image.as_ref().map(ImageRef::to_db).transpose()?;
    conn.execute(
        "INSERT INTO items (name, price, image, pieces, stock_quantity) VALUES (?, ?, ?, ?, ?)",
        params![valid.name, valid.price, image, valid.pieces, valid.stock_quantity],
    )?;
    let id = conn.last_insert_rowid();
    info!(item_id = id, name = %valid.name, "item added");

    Ok(Item {
        id,
        name: valid.name,
        price: valid.price,
        pieces: valid.pieces,
        stock_quantity: valid.stock_quantity,
        image: form.image.clone(),
    })
}

/// Replaces name, price, pieces and stock. The image is left alone; see [`set_item_image`].
pub fn update_item(conn: &Connection, id: i64, form: &ItemForm) -> Result<Item> {
    let valid = form.validate()?;
    let changed = conn.execute(
        "UPDATE items SET name = ?, price = ?, pieces = ?, stock_quantity = ? WHERE id = ?",
        params![valid.name, valid.price, valid.pieces, valid.stock_quantity, id],
    )?;
    if changed == 0 {
        return Err(AppError::validation("الصنف غير موجود"));
    }
    info!(item_id = id, "item updated");
    require_item(conn, id)
}

pub fn set_item_image(conn: &Connection, id: i64, image: Option<&ImageRef>) -> Result<Item> {
    let stored = image.map(ImageRef::to_db).transpose()?;
    let changed = conn.execute("UPDATE items SET image = ? WHERE id = ?", params![stored, id])?;
    if changed == 0 {
        return Err(AppError::validation("الصنف غير موجود"));
    }
    info!(item_id = id, cleared = image.is_none(), "item image replaced");
    require_item(conn, id)
}

/// Removes the item and its display flag together.
pub fn delete_item(conn: &mut Connection, id: i64) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM display_items WHERE item_id = ?", params![id])?;
    let removed = tx.execute("DELETE FROM items WHERE id = ?", params![id])?;
    tx.commit()?;
    info!(item_id = id, removed, "item deleted");
    Ok(())
}

pub fn get_item(conn: &Connection, id: i64) -> Result<Option<Item>> {
    let sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?");
    Ok(conn.query_row(&sql, params![id], item_from_row).optional()?)
}

fn require_item(conn: &Connection, id: i64) -> Result<Item> {
    get_item(conn, id)?.ok_or_else(|| AppError::validation("الصنف غير موجود"))
}

pub fn list_items(conn: &Connection) -> Result<Vec<Item>> {
    let sql = format!("SELECT {ITEM_COLUMNS} FROM items ORDER BY id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], item_from_row)?;

    let mut items = Vec::new();
    for row in rows {
        items.push(row?);
    }
    debug!(count = items.len(), "items loaded");
    Ok(items)
}
