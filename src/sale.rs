//! The sale in progress for the selected customer.
//!
//! `Idle` until a customer is picked, then `Selecting` while quantities are
//! adjusted. `commit` checks stock, decrements it and appends the history
//! row inside one SQLite transaction, then returns to `Idle`.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::catalog::Item;
use crate::customers::Customer;
use crate::error::{AppError, Result, StockShortfall};
use crate::history::{self, SaleRecord};
use crate::timestamp;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaleLine {
    pub item_id: i64,
    pub name: String,
    pub unit_price: f64,
    pub quantity: i64,
}

impl SaleLine {
    pub fn subtotal(&self) -> f64 {
        self.unit_price * self.quantity as f64
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum SaleState {
    #[default]
    Idle,
    Selecting {
        customer: Customer,
        lines: BTreeMap<i64, SaleLine>,
    },
}

/// Read-only projection of the builder for the sale screen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaleView {
    pub customer: Option<Customer>,
    pub lines: Vec<SaleLine>,
    pub total: f64,
}

#[derive(Debug, Clone)]
pub struct SaleBuilder {
    state: SaleState,
    unit_label: String,
}

impl SaleBuilder {
    pub fn new(unit_label: impl Into<String>) -> Self {
        Self {
            state: SaleState::Idle,
            unit_label: unit_label.into(),
        }
    }

    pub fn state(&self) -> &SaleState {
        &self.state
    }

    pub fn customer(&self) -> Option<&Customer> {
        match &self.state {
            SaleState::Idle => None,
            SaleState::Selecting { customer, .. } => Some(customer),
        }
    }

    /// Starts selling to `customer`. Re-selecting the same customer keeps
    /// the quantities already entered.
    pub fn select_customer(&mut self, customer: Customer) {
        if self.customer().map(|c| c.id) == Some(customer.id) {
            return;
        }
        debug!(customer_id = customer.id, "sale started");
        self.state = SaleState::Selecting {
            customer,
            lines: BTreeMap::new(),
        };
    }

    pub fn cancel(&mut self) {
        self.state = SaleState::Idle;
    }

    pub fn lines(&self) -> Vec<&SaleLine> {
        match &self.state {
            SaleState::Idle => Vec::new(),
            SaleState::Selecting { lines, .. } => lines.values().collect(),
        }
    }

    pub fn quantity_of(&self, item_id: i64) -> i64 {
        match &self.state {
            SaleState::Idle => 0,
            SaleState::Selecting { lines, .. } => lines.get(&item_id).map_or(0, |l| l.quantity),
        }
    }

    /// Sets how many of `item` go into the sale, at the item's current price.
    /// Negative quantities are ignored; zero drops the line.
    pub fn set_quantity(&mut self, item: &Item, quantity: i64) -> Result<()> {
        let SaleState::Selecting { lines, .. } = &mut self.state else {
            return Err(AppError::validation("يرجى اختيار العميل أولاً"));
        };
        if quantity < 0 {
            return Ok(());
        }
        if quantity == 0 {
            lines.remove(&item.id);
            return Ok(());
        }
        lines.insert(
            item.id,
            SaleLine {
                item_id: item.id,
                name: item.name.clone(),
                unit_price: item.price,
                quantity,
            },
        );
        Ok(())
    }

    pub fn increment(&mut self, item: &Item) -> Result<()> {
        let next = self.quantity_of(item.id) + 1;
        self.set_quantity(item, next)
    }

    pub fn decrement(&mut self, item: &Item) -> Result<()> {
        let next = (self.quantity_of(item.id) - 1).max(0);
        self.set_quantity(item, next)
    }

    pub fn total(&self) -> f64 {
        self.lines().iter().map(|l| l.subtotal()).sum()
    }

    pub fn view(&self) -> SaleView {
        SaleView {
            customer: self.customer().cloned(),
            lines: self.lines().into_iter().cloned().collect(),
            total: self.total(),
        }
    }

    pub fn commit(&mut self, conn: &mut Connection) -> Result<SaleRecord> {
        self.commit_at(conn, &timestamp::now())
    }

    /// Finalizes the sale. An empty sale is refused and leaves the builder
    /// as it was; any other outcome returns the builder to `Idle`.
    pub fn commit_at(&mut self, conn: &mut Connection, at: &DateTime<FixedOffset>) -> Result<SaleRecord> {
        let has_lines = matches!(&self.state, SaleState::Selecting { lines, .. } if !lines.is_empty());
        if !has_lines {
            return Err(AppError::EmptySale);
        }
        let SaleState::Selecting { customer, lines } = std::mem::take(&mut self.state) else {
            return Err(AppError::EmptySale);
        };

        match write_sale(conn, &customer, &lines, &self.unit_label, at) {
            Ok(record) => {
                info!(sale_id = record.id, customer = %customer.name, total = record.total, "sale committed");
                Ok(record)
            }
            Err(err) => {
                warn!(customer = %customer.name, error = %err, "sale rejected");
                Err(err)
            }
        }
    }
}

struct SoldLine {
    item_id: i64,
    name: String,
    unit_price: f64,
    quantity: i64,
}

fn write_sale(
    conn: &mut Connection,
    customer: &Customer,
    lines: &BTreeMap<i64, SaleLine>,
    unit_label: &str,
    at: &DateTime<FixedOffset>,
) -> Result<SaleRecord> {
    let tx = conn.transaction()?;

    let mut sold = Vec::with_capacity(lines.len());
    let mut shortfalls = Vec::new();
    for line in lines.values() {
        let current = tx
            .query_row(
                "SELECT name, price, IFNULL(stock_quantity, 0) FROM items WHERE id = ?",
                params![line.item_id],
                |row| {
                    Ok((
                        row.get::<_, Option<String>>(0)?,
                        row.get::<_, Option<f64>>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )
            .optional()?;
        let Some((name, price, stock)) = current else {
            return Err(AppError::validation(format!(
                "الصنف \"{}\" لم يعد موجوداً",
                line.name
            )));
        };
        let name = name.unwrap_or_else(|| line.name.clone());
        if line.quantity > stock {
            shortfalls.push(StockShortfall {
                item_id: line.item_id,
                name,
                available: stock,
                requested: line.quantity,
            });
            continue;
        }
        sold.push(SoldLine {
            item_id: line.item_id,
            name,
            unit_price: price.unwrap_or(line.unit_price),
            quantity: line.quantity,
        });
    }
    if !shortfalls.is_empty() {
        // dropping `tx` rolls back; nothing has been written yet
        return Err(AppError::InsufficientStock(shortfalls));
    }

    for line in &sold {
        tx.execute(
            "UPDATE items SET stock_quantity = IFNULL(stock_quantity, 0) - ? WHERE id = ?",
            params![line.quantity, line.item_id],
        )?;
    }

    let items = history::format_line_items(
        sold.iter().map(|l| (l.name.as_str(), l.quantity)),
        unit_label,
    );
    let total: f64 = sold.iter().map(|l| l.unit_price * l.quantity as f64).sum();
    let record = history::record(&tx, &customer.name, &items, total, at)?;

    tx.commit()?;
    Ok(record)
}
