//! Completed sales.
//!
//! A sale is stored as one denormalized row: the customer's name at the
//! time of sale, its lines as display text, the frozen total and the sale
//! timestamp. Rows are appended by the sale commit and only ever deleted.

use std::cmp::Ordering;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::confirm::{Confirm, DeletePrompt};
use crate::error::{AppError, Result};
use crate::timestamp;

pub const LINE_SEPARATOR: &str = ", ";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaleRecord {
    pub id: i64,
    pub customer_name: String,
    pub items: String,
    pub total: f64,
    pub date: String,
}

impl SaleRecord {
    pub fn sold_at(&self) -> Option<NaiveDateTime> {
        timestamp::parse(&self.date)
    }
}

/// One line read back out of a stored `items` string.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedLineItem {
    pub name: String,
    pub quantity: i64,
    /// Only the oldest `"name (NxP)"` rows carry a unit price.
    pub unit_price: Option<f64>,
}

impl ParsedLineItem {
    fn new(name: &str, quantity: i64) -> Self {
        Self {
            name: name.trim().to_string(),
            quantity,
            unit_price: None,
        }
    }
}

/// A history row ready for display: stored fields plus its parsed lines.
/// The total shown is always the stored one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub record: SaleRecord,
    pub lines: Vec<ParsedLineItem>,
}

impl From<SaleRecord> for HistoryEntry {
    fn from(record: SaleRecord) -> Self {
        let lines = parse_line_items(&record.items);
        Self { record, lines }
    }
}

// "Juice: 4 قطعة"
static UNIT_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<name>.+?):\s*(?P<qty>\d+)(?:\s+\S.*)?$").expect("unit line pattern"));
// "Juice x 4"
static TIMES_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<name>.+?)\s+[xX×]\s*(?P<qty>\d+)$").expect("times line pattern"));
// "Juice (4x5)"
static PRICED_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<name>.+?)\s*\((?P<qty>\d+)\s*[xX×]\s*(?P<price>\d+(?:\.\d+)?)\)$")
        .expect("priced line pattern")
});

/// Reads the lines of a stored sale. Every format the app has ever written
/// is recognized; an entry matching none of them counts as one unit.
pub fn parse_line_items(serialized: &str) -> Vec<ParsedLineItem> {
    serialized
        .split(LINE_SEPARATOR)
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(parse_entry)
        .collect()
}

fn parse_entry(entry: &str) -> ParsedLineItem {
    if let Some(caps) = PRICED_LINE.captures(entry) {
        if let Ok(quantity) = caps["qty"].parse() {
            return ParsedLineItem {
                unit_price: caps["price"].parse().ok(),
                ..ParsedLineItem::new(&caps["name"], quantity)
            };
        }
    }
    for pattern in [&*UNIT_LINE, &*TIMES_LINE] {
        if let Some(caps) = pattern.captures(entry) {
            if let Ok(quantity) = caps["qty"].parse() {
                return ParsedLineItem::new(&caps["name"], quantity);
            }
        }
    }
    ParsedLineItem::new(entry, 1)
}

/// Writes sold lines in the current `"<name>: <qty> <unit>"` form.
pub fn format_line_items<'a, I>(lines: I, unit_label: &str) -> String
where
    I: IntoIterator<Item = (&'a str, i64)>,
{
    lines
        .into_iter()
        .map(|(name, quantity)| format!("{name}: {quantity} {unit_label}"))
        .collect::<Vec<_>>()
        .join(LINE_SEPARATOR)
}

/// Calendar components picked on the filter and delete screens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateFilter {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub day: Option<u32>,
}

impl DateFilter {
    pub fn year(year: i32) -> Self {
        Self {
            year: Some(year),
            ..Self::default()
        }
    }

    pub fn month(mut self, month: u32) -> Self {
        self.month = Some(month);
        self
    }

    pub fn day(mut self, day: u32) -> Self {
        self.day = Some(day);
        self
    }

    /// Builds a filter from picker text such as `("2024", "9", "")`.
    /// Blank fields are unconstrained.
    pub fn parse(year: &str, month: &str, day: &str) -> Result<Self> {
        let filter = Self {
            year: parse_component(year, 1, 9999, "يرجى إدخال سنة صحيحة")?,
            month: parse_component(month, 1, 12, "يرجى إدخال شهر صحيح")?,
            day: parse_component(day, 1, 31, "يرجى إدخال يوم صحيح")?,
        };
        Ok(filter)
    }

    pub fn is_empty(&self) -> bool {
        self.year.is_none() && self.month.is_none() && self.day.is_none()
    }

    pub fn matches(&self, at: &NaiveDateTime) -> bool {
        self.year.map_or(true, |y| at.year() == y)
            && self.month.map_or(true, |m| at.month() == m)
            && self.day.map_or(true, |d| at.day() == d)
    }

    /// `"2024"`, `"09/2024"` or `"05/09/2024"`, the label shown on the
    /// history screen while a filter is active.
    pub fn describe(&self) -> String {
        match (self.year, self.month, self.day) {
            (Some(y), Some(m), Some(d)) => format!("{d:02}/{m:02}/{y}"),
            (Some(y), Some(m), None) => format!("{m:02}/{y}"),
            (Some(y), None, _) => y.to_string(),
            _ => String::new(),
        }
    }

    fn require_for_deletion(&self) -> Result<()> {
        if self.year.is_none() {
            return Err(AppError::validation("يرجى إدخال السنة على الأقل"));
        }
        if self.day.is_some() && self.month.is_none() {
            return Err(AppError::validation("يرجى إدخال الشهر مع اليوم"));
        }
        Ok(())
    }
}

fn parse_component<T>(raw: &str, min: T, max: T, message: &str) -> Result<Option<T>>
where
    T: std::str::FromStr + PartialOrd,
{
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    match raw.parse::<T>() {
        Ok(value) if value >= min && value <= max => Ok(Some(value)),
        _ => Err(AppError::validation(message)),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryFilter {
    /// Case-insensitive substring of the customer name.
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub date: DateFilter,
}

impl HistoryFilter {
    pub fn customer(text: &str) -> Self {
        Self {
            customer: Some(text.to_string()),
            ..Self::default()
        }
    }

    pub fn with_date(mut self, date: DateFilter) -> Self {
        self.date = date;
        self
    }

    fn matches(&self, record: &SaleRecord, sold_at: Option<&NaiveDateTime>) -> bool {
        if let Some(needle) = self.customer.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            if !record
                .customer_name
                .to_lowercase()
                .contains(&needle.to_lowercase())
            {
                return false;
            }
        }
        if self.date.is_empty() {
            return true;
        }
        sold_at.map_or(false, |at| self.date.matches(at))
    }
}

pub fn record(
    conn: &Connection,
    customer_name: &str,
    items: &str,
    total: f64,
    at: &DateTime<FixedOffset>,
) -> Result<SaleRecord> {
    let date = timestamp::format(at);
    conn.execute(
        "INSERT INTO sales_history (customer_name, items, total, date) VALUES (?, ?, ?, ?)",
        params![customer_name, items, total, date],
    )?;
    let id = conn.last_insert_rowid();
    info!(sale_id = id, total, "sale recorded");
    Ok(SaleRecord {
        id,
        customer_name: customer_name.to_string(),
        items: items.to_string(),
        total,
        date,
    })
}

fn fetch_all(conn: &Connection) -> Result<Vec<SaleRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, customer_name, items, total, date FROM sales_history ORDER BY id DESC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(SaleRecord {
            id: row.get(0)?,
            customer_name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            items: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            total: row.get::<_, Option<f64>>(3)?.unwrap_or(0.0),
            date: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        })
    })?;

    let mut records = Vec::new();
    for row in rows {
        records.push(row?);
    }
    Ok(records)
}

/// Matching sales, newest first. Rows whose date can't be read sort last.
pub fn list(conn: &Connection, filter: &HistoryFilter) -> Result<Vec<SaleRecord>> {
    let mut dated: Vec<(Option<NaiveDateTime>, SaleRecord)> = fetch_all(conn)?
        .into_iter()
        .map(|r| (r.sold_at(), r))
        .filter(|(at, r)| filter.matches(r, at.as_ref()))
        .collect();

    dated.sort_by(|(a_at, a), (b_at, b)| {
        let by_time = match (a_at, b_at) {
            (Some(a_at), Some(b_at)) => b_at.cmp(a_at),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_time.then_with(|| b.id.cmp(&a.id))
    });

    debug!(count = dated.len(), "history filtered");
    Ok(dated.into_iter().map(|(_, r)| r).collect())
}

pub fn list_entries(conn: &Connection, filter: &HistoryFilter) -> Result<Vec<HistoryEntry>> {
    Ok(list(conn, filter)?.into_iter().map(HistoryEntry::from).collect())
}

pub fn delete_by_id(conn: &Connection, id: i64) -> Result<()> {
    let removed = conn.execute("DELETE FROM sales_history WHERE id = ?", params![id])?;
    info!(sale_id = id, removed, "sale deleted");
    Ok(())
}

/// What a date deletion would remove, for the confirmation dialog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletionPreview {
    pub count: usize,
    pub description: String,
    #[serde(skip)]
    ids: Vec<i64>,
}

impl DeletionPreview {
    pub fn prompt(&self) -> DeletePrompt {
        DeletePrompt::new(format!(
            "هل أنت متأكد من حذف جميع سجلات المبيعات لـ {}؟ ({} سجل)",
            self.description, self.count
        ))
        .with_count(self.count)
    }
}

pub fn preview_delete_by_date(conn: &Connection, date: &DateFilter) -> Result<DeletionPreview> {
    date.require_for_deletion()?;
    let ids: Vec<i64> = list(conn, &HistoryFilter::default().with_date(*date))?
        .into_iter()
        .map(|r| r.id)
        .collect();
    Ok(DeletionPreview {
        count: ids.len(),
        description: date.describe(),
        ids,
    })
}

/// Deletes every sale on the given year, month or day once `confirm`
/// agrees. The prompt carries the number of matching rows. Returns how many
/// rows were deleted; zero when the user declines.
pub fn delete_by_date_pattern(
    conn: &mut Connection,
    date: &DateFilter,
    confirm: &dyn Confirm,
) -> Result<usize> {
    let preview = preview_delete_by_date(conn, date)?;
    if preview.count == 0 {
        debug!(filter = %preview.description, "nothing to delete");
        return Ok(0);
    }
    if !confirm.confirm(&preview.prompt()) {
        debug!(filter = %preview.description, "history deletion declined");
        return Ok(0);
    }

    let tx = conn.transaction()?;
    let mut deleted = 0;
    {
        let mut stmt = tx.prepare("DELETE FROM sales_history WHERE id = ?")?;
        for id in &preview.ids {
            deleted += stmt.execute(params![id])?;
        }
    }
    tx.commit()?;
    info!(filter = %preview.description, deleted, "history deleted by date");
    Ok(deleted)
}

/// Years offered by the date picker: this year and the ten before it.
pub fn year_options(today: NaiveDate) -> Vec<i32> {
    let current = today.year();
    (current - 10..=current).rev().collect()
}

pub fn month_options() -> Vec<String> {
    (1..=12).map(|m| format!("{m:02}")).collect()
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month >= 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map_or(31, |last| last.day())
}

/// Day choices; a month without a year is counted in a leap year.
pub fn day_options(year: Option<i32>, month: Option<u32>) -> Vec<String> {
    let days = match month {
        Some(m) => days_in_month(year.unwrap_or(2024), m),
        None => 31,
    };
    (1..=days).map(|d| format!("{d:02}")).collect()
}

/// Everything the year, month and day pickers offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PickerOptions {
    pub years: Vec<i32>,
    pub months: Vec<String>,
    pub days: Vec<String>,
}

impl PickerOptions {
    pub fn new(today: NaiveDate, year: Option<i32>, month: Option<u32>) -> Self {
        Self {
            years: year_options(today),
            months: month_options(),
            days: day_options(year, month),
        }
    }
}
