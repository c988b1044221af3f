use std::collections::BTreeSet;

use rusqlite::{params, Connection};
use tracing::{info, warn};

use crate::catalog::Item;
use crate::error::Result;

/// Which catalog items the sale screen offers. A row in `display_items`
/// means displayed; no row means hidden.
#[derive(Debug, Default, Clone)]
pub struct DisplaySelection {
    displayed: BTreeSet<i64>,
}

impl DisplaySelection {
    pub fn load(conn: &Connection) -> Result<Self> {
        let mut stmt = conn.prepare(
            "SELECT item_id FROM display_items WHERE IFNULL(is_displayed, 1) != 0 ORDER BY item_id",
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;

        let mut displayed = BTreeSet::new();
        for row in rows {
            displayed.insert(row?);
        }
        Ok(Self { displayed })
    }

    pub fn is_displayed(&self, item_id: i64) -> bool {
        self.displayed.contains(&item_id)
    }

    pub fn displayed_item_ids(&self) -> BTreeSet<i64> {
        self.displayed.clone()
    }

    /// Flips the item and writes it through. A failed write puts the
    /// in-memory flag back before the error is returned.
    pub fn toggle(&mut self, conn: &Connection, item_id: i64) -> Result<bool> {
        let show = !self.displayed.contains(&item_id);
        self.apply(item_id, show);

        let written = if show {
            conn.execute(
                "INSERT OR REPLACE INTO display_items (item_id, is_displayed) VALUES (?, 1)",
                params![item_id],
            )
        } else {
            conn.execute("DELETE FROM display_items WHERE item_id = ?", params![item_id])
        };

        match written {
            Ok(_) => {
                info!(item_id, displayed = show, "display flag toggled");
                Ok(show)
            }
            Err(err) => {
                self.apply(item_id, !show);
                warn!(item_id, error = %err, "display flag not saved, reverted");
                Err(err.into())
            }
        }
    }

    /// Drops an item that no longer exists in the catalog.
    pub fn forget(&mut self, item_id: i64) {
        self.displayed.remove(&item_id);
    }

    /// The catalog as the sale screen sees it.
    pub fn displayed_items<'a>(&self, items: &'a [Item]) -> Vec<&'a Item> {
        items.iter().filter(|i| self.is_displayed(i.id)).collect()
    }

    fn apply(&mut self, item_id: i64, show: bool) {
        if show {
            self.displayed.insert(item_id);
        } else {
            self.displayed.remove(&item_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{self, ItemForm};
    use crate::db::Database;
    use crate::error::AppError;

    fn persisted(conn: &Connection) -> Vec<(i64, i64)> {
        let mut stmt = conn
            .prepare("SELECT item_id, is_displayed FROM display_items ORDER BY item_id")
            .expect("prepare");
        let rows = stmt
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))
            .expect("query");
        rows.map(|r| r.expect("row")).collect()
    }

    #[test]
    fn toggle_twice_returns_to_hidden_without_duplicates() {
        let db = Database::open_in_memory().expect("db");
        let item = catalog::add_item(db.conn(), &ItemForm::new("Tea", "2")).expect("add");
        let mut selection = DisplaySelection::load(db.conn()).expect("load");
        assert!(!selection.is_displayed(item.id));

        assert!(selection.toggle(db.conn(), item.id).expect("on"));
        assert_eq!(persisted(db.conn()), vec![(item.id, 1)]);

        assert!(!selection.toggle(db.conn(), item.id).expect("off"));
        assert!(persisted(db.conn()).is_empty());
        assert!(selection.displayed_item_ids().is_empty());
    }

    #[test]
    fn toggle_on_three_times_keeps_a_single_row() {
        let db = Database::open_in_memory().expect("db");
        let mut selection = DisplaySelection::default();
        selection.toggle(db.conn(), 7).expect("on");
        selection.toggle(db.conn(), 7).expect("off");
        selection.toggle(db.conn(), 7).expect("on");
        assert_eq!(persisted(db.conn()), vec![(7, 1)]);
        assert_eq!(selection.displayed_item_ids(), BTreeSet::from([7]));
    }

    #[test]
    fn failed_write_reverts_memory() {
        let db = Database::open_in_memory().expect("db");
        let mut selection = DisplaySelection::default();
        selection.toggle(db.conn(), 1).expect("on");

        db.conn()
            .execute_batch("DROP TABLE display_items;")
            .expect("drop");

        let err = selection.toggle(db.conn(), 1).expect_err("write must fail");
        assert!(matches!(err, AppError::Database(_)));
        assert!(selection.is_displayed(1));

        let err = selection.toggle(db.conn(), 2).expect_err("write must fail");
        assert!(matches!(err, AppError::Database(_)));
        assert!(!selection.is_displayed(2));
    }

    #[test]
    fn load_reads_persisted_rows() {
        let db = Database::open_in_memory().expect("db");
        db.conn()
            .execute_batch(
                "INSERT INTO display_items (item_id, is_displayed) VALUES (3, 1);
                 INSERT INTO display_items (item_id, is_displayed) VALUES (5, 0);",
            )
            .expect("seed");
        let selection = DisplaySelection::load(db.conn()).expect("load");
        assert_eq!(selection.displayed_item_ids(), BTreeSet::from([3]));
    }

    #[test]
    fn displayed_items_filters_the_catalog() {
        let db = Database::open_in_memory().expect("db");
        let tea = catalog::add_item(db.conn(), &ItemForm::new("Tea", "2")).expect("add");
        let _bread = catalog::add_item(db.conn(), &ItemForm::new("Bread", "1")).expect("add");
        let mut selection = DisplaySelection::default();
        selection.toggle(db.conn(), tea.id).expect("on");

        let items = catalog::list_items(db.conn()).expect("list");
        let shown = selection.displayed_items(&items);
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].name, "Tea");

        selection.forget(tea.id);
        assert!(selection.displayed_items(&items).is_empty());
    }
}
