//! Single owner of everything the screens share.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::catalog::{self, ImageRef, Item, ItemForm};
use crate::config::AppConfig;
use crate::confirm::{Confirm, DeletePrompt};
use crate::customers::{self, Customer};
use crate::db::Database;
use crate::display::DisplaySelection;
use crate::error::{AppError, Result};
use crate::history::{
    self, DateFilter, DeletionPreview, HistoryEntry, HistoryFilter, PickerOptions, SaleRecord,
};
use crate::sale::{SaleBuilder, SaleView};

/// Which screen is showing. Only decides the projection the frontend renders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    #[default]
    Home,
    Customers,
    Catalog,
    DisplayManager,
    Sale,
    History,
}

/// Everything the frontend needs to draw the current screen.
#[derive(Debug, Serialize)]
pub struct AppData {
    pub view: View,
    pub items: Vec<Item>,
    /// The catalog as the sale screen offers it: displayed items only.
    pub sale_items: Vec<Item>,
    pub customers: Vec<Customer>,
    pub displayed_item_ids: Vec<i64>,
    pub sale: SaleView,
    pub sale_total_label: String,
    pub history: Vec<HistoryEntry>,
    pub history_filter: HistoryFilter,
    pub history_filter_label: String,
    pub currency_label: String,
}

pub struct PosState {
    db: Database,
    display: DisplaySelection,
    sale: SaleBuilder,
    view: View,
    history_filter: HistoryFilter,
    config: AppConfig,
}

impl PosState {
    pub fn open(path: &Path, config: AppConfig) -> Result<Self> {
        Self::with_database(Database::open(path)?, config)
    }

    pub fn open_in_memory(config: AppConfig) -> Result<Self> {
        Self::with_database(Database::open_in_memory()?, config)
    }

    fn with_database(db: Database, config: AppConfig) -> Result<Self> {
        let display = DisplaySelection::load(db.conn())?;
        Ok(Self {
            db,
            display,
            sale: SaleBuilder::new(config.unit_label.clone()),
            view: View::Home,
            history_filter: HistoryFilter::default(),
            config,
        })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn navigate(&mut self, view: View) {
        debug!(?view, "navigate");
        self.view = view;
    }

    // customers

    pub fn add_customer(&mut self, name: &str) -> Result<Customer> {
        customers::add_customer(self.db.conn(), name)
    }

    pub fn customers(&self) -> Result<Vec<Customer>> {
        customers::list_customers(self.db.conn())
    }

    pub fn search_customers(&self, text: &str) -> Result<Vec<Customer>> {
        customers::search_customers(self.db.conn(), text)
    }

    /// Returns false when the user backs out.
    pub fn delete_customer(&mut self, id: i64, confirm: &dyn Confirm) -> Result<bool> {
        let customer = customers::get_customer(self.db.conn(), id)?
            .ok_or_else(|| AppError::validation("العميل غير موجود"))?;
        let prompt = DeletePrompt::new(format!("هل أنت متأكد من حذف العميل \"{}\"؟", customer.name));
        if !confirm.confirm(&prompt) {
            return Ok(false);
        }
        customers::delete_customer(self.db.conn(), id)?;
        if self.sale.customer().map(|c| c.id) == Some(id) {
            self.sale.cancel();
        }
        Ok(true)
    }

    // catalog

    pub fn items(&self) -> Result<Vec<Item>> {
        catalog::list_items(self.db.conn())
    }

    pub fn add_item(&mut self, form: &ItemForm) -> Result<Item> {
        catalog::add_item(self.db.conn(), form)
    }

    pub fn update_item(&mut self, id: i64, form: &ItemForm) -> Result<Item> {
        catalog::update_item(self.db.conn(), id, form)
    }

    pub fn set_item_image(&mut self, id: i64, image: Option<ImageRef>) -> Result<Item> {
        catalog::set_item_image(self.db.conn(), id, image.as_ref())
    }

    pub fn delete_item(&mut self, id: i64, confirm: &dyn Confirm) -> Result<bool> {
        let item = catalog::get_item(self.db.conn(), id)?
            .ok_or_else(|| AppError::validation("الصنف غير موجود"))?;
        let prompt = DeletePrompt::new(format!("هل أنت متأكد من حذف الصنف \"{}\"؟", item.name));
        if !confirm.confirm(&prompt) {
            return Ok(false);
        }
        catalog::delete_item(self.db.conn_mut(), id)?;
        self.display.forget(id);
        if self.sale.quantity_of(id) > 0 {
            self.sale.set_quantity(&item, 0)?;
        }
        Ok(true)
    }

    // display selection

    pub fn toggle_display(&mut self, item_id: i64) -> Result<bool> {
        self.display.toggle(self.db.conn(), item_id)
    }

    pub fn displayed_items(&self) -> Result<Vec<Item>> {
        let items = self.items()?;
        Ok(self.display.displayed_items(&items).into_iter().cloned().collect())
    }

    // sale

    pub fn select_customer(&mut self, customer_id: i64) -> Result<()> {
        let customer = customers::get_customer(self.db.conn(), customer_id)?
            .ok_or_else(|| AppError::validation("العميل غير موجود"))?;
        self.sale.select_customer(customer);
        self.view = View::Sale;
        Ok(())
    }

    /// Only displayed items can gain quantity; lowering or clearing a line is always allowed.
    pub fn set_quantity(&mut self, item_id: i64, quantity: i64) -> Result<SaleView> {
        let adding = quantity > self.sale.quantity_of(item_id);
        let item = self.sellable_item(item_id, adding)?;
        self.sale.set_quantity(&item, quantity)?;
        Ok(self.sale.view())
    }

    pub fn increment_quantity(&mut self, item_id: i64) -> Result<SaleView> {
        let item = self.sellable_item(item_id, true)?;
        self.sale.increment(&item)?;
        Ok(self.sale.view())
    }

    pub fn decrement_quantity(&mut self, item_id: i64) -> Result<SaleView> {
        let item = self.sellable_item(item_id, false)?;
        self.sale.decrement(&item)?;
        Ok(self.sale.view())
    }

    fn sellable_item(&self, item_id: i64, adding: bool) -> Result<Item> {
        let item = catalog::get_item(self.db.conn(), item_id)?
            .ok_or_else(|| AppError::validation("الصنف غير موجود"))?;
        if adding && !self.display.is_displayed(item_id) {
            return Err(AppError::validation(format!(
                "الصنف \"{}\" غير معروض للبيع",
                item.name
            )));
        }
        Ok(item)
    }

    pub fn sale(&self) -> SaleView {
        self.sale.view()
    }

    pub fn cancel_sale(&mut self) {
        self.sale.cancel();
    }

    pub fn commit_sale(&mut self) -> Result<SaleRecord> {
        let record = self.sale.commit(self.db.conn_mut())?;
        info!(sale_id = record.id, "sale saved");
        Ok(record)
    }

    // history

    pub fn filter_history(&mut self, filter: HistoryFilter) -> Result<Vec<HistoryEntry>> {
        self.history_filter = filter;
        self.history()
    }

    pub fn history(&self) -> Result<Vec<HistoryEntry>> {
        history::list_entries(self.db.conn(), &self.history_filter)
    }

    pub fn delete_sale(&mut self, id: i64, confirm: &dyn Confirm) -> Result<bool> {
        if !confirm.confirm(&DeletePrompt::new("هل أنت متأكد من حذف سجل المبيعات؟")) {
            return Ok(false);
        }
        history::delete_by_id(self.db.conn(), id)?;
        Ok(true)
    }

    /// Choices for the year, month and day pickers on the history screens.
    pub fn history_picker_options(&self, year: Option<i32>, month: Option<u32>) -> PickerOptions {
        PickerOptions::new(chrono::Local::now().date_naive(), year, month)
    }

    pub fn preview_history_deletion(&self, date: &DateFilter) -> Result<DeletionPreview> {
        history::preview_delete_by_date(self.db.conn(), date)
    }

    pub fn delete_history_by_date(&mut self, date: &DateFilter, confirm: &dyn Confirm) -> Result<usize> {
        history::delete_by_date_pattern(self.db.conn_mut(), date, confirm)
    }

    pub fn snapshot(&self) -> Result<AppData> {
        let items = self.items()?;
        let sale_items = self.display.displayed_items(&items).into_iter().cloned().collect();
        let sale = self.sale.view();
        Ok(AppData {
            view: self.view,
            sale_items,
            items,
            customers: self.customers()?,
            displayed_item_ids: self.display.displayed_item_ids().into_iter().collect(),
            sale_total_label: self.config.format_amount(sale.total),
            sale,
            history: self.history()?,
            history_filter: self.history_filter.clone(),
            history_filter_label: self.history_filter.date.describe(),
            currency_label: self.config.currency_label.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confirm::Answered;

    fn state() -> PosState {
        PosState::open_in_memory(AppConfig::default()).expect("state")
    }

    #[test]
    fn declined_deletes_change_nothing() {
        let mut pos = state();
        let ali = pos.add_customer("Ali").expect("customer");
        let tea = pos.add_item(&ItemForm::new("Tea", "2")).expect("item");

        assert!(!pos.delete_customer(ali.id, &Answered(false)).expect("delete"));
        assert!(!pos.delete_item(tea.id, &Answered(false)).expect("delete"));
        assert_eq!(pos.customers().expect("customers").len(), 1);
        assert_eq!(pos.items().expect("items").len(), 1);

        assert!(pos.delete_customer(ali.id, &Answered(true)).expect("delete"));
        assert!(pos.customers().expect("customers").is_empty());
    }

    #[test]
    fn deleting_an_item_clears_its_flag_and_sale_line() {
        let mut pos = state();
        let ali = pos.add_customer("Ali").expect("customer");
        let tea = pos.add_item(&ItemForm::new("Tea", "2").stock("5")).expect("item");
        pos.toggle_display(tea.id).expect("toggle");
        pos.select_customer(ali.id).expect("select");
        pos.set_quantity(tea.id, 2).expect("qty");

        assert!(pos.delete_item(tea.id, &Answered(true)).expect("delete"));
        let data = pos.snapshot().expect("snapshot");
        assert!(data.displayed_item_ids.is_empty());
        assert!(data.sale.lines.is_empty());
        assert!(pos.displayed_items().expect("displayed").is_empty());
    }

    #[test]
    fn hidden_items_cannot_be_sold() {
        let mut pos = state();
        let ali = pos.add_customer("Ali").expect("customer");
        let tea = pos.add_item(&ItemForm::new("Tea", "2").stock("5")).expect("item");
        let bread = pos.add_item(&ItemForm::new("Bread", "1").stock("5")).expect("item");
        pos.toggle_display(bread.id).expect("toggle");
        pos.select_customer(ali.id).expect("select");

        assert!(matches!(pos.set_quantity(tea.id, 2), Err(AppError::Validation(_))));
        assert!(matches!(pos.increment_quantity(tea.id), Err(AppError::Validation(_))));
        assert!(pos.sale().lines.is_empty());
        assert!(matches!(pos.commit_sale(), Err(AppError::EmptySale)));

        let data = pos.snapshot().expect("snapshot");
        let offered: Vec<_> = data.sale_items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(offered, vec!["Bread"]);
        assert_eq!(data.items.len(), 2);
    }

    #[test]
    fn hiding_an_item_still_lets_its_line_be_cleared() {
        let mut pos = state();
        let ali = pos.add_customer("Ali").expect("customer");
        let tea = pos.add_item(&ItemForm::new("Tea", "2").stock("5")).expect("item");
        pos.toggle_display(tea.id).expect("show");
        pos.select_customer(ali.id).expect("select");
        pos.set_quantity(tea.id, 3).expect("qty");
        pos.toggle_display(tea.id).expect("hide");

        assert!(matches!(pos.set_quantity(tea.id, 4), Err(AppError::Validation(_))));
        pos.set_quantity(tea.id, 2).expect("lower");
        pos.decrement_quantity(tea.id).expect("dec");
        assert_eq!(pos.sale().lines[0].quantity, 1);
        pos.set_quantity(tea.id, 0).expect("clear");
        assert!(pos.sale().lines.is_empty());
    }

    #[test]
    fn plus_and_minus_buttons_adjust_the_sale() {
        let mut pos = state();
        let ali = pos.add_customer("Ali").expect("customer");
        let tea = pos.add_item(&ItemForm::new("Tea", "2").stock("5")).expect("item");
        pos.toggle_display(tea.id).expect("toggle");
        pos.select_customer(ali.id).expect("select");

        pos.increment_quantity(tea.id).expect("inc");
        let view = pos.increment_quantity(tea.id).expect("inc");
        assert_eq!(view.total, 4.0);
        pos.decrement_quantity(tea.id).expect("dec");
        let view = pos.decrement_quantity(tea.id).expect("dec");
        assert!(view.lines.is_empty());
        let view = pos.decrement_quantity(tea.id).expect("dec");
        assert!(view.lines.is_empty());
    }

    #[test]
    fn picker_options_follow_the_chosen_month() {
        let pos = state();
        let options = pos.history_picker_options(Some(2023), Some(2));
        assert_eq!(options.years.len(), 11);
        assert_eq!(options.months.len(), 12);
        assert_eq!(options.days.len(), 28);
        assert_eq!(pos.history_picker_options(None, None).days.len(), 31);
    }

    #[test]
    fn selecting_a_customer_opens_the_sale_view() {
        let mut pos = state();
        let ali = pos.add_customer("Ali").expect("customer");
        pos.navigate(View::Customers);
        pos.select_customer(ali.id).expect("select");
        assert_eq!(pos.view(), View::Sale);
        assert!(pos.select_customer(999).is_err());
    }

    #[test]
    fn snapshot_reflects_history_filter() {
        let mut pos = state();
        let ali = pos.add_customer("Ali").expect("customer");
        let juice = pos
            .add_item(&ItemForm::new("Juice", "5").pieces("6").stock("10"))
            .expect("item");
        pos.toggle_display(juice.id).expect("toggle");
        pos.select_customer(ali.id).expect("select");
        pos.set_quantity(juice.id, 4).expect("qty");
        assert_eq!(pos.snapshot().expect("snapshot").sale_total_label, "20.00 شيكل");
        pos.commit_sale().expect("commit");

        let found = pos
            .filter_history(HistoryFilter::customer("ALI"))
            .expect("filter");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].lines[0].quantity, 4);

        let none = pos
            .filter_history(HistoryFilter::customer("Sara"))
            .expect("filter");
        assert!(none.is_empty());

        pos.filter_history(HistoryFilter::default().with_date(DateFilter::year(2024).month(9)))
            .expect("filter");
        let data = pos.snapshot().expect("snapshot");
        assert_eq!(data.history_filter_label, "09/2024");
        assert_eq!(data.currency_label, "شيكل");
    }

    #[test]
    fn deleting_the_customer_keeps_their_sales() {
        let mut pos = state();
        let ali = pos.add_customer("Ali").expect("customer");
        let tea = pos.add_item(&ItemForm::new("Tea", "2").stock("5")).expect("item");
        pos.toggle_display(tea.id).expect("toggle");
        pos.select_customer(ali.id).expect("select");
        pos.set_quantity(tea.id, 1).expect("qty");
        let before = pos.commit_sale().expect("commit");

        pos.delete_customer(ali.id, &Answered(true)).expect("delete");
        let after = pos.history().expect("history");
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].record, before);
    }

    #[test]
    fn delete_single_sale_asks_first() {
        let mut pos = state();
        let ali = pos.add_customer("Ali").expect("customer");
        let tea = pos.add_item(&ItemForm::new("Tea", "2").stock("5")).expect("item");
        pos.toggle_display(tea.id).expect("toggle");
        pos.select_customer(ali.id).expect("select");
        pos.set_quantity(tea.id, 1).expect("qty");
        let record = pos.commit_sale().expect("commit");

        assert!(!pos.delete_sale(record.id, &Answered(false)).expect("delete"));
        assert_eq!(pos.history().expect("history").len(), 1);
        assert!(pos.delete_sale(record.id, &Answered(true)).expect("delete"));
        assert!(pos.history().expect("history").is_empty());
    }
}
