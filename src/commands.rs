use std::sync::{Mutex, MutexGuard};

use serde::Deserialize;
use tauri::State;

use crate::catalog::{ImageRef, ItemForm};
use crate::confirm::Answered;
use crate::customers::Customer;
use crate::error::AppError;
use crate::history::{DateFilter, DeletionPreview, HistoryFilter, PickerOptions};
use crate::state::{AppData, PosState, View};

type CommandResult<T> = Result<T, String>;
type Pos<'a> = State<'a, Mutex<PosState>>;

fn lock<'a>(state: &'a Pos<'_>) -> CommandResult<MutexGuard<'a, PosState>> {
    state
        .lock()
        .map_err(|_| AppError::Config("application state poisoned".into()).into())
}

fn reply(pos: &PosState) -> CommandResult<AppData> {
    pos.snapshot().map_err(Into::into)
}

#[tauri::command]
pub fn get_app_data(state: Pos<'_>) -> CommandResult<AppData> {
    reply(&lock(&state)?)
}

#[tauri::command]
pub fn navigate(state: Pos<'_>, view: View) -> CommandResult<AppData> {
    let mut pos = lock(&state)?;
    pos.navigate(view);
    reply(&pos)
}

#[tauri::command]
pub fn add_customer(state: Pos<'_>, name: String) -> CommandResult<AppData> {
    let mut pos = lock(&state)?;
    pos.add_customer(&name)?;
    reply(&pos)
}

#[tauri::command]
pub fn delete_customer(state: Pos<'_>, customer_id: i64, confirmed: bool) -> CommandResult<AppData> {
    let mut pos = lock(&state)?;
    pos.delete_customer(customer_id, &Answered(confirmed))?;
    reply(&pos)
}

#[tauri::command]
pub fn search_customers(state: Pos<'_>, text: String) -> CommandResult<Vec<Customer>> {
    let pos = lock(&state)?;
    pos.search_customers(&text).map_err(Into::into)
}

#[tauri::command]
pub fn add_item(state: Pos<'_>, payload: ItemForm) -> CommandResult<AppData> {
    let mut pos = lock(&state)?;
    pos.add_item(&payload)?;
    reply(&pos)
}

#[derive(Debug, Deserialize)]
pub struct ItemUpdatePayload {
    id: i64,
    #[serde(flatten)]
    form: ItemForm,
}

#[tauri::command]
pub fn update_item(state: Pos<'_>, payload: ItemUpdatePayload) -> CommandResult<AppData> {
    let mut pos = lock(&state)?;
    pos.update_item(payload.id, &payload.form)?;
    reply(&pos)
}

#[tauri::command]
pub fn set_item_image(state: Pos<'_>, item_id: i64, uri: Option<String>) -> CommandResult<AppData> {
    let mut pos = lock(&state)?;
    pos.set_item_image(item_id, uri.map(ImageRef::new))?;
    reply(&pos)
}

#[tauri::command]
pub fn delete_item(state: Pos<'_>, item_id: i64, confirmed: bool) -> CommandResult<AppData> {
    let mut pos = lock(&state)?;
    pos.delete_item(item_id, &Answered(confirmed))?;
    reply(&pos)
}

#[tauri::command]
pub fn toggle_display(state: Pos<'_>, item_id: i64) -> CommandResult<AppData> {
    let mut pos = lock(&state)?;
    pos.toggle_display(item_id)?;
    reply(&pos)
}

#[tauri::command]
pub fn select_customer(state: Pos<'_>, customer_id: i64) -> CommandResult<AppData> {
    let mut pos = lock(&state)?;
    pos.select_customer(customer_id)?;
    reply(&pos)
}

#[tauri::command]
pub fn set_quantity(state: Pos<'_>, item_id: i64, quantity: i64) -> CommandResult<AppData> {
    let mut pos = lock(&state)?;
    pos.set_quantity(item_id, quantity)?;
    reply(&pos)
}

#[tauri::command]
pub fn increment_quantity(state: Pos<'_>, item_id: i64) -> CommandResult<AppData> {
    let mut pos = lock(&state)?;
    pos.increment_quantity(item_id)?;
    reply(&pos)
}

#[tauri::command]
pub fn decrement_quantity(state: Pos<'_>, item_id: i64) -> CommandResult<AppData> {
    let mut pos = lock(&state)?;
    pos.decrement_quantity(item_id)?;
    reply(&pos)
}

#[tauri::command]
pub fn commit_sale(state: Pos<'_>) -> CommandResult<AppData> {
    let mut pos = lock(&state)?;
    pos.commit_sale()?;
    reply(&pos)
}

#[tauri::command]
pub fn cancel_sale(state: Pos<'_>) -> CommandResult<AppData> {
    let mut pos = lock(&state)?;
    pos.cancel_sale();
    reply(&pos)
}

#[tauri::command]
pub fn filter_history(
    state: Pos<'_>,
    customer: Option<String>,
    year: String,
    month: String,
    day: String,
) -> CommandResult<AppData> {
    let date = DateFilter::parse(&year, &month, &day)?;
    let mut pos = lock(&state)?;
    pos.filter_history(HistoryFilter { customer, date })?;
    reply(&pos)
}

#[tauri::command]
pub fn history_picker_options(
    state: Pos<'_>,
    year: Option<i32>,
    month: Option<u32>,
) -> CommandResult<PickerOptions> {
    let pos = lock(&state)?;
    Ok(pos.history_picker_options(year, month))
}

#[tauri::command]
pub fn delete_sale(state: Pos<'_>, sale_id: i64, confirmed: bool) -> CommandResult<AppData> {
    let mut pos = lock(&state)?;
    pos.delete_sale(sale_id, &Answered(confirmed))?;
    reply(&pos)
}

#[tauri::command]
pub fn preview_history_deletion(
    state: Pos<'_>,
    year: String,
    month: String,
    day: String,
) -> CommandResult<DeletionPreview> {
    let date = DateFilter::parse(&year, &month, &day)?;
    let pos = lock(&state)?;
    pos.preview_history_deletion(&date).map_err(Into::into)
}

#[tauri::command]
pub fn delete_history_by_date(
    state: Pos<'_>,
    year: String,
    month: String,
    day: String,
    confirmed: bool,
) -> CommandResult<usize> {
    let date = DateFilter::parse(&year, &month, &day)?;
    let mut pos = lock(&state)?;
    pos.delete_history_by_date(&date, &Answered(confirmed))
        .map_err(Into::into)
}
