pub mod catalog;
pub mod config;
pub mod confirm;
pub mod customers;
pub mod db;
pub mod display;
pub mod error;
pub mod history;
pub mod sale;
pub mod state;
pub mod timestamp;

#[cfg(feature = "app")]
mod commands;

pub use crate::config::AppConfig;
pub use crate::error::{AppError, Result};
pub use crate::state::{AppData, PosState, View};

use tracing_subscriber::EnvFilter;

/// Installs the fmt subscriber. `RUST_LOG` wins over the configured level.
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[cfg(feature = "app")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    use std::sync::Mutex;
    use tauri::Manager;

    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .setup(|app| {
            let config_dir = app
                .path()
                .app_config_dir()
                .map_err(|e| AppError::Config(format!("failed to resolve app config directory: {e}")))?;
            let config = AppConfig::load_from_dir(&config_dir)?;
            init_tracing(&config.log_level);
            tracing::debug!(dir = %config_dir.display(), "configuration loaded");
            let data_dir = app
                .path()
                .app_local_data_dir()
                .map_err(|e| AppError::Config(format!("failed to resolve app data directory: {e}")))?;
            let state = PosState::open(&data_dir.join(&config.database_file), config)?;
            app.manage(Mutex::new(state));
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            commands::get_app_data,
            commands::navigate,
            commands::add_customer,
            commands::delete_customer,
            commands::search_customers,
            commands::add_item,
            commands::update_item,
            commands::set_item_image,
            commands::delete_item,
            commands::toggle_display,
            commands::select_customer,
            commands::set_quantity,
            commands::increment_quantity,
            commands::decrement_quantity,
            commands::commit_sale,
            commands::cancel_sale,
            commands::filter_history,
            commands::delete_sale,
            commands::history_picker_options,
            commands::preview_history_deletion,
            commands::delete_history_by_date
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
