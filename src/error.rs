use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

/// One item a sale asked more of than the shelf holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockShortfall {
    pub item_id: i64,
    pub name: String,
    pub available: i64,
    pub requested: i64,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config error: {0}")]
    Config(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("insufficient stock: {}", describe_shortfalls(.0))]
    InsufficientStock(Vec<StockShortfall>),
    #[error("empty sale: لم يتم اختيار أي صنف للبيع")]
    EmptySale,
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }
}

impl From<AppError> for String {
    fn from(value: AppError) -> Self {
        value.to_string()
    }
}

impl From<config::ConfigError> for AppError {
    fn from(value: config::ConfigError) -> Self {
        AppError::Config(value.to_string())
    }
}

fn describe_shortfalls(shortfalls: &[StockShortfall]) -> String {
    shortfalls
        .iter()
        .map(|s| format!("{} (المتوفر {}، المطلوب {})", s.name, s.available, s.requested))
        .collect::<Vec<_>>()
        .join("، ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_stock_message_lists_every_item() {
        let err = AppError::InsufficientStock(vec![
            StockShortfall {
                item_id: 1,
                name: "Juice".into(),
                available: 2,
                requested: 5,
            },
            StockShortfall {
                item_id: 2,
                name: "Bread".into(),
                available: 0,
                requested: 1,
            },
        ]);
        let message: String = err.into();
        assert!(message.contains("Juice (المتوفر 2، المطلوب 5)"));
        assert!(message.contains("Bread (المتوفر 0، المطلوب 1)"));
    }

    #[test]
    fn every_message_starts_with_an_english_kind() {
        let messages: Vec<String> = vec![
            AppError::EmptySale.into(),
            AppError::validation("يرجى إدخال اسم الصنف").into(),
            AppError::InsufficientStock(Vec::new()).into(),
            AppError::Config("missing".into()).into(),
        ];
        let prefixes = ["empty sale: ", "validation error: ", "insufficient stock: ", "config error: "];
        for (message, prefix) in messages.iter().zip(prefixes) {
            assert!(message.starts_with(prefix), "{message}");
        }
        assert!(messages[0].ends_with("لم يتم اختيار أي صنف للبيع"));
    }
}
