pub mod store;

pub use store::{HistoryError, HistoryStore, TranslationRecord};
