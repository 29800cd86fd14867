pub mod client;

pub use client::{TranslateError, Translation, TranslationClient};
