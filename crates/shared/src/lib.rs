pub mod domain;
pub mod error;

pub use domain::{Currency, CurrencyCategory};
pub use error::StoreError;
