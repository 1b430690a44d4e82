//! Case-insensitive search over an in-memory currency list.
//!
//! An entry matches when its name starts with the query, when any later word
//! of its name starts with the query, or when its symbol starts with the
//! query. The fiat `code` is not consulted.

use shared::domain::Currency;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    raw: String,
    lowered: String,
    word_start: String,
}

impl SearchQuery {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let lowered = raw.to_lowercase();
        let word_start = format!(" {lowered}");
        Self {
            raw,
            lowered,
            word_start,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn matches(&self, currency: &Currency) -> bool {
        let name = currency.name.to_lowercase();
        name.starts_with(&self.lowered)
            || name.contains(&self.word_start)
            || currency.symbol.to_lowercase().starts_with(&self.lowered)
    }

    /// Stable filter: result order follows `currencies`.
    pub fn apply(&self, currencies: &[Currency]) -> Vec<Currency> {
        currencies
            .iter()
            .filter(|currency| self.matches(currency))
            .cloned()
            .collect()
    }
}

pub fn filter_currencies(currencies: &[Currency], query: &str) -> Vec<Currency> {
    SearchQuery::new(query).apply(currencies)
}
