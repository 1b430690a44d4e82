use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// A single currency entry. `code` is only present for fiat currencies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Currency {
    pub id: String,
    pub name: String,
    pub symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl Currency {
    pub fn crypto(
        id: impl Into<String>,
        name: impl Into<String>,
        symbol: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            symbol: symbol.into(),
            code: None,
        }
    }

    pub fn fiat(
        id: impl Into<String>,
        name: impl Into<String>,
        symbol: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            symbol: symbol.into(),
            code: Some(code.into()),
        }
    }

    pub fn is_fiat(&self) -> bool {
        self.code.is_some()
    }

    /// Either `Crypto` or `Fiat`; never `All`.
    pub fn category(&self) -> CurrencyCategory {
        if self.is_fiat() {
            CurrencyCategory::Fiat
        } else {
            CurrencyCategory::Crypto
        }
    }

    pub fn matches(&self, category: CurrencyCategory) -> bool {
        match category {
            CurrencyCategory::All => true,
            other => self.category() == other,
        }
    }

    /// Right-hand label of a list row: the ISO code for fiat, the ticker symbol for crypto.
    pub fn trailing_label(&self) -> &str {
        self.code.as_deref().unwrap_or(&self.symbol)
    }

    pub fn badge(&self) -> Option<char> {
        self.id.chars().next()
    }
}

/// Query-shape selector over stored currencies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurrencyCategory {
    Crypto,
    Fiat,
    #[default]
    All,
}

impl CurrencyCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            CurrencyCategory::Crypto => "crypto",
            CurrencyCategory::Fiat => "fiat",
            CurrencyCategory::All => "all",
        }
    }
}

impl fmt::Display for CurrencyCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown currency category '{0}', expected crypto, fiat or all")]
pub struct UnknownCategory(pub String);

impl FromStr for CurrencyCategory {
    type Err = UnknownCategory;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "crypto" => Ok(CurrencyCategory::Crypto),
            "fiat" => Ok(CurrencyCategory::Fiat),
            "all" => Ok(CurrencyCategory::All),
            _ => Err(UnknownCategory(raw.to_string())),
        }
    }
}
