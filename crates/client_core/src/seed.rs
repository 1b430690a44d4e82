use serde::{Deserialize, Serialize};
use shared::domain::Currency;

/// Reference dataset inserted when no explicit records are supplied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedDataset {
    #[serde(default)]
    pub crypto: Vec<Currency>,
    #[serde(default)]
    pub fiat: Vec<Currency>,
}

impl SeedDataset {
    pub fn new(crypto: Vec<Currency>, fiat: Vec<Currency>) -> Self {
        Self { crypto, fiat }
    }

    pub fn builtin() -> Self {
        let crypto = [
            ("BTC", "Bitcoin"),
            ("ETH", "Ethereum"),
            ("XRP", "XRP"),
            ("BCH", "Bitcoin Cash"),
            ("LTC", "Litecoin"),
            ("EOS", "EOS"),
            ("BNB", "Binance Coin"),
            ("LINK", "Chainlink"),
            ("NEO", "NEO"),
            ("ETC", "Ethereum Classic"),
            ("ONT", "Ontology"),
            ("CRO", "Crypto.com Chain"),
            ("CUC", "Cucumber"),
            ("USDC", "USD Coin"),
        ]
        .into_iter()
        .map(|(ticker, name)| Currency::crypto(ticker, name, ticker))
        .collect();

        let fiat = [
            ("SGD", "Singapore Dollar", "$"),
            ("EUR", "Euro", "€"),
            ("GBP", "British Pound", "£"),
            ("HKD", "Hong Kong Dollar", "$"),
            ("JPY", "Japanese Yen", "¥"),
            ("AUD", "Australian Dollar", "$"),
            ("USD", "United States Dollar", "$"),
        ]
        .into_iter()
        .map(|(code, name, symbol)| Currency::fiat(code, name, symbol, code))
        .collect();

        Self { crypto, fiat }
    }

    /// Crypto entries first, then fiat.
    pub fn all(&self) -> Vec<Currency> {
        self.crypto.iter().chain(&self.fiat).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.crypto.len() + self.fiat.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SeedDataset {
    fn default() -> Self {
        Self::builtin()
    }
}
