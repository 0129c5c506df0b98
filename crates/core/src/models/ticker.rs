use serde::{Deserialize, Serialize};

/// A tradable instrument. Grown dynamically by import and user creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticker {
    pub id: i32,
    /// Exchange symbol (e.g., "AAPL", "SPY"). `new` uppercases it; lookups ignore case.
    pub symbol: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl Ticker {
    pub fn new(id: i32, symbol: impl Into<String>) -> Self {
        Self {
            id,
            symbol: symbol.into().to_uppercase(),
            image: None,
            name: None,
        }
    }

    pub fn with_name(id: i32, symbol: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::new(id, symbol)
        }
    }
}
