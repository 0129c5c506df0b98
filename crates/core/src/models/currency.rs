use serde::{Deserialize, Serialize};

/// A currency, looked up by both `id` and ISO `code`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency {
    pub id: i32,
    /// ISO code (e.g., "USD", "EUR"). `new` uppercases it; lookups ignore case.
    pub code: String,
    pub symbol: String,
    pub title: String,
}

impl Currency {
    pub fn new(
        id: i32,
        code: impl Into<String>,
        symbol: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            id,
            code: code.into().to_uppercase(),
            symbol: symbol.into(),
            title: title.into(),
        }
    }
}
