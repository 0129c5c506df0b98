use serde::{Deserialize, Serialize};

/// A bank. Static catalog, loaded wholesale at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bank {
    pub id: i32,
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
}

impl Bank {
    pub fn new(id: i32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            image: None,
        }
    }
}
