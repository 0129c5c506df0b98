use serde::{Deserialize, Serialize};

/// Brokers the importers know how to read statements from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SupportedBroker {
    IBKR,
    Tastytrade,
    SigmaTrade,
    /// Manually maintained broker with no import support
    Unknown,
}

impl std::fmt::Display for SupportedBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SupportedBroker::IBKR => write!(f, "IBKR"),
            SupportedBroker::Tastytrade => write!(f, "Tastytrade"),
            SupportedBroker::SigmaTrade => write!(f, "SigmaTrade"),
            SupportedBroker::Unknown => write!(f, "Unknown"),
        }
    }
}

/// A brokerage firm. Static catalog, loaded wholesale at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Broker {
    pub id: i32,
    pub name: String,
    /// Image asset name or path used by the UI
    pub image: String,
    pub supported_broker: SupportedBroker,
}

impl Broker {
    pub fn new(
        id: i32,
        name: impl Into<String>,
        image: impl Into<String>,
        supported_broker: SupportedBroker,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            image: image.into(),
            supported_broker,
        }
    }
}
