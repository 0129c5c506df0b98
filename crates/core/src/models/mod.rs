pub mod account;
pub mod bank;
pub mod broker;
pub mod currency;
pub mod import;
pub mod movement;
pub mod settings;
pub mod snapshot;
pub mod ticker;
