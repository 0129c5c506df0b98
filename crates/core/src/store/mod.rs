pub mod collection;
pub mod diff;
pub mod entity_store;
pub(crate) mod lifecycle;

pub use collection::{Change, Editor, ObservableCollection, Subscription};
pub use entity_store::EntityStore;
