//! Infrastructure layer: state persistence and the engine service that owns
//! the live shop state.

pub mod engine;
pub mod store;

pub use engine::{EngineError, EngineResult, InventoryEngine};
pub use store::{InMemoryShopStore, PostgresShopStore, ShopChanges, ShopStore, StoreError};
