//! Storage boundary for the shop state.
//!
//! The engine owns the live state; a store only has to hand back the last
//! committed state on startup and durably accept each new one.

pub mod in_memory;
pub mod postgres;

use std::sync::Arc;

use thiserror::Error;

use filaforge_planning::ShopState;

pub use in_memory::InMemoryShopStore;
pub use postgres::PostgresShopStore;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("storage backend failed during {operation}: {message}")]
    Backend {
        operation: &'static str,
        message: String,
    },
    #[error("stored data is invalid: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn backend(operation: &'static str, message: impl Into<String>) -> Self {
        StoreError::Backend {
            operation,
            message: message.into(),
        }
    }
}

/// Which halves of the shop differ between the published and the next state.
///
/// Stores may skip rewriting the half that did not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShopChanges {
    pub ledger: bool,
    pub fleet: bool,
}

impl ShopChanges {
    pub fn between(previous: &ShopState, next: &ShopState) -> Self {
        Self {
            ledger: previous.ledger != next.ledger,
            fleet: previous.fleet != next.fleet,
        }
    }

    /// Both halves, for a first write or a full rewrite.
    pub fn all() -> Self {
        Self {
            ledger: true,
            fleet: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.ledger && !self.fleet
    }
}

#[async_trait::async_trait]
pub trait ShopStore: Send + Sync {
    /// Last committed state, or an empty shop if nothing was ever committed.
    async fn load(&self) -> Result<ShopState, StoreError>;

    /// Make `state` the persisted state, all or nothing. Halves not flagged in
    /// `changes` equal what was last committed.
    async fn commit(&self, state: &ShopState, changes: ShopChanges) -> Result<(), StoreError>;
}

#[async_trait::async_trait]
impl<S> ShopStore for Arc<S>
where
    S: ShopStore + ?Sized,
{
    async fn load(&self) -> Result<ShopState, StoreError> {
        (**self).load().await
    }

    async fn commit(&self, state: &ShopState, changes: ShopChanges) -> Result<(), StoreError> {
        (**self).commit(state, changes).await
    }
}
