use std::sync::{Arc, Mutex};

use filaforge_planning::ShopState;

use super::{ShopChanges, ShopStore, StoreError};

/// Process-local store for tests, development and the offline fallback.
#[derive(Debug, Default)]
pub struct InMemoryShopStore {
    committed: Mutex<ShopState>,
}

impl InMemoryShopStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an already populated state.
    pub fn with_state(state: ShopState) -> Self {
        Self {
            committed: Mutex::new(state),
        }
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Copy of the last committed state.
    pub fn committed(&self) -> Result<ShopState, StoreError> {
        self.committed
            .lock()
            .map(|s| s.clone())
            .map_err(|_| StoreError::backend("read", "in-memory store lock poisoned"))
    }
}

#[async_trait::async_trait]
impl ShopStore for InMemoryShopStore {
    async fn load(&self) -> Result<ShopState, StoreError> {
        self.committed()
    }

    async fn commit(&self, state: &ShopState, _changes: ShopChanges) -> Result<(), StoreError> {
        let mut guard = self
            .committed
            .lock()
            .map_err(|_| StoreError::backend("commit", "in-memory store lock poisoned"))?;
        *guard = state.clone();
        Ok(())
    }
}
