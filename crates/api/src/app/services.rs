use std::sync::Arc;

use anyhow::Context;
use sqlx::PgPool;

use filaforge_core::EngineConfig;
use filaforge_infra::{InMemoryShopStore, InventoryEngine, PostgresShopStore, ShopStore};

/// The engine as served over HTTP; the store is chosen at startup.
pub type Engine = InventoryEngine<Arc<dyn ShopStore>>;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

/// Process-level settings read once at startup.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub use_persistent: bool,
    pub database_url: Option<String>,
    pub bind_addr: String,
}

impl ServiceSettings {
    pub fn from_env() -> Self {
        let use_persistent = std::env::var("USE_PERSISTENT_STORES")
            .unwrap_or_else(|_| "false".to_string())
            .parse::<bool>()
            .unwrap_or(false);

        Self {
            use_persistent,
            database_url: std::env::var("DATABASE_URL").ok(),
            bind_addr: std::env::var("FILAFORGE_BIND_ADDR")
                .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
        }
    }

    /// In-memory store, ephemeral port. Used by tests.
    pub fn in_memory() -> Self {
        Self {
            use_persistent: false,
            database_url: None,
            bind_addr: "127.0.0.1:0".to_string(),
        }
    }
}

pub async fn build_engine(settings: &ServiceSettings) -> anyhow::Result<Arc<Engine>> {
    let config = EngineConfig::from_env().context("invalid engine configuration")?;
    let store = build_store(settings).await?;
    let engine = InventoryEngine::open(store, config)
        .await
        .context("failed to load shop state")?;
    Ok(Arc::new(engine))
}

async fn build_store(settings: &ServiceSettings) -> anyhow::Result<Arc<dyn ShopStore>> {
    if settings.use_persistent {
        match &settings.database_url {
            Some(url) => return build_persistent_store(url).await,
            None => tracing::warn!(
                "USE_PERSISTENT_STORES=true but DATABASE_URL is not set, falling back to in-memory"
            ),
        }
    }
    Ok(InMemoryShopStore::arc())
}

async fn build_persistent_store(database_url: &str) -> anyhow::Result<Arc<dyn ShopStore>> {
    let pool = PgPool::connect(database_url)
        .await
        .context("failed to connect to Postgres")?;
    let store = PostgresShopStore::new(pool);
    store.migrate().await.context("failed to migrate schema")?;
    tracing::info!("using Postgres shop store");
    Ok(Arc::new(store))
}
