use anyhow::Context;

use filaforge_api::app::{self, services::ServiceSettings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    filaforge_observability::init();

    let settings = ServiceSettings::from_env();
    let app = app::build_app(&settings).await?;

    let listener = tokio::net::TcpListener::bind(&settings.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", settings.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
