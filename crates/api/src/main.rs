use anyhow::Context;

use oficina_api::config::ApiConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    oficina_observability::init();

    let config = ApiConfig::from_env().context("invalid configuration")?;
    let app = oficina_api::app::build_app(&config)
        .await
        .context("failed to start services")?;

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "could not listen for ctrl-c; running until killed");
        std::future::pending::<()>().await;
    }
}
