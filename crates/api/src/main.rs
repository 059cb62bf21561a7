use std::env;

use anyhow::Result;
use rentscope_api::build_app;
use rentscope_observability::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("rentscope_api");

    let bind = env::var("RS_BIND").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

    let app = build_app().await?;

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!(bind = %bind, "rentscope api started");

    axum::serve(listener, app).await?;
    Ok(())
}
