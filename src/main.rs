use std::sync::Arc;

use anyhow::Result;
use subs_tracker::{
    config::config_loader,
    infrastructure::{axum_http::http_serve, postgres::postgres_connection},
    observability,
};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        error!("subs-tracker exited with error: {:#}", error);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    let service_context = observability::init_observability("subs-tracker")?;

    let dotenvy_env = config_loader::load()?;
    info!(
        service = %service_context.service_name,
        environment = %service_context.environment,
        port = dotenvy_env.server.port,
        "ENV has been loaded"
    );

    let postgres_pool = postgres_connection::establish_connection(&dotenvy_env.database)?;
    info!("Postgres connection has been established");

    http_serve::start(Arc::new(dotenvy_env), Arc::new(postgres_pool)).await?;

    Ok(())
}
