//! NetPilot API: HTTP front end for the query pipeline.
//!
//! Drives the one device named in the agent config.

use std::sync::Arc;

use tokio::net::TcpListener;

use np_agent::config::AgentConfig;
use np_agent::{Pipeline, logging};
use np_api::config::ApiConfig;
use np_api::routes;
use np_api::state::AppState;
use np_device::SshConnector;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ApiConfig::from_env()?;
    let agent_config = AgentConfig::load(config.agent_config.as_deref())?;
    let _guard = logging::init_tracing(&agent_config.logging)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "np-api starting");

    let pipeline = Pipeline::from_config(&agent_config, Arc::new(SshConnector::new()))?;
    tracing::info!(
        host = %pipeline.device().host,
        device_type = %pipeline.device().device_type,
        "target device configured"
    );

    let app = routes::build_router(AppState::new(pipeline));

    let addr = config.listen_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "listening");

    axum::serve(listener, app).await?;

    Ok(())
}
