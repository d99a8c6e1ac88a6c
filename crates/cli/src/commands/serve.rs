//! `studyclaw serve` — start the HTTP recommendation gateway.

use std::sync::Arc;
use studyclaw_config::AppConfig;
use studyclaw_gateway::GatewayState;
use studyclaw_tools::{SearchTool, SearchToolConfig};

pub async fn run(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let state = Arc::new(GatewayState {
        search: SearchTool::new(SearchToolConfig {
            token: config.github.token.clone(),
            api_url: config.github.api_url.clone(),
            top_k: config.agent.top_k,
            weights: (&config.scoring).into(),
        }),
    });

    let port = port.unwrap_or(config.gateway.port);
    studyclaw_gateway::serve(state, &config.gateway.host, port).await?;
    Ok(())
}
