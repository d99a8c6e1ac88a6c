//! Tool adapters for StudyClaw.
//!
//! The planner has exactly three capabilities: fetch the day's calendar,
//! search and score hands-on learning resources, and send the SMS
//! notification. Each is a thin adapter over its collaborator's HTTP API;
//! the scoring heuristic lives here too, next to the search that uses it.

pub mod calendar;
pub mod github_search;
pub mod notify;
pub mod scorer;

pub use calendar::{CalendarTool, CalendarToolConfig};
pub use github_search::{SearchTool, SearchToolConfig};
pub use notify::{NotifyTool, NotifyToolConfig};
pub use scorer::ScoringWeights;

use studyclaw_config::AppConfig;
use studyclaw_core::retry::RetryPolicy;
use studyclaw_core::tool::ToolRegistry;
use std::time::Duration;

/// Build the planner's tool registry from configuration, with the shared
/// retry policy applied uniformly to every dispatched call.
pub fn planner_registry(config: &AppConfig) -> ToolRegistry {
    let retry = RetryPolicy::new(
        config.retry.max_attempts,
        Duration::from_millis(config.retry.base_delay_ms),
        Duration::from_millis(config.retry.max_delay_ms),
    );

    let mut registry = ToolRegistry::new().with_retry(retry);
    registry.register(Box::new(CalendarTool::new((&config.calendar).into())));
    registry.register(Box::new(SearchTool::new(SearchToolConfig {
        token: config.github.token.clone(),
        api_url: config.github.api_url.clone(),
        top_k: config.agent.top_k,
        weights: (&config.scoring).into(),
    })));
    registry.register(Box::new(NotifyTool::new((&config.notify).into())));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_contains_the_three_planner_tools() {
        let registry = planner_registry(&AppConfig::default());
        assert!(registry.get("fetch_calendar").is_some());
        assert!(registry.get("search_resources").is_some());
        assert!(registry.get("send_notification").is_some());
        assert_eq!(registry.names().len(), 3);
    }

    #[test]
    fn definitions_expose_schemas_for_the_model() {
        let registry = planner_registry(&AppConfig::default());
        let defs = registry.definitions();
        assert_eq!(defs.len(), 3);
        let search = defs.iter().find(|d| d.name == "search_resources").unwrap();
        assert_eq!(search.parameters["required"], serde_json::json!(["topic"]));
    }
}
