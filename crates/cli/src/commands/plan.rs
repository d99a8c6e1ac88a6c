//! `studyclaw plan` — run one daily planning cycle.
//!
//! This is the invocation surface an external scheduler (cron) triggers once
//! per day. Exit code 0 means the plan was delivered; a failed run exits
//! non-zero with the reason on stderr and nothing sent to the learner.

use std::sync::Arc;
use studyclaw_agent::{PlannerLoop, RunStatus};
use studyclaw_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // Missing credentials are a startup error — fail here, before any
    // collaborator is contacted.
    config.require_credentials().map_err(|e| {
        format!("{e}\n  Run `studyclaw onboard` and fill in the missing values.")
    })?;

    let provider = studyclaw_providers::build_from_config(&config)?;
    let tools = Arc::new(studyclaw_tools::planner_registry(&config));
    let agent = PlannerLoop::from_config(provider, tools, &config);

    let outcome = agent.run_daily_plan().await;
    match outcome.status {
        RunStatus::Done => {
            println!(
                "Plan delivered ({} model round-trips).",
                outcome.steps
            );
            Ok(())
        }
        RunStatus::Failed => {
            let reason = outcome
                .reason
                .unwrap_or_else(|| "unknown failure".into());
            Err(format!("Planning run failed: {reason}").into())
        }
    }
}
