//! `studyclaw doctor` — diagnose configuration and collaborator health.

use studyclaw_config::AppConfig;
use studyclaw_core::provider::Provider;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("StudyClaw Doctor — System Diagnostics");
    println!("=====================================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    if !config_path.exists() {
        println!("  [warn] No config file — run `studyclaw onboard`");
        issues += 1;
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  [ok]   Config valid");
            config
        }
        Err(e) => {
            println!("  [fail] Config invalid: {e}");
            println!("\n  1 fatal issue. Fix the config before running `studyclaw plan`.");
            return Ok(());
        }
    };

    match config.require_credentials() {
        Ok(()) => println!("  [ok]   All required credentials present"),
        Err(e) => {
            println!("  [warn] {e}");
            issues += 1;
        }
    }

    // Reasoning model reachability (only meaningful with a key configured)
    if config.model.api_key.is_some() {
        match studyclaw_providers::build_from_config(&config) {
            Ok(provider) => match provider.health_check().await {
                Ok(true) => println!("  [ok]   Reasoning model reachable"),
                Ok(false) => {
                    println!("  [warn] Reasoning model endpoint responded unhealthy");
                    issues += 1;
                }
                Err(e) => {
                    println!("  [warn] Reasoning model unreachable: {e}");
                    issues += 1;
                }
            },
            Err(e) => {
                println!("  [warn] Provider setup failed: {e}");
                issues += 1;
            }
        }
    }

    println!();
    if issues == 0 {
        println!("  All checks passed. `studyclaw plan` is ready to schedule.");
    } else {
        println!("  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
