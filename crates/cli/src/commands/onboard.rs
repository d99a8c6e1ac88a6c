//! `studyclaw onboard` — first-time setup.

use studyclaw_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    println!("StudyClaw — First-Time Setup");
    println!("============================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("  Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    if config_path.exists() {
        println!("\n  Config already exists at: {}", config_path.display());
        println!("  Edit it manually or delete and re-run onboard.\n");
        return Ok(());
    }

    let default_toml = AppConfig::default_toml();
    std::fs::write(&config_path, &default_toml)?;
    println!("  Created config.toml at: {}", config_path.display());
    println!("\nNext steps:");
    println!("  1. Edit {} and fill in credentials,", config_path.display());
    println!("     or export GEMINI_API_KEY, LEARNING_CALENDAR_ID,");
    println!("     GOOGLE_CALENDAR_ACCESS_TOKEN, TWILIO_ACCOUNT_SID,");
    println!("     TWILIO_AUTH_TOKEN, TWILIO_PHONE_NUMBER, LEARNER_PHONE_NUMBER.");
    println!("  2. Run: studyclaw doctor");
    println!("  3. Schedule: studyclaw plan (e.g. from cron, once per day)\n");

    Ok(())
}
