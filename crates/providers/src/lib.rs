//! Reasoning-model provider implementations for StudyClaw.
//!
//! All providers implement the `studyclaw_core::Provider` trait; the loop
//! never knows which backend is configured.

pub mod gemini;

pub use gemini::GeminiProvider;

use std::sync::Arc;
use studyclaw_core::error::Error;
use studyclaw_core::provider::Provider;

/// Build the configured reasoning-model provider.
pub fn build_from_config(
    config: &studyclaw_config::AppConfig,
) -> Result<Arc<dyn Provider>, Error> {
    let api_key = config.model.api_key.clone().ok_or_else(|| Error::Config {
        message: "model.api_key is not set".into(),
    })?;

    let mut provider = GeminiProvider::new(api_key);
    if let Some(url) = &config.model.api_url {
        provider = provider.with_base_url(url);
    }
    Ok(Arc::new(provider))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_fails_without_api_key() {
        let config = studyclaw_config::AppConfig::default();
        assert!(build_from_config(&config).is_err());
    }

    #[test]
    fn build_with_api_key() {
        let mut config = studyclaw_config::AppConfig::default();
        config.model.api_key = Some("test-key".into());
        let provider = build_from_config(&config).unwrap();
        assert_eq!(provider.name(), "gemini");
    }
}
