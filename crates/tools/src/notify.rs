//! SMS notification tool — delivers the composed plan via Twilio.
//!
//! Thin adapter over the Messages endpoint (basic auth, form body). The
//! channel caps message bodies at 1600 characters; anything longer is
//! rejected as invalid arguments before the wire is touched — the composer
//! keeps plans well under this.

use async_trait::async_trait;
use serde::Deserialize;
use studyclaw_core::error::ToolError;
use studyclaw_core::tool::{Tool, ToolResult};
use tracing::{debug, info};

const DEFAULT_BASE_URL: &str = "https://api.twilio.com";

/// The channel's hard body-length cap.
pub const SMS_BODY_LIMIT: usize = 1600;

/// Notification adapter configuration.
#[derive(Clone)]
pub struct NotifyToolConfig {
    /// Twilio account SID.
    pub account_sid: String,
    /// Twilio auth token.
    pub auth_token: String,
    /// Sending phone number.
    pub from_number: String,
    /// Default recipient (the learner).
    pub to_number: String,
    /// API base URL override (testing/proxies).
    pub api_url: Option<String>,
}

impl std::fmt::Debug for NotifyToolConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyToolConfig")
            .field("account_sid", &"[REDACTED]")
            .field("auth_token", &"[REDACTED]")
            .field("from_number", &self.from_number)
            .field("to_number", &self.to_number)
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl From<&studyclaw_config::NotifyConfig> for NotifyToolConfig {
    fn from(cfg: &studyclaw_config::NotifyConfig) -> Self {
        Self {
            account_sid: cfg.account_sid.clone().unwrap_or_default(),
            auth_token: cfg.auth_token.clone().unwrap_or_default(),
            from_number: cfg.from_number.clone().unwrap_or_default(),
            to_number: cfg.to_number.clone().unwrap_or_default(),
            api_url: cfg.api_url.clone(),
        }
    }
}

/// The `send_notification` tool.
pub struct NotifyTool {
    config: NotifyToolConfig,
    client: reqwest::Client,
}

impl NotifyTool {
    pub fn new(config: NotifyToolConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");
        Self { config, client }
    }

    fn base_url(&self) -> &str {
        self.config.api_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    /// Send one SMS. Returns the provider's message SID on success.
    pub async fn send(&self, to: &str, body: &str) -> Result<String, ToolError> {
        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url(),
            self.config.account_sid
        );

        debug!(%to, body_len = body.len(), "Sending SMS notification");

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&[
                ("To", to),
                ("From", self.config.from_number.as_str()),
                ("Body", body),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ToolError::Timeout {
                        tool_name: "send_notification".into(),
                        timeout_secs: 30,
                    }
                } else {
                    ToolError::Network {
                        tool_name: "send_notification".into(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status().as_u16();
        match status {
            200 | 201 => {}
            401 | 403 => {
                return Err(ToolError::AuthFailed {
                    tool_name: "send_notification".into(),
                    reason: format!("SMS provider returned {status}"),
                });
            }
            429 => {
                return Err(ToolError::RateLimited {
                    tool_name: "send_notification".into(),
                    retry_after_secs: 30,
                });
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                return Err(ToolError::Upstream {
                    tool_name: "send_notification".into(),
                    status_code: status,
                    message: body,
                });
            }
        }

        let confirmation: MessageConfirmation =
            response.json().await.map_err(|e| ToolError::Upstream {
                tool_name: "send_notification".into(),
                status_code: status,
                message: format!("failed to parse delivery confirmation: {e}"),
            })?;

        info!(sid = %confirmation.sid, %to, "SMS queued for delivery");
        Ok(confirmation.sid)
    }
}

#[async_trait]
impl Tool for NotifyTool {
    fn name(&self) -> &str {
        "send_notification"
    }

    fn description(&self) -> &str {
        "Send the final learning plan to the learner as an SMS. \
         The body must fit the channel limit."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "body": {
                    "type": "string",
                    "description": "The message text to deliver"
                },
                "to": {
                    "type": "string",
                    "description": "Recipient phone number. Defaults to the configured learner."
                }
            },
            "required": ["body"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let body = arguments["body"]
            .as_str()
            .filter(|b| !b.is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("missing 'body' argument".into()))?;

        if body.chars().count() > SMS_BODY_LIMIT {
            return Err(ToolError::InvalidArguments(format!(
                "message body exceeds the {SMS_BODY_LIMIT}-character channel limit"
            )));
        }

        let to = arguments["to"]
            .as_str()
            .filter(|t| !t.is_empty())
            .unwrap_or(self.config.to_number.as_str());

        let sid = self.send(to, body).await?;

        Ok(ToolResult {
            call_id: String::new(),
            success: true,
            output: format!("SMS queued for delivery to {to} (sid {sid})"),
            data: Some(serde_json::json!({ "sid": sid, "to": to })),
        })
    }
}

// --- Wire format structs ---

#[derive(Debug, Deserialize)]
struct MessageConfirmation {
    sid: String,
}
