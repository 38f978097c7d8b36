use serde::{Deserialize, Serialize};

use crate::validation::{ConfigValidator, ValidationUtils};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Log,
    Webhook,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub transport: TransportKind,
    pub sender: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    pub request_timeout_seconds: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Log,
            sender: "noreply@example.com".to_string(),
            webhook_url: None,
            request_timeout_seconds: 10,
        }
    }
}

impl ConfigValidator for NotificationConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_not_empty(&self.sender, "notifications.sender")?;
        ValidationUtils::validate_timeout_seconds(self.request_timeout_seconds)?;

        if self.transport == TransportKind::Webhook {
            match &self.webhook_url {
                Some(url) => ValidationUtils::validate_url(url, "notifications.webhook_url")?,
                None => {
                    return Err(crate::ConfigError::Validation(
                        "notifications.webhook_url is required for the webhook transport"
                            .to_string(),
                    ))
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webhook_requires_url() {
        let mut config = NotificationConfig {
            transport: TransportKind::Webhook,
            ..NotificationConfig::default()
        };
        assert!(config.validate().is_err());

        config.webhook_url = Some("https://relay.example.com/send".to_string());
        assert!(config.validate().is_ok());
    }
}
