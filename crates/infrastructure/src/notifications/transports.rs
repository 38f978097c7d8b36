use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use followup_config::{NotificationConfig, TransportKind};
use followup_domain::{
    entities::{RecordRef, ScheduledEmail},
    ports::EmailTransport,
};
use followup_errors::{FollowupError, FollowupResult};
use serde::Serialize;
use tracing::info;

/// 只写日志的传输层，默认使用
#[derive(Debug, Clone)]
pub struct LogTransport {
    sender: String,
}

impl LogTransport {
    pub fn new<S: Into<String>>(sender: S) -> Self {
        Self {
            sender: sender.into(),
        }
    }
}

#[async_trait]
impl EmailTransport for LogTransport {
    async fn deliver(&self, email: &ScheduledEmail) -> FollowupResult<()> {
        info!(
            email.id = email.id,
            email.from = %self.sender,
            email.to = ?email.recipients,
            email.subject = %email.subject,
            "Email delivered to log transport"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    html: &'a str,
    reference: Option<&'a RecordRef>,
}

/// 以 JSON POST 到邮件中继服务
#[derive(Debug, Clone)]
pub struct WebhookTransport {
    client: reqwest::Client,
    url: String,
    sender: String,
}

impl WebhookTransport {
    pub fn new(url: &str, sender: &str, timeout: Duration) -> FollowupResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FollowupError::config_error(format!("无法创建 HTTP 客户端: {e}")))?;
        Ok(Self {
            client,
            url: url.to_string(),
            sender: sender.to_string(),
        })
    }
}

#[async_trait]
impl EmailTransport for WebhookTransport {
    async fn deliver(&self, email: &ScheduledEmail) -> FollowupResult<()> {
        let payload = WebhookPayload {
            from: &self.sender,
            to: &email.recipients,
            subject: &email.subject,
            html: &email.html_body,
            reference: email.reference.as_ref(),
        };

        self.client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| FollowupError::notification(format!("邮件中继请求失败: {e}")))?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}

pub fn build_transport(config: &NotificationConfig) -> FollowupResult<Arc<dyn EmailTransport>> {
    match config.transport {
        TransportKind::Log => Ok(Arc::new(LogTransport::new(config.sender.clone()))),
        TransportKind::Webhook => {
            let url = config.webhook_url.as_deref().ok_or_else(|| {
                FollowupError::config_error("webhook 传输需要配置 notifications.webhook_url")
            })?;
            Ok(Arc::new(WebhookTransport::new(
                url,
                &config.sender,
                Duration::from_secs(config.request_timeout_seconds),
            )?))
        }
    }
}
