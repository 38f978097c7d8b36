//! 发件箱式通知分发
//!
//! 邮件先写入 `scheduled_emails`，由周期任务交给传输层投递；
//! 投递失败只标记邮件行，不影响已提交的业务记录。

use std::sync::Arc;

use async_trait::async_trait;
use followup_domain::{
    entities::{EmailMessage, NewAlert},
    ports::{Clock, EmailTransport, NotificationDispatcher},
    repositories::{AlertRepository, EmailOutboxRepository},
    value_objects::FlushReport,
};
use followup_errors::FollowupResult;
use tracing::{debug, instrument};

use crate::observability::{FollowupMetrics, StructuredLogger};

pub struct OutboxDispatcher {
    outbox: Arc<dyn EmailOutboxRepository>,
    alerts: Arc<dyn AlertRepository>,
    transport: Arc<dyn EmailTransport>,
    clock: Arc<dyn Clock>,
}

impl OutboxDispatcher {
    pub fn new(
        outbox: Arc<dyn EmailOutboxRepository>,
        alerts: Arc<dyn AlertRepository>,
        transport: Arc<dyn EmailTransport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            outbox,
            alerts,
            transport,
            clock,
        }
    }

    /// 投递所有到期邮件
    #[instrument(skip(self), fields(transport = self.transport.name()))]
    pub async fn flush_due_emails(&self, limit: usize) -> FollowupResult<FlushReport> {
        let now = self.clock.now();
        let due = self.outbox.find_due(now, limit).await?;
        let mut report = FlushReport::default();

        for email in due {
            match self.transport.deliver(&email).await {
                Ok(()) => {
                    self.outbox.mark_sent(email.id, self.clock.now()).await?;
                    FollowupMetrics::record_email(self.transport.name(), "sent");
                    StructuredLogger::log_email_sent(
                        email.id,
                        self.transport.name(),
                        email.recipients.len(),
                    );
                    report.sent += 1;
                }
                Err(e) => {
                    self.outbox.mark_error(email.id, &e.to_string()).await?;
                    FollowupMetrics::record_email(self.transport.name(), "error");
                    StructuredLogger::log_email_failed(email.id, self.transport.name(), &e);
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }
}

#[async_trait]
impl NotificationDispatcher for OutboxDispatcher {
    async fn send_email(&self, email: &EmailMessage) -> FollowupResult<i64> {
        let send_after = email.send_after.unwrap_or_else(|| self.clock.now());
        let stored = self.outbox.insert(email, send_after).await?;
        debug!(
            email.id = stored.id,
            email.subject = %stored.subject,
            email.send_after = %stored.send_after,
            "Email queued in outbox"
        );
        Ok(stored.id)
    }

    async fn create_alert(&self, alert: &NewAlert) -> FollowupResult<i64> {
        let stored = self.alerts.create(alert, self.clock.now()).await?;
        debug!(alert.id = stored.id, alert.for_user = %stored.for_user, "Alert created");
        Ok(stored.id)
    }
}
