use async_trait::async_trait;
use followup_errors::FollowupResult;

use crate::entities::{EmailMessage, NewAlert, ScheduledEmail};

/// 通知分发端口
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    /// 写入发件箱，返回邮件记录 ID
    async fn send_email(&self, email: &EmailMessage) -> FollowupResult<i64>;
    async fn create_alert(&self, alert: &NewAlert) -> FollowupResult<i64>;
}

/// 实际投递邮件的传输层
#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn deliver(&self, email: &ScheduledEmail) -> FollowupResult<()>;
    fn name(&self) -> &'static str;
}
