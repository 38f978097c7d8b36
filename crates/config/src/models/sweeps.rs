use serde::{Deserialize, Serialize};

use crate::validation::{ConfigValidator, ValidationUtils};

/// 周期任务调度参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    pub enabled: bool,
    pub retry_cron: String,
    pub callback_cron: String,
    pub job_poll_interval_seconds: u64,
    pub job_batch_size: usize,
    /// Running 状态超过该时长的作业视为执行方已失联，可被重新认领
    pub job_lease_minutes: i64,
    pub email_flush_interval_seconds: u64,
    pub email_batch_size: usize,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            retry_cron: "0 0 2 * * *".to_string(),
            callback_cron: "0 */15 * * * *".to_string(),
            job_poll_interval_seconds: 60,
            job_batch_size: 100,
            job_lease_minutes: 30,
            email_flush_interval_seconds: 30,
            email_batch_size: 50,
        }
    }
}

impl ConfigValidator for SweepConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_cron(&self.retry_cron, "sweeps.retry_cron")?;
        ValidationUtils::validate_cron(&self.callback_cron, "sweeps.callback_cron")?;
        ValidationUtils::validate_timeout_seconds(self.job_poll_interval_seconds)?;
        ValidationUtils::validate_timeout_seconds(self.email_flush_interval_seconds)?;
        ValidationUtils::validate_count(self.job_batch_size, "sweeps.job_batch_size")?;
        ValidationUtils::validate_positive(self.job_lease_minutes, "sweeps.job_lease_minutes")?;
        ValidationUtils::validate_count(self.email_batch_size, "sweeps.email_batch_size")?;
        Ok(())
    }
}
