use serde::{Deserialize, Serialize};

use crate::validation::{ConfigValidator, ValidationUtils};

/// 重试与首次联系任务参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: i32,
    pub retry_interval_days: i32,
    pub first_contact_due_days: i32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            retry_interval_days: 2,
            first_contact_due_days: 2,
        }
    }
}

impl ConfigValidator for RetryConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_positive(self.max_attempts as i64, "retry.max_attempts")?;
        ValidationUtils::validate_positive(
            self.retry_interval_days as i64,
            "retry.retry_interval_days",
        )?;
        ValidationUtils::validate_positive(
            self.first_contact_due_days as i64,
            "retry.first_contact_due_days",
        )?;
        Ok(())
    }
}

/// Interested / Not Interested 分支的时间参数（天）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusFlowConfig {
    pub not_interested_email_days: i64,
    pub not_interested_followup_days: i64,
    pub interested_followup_days: i64,
}

impl Default for StatusFlowConfig {
    fn default() -> Self {
        Self {
            not_interested_email_days: 15,
            not_interested_followup_days: 30,
            interested_followup_days: 2,
        }
    }
}

impl ConfigValidator for StatusFlowConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_positive(
            self.not_interested_email_days,
            "status_flows.not_interested_email_days",
        )?;
        ValidationUtils::validate_positive(
            self.not_interested_followup_days,
            "status_flows.not_interested_followup_days",
        )?;
        ValidationUtils::validate_positive(
            self.interested_followup_days,
            "status_flows.interested_followup_days",
        )?;
        Ok(())
    }
}

/// 回调提醒窗口 `[now + lead - window, now + lead)`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackConfig {
    pub reminder_lead_minutes: i64,
    pub reminder_window_minutes: i64,
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            reminder_lead_minutes: 60,
            reminder_window_minutes: 30,
        }
    }
}

impl ConfigValidator for CallbackConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_positive(
            self.reminder_lead_minutes,
            "callbacks.reminder_lead_minutes",
        )?;
        ValidationUtils::validate_positive(
            self.reminder_window_minutes,
            "callbacks.reminder_window_minutes",
        )?;
        if self.reminder_window_minutes > self.reminder_lead_minutes {
            return Err(crate::ConfigError::Validation(
                "callbacks.reminder_window_minutes must not exceed reminder_lead_minutes"
                    .to_string(),
            ));
        }
        Ok(())
    }
}
