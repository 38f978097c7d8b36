use std::str::FromStr;

use chrono::{Duration, TimeZone, Utc};
use cron::Schedule;

use crate::ConfigResult;

/// Trait for configuration validation
pub trait ConfigValidator {
    fn validate(&self) -> ConfigResult<()>;
}

/// General validation utilities
pub struct ValidationUtils;

impl ValidationUtils {
    /// Validate that a string is not empty
    pub fn validate_not_empty(value: &str, field_name: &str) -> ConfigResult<()> {
        if value.trim().is_empty() {
            return Err(crate::ConfigError::Validation(format!(
                "{field_name} cannot be empty"
            )));
        }
        Ok(())
    }

    pub fn validate_positive(value: i64, field_name: &str) -> ConfigResult<()> {
        if value <= 0 {
            return Err(crate::ConfigError::Validation(format!(
                "{field_name} must be greater than 0"
            )));
        }
        Ok(())
    }

    /// Validate that a timeout is reasonable
    pub fn validate_timeout_seconds(timeout_seconds: u64) -> ConfigResult<()> {
        if timeout_seconds == 0 {
            return Err(crate::ConfigError::Validation(
                "timeout_seconds must be greater than 0".to_string(),
            ));
        }
        if timeout_seconds > 3600 {
            return Err(crate::ConfigError::Validation(
                "timeout_seconds must be less than or equal to 3600".to_string(),
            ));
        }
        Ok(())
    }

    /// Validate that a count is reasonable
    pub fn validate_count(count: usize, field_name: &str) -> ConfigResult<()> {
        if count == 0 {
            return Err(crate::ConfigError::Validation(format!(
                "{field_name} must be greater than 0"
            )));
        }
        if count > 10000 {
            return Err(crate::ConfigError::Validation(format!(
                "{field_name} must be less than or equal to 10000"
            )));
        }
        Ok(())
    }

    /// Validate that a URL has a valid format
    pub fn validate_url(url: &str, field_name: &str) -> ConfigResult<()> {
        Self::validate_not_empty(url, field_name)?;

        if !url.contains("://") {
            return Err(crate::ConfigError::Validation(format!(
                "{field_name} must be a valid URL with protocol"
            )));
        }

        Ok(())
    }

    pub fn validate_cron(expression: &str, field_name: &str) -> ConfigResult<Schedule> {
        Self::validate_not_empty(expression, field_name)?;
        Schedule::from_str(expression).map_err(|e| {
            crate::ConfigError::Validation(format!(
                "{field_name} is not a valid cron expression '{expression}': {e}"
            ))
        })
    }

    /// 相邻两次触发之间的最大间隔，按固定起点采样，结果可复现
    pub fn max_cron_gap(schedule: &Schedule, samples: usize) -> Option<Duration> {
        let origin = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single()?;
        let fires: Vec<_> = schedule.after(&origin).take(samples.max(2)).collect();
        fires.windows(2).map(|pair| pair[1] - pair[0]).max()
    }
}
