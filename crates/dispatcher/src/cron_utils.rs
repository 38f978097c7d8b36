use chrono::{DateTime, Utc};
use cron::Schedule;
use followup_errors::{FollowupError, FollowupResult};
use std::str::FromStr;
use tracing::debug;

/// CRON表达式解析和调度工具
#[derive(Debug, Clone)]
pub struct CronScheduler {
    expression: String,
    schedule: Schedule,
}

impl CronScheduler {
    pub fn new(cron_expr: &str) -> FollowupResult<Self> {
        let schedule = Schedule::from_str(cron_expr).map_err(|e| {
            FollowupError::config_error(format!("无效的CRON表达式 '{cron_expr}': {e}"))
        })?;

        Ok(Self {
            expression: cron_expr.to_string(),
            schedule,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// 上次执行之后是否已经到达下一个触发点
    pub fn should_trigger(&self, last_run: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self.schedule.after(&last_run).next() {
            Some(next_time) => {
                let should_trigger = next_time <= now;
                if should_trigger {
                    debug!(
                        "周期任务应该触发: 上次执行={}, 下次执行={}, 当前时间={}",
                        last_run.format("%Y-%m-%d %H:%M:%S UTC"),
                        next_time.format("%Y-%m-%d %H:%M:%S UTC"),
                        now.format("%Y-%m-%d %H:%M:%S UTC")
                    );
                }
                should_trigger
            }
            None => false,
        }
    }

    pub fn next_execution_time(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&from).next()
    }

    pub fn upcoming_times(&self, from: DateTime<Utc>, count: usize) -> Vec<DateTime<Utc>> {
        self.schedule.after(&from).take(count).collect()
    }

    /// 距离下一次触发的时长，无后续触发点时返回 None
    pub fn time_until_next_execution(&self, now: DateTime<Utc>) -> Option<std::time::Duration> {
        self.next_execution_time(now)
            .and_then(|next| (next - now).to_std().ok())
    }
}
