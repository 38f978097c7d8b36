use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// 已为该任务创建过重试或已升级
    AlreadyProcessed,
    /// 任务状态已不是 Call Not Connected
    StatusChanged,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RetryOutcome {
    RetryCreated { task_id: i64, attempt_number: i32 },
    Escalated { lead_id: i64 },
    Skipped { reason: SkipReason },
}

impl RetryOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, RetryOutcome::Skipped { .. })
    }

    pub fn as_label(&self) -> &'static str {
        match self {
            RetryOutcome::RetryCreated { .. } => "retry_created",
            RetryOutcome::Escalated { .. } => "escalated",
            RetryOutcome::Skipped {
                reason: SkipReason::AlreadyProcessed,
            } => "already_processed",
            RetryOutcome::Skipped {
                reason: SkipReason::StatusChanged,
            } => "status_changed",
        }
    }
}

/// 条件写入的结果，`GuardLost` 表示版本或标志检查未通过，事务已回滚
#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome<T> {
    Committed(T),
    GuardLost,
}

impl<T> CommitOutcome<T> {
    pub fn is_committed(&self) -> bool {
        matches!(self, CommitOutcome::Committed(_))
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub retried: usize,
    pub escalated: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl SweepReport {
    pub fn record(&mut self, outcome: &RetryOutcome) {
        match outcome {
            RetryOutcome::RetryCreated { .. } => self.retried += 1,
            RetryOutcome::Escalated { .. } => self.escalated += 1,
            RetryOutcome::Skipped { .. } => self.skipped += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CallbackSweepReport {
    pub scanned: usize,
    pub notified: usize,
    pub already_claimed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FlushReport {
    pub sent: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobRunReport {
    pub claimed: usize,
    pub completed: usize,
    pub failed: usize,
}

/// 回调提醒窗口 `[now + lead - window, now + lead)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderWindow {
    pub lead: Duration,
    pub window: Duration,
}

impl ReminderWindow {
    pub fn from_minutes(lead_minutes: i64, window_minutes: i64) -> Self {
        Self {
            lead: Duration::minutes(lead_minutes),
            window: Duration::minutes(window_minutes),
        }
    }

    pub fn bounds(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let end = now + self.lead;
        (end - self.window, end)
    }

    pub fn contains(&self, now: DateTime<Utc>, at: DateTime<Utc>) -> bool {
        let (start, end) = self.bounds(now);
        at >= start && at < end
    }
}

impl Default for ReminderWindow {
    fn default() -> Self {
        Self::from_minutes(60, 30)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_reminder_window_bounds() {
        let window = ReminderWindow::default();
        let callback = Utc.with_ymd_and_hms(2024, 3, 1, 15, 0, 0).unwrap();

        assert!(!window.contains(callback - Duration::minutes(70), callback));
        assert!(window.contains(callback - Duration::minutes(55), callback));
        assert!(!window.contains(callback - Duration::minutes(25), callback));
        // 左闭右开
        assert!(!window.contains(callback - Duration::minutes(60), callback));
        assert!(window.contains(callback - Duration::minutes(30), callback));
    }

    #[test]
    fn test_sweep_report_record() {
        let mut report = SweepReport::default();
        report.record(&RetryOutcome::RetryCreated {
            task_id: 2,
            attempt_number: 2,
        });
        report.record(&RetryOutcome::Escalated { lead_id: 1 });
        report.record(&RetryOutcome::Skipped {
            reason: SkipReason::StatusChanged,
        });
        assert_eq!(report.retried, 1);
        assert_eq!(report.escalated, 1);
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn test_outcome_success_flag() {
        assert!(RetryOutcome::Escalated { lead_id: 1 }.is_success());
        assert!(!RetryOutcome::Skipped {
            reason: SkipReason::AlreadyProcessed
        }
        .is_success());
    }
}
