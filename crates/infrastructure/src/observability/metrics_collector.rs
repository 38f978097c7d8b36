//! Prometheus counters for the follow-up flows
//!
//! Counters resolve against the global recorder on every call, so they work
//! whether or not the binary installed one.

use metrics::counter;

pub const RETRY_TASKS_CREATED: &str = "followup_retry_tasks_created_total";
pub const LEADS_ESCALATED: &str = "followup_leads_escalated_total";
pub const SWEEP_FAILURES: &str = "followup_sweep_failures_total";
pub const CALLBACK_REMINDERS: &str = "followup_callback_reminders_total";
pub const EMAILS_SENT: &str = "followup_emails_sent_total";

pub struct FollowupMetrics;

impl FollowupMetrics {
    pub fn record_retry_created() {
        counter!(RETRY_TASKS_CREATED).increment(1);
    }

    pub fn record_lead_escalated() {
        counter!(LEADS_ESCALATED).increment(1);
    }

    pub fn record_sweep_failure(operation: &'static str) {
        counter!(SWEEP_FAILURES, "operation" => operation).increment(1);
    }

    pub fn record_callback_reminder() {
        counter!(CALLBACK_REMINDERS).increment(1);
    }

    pub fn record_email(transport: &'static str, outcome: &'static str) {
        counter!(EMAILS_SENT, "transport" => transport, "outcome" => outcome).increment(1);
    }
}
