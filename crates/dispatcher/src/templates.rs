//! 邮件与提醒的 HTML 模板

use chrono::{DateTime, Utc};
use followup_domain::entities::Lead;

pub const REENGAGEMENT_SUBJECT: &str = "We'd Love to Hear from You Again";
pub const INTERESTED_SUBJECT: &str = "Thank You for Your Interest!";

/// 形如 `01 Mar 2024, 03:00 PM`
pub fn format_callback_time(at: DateTime<Utc>) -> String {
    at.format("%d %b %Y, %I:%M %p").to_string()
}

pub fn reengagement_email(lead: &Lead) -> String {
    format!(
        r#"<p>Dear {name},</p>
<p>We noticed you showed interest in our services a couple of weeks ago.</p>
<p>We understand that timing is everything, and we'd love to reconnect with you to see if there's anything we can help you with now.</p>
<p>If you have any questions or would like to discuss how we can support you, please don't hesitate to reach out.</p>
<p>Looking forward to hearing from you!</p>
<p>Best regards,<br>
Your Team</p>
"#,
        name = lead.salutation()
    )
}

pub fn interested_email(lead: &Lead, followup_days: i64) -> String {
    format!(
        r#"<p>Dear {name},</p>
<p>Thank you so much for expressing interest in our services!</p>
<p>We're excited to have the opportunity to work with you and help you achieve your goals.</p>
<p>One of our team members will follow up with you within the next {followup_days} days to discuss the next steps.</p>
<p>In the meantime, if you have any questions, please feel free to reach out.</p>
<p>Best regards,<br>
Your Team</p>
"#,
        name = lead.salutation()
    )
}

pub fn callback_alert_subject(task_title: &str) -> String {
    format!("🔔 Callback Reminder: {task_title}")
}

pub fn callback_email_subject(task_title: &str) -> String {
    format!("Callback Reminder: {task_title}")
}

pub fn callback_alert_body(time: &str, task_title: &str, lead_name: &str) -> String {
    format!(
        r#"<p><strong>Reminder:</strong> You have a scheduled callback in 1 hour!</p>
<p><strong>Time:</strong> {time}</p>
<p><strong>Task:</strong> {task_title}</p>
<p><strong>Lead:</strong> {lead_name}</p>
<p>Please prepare for the callback.</p>
"#
    )
}

pub fn callback_email_body(time: &str, task_title: &str, lead_name: &str) -> String {
    format!(
        r#"<h3>Callback Reminder</h3>
<p>You have a scheduled callback in <strong>1 hour</strong>!</p>
<ul>
    <li><strong>Time:</strong> {time}</li>
    <li><strong>Task:</strong> {task_title}</li>
    <li><strong>Lead:</strong> {lead_name}</li>
</ul>
<p>Please prepare for the callback.</p>
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use followup_domain::entities::LeadStatus;

    fn lead(first_name: Option<&str>) -> Lead {
        Lead {
            id: 3,
            name: "LEAD-0003".to_string(),
            first_name: first_name.map(str::to_string),
            email: Some("lead@example.com".to_string()),
            owner: None,
            status: LeadStatus::New,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_callback_time_format() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 15, 5, 0).unwrap();
        assert_eq!(format_callback_time(at), "01 Mar 2024, 03:05 PM");
    }

    #[test]
    fn test_greeting_falls_back_to_valued_customer() {
        assert!(reengagement_email(&lead(Some("Ravi"))).contains("Dear Ravi,"));
        assert!(reengagement_email(&lead(None)).contains("Dear Valued Customer,"));
        assert!(interested_email(&lead(Some(" ")), 2).contains("Dear Valued Customer,"));
    }

    #[test]
    fn test_callback_reminder_texts() {
        assert_eq!(callback_alert_subject("Call"), "🔔 Callback Reminder: Call");
        let body = callback_email_body("01 Mar 2024, 03:05 PM", "Call", "LEAD-0003");
        assert!(body.contains("You have a scheduled callback in <strong>1 hour</strong>!"));
        assert!(body.contains("LEAD-0003"));
    }
}
