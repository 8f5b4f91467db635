use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

/// Transactional booking email delivery.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn booking_confirmed(
        &self,
        to: &str,
        name: &str,
        booking_id: &str,
    ) -> Result<(), MailError>;

    async fn booking_cancelled(
        &self,
        to: &str,
        name: &str,
        booking_id: &str,
        reason: Option<&str>,
    ) -> Result<(), MailError>;
}

#[derive(Debug)]
pub enum MailError {
    Http(String),
    Rejected(u16),
}

impl std::fmt::Display for MailError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MailError::Http(e) => write!(f, "email request failed: {e}"),
            MailError::Rejected(status) => write!(f, "email provider returned {status}"),
        }
    }
}

impl std::error::Error for MailError {}

const SIGNATURE: &str = "Konferenscentrum Väst";

fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// (subject, plain, html) for a confirmation message.
fn compose_confirmed(name: &str, booking_id: &str) -> (String, String, String) {
    let subject = format!("Booking confirmed (#{booking_id})");
    let plain = format!(
        "Hi {name},\n\nYour booking #{booking_id} is confirmed.\n\n— {SIGNATURE}"
    );
    let html = format!(
        "<p>Hi {},</p><p>Your booking <b>#{}</b> is confirmed.</p><p>— {SIGNATURE}</p>",
        html_escape(name),
        html_escape(booking_id),
    );
    (subject, plain, html)
}

/// (subject, plain, html) for a cancellation message.
fn compose_cancelled(
    name: &str,
    booking_id: &str,
    reason: Option<&str>,
) -> (String, String, String) {
    let subject = format!("Booking cancelled (#{booking_id})");
    let reason_txt = match reason {
        Some(r) if !r.trim().is_empty() => format!(" Reason: {r}"),
        _ => String::new(),
    };
    let plain = format!(
        "Hi {name},\n\nYour booking #{booking_id} has been cancelled.{reason_txt}\n\n— {SIGNATURE}"
    );
    let reason_html = match reason {
        Some(r) if !r.trim().is_empty() => {
            format!("<p><i>Reason:</i> {}</p>", html_escape(r))
        }
        _ => String::new(),
    };
    let html = format!(
        "<p>Hi {},</p><p>Your booking <b>#{}</b> has been cancelled.</p>{}<p>— {SIGNATURE}</p>",
        html_escape(name),
        html_escape(booking_id),
        reason_html,
    );
    (subject, plain, html)
}

const SENDGRID_ENDPOINT: &str = "https://api.sendgrid.com/v3/mail/send";

/// Sends through the SendGrid v3 mail API.
pub struct SendGridMailer {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    from_email: String,
    from_name: String,
}

impl SendGridMailer {
    pub fn new(api_key: String, from_email: String, from_name: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: SENDGRID_ENDPOINT.to_string(),
            api_key,
            from_email,
            from_name,
        }
    }

    async fn send(
        &self,
        to: &str,
        name: &str,
        subject: &str,
        plain: &str,
        html: &str,
    ) -> Result<(), MailError> {
        let payload = json!({
            "personalizations": [{ "to": [{ "email": to, "name": name }] }],
            "from": { "email": self.from_email, "name": self.from_name },
            "subject": subject,
            "content": [
                { "type": "text/plain", "value": plain },
                { "type": "text/html", "value": html },
            ],
        });

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                metrics::counter!(crate::observability::EMAILS_FAILED_TOTAL).increment(1);
                MailError::Http(e.to_string())
            })?;

        let status = resp.status();
        info!("email to {to}: provider status {status}");
        if status.as_u16() >= 400 {
            metrics::counter!(crate::observability::EMAILS_FAILED_TOTAL).increment(1);
            return Err(MailError::Rejected(status.as_u16()));
        }
        metrics::counter!(crate::observability::EMAILS_SENT_TOTAL).increment(1);
        Ok(())
    }
}

#[async_trait]
impl Mailer for SendGridMailer {
    async fn booking_confirmed(
        &self,
        to: &str,
        name: &str,
        booking_id: &str,
    ) -> Result<(), MailError> {
        let (subject, plain, html) = compose_confirmed(name, booking_id);
        self.send(to, name, &subject, &plain, &html).await
    }

    async fn booking_cancelled(
        &self,
        to: &str,
        name: &str,
        booking_id: &str,
        reason: Option<&str>,
    ) -> Result<(), MailError> {
        let (subject, plain, html) = compose_cancelled(name, booking_id, reason);
        self.send(to, name, &subject, &plain, &html).await
    }
}

/// Drops every message. Used when no API key is configured.
pub struct DisabledMailer;

#[async_trait]
impl Mailer for DisabledMailer {
    async fn booking_confirmed(
        &self,
        to: &str,
        _name: &str,
        booking_id: &str,
    ) -> Result<(), MailError> {
        warn!("email delivery disabled, dropping confirmation for booking {booking_id} to {to}");
        Ok(())
    }

    async fn booking_cancelled(
        &self,
        to: &str,
        _name: &str,
        booking_id: &str,
        _reason: Option<&str>,
    ) -> Result<(), MailError> {
        warn!("email delivery disabled, dropping cancellation for booking {booking_id} to {to}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmed_message_bodies() {
        let (subject, plain, html) = compose_confirmed("Anna Svensson", "B-1");
        assert_eq!(subject, "Booking confirmed (#B-1)");
        assert!(plain.contains("Hi Anna Svensson,"));
        assert!(plain.contains("#B-1 is confirmed"));
        assert!(html.contains("<b>#B-1</b>"));
    }

    #[test]
    fn cancelled_message_includes_reason() {
        let (_, plain, html) = compose_cancelled("Bo", "B-2", Some("double booked"));
        assert!(plain.contains("has been cancelled. Reason: double booked"));
        assert!(html.contains("<i>Reason:</i> double booked"));
    }

    #[test]
    fn cancelled_message_without_reason() {
        let (_, plain, html) = compose_cancelled("Bo", "B-2", None);
        assert!(plain.contains("has been cancelled.\n"));
        assert!(!html.contains("Reason"));
    }

    #[test]
    fn html_is_escaped() {
        let (_, _, html) = compose_confirmed("<script>", "1&2");
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("1&amp;2"));
        assert!(!html.contains("<script>"));
    }
}
