use chrono_tz::Tz;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct Config {
    /// Set when the process should run against a real NATS server.
    pub nats_url: Option<String>,
    /// Name of the KV bucket holding reminder records.
    pub kv_bucket: String,
    /// Sender address for notification mail.
    pub sender_email: String,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    /// Zone used only when formatting instants for humans. Everything is
    /// stored and compared in UTC.
    pub display_timezone: Tz,
}

impl Config {
    pub fn new() -> Self {
        let nats_url = std::env::var("NATS_URL").ok();
        let kv_bucket =
            std::env::var("KV_BUCKET").unwrap_or_else(|_| "ticket_reminders".to_string());
        let sender_email =
            std::env::var("SENDER_EMAIL").unwrap_or_else(|_| "support@example.com".to_string());
        let smtp_host = std::env::var("SMTP_HOST").unwrap_or_else(|_| "localhost".to_string());

        let default_smtp_port = "587";
        let smtp_port = std::env::var("SMTP_PORT").unwrap_or_else(|_| default_smtp_port.into());
        let smtp_port = match smtp_port.parse::<u16>() {
            Ok(port) => port,
            Err(_) => {
                warn!(
                    "The given SMTP_PORT: {} is not valid, falling back to the default port: {}.",
                    smtp_port, default_smtp_port
                );
                587
            }
        };

        let default_timezone = "Asia/Kolkata";
        let display_timezone = std::env::var("DISPLAY_TIMEZONE")
            .unwrap_or_else(|_| default_timezone.to_string());
        let display_timezone = match display_timezone.parse::<Tz>() {
            Ok(tz) => tz,
            Err(_) => {
                warn!(
                    "The given DISPLAY_TIMEZONE: {} is not a valid IANA zone, falling back to {}.",
                    display_timezone, default_timezone
                );
                chrono_tz::Asia::Kolkata
            }
        };

        Self {
            nats_url,
            kv_bucket,
            sender_email,
            smtp_host,
            smtp_port,
            smtp_username: std::env::var("SMTP_USERNAME").ok(),
            smtp_password: std::env::var("SMTP_PASSWORD").ok(),
            display_timezone,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
