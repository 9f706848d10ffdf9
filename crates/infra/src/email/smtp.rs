use anyhow::{anyhow, Context as _};
use lettre::{
    message::Mailbox,
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::debug;

use super::IEmailClient;
use crate::config::Config;

/// SMTP-backed email client.
pub struct SmtpEmailClient {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
}

impl SmtpEmailClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let sender = config
            .sender_email
            .parse::<Mailbox>()
            .with_context(|| format!("invalid sender email: {}", config.sender_email))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            .map_err(|e| anyhow!(e))?
            .port(config.smtp_port);
        if let (Some(username), Some(password)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            sender,
        })
    }
}

#[async_trait::async_trait]
impl IEmailClient for SmtpEmailClient {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        let message = Message::builder()
            .from(self.sender.clone())
            .to(recipient
                .parse()
                .with_context(|| format!("invalid recipient address: {}", recipient))?)
            .subject(subject)
            .body(body.to_string())
            .map_err(|e| anyhow!(e))?;

        self.transport.send(message).await.map_err(|e| anyhow!(e))?;
        debug!(recipient, "email sent");
        Ok(())
    }
}
