use std::collections::HashSet;
use std::sync::Mutex;

use anyhow::anyhow;

use super::IEmailClient;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

/// Records outbound mail instead of sending it. Individual recipients can be
/// scripted to fail, which is how the DLQ paths are exercised in tests.
#[derive(Default)]
pub struct InMemoryEmailClient {
    sent: Mutex<Vec<SentEmail>>,
    failing_recipients: Mutex<HashSet<String>>,
}

impl InMemoryEmailClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every send to `recipient` will fail from now on.
    pub fn fail_for(&self, recipient: &str) {
        self.failing_recipients
            .lock()
            .unwrap()
            .insert(recipient.to_string());
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl IEmailClient for InMemoryEmailClient {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        if self.failing_recipients.lock().unwrap().contains(recipient) {
            return Err(anyhow!("smtp rejected recipient {}", recipient));
        }
        self.sent.lock().unwrap().push(SentEmail {
            recipient: recipient.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_sent_mail_and_scripted_failures() {
        let client = InMemoryEmailClient::new();
        client.fail_for("bad@example.com");

        assert!(client.send("ok@example.com", "s", "b").await.is_ok());
        assert!(client.send("bad@example.com", "s", "b").await.is_err());

        let sent = client.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, "ok@example.com");
    }
}
