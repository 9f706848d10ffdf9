use std::sync::{Arc, Mutex};

use crm_ticketing_domain::TicketDetails;
use crm_ticketing_infra::{
    BusMessage, Config, Context, InMemoryEmailClient, InMemoryEventBus, InMemoryKVStore,
    InMemoryWatcherRepo, MessageHandler, RealSys, Repos,
};

/// In-memory infrastructure with handles onto the pieces tests script.
pub struct TestInfra {
    pub ctx: Context,
    pub watchers: Arc<InMemoryWatcherRepo>,
    pub email: Arc<InMemoryEmailClient>,
}

pub fn setup_infra() -> TestInfra {
    let watchers = Arc::new(InMemoryWatcherRepo::new());
    let email = Arc::new(InMemoryEmailClient::new());
    let ctx = Context {
        repos: Repos {
            watchers: watchers.clone(),
        },
        kv: Arc::new(InMemoryKVStore::new()),
        bus: Arc::new(InMemoryEventBus::new()),
        email: email.clone(),
        config: Config::new(),
        sys: Arc::new(RealSys {}),
    };
    TestInfra {
        ctx,
        watchers,
        email,
    }
}

pub struct RecordingHandler {
    pub messages: Arc<Mutex<Vec<BusMessage>>>,
}

#[async_trait::async_trait]
impl MessageHandler for RecordingHandler {
    async fn handle(&self, msg: BusMessage) -> anyhow::Result<()> {
        self.messages.lock().unwrap().push(msg);
        Ok(())
    }
}

/// Subscribes a recording consumer so a test can observe published events.
pub async fn probe(
    ctx: &Context,
    stream: &str,
    subject: &str,
    consumer: &str,
) -> Arc<Mutex<Vec<BusMessage>>> {
    let messages = Arc::new(Mutex::new(Vec::new()));
    ctx.bus
        .queue_subscribe(
            stream,
            subject,
            consumer,
            Arc::new(RecordingHandler {
                messages: messages.clone(),
            }),
        )
        .await
        .unwrap();
    messages
}

pub fn ticket_details(ticket_id: &str) -> TicketDetails {
    TicketDetails {
        ticket_id: ticket_id.to_string(),
        status: "open".into(),
        priority: "high".into(),
        created_at: "2026-01-01T00:00:00Z".into(),
        assigned_to: String::new(),
    }
}
