mod bus;
mod config;
mod email;
mod kv;
mod repos;
mod system;

use std::sync::Arc;

use anyhow::anyhow;
use tracing::{info, warn};

pub use bus::{
    BusMessage, IEventBus, InMemoryEventBus, MessageHandler, NatsEventBus, ACK_WAIT, DLQ_STREAM,
    DLQ_SUBJECTS, MAX_DELIVER, TICKETS_STREAM, TICKETS_SUBJECTS,
};
pub use config::Config;
pub use email::{IEmailClient, InMemoryEmailClient, SentEmail, SmtpEmailClient};
pub use kv::{IKVStore, InMemoryKVStore, KVEntry, KVError, KVOperation, KVWatch, NatsKVStore};
pub use repos::{IWatcherRepo, InMemoryWatcherRepo, Repos};
pub use system::{FixedSys, ISys, RealSys};

#[derive(Clone)]
pub struct Context {
    pub repos: Repos,
    pub kv: Arc<dyn IKVStore>,
    pub bus: Arc<dyn IEventBus>,
    pub email: Arc<dyn IEmailClient>,
    pub config: Config,
    pub sys: Arc<dyn ISys>,
}

impl Context {
    pub fn create_inmemory() -> Self {
        Self {
            repos: Repos::create_inmemory(),
            kv: Arc::new(InMemoryKVStore::new()),
            bus: Arc::new(InMemoryEventBus::new()),
            email: Arc::new(InMemoryEmailClient::new()),
            config: Config::new(),
            sys: Arc::new(RealSys {}),
        }
    }

    async fn create(config: Config, nats_url: &str) -> anyhow::Result<Self> {
        let bus = NatsEventBus::connect(nats_url).await?;

        // Bind to the reminder bucket, creating it on first boot
        let jetstream = bus.jetstream();
        let store = match jetstream.get_key_value(&config.kv_bucket).await {
            Ok(store) => store,
            Err(_) => jetstream
                .create_key_value(async_nats::jetstream::kv::Config {
                    bucket: config.kv_bucket.clone(),
                    ..Default::default()
                })
                .await
                .map_err(|e| anyhow!(e))?,
        };

        let email = SmtpEmailClient::new(&config)?;

        Ok(Self {
            repos: Repos::create_inmemory(),
            kv: Arc::new(NatsKVStore::new(store)),
            bus: Arc::new(bus),
            email: Arc::new(email),
            config,
            sys: Arc::new(RealSys {}),
        })
    }
}

/// Will setup the correct infra context given the environment
pub async fn setup_context() -> anyhow::Result<Context> {
    let config = Config::new();

    match config.nats_url.clone() {
        Some(nats_url) => {
            info!("NATS_URL env var was provided. Going to use NATS JetStream.");
            Context::create(config, &nats_url).await
        }
        None => {
            warn!(
                "NATS_URL env var was not provided. Going to use inmemory infra. This should only be used during testing!"
            );
            Ok(Context::create_inmemory())
        }
    }
}
