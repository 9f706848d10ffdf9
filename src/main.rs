mod telemetry;

use crm_ticketing_api::Application;
use crm_ticketing_infra::setup_context;
use telemetry::{get_subscriber, init_subscriber};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = get_subscriber("crm_ticketing_server".into(), "info".into());
    init_subscriber(subscriber);

    let context = setup_context().await?;

    let app = Application::new(context).await?;
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");
    app.shutdown().await
}
