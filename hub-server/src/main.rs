use std::sync::Arc;

use hub_server::{HubConfig, HubCore, HubDispatcher, MessageBus};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration and set up logging
    let config = HubConfig::from_env();
    hub_server::init_logger_with_file(Some(&config.log_level), config.log_dir.as_deref());

    tracing::info!("Etiket hub starting...");

    // 2. Build the bus and hub state
    let bus = MessageBus::from_config(config.transport());
    let core = HubCore::new(bus.clone());

    // 3. Run the dispatcher alongside the TCP server
    let dispatcher = HubDispatcher::new(Arc::clone(&core));
    let dispatcher_shutdown = bus.shutdown_token().clone();
    let dispatcher_handle = tokio::spawn(dispatcher.run(dispatcher_shutdown));

    let server_bus = bus.clone();
    let server_core = Arc::clone(&core);
    let server_handle = tokio::spawn(async move {
        if let Err(e) = server_bus.start_tcp_server(server_core).await {
            tracing::error!("Job channel server error: {}", e);
        }
    });

    // 4. Shut down on ctrl-c
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    bus.shutdown();

    let _ = dispatcher_handle.await;
    let _ = server_handle.await;

    Ok(())
}
