use kameo::Actor;
use scylla::client::session::Session;
use scylla::client::session_builder::SessionBuilder;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

use order_lifecycle::audit::AuditLog;
use order_lifecycle::config::{ServiceConfig, StorageBackend, StorageConfig};
use order_lifecycle::domain::order::{
    MoneySummary, NewOrder, OrderItem, OrderService, TransitionAction,
};
use order_lifecycle::metrics::{start_status_server, Metrics, StatusState};
use order_lifecycle::notifications::{
    DispatchingNotifier, HubNotifier, NotificationDispatcher, NotificationHub,
};
use order_lifecycle::store::{
    InMemoryOrderStore, InMemoryUserDirectory, OrderStore, ScyllaOrderStore,
};

const DEFAULT_LOG_FILTER: &str = "info,order_lifecycle=debug";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServiceConfig::load()?;

    // RUST_LOG wins over the configured filter
    let default_filter = config
        .log_filter
        .clone()
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .init();

    tracing::info!("🚀 Starting order lifecycle service");
    tracing::debug!(?config, "Loaded configuration");

    // === 1. Metrics ===
    let metrics = Arc::new(Metrics::new()?);
    tracing::info!(
        "📊 Metrics registry created with {} metrics",
        metrics.registry().gather().len()
    );

    // === 2. Storage ===
    let store = open_store(&config.storage).await?;
    let audit = AuditLog::new(store.clone());

    // === 3. Notifications ===
    let hub = Arc::new(NotificationHub::new(
        config.notifications.channel_buffer,
        metrics.clone(),
    ));

    if config.metrics.enabled {
        let state = StatusState {
            metrics: metrics.clone(),
            hub: hub.clone(),
        };
        let port = config.metrics.port;
        std::thread::spawn(move || {
            let result = actix_web::rt::System::new().block_on(start_status_server(state, port));
            if let Err(e) = result {
                tracing::error!("Status server error: {}", e);
            }
        });
    }

    let users = Arc::new(InMemoryUserDirectory::new());
    let notifier = HubNotifier::new(hub.clone(), users.clone(), metrics.clone());
    let dispatcher = NotificationDispatcher::spawn(NotificationDispatcher::new(notifier));

    let service = OrderService::new(
        store.clone(),
        Arc::new(DispatchingNotifier::new(dispatcher.clone())),
        metrics.clone(),
    );

    // === 4. Demonstrate an order lifecycle ===
    let owner_id = Uuid::new_v4();
    let recipient = "demo@example.com";
    users.insert(owner_id, recipient).await;

    let mut subscription = hub.subscribe(recipient);
    let listener = tokio::spawn(async move {
        while let Some(message) = subscription.recv().await {
            tracing::info!(
                recipient = subscription.recipient(),
                event = %message.event,
                data = %message.data,
                "📨 Push received"
            );
        }
    });

    let order = service
        .register_order(NewOrder {
            owner_id,
            items: vec![
                OrderItem {
                    product_id: Uuid::new_v4(),
                    quantity: 2,
                },
                OrderItem {
                    product_id: Uuid::new_v4(),
                    quantity: 1,
                },
            ],
            amounts: MoneySummary::new(4_500, 500, 4_000),
        })
        .await?;
    tracing::info!("✅ Order registered: {}", order.id);

    let steps = [
        (TransitionAction::Forward, None),
        (TransitionAction::Forward, None),
        (TransitionAction::Backward, Some("kitchen out of stock".to_string())),
        (TransitionAction::Cancel, Some("customer request".to_string())),
        (TransitionAction::Forward, None),
    ];
    for (action, reason) in steps {
        match service.apply_transition(order.id, action, reason).await {
            Ok(event) => {
                tracing::info!(order_id = %order.id, status = %event.new_status, "Order moved")
            }
            Err(e) => tracing::warn!(order_id = %order.id, error = %e, "Transition refused"),
        }
    }

    for event in audit.history(order.id).await? {
        tracing::info!(
            sequence_number = event.sequence_number,
            previous = ?event.previous_status,
            new = %event.new_status,
            reason = ?event.reason,
            "📜 Audit"
        );
    }
    tracing::info!(
        backward = audit.backward_transitions(order.id).await?.len(),
        "Backward moves recorded"
    );

    // Let the dispatcher drain, then close the channel
    tokio::time::sleep(tokio::time::Duration::from_millis(200)).await;
    listener.abort();

    tracing::info!("Demo complete. Press Ctrl+C to exit.");
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");

    Ok(())
}

async fn open_store(storage: &StorageConfig) -> anyhow::Result<Arc<dyn OrderStore>> {
    match storage.backend {
        StorageBackend::Memory => {
            tracing::info!("Using in-memory order store");
            Ok(Arc::new(InMemoryOrderStore::new()))
        }
        StorageBackend::Scylla => {
            tracing::info!(node = %storage.known_node, "Connecting to ScyllaDB...");
            let session: Session = SessionBuilder::new()
                .known_node(&storage.known_node)
                .build()
                .await?;

            session
                .query_unpaged(
                    format!(
                        "CREATE KEYSPACE IF NOT EXISTS {} WITH REPLICATION = \
                         {{'class': 'SimpleStrategy', 'replication_factor': 1}}",
                        storage.keyspace
                    ),
                    &[],
                )
                .await?;
            session.use_keyspace(&storage.keyspace, false).await?;

            let store = ScyllaOrderStore::new(Arc::new(session));
            store.ensure_schema().await?;
            Ok(Arc::new(store))
        }
    }
}
