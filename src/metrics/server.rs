use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use prometheus::{Encoder, TextEncoder};
use std::sync::Arc;

use super::Metrics;
use crate::notifications::NotificationHub;

// ============================================================================
// Status Server - /metrics for Prometheus, /health with live hub state
// ============================================================================

/// What the status endpoints read from.
#[derive(Clone)]
pub struct StatusState {
    pub metrics: Arc<Metrics>,
    pub hub: Arc<NotificationHub>,
}

/// Runs on its own actix system; call it from a dedicated thread.
pub async fn start_status_server(state: StatusState, port: u16) -> std::io::Result<()> {
    tracing::info!("📊 Starting status server on http://0.0.0.0:{}/metrics", port);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .configure(routes)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/metrics", web::get().to(metrics_handler))
        .route("/health", web::get().to(health_handler));
}

async fn metrics_handler(state: web::Data<StatusState>) -> impl Responder {
    let encoder = TextEncoder::new();
    let metric_families = state.metrics.registry().gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return HttpResponse::InternalServerError().finish();
    }

    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(buffer)
}

async fn health_handler(state: web::Data<StatusState>) -> impl Responder {
    let metrics = &state.metrics;
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "order-lifecycle",
        "notifications": {
            "recipients": state.hub.recipient_count(),
            "open_channels": state.hub.open_channel_count(),
            "pushes_delivered": metrics.pushes_delivered.get(),
            "pushes_failed": metrics.pushes_failed.get(),
        },
    }))
}
