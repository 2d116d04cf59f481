//! Process-wide prometheus metrics, fed from the event bus and served over
//! HTTP.

use actix_web::{get, App, HttpServer, Responder};
use anyhow::Result;
use lazy_static::lazy_static;
use prometheus::{
    register_int_counter_vec, register_int_gauge_vec, Encoder, IntCounterVec, IntGaugeVec,
    TextEncoder,
};
use quarry_bus::{EventKind, EventPayload, Subscription};

lazy_static! {
    /// Blocks indexed, by chain.
    pub static ref BLOCKS_INDEXED: IntCounterVec = register_int_counter_vec!(
        "quarry_blocks_indexed",
        "Number of blocks indexed",
        &["chain"]
    )
    .expect("blocks counter failed to register");

    /// Transactions indexed, by chain.
    pub static ref TRANSACTIONS_INDEXED: IntCounterVec = register_int_counter_vec!(
        "quarry_transactions_indexed",
        "Number of transactions indexed",
        &["chain"]
    )
    .expect("transactions counter failed to register");

    /// Logs indexed, by chain.
    pub static ref LOGS_INDEXED: IntCounterVec = register_int_counter_vec!(
        "quarry_logs_indexed",
        "Number of logs indexed",
        &["chain"]
    )
    .expect("logs counter failed to register");

    /// Pipeline failures, by chain.
    pub static ref PIPELINE_ERRORS: IntCounterVec = register_int_counter_vec!(
        "quarry_pipeline_errors",
        "Number of height-level pipeline failures",
        &["chain"]
    )
    .expect("errors counter failed to register");

    /// The contiguous watermark, by chain.
    pub static ref WATERMARK: IntGaugeVec = register_int_gauge_vec!(
        "quarry_watermark",
        "Highest contiguously indexed height",
        &["chain"]
    )
    .expect("watermark gauge failed to register");
}

/// Drains a bus subscription into the prometheus registry.
pub async fn bridge(mut subscription: Subscription) {
    while let Some(event) = subscription.recv().await {
        let chain = event.chain_id.to_string();
        match event.kind {
            EventKind::Block => BLOCKS_INDEXED.with_label_values(&[&chain]).inc(),
            EventKind::Transaction => TRANSACTIONS_INDEXED.with_label_values(&[&chain]).inc(),
            EventKind::Log => LOGS_INDEXED.with_label_values(&[&chain]).inc(),
            EventKind::Error => PIPELINE_ERRORS.with_label_values(&[&chain]).inc(),
            EventKind::Progress => {
                if let EventPayload::Progress { watermark, .. } = event.payload {
                    WATERMARK.with_label_values(&[&chain]).set(watermark as i64);
                }
            }
        }
    }
}

/// Starts the metrics server.
pub async fn serve_metrics(bind: String) -> Result<()> {
    let _ = HttpServer::new(|| App::new().service(index).service(metrics))
        .bind(bind.as_str())
        .map_err(|e| anyhow::anyhow!(e))?
        .run()
        .await;
    Ok(())
}

#[get("/")]
async fn index() -> impl Responder {
    "quarry-metrics-server: visit /metrics to view metrics"
}

#[get("/metrics")]
async fn metrics() -> impl Responder {
    let encoder = TextEncoder::new();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::error!("Failed to encode prometheus metrics: {:?}", e);
    }
    String::from_utf8(buffer).unwrap_or_default()
}
