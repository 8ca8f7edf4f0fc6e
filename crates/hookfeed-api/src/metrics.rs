//! Metrics collection for the API service.
//!
//! Metrics live in a registry owned by each [`ServiceMetrics`] instance, so
//! several routers (for example in tests) can run in one process.

use hookfeed_core::webhook::{WebhookError, WebhookResponse};
use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;

/// Service metrics for observability
#[derive(Debug)]
pub struct ServiceMetrics {
    registry: Registry,

    /// Webhook requests received, by ingress route
    pub webhooks_received_total: IntCounterVec,

    /// Webhook requests that failed, by failure reason
    pub webhooks_failed_total: IntCounterVec,

    pub webhook_duration_seconds: Histogram,

    /// Messages stored, by feed
    pub messages_stored_total: IntCounterVec,

    pub retention_deleted_total: IntCounter,
}

impl ServiceMetrics {
    pub fn new() -> Result<Arc<Self>, prometheus::Error> {
        let registry = Registry::new_custom(Some("hookfeed".to_string()), None)?;

        let webhooks_received_total = IntCounterVec::new(
            Opts::new("webhooks_received_total", "Webhook requests received"),
            &["route"],
        )?;
        let webhooks_failed_total = IntCounterVec::new(
            Opts::new("webhooks_failed_total", "Webhook requests that failed"),
            &["reason"],
        )?;
        let webhook_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "webhook_duration_seconds",
                "Webhook processing time distribution",
            )
            .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 2.0, 5.0]),
        )?;
        let messages_stored_total = IntCounterVec::new(
            Opts::new("messages_stored_total", "Messages written to the store"),
            &["feed_id"],
        )?;
        let retention_deleted_total = IntCounter::new(
            "retention_deleted_total",
            "Messages removed by retention enforcement",
        )?;

        registry.register(Box::new(webhooks_received_total.clone()))?;
        registry.register(Box::new(webhooks_failed_total.clone()))?;
        registry.register(Box::new(webhook_duration_seconds.clone()))?;
        registry.register(Box::new(messages_stored_total.clone()))?;
        registry.register(Box::new(retention_deleted_total.clone()))?;

        Ok(Arc::new(Self {
            registry,
            webhooks_received_total,
            webhooks_failed_total,
            webhook_duration_seconds,
            messages_stored_total,
            retention_deleted_total,
        }))
    }

    /// Record the outcome of one webhook request
    pub fn record_webhook(
        &self,
        route: &str,
        duration: Duration,
        outcome: Result<&WebhookResponse, &WebhookError>,
    ) {
        self.webhooks_received_total
            .with_label_values(&[route])
            .inc();
        self.webhook_duration_seconds
            .observe(duration.as_secs_f64());

        match outcome {
            Ok(response) => self
                .messages_stored_total
                .with_label_values(&[response.feed_id.as_str()])
                .inc(),
            Err(error) => self
                .webhooks_failed_total
                .with_label_values(&[error.reason()])
                .inc(),
        }
    }

    pub fn record_retention(&self, deleted: usize) {
        self.retention_deleted_total.inc_by(deleted as u64);
    }

    /// Render all metrics in the Prometheus text format
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
