//! # Prometheus Metrics
//!
//! HTTP-level metrics (request counts, latency, errors) are recorded in
//! middleware. Store gauges (catalog size, open carts, orders by payment
//! status) are refreshed on each `/metrics` scrape (pull model), see
//! [`ApiMetrics::refresh_from_state`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use prometheus::core::Collector;
use prometheus::{
    Encoder, Gauge, GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use storefront_core::PaymentStatus;

use crate::state::AppState;

/// Shared metrics state backed by a Prometheus registry.
#[derive(Clone)]
pub struct ApiMetrics {
    inner: Arc<Inner>,
}

struct Inner {
    registry: Registry,

    // -- HTTP middleware metrics (push model) --
    http_requests_total: IntCounterVec,
    http_request_duration_seconds: HistogramVec,
    http_errors_total: IntCounterVec,

    // -- Store gauges (pull model, updated on /metrics scrape) --
    products_total: Gauge,
    products_low_inventory: Gauge,
    collections_total: Gauge,
    customers_total: Gauge,
    carts_open: Gauge,
    orders_total: GaugeVec,
}

impl std::fmt::Debug for ApiMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiMetrics")
            .field("requests", &self.requests())
            .field("errors", &self.errors())
            .finish()
    }
}

fn register<C: Collector + Clone + 'static>(registry: &Registry, collector: C) -> C {
    registry
        .register(Box::new(collector.clone()))
        .expect("metric can be registered");
    collector
}

impl ApiMetrics {
    /// Create a new metrics instance with a fresh Prometheus registry.
    pub fn new() -> Self {
        let registry = Registry::new();

        let http_requests_total = register(
            &registry,
            IntCounterVec::new(
                Opts::new("storefront_http_requests_total", "Total HTTP requests"),
                &["method", "path", "status"],
            )
            .expect("metric can be created"),
        );

        let http_request_duration_seconds = register(
            &registry,
            HistogramVec::new(
                HistogramOpts::new(
                    "storefront_http_request_duration_seconds",
                    "HTTP request duration in seconds",
                )
                .buckets(vec![
                    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
                ]),
                &["method", "path"],
            )
            .expect("metric can be created"),
        );

        let http_errors_total = register(
            &registry,
            IntCounterVec::new(
                Opts::new(
                    "storefront_http_errors_total",
                    "Total HTTP errors (4xx and 5xx)",
                ),
                &["method", "path", "status"],
            )
            .expect("metric can be created"),
        );

        let products_total = register(
            &registry,
            Gauge::new("storefront_products_total", "Products in the catalog")
                .expect("metric can be created"),
        );

        let products_low_inventory = register(
            &registry,
            Gauge::new(
                "storefront_products_low_inventory",
                "Products below the low-stock threshold",
            )
            .expect("metric can be created"),
        );

        let collections_total = register(
            &registry,
            Gauge::new("storefront_collections_total", "Product collections")
                .expect("metric can be created"),
        );

        let customers_total = register(
            &registry,
            Gauge::new("storefront_customers_total", "Customer profiles")
                .expect("metric can be created"),
        );

        let carts_open = register(
            &registry,
            Gauge::new("storefront_carts_open", "Carts not yet checked out")
                .expect("metric can be created"),
        );

        let orders_total = register(
            &registry,
            GaugeVec::new(
                Opts::new("storefront_orders_total", "Orders by payment status"),
                &["payment_status"],
            )
            .expect("metric can be created"),
        );

        Self {
            inner: Arc::new(Inner {
                registry,
                http_requests_total,
                http_request_duration_seconds,
                http_errors_total,
                products_total,
                products_low_inventory,
                collections_total,
                customers_total,
                carts_open,
                orders_total,
            }),
        }
    }

    /// Total request count (sum across all labels).
    pub fn requests(&self) -> u64 {
        sum_counter(&self.inner.http_requests_total)
    }

    /// Total error count (sum across all labels).
    pub fn errors(&self) -> u64 {
        sum_counter(&self.inner.http_errors_total)
    }

    /// Record an HTTP request (called by the middleware).
    fn record_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.inner
            .http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();

        self.inner
            .http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);

        if status >= 400 {
            self.inner
                .http_errors_total
                .with_label_values(&[method, path, &status_str])
                .inc();
        }
    }

    /// Update the store gauges from current application state.
    pub fn refresh_from_state(&self, state: &AppState) {
        let threshold = state.config.low_inventory_threshold;
        let products = state.products.list();
        let low = products.iter().filter(|p| p.inventory < threshold).count();
        self.inner.products_total.set(products.len() as f64);
        self.inner.products_low_inventory.set(low as f64);
        self.inner
            .collections_total
            .set(state.collections.len() as f64);
        self.inner.customers_total.set(state.customers.len() as f64);
        self.inner.carts_open.set(state.carts.len() as f64);

        let mut by_status: HashMap<PaymentStatus, usize> = HashMap::new();
        for order in state.orders.list() {
            *by_status.entry(order.payment_status).or_default() += 1;
        }
        for status in [
            PaymentStatus::Pending,
            PaymentStatus::Complete,
            PaymentStatus::Failed,
        ] {
            let count = by_status.get(&status).copied().unwrap_or(0);
            self.inner
                .orders_total
                .with_label_values(&[status.as_str()])
                .set(count as f64);
        }
    }

    /// Gather all metrics and encode to Prometheus text format.
    pub fn gather_and_encode(&self) -> Result<String, String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| format!("failed to encode metrics: {e}"))?;
        String::from_utf8(buffer)
            .map_err(|e| format!("metrics encoding produced invalid UTF-8: {e}"))
    }
}

impl Default for ApiMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn sum_counter(counter: &IntCounterVec) -> u64 {
    counter
        .collect()
        .iter()
        .flat_map(|mf| mf.get_metric())
        .map(|m| m.get_counter().get_value() as u64)
        .sum()
}

/// Replace UUID path segments with `{id}` to bound label cardinality.
fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if uuid::Uuid::parse_str(segment).is_ok() {
                "{id}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Middleware that records HTTP request metrics via Prometheus.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let metrics = request.extensions().get::<ApiMetrics>().cloned();
    let method = request.method().to_string();
    let path = normalize_path(request.uri().path());
    let start = Instant::now();

    let response = next.run(request).await;

    if let Some(m) = metrics {
        let duration = start.elapsed().as_secs_f64();
        m.record_request(&method, &path, response.status().as_u16(), duration);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{CartRecord, CollectionRecord, OrderRecord, ProductRecord};
    use chrono::Utc;
    use storefront_core::Money;
    use uuid::Uuid;

    #[test]
    fn new_starts_at_zero() {
        let m = ApiMetrics::new();
        assert_eq!(m.requests(), 0);
        assert_eq!(m.errors(), 0);
    }

    #[test]
    fn requests_and_errors_count_independently() {
        let m = ApiMetrics::new();
        for _ in 0..5 {
            m.record_request("GET", "/v1/products", 200, 0.01);
        }
        m.record_request("GET", "/v1/products/{id}", 404, 0.01);
        m.record_request("POST", "/v1/orders", 500, 0.2);
        assert_eq!(m.requests(), 7);
        assert_eq!(m.errors(), 2);
    }

    #[test]
    fn clone_shares_underlying_counters() {
        let m = ApiMetrics::new();
        let clone = m.clone();
        m.record_request("GET", "/x", 200, 0.01);
        assert_eq!(clone.requests(), 1);
    }

    #[test]
    fn normalize_path_replaces_uuids() {
        let path = "/v1/carts/550e8400-e29b-41d4-a716-446655440000/items/660e8400-e29b-41d4-a716-446655440001";
        assert_eq!(normalize_path(path), "/v1/carts/{id}/items/{id}");
        assert_eq!(normalize_path("/v1/customers/me"), "/v1/customers/me");
    }

    #[test]
    fn refresh_from_state_sets_gauges() {
        let state = AppState::new();
        let collection = CollectionRecord {
            id: Uuid::new_v4(),
            title: "Toys".into(),
            created_at: Utc::now(),
        };
        state.collections.insert(collection.id, collection.clone());
        for inventory in [2, 50] {
            let p = ProductRecord {
                id: Uuid::new_v4(),
                title: "Yo-yo".into(),
                slug: "yo-yo".into(),
                description: None,
                unit_price: Money::from_cents(199),
                inventory,
                collection_id: collection.id,
                last_update: Utc::now(),
            };
            state.products.insert(p.id, p);
        }
        let cart = CartRecord {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            items: vec![],
        };
        state.carts.insert(cart.id, cart);
        let order = OrderRecord {
            id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            placed_at: Utc::now(),
            payment_status: PaymentStatus::Failed,
            items: vec![],
        };
        state.orders.insert(order.id, order);

        let m = ApiMetrics::new();
        m.refresh_from_state(&state);
        let output = m.gather_and_encode().unwrap();
        assert!(output.contains("storefront_products_total 2"));
        assert!(output.contains("storefront_products_low_inventory 1"));
        assert!(output.contains("storefront_carts_open 1"));
        assert!(output.contains("storefront_orders_total{payment_status=\"FAILED\"} 1"));
        assert!(output.contains("storefront_orders_total{payment_status=\"PENDING\"} 0"));
    }
}
