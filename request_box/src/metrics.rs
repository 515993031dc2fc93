//! Per-token capture gauges with conditional Prometheus support.

#[cfg(feature = "with-metrics")]
mod metrics_impl {
    use anyhow::Result;
    use prometheus::{Encoder, IntGaugeVec, Opts, Registry, TextEncoder};

    /// Prometheus registry holding the `request_box_gauge{token}` family.
    #[derive(Clone)]
    pub struct Metrics {
        registry: Registry,
        requests: IntGaugeVec,
    }

    impl Metrics {
        pub fn new() -> Result<Self> {
            let registry = Registry::new();
            let requests = IntGaugeVec::new(
                Opts::new("request_box_gauge", "Total number of requests."),
                &["token"],
            )?;
            registry.register(Box::new(requests.clone()))?;

            Ok(Self { registry, requests })
        }

        pub fn token_created(&self, token: &str) {
            self.requests.with_label_values(&[token]).set(0);
        }

        pub fn request_captured(&self, token: &str) {
            self.requests.with_label_values(&[token]).inc();
        }

        pub fn token_cleared(&self, token: &str) {
            self.requests.with_label_values(&[token]).set(0);
        }

        pub fn token_deleted(&self, token: &str) {
            // Absent label is not an error here.
            let _ = self.requests.remove_label_values(&[token]);
        }

        /// Text exposition of every registered metric.
        pub fn render(&self) -> Result<Option<String>> {
            let mut buffer = Vec::new();
            TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
            Ok(Some(String::from_utf8(buffer)?))
        }
    }
}

#[cfg(feature = "with-metrics")]
pub use metrics_impl::Metrics;

/// No-op metrics when the `with-metrics` feature is disabled.
#[cfg(not(feature = "with-metrics"))]
#[derive(Clone, Default)]
pub struct Metrics;

#[cfg(not(feature = "with-metrics"))]
impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self)
    }

    pub fn token_created(&self, _token: &str) {}

    pub fn request_captured(&self, _token: &str) {}

    pub fn token_cleared(&self, _token: &str) {}

    pub fn token_deleted(&self, _token: &str) {}

    pub fn render(&self) -> anyhow::Result<Option<String>> {
        Ok(None)
    }
}
