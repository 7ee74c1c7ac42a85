//! # Application State Management
//!
//! Shared state handed to every HTTP request handler.
//!
//! ## Arc<RwLock<T>> Pattern
//! - **Arc**: many handlers hold a reference to the same data
//! - **RwLock**: many readers or one writer at a time
//!
//! The model registry is shared through a plain `Arc`: it does its own
//! locking internally (catalog store and trusted roots).

use crate::config::AppConfig;
use crate::registry::ModelRegistryService;
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

/// State shared across all HTTP request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration (can be updated at runtime)
    pub config: Arc<RwLock<AppConfig>>,

    /// Request metrics, updated by the metrics middleware
    pub metrics: Arc<RwLock<AppMetrics>>,

    /// Model set catalog with path resolution in front
    pub registry: Arc<ModelRegistryService>,

    /// When the server started
    pub start_time: Instant,
}

/// Request metrics collected across all HTTP requests.
#[derive(Debug, Default, Clone)]
pub struct AppMetrics {
    /// Total number of HTTP requests processed since server start
    pub request_count: u64,

    /// Total number of errors encountered since server start
    pub error_count: u64,

    /// Per-endpoint statistics, keyed by `"METHOD /path"`
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

/// Performance metrics for a specific API endpoint.
#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    pub request_count: u64,
    pub total_duration_ms: u64,
    pub error_count: u64,
}

impl AppState {
    pub fn new(config: AppConfig, registry: Arc<ModelRegistryService>) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            registry,
            start_time: Instant::now(),
        }
    }

    /// Get a copy of the current configuration.
    ///
    /// Cloning releases the lock immediately, so other threads aren't blocked.
    pub fn get_config(&self) -> AppConfig {
        self.config
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Replace the configuration after validating it.
    ///
    /// If the storage roots changed, new trusted roots are built and swapped
    /// into the registry before the config is committed. That is refused
    /// unless `storage.allow_runtime_root_changes` was set at startup. A root
    /// that cannot be used leaves both the config and the registry untouched.
    pub fn update_config(&self, mut new_config: AppConfig) -> Result<()> {
        new_config.validate()?;

        let mut config = self.config.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        new_config.storage.allow_runtime_root_changes = config.storage.allow_runtime_root_changes;

        if config.roots_changed(&new_config) {
            if !config.storage.allow_runtime_root_changes {
                return Err(anyhow!(
                    "Trusted model roots can only be changed at startup \
                     (storage.allow_runtime_root_changes is off)"
                ));
            }
            let roots = new_config.trusted_roots()?;
            self.registry.replace_roots(roots);
        }
        *config = new_config;
        Ok(())
    }

    /// Increment the total request counter.
    pub fn increment_request_count(&self) {
        let mut metrics = self.metrics.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        metrics.request_count += 1;
    }

    /// Increment the total error counter (4xx and 5xx responses).
    pub fn increment_error_count(&self) {
        let mut metrics = self.metrics.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        metrics.error_count += 1;
    }

    /// Record one request against an endpoint.
    ///
    /// The first request for an endpoint creates its entry.
    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        let mut metrics = self.metrics.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        let endpoint_metric = metrics.endpoint_metrics.entry(endpoint.to_string()).or_default();

        endpoint_metric.request_count += 1;
        endpoint_metric.total_duration_ms += duration_ms;
        if is_error {
            endpoint_metric.error_count += 1;
        }
    }

    /// Copy of the current metrics, so the lock isn't held while serializing.
    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        self.metrics
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl EndpointMetric {
    /// Average response time; 0.0 before the first request.
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0
        }
    }

    /// Error rate between 0.0 and 1.0.
    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}
