//! Liveness and metrics endpoints.
//!
//! `/health` answers "can this instance serve model paths right now": the
//! catalog must respond and the current models root must exist.
//! `/api/v1/metrics` reports the per-endpoint counters collected by
//! [`crate::middleware::MetricsMiddleware`].

use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde_json::json;

fn ratio(part: u64, whole: u64) -> f64 {
    if whole > 0 {
        part as f64 / whole as f64
    } else {
        0.0
    }
}

pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let metrics = state.get_metrics_snapshot();
    let config = state.get_config();
    let roots = state.registry.roots();

    let catalog = state.registry.catalog_size().await;
    if let Err(e) = &catalog {
        tracing::warn!(error = %e, "catalog unavailable during health check");
    }

    // A missing current root is survivable (rebased sets just aren't present
    // on disk yet) but worth surfacing.
    let healthy = catalog.is_ok() && roots.current().is_dir();

    let root_report: serde_json::Map<String, serde_json::Value> = roots
        .iter()
        .map(|(kind, root)| {
            (
                kind.to_string(),
                json!({ "path": root, "exists": root.is_dir() }),
            )
        })
        .collect();

    HttpResponse::Ok().json(json!({
        "status": if healthy { "healthy" } else { "degraded" },
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": state.get_uptime_seconds(),
        "service": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "host": config.server.host,
            "port": config.server.port
        },
        "requests": {
            "total": metrics.request_count,
            "errors": metrics.error_count,
            "error_rate": ratio(metrics.error_count, metrics.request_count)
        },
        "registry": {
            "catalog": if catalog.is_ok() { "ok" } else { "unavailable" },
            "model_sets": catalog.unwrap_or(0),
            "roots": root_report,
            "anchors": roots.anchors()
        }
    }))
}

pub async fn detailed_metrics(state: web::Data<AppState>) -> HttpResponse {
    let metrics = state.get_metrics_snapshot();
    let uptime_seconds = state.get_uptime_seconds();
    let model_sets = state.registry.catalog_size().await.ok();

    let mut endpoints: Vec<_> = metrics.endpoint_metrics.iter().collect();
    endpoints.sort_by(|a, b| a.0.cmp(b.0));
    let endpoints: Vec<_> = endpoints
        .into_iter()
        .map(|(endpoint, metric)| {
            json!({
                "endpoint": endpoint,
                "request_count": metric.request_count,
                "error_count": metric.error_count,
                "error_rate": metric.error_rate(),
                "average_duration_ms": metric.average_duration_ms(),
                "total_duration_ms": metric.total_duration_ms
            })
        })
        .collect();

    HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds,
        "overall": {
            "total_requests": metrics.request_count,
            "total_errors": metrics.error_count,
            "error_rate": ratio(metrics.error_count, metrics.request_count),
            "requests_per_second": ratio(metrics.request_count, uptime_seconds)
        },
        "model_sets": model_sets,
        "endpoints": endpoints
    }))
}
