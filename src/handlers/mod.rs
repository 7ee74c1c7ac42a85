pub mod config;
pub mod models;

pub use config::*;
pub use models::*;

use actix_web::web;

/// Routes mounted under `/api/v1`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(crate::health::health_check))
        .route("/metrics", web::get().to(crate::health::detailed_metrics))
        .route("/config", web::get().to(get_config))
        .route("/config", web::put().to(update_config))
        .route("/paths/resolve", web::post().to(resolve_path))
        .route("/models/{provider}", web::get().to(list_model_sets))
        .route("/models/{provider}/{key}", web::get().to(get_model_set))
        .route("/models/{provider}/{key}", web::put().to(upsert_model_set))
        .route("/models/{provider}/{key}", web::delete().to(delete_model_set))
        .route("/models/{provider}/{key}/rebase", web::post().to(rebase_model_set));
}
