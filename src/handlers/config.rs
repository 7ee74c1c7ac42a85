use crate::{error::AppError, state::AppState};
use actix_web::{web, HttpResponse};
use serde_json::json;

fn config_json(config: &crate::config::AppConfig) -> serde_json::Value {
    json!({
        "server": {
            "host": config.server.host,
            "port": config.server.port
        },
        "storage": {
            "models_root": config.storage.models_root,
            "legacy_models_root": config.storage.legacy_models_root,
            "anchors": config.storage.anchors,
            "event_log_path": config.storage.event_log_path,
            "allow_runtime_root_changes": config.storage.allow_runtime_root_changes
        }
    })
}

pub async fn get_config(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let config = state.get_config();
    let roots = state.registry.roots();

    Ok(HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "config": config_json(&config),
        "trusted_roots": {
            "current": roots.current(),
            "legacy": roots.legacy(),
            "anchors": roots.anchors()
        }
    })))
}

/// Partial runtime update of the configuration.
///
/// ## Endpoint: `PUT /api/v1/config`
///
/// Meant for maintenance. Moving the trusted roots or anchors is refused
/// with 400 unless the service was started with
/// `storage.allow_runtime_root_changes = true`.
pub async fn update_config(
    state: web::Data<AppState>,
    body: web::Json<serde_json::Value>,
) -> Result<HttpResponse, AppError> {
    let json_str = serde_json::to_string(&body.into_inner())?;

    let mut current_config = state.get_config();
    current_config
        .update_from_json(&json_str)
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    state
        .update_config(current_config.clone())
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "message": "Configuration updated successfully",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "updated_config": config_json(&current_config)
    })))
}

#[cfg(test)]
mod tests {
    use crate::state::tests::test_state;
    use actix_web::{http::StatusCode, test, web, App};
    use serde_json::{json, Value};

    #[actix_web::test]
    async fn test_put_config_cannot_move_roots() {
        let (_dir, state) = test_state();
        let current = state.registry.roots().current().to_path_buf();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .service(web::scope("/api/v1").configure(crate::handlers::configure)),
        )
        .await;

        let req = test::TestRequest::put()
            .uri("/api/v1/config")
            .set_json(json!({ "storage": { "models_root": "/etc", "allow_runtime_root_changes": true } }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::get().uri("/api/v1/config").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["trusted_roots"]["current"].as_str().unwrap(), current.to_str().unwrap());
        assert_eq!(body["config"]["storage"]["allow_runtime_root_changes"], false);
    }

    #[actix_web::test]
    async fn test_put_config_updates_server_settings() {
        let (_dir, state) = test_state();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .service(web::scope("/api/v1").configure(crate::handlers::configure)),
        )
        .await;

        let req = test::TestRequest::put()
            .uri("/api/v1/config")
            .set_json(json!({ "server": { "port": 9090 } }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["updated_config"]["server"]["port"], 9090);
    }
}
