//! # Model Set REST API Handlers
//!
//! HTTP endpoints over the model registry. All path handling happens in the
//! registry service; these handlers only translate between JSON and the
//! service calls.
//!
//! ## Available Endpoints:
//! - `GET /models/{provider}` - List model sets for a provider
//! - `GET /models/{provider}/{key}` - One model set
//! - `PUT /models/{provider}/{key}` - Create or update a model set
//! - `DELETE /models/{provider}/{key}` - Remove a model set
//! - `POST /models/{provider}/{key}/rebase` - Re-resolve a stored (possibly foreign) path
//! - `POST /paths/resolve` - Dry-run resolution of a candidate path

use crate::paths::RootKind;
use crate::registry::{EntryRequest, ModelRegistryService, ModelSet, Provider, UpsertSetRequest};
use crate::{error::AppError, state::AppState};
use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;

/// Header naming who made a change; recorded in the registry event log.
const ACTOR_HEADER: &str = "X-Actor";

/// Request body for `PUT /models/{provider}/{key}`.
#[derive(Debug, Deserialize)]
pub struct UpsertModelSetBody {
    /// Defaults to the key when missing
    #[serde(default)]
    pub display_name: Option<String>,

    /// Candidate path; may come from another host
    pub path: String,

    #[serde(default)]
    pub entries: Vec<EntryRequest>,

    #[serde(default)]
    pub note: Option<String>,
}

/// Request body for `POST /paths/resolve`.
#[derive(Debug, Deserialize)]
pub struct ResolvePathBody {
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    pub note: Option<String>,
}

/// Model entry as reported to clients.
#[derive(Debug, Serialize)]
pub struct ModelEntryResponse {
    pub name: String,
    pub path: PathBuf,
    pub requires_accelerator: bool,
    pub notes: Option<String>,
    pub present_on_disk: bool,
}

/// Model set as reported to clients.
#[derive(Debug, Serialize)]
pub struct ModelSetResponse {
    pub id: String,
    pub provider: Provider,
    pub key: String,
    pub display_name: String,
    pub path: PathBuf,
    pub root: Option<RootKind>,
    pub present_on_disk: bool,
    pub revision: u64,
    pub entries: Vec<ModelEntryResponse>,
    pub created_at: String,
    pub updated_at: String,
}

impl ModelSetResponse {
    /// Build the client view of a stored row.
    ///
    /// `root` is a containment check on the path *as stored*; `null` flags a
    /// row that needs rebasing on this host.
    pub fn new(set: ModelSet, registry: &ModelRegistryService) -> Self {
        Self {
            id: set.id.to_string(),
            provider: set.provider,
            root: registry.validate_path(&set.path).ok(),
            present_on_disk: set.path.exists(),
            entries: set
                .entries
                .into_iter()
                .map(|entry| ModelEntryResponse {
                    present_on_disk: entry.path.exists(),
                    name: entry.name,
                    path: entry.path,
                    requires_accelerator: entry.requires_accelerator,
                    notes: entry.notes,
                })
                .collect(),
            key: set.key,
            display_name: set.display_name,
            path: set.path,
            revision: set.revision,
            created_at: set.created_at.to_rfc3339(),
            updated_at: set.updated_at.to_rfc3339(),
        }
    }
}

fn parse_provider(raw: &str) -> Result<Provider, AppError> {
    raw.parse::<Provider>()
        .map_err(|e| AppError::BadRequest(e.to_string()))
}

fn actor(req: &HttpRequest) -> String {
    req.headers()
        .get(ACTOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("api")
        .to_string()
}

/// List model sets for a provider.
///
/// ## Endpoint: `GET /api/v1/models/{provider}`
///
/// Paths are returned exactly as stored. A row copied from another host may
/// still show its foreign path (and `present_on_disk: false`) until it is
/// rebased.
pub async fn list_model_sets(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let provider = parse_provider(&path.into_inner())?;
    let sets = state.registry.list_sets(provider).await?;
    let sets: Vec<ModelSetResponse> = sets
        .into_iter()
        .map(|set| ModelSetResponse::new(set, &state.registry))
        .collect();

    Ok(HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "provider": provider,
        "count": sets.len(),
        "model_sets": sets
    })))
}

/// ## Endpoint: `GET /api/v1/models/{provider}/{key}`
pub async fn get_model_set(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, AppError> {
    let (provider, key) = path.into_inner();
    let provider = parse_provider(&provider)?;
    let set = state.registry.get_set(provider, &key).await?;

    Ok(HttpResponse::Ok().json(ModelSetResponse::new(set, &state.registry)))
}

/// Create or update a model set.
///
/// ## Endpoint: `PUT /api/v1/models/{provider}/{key}`
///
/// ## Request Body:
/// ```json
/// {
///   "display_name": "Whisper base",
///   "path": "C:\\Users\\x\\OtherClone\\backend\\models\\whisper\\base",
///   "entries": [{ "name": "model.safetensors", "requires_accelerator": false }],
///   "note": "imported from laptop"
/// }
/// ```
///
/// The stored path is the resolved one, e.g. `/srv/app/backend/models/whisper/base`.
/// Unresolvable or out-of-root paths are rejected with 422 and nothing is written.
pub async fn upsert_model_set(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
    body: web::Json<UpsertModelSetBody>,
) -> Result<HttpResponse, AppError> {
    let (provider, key) = path.into_inner();
    let provider = parse_provider(&provider)?;
    let body = body.into_inner();

    let request = UpsertSetRequest {
        provider,
        display_name: body.display_name.unwrap_or_default(),
        key,
        path: body.path,
        entries: body.entries,
        note: body.note,
    };

    let set = state.registry.upsert_set(request, &actor(&req)).await?;
    Ok(HttpResponse::Ok().json(ModelSetResponse::new(set, &state.registry)))
}

/// ## Endpoint: `DELETE /api/v1/models/{provider}/{key}?note=...`
pub async fn delete_model_set(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
    query: web::Query<DeleteQuery>,
) -> Result<HttpResponse, AppError> {
    let (provider, key) = path.into_inner();
    let provider = parse_provider(&provider)?;

    let removed = state
        .registry
        .delete_set(provider, &key, &actor(&req), query.into_inner().note)
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "status": "deleted",
        "provider": removed.provider,
        "key": removed.key,
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

/// Re-resolve a stored row, using its stored paths as candidates.
///
/// ## Endpoint: `POST /api/v1/models/{provider}/{key}/rebase`
pub async fn rebase_model_set(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, AppError> {
    let (provider, key) = path.into_inner();
    let provider = parse_provider(&provider)?;

    let set = state.registry.rebase_set(provider, &key, &actor(&req)).await?;
    Ok(HttpResponse::Ok().json(ModelSetResponse::new(set, &state.registry)))
}

/// Show where a candidate path would end up, without writing anything.
///
/// ## Endpoint: `POST /api/v1/paths/resolve`
pub async fn resolve_path(
    state: web::Data<AppState>,
    body: web::Json<ResolvePathBody>,
) -> Result<HttpResponse, AppError> {
    let candidate = body.into_inner().path;
    let resolved = state.registry.resolve_path(&candidate)?;

    Ok(HttpResponse::Ok().json(json!({
        "candidate": candidate,
        "resolved": resolved.path,
        "root": resolved.root,
        "rebased": resolved.rebased,
        "present_on_disk": resolved.path.exists()
    })))
}
