//! Axum server and routes.

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use site_assets::{
    decode_data_url, AssetCategory, AssetError, AssetPublisher, AssetStore, StoredAsset,
    UploadClient,
};
use site_audit::{ActionLog, LogQuery};
use site_auth::{AuthError, AuthGate, Credentials, Session};
use site_content::{ContentError, ContentStore, NotificationBus, SectionKey, SectionUpdate};
use site_types::{KeyValueStore, LogAction, StorageError};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;

/// Response envelope shared by every route: `{code, message, data}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse {
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

type Reply = Json<ApiResponse>;

fn ok(data: impl Serialize) -> Reply {
    match serde_json::to_value(data) {
        Ok(data) => Json(ApiResponse {
            code: 200,
            message: "Success".to_string(),
            data: Some(data),
        }),
        Err(e) => fail(500, e.to_string()),
    }
}

fn fail(code: u16, message: impl Into<String>) -> Reply {
    Json(ApiResponse {
        code,
        message: message.into(),
        data: None,
    })
}

fn fail_with(code: u16, message: impl Into<String>, data: Value) -> Reply {
    Json(ApiResponse {
        code,
        message: message.into(),
        data: Some(data),
    })
}

fn storage_code(e: &StorageError) -> u16 {
    if e.is_quota() {
        507
    } else {
        500
    }
}

fn content_error(e: ContentError) -> Reply {
    let code = match &e {
        ContentError::Storage(s) => storage_code(s),
        ContentError::NotAList(_)
        | ContentError::ShapeMismatch { .. }
        | ContentError::InvalidRecord(_)
        | ContentError::ImportValidation(_) => 400,
        ContentError::RecordNotFound { .. } => 404,
        ContentError::Serialization(_) => 500,
    };
    fail(code, e.to_string())
}

fn asset_error(e: AssetError) -> Reply {
    let code = match &e {
        AssetError::InvalidFile(_) | AssetError::ImportValidation(_) => 400,
        AssetError::FileTooLarge { .. } => 413,
        AssetError::Storage(s) => storage_code(s),
        AssetError::Content(ContentError::Storage(s)) => storage_code(s),
        AssetError::Content(_) | AssetError::Serialization(_) => 500,
    };
    fail(code, e.to_string())
}

pub struct AppState {
    pub content: Arc<ContentStore>,
    pub assets: Arc<AssetStore>,
    pub publisher: AssetPublisher,
    pub log: Arc<ActionLog>,
    pub auth: AuthGate,
}

impl AppState {
    /// Wire every component over one Persistent Store.
    pub fn new(
        kv: Arc<dyn KeyValueStore>,
        upload: Option<Arc<dyn UploadClient>>,
        upload_timeout: Duration,
        credentials: Credentials,
    ) -> Self {
        let content = Arc::new(ContentStore::new(kv.clone(), Arc::new(NotificationBus::new())));
        content.hydrate();
        let assets = Arc::new(AssetStore::new(kv.clone()));
        let publisher = AssetPublisher::new(assets.clone(), upload).with_timeout(upload_timeout);
        let log = Arc::new(ActionLog::new(kv.clone()));
        let auth = AuthGate::new(kv, log.clone(), credentials);
        Self {
            content,
            assets,
            publisher,
            log,
            auth,
        }
    }

    /// Record an admin action. A log that cannot be written never fails the request.
    fn audit(&self, action: LogAction, details: Value) {
        if let Err(e) = self.log.log(action, details) {
            tracing::warn!(action = %action, error = %e, "could not record admin action");
        }
    }

    /// The active session for the request's bearer token. Anything else is
    /// answered with code 401 and recorded as an unauthorized access.
    fn require_session(&self, headers: &HeaderMap, route: &str) -> Result<Session, Reply> {
        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim);
        let session = match token {
            Some(token) => self
                .auth
                .verify(token)
                .map_err(|e| fail(500, e.to_string()))?,
            None => None,
        };
        session.ok_or_else(|| {
            tracing::info!(route, "unauthorized admin request");
            self.audit(LogAction::UnauthorizedAccess, json!({ "route": route }));
            fail(401, "Authentication required")
        })
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/content", get(handle_get_content))
        .route("/api/content/reset", post(handle_reset_content))
        .route("/api/content/export", get(handle_export_content))
        .route("/api/content/import", post(handle_import_content))
        .route(
            "/api/content/:section",
            get(handle_get_section).put(handle_update_section),
        )
        .route("/api/content/:section/records", post(handle_create_record))
        .route(
            "/api/content/:section/records/:id",
            put(handle_update_record).delete(handle_delete_record),
        )
        .route("/api/assets", get(handle_list_assets).post(handle_upload_asset))
        .route("/api/assets/stats", get(handle_asset_stats))
        .route("/api/assets/cleanup", post(handle_cleanup_assets))
        .route("/api/assets/export", get(handle_export_assets))
        .route("/api/assets/import", post(handle_import_assets))
        .route(
            "/api/assets/files/*filename",
            get(handle_get_asset).delete(handle_delete_asset),
        )
        .route("/api/logs", get(handle_list_logs).delete(handle_clear_logs))
        .route("/api/logs/stats", get(handle_log_stats))
        .route("/api/logs/export", get(handle_export_logs))
        .route("/api/auth/login", post(handle_login))
        .route("/api/auth/logout", post(handle_logout))
        .route("/api/auth/session", get(handle_session))
        .route("/health", get(handle_health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn section_key(raw: &str) -> Result<SectionKey, Reply> {
    raw.parse::<SectionKey>()
        .map_err(|e| fail(404, e.to_string()))
}

// Content

async fn handle_get_content(State(state): State<Arc<AppState>>) -> Reply {
    ok(state.content.snapshot())
}

async fn handle_get_section(
    State(state): State<Arc<AppState>>,
    Path(section): Path<String>,
) -> Reply {
    match section_key(&section) {
        Ok(key) => ok(state.content.get(key)),
        Err(reply) => reply,
    }
}

async fn handle_update_section(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(section): Path<String>,
    Json(update): Json<SectionUpdate>,
) -> Reply {
    if let Err(reply) = state.require_session(&headers, "PUT /api/content/:section") {
        return reply;
    }
    let key = match section_key(&section) {
        Ok(key) => key,
        Err(reply) => return reply,
    };
    match state.content.update(key, update) {
        Ok(()) => {
            state.audit(LogAction::Update, json!({ "section": key }));
            ok(state.content.get(key))
        }
        Err(e) => content_error(e),
    }
}

async fn handle_create_record(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(section): Path<String>,
    Json(record): Json<Value>,
) -> Reply {
    if let Err(reply) = state.require_session(&headers, "POST /api/content/:section/records") {
        return reply;
    }
    let key = match section_key(&section) {
        Ok(key) => key,
        Err(reply) => return reply,
    };
    match state.content.insert_record(key, record) {
        Ok(stored) => {
            state.audit(
                LogAction::Create,
                json!({ "section": key, "id": stored.get("id") }),
            );
            ok(stored)
        }
        Err(e) => content_error(e),
    }
}

async fn handle_update_record(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((section, id)): Path<(String, i64)>,
    Json(patch): Json<Map<String, Value>>,
) -> Reply {
    if let Err(reply) = state.require_session(&headers, "PUT /api/content/:section/records/:id") {
        return reply;
    }
    let key = match section_key(&section) {
        Ok(key) => key,
        Err(reply) => return reply,
    };
    match state.content.update_record(key, id, patch) {
        Ok(updated) => {
            state.audit(LogAction::Update, json!({ "section": key, "id": id }));
            ok(updated)
        }
        Err(e) => content_error(e),
    }
}

async fn handle_delete_record(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((section, id)): Path<(String, i64)>,
) -> Reply {
    if let Err(reply) = state.require_session(&headers, "DELETE /api/content/:section/records/:id")
    {
        return reply;
    }
    let key = match section_key(&section) {
        Ok(key) => key,
        Err(reply) => return reply,
    };
    match state.content.delete_record(key, id) {
        Ok(true) => {
            state.audit(LogAction::Delete, json!({ "section": key, "id": id }));
            ok(json!({ "deleted": id }))
        }
        Ok(false) => fail(404, format!("no record {} in {}", id, key)),
        Err(e) => content_error(e),
    }
}

async fn handle_reset_content(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Reply {
    if let Err(reply) = state.require_session(&headers, "POST /api/content/reset") {
        return reply;
    }
    match state.content.reset() {
        Ok(()) => {
            state.audit(LogAction::Reset, json!({ "target": "content" }));
            ok(state.content.snapshot())
        }
        Err(e) => content_error(e),
    }
}

async fn handle_export_content(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Reply {
    if let Err(reply) = state.require_session(&headers, "GET /api/content/export") {
        return reply;
    }
    let doc = state.content.export_content();
    state.audit(LogAction::Export, json!({ "target": "content" }));
    ok(doc)
}

async fn handle_import_content(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(doc): Json<Value>,
) -> Reply {
    if let Err(reply) = state.require_session(&headers, "POST /api/content/import") {
        return reply;
    }
    match state.content.import_content(&doc) {
        Ok(()) => {
            state.audit(LogAction::Import, json!({ "target": "content" }));
            ok(state.content.snapshot())
        }
        Err(e) => content_error(e),
    }
}

// Assets

#[derive(Debug, Deserialize)]
pub struct AssetListQuery {
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadAssetRequest {
    /// `data:<mime>;base64,<payload>`.
    pub data: String,
    pub original_name: String,
    #[serde(default = "default_category")]
    pub category: AssetCategory,
}

fn default_category() -> AssetCategory {
    AssetCategory::General
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupRequest {
    #[serde(default = "default_max_age_days")]
    pub max_age_days: u32,
}

fn default_max_age_days() -> u32 {
    30
}

async fn handle_list_assets(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(q): Query<AssetListQuery>,
) -> Reply {
    if let Err(reply) = state.require_session(&headers, "GET /api/assets") {
        return reply;
    }
    match q.category.as_deref().map(str::parse::<AssetCategory>) {
        None => ok(state.assets.get_all_assets()),
        Some(Ok(category)) => ok(state.assets.get_assets_by_category(category)),
        Some(Err(e)) => fail(400, e),
    }
}

async fn handle_asset_stats(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Reply {
    if let Err(reply) = state.require_session(&headers, "GET /api/assets/stats") {
        return reply;
    }
    ok(state.assets.get_storage_stats())
}

async fn handle_upload_asset(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<UploadAssetRequest>,
) -> Reply {
    if let Err(reply) = state.require_session(&headers, "POST /api/assets") {
        return reply;
    }
    let Some((mime_type, bytes)) = decode_data_url(&req.data) else {
        return fail(400, "data must be a base64 data: URL");
    };
    match state
        .publisher
        .publish(&bytes, &mime_type, &req.original_name, req.category)
        .await
    {
        Ok(stored) => {
            state.audit(
                LogAction::Create,
                json!({ "target": "asset", "reference": stored.reference(), "remote": stored.is_remote() }),
            );
            let asset = match &stored {
                StoredAsset::Inline(record) => Some(record.clone()),
                StoredAsset::Remote { .. } => None,
            };
            ok(json!({
                "reference": stored.reference(),
                "remote": stored.is_remote(),
                "asset": asset,
            }))
        }
        Err(e) => asset_error(e),
    }
}

async fn handle_get_asset(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(filename): Path<String>,
) -> Reply {
    if let Err(reply) = state.require_session(&headers, "GET /api/assets/files/*filename") {
        return reply;
    }
    match state.assets.get_asset(&filename) {
        Some(record) => ok(record),
        None => fail(404, format!("no asset {}", filename)),
    }
}

async fn handle_delete_asset(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(filename): Path<String>,
) -> Reply {
    if let Err(reply) = state.require_session(&headers, "DELETE /api/assets/files/*filename") {
        return reply;
    }
    match state.publisher.remove(&filename).await {
        Ok(()) => {
            state.audit(
                LogAction::Delete,
                json!({ "target": "asset", "reference": filename }),
            );
            ok(json!({ "deleted": filename }))
        }
        Err(e) => asset_error(e),
    }
}

async fn handle_cleanup_assets(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CleanupRequest>,
) -> Reply {
    if let Err(reply) = state.require_session(&headers, "POST /api/assets/cleanup") {
        return reply;
    }
    match state.assets.cleanup_old_assets(req.max_age_days) {
        Ok(removed) => {
            state.audit(
                LogAction::Delete,
                json!({ "target": "assets", "removed": removed, "maxAgeDays": req.max_age_days }),
            );
            ok(json!({ "removed": removed }))
        }
        Err(e) => asset_error(e),
    }
}

async fn handle_export_assets(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Reply {
    if let Err(reply) = state.require_session(&headers, "GET /api/assets/export") {
        return reply;
    }
    let doc = state.assets.export_assets();
    state.audit(LogAction::Export, json!({ "target": "assets" }));
    ok(doc)
}

async fn handle_import_assets(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(doc): Json<Value>,
) -> Reply {
    if let Err(reply) = state.require_session(&headers, "POST /api/assets/import") {
        return reply;
    }
    match state.assets.import_assets(&doc) {
        Ok(count) => {
            state.audit(
                LogAction::Import,
                json!({ "target": "assets", "count": count }),
            );
            ok(json!({ "imported": count }))
        }
        Err(e) => asset_error(e),
    }
}

// Action log

#[derive(Debug, Deserialize)]
pub struct LogListQuery {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
}

async fn handle_list_logs(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(q): Query<LogListQuery>,
) -> Reply {
    if let Err(reply) = state.require_session(&headers, "GET /api/logs") {
        return reply;
    }
    let action = match q.action.as_deref().map(str::parse::<LogAction>) {
        None => None,
        Some(Ok(action)) => Some(action),
        Some(Err(e)) => return fail(400, e),
    };
    let query = LogQuery {
        action,
        from: q.from,
        to: q.to,
        limit: q.limit,
        offset: q.offset,
    };
    ok(state.log.query(&query))
}

async fn handle_log_stats(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Reply {
    if let Err(reply) = state.require_session(&headers, "GET /api/logs/stats") {
        return reply;
    }
    ok(state.log.get_stats())
}

async fn handle_export_logs(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Reply {
    if let Err(reply) = state.require_session(&headers, "GET /api/logs/export") {
        return reply;
    }
    match state.log.export_logs() {
        Ok(content) => ok(json!({
            "filename": state.log.export_file_name(),
            "content": content,
        })),
        Err(e) => fail(500, e.to_string()),
    }
}

async fn handle_clear_logs(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Reply {
    if let Err(reply) = state.require_session(&headers, "DELETE /api/logs") {
        return reply;
    }
    match state.log.clear_logs() {
        Ok(()) => ok(json!({ "cleared": true })),
        Err(e) => fail(500, e.to_string()),
    }
}

// Auth

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

async fn handle_login(State(state): State<Arc<AppState>>, Json(req): Json<LoginRequest>) -> Reply {
    match state.auth.login(&req.username, &req.password) {
        Ok(session) => ok(session),
        Err(AuthError::InvalidCredentials { remaining_attempts }) => fail_with(
            401,
            "Invalid credentials",
            json!({ "remainingAttempts": remaining_attempts }),
        ),
        Err(AuthError::LockedOut { until }) => fail_with(
            423,
            "Too many failed attempts",
            json!({ "lockUntil": until }),
        ),
        Err(e) => fail(500, e.to_string()),
    }
}

async fn handle_logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Reply {
    if let Err(reply) = state.require_session(&headers, "POST /api/auth/logout") {
        return reply;
    }
    match state.auth.logout() {
        Ok(()) => ok(json!({ "loggedOut": true })),
        Err(e) => fail(500, e.to_string()),
    }
}

async fn handle_session(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Reply {
    match state.require_session(&headers, "GET /api/auth/session") {
        Ok(session) => {
            state.audit(
                LogAction::AdminAccess,
                json!({ "username": session.username }),
            );
            ok(session)
        }
        Err(reply) => reply,
    }
}

async fn handle_health() -> &'static str {
    "ok"
}
