// Zoolab - Web Server
// JSON API over the unlock engine with Axum

use axum::{
    extract::{Path, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use clap::Parser;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{error, info, warn};
use zoolab::config::{init_tracing, load_rule_book, ServerArgs};
use zoolab::{
    apply_captures, db, reset_progress, set_defeated, setup_database, CaptureOutcome,
    CaptureUpdate, ChampionKind, Collectible, DefeatOutcome, RuleBook, UnlockError, Unlockable,
    ZoneListing, ZoneProgress, ZoneStatus,
};

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
    rules: Arc<RuleBook>,
}

impl AppState {
    fn conn(&self) -> Result<MutexGuard<'_, Connection>, ApiError> {
        self.db
            .lock()
            .map_err(|_| ApiError::Internal("database lock poisoned".to_string()))
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

enum ApiError {
    NotFound(String),
    Forbidden(String),
    Internal(String),
}

impl From<UnlockError> for ApiError {
    fn from(e: UnlockError) -> Self {
        match e {
            UnlockError::NotFound { .. } => ApiError::NotFound(e.to_string()),
            UnlockError::CaptureOutOfRange { .. } => ApiError::Forbidden(e.to_string()),
            other => {
                error!("Request failed: {}", other);
                ApiError::Internal("Error while updating the store".to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Forbidden(message) => (StatusCode::FORBIDDEN, message),
            ApiError::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };

        let body = ApiResponse {
            success: false,
            data: serde_json::Value::Null,
            error: Some(message),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

fn parse_kind(kind: &str) -> Result<ChampionKind, ApiError> {
    kind.parse().map_err(ApiError::NotFound)
}

// ============================================================================
// Request / Response bodies
// ============================================================================

#[derive(Deserialize)]
struct CapturesUpdateRequest {
    updates: Vec<CaptureUpdate>,
}

/// Zone progress row (zone + status string)
#[derive(Serialize)]
struct ZoneResponse {
    id: i64,
    name: String,
    image_url: Option<String>,
    captured: i64,
    total: i64,
    status: ZoneStatus,
}

impl From<ZoneProgress> for ZoneResponse {
    fn from(progress: ZoneProgress) -> Self {
        let status = progress.status();
        Self {
            id: progress.zone.id,
            name: progress.zone.name,
            image_url: progress.zone.image_url,
            captured: progress.captured,
            total: progress.total,
            status,
        }
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/zones - Capture progress per zone
async fn get_zones(State(state): State<AppState>) -> ApiResult<Vec<ZoneResponse>> {
    let conn = state.conn()?;
    let zones = db::get_zone_progress(&conn)?
        .into_iter()
        .map(ZoneResponse::from)
        .collect();

    Ok(Json(ApiResponse::ok(zones)))
}

/// GET /api/zones/:id - One zone with its capture progress
async fn get_zone(
    State(state): State<AppState>,
    Path(zone_id): Path<i64>,
) -> ApiResult<ZoneResponse> {
    let conn = state.conn()?;
    let progress = db::get_zone_progress(&conn)?
        .into_iter()
        .find(|progress| progress.zone.id == zone_id)
        .ok_or_else(|| UnlockError::not_found("zone", zone_id))?;

    Ok(Json(ApiResponse::ok(progress.into())))
}

/// GET /api/collectibles - Every collectible
async fn get_collectibles(State(state): State<AppState>) -> ApiResult<Vec<Collectible>> {
    let conn = state.conn()?;
    Ok(Json(ApiResponse::ok(db::get_all_collectibles(&conn)?)))
}

/// GET /api/collectibles/:id
async fn get_collectible(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Collectible> {
    let conn = state.conn()?;
    let collectible =
        db::get_collectible(&conn, id)?.ok_or_else(|| UnlockError::not_found("collectible", id))?;

    Ok(Json(ApiResponse::ok(collectible)))
}

/// GET /api/zones/:id/collectibles - Natives plus collectibles also found there
async fn get_zone_collectibles(
    State(state): State<AppState>,
    Path(zone_id): Path<i64>,
) -> ApiResult<ZoneListing> {
    let conn = state.conn()?;
    if db::get_zone(&conn, zone_id)?.is_none() {
        return Err(UnlockError::not_found("zone", zone_id).into());
    }

    Ok(Json(ApiResponse::ok(db::get_zone_listing(&conn, zone_id)?)))
}

/// GET /api/:kind - Champions or prototypes of one kind
async fn get_unlockables(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> ApiResult<Vec<Unlockable>> {
    let kind = parse_kind(&kind)?;
    let conn = state.conn()?;

    Ok(Json(ApiResponse::ok(db::get_unlockables(&conn, kind)?)))
}

/// GET /api/:kind/created - Unlocked champions or prototypes of one kind
async fn get_created_unlockables(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> ApiResult<Vec<Unlockable>> {
    let kind = parse_kind(&kind)?;
    let conn = state.conn()?;

    Ok(Json(ApiResponse::ok(db::get_created_unlockables(&conn, kind)?)))
}

/// GET /api/:kind/:id
async fn get_unlockable(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, i64)>,
) -> ApiResult<Unlockable> {
    let kind = parse_kind(&kind)?;
    let conn = state.conn()?;
    let entity =
        db::get_unlockable(&conn, kind, id)?.ok_or_else(|| UnlockError::not_found(kind.as_str(), id))?;

    Ok(Json(ApiResponse::ok(entity)))
}

/// POST /api/collectibles/update_captures - Apply a capture batch
async fn update_captures(
    State(state): State<AppState>,
    Json(request): Json<CapturesUpdateRequest>,
) -> ApiResult<CaptureOutcome> {
    let mut conn = state.conn()?;

    let outcome = apply_captures(&mut conn, &state.rules, &request.updates).map_err(|e| {
        warn!("Capture update rejected: {}", e);
        ApiError::from(e)
    })?;

    Ok(Json(ApiResponse::ok(outcome)))
}

/// POST /api/:kind/:id/defeated
async fn mark_defeated(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, i64)>,
) -> ApiResult<DefeatOutcome> {
    toggle_defeated(&state, &kind, id, true)
}

/// POST /api/:kind/:id/undefeated
async fn mark_undefeated(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, i64)>,
) -> ApiResult<DefeatOutcome> {
    toggle_defeated(&state, &kind, id, false)
}

fn toggle_defeated(state: &AppState, kind: &str, id: i64, defeated: bool) -> ApiResult<DefeatOutcome> {
    let kind = parse_kind(kind)?;
    let mut conn = state.conn()?;

    let outcome = set_defeated(&mut conn, &state.rules, kind, id, defeated)?;
    Ok(Json(ApiResponse::ok(outcome)))
}

/// POST /api/reset - Zero captures, clear every flag
async fn reset(State(state): State<AppState>) -> ApiResult<&'static str> {
    let mut conn = state.conn()?;
    reset_progress(&mut conn)?;

    Ok(Json(ApiResponse::ok("Progress reset")))
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = ServerArgs::parse();
    init_tracing(&args.log_level);

    info!("🌐 Zoolab - Web Server");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let conn = Connection::open(&args.database)?;
    setup_database(&conn)?;
    info!("✓ Database opened: {}", args.database.display());

    let rules = load_rule_book(args.rules.as_ref())?;
    info!("✓ {} prototype rules, capstone '{}'", rules.rule_count(), rules.capstone);

    // Create shared state
    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
        rules: Arc::new(rules),
    };

    let origins = args
        .cors_origins
        .iter()
        .map(|origin| origin.parse::<HeaderValue>())
        .collect::<Result<Vec<_>, _>>()?;
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any);

    // Build API routes
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/zones", get(get_zones))
        .route("/zones/:id", get(get_zone))
        .route("/zones/:id/collectibles", get(get_zone_collectibles))
        .route("/collectibles", get(get_collectibles))
        .route("/collectibles/:id", get(get_collectible))
        .route("/collectibles/update_captures", post(update_captures))
        .route("/reset", post(reset))
        .route("/:kind", get(get_unlockables))
        .route("/:kind/created", get(get_created_unlockables))
        .route("/:kind/:id", get(get_unlockable))
        .route("/:kind/:id/defeated", post(mark_defeated))
        .route("/:kind/:id/undefeated", post(mark_undefeated))
        .with_state(state);

    let app = Router::new().nest("/api", api_routes).layer(cors);

    let listener = tokio::net::TcpListener::bind(args.listen).await?;

    info!("🚀 Server running on http://{}", args.listen);
    info!("   API: http://{}/api/collectibles", args.listen);

    axum::serve(listener, app).await?;

    Ok(())
}
