// =============================================================================
// HANDLERS MODULE
// =============================================================================
// HTTP request handlers (controller layer). Handlers resolve the acting user,
// call into the inventory layer and wrap the result in JSON.
//
// NOTES:
// - CurrentUser is an extractor: it reads `X-User-Id` and loads the
//   principal with its group's permission table
// - Request counts and latencies are recorded by the track_metrics
//   middleware, keyed by the matched route
// - Every mutation is logged with structured fields
// =============================================================================

use axum::{
    async_trait,
    extract::{FromRequestParts, MatchedPath, Path, Query, Request, State},
    http::{request::Parts, StatusCode},
    middleware::Next,
    response::Response,
    Json,
};
use std::sync::Arc;
use std::time::Instant;

use crate::entity::part::{NewPart, PartChanges, PartRecord};
use crate::entity::structural::{NewNode, NodeChanges, NodeKind, SubtreeEntry, TreeNode};
use crate::entity::user::Principal;
use crate::error::{AppError, AppResult};
use crate::inventory;
use crate::metrics;
use crate::models::*;
use crate::search::{parse_search_modifiers, SearchFields};
use crate::util::proposed_filenames;
use crate::AppState;

/// Header naming the acting user
pub const USER_HEADER: &str = "x-user-id";

// =============================================================================
// CURRENT USER EXTRACTOR
// =============================================================================

/// The principal a request acts for. Requests without `X-User-Id` act as
/// the configured anonymous user.
pub struct CurrentUser(pub Principal);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user_id = match parts.headers.get(USER_HEADER) {
            Some(value) => value
                .to_str()
                .ok()
                .and_then(|v| v.trim().parse::<i64>().ok())
                .ok_or_else(|| AppError::invalid("X-User-Id must be a numeric user id"))?,
            None => state.config.anonymous_user_id,
        };

        let principal = Principal::load(state.store.as_ref(), user_id).await?;
        Ok(CurrentUser(principal))
    }
}

fn parse_kind(kind: &str) -> AppResult<NodeKind> {
    NodeKind::parse(kind)
        .ok_or_else(|| AppError::invalid(format!("unknown structural element kind: {kind}")))
}

// =============================================================================
// METRICS MIDDLEWARE
// =============================================================================

/// Records count and latency of every routed request.
pub async fn track_metrics(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let method = request.method().to_string();

    let response = next.run(request).await;

    metrics::record_http_request(
        &method,
        &endpoint,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );
    response
}

// =============================================================================
// HEALTH CHECK ENDPOINTS
// =============================================================================

/// Liveness probe
///
/// GET /health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "partdb-service".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness probe: is the store reachable?
///
/// GET /ready
pub async fn readiness_check(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ReadinessResponse>, StatusCode> {
    let db_healthy = state.store.health_check().await;

    if !db_healthy {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }
    Ok(Json(ReadinessResponse {
        status: "ready".to_string(),
        checks: ReadinessChecks {
            database: db_healthy,
        },
    }))
}

// =============================================================================
// METRICS ENDPOINT
// =============================================================================
/// Prometheus metrics in text exposition format
///
/// GET /metrics
///
/// # Example Response
/// ```text
/// # TYPE partdb_stock_adjustments_total counter
/// partdb_stock_adjustments_total{kind="decrease",status="success"} 7
/// ```
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> String {
    state.metrics_handle.render()
}

// =============================================================================
// PART ENDPOINTS
// =============================================================================

// -----------------------------------------------------------------------------
// PART DETAIL
// -----------------------------------------------------------------------------
/// Detail view of one part: attributes, structural references, order
/// details, attachments, devices and what the caller may do.
///
/// GET /api/v1/parts/:id
///
/// # Response
/// - 200 OK: PartDetailView JSON
/// - 404 Not Found: part doesn't exist
pub async fn get_part(
    State(state): State<Arc<AppState>>,
    CurrentUser(principal): CurrentUser,
    Path(part_id): Path<i64>,
) -> AppResult<Json<PartDetailView>> {
    let view =
        inventory::part_detail(state.store.as_ref(), &state.config, &principal, part_id).await?;
    Ok(Json(view))
}

/// Detail view of the part a printed label points to
///
/// GET /api/v1/barcodes/:code
pub async fn get_part_by_barcode(
    State(state): State<Arc<AppState>>,
    CurrentUser(principal): CurrentUser,
    Path(code): Path<String>,
) -> AppResult<Json<PartDetailView>> {
    let view =
        inventory::part_by_barcode(state.store.as_ref(), &state.config, &principal, &code).await?;
    Ok(Json(view))
}

// -----------------------------------------------------------------------------
// CREATE / UPDATE / DELETE
// -----------------------------------------------------------------------------
/// Create a part
///
/// POST /api/v1/parts
///
/// # Request Body
/// ```json
/// {
///   "name": "NE555",
///   "category_id": 5,
///   "instock": 10,
///   "mininstock": 2
/// }
/// ```
pub async fn create_part(
    State(state): State<Arc<AppState>>,
    CurrentUser(principal): CurrentUser,
    Json(request): Json<NewPart>,
) -> AppResult<(StatusCode, Json<PartRecord>)> {
    let part = inventory::create_part(state.store.as_ref(), &principal, request).await?;

    tracing::info!(
        part_id = part.id,
        name = %part.name,
        user_id = principal.user_id(),
        "Part created"
    );
    Ok((StatusCode::CREATED, Json(part)))
}

/// Change part attributes. Absent fields stay; `null` clears a reference.
///
/// PATCH /api/v1/parts/:id
///
/// # Request Body
/// ```json
/// { "description": "Timer IC", "footprint_id": null }
/// ```
pub async fn update_part(
    State(state): State<Arc<AppState>>,
    CurrentUser(principal): CurrentUser,
    Path(part_id): Path<i64>,
    Json(changes): Json<PartChanges>,
) -> AppResult<Json<PartRecord>> {
    let part = inventory::update_part(state.store.as_ref(), &principal, part_id, changes).await?;

    tracing::info!(part_id, user_id = principal.user_id(), "Part updated");
    Ok(Json(part))
}

/// DELETE /api/v1/parts/:id
pub async fn delete_part(
    State(state): State<Arc<AppState>>,
    CurrentUser(principal): CurrentUser,
    Path(part_id): Path<i64>,
) -> AppResult<StatusCode> {
    inventory::delete_part(state.store.as_ref(), &principal, part_id).await?;

    tracing::info!(part_id, user_id = principal.user_id(), "Part deleted");
    Ok(StatusCode::NO_CONTENT)
}

// -----------------------------------------------------------------------------
// STOCK
// -----------------------------------------------------------------------------
/// Add to or take from the stock
///
/// POST /api/v1/parts/:id/stock
///
/// # Response
/// - 200 OK: updated part
/// - 422 Unprocessable Entity: not enough stock, or the stock is unknown
pub async fn adjust_stock(
    State(state): State<Arc<AppState>>,
    CurrentUser(principal): CurrentUser,
    Path(part_id): Path<i64>,
    Json(request): Json<AdjustStockRequest>,
) -> AppResult<Json<PartRecord>> {
    tracing::info!(
        part_id,
        delta = request.delta,
        user_id = principal.user_id(),
        "Adjusting stock"
    );

    match inventory::adjust_stock(state.store.as_ref(), &principal, part_id, request.delta).await
    {
        Ok(part) => {
            tracing::info!(part_id, instock = %part.instock, "Stock adjusted");
            Ok(Json(part))
        }
        Err(e) => {
            tracing::warn!(part_id, error = %e, "Failed to adjust stock");
            Err(e)
        }
    }
}

/// Set the stock to a counted value, or to unknown with `null`
///
/// PUT /api/v1/parts/:id/stock
///
/// ```json
/// { "instock": 25 }
/// ```
pub async fn set_stock(
    State(state): State<Arc<AppState>>,
    CurrentUser(principal): CurrentUser,
    Path(part_id): Path<i64>,
    Json(request): Json<SetStockRequest>,
) -> AppResult<Json<PartRecord>> {
    let part =
        inventory::set_stock(state.store.as_ref(), &principal, part_id, request.instock).await?;

    tracing::info!(
        part_id,
        instock = %part.instock,
        user_id = principal.user_id(),
        "Stock set"
    );
    Ok(Json(part))
}

// -----------------------------------------------------------------------------
// ACTIONS
// -----------------------------------------------------------------------------
/// Run one of the part page actions
///
/// POST /api/v1/parts/:id/actions
///
/// # Request Body
/// ```json
/// { "action": "order", "quantity": 50 }
/// ```
pub async fn part_action(
    State(state): State<Arc<AppState>>,
    CurrentUser(principal): CurrentUser,
    Path(part_id): Path<i64>,
    Json(action): Json<PartAction>,
) -> AppResult<Json<PartRecord>> {
    tracing::info!(part_id, action = ?action, user_id = principal.user_id(), "Part action");

    let part =
        inventory::apply_action(state.store.as_ref(), &state.config, &principal, part_id, action)
            .await?;
    Ok(Json(part))
}

/// Expand a label template for one part
///
/// GET /api/v1/parts/:id/placeholders?template=%25NAME%25
pub async fn expand_placeholders(
    State(state): State<Arc<AppState>>,
    CurrentUser(principal): CurrentUser,
    Path(part_id): Path<i64>,
    Query(query): Query<PlaceholderQuery>,
) -> AppResult<Json<PlaceholderResponse>> {
    let result = inventory::expand_for_part(
        state.store.as_ref(),
        &state.config,
        &principal,
        part_id,
        &query.template,
    )
    .await?;

    Ok(Json(PlaceholderResponse {
        template: query.template,
        result,
    }))
}

// =============================================================================
// SEARCH, STATISTICS, ATTACHMENTS
// =============================================================================

/// Split a search query into per-field keywords
///
/// GET /api/v1/search/modifiers?q=inname:NE555
pub async fn search_modifiers(Query(query): Query<SearchQuery>) -> Json<SearchFields> {
    Json(parse_search_modifiers(&query.q))
}

/// GET /api/v1/statistics
pub async fn statistics(
    State(state): State<Arc<AppState>>,
    CurrentUser(principal): CurrentUser,
) -> AppResult<Json<StatisticsResponse>> {
    let stats = inventory::statistics(state.store.as_ref(), &principal).await?;
    Ok(Json(stats))
}

/// Candidate replacements for an attachment whose file went missing
///
/// POST /api/v1/attachments/proposed-filenames
///
/// ```json
/// { "missing": "data/media/ne555.pdf", "available": ["media/ne555.pdf"] }
/// ```
pub async fn proposed_attachment_filenames(
    Json(request): Json<ProposedFilenamesRequest>,
) -> Json<Vec<String>> {
    Json(proposed_filenames(&request.missing, &request.available))
}

// =============================================================================
// STRUCTURAL ELEMENT ENDPOINTS
// =============================================================================
// `:kind` is the table name: categories, footprints, storelocations,
// manufacturers, suppliers, devices or attachement_types.

/// Navigation tree of one kind
///
/// GET /api/v1/tree/:kind
pub async fn get_tree(
    State(state): State<Arc<AppState>>,
    CurrentUser(principal): CurrentUser,
    Path(kind): Path<String>,
) -> AppResult<Json<Vec<TreeNode>>> {
    let kind = parse_kind(&kind)?;
    let tree = inventory::tree(state.store.as_ref(), &principal, kind).await?;
    Ok(Json(tree))
}

/// POST /api/v1/tree/:kind
pub async fn create_node(
    State(state): State<Arc<AppState>>,
    CurrentUser(principal): CurrentUser,
    Path(kind): Path<String>,
    Json(request): Json<NewNode>,
) -> AppResult<(StatusCode, Json<NodeView>)> {
    let kind = parse_kind(&kind)?;
    let node =
        inventory::create_node(state.store.as_ref(), &state.config, &principal, kind, request)
            .await?;

    tracing::info!(
        kind = kind.table(),
        node_id = node.record.id,
        full_path = %node.full_path,
        user_id = principal.user_id(),
        "Structural element created"
    );
    Ok((StatusCode::CREATED, Json(node)))
}

/// GET /api/v1/tree/:kind/:id
pub async fn get_node(
    State(state): State<Arc<AppState>>,
    CurrentUser(principal): CurrentUser,
    Path((kind, id)): Path<(String, i64)>,
) -> AppResult<Json<NodeView>> {
    let kind = parse_kind(&kind)?;
    let node = inventory::node_view(state.store.as_ref(), &state.config, &principal, kind, id)
        .await?;
    Ok(Json(node))
}

/// Rename, move or re-attribute an element
///
/// PATCH /api/v1/tree/:kind/:id
///
/// ```json
/// { "parent_id": 2, "name": "SMD Resistors" }
/// ```
pub async fn update_node(
    State(state): State<Arc<AppState>>,
    CurrentUser(principal): CurrentUser,
    Path((kind, id)): Path<(String, i64)>,
    Json(changes): Json<NodeChanges>,
) -> AppResult<Json<NodeView>> {
    let kind = parse_kind(&kind)?;
    let node = inventory::update_node(
        state.store.as_ref(),
        &state.config,
        &principal,
        kind,
        id,
        changes,
    )
    .await?;

    tracing::info!(
        kind = kind.table(),
        node_id = id,
        full_path = %node.full_path,
        user_id = principal.user_id(),
        "Structural element updated"
    );
    Ok(Json(node))
}

/// Delete an element; refused while children or dependents reference it
///
/// DELETE /api/v1/tree/:kind/:id
pub async fn delete_node(
    State(state): State<Arc<AppState>>,
    CurrentUser(principal): CurrentUser,
    Path((kind, id)): Path<(String, i64)>,
) -> AppResult<StatusCode> {
    let kind = parse_kind(&kind)?;
    inventory::delete_node(state.store.as_ref(), &principal, kind, id).await?;

    tracing::info!(
        kind = kind.table(),
        node_id = id,
        user_id = principal.user_id(),
        "Structural element deleted"
    );
    Ok(StatusCode::NO_CONTENT)
}

/// Depth-first listing below an element
///
/// GET /api/v1/tree/:kind/:id/subtree?include_self=true
pub async fn get_subtree(
    State(state): State<Arc<AppState>>,
    CurrentUser(principal): CurrentUser,
    Path((kind, id)): Path<(String, i64)>,
    Query(query): Query<SubtreeQuery>,
) -> AppResult<Json<Vec<SubtreeEntry>>> {
    let kind = parse_kind(&kind)?;
    let entries =
        inventory::subtree(state.store.as_ref(), &principal, kind, id, query.include_self).await?;
    Ok(Json(entries))
}
