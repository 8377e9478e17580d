//! HTTP handlers for the REST API.
//!
//! Every hardware collection is served by the same generic handlers,
//! instantiated once per [`Resource`].

use axum::{
    body::Bytes,
    extract::{OriginalUri, Path, Query, State},
    http::StatusCode,
    Json,
};

use super::dto::{HealthResponse, ListQuery};
use super::error::AppError;
use super::state::AppState;
use crate::api::{decode_fields, merge_patch, parse_body, Catalog, Page, Resource, Window};
use crate::db::repository::HealthRepository;
use crate::models::Entity;

/// Result type for handlers.
pub type HandlerResult<T> = Result<Json<T>, AppError>;

// =============================================================================
// Health Check
// =============================================================================

/// GET /health
///
/// Health check endpoint to verify the service is running and database is accessible.
pub async fn health_check(State(state): State<AppState>) -> HandlerResult<HealthResponse> {
    let (status, database) = match HealthRepository::health_check(state.repository.as_ref()).await
    {
        Ok(true) => ("ok", "connected".to_string()),
        Ok(false) => ("degraded", "disconnected".to_string()),
        Err(e) => ("degraded", format!("error: {}", e)),
    };

    Ok(Json(HealthResponse {
        status: status.to_string(),
        version: "v1".to_string(),
        database,
    }))
}

/// Fallback for unknown paths.
pub async fn not_found(OriginalUri(uri): OriginalUri) -> AppError {
    AppError::NotFound(format!("No route for {}", uri.path()))
}

// =============================================================================
// Collections
// =============================================================================

async fn catalog_for<R: Resource>(state: &AppState) -> Result<Catalog, AppError> {
    if R::NESTED {
        Ok(Catalog::load(state.repository.as_ref()).await?)
    } else {
        Ok(Catalog::default())
    }
}

/// Unparseable ids cannot name a row.
fn parse_id<R: Resource>(raw: &str) -> Result<R::Id, AppError> {
    raw.parse()
        .map_err(|_| AppError::NotFound(format!("No {} matches the given query.", R::entity_name())))
}

/// GET /v1/{collection}/
pub async fn list<R: Resource>(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<ListQuery>,
) -> HandlerResult<Page<R::View>> {
    let rows = R::store(state.repository.as_ref()).list().await?;
    let matching: Vec<R> = rows
        .into_iter()
        .filter(|row| R::matches(row, query.params()))
        .collect();

    let server = &state.config.server;
    let window = Window::from_query(
        query.get("limit"),
        query.get("offset"),
        server.page_size,
        server.max_page_size,
    );
    let page = window.paginate(matching, uri.path(), query.params());

    let catalog = catalog_for::<R>(&state).await?;
    Ok(Json(page.map(|row| R::render(&catalog, &row))))
}

/// GET /v1/{collection}/{id}/
pub async fn retrieve<R: Resource>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> HandlerResult<R::View> {
    let id = parse_id::<R>(&id)?;
    let row = R::store(state.repository.as_ref()).get(&id).await?;
    let catalog = catalog_for::<R>(&state).await?;
    Ok(Json(R::render(&catalog, &row)))
}

/// POST /v1/{collection}/
pub async fn create<R: Resource>(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<R::View>), AppError> {
    let fields = decode_fields::<R::Fields>(parse_body(&body)?)?;
    let row = R::store(state.repository.as_ref()).create(fields).await?;
    tracing::info!(entity = R::entity_name(), id = %row.id(), "created");

    let catalog = catalog_for::<R>(&state).await?;
    Ok((StatusCode::CREATED, Json(R::render(&catalog, &row))))
}

/// PUT /v1/{collection}/{id}/
///
/// Omitted optional fields take their defaults.
pub async fn update<R: Resource>(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> HandlerResult<R::View> {
    let id = parse_id::<R>(&id)?;
    let store = R::store(state.repository.as_ref());
    // 404 takes precedence over payload errors.
    store.get(&id).await?;

    let fields = decode_fields::<R::Fields>(parse_body(&body)?)?;
    let row = store.update(&id, fields).await?;
    tracing::info!(entity = R::entity_name(), id = %row.id(), "updated");

    let catalog = catalog_for::<R>(&state).await?;
    Ok(Json(R::render(&catalog, &row)))
}

/// PATCH /v1/{collection}/{id}/
pub async fn partial_update<R: Resource>(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> HandlerResult<R::View> {
    let id = parse_id::<R>(&id)?;
    let store = R::store(state.repository.as_ref());
    let current = store.get(&id).await?;

    let fields = merge_patch(current.fields(), parse_body(&body)?)?;
    let row = store.update(&id, fields).await?;
    tracing::info!(entity = R::entity_name(), id = %row.id(), "patched");

    let catalog = catalog_for::<R>(&state).await?;
    Ok(Json(R::render(&catalog, &row)))
}

/// DELETE /v1/{collection}/{id}/
pub async fn destroy<R: Resource>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_id::<R>(&id)?;
    R::store(state.repository.as_ref()).delete(&id).await?;
    tracing::info!(entity = R::entity_name(), id = %id, "deleted");
    Ok(StatusCode::NO_CONTENT)
}
