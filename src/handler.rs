//! HTTP request handlers for the link dashboard API
//!
//! Handlers stay thin: they resolve the caller, call into [`crate::store`] for
//! persistence and [`crate::query`] for listing and aggregation, and map the
//! outcome to a response. Failures are [`AppError`]s, which render themselves.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect},
    Json,
};
use chrono::Utc;
use serde_json::json;

use crate::database::AppState;
use crate::error::AppError;
use crate::model::{
    require_owner, ClickDetail, CreateLinkRequest, LinkRecord, LinkResponse, LinkStats,
    ListParams, ListResponse, OwnerParams, Summary, UpdateLinkRequest, UNKNOWN_COUNTRY,
};
use crate::query::{link_stats, run_query, summarize, QueryRequest};
use crate::store;

fn link_response(state: &AppState, link: LinkRecord) -> LinkResponse {
    LinkResponse {
        short_url: state.config.short_url(&link.short_code),
        link,
    }
}

/// Country header set by the edge proxy in front of the service
const COUNTRY_HEADER: &str = "cf-ipcountry";

fn header_text(headers: &HeaderMap, name: impl header::AsHeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn click_from_headers(headers: &HeaderMap) -> ClickDetail {
    ClickDetail {
        referer: header_text(headers, header::REFERER),
        user_agent: header_text(headers, header::USER_AGENT),
        country: header_text(headers, COUNTRY_HEADER).unwrap_or_else(|| UNKNOWN_COUNTRY.to_string()),
        ..ClickDetail::at(Utc::now())
    }
}

/// Redirects a short code to its original URL and counts the click
///
/// # Response
///
/// - **307 Temporary Redirect** - to the original URL
/// - **404 Not Found** - unknown, expired or deactivated code
///
/// 307 rather than 301 so browsers come back through here and every visit is counted.
pub async fn redirect_url(
    Path(code): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Redirect, AppError> {
    let record = store::record_click(&state.db, &code, click_from_headers(&headers))?;
    Ok(Redirect::temporary(&record.original_url))
}

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Creates a new short link
///
/// # Request Body
///
/// ```json
/// {
///   "url": "https://example.com/very/long/url",
///   "ownerId": "user_123",
///   "customCode": "my-link"
/// }
/// ```
///
/// # Response
///
/// - **201 Created** - the stored link plus its `shortUrl`
/// - **400 Bad Request** - invalid URL, code or owner
/// - **409 Conflict** - custom code already exists
pub async fn create_link(
    State(state): State<AppState>,
    payload: Result<Json<CreateLinkRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    let record = store::create_link(&state.db, payload, Utc::now())?;
    Ok((StatusCode::CREATED, Json(link_response(&state, record))))
}

/// Lists an owner's links, filtered, sorted and paginated
///
/// # Query Parameters
///
/// - `ownerId` (required)
/// - `page` - 1-based, default 1
/// - `pageSize` or `limit` - default and cap come from [`crate::config::Config`]
/// - `search` - case-insensitive substring of the short code or URL
/// - `tag` - only links carrying this tag
/// - `sortBy` - `clicks` (default), `createdAt` or `shortCode`
/// - `order` - `desc` (default) or `asc`
/// - `includeInactive` - `true` to also list deactivated links
///
/// Malformed paging or sorting values fall back to defaults, and a repeated
/// key keeps its first value. Neither fails the request.
///
/// # Example Request
///
/// `GET /api/urls?ownerId=user_123&page=2&pageSize=20&sortBy=createdAt&order=asc`
pub async fn list_links(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<ListResponse>, AppError> {
    let params = ListParams::from_pairs(pairs);
    let owner_id = require_owner(params.owner_id.as_deref())?;
    let request = QueryRequest::from_params(&params, &state.config.limits);

    let snapshot = store::owner_snapshot(&state.db, owner_id, Utc::now())?;
    let response = run_query(&snapshot.records, &request);

    tracing::debug!(
        owner_id,
        version = snapshot.version,
        page = response.pagination.page,
        total_pages = response.pagination.total_pages,
        total_items = response.pagination.total_items,
        "Returning {} links",
        response.data.len()
    );

    Ok(Json(response))
}

/// Totals over all of an owner's live links, active or not, ignoring any listing filters
pub async fn links_summary(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Summary>, AppError> {
    let params = OwnerParams::from_pairs(pairs);
    let owner_id = require_owner(params.owner_id.as_deref())?;
    let now = Utc::now();

    let snapshot = store::owner_snapshot(&state.db, owner_id, now)?;
    let summary = summarize(&snapshot.records, now)?;

    tracing::debug!(owner_id, version = snapshot.version, "Returning link summary");
    Ok(Json(summary))
}

pub async fn get_link(
    Path(code): Path<String>,
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<LinkResponse>, AppError> {
    let params = OwnerParams::from_pairs(pairs);
    let owner_id = require_owner(params.owner_id.as_deref())?;
    let record = store::get_owned_link(&state.db, &code, owner_id, Utc::now())?;
    Ok(Json(link_response(&state, record)))
}

/// Edits title, description, tags, expiry or the active flag of a link
///
/// `"expiresAt": null` removes the expiry, `"isActive": false` stops the link
/// from redirecting.
///
/// - **200 OK** - the updated link
/// - **400 Bad Request** - malformed body or invalid field
/// - **403 Forbidden** - `ownerId` does not own the link
/// - **404 Not Found** - unknown or expired code
pub async fn update_link(
    Path(code): Path<String>,
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
    payload: Result<Json<UpdateLinkRequest>, JsonRejection>,
) -> Result<Json<LinkResponse>, AppError> {
    let params = OwnerParams::from_pairs(pairs);
    let owner_id = require_owner(params.owner_id.as_deref())?;
    let Json(payload) = payload?;
    let record = store::update_link(&state.db, &code, owner_id, payload, Utc::now())?;
    Ok(Json(link_response(&state, record)))
}

/// Deletes a link with ownership verification
///
/// `DELETE /api/urls/abc123?ownerId=user_123`
pub async fn delete_link(
    Path(code): Path<String>,
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<impl IntoResponse, AppError> {
    let params = OwnerParams::from_pairs(pairs);
    let owner_id = require_owner(params.owner_id.as_deref())?;
    let record = store::delete_link(&state.db, &code, owner_id)?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "message": "Short link deleted successfully",
            "deletedCode": record.short_code
        })),
    ))
}

/// Click analytics of one link: totals, last 7 days, top countries and daily trend
///
/// `GET /api/urls/abc123/stats?ownerId=user_123`
pub async fn get_link_stats(
    Path(code): Path<String>,
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<LinkStats>, AppError> {
    let params = OwnerParams::from_pairs(pairs);
    let owner_id = require_owner(params.owner_id.as_deref())?;
    let now = Utc::now();

    let (record, clicks) = store::owned_click_log(&state.db, &code, owner_id, now)?;
    tracing::debug!(short_code = %code, logged = clicks.len(), "Returning link stats");
    Ok(Json(link_stats(&record, &clicks, now)))
}
