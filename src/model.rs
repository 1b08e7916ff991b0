//! Data models for the link dashboard
//!
//! This module defines the stored link record, the request/response payloads
//! of the HTTP API and the validation rules applied to client-supplied fields.
//! Everything on the wire is camelCase.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::AppError;

/// A shortened link as stored in the database
///
/// `short_code`, `original_url`, `owner_id` and `created_at` never change after
/// creation. `click_count` only grows, through [`crate::store::record_click`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LinkRecord {
    /// Unique key of the link, used as the redirect path segment
    pub short_code: String,

    /// Redirect target
    pub original_url: String,

    /// Account that owns this link
    pub owner_id: String,

    pub created_at: DateTime<Utc>,

    /// Number of recorded redirects. Deliberately has no serde default:
    /// a stored record without it is corrupt, not "zero clicks".
    pub click_count: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// Once elapsed the link stops resolving and is purged by the sweeper
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    /// Deactivated links keep their data but neither redirect nor show up in listings
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl LinkRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// One entry of a link's click log
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClickDetail {
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Two-letter code from the edge proxy, or `unknown`
    pub country: String,
}

impl ClickDetail {
    /// A click with no request metadata attached
    pub fn at(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            referer: None,
            user_agent: None,
            country: UNKNOWN_COUNTRY.to_string(),
        }
    }
}

pub const UNKNOWN_COUNTRY: &str = "unknown";

/// Request payload for creating a new short link
///
/// # Example
/// ```json
/// {
///   "url": "https://example.com/very/long/url",
///   "ownerId": "user_123",
///   "customCode": "my-link",
///   "tags": ["launch"]
/// }
/// ```
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CreateLinkRequest {
    pub url: String,

    pub owner_id: String,

    /// If absent or empty, a random 6-character code is generated
    pub custom_code: Option<String>,

    pub title: Option<String>,

    pub description: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    pub expires_at: Option<DateTime<Utc>>,
}

/// Metadata edit. Fields left out are kept as they are.
///
/// `description` and `expiresAt` distinguish an absent key (keep) from an
/// explicit `null` (clear).
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLinkRequest {
    pub title: Option<String>,

    #[serde(default, with = "::serde_with::rust::double_option")]
    pub description: Option<Option<String>>,

    pub tags: Option<Vec<String>>,

    #[serde(default, with = "::serde_with::rust::double_option")]
    pub expires_at: Option<Option<DateTime<Utc>>>,

    /// `false` deactivates the link, `true` brings it back
    pub is_active: Option<bool>,
}

/// Raw query-string parameters of the listing endpoint
///
/// Paging and sorting values are kept as strings so malformed input can be
/// defaulted by [`crate::query::QueryRequest::from_params`] instead of being
/// rejected by the extractor. Unknown keys are ignored.
///
/// # Example
/// Query string: `?ownerId=user_123&page=2&pageSize=20&search=docs&sortBy=createdAt&order=asc`
#[derive(Debug, Clone, Default)]
pub struct ListParams {
    pub owner_id: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
    /// Older clients send `limit` instead of `pageSize`
    pub limit: Option<String>,
    pub search: Option<String>,
    pub tag: Option<String>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
    /// `true`/`1` also lists deactivated links
    pub include_inactive: Option<String>,
}

impl ListParams {
    /// Builds the parameters from raw query pairs. A repeated key keeps its
    /// first value, and unknown keys are ignored.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut params = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "ownerId" => &mut params.owner_id,
                "page" => &mut params.page,
                "pageSize" => &mut params.page_size,
                "limit" => &mut params.limit,
                "search" => &mut params.search,
                "tag" => &mut params.tag,
                "sortBy" => &mut params.sort_by,
                "order" => &mut params.order,
                "includeInactive" => &mut params.include_inactive,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }
        params
    }
}

/// Identifies the caller for single-link and summary endpoints
#[derive(Debug, Clone, Default)]
pub struct OwnerParams {
    pub owner_id: Option<String>,
}

impl OwnerParams {
    /// First `ownerId` wins, everything else is ignored
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        Self {
            owner_id: pairs
                .into_iter()
                .find(|(key, _)| key == "ownerId")
                .map(|(_, value)| value),
        }
    }
}

/// Pagination metadata returned alongside every page
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: usize,
    pub page_size: usize,
    pub total_items: usize,
    pub total_pages: usize,
    pub has_next: bool,
    pub has_previous: bool,
}

/// Response body of `GET /api/urls`
#[derive(Serialize, Debug, Clone)]
pub struct ListResponse {
    pub data: Vec<LinkRecord>,
    pub pagination: Pagination,
}

/// Aggregate numbers over an owner's links
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_links: u64,
    pub total_clicks: u64,
    pub top_clicks: u64,
    pub average_clicks: u64,
    pub generated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CountryCount {
    pub country: String,
    pub count: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DailyClicks {
    /// `YYYY-MM-DD`, UTC
    pub date: String,
    pub clicks: usize,
}

/// Click analytics of a single link, built from its click log
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LinkStats {
    pub short_code: String,
    pub total_clicks: u64,
    /// Logged clicks in the last 7 days
    pub recent_clicks: usize,
    /// At most 5, busiest first
    pub top_countries: Vec<CountryCount>,
    /// Last 7 days, oldest first, days without clicks omitted
    pub click_trend: Vec<DailyClicks>,
    pub generated_at: DateTime<Utc>,
}

/// A link as returned by the create/get/update endpoints
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LinkResponse {
    #[serde(flatten)]
    pub link: LinkRecord,
    pub short_url: String,
}

const MAX_TITLE_LEN: usize = 200;
const MAX_DESCRIPTION_LEN: usize = 1000;
const MAX_TAGS: usize = 20;

/// Paths the router serves itself. A link with one of these codes could never be reached.
pub const RESERVED_CODES: &[&str] = &["health", "api", "summary"];

pub fn is_reserved_code(code: &str) -> bool {
    RESERVED_CODES
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(code))
}

/// Checks that `raw` is an absolute http(s) URL and returns its normalized form
pub fn validate_url(raw: &str) -> Result<String, AppError> {
    let parsed = Url::parse(raw.trim())
        .map_err(|err| AppError::Validation(format!("Invalid URL format: {}", err)))?;

    match parsed.scheme() {
        "http" | "https" if parsed.host().is_some() => Ok(parsed.to_string()),
        _ => Err(AppError::Validation(
            "Invalid URL format: only http and https links can be shortened".to_string(),
        )),
    }
}

/// Custom short codes: 3 to 32 characters of `[A-Za-z0-9_-]`, not a reserved path
pub fn validate_short_code(code: &str) -> Result<(), AppError> {
    let valid_len = (3..=32).contains(&code.len());
    let valid_chars = code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if !(valid_len && valid_chars) {
        return Err(AppError::Validation(
            "Short code must be 3-32 characters of letters, digits, '-' or '_'".to_string(),
        ));
    }
    if is_reserved_code(code) {
        return Err(AppError::Validation(format!("Short code `{}` is reserved", code)));
    }
    Ok(())
}

/// Owner ids double as index-key prefixes, so `:` and friends are not allowed
pub fn validate_owner_id(owner_id: &str) -> Result<(), AppError> {
    let valid_len = (1..=64).contains(&owner_id.len());
    let valid_chars = owner_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if valid_len && valid_chars {
        Ok(())
    } else {
        Err(AppError::Validation(
            "ownerId must be 1-64 characters of letters, digits, '-', '_' or '.'".to_string(),
        ))
    }
}

/// Resolves the required `ownerId` query parameter
pub fn require_owner(owner_id: Option<&str>) -> Result<&str, AppError> {
    let owner_id = owner_id
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::Validation("ownerId is required".to_string()))?;
    validate_owner_id(owner_id)?;
    Ok(owner_id)
}

pub fn validate_metadata(
    title: Option<&str>,
    description: Option<&str>,
    tags: Option<&[String]>,
) -> Result<(), AppError> {
    if title.is_some_and(|t| t.chars().count() > MAX_TITLE_LEN) {
        return Err(AppError::Validation(format!(
            "Title must be at most {} characters",
            MAX_TITLE_LEN
        )));
    }
    if description.is_some_and(|d| d.chars().count() > MAX_DESCRIPTION_LEN) {
        return Err(AppError::Validation(format!(
            "Description must be at most {} characters",
            MAX_DESCRIPTION_LEN
        )));
    }
    if let Some(tags) = tags {
        if tags.len() > MAX_TAGS {
            return Err(AppError::Validation(format!("At most {} tags are allowed", MAX_TAGS)));
        }
        if tags.iter().any(|t| t.trim().is_empty()) {
            return Err(AppError::Validation("Tags must not be empty".to_string()));
        }
    }
    Ok(())
}
