//! Link query engine
//!
//! Turns a point-in-time set of link records and a listing request into one
//! page of results plus pagination metadata. The pipeline always runs in the
//! same order:
//!
//! 1. **filter** - case-insensitive substring search on short code / URL,
//!    optionally narrowed to one tag
//! 2. **sort** - stable sort with a total comparator per field
//! 3. **paginate** - slice the requested page and describe its position
//!
//! Everything here is synchronous and side-effect free. The engine never
//! holds state between calls; each request brings its own [`LinkSnapshot`].

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::error::AppError;
use crate::model::{
    ClickDetail, CountryCount, DailyClicks, LinkRecord, LinkStats, ListParams, ListResponse,
    Pagination, Summary,
};

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;

/// Bounds applied to client-supplied page sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryLimits {
    /// Used when the client sends no page size, or one below 1
    pub default_page_size: usize,
    /// Larger requested sizes are capped to this
    pub max_page_size: usize,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    Clicks,
    CreatedAt,
    ShortCode,
}

impl SortField {
    /// Accepts the current names plus the legacy `time`/`short` spellings
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "clicks" | "clickCount" => Some(SortField::Clicks),
            "createdAt" | "created_at" | "time" => Some(SortField::CreatedAt),
            "shortCode" | "short_code" | "short" => Some(SortField::ShortCode),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

impl SortOrder {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Some(SortOrder::Ascending),
            "desc" | "descending" => Some(SortOrder::Descending),
            _ => None,
        }
    }
}

/// A validated listing request. Construct it with [`QueryRequest::from_params`]
/// so every field is already clamped or defaulted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    /// 1-based
    pub page: usize,
    pub page_size: usize,
    pub search: Option<String>,
    pub tag: Option<String>,
    pub sort_field: SortField,
    pub sort_order: SortOrder,
    /// Deactivated links are left out unless this is set
    pub include_inactive: bool,
}

impl Default for QueryRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            search: None,
            tag: None,
            sort_field: SortField::default(),
            sort_order: SortOrder::default(),
            include_inactive: false,
        }
    }
}

impl QueryRequest {
    /// Builds a request from raw query-string values. Never fails: anything
    /// malformed or out of range degrades to a default.
    pub fn from_params(params: &ListParams, limits: &QueryLimits) -> Self {
        let page = params
            .page
            .as_deref()
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .filter(|page| *page >= 1)
            .and_then(|page| usize::try_from(page).ok())
            .unwrap_or(1);

        let page_size = params
            .page_size
            .as_deref()
            .or(params.limit.as_deref())
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .filter(|size| *size >= 1)
            .map(|size| usize::try_from(size).unwrap_or(usize::MAX).min(limits.max_page_size))
            .unwrap_or(limits.default_page_size);

        // An unknown sort field means the documented default: most clicked first
        let (sort_field, sort_order) = match params.sort_by.as_deref().map(SortField::parse) {
            Some(None) => (SortField::Clicks, SortOrder::Descending),
            parsed => (
                parsed.flatten().unwrap_or_default(),
                params
                    .order
                    .as_deref()
                    .and_then(SortOrder::parse)
                    .unwrap_or_default(),
            ),
        };

        Self {
            page,
            page_size,
            // search is matched verbatim, spaces included
            search: params.search.clone().filter(|s| !s.is_empty()),
            tag: non_blank(params.tag.as_deref()),
            sort_field,
            sort_order,
            include_inactive: params
                .include_inactive
                .as_deref()
                .is_some_and(|raw| matches!(raw.trim(), "true" | "1")),
        }
    }
}

fn non_blank(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// An owned, version-stamped copy of one owner's links
///
/// `version` is the store's write counter at the time the snapshot was read;
/// two snapshots with the same version hold the same data.
#[derive(Debug, Clone)]
pub struct LinkSnapshot {
    pub version: u64,
    pub taken_at: DateTime<Utc>,
    pub records: Vec<LinkRecord>,
}

/// One page of results
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

/// Keeps records whose short code or URL contains `search` (ignoring case)
/// and, when given, that carry `tag`. Borrows the input; order is preserved.
pub fn filter_links<'a>(
    records: &'a [LinkRecord],
    search: Option<&str>,
    tag: Option<&str>,
) -> Vec<&'a LinkRecord> {
    let needle = search.filter(|s| !s.is_empty()).map(str::to_lowercase);
    let tag = tag.filter(|t| !t.is_empty()).map(str::to_lowercase);

    records
        .iter()
        .filter(|record| match &needle {
            Some(needle) => {
                record.short_code.to_lowercase().contains(needle.as_str())
                    || record.original_url.to_lowercase().contains(needle.as_str())
            }
            None => true,
        })
        .filter(|record| match &tag {
            Some(tag) => record.tags.iter().any(|t| t.to_lowercase() == *tag),
            None => true,
        })
        .collect()
}

/// Three-way comparison on a single field. Equal keys compare `Equal`.
pub fn compare_links(a: &LinkRecord, b: &LinkRecord, field: SortField) -> Ordering {
    match field {
        SortField::Clicks => a.click_count.cmp(&b.click_count),
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::ShortCode => a
            .short_code
            .chars()
            .flat_map(char::to_lowercase)
            .cmp(b.short_code.chars().flat_map(char::to_lowercase)),
    }
}

/// Stable sort: records with equal keys keep their input order in both
/// directions, because descending reverses the comparator and not the output.
pub fn sort_links<'a>(
    mut records: Vec<&'a LinkRecord>,
    field: SortField,
    order: SortOrder,
) -> Vec<&'a LinkRecord> {
    match order {
        SortOrder::Ascending => records.sort_by(|a, b| compare_links(a, b, field)),
        SortOrder::Descending => records.sort_by(|a, b| compare_links(a, b, field).reverse()),
    }
    records
}

/// Slices page `page` (1-based) out of `records`
///
/// `page` below 1 is treated as 1 and a `page_size` of 0 as [`DEFAULT_PAGE_SIZE`].
/// A page past the end is empty, not an error.
pub fn paginate<T: Clone>(records: &[T], page: usize, page_size: usize) -> Page<T> {
    let page = page.max(1);
    let page_size = if page_size == 0 { DEFAULT_PAGE_SIZE } else { page_size };

    let total_items = records.len();
    let total_pages = total_items.div_ceil(page_size);

    let start = (page - 1).saturating_mul(page_size);
    let items = if start >= total_items {
        Vec::new()
    } else {
        let end = start.saturating_add(page_size).min(total_items);
        records[start..end].to_vec()
    };

    Page {
        items,
        pagination: Pagination {
            page,
            page_size,
            total_items,
            total_pages,
            has_next: page < total_pages,
            has_previous: page > 1,
        },
    }
}

/// filter -> sort -> paginate
pub fn run_query(records: &[LinkRecord], request: &QueryRequest) -> ListResponse {
    let mut filtered = filter_links(records, request.search.as_deref(), request.tag.as_deref());
    if !request.include_inactive {
        filtered.retain(|record| record.is_active);
    }
    let sorted = sort_links(filtered, request.sort_field, request.sort_order);
    let page = paginate(&sorted, request.page, request.page_size);

    ListResponse {
        data: page.items.into_iter().cloned().collect(),
        pagination: page.pagination,
    }
}

/// Totals over a record set
///
/// Empty sets produce zeros. The average is rounded half up. A click total
/// that does not fit in a `u64` is reported as corrupt data rather than
/// wrapped or saturated.
pub fn summarize(records: &[LinkRecord], now: DateTime<Utc>) -> Result<Summary, AppError> {
    let mut total_clicks: u64 = 0;
    let mut top_clicks: u64 = 0;

    for record in records {
        total_clicks = total_clicks.checked_add(record.click_count).ok_or_else(|| {
            AppError::DataIntegrity {
                key: record.short_code.clone(),
                reason: "click counters overflow when summed".to_string(),
            }
        })?;
        top_clicks = top_clicks.max(record.click_count);
    }

    let total_links = records.len() as u64;
    let average_clicks = if total_links == 0 {
        0
    } else {
        let n = u128::from(total_links);
        ((u128::from(total_clicks) + n / 2) / n) as u64
    };

    Ok(Summary {
        total_links,
        total_clicks,
        top_clicks,
        average_clicks,
        generated_at: now,
    })
}

const RECENT_DAYS: i64 = 7;
const TOP_COUNTRIES: usize = 5;

/// Click analytics for one link
///
/// `total_clicks` is the record's counter. Everything else comes from the
/// click log, which only holds the most recent entries. Countries are ranked
/// by count, ties broken alphabetically. The trend lists the last 7 UTC days
/// that saw clicks, oldest first.
pub fn link_stats(record: &LinkRecord, clicks: &[ClickDetail], now: DateTime<Utc>) -> LinkStats {
    let since = now - Duration::days(RECENT_DAYS);
    let recent: Vec<&ClickDetail> = clicks
        .iter()
        .filter(|click| click.timestamp >= since && click.timestamp <= now)
        .collect();

    let mut by_country: HashMap<&str, usize> = HashMap::new();
    for click in clicks {
        *by_country.entry(click.country.as_str()).or_default() += 1;
    }
    let mut top_countries: Vec<CountryCount> = by_country
        .into_iter()
        .map(|(country, count)| CountryCount {
            country: country.to_string(),
            count,
        })
        .collect();
    top_countries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.country.cmp(&b.country)));
    top_countries.truncate(TOP_COUNTRIES);

    let mut by_day: HashMap<String, usize> = HashMap::new();
    for click in &recent {
        *by_day
            .entry(click.timestamp.format("%Y-%m-%d").to_string())
            .or_default() += 1;
    }
    let mut click_trend: Vec<DailyClicks> = by_day
        .into_iter()
        .map(|(date, clicks)| DailyClicks { date, clicks })
        .collect();
    click_trend.sort_by(|a, b| a.date.cmp(&b.date));

    LinkStats {
        short_code: record.short_code.clone(),
        total_clicks: record.click_count,
        recent_clicks: recent.len(),
        top_countries,
        click_trend,
        generated_at: now,
    }
}
