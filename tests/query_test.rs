//! Tests for the link query engine: filtering, stable sorting, pagination
//! boundaries and summary aggregation.

use chrono::{DateTime, Duration, TimeZone, Utc};

use linkboard::model::{ClickDetail, LinkRecord, ListParams};
use linkboard::query::{
    filter_links, link_stats, paginate, run_query, sort_links, summarize, QueryLimits,
    QueryRequest, SortField, SortOrder,
};

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
}

fn record(code: &str, clicks: u64, minute: i64) -> LinkRecord {
    LinkRecord {
        short_code: code.to_string(),
        original_url: format!("https://example.com/{}", code),
        owner_id: "u1".to_string(),
        created_at: base_time() + Duration::minutes(minute),
        click_count: clicks,
        title: None,
        description: None,
        tags: Vec::new(),
        expires_at: None,
        is_active: true,
    }
}

fn codes(records: &[&LinkRecord]) -> Vec<String> {
    records.iter().map(|r| r.short_code.clone()).collect()
}

fn sample() -> Vec<LinkRecord> {
    vec![
        record("ab12cd", 5, 0),
        record("zz99xx", 5, 1),
        record("aa11bb", 9, 2),
    ]
}

#[test]
fn concrete_first_page_by_clicks() {
    let request = QueryRequest {
        page: 1,
        page_size: 2,
        sort_field: SortField::Clicks,
        sort_order: SortOrder::Descending,
        ..QueryRequest::default()
    };

    let result = run_query(&sample(), &request);

    let got: Vec<(&str, u64)> = result
        .data
        .iter()
        .map(|r| (r.short_code.as_str(), r.click_count))
        .collect();
    assert_eq!(got, vec![("aa11bb", 9), ("ab12cd", 5)]);
    assert_eq!(result.pagination.page, 1);
    assert_eq!(result.pagination.page_size, 2);
    assert_eq!(result.pagination.total_items, 3);
    assert_eq!(result.pagination.total_pages, 2);
    assert!(result.pagination.has_next);
    assert!(!result.pagination.has_previous);
}

#[test]
fn empty_input_gives_zero_pages() {
    let request = QueryRequest {
        page_size: 7,
        ..QueryRequest::default()
    };

    let result = run_query(&[], &request);

    assert!(result.data.is_empty());
    assert_eq!(result.pagination.page, 1);
    assert_eq!(result.pagination.page_size, 7);
    assert_eq!(result.pagination.total_items, 0);
    assert_eq!(result.pagination.total_pages, 0);
    assert!(!result.pagination.has_next);
    assert!(!result.pagination.has_previous);
}

#[test]
fn pages_partition_the_filtered_set() {
    let records: Vec<LinkRecord> = (0..47).map(|i| record(&format!("c{:03}", i), i % 7, i as i64)).collect();

    for page_size in [1, 5, 10, 46, 47, 100] {
        let request = QueryRequest {
            page_size,
            search: Some("c0".to_string()),
            ..QueryRequest::default()
        };
        let first = run_query(&records, &request);
        let total_pages = first.pagination.total_pages;

        let mut seen = 0;
        for page in 1..=total_pages {
            let result = run_query(&records, &QueryRequest { page, ..request.clone() });
            seen += result.data.len();
        }

        // "c0" matches c000..c046
        assert_eq!(seen, first.pagination.total_items);
        assert_eq!(seen, 47);
    }
}

#[test]
fn page_past_the_end_is_empty() {
    let records = sample();

    for page in [3, 4, 1000] {
        let result = paginate(&records, page, 2);
        assert!(result.items.is_empty());
        assert!(!result.pagination.has_next);
        assert!(result.pagination.has_previous);
        assert_eq!(result.pagination.total_pages, 2);
    }
}

#[test]
fn paginate_clamps_zero_inputs() {
    let records = sample();

    let result = paginate(&records, 0, 0);
    assert_eq!(result.pagination.page, 1);
    assert_eq!(result.pagination.page_size, linkboard::query::DEFAULT_PAGE_SIZE);
    assert_eq!(result.items.len(), 3);
}

#[test]
fn sort_is_stable_for_equal_keys() {
    let records = vec![
        record("first", 3, 5),
        record("second", 1, 5),
        record("third", 3, 5),
        record("fourth", 1, 5),
    ];

    let input: Vec<&LinkRecord> = records.iter().collect();

    let desc = sort_links(input.clone(), SortField::Clicks, SortOrder::Descending);
    assert_eq!(codes(&desc), vec!["first", "third", "second", "fourth"]);

    let asc = sort_links(input.clone(), SortField::Clicks, SortOrder::Ascending);
    assert_eq!(codes(&asc), vec!["second", "fourth", "first", "third"]);

    // Every created_at is equal, so input order survives in both directions
    let by_time = sort_links(input.clone(), SortField::CreatedAt, SortOrder::Descending);
    assert_eq!(codes(&by_time), codes(&input));
    let by_time = sort_links(input.clone(), SortField::CreatedAt, SortOrder::Ascending);
    assert_eq!(codes(&by_time), codes(&input));
}

#[test]
fn short_code_sort_ignores_case_and_keeps_case_ties_stable() {
    let records = vec![
        record("beta", 0, 0),
        record("ALPHA", 0, 1),
        record("Beta", 0, 2),
        record("alpha", 0, 3),
    ];

    let sorted = sort_links(records.iter().collect(), SortField::ShortCode, SortOrder::Ascending);
    assert_eq!(codes(&sorted), vec!["ALPHA", "alpha", "beta", "Beta"]);
}

#[test]
fn ascending_reversed_equals_descending_for_distinct_keys() {
    let records = vec![
        record("mmm", 4, 3),
        record("ccc", 9, 1),
        record("xxx", 1, 7),
        record("ggg", 6, 2),
    ];

    for field in [SortField::Clicks, SortField::CreatedAt, SortField::ShortCode] {
        let mut asc = sort_links(records.iter().collect(), field, SortOrder::Ascending);
        asc.reverse();
        let desc = sort_links(records.iter().collect(), field, SortOrder::Descending);
        assert_eq!(codes(&asc), codes(&desc), "field {:?}", field);
    }
}

#[test]
fn created_at_sort_is_chronological() {
    let records = vec![record("late", 0, 30), record("early", 0, -30), record("mid", 0, 0)];

    let sorted = sort_links(records.iter().collect(), SortField::CreatedAt, SortOrder::Ascending);
    assert_eq!(codes(&sorted), vec!["early", "mid", "late"]);
}

#[test]
fn filter_matches_code_or_url_case_insensitively() {
    let mut records = sample();
    records[2].original_url = "https://Docs.Example.com/intro".to_string();

    assert_eq!(codes(&filter_links(&records, Some("ZZ99"), None)), vec!["zz99xx"]);
    assert_eq!(codes(&filter_links(&records, Some("docs.example"), None)), vec!["aa11bb"]);
    assert!(filter_links(&records, Some("no-such-link"), None).is_empty());
}

#[test]
fn empty_search_returns_everything_in_order() {
    let records = sample();

    assert_eq!(filter_links(&records, None, None).len(), 3);
    assert_eq!(
        codes(&filter_links(&records, Some(""), None)),
        vec!["ab12cd", "zz99xx", "aa11bb"]
    );
}

#[test]
fn unique_substring_finds_exactly_one_record() {
    let records = sample();

    for record in &records {
        let term = &record.short_code[1..5];
        let matches = filter_links(&records, Some(term), None);
        assert_eq!(codes(&matches), vec![record.short_code.clone()]);
    }
}

#[test]
fn tag_filter() {
    let mut records = sample();
    records[0].tags = vec!["Launch".to_string()];
    records[2].tags = vec!["docs".to_string(), "launch".to_string()];

    assert_eq!(
        codes(&filter_links(&records, None, Some("LAUNCH"))),
        vec!["ab12cd", "aa11bb"]
    );
    assert_eq!(codes(&filter_links(&records, Some("aa"), Some("launch"))), vec!["aa11bb"]);
}

#[test]
fn summary_of_empty_set_is_zero() {
    let now = base_time();
    let summary = summarize(&[], now).unwrap();

    assert_eq!(summary.total_links, 0);
    assert_eq!(summary.total_clicks, 0);
    assert_eq!(summary.top_clicks, 0);
    assert_eq!(summary.average_clicks, 0);
    assert_eq!(summary.generated_at, now);
}

#[test]
fn summary_totals_and_rounding() {
    let summary = summarize(&sample(), base_time()).unwrap();

    assert_eq!(summary.total_links, 3);
    assert_eq!(summary.total_clicks, 19);
    assert_eq!(summary.top_clicks, 9);
    // 6.33 -> 6
    assert_eq!(summary.average_clicks, 6);

    let halves = vec![record("a", 1, 0), record("b", 2, 0)];
    // 1.5 -> 2
    assert_eq!(summarize(&halves, base_time()).unwrap().average_clicks, 2);
}

#[test]
fn summary_overflow_is_a_data_integrity_error() {
    let records = vec![record("big", u64::MAX, 0), record("one", 1, 0)];

    let err = summarize(&records, base_time()).unwrap_err();
    assert_eq!(err.code(), "data_integrity");
}

#[test]
fn request_from_params_defaults() {
    let limits = QueryLimits::default();
    let request = QueryRequest::from_params(&ListParams::default(), &limits);

    assert_eq!(request, QueryRequest::default());
    assert_eq!(request.page_size, limits.default_page_size);
    assert_eq!(request.sort_field, SortField::Clicks);
    assert_eq!(request.sort_order, SortOrder::Descending);
}

#[test]
fn request_from_params_clamps_and_parses() {
    let limits = QueryLimits {
        default_page_size: 25,
        max_page_size: 50,
    };

    let params = ListParams {
        page: Some("0".to_string()),
        page_size: Some("-3".to_string()),
        search: Some("".to_string()),
        tag: Some("   ".to_string()),
        sort_by: Some("createdAt".to_string()),
        order: Some("ASC".to_string()),
        ..ListParams::default()
    };
    let request = QueryRequest::from_params(&params, &limits);
    assert_eq!(request.page, 1);
    assert_eq!(request.page_size, 25);
    assert_eq!(request.search, None);
    assert_eq!(request.tag, None);
    assert_eq!(request.sort_field, SortField::CreatedAt);
    assert_eq!(request.sort_order, SortOrder::Ascending);

    let params = ListParams {
        page: Some(" 3 ".to_string()),
        limit: Some("999".to_string()),
        sort_by: Some("short".to_string()),
        ..ListParams::default()
    };
    let request = QueryRequest::from_params(&params, &limits);
    assert_eq!(request.page, 3);
    assert_eq!(request.page_size, 50);
    assert_eq!(request.sort_field, SortField::ShortCode);
    assert_eq!(request.sort_order, SortOrder::Descending);

    // pageSize wins over limit
    let params = ListParams {
        page_size: Some("7".to_string()),
        limit: Some("9".to_string()),
        ..ListParams::default()
    };
    assert_eq!(QueryRequest::from_params(&params, &limits).page_size, 7);
}

#[test]
fn unknown_sort_field_means_clicks_descending() {
    let params = ListParams {
        sort_by: Some("popularity".to_string()),
        order: Some("asc".to_string()),
        ..ListParams::default()
    };

    let request = QueryRequest::from_params(&params, &QueryLimits::default());
    assert_eq!(request.sort_field, SortField::Clicks);
    assert_eq!(request.sort_order, SortOrder::Descending);
}

#[test]
fn query_does_not_mutate_input() {
    let records = sample();
    let before = records.clone();

    let request = QueryRequest {
        sort_field: SortField::ShortCode,
        sort_order: SortOrder::Ascending,
        search: Some("a".to_string()),
        ..QueryRequest::default()
    };
    let _ = run_query(&records, &request);

    assert_eq!(records, before);
}

#[test]
fn search_term_is_kept_verbatim() {
    let params = ListParams {
        search: Some(" docs ".to_string()),
        ..ListParams::default()
    };
    let request = QueryRequest::from_params(&params, &QueryLimits::default());
    assert_eq!(request.search.as_deref(), Some(" docs "));

    let mut records = sample();
    records[0].original_url = "https://example.com/read the docs now".to_string();
    records[1].original_url = "https://example.com/docs".to_string();

    let result = run_query(&records, &request);
    let got: Vec<&str> = result.data.iter().map(|r| r.short_code.as_str()).collect();
    assert_eq!(got, vec!["ab12cd"]);
}

#[test]
fn inactive_links_are_listed_only_on_request() {
    let mut records = sample();
    records[2].is_active = false;

    let hidden = run_query(&records, &QueryRequest::default());
    assert_eq!(hidden.pagination.total_items, 2);
    assert!(hidden.data.iter().all(|r| r.is_active));

    let params = ListParams {
        include_inactive: Some("true".to_string()),
        ..ListParams::default()
    };
    let request = QueryRequest::from_params(&params, &QueryLimits::default());
    assert!(request.include_inactive);
    assert_eq!(run_query(&records, &request).pagination.total_items, 3);

    // Summary counts every link it is given
    assert_eq!(summarize(&records, base_time()).unwrap().total_links, 3);
}

fn click(at: DateTime<Utc>, country: &str) -> ClickDetail {
    ClickDetail {
        country: country.to_string(),
        ..ClickDetail::at(at)
    }
}

#[test]
fn link_stats_from_click_log() {
    let now = base_time() + Duration::days(30);
    let link = record("stats1", 42, 0);

    let mut clicks = vec![
        click(now - Duration::days(20), "DE"),
        click(now - Duration::days(8), "US"),
    ];
    for _ in 0..3 {
        clicks.push(click(now - Duration::days(2), "US"));
    }
    clicks.push(click(now - Duration::days(2), "FR"));
    clicks.push(click(now - Duration::hours(1), "FR"));
    for country in ["BR", "CA", "JP"] {
        clicks.push(click(now - Duration::hours(1), country));
    }

    let stats = link_stats(&link, &clicks, now);

    assert_eq!(stats.short_code, "stats1");
    assert_eq!(stats.total_clicks, 42);
    assert_eq!(stats.recent_clicks, 8);

    let top: Vec<(&str, usize)> = stats
        .top_countries
        .iter()
        .map(|c| (c.country.as_str(), c.count))
        .collect();
    assert_eq!(top, vec![("US", 4), ("FR", 2), ("BR", 1), ("CA", 1), ("DE", 1)]);

    let trend: Vec<(&str, usize)> = stats
        .click_trend
        .iter()
        .map(|d| (d.date.as_str(), d.clicks))
        .collect();
    assert_eq!(trend, vec![("2026-01-29", 4), ("2026-01-30", 4)]);
}

#[test]
fn link_stats_without_clicks() {
    let stats = link_stats(&record("quiet1", 0, 0), &[], base_time());
    assert_eq!(stats.recent_clicks, 0);
    assert!(stats.top_countries.is_empty());
    assert!(stats.click_trend.is_empty());
}
