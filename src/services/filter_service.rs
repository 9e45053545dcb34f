//! In-memory filtering, ordering and pagination of listing sets.
//!
//! Everything here is a pure function of its inputs (including `now`), so
//! the same code serves fresh remote reads, cached snapshots and the local
//! collections.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::listing::Listing;
use crate::utils::time::{end_of_day, parse_listing_date, start_of_day};

pub const DEFAULT_PER_PAGE: usize = 20;
pub const MAX_PER_PAGE: usize = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Open,
    Upcoming,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Upcoming,
    Open,
    Closed,
}

/// Filter criteria. `None`, empty and `"all"` all mean "no constraint".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSpec {
    pub organization: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub search: Option<String>,
    pub status: StatusFilter,
    pub featured_only: bool,
    pub new_only: bool,
}

fn constraint(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("all"))
}

fn category_matches(actual: &Option<String>, wanted: Option<&str>) -> bool {
    match wanted {
        None => true,
        Some(wanted) => actual.as_deref() == Some(wanted),
    }
}

/// Application window as whole days. Either bound may be missing; drives
/// that only carry a single `date` are open on that day. `None` when no
/// usable date exists or a present date does not parse.
pub fn application_window(listing: &Listing) -> Option<(Option<NaiveDate>, Option<NaiveDate>)> {
    let parse = |raw: Option<&str>| raw.map(|raw| parse_listing_date(raw).ok_or(())).transpose();
    match (
        listing.application_start_date.as_deref(),
        listing.application_end_date.as_deref(),
    ) {
        (None, None) => {
            let day = parse_listing_date(listing.date.as_deref()?)?;
            Some((Some(day), Some(day)))
        }
        (start, end) => Some((parse(start).ok()?, parse(end).ok()?)),
    }
}

/// `None` when the dates are missing or unparseable; such records never
/// match a status filter.
pub fn application_status(listing: &Listing, now: DateTime<Utc>) -> Option<ApplicationStatus> {
    let (start, end) = application_window(listing)?;
    if start.is_some_and(|start| now < start_of_day(start)) {
        Some(ApplicationStatus::Upcoming)
    } else if end.is_some_and(|end| now > end_of_day(end)) {
        Some(ApplicationStatus::Closed)
    } else {
        Some(ApplicationStatus::Open)
    }
}

pub fn is_application_open(listing: &Listing, now: DateTime<Utc>) -> bool {
    application_status(listing, now) == Some(ApplicationStatus::Open)
}

fn matches_search(listing: &Listing, term: &str) -> bool {
    let needle = term.to_lowercase();
    let contains = |field: &str| field.to_lowercase().contains(&needle);

    contains(&listing.title)
        || contains(&listing.organization)
        || listing.description.as_deref().is_some_and(contains)
        || listing.category.as_deref().is_some_and(contains)
        || listing.details.posts().iter().any(|p| contains(p))
}

pub fn matches(listing: &Listing, spec: &FilterSpec, now: DateTime<Utc>) -> bool {
    if !listing.is_active {
        return false;
    }
    if constraint(&spec.organization).is_some_and(|org| listing.organization != org)
        || !category_matches(&listing.category, constraint(&spec.category))
        || !category_matches(&listing.location, constraint(&spec.location))
    {
        return false;
    }
    if let Some(term) = constraint(&spec.search) {
        if !matches_search(listing, term) {
            return false;
        }
    }
    let wanted_status = match spec.status {
        StatusFilter::All => None,
        StatusFilter::Open => Some(ApplicationStatus::Open),
        StatusFilter::Upcoming => Some(ApplicationStatus::Upcoming),
        StatusFilter::Closed => Some(ApplicationStatus::Closed),
    };
    if let Some(wanted) = wanted_status {
        if application_status(listing, now) != Some(wanted) {
            return false;
        }
    }
    if spec.featured_only && !listing.featured {
        return false;
    }
    if spec.new_only && !listing.is_new {
        return false;
    }
    true
}

/// Recency key: `addedTimestamp`, or the record's own date when the
/// timestamp was never set.
pub fn recency_key(listing: &Listing) -> i64 {
    if listing.added_timestamp > 0 {
        return listing.added_timestamp;
    }
    listing
        .application_start_date
        .as_deref()
        .or(listing.date.as_deref())
        .and_then(parse_listing_date)
        .map(|d| start_of_day(d).timestamp_millis())
        .unwrap_or(0)
}

/// Newest first. `sort_by` is stable, so ties keep their input order.
pub fn sort_newest_first(records: &mut [Listing]) {
    records.sort_by(|a, b| recency_key(b).cmp(&recency_key(a)));
}

pub fn normalize_paging(page: Option<usize>, per_page: Option<usize>) -> (usize, usize) {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE);
    (page, per_page)
}

/// 1-based page slice; pages past the end are empty.
pub fn paginate<T: Clone>(items: &[T], page: usize, per_page: usize) -> Vec<T> {
    let per_page = per_page.max(1);
    let offset = page.max(1).saturating_sub(1).saturating_mul(per_page);
    items.iter().skip(offset).take(per_page).cloned().collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilteredPage {
    pub items: Vec<Listing>,
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
    pub total_pages: usize,
}

pub fn apply(
    records: &[Listing],
    spec: &FilterSpec,
    now: DateTime<Utc>,
    page: usize,
    per_page: usize,
) -> FilteredPage {
    let mut matched: Vec<Listing> = records
        .iter()
        .filter(|l| matches(l, spec, now))
        .cloned()
        .collect();
    sort_newest_first(&mut matched);

    let per_page = per_page.max(1);
    let total = matched.len();
    FilteredPage {
        items: paginate(&matched, page, per_page),
        total,
        page: page.max(1),
        per_page,
        total_pages: total.div_ceil(per_page),
    }
}

/// Badges shown next to a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingFlags {
    pub application_status: Option<ApplicationStatus>,
    pub is_open: bool,
    pub is_new_badge: bool,
    pub is_featured: bool,
    pub days_left: Option<i64>,
}

pub fn derive_flags(listing: &Listing, now: DateTime<Utc>, new_badge_window: Duration) -> ListingFlags {
    let status = application_status(listing, now);
    let recently_added = listing.added_timestamp > 0
        && now.timestamp_millis() - listing.added_timestamp <= new_badge_window.num_milliseconds();
    let days_left = match status {
        Some(ApplicationStatus::Open) => application_window(listing)
            .and_then(|(_, end)| end)
            .map(|end| (end - now.date_naive()).num_days()),
        _ => None,
    };

    ListingFlags {
        application_status: status,
        is_open: status == Some(ApplicationStatus::Open),
        is_new_badge: listing.is_new || recently_added,
        is_featured: listing.featured,
        days_left,
    }
}

/// Distinct values for the filter dropdowns, over active records only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Facets {
    pub organizations: Vec<String>,
    pub categories: Vec<String>,
    pub locations: Vec<String>,
}

pub fn facets(records: &[Listing]) -> Facets {
    let mut organizations = BTreeSet::new();
    let mut categories = BTreeSet::new();
    let mut locations = BTreeSet::new();
    for listing in records.iter().filter(|l| l.is_active) {
        organizations.insert(listing.organization.clone());
        if let Some(category) = &listing.category {
            categories.insert(category.clone());
        }
        if let Some(location) = &listing.location {
            locations.insert(location.clone());
        }
    }
    Facets {
        organizations: organizations.into_iter().collect(),
        categories: categories.into_iter().collect(),
        locations: locations.into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::listing::{Counters, ExamDetails, ListingDetails, ListingKind};
    use chrono::TimeZone;

    fn exam(id: &str, added: i64, level: &str) -> Listing {
        Listing {
            id: id.to_string(),
            kind: ListingKind::Exams,
            title: format!("Exam {id}"),
            organization: "Commission".to_string(),
            description: None,
            location: None,
            category: Some(level.to_string()),
            application_start_date: None,
            application_end_date: None,
            date: None,
            added_timestamp: added,
            updated_at: None,
            featured: false,
            is_new: false,
            is_active: true,
            counters: Counters::default(),
            details: ListingDetails::Exam(ExamDetails::default()),
        }
    }

    fn with_window(mut listing: Listing, start: &str, end: &str) -> Listing {
        listing.application_start_date = Some(start.to_string());
        listing.application_end_date = Some(end.to_string());
        listing
    }

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn ids(items: &[Listing]) -> Vec<&str> {
        items.iter().map(|l| l.id.as_str()).collect()
    }

    #[test]
    fn categorical_filter_selects_exact_level() {
        let records = vec![exam("e1", 100, "UPSC"), exam("e2", 200, "SSC")];
        let spec = FilterSpec {
            category: Some("UPSC".into()),
            ..FilterSpec::default()
        };
        let page = apply(&records, &spec, at(2025, 1, 1), 1, 20);
        assert_eq!(ids(&page.items), vec!["e1"]);
        assert_eq!(page.total, 1);
    }

    #[test]
    fn all_and_blank_mean_unconstrained() {
        let records = vec![exam("e1", 100, "UPSC"), exam("e2", 200, "SSC")];
        for value in ["all", "ALL", "  "] {
            let spec = FilterSpec {
                category: Some(value.into()),
                ..FilterSpec::default()
            };
            assert_eq!(apply(&records, &spec, at(2025, 1, 1), 1, 20).total, 2);
        }
    }

    #[test]
    fn search_is_case_insensitive_over_any_field() {
        let mut a = exam("a", 1, "Banking");
        a.description = Some("Recruitment of Probationary Officers".into());
        let mut b = exam("b", 2, "Railway");
        b.details = ListingDetails::Exam(ExamDetails {
            posts: vec!["Assistant Loco Pilot".into()],
            ..ExamDetails::default()
        });
        let c = exam("c", 3, "SSC");
        let records = vec![a, b, c];

        let search = |term: &str| {
            let spec = FilterSpec {
                search: Some(term.into()),
                ..FilterSpec::default()
            };
            ids(&apply(&records, &spec, at(2025, 1, 1), 1, 20).items)
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>()
        };
        assert_eq!(search("probationary"), vec!["a"]);
        assert_eq!(search("LOCO"), vec!["b"]);
        assert_eq!(search("ssc"), vec!["c"]);
        assert_eq!(search("commission").len(), 3);
    }

    #[test]
    fn application_status_follows_window() {
        let listing = with_window(exam("e", 1, "SSC"), "2025-01-01", "2025-01-10");
        assert!(is_application_open(&listing, at(2025, 1, 5)));
        assert_eq!(
            application_status(&listing, at(2025, 1, 11)),
            Some(ApplicationStatus::Closed)
        );
        assert_eq!(
            application_status(&listing, at(2024, 12, 31)),
            Some(ApplicationStatus::Upcoming)
        );
        // both boundary days are inside the window
        assert!(is_application_open(&listing, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()));
        assert!(is_application_open(&listing, Utc.with_ymd_and_hms(2025, 1, 10, 23, 59, 0).unwrap()));
    }

    #[test]
    fn malformed_dates_match_no_status() {
        let broken = with_window(exam("bad", 1, "SSC"), "next week", "2025-01-10");
        let bad_end = {
            let mut l = exam("bad_end", 2, "SSC");
            l.application_end_date = Some("tbd".into());
            l
        };
        let records = vec![broken, bad_end];
        for status in [StatusFilter::Open, StatusFilter::Upcoming, StatusFilter::Closed] {
            let spec = FilterSpec {
                status,
                ..FilterSpec::default()
            };
            assert_eq!(apply(&records, &spec, at(2025, 1, 5), 1, 20).total, 0);
        }
        let all = FilterSpec::default();
        assert_eq!(apply(&records, &all, at(2025, 1, 5), 1, 20).total, 2);
    }

    #[test]
    fn one_sided_windows_use_the_bound_they_have() {
        let mut end_only = exam("end", 1, "SSC");
        end_only.application_end_date = Some("2025-01-10".into());
        let mut start_only = exam("start", 2, "SSC");
        start_only.application_start_date = Some("2025-02-01".into());

        assert_eq!(application_status(&end_only, at(2025, 3, 1)), Some(ApplicationStatus::Closed));
        assert_eq!(application_status(&end_only, at(2025, 1, 5)), Some(ApplicationStatus::Open));
        assert_eq!(derive_flags(&end_only, at(2025, 1, 5), Duration::days(7)).days_left, Some(5));

        assert_eq!(application_status(&start_only, at(2025, 1, 5)), Some(ApplicationStatus::Upcoming));
        let flags = derive_flags(&start_only, at(2025, 3, 1), Duration::days(7));
        assert!(flags.is_open);
        assert_eq!(flags.days_left, None);

        let records = vec![end_only, start_only];
        let closed = FilterSpec {
            status: StatusFilter::Closed,
            ..FilterSpec::default()
        };
        assert_eq!(ids(&apply(&records, &closed, at(2025, 3, 1), 1, 20).items), vec!["end"]);
        let open = FilterSpec {
            status: StatusFilter::Open,
            ..FilterSpec::default()
        };
        assert_eq!(ids(&apply(&records, &open, at(2025, 3, 1), 1, 20).items), vec!["start"]);
    }

    #[test]
    fn single_date_drive_is_open_on_its_day() {
        let mut drive = exam("d", 1, "Walk-in");
        drive.date = Some("2025-03-15".into());
        assert_eq!(application_status(&drive, at(2025, 3, 14)), Some(ApplicationStatus::Upcoming));
        assert!(is_application_open(&drive, at(2025, 3, 15)));
        assert_eq!(application_status(&drive, at(2025, 3, 16)), Some(ApplicationStatus::Closed));
    }

    #[test]
    fn boolean_filters_only_constrain_when_set() {
        let mut featured = exam("f", 1, "SSC");
        featured.featured = true;
        let mut fresh = exam("n", 2, "SSC");
        fresh.is_new = true;
        let plain = exam("p", 3, "SSC");
        let records = vec![featured, fresh, plain];

        let spec = FilterSpec {
            featured_only: true,
            ..FilterSpec::default()
        };
        assert_eq!(ids(&apply(&records, &spec, at(2025, 1, 1), 1, 20).items), vec!["f"]);
        let spec = FilterSpec {
            new_only: true,
            ..FilterSpec::default()
        };
        assert_eq!(ids(&apply(&records, &spec, at(2025, 1, 1), 1, 20).items), vec!["n"]);
    }

    #[test]
    fn inactive_records_never_listed() {
        let mut hidden = exam("hidden", 500, "UPSC");
        hidden.is_active = false;
        let records = vec![hidden, exam("shown", 100, "UPSC")];
        let page = apply(&records, &FilterSpec::default(), at(2025, 1, 1), 1, 20);
        assert_eq!(ids(&page.items), vec!["shown"]);
    }

    #[test]
    fn every_returned_record_satisfies_every_predicate() {
        let now = at(2025, 1, 5);
        let mut records = Vec::new();
        for i in 0..40i64 {
            let level = ["UPSC", "SSC", "Banking"][(i % 3) as usize];
            let mut l = exam(&format!("r{i}"), i * 10, level);
            l.featured = i % 2 == 0;
            l.organization = if i % 5 == 0 { "IBPS".into() } else { "Commission".into() };
            if i % 4 == 0 {
                l = with_window(l, "2025-01-01", "2025-01-10");
            } else if i % 4 == 1 {
                l = with_window(l, "2025-02-01", "2025-02-10");
            }
            records.push(l);
        }
        let spec = FilterSpec {
            category: Some("SSC".into()),
            status: StatusFilter::Open,
            featured_only: true,
            ..FilterSpec::default()
        };
        let page = apply(&records, &spec, now, 1, 100);
        let expected: Vec<&Listing> = records
            .iter()
            .filter(|l| {
                l.category.as_deref() == Some("SSC")
                    && l.featured
                    && application_status(l, now) == Some(ApplicationStatus::Open)
            })
            .collect();
        assert_eq!(page.total, expected.len());
        assert!(page.total > 0);
        for item in &page.items {
            assert!(matches(item, &spec, now));
        }
    }

    #[test]
    fn sort_is_newest_first_and_stable_on_ties() {
        let records = vec![
            exam("old", 100, "SSC"),
            exam("tie-a", 300, "SSC"),
            exam("new", 400, "SSC"),
            exam("tie-b", 300, "SSC"),
            exam("tie-c", 300, "SSC"),
        ];
        let page = apply(&records, &FilterSpec::default(), at(2025, 1, 1), 1, 20);
        assert_eq!(ids(&page.items), vec!["new", "tie-a", "tie-b", "tie-c", "old"]);
    }

    #[test]
    fn missing_timestamp_falls_back_to_record_date() {
        let mut dated = exam("dated", 0, "SSC");
        dated.date = Some("2025-06-01".into());
        let stamped = exam("stamped", start_of_day(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()).timestamp_millis(), "SSC");
        let undated = exam("undated", 0, "SSC");
        let mut records = vec![undated, stamped, dated];
        sort_newest_first(&mut records);
        assert_eq!(ids(&records), vec!["dated", "stamped", "undated"]);
    }

    #[test]
    fn pages_concatenate_to_the_full_result_once() {
        let records: Vec<Listing> = (0..23).map(|i| exam(&format!("r{i}"), (i % 7) as i64, "SSC")).collect();
        let spec = FilterSpec::default();
        let now = at(2025, 1, 1);
        let full = apply(&records, &spec, now, 1, 1000).items;
        let first = apply(&records, &spec, now, 1, 5);
        assert_eq!(first.total_pages, 5);

        let mut joined = Vec::new();
        for page in 1..=first.total_pages {
            joined.extend(apply(&records, &spec, now, page, 5).items);
        }
        assert_eq!(joined, full);
        assert!(apply(&records, &spec, now, first.total_pages + 1, 5).items.is_empty());
    }

    #[test]
    fn paging_defaults_and_clamps() {
        assert_eq!(normalize_paging(None, None), (1, DEFAULT_PER_PAGE));
        assert_eq!(normalize_paging(Some(0), Some(0)), (1, 1));
        assert_eq!(normalize_paging(Some(3), Some(5000)), (3, MAX_PER_PAGE));
    }

    #[test]
    fn flags_mark_recent_and_open_listings() {
        let now = at(2025, 1, 5);
        let mut listing = with_window(exam("e", now.timestamp_millis() - 1000, "SSC"), "2025-01-01", "2025-01-10");
        listing.featured = true;
        let flags = derive_flags(&listing, now, Duration::days(7));
        assert!(flags.is_open);
        assert!(flags.is_new_badge);
        assert!(flags.is_featured);
        assert_eq!(flags.days_left, Some(5));

        listing.added_timestamp = now.timestamp_millis() - Duration::days(30).num_milliseconds();
        let flags = derive_flags(&listing, now, Duration::days(7));
        assert!(!flags.is_new_badge);
    }

    #[test]
    fn facets_are_distinct_and_sorted() {
        let mut a = exam("a", 1, "SSC");
        a.location = Some("Delhi".into());
        let b = exam("b", 2, "Banking");
        let mut c = exam("c", 3, "SSC");
        c.organization = "IBPS".into();
        c.is_active = false;
        let facets = facets(&[a, b, c]);
        assert_eq!(facets.organizations, vec!["Commission"]);
        assert_eq!(facets.categories, vec!["Banking", "SSC"]);
        assert_eq!(facets.locations, vec!["Delhi"]);
    }
}
