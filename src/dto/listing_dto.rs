use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

use crate::error::{Error, Result};
use crate::models::listing::{
    Counters, DriveDetails, ExamDetails, JobDetails, Listing, ListingDetails, ListingKind,
};
use crate::services::filter_service::{derive_flags, FilterSpec, ListingFlags, StatusFilter};
use crate::services::listing_service::{ListRequest, ListingPage};
use crate::utils::token::generate_listing_id;
use crate::utils::validation::{clean_text, has_text};

/// Accepts `["a", "b"]`, `"a"` or `null` for list-valued form fields.
fn string_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(s)) => vec![s],
        Some(OneOrMany::Many(v)) => v,
    }
    .into_iter()
    .map(|s| s.trim().to_string())
    .filter(|s| !s.is_empty())
    .collect())
}

/// Vacancy counts arrive both as `"1,250"` and as `1250`.
fn text_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum TextOrNumber {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Option::<TextOrNumber>::deserialize(deserializer)? {
        None => None,
        Some(TextOrNumber::Text(s)) => Some(s),
        Some(TextOrNumber::Int(i)) => Some(i.to_string()),
        Some(TextOrNumber::Float(f)) => Some(f.to_string()),
    })
}

/// How a normalized record gets its id and creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdAssignment {
    /// New id, `addedTimestamp = now`, zeroed counters, active.
    Fresh,
    /// Keep the id, timestamp, counters and flags carried by the input
    /// when present (re-importing an export).
    KeepIncoming,
}

/// A listing as submitted by the admin form, bulk add or a JSON import,
/// before normalization. Field aliases cover the names used by the
/// portal's older export files.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ListingInput {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, alias = "name", alias = "examName", alias = "jobTitle")]
    #[validate(length(max = 300))]
    pub title: Option<String>,
    #[serde(
        default,
        alias = "company",
        alias = "companyName",
        alias = "conductingBody"
    )]
    #[validate(length(max = 300))]
    pub organization: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(
        default,
        alias = "examLevel",
        alias = "level",
        alias = "driveType",
        alias = "jobType"
    )]
    pub category: Option<String>,
    #[serde(default, alias = "startDate")]
    pub application_start_date: Option<String>,
    #[serde(default, alias = "endDate", alias = "lastDate")]
    pub application_end_date: Option<String>,
    #[serde(default, alias = "examDate", alias = "driveDate", alias = "postedDate")]
    pub date: Option<String>,
    #[serde(default)]
    pub added_timestamp: Option<i64>,
    #[serde(default)]
    pub featured: Option<bool>,
    #[serde(default)]
    pub is_new: Option<bool>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub views: Option<u64>,
    #[serde(default)]
    pub shares: Option<u64>,
    #[serde(default)]
    pub applications: Option<u64>,
    #[serde(default)]
    pub saves: Option<u64>,

    // jobs
    #[serde(default)]
    pub salary: Option<String>,
    #[serde(default)]
    pub experience: Option<String>,
    #[serde(default)]
    pub qualification: Option<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub skills: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub requirements: Vec<String>,
    #[serde(default, alias = "applicationLink")]
    #[validate(url)]
    pub apply_link: Option<String>,

    // drives
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub documents: Vec<String>,
    #[serde(default, alias = "contactInfo")]
    pub contact: Option<String>,

    // drives and exams
    #[serde(default, deserialize_with = "string_list")]
    pub posts: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub eligibility: Vec<String>,

    // exams
    #[serde(default, deserialize_with = "text_or_number", alias = "totalVacancies")]
    pub vacancies: Option<String>,
    #[serde(default)]
    pub application_fee: Option<String>,
    #[serde(default, alias = "website")]
    #[validate(url)]
    pub official_website: Option<String>,
    #[serde(default)]
    pub admit_card_date: Option<String>,
    #[serde(default)]
    pub result_date: Option<String>,

    /// Nested details as written by this service's own export.
    #[serde(default)]
    pub details: Option<ListingDetails>,
}

impl ListingInput {
    /// Required fields that are absent or blank, in a stable order.
    pub fn missing_required(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !has_text(&self.title) {
            missing.push("title");
        }
        if !has_text(&self.organization) {
            missing.push("organization");
        }
        if !has_text(&self.date)
            && !has_text(&self.application_start_date)
            && !has_text(&self.application_end_date)
        {
            missing.push("date");
        }
        missing
    }

    /// Rejects the input with the same messages the bulk paths report.
    pub fn check(&self) -> Result<()> {
        let missing = self.missing_required();
        if !missing.is_empty() {
            return Err(Error::BadRequest(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }
        self.validate()?;
        Ok(())
    }

    fn details_for(&mut self, kind: ListingKind) -> ListingDetails {
        if let Some(details) = self.details.take() {
            if details.kind() == kind {
                return details;
            }
        }
        match kind {
            ListingKind::Jobs => ListingDetails::Job(JobDetails {
                salary: clean_text(self.salary.take()),
                experience: clean_text(self.experience.take()),
                qualification: clean_text(self.qualification.take()),
                skills: std::mem::take(&mut self.skills),
                requirements: std::mem::take(&mut self.requirements),
                apply_link: clean_text(self.apply_link.take()),
            }),
            ListingKind::Drives => ListingDetails::Drive(DriveDetails {
                venue: clean_text(self.venue.take()),
                time: clean_text(self.time.take()),
                posts: std::mem::take(&mut self.posts),
                eligibility: std::mem::take(&mut self.eligibility),
                documents: std::mem::take(&mut self.documents),
                contact: clean_text(self.contact.take()),
            }),
            ListingKind::Exams => ListingDetails::Exam(ExamDetails {
                posts: std::mem::take(&mut self.posts),
                vacancies: clean_text(self.vacancies.take()),
                eligibility: std::mem::take(&mut self.eligibility),
                application_fee: clean_text(self.application_fee.take()),
                official_website: clean_text(self.official_website.take()),
                admit_card_date: clean_text(self.admit_card_date.take()),
                result_date: clean_text(self.result_date.take()),
            }),
        }
    }

    /// Produces the canonical stored form. Callers must have run `check`.
    pub fn into_listing(mut self, kind: ListingKind, ids: IdAssignment, now_millis: i64) -> Listing {
        let details = self.details_for(kind);
        let fresh_id = || generate_listing_id(kind.id_prefix(), now_millis);
        let (id, added_timestamp, counters, is_active) = match ids {
            IdAssignment::Fresh => (fresh_id(), now_millis, Counters::default(), true),
            IdAssignment::KeepIncoming => (
                clean_text(self.id.take()).unwrap_or_else(fresh_id),
                self.added_timestamp.filter(|ts| *ts > 0).unwrap_or(now_millis),
                Counters {
                    views: self.views.unwrap_or(0),
                    shares: self.shares.unwrap_or(0),
                    applications: self.applications.unwrap_or(0),
                    saves: self.saves.unwrap_or(0),
                },
                self.is_active.unwrap_or(true),
            ),
        };

        Listing {
            id,
            kind,
            title: self.title.unwrap_or_default().trim().to_string(),
            organization: self.organization.unwrap_or_default().trim().to_string(),
            description: clean_text(self.description),
            location: clean_text(self.location),
            category: clean_text(self.category),
            application_start_date: clean_text(self.application_start_date),
            application_end_date: clean_text(self.application_end_date),
            date: clean_text(self.date),
            added_timestamp,
            updated_at: None,
            featured: self.featured.unwrap_or(false),
            is_new: self.is_new.unwrap_or(false),
            is_active,
            counters,
            details,
        }
    }
}

/// Partial update. Absent fields are left alone; an empty string clears an
/// optional text field.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateListingPayload {
    #[validate(length(min = 1, max = 300))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 300))]
    pub organization: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub category: Option<String>,
    pub application_start_date: Option<String>,
    pub application_end_date: Option<String>,
    pub date: Option<String>,
    pub featured: Option<bool>,
    pub is_new: Option<bool>,
    pub is_active: Option<bool>,
    pub details: Option<ListingDetails>,
}

impl UpdateListingPayload {
    pub fn apply_to(self, listing: &mut Listing, now_millis: i64) -> Result<()> {
        if let Some(title) = self.title {
            let title = title.trim();
            if title.is_empty() {
                return Err(Error::BadRequest("title must not be blank".to_string()));
            }
            listing.title = title.to_string();
        }
        if let Some(organization) = self.organization {
            let organization = organization.trim();
            if organization.is_empty() {
                return Err(Error::BadRequest("organization must not be blank".to_string()));
            }
            listing.organization = organization.to_string();
        }
        if let Some(details) = self.details {
            if details.kind() != listing.kind {
                return Err(Error::BadRequest(format!(
                    "details of type '{}' do not fit a listing in '{}'",
                    details.kind(),
                    listing.kind
                )));
            }
            listing.details = details;
        }

        let patch_text = |slot: &mut Option<String>, value: Option<String>| {
            if let Some(value) = value {
                *slot = clean_text(Some(value));
            }
        };
        patch_text(&mut listing.description, self.description);
        patch_text(&mut listing.location, self.location);
        patch_text(&mut listing.category, self.category);
        patch_text(&mut listing.application_start_date, self.application_start_date);
        patch_text(&mut listing.application_end_date, self.application_end_date);
        patch_text(&mut listing.date, self.date);

        if let Some(featured) = self.featured {
            listing.featured = featured;
        }
        if let Some(is_new) = self.is_new {
            listing.is_new = is_new;
        }
        if let Some(is_active) = self.is_active {
            listing.is_active = is_active;
        }
        listing.updated_at = Some(now_millis);
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct ListingListQuery {
    pub page: Option<usize>,
    pub per_page: Option<usize>,
    pub organization: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub search: Option<String>,
    pub status: Option<StatusFilter>,
    pub featured: Option<bool>,
    pub is_new: Option<bool>,
    pub retry: Option<bool>,
}

impl ListingListQuery {
    pub fn filter_spec(&self) -> FilterSpec {
        FilterSpec {
            organization: self.organization.clone(),
            category: self.category.clone(),
            location: self.location.clone(),
            search: self.search.clone(),
            status: self.status.unwrap_or_default(),
            featured_only: self.featured.unwrap_or(false),
            new_only: self.is_new.unwrap_or(false),
        }
    }

    pub fn into_request(self) -> ListRequest {
        ListRequest {
            filter: self.filter_spec(),
            page: self.page,
            per_page: self.per_page,
            retry: self.retry.unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingResponse {
    #[serde(flatten)]
    pub listing: Listing,
    #[serde(flatten)]
    pub flags: ListingFlags,
}

impl ListingResponse {
    pub fn new(listing: Listing, now: DateTime<Utc>, new_badge_window: Duration) -> Self {
        let flags = derive_flags(&listing, now, new_badge_window);
        Self { listing, flags }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingListResponse {
    pub items: Vec<ListingResponse>,
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
    pub total_pages: usize,
    /// Set when the remote store was unreachable and a cached snapshot
    /// was served instead.
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached_at: Option<i64>,
}

impl ListingListResponse {
    pub fn from_page(page: ListingPage, now: DateTime<Utc>, new_badge_window: Duration) -> Self {
        Self {
            items: page
                .items
                .into_iter()
                .map(|l| ListingResponse::new(l, now, new_badge_window))
                .collect(),
            total: page.total,
            page: page.page,
            per_page: page.per_page,
            total_pages: page.total_pages,
            cached: page.cached,
            cached_at: page.cached_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn input(value: serde_json::Value) -> ListingInput {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn job_with_only_a_last_date_closes_after_it() {
        use crate::services::filter_service::{application_status, ApplicationStatus};
        use chrono::{TimeZone, Utc};

        let parsed = input(json!({ "title": "SDE", "company": "TCS", "lastDate": "2025-01-10" }));
        assert!(parsed.check().is_ok());
        let listing = parsed.into_listing(ListingKind::Jobs, IdAssignment::Fresh, 1000);
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(application_status(&listing, now), Some(ApplicationStatus::Closed));
    }

    #[test]
    fn aliases_and_single_strings_are_accepted() {
        let parsed = input(json!({
            "name": "UPSC Civil Services",
            "conductingBody": "UPSC",
            "examLevel": "UPSC",
            "lastDate": "2025-03-01",
            "eligibility": "Graduate",
            "totalVacancies": 1056
        }));
        assert!(parsed.missing_required().is_empty());
        let listing = parsed.into_listing(ListingKind::Exams, IdAssignment::Fresh, 1000);
        assert_eq!(listing.title, "UPSC Civil Services");
        assert_eq!(listing.organization, "UPSC");
        assert_eq!(listing.category.as_deref(), Some("UPSC"));
        match listing.details {
            ListingDetails::Exam(exam) => {
                assert_eq!(exam.eligibility, vec!["Graduate"]);
                assert_eq!(exam.vacancies.as_deref(), Some("1056"));
            }
            other => panic!("unexpected details {other:?}"),
        }
        assert!(listing.id.starts_with("exam_1000_"));
        assert_eq!(listing.added_timestamp, 1000);
        assert!(listing.is_active);
    }

    #[test]
    fn blank_required_fields_are_reported() {
        let parsed = input(json!({ "title": "  ", "company": "Wipro" }));
        assert_eq!(parsed.missing_required(), vec!["title", "date"]);
        assert!(matches!(parsed.check(), Err(Error::BadRequest(msg)) if msg == "Missing required fields: title, date"));
    }

    #[test]
    fn invalid_links_fail_validation() {
        let parsed = input(json!({
            "title": "Backend Engineer",
            "company": "Zoho",
            "postedDate": "2025-01-01",
            "applyLink": "not a url"
        }));
        assert!(matches!(parsed.check(), Err(Error::Validation(_))));
    }

    #[test]
    fn keep_incoming_preserves_identity_and_counters() {
        let parsed = input(json!({
            "id": "exam_1_abc",
            "title": "SSC GD",
            "organization": "SSC",
            "date": "2025-05-01",
            "addedTimestamp": 42,
            "views": 9,
            "isActive": false
        }));
        let listing = parsed.into_listing(ListingKind::Exams, IdAssignment::KeepIncoming, 1000);
        assert_eq!(listing.id, "exam_1_abc");
        assert_eq!(listing.added_timestamp, 42);
        assert_eq!(listing.counters.views, 9);
        assert!(!listing.is_active);
    }

    #[test]
    fn fresh_assignment_ignores_incoming_identity() {
        let parsed = input(json!({
            "id": "job_1_abc",
            "title": "Data Analyst",
            "organization": "Flipkart",
            "date": "2025-05-01",
            "addedTimestamp": 42,
            "views": 9,
            "isActive": false
        }));
        let listing = parsed.into_listing(ListingKind::Jobs, IdAssignment::Fresh, 1000);
        assert_ne!(listing.id, "job_1_abc");
        assert_eq!(listing.added_timestamp, 1000);
        assert_eq!(listing.counters, Counters::default());
        assert!(listing.is_active);
    }

    #[test]
    fn update_touches_timestamp_and_rejects_blank_title() {
        let mut listing = input(json!({
            "title": "Walk-in",
            "organization": "HCL",
            "date": "2025-01-01",
            "venue": "Noida"
        }))
        .into_listing(ListingKind::Drives, IdAssignment::Fresh, 5);

        let patch = UpdateListingPayload {
            location: Some("Noida".into()),
            description: Some("".into()),
            featured: Some(true),
            ..UpdateListingPayload::default()
        };
        patch.apply_to(&mut listing, 99).unwrap();
        assert_eq!(listing.location.as_deref(), Some("Noida"));
        assert_eq!(listing.description, None);
        assert!(listing.featured);
        assert_eq!(listing.updated_at, Some(99));
        assert_eq!(listing.added_timestamp, 5);

        let blank = UpdateListingPayload {
            title: Some("   ".into()),
            ..UpdateListingPayload::default()
        };
        assert!(blank.apply_to(&mut listing, 100).is_err());

        let wrong_details = UpdateListingPayload {
            details: Some(ListingDetails::empty_for(ListingKind::Exams)),
            ..UpdateListingPayload::default()
        };
        assert!(wrong_details.apply_to(&mut listing, 100).is_err());
    }
}
