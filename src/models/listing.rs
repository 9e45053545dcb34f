use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The three listing collections the portal publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingKind {
    Jobs,
    Drives,
    Exams,
}

impl ListingKind {
    pub const ALL: [ListingKind; 3] = [ListingKind::Jobs, ListingKind::Drives, ListingKind::Exams];

    pub fn as_str(&self) -> &'static str {
        match self {
            ListingKind::Jobs => "jobs",
            ListingKind::Drives => "drives",
            ListingKind::Exams => "exams",
        }
    }

    pub fn id_prefix(&self) -> &'static str {
        match self {
            ListingKind::Jobs => "job",
            ListingKind::Drives => "drive",
            ListingKind::Exams => "exam",
        }
    }

    /// Label used in per-record import errors ("Job 2: ...").
    pub fn record_label(&self) -> &'static str {
        match self {
            ListingKind::Jobs => "Job",
            ListingKind::Drives => "Drive",
            ListingKind::Exams => "Exam",
        }
    }

    /// Recovers the kind from a generated id such as `drive_1736_x9k2`.
    pub fn from_id(id: &str) -> Option<Self> {
        let (prefix, _) = id.split_once('_')?;
        ListingKind::ALL
            .into_iter()
            .find(|kind| kind.id_prefix() == prefix)
    }

    pub fn index(&self) -> usize {
        match self {
            ListingKind::Jobs => 0,
            ListingKind::Drives => 1,
            ListingKind::Exams => 2,
        }
    }
}

impl fmt::Display for ListingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ListingKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jobs" | "job" => Ok(ListingKind::Jobs),
            "drives" | "drive" | "job-drives" | "jobdrives" => Ok(ListingKind::Drives),
            "exams" | "exam" | "gov-exams" | "govexams" => Ok(ListingKind::Exams),
            other => Err(format!("unknown listing kind '{}'", other)),
        }
    }
}

/// Interaction counters. Only ever incremented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Counter {
    Views,
    Shares,
    Applications,
    Saves,
}

impl Counter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Counter::Views => "views",
            Counter::Shares => "shares",
            Counter::Applications => "applications",
            Counter::Saves => "saves",
        }
    }

    /// Maps the public interaction route segment to its counter.
    pub fn from_action(action: &str) -> Option<Self> {
        match action {
            "share" => Some(Counter::Shares),
            "apply" => Some(Counter::Applications),
            "save" => Some(Counter::Saves),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub shares: u64,
    #[serde(default)]
    pub applications: u64,
    #[serde(default)]
    pub saves: u64,
}

impl Counters {
    pub fn bump(&mut self, counter: Counter) {
        let slot = match counter {
            Counter::Views => &mut self.views,
            Counter::Shares => &mut self.shares,
            Counter::Applications => &mut self.applications,
            Counter::Saves => &mut self.saves,
        };
        *slot = slot.saturating_add(1);
    }

    pub fn get(&self, counter: Counter) -> u64 {
        match counter {
            Counter::Views => self.views,
            Counter::Shares => self.shares,
            Counter::Applications => self.applications,
            Counter::Saves => self.saves,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualification: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skills: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requirements: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apply_link: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub posts: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub eligibility: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub documents: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamDetails {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub posts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vacancies: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub eligibility: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_fee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub official_website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admit_card_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_date: Option<String>,
}

/// Kind-specific fields, tagged so a stored document always says which
/// shape it carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ListingDetails {
    Job(JobDetails),
    Drive(DriveDetails),
    Exam(ExamDetails),
}

impl ListingDetails {
    pub fn empty_for(kind: ListingKind) -> Self {
        match kind {
            ListingKind::Jobs => ListingDetails::Job(JobDetails::default()),
            ListingKind::Drives => ListingDetails::Drive(DriveDetails::default()),
            ListingKind::Exams => ListingDetails::Exam(ExamDetails::default()),
        }
    }

    pub fn kind(&self) -> ListingKind {
        match self {
            ListingDetails::Job(_) => ListingKind::Jobs,
            ListingDetails::Drive(_) => ListingKind::Drives,
            ListingDetails::Exam(_) => ListingKind::Exams,
        }
    }

    pub fn posts(&self) -> &[String] {
        match self {
            ListingDetails::Job(_) => &[],
            ListingDetails::Drive(d) => &d.posts,
            ListingDetails::Exam(e) => &e.posts,
        }
    }
}

fn default_true() -> bool {
    true
}

/// A job, walk-in drive or government exam notice, as persisted.
///
/// Dates are kept as the raw strings the operator entered; they are parsed
/// on read so a malformed value only affects date-dependent filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: String,
    pub kind: ListingKind,
    pub title: String,
    pub organization: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default)]
    pub added_timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub is_new: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(flatten)]
    pub counters: Counters,
    pub details: ListingDetails,
}

impl Listing {
    /// The date used to recognise the same notice across imports: the
    /// event date when present, otherwise the application window.
    pub fn primary_date(&self) -> Option<&str> {
        self.date
            .as_deref()
            .or(self.application_start_date.as_deref())
            .or(self.application_end_date.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn listing_uses_camel_case_wire_names() {
        let listing = Listing {
            id: "exam_1_abc".into(),
            kind: ListingKind::Exams,
            title: "SSC CGL 2025".into(),
            organization: "Staff Selection Commission".into(),
            description: None,
            location: None,
            category: Some("SSC".into()),
            application_start_date: Some("2025-01-01".into()),
            application_end_date: Some("2025-01-10".into()),
            date: None,
            added_timestamp: 100,
            updated_at: None,
            featured: true,
            is_new: false,
            is_active: true,
            counters: Counters { views: 3, ..Counters::default() },
            details: ListingDetails::empty_for(ListingKind::Exams),
        };
        let value = serde_json::to_value(&listing).unwrap();
        assert_eq!(value["addedTimestamp"], json!(100));
        assert_eq!(value["isActive"], json!(true));
        assert_eq!(value["applicationEndDate"], json!("2025-01-10"));
        assert_eq!(value["views"], json!(3));
        assert_eq!(value["details"]["type"], json!("exam"));
        assert!(value.get("description").is_none());
    }

    #[test]
    fn missing_flags_take_defaults() {
        let listing: Listing = serde_json::from_value(json!({
            "id": "drive_1_x",
            "kind": "drives",
            "title": "Walk-in for freshers",
            "organization": "Infosys",
            "details": { "type": "drive", "venue": "Pune" }
        }))
        .unwrap();
        assert!(listing.is_active);
        assert!(!listing.featured);
        assert_eq!(listing.counters, Counters::default());
        assert_eq!(listing.details.kind(), ListingKind::Drives);
    }

    #[test]
    fn counters_saturate() {
        let mut counters = Counters { saves: u64::MAX, ..Counters::default() };
        counters.bump(Counter::Saves);
        counters.bump(Counter::Views);
        assert_eq!(counters.get(Counter::Saves), u64::MAX);
        assert_eq!(counters.get(Counter::Views), 1);
    }

    #[test]
    fn kind_parses_route_aliases() {
        assert_eq!("job-drives".parse::<ListingKind>(), Ok(ListingKind::Drives));
        assert_eq!("Exam".parse::<ListingKind>(), Ok(ListingKind::Exams));
        assert!("blog".parse::<ListingKind>().is_err());
        assert_eq!(Counter::from_action("apply"), Some(Counter::Applications));
        assert_eq!(Counter::from_action("view"), None);
    }

    #[test]
    fn kind_is_recovered_from_generated_ids() {
        assert_eq!(ListingKind::from_id("drive_1736_abc"), Some(ListingKind::Drives));
        assert_eq!(ListingKind::from_id("exam_1_x"), Some(ListingKind::Exams));
        assert_eq!(ListingKind::from_id("e1"), None);
        assert_eq!(ListingKind::from_id("blog_1_x"), None);
    }
}
