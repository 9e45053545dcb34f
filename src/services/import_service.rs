//! Parsing and normalization for bulk input: admin "bulk add" arrays and
//! JSON import files. Nothing here touches a store; the listing and local
//! collection services decide what gets written.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::dto::listing_dto::{IdAssignment, ListingInput};
use crate::error::{Error, Result};
use crate::models::listing::{Listing, ListingKind};
use crate::utils::token::generate_listing_id;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    /// Append records that do not match an existing one.
    #[default]
    Merge,
    /// Discard the existing collection and keep the incoming set.
    Replace,
}

/// Extracts the record array from an import document.
///
/// Accepts a bare array, or an object carrying the records under the kind
/// name (`{"metadata": {...}, "drives": [...]}`) or under `records`.
pub fn parse_document(kind: ListingKind, raw: &str) -> Result<Vec<JsonValue>> {
    let value: JsonValue = serde_json::from_str(raw)
        .map_err(|e| Error::BadRequest(format!("Invalid JSON: {}", e)))?;

    match value {
        JsonValue::Array(records) => Ok(records),
        JsonValue::Object(mut body) => {
            let records = body
                .remove(kind.as_str())
                .or_else(|| body.remove("records"))
                .ok_or_else(|| {
                    Error::BadRequest(format!(
                        "Import file must be an array or contain a '{}' array",
                        kind
                    ))
                })?;
            match records {
                JsonValue::Array(records) => Ok(records),
                _ => Err(Error::BadRequest(format!("'{}' must be an array", kind))),
            }
        }
        _ => Err(Error::BadRequest(
            "Import file must be a JSON array or object".to_string(),
        )),
    }
}

/// Validates and normalizes one raw record. `position` is 1-based and only
/// used to label the error.
pub fn normalize_record(
    kind: ListingKind,
    position: usize,
    raw: JsonValue,
    ids: IdAssignment,
    now_millis: i64,
) -> std::result::Result<Listing, String> {
    let label = format!("{} {}", kind.record_label(), position);
    if !raw.is_object() {
        return Err(format!("{}: Record must be a JSON object", label));
    }
    let input: ListingInput =
        serde_json::from_value(raw).map_err(|e| format!("{}: {}", label, e))?;
    input.check().map_err(|e| match e {
        Error::BadRequest(msg) => format!("{}: {}", label, msg),
        other => format!("{}: {}", label, other),
    })?;
    Ok(input.into_listing(kind, ids, now_millis))
}

#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    pub valid: Vec<Listing>,
    pub errors: Vec<String>,
}

pub fn normalize_batch(
    kind: ListingKind,
    records: Vec<JsonValue>,
    ids: IdAssignment,
    now_millis: i64,
) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();
    for (i, raw) in records.into_iter().enumerate() {
        match normalize_record(kind, i + 1, raw, ids, now_millis) {
            Ok(listing) => batch.valid.push(listing),
            Err(err) => batch.errors.push(err),
        }
    }
    batch
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkCreateReport {
    pub success_count: usize,
    pub failed_count: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub mode: ImportMode,
    pub imported: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Existing records dropped by a replace import.
    pub replaced: u64,
    pub errors: Vec<String>,
}

/// Identity used by merge imports besides the id itself.
fn dedup_key(listing: &Listing) -> (String, String, String) {
    (
        listing.title.clone(),
        listing.organization.clone(),
        listing.primary_date().unwrap_or_default().to_string(),
    )
}

/// Splits the incoming set into records to append and the number skipped.
/// A record is skipped when its id or `(title, organization, date)` matches
/// an existing record or an earlier incoming one. Existing records win.
pub fn plan_merge(existing: &[Listing], incoming: Vec<Listing>) -> (Vec<Listing>, usize) {
    let mut ids: HashSet<String> = existing.iter().map(|l| l.id.clone()).collect();
    let mut keys: HashSet<(String, String, String)> = existing.iter().map(dedup_key).collect();

    let mut accepted = Vec::new();
    let mut skipped = 0;
    for listing in incoming {
        let key = dedup_key(&listing);
        if ids.contains(&listing.id) || keys.contains(&key) {
            skipped += 1;
            continue;
        }
        ids.insert(listing.id.clone());
        keys.insert(key);
        accepted.push(listing);
    }
    (accepted, skipped)
}

/// Prepares a replace import. Incoming ids that collide with each other or
/// with `reserved` (ids that must stay unique, e.g. deactivated remote
/// records) are regenerated.
pub fn plan_replace(
    kind: ListingKind,
    reserved: &[Listing],
    incoming: Vec<Listing>,
    now_millis: i64,
) -> Vec<Listing> {
    let mut taken: HashSet<String> = reserved.iter().map(|l| l.id.clone()).collect();
    incoming
        .into_iter()
        .map(|mut listing| {
            while taken.contains(&listing.id) {
                listing.id = generate_listing_id(kind.id_prefix(), now_millis);
            }
            taken.insert(listing.id.clone());
            listing
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn job(title: &str, org: &str, date: &str) -> JsonValue {
        json!({ "title": title, "company": org, "postedDate": date })
    }

    #[test]
    fn bare_arrays_and_wrapped_documents_parse() {
        let bare = parse_document(ListingKind::Drives, r#"[{"title":"a"}]"#).unwrap();
        assert_eq!(bare.len(), 1);

        let wrapped = parse_document(
            ListingKind::Drives,
            r#"{"metadata":{"version":1},"drives":[{"title":"a"},{"title":"b"}]}"#,
        )
        .unwrap();
        assert_eq!(wrapped.len(), 2);

        assert!(parse_document(ListingKind::Exams, r#"{"drives":[]}"#).is_err());
        assert!(parse_document(ListingKind::Exams, r#"{"exams": {}}"#).is_err());
        assert!(parse_document(ListingKind::Exams, "42").is_err());
    }

    #[test]
    fn invalid_json_is_rejected_as_bad_request() {
        let err = parse_document(ListingKind::Jobs, "[{\"title\": ").unwrap_err();
        assert!(matches!(err, Error::BadRequest(msg) if msg.starts_with("Invalid JSON")));
    }

    #[test]
    fn one_bad_record_in_two_is_reported_by_position() {
        let records = vec![
            job("Backend Engineer", "Infosys", "2025-01-02"),
            json!({ "company": "TCS", "postedDate": "2025-01-03" }),
        ];
        let batch = normalize_batch(ListingKind::Jobs, records, IdAssignment::Fresh, 1);
        assert_eq!(batch.valid.len(), 1);
        assert_eq!(batch.errors, vec!["Job 2: Missing required fields: title"]);
    }

    #[test]
    fn non_object_records_fail_individually() {
        let batch = normalize_batch(
            ListingKind::Exams,
            vec![json!("oops"), json!({ "name": "SSC CGL", "conductingBody": "SSC", "examDate": "2025-07-01" })],
            IdAssignment::Fresh,
            1,
        );
        assert_eq!(batch.valid.len(), 1);
        assert_eq!(batch.errors, vec!["Exam 1: Record must be a JSON object"]);
    }

    fn normalized(records: Vec<JsonValue>) -> Vec<Listing> {
        normalize_batch(ListingKind::Jobs, records, IdAssignment::Fresh, 1).valid
    }

    #[test]
    fn merge_skips_triple_matches_and_incoming_duplicates() {
        let existing = normalized(vec![job("SDE", "Amazon", "2025-01-01")]);
        let incoming = normalized(vec![
            job("SDE", "Amazon", "2025-01-01"),
            job("SDE", "Amazon", "2025-02-01"),
            job("SDE", "Amazon", "2025-02-01"),
        ]);
        let (accepted, skipped) = plan_merge(&existing, incoming);
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].date.as_deref(), Some("2025-02-01"));
        assert_eq!(skipped, 2);
    }

    #[test]
    fn merge_skips_id_matches() {
        let existing = normalized(vec![job("SDE", "Amazon", "2025-01-01")]);
        let mut same_id = normalized(vec![job("Different", "Other", "2025-03-01")]);
        same_id[0].id = existing[0].id.clone();
        let (accepted, skipped) = plan_merge(&existing, same_id);
        assert!(accepted.is_empty());
        assert_eq!(skipped, 1);
    }

    #[test]
    fn replace_regenerates_colliding_ids() {
        let reserved = normalized(vec![job("Old", "Acme", "2024-01-01")]);
        let mut incoming = normalized(vec![
            job("New", "Acme", "2025-01-01"),
            job("Newer", "Acme", "2025-01-02"),
        ]);
        incoming[0].id = reserved[0].id.clone();
        incoming[1].id = reserved[0].id.clone();

        let planned = plan_replace(ListingKind::Jobs, &reserved, incoming, 7);
        assert_eq!(planned.len(), 2);
        assert_ne!(planned[0].id, reserved[0].id);
        assert_ne!(planned[1].id, reserved[0].id);
        assert_ne!(planned[0].id, planned[1].id);
    }
}
