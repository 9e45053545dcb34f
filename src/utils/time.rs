use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

pub fn to_rfc3339(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

pub fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

/// Parses the date strings operators type into listing forms. Accepts
/// plain ISO dates, full RFC 3339 timestamps and the day-first formats
/// common in Indian notices. Anything else yields `None`.
pub fn parse_listing_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc).date_naive());
    }
    ["%d-%m-%Y", "%d/%m/%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

pub fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    // 23:59:59.999 is always representable
    let time = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);
    Utc.from_utc_datetime(&date.and_time(time))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 1, 5).unwrap();
        assert_eq!(parse_listing_date("2025-01-05"), Some(expected));
        assert_eq!(parse_listing_date("2025-01-05T10:30:00Z"), Some(expected));
        assert_eq!(parse_listing_date("05-01-2025"), Some(expected));
        assert_eq!(parse_listing_date("05/01/2025"), Some(expected));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_listing_date(""), None);
        assert_eq!(parse_listing_date("soon"), None);
        assert_eq!(parse_listing_date("2025-13-40"), None);
    }

    #[test]
    fn day_bounds_cover_the_whole_day() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
        let span = end_of_day(date) - start_of_day(date);
        assert_eq!(span, chrono::Duration::days(1) - chrono::Duration::milliseconds(1));
    }
}
