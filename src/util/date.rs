use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

/// Naive layouts tried after RFC 2822 / RFC 3339 fail. Interpreted as UTC.
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

/// Offset-carrying layouts that neither RFC parser accepts.
const OFFSET_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f %z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%a, %d %b %Y %H:%M:%S%.f %z",
    "%a %b %d %Y %H:%M:%S GMT%z",
];

/// Parses a feed timestamp in any of the layouts seen in the wild.
///
/// RFC 2822 (RSS `pubDate`) and RFC 3339 (Atom `published`/`updated`) cover
/// almost everything; the remaining formats catch common publisher mistakes.
pub fn parse_feed_date(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Some(dt) = parse_lenient_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in OFFSET_DATETIME_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }

    None
}

/// RFC 2822 as publishers actually write it: the weekday is dropped (it is
/// often wrong for the date) and `UTC`/`UT`/`Z` zone names read as `+0000`.
fn parse_lenient_rfc2822(s: &str) -> Option<DateTime<FixedOffset>> {
    let body = match s.split_once(',') {
        Some((day, rest))
            if !day.trim().is_empty() && day.trim().chars().all(|c| c.is_ascii_alphabetic()) =>
        {
            rest.trim_start()
        }
        _ => s,
    };

    let utc_zone = ["UTC", "UT", "Z"].iter().find_map(|zone| {
        body.strip_suffix(zone)
            .filter(|head| head.ends_with(' '))
            .map(|head| format!("{head}+0000"))
    });

    DateTime::parse_from_rfc2822(utc_zone.as_deref().unwrap_or(body)).ok()
}

/// Renders a feed timestamp as `YYYY-MM-DDTHH:MM:SS.sssZ` (UTC, millisecond
/// precision). Unparseable input is returned unchanged so the caller never
/// loses the publisher's value.
pub fn normalize_date(raw: &str) -> String {
    match parse_feed_date(raw) {
        Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Millis, true),
        None => {
            tracing::debug!(date = %raw, "Unparseable feed date, passing through");
            raw.to_string()
        }
    }
}
