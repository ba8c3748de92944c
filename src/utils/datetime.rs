//! Date and time utility functions
//!
//! Conversions between instants and the provider's `{dateTime, timeZone}`
//! pairs. Requests ask for UTC, so most values arrive as `UTC`; fixed offsets
//! are honoured and unknown zone names fall back to UTC.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use log::debug;

/// Wall-clock format sent to the provider, without the fraction.
pub const GRAPH_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Parse the wall-clock part of a provider date time.
///
/// Accepts up to nine fractional digits and an optional trailing `Z`.
pub fn parse_wall_clock(date_time: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    let trimmed = date_time.trim().trim_end_matches('Z');
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
}

/// Parse a zone designator such as `UTC`, `+02:00` or `UTC-05:00`.
pub fn parse_zone_offset(time_zone: &str) -> Option<FixedOffset> {
    let zone = time_zone.trim();
    if zone.is_empty() || zone.eq_ignore_ascii_case("utc") || zone == "Z" {
        return FixedOffset::east_opt(0);
    }

    let offset = zone
        .strip_prefix("UTC")
        .or_else(|| zone.strip_prefix("GMT"))
        .unwrap_or(zone);
    let (sign, rest) = match offset.as_bytes().first()? {
        b'+' => (1, &offset[1..]),
        b'-' => (-1, &offset[1..]),
        _ => return None,
    };
    let (hours, minutes) = rest.split_once(':').unwrap_or((rest, "0"));
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if !(0..=23).contains(&hours) || !(0..=59).contains(&minutes) {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Interpret a `{dateTime, timeZone}` pair as an instant.
pub fn zoned_to_utc(date_time: &str, time_zone: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    let naive = parse_wall_clock(date_time)?;
    let Some(offset) = parse_zone_offset(time_zone) else {
        debug!("Unknown time zone {time_zone:?}, reading {date_time} as UTC");
        return Ok(Utc.from_utc_datetime(&naive));
    };

    Ok(match offset.from_local_datetime(&naive).single() {
        Some(local) => local.with_timezone(&Utc),
        None => Utc.from_utc_datetime(&naive),
    })
}

/// Format an instant as a UTC wall-clock string for the provider, with the
/// seven fractional digits the provider itself emits.
pub fn format_graph_datetime(instant: DateTime<Utc>) -> String {
    format!(
        "{}.{:07}",
        instant.format(GRAPH_DATETIME_FORMAT),
        instant.timestamp_subsec_nanos() / 100
    )
}
