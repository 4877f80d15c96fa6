//! Date parsing and printing for the command line

use chrono::{DateTime, NaiveDateTime};

/// Layout of `--start-time` and of printed dates, always UTC
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Printed in place of a date when the store is empty
pub const NO_DATE: &str = "no date";

/// Parse a UTC `YYYY-MM-DD HH:MM:SS` string into epoch milliseconds
pub fn parse_start_time(input: &str) -> Result<i64, chrono::ParseError> {
    let dt = NaiveDateTime::parse_from_str(input.trim(), DATE_FORMAT)?;
    Ok(dt.and_utc().timestamp_millis())
}

/// Format epoch milliseconds as a UTC date, or [`NO_DATE`] for zero
pub fn format_close_time(millis: i64) -> String {
    if millis == 0 {
        return NO_DATE.to_string();
    }
    match DateTime::from_timestamp_millis(millis) {
        Some(dt) => dt.format(DATE_FORMAT).to_string(),
        None => NO_DATE.to_string(),
    }
}
