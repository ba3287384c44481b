use chrono::{Datelike, Months, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

use super::gateway::BillingError;

// key: billing-dates -> DD/MM/YYYY on the wire

static BRAZILIAN_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{2})/(\d{2})/(\d{4})$").expect("brazilian date pattern is valid")
});

static ISO_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4})-(\d{2})-(\d{2})(?: .*)?$").expect("iso date pattern is valid")
});

/// Parses `DD/MM/YYYY` or `YYYY-MM-DD[ <time>]` into a calendar day.
///
/// Any time-of-day suffix on the ISO shape is discarded.
pub fn parse_date(raw: &str) -> Result<NaiveDate, BillingError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(BillingError::EmptyDate);
    }

    let invalid = || BillingError::InvalidDateFormat(raw.to_string());
    let (year, month, day) = if let Some(caps) = BRAZILIAN_DATE.captures(trimmed) {
        (caps[3].parse::<i32>(), caps[2].parse::<u32>(), caps[1].parse::<u32>())
    } else if let Some(caps) = ISO_DATE.captures(trimmed) {
        (caps[1].parse::<i32>(), caps[2].parse::<u32>(), caps[3].parse::<u32>())
    } else {
        return Err(invalid());
    };

    match (year, month, day) {
        (Ok(year), Ok(month), Ok(day)) => {
            NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)
        }
        _ => Err(invalid()),
    }
}

/// Formats a day as `DD/MM/YYYY`, zero-padding day and month.
pub fn format_date(date: NaiveDate) -> String {
    format!("{:02}/{:02}/{:04}", date.day(), date.month(), date.year())
}

pub fn normalize_date(raw: &str) -> Result<String, BillingError> {
    parse_date(raw).map(format_date)
}

pub fn end_of_month(date: NaiveDate) -> NaiveDate {
    let first = NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date);
    first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(date)
}

pub fn same_month(left: NaiveDate, right: NaiveDate) -> bool {
    left.year() == right.year() && left.month() == right.month()
}
