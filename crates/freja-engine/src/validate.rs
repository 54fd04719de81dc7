// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Deterministic answer validation.
//!
//! Only dates and datetimes have a checkable format; they are validated
//! before storage so users get an immediate re-ask instead of bad data in
//! the final payload.  Every other type is accepted raw here — whether a
//! text answer actually answers the question is judged by the model.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::action::AskKind;

/// Date formats accepted by the lenient parser, month-first for slashed
/// numeric forms.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%m-%d-%Y",
    "%m/%d/%y",
    "%d.%m.%Y",
    "%B %d, %Y",
    "%B %d %Y",
    "%b %d, %Y",
    "%b %d %Y",
    "%d %B %Y",
    "%d %b %Y",
    "%d %B, %Y",
];

/// Time formats combined with each date format for datetime parsing.
const TIME_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M", "%I:%M %p", "%I:%M%p", "%I %p", "%I%p"];

/// Parse a date string under the lenient multi-format table.
pub fn parse_lenient_date(value: &str) -> Option<NaiveDate> {
    let cleaned = clean(value);
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(&cleaned, format) {
            return Some(date);
        }
    }
    // A full datetime contains a valid date.
    parse_lenient_datetime(value).map(|dt| dt.date())
}

/// Parse a datetime string under the lenient multi-format table.
///
/// A bare date is accepted at midnight, matching how people answer
/// "when?" questions with just a day.
pub fn parse_lenient_datetime(value: &str) -> Option<NaiveDateTime> {
    let cleaned = clean(value);

    if let Ok(dt) = NaiveDateTime::parse_from_str(&cleaned, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt);
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(&cleaned) {
        return Some(dt.naive_local());
    }
    for date_format in DATE_FORMATS {
        for time_format in TIME_FORMATS {
            let format = format!("{date_format} {time_format}");
            if let Ok(dt) = NaiveDateTime::parse_from_str(&cleaned, &format) {
                return Some(dt);
            }
        }
        if let Ok(date) = NaiveDate::parse_from_str(&cleaned, date_format) {
            return Some(date.and_time(NaiveTime::MIN));
        }
    }
    None
}

/// Collapse runs of whitespace so "Jan  5,  2026" still parses.
fn clean(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Validate that a string is a recognizable date.
///
/// Returns the human reason on failure; it is interpolated into the
/// re-ask directive for the model.
pub fn validate_date_answer(value: &str) -> Result<(), String> {
    let stripped = value.trim();
    if stripped.is_empty() {
        return Err("Date cannot be empty.".into());
    }
    // Purely alphabetic strings are clearly not dates (e.g. "sdasdsdad").
    if !stripped.chars().any(|c| c.is_ascii_digit()) {
        return Err(format!(
            "'{stripped}' is not a valid date. \
             Please provide a date like 2026-01-15 or January 15, 2026."
        ));
    }
    if parse_lenient_date(stripped).is_none() {
        return Err(format!(
            "'{stripped}' is not a valid date. \
             Please provide a date like 2026-01-15 or January 15, 2026."
        ));
    }
    Ok(())
}

/// Validate that a string is a recognizable datetime.
pub fn validate_datetime_answer(value: &str) -> Result<(), String> {
    let stripped = value.trim();
    if stripped.is_empty() {
        return Err("Datetime cannot be empty.".into());
    }
    if !stripped.chars().any(|c| c.is_ascii_digit()) {
        return Err(format!(
            "'{stripped}' is not a valid date/time. \
             Please provide something like 2026-01-15 10:30 AM."
        ));
    }
    if parse_lenient_datetime(stripped).is_none() {
        return Err(format!(
            "'{stripped}' is not a valid date/time. \
             Please provide something like 2026-01-15 10:30 AM."
        ));
    }
    Ok(())
}

/// Validate a user's answer based on the pending ASK_ kind.
///
/// Only kinds with a clear expected format are checked; text and choice
/// answers are accepted as-is at this layer.
pub fn validate_answer_for_ask(kind: AskKind, value: &str) -> Result<(), String> {
    match kind {
        AskKind::Date => validate_date_answer(value),
        AskKind::Datetime => validate_datetime_answer(value),
        _ => Ok(()),
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
