//! Input validation utilities.
//!
//! Form values arrive as strings. These helpers turn them into typed values and report problems
//! as `HmsError::Validation` with a message fit for the person who filled in the form.

use crate::constants::DATE_FORMAT;
use crate::{HmsError, HmsResult};
use chrono::{NaiveDate, NaiveTime};
use hms_types::{NonEmptyText, TextError, Username};

/// Parses a calendar date in `YYYY-MM-DD` form.
pub fn parse_date(input: &str) -> HmsResult<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), DATE_FORMAT)
        .map_err(|_| HmsError::Validation("Invalid date format. Please use YYYY-MM-DD.".into()))
}

/// Parses an optional date; blank input means "no date".
pub fn parse_optional_date(input: Option<&str>) -> HmsResult<Option<NaiveDate>> {
    match input.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => parse_date(s).map(Some),
    }
}

/// Parses a time of day as `HH:MM` or `HH:MM:SS`.
pub fn parse_time(input: &str) -> HmsResult<NaiveTime> {
    let trimmed = input.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
        .map_err(|_| HmsError::Validation("Invalid time format. Please use HH:MM.".into()))
}

/// Validates a required free-text field.
pub fn required_text(input: &str, field: &str) -> HmsResult<NonEmptyText> {
    NonEmptyText::new(input).map_err(|_| HmsError::Validation(format!("{field} cannot be empty.")))
}

/// Validates a username.
pub fn username(input: &str) -> HmsResult<Username> {
    Username::parse(input).map_err(|e| {
        HmsError::Validation(match e {
            TextError::Empty => "Username cannot be empty.".to_string(),
            TextError::TooLong(max) => format!("Username cannot be longer than {max} characters."),
            TextError::InvalidCharacters => {
                "Username may only contain letters, digits and @/./+/-/_ characters.".to_string()
            }
        })
    })
}

/// Parses an optional non-negative whole number, e.g. years of experience.
pub fn parse_optional_count(input: Option<&str>, field: &str) -> HmsResult<Option<i64>> {
    match input.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => match s.parse::<i64>() {
            Ok(n) if n >= 0 => Ok(Some(n)),
            _ => Err(HmsError::Validation(format!(
                "{field} must be a whole number."
            ))),
        },
    }
}

/// Parses a record id from a form field or path segment.
///
/// `field` names the record, e.g. "Doctor"; a blank value reads as nothing selected.
pub fn parse_id(input: &str, field: &str) -> HmsResult<i64> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(HmsError::Validation(format!("Please select a {}.", field.to_lowercase())));
    }
    match trimmed.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(HmsError::Validation(format!("{field} id is not valid."))),
    }
}

/// Trims optional text and turns blank values into `None`.
pub fn optional_text(input: Option<&str>) -> Option<String> {
    input
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
