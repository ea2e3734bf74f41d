//! Client-side input validation. Everything here runs before any network call.

use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;

use crate::error::ValidationError;

/// Length of an e-mailed verification code.
pub const OTP_LENGTH: usize = 6;

/// Earliest accepted birth year.
pub const MIN_BIRTH_YEAR: i32 = 1900;

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex is valid")
    })
}

/// Trim and check an e-mail address.
pub fn validate_email(raw: &str) -> Result<String, ValidationError> {
    let email = raw.trim();
    if email_regex().is_match(email) {
        Ok(email.to_string())
    } else {
        Err(ValidationError::InvalidEmail)
    }
}

/// A verification code is exactly six ASCII digits. Surrounding whitespace
/// (from paste) is ignored.
pub fn validate_otp(raw: &str) -> Result<String, ValidationError> {
    let code = raw.trim();
    if code.len() == OTP_LENGTH && code.bytes().all(|b| b.is_ascii_digit()) {
        Ok(code.to_string())
    } else {
        Err(ValidationError::InvalidOtp)
    }
}

/// Re-format free typing into `DD.MM.YYYY`: non-digits are dropped, at most
/// eight digits are kept and dots are inserted after day and month.
pub fn format_birthday_input(raw: &str) -> String {
    let digits: String = raw.chars().filter(char::is_ascii_digit).take(8).collect();
    let mut out = String::with_capacity(10);
    for (i, c) in digits.chars().enumerate() {
        if i == 2 || i == 4 {
            out.push('.');
        }
        out.push(c);
    }
    out
}

/// Parse a `DD.MM.YYYY` birthday. The year must lie in
/// `MIN_BIRTH_YEAR..=current_year` and the date must exist on the calendar.
pub fn parse_birthday(raw: &str, current_year: i32) -> Result<NaiveDate, ValidationError> {
    let digits: String = raw.chars().filter(|c| *c != '.').collect();
    if digits.len() != 8 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::InvalidBirthday);
    }
    let number = |range: std::ops::Range<usize>| -> Result<u32, ValidationError> {
        digits
            .get(range)
            .and_then(|s| s.parse().ok())
            .ok_or(ValidationError::InvalidBirthday)
    };
    let day = number(0..2)?;
    let month = number(2..4)?;
    let year = i32::try_from(number(4..8)?).map_err(|_| ValidationError::InvalidBirthday)?;

    if !(MIN_BIRTH_YEAR..=current_year).contains(&year) {
        return Err(ValidationError::InvalidBirthday);
    }
    NaiveDate::from_ymd_opt(year, month, day).ok_or(ValidationError::InvalidBirthday)
}

/// Render a stored birthday back into the input format.
pub fn format_birthday(date: NaiveDate) -> String {
    format!("{:02}.{:02}.{}", date.day(), date.month(), date.year())
}

/// Parse a measurement typed by the user. Accepts digits with at most one
/// decimal point; the value must be positive.
pub fn parse_measurement(raw: &str, field: &'static str) -> Result<f64, ValidationError> {
    let trimmed = raw.trim();
    let well_formed = !trimmed.is_empty()
        && trimmed.chars().all(|c| c.is_ascii_digit() || c == '.')
        && trimmed.matches('.').count() <= 1;
    let value = if well_formed {
        trimmed.parse::<f64>().ok()
    } else {
        None
    };
    match value {
        Some(v) if v > 0.0 && v.is_finite() => Ok(v),
        _ => Err(ValidationError::NonPositive { field }),
    }
}
