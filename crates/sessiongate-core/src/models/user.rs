use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Identity record returned by the auth service.
///
/// Held as an immutable snapshot: a newer snapshot replaces the old one
/// wholesale, fields are never merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(rename = "fullName")]
    pub full_name: String,
    pub email: String,
    #[serde(rename = "phoneNumber", default)]
    pub phone_number: String,
    #[serde(rename = "dateOfBirth", default)]
    pub date_of_birth: String,
    #[serde(default)]
    pub role: String,
    #[serde(rename = "isActive", default)]
    pub is_active: bool,
    #[serde(rename = "createdAt", default)]
    pub created_at: String,
}

impl User {
    /// Date of birth parsed into a calendar date, if the service sent one we understand
    pub fn birth_date(&self) -> Option<NaiveDate> {
        parse_service_date(&self.date_of_birth)
    }

    /// Account creation date for display (e.g. "Mar 4, 2024").
    /// Falls back to the raw string when it cannot be parsed.
    pub fn created_display(&self) -> String {
        display_date(&self.created_at)
    }

    /// Date of birth for display, same fallback rules as `created_display`
    pub fn birth_date_display(&self) -> String {
        display_date(&self.date_of_birth)
    }

    pub fn status_display(&self) -> &'static str {
        if self.is_active {
            "Active"
        } else {
            "Inactive"
        }
    }
}

/// Parse the date formats the auth service emits: RFC 3339 timestamps,
/// naive `YYYY-MM-DDTHH:MM:SS[.fff]` timestamps, or plain `YYYY-MM-DD`.
pub fn parse_service_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.date());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

fn display_date(raw: &str) -> String {
    match parse_service_date(raw) {
        Some(date) => date.format("%b %-d, %Y").to_string(),
        None => raw.to_string(),
    }
}
