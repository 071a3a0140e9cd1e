use std::str::FromStr;

use sqlx::types::Decimal;
use time::{format_description::FormatItem, macros::format_description, Date};

use crate::error::FieldErrors;

pub const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Clients send money and dates as either JSON strings or bare numbers;
/// normalize both to text before field validation.
pub fn value_text(value: Option<&serde_json::Value>) -> Option<String> {
    match value {
        Some(serde_json::Value::String(s)) => Some(s.clone()),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

pub fn required_text(
    fields: &mut FieldErrors,
    field: &'static str,
    label: &str,
    raw: Option<&str>,
) -> Option<String> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => Some(s.to_string()),
        None => {
            fields.push(field, format!("{label} is required"));
            None
        }
    }
}

pub fn positive_decimal(
    fields: &mut FieldErrors,
    field: &'static str,
    label: &str,
    raw: Option<&str>,
) -> Option<Decimal> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        fields.push(field, format!("{label} is required"));
        return None;
    };
    match Decimal::from_str(raw) {
        Ok(d) if d > Decimal::ZERO => Some(d),
        _ => {
            fields.push(field, format!("{label} must be a positive number"));
            None
        }
    }
}

pub fn required_date(
    fields: &mut FieldErrors,
    field: &'static str,
    label: &str,
    raw: Option<&str>,
) -> Option<Date> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        fields.push(field, format!("{label} is required"));
        return None;
    };
    match Date::parse(raw, DATE_FORMAT) {
        Ok(d) => Some(d),
        Err(_) => {
            fields.push(field, "Valid date is required");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn value_text_accepts_strings_and_numbers() {
        assert_eq!(value_text(Some(&json!("12.5"))), Some("12.5".into()));
        assert_eq!(value_text(Some(&json!(42))), Some("42".into()));
        assert_eq!(value_text(Some(&json!(["x"]))), None);
        assert_eq!(value_text(None), None);
    }

    #[test]
    fn required_text_trims_and_flags_blank() {
        let mut fields = FieldErrors::new();
        assert_eq!(
            required_text(&mut fields, "name", "Name", Some("  Rome  ")),
            Some("Rome".into())
        );
        assert!(fields.is_empty());

        required_text(&mut fields, "name", "Name", Some("   "));
        assert_eq!(fields.get("name"), Some("Name is required"));
    }

    #[test]
    fn positive_decimal_rejects_negative_and_garbage() {
        let mut fields = FieldErrors::new();
        assert_eq!(
            positive_decimal(&mut fields, "budget", "Budget", Some("1500.00")),
            Decimal::from_str("1500.00").ok()
        );
        assert!(fields.is_empty());

        assert!(positive_decimal(&mut fields, "budget", "Budget", Some("-5")).is_none());
        assert_eq!(
            fields.get("budget"),
            Some("Budget must be a positive number")
        );

        let mut fields = FieldErrors::new();
        assert!(positive_decimal(&mut fields, "amount", "Amount", Some("lots")).is_none());
        assert_eq!(
            fields.get("amount"),
            Some("Amount must be a positive number")
        );

        let mut fields = FieldErrors::new();
        assert!(positive_decimal(&mut fields, "amount", "Amount", None).is_none());
        assert_eq!(fields.get("amount"), Some("Amount is required"));
    }

    #[test]
    fn positive_decimal_rejects_zero() {
        let mut fields = FieldErrors::new();
        assert!(positive_decimal(&mut fields, "amount", "Amount", Some("0")).is_none());
        assert_eq!(
            fields.get("amount"),
            Some("Amount must be a positive number")
        );
    }

    #[test]
    fn required_date_parses_iso_days() {
        let mut fields = FieldErrors::new();
        let date = required_date(&mut fields, "startDate", "Start date", Some("2026-08-01"));
        assert_eq!(
            date,
            Some(Date::from_calendar_date(2026, time::Month::August, 1).unwrap())
        );
        assert!(fields.is_empty());

        assert!(required_date(&mut fields, "endDate", "End date", Some("soon")).is_none());
        assert_eq!(fields.get("endDate"), Some("Valid date is required"));

        let mut fields = FieldErrors::new();
        assert!(required_date(&mut fields, "date", "Date", None).is_none());
        assert_eq!(fields.get("date"), Some("Date is required"));
    }
}
