use serde::{Deserialize, Serialize};

use crate::expenses::repo::Expense;

/// Request body for creating or updating an expense. `amount` arrives as a
/// JSON number or string depending on the client, so it stays loose here and
/// is coerced during validation.
#[derive(Debug, Deserialize)]
pub struct ExpensePayload {
    pub name: Option<String>,
    #[serde(default)]
    pub amount: Option<serde_json::Value>,
    pub category: Option<String>,
    pub date: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ExpenseResponse {
    pub expense: Expense,
}

#[derive(Debug, Serialize)]
pub struct ExpensesResponse {
    pub expenses: Vec<Expense>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_accepts_numeric_and_string_amounts() {
        let from_number: ExpensePayload =
            serde_json::from_str(r#"{"name":"Dinner","amount":42.5}"#).unwrap();
        assert_eq!(from_number.amount, Some(serde_json::json!(42.5)));

        let from_string: ExpensePayload =
            serde_json::from_str(r#"{"name":"Dinner","amount":"42.50"}"#).unwrap();
        assert_eq!(from_string.amount, Some(serde_json::json!("42.50")));
    }

    #[test]
    fn payload_fields_are_all_optional() {
        let empty: ExpensePayload = serde_json::from_str("{}").unwrap();
        assert!(empty.name.is_none());
        assert!(empty.amount.is_none());
        assert!(empty.category.is_none());
        assert!(empty.date.is_none());
        assert!(empty.notes.is_none());
    }
}
