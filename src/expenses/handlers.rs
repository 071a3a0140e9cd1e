use std::str::FromStr;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use time::Date;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::jwt::AuthUser,
    error::{ApiError, FieldErrors},
    expenses::{
        dto::{ExpensePayload, ExpenseResponse, ExpensesResponse},
        repo::{Category, Expense, ExpenseFields},
    },
    state::AppState,
    trips::repo::Trip,
    validate::{positive_decimal, required_date, required_text, value_text},
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/trips/:id/expenses", post(create_expense))
        // Path kept singular for client compatibility.
        .route("/trip/:id/expenses", get(get_trip_expenses))
        .route(
            "/expenses/:id",
            get(get_expense).put(update_expense).delete(delete_expense),
        )
}

fn parse_expense_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim()).map_err(|_| {
        let mut fields = FieldErrors::new();
        fields.push("id", "Valid expense id is required");
        ApiError::Validation(fields)
    })
}

fn category_message() -> String {
    let names: Vec<&str> = Category::ALL.iter().map(|c| c.as_str()).collect();
    format!("Category must be one of {}", names.join(", "))
}

/// Create and update share this pass; every invalid field is reported.
fn validate_payload(payload: &ExpensePayload) -> Result<ExpenseFields, ApiError> {
    let mut fields = FieldErrors::new();

    let name = required_text(&mut fields, "name", "Name", payload.name.as_deref());
    let amount_text = value_text(payload.amount.as_ref());
    let amount = positive_decimal(&mut fields, "amount", "Amount", amount_text.as_deref());
    let category = match payload.category.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => match Category::from_str(raw) {
            Ok(c) => Some(c),
            Err(()) => {
                fields.push("category", category_message());
                None
            }
        },
        _ => {
            fields.push("category", "Category is required");
            None
        }
    };
    let date = required_date(&mut fields, "date", "Date", payload.date.as_deref());

    fields.into_result()?;
    let (Some(name), Some(amount), Some(category), Some(date)) = (name, amount, category, date)
    else {
        return Err(ApiError::Internal(anyhow::anyhow!(
            "validated expense fields missing"
        )));
    };

    // Blank notes are treated as absent so updates keep the stored value.
    let notes = payload
        .notes
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(|n| n.to_string());

    Ok(ExpenseFields {
        name,
        amount,
        category,
        date,
        notes,
    })
}

fn ensure_within_trip(date: Date, start: Date, end: Date) -> Result<(), ApiError> {
    if date < start || date > end {
        let mut fields = FieldErrors::new();
        fields.push("date", "Date must be within trip timeline");
        return Err(ApiError::Validation(fields));
    }
    Ok(())
}

#[instrument(skip(state, payload))]
pub async fn create_expense(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(trip_id): Path<String>,
    Json(payload): Json<ExpensePayload>,
) -> Result<(StatusCode, Json<ExpenseResponse>), ApiError> {
    let trip_id = Uuid::parse_str(trip_id.trim()).map_err(|_| {
        let mut fields = FieldErrors::new();
        fields.push("tripId", "Valid trip id is required");
        ApiError::Validation(fields)
    })?;
    let fields = validate_payload(&payload)?;

    let Some(trip) = Trip::find_for_user(&state.db, user_id, trip_id).await? else {
        warn!(user_id = %user_id, %trip_id, "trip not found or not owned");
        return Err(ApiError::not_found("Trip not found"));
    };
    ensure_within_trip(fields.date, trip.start_date, trip.end_date)?;

    let expense = Expense::create(&state.db, trip.id, &fields).await?;
    info!(user_id = %user_id, %trip_id, expense_id = %expense.id, "expense created");
    Ok((StatusCode::CREATED, Json(ExpenseResponse { expense })))
}

#[instrument(skip(state))]
pub async fn get_trip_expenses(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(trip_id): Path<String>,
) -> Result<Json<ExpensesResponse>, ApiError> {
    let trip_id = Uuid::parse_str(trip_id.trim())
        .map_err(|_| ApiError::not_found("Trip not found"))?;
    let Some(trip) = Trip::find_for_user(&state.db, user_id, trip_id).await? else {
        warn!(user_id = %user_id, %trip_id, "trip not found or not owned");
        return Err(ApiError::not_found("Trip not found"));
    };
    let expenses = Expense::list_for_trip(&state.db, trip.id).await?;
    Ok(Json(ExpensesResponse { expenses }))
}

#[instrument(skip(state))]
pub async fn get_expense(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ExpenseResponse>, ApiError> {
    let expense_id = parse_expense_id(&id)?;
    let Some(expense) = Expense::find_for_user(&state.db, user_id, expense_id).await? else {
        warn!(user_id = %user_id, %expense_id, "expense not found or not owned");
        return Err(ApiError::not_found("Expense not found"));
    };
    Ok(Json(ExpenseResponse { expense }))
}

#[instrument(skip(state, payload))]
pub async fn update_expense(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    Json(payload): Json<ExpensePayload>,
) -> Result<Json<ExpenseResponse>, ApiError> {
    let expense_id = parse_expense_id(&id)?;
    let fields = validate_payload(&payload)?;

    let Some(existing) = Expense::find_for_user(&state.db, user_id, expense_id).await? else {
        warn!(user_id = %user_id, %expense_id, "expense not found or not owned");
        return Err(ApiError::not_found("Expense not found"));
    };

    // The date is re-validated against the parent trip, not the payload.
    let Some(trip) = Trip::find_for_user(&state.db, user_id, existing.trip_id).await? else {
        warn!(user_id = %user_id, trip_id = %existing.trip_id, "parent trip gone");
        return Err(ApiError::not_found("Trip not found"));
    };
    ensure_within_trip(fields.date, trip.start_date, trip.end_date)?;

    // A concurrent delete between the read above and this write surfaces as
    // a miss here, not a 500.
    let Some(expense) = Expense::update_for_user(&state.db, user_id, expense_id, &fields).await?
    else {
        warn!(user_id = %user_id, %expense_id, "expense vanished during update");
        return Err(ApiError::not_found("Expense not found"));
    };

    info!(user_id = %user_id, %expense_id, "expense updated");
    Ok(Json(ExpenseResponse { expense }))
}

#[instrument(skip(state))]
pub async fn delete_expense(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let expense_id = parse_expense_id(&id)?;
    if !Expense::delete_for_user(&state.db, user_id, expense_id).await? {
        warn!(user_id = %user_id, %expense_id, "expense not found or not owned");
        return Err(ApiError::not_found("Expense not found"));
    }
    info!(user_id = %user_id, %expense_id, "expense deleted");
    Ok(Json(json!({ "message": "Expense deleted successfully" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn payload(json: &str) -> ExpensePayload {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn valid_payload_passes_and_normalizes() {
        let fields = validate_payload(&payload(
            r#"{"name":"  Dinner ","amount":"42.50","category":"FOOD","date":"2026-08-03","notes":"  "}"#,
        ))
        .expect("payload should validate");
        assert_eq!(fields.name, "Dinner");
        assert_eq!(fields.amount.to_string(), "42.50");
        assert_eq!(fields.category, Category::Food);
        assert_eq!(fields.date, date!(2026 - 08 - 03));
        // blank notes become absent, preserving stored notes on update
        assert_eq!(fields.notes, None);
    }

    #[test]
    fn invalid_payload_reports_every_field() {
        let err = validate_payload(&payload(
            r#"{"amount":"-3","category":"GROCERIES","date":"yesterday"}"#,
        ))
        .unwrap_err();
        let ApiError::Validation(fields) = err else {
            panic!("expected validation error");
        };
        assert_eq!(fields.get("name"), Some("Name is required"));
        assert_eq!(
            fields.get("amount"),
            Some("Amount must be a positive number")
        );
        assert_eq!(
            fields.get("category"),
            Some(
                "Category must be one of FOOD, TRANSPORTATION, ACCOMMODATION, \
                 ENTERTAINMENT, SHOPPING, OTHER"
            )
        );
        assert_eq!(fields.get("date"), Some("Valid date is required"));
    }

    #[test]
    fn numeric_amount_is_accepted() {
        let fields = validate_payload(&payload(
            r#"{"name":"Taxi","amount":18,"category":"TRANSPORTATION","date":"2026-08-02"}"#,
        ))
        .expect("payload should validate");
        assert_eq!(fields.amount.to_string(), "18");
    }

    #[test]
    fn date_window_is_inclusive() {
        let start = date!(2026 - 08 - 01);
        let end = date!(2026 - 08 - 14);
        assert!(ensure_within_trip(start, start, end).is_ok());
        assert!(ensure_within_trip(end, start, end).is_ok());
        assert!(ensure_within_trip(date!(2026 - 08 - 07), start, end).is_ok());

        let err = ensure_within_trip(date!(2026 - 08 - 15), start, end).unwrap_err();
        let ApiError::Validation(fields) = err else {
            panic!("expected validation error");
        };
        assert_eq!(
            fields.get("date"),
            Some("Date must be within trip timeline")
        );
        assert!(ensure_within_trip(date!(2026 - 07 - 31), start, end).is_err());
    }
}
