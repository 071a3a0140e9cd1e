use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde_json::json;
use time::Date;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::jwt::AuthUser,
    error::{ApiError, FieldErrors},
    expenses::repo::Expense,
    state::AppState,
    storage::{image_extension, random_image_name, ImageUpload},
    trips::{
        dto::{TripDetails, TripDetailsResponse, TripForm, TripResponse, TripsResponse},
        repo::{NewTrip, Trip},
    },
    validate::{positive_decimal, required_date, required_text},
};

const UPLOAD_LIMIT_BYTES: usize = 5 * 1024 * 1024;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/trips",
            get(list_trips)
                .post(create_trip)
                .layer(DefaultBodyLimit::max(UPLOAD_LIMIT_BYTES)),
        )
        .route("/trips/:id", get(get_trip).delete(delete_trip))
}

fn parse_trip_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim()).map_err(|_| {
        let mut fields = FieldErrors::new();
        fields.push("id", "Valid trip id is required");
        ApiError::Validation(fields)
    })
}

fn check_date_order(fields: &mut FieldErrors, start: Option<Date>, end: Option<Date>) {
    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            fields.push("startDate", "Start date must be before end date");
            fields.push("endDate", "End date must be after start date");
        }
    }
}

#[instrument(skip(state, mp))]
pub async fn create_trip(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mut mp: Multipart,
) -> Result<(StatusCode, Json<TripResponse>), ApiError> {
    let mut form = TripForm::default();
    while let Ok(Some(field)) = mp.next_field().await {
        let name = field.name().map(|s| s.to_string());
        match name.as_deref() {
            Some("name") => form.name = field.text().await.ok(),
            Some("destination") => form.destination = field.text().await.ok(),
            Some("budget") => form.budget = field.text().await.ok(),
            Some("startDate") => form.start_date = field.text().await.ok(),
            Some("endDate") => form.end_date = field.text().await.ok(),
            Some("tripImage") => {
                let filename = field.file_name().map(|s| s.to_string());
                let content_type = field.content_type().map(|s| s.to_string());
                let body = field
                    .bytes()
                    .await
                    .map_err(|e| anyhow::anyhow!("read trip image upload: {e}"))?;
                if let (Some(filename), Some(content_type)) =
                    (filename.filter(|f| !f.is_empty()), content_type)
                {
                    form.image = Some(ImageUpload {
                        filename,
                        content_type,
                        body,
                    });
                }
            }
            _ => {}
        }
    }

    let mut fields = FieldErrors::new();
    let name = required_text(&mut fields, "name", "Name", form.name.as_deref());
    let destination = required_text(
        &mut fields,
        "destination",
        "Destination",
        form.destination.as_deref(),
    );
    let budget = positive_decimal(&mut fields, "budget", "Budget", form.budget.as_deref());
    let start_date = required_date(
        &mut fields,
        "startDate",
        "Start date",
        form.start_date.as_deref(),
    );
    let end_date = required_date(&mut fields, "endDate", "End date", form.end_date.as_deref());
    check_date_order(&mut fields, start_date, end_date);
    let image_ext = match &form.image {
        Some(upload) => {
            let ext = image_extension(Some(&upload.filename), Some(&upload.content_type));
            if ext.is_none() {
                fields.push("tripImage", "Trip image must be a jpeg, jpg, png or gif image");
            }
            ext
        }
        None => None,
    };
    fields.into_result()?;
    let (Some(name), Some(destination), Some(budget), Some(start_date), Some(end_date)) =
        (name, destination, budget, start_date, end_date)
    else {
        return Err(ApiError::Internal(anyhow::anyhow!(
            "validated trip fields missing"
        )));
    };

    let img_url = match (form.image, image_ext) {
        (Some(upload), Some(ext)) => {
            let stored = random_image_name(&ext);
            state.uploads.save(&stored, upload.body).await?;
            Some(state.uploads.public_url(&stored))
        }
        _ => None,
    };

    let trip = Trip::create(
        &state.db,
        user_id,
        &NewTrip {
            name,
            destination,
            budget,
            start_date,
            end_date,
            img_url,
        },
    )
    .await?;

    info!(user_id = %user_id, trip_id = %trip.id, "trip created");
    Ok((StatusCode::CREATED, Json(TripResponse { trip })))
}

#[instrument(skip(state))]
pub async fn list_trips(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<TripsResponse>, ApiError> {
    let trips = Trip::list_by_user(&state.db, user_id).await?;
    Ok(Json(TripsResponse { trips }))
}

#[instrument(skip(state))]
pub async fn get_trip(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<TripDetailsResponse>, ApiError> {
    let trip_id = parse_trip_id(&id)?;
    let Some(trip) = Trip::find_for_user(&state.db, user_id, trip_id).await? else {
        warn!(user_id = %user_id, %trip_id, "trip not found or not owned");
        return Err(ApiError::not_found("Trip not found"));
    };
    let expenses = Expense::list_for_trip(&state.db, trip.id).await?;

    Ok(Json(TripDetailsResponse {
        trip: TripDetails { trip, expenses },
    }))
}

#[instrument(skip(state))]
pub async fn delete_trip(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let trip_id = parse_trip_id(&id)?;
    let Some(trip) = Trip::delete_for_user(&state.db, user_id, trip_id).await? else {
        warn!(user_id = %user_id, %trip_id, "trip not found or not owned");
        return Err(ApiError::not_found("Trip not found"));
    };

    // The row deletion above is the authoritative outcome; image cleanup is
    // fire-and-forget and never affects the response.
    if let Some(stored) = trip.img_url.as_deref().and_then(|u| u.rsplit('/').next()) {
        let uploads = state.uploads.clone();
        let stored = stored.to_string();
        tokio::spawn(async move {
            if let Err(e) = uploads.remove(&stored).await {
                debug!(error = %e, file = %stored, "trip image cleanup failed");
            }
        });
    }

    info!(user_id = %user_id, %trip_id, "trip deleted");
    Ok(Json(json!({ "message": "Trip deleted successfully" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn date_order_violation_sets_both_fields() {
        let mut fields = FieldErrors::new();
        check_date_order(
            &mut fields,
            Some(date!(2026 - 08 - 14)),
            Some(date!(2026 - 08 - 01)),
        );
        assert_eq!(
            fields.get("startDate"),
            Some("Start date must be before end date")
        );
        assert_eq!(
            fields.get("endDate"),
            Some("End date must be after start date")
        );
    }

    #[test]
    fn equal_dates_are_allowed() {
        let mut fields = FieldErrors::new();
        check_date_order(
            &mut fields,
            Some(date!(2026 - 08 - 01)),
            Some(date!(2026 - 08 - 01)),
        );
        assert!(fields.is_empty());
    }

    #[test]
    fn date_order_skipped_when_either_date_failed_parsing() {
        let mut fields = FieldErrors::new();
        check_date_order(&mut fields, None, Some(date!(2026 - 08 - 01)));
        check_date_order(&mut fields, Some(date!(2026 - 08 - 01)), None);
        assert!(fields.is_empty());
    }

    #[test]
    fn trip_id_must_be_a_uuid() {
        assert!(parse_trip_id("d4e5f6a7-0000-4000-8000-000000000000").is_ok());
        let err = parse_trip_id("42").unwrap_err();
        let ApiError::Validation(fields) = err else {
            panic!("expected validation error");
        };
        assert_eq!(fields.get("id"), Some("Valid trip id is required"));
    }
}
