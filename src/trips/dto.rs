use serde::Serialize;

use crate::expenses::repo::Expense;
use crate::storage::ImageUpload;
use crate::trips::repo::Trip;

/// Fields collected from the multipart /trips body.
#[derive(Debug, Default)]
pub struct TripForm {
    pub name: Option<String>,
    pub destination: Option<String>,
    pub budget: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub image: Option<ImageUpload>,
}

#[derive(Debug, Serialize)]
pub struct TripResponse {
    pub trip: Trip,
}

#[derive(Debug, Serialize)]
pub struct TripsResponse {
    pub trips: Vec<Trip>,
}

/// Trip payload with its expenses nested, for GET /trips/:id.
#[derive(Debug, Serialize)]
pub struct TripDetails {
    #[serde(flatten)]
    pub trip: Trip,
    pub expenses: Vec<Expense>,
}

#[derive(Debug, Serialize)]
pub struct TripDetailsResponse {
    pub trip: TripDetails,
}
