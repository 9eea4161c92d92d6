use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use shared::{CreateRideRequest, Ride, RideEnvelope, ServerFrame};

use super::{auth::require_user, extract::ValidJson};
use crate::{error::AppError, state::AppState};

/// GET /rides
pub async fn list_rides(State(state): State<AppState>) -> Result<Json<Vec<Ride>>, AppError> {
    let rides = state.db.list_rides().await?;
    Ok(Json(rides.into_iter().map(Ride::from).collect()))
}

/// POST /rides
pub async fn create_ride(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidJson(req): ValidJson<CreateRideRequest>,
) -> Result<(StatusCode, Json<RideEnvelope>), AppError> {
    let user_id = require_user(&state, &headers)?;
    let (origin, destination, time) = (req.origin.trim(), req.destination.trim(), req.time.trim());
    if origin.is_empty() || destination.is_empty() || time.is_empty() {
        return Err(AppError::BadRequest("Missing data".to_string()));
    }

    let ride: Ride = state
        .db
        .create_ride(user_id, origin, destination, time)
        .await?
        .into();
    tracing::info!(ride_id = ride.id, driver = user_id, "Ride created");

    match serde_json::to_value(&ride) {
        Ok(data) => state.notify_all(ServerFrame::NewRide { data }),
        Err(e) => tracing::warn!("Failed to encode ride for broadcast: {}", e),
    }

    Ok((
        StatusCode::CREATED,
        Json(RideEnvelope {
            msg: "Ride created".to_string(),
            ride,
        }),
    ))
}
