use crate::app::push::{ApiError, api_error};
use crate::state;
use crate::types::dispatch::DispatchResult;
use crate::types::push::{DeviceToken, NotificationMessage};

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct NotifyRequest {
    pub(crate) lat: f64,
    pub(crate) lon: f64,
    #[serde(default)]
    pub(crate) tokens: Vec<DeviceToken>,
    pub(crate) title: Option<String>,
    pub(crate) body: Option<String>,
}

fn valid_coordinates(lat: f64, lon: f64) -> bool {
    lat.is_finite()
        && lon.is_finite()
        && (-90.0..=90.0).contains(&lat)
        && (-180.0..=180.0).contains(&lon)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// Announces a new sighting to every stored subscription and to the device
/// tokens in the request.
pub(crate) async fn sightings_notify(
    State(state): State<state::AppState>,
    Json(request): Json<NotifyRequest>,
) -> Result<Json<Vec<DispatchResult>>, ApiError> {
    if !valid_coordinates(request.lat, request.lon) {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "lat must be within [-90, 90] and lon within [-180, 180].",
        ));
    }

    let title = non_blank(request.title.as_deref()).unwrap_or(&state.config.notification_title);
    let body = non_blank(request.body.as_deref()).unwrap_or(&state.config.notification_body);
    let message = NotificationMessage::sighting(title, body, request.lat, request.lon);

    let tokens: Vec<DeviceToken> = request
        .tokens
        .iter()
        .filter_map(|token| non_blank(Some(token.as_str())))
        .map(str::to_string)
        .collect();
    let subscriptions = state
        .subscriptions
        .lock()
        .expect("push subscriptions lock")
        .subscriptions();

    let results = state
        .dispatcher
        .dispatch(&message, &subscriptions, &tokens)
        .await;
    Ok(Json(results))
}
