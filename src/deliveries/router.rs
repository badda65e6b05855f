use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::directory::{OccupantId, UnitId};

use super::allocation::{AllocationError, LockerAllocator};
use super::lifecycle::{DeliveryLifecycle, LifecycleError};
use super::validation::{RecipientValidator, ValidationRequest};

/// Shared handler state: the three delivery components.
#[derive(Clone)]
pub struct DeliveryServices {
    pub validator: Arc<RecipientValidator>,
    pub allocator: Arc<LockerAllocator>,
    pub lifecycle: Arc<DeliveryLifecycle>,
}

/// Router builder exposing the delivery coordination endpoints.
pub fn delivery_router(services: DeliveryServices) -> Router {
    Router::new()
        .route("/api/v1/recipients/validate", post(validate_handler))
        .route(
            "/api/v1/recipients/validate-assisted",
            post(validate_assisted_handler),
        )
        .route("/api/v1/lockers/reserve", post(reserve_handler))
        .route(
            "/api/v1/deliveries/confirm-closure",
            post(confirm_closure_handler),
        )
        .route(
            "/api/v1/deliveries/confirm-pickup",
            post(confirm_pickup_handler),
        )
        .route("/api/v1/front-desk/escalate", post(escalate_handler))
        .route(
            "/api/v1/deliveries/by-recipient",
            get(history_by_recipient_handler),
        )
        .route(
            "/api/v1/deliveries/by-occupant/:occupant_id",
            get(history_by_occupant_handler),
        )
        .with_state(services)
}

async fn validate_handler(
    State(services): State<DeliveryServices>,
    Json(request): Json<ValidationRequest>,
) -> Response {
    match services.validator.validate(&request) {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(error) => bad_request(error.to_string()),
    }
}

async fn validate_assisted_handler(
    State(services): State<DeliveryServices>,
    Json(request): Json<ValidationRequest>,
) -> Response {
    match services.validator.validate_assisted(&request) {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(error) => bad_request(error.to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct ReserveRequest {
    unit_id: String,
}

async fn reserve_handler(
    State(services): State<DeliveryServices>,
    Json(request): Json<ReserveRequest>,
) -> Response {
    match services.allocator.reserve(&UnitId(request.unit_id)) {
        Ok(reservation) => {
            let payload = json!({
                "success": true,
                "message": format!(
                    "Locker {} unlocked. Deposit the parcel and close the door.",
                    reservation.locker_id.0
                ),
                "locker_id": reservation.locker_id.0,
                "delivery_id": reservation.delivery_id.0,
                "entry_code": reservation.entry_code,
                "deposit_deadline": reservation.deposit_deadline,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(AllocationError::UnitNotFound) => not_found("residence unit not found"),
        Err(AllocationError::NoLockerAvailable) => {
            let payload = json!({
                "success": false,
                "message": "No locker available right now. Escalate to the front desk.",
            });
            (StatusCode::CONFLICT, Json(payload)).into_response()
        }
        Err(AllocationError::Repository(error)) => internal_error(error.to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct DeliveryRef {
    delivery_id: String,
}

async fn confirm_closure_handler(
    State(services): State<DeliveryServices>,
    Json(request): Json<DeliveryRef>,
) -> Response {
    let id = super::domain::DeliveryId(request.delivery_id);
    match services.lifecycle.confirm_closure(&id) {
        Ok(receipt) => {
            let payload = json!({
                "success": true,
                "message": "Delivery stored. The resident will be notified.",
                "entry_code": receipt.entry_code,
                "access_password": receipt.access_password,
                "registered_at": receipt.registered_at,
                "notified": receipt.notified,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => lifecycle_error(error),
    }
}

async fn confirm_pickup_handler(
    State(services): State<DeliveryServices>,
    Json(request): Json<DeliveryRef>,
) -> Response {
    let id = super::domain::DeliveryId(request.delivery_id);
    match services.lifecycle.confirm_pickup(&id) {
        Ok(receipt) => {
            let payload = json!({
                "success": true,
                "picked_up_at": receipt.picked_up_at,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => lifecycle_error(error),
    }
}

#[derive(Debug, Deserialize)]
struct EscalateRequest {
    recipient_name: String,
    postal_code: String,
}

async fn escalate_handler(
    State(services): State<DeliveryServices>,
    Json(request): Json<EscalateRequest>,
) -> Response {
    if request.recipient_name.trim().is_empty() {
        return bad_request("recipient name is required".to_string());
    }
    match services
        .lifecycle
        .escalate_front_desk(&request.recipient_name, &request.postal_code)
    {
        Ok(receipt) => {
            let payload = json!({
                "success": true,
                "message": "Front desk engaged. Await contact.",
                "case_id": receipt.case_id.0,
                "registered_at": receipt.registered_at,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => lifecycle_error(error),
    }
}

async fn history_by_recipient_handler(
    State(services): State<DeliveryServices>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Some(name) = params.get("name").map(String::as_str).filter(|name| !name.trim().is_empty())
    else {
        return bad_request("query parameter 'name' is required".to_string());
    };
    match services.lifecycle.history_for_recipient(name) {
        Ok(deliveries) => (StatusCode::OK, Json(deliveries)).into_response(),
        Err(error) => lifecycle_error(error),
    }
}

async fn history_by_occupant_handler(
    State(services): State<DeliveryServices>,
    Path(occupant_id): Path<String>,
) -> Response {
    match services
        .lifecycle
        .history_for_occupant(&OccupantId(occupant_id))
    {
        Ok(deliveries) => (StatusCode::OK, Json(deliveries)).into_response(),
        Err(LifecycleError::NotFound) => not_found("occupant not found"),
        Err(error) => lifecycle_error(error),
    }
}

fn lifecycle_error(error: LifecycleError) -> Response {
    match error {
        LifecycleError::NotFound => not_found("delivery not found"),
        LifecycleError::InvalidState { .. } => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::CONFLICT, Json(payload)).into_response()
        }
        LifecycleError::Repository(inner) => internal_error(inner.to_string()),
    }
}

fn bad_request(message: String) -> Response {
    let payload = json!({ "error": message });
    (StatusCode::BAD_REQUEST, Json(payload)).into_response()
}

fn not_found(message: &str) -> Response {
    let payload = json!({ "error": message });
    (StatusCode::NOT_FOUND, Json(payload)).into_response()
}

fn internal_error(message: String) -> Response {
    let payload = json!({ "error": message });
    (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
}
