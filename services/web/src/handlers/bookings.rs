//! Checkout session creation and the payment webhook

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::error::{ApiResult, AppError};
use crate::extractors::{CurrentUser, Json, Origin, parse_id};
use crate::models::NewBooking;
use crate::payment::{CompletedCheckout, StripeClient};
use crate::repositories::{BookingRepository, Resource, TourRepository, UserRepository};

pub async fn get_checkout_session(
    State(tours): State<TourRepository>,
    State(payments): State<StripeClient>,
    CurrentUser(user): CurrentUser,
    Origin(origin): Origin,
    Path(tour_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let tour_id = parse_id(&tour_id)?;
    let tour = tours
        .find(tour_id)
        .await?
        .ok_or_else(AppError::no_document)?;

    let session = payments
        .create_checkout_session(&tour, &user.email, &origin)
        .await?;

    Ok(Json(json!({
        "status": "success",
        "session": session,
    })))
}

/// Record the booking behind a completed checkout; repeated deliveries are ignored
async fn record_checkout(
    users: &UserRepository,
    bookings: &BookingRepository,
    checkout: CompletedCheckout,
) -> ApiResult<()> {
    let tour_id = parse_id(&checkout.tour_reference)?;
    let user = users
        .find_by_email(&checkout.customer_email)
        .await?
        .ok_or_else(|| {
            AppError::not_found(format!("No user for {}", checkout.customer_email))
        })?;

    let booking = NewBooking {
        tour_id,
        user_id: user.id,
        price: checkout.price,
        paid: true,
        checkout_session_id: Some(checkout.session_id),
    };

    if let Some(created) = bookings.insert(&booking).await? {
        info!("Booked tour {} for user {} ({})", tour_id, user.id, created.id);
    }
    Ok(())
}

fn webhook_error(reason: impl std::fmt::Display) -> Response {
    warn!("Rejected webhook: {}", reason);
    (StatusCode::BAD_REQUEST, format!("Webhook error: {}", reason)).into_response()
}

/// `POST /webhook-checkout`, the body is read raw for signature checks
pub async fn webhook_checkout(
    State(payments): State<StripeClient>,
    State(users): State<UserRepository>,
    State(bookings): State<BookingRepository>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(signature) = headers
        .get("stripe-signature")
        .and_then(|value| value.to_str().ok())
    else {
        return webhook_error("missing Stripe-Signature header");
    };

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default();

    let event = match payments.construct_event(&body, signature, now) {
        Ok(event) => event,
        Err(e) => return webhook_error(e),
    };

    if event.is_checkout_completed() {
        let Some(checkout) = event.completed_checkout() else {
            return webhook_error("incomplete checkout session");
        };
        if let Err(e) = record_checkout(&users, &bookings, checkout).await {
            return webhook_error(e);
        }
    }

    (StatusCode::OK, Json(json!({ "received": true }))).into_response()
}
