//! Public pages: home, destinations, offers, ships and the contact form.
//!
//! ```bash
//! curl http://localhost:8080/api/destinations
//! curl -X POST http://localhost:8080/api/contact \
//!   -H "Content-Type: application/json" \
//!   -d '{"name":"Ana","email":"ana@example.com","subject":"Cabins","message":"Hello"}'
//! ```

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use naviera_web::{AppError, CorrelationId, FieldErrors};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::body;
use crate::catalog::views::{DestinationDetail, HomePage, OfferDetail, OfferSummary, ShipDetail, ShipSummary, VoyageSummary};
use crate::error::NavieraError;
use crate::mail::OutgoingMail;
use crate::server::AppState;
use crate::types::{OfferId, ShipId, VoyageId};

/// `GET /api/home`
pub async fn home(State(state): State<AppState>) -> Result<Json<HomePage>, AppError> {
    Ok(Json(state.catalog.home(state.clock.today()).await?))
}

/// `GET /api/destinations`
pub async fn destinations(State(state): State<AppState>) -> Result<Json<Vec<VoyageSummary>>, AppError> {
    Ok(Json(state.catalog.destinations(state.clock.today()).await?))
}

/// `GET /api/destinations/:id`
pub async fn destination(
    State(state): State<AppState>,
    Path(id): Path<VoyageId>,
) -> Result<Json<DestinationDetail>, AppError> {
    Ok(Json(state.catalog.destination(id, state.clock.today()).await?))
}

/// `GET /api/offers`
pub async fn offers(State(state): State<AppState>) -> Result<Json<Vec<OfferSummary>>, AppError> {
    Ok(Json(state.catalog.offers(state.clock.today()).await?))
}

/// `GET /api/offers/:id`
pub async fn offer(State(state): State<AppState>, Path(id): Path<OfferId>) -> Result<Json<OfferDetail>, AppError> {
    Ok(Json(state.catalog.offer(id, state.clock.today()).await?))
}

/// `GET /api/ships`
pub async fn ships(State(state): State<AppState>) -> Result<Json<Vec<ShipSummary>>, AppError> {
    Ok(Json(state.catalog.ships().await?))
}

/// `GET /api/ships/:id`
pub async fn ship(State(state): State<AppState>, Path(id): Path<ShipId>) -> Result<Json<ShipDetail>, AppError> {
    Ok(Json(state.catalog.ship(id, state.clock.today()).await?))
}

/// Contact form.
#[derive(Clone, Debug, Deserialize)]
pub struct ContactForm {
    /// Sender name
    pub name: String,
    /// Sender address (used as Reply-To)
    pub email: String,
    /// Subject
    pub subject: String,
    /// Message
    pub message: String,
}

impl ContactForm {
    /// Field rules.
    ///
    /// # Errors
    ///
    /// Every failing field.
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.check_text("name", &self.name, 100);
        errors.check_email("email", &self.email);
        errors.check_text("subject", &self.subject, 150);
        errors.check_text("message", &self.message, 5000);
        errors.into_result()
    }
}

/// Reply to an accepted contact message.
#[derive(Debug, Serialize)]
pub struct ContactResponse {
    /// Message for the user
    pub message: &'static str,
}

/// `POST /api/contact` → 202
pub async fn contact(
    State(state): State<AppState>,
    CorrelationId(reference): CorrelationId,
    payload: Result<Json<ContactForm>, JsonRejection>,
) -> Result<(StatusCode, Json<ContactResponse>), AppError> {
    let form = body(payload)?;
    form.validate().map_err(AppError::with_fields)?;

    let mail = OutgoingMail {
        to: state.settings.contact_inbox.clone(),
        reply_to: Some(form.email.trim().to_string()),
        subject: format!("[Contact] {}", form.subject.trim()),
        body: format!(
            "From: {} <{}>\nReference: {reference}\n\n{}",
            form.name.trim(),
            form.email.trim(),
            form.message
        ),
    };
    state.mailer.send(mail).await.map_err(NavieraError::from)?;
    info!(from = %form.email.trim(), %reference, "Contact message forwarded");

    Ok((
        StatusCode::ACCEPTED,
        Json(ContactResponse {
            message: "Thank you for your message. We will get back to you soon.",
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contact_form_limits() {
        let form = ContactForm {
            name: "Ana".to_string(),
            email: "ana@example.com".to_string(),
            subject: "s".repeat(151),
            message: String::new(),
        };
        let Err(errors) = form.validate() else {
            unreachable!("form should fail");
        };
        assert!(errors.contains("subject"));
        assert!(errors.contains("message"));
        assert!(!errors.contains("name"));
    }
}
