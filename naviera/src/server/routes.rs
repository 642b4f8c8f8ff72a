//! Router configuration.
//!
//! Builds the complete Axum router with all endpoints.

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use naviera_web::{correlate, handlers::health_check};
use tower_http::trace::TraceLayer;

use super::health::readiness_check;
use super::state::AppState;
use crate::api::{accounts, admin, booking, payments, public, reservations};
use crate::catalog::{
    Activity, Cabin, CabinType, CrewAssignment, CrewMember, Deck, Itinerary, Offer, Port,
    PortActivity, PortLocation, Role, Ship, ShipType, Voyage, VoyageShip,
};

fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/home", get(public::home))
        .route("/destinations", get(public::destinations))
        .route("/destinations/:id", get(public::destination))
        .route("/offers", get(public::offers))
        .route("/offers/:id", get(public::offer))
        .route("/ships", get(public::ships))
        .route("/ships/:id", get(public::ship))
        .route("/contact", post(public::contact))
        .route("/auth/register", post(accounts::register))
        .route("/auth/login", post(accounts::login))
        .route("/auth/logout", post(accounts::logout))
}

fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/account", get(accounts::menu))
        .route("/account/profile", put(accounts::update_profile))
        .route("/account/password", post(accounts::change_password))
        .route("/account/client", post(accounts::create_client))
        .route("/account/reservations", get(reservations::my_reservations))
        .route("/account/reservations/:id", get(reservations::my_reservation))
        .route("/account/reservations/:id/cancel", post(reservations::cancel_mine))
        .route("/account/payments", get(payments::my_payments))
        .route("/booking", get(booking::show).delete(booking::reset))
        .route("/booking/step1", post(booking::step1))
        .route("/booking/step2", post(booking::step2))
        .route("/booking/confirm", post(booking::confirm))
}

fn admin_routes() -> Router<AppState> {
    let routes = Router::new()
        .route("/users", get(admin::list_users))
        .route("/users/:id", put(admin::update_user))
        .route("/clients", get(admin::list_clients))
        .route("/reservations", get(reservations::list))
        .route("/reservations/:id", get(reservations::detail))
        .route("/reservations/:id/cancel", post(reservations::staff_cancel))
        .route("/payments", get(payments::list).post(payments::record))
        .route("/payments/:id", get(payments::detail))
        .route("/payments/:id/status", post(payments::change_status))
        .route("/occupancies", get(admin::list_occupancies).post(admin::assign_crew_cabin))
        .route("/occupancies/:id", axum::routing::delete(admin::release_occupancy));

    let kinds: [fn(Router<AppState>) -> Router<AppState>; 16] = [
        admin::catalog_routes::<ShipType>,
        admin::catalog_routes::<Ship>,
        admin::catalog_routes::<Deck>,
        admin::catalog_routes::<CabinType>,
        admin::catalog_routes::<Cabin>,
        admin::catalog_routes::<Itinerary>,
        admin::catalog_routes::<Port>,
        admin::catalog_routes::<PortLocation>,
        admin::catalog_routes::<Activity>,
        admin::catalog_routes::<PortActivity>,
        admin::catalog_routes::<Voyage>,
        admin::catalog_routes::<VoyageShip>,
        admin::catalog_routes::<Offer>,
        admin::catalog_routes::<CrewMember>,
        admin::catalog_routes::<CrewAssignment>,
        admin::catalog_routes::<Role>,
    ];
    kinds.into_iter().fold(routes, |router, register| register(router))
}

/// Build the complete Axum router.
///
/// - `/health`, `/ready`: probes
/// - `/api/...`: public pages, auth, account, booking wizard
/// - `/api/admin/...`: back office (staff sessions only)
///
/// Every response carries an `x-correlation-id` header.
pub fn build_router(state: AppState) -> Router {
    let api = public_routes()
        .merge(account_routes())
        .nest("/admin", admin_routes());

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .nest("/api", api)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(correlate))
}
