//! Back-office endpoints. Every handler requires a staff session.
//!
//! Catalog kinds share one set of generic handlers, registered per kind by
//! [`catalog_routes`]:
//!
//! ```text
//! GET    /api/admin/{kind}?q=..&filter.<field>=..&page=..&per_page=..
//! GET    /api/admin/{kind}/:id
//! POST   /api/admin/{kind}
//! PUT    /api/admin/{kind}/:id
//! DELETE /api/admin/{kind}/:id
//! ```

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use naviera_web::AppError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

use super::{body, command_failed, Page, PageQuery};
use crate::aggregates::occupancy::OccupancyAction;
use crate::auth::StaffUser;
use crate::catalog::records::field_matches;
use crate::catalog::{CatalogRecord, Record};
use crate::error::NavieraError;
use crate::server::{state::COMMAND_TIMEOUT, AppState};
use crate::types::{
    CabinId, CabinOccupancy, Client, CrewMemberId, Gender, OccupancyId, RoleId, User, UserId, VoyageShipId,
};

const FILTER_PREFIX: &str = "filter.";

/// Parsed list parameters of a catalog listing.
#[derive(Debug, Default)]
struct ListParams {
    q: String,
    filters: Vec<(String, String)>,
    page: PageQuery,
}

impl ListParams {
    fn parse(raw: HashMap<String, String>) -> Result<Self, AppError> {
        let mut params = Self::default();
        for (key, value) in raw {
            match key.as_str() {
                "q" => params.q = value,
                "page" => params.page.page = Some(parse_number("page", &value)?),
                "per_page" => params.page.per_page = Some(parse_number("per_page", &value)?),
                other => {
                    if let Some(field) = other.strip_prefix(FILTER_PREFIX) {
                        params.filters.push((field.to_string(), value));
                    }
                },
            }
        }
        params.filters.sort();
        Ok(params)
    }

    fn matches<R: Record>(&self, record: &R) -> Result<bool, AppError> {
        if !record.matches_query(&self.q) {
            return Ok(false);
        }
        if self.filters.is_empty() {
            return Ok(true);
        }
        let value = serde_json::to_value(record).map_err(|e| AppError::internal("Could not encode record").with_source(e.into()))?;
        Ok(self
            .filters
            .iter()
            .all(|(field, expected)| field_matches(&value, field, expected)))
    }
}

fn parse_number(name: &str, value: &str) -> Result<usize, AppError> {
    value
        .parse()
        .map_err(|_| AppError::bad_request(format!("`{name}` must be a positive number")))
}

/// Decode a request body into a record, forcing its id.
fn decode_record<R: Record>(mut value: Value, id: Uuid) -> Result<R, AppError> {
    let Value::Object(fields) = &mut value else {
        return Err(AppError::bad_request(format!("{} must be a JSON object", R::LABEL)));
    };
    fields.insert("id".to_string(), Value::String(id.to_string()));
    serde_json::from_value(value).map_err(|e| AppError::validation(format!("Invalid {}: {e}", R::LABEL)))
}

async fn list_records<R: CatalogRecord>(
    State(state): State<AppState>,
    _staff: StaffUser,
    Query(raw): Query<HashMap<String, String>>,
) -> Result<Json<Page<R>>, AppError> {
    let params = ListParams::parse(raw)?;
    let mut matching = Vec::new();
    for record in state.catalog.list::<R>().await? {
        if params.matches(&record)? {
            matching.push(record);
        }
    }
    Ok(Json(Page::of(matching, params.page)))
}

async fn read_record<R: CatalogRecord>(
    State(state): State<AppState>,
    _staff: StaffUser,
    Path(id): Path<Uuid>,
) -> Result<Json<R>, AppError> {
    Ok(Json(state.catalog.require::<R>(R::Id::from(id)).await?))
}

async fn create_record<R: CatalogRecord>(
    State(state): State<AppState>,
    _staff: StaffUser,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<R>), AppError> {
    let record = decode_record::<R>(body(payload)?, Uuid::new_v4())?;
    Ok((StatusCode::CREATED, Json(state.catalog.create(record).await?)))
}

async fn update_record<R: CatalogRecord>(
    State(state): State<AppState>,
    _staff: StaffUser,
    Path(id): Path<Uuid>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<R>, AppError> {
    let record = decode_record::<R>(body(payload)?, id)?;
    Ok(Json(state.catalog.update(record).await?))
}

async fn delete_record<R: CatalogRecord>(
    State(state): State<AppState>,
    _staff: StaffUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.catalog.delete::<R>(R::Id::from(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Register the five back-office routes of one catalog kind on `router`.
pub fn catalog_routes<R: CatalogRecord>(router: Router<AppState>) -> Router<AppState> {
    router
        .route(
            &format!("/{}", R::KIND),
            get(list_records::<R>).post(create_record::<R>),
        )
        .route(
            &format!("/{}/:id", R::KIND),
            get(read_record::<R>)
                .put(update_record::<R>)
                .delete(delete_record::<R>),
        )
}

// ============================================================================
// Users and clients
// ============================================================================

/// User list filters.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct UserFilter {
    /// Username, name or email substring
    pub q: Option<String>,
    /// Exact staff flag
    pub is_staff: Option<bool>,
    /// Exact active flag
    pub is_active: Option<bool>,
    /// Exact role
    pub role: Option<RoleId>,
}

impl UserFilter {
    fn matches(&self, user: &User) -> bool {
        let query = self.q.as_deref().unwrap_or("").trim().to_lowercase();
        self.is_staff.is_none_or(|staff| staff == user.is_staff)
            && self.is_active.is_none_or(|active| active == user.is_active)
            && self.role.is_none_or(|role| user.role_id == Some(role))
            && (query.is_empty()
                || [&user.username, &user.first_name, &user.last_name, &user.email]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&query)))
    }
}

/// `GET /api/admin/users`
pub async fn list_users(
    State(state): State<AppState>,
    _staff: StaffUser,
    Query(filter): Query<UserFilter>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Page<User>>, AppError> {
    let users = state
        .storage
        .accounts
        .list_users()
        .await
        .map_err(NavieraError::from)?
        .into_iter()
        .filter(|u| filter.matches(u))
        .collect();
    Ok(Json(Page::of(users, page)))
}

/// Back-office account changes.
#[derive(Clone, Debug, Deserialize)]
pub struct UserUpdate {
    /// May use the back office
    pub is_staff: bool,
    /// May log in
    pub is_active: bool,
    /// Staff role
    pub role_id: Option<RoleId>,
}

/// `PUT /api/admin/users/:id`
///
/// Deactivating an account also ends its sessions.
pub async fn update_user(
    State(state): State<AppState>,
    StaffUser(staff): StaffUser,
    Path(id): Path<UserId>,
    payload: Result<Json<UserUpdate>, JsonRejection>,
) -> Result<Json<User>, AppError> {
    let update = body(payload)?;
    let mut user = state
        .storage
        .accounts
        .user(id)
        .await
        .map_err(NavieraError::from)?
        .ok_or_else(|| AppError::not_found("User", id))?;
    if let Some(role) = update.role_id {
        state.catalog.require::<crate::catalog::Role>(role).await?;
    }
    if user.id == staff.user.id && (!update.is_staff || !update.is_active) {
        return Err(AppError::bad_request("You cannot remove your own staff access."));
    }

    user.is_staff = update.is_staff;
    user.is_active = update.is_active;
    user.role_id = update.role_id;
    state.storage.accounts.update_user(&user).await.map_err(NavieraError::from)?;
    if !user.is_active {
        let revoked = state
            .sessions
            .delete_for_user_except(user.id, None)
            .await
            .map_err(NavieraError::from)?;
        info!(user = %user.id, revoked, "Sessions of deactivated account ended");
    }
    info!(user = %user.id, by = %staff.user.id, is_staff = user.is_staff, is_active = user.is_active, "Account access changed");
    Ok(Json(user))
}

/// Client list filters.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ClientFilter {
    /// Name or document substring
    pub q: Option<String>,
    /// Exact nationality (case-insensitive)
    pub nationality: Option<String>,
    /// Exact gender
    pub gender: Option<Gender>,
}

impl ClientFilter {
    fn matches(&self, client: &Client) -> bool {
        let query = self.q.as_deref().unwrap_or("").trim().to_lowercase();
        self.gender.is_none_or(|gender| gender == client.gender)
            && self
                .nationality
                .as_deref()
                .is_none_or(|n| n.trim().eq_ignore_ascii_case(client.nationality.trim()))
            && (query.is_empty()
                || [&client.first_name, &client.last_name, &client.dni]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&query)))
    }
}

/// `GET /api/admin/clients`
pub async fn list_clients(
    State(state): State<AppState>,
    _staff: StaffUser,
    Query(filter): Query<ClientFilter>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Page<Client>>, AppError> {
    let clients = state
        .storage
        .accounts
        .list_clients()
        .await
        .map_err(NavieraError::from)?
        .into_iter()
        .filter(|c| filter.matches(c))
        .collect();
    Ok(Json(Page::of(clients, page)))
}

// ============================================================================
// Cabin occupancies
// ============================================================================

/// Occupancy list filter.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
pub struct OccupancyFilter {
    /// Only this leg
    pub voyage_ship: Option<VoyageShipId>,
}

/// `GET /api/admin/occupancies?voyage_ship=..`
pub async fn list_occupancies(
    State(state): State<AppState>,
    _staff: StaffUser,
    Query(filter): Query<OccupancyFilter>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Page<CabinOccupancy>>, AppError> {
    let occupancies = state
        .storage
        .bookings
        .occupancies(filter.voyage_ship)
        .await
        .map_err(NavieraError::from)?;
    Ok(Json(Page::of(occupancies, page)))
}

/// A crew cabin to assign.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct CrewCabinRequest {
    /// Crew member
    pub crew_member_id: CrewMemberId,
    /// Leg they are assigned to
    pub voyage_ship_id: VoyageShipId,
    /// Cabin on the leg's ship
    pub cabin_id: CabinId,
}

async fn run_occupancy(state: &AppState, command: OccupancyAction, id: OccupancyId) -> Result<OccupancyAction, AppError> {
    let outcome = state
        .occupancies
        .send_and_wait_for(command, move |a| a.is_outcome_for(id), COMMAND_TIMEOUT)
        .await
        .map_err(command_failed)?;
    match outcome {
        OccupancyAction::OccupancyRejected { error, .. } => Err(error.into()),
        other => Ok(other),
    }
}

/// `POST /api/admin/occupancies` → 201
pub async fn assign_crew_cabin(
    State(state): State<AppState>,
    _staff: StaffUser,
    payload: Result<Json<CrewCabinRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CabinOccupancy>), AppError> {
    let request = body(payload)?;
    let occupancy_id = OccupancyId::new();
    let command = OccupancyAction::AssignCrewCabin {
        occupancy_id,
        crew_member_id: request.crew_member_id,
        voyage_ship_id: request.voyage_ship_id,
        cabin_id: request.cabin_id,
    };
    match run_occupancy(&state, command, occupancy_id).await? {
        OccupancyAction::CrewCabinAssigned { occupancy } => Ok((StatusCode::CREATED, Json(occupancy))),
        other => Err(AppError::internal(format!("Unexpected occupancy outcome: {other:?}"))),
    }
}

/// Reply to a release.
#[derive(Debug, Serialize)]
pub struct Released {
    /// Occupancy that was removed
    pub occupancy_id: OccupancyId,
}

/// `DELETE /api/admin/occupancies/:id`
pub async fn release_occupancy(
    State(state): State<AppState>,
    _staff: StaffUser,
    Path(id): Path<OccupancyId>,
) -> Result<Json<Released>, AppError> {
    match run_occupancy(&state, OccupancyAction::ReleaseOccupancy { occupancy_id: id }, id).await? {
        OccupancyAction::OccupancyReleased { occupancy_id } => Ok(Json(Released { occupancy_id })),
        other => Err(AppError::internal(format!("Unexpected occupancy outcome: {other:?}"))),
    }
}
