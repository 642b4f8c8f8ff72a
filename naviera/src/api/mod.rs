//! HTTP API handlers, by area:
//! - public: home, destinations, offers, ships, contact form
//! - accounts: register, login, logout, menu, profile, password, client
//! - booking: the three-step booking wizard
//! - reservations: the customer's reservations and the back-office list
//! - payments: the customer's payments and back-office recording/review
//! - admin: catalog CRUD, users, clients, crew cabins

pub mod accounts;
pub mod admin;
pub mod booking;
pub mod payments;
pub mod public;
pub mod reservations;

use axum::extract::rejection::JsonRejection;
use axum::Json;
use naviera_runtime::StoreError;
use naviera_web::AppError;
use serde::{Deserialize, Serialize};

/// Default page size for back-office lists.
pub const DEFAULT_PER_PAGE: usize = 25;
/// Largest page size accepted.
pub const MAX_PER_PAGE: usize = 100;

/// Unwrap a JSON body, turning a bad body into an [`AppError`].
pub(crate) fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload.map(|Json(value)| value).map_err(AppError::from)
}

/// Map a store failure while waiting for a command's outcome.
pub(crate) fn command_failed(error: StoreError) -> AppError {
    match error {
        StoreError::Timeout => AppError::timeout("The request took too long. Please try again."),
        StoreError::ShutdownInProgress => AppError::unavailable("The service is shutting down."),
        other => AppError::internal("The request could not be processed").with_source(other.into()),
    }
}

/// `page` and `per_page` query parameters.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
pub struct PageQuery {
    /// 1-based page number
    pub page: Option<usize>,
    /// Items per page
    pub per_page: Option<usize>,
}

/// One page of a list.
#[derive(Clone, Debug, Serialize)]
pub struct Page<T> {
    /// Items on this page
    pub items: Vec<T>,
    /// Items across all pages
    pub total: usize,
    /// This page (1-based)
    pub page: usize,
    /// Page size
    pub per_page: usize,
}

impl<T> Page<T> {
    /// Cut `all` down to the requested page.
    #[must_use]
    pub fn of(all: Vec<T>, query: PageQuery) -> Self {
        let page = query.page.unwrap_or(1).max(1);
        let per_page = query.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE);
        let total = all.len();
        let items = all
            .into_iter()
            .skip((page - 1).saturating_mul(per_page))
            .take(per_page)
            .collect();
        Self {
            items,
            total,
            page,
            per_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_are_clamped() {
        let page = Page::of((1..=60).collect(), PageQuery { page: Some(3), per_page: None });
        assert_eq!(page.items, (51..=60).collect::<Vec<_>>());
        assert_eq!(page.total, 60);

        let page = Page::of((1..=300).collect::<Vec<_>>(), PageQuery { page: Some(0), per_page: Some(500) });
        assert_eq!(page.page, 1);
        assert_eq!(page.per_page, MAX_PER_PAGE);
        assert_eq!(page.items.len(), MAX_PER_PAGE);

        let past_end = Page::of(vec![1, 2, 3], PageQuery { page: Some(9), per_page: Some(2) });
        assert!(past_end.items.is_empty());
    }
}
