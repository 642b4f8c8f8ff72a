//! Business metrics.
//!
//! Counters are recorded by the reducers when their terminal events are
//! reduced. This module only describes them and installs the exporter.
//!
//! ## Counters
//! - `naviera.bookings.confirmed`
//! - `naviera.bookings.rejected{reason}`
//! - `naviera.reservations.cancelled`
//! - `naviera.payments.recorded{method}`
//! - `naviera.payments.status_changes{status}`

use metrics::describe_counter;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::{Ipv4Addr, SocketAddr};

/// Register descriptions for the business counters.
pub fn register_business_metrics() {
    describe_counter!("naviera.bookings.confirmed", "Reservations committed by the booking wizard");
    describe_counter!(
        "naviera.bookings.rejected",
        "Booking confirmations refused, by reason"
    );
    describe_counter!("naviera.reservations.cancelled", "Reservations cancelled by customers or staff");
    describe_counter!("naviera.payments.recorded", "Payments recorded, by method");
    describe_counter!(
        "naviera.payments.status_changes",
        "Payment status changes, by new status"
    );
    tracing::debug!("Business metrics registered");
}

/// Serve Prometheus metrics on `port`, on all interfaces.
///
/// # Errors
///
/// The exporter could not be installed (port in use, recorder already set).
pub fn install_exporter(port: u16) -> anyhow::Result<()> {
    let address = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    PrometheusBuilder::new()
        .with_http_listener(address)
        .install()?;
    register_business_metrics();
    tracing::info!(%address, "Prometheus exporter listening");
    Ok(())
}
