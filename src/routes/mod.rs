use axum::{routing::get, Router};

use crate::state::AppState;

pub mod categories;
pub mod commissions;
pub mod customers;
pub mod expenses;
pub mod extra_services;
pub mod health;
pub mod identity;
pub mod invoice_counter;
pub mod owners;
pub mod reservations;
pub mod villas;

pub fn v1_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/me", get(identity::me))
        .merge(customers::router())
        .merge(categories::router())
        .merge(villas::router())
        .merge(extra_services::router())
        .merge(reservations::router())
        .merge(expenses::router())
        .merge(owners::router())
        .merge(commissions::router())
        .merge(invoice_counter::router())
}
