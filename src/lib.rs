//! VidaPlus clinic management backend: REST handlers over a diesel/PostgreSQL store.

use std::sync::Arc;

use actix_web::web;

pub mod auth;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod schema;
pub mod seed;
pub mod store;
pub mod telemetry;

use store::Store;

/// Wraps a concrete store as the `web::Data<dyn Store>` handlers extract.
pub fn store_data<S: Store>(store: S) -> web::Data<dyn Store> {
    let shared: Arc<dyn Store> = Arc::new(store);
    web::Data::from(shared)
}
