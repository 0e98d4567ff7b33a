//! REST resource scaffolding for Axum and Sea-ORM.
//!
//! Declare a model once with [`Resource`] and get list/get/create/update/delete
//! endpoints plus nested one-to-many listings. List endpoints translate query
//! strings into filters, orders and pagination applied to a sea-orm `Select`.

pub mod config;
pub mod core;
pub mod errors;
pub mod filtering;
pub mod logging;
pub mod routes;

pub use config::RestConfig;
pub use core::{Capabilities, DeletionPolicy, Record, Resource, ResourceProvider};
pub use errors::{ApiError, ProviderError, QueryError};
pub use filtering::{FindConditions, QueryParams, QueryParser, QueryProfile};
pub use logging::with_access_log;
pub use routes::ResourceController;
