//! HTTP handlers, grouped by resource.
//!
//! Every handler returns `Result<_, ApiError>`; role checks happen inside the handler
//! even where a router layer already authenticated the caller.

pub mod auth;
pub mod categories;
pub mod orders;
pub mod pages;
pub mod products;
pub mod uploads;
pub mod users;
