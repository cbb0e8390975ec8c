/// Router Module Index
///
/// Routes are split by the access layer wrapped around them in `create_router`.

/// Routes reachable without a session: health and the sign-in flow.
pub mod public;

/// Routes behind the `AuthUser` route layer. Ownership and admin checks happen in
/// the handlers.
pub mod authenticated;

/// Admin-tier routes, also behind the `AuthUser` route layer.
pub mod admin;

/// Dashboard view endpoints, gated by `permissions::page_guard`.
pub mod pages;
