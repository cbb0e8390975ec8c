use axum::{
    extract::{FromRequestParts, Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::{AppState, auth::AuthUser, models::Role};

const ADMIN_TIER: &[Role] = &[Role::Admin, Role::Superadmin];
const SUPERADMIN_ONLY: &[Role] = &[Role::Superadmin];

/// PageAccess
///
/// Who may open a dashboard page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageAccess {
    /// Not a page (API, docs, health). The guard lets it through untouched.
    Public,
    /// `/` always sends the visitor to the login form.
    RootRedirect,
    /// Login/register: signed-in visitors are bounced to the dashboard.
    GuestOnly,
    Authenticated,
    Roles(&'static [Role]),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageDecision {
    Allow,
    Redirect(String),
}

/// Matches `prefix` as a whole path segment, so `/dashboard/adminx` is not `/dashboard/admin`.
fn under(path: &str, prefix: &str) -> bool {
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// page_access
///
/// The role/path rule table. More specific prefixes are checked first.
pub fn page_access(path: &str) -> PageAccess {
    if path == "/" {
        return PageAccess::RootRedirect;
    }
    if under(path, "/login") || under(path, "/register") {
        return PageAccess::GuestOnly;
    }
    if under(path, "/dashboard/admin") || under(path, "/dashboard/superadmin") {
        return PageAccess::Roles(SUPERADMIN_ONLY);
    }
    if under(path, "/dashboard/products") || under(path, "/dashboard/categories") {
        return PageAccess::Roles(ADMIN_TIER);
    }
    if under(path, "/dashboard") {
        return PageAccess::Authenticated;
    }
    PageAccess::Public
}

impl PageAccess {
    /// decide
    ///
    /// `role` is `None` for anonymous visitors. `path` is echoed into the login
    /// redirect as `callbackUrl`.
    pub fn decide(self, role: Option<Role>, path: &str) -> PageDecision {
        match (self, role) {
            (PageAccess::Public, _) => PageDecision::Allow,
            (PageAccess::RootRedirect, _) => PageDecision::Redirect("/login".to_string()),
            (PageAccess::GuestOnly, Some(_)) => PageDecision::Redirect("/dashboard".to_string()),
            (PageAccess::GuestOnly, None) => PageDecision::Allow,
            (PageAccess::Authenticated | PageAccess::Roles(_), None) => {
                PageDecision::Redirect(login_redirect(path))
            }
            (PageAccess::Authenticated, Some(_)) => PageDecision::Allow,
            (PageAccess::Roles(allowed), Some(role)) if allowed.contains(&role) => {
                PageDecision::Allow
            }
            (PageAccess::Roles(_), Some(_)) => {
                PageDecision::Redirect("/dashboard?error=unauthorized".to_string())
            }
        }
    }
}

fn login_redirect(path: &str) -> String {
    format!("/login?callbackUrl={}", urlencoding::encode(path))
}

/// page_guard
///
/// Middleware applying `page_access` to every request. A session is resolved with the
/// regular `AuthUser` extractor; when one exists it is stored in the request
/// extensions so page handlers do not resolve it twice.
pub async fn page_guard(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let access = page_access(&path);
    if access == PageAccess::Public {
        return next.run(request).await;
    }

    let (mut parts, body) = request.into_parts();
    let user = AuthUser::from_request_parts(&mut parts, &state).await.ok();

    match access.decide(user.as_ref().map(|u| u.role), &path) {
        PageDecision::Allow => {
            if let Some(user) = user {
                parts.extensions.insert(user);
            }
            next.run(Request::from_parts(parts, body)).await
        }
        PageDecision::Redirect(location) => {
            tracing::debug!(%path, %location, "page guard redirect");
            Redirect::temporary(&location).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_table_matches_prefixes() {
        assert_eq!(page_access("/"), PageAccess::RootRedirect);
        assert_eq!(page_access("/login"), PageAccess::GuestOnly);
        assert_eq!(page_access("/register"), PageAccess::GuestOnly);
        assert_eq!(page_access("/dashboard"), PageAccess::Authenticated);
        assert_eq!(page_access("/dashboard/settings"), PageAccess::Authenticated);
        assert_eq!(page_access("/dashboard/admin"), PageAccess::Roles(SUPERADMIN_ONLY));
        assert_eq!(page_access("/dashboard/superadmin"), PageAccess::Roles(SUPERADMIN_ONLY));
        assert_eq!(
            page_access("/dashboard/products/edit/1"),
            PageAccess::Roles(ADMIN_TIER)
        );
        assert_eq!(page_access("/dashboard/categories"), PageAccess::Roles(ADMIN_TIER));
        assert_eq!(page_access("/api/products"), PageAccess::Public);
        assert_eq!(page_access("/health"), PageAccess::Public);
        assert_eq!(page_access("/dashboardx"), PageAccess::Public);
    }

    #[test]
    fn anonymous_visitors_are_sent_to_login_with_callback() {
        let decision = page_access("/dashboard/products").decide(None, "/dashboard/products");
        assert_eq!(
            decision,
            PageDecision::Redirect("/login?callbackUrl=%2Fdashboard%2Fproducts".to_string())
        );
    }

    #[test]
    fn callback_url_is_percent_encoded() {
        let path = "/dashboard/products/edit/a b&c";
        assert_eq!(
            login_redirect(path),
            "/login?callbackUrl=%2Fdashboard%2Fproducts%2Fedit%2Fa%20b%26c"
        );
    }

    #[test]
    fn guests_only_pages_bounce_signed_in_users() {
        assert_eq!(
            PageAccess::GuestOnly.decide(Some(Role::User), "/login"),
            PageDecision::Redirect("/dashboard".to_string())
        );
        assert_eq!(PageAccess::GuestOnly.decide(None, "/login"), PageDecision::Allow);
    }

    #[test]
    fn role_tiers() {
        let unauthorized = PageDecision::Redirect("/dashboard?error=unauthorized".to_string());
        let products = page_access("/dashboard/products");
        let admin = page_access("/dashboard/admin");

        assert_eq!(products.decide(Some(Role::User), "/dashboard/products"), unauthorized);
        assert_eq!(products.decide(Some(Role::Admin), "/dashboard/products"), PageDecision::Allow);
        assert_eq!(admin.decide(Some(Role::Admin), "/dashboard/admin"), unauthorized);
        assert_eq!(
            admin.decide(Some(Role::Superadmin), "/dashboard/admin"),
            PageDecision::Allow
        );
        assert_eq!(
            page_access("/dashboard").decide(Some(Role::User), "/dashboard"),
            PageDecision::Allow
        );
    }
}
