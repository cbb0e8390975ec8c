use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;

/// RepoError
///
/// Failure raised by a `Repository` implementation. Store failures are logged with
/// their operation and collapsed into a 500; rule violations map to client errors.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("{op}: {source}")]
    Database {
        op: &'static str,
        #[source]
        source: sqlx::Error,
    },
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("unique constraint violated: {0}")]
    Duplicate(String),
    /// A category delete found products still referencing it.
    #[error("category still referenced by {} product(s)", .0.product_count)]
    CategoryInUse(CategoryUsage),
    /// A user delete would cascade into categories other accounts' products use.
    #[error("user categories referenced by {} foreign product(s)", .0.product_count)]
    UserCategoriesInUse(CategoryUsage),
    /// A product write named a category that does not exist (any longer).
    #[error("unknown category referenced")]
    MissingCategories,
}

impl RepoError {
    /// Wraps a sqlx failure with the repository operation it came from.
    pub fn database(op: &'static str) -> impl FnOnce(sqlx::Error) -> RepoError {
        move |source| RepoError::Database { op, source }
    }
}

pub type RepoResult<T> = Result<T, RepoError>;

/// CategoryUsage
///
/// Body detail returned when a category cannot be deleted because products still
/// reference it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, Default, PartialEq)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CategoryUsage {
    pub product_count: i64,
    /// At most five names, newest products first.
    pub product_names: Vec<String>,
    pub total_products: i64,
}

/// ApiError
///
/// Every handler failure. Serialized as `{"message": ...}` with the matching status.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Cannot delete category. It is currently used by {} product(s).", .0.product_count)]
    CategoryInUse(CategoryUsage),
    #[error("Internal Server Error")]
    Internal,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) | ApiError::CategoryInUse(_) => StatusCode::CONFLICT,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        ApiError::BadRequest(msg.into())
    }

    pub fn forbidden() -> Self {
        ApiError::Forbidden("Forbidden".to_string())
    }

    pub fn unauthorized() -> Self {
        ApiError::Unauthorized("Unauthorized".to_string())
    }
}

impl From<RepoError> for ApiError {
    fn from(err: RepoError) -> Self {
        match err {
            // A race lost against a unique index is still a client-visible conflict.
            RepoError::Duplicate(what) => ApiError::Conflict(what),
            RepoError::CategoryInUse(usage) => ApiError::CategoryInUse(usage),
            RepoError::UserCategoriesInUse(usage) => ApiError::Conflict(format!(
                "Cannot delete user. Their categories are used by {} product(s) of other accounts.",
                usage.product_count
            )),
            RepoError::MissingCategories => {
                ApiError::bad_request("Invalid categories provided")
            }
            RepoError::Database { op, source } => {
                tracing::error!(op, error = %source, "repository failure");
                ApiError::Internal
            }
            RepoError::Migration(e) => {
                tracing::error!(op = "migrate", error = %e, "repository failure");
                ApiError::Internal
            }
        }
    }
}

// Extractor rejections keep the `{"message": ...}` shape instead of axum's plain text.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection, "rejected request body");
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        if rejection.status().is_server_error() {
            tracing::error!(error = %rejection, "path extraction misconfigured");
            return ApiError::Internal;
        }
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            ApiError::CategoryInUse(usage) => json!({
                "message": self.to_string(),
                "details": usage,
            }),
            _ => json!({ "message": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

/// MessageResponse
///
/// Plain acknowledgement body used by delete/logout style endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, PartialEq)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_failures_carry_their_operation() {
        let err = RepoError::database("get_product")(sqlx::Error::RowNotFound);
        assert!(err.to_string().starts_with("get_product: "));
        assert_eq!(ApiError::from(err).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn rule_violations_map_to_client_errors() {
        let usage = CategoryUsage {
            product_count: 2,
            product_names: vec!["A".into(), "B".into()],
            total_products: 2,
        };
        let api = ApiError::from(RepoError::CategoryInUse(usage.clone()));
        assert_eq!(
            api.to_string(),
            "Cannot delete category. It is currently used by 2 product(s)."
        );
        assert_eq!(
            ApiError::from(RepoError::UserCategoriesInUse(usage)).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(RepoError::MissingCategories).to_string(),
            "Invalid categories provided"
        );
    }
}
