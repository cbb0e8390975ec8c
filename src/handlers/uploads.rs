use axum::{Json, extract::State};
use axum_extra::extract::WithRejection;
use uuid::Uuid;

use crate::{
    AppState,
    auth::AuthUser,
    error::{ApiError, MessageResponse},
    models::{PresignedUrlRequest, PresignedUrlResponse},
};

/// Lowercased alphanumeric extension of `filename`, `bin` when there is none.
fn extension_of(filename: &str) -> String {
    std::path::Path::new(filename)
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .map(|ext| {
            ext.chars()
                .filter(char::is_ascii_alphanumeric)
                .collect::<String>()
                .to_ascii_lowercase()
        })
        .filter(|ext| !ext.is_empty())
        .unwrap_or_else(|| "bin".to_string())
}

/// get_presigned_url
///
/// [Authenticated Route] Issues a 10-minute PUT URL for a product image. The object
/// key is generated server-side as `products/<uuid>.<ext>`.
#[utoipa::path(
    post,
    path = "/api/upload/presigned",
    request_body = PresignedUrlRequest,
    responses(
        (status = 200, description = "URL", body = PresignedUrlResponse),
        (status = 400, description = "Not an image", body = MessageResponse)
    )
)]
pub async fn get_presigned_url(
    user: AuthUser,
    State(state): State<AppState>,
    WithRejection(Json(payload), _): WithRejection<Json<PresignedUrlRequest>, ApiError>,
) -> Result<Json<PresignedUrlResponse>, ApiError> {
    let file_type = payload.file_type.trim();
    if !file_type.starts_with("image/") || file_type.len() == "image/".len() {
        return Err(ApiError::bad_request("Only image uploads are allowed"));
    }

    let object_key = format!(
        "products/{}.{}",
        Uuid::new_v4(),
        extension_of(&payload.filename)
    );

    let upload_url = state
        .storage
        .get_presigned_upload_url(&object_key, file_type)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, user_id = %user.id, "presign failed");
            ApiError::Internal
        })?;

    Ok(Json(PresignedUrlResponse {
        upload_url,
        resource_key: object_key,
    }))
}

#[cfg(test)]
mod tests {
    use super::extension_of;

    #[test]
    fn extension_is_normalized() {
        assert_eq!(extension_of("Front.PNG"), "png");
        assert_eq!(extension_of("noext"), "bin");
        assert_eq!(extension_of("weird.p$n/g"), "bin");
    }
}
