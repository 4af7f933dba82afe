use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, warn};

use crate::api::AppState;
use crate::services::image_proxy::{ImageProxyError, ImageQuery, ImageRequest};

impl IntoResponse for ImageProxyError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(error = %self, status = status.as_u16(), "image request failed");
        } else {
            warn!(error = %self, status = status.as_u16(), "image request rejected");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// GET /api/images?prompt&width&height&seed&numImages
pub async fn generate_images(
    State(state): State<AppState>,
    Query(query): Query<ImageQuery>,
) -> Result<Json<serde_json::Value>, ImageProxyError> {
    let request = ImageRequest::from_query(&query, state.images.max_count())?;
    let images = state.images.generate(&request).await?;
    Ok(Json(json!({ "imageUrls": images })))
}
