use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use super::users::CurrentUser;
use super::{ApiError, ApiResponse, AppState, FileDto, MessageResponse, RenameFileRequest};

fn quoted_etag(etag: &str) -> String {
    format!("\"{etag}\"")
}

/// True when an `If-None-Match` header lists `etag` (weak or strong) or `*`.
fn etag_matches(headers: &HeaderMap, etag: &str) -> bool {
    let quoted = quoted_etag(etag);
    headers
        .get_all(header::IF_NONE_MATCH)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .any(|candidate| {
            candidate == "*" || candidate.trim_start_matches("W/") == quoted
        })
}

/// GET /list-files
pub async fn list_files(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Vec<FileDto>>>, ApiError> {
    let files = state.sync.list(current.id).await?;
    Ok(Json(ApiResponse::success(
        files.into_iter().map(FileDto::from).collect(),
    )))
}

/// GET /files/{*path}
/// Raw bytes with an `ETag`; `If-None-Match` hits return 304.
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let (file, bytes) = state.sync.download(current.id, &path).await?;

    let etag = HeaderValue::from_str(&quoted_etag(&file.etag))
        .map_err(|e| ApiError::internal(format!("Invalid etag header: {e}")))?;

    if etag_matches(&headers, &file.etag) {
        return Ok((StatusCode::NOT_MODIFIED, [(header::ETAG, etag)]).into_response());
    }

    let content_type = mime_guess::from_path(&file.filepath)
        .first_or_octet_stream()
        .to_string();

    Ok((
        [
            (header::ETAG, etag),
            (
                header::CONTENT_TYPE,
                HeaderValue::from_str(&content_type)
                    .unwrap_or(HeaderValue::from_static("application/octet-stream")),
            ),
        ],
        bytes,
    )
        .into_response())
}

/// POST /files/{*path}
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(path): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<ApiResponse<FileDto>>), ApiError> {
    let file = state.sync.upload(current.id, &path, &body).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(FileDto::from(file))),
    ))
}

/// PUT /files/{*path}
pub async fn update_file(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(path): Path<String>,
    body: Bytes,
) -> Result<Json<ApiResponse<FileDto>>, ApiError> {
    let file = state.sync.update(current.id, &path, &body).await?;
    Ok(Json(ApiResponse::success(FileDto::from(file))))
}

/// DELETE /files/{*path}
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(path): Path<String>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.sync.remove(current.id, &path).await?;
    Ok(Json(ApiResponse::success(MessageResponse::new(
        "File deleted",
    ))))
}

/// POST /rename-file
pub async fn rename_file(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Json(payload): Json<RenameFileRequest>,
) -> Result<Json<ApiResponse<FileDto>>, ApiError> {
    let file = state
        .sync
        .rename(current.id, &payload.from, &payload.to)
        .await?;
    Ok(Json(ApiResponse::success(FileDto::from(file))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_etag_matching() {
        let mut headers = HeaderMap::new();
        assert!(!etag_matches(&headers, "abc"));

        headers.insert(header::IF_NONE_MATCH, HeaderValue::from_static("\"abc\""));
        assert!(etag_matches(&headers, "abc"));
        assert!(!etag_matches(&headers, "abd"));

        headers.insert(
            header::IF_NONE_MATCH,
            HeaderValue::from_static("\"zzz\", W/\"abc\""),
        );
        assert!(etag_matches(&headers, "abc"));

        headers.insert(header::IF_NONE_MATCH, HeaderValue::from_static("*"));
        assert!(etag_matches(&headers, "anything"));
    }
}
