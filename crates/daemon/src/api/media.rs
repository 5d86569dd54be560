use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{Json, Response},
    routing::{get, put},
    Router,
};
use bytes::Bytes;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};
use tokio_util::codec::{BytesCodec, FramedRead};

use crate::api::{error_response, ApiError};
use crate::orchestrator::assistant::{Assistant, UploadResult};

/// Uploads are whole video files
const MAX_UPLOAD_BYTES: usize = 1024 * 1024 * 1024;

pub fn router(assistant: Arc<Assistant>) -> Router {
    Router::new()
        .route(
            "/assets/:name",
            put(upload_asset).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/preview", get(get_preview))
        .with_state(assistant)
}

async fn upload_asset(
    State(assistant): State<Arc<Assistant>>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Json<UploadResult>, ApiError> {
    assistant
        .upload(&name, &body)
        .await
        .map(Json)
        .map_err(error_response)
}

async fn get_preview(
    State(assistant): State<Arc<Assistant>>,
    headers: HeaderMap,
) -> Result<Response, StatusCode> {
    let path = assistant.preview_path().await.ok_or(StatusCode::NOT_FOUND)?;
    serve_video_file(path, headers).await
}

/// Stream a video file, honouring a single `Range: bytes=` request
async fn serve_video_file(file_path: PathBuf, headers: HeaderMap) -> Result<Response, StatusCode> {
    let metadata = tokio::fs::metadata(&file_path)
        .await
        .map_err(|_| StatusCode::NOT_FOUND)?;
    let file_size = metadata.len();

    if file_size == 0 {
        return Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "video/mp4")
            .header(header::ACCEPT_RANGES, "bytes")
            .header(header::CONTENT_LENGTH, "0")
            .body(Body::empty())
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR);
    }

    let requested = headers
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| parse_range(value, file_size));
    let (start, end, status_code) = match requested {
        Some((start, end)) => (start, end, StatusCode::PARTIAL_CONTENT),
        None => (0, file_size - 1, StatusCode::OK),
    };
    let content_length = end - start + 1;

    let mut file = tokio::fs::File::open(&file_path)
        .await
        .map_err(|_| StatusCode::NOT_FOUND)?;
    file.seek(SeekFrom::Start(start))
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let stream = FramedRead::new(file.take(content_length), BytesCodec::new())
        .map(|result| result.map(|bytes| bytes.freeze()));
    let body = Body::from_stream(stream);

    let mut response_builder = Response::builder()
        .status(status_code)
        .header(header::CONTENT_TYPE, "video/mp4")
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CONTENT_LENGTH, content_length.to_string());

    if status_code == StatusCode::PARTIAL_CONTENT {
        response_builder = response_builder.header(
            header::CONTENT_RANGE,
            format!("bytes {}-{}/{}", start, end, file_size),
        );
    }

    response_builder
        .body(body)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// Inclusive byte range for a non-empty file; `None` means serve everything
fn parse_range(range_str: &str, file_size: u64) -> Option<(u64, u64)> {
    let range = range_str.strip_prefix("bytes=")?;
    let (start_str, end_str) = range.split_once('-')?;
    let (start_str, end_str) = (start_str.trim(), end_str.trim());

    let (start, end) = match (start_str.is_empty(), end_str.is_empty()) {
        (true, true) => return None,
        // "-500": last 500 bytes
        (true, false) => {
            let suffix = end_str.parse::<u64>().ok()?;
            if suffix == 0 {
                return None;
            }
            (file_size.saturating_sub(suffix), file_size - 1)
        }
        // "500-": from byte 500 to the end
        (false, true) => (start_str.parse::<u64>().ok()?, file_size - 1),
        (false, false) => (
            start_str.parse::<u64>().ok()?,
            end_str.parse::<u64>().ok()?.min(file_size - 1),
        ),
    };

    if start > end || start >= file_size {
        return None;
    }
    Some((start, end))
}
