use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use sq_core::{Document, QualityLevel, StrategyId};
use sq_engine::{CompressionOutcome, CompressionRequest};

const ROUTES: [&str; 4] = ["/", "/ping", "/compress", "/compress_fast"];

pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(status))
        .route("/ping", get(ping))
}

pub fn compress_routes(body_limit: usize) -> Router<AppState> {
    Router::new()
        .route("/compress", post(compress))
        .route("/compress_fast", post(compress_fast))
        .layer(DefaultBodyLimit::max(body_limit))
}

async fn status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "OK",
        "message": "PDF compression service",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "routes": ROUTES,
    }))
}

async fn ping() -> Json<Value> {
    Json(json!({ "alive": true }))
}

async fn compress(State(state): State<AppState>, multipart: Multipart) -> Result<Response, ApiError> {
    let upload = read_upload(multipart).await?;
    let filename = upload.filename.clone();
    let outcome = state.compressor.compress(upload.into_request()).await?;
    Ok(pdf_response(filename.as_deref(), outcome))
}

async fn compress_fast(State(state): State<AppState>, multipart: Multipart) -> Result<Response, ApiError> {
    let upload = read_upload(multipart).await?;
    let filename = upload.filename.clone();
    let outcome = state
        .compressor
        .compress_with(upload.into_request(), StrategyId::ImageRecode)
        .await?;
    Ok(pdf_response(filename.as_deref(), outcome))
}

/// The `file` and `level` fields of a compression upload.
#[derive(Debug)]
pub struct Upload {
    pub filename: Option<String>,
    pub bytes: Vec<u8>,
    pub level: QualityLevel,
}

impl Upload {
    fn into_request(self) -> CompressionRequest {
        let mut document = Document::new(self.bytes);
        if let Some(name) = self.filename {
            document = document.with_filename(name);
        }
        CompressionRequest::new(document, self.level)
    }
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large(e.body_text())
    } else {
        ApiError::bad_request(e.body_text())
    }
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload, ApiError> {
    let mut file: Option<(Option<String>, Vec<u8>)> = None;
    let mut level = QualityLevel::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().map(str::to_string);
                let data = field.bytes().await.map_err(multipart_error)?;
                tracing::debug!(filename = ?filename, bytes = data.len(), "upload received");
                file = Some((filename, data.to_vec()));
            }
            "level" => {
                let raw = field.text().await.map_err(multipart_error)?;
                level = QualityLevel::parse(&raw);
            }
            _ => {}
        }
    }

    let Some((filename, bytes)) = file else {
        return Err(ApiError::bad_request("no file uploaded"));
    };
    if bytes.is_empty() {
        return Err(ApiError::bad_request("uploaded file is empty"));
    }
    Ok(Upload { filename, bytes, level })
}

/// `<stem>_compressed.pdf`, keeping only the last path component. Quotes,
/// semicolons and control characters are dropped; non-ASCII becomes `_`.
pub fn download_name(filename: Option<&str>) -> String {
    let base = filename
        .and_then(|f| f.rsplit(['/', '\\']).next())
        .unwrap_or("");
    let stem = base
        .strip_suffix(".pdf")
        .or_else(|| base.strip_suffix(".PDF"))
        .unwrap_or(base);
    let clean: String = stem
        .chars()
        .filter(|c| !c.is_control() && *c != '"' && *c != ';')
        .map(|c| if c.is_ascii() { c } else { '_' })
        .collect();
    let clean = clean.trim();
    let stem = if clean.is_empty() { "document" } else { clean };
    format!("{stem}_compressed.pdf")
}

fn pdf_response(filename: Option<&str>, outcome: CompressionOutcome) -> Response {
    let report = outcome.report;
    let headers = [
        (header::CONTENT_TYPE, "application/pdf".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", download_name(filename)),
        ),
        (HeaderName::from_static("x-compression-strategy"), report.strategy_used.clone()),
        (HeaderName::from_static("x-original-size"), report.original_size.to_string()),
        (HeaderName::from_static("x-final-size"), report.final_size.to_string()),
        (HeaderName::from_static("x-compression-effective"), report.effective.to_string()),
        (HeaderName::from_static("x-request-id"), report.request_id.clone()),
    ];
    (StatusCode::OK, headers, Body::from(outcome.document.bytes().to_vec())).into_response()
}
