//! HTTP handlers. Every response, including failures, is an [`Envelope`].

use axum::Json;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Multipart, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use ocr_gateway::core::{GatewayError, GatewayResult};
use ocr_gateway::gateway::OcrGateway;
use ocr_gateway::input::InputSource;
use ocr_gateway::response::{Envelope, PageTable, RecognitionItem};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, error, info, warn};

/// Application state shared across handlers
pub struct AppState {
    pub gateway: OcrGateway,
}

type SharedState = State<Arc<AppState>>;
type UploadBody = Result<Multipart, MultipartRejection>;
type ItemsResponse = Result<Json<Envelope<RecognitionItem>>, ApiError>;
type TablesResponse = Result<Json<Envelope<PageTable>>, ApiError>;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    version: String,
    structure: bool,
}

#[derive(Debug, Deserialize)]
pub struct PathQuery {
    image_path: String,
}

#[derive(Debug, Deserialize)]
pub struct ImageUrlQuery {
    #[serde(rename = "imageUrl")]
    image_url: String,
}

#[derive(Debug, Deserialize)]
pub struct PdfUrlQuery {
    pdf_url: String,
}

#[derive(Debug, Deserialize)]
pub struct UrlQuery {
    url: String,
}

#[derive(Debug, Deserialize)]
pub struct Base64Body {
    base64_str: String,
}

/// Failure returned by a handler.
#[derive(Debug)]
pub enum ApiError {
    Gateway(GatewayError),
    /// The request could not be parsed
    Rejected { status: StatusCode, message: String },
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        ApiError::Gateway(err)
    }
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        ApiError::Rejected {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    /// Keeps 413 for oversized bodies; every other rejection is a 400.
    fn rejected(status: StatusCode, message: String) -> Self {
        let status = if status == StatusCode::PAYLOAD_TOO_LARGE {
            status
        } else {
            StatusCode::BAD_REQUEST
        };
        ApiError::Rejected { status, message }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Gateway(err) => StatusCode::from_u16(err.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            ApiError::Rejected { status, .. } => *status,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::Gateway(err) => err.to_string(),
            ApiError::Rejected { message, .. } => message,
        };
        let body: Envelope<serde_json::Value> = Envelope::failure(status.as_u16(), message);
        (status, Json(body)).into_response()
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::rejected(rejection.status(), rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::rejected(rejection.status(), rejection.body_text())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::rejected(rejection.status(), rejection.body_text())
    }
}

/// Runs one gateway call under a request span with a fresh request id.
async fn respond<T, F>(
    endpoint: &'static str,
    source: &'static str,
    call: F,
) -> Result<Json<Envelope<T>>, ApiError>
where
    F: Future<Output = GatewayResult<Envelope<T>>>,
{
    let request_id = uuid::Uuid::new_v4().to_string();
    let span = tracing::info_span!("request", request_id = %request_id, endpoint);

    async move {
        info!(source, "Processing request");
        let start = Instant::now();
        match call.await {
            Ok(envelope) => {
                info!(
                    items = envelope.data.len(),
                    total_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Request completed"
                );
                Ok(Json(envelope))
            }
            Err(err) => {
                if err.is_client_error() {
                    warn!(error = %err, "Request rejected");
                } else {
                    error!(error = %err, "Request failed");
                }
                Err(ApiError::from(err))
            }
        }
    }
    .instrument(span)
    .await
}

/// Reads the `file` field of a multipart body.
async fn read_upload(multipart: UploadBody) -> Result<InputSource, ApiError> {
    let mut multipart = multipart?;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::rejected(e.status(), e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::rejected(e.status(), e.body_text()))?;
        return Ok(InputSource::Upload {
            filename,
            bytes: bytes.to_vec(),
        });
    }
    Err(ApiError::bad_request("Missing multipart field 'file'"))
}

/// Health check endpoint
pub async fn health(State(state): SharedState) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        structure: state.gateway.supports_structure(),
    })
}

pub async fn not_found() -> ApiError {
    ApiError::Rejected {
        status: StatusCode::NOT_FOUND,
        message: "Not Found".to_string(),
    }
}

pub async fn ocr_by_path(
    State(state): SharedState,
    query: Result<Query<PathQuery>, QueryRejection>,
) -> ItemsResponse {
    let Query(query) = query?;
    let source = InputSource::Path(PathBuf::from(query.image_path));
    respond("ocr/predict-by-path", source.kind(), state.gateway.recognize_text(source)).await
}

pub async fn ocr_by_base64(
    State(state): SharedState,
    body: Result<Json<Base64Body>, JsonRejection>,
) -> ItemsResponse {
    let Json(body) = body?;
    let source = InputSource::Base64(body.base64_str);
    respond("ocr/predict-by-base64", source.kind(), state.gateway.recognize_text(source)).await
}

pub async fn ocr_by_file(State(state): SharedState, multipart: UploadBody) -> ItemsResponse {
    let source = read_upload(multipart).await?;
    respond("ocr/predict-by-file", source.kind(), state.gateway.recognize_text(source)).await
}

pub async fn ocr_by_url(
    State(state): SharedState,
    query: Result<Query<ImageUrlQuery>, QueryRejection>,
) -> ItemsResponse {
    let Query(query) = query?;
    let source = InputSource::Url(query.image_url);
    respond("ocr/predict-by-url", source.kind(), state.gateway.recognize_text(source)).await
}

pub async fn pdf_by_url(
    State(state): SharedState,
    query: Result<Query<PdfUrlQuery>, QueryRejection>,
) -> TablesResponse {
    let Query(query) = query?;
    let source = InputSource::Url(query.pdf_url);
    respond("pdf/predict-by-url", source.kind(), state.gateway.extract_pdf_tables(source)).await
}

pub async fn pdf_by_file(State(state): SharedState, multipart: UploadBody) -> TablesResponse {
    let source = read_upload(multipart).await?;
    respond("pdf/predict-by-file", source.kind(), state.gateway.extract_pdf_tables(source)).await
}

pub async fn structure_by_url(
    State(state): SharedState,
    query: Result<Query<UrlQuery>, QueryRejection>,
) -> ItemsResponse {
    let Query(query) = query?;
    let source = InputSource::Url(query.url);
    respond(
        "structure/predict-by-url",
        source.kind(),
        state.gateway.analyze_structure(source),
    )
    .await
}

pub async fn structure_by_base64(
    State(state): SharedState,
    body: Result<Json<Base64Body>, JsonRejection>,
) -> ItemsResponse {
    let Json(body) = body?;
    let source = InputSource::Base64(body.base64_str);
    respond(
        "structure/predict-by-base64",
        source.kind(),
        state.gateway.analyze_structure(source),
    )
    .await
}

pub async fn structure_by_file(State(state): SharedState, multipart: UploadBody) -> ItemsResponse {
    let source = read_upload(multipart).await?;
    respond(
        "structure/predict-by-file",
        source.kind(),
        state.gateway.analyze_structure(source),
    )
    .await
}

pub async fn structure_tables_by_file(
    State(state): SharedState,
    multipart: UploadBody,
) -> TablesResponse {
    let source = read_upload(multipart).await?;
    respond(
        "structure/tables-by-file",
        source.kind(),
        state.gateway.extract_structure_tables(source),
    )
    .await
}

pub async fn structure_tables_by_url(
    State(state): SharedState,
    query: Result<Query<UrlQuery>, QueryRejection>,
) -> TablesResponse {
    let Query(query) = query?;
    let source = InputSource::Url(query.url);
    respond(
        "structure/tables-by-url",
        source.kind(),
        state.gateway.extract_structure_tables(source),
    )
    .await
}
