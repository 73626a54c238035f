//! The user-facing JSON web server. A liveness route and a prediction route
//! that accepts a multipart image upload

use crate::predict::{PredictionError, Predictor};
use actix_cors::Cors;
use actix_multipart::MultipartError;
use actix_web::error::BlockingError;
use actix_web::http::header::ContentType;
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse};
use thiserror::Error;
use tracing::{error, warn};

pub mod protocol;
pub mod routes;

/// Everything a request handler needs, shared across workers
#[derive(Debug)]
pub struct AppState {
    pub predictor: Predictor,

    /// Uploads larger than this are rejected
    pub max_upload_bytes: usize,
}

#[derive(Debug, Error)]
pub enum WebError {
    #[error("missing `file` field in multipart upload")]
    MissingFile,

    #[error("upload exceeds {0} bytes")]
    PayloadTooLarge(usize),

    #[error("malformed multipart body: {0}")]
    Multipart(#[from] MultipartError),

    #[error(transparent)]
    Prediction(#[from] PredictionError),

    #[error("prediction task failed: {0}")]
    Blocking(#[from] BlockingError),
}

impl actix_web::error::ResponseError for WebError {
    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("request failed: {self}");
        } else {
            warn!("rejected request: {self}");
        }

        HttpResponse::build(status)
            .insert_header(ContentType::json())
            .json(protocol::Errors::one(self))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            WebError::MissingFile => StatusCode::UNPROCESSABLE_ENTITY,
            WebError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            WebError::Multipart(_) => StatusCode::BAD_REQUEST,
            WebError::Prediction(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            WebError::Prediction(_) | WebError::Blocking(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Any origin, method and header; no credentials
pub fn cors() -> Cors {
    Cors::default()
        .allow_any_origin()
        .send_wildcard()
        .allow_any_method()
        .allow_any_header()
}

/// Register all routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(routes::home).service(routes::predict);
}
