//! Route handlers for the liveness check and image prediction

use super::protocol;
use super::{AppState, WebError};
use crate::predict::Prediction;
use actix_multipart::Multipart;
use actix_web::{get, post, web, Responder};
use futures_util::TryStreamExt;
use tracing::debug;

type Result<T> = std::result::Result<T, WebError>;

/// Name of the multipart field carrying the image
pub const FILE_FIELD: &str = "file";

/// Liveness check
#[get("/")]
pub async fn home() -> impl Responder {
    web::Json(protocol::Welcome::default())
}

#[post("/predict/")]
pub async fn predict(
    mut payload: Multipart,
    state: web::Data<AppState>,
) -> Result<web::Json<Prediction>> {
    let bytes = read_file_field(&mut payload, state.max_upload_bytes).await?;
    debug!("received upload of {} bytes", bytes.len());

    // Decoding and inference are CPU bound
    let prediction = {
        let state = state.clone();
        web::block(move || state.predictor.predict(&bytes)).await??
    };

    Ok(web::Json(prediction))
}

/// Collect the bytes of the `file` field, skipping any other fields
async fn read_file_field(payload: &mut Multipart, limit: usize) -> Result<Vec<u8>> {
    while let Some(mut field) = payload.try_next().await? {
        if field.name() != FILE_FIELD {
            continue;
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = field.try_next().await? {
            if bytes.len() + chunk.len() > limit {
                return Err(WebError::PayloadTooLarge(limit));
            }
            bytes.extend_from_slice(&chunk);
        }
        return Ok(bytes);
    }

    Err(WebError::MissingFile)
}
