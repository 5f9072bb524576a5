use crate::server::SharedState;
use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::instrument;

const FILE_FIELD: &str = "file";

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("No file")]
    MissingFile,
    #[error("Malformed upload: {0}")]
    Multipart(#[from] MultipartError),
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let status = match &self {
            UploadError::MissingFile => StatusCode::BAD_REQUEST,
            UploadError::Multipart(err) => err.status(),
        };
        (status, self.to_string()).into_response()
    }
}

#[instrument(skip(state, multipart))]
pub async fn upload(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> Result<&'static str, UploadError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let data = field.bytes().await?;
        state.frame_store.put(data);
        state.metrics.record_upload();
        return Ok("OK");
    }

    tracing::warn!("Upload without a `{}` field", FILE_FIELD);
    Err(UploadError::MissingFile)
}
