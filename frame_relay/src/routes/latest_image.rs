use crate::server::SharedState;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

pub async fn latest_image(State(state): State<SharedState>) -> Response {
    match state.frame_store.get() {
        Some(frame) => (
            [
                (header::CONTENT_TYPE, "image/jpeg"),
                (header::CACHE_CONTROL, "no-store"),
            ],
            frame.data,
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "No stream yet").into_response(),
    }
}
