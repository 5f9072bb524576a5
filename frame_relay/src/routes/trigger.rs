use crate::{
    analysis::{AnalysisResult, ErrorReason, TriggerSource},
    server::SharedState,
};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use tracing::instrument;

fn status_for(result: &AnalysisResult) -> StatusCode {
    match result {
        AnalysisResult::Success { .. } | AnalysisResult::Warning { .. } => StatusCode::OK,
        AnalysisResult::Error { reason, .. } => match reason {
            ErrorReason::NoFrame => StatusCode::NOT_FOUND,
            ErrorReason::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorReason::UpstreamFailure => StatusCode::INTERNAL_SERVER_ERROR,
        },
    }
}

#[instrument(skip(state))]
pub async fn trigger_analysis(State(state): State<SharedState>) -> impl IntoResponse {
    let result = state.dispatcher.run_ai(TriggerSource::Manual).await;
    (status_for(&result), Json(result))
}
