use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    Manual,
    Bus,
}

impl TriggerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerSource::Manual => "manual",
            TriggerSource::Bus => "bus",
        }
    }
}

impl fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body returned by the inference service: JSON when it parses, the raw
/// text otherwise.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum InferencePayload {
    Json(serde_json::Value),
    Raw(String),
}

impl InferencePayload {
    pub fn from_body(body: String) -> Self {
        match serde_json::from_str(&body) {
            Ok(value) => InferencePayload::Json(value),
            Err(_) => InferencePayload::Raw(body),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningReason {
    StaleFrame,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorReason {
    NoFrame,
    UpstreamTimeout,
    UpstreamFailure,
}

/// Outcome of one dispatch, whatever triggered it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisResult {
    Success {
        source: TriggerSource,
        result: InferencePayload,
    },
    Warning {
        source: TriggerSource,
        reason: WarningReason,
        message: String,
    },
    Error {
        source: TriggerSource,
        reason: ErrorReason,
        message: String,
    },
}

impl AnalysisResult {
    pub fn no_frame(source: TriggerSource) -> Self {
        AnalysisResult::Error {
            source,
            reason: ErrorReason::NoFrame,
            message: "no frame available".into(),
        }
    }

    pub fn stale_frame(source: TriggerSource) -> Self {
        AnalysisResult::Warning {
            source,
            reason: WarningReason::StaleFrame,
            message: "frame too old".into(),
        }
    }

    pub fn upstream_timeout(source: TriggerSource) -> Self {
        AnalysisResult::Error {
            source,
            reason: ErrorReason::UpstreamTimeout,
            message: "upstream timed out".into(),
        }
    }

    pub fn upstream_failure(source: TriggerSource, detail: impl fmt::Display) -> Self {
        AnalysisResult::Error {
            source,
            reason: ErrorReason::UpstreamFailure,
            message: format!("upstream failure: {}", detail),
        }
    }

    pub fn source(&self) -> TriggerSource {
        match self {
            AnalysisResult::Success { source, .. }
            | AnalysisResult::Warning { source, .. }
            | AnalysisResult::Error { source, .. } => *source,
        }
    }

    /// Short label used for metrics and logs.
    pub fn outcome(&self) -> &'static str {
        match self {
            AnalysisResult::Success { .. } => "success",
            AnalysisResult::Warning {
                reason: WarningReason::StaleFrame,
                ..
            } => "stale_frame",
            AnalysisResult::Error { reason, .. } => match reason {
                ErrorReason::NoFrame => "no_frame",
                ErrorReason::UpstreamTimeout => "upstream_timeout",
                ErrorReason::UpstreamFailure => "upstream_failure",
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_parses_json_body() {
        let payload = InferencePayload::from_body(r#"{"prediction":"car"}"#.into());
        assert_eq!(payload, InferencePayload::Json(json!({"prediction": "car"})));
    }

    #[test]
    fn test_payload_falls_back_to_raw_text() {
        let payload = InferencePayload::from_body("car, 0.93".into());
        assert_eq!(payload, InferencePayload::Raw("car, 0.93".into()));
    }

    #[test]
    fn test_success_serialization() {
        let result = AnalysisResult::Success {
            source: TriggerSource::Bus,
            result: InferencePayload::Json(json!({"prediction": "car"})),
        };

        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "status": "success",
                "source": "bus",
                "result": {"prediction": "car"}
            })
        );
    }

    #[test]
    fn test_warning_and_error_serialization() {
        assert_eq!(
            serde_json::to_value(AnalysisResult::stale_frame(TriggerSource::Manual)).unwrap(),
            json!({
                "status": "warning",
                "source": "manual",
                "reason": "stale_frame",
                "message": "frame too old"
            })
        );

        assert_eq!(
            serde_json::to_value(AnalysisResult::upstream_failure(
                TriggerSource::Bus,
                "connection refused"
            ))
            .unwrap(),
            json!({
                "status": "error",
                "source": "bus",
                "reason": "upstream_failure",
                "message": "upstream failure: connection refused"
            })
        );
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(AnalysisResult::no_frame(TriggerSource::Manual).outcome(), "no_frame");
        assert_eq!(
            AnalysisResult::upstream_timeout(TriggerSource::Bus).outcome(),
            "upstream_timeout"
        );
        assert_eq!(
            AnalysisResult::stale_frame(TriggerSource::Bus).source(),
            TriggerSource::Bus
        );
    }
}
