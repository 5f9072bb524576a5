use crate::{
    analysis::{AnalysisResult, InferencePayload, TriggerSource},
    frame_store::FrameStore,
    freshness::{frame_age, is_stale, DEFAULT_MAX_FRAME_AGE},
    inference::{InferenceClient, InferenceError},
    telemetry::Metrics,
};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::time::timeout;
use tracing::instrument;

pub const DEFAULT_INFERENCE_TIMEOUT: Duration = Duration::from_secs(20);

/// Runs one analysis of the latest frame against the inference service.
///
/// Shared by the manual HTTP trigger and the message-bus bridge; both get
/// the same checks and the same result shape.
pub struct Dispatcher {
    frame_store: Arc<FrameStore>,
    client: Arc<dyn InferenceClient>,
    max_frame_age: Duration,
    request_timeout: Duration,
    metrics: Option<Arc<Metrics>>,
}

impl Dispatcher {
    pub fn new(frame_store: Arc<FrameStore>, client: Arc<dyn InferenceClient>) -> Self {
        Self {
            frame_store,
            client,
            max_frame_age: DEFAULT_MAX_FRAME_AGE,
            request_timeout: DEFAULT_INFERENCE_TIMEOUT,
            metrics: None,
        }
    }

    pub fn with_max_frame_age(mut self, max_frame_age: Duration) -> Self {
        self.max_frame_age = max_frame_age;
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    #[instrument(skip(self))]
    pub async fn run_ai(&self, source: TriggerSource) -> AnalysisResult {
        let started = Instant::now();
        let result = self.dispatch(source).await;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        if let Some(metrics) = &self.metrics {
            metrics.record_dispatch(source.as_str(), result.outcome(), elapsed_ms);
        }
        tracing::info!(outcome = result.outcome(), elapsed_ms, "Dispatch finished");

        result
    }

    async fn dispatch(&self, source: TriggerSource) -> AnalysisResult {
        let Some(frame) = self.frame_store.get() else {
            return AnalysisResult::no_frame(source);
        };

        let now = self.frame_store.now();
        if is_stale(frame.received_at, now, self.max_frame_age) {
            tracing::warn!(
                age_ms = frame_age(frame.received_at, now).as_millis() as u64,
                "Latest frame is too old, skipping inference"
            );
            return AnalysisResult::stale_frame(source);
        }

        match timeout(self.request_timeout, self.client.analyze(frame.data)).await {
            Ok(Ok(body)) => AnalysisResult::Success {
                source,
                result: InferencePayload::from_body(body),
            },
            Ok(Err(InferenceError::Timeout)) | Err(_) => {
                tracing::error!(
                    timeout_ms = self.request_timeout.as_millis() as u64,
                    "Inference timed out"
                );
                AnalysisResult::upstream_timeout(source)
            }
            Ok(Err(err)) => {
                tracing::error!("Inference failed: {}", err);
                AnalysisResult::upstream_failure(source, err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{ErrorReason, WarningReason};
    use crate::frame_store::tests::ManualClock;
    use async_trait::async_trait;
    use bytes::Bytes;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Behaviour {
        Respond(&'static str),
        Hang,
        Fail,
    }

    struct MockInferenceClient {
        behaviour: Behaviour,
        calls: AtomicUsize,
    }

    impl MockInferenceClient {
        fn new(behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self {
                behaviour,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl InferenceClient for MockInferenceClient {
        async fn analyze(&self, image: Bytes) -> Result<String, InferenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert!(!image.is_empty());
            match self.behaviour {
                Behaviour::Respond(body) => Ok(body.to_string()),
                Behaviour::Hang => std::future::pending().await,
                Behaviour::Fail => Err(InferenceError::Transport("connection refused".into())),
            }
        }
    }

    /// Fails the call if the frame it receives was torn by a concurrent upload.
    struct UniformFrameClient {
        frame_len: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl InferenceClient for UniformFrameClient {
        async fn analyze(&self, image: Bytes) -> Result<String, InferenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(image.len(), self.frame_len);
            assert!(image.iter().all(|byte| *byte == image[0]));
            tokio::task::yield_now().await;
            Ok(format!(r#"{{"id":{}}}"#, image[0]))
        }
    }

    type Fixture = (
        Arc<ManualClock>,
        Arc<FrameStore>,
        Arc<MockInferenceClient>,
        Dispatcher,
    );

    fn setup(behaviour: Behaviour) -> Fixture {
        let clock = Arc::new(ManualClock::new());
        let store = Arc::new(FrameStore::with_clock(clock.clone()));
        let client = MockInferenceClient::new(behaviour);
        let dispatcher = Dispatcher::new(store.clone(), client.clone());
        (clock, store, client, dispatcher)
    }

    #[tokio::test]
    async fn test_empty_store_reports_no_frame() {
        let (_, _, client, dispatcher) = setup(Behaviour::Respond("{}"));

        let result = dispatcher.run_ai(TriggerSource::Manual).await;

        assert_eq!(result, AnalysisResult::no_frame(TriggerSource::Manual));
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn test_fresh_frame_returns_json_payload() {
        let (_, store, client, dispatcher) =
            setup(Behaviour::Respond(r#"{"prediction":"car"}"#));
        store.put(vec![0xff, 0xd8, 0xff]);

        let result = dispatcher.run_ai(TriggerSource::Manual).await;

        assert_eq!(
            result,
            AnalysisResult::Success {
                source: TriggerSource::Manual,
                result: InferencePayload::Json(json!({"prediction": "car"})),
            }
        );
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn test_non_json_body_is_kept_as_raw_text() {
        let (_, store, _, dispatcher) = setup(Behaviour::Respond("car"));
        store.put(vec![1, 2, 3]);

        let result = dispatcher.run_ai(TriggerSource::Bus).await;

        assert_eq!(
            result,
            AnalysisResult::Success {
                source: TriggerSource::Bus,
                result: InferencePayload::Raw("car".into()),
            }
        );
    }

    #[tokio::test]
    async fn test_stale_frame_skips_inference() {
        let (clock, store, client, dispatcher) = setup(Behaviour::Respond("{}"));
        store.put(vec![1, 2, 3]);
        clock.advance(Duration::from_secs(15));

        let result = dispatcher.run_ai(TriggerSource::Bus).await;

        assert!(matches!(
            result,
            AnalysisResult::Warning {
                source: TriggerSource::Bus,
                reason: WarningReason::StaleFrame,
                ..
            }
        ));
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn test_frame_at_threshold_is_still_analyzed() {
        let (clock, store, client, dispatcher) = setup(Behaviour::Respond("{}"));
        store.put(vec![1, 2, 3]);
        clock.advance(DEFAULT_MAX_FRAME_AGE);

        let result = dispatcher.run_ai(TriggerSource::Manual).await;

        assert_eq!(result.outcome(), "success");
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_service_times_out_after_configured_timeout() {
        let (_, store, client, dispatcher) = setup(Behaviour::Hang);
        let dispatcher = dispatcher.with_request_timeout(Duration::from_secs(20));
        store.put(vec![1, 2, 3]);

        let started = tokio::time::Instant::now();
        let result = dispatcher.run_ai(TriggerSource::Manual).await;

        assert!(started.elapsed() >= Duration::from_secs(20));
        assert!(matches!(
            result,
            AnalysisResult::Error {
                reason: ErrorReason::UpstreamTimeout,
                ..
            }
        ));
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_is_reported() {
        let (_, store, client, dispatcher) = setup(Behaviour::Fail);
        store.put(vec![1, 2, 3]);

        let result = dispatcher.run_ai(TriggerSource::Manual).await;

        assert_eq!(
            result,
            AnalysisResult::upstream_failure(TriggerSource::Manual, "connection refused")
        );
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_dispatches_and_uploads() {
        let store = Arc::new(FrameStore::new());
        let client = Arc::new(UniformFrameClient {
            frame_len: 64,
            calls: AtomicUsize::new(0),
        });
        let dispatcher = Arc::new(Dispatcher::new(store.clone(), client.clone()));
        store.put(vec![0; 64]);

        let mut handles = Vec::new();
        for id in 0..8u8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.put(vec![id; 64]);
            }));
        }
        for _ in 0..8 {
            let dispatcher = dispatcher.clone();
            handles.push(tokio::spawn(async move {
                let result = dispatcher.run_ai(TriggerSource::Bus).await;
                let AnalysisResult::Success {
                    result: InferencePayload::Json(payload),
                    ..
                } = &result
                else {
                    panic!("unexpected dispatch result: {:?}", result);
                };
                assert!(payload["id"].as_u64().unwrap() < 8);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(client.calls.load(Ordering::SeqCst), 8);
    }
}
