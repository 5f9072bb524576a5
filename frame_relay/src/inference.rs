use crate::config::{InferenceConfig, RequestFormat};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{
    header,
    multipart::{Form, Part},
    Client,
};
use thiserror::Error;
use tracing::instrument;

const JPEG_MIME: &str = "image/jpeg";

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("request timed out")]
    Timeout,
    #[error("{0}")]
    Transport(String),
    #[error("failed to build inference client: {0}")]
    ClientBuild(String),
}

impl From<reqwest::Error> for InferenceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            InferenceError::Timeout
        } else {
            InferenceError::Transport(err.to_string())
        }
    }
}

/// Sends one JPEG to the external inference service and returns the raw
/// response body.
#[async_trait]
pub trait InferenceClient: Send + Sync + 'static {
    async fn analyze(&self, image: Bytes) -> Result<String, InferenceError>;
}

pub struct HttpInferenceClient {
    client: Client,
    url: String,
    request_format: RequestFormat,
    field_name: String,
}

impl HttpInferenceClient {
    pub fn new(config: &InferenceConfig) -> Result<Self, InferenceError> {
        let client = Client::builder()
            .timeout(config.get_timeout())
            .build()
            .map_err(|e| InferenceError::ClientBuild(e.to_string()))?;

        Ok(Self {
            client,
            url: config.url.clone(),
            request_format: config.request_format,
            field_name: config.field_name.clone(),
        })
    }
}

#[async_trait]
impl InferenceClient for HttpInferenceClient {
    #[instrument(skip(self, image), fields(url = %self.url, size_bytes = image.len()))]
    async fn analyze(&self, image: Bytes) -> Result<String, InferenceError> {
        let request = match self.request_format {
            RequestFormat::Binary => self
                .client
                .post(&self.url)
                .header(header::CONTENT_TYPE, JPEG_MIME)
                .body(image),
            RequestFormat::Multipart => {
                let part = Part::stream(image)
                    .file_name("frame.jpg")
                    .mime_str(JPEG_MIME)?;
                let form = Form::new().part(self.field_name.clone(), part);
                self.client.post(&self.url).multipart(form)
            }
        };

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        // Whatever the service answered is handed back as the result payload.
        if !status.is_success() {
            tracing::warn!(
                status = status.as_u16(),
                "Inference service answered with a non-success status"
            );
        }

        Ok(body)
    }
}
