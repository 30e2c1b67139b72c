//! HTTP seam to the remote transcription service

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use reqwest::multipart::{Form, Part};
use std::io;
use tokio::sync::oneshot;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};
use url::Url;

use crate::error::TransportError;
use crate::request::{ConversionRequest, Endpoint, VideoSource, HEALTH_PATH};

/// Size of the body chunks handed to the HTTP client
const UPLOAD_CHUNK_SIZE: usize = 256 * 1024;

/// Any HTTP response received from the service
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: Bytes,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Remote transcription service
#[async_trait]
pub trait TranscriptionService: Send + Sync {
    /// Fetch the diagnostic health payload. Non-2xx is an error.
    async fn health(&self) -> Result<serde_json::Value, TransportError>;

    /// Upload the request. `body_sent` fires once the whole body has been
    /// handed to the connection. Any received response is returned as-is.
    async fn upload(
        &self,
        request: &ConversionRequest,
        endpoint: Endpoint,
        body_sent: oneshot::Sender<()>,
    ) -> Result<RawResponse, TransportError>;

    /// Base URL requests are resolved against
    fn base_url(&self) -> &Url;
}

/// reqwest-backed service client
#[derive(Debug, Clone)]
pub struct HttpTranscriptionService {
    base_url: Url,
    client: reqwest::Client,
}

impl HttpTranscriptionService {
    pub fn new(base_url: Url) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self { base_url, client })
    }

    pub fn with_client(base_url: Url, client: reqwest::Client) -> Self {
        Self { base_url, client }
    }

    /// Routes are appended to the base, so a base with a path prefix keeps it
    fn url_for(&self, path: &str) -> Result<Url, TransportError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{}{}", base, path))?)
    }

    async fn build_form(
        request: &ConversionRequest,
        body_sent: oneshot::Sender<()>,
    ) -> Result<Form, TransportError> {
        let length = request.file.size();
        let chunks = match &request.file.source {
            VideoSource::Memory(data) => stream::iter(split_chunks(data.clone())).left_stream(),
            VideoSource::Disk { path, .. } => {
                let file = tokio::fs::File::open(path)
                    .await
                    .map_err(|e| TransportError::File(format!("{}: {}", path.display(), e)))?;
                ReaderStream::with_capacity(file, UPLOAD_CHUNK_SIZE).right_stream()
            }
        };

        let body = reqwest::Body::wrap_stream(notify_on_end(chunks, body_sent));
        let file_part = Part::stream_with_length(body, length)
            .file_name(request.file.name.clone())
            .mime_str(&request.file.mime)
            .map_err(|e| TransportError::Body(format!("invalid MIME type: {}", e)))?;

        let mut form = Form::new().part("file", file_part);
        for (name, value) in request.form_fields() {
            form = form.text(name, value);
        }
        Ok(form)
    }
}

fn split_chunks(mut data: Bytes) -> Vec<io::Result<Bytes>> {
    let mut chunks = Vec::with_capacity(data.len() / UPLOAD_CHUNK_SIZE + 1);
    while !data.is_empty() {
        let take = data.len().min(UPLOAD_CHUNK_SIZE);
        chunks.push(Ok(data.split_to(take)));
    }
    chunks
}

/// Pass `chunks` through and fire `body_sent` once they are exhausted
fn notify_on_end<S>(
    chunks: S,
    body_sent: oneshot::Sender<()>,
) -> impl Stream<Item = io::Result<Bytes>> + Send + Sync + 'static
where
    S: Stream<Item = io::Result<Bytes>> + Unpin + Send + Sync + 'static,
{
    stream::unfold(
        (chunks, Some(body_sent)),
        |(mut chunks, mut notify)| async move {
            match chunks.next().await {
                Some(chunk) => Some((chunk, (chunks, notify))),
                None => {
                    if let Some(tx) = notify.take() {
                        let _ = tx.send(());
                    }
                    None
                }
            }
        },
    )
}

#[async_trait]
impl TranscriptionService for HttpTranscriptionService {
    async fn health(&self) -> Result<serde_json::Value, TransportError> {
        let url = self.url_for(HEALTH_PATH)?;
        debug!("Health probe: GET {}", url);

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(TransportError::Status(response.status().as_u16()));
        }

        Ok(response.json::<serde_json::Value>().await?)
    }

    async fn upload(
        &self,
        request: &ConversionRequest,
        endpoint: Endpoint,
        body_sent: oneshot::Sender<()>,
    ) -> Result<RawResponse, TransportError> {
        let url = self.url_for(endpoint.path())?;
        let form = Self::build_form(request, body_sent).await?;

        debug!("Upload: POST {} ({} bytes)", url, request.file.size());

        let response = self.client.post(url).multipart(form).send().await?;
        let status = response.status().as_u16();
        // a status was received; an unreadable body is left for interpretation
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                warn!("Failed to read response body (HTTP {}): {}", status, e);
                Bytes::new()
            }
        };

        Ok(RawResponse { status, body })
    }

    fn base_url(&self) -> &Url {
        &self.base_url
    }
}
