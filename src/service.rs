//! Form service contract and its HTTP client.
//!
//! The remote service does OCR, card classification, field extraction,
//! template mapping and PDF rendering. [`FormService`] is the seam the session
//! driver talks to; [`HttpFormService`] speaks the service's HTTP API.

use futures::stream::{self, StreamExt};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, Response};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use std::task::Poll;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::error::{FormFillError, Result};
use crate::record::ResultRecord;
use crate::templates::{TemplateId, FALLBACK_RENDER_TEMPLATE};

const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Template fields as returned by the mapping step, keyed by official form field.
pub type MappedFields = serde_json::Map<String, Value>;

/// An image file to submit for extraction.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub data: Vec<u8>,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            data,
        }
    }

    /// Read an upload from disk.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let data = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        Ok(Self { file_name, data })
    }

    /// MIME type sniffed from the image's magic bytes.
    pub fn mime_type(&self) -> &'static str {
        image::guess_format(&self.data)
            .map(|format| format.to_mime_type())
            .unwrap_or("application/octet-stream")
    }

    pub fn sha256(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.data);
        format!("{:x}", hasher.finalize())
    }
}

/// Body of a successful `POST /extract`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractionPayload {
    #[serde(default)]
    pub card_type: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub fields: HashMap<String, Value>,
    #[serde(default)]
    pub method_used: Option<String>,
    #[serde(default)]
    pub raw_text: Option<String>,
    /// Set instead of the other members when the service gave up (e.g. "OCR failed").
    #[serde(default)]
    pub error: Option<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Serialize)]
struct FieldsRequest<'a, F: Serialize> {
    template: &'a str,
    fields: &'a F,
}

#[derive(Debug, Deserialize)]
struct MapResponse {
    #[serde(default)]
    mapped_fields: Option<MappedFields>,
    #[serde(default)]
    error: Option<String>,
}

/// Remote operations the client depends on.
#[async_trait::async_trait]
pub trait FormService: Send + Sync {
    /// Upload an image and get its extracted fields. `received` fires once the
    /// transport has handed the whole upload to the service.
    async fn extract(&self, upload: &Upload, received: oneshot::Sender<()>)
        -> Result<ExtractionPayload>;

    /// Map extracted fields onto a form template.
    async fn map_fields(&self, template: &TemplateId, fields: &ResultRecord)
        -> Result<MappedFields>;

    /// Render a template PDF from mapped fields.
    async fn render_form_pdf(&self, template: &TemplateId, fields: &MappedFields)
        -> Result<Vec<u8>>;

    /// Render the generic PDF straight from the record.
    async fn render_default_pdf(&self, fields: &ResultRecord) -> Result<Vec<u8>>;
}

/// HTTP client for the form service.
#[derive(Clone)]
pub struct HttpFormService {
    client: Client,
    base_url: String,
}

impl HttpFormService {
    /// `base_url` should be like `http://127.0.0.1:8000` (no trailing slash needed).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FormFillError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Self::new(&config.api_url, Duration::from_secs(config.timeout_secs))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json<F: Serialize + Sync>(
        &self,
        path: &str,
        template: &str,
        fields: &F,
    ) -> Result<Response> {
        let url = self.url(path);
        info!("POST {} (template={})", url, template);
        let resp = self
            .client
            .post(&url)
            .json(&FieldsRequest { template, fields })
            .send()
            .await?;
        ensure_success(resp).await
    }

    async fn read_pdf(resp: Response) -> Result<Vec<u8>> {
        let bytes = resp.bytes().await?;
        if bytes.is_empty() {
            return Err(FormFillError::InvalidResponse("empty PDF body".to_string()));
        }
        debug!("Received PDF ({} bytes)", bytes.len());
        Ok(bytes.to_vec())
    }
}

#[async_trait::async_trait]
impl FormService for HttpFormService {
    async fn extract(
        &self,
        upload: &Upload,
        received: oneshot::Sender<()>,
    ) -> Result<ExtractionPayload> {
        let mime = upload.mime_type();
        info!(
            "Uploading {} ({} bytes, {}, sha256={})",
            upload.file_name,
            upload.data.len(),
            mime,
            upload.sha256()
        );

        let form = Form::new().part("file", file_part(upload, mime, received)?);

        let resp = self
            .client
            .post(self.url("/extract"))
            .multipart(form)
            .send()
            .await?;
        let resp = ensure_success(resp).await?;
        let status = resp.status();

        let raw = resp.text().await?;
        debug!(
            "Extraction response ({} bytes): {}",
            raw.len(),
            raw.chars().take(500).collect::<String>()
        );
        let payload: ExtractionPayload = serde_json::from_str(&raw)
            .map_err(|e| FormFillError::InvalidResponse(format!("extract: {}", e)))?;

        if let Some(error) = &payload.error {
            return Err(FormFillError::Service {
                status: status.as_u16(),
                body: error.clone(),
            });
        }

        info!(
            "Extracted {} fields (card_type={:?}, method={:?})",
            payload.fields.len(),
            payload.card_type,
            payload.method_used
        );
        Ok(payload)
    }

    async fn map_fields(
        &self,
        template: &TemplateId,
        fields: &ResultRecord,
    ) -> Result<MappedFields> {
        let resp = self.post_json("/map", template.as_str(), fields).await?;
        let status = resp.status();
        let body: MapResponse = resp
            .json()
            .await
            .map_err(|e| FormFillError::InvalidResponse(format!("map: {}", e)))?;

        if let Some(error) = body.error {
            return Err(FormFillError::Service {
                status: status.as_u16(),
                body: error,
            });
        }
        let mapped = body
            .mapped_fields
            .ok_or_else(|| FormFillError::InvalidResponse("map: missing mapped_fields".to_string()))?;
        info!("Mapped {} template fields for {}", mapped.len(), template);
        Ok(mapped)
    }

    async fn render_form_pdf(
        &self,
        template: &TemplateId,
        fields: &MappedFields,
    ) -> Result<Vec<u8>> {
        let resp = self
            .post_json("/generate-form-pdf", template.as_str(), fields)
            .await?;
        Self::read_pdf(resp).await
    }

    async fn render_default_pdf(&self, fields: &ResultRecord) -> Result<Vec<u8>> {
        let resp = self
            .post_json("/generate-pdf", FALLBACK_RENDER_TEMPLATE, fields)
            .await?;
        Self::read_pdf(resp).await
    }
}

/// Turn a non-2xx response into [`FormFillError::Service`].
async fn ensure_success(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(FormFillError::Service {
        status: status.as_u16(),
        body,
    })
}

/// Multipart `file` part streaming the upload with the given content type.
fn file_part(upload: &Upload, mime: &str, received: oneshot::Sender<()>) -> Result<Part> {
    Part::stream_with_length(
        upload_body(&upload.data, received),
        upload.data.len() as u64,
    )
    .file_name(upload.file_name.clone())
    .mime_str(mime)
    .map_err(|e| FormFillError::Config(format!("invalid upload MIME type {}: {}", mime, e)))
}

/// Chunked upload body that signals `received` after the last chunk is consumed.
fn upload_body(data: &[u8], received: oneshot::Sender<()>) -> Body {
    let chunks: Vec<std::io::Result<Vec<u8>>> = data
        .chunks(UPLOAD_CHUNK_SIZE)
        .map(|chunk| Ok(chunk.to_vec()))
        .collect();

    let mut received = Some(received);
    let done = stream::poll_fn(move |_| {
        if let Some(tx) = received.take() {
            let _ = tx.send(());
        }
        Poll::Ready(None::<std::io::Result<Vec<u8>>>)
    });

    Body::wrap_stream(stream::iter(chunks).chain(done))
}
