//! Mistral OCR provider (Files API + OCR API).

use super::{DocumentKind, ImageData, OcrImage, OcrPage, OcrProvider, OcrRequest, UploadedFile};
use crate::config::AppConfig;
use crate::error::OcrError;
use anyhow::Context;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Hours a signed file URL stays valid.
const SIGNED_URL_EXPIRY_HOURS: u32 = 24;

const HEAD_TIMEOUT: Duration = Duration::from_secs(10);

pub struct MistralOcrProvider {
    api_key: String,
    api_base: String,
    model: String,
    client: reqwest::Client,
}

impl MistralOcrProvider {
    pub fn new(client: reqwest::Client, config: &AppConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            api_base: config.api_base.clone(),
            model: config.model.clone(),
            client,
        }
    }
}

// ── Mistral API request/response types ──────────────────────────────────────

#[derive(Serialize)]
struct OcrApiRequest<'a> {
    model: &'a str,
    document: DocumentSource<'a>,
    include_image_base64: bool,
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum DocumentSource<'a> {
    #[serde(rename = "document_url")]
    Document { document_url: &'a str },
    #[serde(rename = "image_url")]
    Image { image_url: &'a str },
}

#[derive(Deserialize)]
struct OcrApiResponse {
    pages: Vec<MistralPage>,
}

#[derive(Deserialize)]
struct MistralPage {
    index: u32,
    markdown: String,
    #[serde(default)]
    images: Vec<MistralImage>,
}

#[derive(Deserialize)]
struct MistralImage {
    id: String,
    #[serde(default)]
    image_base64: Option<String>,
}

#[derive(Deserialize)]
struct FileUploadResponse {
    id: String,
}

#[derive(Deserialize)]
struct SignedUrlResponse {
    url: String,
}

// ── Provider implementation ─────────────────────────────────────────────────

#[async_trait::async_trait]
impl OcrProvider for MistralOcrProvider {
    fn name(&self) -> &str {
        "mistral_ocr"
    }

    async fn upload(
        &self,
        filename: &str,
        data: &[u8],
        mime: &str,
    ) -> Result<UploadedFile, OcrError> {
        let id = self
            .upload_file(filename, data, mime)
            .await
            .map_err(|e| OcrError::Upload(format!("{:#}", e)))?;

        match self.signed_url(&id).await {
            Ok(url) => Ok(UploadedFile { id, url }),
            Err(e) => {
                // The file is useless without a signed URL.
                if let Err(cleanup) = self.delete_file(&id).await {
                    warn!("MistralOcrProvider: failed cleanup {}: {:#}", id, cleanup);
                }
                Err(OcrError::Upload(format!("{:#}", e)))
            }
        }
    }

    async fn process(&self, request: &OcrRequest) -> Result<Vec<OcrPage>, OcrError> {
        self.run_ocr(request)
            .await
            .map_err(|e| OcrError::OcrCall(format!("{:#}", e)))
    }

    async fn content_type(&self, url: &str) -> Option<String> {
        match self.head_content_type(url).await {
            Ok(content_type) => content_type,
            Err(e) => {
                warn!("MistralOcrProvider: HEAD {} failed: {:#}", url, e);
                None
            }
        }
    }

    async fn discard(&self, upload_id: &str) -> Result<(), OcrError> {
        self.delete_file(upload_id)
            .await
            .map_err(|e| OcrError::Upload(format!("{:#}", e)))
    }
}

impl MistralOcrProvider {
    async fn run_ocr(&self, request: &OcrRequest) -> anyhow::Result<Vec<OcrPage>> {
        let document = match request.document_kind {
            DocumentKind::Document => DocumentSource::Document {
                document_url: &request.reference,
            },
            DocumentKind::Image => DocumentSource::Image {
                image_url: &request.reference,
            },
        };

        let body = OcrApiRequest {
            model: &self.model,
            document,
            include_image_base64: request.options.include_images,
        };

        info!(
            "MistralOcrProvider: calling OCR API (model={}, input={:?}, kind={:?})",
            self.model, request.input_kind, request.document_kind
        );

        let resp = self
            .client
            .post(format!("{}/ocr", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("Failed to send request to Mistral OCR API")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("Mistral OCR API error ({}): {}", status, text);
        }

        let raw_text = resp.text().await?;
        debug!(
            "MistralOcrProvider: raw response ({} bytes): {}",
            raw_text.len(),
            truncate_at_char_boundary(&raw_text, 500)
        );

        let pages = parse_ocr_response(&raw_text)?;
        info!("MistralOcrProvider: received {} pages", pages.len());
        Ok(pages)
    }

    /// Upload raw bytes to the Files API, return the file id.
    async fn upload_file(&self, filename: &str, data: &[u8], mime: &str) -> anyhow::Result<String> {
        use reqwest::multipart::{Form, Part};

        info!(
            "MistralOcrProvider: uploading {} ({} bytes) to Files API",
            filename,
            data.len()
        );

        let part = Part::bytes(data.to_vec())
            .file_name(filename.to_string())
            .mime_str(mime)?;

        let form = Form::new().part("file", part).text("purpose", "ocr");

        let resp = self
            .client
            .post(format!("{}/files", self.api_base))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .context("Failed to send file to Mistral Files API")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("Mistral Files API error ({}): {}", status, text);
        }

        let upload: FileUploadResponse = resp
            .json()
            .await
            .context("Failed to parse Files API response")?;
        info!("MistralOcrProvider: uploaded file_id={}", upload.id);
        Ok(upload.id)
    }

    async fn signed_url(&self, file_id: &str) -> anyhow::Result<String> {
        let resp = self
            .client
            .get(format!("{}/files/{}/url", self.api_base, file_id))
            .query(&[("expiry", SIGNED_URL_EXPIRY_HOURS)])
            .bearer_auth(&self.api_key)
            .send()
            .await
            .context("Failed to request signed URL")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("Mistral signed URL error ({}): {}", status, text);
        }

        let signed: SignedUrlResponse = resp
            .json()
            .await
            .context("Failed to parse signed URL response")?;
        debug!("MistralOcrProvider: signed URL issued for {}", file_id);
        Ok(signed.url)
    }

    /// Ask the document's host how it is served, following redirects.
    async fn head_content_type(&self, url: &str) -> anyhow::Result<Option<String>> {
        let resp = self
            .client
            .head(url)
            .timeout(HEAD_TIMEOUT)
            .send()
            .await
            .context("Failed to fetch URL details")?;

        if !resp.status().is_success() {
            anyhow::bail!("HEAD returned {}", resp.status());
        }

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        debug!("MistralOcrProvider: {} served as {:?}", url, content_type);
        Ok(content_type)
    }

    async fn delete_file(&self, file_id: &str) -> anyhow::Result<()> {
        let resp = self
            .client
            .delete(format!("{}/files/{}", self.api_base, file_id))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .context("Failed to send delete request")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("Mistral file delete error ({}): {}", status, text);
        }

        info!("MistralOcrProvider: deleted file_id={}", file_id);
        Ok(())
    }
}

/// Decode an OCR API response body into pages.
fn parse_ocr_response(raw: &str) -> anyhow::Result<Vec<OcrPage>> {
    let ocr: OcrApiResponse =
        serde_json::from_str(raw).context("Failed to parse Mistral OCR response")?;

    Ok(ocr
        .pages
        .into_iter()
        .map(|p| OcrPage {
            index: p.index,
            markdown: p.markdown,
            images: p.images.into_iter().filter_map(decode_image).collect(),
        })
        .collect())
}

/// Images without a usable payload are dropped; their references stay unresolved.
fn decode_image(image: MistralImage) -> Option<OcrImage> {
    let payload = match image.image_base64 {
        Some(p) if !p.is_empty() => p,
        _ => {
            debug!("MistralOcrProvider: image {} has no payload", image.id);
            return None;
        }
    };

    let data = if payload.starts_with("data:") {
        ImageData::Uri(payload)
    } else {
        match BASE64.decode(payload.as_bytes()) {
            Ok(bytes) => ImageData::Inline {
                mime: mime_from_image_id(&image.id).to_string(),
                bytes,
            },
            Err(e) => {
                warn!("MistralOcrProvider: image {} is not valid base64: {}", image.id, e);
                return None;
            }
        }
    };

    Some(OcrImage { id: image.id, data })
}

fn mime_from_image_id(id: &str) -> &'static str {
    let lower = id.to_ascii_lowercase();
    if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        "image/jpeg"
    } else if lower.ends_with(".gif") {
        "image/gif"
    } else {
        "image/png"
    }
}

fn truncate_at_char_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
