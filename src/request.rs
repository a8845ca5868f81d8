//! Request builder: turns a form submission into an [`OcrRequest`].

use tracing::{debug, info};
use url::Url;

use crate::error::OcrError;
use crate::ocr::{DocumentKind, InputKind, OcrOptions, OcrProvider, OcrRequest};

/// Raw input as received from the page.
#[derive(Debug, Clone)]
pub enum OcrSource {
    Upload { filename: String, data: Vec<u8> },
    Url(String),
}

impl OcrSource {
    pub fn kind(&self) -> InputKind {
        match self {
            OcrSource::Upload { .. } => InputKind::Upload,
            OcrSource::Url(_) => InputKind::Url,
        }
    }
}

/// Build a request, uploading local files to the provider first.
///
/// Validation happens before any remote call. Upload failures are returned
/// as-is and no request is produced.
pub async fn build(
    provider: &dyn OcrProvider,
    source: &OcrSource,
    max_file_size: usize,
) -> Result<OcrRequest, OcrError> {
    let options = OcrOptions {
        include_images: true,
    };

    match source {
        OcrSource::Upload { filename, data } => {
            if data.is_empty() {
                return Err(OcrError::Upload(format!("{} is empty", filename)));
            }
            if data.len() > max_file_size {
                return Err(OcrError::Upload(format!(
                    "File too large ({:.1}MB). Max is {}MB.",
                    data.len() as f64 / (1024.0 * 1024.0),
                    max_file_size / (1024 * 1024)
                )));
            }
            let document_kind = DocumentKind::from_extension(filename).ok_or_else(|| {
                OcrError::Upload(format!(
                    "Unsupported file format ({}). Please upload PDF, PNG, JPG, JPEG.",
                    filename
                ))
            })?;

            let uploaded = provider
                .upload(filename, data, DocumentKind::mime_for(filename))
                .await?;
            info!(
                "Uploaded {} via {} as {}",
                filename,
                provider.name(),
                uploaded.id
            );

            Ok(OcrRequest {
                input_kind: InputKind::Upload,
                reference: uploaded.url,
                document_kind,
                options,
                upload_id: Some(uploaded.id),
            })
        }
        OcrSource::Url(raw) => {
            let url = validate_url(raw)?;
            let document_kind = url_document_kind(provider, &url).await?;
            debug!("URL request {} as {:?}", url, document_kind);

            Ok(OcrRequest {
                input_kind: InputKind::Url,
                reference: url.to_string(),
                document_kind,
                options,
                upload_id: None,
            })
        }
    }
}

/// Route on the served `Content-Type`; fall back to the path extension when the
/// server gives no usable type.
async fn url_document_kind(provider: &dyn OcrProvider, url: &Url) -> Result<DocumentKind, OcrError> {
    let served = provider.content_type(url.as_str()).await;

    match served.as_deref().and_then(DocumentKind::from_content_type) {
        Some(Ok(kind)) => Ok(kind),
        Some(Err(mime)) => Err(OcrError::Validation(format!(
            "Unsupported type at URL: '{}'. Use PDF, PNG, JPG, JPEG.",
            mime
        ))),
        None => {
            debug!("No usable Content-Type for {} ({:?}), using extension", url, served);
            Ok(DocumentKind::from_extension(url.path()).unwrap_or(DocumentKind::Document))
        }
    }
}

fn validate_url(raw: &str) -> Result<Url, OcrError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(OcrError::Validation("No URL provided.".to_string()));
    }

    let url = Url::parse(trimmed)
        .map_err(|e| OcrError::Validation(format!("Malformed URL {:?}: {}", trimmed, e)))?;

    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        "http" | "https" => Err(OcrError::Validation(format!("URL has no host: {}", trimmed))),
        _ => Err(OcrError::Validation(
            "Invalid URL scheme. Use http:// or https://.".to_string(),
        )),
    }
}
