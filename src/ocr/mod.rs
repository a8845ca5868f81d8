//! OCR provider abstraction.
//!
//! Defines the [`OcrProvider`] trait and the value types that flow through it,
//! so the request builder and the normalizer can be exercised against a stub
//! without network access.

pub mod mistral;

use crate::error::OcrError;

/// How the document reached us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Upload,
    Url,
}

/// Which provider source type the document is submitted as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Document,
    Image,
}

impl DocumentKind {
    /// Guess from a file name or URL path. `None` when the extension is unknown.
    pub fn from_extension(path: &str) -> Option<Self> {
        let ext = path.rsplit_once('.')?.1.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(Self::Document),
            "png" | "jpg" | "jpeg" => Some(Self::Image),
            _ => None,
        }
    }

    /// Map a `Content-Type` header value. `None` for generic binary types,
    /// `Some(Err)` for types the provider cannot read.
    pub fn from_content_type(content_type: &str) -> Option<Result<Self, String>> {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match mime.as_str() {
            "" | "application/octet-stream" | "binary/octet-stream" => None,
            "application/pdf" => Some(Ok(Self::Document)),
            "image/png" | "image/jpeg" | "image/jpg" => Some(Ok(Self::Image)),
            _ => Some(Err(mime)),
        }
    }

    /// MIME type used for the upload part.
    pub fn mime_for(path: &str) -> &'static str {
        let lower = path.to_ascii_lowercase();
        if lower.ends_with(".png") {
            "image/png"
        } else if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
            "image/jpeg"
        } else {
            "application/pdf"
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OcrOptions {
    pub include_images: bool,
}

/// A normalized OCR request, built fresh for every submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrRequest {
    pub input_kind: InputKind,
    /// Remote URL or signed URL of the uploaded file.
    pub reference: String,
    pub document_kind: DocumentKind,
    pub options: OcrOptions,
    /// Provider file id, set for uploads so the file can be discarded afterwards.
    pub upload_id: Option<String>,
}

/// Handle returned by the provider's upload step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub id: String,
    pub url: String,
}

/// Image payload as returned by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageData {
    Inline { mime: String, bytes: Vec<u8> },
    /// Already addressable: a `data:` URI or a remote URL.
    Uri(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrImage {
    pub id: String,
    pub data: ImageData,
}

/// One page of OCR output (0-indexed, as the provider numbers them).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrPage {
    pub index: u32,
    pub markdown: String,
    pub images: Vec<OcrImage>,
}

/// Async capability implemented by each OCR backend.
#[async_trait::async_trait]
pub trait OcrProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Store a local file with the provider and return a reference it can read.
    async fn upload(
        &self,
        filename: &str,
        data: &[u8],
        mime: &str,
    ) -> Result<UploadedFile, OcrError>;

    async fn process(&self, request: &OcrRequest) -> Result<Vec<OcrPage>, OcrError>;

    /// `Content-Type` a remote document is served with, if it can be determined.
    async fn content_type(&self, _url: &str) -> Option<String> {
        None
    }

    /// Release an uploaded file. Providers without storage have nothing to do.
    async fn discard(&self, _upload_id: &str) -> Result<(), OcrError> {
        Ok(())
    }
}

#[cfg(test)]
pub mod stub {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory provider that records every call.
    #[derive(Default)]
    pub struct StubProvider {
        pub pages: Vec<OcrPage>,
        pub fail_upload: Option<String>,
        pub fail_process: Option<String>,
        pub served_type: Option<String>,
        pub uploads: AtomicUsize,
        pub lookups: AtomicUsize,
        pub processes: AtomicUsize,
        pub discards: AtomicUsize,
        pub last_request: Mutex<Option<OcrRequest>>,
    }

    impl StubProvider {
        pub fn with_pages(pages: Vec<OcrPage>) -> Self {
            Self {
                pages,
                ..Default::default()
            }
        }

        pub fn remote_calls(&self) -> usize {
            self.uploads.load(Ordering::SeqCst)
                + self.lookups.load(Ordering::SeqCst)
                + self.processes.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl OcrProvider for StubProvider {
        fn name(&self) -> &str {
            "stub"
        }

        async fn upload(
            &self,
            filename: &str,
            _data: &[u8],
            _mime: &str,
        ) -> Result<UploadedFile, OcrError> {
            self.uploads.fetch_add(1, Ordering::SeqCst);
            if let Some(msg) = &self.fail_upload {
                return Err(OcrError::Upload(msg.clone()));
            }
            Ok(UploadedFile {
                id: format!("file-{}", filename),
                url: format!("https://files.example/{}?sig=abc", filename),
            })
        }

        async fn process(&self, request: &OcrRequest) -> Result<Vec<OcrPage>, OcrError> {
            self.processes.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock().unwrap() = Some(request.clone());
            if let Some(msg) = &self.fail_process {
                return Err(OcrError::OcrCall(msg.clone()));
            }
            Ok(self.pages.clone())
        }

        async fn content_type(&self, _url: &str) -> Option<String> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.served_type.clone()
        }

        async fn discard(&self, _upload_id: &str) -> Result<(), OcrError> {
            self.discards.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }
}
