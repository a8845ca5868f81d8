//! One OCR round trip: build, call the provider, clean up, normalize.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::OcrError;
use crate::normalize::{normalize, RenderedDocument};
use crate::ocr::OcrProvider;
use crate::request::{self, OcrSource};

#[derive(Clone)]
pub struct OcrService {
    provider: Arc<dyn OcrProvider>,
    max_file_size: usize,
}

impl OcrService {
    pub fn new(provider: Arc<dyn OcrProvider>, max_file_size: usize) -> Self {
        Self {
            provider,
            max_file_size,
        }
    }

    pub async fn run(&self, source: &OcrSource) -> Result<RenderedDocument, OcrError> {
        debug!("Running {:?} request via {}", source.kind(), self.provider.name());
        let request = request::build(self.provider.as_ref(), source, self.max_file_size).await?;

        let result = self.provider.process(&request).await;

        // Uploaded files are removed whether or not OCR succeeded.
        if let Some(upload_id) = &request.upload_id {
            if let Err(e) = self.provider.discard(upload_id).await {
                warn!("Failed to discard upload {}: {}", upload_id, e);
            }
        }

        let pages = result?;
        let document = normalize(&pages);

        info!(
            "OCR complete via {}: {} pages, {} images, {} chars",
            self.provider.name(),
            pages.len(),
            document.images.len(),
            document.markdown.len()
        );
        if !document.unresolved.is_empty() {
            warn!(
                "{} image references left unresolved: {:?}",
                document.unresolved.len(),
                document.unresolved
            );
        }

        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::stub::StubProvider;
    use crate::ocr::{ImageData, OcrImage, OcrPage};
    use std::sync::atomic::Ordering;

    fn sample_pages() -> Vec<OcrPage> {
        vec![OcrPage {
            index: 0,
            markdown: "# Scan\n![img](img-0.jpeg)".to_string(),
            images: vec![OcrImage {
                id: "img-0.jpeg".to_string(),
                data: ImageData::Uri("data:image/jpeg;base64,QUJD".to_string()),
            }],
        }]
    }

    #[tokio::test]
    async fn test_upload_round_trip_discards_file() {
        let provider = Arc::new(StubProvider::with_pages(sample_pages()));
        let service = OcrService::new(provider.clone(), 1024);

        let doc = service
            .run(&OcrSource::Upload {
                filename: "scan.jpg".into(),
                data: vec![0xff, 0xd8],
            })
            .await
            .unwrap();

        assert_eq!(doc.markdown, "# Scan\n![img](data:image/jpeg;base64,QUJD)");
        assert_eq!(provider.uploads.load(Ordering::SeqCst), 1);
        assert_eq!(provider.processes.load(Ordering::SeqCst), 1);
        assert_eq!(provider.discards.load(Ordering::SeqCst), 1);

        let sent = provider.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(sent.reference, "https://files.example/scan.jpg?sig=abc");
    }

    #[tokio::test]
    async fn test_ocr_failure_still_discards_upload() {
        let provider = Arc::new(StubProvider {
            fail_process: Some("503 Service Unavailable".into()),
            ..Default::default()
        });
        let service = OcrService::new(provider.clone(), 1024);

        let err = service
            .run(&OcrSource::Upload {
                filename: "doc.pdf".into(),
                data: b"%PDF".to_vec(),
            })
            .await
            .unwrap_err();

        assert_eq!(err, OcrError::OcrCall("503 Service Unavailable".into()));
        assert_eq!(provider.discards.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_url_round_trip_has_nothing_to_discard() {
        let provider = Arc::new(StubProvider::with_pages(sample_pages()));
        let service = OcrService::new(provider.clone(), 1024);

        let doc = service
            .run(&OcrSource::Url("https://example.com/scan.pdf".into()))
            .await
            .unwrap();

        assert_eq!(doc.images.len(), 1);
        assert_eq!(provider.uploads.load(Ordering::SeqCst), 0);
        assert_eq!(provider.discards.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_validation_error_skips_provider() {
        let provider = Arc::new(StubProvider::default());
        let service = OcrService::new(provider.clone(), 1024);

        let err = service
            .run(&OcrSource::Url("not-a-url".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, OcrError::Validation(_)));
        assert_eq!(provider.remote_calls(), 0);
    }
}
