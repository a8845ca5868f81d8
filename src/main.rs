//! OCR Viewer - web front-end for the Mistral OCR API.

mod config;
mod error;
mod normalize;
mod ocr;
mod pipeline;
mod render;
mod request;

use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::FormRejection,
        DefaultBodyLimit, Form, Multipart, State,
    },
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Router,
};
use config::AppConfig;
use error::OcrError;
use ocr::mistral::MistralOcrProvider;
use pipeline::OcrService;
use request::OcrSource;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "ocr_viewer=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Fails before anything is served if the credential is missing.
    let config = AppConfig::from_env()?;
    info!("Loaded config: {:?}", config);

    let provider = MistralOcrProvider::new(reqwest::Client::new(), &config);
    let service = OcrService::new(Arc::new(provider), config.max_file_size_bytes());

    let app = router(service, config.body_limit());

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(service: OcrService, body_limit: usize) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/ocr/file", post(ocr_file))
        .route("/ocr/url", post(ocr_url))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

// ============================================================================
// Handlers
// ============================================================================

async fn health() -> &'static str {
    "ok"
}

async fn index() -> Html<String> {
    Html(render::index_page())
}

/// OCR an uploaded PDF or image.
async fn ocr_file(
    State(service): State<OcrService>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Html<String>, OcrError> {
    let mut multipart =
        multipart.map_err(|e| OcrError::Validation(format!("Invalid upload form: {}", e)))?;
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| OcrError::Validation(format!("Multipart error: {}", e)))?
    {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or_default().to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| OcrError::Upload(format!("Failed to read file: {}", e)))?
                .to_vec();
            upload = Some((filename, data));
            break;
        }
    }

    // Browsers send an unnamed empty part when no file was picked.
    let (filename, data) = match upload {
        Some((filename, data)) if !filename.is_empty() => (filename, data),
        _ => return Err(OcrError::Validation("No file uploaded.".to_string())),
    };

    info!("Received file: {} ({} bytes)", filename, data.len());

    let document = service.run(&OcrSource::Upload { filename, data }).await?;
    Ok(Html(render::result_page(&document, None)))
}

#[derive(serde::Deserialize)]
struct UrlForm {
    #[serde(default)]
    url: String,
}

/// OCR a remote PDF or image by URL.
async fn ocr_url(
    State(service): State<OcrService>,
    form: Result<Form<UrlForm>, FormRejection>,
) -> Response {
    let Form(form) = match form {
        Ok(form) => form,
        Err(e) => return OcrError::Validation(format!("Invalid URL form: {}", e)).into_response(),
    };
    let url = form.url.trim();
    info!("Received URL: {}", url);

    match service.run(&OcrSource::Url(url.to_string())).await {
        Ok(document) => Html(render::result_page(&document, Some(url))).into_response(),
        Err(e) => e.into_page(Some(url)),
    }
}
