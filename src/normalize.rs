//! Response normalizer: OCR pages to one renderable markdown document.
//!
//! Pure functions, no I/O. Image references of the form `![alt](id)` are
//! rewritten to point at the image payload with the same id on the same page.
//! References with no matching payload are kept as literal text and reported
//! in [`RenderedDocument::unresolved`].

use std::collections::HashMap;
use std::sync::OnceLock;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use regex::{Captures, Regex};

use crate::ocr::{ImageData, OcrImage, OcrPage};

/// Inserted between consecutive pages.
pub const PAGE_SEPARATOR: &str = "\n\n---\n\n";

/// Final document handed to the page renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    /// Page markdown with image references resolved.
    pub markdown: String,
    /// Page markdown exactly as returned by the provider.
    pub raw_markdown: String,
    /// Every image, in page-then-position order.
    pub images: Vec<OcrImage>,
    /// Reference targets that matched no image on their page.
    pub unresolved: Vec<String>,
}

fn image_ref_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"!\[([^\]]*)\]\(([^)\s]+)\)").expect("image reference regex"))
}

/// Concatenate pages in index order and resolve their image references.
pub fn normalize(pages: &[OcrPage]) -> RenderedDocument {
    let mut ordered: Vec<&OcrPage> = pages.iter().collect();
    ordered.sort_by_key(|p| p.index);

    let mut markdown = Vec::with_capacity(ordered.len());
    let mut raw_markdown = Vec::with_capacity(ordered.len());
    let mut images = Vec::new();
    let mut unresolved = Vec::new();

    for page in ordered {
        let (resolved, missing) = resolve_page(page);
        markdown.push(resolved);
        raw_markdown.push(page.markdown.as_str());
        images.extend(page.images.iter().cloned());
        unresolved.extend(missing);
    }

    RenderedDocument {
        markdown: markdown.join(PAGE_SEPARATOR),
        raw_markdown: raw_markdown.join(PAGE_SEPARATOR),
        images,
        unresolved,
    }
}

/// URI a browser can load the image from.
pub fn image_uri(image: &OcrImage) -> String {
    match &image.data {
        ImageData::Uri(uri) => uri.clone(),
        ImageData::Inline { mime, bytes } => {
            format!("data:{};base64,{}", mime, BASE64.encode(bytes))
        }
    }
}

fn resolve_page(page: &OcrPage) -> (String, Vec<String>) {
    // First image wins on duplicate ids.
    let mut by_id: HashMap<&str, &OcrImage> = HashMap::new();
    for image in &page.images {
        by_id.entry(image.id.as_str()).or_insert(image);
    }

    let mut missing = Vec::new();
    let resolved = image_ref_regex().replace_all(&page.markdown, |caps: &Captures| {
        let target = &caps[2];
        match by_id.get(target) {
            Some(image) => format!("![{}]({})", &caps[1], image_uri(image)),
            None => {
                missing.push(target.to_string());
                caps[0].to_string()
            }
        }
    });

    (resolved.into_owned(), missing)
}
