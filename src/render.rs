//! HTML page: the two input forms plus the OCR result.

use html_escape::{encode_double_quoted_attribute, encode_text};
use pulldown_cmark::{html, Event, Options, Parser};

use crate::error::OcrError;
use crate::normalize::{image_uri, RenderedDocument};

pub const EXAMPLE_URL: &str = "https://arxiv.org/pdf/1706.03762";

const STYLE: &str = r#"
body { font-family: 'Helvetica', 'Arial', sans-serif; max-width: 960px; margin: 2rem auto; padding: 0 1rem; color: #222; }
h1, h2, h3 { font-family: 'Helvetica', 'Arial', sans-serif; }
form { border: 1px solid #ddd; border-radius: 6px; padding: 1rem; margin-bottom: 1rem; }
input[type=text] { width: 70%; }
.error { background: #fdecea; border: 1px solid #f5c2c0; padding: 1rem; border-radius: 6px; }
.rendered img { max-width: 100%; }
.rendered table { border-collapse: collapse; }
.rendered td, .rendered th { border: 1px solid #ddd; padding: 4px 8px; }
textarea { width: 100%; font-family: monospace; }
.gallery img { max-height: 200px; margin: 4px; border: 1px solid #ddd; }
"#;

/// Empty form page.
pub fn index_page() -> String {
    page("", "")
}

/// Form page followed by the OCR output.
pub fn result_page(document: &RenderedDocument, url: Option<&str>) -> String {
    let mut body = String::new();

    body.push_str("<h2>Rendered Markdown</h2>\n<div class=\"rendered\">\n");
    body.push_str(&markdown_to_html(&document.markdown));
    body.push_str("</div>\n");

    body.push_str("<h2>Raw Markdown</h2>\n<textarea readonly rows=\"10\">");
    body.push_str(&encode_text(&document.raw_markdown));
    body.push_str("</textarea>\n");

    if !document.images.is_empty() {
        body.push_str(&format!(
            "<h2>Images ({})</h2>\n<div class=\"gallery\">\n",
            document.images.len()
        ));
        for image in &document.images {
            body.push_str(&format!(
                "<img src=\"{}\" alt=\"{}\" title=\"{}\">\n",
                encode_double_quoted_attribute(&image_uri(image)),
                encode_double_quoted_attribute(&image.id),
                encode_double_quoted_attribute(&image.id)
            ));
        }
        body.push_str("</div>\n");
    }

    page(url.unwrap_or(""), &body)
}

pub fn error_page(error: &OcrError, url: Option<&str>) -> String {
    let body = format!(
        "<div class=\"error\"><h2>Error</h2><p>{}</p></div>\n",
        encode_text(&error.to_string())
    );
    page(url.unwrap_or(""), &body)
}

/// Render markdown to HTML. Raw HTML in the input is shown as text.
pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = Parser::new_ext(markdown, options).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });

    let mut html_output = String::new();
    html::push_html(&mut html_output, parser);
    html_output
}

fn page(url_value: &str, result: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Mistral OCR</title>
<style>{style}</style>
</head>
<body>
<h1>Mistral OCR</h1>
<p>Upload a PDF/Image or provide a URL for OCR using Mistral.</p>
<form action="/ocr/file" method="post" enctype="multipart/form-data">
<h3>Upload File</h3>
<input type="file" name="file" accept=".pdf,.png,.jpg,.jpeg">
<button type="submit">Process Uploaded File</button>
</form>
<form action="/ocr/url" method="post">
<h3>Enter URL</h3>
<input type="text" name="url" value="{url}" placeholder="e.g., {example}">
<button type="submit">Process URL</button>
</form>
{result}
</body>
</html>
"#,
        style = STYLE,
        url = encode_double_quoted_attribute(url_value),
        example = EXAMPLE_URL,
        result = result,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::{ImageData, OcrImage};

    #[test]
    fn test_markdown_to_html() {
        let html = markdown_to_html("# Title\n\n![a](data:image/png;base64,AAAA)");
        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<img src=\"data:image/png;base64,AAAA\" alt=\"a\""));
    }

    #[test]
    fn test_raw_html_is_escaped() {
        let html = markdown_to_html("text <script>alert(1)</script>\n\n<div>block</div>");
        assert!(!html.contains("<script>"));
        assert!(!html.contains("<div>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_tables_rendered() {
        let html = markdown_to_html("| a | b |\n|---|---|\n| 1 | 2 |");
        assert!(html.contains("<table>"));
    }

    #[test]
    fn test_result_page_sections() {
        let document = RenderedDocument {
            markdown: "hello <b>".to_string(),
            raw_markdown: "hello <b>".to_string(),
            images: vec![OcrImage {
                id: "img\"1".to_string(),
                data: ImageData::Uri("data:image/png;base64,AA".to_string()),
            }],
            unresolved: vec![],
        };
        let html = result_page(&document, Some("https://example.com/?a=1&b=2"));
        assert!(html.contains("Rendered Markdown"));
        assert!(html.contains("<textarea readonly rows=\"10\">hello &lt;b&gt;</textarea>"));
        assert!(html.contains("Images (1)"));
        assert!(html.contains("alt=\"img&quot;1\""));
        assert!(html.contains("value=\"https://example.com/?a=1&amp;b=2\""));
    }

    #[test]
    fn test_error_page_escapes_message() {
        let html = error_page(&OcrError::Validation("<bad>".into()), None);
        assert!(html.contains("Invalid input: &lt;bad&gt;"));
        assert!(html.contains("name=\"url\" value=\"\""));
    }

    #[test]
    fn test_error_page_keeps_submitted_url() {
        let html = error_page(
            &OcrError::Validation("Invalid URL scheme.".into()),
            Some("ftp://example.com/\"a.pdf"),
        );
        assert!(html.contains("value=\"ftp://example.com/&quot;a.pdf\""));
    }

    #[test]
    fn test_index_page_has_both_forms() {
        let html = index_page();
        assert!(html.contains("action=\"/ocr/file\""));
        assert!(html.contains("action=\"/ocr/url\""));
        assert!(html.contains(EXAMPLE_URL));
    }
}
