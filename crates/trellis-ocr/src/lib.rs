//! PDF to markdown conversion through a hosted OCR service.
//!
//! The document is uploaded as a base64 data URL; the service returns one
//! markdown body per page plus any embedded images as base64 payloads.
//! `write_markdown` lays the pages out with `<!-- Page N -->` markers so the
//! ingestion pipeline can recover page numbers later.

use std::path::Path;

use base64::prelude::{Engine, BASE64_STANDARD};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use trellis_core::config::OcrConfig;
use trellis_core::error::{Result, TrellisError};

/// Marker written before each page's markdown body.
pub fn page_marker(page: u32) -> String {
    format!("<!-- Page {} -->", page)
}

/// Read a PDF and encode it as base64.
pub fn encode_pdf(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(BASE64_STANDARD.encode(bytes))
}

pub struct OcrClient {
    http: Client,
    config: OcrConfig,
}

#[derive(Serialize)]
struct OcrRequest {
    model: String,
    document: OcrDocument,
    include_image_base64: bool,
}

#[derive(Serialize)]
struct OcrDocument {
    #[serde(rename = "type")]
    kind: String,
    document_url: String,
}

#[derive(Debug, Deserialize)]
pub struct OcrResponse {
    pub pages: Vec<OcrPage>,
}

#[derive(Debug, Deserialize)]
pub struct OcrPage {
    #[serde(default)]
    pub markdown: String,
    #[serde(default)]
    pub images: Vec<OcrImage>,
}

#[derive(Debug, Deserialize)]
pub struct OcrImage {
    pub id: String,
    #[serde(default)]
    pub image_base64: Option<String>,
}

impl OcrClient {
    pub fn new(config: OcrConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    /// Upload a PDF and return its per-page OCR result.
    pub fn process(&self, pdf_path: &Path) -> Result<OcrResponse> {
        let encoded = encode_pdf(pdf_path)?;
        let url = format!("{}/v1/ocr", self.config.base_url.trim_end_matches('/'));

        let request = OcrRequest {
            model: self.config.model.clone(),
            document: OcrDocument {
                kind: "document_url".to_string(),
                document_url: format!("data:application/pdf;base64,{}", encoded),
            },
            include_image_base64: true,
        };

        info!(pdf = %pdf_path.display(), model = %self.config.model, "submitting document for OCR");

        let mut req = self.http.post(&url).json(&request);
        if let Some(ref key) = self.config.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req
            .send()
            .map_err(|e| TrellisError::Ocr(format!("request failed: {}", e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().unwrap_or_default();
            return Err(TrellisError::Ocr(format!("API error {}: {}", status, body)));
        }

        let body: OcrResponse = resp
            .json()
            .map_err(|e| TrellisError::Ocr(format!("response parse error: {}", e)))?;

        debug!(pages = body.pages.len(), "OCR complete");
        Ok(body)
    }
}

/// Write the OCR result as a single markdown file with page markers, and
/// decode embedded images into `images_dir`.
pub fn write_markdown(response: &OcrResponse, md_path: &Path, images_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(images_dir)?;
    if let Some(parent) = md_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut out = String::new();
    for (idx, page) in response.pages.iter().enumerate() {
        out.push_str(&page_marker(idx as u32 + 1));
        out.push_str("\n\n");
        out.push_str(&page.markdown);
        out.push_str("\n\n---\n\n");

        for image in &page.images {
            let Some(ref data) = image.image_base64 else {
                continue;
            };
            let (ext, bytes) = decode_image(data)?;
            let name = format!("{}.{}", image.id, ext);
            std::fs::write(images_dir.join(&name), bytes)?;
            debug!(image = %name, "wrote embedded image");
        }
    }

    std::fs::write(md_path, out)?;
    info!(path = %md_path.display(), pages = response.pages.len(), "wrote markdown");
    Ok(())
}

/// Decode a `data:image/...;base64,` payload into (extension, bytes).
fn decode_image(data: &str) -> Result<(&'static str, Vec<u8>)> {
    let (prefix, payload) = match data.split_once(',') {
        Some((p, rest)) => (p, rest),
        None => ("", data),
    };
    let ext = if prefix.starts_with("data:image/png") {
        "png"
    } else {
        "jpeg"
    };
    let bytes = BASE64_STANDARD
        .decode(payload)
        .map_err(|e| TrellisError::Ocr(format!("image decode error: {}", e)))?;
    Ok((ext, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_image_png_prefix() {
        let payload = BASE64_STANDARD.encode(b"fake-png");
        let data = format!("data:image/png;base64,{}", payload);
        let (ext, bytes) = decode_image(&data).unwrap();
        assert_eq!(ext, "png");
        assert_eq!(bytes, b"fake-png");
    }

    #[test]
    fn test_decode_image_bare_payload_defaults_to_jpeg() {
        let payload = BASE64_STANDARD.encode(b"fake-jpeg");
        let (ext, bytes) = decode_image(&payload).unwrap();
        assert_eq!(ext, "jpeg");
        assert_eq!(bytes, b"fake-jpeg");
    }

    #[test]
    fn test_decode_image_invalid_base64() {
        assert!(decode_image("data:image/png;base64,!!!").is_err());
    }

    #[test]
    fn test_parse_ocr_response() {
        let raw = r##"{
            "pages": [
                {"index": 0, "markdown": "# Title", "images": [{"id": "img-0", "image_base64": null}]},
                {"index": 1, "markdown": "Body text"}
            ]
        }"##;
        let parsed: OcrResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.pages.len(), 2);
        assert_eq!(parsed.pages[0].markdown, "# Title");
        assert_eq!(parsed.pages[0].images[0].id, "img-0");
        assert!(parsed.pages[1].images.is_empty());
    }

    #[test]
    fn test_write_markdown_layout() {
        let dir = tempfile::tempdir().unwrap();
        let md_path = dir.path().join("out.md");
        let images_dir = dir.path().join("images");

        let payload = BASE64_STANDARD.encode(b"pixels");
        let response = OcrResponse {
            pages: vec![
                OcrPage {
                    markdown: "first page".to_string(),
                    images: vec![OcrImage {
                        id: "img-0".to_string(),
                        image_base64: Some(format!("data:image/png;base64,{}", payload)),
                    }],
                },
                OcrPage {
                    markdown: "second page".to_string(),
                    images: vec![],
                },
            ],
        };

        write_markdown(&response, &md_path, &images_dir).unwrap();

        let written = std::fs::read_to_string(&md_path).unwrap();
        assert!(written.starts_with("<!-- Page 1 -->"));
        assert!(written.contains("<!-- Page 2 -->"));
        assert!(written.contains("first page"));
        assert!(written.contains("\n\n---\n\n"));
        assert_eq!(
            std::fs::read(images_dir.join("img-0.png")).unwrap(),
            b"pixels"
        );
    }
}
