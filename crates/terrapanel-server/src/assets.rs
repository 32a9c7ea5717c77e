//! Static page assets served from a directory.

use std::path::{Component, Path, PathBuf};

use v_htmlescape::escape;

use crate::error::Result;
use crate::http::HttpResponse;

pub const INDEX_FILE: &str = "index.html";
/// Replaced in the index page with the configured header.
pub const HEADER_PLACEHOLDER: &str = "{{control_panel_header}}";

#[derive(Debug, Clone)]
pub struct StaticAssets {
    root: PathBuf,
    header: String,
}

impl StaticAssets {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, header: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            header: header.into(),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File under the root for a request path, or `None` for anything
    /// that could escape it.
    #[must_use]
    pub fn resolve(&self, request_path: &str) -> Option<PathBuf> {
        let relative = request_path.trim_start_matches('/');
        let relative = if relative.is_empty() || relative.ends_with('/') {
            format!("{relative}{INDEX_FILE}")
        } else {
            relative.to_string()
        };
        if relative.contains('\\') || relative.contains('\0') {
            return None;
        }
        let candidate = Path::new(&relative);
        if !candidate
            .components()
            .all(|component| matches!(component, Component::Normal(_)))
        {
            return None;
        }
        Some(self.root.join(candidate))
    }

    /// Response for `GET <request_path>`; 404 when missing or unsafe.
    pub fn respond(&self, request_path: &str) -> Result<HttpResponse> {
        let Some(path) = self.resolve(request_path) else {
            return Ok(HttpResponse::not_found());
        };
        if !path.is_file() {
            return Ok(HttpResponse::not_found());
        }
        let body = std::fs::read(&path)?;
        let content_type = content_type_for(&path);
        if path.file_name().and_then(|name| name.to_str()) == Some(INDEX_FILE) {
            return Ok(HttpResponse::bytes(
                200,
                content_type,
                self.render_index(&body).into_bytes(),
            ));
        }
        Ok(HttpResponse::bytes(200, content_type, body))
    }

    fn render_index(&self, template: &[u8]) -> String {
        let header = escape(&self.header).to_string();
        String::from_utf8_lossy(template).replace(HEADER_PLACEHOLDER, &header)
    }
}

#[must_use]
pub fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "text/javascript; charset=utf-8",
        Some("wasm") => "application/wasm",
        Some("json") => "application/json",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("ico") => "image/x-icon",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}
