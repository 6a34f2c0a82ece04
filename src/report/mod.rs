// src/report/mod.rs
// =============================================================================
// This module turns analysis Documents into report files.
//
// Submodules:
// - template: a small placeholder-substitution renderer
// - assets: copies the css/js/img files the reports link to
//
// This file also owns the mapping from a URL to its report file name, so
// every orchestrator names files the same way.
// =============================================================================

mod assets;
mod template;

use std::io::Write;

use url::Url;

use crate::analyzer::Document;
use crate::error::RenderError;

pub use assets::AssetExporter;
pub use template::TemplateRenderer;

/// Id of the template compiled into the binary.
pub const DEFAULT_TEMPLATE: &str = "page.html";

/// Merges a Document into a template and writes the result to `sink`.
pub trait Renderer: Send + Sync {
    fn render(
        &self,
        document: &Document,
        template: &str,
        sink: &mut dyn Write,
    ) -> Result<(), RenderError>;
}

/// Name of the report file for `url`: host + path, '/' replaced by '.',
/// ending in ".html".
///
/// Returns None for URLs without a host.
///
/// Example:
///   http://localhost/test1.html -> localhost.test1.html
///   http://example.com/docs/    -> example.com.docs.html
///   http://example.com          -> example.com.html
pub fn output_file_name(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    let path = url.path().trim_end_matches('/');

    let mut name = format!("{}{}", host, path.replace('/', "."));
    if !name.ends_with(".html") {
        name.push_str(".html");
    }

    Some(sanitize_filename::sanitize(name))
}
