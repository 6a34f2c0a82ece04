// src/report/template.rs
// =============================================================================
// A tiny template engine for report pages.
//
// Templates are plain text with `{{ name }}` placeholders:
// - {{ url }}             the analyzed page
// - {{ document }}        the whole analysis document as JSON
// - {{ document.a.b }}    a value inside the document (arrays by index)
// - {{ anything_else }}   a global set with `with_global` (e.g. from --define)
//
// Every substituted value is HTML-escaped. Unknown names render as nothing.
// =============================================================================

use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::Path;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::debug;

use super::{Renderer, DEFAULT_TEMPLATE};
use crate::analyzer::Document;
use crate::error::RenderError;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}").expect("Invalid placeholder regex")
});

const BUILTIN_PAGE: &str = include_str!("page.html");

#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    templates: HashMap<String, String>,
    globals: BTreeMap<String, String>,
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateRenderer {
    /// Renderer knowing only the built-in `page.html`.
    pub fn new() -> Self {
        let mut templates = HashMap::new();
        templates.insert(DEFAULT_TEMPLATE.to_string(), BUILTIN_PAGE.to_string());

        let mut globals = BTreeMap::new();
        globals.insert("title".to_string(), "Site speed report".to_string());

        Self { templates, globals }
    }

    /// Adds every file of `dir` as a template, keyed by file name.
    /// Files override built-in templates of the same name.
    pub fn from_dir(dir: &Path) -> Result<Self, RenderError> {
        let load_error = |source: std::io::Error| RenderError::Load {
            path: dir.to_path_buf(),
            source,
        };

        let mut renderer = Self::new();
        for entry in std::fs::read_dir(dir).map_err(load_error)? {
            let path = entry.map_err(load_error)?.path();
            if !path.is_file() {
                continue;
            }
            let Some(id) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let source = std::fs::read_to_string(&path).map_err(|source| RenderError::Load {
                path: path.clone(),
                source,
            })?;
            debug!(template = id, path = %path.display(), "Loaded template");
            renderer.templates.insert(id.to_string(), source);
        }
        Ok(renderer)
    }

    pub fn with_template(mut self, id: impl Into<String>, source: impl Into<String>) -> Self {
        self.templates.insert(id.into(), source.into());
        self
    }

    pub fn with_global(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.globals.insert(key.into(), value.into());
        self
    }

    pub fn has_template(&self, id: &str) -> bool {
        self.templates.contains_key(id)
    }

    fn resolve(&self, name: &str, document: &Document) -> String {
        if name == "url" {
            return document.url().to_string();
        }

        if name == "document" {
            return document.data().to_string();
        }

        if let Some(path) = name.strip_prefix("document.") {
            return match document.lookup(path) {
                Some(serde_json::Value::String(s)) => s.clone(),
                Some(serde_json::Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            };
        }

        self.globals.get(name).cloned().unwrap_or_default()
    }
}

impl Renderer for TemplateRenderer {
    fn render(
        &self,
        document: &Document,
        template: &str,
        sink: &mut dyn Write,
    ) -> Result<(), RenderError> {
        let source = self
            .templates
            .get(template)
            .ok_or_else(|| RenderError::UnknownTemplate(template.to_string()))?;

        let rendered = PLACEHOLDER.replace_all(source, |caps: &Captures| {
            html_escape::encode_quoted_attribute(&self.resolve(&caps[1], document)).into_owned()
        });

        sink.write_all(rendered.as_bytes())?;
        Ok(())
    }
}
