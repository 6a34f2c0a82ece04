// src/analyzer/mod.rs
// =============================================================================
// This module turns a URL into a Document.
//
// Submodules:
// - yslow: runs PhantomJS + YSlow as an external process and parses its
//   JSON output
// =============================================================================

mod yslow;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::AnalysisError;

pub use yslow::YSlowAnalyzer;

/// Structured result of analyzing one page.
///
/// Immutable once produced; moved from the analysis task into the single
/// report task that consumes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    url: Url,
    data: serde_json::Value,
}

impl Document {
    pub fn new(url: Url, data: serde_json::Value) -> Self {
        Self { url, data }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn data(&self) -> &serde_json::Value {
        &self.data
    }

    /// Looks up a dotted path (`"stats.js.size"`, `"g.0.score"`) in the data.
    pub fn lookup(&self, path: &str) -> Option<&serde_json::Value> {
        if path.is_empty() {
            return Some(&self.data);
        }
        path.split('.').try_fold(&self.data, |value, segment| match value {
            serde_json::Value::Object(map) => map.get(segment),
            serde_json::Value::Array(items) => {
                segment.parse::<usize>().ok().and_then(|i| items.get(i))
            }
            _ => None,
        })
    }

    pub fn pretty(&self) -> String {
        serde_json::to_string_pretty(&self.data).unwrap_or_else(|_| self.data.to_string())
    }
}

/// Produces a Document for a URL. May fail; failures are never retried.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, url: &Url) -> Result<Document, AnalysisError>;
}
