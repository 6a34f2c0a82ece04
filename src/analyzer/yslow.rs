// src/analyzer/yslow.rs
// =============================================================================
// Page analysis through PhantomJS running the YSlow script.
//
// Command line:
//   <phantomjs> [--proxy=HOST] [--proxy-type=TYPE] <yslow.js>
//       -d -r <ruleset> -f json [-ua AGENT] [-vp VIEWPORT] <url>
//
// PhantomJS sometimes prints console noise around the report, so the JSON
// object is cut out of stdout (first '{' to last '}') before parsing.
// =============================================================================

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, trace};
use url::Url;

use super::{Analyzer, Document};
use crate::config::AnalyzerConfig;
use crate::error::AnalysisError;

pub struct YSlowAnalyzer {
    config: AnalyzerConfig,
    // Everything but the URL, built once
    base_args: Vec<String>,
}

impl YSlowAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        let base_args = build_base_args(&config);
        Self { config, base_args }
    }

    /// Arguments passed to PhantomJS for `url`.
    pub fn args_for(&self, url: &Url) -> Vec<String> {
        let mut args = self.base_args.clone();
        args.push(url.as_str().to_string());
        args
    }
}

#[async_trait]
impl Analyzer for YSlowAnalyzer {
    async fn analyze(&self, url: &Url) -> Result<Document, AnalysisError> {
        info!(url = %url, "Starting analysis");

        let args = self.args_for(url);
        debug!(program = %self.config.phantomjs.display(), ?args, "Analyzer command");

        let mut command = Command::new(&self.config.phantomjs);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.config.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                return Err(AnalysisError::Spawn {
                    program: self.config.phantomjs.clone(),
                    source,
                })
            }
            Err(_) => {
                return Err(AnalysisError::TimedOut {
                    url: url.clone(),
                    after: self.config.timeout,
                })
            }
        };

        trace!(url = %url, stdout = %String::from_utf8_lossy(&output.stdout), "Analyzer output");

        if !output.status.success() {
            return Err(AnalysisError::ExitStatus {
                url: url.clone(),
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        parse_output(url, &output.stdout)
    }
}

fn build_base_args(config: &AnalyzerConfig) -> Vec<String> {
    let mut args = Vec::new();

    if let Some(host) = non_empty(&config.proxy_host) {
        args.push(format!("--proxy={}", host));
    }
    if let Some(kind) = non_empty(&config.proxy_type) {
        args.push(format!("--proxy-type={}", kind));
    }

    args.push(config.yslow.display().to_string());
    args.extend(["-d", "-r", config.ruleset.as_str(), "-f", "json"].map(String::from));

    if let Some(user_agent) = non_empty(&config.user_agent) {
        args.push("-ua".to_string());
        args.push(user_agent.to_string());
    }
    if let Some(viewport) = non_empty(&config.viewport) {
        args.push("-vp".to_string());
        args.push(viewport.to_string());
    }

    args
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn parse_output(url: &Url, stdout: &[u8]) -> Result<Document, AnalysisError> {
    let text = String::from_utf8_lossy(stdout);

    let json = match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => return Err(AnalysisError::NoOutput { url: url.clone() }),
    };

    let data = serde_json::from_str(json).map_err(|source| AnalysisError::Malformed {
        url: url.clone(),
        source,
    })?;

    Ok(Document::new(url.clone(), data))
}
