// src/pipeline/registry.rs
// Claims report file names so two URLs never write to the same file.

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::{debug, warn};
use url::Url;

use crate::error::ReportError;
use crate::report::output_file_name;

/// Answer to a claim.
#[derive(Debug)]
pub enum Claim {
    /// First time this file is asked for: write the report here.
    Fresh(PathBuf),
    /// The same URL was already claimed. Nothing to do.
    Duplicate,
    /// No report can be written for this URL.
    Rejected(ReportError),
}

pub struct OutputRegistry {
    dir: PathBuf,
    // file name -> URL that owns it
    claimed: HashMap<String, Url>,
}

impl OutputRegistry {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            claimed: HashMap::new(),
        }
    }

    pub fn claim(&mut self, url: &Url) -> Claim {
        let Some(file) = output_file_name(url) else {
            return Claim::Rejected(ReportError::NoHost(url.clone()));
        };

        if let Some(existing) = self.claimed.get(&file) {
            if existing == url {
                debug!(url = %url, "URL delivered twice, skipping");
                return Claim::Duplicate;
            }
            warn!(url = %url, file = %file, existing = %existing, "Report file collision");
            return Claim::Rejected(ReportError::Collision {
                file,
                existing: existing.clone(),
            });
        }

        let path = self.dir.join(&file);
        self.claimed.insert(file, url.clone());
        Claim::Fresh(path)
    }

    pub fn len(&self) -> usize {
        self.claimed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claimed.is_empty()
    }
}
