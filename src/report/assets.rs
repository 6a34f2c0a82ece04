// src/report/assets.rs
// =============================================================================
// Static files the report pages link to.
//
// From a source directory laid out as css/, js/ and img/:
// - css/*.css is concatenated into <target>/css/styles.css
// - js/*.js is concatenated into <target>/js/all.js
// - img/* is copied byte for byte into <target>/img/
//
// Files are processed in name order so the bundles are reproducible.
// Missing sub-directories are skipped.
// =============================================================================

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct AssetExporter {
    source_dir: PathBuf,
}

impl AssetExporter {
    pub fn new(source_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
        }
    }

    /// Writes the bundles and images under `target`. Returns the number of
    /// files written.
    pub async fn export(&self, target: &Path) -> io::Result<usize> {
        let mut written = 0;

        let css = list_files(&self.source_dir.join("css"), Some("css")).await?;
        if !css.is_empty() {
            concatenate(&css, &target.join("css").join("styles.css")).await?;
            written += 1;
        }

        let js = list_files(&self.source_dir.join("js"), Some("js")).await?;
        if !js.is_empty() {
            concatenate(&js, &target.join("js").join("all.js")).await?;
            written += 1;
        }

        let images = list_files(&self.source_dir.join("img"), None).await?;
        if !images.is_empty() {
            let img_dir = target.join("img");
            fs::create_dir_all(&img_dir).await?;
            for image in &images {
                if let Some(name) = image.file_name() {
                    fs::copy(image, img_dir.join(name)).await?;
                    written += 1;
                }
            }
        }

        info!(files = written, target = %target.display(), "Exported static assets");
        Ok(written)
    }
}

// Regular files of `dir` (optionally filtered by extension), sorted by name
async fn list_files(dir: &Path, extension: Option<&str>) -> io::Result<Vec<PathBuf>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(dir = %dir.display(), "No assets directory");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e),
    };

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let matches = match extension {
            Some(ext) => path.extension().and_then(|e| e.to_str()) == Some(ext),
            None => true,
        };
        if matches {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

async fn concatenate(files: &[PathBuf], target: &Path) -> io::Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).await?;
    }

    let mut out = fs::File::create(target).await?;
    for file in files {
        let bytes = fs::read(file).await?;
        out.write_all(&bytes).await?;
    }
    out.flush().await?;
    Ok(())
}
