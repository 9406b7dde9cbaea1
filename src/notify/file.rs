use super::{Digest, DigestSink};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Writes each digest as `news_YYYYmmdd_HHMMSS.json` for the fetch/translate stage.
pub struct JsonFileSink {
    dir: PathBuf,
}

impl JsonFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, digest: &Digest) -> PathBuf {
        let stamp = digest.metadata.generated_at.format("%Y%m%d_%H%M%S");
        self.dir.join(format!("news_{stamp}.json"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait::async_trait]
impl DigestSink for JsonFileSink {
    async fn deliver(&self, digest: &Digest) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("creating output dir {}", self.dir.display()))?;
        let path = self.path_for(digest);
        let body = serde_json::to_vec_pretty(digest).context("serializing digest")?;
        tokio::fs::write(&path, body)
            .await
            .with_context(|| format!("writing digest to {}", path.display()))?;
        tracing::info!(target: "notify", path = %path.display(), "digest saved");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "json-file"
    }
}
