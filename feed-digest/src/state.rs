use crate::types::{FingerprintSet, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Durable set of fingerprints that were already scored.
///
/// Backed by a plain text file, one hex fingerprint per line. The pipeline
/// reads it once before fetching and writes it once after the run resolves,
/// so no locking is done here.
pub struct FingerprintStore {
    path: PathBuf,
}

impl FingerprintStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the set, creating an empty backing file when none exists yet.
    pub async fn load(&self) -> Result<FingerprintSet> {
        if !fs::try_exists(&self.path).await? {
            self.ensure_parent().await?;
            fs::write(&self.path, b"").await?;
            info!("Created empty fingerprint file at {}", self.path.display());
            return Ok(FingerprintSet::new());
        }

        let content = fs::read_to_string(&self.path).await?;
        let set: FingerprintSet = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        debug!("Loaded {} fingerprints from {}", set.len(), self.path.display());
        Ok(set)
    }

    /// Overwrite the file with the whole set, sorted ascending.
    ///
    /// Written to a sibling temp file and renamed over the target so a crash
    /// mid-write never leaves a truncated set behind.
    pub async fn save(&self, set: &FingerprintSet) -> Result<()> {
        self.ensure_parent().await?;

        let mut sorted: Vec<&String> = set.iter().collect();
        sorted.sort();

        let mut body = String::with_capacity(sorted.len() * 65);
        for fingerprint in sorted {
            body.push_str(fingerprint);
            body.push('\n');
        }

        let tmp_path = self.tmp_path();
        fs::write(&tmp_path, body.as_bytes()).await?;
        fs::rename(&tmp_path, &self.path).await?;

        info!("Saved {} fingerprints to {}", set.len(), self.path.display());
        Ok(())
    }

    /// Merge `new` into the set and persist. Returns how many were actually new.
    pub async fn merge_and_save(&self, mut known: FingerprintSet, new: impl IntoIterator<Item = String>) -> Result<usize> {
        let before = known.len();
        known.extend(new);
        let added = known.len() - before;
        self.save(&known).await?;
        Ok(added)
    }

    async fn ensure_parent(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "fingerprints".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
