use std::path::{Path, PathBuf};

use tracing::debug;

use crate::models::{DeadLetterEntry, HarvestOutput, Manifest};
use crate::{Error, Result};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const DEAD_LETTER_FILE: &str = "failed_downloads.json";

/// Filesystem checkpoint for one account's harvest.
///
/// Everything lives flat under `<root>/<username>/`: one `<slug>.json` per
/// problem, `manifest.json` for the pass scope, and `failed_downloads.json`
/// for the dead letters. Slugs and usernames become path components, so both
/// are validated before any join.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    #[tracing::instrument(level = "debug")]
    pub async fn open(root: impl AsRef<Path> + std::fmt::Debug, username: &str) -> Result<Self> {
        validate_component(username)?;
        let dir = root.as_ref().join(username);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| Error::storage(format!("create {}", dir.display()), e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn output_path(&self, slug: &str) -> Result<PathBuf> {
        validate_component(slug)?;
        Ok(self.dir.join(format!("{slug}.json")))
    }

    #[tracing::instrument(level = "debug", skip_all, fields(slug = %output.problem_slug))]
    pub async fn write_output(&self, output: &HarvestOutput) -> Result<()> {
        let path = self.output_path(&output.problem_slug)?;
        write_json(&path, output).await
    }

    pub async fn output_exists(&self, slug: &str) -> Result<bool> {
        let path = self.output_path(slug)?;
        match tokio::fs::metadata(&path).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::storage(format!("probe {}", path.display()), e)),
        }
    }

    /// Slugs with an output file on disk, sorted for stable reporting.
    pub async fn output_slugs(&self) -> Result<Vec<String>> {
        let mut rd = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| Error::storage(format!("read {}", self.dir.display()), e))?;
        let mut slugs = Vec::new();
        while let Some(entry) = rd
            .next_entry()
            .await
            .map_err(|e| Error::storage(format!("read {}", self.dir.display()), e))?
        {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name == MANIFEST_FILE || name == DEAD_LETTER_FILE {
                continue;
            }
            if let Some(slug) = name.strip_suffix(".json") {
                slugs.push(slug.to_string());
            }
        }
        slugs.sort();
        Ok(slugs)
    }

    #[tracing::instrument(level = "debug", skip_all, fields(count = manifest.count))]
    pub async fn write_manifest(&self, manifest: &Manifest) -> Result<()> {
        write_json(&self.dir.join(MANIFEST_FILE), manifest).await
    }

    pub async fn read_manifest(&self) -> Result<Option<Manifest>> {
        read_json(&self.dir.join(MANIFEST_FILE)).await
    }

    /// Writes the dead letters, or removes the file when the pass was clean
    /// so a stale list can never be mistaken for the current one.
    #[tracing::instrument(level = "debug", skip_all, fields(count = entries.len()))]
    pub async fn write_dead_letters(&self, entries: &[DeadLetterEntry]) -> Result<()> {
        let path = self.dir.join(DEAD_LETTER_FILE);
        if entries.is_empty() {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => debug!("cleared dead-letter file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(Error::storage(format!("remove {}", path.display()), e));
                }
            }
            return Ok(());
        }
        write_json(&path, &entries).await
    }

    pub async fn read_dead_letters(&self) -> Result<Option<Vec<DeadLetterEntry>>> {
        read_json(&self.dir.join(DEAD_LETTER_FILE)).await
    }
}

fn validate_component(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::InvalidInput("path component is empty".to_string()));
    }
    if name.starts_with('/') || name.contains("..") || name.contains('/') || name.contains('\\') {
        return Err(Error::InvalidInput(format!(
            "invalid path component: {name:?}"
        )));
    }
    Ok(())
}

async fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let body = serde_json::to_vec_pretty(value)
        .map_err(|e| Error::storage(format!("encode {}", path.display()), e))?;
    tokio::fs::write(path, body)
        .await
        .map_err(|e| Error::storage(format!("write {}", path.display()), e))?;
    Ok(())
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => {
            let value = serde_json::from_slice(&bytes)
                .map_err(|e| Error::storage(format!("decode {}", path.display()), e))?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::storage(format!("read {}", path.display()), e)),
    }
}
