use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::config::StorageConfig;
use crate::images;

// bounded so a stuck clock can't spin forever
const MAX_NAME_ATTEMPTS: u32 = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredUpload {
    Inline(String),
    File(String),
}

#[derive(Debug)]
pub enum LoadError {
    NotFound,
    Io(anyhow::Error),
}

#[derive(Debug, Clone)]
pub enum UploadStorage {
    Memory,
    Disk(PathBuf),
}

impl UploadStorage {
    pub async fn open(config: &StorageConfig) -> Result<Self> {
        let storage = match config {
            StorageConfig::Memory => Self::Memory,
            StorageConfig::Disk(dir) => {
                fs::create_dir_all(dir)
                    .await
                    .with_context(|| format!("failed to create upload directory {}", dir.display()))?;
                info!("storing uploads in {}", dir.display());
                Self::Disk(dir.clone())
            },
        };
        Ok(storage)
    }

    pub fn directory(&self) -> Option<&Path> {
        match self {
            Self::Memory => None,
            Self::Disk(dir) => Some(dir),
        }
    }

    pub async fn store(&self, data: &[u8], mime_type: &str, original_name: Option<&str>) -> Result<StoredUpload> {
        match self {
            Self::Memory => Ok(StoredUpload::Inline(images::base64(data))),
            Self::Disk(dir) => {
                let extension = extension_of(original_name, mime_type);
                let timestamp = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH)?.as_millis();
                let file_id = Self::write_new_file(dir, timestamp, &extension, data).await?;
                Ok(StoredUpload::File(file_id))
            },
        }
    }

    pub async fn load(&self, file_id: &str) -> Result<Vec<u8>, LoadError> {
        let Self::Disk(dir) = self else { return Err(LoadError::NotFound) };
        if !is_plain_file_name(file_id) {
            return Err(LoadError::NotFound)
        }
        let path = dir.join(file_id);
        match fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(LoadError::NotFound),
            Err(e) => Err(LoadError::Io(anyhow::Error::new(e).context(format!("failed to read {}", path.display())))),
        }
    }

    // timestamped names can collide under concurrent uploads; create_new never overwrites
    async fn write_new_file(dir: &Path, timestamp: u128, extension: &str, data: &[u8]) -> Result<String> {
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let file_id = match attempt {
                0 => format!("{timestamp}{extension}"),
                n => format!("{timestamp}-{n}{extension}"),
            };
            let path = dir.join(&file_id);
            let file = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await;
            let file = match file {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e).with_context(|| format!("failed to create {}", path.display())),
            };
            Self::fill_file(&path, file, data).await?;
            info!("stored upload {} ({} bytes)", file_id, data.len());
            return Ok(file_id)
        }
        anyhow::bail!("no free file name for timestamp {}", timestamp)
    }

    // a half-written file must not stay behind as a loadable file id
    async fn fill_file(path: &Path, mut file: File, data: &[u8]) -> Result<()> {
        // tokio buffers writes, so errors can surface at flush
        let mut written = file.write_all(data).await;
        if written.is_ok() {
            written = file.flush().await;
        }
        if let Err(e) = written {
            drop(file);
            if let Err(remove_error) = fs::remove_file(path).await {
                info!("failed to remove partial upload {} {:?}", path.display(), remove_error);
            }
            return Err(e).with_context(|| format!("failed to write {}", path.display()));
        }
        Ok(())
    }
}

fn extension_of(original_name: Option<&str>, mime_type: &str) -> String {
    let from_name = original_name
        .map(Path::new)
        .and_then(Path::extension)
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{ext}"));
    from_name
        .or_else(|| images::extension_for(mime_type).map(String::from))
        .unwrap_or_default()
}

fn is_plain_file_name(file_id: &str) -> bool {
    !file_id.is_empty()
        && file_id != "."
        && file_id != ".."
        && !file_id.contains(['/', '\\', '\0'])
}
