//! Filesystem persistent store
//!
//! Key `data_type/level/identifier` lives at
//! `root/data_type/level/identifier.json`. Each segment is percent-encoded
//! on disk, and segments made only of dots are fully escaped, so any
//! identifier maps to a file inside the root.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::PersistentStore;
use crate::error::{HermesError, Result};
use crate::tools::Payload;

const EXTENSION: &str = "json";

/// Store writing one JSON document per key
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Store rooted at `root`; the directory is created on first write
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let segments: Vec<&str> = key.split('/').collect();
        if segments.len() != 3 {
            return Err(HermesError::Storage(format!(
                "key '{}' is not data_type/level/identifier",
                key
            )));
        }

        let mut path = self.root.clone();
        for (i, segment) in segments.iter().enumerate() {
            if segment.is_empty() {
                return Err(HermesError::Storage(format!(
                    "key '{}' has an empty segment",
                    key
                )));
            }
            let encoded = encode_segment(segment);
            if i == segments.len() - 1 {
                path.push(format!("{}.{}", encoded, EXTENSION));
            } else {
                path.push(encoded);
            }
        }
        Ok(path)
    }

    async fn collect_keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut data_types = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(keys),
            Err(e) => return Err(storage_error("list", &self.root, e)),
        };

        while let Some(data_type) = data_types.next_entry().await? {
            if !data_type.file_type().await?.is_dir() {
                continue;
            }
            let mut levels = tokio::fs::read_dir(data_type.path()).await?;
            while let Some(level) = levels.next_entry().await? {
                if !level.file_type().await?.is_dir() {
                    continue;
                }
                let mut documents = tokio::fs::read_dir(level.path()).await?;
                while let Some(document) = documents.next_entry().await? {
                    let path = document.path();
                    if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                        continue;
                    }
                    if let Some(identifier) = path.file_stem().and_then(|s| s.to_str()) {
                        keys.push(format!(
                            "{}/{}/{}",
                            decode_segment(&data_type.file_name().to_string_lossy()),
                            decode_segment(&level.file_name().to_string_lossy()),
                            decode_segment(identifier)
                        ));
                    }
                }
            }
        }

        keys.sort();
        Ok(keys)
    }
}

fn encode_segment(segment: &str) -> String {
    if segment.chars().all(|c| c == '.') {
        return "%2E".repeat(segment.len());
    }
    urlencoding::encode(segment).into_owned()
}

fn decode_segment(name: &str) -> String {
    urlencoding::decode(name)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| name.to_string())
}

fn storage_error(action: &str, path: &Path, error: impl std::fmt::Display) -> HermesError {
    HermesError::Storage(format!("failed to {} {}: {}", action, path.display(), error))
}

#[async_trait]
impl PersistentStore for FileStore {
    async fn fetch(&self, key: &str) -> Result<Option<Payload>> {
        let path = self.path_for(key)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(storage_error("read", &path, e)),
        };

        let data: Payload =
            serde_json::from_slice(&bytes).map_err(|e| storage_error("decode", &path, e))?;
        Ok(Some(data))
    }

    async fn save(&self, key: &str, data: &Payload) -> Result<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| storage_error("create", parent, e))?;
        }

        let encoded = serde_json::to_vec_pretty(data)?;
        // One staging file per write; concurrent saves of a key never share it.
        let staging = path.with_extension(format!("{}.{}.tmp", EXTENSION, uuid::Uuid::new_v4()));
        tokio::fs::write(&staging, encoded)
            .await
            .map_err(|e| storage_error("write", &staging, e))?;
        if let Err(e) = tokio::fs::rename(&staging, &path).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(storage_error("write", &path, e));
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(storage_error("delete", &path, e)),
        }
    }

    async fn keys(&self) -> Result<Vec<String>> {
        self.collect_keys().await
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error("clear", &self.root, e)),
        }
    }
}
