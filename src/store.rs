// src/store.rs
// Generic file-backed record store: every write goes through a
// tmp-file-then-rename sequence for atomicity.

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub async fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("failed to create store directory {:?}", self.dir))
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    pub async fn write<T: Serialize>(&self, id: &str, record: &T) -> Result<()> {
        self.ensure_dir().await?;
        let final_path = self.path_for(id);
        let tmp_path = self.dir.join(format!("{id}.json.tmp"));

        let body = serde_json::to_vec_pretty(record).context("failed to serialize record")?;
        fs::write(&tmp_path, &body)
            .await
            .with_context(|| format!("failed to write {:?}", tmp_path))?;
        fs::rename(&tmp_path, &final_path)
            .await
            .with_context(|| format!("failed to rename {:?} to {:?}", tmp_path, final_path))?;
        Ok(())
    }

    pub async fn read<T: DeserializeOwned>(&self, id: &str) -> Result<Option<T>> {
        let path = self.path_for(id);
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("failed to read {:?}", path)),
        }
    }

    pub async fn list_ids(&self) -> Result<Vec<String>> {
        self.ensure_dir().await?;
        let mut ids = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        Ok(ids)
    }

    pub async fn list_all<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        let mut out = Vec::new();
        for id in self.list_ids().await? {
            if let Some(record) = self.read::<T>(&id).await? {
                out.push(record);
            }
        }
        Ok(out)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        value: u32,
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::new(tmp.path());
        store.write("abc", &Sample { value: 42 }).await.unwrap();
        let read: Option<Sample> = store.read("abc").await.unwrap();
        assert_eq!(read, Some(Sample { value: 42 }));
    }

    #[tokio::test]
    async fn read_missing_returns_none() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::new(tmp.path());
        let read: Option<Sample> = store.read("missing").await.unwrap();
        assert_eq!(read, None);
    }

    #[tokio::test]
    async fn list_all_reads_every_record() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::new(tmp.path());
        store.write("a", &Sample { value: 1 }).await.unwrap();
        store.write("b", &Sample { value: 2 }).await.unwrap();
        let mut all: Vec<Sample> = store.list_all().await.unwrap();
        all.sort_by_key(|s| s.value);
        assert_eq!(all, vec![Sample { value: 1 }, Sample { value: 2 }]);
    }
}
