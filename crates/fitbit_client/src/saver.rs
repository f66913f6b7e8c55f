//! Persistence of raw response bodies.

use crate::FitbitError;
use crate::endpoints::ResponseFormat;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Where one successful response is stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SaveLocation {
    pub endpoint_name: String,
    pub date: NaiveDate,
    pub save_name: String,
    pub user_id: String,
    pub format: ResponseFormat,
}

impl SaveLocation {
    /// `{endpoint_name}/{YYYYMMDD}/{save_name}_{user_id}.{format}`
    pub fn relative_path(&self) -> PathBuf {
        Path::new(&self.endpoint_name)
            .join(self.date.format("%Y%m%d").to_string())
            .join(format!(
                "{}_{}.{}",
                self.save_name,
                self.user_id,
                self.format.extension()
            ))
    }
}

#[async_trait]
pub trait ResponseSaver: Send + Sync {
    /// Store `body` at `location` and return the path written.
    async fn save(&self, location: &SaveLocation, body: &[u8]) -> Result<PathBuf, FitbitError>;
}

/// Saves responses under a base directory on the local file system.
#[derive(Clone, Debug)]
pub struct LocalResponseSaver {
    base_dir: PathBuf,
}

impl LocalResponseSaver {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn path_for(&self, location: &SaveLocation) -> PathBuf {
        self.base_dir.join(location.relative_path())
    }
}

#[async_trait]
impl ResponseSaver for LocalResponseSaver {
    async fn save(&self, location: &SaveLocation, body: &[u8]) -> Result<PathBuf, FitbitError> {
        let path = self.path_for(location);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Written next to the target and renamed so the final name only ever
        // holds a complete body.
        let partial = path.with_extension(format!("{}.part", location.format.extension()));
        let mut file = tokio::fs::File::create(&partial).await?;
        file.write_all(body).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&partial, &path).await?;

        tracing::debug!(path = %path.display(), bytes = body.len(), "response saved");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location() -> SaveLocation {
        SaveLocation {
            endpoint_name: "get_heart_rate_by_date".into(),
            date: NaiveDate::from_ymd_opt(2023, 1, 17).unwrap(),
            save_name: "heart_rate".into(),
            user_id: "ABC123".into(),
            format: ResponseFormat::Json,
        }
    }

    #[test]
    fn relative_path_layout() {
        assert_eq!(
            location().relative_path(),
            Path::new("get_heart_rate_by_date/20230117/heart_rate_ABC123.json")
        );
    }

    #[tokio::test]
    async fn save_creates_directories_and_writes_body() {
        let dir = tempfile::tempdir().unwrap();
        let saver = LocalResponseSaver::new(dir.path());
        let path = saver.save(&location(), b"{\"ok\":true}").await.unwrap();

        assert_eq!(
            path,
            dir.path()
                .join("get_heart_rate_by_date/20230117/heart_rate_ABC123.json")
        );
        assert_eq!(std::fs::read(&path).unwrap(), b"{\"ok\":true}");
        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".part"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn save_overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let saver = LocalResponseSaver::new(dir.path());
        saver.save(&location(), b"old").await.unwrap();
        let path = saver.save(&location(), b"new").await.unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"new");
    }
}
