//! Local filesystem backend

use std::path::Path;

use tokio::fs;

use super::error::StoreError;

pub struct FilesystemStore;

impl FilesystemStore {
    pub async fn load(path: &str) -> Result<Vec<u8>, StoreError> {
        // Read directly; map ENOENT to NotFound instead of a separate
        // exists() check, which would race with concurrent deletion.
        fs::read(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound {
                    path: path.to_string(),
                }
            } else {
                StoreError::Io(e)
            }
        })
    }

    pub async fn save(path: &str, content: &str) -> Result<(), StoreError> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, content.as_bytes()).await?;
        tracing::debug!(path, size = content.len(), "local file written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir
            .path()
            .join("a/b/c.json")
            .to_string_lossy()
            .to_string();

        FilesystemStore::save(&path, "x").await.unwrap();
        assert_eq!(FilesystemStore::load(&path).await.unwrap(), b"x");
    }

    #[tokio::test]
    async fn test_overwrite_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json").to_string_lossy().to_string();

        FilesystemStore::save(&path, "first").await.unwrap();
        FilesystemStore::save(&path, "second").await.unwrap();
        assert_eq!(FilesystemStore::load(&path).await.unwrap(), b"second");
    }
}
