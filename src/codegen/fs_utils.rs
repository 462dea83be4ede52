//! Filesystem utilities for generated output and persisted state

use std::io;
use std::path::Path;

/// Write content to a file, creating parent directories if needed
pub async fn write_file<P: AsRef<Path>, C: AsRef<[u8]>>(path: P, contents: C) -> io::Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    tokio::fs::write(path, contents).await
}

/// Read a file as text, `None` when it does not exist
pub async fn read_if_exists<P: AsRef<Path>>(path: P) -> io::Result<Option<String>> {
    match tokio::fs::read_to_string(path.as_ref()).await {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Remove a file; a missing file is not an error
pub async fn remove_if_exists<P: AsRef<Path>>(path: P) -> io::Result<bool> {
    match tokio::fs::remove_file(path.as_ref()).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_creates_parent_directories() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("Assets/Generated/Foo.cs");

        write_file(&path, "content").await.unwrap();

        assert_eq!(read_if_exists(&path).await.unwrap().as_deref(), Some("content"));
    }

    #[tokio::test]
    async fn test_missing_files() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing.cs");

        assert_eq!(read_if_exists(&path).await.unwrap(), None);
        assert!(!remove_if_exists(&path).await.unwrap());
    }
}
