//! Local file selection for uploads.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::api::UploadFile;
use crate::error::DocchatError;

/// A file picked for upload, as shown in the preview list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedFile {
    pub name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
}

impl SelectedFile {
    /// Stat `path` and build the preview entry.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DocchatError> {
        let path = path.as_ref();
        let meta = std::fs::metadata(path)?;
        if !meta.is_file() {
            return Err(DocchatError::Validation(format!("{} is not a file", path.display())));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self {
            name,
            path: path.to_path_buf(),
            size_bytes: meta.len(),
        })
    }

    /// Size in kilobytes with one decimal, e.g. `"12.3 KB"`.
    pub fn size_label(&self) -> String {
        format!("{:.1} KB", self.size_bytes as f64 / 1024.0)
    }

    /// Read the file contents for the multipart body.
    pub async fn load(&self) -> Result<UploadFile, DocchatError> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| {
            DocchatError::Transport(format!("cannot read {}: {e}", self.path.display()))
        })?;
        Ok(UploadFile { name: self.name.clone(), bytes })
    }
}

/// Build a selection from user-supplied paths. Unreadable entries are logged
/// and skipped.
pub fn select<I, P>(paths: I) -> Vec<SelectedFile>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    paths
        .into_iter()
        .filter_map(|p| match SelectedFile::from_path(p.as_ref()) {
            Ok(f) => Some(f),
            Err(e) => {
                warn!(path = %p.as_ref().display(), error = %e, "skipping unreadable file");
                None
            }
        })
        .collect()
}

/// Load every selected file, stopping at the first read failure.
pub async fn load_all(selection: &[SelectedFile]) -> Result<Vec<UploadFile>, DocchatError> {
    let mut out = Vec::with_capacity(selection.len());
    for file in selection {
        out.push(file.load().await?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;

    fn file_with(bytes: usize) -> tempfile::NamedTempFile {
        let mut f = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        f.write_all(&vec![b'x'; bytes]).unwrap();
        f
    }

    #[rstest]
    #[case(0, "0.0 KB")]
    #[case(1024, "1.0 KB")]
    #[case(1536, "1.5 KB")]
    #[case(12_600, "12.3 KB")]
    fn size_label(#[case] bytes: u64, #[case] expected: &str) {
        let f = SelectedFile { name: "a.pdf".into(), path: "a.pdf".into(), size_bytes: bytes };
        assert_eq!(f.size_label(), expected);
    }

    #[test]
    fn from_path_reads_name_and_size() {
        let tmp = file_with(2048);
        let f = SelectedFile::from_path(tmp.path()).unwrap();
        assert_eq!(f.size_bytes, 2048);
        assert!(f.name.ends_with(".txt"));
        assert!(!f.name.contains('/'));
    }

    #[test]
    fn directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(SelectedFile::from_path(dir.path()).is_err());
    }

    #[test]
    fn select_skips_missing_paths() {
        let tmp = file_with(10);
        let picked = select([tmp.path(), Path::new("/definitely/not/here.pdf")]);
        assert_eq!(picked.len(), 1);
    }

    #[tokio::test]
    async fn load_all_reads_bytes() {
        let a = file_with(3);
        let b = file_with(5);
        let selection = select([a.path(), b.path()]);
        let loaded = load_all(&selection).await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].bytes.len(), 3);
        assert_eq!(loaded[1].bytes.len(), 5);
    }

    #[tokio::test]
    async fn load_of_deleted_file_is_transport_error() {
        let tmp = file_with(3);
        let f = SelectedFile::from_path(tmp.path()).unwrap();
        drop(tmp);
        let err = f.load().await.unwrap_err();
        assert!(matches!(err, DocchatError::Transport(_)));
    }
}
