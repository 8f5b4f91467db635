use std::io;
use std::path::PathBuf;

use tokio::fs;
use ulid::Ulid;

use crate::limits::MAX_FILENAME_LEN;

/// File-backed store for uploaded contract documents.
/// Layout: `<root>/<contract_id>/<sanitized filename>`.
pub struct BlobStore {
    root: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub name: String,
    pub uri: String,
}

/// Keep alphanumerics plus `_`, `-`, `.` — prevents path traversal.
fn sanitize_filename(name: &str) -> Option<String> {
    let safe: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
        .collect();
    let safe = safe.trim_matches('.').to_string();
    if safe.is_empty() || safe.len() > MAX_FILENAME_LEN {
        None
    } else {
        Some(safe)
    }
}

impl BlobStore {
    pub fn new(root: PathBuf) -> io::Result<Self> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub async fn save(
        &self,
        contract_id: Ulid,
        filename: &str,
        data: &[u8],
    ) -> io::Result<StoredBlob> {
        let name = sanitize_filename(filename).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "invalid document filename")
        })?;
        let dir = self.root.join(contract_id.to_string());
        fs::create_dir_all(&dir).await?;
        let path = dir.join(&name);
        fs::write(&path, data).await?;
        Ok(StoredBlob {
            name,
            uri: path.display().to_string(),
        })
    }

    pub async fn load(&self, contract_id: Ulid, filename: &str) -> io::Result<Option<Vec<u8>>> {
        let name = sanitize_filename(filename).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "invalid document filename")
        })?;
        let path = self.root.join(contract_id.to_string()).join(&name);
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}
