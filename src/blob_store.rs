//! Media storage addressed by relative keys such as `tracks/2025/06/paper_moon.wav`.

use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

use rand::Rng;
use thiserror::Error;
use time::OffsetDateTime;

#[derive(Debug, Error)]
pub enum BlobStoreError {
    #[error("Invalid blob key \"{key}\"")]
    InvalidKey { key: String },
    #[error("Blob not found: {key}")]
    NotFound { key: String },
    #[error("Failed to read blob {key}: {source}")]
    Read { key: String, source: io::Error },
    #[error("Failed to store blob {key}: {source}")]
    Write { key: String, source: io::Error },
}

/// Byte storage for track media.
pub trait BlobStore: Send + Sync {
    /// Open a stored blob by the key returned from [`save`](Self::save).
    fn open_for_read(&self, key: &str) -> Result<Box<dyn Read + Send>, BlobStoreError>;

    /// Store `reader` under `key`, or a suffixed variant when `key` is taken.
    /// Returns the key actually used.
    fn save(&self, key: &str, reader: &mut dyn Read) -> Result<String, BlobStoreError>;

    fn exists(&self, key: &str) -> bool;
}

/// Build `<prefix>/<YYYY>/<MM>/<file_name>` for `now`.
pub fn dated_key(prefix: &str, file_name: &str, now: OffsetDateTime) -> String {
    format!(
        "{prefix}/{:04}/{:02}/{file_name}",
        now.year(),
        u8::from(now.month())
    )
}

/// Whether `path` is non-empty and made only of plain names, so joining it to a root cannot
/// leave that root.
pub(crate) fn is_plain_relative(path: &Path) -> bool {
    !path.as_os_str().is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_)))
}

/// Blobs stored as plain files below a root directory.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path for `key`, rejecting keys that would escape the root.
    pub fn path_for(&self, key: &str) -> Result<PathBuf, BlobStoreError> {
        let relative = Path::new(key);
        if !is_plain_relative(relative) {
            return Err(BlobStoreError::InvalidKey {
                key: key.to_string(),
            });
        }
        Ok(self.root.join(relative))
    }

    fn available_key(&self, key: &str) -> Result<String, BlobStoreError> {
        if !self.path_for(key)?.exists() {
            return Ok(key.to_string());
        }
        let path = Path::new(key);
        let stem = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = path
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        let parent = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(|parent| format!("{}/", parent.to_string_lossy()))
            .unwrap_or_default();
        let mut rng = rand::rng();
        loop {
            let suffix: String = (0..7)
                .map(|_| rng.sample(rand::distr::Alphanumeric) as char)
                .collect();
            let candidate = format!("{parent}{stem}_{suffix}{extension}");
            if !self.path_for(&candidate)?.exists() {
                return Ok(candidate);
            }
        }
    }
}

impl BlobStore for FsBlobStore {
    fn open_for_read(&self, key: &str) -> Result<Box<dyn Read + Send>, BlobStoreError> {
        let path = self.path_for(key)?;
        match std::fs::File::open(&path) {
            Ok(file) => Ok(Box::new(io::BufReader::new(file))),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(BlobStoreError::NotFound {
                key: key.to_string(),
            }),
            Err(source) => Err(BlobStoreError::Read {
                key: key.to_string(),
                source,
            }),
        }
    }

    fn save(&self, key: &str, reader: &mut dyn Read) -> Result<String, BlobStoreError> {
        let key = self.available_key(key)?;
        let path = self.path_for(&key)?;
        let write_err = |source| BlobStoreError::Write {
            key: key.clone(),
            source,
        };
        let dir = path
            .parent()
            .ok_or_else(|| write_err(io::Error::other("key has no parent directory")))?;
        std::fs::create_dir_all(dir).map_err(write_err)?;
        let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
        io::copy(reader, temp.as_file_mut()).map_err(write_err)?;
        temp.as_file().sync_all().map_err(write_err)?;
        temp.persist_noclobber(&path)
            .map_err(|err| write_err(err.error))?;
        Ok(key)
    }

    fn exists(&self, key: &str) -> bool {
        self.path_for(key).is_ok_and(|path| path.is_file())
    }
}
