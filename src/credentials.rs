use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("could not read API key from {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("API key file {} is empty", path.display())]
    Empty { path: PathBuf },
}

/// Polygon API token, sent as the `apiKey` query parameter on every request.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new<T: ToString>(key: T) -> Self {
        Self(key.to_string())
    }

    /// Reads the key from a local file, trimming surrounding whitespace.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CredentialError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| CredentialError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let key = contents.trim();
        if key.is_empty() {
            return Err(CredentialError::Empty {
                path: path.to_path_buf(),
            });
        }
        Ok(Self::new(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}
