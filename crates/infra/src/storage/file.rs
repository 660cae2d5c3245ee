//! JSON-file store, one directory per origin

use std::fs;
use std::path::{Path, PathBuf};

use courier_domain::{CourierError, Result};
use tracing::debug;

use super::PersistentStore;
use crate::errors::InfraError;

/// [`PersistentStore`] writing each key to `<dir>/<key>.json`.
///
/// Writes go through a temporary file and a rename so a crash never leaves
/// a half-written record behind.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Store rooted directly at `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store for one backend origin under a shared storage root.
    ///
    /// `https://api.example.com:8443/v1` becomes
    /// `<root>/https_api.example.com_8443`.
    pub fn for_origin(root: impl AsRef<Path>, base_url: &str) -> Self {
        Self::new(root.as_ref().join(origin_dir_name(base_url)))
    }

    /// Directory holding this store's records
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(CourierError::Storage(format!("invalid storage key '{key}'")));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl PersistentStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(InfraError::from(err).into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir).map_err(InfraError::from)?;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value).map_err(InfraError::from)?;
        fs::rename(&tmp, &path).map_err(InfraError::from)?;

        debug!(path = %path.display(), bytes = value.len(), "persisted record");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(InfraError::from(err).into()),
        }
    }
}

fn origin_dir_name(base_url: &str) -> String {
    let origin = match url::Url::parse(base_url) {
        Ok(url) => {
            let host = url.host_str().unwrap_or("local");
            match url.port() {
                Some(port) => format!("{}_{host}_{port}", url.scheme()),
                None => format!("{}_{host}", url.scheme()),
            }
        }
        Err(_) => base_url.to_string(),
    };
    origin
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect()
}
