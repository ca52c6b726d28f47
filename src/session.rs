use crate::errors::AppResult;
use crate::identity::Identity;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CachedIdentity {
    user_email: Option<String>,
}

/// Locally persisted "last used email". The dashboard purges it on every
/// load, so it never carries identity across a reload.
#[derive(Debug, Clone, Default)]
pub struct IdentityCache {
    path: Option<PathBuf>,
    current: Arc<Mutex<Option<String>>>,
}

impl IdentityCache {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn at_path(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let current = match fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str::<CachedIdentity>(&raw)
                .unwrap_or_default()
                .user_email,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => None,
            Err(error) => return Err(error.into()),
        };

        Ok(Self {
            path: Some(path.to_path_buf()),
            current: Arc::new(Mutex::new(current)),
        })
    }

    pub fn last_email(&self) -> Option<String> {
        self.current.lock().ok().and_then(|current| current.clone())
    }

    pub fn remember(&self, identity: &Identity) -> AppResult<()> {
        self.write(Some(identity.as_str().to_string()))
    }

    pub fn forget(&self) -> AppResult<()> {
        self.write(None)
    }

    /// Returns whether a previous identity was present and cleared.
    pub fn purge_on_load(&self) -> AppResult<bool> {
        let had_identity = self.last_email().is_some();
        if had_identity {
            self.forget()?;
        }
        Ok(had_identity)
    }

    fn write(&self, value: Option<String>) -> AppResult<()> {
        if let Some(path) = &self.path {
            let payload = CachedIdentity {
                user_email: value.clone(),
            };
            fs::write(path, serde_json::to_vec_pretty(&payload)?)?;
        }
        let mut current = self
            .current
            .lock()
            .map_err(|_| crate::errors::AppError::Internal("identity cache mutex poisoned".to_string()))?;
        *current = value;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::IdentityCache;
    use crate::identity::normalize_email;

    #[test]
    fn remembered_email_survives_reopen_until_purged() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("session.json");

        let cache = IdentityCache::at_path(&path).expect("cache");
        cache
            .remember(&normalize_email("a@b.com").expect("email"))
            .expect("remember");

        let reopened = IdentityCache::at_path(&path).expect("reopen");
        assert_eq!(reopened.last_email().as_deref(), Some("a@b.com"));
        assert!(reopened.purge_on_load().expect("purge"));
        assert!(reopened.last_email().is_none());

        let after_purge = IdentityCache::at_path(&path).expect("reopen again");
        assert!(after_purge.last_email().is_none());
        assert!(!after_purge.purge_on_load().expect("purge"));
    }

    #[test]
    fn corrupt_file_reads_as_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("session.json");
        std::fs::write(&path, "not json").expect("write");
        let cache = IdentityCache::at_path(&path).expect("cache");
        assert!(cache.last_email().is_none());
    }
}
