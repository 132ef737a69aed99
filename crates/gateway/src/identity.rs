//! Durable device identity presented to the gateway during the handshake.
//!
//! The identity is created once, written to a JSON file and reused on every
//! later start. Persistence is best-effort: any read or write failure is
//! logged and an in-memory identity is used instead, so a broken disk never
//! blocks startup.

use std::{
    fs,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use {
    once_cell::sync::OnceCell,
    serde::{Deserialize, Serialize},
    tracing::{debug, info, warn},
    uuid::Uuid,
};

/// Identity of this client installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceIdentity {
    pub id: Uuid,
    /// Creation time in milliseconds since the Unix epoch.
    pub created_at: u64,
}

impl DeviceIdentity {
    fn generate() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: now_ms(),
        }
    }
}

/// Why the identity file could not be used. Logged, never returned.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize identity: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Lazily loads or creates the [`DeviceIdentity`] on first access.
#[derive(Debug)]
pub struct IdentityStore {
    path: Option<PathBuf>,
    identity: OnceCell<DeviceIdentity>,
}

impl IdentityStore {
    /// A store persisting to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            identity: OnceCell::new(),
        }
    }

    /// A store that never touches the filesystem.
    pub fn ephemeral() -> Self {
        Self {
            path: None,
            identity: OnceCell::new(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Return the identity, loading or creating it on the first call.
    ///
    /// Every later call returns the same value.
    pub fn get_or_create(&self) -> &DeviceIdentity {
        self.identity.get_or_init(|| match &self.path {
            Some(path) => load_or_create(path),
            None => {
                debug!("no identity path configured, using ephemeral device identity");
                DeviceIdentity::generate()
            },
        })
    }
}

fn load_or_create(path: &Path) -> DeviceIdentity {
    match load(path) {
        Ok(Some(identity)) => {
            debug!(path = %path.display(), id = %identity.id, "loaded device identity");
            return identity;
        },
        Ok(None) => {},
        Err(e) => warn!(error = %e, "failed to load existing device identity"),
    }

    let identity = DeviceIdentity::generate();
    match save(path, &identity) {
        Ok(()) => info!(path = %path.display(), id = %identity.id, "created device identity"),
        Err(e) => warn!(error = %e, id = %identity.id, "device identity not persisted"),
    }
    identity
}

fn load(path: &Path) -> Result<Option<DeviceIdentity>, IdentityError> {
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(IdentityError::Read {
                path: path.to_path_buf(),
                source,
            });
        },
    };
    serde_json::from_str(&data)
        .map(Some)
        .map_err(|source| IdentityError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

fn save(path: &Path, identity: &DeviceIdentity) -> Result<(), IdentityError> {
    let write_err = |source| IdentityError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    let data = serde_json::to_string_pretty(identity)?;
    fs::write(path, data).map_err(write_err)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(write_err)?;
    }

    Ok(())
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
