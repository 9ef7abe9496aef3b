//! Credential retrieval for object-store writes.

use std::env;
use std::fmt;
use std::fs;
use std::path::PathBuf;

use serde::Deserialize;
use tracing::info;

use crate::storage::StorageError;

pub const AWS_KEYS_SECRET_NAME: &str = "dkuser_aws_keys";

#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    #[serde(rename = "aws_access_key_id")]
    pub access_key_id: String,
    #[serde(rename = "aws_secret_access_key")]
    pub secret_access_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &"<redacted>")
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

pub trait SecretStore {
    /// Raw secret payload for `name`.
    fn secret_string(&self, name: &str) -> Result<String, StorageError>;
}

/// Reads secrets from `<prefix><NAME>` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvSecretStore {
    pub prefix: String,
}

impl Default for EnvSecretStore {
    fn default() -> Self {
        Self {
            prefix: "GRIDIRON_SECRET_".to_string(),
        }
    }
}

impl EnvSecretStore {
    pub fn var_name(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name.to_ascii_uppercase())
    }
}

impl SecretStore for EnvSecretStore {
    fn secret_string(&self, name: &str) -> Result<String, StorageError> {
        let var = self.var_name(name);
        env::var(&var).map_err(|err| StorageError::CredentialUnavailable {
            name: name.to_string(),
            message: format!("{var}: {err}"),
        })
    }
}

/// Reads secrets from `<dir>/<name>.json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSecretStore {
    pub dir: PathBuf,
}

impl FileSecretStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl SecretStore for FileSecretStore {
    fn secret_string(&self, name: &str) -> Result<String, StorageError> {
        let path = self.dir.join(format!("{name}.json"));
        fs::read_to_string(&path).map_err(|err| StorageError::CredentialUnavailable {
            name: name.to_string(),
            message: format!("{}: {err}", path.display()),
        })
    }
}

pub fn parse_credentials(name: &str, payload: &str) -> Result<Credentials, StorageError> {
    let credentials: Credentials =
        serde_json::from_str(payload).map_err(|err| StorageError::CredentialMalformed {
            name: name.to_string(),
            message: err.to_string(),
        })?;
    if credentials.access_key_id.trim().is_empty()
        || credentials.secret_access_key.trim().is_empty()
    {
        return Err(StorageError::CredentialMalformed {
            name: name.to_string(),
            message: "empty access key id or secret".to_string(),
        });
    }
    Ok(credentials)
}

pub fn fetch_credentials(store: &dyn SecretStore, name: &str) -> Result<Credentials, StorageError> {
    let payload = store.secret_string(name)?;
    let credentials = parse_credentials(name, &payload)?;
    info!(
        component = "secrets",
        event = "secrets.credentials.loaded",
        secret_name = name
    );
    Ok(credentials)
}
