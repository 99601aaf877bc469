use std::{
    fs, io,
    path::{Path, PathBuf},
};

use log::debug;
use serde::Deserialize;
use zeroize::{Zeroize, ZeroizeOnDrop};

//
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: Box<str>,
}

/// PEM encoded RSA private key.
///
/// The bytes are zeroized on drop and never printed by `Debug`.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SigningKey(Vec<u8>);

impl SigningKey {
    pub fn new(pem: impl Into<Vec<u8>>) -> Self {
        Self(pem.into())
    }

    pub fn pem(&self) -> &[u8] {
        &self.0
    }
}

impl core::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("SigningKey").field(&"<redacted>").finish()
    }
}

/// Service account secret, e.g. the `sa-secret` mounted into a task sandbox.
#[derive(Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct SecretBundle {
    pub uid: String,
    pub private_key: String,
}

impl SecretBundle {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

//
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    StandaloneKey { path: PathBuf, username: Box<str> },
    SecretBundle { path: PathBuf },
}

impl CredentialSource {
    pub fn standalone_key(path: impl AsRef<Path>, username: impl AsRef<str>) -> Self {
        Self::StandaloneKey {
            path: path.as_ref().to_owned(),
            username: username.as_ref().into(),
        }
    }

    pub fn secret_bundle(path: impl AsRef<Path>) -> Self {
        Self::SecretBundle {
            path: path.as_ref().to_owned(),
        }
    }

    pub fn load(&self) -> Result<(Identity, SigningKey), LoadError> {
        let (username, key) = match self {
            Self::StandaloneKey { path, username } => {
                debug!("reading private key from {}", path.display());
                let pem = fs::read(path).map_err(|err| LoadError::KeyFileUnreadable {
                    path: path.to_owned(),
                    source: err,
                })?;
                (username.to_owned(), SigningKey::new(pem))
            }
            Self::SecretBundle { path } => {
                debug!("reading secret bundle from {}", path.display());
                let bytes = fs::read(path).map_err(|err| LoadError::BundleUnreadable {
                    path: path.to_owned(),
                    source: err,
                })?;
                let bundle =
                    SecretBundle::from_slice(&bytes).map_err(|err| LoadError::BundleMalformed {
                        path: path.to_owned(),
                        source: err,
                    })?;
                (
                    bundle.uid.as_str().into(),
                    SigningKey::new(bundle.private_key.as_bytes()),
                )
            }
        };

        if username.is_empty() {
            return Err(LoadError::EmptyUsername);
        }

        Ok((Identity { username }, key))
    }
}

//
#[derive(Debug)]
pub enum LoadError {
    KeyFileUnreadable { path: PathBuf, source: io::Error },
    BundleUnreadable { path: PathBuf, source: io::Error },
    BundleMalformed { path: PathBuf, source: serde_json::Error },
    EmptyUsername,
}

impl core::fmt::Display for LoadError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::KeyFileUnreadable { path, source } => {
                write!(f, "cannot read private key file {}: {source}", path.display())
            }
            Self::BundleUnreadable { path, source } => {
                write!(f, "cannot read secret bundle {}: {source}", path.display())
            }
            Self::BundleMalformed { path, source } => {
                write!(f, "malformed secret bundle {}: {source}", path.display())
            }
            Self::EmptyUsername => write!(f, "username must not be empty"),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::KeyFileUnreadable { source, .. } | Self::BundleUnreadable { source, .. } => {
                Some(source)
            }
            Self::BundleMalformed { source, .. } => Some(source),
            Self::EmptyUsername => None,
        }
    }
}
