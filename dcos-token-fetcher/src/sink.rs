use std::{
    fs, io,
    path::{Path, PathBuf},
};

use log::debug;

use crate::login::LoginResponse;

pub const TOKEN_FILE_NAME: &str = "dcostoken";

//
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    Screen,
    File(PathBuf),
}

impl OutputTarget {
    /// `dcostoken` in the current working directory.
    pub fn file() -> Self {
        Self::File(PathBuf::from(TOKEN_FILE_NAME))
    }

    pub fn file_in(dir: impl AsRef<Path>) -> Self {
        Self::File(dir.as_ref().join(TOKEN_FILE_NAME))
    }
}

/// Writes the session token to `target`, `screen` standing in for stdout.
pub fn deliver(
    response: &LoginResponse,
    target: &OutputTarget,
    screen: &mut impl io::Write,
) -> Result<(), SinkError> {
    let token = match response.token.as_deref() {
        Some(x) => x,
        None => {
            return Err(SinkError::AuthenticationRejected {
                status: response.status,
                body: response.raw.to_owned(),
            })
        }
    };

    match target {
        OutputTarget::Screen => {
            writeln!(screen, "{token}")
                .and_then(|_| screen.flush())
                .map_err(|err| SinkError::WriteFailed {
                    path: None,
                    source: err,
                })?;
        }
        OutputTarget::File(path) => {
            debug!("writing token to {}", path.display());
            fs::write(path, token).map_err(|err| SinkError::WriteFailed {
                path: Some(path.to_owned()),
                source: err,
            })?;
        }
    }

    Ok(())
}

//
#[derive(Debug)]
pub enum SinkError {
    AuthenticationRejected { status: u16, body: Box<str> },
    WriteFailed { path: Option<PathBuf>, source: io::Error },
}

impl core::fmt::Display for SinkError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AuthenticationRejected { status, body } => {
                write!(f, "An error occurred (status {status}). Server response:\n{body}")
            }
            Self::WriteFailed {
                path: Some(path),
                source,
            } => write!(f, "cannot write token to {}: {source}", path.display()),
            Self::WriteFailed { path: None, source } => {
                write!(f, "cannot write token to stdout: {source}")
            }
        }
    }
}

impl std::error::Error for SinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::AuthenticationRejected { .. } => None,
            Self::WriteFailed { source, .. } => Some(source),
        }
    }
}
