//! Fetch a DC/OS authentication token for a service account.
//!
//! A JWT with the `uid` and `exp` claims is signed (RS256) with the service
//! account private key and exchanged at `<cluster>/acs/api/v1/auth/login`
//! for a session token.
//!
//! ```no_run
//! use core::time::Duration;
//!
//! use dcos_token_fetcher::{fetch, CredentialSource, LoginConfig, OutputTarget};
//!
//! fetch(
//!     &CredentialSource::secret_bundle("/mnt/mesos/sandbox/sa-secret.json"),
//!     Duration::from_secs(3600),
//!     &LoginConfig::default(),
//!     &OutputTarget::Screen,
//!     &mut std::io::stdout(),
//! )
//! .unwrap();
//! ```

use core::time::Duration;
use std::io;

use log::debug;

pub mod assertion;
pub mod credential;
pub mod login;
pub mod sink;

pub use credential::{CredentialSource, Identity, SigningKey};
pub use login::{Exchanger, LoginConfig, LoginResponse};
pub use sink::OutputTarget;

use assertion::CreateError;
use credential::LoadError;
use login::LoginError;
use sink::SinkError;

/// Loads the credential, signs the assertion, logs in and delivers the token.
///
/// Nothing is written to `target` unless the cluster returned a token.
pub fn fetch(
    source: &CredentialSource,
    validity_dur: Duration,
    config: &LoginConfig,
    target: &OutputTarget,
    screen: &mut impl io::Write,
) -> Result<(), FetchError> {
    if validity_dur.as_secs() == 0 {
        return Err(FetchError::InvalidInput(
            "token validity must be a positive number of seconds".into(),
        ));
    }

    let (identity, key) = source.load().map_err(FetchError::Load)?;
    debug!("loaded credential for {}", identity.username);

    let token = assertion::create(&identity.username, key.pem(), None, validity_dur)
        .map_err(FetchError::Sign)?;
    drop(key);

    let exchanger = Exchanger::new(config).map_err(FetchError::Login)?;
    let response = exchanger
        .login(&identity, &token)
        .map_err(FetchError::Login)?;

    sink::deliver(&response, target, screen).map_err(FetchError::Deliver)
}

//
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    KeyFileUnreadable,
    BundleUnreadable,
    BundleMalformed,
    SigningFailed,
    TransportError,
    ResponseMalformed,
    AuthenticationRejected,
    OutputFailed,
}

#[derive(Debug)]
pub enum FetchError {
    InvalidInput(Box<str>),
    Load(LoadError),
    Sign(CreateError),
    Login(LoginError),
    Deliver(SinkError),
}

impl FetchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::Load(LoadError::KeyFileUnreadable { .. }) => ErrorKind::KeyFileUnreadable,
            Self::Load(LoadError::BundleUnreadable { .. }) => ErrorKind::BundleUnreadable,
            Self::Load(LoadError::BundleMalformed { .. }) => ErrorKind::BundleMalformed,
            Self::Load(LoadError::EmptyUsername) => ErrorKind::InvalidInput,
            Self::Sign(CreateError::InvalidValidity) => ErrorKind::InvalidInput,
            Self::Sign(_) => ErrorKind::SigningFailed,
            Self::Login(err) if err.is_transport() => ErrorKind::TransportError,
            Self::Login(_) => ErrorKind::ResponseMalformed,
            Self::Deliver(SinkError::AuthenticationRejected { .. }) => {
                ErrorKind::AuthenticationRejected
            }
            Self::Deliver(SinkError::WriteFailed { .. }) => ErrorKind::OutputFailed,
        }
    }
}

impl core::fmt::Display for FetchError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidInput(msg) => write!(f, "{msg}"),
            Self::Load(err) => write!(f, "{err}"),
            Self::Sign(err) => write!(f, "cannot sign login token: {err}"),
            Self::Login(err) => write!(f, "{err}"),
            Self::Deliver(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidInput(_) => None,
            Self::Load(err) => Some(err),
            Self::Sign(err) => Some(err),
            Self::Login(err) => Some(err),
            Self::Deliver(err) => Some(err),
        }
    }
}
