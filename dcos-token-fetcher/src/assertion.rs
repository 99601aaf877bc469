//! Login assertion for the DC/OS IAM service.
//!
//! The IAM service accepts exactly the `uid` and `exp` claims, signed with RS256
//! by the private key whose public half is registered for the service account.

use core::time::Duration;

use chrono::{serde::ts_seconds, DateTime, Duration as ChronoDuration, Utc};
use jsonwebtoken::{encode, errors::Error as JsonwebtokenError, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

//
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub uid: Box<str>,
    #[serde(with = "ts_seconds")]
    pub exp: DateTime<Utc>,
}

pub fn create(
    uid: impl AsRef<str>,
    pem_private_key_bytes: impl AsRef<[u8]>,
    issued_at: impl Into<Option<DateTime<Utc>>>,
    validity_dur: Duration,
) -> Result<Box<str>, CreateError> {
    if validity_dur.as_secs() == 0 {
        return Err(CreateError::InvalidValidity);
    }
    let validity_secs =
        i64::try_from(validity_dur.as_secs()).map_err(|_| CreateError::InvalidValidity)?;

    let key = EncodingKey::from_rsa_pem(pem_private_key_bytes.as_ref())
        .map_err(CreateError::MakeEncodingKeyFailed)?;

    let header = Header::new(Algorithm::RS256);

    let issued_at = issued_at.into().unwrap_or_else(Utc::now);
    let expiration_time = ChronoDuration::try_seconds(validity_secs)
        .and_then(|dur| issued_at.checked_add_signed(dur))
        .ok_or(CreateError::InvalidValidity)?;

    let claims = Claims {
        uid: uid.as_ref().into(),
        exp: expiration_time,
    };

    let token = encode(&header, &claims, &key).map_err(CreateError::EncodeFailed)?;

    Ok(token.as_str().into())
}

#[derive(Debug)]
pub enum CreateError {
    InvalidValidity,
    MakeEncodingKeyFailed(JsonwebtokenError),
    EncodeFailed(JsonwebtokenError),
}
impl core::fmt::Display for CreateError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{self:?}")
    }
}
impl std::error::Error for CreateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidValidity => None,
            Self::MakeEncodingKeyFailed(err) | Self::EncodeFailed(err) => Some(err),
        }
    }
}
