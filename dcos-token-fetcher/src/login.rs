//! Service account login against the IAM service of a DC/OS cluster.

use core::time::Duration;
use std::io;

use isahc::{
    config::{Configurable as _, SslOption},
    http::{header::CONTENT_TYPE, Error as HttpError, Request},
    Error as IsahcError, HttpClient, ReadResponseExt as _,
};
use log::{debug, warn};
use serde::Serialize;
use serde_json::Value;

use crate::credential::Identity;

pub const LOGIN_PATH: &str = "/acs/api/v1/auth/login";
pub const DEFAULT_CLUSTER: &str = "https://master.mesos";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

//
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginConfig {
    pub cluster: Box<str>,
    pub timeout: Duration,
    /// Accept any server certificate and host name.
    ///
    /// Clusters commonly serve the IAM endpoint with a certificate issued by
    /// their own CA. Leave this off unless that CA cannot be trusted locally.
    pub insecure_skip_tls_verify: bool,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CLUSTER)
    }
}

impl LoginConfig {
    pub fn new(cluster: impl AsRef<str>) -> Self {
        Self {
            cluster: cluster.as_ref().into(),
            timeout: DEFAULT_TIMEOUT,
            insecure_skip_tls_verify: false,
        }
    }

    pub fn login_url(&self) -> String {
        format!("{}{LOGIN_PATH}", self.cluster.trim_end_matches('/'))
    }
}

//
#[derive(Serialize, Debug)]
struct LoginRequestBody<'a> {
    uid: &'a str,
    token: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginResponse {
    pub status: u16,
    /// Session token, `None` when the body carries no (or an empty) `token` string.
    pub token: Option<Box<str>>,
    pub raw: Box<str>,
}

impl LoginResponse {
    pub fn parse(status: u16, raw: impl AsRef<str>) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(raw.as_ref())?;
        let token = value
            .get("token")
            .and_then(Value::as_str)
            .filter(|x| !x.is_empty())
            .map(Into::into);

        Ok(Self {
            status,
            token,
            raw: raw.as_ref().into(),
        })
    }
}

//
#[derive(Debug, Clone)]
pub struct Exchanger {
    client: HttpClient,
    url: String,
}

impl Exchanger {
    pub fn new(config: &LoginConfig) -> Result<Self, LoginError> {
        let mut builder = HttpClient::builder().timeout(config.timeout);
        if config.insecure_skip_tls_verify {
            warn!(
                "TLS certificate verification is disabled for {}",
                config.cluster
            );
            builder = builder.ssl_options(
                SslOption::DANGER_ACCEPT_INVALID_CERTS | SslOption::DANGER_ACCEPT_INVALID_HOSTS,
            );
        }
        let client = builder.build().map_err(LoginError::MakeClientFailed)?;

        Ok(Self {
            client,
            url: config.login_url(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn login(
        &self,
        identity: &Identity,
        assertion: impl AsRef<str>,
    ) -> Result<LoginResponse, LoginError> {
        let body = serde_json::to_vec(&LoginRequestBody {
            uid: &identity.username,
            token: assertion.as_ref(),
        })
        .map_err(LoginError::SerializeRequestBodyFailed)?;

        let request = Request::post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .map_err(LoginError::MakeRequestFailed)?;

        debug!("POST {}", self.url);
        let mut response = self
            .client
            .send(request)
            .map_err(LoginError::SendFailed)?;
        let status = response.status().as_u16();
        debug!("login responded with status {status}");

        let raw = response.text().map_err(LoginError::ReadBodyFailed)?;

        LoginResponse::parse(status, &raw).map_err(|err| LoginError::ResponseMalformed {
            status,
            body: raw.into(),
            source: err,
        })
    }
}

//
#[derive(Debug)]
pub enum LoginError {
    MakeClientFailed(IsahcError),
    SerializeRequestBodyFailed(serde_json::Error),
    MakeRequestFailed(HttpError),
    SendFailed(IsahcError),
    ReadBodyFailed(io::Error),
    ResponseMalformed {
        status: u16,
        body: Box<str>,
        source: serde_json::Error,
    },
}

impl LoginError {
    pub fn is_transport(&self) -> bool {
        !matches!(self, Self::ResponseMalformed { .. })
    }
}

impl core::fmt::Display for LoginError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::MakeClientFailed(err) => write!(f, "cannot create http client: {err}"),
            Self::SerializeRequestBodyFailed(err) => {
                write!(f, "cannot serialize login request: {err}")
            }
            Self::MakeRequestFailed(err) => write!(f, "cannot create login request: {err}"),
            Self::SendFailed(err) => write!(f, "login request failed: {err}"),
            Self::ReadBodyFailed(err) => write!(f, "cannot read login response: {err}"),
            Self::ResponseMalformed { status, body, .. } => write!(
                f,
                "login response (status {status}) is not valid JSON. Server response:\n{body}"
            ),
        }
    }
}

impl std::error::Error for LoginError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::MakeClientFailed(err) | Self::SendFailed(err) => Some(err),
            Self::SerializeRequestBodyFailed(err) => Some(err),
            Self::MakeRequestFailed(err) => Some(err),
            Self::ReadBodyFailed(err) => Some(err),
            Self::ResponseMalformed { source, .. } => Some(source),
        }
    }
}
