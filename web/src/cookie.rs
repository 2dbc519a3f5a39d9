//! Signed session cookies.
//!
//! The cookie value is `<session_id>.<signature>` where the signature is
//! unpadded base64url `HMAC-SHA256(secret, session_id)`. A value with a bad
//! signature is treated exactly like a missing cookie.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use gatehouse_auth::{AuthConfig, SessionId};
use hmac::{Hmac, Mac};
use http::header::{COOKIE, HeaderMap, HeaderValue};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Cookie codec construction and encoding errors.
#[derive(Debug, Error)]
pub enum CookieError {
    /// The signing key was rejected.
    #[error("invalid cookie signing key")]
    InvalidKey,

    /// The cookie name contains characters not allowed in a cookie token.
    #[error("invalid cookie name: {0:?}")]
    InvalidName(String),

    /// The encoded cookie is not a valid header value.
    #[error("invalid Set-Cookie header value")]
    InvalidHeader(#[from] http::header::InvalidHeaderValue),
}

/// Signs, verifies, and renders the session cookie.
#[derive(Clone)]
pub struct CookieCodec {
    name: String,
    mac: HmacSha256,
    secure: bool,
    max_age: Option<i64>,
}

impl std::fmt::Debug for CookieCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieCodec")
            .field("name", &self.name)
            .field("secure", &self.secure)
            .field("max_age", &self.max_age)
            .finish_non_exhaustive()
    }
}

impl CookieCodec {
    /// Build a codec from the authenticator configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CookieError::InvalidName`] if the configured cookie name is
    /// not a cookie token.
    pub fn new(config: &AuthConfig) -> Result<Self, CookieError> {
        let name = config.cookie_name.clone();
        let valid = !name.is_empty()
            && name
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-' | b'_'));
        if !valid {
            return Err(CookieError::InvalidName(name));
        }

        let mac = HmacSha256::new_from_slice(config.secret()).map_err(|_| CookieError::InvalidKey)?;

        Ok(Self {
            name,
            mac,
            secure: config.secure_cookie,
            max_age: config.session_ttl.map(|ttl| ttl.num_seconds()),
        })
    }

    /// Cookie name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn signature(&self, session_id: &SessionId) -> HmacSha256 {
        let mut mac = self.mac.clone();
        mac.update(session_id.expose().as_bytes());
        mac
    }

    /// Signed cookie value for `session_id`.
    #[must_use]
    pub fn sign(&self, session_id: &SessionId) -> String {
        let tag = self.signature(session_id).finalize().into_bytes();
        format!("{}.{}", session_id.expose(), URL_SAFE_NO_PAD.encode(tag))
    }

    /// Verify a signed value, returning the session id it names.
    #[must_use]
    pub fn verify(&self, value: &str) -> Option<SessionId> {
        let (raw_id, raw_tag) = value.rsplit_once('.')?;
        let session_id = SessionId::parse(raw_id)?;
        let tag = URL_SAFE_NO_PAD.decode(raw_tag).ok()?;

        // verify_slice compares in constant time
        self.signature(&session_id).verify_slice(&tag).ok()?;
        Some(session_id)
    }

    /// Session id from the request's `Cookie` headers, if present and valid.
    #[must_use]
    pub fn from_headers(&self, headers: &HeaderMap) -> Option<SessionId> {
        let value = headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|header| header.to_str().ok())
            .flat_map(|header| header.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find_map(|(name, value)| (name == self.name).then_some(value))?;

        let verified = self.verify(value);
        if verified.is_none() {
            tracing::debug!("Session cookie failed verification");
        }
        verified
    }

    fn attributes(&self) -> &'static str {
        if self.secure {
            "; Path=/; HttpOnly; SameSite=Strict; Secure"
        } else {
            "; Path=/; HttpOnly; SameSite=Strict"
        }
    }

    /// `Set-Cookie` value issuing `session_id`.
    ///
    /// # Errors
    ///
    /// Returns [`CookieError::InvalidHeader`] if the rendered cookie is not a
    /// valid header value.
    pub fn issue(&self, session_id: &SessionId) -> Result<HeaderValue, CookieError> {
        let mut cookie = format!("{}={}{}", self.name, self.sign(session_id), self.attributes());
        if let Some(max_age) = self.max_age {
            cookie.push_str(&format!("; Max-Age={max_age}"));
        }
        Ok(HeaderValue::from_str(&cookie)?)
    }

    /// `Set-Cookie` value that removes the cookie.
    ///
    /// # Errors
    ///
    /// Returns [`CookieError::InvalidHeader`] if the rendered cookie is not a
    /// valid header value.
    pub fn clear(&self) -> Result<HeaderValue, CookieError> {
        let cookie = format!("{}={}; Max-Age=0", self.name, self.attributes());
        Ok(HeaderValue::from_str(&cookie)?)
    }
}
